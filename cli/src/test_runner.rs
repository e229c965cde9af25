use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use blocks::parser::Parser as SchemaParser;
use blocks::schema::Schema;
use blocks::value::Value;
use serde::Deserialize;
use streamfield::{BlockFactory, RenderOptions, UnknownTypePolicy};
use tracing::debug;

use crate::convert::{form_from_toml, value_from_toml};

const TEMPLATE_TAG: &str = "<script type=\"text/template\"";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Definition to exercise (case-insensitive). Defaults to the first one.
    #[serde(default)]
    pub block: Option<String>,

    /// Root field prefix for rendering and parsing.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Value to render, shaped like the block.
    #[serde(default)]
    pub value: Option<toml::Value>,

    /// Submitted form fields.
    #[serde(default)]
    pub submission: Option<toml::Table>,

    /// Unknown stream type policy: drop, placeholder or fail.
    #[serde(default)]
    pub unknown_types: Option<String>,

    /// Substrings the rendered HTML must contain.
    #[serde(default)]
    pub expect_render_contains: Vec<String>,

    /// Substrings the rendered HTML must not contain.
    #[serde(default)]
    pub expect_render_excludes: Vec<String>,

    /// Number of template tags in the one-time declarations.
    #[serde(default)]
    pub expect_declarations_count: Option<usize>,

    /// Value the submission must parse to.
    #[serde(default)]
    pub expect_parsed: Option<toml::Value>,

    /// A render or parse error whose Display string contains this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Whether cleaning the value must fail.
    #[serde(default)]
    pub expect_validation_error: Option<bool>,

    /// If true, the schema document itself must fail to parse.
    #[serde(default)]
    pub expect_schema_error: bool,
}

fn default_prefix() -> String {
    "page".to_string()
}

/// Split a `.test.md` file into its TOML config and schema document.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let Some(after_open) = content.strip_prefix("---") else {
        return Err("missing opening --- frontmatter delimiter".into());
    };
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let frontmatter = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let document = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, document))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("?")
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, document) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    debug!(path = %path.display(), "running fixture");
    let outcome = match check_fixture(&config, document) {
        Ok(()) => TestOutcome::Pass,
        Err(reason) => TestOutcome::Fail(reason),
    };
    TestResult {
        path: path.to_path_buf(),
        description: config.description,
        outcome,
    }
}

/// Run every expectation in `config` against `document`; the first mismatch
/// is returned as the failure reason.
fn check_fixture(config: &TestConfig, document: &str) -> Result<(), String> {
    let parsed = SchemaParser::new(document.to_string(), 0).parse();

    if config.expect_schema_error {
        return match parsed {
            Err(errors) => match &config.expect_error {
                Some(expected) if !errors.iter().any(|e| e.message.contains(expected.as_str())) => {
                    let msgs: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
                    Err(format!(
                        "expected schema error containing \"{}\", got: {}",
                        expected,
                        msgs.join("; ")
                    ))
                }
                _ => Ok(()),
            },
            Ok(_) => Err("expected schema error, but the document parsed".into()),
        };
    }

    let doc = parsed.map_err(|errors| {
        let msgs: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        format!("unexpected schema error: {}", msgs.join("; "))
    })?;

    let definition = match &config.block {
        Some(name) => doc
            .get(name)
            .ok_or_else(|| format!("no definition named '{}'", name))?,
        None => doc.first().ok_or("the document defines no blocks")?,
    };
    let schema = definition.schema.clone();

    let policy = match &config.unknown_types {
        Some(raw) => raw.parse::<UnknownTypePolicy>()?,
        None => UnknownTypePolicy::default(),
    };
    let options = RenderOptions::new().unknown_stream_type(policy);
    let factory = BlockFactory::new(schema.clone()).with_options(options);

    let value = match &config.value {
        Some(raw) => value_from_toml(&schema, raw).map_err(|e| format!("bad `value`: {}", e))?,
        None => schema.default().clone(),
    };

    let wants_render = config.submission.is_none()
        || config.value.is_some()
        || !config.expect_render_contains.is_empty()
        || !config.expect_render_excludes.is_empty()
        || config.expect_declarations_count.is_some();

    if wants_render {
        let html = match factory.render(&value, &config.prefix) {
            Ok(html) => html,
            Err(e) => return expected_error(config, &e.to_string()),
        };
        check_render(config, &html)?;
    }

    if let Some(expected) = config.expect_declarations_count {
        let declarations = match factory.html_declarations() {
            Ok(html) => html,
            Err(e) => return expected_error(config, &e.to_string()),
        };
        let actual = declarations.matches(TEMPLATE_TAG).count();
        if actual != expected {
            return Err(format!(
                "expected {} template declaration(s), got {}\n  declarations:\n{}",
                expected, actual, declarations
            ));
        }
    }

    let checked = match &config.submission {
        Some(table) => {
            let data = form_from_toml(table).map_err(|e| format!("bad `submission`: {}", e))?;
            let parsed = match factory.value_from_submission(&data, &config.prefix) {
                Ok(v) => v,
                Err(e) => return expected_error(config, &e.to_string()),
            };
            if let Some(raw) = &config.expect_parsed {
                check_parsed(&schema, raw, &parsed)?;
            }
            parsed
        }
        None => value,
    };

    if let Some(expected) = &config.expect_error {
        return Err(format!(
            "expected error containing \"{}\", but rendering and parsing succeeded",
            expected
        ));
    }

    if let Some(expect_invalid) = config.expect_validation_error {
        match (factory.clean(&checked), expect_invalid) {
            (Ok(_), true) => {
                return Err(format!("expected a validation error, but {} is valid", checked));
            }
            (Err(errors), false) => {
                let lines: Vec<String> = errors
                    .flatten(&config.prefix)
                    .into_iter()
                    .map(|(field, message)| format!("  {}: {}", field, message))
                    .collect();
                return Err(format!("unexpected validation error:\n{}", lines.join("\n")));
            }
            _ => {}
        }
    }

    Ok(())
}

fn expected_error(config: &TestConfig, actual: &str) -> Result<(), String> {
    match &config.expect_error {
        Some(expected) if actual.contains(expected.as_str()) => Ok(()),
        Some(expected) => Err(format!(
            "expected error containing \"{}\", got: {}",
            expected, actual
        )),
        None => Err(format!("unexpected error: {}", actual)),
    }
}

fn check_render(config: &TestConfig, html: &str) -> Result<(), String> {
    for needle in &config.expect_render_contains {
        if !html.contains(needle.as_str()) {
            return Err(format!(
                "rendered HTML does not contain {:?}\n  rendered: {}",
                needle, html
            ));
        }
    }
    for needle in &config.expect_render_excludes {
        if html.contains(needle.as_str()) {
            return Err(format!(
                "rendered HTML unexpectedly contains {:?}\n  rendered: {}",
                needle, html
            ));
        }
    }
    Ok(())
}

fn check_parsed(schema: &Schema, raw: &toml::Value, actual: &Value) -> Result<(), String> {
    let expected = value_from_toml(schema, raw).map_err(|e| format!("bad `expect_parsed`: {}", e))?;
    if &expected == actual {
        Ok(())
    } else {
        Err(format!(
            "parsed value mismatch\n  expected: {}\n  actual:   {}",
            expected, actual
        ))
    }
}

/// Discover `.test.md` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".test.md"))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given fixture path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

fn paint(s: &str, code: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, s)
    }
}

/// Select the categories to run. Requested names match a category and its
/// subcategories.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }
    let mut selected = BTreeMap::new();
    for req in requested {
        let req = req.trim_matches('/');
        let nested = format!("{}/", req);
        let mut found = false;
        for (category, files) in all {
            if category == req || category.starts_with(&nested) {
                selected.insert(category.as_str(), files);
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| category_label(k))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    selected
}

/// Run all `.test.md` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let mut results = Vec::new();

    if path.is_file() {
        let result = run_single_test(path);
        report(&result, no_color);
        results.push(result);
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no .test.md files found in {}", path.display());
            return 1;
        }
        let selected = select_categories(&all, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        for (category, files) in selected {
            eprintln!();
            eprintln!("{}", paint(category_label(category), "1", no_color));
            for file in files {
                let result = run_single_test(file);
                report(&result, no_color);
                results.push(result);
            }
        }
    }

    summarize(&results, no_color)
}

fn report(result: &TestResult, no_color: bool) {
    let status = match result.outcome {
        TestOutcome::Pass => paint("PASS", "32", no_color),
        TestOutcome::Fail(_) => paint("FAIL", "31", no_color),
    };
    eprintln!("  {}  {}", status, result.label());
}

fn summarize(results: &[TestResult], no_color: bool) -> i32 {
    let failures: Vec<&TestResult> = results
        .iter()
        .filter(|r| matches!(r.outcome, TestOutcome::Fail(_)))
        .collect();
    let failed = failures.len();
    let passed = results.len() - failed;

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failed == 0 {
        eprintln!(
            "test result: {}. {} passed, 0 failed",
            paint("ok", "32", no_color),
            passed
        );
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failed,
            results.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = "# speaker: struct\n## name: text\n- required\n## bio: text\n";

    fn fixture(frontmatter: &str) -> String {
        format!("---\n{}\n---\n{}", frontmatter, SCHEMA)
    }

    fn run(frontmatter: &str) -> Result<(), String> {
        let content = fixture(frontmatter);
        let (config, document) = parse_test_file(&content)?;
        check_fixture(&config, document)
    }

    #[test]
    fn splits_frontmatter_from_document() {
        let content = fixture("description = \"render\"\nprefix = \"s\"");
        let (config, document) = parse_test_file(&content).unwrap();
        assert_eq!(config.description.as_deref(), Some("render"));
        assert_eq!(config.prefix, "s");
        assert!(config.block.is_none());
        assert!(document.starts_with("# speaker: struct"));
    }

    #[test]
    fn missing_delimiters_are_reported() {
        assert!(parse_test_file("# speaker: struct\n").is_err());
        assert!(
            parse_test_file("---\ndescription = \"x\"\n")
                .unwrap_err()
                .contains("closing")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_test_file(&fixture("expect_output = \"x\"")).is_err());
    }

    #[test]
    fn render_expectations() {
        run(r#"
value = { name = "Ada" }
expect_render_contains = ['name="page-name"', 'value="Ada"']
expect_render_excludes = ["error-message"]
"#)
        .unwrap();

        let reason = run(r#"
value = { name = "Ada" }
expect_render_contains = ["Grace"]
"#)
        .unwrap_err();
        assert!(reason.contains("does not contain"), "{}", reason);
    }

    #[test]
    fn parsed_and_validation_expectations() {
        run(r#"
submission = { "page-name" = "", "page-bio" = "hi" }
expect_parsed = { name = "", bio = "hi" }
expect_validation_error = true
"#)
        .unwrap();

        let reason = run(r#"
submission = { "page-name" = "Ada", "page-bio" = "" }
expect_validation_error = true
"#)
        .unwrap_err();
        assert!(reason.contains("is valid"), "{}", reason);
    }

    #[test]
    fn schema_error_expectation() {
        let content = "---\nexpect_schema_error = true\nexpect_error = \"unknown\"\n---\n# a: nonsense\n";
        let (config, document) = parse_test_file(content).unwrap();
        check_fixture(&config, document).unwrap();

        let reason = run("expect_schema_error = true").unwrap_err();
        assert!(reason.contains("parsed"), "{}", reason);
    }

    #[test]
    fn expected_error_must_happen() {
        let reason = run("expect_error = \"boom\"").unwrap_err();
        assert!(reason.contains("succeeded"), "{}", reason);
    }
}
