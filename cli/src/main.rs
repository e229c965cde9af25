mod convert;
mod test_runner;

use std::collections::HashSet;
use std::path::Path;
use std::process;
use std::sync::Arc;

use blocks::identity::BlockId;
use blocks::parser::Parser as SchemaParser;
use blocks::schema::{Schema, SchemaKind};
use blocks::{FormData, SchemaDocument, Value};
use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use streamfield::{BlockFactory, RenderOptions, UnknownTypePolicy};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "blocks", version, about = "Composable content blocks: render, parse and validate")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log library activity at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a schema document and print its definitions
    Check(CheckArgs),

    /// Render a block with a value
    Render(RenderArgs),

    /// Parse a form submission into a value
    Parse(ParseArgs),

    /// Run .test.md fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Markdown schema document
    file: String,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Markdown schema document
    file: String,

    /// Definition to render (case-insensitive). Defaults to the first one.
    #[arg(short, long)]
    block: Option<String>,

    /// TOML file whose `value` key holds the value to bind
    #[arg(long)]
    value: Option<String>,

    /// Root field prefix
    #[arg(short, long, default_value = "page")]
    prefix: String,

    /// Also print the one-time template declarations
    #[arg(long)]
    declarations: bool,

    /// Also print the asset tags
    #[arg(long)]
    media: bool,

    /// Also print the client initializer expression
    #[arg(long)]
    js: bool,

    /// What to do with stream items of undeclared types: drop, placeholder or fail
    #[arg(long, default_value = "placeholder")]
    unknown_types: UnknownTypePolicy,
}

#[derive(clap::Args)]
struct ParseArgs {
    /// Markdown schema document
    file: String,

    /// Definition to parse against (case-insensitive). Defaults to the first one.
    #[arg(short, long)]
    block: Option<String>,

    /// TOML table of submitted field names to values
    #[arg(long, conflicts_with = "urlencoded", required_unless_present = "urlencoded")]
    submission: Option<String>,

    /// File holding an application/x-www-form-urlencoded body
    #[arg(long)]
    urlencoded: Option<String>,

    /// Root field prefix
    #[arg(short, long, default_value = "page")]
    prefix: String,

    /// Also validate the parsed value
    #[arg(long)]
    clean: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Check(args) => do_check(args, cli.no_color),
        Command::Render(args) => do_render(args, cli.no_color),
        Command::Parse(args) => do_parse(args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn read_file(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path, e);
            process::exit(1);
        }
    }
}

/// Parse a schema document, printing diagnostics and exiting on failure.
fn load_document(file: &str, no_color: bool) -> SchemaDocument {
    let source = read_file(file);

    let mut files = SimpleFiles::new();
    let file_id = files.add(file.to_string(), source.clone());

    match SchemaParser::new(source, file_id).parse() {
        Ok(doc) => doc,
        Err(errors) => {
            let writer = StandardStream::stderr(color_choice(no_color));
            let config = term::Config::default();
            for error in &errors {
                let diagnostic = error.to_diagnostic();
                let _ =
                    term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
            }
            process::exit(1);
        }
    }
}

fn select_block(doc: &SchemaDocument, name: Option<&str>) -> Arc<Schema> {
    let found = match name {
        Some(name) => doc.get(name),
        None => doc.first(),
    };
    match found {
        Some(definition) => Arc::clone(&definition.schema),
        None => {
            let names: Vec<&str> = doc.definitions.iter().map(|d| d.name.as_str()).collect();
            match name {
                Some(name) => eprintln!(
                    "error: no definition named '{}' (available: {})",
                    name,
                    names.join(", ")
                ),
                None => eprintln!("error: the document defines no blocks"),
            }
            process::exit(1);
        }
    }
}

fn do_check(args: CheckArgs, no_color: bool) {
    let doc = load_document(&args.file, no_color);
    let mut printed = HashSet::new();
    for definition in &doc.definitions {
        print_schema(&definition.name, &definition.schema, 0, &mut printed);
    }
    eprintln!(
        "ok: {} parsed successfully ({} definitions)",
        args.file,
        doc.definitions.len()
    );
}

/// Print `schema` as an indented tree. A schema printed before is shown by
/// reference only.
fn print_schema(name: &str, schema: &Schema, indent: usize, printed: &mut HashSet<BlockId>) {
    let pad = "  ".repeat(indent);
    let mut flags = Vec::new();
    if schema.is_required() {
        flags.push("required".to_string());
    }
    if let Some(label) = schema.label() {
        flags.push(format!("label: {}", label));
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };

    if !printed.insert(schema.id()) {
        println!(
            "{}{}: {} ({}, shared){}",
            pad,
            name,
            schema.kind_name(),
            schema.definition_prefix(),
            flags
        );
        return;
    }
    println!(
        "{}{}: {} ({}){}",
        pad,
        name,
        schema.kind_name(),
        schema.definition_prefix(),
        flags
    );

    match schema.kind() {
        SchemaKind::Leaf(_) => {}
        SchemaKind::Struct(s) => {
            for child in s.children() {
                print_schema(&child.name, &child.schema, indent + 1, printed);
            }
        }
        SchemaKind::List(l) => print_schema("item", l.child(), indent + 1, printed),
        SchemaKind::Stream(s) => {
            for child in s.children() {
                print_schema(&child.name, &child.schema, indent + 1, printed);
            }
        }
    }
}

fn do_render(args: RenderArgs, no_color: bool) {
    let doc = load_document(&args.file, no_color);
    let schema = select_block(&doc, args.block.as_deref());

    let value = match &args.value {
        Some(path) => load_value(&schema, path),
        None => schema.default().clone(),
    };

    let options = RenderOptions::new().unknown_stream_type(args.unknown_types);
    let factory = BlockFactory::new(schema).with_options(options);

    if args.media {
        println!("{}", factory.media().render());
    }
    if args.declarations {
        match factory.html_declarations() {
            Ok(html) => println!("{}", html),
            Err(e) => {
                eprintln!("render error: {}", e);
                process::exit(1);
            }
        }
    }
    if args.js {
        println!("{}", factory.js_initializer().unwrap_or_else(|| "null".to_string()));
    }

    match factory.render(&value, &args.prefix) {
        Ok(html) => println!("{}", html),
        Err(e) => {
            eprintln!("render error: {}", e);
            process::exit(1);
        }
    }
}

fn load_value(schema: &Schema, path: &str) -> Value {
    let source = read_file(path);
    let table: toml::Table = match toml::from_str(&source) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {}: TOML parse error: {}", path, e);
            process::exit(1);
        }
    };
    let Some(raw) = table.get("value") else {
        eprintln!("error: {}: missing `value` key", path);
        process::exit(1);
    };
    match convert::value_from_toml(schema, raw) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {}: value does not match the block: {}", path, e);
            process::exit(1);
        }
    }
}

fn do_parse(args: ParseArgs, no_color: bool) {
    let doc = load_document(&args.file, no_color);
    let schema = select_block(&doc, args.block.as_deref());
    let data = load_submission(&args);

    let factory = BlockFactory::new(schema);
    let value = match factory.value_from_submission(&data, &args.prefix) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("malformed submission: {}", e);
            process::exit(1);
        }
    };
    println!("{}", value);

    if args.clean {
        match factory.clean(&value) {
            Ok(cleaned) => println!("cleaned: {}", cleaned),
            Err(errors) => {
                for (field, message) in errors.flatten(&args.prefix) {
                    println!("invalid: {}: {}", field, message);
                }
                process::exit(1);
            }
        }
    }
}

fn load_submission(args: &ParseArgs) -> FormData {
    if let Some(path) = &args.urlencoded {
        return FormData::from_urlencoded(&read_file(path));
    }
    let Some(path) = &args.submission else {
        eprintln!("error: one of --submission or --urlencoded is required");
        process::exit(2);
    };
    let source = read_file(path);
    let table: toml::Table = match toml::from_str(&source) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {}: TOML parse error: {}", path, e);
            process::exit(1);
        }
    };
    match convert::form_from_toml(&table) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("error: {}: {}", path, e);
            process::exit(1);
        }
    }
}
