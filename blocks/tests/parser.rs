use std::sync::Arc;

use blocks::parser::Parser;
use blocks::{Leaf, SchemaDocument, SchemaKind, SequentialIds, Value};

const SPEAKERS: &str = "\
# speaker: struct
## name: text
- label: Full name
- required

## job_title: text
- default: just this guy

## image: chooser

# page: struct
## title: text
- max_length: 80

The page title, shown in the browser tab.

## speakers: list of speaker
## content: stream
### heading: text
### image: chooser
";

fn parse(source: &str) -> SchemaDocument {
    Parser::new(source.to_string(), 0)
        .parse()
        .expect("parse failed")
}

fn error_messages(source: &str) -> Vec<String> {
    Parser::new(source.to_string(), 0)
        .parse()
        .expect_err("expected parse errors")
        .into_iter()
        .map(|e| e.message)
        .collect()
}

fn child_names(kind: &SchemaKind) -> Vec<&str> {
    match kind {
        SchemaKind::Struct(s) => s.children().iter().map(|c| c.name.as_str()).collect(),
        SchemaKind::Stream(s) => s.type_names().collect(),
        _ => Vec::new(),
    }
}

#[test]
fn definitions_in_document_order() {
    let doc = parse(SPEAKERS);
    let names: Vec<&str> = doc.definitions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["speaker", "page"]);
    assert_eq!(child_names(doc.definitions[0].schema.kind()), ["name", "job_title", "image"]);
    assert_eq!(child_names(doc.definitions[1].schema.kind()), ["title", "speakers", "content"]);
}

#[test]
fn reference_reuses_the_same_schema() {
    let doc = parse(SPEAKERS);
    let speaker = &doc.get("speaker").unwrap().schema;
    let page = &doc.get("page").unwrap().schema;
    let SchemaKind::Struct(page) = page.kind() else {
        panic!("page should be a struct");
    };
    let SchemaKind::List(speakers) = page.child("speakers").unwrap().schema.kind() else {
        panic!("speakers should be a list");
    };
    assert!(Arc::ptr_eq(speakers.child(), speaker));
}

#[test]
fn nested_stream_types() {
    let doc = parse(SPEAKERS);
    let SchemaKind::Struct(page) = doc.get("page").unwrap().schema.kind() else {
        panic!("page should be a struct");
    };
    let content = &page.child("content").unwrap().schema;
    assert_eq!(content.kind_name(), "stream");
    assert_eq!(child_names(content.kind()), ["heading", "image"]);
}

#[test]
fn options_and_help_text() {
    let doc = parse(SPEAKERS);
    let SchemaKind::Struct(speaker) = doc.get("speaker").unwrap().schema.kind() else {
        panic!("speaker should be a struct");
    };

    let name = speaker.child("name").unwrap();
    assert_eq!(name.schema.label(), Some("Full name"));
    assert!(name.schema.is_required());
    assert_eq!(name.label(), "Full name");

    let job_title = speaker.child("job_title").unwrap();
    assert_eq!(job_title.schema.default(), &Value::text("just this guy"));
    assert_eq!(job_title.label(), "Job title");
    assert!(!job_title.schema.is_required());

    let SchemaKind::Struct(page) = doc.get("page").unwrap().schema.kind() else {
        panic!("page should be a struct");
    };
    let title = &page.child("title").unwrap().schema;
    assert_eq!(title.help_text(), Some("The page title, shown in the browser tab."));
    assert!(matches!(
        title.kind(),
        SchemaKind::Leaf(Leaf::TextInput {
            max_length: Some(80)
        })
    ));
}

#[test]
fn integer_fields_carry_bounds() {
    let doc = parse("# rating: integer\n- min: 1\n- max: 5\n- default: 3\n");
    let rating = &doc.first().unwrap().schema;
    assert_eq!(rating.default(), &Value::Integer(3));
    let SchemaKind::Leaf(Leaf::Field(widget)) = rating.kind() else {
        panic!("integer should be a field leaf");
    };
    assert_eq!(widget.clean(&Value::Number(4.0)), Ok(Value::Integer(4)));
    assert_eq!(
        widget.clean(&Value::Number(9.0)),
        Err(vec!["Ensure this value is less than or equal to 5.".to_string()])
    );
}

#[test]
fn inline_list_child() {
    let doc = parse("# links: list\n## link: struct\n### url: text\n### title: text\n");
    let SchemaKind::List(links) = doc.first().unwrap().schema.kind() else {
        panic!("links should be a list");
    };
    assert_eq!(child_names(links.child().kind()), ["url", "title"]);
}

#[test]
fn list_of_leaf_kind() {
    let doc = parse("# tags: list of text\n- label: Tags\n");
    let tags = &doc.first().unwrap().schema;
    assert_eq!(tags.label(), Some("Tags"));
    let SchemaKind::List(list) = tags.kind() else {
        panic!("tags should be a list");
    };
    assert_eq!(list.child().kind_name(), "text");
}

#[test]
fn lookup_is_case_insensitive() {
    let doc = parse(SPEAKERS);
    assert_eq!(doc.get("Speaker").map(|d| d.name.as_str()), Some("speaker"));
    assert!(doc.get("missing").is_none());
}

#[test]
fn injected_ids_are_deterministic() {
    let ids = SequentialIds::starting_at(40);
    let doc = Parser::with_ids("# a: text\n\n# b: struct\n## c: chooser\n".to_string(), 0, &ids)
        .parse()
        .unwrap();
    let a = &doc.get("a").unwrap().schema;
    let b = &doc.get("b").unwrap().schema;
    assert_eq!(a.definition_prefix(), "blockdef-40");
    // children are built before their parent
    assert_eq!(b.definition_prefix(), "blockdef-42");
    assert_eq!(ids.peek(), 43);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn malformed_heading() {
    let messages = error_messages("# just words\n- required\n\n# ok: text\n");
    assert_eq!(messages, ["expected `name: kind` heading, found `just words`"]);
}

#[test]
fn invalid_block_name() {
    let messages = error_messages("# 2fast: text\n");
    assert_eq!(messages, ["invalid block name `2fast`"]);
}

#[test]
fn unknown_kind_and_forward_reference() {
    let messages = error_messages("# a: float\n\n# p: struct\n## s: later\n\n# later: text\n");
    assert_eq!(
        messages,
        [
            "unknown block kind or definition `float`",
            "unknown block kind or definition `later`",
        ]
    );
}

#[test]
fn list_of_container_is_rejected() {
    let messages = error_messages("# a: list of struct\n");
    assert_eq!(messages, ["`list of` takes a leaf kind or a definition name"]);
}

#[test]
fn duplicate_definition_points_at_first() {
    let source = "# a: text\n\n# a: chooser\n";
    let errors = Parser::new(source.to_string(), 0).parse().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "duplicate definition `a`");
    let (first, note) = errors[0].related.clone().unwrap();
    assert_eq!(&source[first], "# a: text");
    assert_eq!(note, "first defined here");
    assert_eq!(errors[0].to_diagnostic().labels.len(), 2);
}

#[test]
fn duplicate_child_name() {
    let messages = error_messages("# a: struct\n## x: text\n## x: chooser\n");
    assert_eq!(messages, ["duplicate child name `x` in `a`"]);
}

#[test]
fn children_on_leaf() {
    let messages = error_messages("# a: text\n## b: text\n");
    assert_eq!(messages, ["`a` cannot have child blocks"]);
}

#[test]
fn list_needs_one_child() {
    let messages = error_messages("# a: list\n## b: text\n## c: text\n");
    assert_eq!(messages, ["list `a` needs exactly one child block, found 2"]);
}

#[test]
fn option_errors_are_all_reported() {
    let messages = error_messages(
        "# a: text\n- colour: red\n- max_length: lots\n\n# b: struct\n- default: x\n## c: text\n",
    );
    assert_eq!(
        messages,
        [
            "unknown option `colour` for text block `a`",
            "option `max_length` expects an integer, found `lots`",
            "`default` is only supported on leaf blocks",
        ]
    );
}

#[test]
fn options_on_reference_are_rejected() {
    let messages = error_messages("# s: text\n\n# p: struct\n## t: s\n- required\n");
    assert_eq!(messages, ["option `required` cannot be applied to a reference"]);
}

#[test]
fn option_needs_value() {
    let messages = error_messages("# a: text\n- label\n");
    assert_eq!(messages, ["option `label` needs a value"]);
}
