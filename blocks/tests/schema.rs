use std::collections::HashSet;
use std::sync::Arc;

use blocks::schema::{compose_children, label_from_name};
use blocks::{BlockOptions, FormData, Media, SchemaBuilder, SchemaError, SchemaKind, Value};

fn child_names(kind: &SchemaKind) -> Vec<&str> {
    match kind {
        SchemaKind::Struct(s) => s.children().iter().map(|c| c.name.as_str()).collect(),
        _ => Vec::new(),
    }
}

#[test]
fn duplicate_child_names_fail_construction() {
    let b = SchemaBuilder::new();
    let err = b
        .structure(
            [
                ("a", b.text_input(BlockOptions::new())),
                ("a", b.chooser(BlockOptions::new())),
            ],
            BlockOptions::new(),
        )
        .unwrap_err();
    assert_eq!(
        err,
        SchemaError::DuplicateChildName {
            name: "a".to_string()
        }
    );
}

#[test]
fn variant_defaults() {
    let b = SchemaBuilder::new();
    let text = b.text_input(BlockOptions::new());
    assert_eq!(text.default(), &Value::text(""));
    assert_eq!(
        b.list(Arc::clone(&text), BlockOptions::new()).default(),
        &Value::List(Vec::new())
    );
    assert_eq!(
        b.structure([("t", text)], BlockOptions::new()).unwrap().default(),
        &Value::empty_map()
    );
}

#[test]
fn labels_derive_from_names() {
    assert_eq!(label_from_name("job_title"), "Job title");
    assert_eq!(label_from_name("URL"), "Url");
    assert_eq!(label_from_name(""), "");
    let b = SchemaBuilder::new();
    assert_eq!(b.text_input(BlockOptions::new()).label_for(None), None);
}

#[test]
fn compose_children_overlays_base() {
    let b = SchemaBuilder::new();
    let base = b
        .structure(
            [
                ("a", b.text_input(BlockOptions::new())),
                ("b", b.text_input(BlockOptions::new())),
                ("c", b.text_input(BlockOptions::new())),
            ],
            BlockOptions::new(),
        )
        .unwrap();
    let SchemaKind::Struct(base) = base.kind() else {
        panic!("base should be a struct");
    };
    let chooser = b.chooser(BlockOptions::new());
    let composed = compose_children(
        base.children(),
        [
            ("b".to_string(), Some(Arc::clone(&chooser))),
            ("c".to_string(), None),
            ("d".to_string(), Some(b.text_input(BlockOptions::new()))),
        ],
    );
    let names: Vec<&str> = composed.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["a", "b", "d"]);
    assert!(Arc::ptr_eq(&composed[1].1, &chooser));

    let derived = b.structure(composed, BlockOptions::new()).unwrap();
    assert_eq!(child_names(derived.kind()), ["a", "b", "d"]);
}

#[test]
fn process_ids_are_unique_across_threads() {
    let ids: Vec<u64> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    let b = SchemaBuilder::new();
                    (0..100)
                        .map(|_| b.text_input(BlockOptions::new()).id().0)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });
    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), 800);
}

// ---------------------------------------------------------------------------
// Support types
// ---------------------------------------------------------------------------

#[test]
fn form_data_prefix_lookup() {
    let data = FormData::from_pairs([("p-0-value", "x"), ("p-10", "y"), ("q", "z")]);
    assert!(data.has_prefix("p-0-value"));
    assert!(!data.has_prefix("p-1"));
    assert!(data.has_prefix("p-10"));
    assert!(!data.has_prefix("p-1-value"));
    assert!(!data.has_prefix("p-0-val"));
    assert_eq!(data.text("q"), Some("z"));
}

#[test]
fn media_keeps_first_occurrence() {
    let mut media = Media::scripts(["a.js", "b.js"]);
    media.extend(Media::scripts(["b.js", "c.js", "a.js"]));
    let paths: Vec<&str> = media.assets().iter().map(|a| a.path()).collect();
    assert_eq!(paths, ["a.js", "b.js", "c.js"]);
}

#[test]
fn value_display_is_json_like() {
    let value = Value::map([
        ("tags", Value::List(vec![Value::text("x"), Value::Number(2.0)])),
        ("name", Value::Null),
        ("id", Value::Integer(9_007_199_254_740_993)),
    ]);
    assert_eq!(
        value.to_string(),
        r#"{"id": 9007199254740993, "name": null, "tags": ["x", 2]}"#
    );
}
