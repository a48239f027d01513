use inlook_dashboard::schema::FieldSchema;
use serde_json::json;

#[test]
fn registry_marker_wins_over_declared_type() {
    let schema = FieldSchema::from_value(&json!({
        "type": "string",
        "_inlook_check": { "_PluginRegistry": "EmailLoader" }
    }));
    assert_eq!(
        schema,
        FieldSchema::Registry {
            plugin_type: "EmailLoader".into()
        }
    );
}

#[test]
fn empty_or_non_string_registry_marker_is_ignored() {
    let empty = FieldSchema::from_value(&json!({
        "type": "string",
        "_inlook_check": { "_PluginRegistry": "" }
    }));
    assert_eq!(empty, FieldSchema::String);

    let numeric = FieldSchema::from_value(&json!({
        "_inlook_check": { "_PluginRegistry": 3 }
    }));
    assert_eq!(numeric, FieldSchema::Unknown);
}

#[test]
fn array_requires_items_and_reads_name_and_options() {
    assert_eq!(
        FieldSchema::from_value(&json!({ "type": "array" })),
        FieldSchema::Unknown
    );

    let schema = FieldSchema::from_value(&json!({
        "type": "array",
        "items": {
            "properties": {
                "name": { "type": "string" },
                "options": { "type": "object", "properties": { "path": { "type": "string" } } }
            }
        }
    }));
    let FieldSchema::Array { name, options } = schema else {
        panic!("expected array schema");
    };
    assert_eq!(*name, FieldSchema::String);
    let options = options.expect("options schema");
    assert_eq!(options.properties().map(|p| p.len()), Some(1));
}

#[test]
fn array_items_without_name_render_name_as_unknown() {
    let schema = FieldSchema::from_value(&json!({ "type": "array", "items": {} }));
    assert_eq!(
        schema,
        FieldSchema::Array {
            name: Box::new(FieldSchema::Unknown),
            options: None
        }
    );
}

#[test]
fn object_properties_keep_declaration_order() {
    let schema = FieldSchema::from_value(&json!({
        "type": "object",
        "properties": {
            "zeta": { "type": "string" },
            "alpha": { "type": "string" },
            "mid": { "type": "boolean" }
        }
    }));
    let keys: Vec<&str> = schema
        .properties()
        .expect("object")
        .iter()
        .map(|(k, _)| k.as_str())
        .collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    assert_eq!(schema.properties().unwrap()[2].1, FieldSchema::Unknown);
}

#[test]
fn object_without_properties_and_odd_shapes_are_unknown() {
    for v in [
        json!({ "type": "object" }),
        json!({ "type": "integer" }),
        json!("string"),
        json!(null),
        json!([1, 2]),
    ] {
        assert_eq!(FieldSchema::from_value(&v), FieldSchema::Unknown, "{v}");
    }
}

#[test]
fn root_schema_only_needs_properties() {
    let root = FieldSchema::from_root_value(&json!({
        "properties": { "name": { "type": "string" } }
    }));
    assert_eq!(root.kind(), "object");
    assert_eq!(root.properties().unwrap()[0].0, "name");
}
