//! Edge case tests for entity extraction and CSV export.
//!
//! These drive the public library API end to end: XML in, records or CSV out.

use entity_export::{
    extract_entity, parse_entity, write_entity_csv, EntityDef, EntityError, EntityRecord,
    EntityRow, FieldDescriptor, FieldEvent, FieldStream, PropertyDescriptor,
};
use std::collections::BTreeMap;

fn entity_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::structure("entity", "/meta/entity"),
        FieldDescriptor::new("id", "/meta/entity/id"),
        FieldDescriptor::new("label", "/meta/entity/label"),
        FieldDescriptor::new("first_name", "/first_name").with_property("first_name"),
        FieldDescriptor::new("age", "/details/age").with_property("age"),
        FieldDescriptor::new("color", "/details/color").with_property("favorite_color"),
    ]
}

fn parse(xml: &str) -> EntityRecord {
    parse_entity(&entity_fields(), xml.as_bytes()).unwrap()
}

fn export(properties: &[&str], rows: Vec<EntityRow>) -> String {
    let properties: Vec<PropertyDescriptor> =
        properties.iter().map(|p| PropertyDescriptor::new(*p)).collect();
    let mut output = Vec::new();
    write_entity_csv(&properties, rows.into_iter().map(Ok::<_, EntityError>), &mut output).unwrap();
    String::from_utf8(output).unwrap()
}

fn row(uuid: &str, label: &str, data: &[(&str, &str)]) -> EntityRow {
    EntityRow {
        uuid: uuid.to_string(),
        label: label.to_string(),
        def: EntityDef {
            data: data
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        },
    }
}

// ==================== EXTRACTION ====================

#[test]
fn test_full_submission() {
    let entity = parse(
        r#"<data xmlns:entities="http://www.opendatakit.org/xforms">
  <first_name>Alice</first_name>
  <details><age>42</age><color>blue</color></details>
  <meta>
    <instanceID>uuid:instance</instanceID>
    <entity entities:dataset="people">
      <id>uuid:abc</id>
      <label>Alice</label>
    </entity>
  </meta>
</data>"#,
    );

    assert_eq!(entity.system().dataset.as_deref(), Some("people"));
    assert_eq!(entity.system().id.as_deref(), Some("uuid:abc"));
    assert_eq!(entity.system().label.as_deref(), Some("Alice"));

    let expected: BTreeMap<String, String> = [
        ("first_name", "Alice"),
        ("age", "42"),
        ("favorite_color", "blue"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(entity.data(), &expected);
}

#[test]
fn test_data_keys_match_mapped_fields_only() {
    let entity = parse(
        r#"<data><first_name>A</first_name><last_name>B</last_name><details><age>1</age></details></data>"#,
    );

    let keys: Vec<&str> = entity.data().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["age", "first_name"]);
}

#[test]
fn test_dataset_unprefixed_wins_over_namespaced() {
    let entity = parse(
        r#"<data><meta><entity entities:dataset="d2" dataset="d1"><label>x</label></entity></meta></data>"#,
    );
    assert_eq!(entity.system().dataset.as_deref(), Some("d1"));
}

#[test]
fn test_dataset_namespaced_only() {
    let entity = parse(r#"<data><meta><entity entities:dataset="d2"/></meta></data>"#);
    assert_eq!(entity.system().dataset.as_deref(), Some("d2"));
}

#[test]
fn test_entity_without_attributes_has_no_dataset() {
    let entity = parse(r#"<data><meta><entity><label>x</label></entity></meta></data>"#);

    assert_eq!(entity.system().dataset, None);
    assert_eq!(entity.system().label.as_deref(), Some("x"));
    assert!(entity.system().extra.is_empty());
}

#[test]
fn test_repeated_field_last_write_wins() {
    let entity = parse(
        r#"<data><first_name>First</first_name><first_name>Second</first_name></data>"#,
    );
    assert_eq!(
        entity.data().get("first_name").map(String::as_str),
        Some("Second")
    );
}

#[test]
fn test_no_entity_block() {
    let entity = parse(r#"<data><first_name>A</first_name></data>"#);

    assert_eq!(entity.system().dataset, None);
    assert_eq!(entity.system().id, None);
    assert_eq!(entity.data().len(), 1);
}

#[test]
fn test_parse_is_deterministic() {
    let xml = r#"<data><details><color>red</color></details><meta><entity dataset="p"><id>1</id></entity></meta></data>"#;
    assert_eq!(parse(xml), parse(xml));
}

#[test]
fn test_malformed_xml_yields_no_entity() {
    let result = parse_entity(
        &entity_fields(),
        "<data><first_name>A</details></data>".as_bytes(),
    );
    assert!(result.is_err());
}

#[test]
fn test_truncated_xml_yields_no_entity() {
    let result = parse_entity(&entity_fields(), "<data><first_name>A".as_bytes());
    assert!(matches!(result, Err(EntityError::MalformedXml { .. })));
}

#[test]
fn test_extract_from_field_stream_without_structural_nodes() {
    let fields = entity_fields();
    let xml = r#"<data><meta><entity dataset="people"><label>x</label></entity></meta></data>"#;

    let entity = extract_entity(FieldStream::new(&fields, xml.as_bytes(), false)).unwrap();
    assert_eq!(entity.system().dataset, None);
    assert_eq!(entity.system().label.as_deref(), Some("x"));
}

#[test]
fn test_extract_from_synthetic_events() {
    let mut entity_field = FieldDescriptor::structure("entity", "/meta/entity");
    entity_field
        .attrs
        .insert("dataset".to_string(), "trees".to_string());

    let events: Vec<Result<FieldEvent, EntityError>> = vec![
        Ok(FieldEvent {
            field: entity_field,
            text: String::new(),
        }),
        Ok(FieldEvent {
            field: FieldDescriptor::new("id", "/meta/entity/id"),
            text: "t-1".to_string(),
        }),
    ];

    let entity = extract_entity(events).unwrap();
    assert_eq!(entity.system().dataset.as_deref(), Some("trees"));
    assert_eq!(entity.system().id.as_deref(), Some("t-1"));
}

// ==================== EXPORT ====================

#[test]
fn test_export_no_properties_no_entities() {
    assert_eq!(export(&[], vec![]), "name,label\n");
}

#[test]
fn test_export_two_entities() {
    let output = export(
        &["x"],
        vec![row("a", "L1", &[("x", "1")]), row("b", "L2", &[("x", "2")])],
    );
    assert_eq!(output, "name,label,x\na,L1,1\nb,L2,2\n");
}

#[test]
fn test_export_header_only_with_properties() {
    assert_eq!(export(&["x", "y"], vec![]), "name,label,x,y\n");
}

#[test]
fn test_export_missing_property_keeps_row_width() {
    let output = export(&["x", "y", "z"], vec![row("a", "L", &[("y", "2")])]);
    assert_eq!(output, "name,label,x,y,z\na,L,,2,\n");
}

#[test]
fn test_export_ignores_unlisted_properties() {
    let output = export(&["x"], vec![row("a", "L", &[("x", "1"), ("secret", "s")])]);
    assert_eq!(output, "name,label,x\na,L,1\n");
}

#[test]
fn test_export_preserves_input_order() {
    let rows: Vec<EntityRow> = (0..50)
        .rev()
        .map(|i| row(&format!("e{}", i), "L", &[]))
        .collect();
    let output = export(&[], rows);

    let names: Vec<&str> = output
        .lines()
        .skip(1)
        .map(|l| l.split(',').next().unwrap())
        .collect();
    let expected: Vec<String> = (0..50).rev().map(|i| format!("e{}", i)).collect();
    assert_eq!(names, expected);
}

#[test]
fn test_export_unicode_and_quotes() {
    let output = export(&["note"], vec![row("a", "Zoë", &[("note", "5\" tall")])]);
    assert_eq!(output, "name,label,note\na,Zoë,\"5\"\" tall\"\n");
}

// ==================== END TO END ====================

#[test]
fn test_submissions_to_csv() {
    let fields = entity_fields();
    let submissions = [
        r#"<data><first_name>Alice</first_name><details><age>42</age></details>
           <meta><entity dataset="people"><id>uuid:a</id><label>Alice</label></entity></meta></data>"#,
        r#"<data><first_name>Bob</first_name>
           <meta><entity dataset="people"><id>b</id><label>Bob</label></entity></meta></data>"#,
    ];

    let rows = submissions
        .iter()
        .map(|xml| parse_entity(&fields, xml.as_bytes())?.into_row());
    let properties = vec![
        PropertyDescriptor::new("first_name"),
        PropertyDescriptor::new("age"),
    ];

    let mut output = Vec::new();
    let written = write_entity_csv(&properties, rows, &mut output).unwrap();

    assert_eq!(written, 2);
    assert_eq!(
        String::from_utf8(output).unwrap(),
        "name,label,first_name,age\na,Alice,Alice,42\nb,Bob,Bob,\n"
    );
}

#[test]
fn test_submission_without_id_stops_export() {
    let fields = entity_fields();
    let submissions = [
        r#"<data><meta><entity dataset="p"><id>a</id><label>A</label></entity></meta></data>"#,
        r#"<data><meta><entity dataset="p"><label>B</label></entity></meta></data>"#,
        r#"<data><meta><entity dataset="p"><id>c</id><label>C</label></entity></meta></data>"#,
    ];

    let rows = submissions
        .iter()
        .map(|xml| parse_entity(&fields, xml.as_bytes())?.into_row());

    let mut output = Vec::new();
    let result = write_entity_csv(&[], rows, &mut output);

    assert!(matches!(
        result,
        Err(EntityError::MissingField { field: "id" })
    ));
    assert_eq!(String::from_utf8(output).unwrap(), "name,label\na,A\n");
}
