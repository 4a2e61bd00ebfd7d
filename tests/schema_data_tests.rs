//! Schema-as-Data Tests
//!
//! Descriptions loaded from fixtures are reconstructed into field graphs
//! that validate exactly like the originals.

use familiar_scheme::describe::fieldtypes;
use familiar_scheme::format::format_for_path;
use familiar_scheme::{
    construct, reconstruct, register_fieldtype, visit, Field, FieldType, Fingerprint, Parameters, Phase,
    Schemas, SchemeError,
};
use serde_json::{json, Value};
use std::path::Path;

fn fixture(name: &str) -> Value {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    let content = std::fs::read_to_string(&path).unwrap();
    format_for_path(&path).unwrap().unserialize(&content).unwrap()
}

fn accepts(field: &Field, value: &Value) -> bool {
    match field.process(value.clone(), Phase::Inbound, false) {
        Ok(_) => true,
        Err(error) if !error.is_fault() => false,
        Err(fault) => panic!("Unexpected fault: {:?}", fault),
    }
}

// =============================================================================
// Reconstruction
// =============================================================================

#[test]
fn test_reconstructed_order_validates_like_the_description() {
    let order = reconstruct(fixture("order.json")).unwrap();

    let valid = json!({
        "id": 7,
        "customer": "ada",
        "items": [{"sku": "ABC-1", "quantity": 2}],
        "tags": {"gift": "yes"}
    });
    assert_eq!(
        order.process(valid.clone(), Phase::Inbound, false).unwrap(),
        json!({
            "id": 7,
            "customer": "ada",
            "items": [{"sku": "ABC-1", "quantity": 2}],
            "status": "pending",
            "tags": {"gift": "yes"}
        })
    );

    let error = order
        .process(
            json!({"id": 0, "customer": "ada", "items": [{"sku": "abc", "quantity": 0}], "status": "lost"}),
            Phase::Inbound,
            false,
        )
        .unwrap_err();
    let structural = error.structural().unwrap();
    assert_eq!(structural.child("id").unwrap().tokens(), vec!["minimum"]);
    assert_eq!(structural.child("status").unwrap().tokens(), vec!["invalid"]);
    let item = structural.child("items").unwrap().item(0).unwrap();
    assert_eq!(item.child("sku").unwrap().tokens(), vec!["pattern"]);
    assert_eq!(item.child("quantity").unwrap().tokens(), vec!["minimum"]);
}

#[test]
fn test_describe_then_reconstruct_accepts_the_same_values() {
    let samples = [
        json!({"kind": "circle", "radius": 1.5}),
        json!({"kind": "circle", "radius": -1.0}),
        json!({"kind": "rectangle", "size": [1.0, 2.0], "label": "r"}),
        json!({"kind": "rectangle", "size": [1.0]}),
        json!({"kind": "triangle"}),
        json!({"radius": 1.0}),
        json!([]),
    ];

    let original = reconstruct(fixture("shapes.json")).unwrap();
    let rebuilt = reconstruct(original.describe(None, false).unwrap()).unwrap();
    for sample in &samples {
        assert_eq!(accepts(&original, sample), accepts(&rebuilt, sample), "sample {}", sample);
    }
    assert!(accepts(&rebuilt, &samples[0]));
    assert!(!accepts(&rebuilt, &samples[1]));
}

#[test]
fn test_extension_attributes_survive_description() {
    let order = reconstruct(fixture("order.json")).unwrap();
    let description = order.describe(None, false).unwrap();
    assert_eq!(description["structure"]["tags"]["public"], json!(true));

    let public = order
        .filter(false, &json!({"public": false}).as_object().cloned().unwrap())
        .unwrap()
        .unwrap();
    assert!(public.as_structure().unwrap().get("tags").is_none());
}

#[test]
fn test_describe_parameters_are_merged() {
    let field = Field::integer().with_attribute("unit", json!("cm"));
    let parameters = json!({"unit": null, "origin": "test"}).as_object().cloned().unwrap();
    assert_eq!(
        field.describe(Some(&parameters), false).unwrap(),
        json!({"fieldtype": "integer", "unit": "cm", "origin": "test"})
    );
}

#[test]
fn test_fingerprint_verifies_transmitted_schema() {
    let order = reconstruct(fixture("order.json")).unwrap();
    let fingerprint = Fingerprint::of_field(&order).unwrap();

    let transmitted = serde_json::to_string(&order.describe(None, false).unwrap()).unwrap();
    let received = reconstruct(serde_json::from_str::<Value>(&transmitted).unwrap()).unwrap();
    assert!(fingerprint.verify(&received).unwrap());

    let altered = received.remove(&["tags"]).unwrap();
    assert!(!fingerprint.verify(&altered).unwrap());
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_custom_fieldtype() {
    let registered = register_fieldtype(FieldType::new("percentage", |params: &mut Parameters| {
        let field = Field::float().with_preprocessor(|value| match value.as_f64() {
            Some(n) if (0.0..=100.0).contains(&n) => Ok(value),
            _ => Err("out of range".to_string()),
        });
        params.remove("precision");
        Ok(field)
    }));
    assert!(registered);
    assert!(fieldtypes().iter().any(|name| name == "percentage"));

    let field = construct("percentage", Parameters::new()).unwrap();
    assert!(accepts(&field, &json!(50.0)));
    assert!(!accepts(&field, &json!(150.0)));

    let nested = reconstruct(json!({
        "fieldtype": "structure",
        "structure": {"score": {"fieldtype": "percentage", "precision": 2}}
    }))
    .unwrap();
    assert!(accepts(&nested, &json!({"score": 12.5})));
    assert!(!accepts(&nested, &json!({"score": -1.0})));
}

#[test]
fn test_unknown_fieldtype() {
    assert!(matches!(
        reconstruct(json!({"fieldtype": "structure", "structure": {"a": {"fieldtype": "mystery"}}})),
        Err(SchemeError::UnknownFieldType(name)) if name == "mystery"
    ));
}

#[test]
fn test_visit_polymorphic_description() {
    let description = fixture("shapes.json");
    let mut fieldtypes = Vec::new();
    visit(&description, &mut |nested| {
        fieldtypes.push(nested["fieldtype"].as_str().unwrap_or_default().to_string());
        Ok(nested.clone())
    })
    .unwrap();
    fieldtypes.sort();
    assert_eq!(fieldtypes, ["enumeration", "float", "text", "text", "tuple"]);
}

// =============================================================================
// Schema Sets
// =============================================================================

#[test]
fn test_schema_set_reconstruction() {
    let schemas = Schemas::reconstruct(&fixture("tree_set.json")).unwrap();
    assert_eq!(schemas.len(), 3);
    assert!(schemas.is_recursive("node"));
    assert!(schemas.is_recursive("note"));
    assert!(!schemas.is_recursive("forest"));
    assert_eq!(schemas.dependencies("node"), vec!["node", "note"]);

    let forest = schemas.get("forest").unwrap();
    let value = json!([
        {"value": 1, "children": [{"value": 2}], "annotation": {"text": "root", "replies": [{"text": "ok"}]}}
    ]);
    assert_eq!(forest.process(value.clone(), Phase::Inbound, false).unwrap(), value);

    let error = forest
        .process(json!([{"value": 1, "annotation": {"replies": [{}]}}]), Phase::Inbound, false)
        .unwrap_err();
    let annotation = error.structural().unwrap().item(0).unwrap().child("annotation").unwrap();
    assert_eq!(annotation.child("text").unwrap().tokens(), vec!["required"]);
    let reply = annotation.child("replies").unwrap().item(0).unwrap();
    assert_eq!(reply.child("text").unwrap().tokens(), vec!["required"]);
}
