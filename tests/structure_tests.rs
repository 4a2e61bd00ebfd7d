//! Structure Processing Tests
//!
//! Keyed and polymorphic structures: error accumulation, strictness,
//! variant dispatch, partial processing and round trips.

use familiar_scheme::{
    Field, Map, Phase, ProcessOptions, SchemeError, Sequence, StructuralError, Structure, Substructure, Text,
    Tuple, Union,
};
use serde_json::{json, Value};

fn pair() -> Field {
    Structure::builder()
        .field("a", Field::integer().required())
        .field("b", Field::text().required())
        .build()
        .unwrap()
}

fn shapes() -> Field {
    Structure::builder()
        .polymorphic_on("type")
        .variant("alpha", [("a", Field::integer())])
        .variant("beta", [("b", Field::integer())])
        .build()
        .unwrap()
}

fn structural(error: SchemeError) -> StructuralError {
    match error.into_structural() {
        Ok(structural) => structural,
        Err(fault) => panic!("Expected a validation failure, got {:?}", fault),
    }
}

// =============================================================================
// Error Accumulation
// =============================================================================

#[test]
fn test_every_missing_key_is_reported() {
    let error = structural(pair().process(json!({}), Phase::Inbound, false).unwrap_err());
    match error.structure() {
        Some(Substructure::Mapping(entries)) => {
            assert_eq!(entries.len(), 2);
            for key in ["a", "b"] {
                assert_eq!(entries[key].as_error().unwrap().tokens(), vec!["required"]);
            }
        }
        other => panic!("Expected a keyed substructure, got {:?}", other),
    }
}

#[test]
fn test_error_wire_form() {
    let error = structural(pair().process(json!({"a": 1}), Phase::Inbound, false).unwrap_err());
    assert_eq!(
        error.serialize(),
        &json!([null, {"b": [[{
            "token": "required",
            "title": "required field",
            "message": "(field) is missing required field 'b'",
            "name": "b"
        }], null]}])
    );

    let restored = StructuralError::unserialize(error.serialize());
    assert_eq!(restored, error);
    assert_eq!(restored.child("b").unwrap().tokens(), vec!["required"]);
}

#[test]
fn test_nested_errors_carry_locations() {
    let field = Structure::builder()
        .field("items", Sequence::new(pair()))
        .build()
        .unwrap()
        .named("order");
    let error = structural(
        field
            .process(json!({"items": [{"a": 1, "b": "x"}, {"a": "bad", "b": "y"}]}), Phase::Inbound, false)
            .unwrap_err(),
    );
    let flattened = error.flatten();
    assert_eq!(flattened.len(), 1);
    assert_eq!(flattened[0].0, ".items[1].a");
    assert_eq!(flattened[0].1.message.as_deref(), Some("order.items[1].a has an invalid value"));
}

// =============================================================================
// Strictness and Partial Processing
// =============================================================================

#[test]
fn test_strict_rejects_unknown_keys() {
    let strict = Structure::builder().field("a", Field::integer()).build().unwrap();
    let error = structural(strict.process(json!({"a": 1, "z": true}), Phase::Inbound, false).unwrap_err());
    assert_eq!(error.child("z").unwrap().tokens(), vec!["unknown"]);
    assert!(error.child("a").is_none());

    let lenient = Structure::builder().field("a", Field::integer()).strict(false).build().unwrap();
    assert_eq!(
        lenient.process(json!({"a": 1, "z": true}), Phase::Inbound, false).unwrap(),
        json!({"a": 1})
    );
}

#[test]
fn test_partial_skips_missing_required_keys() {
    let options = ProcessOptions::inbound().partial(true);
    assert_eq!(pair().process_with(json!({"a": 2}), &options).unwrap(), json!({"a": 2}));

    let error = pair().process_with(json!({"a": "x"}), &options).unwrap_err();
    assert_eq!(structural(error).child("a").unwrap().tokens(), vec!["invalid"]);
}

#[test]
fn test_partial_applies_to_top_level_only() {
    let field = Structure::builder().field("inner", pair().required()).build().unwrap();
    let options = ProcessOptions::inbound().partial(true);
    let error = structural(field.process_with(json!({"inner": {"a": 1}}), &options).unwrap_err());
    let inner = error.child("inner").unwrap();
    assert_eq!(inner.child("b").unwrap().tokens(), vec!["required"]);
}

#[test]
fn test_non_mapping_is_invalid() {
    for value in [json!([1]), json!("a"), json!(1)] {
        let error = structural(pair().process(value, Phase::Inbound, false).unwrap_err());
        assert_eq!(error.tokens(), vec!["invalid"]);
    }
    assert_eq!(pair().process(Value::Null, Phase::Inbound, false).unwrap(), Value::Null);
}

// =============================================================================
// Polymorphism
// =============================================================================

#[test]
fn test_polymorphic_dispatch() {
    let field = shapes();
    assert_eq!(
        field.process(json!({"type": "alpha", "a": 1}), Phase::Inbound, false).unwrap(),
        json!({"type": "alpha", "a": 1})
    );
    assert_eq!(
        field.process(json!({"type": "beta", "b": 2}), Phase::Outbound, true).unwrap(),
        json!({"type": "beta", "b": 2})
    );

    let error = structural(field.process(json!({"type": "gamma"}), Phase::Inbound, false).unwrap_err());
    assert_eq!(error.tokens(), vec!["unrecognized"]);
}

#[test]
fn test_variant_fields_do_not_leak() {
    let error = structural(shapes().process(json!({"type": "alpha", "b": 1}), Phase::Inbound, false).unwrap_err());
    assert_eq!(error.child("b").unwrap().tokens(), vec!["unknown"]);
}

#[test]
fn test_discriminator_with_common_fields() {
    let field = Structure::builder()
        .polymorphic_on("kind")
        .common([("id", Field::integer().required())])
        .variant("note", [("text", Text::new().min_length(1))])
        .variant("link", [("url", Field::text().required())])
        .build()
        .unwrap();

    assert!(field.process(json!({"kind": "note", "id": 1, "text": "hi"}), Phase::Inbound, false).is_ok());
    let error = structural(field.process(json!({"kind": "link", "url": "x"}), Phase::Inbound, false).unwrap_err());
    assert_eq!(error.child("id").unwrap().tokens(), vec!["required"]);

    let error = structural(field.process(json!({"id": 1}), Phase::Inbound, false).unwrap_err());
    assert_eq!(error.tokens(), vec!["required"]);
}

#[test]
fn test_integer_discriminator() {
    let field = Structure::builder()
        .polymorphic_on_field(Field::integer().named("version"))
        .variant("1", [("name", Field::text())])
        .variant("2", [("first", Field::text()), ("last", Field::text())])
        .build()
        .unwrap();

    assert_eq!(
        field.process(json!({"version": 2, "first": "a"}), Phase::Inbound, false).unwrap(),
        json!({"version": 2, "first": "a"})
    );
    assert_eq!(
        field.process(json!({"version": "1", "name": "a"}), Phase::Inbound, true).unwrap(),
        json!({"version": 1, "name": "a"})
    );
    let error = structural(field.process(json!({"version": 3}), Phase::Inbound, false).unwrap_err());
    assert_eq!(error.tokens(), vec!["unrecognized"]);
}

// =============================================================================
// Round Trips
// =============================================================================

#[test]
fn test_outbound_then_inbound_is_identity() {
    let cases: Vec<(Field, Value)> = vec![
        (pair(), json!({"a": 1, "b": "x"})),
        (shapes(), json!({"type": "beta", "b": 7})),
        (Sequence::new(Field::float()).into(), json!([1.5, 2.0])),
        (
            Structure::builder()
                .field("flag", Field::boolean())
                .field("tags", Sequence::new(Field::text()))
                .build()
                .unwrap(),
            json!({"flag": true, "tags": ["a", "b"]}),
        ),
        (Map::new(Field::text()).into(), json!({"a": "x", "b": "y"})),
        (
            Map::new(Field::float()).key(Field::integer()).into(),
            json!({"1": 2.5, "20": 0.5}),
        ),
        (
            Tuple::new([Field::integer(), Field::boolean(), Field::text()]).unwrap().into(),
            json!([1, false, "z"]),
        ),
        (
            Union::new([Field::boolean(), Field::integer(), Field::text()]).unwrap().into(),
            json!(5),
        ),
        (
            Structure::builder()
                .field("scores", Map::new(Sequence::new(Field::integer())).key(Field::text()))
                .field("pick", Union::new([Field::integer(), pair()]).unwrap())
                .build()
                .unwrap(),
            json!({"scores": {"x": [1, 2]}, "pick": {"a": 1, "b": "c"}}),
        ),
    ];

    for (field, value) in cases {
        let outbound = field.process(value.clone(), Phase::Outbound, true).unwrap();
        assert_eq!(field.process(outbound, Phase::Inbound, true).unwrap(), value);
    }
}

#[test]
fn test_defaults_fill_inbound_only() {
    let field = Structure::builder()
        .field("a", Field::integer().with_default(5))
        .field("b", Field::text().ignore_null())
        .build()
        .unwrap();
    assert_eq!(field.process(json!({"b": null}), Phase::Inbound, false).unwrap(), json!({"a": 5}));
    assert_eq!(field.process(json!({}), Phase::Outbound, false).unwrap(), json!({}));
}
