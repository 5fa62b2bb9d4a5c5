//! Schema-side generation scenarios plus the universal "emitted JSON parses as valid Avro"
//! property.

use ksql_entities::avro::AvroSchemaBuilder;
use ksql_entities::entity::descriptor::{EntityDescriptor, KeyOrderEntry, PropertyDef, TopicBinding, ValidationState};
use ksql_entities::entity::{DefaultValue, PropertyType};

fn descriptor(
    entity_type_id: &'static str,
    properties: Vec<PropertyDef>,
    key_order: Vec<KeyOrderEntry>,
) -> EntityDescriptor {
    EntityDescriptor {
        entity_type_id,
        type_namespace: "Trading",
        topic_binding: TopicBinding::synthesized("test-trades"),
        properties,
        key_order,
        validation_state: ValidationState {
            is_valid: true,
            warnings: Vec::new(),
        },
        auto_completed_settings: Vec::new(),
    }
}

#[test]
fn single_string_key_produces_primitive_string_schema() {
    let descriptor = descriptor(
        "Trade",
        vec![PropertyDef::new("TradeId", PropertyType::String)],
        vec![KeyOrderEntry::new("TradeId", 0)],
    );

    let (key_text, _value_text, _stats) = AvroSchemaBuilder::generate(&descriptor).unwrap();
    assert_eq!(key_text, "\"string\"");
}

#[test]
fn composite_key_produces_ordered_record() {
    let descriptor = descriptor(
        "Trade",
        vec![
            PropertyDef::new("Exchange", PropertyType::String),
            PropertyDef::new("TradeId", PropertyType::Int64),
        ],
        vec![
            KeyOrderEntry::new("TradeId", 1),
            KeyOrderEntry::new("Exchange", 0),
        ],
    );

    let (key_text, _value_text, _stats) = AvroSchemaBuilder::generate(&descriptor).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&key_text).unwrap();
    assert_eq!(parsed["type"], "record");
    assert_eq!(parsed["name"], "CompositeKey");
    let fields = parsed["fields"].as_array().unwrap();
    assert_eq!(fields[0]["name"], "Exchange");
    assert_eq!(fields[1]["name"], "TradeId");
}

#[test]
fn nullable_decimal_emits_null_union_with_precision_and_scale() {
    let decimal_prop = PropertyDef::new("NotionalValue", PropertyType::Decimal(Some((10, 2))))
        .nullable();
    let descriptor = descriptor(
        "Trade",
        vec![
            PropertyDef::new("TradeId", PropertyType::String),
            decimal_prop,
        ],
        vec![KeyOrderEntry::new("TradeId", 0)],
    );

    let (_key_text, value_text, _stats) = AvroSchemaBuilder::generate(&descriptor).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&value_text).unwrap();
    let fields = parsed["fields"].as_array().unwrap();
    let notional = fields
        .iter()
        .find(|f| f["name"] == "NotionalValue")
        .unwrap();
    let union = notional["type"].as_array().unwrap();
    assert_eq!(union[0], "null");
    assert_eq!(union[1]["type"], "bytes");
    assert_eq!(union[1]["logicalType"], "decimal");
    assert_eq!(union[1]["precision"], 10);
    assert_eq!(union[1]["scale"], 2);
}

#[test]
fn unannotated_decimal_defaults_to_precision_18_scale_4() {
    let descriptor = descriptor(
        "Trade",
        vec![
            PropertyDef::new("TradeId", PropertyType::String),
            PropertyDef::new("Notional", PropertyType::Decimal(None)),
        ],
        vec![KeyOrderEntry::new("TradeId", 0)],
    );

    let (_key_text, value_text, _stats) = AvroSchemaBuilder::generate(&descriptor).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&value_text).unwrap();
    let fields = parsed["fields"].as_array().unwrap();
    let notional = fields.iter().find(|f| f["name"] == "Notional").unwrap();
    assert_eq!(notional["type"]["precision"], 18);
    assert_eq!(notional["type"]["scale"], 4);
}

#[test]
fn ignored_properties_are_excluded_from_the_value_schema() {
    let descriptor = descriptor(
        "Trade",
        vec![
            PropertyDef::new("TradeId", PropertyType::String),
            PropertyDef::new("InternalScratch", PropertyType::String).ignored(),
        ],
        vec![KeyOrderEntry::new("TradeId", 0)],
    );

    let (_key_text, value_text, stats) = AvroSchemaBuilder::generate(&descriptor).unwrap();
    assert_eq!(stats.ignored, vec!["InternalScratch".to_owned()]);
    assert!(!value_text.contains("InternalScratch"));
}

#[test]
fn zero_key_properties_produce_primitive_string_key() {
    let descriptor = descriptor(
        "Trade",
        vec![PropertyDef::new("TradeId", PropertyType::String)],
        vec![],
    );
    let (key_text, _value_text, _stats) = AvroSchemaBuilder::generate(&descriptor).unwrap();
    assert_eq!(key_text, "\"string\"");
}

#[test]
fn default_value_must_unify_with_declared_type() {
    assert!(DefaultValue::Bool(true).unifies_with(PropertyType::Bool));
    assert!(!DefaultValue::Bool(true).unifies_with(PropertyType::Int32));
    assert!(DefaultValue::Null.unifies_with(PropertyType::String));
}

#[test]
fn fingerprint_is_stable_for_identical_text_and_differs_for_different_text() {
    let a = ksql_entities::avro::fingerprint("\"string\"");
    let b = ksql_entities::avro::fingerprint("\"string\"");
    let c = ksql_entities::avro::fingerprint("\"long\"");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn schema_records_use_canonical_subject_names() {
    let descriptor = descriptor(
        "Trade",
        vec![PropertyDef::new("TradeId", PropertyType::String)],
        vec![KeyOrderEntry::new("TradeId", 0)],
    );
    let (key_record, value_record) = AvroSchemaBuilder::generate_records(&descriptor).unwrap();
    assert_eq!(key_record.subject, "test-trades-key");
    assert_eq!(value_record.subject, "test-trades-value");
}
