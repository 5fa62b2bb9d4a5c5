//! Strict vs. relaxed registration and validation for `ModelBuilder::register` and `build`.

use ksql_entities::config::ValidationMode;
use ksql_entities::entity::builder::ModelBuilder;
use ksql_entities::entity::descriptor::{KeyOrderEntry, PropertyDef, TopicBinding};
use ksql_entities::entity::{DefaultValue, Entity, PropertyType};
use ksql_entities::error::Error;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct WellFormedTrade;

impl Entity for WellFormedTrade {
    const TYPE_ID: &'static str = "WellFormedTrade";
    const NAMESPACE: &'static str = "Trading";

    fn topic_binding() -> Option<TopicBinding> {
        Some(TopicBinding::synthesized("well-formed-trades"))
    }

    fn properties() -> Vec<PropertyDef> {
        vec![
            PropertyDef::new("TradeId", PropertyType::String),
            PropertyDef::new("Notional", PropertyType::Decimal(Some((10, 2)))),
        ]
    }

    fn key_order() -> Vec<KeyOrderEntry> {
        vec![KeyOrderEntry::new("TradeId", 0)]
    }
}

#[derive(Serialize, Deserialize)]
struct NoTopicTrade;

impl Entity for NoTopicTrade {
    const TYPE_ID: &'static str = "NoTopicTrade";
    const NAMESPACE: &'static str = "Trading";

    fn topic_binding() -> Option<TopicBinding> {
        None
    }

    fn properties() -> Vec<PropertyDef> {
        vec![PropertyDef::new("TradeId", PropertyType::String)]
    }

    fn key_order() -> Vec<KeyOrderEntry> {
        vec![KeyOrderEntry::new("TradeId", 0)]
    }
}

#[derive(Serialize, Deserialize)]
struct NoKeyTrade;

impl Entity for NoKeyTrade {
    const TYPE_ID: &'static str = "NoKeyTrade";
    const NAMESPACE: &'static str = "Trading";

    fn topic_binding() -> Option<TopicBinding> {
        Some(TopicBinding::synthesized("no-key-trades"))
    }

    fn properties() -> Vec<PropertyDef> {
        vec![PropertyDef::new("TradeId", PropertyType::String)]
    }

    fn key_order() -> Vec<KeyOrderEntry> {
        vec![]
    }
}

#[derive(Serialize, Deserialize)]
struct DuplicateKeyOrderTrade;

impl Entity for DuplicateKeyOrderTrade {
    const TYPE_ID: &'static str = "DuplicateKeyOrderTrade";
    const NAMESPACE: &'static str = "Trading";

    fn topic_binding() -> Option<TopicBinding> {
        Some(TopicBinding::synthesized("dup-key-order-trades"))
    }

    fn properties() -> Vec<PropertyDef> {
        vec![
            PropertyDef::new("Exchange", PropertyType::String),
            PropertyDef::new("TradeId", PropertyType::String),
        ]
    }

    fn key_order() -> Vec<KeyOrderEntry> {
        vec![
            KeyOrderEntry::new("Exchange", 0),
            KeyOrderEntry::new("TradeId", 0),
        ]
    }
}

#[derive(Serialize, Deserialize)]
struct UndeclaredKeyPropertyTrade;

impl Entity for UndeclaredKeyPropertyTrade {
    const TYPE_ID: &'static str = "UndeclaredKeyPropertyTrade";
    const NAMESPACE: &'static str = "Trading";

    fn topic_binding() -> Option<TopicBinding> {
        Some(TopicBinding::synthesized("undeclared-key-trades"))
    }

    fn properties() -> Vec<PropertyDef> {
        vec![PropertyDef::new("TradeId", PropertyType::String)]
    }

    fn key_order() -> Vec<KeyOrderEntry> {
        vec![KeyOrderEntry::new("DoesNotExist", 0)]
    }
}

#[derive(Serialize, Deserialize)]
struct MaxLengthOnNonStringTrade;

impl Entity for MaxLengthOnNonStringTrade {
    const TYPE_ID: &'static str = "MaxLengthOnNonStringTrade";
    const NAMESPACE: &'static str = "Trading";

    fn topic_binding() -> Option<TopicBinding> {
        Some(TopicBinding::synthesized("max-length-trades"))
    }

    fn properties() -> Vec<PropertyDef> {
        vec![
            PropertyDef::new("TradeId", PropertyType::String),
            PropertyDef::new("Notional", PropertyType::Float64).with_max_length(32),
        ]
    }

    fn key_order() -> Vec<KeyOrderEntry> {
        vec![KeyOrderEntry::new("TradeId", 0)]
    }
}

#[derive(Serialize, Deserialize)]
struct MismatchedDefaultTrade;

impl Entity for MismatchedDefaultTrade {
    const TYPE_ID: &'static str = "MismatchedDefaultTrade";
    const NAMESPACE: &'static str = "Trading";

    fn topic_binding() -> Option<TopicBinding> {
        Some(TopicBinding::synthesized("mismatched-default-trades"))
    }

    fn properties() -> Vec<PropertyDef> {
        vec![
            PropertyDef::new("TradeId", PropertyType::String),
            PropertyDef::new("IsCancelled", PropertyType::Bool)
                .with_default(DefaultValue::String("nope".into())),
        ]
    }

    fn key_order() -> Vec<KeyOrderEntry> {
        vec![KeyOrderEntry::new("TradeId", 0)]
    }
}

#[derive(Serialize, Deserialize)]
struct NonNullableNullDefaultTrade;

impl Entity for NonNullableNullDefaultTrade {
    const TYPE_ID: &'static str = "NonNullableNullDefaultTrade";
    const NAMESPACE: &'static str = "Trading";

    fn topic_binding() -> Option<TopicBinding> {
        Some(TopicBinding::synthesized("non-nullable-null-default-trades"))
    }

    fn properties() -> Vec<PropertyDef> {
        vec![
            PropertyDef::new("TradeId", PropertyType::String),
            PropertyDef::new("Notional", PropertyType::Float64).with_default(DefaultValue::Null),
        ]
    }

    fn key_order() -> Vec<KeyOrderEntry> {
        vec![KeyOrderEntry::new("TradeId", 0)]
    }
}

#[test]
fn well_formed_entity_registers_and_builds_in_either_mode() {
    for mode in [ValidationMode::Strict, ValidationMode::Relaxed] {
        let mut builder = ModelBuilder::new(mode);
        builder.register::<WellFormedTrade>().unwrap();
        let registry = builder.build().unwrap();
        let descriptor = registry.descriptor_for::<WellFormedTrade>().unwrap();
        assert!(descriptor.is_valid());
        assert_eq!(descriptor.key_properties().len(), 1);
    }
}

#[test]
fn duplicate_registration_is_rejected_immediately() {
    let mut builder = ModelBuilder::new(ValidationMode::Relaxed);
    builder.register::<WellFormedTrade>().unwrap();
    let second = builder.register::<WellFormedTrade>();
    assert!(matches!(second, Err(Error::Validation(_))));
}

#[test]
fn missing_topic_binding_synthesizes_with_warning_in_relaxed_mode() {
    let mut builder = ModelBuilder::new(ValidationMode::Relaxed);
    builder.register::<NoTopicTrade>().unwrap();
    let registry = builder.build().unwrap();
    let descriptor = registry.descriptor_for::<NoTopicTrade>().unwrap();
    assert_eq!(descriptor.topic_binding.topic_name, "NoTopicTrade");
    assert!(!descriptor.validation_state.warnings.is_empty());
    assert!(!descriptor.auto_completed_settings.is_empty());
}

#[test]
fn missing_topic_binding_is_a_hard_error_in_strict_mode() {
    let mut builder = ModelBuilder::new(ValidationMode::Strict);
    builder.register::<NoTopicTrade>().unwrap();
    assert!(matches!(builder.build(), Err(Error::Validation(_))));
}

#[test]
fn missing_key_properties_synthesizes_with_warning_in_relaxed_mode() {
    let mut builder = ModelBuilder::new(ValidationMode::Relaxed);
    builder.register::<NoKeyTrade>().unwrap();
    let registry = builder.build().unwrap();
    let descriptor = registry.descriptor_for::<NoKeyTrade>().unwrap();
    assert!(descriptor.key_properties().is_empty());
    assert!(!descriptor.validation_state.warnings.is_empty());
}

#[test]
fn missing_key_properties_is_a_hard_error_in_strict_mode() {
    let mut builder = ModelBuilder::new(ValidationMode::Strict);
    builder.register::<NoKeyTrade>().unwrap();
    assert!(matches!(builder.build(), Err(Error::Validation(_))));
}

#[test]
fn duplicate_key_order_value_is_rejected_in_both_modes() {
    for mode in [ValidationMode::Strict, ValidationMode::Relaxed] {
        let mut builder = ModelBuilder::new(mode);
        builder.register::<DuplicateKeyOrderTrade>().unwrap();
        assert!(matches!(builder.build(), Err(Error::Validation(_))));
    }
}

#[test]
fn key_property_referencing_undeclared_property_is_rejected() {
    let mut builder = ModelBuilder::new(ValidationMode::Relaxed);
    builder.register::<UndeclaredKeyPropertyTrade>().unwrap();
    assert!(matches!(builder.build(), Err(Error::Validation(_))));
}

#[test]
fn max_length_on_non_string_property_warns_in_relaxed_and_errors_in_strict() {
    let mut relaxed = ModelBuilder::new(ValidationMode::Relaxed);
    relaxed.register::<MaxLengthOnNonStringTrade>().unwrap();
    let registry = relaxed.build().unwrap();
    let descriptor = registry.descriptor_for::<MaxLengthOnNonStringTrade>().unwrap();
    assert!(!descriptor.validation_state.warnings.is_empty());

    let mut strict = ModelBuilder::new(ValidationMode::Strict);
    strict.register::<MaxLengthOnNonStringTrade>().unwrap();
    assert!(matches!(strict.build(), Err(Error::Validation(_))));
}

#[test]
fn default_value_type_mismatch_is_rejected_in_both_modes() {
    for mode in [ValidationMode::Strict, ValidationMode::Relaxed] {
        let mut builder = ModelBuilder::new(mode);
        builder.register::<MismatchedDefaultTrade>().unwrap();
        assert!(matches!(builder.build(), Err(Error::Validation(_))));
    }
}

#[test]
fn null_default_on_non_nullable_property_is_rejected_in_both_modes() {
    for mode in [ValidationMode::Strict, ValidationMode::Relaxed] {
        let mut builder = ModelBuilder::new(mode);
        builder.register::<NonNullableNullDefaultTrade>().unwrap();
        assert!(matches!(builder.build(), Err(Error::Validation(_))));
    }
}

#[test]
fn multiple_violations_across_entities_are_aggregated_into_one_error() {
    let mut builder = ModelBuilder::new(ValidationMode::Strict);
    builder.register::<NoTopicTrade>().unwrap();
    builder.register::<NoKeyTrade>().unwrap();
    match builder.build() {
        Err(Error::Validation(report)) => assert!(report.entries.len() >= 2),
        other => panic!("expected an aggregated validation error, got {:?}", other),
    }
}
