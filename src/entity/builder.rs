use std::collections::{HashMap, HashSet};

use crate::avro::AvroSchemaBuilder;
use crate::config::ValidationMode;
use crate::error::{Error, Result, ValidationReport};

use super::descriptor::{EntityDescriptor, TopicBinding, ValidationState};
use super::Entity;

/// Registers entity types, validates them (strict or relaxed), and freezes the result into an
/// [`EntityRegistry`]. The registry is mutable only during this build phase; `build` consumes
/// `self` and returns an immutable registry.
pub struct ModelBuilder {
    mode: ValidationMode,
    descriptors: HashMap<&'static str, EntityDescriptor>,
    report: ValidationReport,
}

impl ModelBuilder {
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            descriptors: HashMap::new(),
            report: ValidationReport::default(),
        }
    }

    /// Idempotent-by-error: re-registering the same type is rejected rather than silently
    /// overwriting the first registration.
    pub fn register<T: Entity>(&mut self) -> Result<()> {
        if self.descriptors.contains_key(T::TYPE_ID) {
            return Err(Error::Validation({
                let mut report = ValidationReport::default();
                report.push(T::TYPE_ID, "entity type already registered");
                report
            }));
        }

        let mut warnings = Vec::new();
        let mut auto_completed = Vec::new();

        let topic_binding = match T::topic_binding() {
            Some(binding) => binding,
            None => {
                if self.mode.is_strict() {
                    self.report.push(T::TYPE_ID, "missing topic binding");
                    TopicBinding::synthesized(T::TYPE_ID)
                } else {
                    warnings.push(format!("no topic binding declared, synthesizing '{}'", T::TYPE_ID));
                    auto_completed.push(format!("topic_name={}", T::TYPE_ID));
                    TopicBinding::synthesized(T::TYPE_ID)
                }
            }
        };

        if topic_binding.partition_count < 1 {
            self.report.push(T::TYPE_ID, "partition_count must be >= 1");
        }
        if topic_binding.replication_factor < 1 {
            self.report.push(T::TYPE_ID, "replication_factor must be >= 1");
        }
        if topic_binding.retention_ms == 0 {
            self.report.push(T::TYPE_ID, "retention_ms must be > 0");
        }

        let properties = T::properties();
        let mut key_order = T::key_order();

        if key_order.is_empty() {
            if self.mode.is_strict() {
                self.report.push(T::TYPE_ID, "entity declares no key properties");
            } else {
                warnings.push("no key properties declared, synthesizing a default string key".into());
                auto_completed.push("key=<default string key>".into());
            }
        } else {
            let mut seen_orders = HashSet::new();
            for entry in &key_order {
                if !seen_orders.insert(entry.order) {
                    self.report.push(
                        T::TYPE_ID,
                        format!("duplicate key order value {}", entry.order),
                    );
                }
                if !properties.iter().any(|p| p.name == entry.property_name) {
                    self.report.push(
                        T::TYPE_ID,
                        format!("key property '{}' is not a declared property", entry.property_name),
                    );
                }
            }
        }
        key_order.sort_by_key(|e| e.order);

        for prop in &properties {
            if prop.max_length.is_some() && !matches!(prop.property_type, super::PropertyType::String) {
                let message = format!("max_length on non-string property '{}'", prop.name);
                if self.mode.is_strict() {
                    self.report.push(T::TYPE_ID, message);
                } else {
                    warnings.push(message);
                }
            }
            if let Some(ref default) = prop.default_value {
                if !default.unifies_with(prop.property_type) {
                    self.report.push(
                        T::TYPE_ID,
                        format!(
                            "default_value for '{}' is not compatible with its declared type",
                            prop.name
                        ),
                    );
                }
                if !prop.nullable && matches!(default, super::DefaultValue::Null) {
                    self.report.push(
                        T::TYPE_ID,
                        format!("property '{}' has a null default but is not nullable", prop.name),
                    );
                }
            }
        }

        let descriptor = EntityDescriptor {
            entity_type_id: T::TYPE_ID,
            type_namespace: T::NAMESPACE,
            topic_binding,
            properties,
            key_order,
            validation_state: ValidationState {
                is_valid: false, // finalized by `build()` once the whole report is in
                warnings,
            },
            auto_completed_settings: auto_completed,
        };

        // Cycle detection in value properties is unnecessary today: the closed PropertyType set
        // has no self-referential variant (no nested record type), so cycles cannot occur via
        // this model. Left as a placeholder should the property model grow a nested-record
        // variant later.

        if let Err(e) = AvroSchemaBuilder::generate(&descriptor) {
            self.report.push(T::TYPE_ID, format!("schema generation failed: {}", e));
        }

        self.descriptors.insert(T::TYPE_ID, descriptor);
        Ok(())
    }

    /// Aggregates per-entity validation results and fails fast on any strict error, with a
    /// single error carrying every violation (not only the first).
    pub fn build(mut self) -> Result<EntityRegistry> {
        if !self.report.is_empty() {
            return Err(Error::Validation(self.report));
        }
        for descriptor in self.descriptors.values_mut() {
            descriptor.validation_state.is_valid = true;
        }
        Ok(EntityRegistry {
            descriptors: self.descriptors,
        })
    }
}

/// The frozen result of a successful `build`. Immutable for the lifetime of the
/// [`crate::context::Context`] that owns it.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    descriptors: HashMap<&'static str, EntityDescriptor>,
}

impl EntityRegistry {
    pub fn get(&self, entity_type_id: &str) -> Option<&EntityDescriptor> {
        self.descriptors.get(entity_type_id)
    }

    pub fn descriptor_for<T: Entity>(&self) -> Option<&EntityDescriptor> {
        self.get(T::TYPE_ID)
    }
}
