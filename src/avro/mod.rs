//! Avro schema generation: entity descriptor -> `(key_schema_text, value_schema_text)`.

pub mod mapping;

use crate::entity::descriptor::EntityDescriptor;
use crate::error::{Error, Result};
use serde_json::{json, Value};

/// Stateless; every call takes the descriptor it needs. Mirrors contract directly.
pub struct AvroSchemaBuilder;

/// Diagnostic counts from one generation pass.
#[derive(Debug, Clone, Default)]
pub struct GenerationStats {
    pub total: usize,
    pub included: Vec<String>,
    pub ignored: Vec<String>,
}

/// `{ subject, schema_text, schema_kind, entity_type_id, fingerprint }`. Subject naming is
/// `"{topic}-key"` / `"{topic}-value"`.
#[derive(Debug, Clone)]
pub struct SchemaRecord {
    pub subject: String,
    pub schema_text: String,
    pub schema_kind: SchemaKind,
    pub entity_type_id: &'static str,
    pub fingerprint: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Key,
    Value,
}

/// A stable hash of a schema's canonical text, used for idempotent registration. Plain FNV-1a:
/// the corpus reaches for `dashmap`/`lazy_static`/`reqwest` for this crate's concerns but
/// nowhere pulls in a dedicated hashing crate, so this keeps the dependency surface aligned
/// with the existing client rather than adding one (see DESIGN.md).
pub fn fingerprint(schema_text: &str) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET_BASIS;
    for byte in schema_text.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

impl AvroSchemaBuilder {
    /// Produces `(key_schema_text, value_schema_text)` as Avro JSON text, and self-validates
    /// both before returning them.
    pub fn generate(descriptor: &EntityDescriptor) -> Result<(String, String, GenerationStats)> {
        let key_schema = Self::build_key_schema(descriptor);
        let (value_schema, stats) = Self::build_value_schema(descriptor);

        Self::validate(&key_schema)?;
        Self::validate(&value_schema)?;

        Ok((
            serde_json::to_string(&key_schema)?,
            serde_json::to_string(&value_schema)?,
            stats,
        ))
    }

    /// Produces the pair of [`SchemaRecord`]s ready for Schema Registry registration, with
    /// subjects named and fingerprints computed over the canonical schema text.
    pub fn generate_records(descriptor: &EntityDescriptor) -> Result<(SchemaRecord, SchemaRecord)> {
        let (key_text, value_text, _stats) = Self::generate(descriptor)?;
        let topic = &descriptor.topic_binding.topic_name;
        Ok((
            SchemaRecord {
                subject: format!("{}-key", topic),
                fingerprint: fingerprint(&key_text),
                schema_text: key_text,
                schema_kind: SchemaKind::Key,
                entity_type_id: descriptor.entity_type_id,
            },
            SchemaRecord {
                subject: format!("{}-value", topic),
                fingerprint: fingerprint(&value_text),
                schema_text: value_text,
                schema_kind: SchemaKind::Value,
                entity_type_id: descriptor.entity_type_id,
            },
        ))
    }

    fn build_key_schema(descriptor: &EntityDescriptor) -> Value {
        let keys = descriptor.key_properties();
        match keys.len() {
            0 => json!("string"),
            1 => {
                let key = &keys[0];
                let field_type = mapping::avro_type(key.def.property_type);
                mapping::apply_nullability(field_type, key.def.nullable)
            }
            _ => {
                let fields: Vec<Value> = keys
                    .iter()
                    .map(|key| {
                        let field_type = mapping::avro_type(key.def.property_type);
                        let field_type = mapping::apply_nullability(field_type, key.def.nullable);
                        json!({ "name": key.def.name, "type": field_type })
                    })
                    .collect();
                json!({
                    "type": "record",
                    "name": "CompositeKey",
                    "fields": fields,
                })
            }
        }
    }

    fn build_value_schema(descriptor: &EntityDescriptor) -> (Value, GenerationStats) {
        let mut stats = GenerationStats::default();
        let mut fields = Vec::new();

        for prop in &descriptor.properties {
            stats.total += 1;
            if prop.ignored {
                stats.ignored.push(prop.name.clone());
                continue;
            }
            stats.included.push(prop.name.clone());

            let field_type = mapping::avro_type(prop.property_type);
            let field_type = mapping::apply_nullability(field_type, prop.nullable);
            fields.push(json!({ "name": prop.name, "type": field_type }));
        }

        let schema = json!({
            "type": "record",
            "name": format!("{}_value", descriptor.topic_binding.topic_name),
            "namespace": format!("{}.Avro", descriptor.type_namespace),
            "fields": fields,
        });

        (schema, stats)
    }

    /// Confirms the emitted JSON parses and, for a record schema, that `type == "record"` and
    /// `name` is non-empty.
    fn validate(schema: &Value) -> Result<()> {
        if let Some(obj) = schema.as_object() {
            let type_field = obj
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Schema("schema object missing a 'type' field".into()))?;
            if type_field == "record" {
                let name = obj.get("name").and_then(Value::as_str).unwrap_or("");
                if name.is_empty() {
                    return Err(Error::Schema("record schema has an empty name".into()));
                }
            }
        }
        #[cfg(feature = "avro")]
        {
            avro_rs::Schema::parse(schema)?;
        }
        Ok(())
    }
}
