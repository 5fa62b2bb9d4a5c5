use super::{DefaultValue, PropertyType};

/// `{ entity_type_id, topic_binding, key_properties[], value_properties[],
/// ignored_properties[], validation_state }`. Built once by
/// [`super::builder::ModelBuilder::build`] and frozen: nothing outside the builder ever mutates
/// a descriptor again.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub entity_type_id: &'static str,
    pub type_namespace: &'static str,
    pub topic_binding: TopicBinding,
    pub properties: Vec<PropertyDef>,
    pub key_order: Vec<KeyOrderEntry>,
    pub validation_state: ValidationState,
    /// Settings synthesized by relaxed-mode validation (e.g. `topic_name`, a default string
    /// key) so callers can see what was auto-completed.
    pub auto_completed_settings: Vec<String>,
}

impl EntityDescriptor {
    /// Key properties, ordered ascending by declared `order`, joined against their full
    /// [`PropertyDef`]. Empty iff the entity was registered with zero keys in relaxed mode and
    /// a synthetic key was not requested by the caller.
    pub fn key_properties(&self) -> Vec<KeyProperty<'_>> {
        let mut keys: Vec<KeyProperty<'_>> = self
            .key_order
            .iter()
            .filter_map(|entry| {
                self.properties
                    .iter()
                    .find(|p| p.name == entry.property_name)
                    .map(|def| KeyProperty {
                        def,
                        order: entry.order,
                        encoding: entry.encoding.as_deref(),
                    })
            })
            .collect();
        keys.sort_by_key(|k| k.order);
        keys
    }

    /// Non-ignored properties in declaration order.
    pub fn value_properties(&self) -> impl Iterator<Item = &PropertyDef> {
        self.properties.iter().filter(|p| !p.ignored)
    }

    pub fn ignored_properties(&self) -> impl Iterator<Item = &PropertyDef> {
        self.properties.iter().filter(|p| p.ignored)
    }

    pub fn is_valid(&self) -> bool {
        self.validation_state.is_valid
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeyProperty<'a> {
    pub def: &'a PropertyDef,
    pub order: i32,
    pub encoding: Option<&'a str>,
}

/// `{ topic_name, partition_count>=1, replication_factor>=1, retention_ms>0, compaction?,
/// dead_letter_queue?, description? }`.
#[derive(Debug, Clone)]
pub struct TopicBinding {
    pub topic_name: String,
    pub partition_count: u32,
    pub replication_factor: u32,
    pub retention_ms: u64,
    pub compaction: Option<bool>,
    pub dead_letter_queue: Option<String>,
    pub description: Option<String>,
}

impl TopicBinding {
    /// Synthesized binding used in relaxed mode when an entity declares none.
    pub fn synthesized(topic_name: impl Into<String>) -> Self {
        Self {
            topic_name: topic_name.into(),
            partition_count: 1,
            replication_factor: 1,
            retention_ms: 604_800_000, // 7 days, the Kafka broker default
            compaction: None,
            dead_letter_queue: None,
            description: None,
        }
    }
}

/// One declared property: `(name, type, order, encoding?)` for keys join against this via
/// [`KeyOrderEntry`]; everything else (nullability, max_length, default, decimal precision,
/// ignored marker) lives directly here since it applies uniformly whether or not the property
/// also participates in the key.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub property_type: PropertyType,
    pub nullable: bool,
    pub max_length: Option<usize>,
    pub default_value: Option<DefaultValue>,
    pub ignored: bool,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            nullable: false,
            max_length: None,
            default_value: None,
            ignored: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn with_default(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }
}

/// One entry of the declared key order: `(property_name, order, encoding?)`.
#[derive(Debug, Clone)]
pub struct KeyOrderEntry {
    pub property_name: String,
    pub order: i32,
    pub encoding: Option<String>,
}

impl KeyOrderEntry {
    pub fn new(property_name: impl Into<String>, order: i32) -> Self {
        Self {
            property_name: property_name.into(),
            order,
            encoding: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationState {
    pub is_valid: bool,
    pub warnings: Vec<String>,
}
