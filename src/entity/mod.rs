//! Entity metadata model and registration. There is no runtime reflection here: an
//! `Entity` implementation is how application code declares topic binding, key order and
//! per-property settings at compile time. The `ModelBuilder` assembles and validates an
//! [`descriptor::EntityDescriptor`] per registered type; everything downstream consumes
//! descriptors, never the `Entity` impls directly.

pub mod builder;
pub mod descriptor;

pub use builder::ModelBuilder;
pub use descriptor::{EntityDescriptor, KeyOrderEntry, PropertyDef, TopicBinding};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// The closed set of property types the translator, schema builder and KSQL `CREATE` statement
/// builder all agree on. Corresponds to type mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Bool,
    Int32,
    Int16,
    UInt8,
    Int64,
    Float32,
    Float64,
    String,
    Char,
    Bytes,
    /// `(precision, scale)`, if annotated; unannotated decimals default to `(18, 4)` at schema
    /// generation time and to bare `DECIMAL` in `CREATE` statements.
    Decimal(Option<(u32, u32)>),
    Timestamp,
    TimestampWithOffset,
    Uuid,
}

/// A constant value attached to a property as its `default_value`. Must unify with the
/// property's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Null,
}

impl DefaultValue {
    /// Whether this constant is a legal default for `ty`. Mirrors the coarse unification the
    /// validator performs; it does not check numeric range.
    pub fn unifies_with(&self, ty: PropertyType) -> bool {
        use PropertyType::*;
        match (self, ty) {
            (DefaultValue::Null, _) => true,
            (DefaultValue::Bool(_), Bool) => true,
            (DefaultValue::Int(_), Int32 | Int16 | UInt8 | Int64 | Timestamp | TimestampWithOffset) => true,
            (DefaultValue::Float(_), Float32 | Float64) => true,
            (DefaultValue::Float(_), Decimal(_)) => true,
            (DefaultValue::String(_), String | Char | Uuid) => true,
            _ => false,
        }
    }
}

/// Implemented (by hand, or by a derive macro an application crate could provide) for each
/// record type bound to a topic. Mirrors the source's attribute-driven declaration, rendered as
/// plain associated items rather than reflected attributes.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable identifier for this entity type, used as the first component of `CodecKey` and in
    /// error/diagnostic messages. Typically the type's simple name.
    const TYPE_ID: &'static str;

    /// Used to build the Avro namespace `"{type_namespace}.Avro"`.
    const NAMESPACE: &'static str;

    /// `None` in relaxed mode synthesizes `{ topic_name = TYPE_ID }` with a warning; in strict
    /// mode, a missing binding is a validation error.
    fn topic_binding() -> Option<TopicBinding>;

    /// All declared properties (ignored and non-ignored alike) in declaration order.
    fn properties() -> Vec<PropertyDef>;

    /// The declared key order. Empty is permitted only in relaxed mode.
    fn key_order() -> Vec<KeyOrderEntry>;
}
