//! Typed entity-set query surface over Kafka, ksqlDB and Schema Registry. Application code
//! describes its Kafka/ksqlDB interactions by implementing [`entity::Entity`] for its record
//! types, registering them with a [`entity::builder::ModelBuilder`], and then composing queries
//! against a [`context::Context`]'s [`context::EntitySet`]s. A query composition is translated
//! to ksqlDB text by [`translator::QueryTranslator`]; writes and reads go through Avro codecs
//! cached by [`serializer_cache::SerializerCache`], which
//! [`coordinator::ResilientSchemaCoordinator`] keeps in sync with the Schema Registry.

pub mod avro;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod ksqldb;
pub mod query;
pub mod schema_registry;
pub mod serializer_cache;
pub mod translator;

pub use config::{ClientConfig, ValidationMode};
pub use context::{CancellationToken, Context, EntitySet, PoolStatsSnapshot};
pub use entity::{DefaultValue, Entity, PropertyType};
pub use error::{Error, Result};
