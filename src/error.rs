use std::fmt;

/// The taxonomy of failures the crate can raise, grouped by the subsystem that raises them.
/// `Validation` and `Schema` are collected per-entity by the
/// [`crate::entity::builder::ModelBuilder`] and surfaced once at `build`; everything else is
/// raised at the point of use.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("entity validation failed:\n{0}")]
    Validation(ValidationReport),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("query translation failed: {0}")]
    Translation(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[cfg(feature = "avro")]
    #[error(transparent)]
    Avro(#[from] avro_rs::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("schema registry transport error after {attempts} attempt(s): {source}")]
    RegistryTransport {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("schema registry operation failed permanently after {attempts} attempt(s): {source}")]
    RegistryPermanent {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("expected to receive a schema id from the registry but found nothing")]
    IdNotReturned,

    #[error("expected to find a schema with the type {0}, but found one with {1}")]
    IncorrectSchemaType(String, String),

    #[error("schema registry returned an error ({error_code}): {message}")]
    SchemaRegistryError { error_code: u32, message: String },

    #[error("producer failed to deliver to topic '{topic}' for entity '{entity}': {source}")]
    ProducerFailure {
        topic: String,
        entity: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("consumer failed while reading topic '{topic}' for entity '{entity}': {source}")]
    ConsumerFailure {
        topic: String,
        entity: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("operation was cancelled")]
    Cancelled,
}

/// Aggregated validation failures for one `build` invocation, one entry per offending entity.
#[derive(Debug, Default, Clone)]
pub struct ValidationReport {
    pub entries: Vec<ValidationEntry>,
}

#[derive(Debug, Clone)]
pub struct ValidationEntry {
    pub entity_type_id: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "  - [{}] {}", entry.entity_type_id, entry.message)?;
        }
        Ok(())
    }
}

impl ValidationReport {
    pub fn push(&mut self, entity_type_id: &'static str, message: impl Into<String>) {
        self.entries.push(ValidationEntry {
            entity_type_id,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
