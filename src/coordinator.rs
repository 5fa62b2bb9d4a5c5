//! `ResilientSchemaCoordinator`: a retry/backoff wrapper around
//! [`crate::schema_registry::SchemaRegistryClient`] that populates
//! [`crate::serializer_cache::SerializerCache`]. Retries happen only here; the registry client
//! and serializer cache never retry on their own.

use std::time::Duration;

use tracing::warn;

use crate::avro::AvroSchemaBuilder;
use crate::entity::descriptor::EntityDescriptor;
use crate::error::{Error, Result};
use crate::schema_registry::SchemaRegistryClient;
use crate::serializer_cache::SerializerCache;

/// `(attempts, initial, max, multiplier)` for one kind of operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64, multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            multiplier,
        }
    }

    /// `min(initial * multiplier^(attempt-1), max)`. `attempt` is 1-based.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    pub const fn registration() -> Self {
        Self::new(5, 200, 60_000, 2.0)
    }

    pub const fn retrieval() -> Self {
        Self::new(3, 100, 10_000, 2.0)
    }

    pub const fn compatibility_check() -> Self {
        Self::new(2, 50, 5_000, 2.0)
    }

    /// No retry.
    pub const fn serialization() -> Self {
        Self::new(1, 0, 0, 1.0)
    }
}

/// The full set of policies one coordinator applies, one per operation kind.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicies {
    pub registration: RetryPolicy,
    pub retrieval: RetryPolicy,
    pub compatibility_check: RetryPolicy,
    pub serialization: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            registration: RetryPolicy::registration(),
            retrieval: RetryPolicy::retrieval(),
            compatibility_check: RetryPolicy::compatibility_check(),
            serialization: RetryPolicy::serialization(),
        }
    }
}

/// Whether an error is worth retrying: retryable defaults are transport/timeout/cancel;
/// non-retryable defaults are argument/invalid-state style failures that a retry can never fix.
fn is_retryable(err: &Error) -> bool {
    match err {
        Error::Http(_) => true,
        Error::SchemaRegistryError { error_code, .. } => *error_code >= 500,
        _ => false,
    }
}

/// Runs `op` under `policy`: retries while `attempt < max_attempts` and the error is retryable,
/// sleeping `policy.delay_for_attempt(attempt)` between tries and logging each retry. On
/// exhaustion, wraps the last error as a permanent failure.
async fn with_retry<T, F, Fut>(policy: RetryPolicy, operation_name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }
                if attempt >= policy.max_attempts {
                    return Err(Error::RegistryPermanent {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retrying schema registry operation after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// The outcome of [`ResilientSchemaCoordinator::upgrade`].
#[derive(Debug, Clone, Default)]
pub struct UpgradeResult {
    pub success: bool,
    pub new_key_id: Option<u32>,
    pub new_value_id: Option<u32>,
    pub reason: Option<String>,
}

/// Wraps a [`SchemaRegistryClient`] with retry/backoff and keeps a [`SerializerCache`] in sync.
pub struct ResilientSchemaCoordinator {
    registry: SchemaRegistryClient,
    cache: SerializerCache,
    policies: RetryPolicies,
}

impl ResilientSchemaCoordinator {
    pub fn new(registry: SchemaRegistryClient) -> Self {
        Self {
            registry,
            cache: SerializerCache::new(),
            policies: RetryPolicies::default(),
        }
    }

    pub fn with_policies(registry: SchemaRegistryClient, policies: RetryPolicies) -> Self {
        Self {
            registry,
            cache: SerializerCache::new(),
            policies,
        }
    }

    pub fn cache(&self) -> &SerializerCache {
        &self.cache
    }

    pub fn registry(&self) -> &SchemaRegistryClient {
        &self.registry
    }

    /// Generates the key/value Avro schemas and registers both under retry policy
    /// `registration`.
    pub async fn register_entity(&self, descriptor: &EntityDescriptor) -> Result<(u32, u32)> {
        let (key_record, value_record) = AvroSchemaBuilder::generate_records(descriptor)?;
        with_retry(self.policies.registration, "register_entity", || async {
            self.registry
                .register_topic(
                    &descriptor.topic_binding.topic_name,
                    &key_record.schema_text,
                    &value_record.schema_text,
                )
                .await
        })
        .await
    }

    pub async fn get_latest(&self, subject: &str) -> Result<crate::schema_registry::RegisteredSchema> {
        with_retry(self.policies.retrieval, "get_latest", || self.registry.get_latest(subject)).await
    }

    pub async fn get_by_id(&self, schema_id: u32) -> Result<crate::schema_registry::RegisteredSchema> {
        with_retry(self.policies.retrieval, "get_by_id", || self.registry.get_by_id(schema_id)).await
    }

    /// `can_upgrade<T>(topic) := compatibility(value-subject, new_value_schema)`.
    pub async fn can_upgrade(&self, descriptor: &EntityDescriptor) -> Result<bool> {
        let (_key_record, value_record) = AvroSchemaBuilder::generate_records(descriptor)?;
        let subject = value_record.subject.clone();
        let schema_text = value_record.schema_text.clone();
        with_retry(self.policies.compatibility_check, "check_compatibility", || {
            let subject = subject.clone();
            let schema_text = schema_text.clone();
            async move { Ok(self.registry.check_compatibility(&subject, &schema_text).await) }
        })
        .await
    }

    /// `upgrade<T>(topic) := register(key and value) + clear_cache_for<T>`. Per-entity cache
    /// invalidation.
    pub async fn upgrade(&self, descriptor: &EntityDescriptor) -> UpgradeResult {
        match self.can_upgrade(descriptor).await {
            Ok(false) => {
                return UpgradeResult {
                    success: false,
                    reason: Some("new schema is not BACKWARD compatible with the latest registered version".into()),
                    ..Default::default()
                }
            }
            Err(err) => {
                return UpgradeResult {
                    success: false,
                    reason: Some(err.to_string()),
                    ..Default::default()
                }
            }
            Ok(true) => {}
        }

        match self.register_entity(descriptor).await {
            Ok((key_id, value_id)) => {
                self.cache.clear_for_entity(descriptor.entity_type_id);
                UpgradeResult {
                    success: true,
                    new_key_id: Some(key_id),
                    new_value_id: Some(value_id),
                    reason: None,
                }
            }
            Err(err) => UpgradeResult {
                success: false,
                reason: Some(err.to_string()),
                ..Default::default()
            },
        }
    }
}
