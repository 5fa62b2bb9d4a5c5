//! `SerializerCache`: a concurrent cache keyed by `(entity, role, schema_id)` that
//! amortises Avro codec construction. `DashMap` + per-key `tokio::sync::OnceCell` gives
//! at-most-one construction per key (G1) without a crate-wide lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Key,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Operation {
    Serialize,
    Deserialize,
}

/// `(entity_type_id, role, schema_id)`.
pub type CodecKey = (&'static str, Role, u32);

/// An Avro codec for one entity-and-role, capable of both directions. Wire format matches
/// Confluent's convention: a leading zero magic byte, a 4-byte big-endian schema id, then the
/// Avro-encoded payload (mirrors the original Confluent wire-format
/// `serializer.rs`/`deserializer.rs`).
pub struct Codec {
    schema_id: u32,
    #[cfg(feature = "avro")]
    schema: avro_rs::Schema,
}

impl Codec {
    #[cfg(feature = "avro")]
    pub fn from_schema_text(schema_id: u32, schema_text: &str) -> Result<Self> {
        let schema = avro_rs::Schema::parse_str(schema_text)?;
        Ok(Self { schema_id, schema })
    }

    #[cfg(feature = "avro")]
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let mut writer = avro_rs::Writer::new(&self.schema, Vec::new());
        writer.append_ser(value)?;
        let body = writer.into_inner()?;
        Ok(prefix_with_schema_id(self.schema_id, body))
    }

    #[cfg(feature = "avro")]
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let (schema_id, payload) = split_schema_id(bytes)?;
        if schema_id != self.schema_id {
            return Err(Error::IncorrectSchemaType(
                self.schema_id.to_string(),
                schema_id.to_string(),
            ));
        }
        let mut reader = avro_rs::Reader::with_schema(&self.schema, payload)?;
        match reader.next() {
            Some(value) => Ok(avro_rs::from_value(&value?)?),
            None => Err(Error::Schema("no Avro record found in payload".into())),
        }
    }
}

fn prefix_with_schema_id(schema_id: u32, mut payload: Vec<u8>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + 5);
    bytes.push(0);
    bytes.extend_from_slice(&schema_id.to_be_bytes());
    bytes.append(&mut payload);
    bytes
}

fn split_schema_id(bytes: &[u8]) -> Result<(u32, &[u8])> {
    if bytes.len() < 5 {
        return Err(Error::Schema("payload shorter than the wire-format header".into()));
    }
    if bytes[0] != 0 {
        return Err(Error::Schema("missing Confluent wire-format magic byte".into()));
    }
    let schema_id = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    Ok((schema_id, &bytes[5..]))
}

/// Per-entity counters.
#[derive(Default)]
struct EntityCounters {
    key_ser_hits: AtomicU64,
    key_ser_misses: AtomicU64,
    val_ser_hits: AtomicU64,
    val_ser_misses: AtomicU64,
    key_deser_hits: AtomicU64,
    key_deser_misses: AtomicU64,
    val_deser_hits: AtomicU64,
    val_deser_misses: AtomicU64,
}

/// A snapshot of one entity's counters, safe to hand out.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityCounterSnapshot {
    pub key_ser_hits: u64,
    pub key_ser_misses: u64,
    pub val_ser_hits: u64,
    pub val_ser_misses: u64,
    pub key_deser_hits: u64,
    pub key_deser_misses: u64,
    pub val_deser_hits: u64,
    pub val_deser_misses: u64,
}

impl EntityCounterSnapshot {
    pub fn hits(&self) -> u64 {
        self.key_ser_hits + self.val_ser_hits + self.key_deser_hits + self.val_deser_hits
    }

    pub fn total(&self) -> u64 {
        self.hits()
            + self.key_ser_misses
            + self.val_ser_misses
            + self.key_deser_misses
            + self.val_deser_misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}

/// Global cache statistics: `(total_requests, hits, misses, cached_item_count, last_access,
/// last_clear, uptime)`.
pub struct CacheStats {
    total_requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    started_at: Instant,
    last_access: std::sync::Mutex<Option<Instant>>,
    last_clear: std::sync::Mutex<Option<Instant>>,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            started_at: Instant::now(),
            last_access: std::sync::Mutex::new(None),
            last_clear: std::sync::Mutex::new(None),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStatsSnapshot {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub cached_item_count: usize,
    pub uptime_secs: u64,
}

impl CacheStatsSnapshot {
    /// `hits / total_requests`, `0` when total is zero.
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_requests as f64
        }
    }
}

/// Concurrent `(entity, role, schema_id) -> codec` cache.
pub struct SerializerCache {
    entries: DashMap<CodecKey, Arc<OnceCell<Arc<Codec>>>>,
    counters: DashMap<&'static str, EntityCounters>,
    stats: CacheStats,
}

impl Default for SerializerCache {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            counters: DashMap::new(),
            stats: CacheStats::default(),
        }
    }
}

impl SerializerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches a codec for serialization, constructing it via `construct` on a cache miss.
    /// Concurrent first-time requests for the same key invoke `construct` exactly once (G1);
    /// everyone else observes the completed entry.
    pub async fn get_for_serialize<F, Fut>(
        &self,
        entity_type_id: &'static str,
        role: Role,
        schema_id: u32,
        construct: F,
    ) -> Result<Arc<Codec>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Codec>>,
    {
        self.get_or_construct(entity_type_id, role, schema_id, Operation::Serialize, construct)
            .await
    }

    pub async fn get_for_deserialize<F, Fut>(
        &self,
        entity_type_id: &'static str,
        role: Role,
        schema_id: u32,
        construct: F,
    ) -> Result<Arc<Codec>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Codec>>,
    {
        self.get_or_construct(entity_type_id, role, schema_id, Operation::Deserialize, construct)
            .await
    }

    async fn get_or_construct<F, Fut>(
        &self,
        entity_type_id: &'static str,
        role: Role,
        schema_id: u32,
        op: Operation,
        construct: F,
    ) -> Result<Arc<Codec>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Codec>>,
    {
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
        *self.stats.last_access.lock().unwrap() = Some(Instant::now());

        let key: CodecKey = (entity_type_id, role, schema_id);
        let cell = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let was_initialized = cell.initialized();
        let codec = cell
            .get_or_try_init(|| async { construct().await.map(Arc::new) })
            .await?;

        if was_initialized {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.record_entity_counter(entity_type_id, role, op, was_initialized);

        Ok(Arc::clone(codec))
    }

    fn record_entity_counter(&self, entity_type_id: &'static str, role: Role, op: Operation, hit: bool) {
        let counters = self.counters.entry(entity_type_id).or_insert_with(EntityCounters::default);
        let field = match (role, op) {
            (Role::Key, Operation::Serialize) => {
                if hit {
                    &counters.key_ser_hits
                } else {
                    &counters.key_ser_misses
                }
            }
            (Role::Value, Operation::Serialize) => {
                if hit {
                    &counters.val_ser_hits
                } else {
                    &counters.val_ser_misses
                }
            }
            (Role::Key, Operation::Deserialize) => {
                if hit {
                    &counters.key_deser_hits
                } else {
                    &counters.key_deser_misses
                }
            }
            (Role::Value, Operation::Deserialize) => {
                if hit {
                    &counters.val_deser_hits
                } else {
                    &counters.val_deser_misses
                }
            }
        };
        field.fetch_add(1, Ordering::Relaxed);
    }

    /// Clears every cached codec (and leaves counters intact, since they describe historical
    /// traffic, not the current cache contents). Observable: subsequent requests re-construct
    /// (G3).
    pub fn clear(&self) {
        self.entries.clear();
        *self.stats.last_clear.lock().unwrap() = Some(Instant::now());
    }

    /// Clears cached codecs for a single entity, used by the per-entity schema upgrade flow.
    pub fn clear_for_entity(&self, entity_type_id: &str) {
        self.entries.retain(|key, _| key.0 != entity_type_id);
        *self.stats.last_clear.lock().unwrap() = Some(Instant::now());
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            total_requests: self.stats.total_requests.load(Ordering::Relaxed),
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            cached_item_count: self.entries.len(),
            uptime_secs: self.stats.started_at.elapsed().as_secs(),
        }
    }

    pub fn entity_stats(&self, entity_type_id: &str) -> EntityCounterSnapshot {
        match self.counters.get(entity_type_id) {
            Some(c) => EntityCounterSnapshot {
                key_ser_hits: c.key_ser_hits.load(Ordering::Relaxed),
                key_ser_misses: c.key_ser_misses.load(Ordering::Relaxed),
                val_ser_hits: c.val_ser_hits.load(Ordering::Relaxed),
                val_ser_misses: c.val_ser_misses.load(Ordering::Relaxed),
                key_deser_hits: c.key_deser_hits.load(Ordering::Relaxed),
                key_deser_misses: c.key_deser_misses.load(Ordering::Relaxed),
                val_deser_hits: c.val_deser_hits.load(Ordering::Relaxed),
                val_deser_misses: c.val_deser_misses.load(Ordering::Relaxed),
            },
            None => EntityCounterSnapshot::default(),
        }
    }

    /// Computed on demand.
    pub fn health_report(&self) -> HealthReport {
        let global = self.stats();
        let hit_rate = global.hit_rate();
        let severity = if hit_rate < 0.70 {
            Severity::Critical
        } else if hit_rate < 0.90 {
            Severity::Warning
        } else {
            Severity::Healthy
        };

        let mut issues = Vec::new();
        let mut recommendations = Vec::new();
        let mut low_performers = Vec::new();

        for entry in self.counters.iter() {
            let entity = *entry.key();
            let snapshot = self.entity_stats(entity);
            if snapshot.total() > 0 && snapshot.hit_rate() < 0.50 {
                issues.push(HealthIssue {
                    entity_type_id: entity,
                    severity: Severity::Warning,
                    message: format!(
                        "entity '{}' has a hit rate of {:.2}, below the 0.50 per-entity threshold",
                        entity,
                        snapshot.hit_rate()
                    ),
                });
                low_performers.push(entity);
            }
        }

        if hit_rate < 0.90 {
            recommendations.push("pre-warm the cache for frequently used entities".to_owned());
        }
        if global.misses > global.hits {
            recommendations.push(
                "miss count exceeds hit count; investigate schema registration churn".to_owned(),
            );
        }
        if !low_performers.is_empty() {
            recommendations.push(format!(
                "low-performing entities: {}",
                low_performers.join(", ")
            ));
        }

        HealthReport {
            severity,
            hit_rate,
            issues,
            recommendations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct HealthIssue {
    pub entity_type_id: &'static str,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub severity: Severity,
    pub hit_rate: f64,
    pub issues: Vec<HealthIssue>,
    pub recommendations: Vec<String>,
}

/// Exists only so call sites that want "all entities at once" don't need to iterate the cache's
/// internal map directly.
pub fn entity_stats_snapshot_map(
    cache: &SerializerCache,
    entity_type_ids: &[&'static str],
) -> HashMap<&'static str, EntityCounterSnapshot> {
    entity_type_ids
        .iter()
        .map(|id| (*id, cache.entity_stats(id)))
        .collect()
}
