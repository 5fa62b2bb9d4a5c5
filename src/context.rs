//! `Context` / `EntitySet`: the public query surface. Bridges application code to the
//! translator, the serializer cache (via the resilient schema coordinator), and the Kafka
//! producer/consumer.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig as KafkaClientConfig;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::coordinator::ResilientSchemaCoordinator;
use crate::entity::builder::EntityRegistry;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::ksqldb::KsqlDbClient;
use crate::query::expr::{Lambda, QueryExpr, WindowSpec};
use crate::query::{JoinSpec, Query};
use crate::schema_registry::SchemaRegistryClient;
use crate::serializer_cache::{Codec, Role};
use crate::translator::{debug_comment, QueryTranslator};

/// A cooperative cancellation signal. With no `tokio-util` in the dependency stack, this is the
/// smallest thing that satisfies "cancellation during streaming terminates the stream loop on
/// the next boundary without data loss on already-delivered messages": callers poll
/// `is_cancelled` between rows rather than the stream being interrupted mid-message.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Rent/return/discard counters for the producer a [`Context`] hands out to its `EntitySet`s
/// provides metrics"). This crate keeps one producer per `Context` rather than a full
/// multi-producer pool keyed by `(bootstrap_servers, codec identity, group_id)` — pool policy
/// itself is out of scope — but the metrics shape it names is still reported.
#[derive(Default)]
pub struct PoolStats {
    rents: AtomicU64,
    returns: AtomicU64,
    discards: AtomicU64,
}

impl PoolStats {
    fn record_rent(&self) {
        self.rents.fetch_add(1, Ordering::Relaxed);
    }

    fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    fn record_discard(&self) {
        self.discards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            rents: self.rents.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolStatsSnapshot {
    pub rents: u64,
    pub returns: u64,
    pub discards: u64,
}

/// Owns the frozen entity registry, the schema coordinator, the ksqlDB REST
/// client, and the Kafka producer. One `Context` is independent of any other in the same
/// process.
pub struct Context {
    config: ClientConfig,
    registry: EntityRegistry,
    coordinator: Arc<ResilientSchemaCoordinator>,
    ksqldb: KsqlDbClient,
    producer: FutureProducer,
    pool_stats: PoolStats,
}

impl Context {
    pub fn new(config: ClientConfig, registry: EntityRegistry) -> Result<Self> {
        let schema_registry = SchemaRegistryClient::with_client(
            reqwest::Client::new(),
            config.schema_registry_url.clone(),
            config.basic_auth_user_info.clone(),
        );
        let coordinator = Arc::new(ResilientSchemaCoordinator::new(schema_registry));
        let ksqldb = KsqlDbClient::new(config.ksqldb_url.clone());

        // acks=all, idempotence=true, max_in_flight=1, compression=Snappy: producer send-order
        // equals broker-accepted order by default, without the caller having to know that.
        let producer: FutureProducer = KafkaClientConfig::new()
            .set("bootstrap.servers", &config.connection_string)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("max.in.flight.requests.per.connection", "1")
            .set("compression.type", "snappy")
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            config,
            registry,
            coordinator,
            ksqldb,
            producer,
            pool_stats: PoolStats::default(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Rent/return/discard counters for the producer this `Context` hands out.
    pub fn pool_stats(&self) -> PoolStatsSnapshot {
        self.pool_stats.snapshot()
    }

    /// Entry point for the fluent query surface: `context.entity_set::<Order>`.
    pub fn entity_set<T: Entity>(&self) -> Result<EntitySet<'_, T>> {
        let descriptor = self
            .registry
            .descriptor_for::<T>()
            .ok_or_else(|| Error::Translation(format!("entity '{}' is not registered", T::TYPE_ID)))?;
        if !descriptor.is_valid() {
            return Err(Error::Translation(format!(
                "entity '{}' failed validation and cannot be used to build queries",
                T::TYPE_ID
            )));
        }
        Ok(EntitySet {
            context: self,
            query: Query::new(descriptor.topic_binding.topic_name.clone()),
            _entity: PhantomData,
        })
    }

    /// Bounded flush on teardown.
    pub fn flush(&self) -> Result<()> {
        self.producer
            .flush(Duration::from_secs(10))
            .map_err(Error::Kafka)
    }
}

/// The typed, composable query surface per entity. Every composition operator returns a new
/// `EntitySet` carrying the extended expression tree; nothing is mutated in place.
pub struct EntitySet<'a, T> {
    context: &'a Context,
    query: Query<T>,
    _entity: PhantomData<fn() -> T>,
}

impl<'a, T: Entity> EntitySet<'a, T> {
    fn with_query(self, query: Query<T>) -> Self {
        Self {
            context: self.context,
            query,
            _entity: PhantomData,
        }
    }

    pub fn where_(self, predicate: Lambda) -> Self {
        let query = self.query.clone().where_(predicate);
        self.with_query(query)
    }

    pub fn select(self, projection: Lambda) -> Self {
        let query = self.query.clone().select(projection);
        self.with_query(query)
    }

    pub fn group_by(self, key_selector: Lambda) -> Self {
        let query = self.query.clone().group_by(key_selector);
        self.with_query(query)
    }

    pub fn take(self, n: u64) -> Self {
        let query = self.query.clone().take(n);
        self.with_query(query)
    }

    pub fn skip(self, n: u64) -> Self {
        let query = self.query.clone().skip(n);
        self.with_query(query)
    }

    pub fn window(self, spec: WindowSpec) -> Self {
        let query = self.query.clone().window(spec);
        self.with_query(query)
    }

    pub fn join(self, spec: JoinSpec) -> Self {
        let query = self.query.clone().join(spec);
        self.with_query(query)
    }

    /// Exists solely to raise `Unsupported` at build time.
    pub fn order_by(self, key_selector: Lambda) -> Self {
        let query = self.query.clone().order_by(key_selector);
        self.with_query(query)
    }

    pub fn order_by_descending(self, key_selector: Lambda) -> Self {
        let query = self.query.clone().order_by_descending(key_selector);
        self.with_query(query)
    }

    /// Debug/inspection only: never fails the process. A translation failure is formatted as a
    /// KSQL comment instead of being raised; debug logging, when enabled, also traces the
    /// underlying error.
    pub fn to_ksql(&self, pull_hint: bool) -> String {
        match QueryTranslator::translate(&self.query.expr, pull_hint) {
            Ok(result) => result.ksql,
            Err(err) => {
                if self.context.config.enable_debug_logging {
                    tracing::debug!(error = %err, "KSQL translation failed");
                }
                debug_comment(&err)
            }
        }
    }

    fn translate(&self, pull_hint: bool) -> Result<String> {
        QueryTranslator::translate(&self.query.expr, pull_hint).map(|r| r.ksql)
    }

    /// Pull-query materialization: validates, translates with `pull_hint=true`, executes via
    /// ksqlDB REST, and deserializes each row back into `T`.
    pub async fn to_list_async(&self) -> Result<Vec<T>> {
        let ksql = self.translate(true)?;
        let descriptor = self.descriptor()?;
        let rows = self.context.ksqldb.execute(&ksql).await?;

        let columns: Vec<&str> = descriptor
            .value_properties()
            .map(|p| p.name.as_str())
            .collect();

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let entity = Self::row_to_entity(&columns, &row.columns, self.context.config.validation_mode)?;
            out.push(entity);
        }
        Ok(out)
    }

    pub fn to_list(&self) -> Result<Vec<T>> {
        futures::executor::block_on(self.to_list_async())
    }

    fn row_to_entity(columns: &[&str], values: &[Value], mode: crate::config::ValidationMode) -> Result<T> {
        if columns.len() != values.len() {
            return Err(Error::Translation(format!(
                "row has {} columns but entity declares {}",
                values.len(),
                columns.len()
            )));
        }
        let mut object = serde_json::Map::new();
        for (name, value) in columns.iter().zip(values.iter()) {
            if mode.is_strict() && value.is_null() {
                return Err(Error::Translation(format!(
                    "strict mode: column '{}' returned null",
                    name
                )));
            }
            object.insert((*name).to_owned(), value.clone());
        }
        serde_json::from_value(Value::Object(object)).map_err(Error::from)
    }

    /// Push-query streaming: translates with `pull_hint=false`, then invokes `action` per row
    /// as it arrives over the wire, until the result set is exhausted or `token` is cancelled.
    /// Cancellation is checked between rows, never mid-row.
    pub async fn for_each_async<F>(&self, mut action: F, token: CancellationToken) -> Result<()>
    where
        F: FnMut(T) + Send,
    {
        let ksql = self.translate(false)?;
        let descriptor = self.descriptor()?;
        let topic = descriptor.topic_binding.topic_name.clone();
        let columns: Vec<&str> = descriptor
            .value_properties()
            .map(|p| p.name.as_str())
            .collect();

        let stream = self
            .context
            .ksqldb
            .execute_streaming(&ksql)
            .await
            .map_err(|source| Error::ConsumerFailure {
                topic: topic.clone(),
                entity: T::TYPE_ID,
                source: Box::new(source),
            })?;
        let mut stream = Box::pin(stream);

        while let Some(row) = stream.next().await {
            if token.is_cancelled() {
                return Ok(());
            }
            let row = row.map_err(|source| Error::ConsumerFailure {
                topic: topic.clone(),
                entity: T::TYPE_ID,
                source: Box::new(source),
            })?;
            let entity = Self::row_to_entity(&columns, &row.columns, self.context.config.validation_mode)?;
            action(entity);
        }
        Ok(())
    }

    /// Fire-and-forget push: the same translation path as [`Self::for_each_async`], spawned so
    /// the caller doesn't have to await it. `tokio::spawn` requires everything the task
    /// captures to be `'static`, so this borrows the `Context` for `'static` — callers reach
    /// this through a `Context` that outlives the task (e.g. one held in an `Arc` or a
    /// process-lifetime `static`), same as any other spawned-borrow API.
    pub fn subscribe<F>(self, action: F) -> tokio::task::JoinHandle<Result<()>>
    where
        F: FnMut(T) + Send + 'static,
        T: 'static,
        'a: 'static,
    {
        tokio::spawn(async move {
            let token = CancellationToken::new();
            self.for_each_async(action, token).await
        })
    }

    fn descriptor(&self) -> Result<&crate::entity::descriptor::EntityDescriptor> {
        self.context
            .registry
            .descriptor_for::<T>()
            .ok_or_else(|| Error::Translation(format!("entity '{}' is not registered", T::TYPE_ID)))
    }

    /// Key extraction: no keys -> `null`; one key -> the raw value; many keys -> an ordered
    /// record keyed by property name in declared order.
    fn extract_key(&self, entity: &T) -> Result<Value> {
        let descriptor = self.descriptor()?;
        let keys = descriptor.key_properties();
        let full = serde_json::to_value(entity)?;
        let fields = full
            .as_object()
            .ok_or_else(|| Error::Translation("entity did not serialize to a JSON object".into()))?;

        let strict = self.context.config.validation_mode.is_strict();

        match keys.len() {
            0 => Ok(Value::Null),
            1 => {
                let key = &keys[0];
                let value = fields.get(&key.def.name).cloned().unwrap_or(Value::Null);
                Self::validate_key_component(&value, strict)?;
                Ok(value)
            }
            _ => {
                let mut object = serde_json::Map::new();
                for key in &keys {
                    let value = fields.get(&key.def.name).cloned().unwrap_or(Value::Null);
                    Self::validate_key_component(&value, strict)?;
                    object.insert(key.def.name.clone(), value);
                }
                Ok(Value::Object(object))
            }
        }
    }

    fn validate_key_component(value: &Value, strict: bool) -> Result<()> {
        if !strict {
            return Ok(());
        }
        if value.is_null() {
            return Err(Error::Translation("strict mode: key component is null".into()));
        }
        if matches!(value, Value::String(s) if s.is_empty()) {
            return Err(Error::Translation("strict mode: key component is an empty string".into()));
        }
        Ok(())
    }

    async fn codec_for(&self, role: Role) -> Result<Arc<Codec>> {
        let descriptor = self.descriptor()?;
        let (key_record, value_record) = crate::avro::AvroSchemaBuilder::generate_records(descriptor)?;
        let record = match role {
            Role::Key => &key_record,
            Role::Value => &value_record,
        };

        let schema_id = if self.context.config.enable_auto_schema_registration {
            self.context
                .coordinator
                .registry()
                .register(&record.subject, &record.schema_text)
                .await?
        } else {
            self.context
                .coordinator
                .get_latest(&record.subject)
                .await?
                .schema_id
        };

        let schema_text = record.schema_text.clone();
        self.context
            .coordinator
            .cache()
            .get_for_serialize(T::TYPE_ID, role, schema_id, || async move {
                Codec::from_schema_text(schema_id, &schema_text)
            })
            .await
    }

    /// Synchronous from the caller's standpoint: fails fast on validation, extracts the key,
    /// and produces.
    pub async fn add_one(&self, entity: T) -> Result<()> {
        let descriptor = self.descriptor()?;
        if !descriptor.is_valid() {
            return Err(Error::Translation(format!(
                "entity '{}' failed validation and cannot be produced",
                T::TYPE_ID
            )));
        }

        let key = self.extract_key(&entity)?;
        let key_codec = self.codec_for(Role::Key).await?;
        let value_codec = self.codec_for(Role::Value).await?;

        let key_bytes = key_codec.encode(&key)?;
        let value_bytes = value_codec.encode(&entity)?;

        let topic = descriptor.topic_binding.topic_name.clone();
        let record = FutureRecord::to(&topic).key(&key_bytes).payload(&value_bytes);

        self.context.pool_stats.record_rent();
        let send_result = self
            .context
            .producer
            .send(record, Duration::from_secs(self.context.config.timeout_ms / 1000))
            .await;
        match send_result {
            Ok(_) => {
                self.context.pool_stats.record_return();
                Ok(())
            }
            Err((kafka_err, _)) => {
                self.context.pool_stats.record_discard();
                Err(Error::ProducerFailure {
                    topic: topic.clone(),
                    entity: T::TYPE_ID,
                    source: Box::new(Error::Kafka(kafka_err)),
                })
            }
        }
    }

    pub async fn add_many(&self, entities: Vec<T>) -> Result<()>
    where
        T: Clone,
    {
        for entity in entities {
            self.add_one(entity).await?;
        }
        Ok(())
    }
}

impl<'a, T> Clone for EntitySet<'a, T> {
    fn clone(&self) -> Self {
        Self {
            context: self.context,
            query: self.query.clone(),
            _entity: PhantomData,
        }
    }
}
