/// Recognized configuration options. This is the Rust rendering of the configuration surface:
/// plain fields with sane defaults, no file-format binding. Binding this to a config file or
/// environment is left to the application; it's out of scope for the core.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Kafka bootstrap servers, e.g. `"localhost:9092"`.
    pub connection_string: String,
    pub schema_registry_url: String,
    /// ksqlDB REST endpoint, e.g. `"http://localhost:8088"`. Kept separate from
    /// `schema_registry_url` rather than derived from it — the two services commonly live on
    /// unrelated hosts (a hosted Schema Registry with a self-managed ksqlDB, for instance).
    pub ksqldb_url: String,
    pub basic_auth_user_info: Option<String>,
    pub timeout_ms: u64,
    pub max_cached_schemas: Option<usize>,
    pub validation_mode: ValidationMode,
    pub enable_auto_schema_registration: bool,
    pub enable_debug_logging: bool,
    pub consumer_group_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection_string: "localhost:9092".to_owned(),
            schema_registry_url: "http://localhost:8081".to_owned(),
            ksqldb_url: "http://localhost:8088".to_owned(),
            basic_auth_user_info: None,
            timeout_ms: 10_000,
            max_cached_schemas: None,
            validation_mode: ValidationMode::Strict,
            enable_auto_schema_registration: true,
            enable_debug_logging: false,
            consumer_group_id: None,
        }
    }
}

/// Strict refuses on any validation rule violation; Relaxed downgrades a fixed set of rules
/// (missing topic, missing key) to warnings and records what it auto-completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Strict,
    Relaxed,
}

impl ValidationMode {
    pub fn is_strict(self) -> bool {
        matches!(self, ValidationMode::Strict)
    }
}

/// Per-topic overrides for partition/replica/retention, keyed by topic name at the config
/// layer.
#[derive(Debug, Clone, Default)]
pub struct TopicOverride {
    pub partition_count: Option<u32>,
    pub replication_factor: Option<u32>,
    pub retention_ms: Option<u64>,
}
