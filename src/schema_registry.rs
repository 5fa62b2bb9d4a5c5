//! `SchemaRegistryClient`: register/fetch/compatibility over Confluent Schema Registry.
//! Retries are explicitly not this module's job; every operation here is a single HTTP round
//! trip, short-circuited by the local cache when possible.

use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

lazy_static! {
    static ref HEADERS: HeaderMap = {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.schemaregistry.v1+json"),
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.schemaregistry.v1+json"),
        );
        headers
    };
}

/// `{ subject, schema_id, version, schema_text, registered_at, last_used }`.
#[derive(Debug, Clone)]
pub struct RegisteredSchema {
    pub subject: String,
    pub schema_id: u32,
    pub version: u32,
    pub schema_text: String,
    pub registered_at: u64,
    pub last_used: u64,
}

/// Local `(subject, fingerprint) -> RegisteredSchema` cache. Unbounded here; an eviction policy
/// is left to the application.
#[derive(Default)]
pub struct SchemaRegistryClient {
    http_client: Client,
    base_url: String,
    basic_auth_user_info: Option<String>,
    by_subject_fingerprint: DashMap<(String, u64), Arc<RegisteredSchema>>,
    by_id: DashMap<u32, Arc<RegisteredSchema>>,
}

impl SchemaRegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, None)
    }

    pub fn with_client(
        http_client: Client,
        base_url: impl Into<String>,
        basic_auth_user_info: Option<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            basic_auth_user_info,
            by_subject_fingerprint: DashMap::new(),
            by_id: DashMap::new(),
        }
    }

    /// Idempotent by `(subject, fingerprint)`: a cache hit short-circuits the remote call
    /// entirely.
    pub async fn register(&self, subject: &str, schema_text: &str) -> Result<u32> {
        let fp = crate::avro::fingerprint(schema_text);
        if let Some(existing) = self.by_subject_fingerprint.get(&(subject.to_owned(), fp)) {
            return Ok(existing.schema_id);
        }

        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        let body = RegisterRequest {
            schema: schema_text,
            schema_type: "AVRO",
        };
        let response: RegisterResponse = self.post(&url, &body).await?;

        let registered = Arc::new(RegisteredSchema {
            subject: subject.to_owned(),
            schema_id: response.id,
            version: 0,
            schema_text: schema_text.to_owned(),
            registered_at: 0,
            last_used: 0,
        });
        self.by_subject_fingerprint
            .insert((subject.to_owned(), fp), Arc::clone(&registered));
        self.by_id.insert(response.id, Arc::clone(&registered));
        Ok(response.id)
    }

    /// `register_topic(topic, key_schema, value_schema) -> (key_id, value_id)`, under the
    /// canonical subject names.
    pub async fn register_topic(
        &self,
        topic: &str,
        key_schema: &str,
        value_schema: &str,
    ) -> Result<(u32, u32)> {
        let key_id = self.register(&format!("{}-key", topic), key_schema).await?;
        let value_id = self.register(&format!("{}-value", topic), value_schema).await?;
        Ok((key_id, value_id))
    }

    pub async fn get_latest(&self, subject: &str) -> Result<RegisteredSchema> {
        let url = format!("{}/subjects/{}/versions/latest", self.base_url, subject);
        self.fetch_and_cache(&url, subject).await
    }

    pub async fn get_by_id(&self, schema_id: u32) -> Result<RegisteredSchema> {
        if let Some(cached) = self.by_id.get(&schema_id) {
            return Ok((**cached).clone());
        }
        let url = format!("{}/schemas/ids/{}", self.base_url, schema_id);
        let response: SchemaOnlyResponse = self.get(&url).await?;
        let registered = RegisteredSchema {
            subject: String::new(),
            schema_id,
            version: 0,
            schema_text: response.schema,
            registered_at: 0,
            last_used: 0,
        };
        self.by_id.insert(schema_id, Arc::new(registered.clone()));
        Ok(registered)
    }

    pub async fn get_version(&self, subject: &str, version: u32) -> Result<RegisteredSchema> {
        let url = format!("{}/subjects/{}/versions/{}", self.base_url, subject, version);
        self.fetch_and_cache(&url, subject).await
    }

    pub async fn list_versions(&self, subject: &str) -> Result<Vec<u32>> {
        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        self.get(&url).await
    }

    pub async fn list_subjects(&self) -> Result<Vec<String>> {
        let url = format!("{}/subjects", self.base_url);
        self.get(&url).await
    }

    /// `false` on any error, including transport failure.
    pub async fn check_compatibility(&self, subject: &str, schema_text: &str) -> bool {
        let url = format!(
            "{}/compatibility/subjects/{}/versions/latest",
            self.base_url, subject
        );
        let body = RegisterRequest {
            schema: schema_text,
            schema_type: "AVRO",
        };
        match self.post::<_, CompatibilityResponse>(&url, &body).await {
            Ok(response) => response.is_compatible,
            Err(_) => false,
        }
    }

    async fn fetch_and_cache(&self, url: &str, subject: &str) -> Result<RegisteredSchema> {
        let response: VersionResponse = self.get(url).await?;
        let fp = crate::avro::fingerprint(&response.schema);
        let registered = RegisteredSchema {
            subject: subject.to_owned(),
            schema_id: response.id,
            version: response.version,
            schema_text: response.schema,
            registered_at: 0,
            last_used: 0,
        };
        let arc = Arc::new(registered.clone());
        self.by_subject_fingerprint
            .insert((subject.to_owned(), fp), Arc::clone(&arc));
        self.by_id.insert(response.id, arc);
        Ok(registered)
    }

    fn request_headers(&self) -> HeaderMap {
        let mut headers = HEADERS.clone();
        if let Some(ref auth) = self.basic_auth_user_info {
            if let Some((user, pass)) = auth.split_once(':') {
                let encoded = basic_auth_value(user, pass);
                if let Ok(value) = HeaderValue::from_str(&encoded) {
                    headers.insert(reqwest::header::AUTHORIZATION, value);
                }
            }
        }
        headers
    }

    async fn get<D: serde::de::DeserializeOwned>(&self, url: &str) -> Result<D> {
        let response = self
            .http_client
            .get(url)
            .headers(self.request_headers())
            .send()
            .await?;
        Self::parse_or_error(response).await
    }

    async fn post<B: Serialize, D: serde::de::DeserializeOwned>(&self, url: &str, body: &B) -> Result<D> {
        let response = self
            .http_client
            .post(url)
            .headers(self.request_headers())
            .json(body)
            .send()
            .await?;
        Self::parse_or_error(response).await
    }

    async fn parse_or_error<D: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<D> {
        if !response.status().is_success() {
            let status = response.status();
            let body: RegistryErrorBody = response.json().await.unwrap_or(RegistryErrorBody {
                error_code: status.as_u16() as u32,
                message: None,
            });
            return Err(Error::SchemaRegistryError {
                error_code: body.error_code,
                message: body
                    .message
                    .unwrap_or_else(|| "unexpected error from the schema registry".to_owned()),
            });
        }
        Ok(response.json().await?)
    }
}

/// Lightweight Basic-auth header value, mirroring the single `basic_auth_user_info`
/// configuration option rather than pulling in a dedicated basic-auth crate.
fn basic_auth_value(user: &str, pass: &str) -> String {
    use std::io::Write;
    let mut encoded = String::from("Basic ");
    let raw = format!("{}:{}", user, pass);
    let mut buf = Vec::new();
    let _ = buf.write_all(raw.as_bytes());
    encoded.push_str(&base64_encode(&buf));
    encoded
}

/// Minimal base64 encoder (standard alphabet, padded) — this crate's dependency stack has no
/// `base64` crate, and a Basic-auth header is the only place this crate needs one.
fn base64_encode(input: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((input.len() + 2) / 3 * 4);
    for chunk in input.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        let n = ((b0 as u32) << 16) | ((b1 as u32) << 8) | (b2 as u32);
        out.push(ALPHABET[(n >> 18 & 0x3F) as usize] as char);
        out.push(ALPHABET[(n >> 12 & 0x3F) as usize] as char);
        out.push(if chunk.len() > 1 { ALPHABET[(n >> 6 & 0x3F) as usize] as char } else { '=' });
        out.push(if chunk.len() > 2 { ALPHABET[(n & 0x3F) as usize] as char } else { '=' });
    }
    out
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    schema: &'a str,
    #[serde(rename = "schemaType")]
    schema_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct SchemaOnlyResponse {
    schema: String,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[allow(dead_code)]
    subject: Option<String>,
    id: u32,
    version: u32,
    schema: String,
}

#[derive(Debug, Deserialize)]
struct CompatibilityResponse {
    #[serde(rename = "is_compatible")]
    is_compatible: bool,
}

#[derive(Debug, Deserialize)]
struct RegistryErrorBody {
    error_code: u32,
    message: Option<String>,
}
