//! ksqlDB REST transport, kept separate from [`crate::context`] so the wire shape of the
//! `/ksql` endpoint doesn't leak into the public query-composition surface.

use futures::stream::{self, Stream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// POST `/ksql` request body.
#[derive(Debug, Serialize)]
struct KsqlRequest<'a> {
    ksql: &'a str,
    #[serde(rename = "streamsProperties")]
    streams_properties: std::collections::HashMap<String, String>,
}

/// One response entry. ksqlDB returns an array; the entry that carries `statementText` on
/// success, or an error body on failure.
#[derive(Debug, Deserialize)]
struct KsqlResponseEntry {
    #[serde(rename = "statementText")]
    #[allow(dead_code)]
    statement_text: Option<String>,
    row: Option<RowPayload>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
    #[serde(rename = "error_code")]
    error_code: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RowPayload {
    columns: Option<Vec<Value>>,
}

/// A single materialized row, in column order, matching the statement's row format.
#[derive(Debug, Clone)]
pub struct KsqlRow {
    pub columns: Vec<Value>,
}

pub struct KsqlDbClient {
    http_client: Client,
    base_url: String,
}

impl KsqlDbClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn with_client(http_client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }

    fn post(&self, ksql: &str) -> reqwest::RequestBuilder {
        let request = KsqlRequest {
            ksql,
            streams_properties: Default::default(),
        };
        self.http_client
            .post(format!("{}/ksql", self.base_url))
            .header("Content-Type", "application/vnd.ksql.v1+json")
            .json(&request)
    }

    async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::RegistryTransport {
            attempts: 1,
            source: Box::new(Error::Schema(format!("ksqlDB returned {}: {}", status, body))),
        })
    }

    /// Executes one KSQL statement and returns every materialized row, buffered in full. Used
    /// for Pull queries and `CREATE` statements, where the whole result set is wanted at once.
    /// Push-query streaming goes through [`Self::execute_streaming`] instead.
    pub async fn execute(&self, ksql: &str) -> Result<Vec<KsqlRow>> {
        let response = Self::error_for_status(self.post(ksql).send().await?).await?;

        let entries: Vec<KsqlResponseEntry> = response.json().await?;
        let mut rows = Vec::new();
        for entry in entries {
            if let Some(row) = parse_entry(entry)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Executes one KSQL statement — normally a Push query (`EMIT CHANGES`) — and yields each
    /// row as it arrives on the wire rather than buffering the whole response. ksqlDB streams
    /// the `/ksql` response body as a growing JSON array; with no async-aware streaming-JSON
    /// crate in this stack, [`next_object`] scans the arriving bytes for complete top-level
    /// `{...}` objects (tracking string escaping and brace depth) and hands each one to
    /// `serde_json` as soon as its closing brace lands, instead of waiting for the array to
    /// close.
    pub async fn execute_streaming(&self, ksql: &str) -> Result<impl Stream<Item = Result<KsqlRow>>> {
        let response = Self::error_for_status(self.post(ksql).send().await?).await?;
        let bytes = response.bytes_stream();

        Ok(stream::unfold(
            (bytes, Vec::<u8>::new(), false),
            |(mut bytes, mut buffer, mut exhausted)| async move {
                loop {
                    if let Some(object) = next_object(&mut buffer) {
                        match serde_json::from_slice::<KsqlResponseEntry>(&object).map_err(Error::from).and_then(parse_entry) {
                            Ok(Some(row)) => return Some((Ok(row), (bytes, buffer, exhausted))),
                            Ok(None) => continue,
                            Err(err) => return Some((Err(err), (bytes, buffer, exhausted))),
                        }
                    }

                    if exhausted {
                        return None;
                    }

                    match futures::StreamExt::next(&mut bytes).await {
                        Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                        Some(Err(err)) => return Some((Err(Error::from(err)), (bytes, buffer, exhausted))),
                        None => exhausted = true,
                    }
                }
            },
        ))
    }
}

fn parse_entry(entry: KsqlResponseEntry) -> Result<Option<KsqlRow>> {
    if let Some(message) = entry.error_message {
        return Err(Error::SchemaRegistryError {
            error_code: entry.error_code.unwrap_or(0),
            message,
        });
    }
    Ok(entry.row.map(|row| KsqlRow {
        columns: row.columns.unwrap_or_default(),
    }))
}

/// Scans `buffer` for one complete top-level `{...}` object, honoring string escaping so a
/// brace inside a quoted value doesn't throw off the depth count. On a match, the object and
/// everything preceding it (the array's opening `[`, a separating `,`, whitespace) is drained
/// from `buffer`.
fn next_object(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = None;

    for (i, &byte) in buffer.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    if let Some(object_start) = start {
                        let object = buffer[object_start..=i].to_vec();
                        buffer.drain(..=i);
                        return Some(object);
                    }
                }
            }
            _ => {}
        }
    }
    None
}
