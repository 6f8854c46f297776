use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::config::SearchConfig;
use crate::error::{PipelineError, Result};
use crate::purge::PurgeRule;
use crate::storage::SearchIndex;
use crate::types::{BulkFailure, BulkResponse, Document, PartialUpdate, ScrollPage, StoredDocument};

/// Elasticsearch REST client
pub struct ElasticClient {
    http: Client,
    base_url: String,
    scroll_keep_alive: String,
}

impl std::fmt::Debug for ElasticClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticClient")
            .field("base_url", &self.base_url)
            .field("scroll_keep_alive", &self.scroll_keep_alive)
            .finish()
    }
}

#[derive(Deserialize)]
struct BulkReply {
    #[serde(default)]
    items: Vec<std::collections::HashMap<String, BulkItem>>,
}

#[derive(Deserialize)]
struct BulkItem {
    #[serde(rename = "_id")]
    id: Option<String>,
    status: u16,
    error: Option<Value>,
}

#[derive(Deserialize)]
struct SearchReply {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Document,
}

#[derive(Deserialize)]
struct CountReply {
    count: u64,
}

#[derive(Deserialize)]
struct ByQueryReply {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    created: u64,
    #[serde(default)]
    deleted: u64,
    #[serde(default)]
    failures: Vec<Value>,
}

impl ElasticClient {
    /// Build the HTTP client without touching the network.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let base_url = config.url()?.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("ApiKey {key}"))
                .map_err(|e| PipelineError::Config(format!("Invalid API key: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url,
            scroll_keep_alive: config.scroll_keep_alive.clone(),
        })
    }

    /// Build the client and confirm the service answers.
    pub async fn connect(config: &SearchConfig) -> Result<Self> {
        let client = Self::new(config)?;
        match client.ping().await {
            Ok(true) => {
                info!("Connected to search service at {}", client.base_url);
                Ok(client)
            }
            Ok(false) => Err(PipelineError::Connection(format!(
                "{} did not answer the ping; check CLOUD_URL or API_KEY",
                client.base_url
            ))),
            Err(e) => Err(PipelineError::Connection(e.to_string())),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(PipelineError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn ndjson(lines: &[Value]) -> String {
        let mut body = String::new();
        for line in lines {
            body.push_str(&line.to_string());
            body.push('\n');
        }
        body
    }

    async fn bulk(&self, index: &str, lines: Vec<Value>) -> Result<BulkResponse> {
        let request = self
            .http
            .post(self.url(&format!("{index}/_bulk")))
            .query(&[("refresh", "true")])
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(Self::ndjson(&lines));
        let reply: BulkReply = self.send(request).await?.json().await?;
        Ok(summarize_bulk(reply))
    }

    fn scroll_page(reply: SearchReply) -> ScrollPage {
        ScrollPage {
            scroll_id: reply.scroll_id,
            hits: reply
                .hits
                .hits
                .into_iter()
                .map(|h| StoredDocument {
                    id: h.id,
                    source: h.source,
                })
                .collect(),
        }
    }
}

/// Collection settings sent on creation. Date detection stays off so a column
/// holding both `YYYY-MM-DD` and `unknown` maps as text instead of rejecting rows.
fn index_body() -> Value {
    json!({ "mappings": { "date_detection": false } })
}

fn summarize_bulk(reply: BulkReply) -> BulkResponse {
    let mut response = BulkResponse::default();
    for item in reply.items.into_iter().flat_map(|entry| entry.into_values()) {
        match item.error {
            None if item.status < 300 => response.succeeded += 1,
            error => response.failures.push(BulkFailure {
                id: item.id,
                reason: error
                    .map(|e| {
                        e.get("reason")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| e.to_string())
                    })
                    .unwrap_or_else(|| format!("status {}", item.status)),
            }),
        }
    }
    response
}

fn failures_to_error(failures: &[Value]) -> Option<PipelineError> {
    if failures.is_empty() {
        return None;
    }
    Some(PipelineError::Api {
        status: 500,
        message: format!("{} failures, first: {}", failures.len(), failures[0]),
    })
}

#[async_trait]
impl SearchIndex for ElasticClient {
    async fn ping(&self) -> Result<bool> {
        let response = self.http.get(self.url("/")).send().await?;
        debug!("Ping returned {}", response.status());
        Ok(response.status().is_success())
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self.http.head(self.url(index)).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(PipelineError::Api {
                status: status.as_u16(),
                message: format!("unexpected status checking index '{index}'"),
            }),
        }
    }

    async fn create_index(&self, index: &str) -> Result<()> {
        let request = self.http.put(self.url(index)).json(&index_body());
        self.send(request).await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        match self.send(self.http.delete(self.url(index))).await {
            Ok(_) => Ok(()),
            Err(PipelineError::Api { status: 404, .. }) => {
                debug!("Index {} already absent", index);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let reply: CountReply = self
            .send(self.http.get(self.url(&format!("{index}/_count"))))
            .await?
            .json()
            .await?;
        Ok(reply.count)
    }

    #[instrument(skip(self))]
    async fn reindex(&self, source: &str, target: &str) -> Result<u64> {
        let request = self
            .http
            .post(self.url("_reindex"))
            .query(&[("wait_for_completion", "true"), ("refresh", "true")])
            .json(&json!({
                "source": { "index": source },
                "dest": { "index": target }
            }));
        let reply: ByQueryReply = self.send(request).await?.json().await?;
        if let Some(err) = failures_to_error(&reply.failures) {
            return Err(err);
        }
        Ok(reply.created.max(reply.total))
    }

    async fn bulk_insert(&self, index: &str, docs: &[Document]) -> Result<BulkResponse> {
        let mut lines = Vec::with_capacity(docs.len() * 2);
        for doc in docs {
            lines.push(json!({ "index": {} }));
            lines.push(serde_json::to_value(doc)?);
        }
        self.bulk(index, lines).await
    }

    async fn bulk_update(&self, index: &str, updates: &[PartialUpdate]) -> Result<BulkResponse> {
        let mut lines = Vec::with_capacity(updates.len() * 2);
        for update in updates {
            lines.push(json!({ "update": { "_id": update.id } }));
            lines.push(json!({ "doc": update.doc }));
        }
        self.bulk(index, lines).await
    }

    #[instrument(skip(self, rule))]
    async fn delete_by_query(&self, index: &str, rule: &PurgeRule) -> Result<u64> {
        let request = self
            .http
            .post(self.url(&format!("{index}/_delete_by_query")))
            .query(&[("refresh", "true"), ("conflicts", "proceed")])
            .json(&json!({ "query": rule.to_query() }));
        let reply: ByQueryReply = self.send(request).await?.json().await?;
        if let Some(err) = failures_to_error(&reply.failures) {
            return Err(err);
        }
        Ok(reply.deleted)
    }

    async fn open_scroll(&self, index: &str, page_size: usize) -> Result<ScrollPage> {
        let request = self
            .http
            .post(self.url(&format!("{index}/_search")))
            .query(&[("scroll", self.scroll_keep_alive.as_str())])
            .json(&json!({
                "size": page_size,
                "sort": ["_doc"],
                "query": { "match_all": {} }
            }));
        let reply: SearchReply = self.send(request).await?.json().await?;
        Ok(Self::scroll_page(reply))
    }

    async fn next_scroll(&self, scroll_id: &str) -> Result<ScrollPage> {
        let request = self
            .http
            .post(self.url("_search/scroll"))
            .json(&json!({ "scroll": self.scroll_keep_alive, "scroll_id": scroll_id }));
        let reply: SearchReply = self.send(request).await?.json().await?;
        Ok(Self::scroll_page(reply))
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        let request = self
            .http
            .delete(self.url("_search/scroll"))
            .json(&json!({ "scroll_id": scroll_id }));
        self.send(request).await?;
        Ok(())
    }
}
