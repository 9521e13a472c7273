//! Elasticsearch REST transport for [`StoreClient`].

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::{StoreClient, StoreFuture};
use crate::{AppError, Result};

/// Longest slice of an error body kept in a store error message.
const ERROR_BODY_LIMIT: usize = 300;

/// Elasticsearch client authenticated with an API key.
#[derive(Clone)]
pub struct ElasticStoreClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for ElasticStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticStoreClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ElasticStoreClient {
    /// Create a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: String, timeout_seconds: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|err| AppError::Config(format!("failed to build store client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    /// Cluster base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("ApiKey {}", self.api_key))
    }

    /// Send a JSON request and decode the JSON response.
    ///
    /// Statuses in `tolerated` are returned as bodies rather than errors.
    async fn send_json(
        &self,
        request: RequestBuilder,
        body: &Value,
        tolerated: &[StatusCode],
    ) -> Result<Value> {
        let response = self
            .authorized(request)
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() && !tolerated.contains(&status) {
            let snippet: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(AppError::Store(format!("{status}: {snippet}")));
        }

        if text.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&text)
            .map_err(|err| AppError::Store(format!("invalid response body: {err}")))
    }
}

impl StoreClient for ElasticStoreClient {
    fn ping(&self) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let response = self
                .authorized(self.http.head(self.url("/")))
                .send()
                .await?;
            debug!(status = %response.status(), "store ping answered");
            Ok(response.status().is_success())
        })
    }

    fn create_index<'a>(&'a self, index: &'a str, mappings: &'a Value) -> StoreFuture<'a, Value> {
        Box::pin(async move {
            let body = json!({ "mappings": mappings });
            // 400 is "resource_already_exists_exception" on re-runs.
            self.send_json(
                self.http.put(self.url(index)),
                &body,
                &[StatusCode::BAD_REQUEST],
            )
            .await
        })
    }

    fn index_document<'a>(
        &'a self,
        index: &'a str,
        id: &'a str,
        document: &'a Value,
    ) -> StoreFuture<'a, Value> {
        Box::pin(async move {
            let url = self.url(&format!("{index}/_doc/{id}?refresh=wait_for"));
            self.send_json(self.http.put(url), document, &[]).await
        })
    }

    fn search<'a>(&'a self, index: &'a str, body: &'a Value) -> StoreFuture<'a, Value> {
        Box::pin(async move {
            let url = self.url(&format!("{index}/_search"));
            self.send_json(self.http.post(url), body, &[]).await
        })
    }

    fn query<'a>(&'a self, query: &'a str, params: &'a [Value]) -> StoreFuture<'a, Value> {
        Box::pin(async move {
            let body = json!({ "query": query, "params": params });
            self.send_json(self.http.post(self.url("_query")), &body, &[])
                .await
        })
    }
}
