//! Search/analytics store integration.
//!
//! The [`StoreClient`] trait is the seam between the phase sequence run by
//! [`StoreDispatcher`] and the transport that reaches the store. The
//! production transport is [`ElasticStoreClient`]; tests substitute a
//! recording fake.

pub mod dispatcher;
pub mod elastic;

use std::future::Future;
use std::pin::Pin;

use serde_json::{json, Value};

use crate::Result;

pub use dispatcher::StoreDispatcher;
pub use elastic::ElasticStoreClient;

/// Maximum number of documents returned by the recent-history search.
pub const RECENT_LIMIT: usize = 5;

/// Boxed future returned by every [`StoreClient`] call.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Document-store operations needed by the dispatch sequence.
///
/// Response bodies are returned as raw JSON; the dispatcher extracts the
/// fields it reports.
pub trait StoreClient: Send + Sync {
    /// Liveness probe. `Ok(false)` means reachable but unhealthy.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`](crate::AppError::Store) or
    /// [`AppError::Http`](crate::AppError::Http) when the store is unreachable.
    fn ping(&self) -> StoreFuture<'_, bool>;

    /// Create `index` with `mappings`, tolerating "already exists".
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`](crate::AppError::Store) on any other failure.
    fn create_index<'a>(&'a self, index: &'a str, mappings: &'a Value) -> StoreFuture<'a, Value>;

    /// Upsert `document` under `id`, visible to the next search.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`](crate::AppError::Store) if the write fails.
    fn index_document<'a>(
        &'a self,
        index: &'a str,
        id: &'a str,
        document: &'a Value,
    ) -> StoreFuture<'a, Value>;

    /// Run a search request body against `index`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`](crate::AppError::Store) if the search fails.
    fn search<'a>(&'a self, index: &'a str, body: &'a Value) -> StoreFuture<'a, Value>;

    /// Run a parameterized ES|QL query.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Store`](crate::AppError::Store) if the query fails.
    fn query<'a>(&'a self, query: &'a str, params: &'a [Value]) -> StoreFuture<'a, Value>;
}

/// Field mapping of the incidents index.
#[must_use]
pub fn incident_mappings() -> Value {
    json!({
        "properties": {
            "incident_id": {"type": "keyword"},
            "service": {"type": "keyword"},
            "severity": {"type": "keyword"},
            "summary": {"type": "text"},
            "status": {"type": "keyword"},
            "signals": {"type": "keyword"},
            "recommendation": {"type": "text"},
            "stakeholder_update": {"type": "text"},
            "created_at": {"type": "date"}
        }
    })
}

/// Search body for the most recent runs of `service`, newest first.
#[must_use]
pub fn recent_search_body(service: &str) -> Value {
    json!({
        "size": RECENT_LIMIT,
        "query": {"term": {"service": {"value": service}}},
        "sort": [{"created_at": {"order": "desc"}}]
    })
}

/// Count query over `index`, parameterized by service and severity.
#[must_use]
pub fn incident_count_query(index: &str) -> String {
    format!(
        "FROM {index} | WHERE service == ? AND severity == ? | STATS incident_count = COUNT(*)"
    )
}
