//! HTTP implementation of the store contract.
//!
//! Speaks the store's REST conventions: filters as query parameters,
//! `Prefer: return=representation` on inserts, the API key as both `apikey`
//! header and bearer token. Rate-limited requests are retried with
//! exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use serde_json::Value;
use tracing::warn;

use crate::config::StoreConfig;
use crate::error::StoreError;

use super::{realtime, DataStore, Filter, Query, Row, Subscription};

/// HTTP request timeout in seconds.
/// 30s allows for slow store responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// HTTP client for the remote store.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpStore {
    client: Client,
    config: StoreConfig,
}

impl HttpStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, config })
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, StoreError> {
        let mut headers = header::HeaderMap::new();
        let key = header::HeaderValue::from_str(&self.config.api_key)
            .map_err(|e| StoreError::InvalidResponse(format!("Invalid API key: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|e| StoreError::InvalidResponse(format!("Invalid API key: {}", e)))?,
        );
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, StoreError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::from_status(status, &body))
        }
    }

    /// Issue a request, retrying on rate limits, and return the raw response.
    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        prefer: Option<&str>,
    ) -> Result<reqwest::Response, StoreError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self
                .client
                .request(method.clone(), url)
                .headers(self.auth_headers()?)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(prefer) = prefer {
                request = request.header("Prefer", prefer);
            }

            let response = request.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(StoreError::RateLimited);
                    }
                    warn!(url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    /// Render one filter to a query-string pair.
    fn render_filter(filter: &Filter) -> (String, String) {
        match filter {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", value)),
            Filter::Neq(column, value) => (column.clone(), format!("neq.{}", value)),
            Filter::In(column, values) => (column.clone(), format!("in.({})", values.join(","))),
            Filter::IsNull(column) => (column.clone(), "is.null".to_string()),
            Filter::Or(a, b) => (
                "or".to_string(),
                format!("({},{})", Self::render_condition(a), Self::render_condition(b)),
            ),
        }
    }

    /// Render a filter as a `column.op.value` condition for use inside `or=()`.
    fn render_condition(filter: &Filter) -> String {
        match filter {
            Filter::Eq(column, value) => format!("{}.eq.{}", column, value),
            Filter::Neq(column, value) => format!("{}.neq.{}", column, value),
            Filter::In(column, values) => format!("{}.in.({})", column, values.join(",")),
            Filter::IsNull(column) => format!("{}.is.null", column),
            Filter::Or(a, b) => {
                format!("or({},{})", Self::render_condition(a), Self::render_condition(b))
            }
        }
    }

    fn render_query(query: &Query) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = vec![("select".to_string(), "*".to_string())];
        for filter in &query.filters {
            params.push(Self::render_filter(filter));
        }
        if let Some((column, descending)) = &query.order {
            let direction = if *descending { "desc" } else { "asc" };
            params.push(("order".to_string(), format!("{}.{}", column, direction)));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = query.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        params
    }

    fn render_filters(filters: &[Filter]) -> Vec<(String, String)> {
        filters.iter().map(Self::render_filter).collect()
    }
}

#[async_trait]
impl DataStore for HttpStore {
    async fn select(&self, query: Query) -> Result<Vec<Row>, StoreError> {
        let url = self.config.rest_url(&query.table);
        let params = Self::render_query(&query);
        let response = self.send(Method::GET, &url, &params, None, None).await?;
        let rows: Vec<Row> = response.json().await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Row, StoreError> {
        let url = self.config.rest_url(table);
        let response = self
            .send(Method::POST, &url, &[], Some(&row), Some("return=representation"))
            .await?;
        // The store replies with an array containing the stored row
        let mut rows: Vec<Row> = response.json().await?;
        rows.pop()
            .ok_or_else(|| StoreError::InvalidResponse("Insert returned no rows".to_string()))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<(), StoreError> {
        let url = self.config.rest_url(table);
        let params = Self::render_filters(filters);
        self.send(Method::PATCH, &url, &params, Some(&patch), None).await?;
        Ok(())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        let url = self.config.rest_url(table);
        let params = Self::render_filters(filters);
        self.send(Method::DELETE, &url, &params, None, None).await?;
        Ok(())
    }

    async fn subscribe(&self, table: &str, filter: Filter) -> Result<Subscription, StoreError> {
        realtime::open_channel(&self.config, table, &filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_eq_filter() {
        let (k, v) = HttpStore::render_filter(&Filter::eq("org_id", "org-1"));
        assert_eq!((k.as_str(), v.as_str()), ("org_id", "eq.org-1"));
    }

    #[test]
    fn test_render_in_filter() {
        let (k, v) = HttpStore::render_filter(&Filter::within("orphan_id", ["a", "b", "c"]));
        assert_eq!((k.as_str(), v.as_str()), ("orphan_id", "in.(a,b,c)"));
    }

    #[test]
    fn test_render_or_filter() {
        let (k, v) = HttpStore::render_filter(&Filter::either(
            Filter::eq("participant_one", "u1"),
            Filter::eq("participant_two", "u1"),
        ));
        assert_eq!(k, "or");
        assert_eq!(v, "(participant_one.eq.u1,participant_two.eq.u1)");
    }

    #[test]
    fn test_render_query_order_and_range() {
        let query = Query::table("messages")
            .eq("conversation_id", "c1")
            .order_by("created_at", false)
            .page(1, 50);
        let params = HttpStore::render_query(&query);

        assert!(params.contains(&("select".to_string(), "*".to_string())));
        assert!(params.contains(&("conversation_id".to_string(), "eq.c1".to_string())));
        assert!(params.contains(&("order".to_string(), "created_at.asc".to_string())));
        assert!(params.contains(&("limit".to_string(), "50".to_string())));
        assert!(params.contains(&("offset".to_string(), "50".to_string())));
    }

    #[test]
    fn test_render_is_null() {
        let (k, v) = HttpStore::render_filter(&Filter::is_null("read_at"));
        assert_eq!((k.as_str(), v.as_str()), ("read_at", "is.null"));
    }
}
