//! The upstream search-cluster client.
//!
//! [`SearchBackend`] is the seam between the gateway and the cluster: raw
//! request forwarding for proxied routes, plus the handful of document
//! operations the gateway itself performs against its `principals` and
//! `analytics` indices. [`EsBackend`] is the HTTP implementation.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::HeaderMap;
use http::{Method, StatusCode};
use reqwest::Client;
use serde_json::{Map, Value};

use searchgate_analytics::AnalyticsSink;
use searchgate_core::{GatewayError, GatewayResult};
use searchgate_middleware::BoxFuture;

/// A buffered response from the upstream cluster.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Upstream status.
    pub status: StatusCode,
    /// Upstream headers.
    pub headers: HeaderMap,
    /// Upstream body.
    pub body: Bytes,
}

/// Access to the upstream search cluster.
pub trait SearchBackend: Send + Sync + 'static {
    /// Forwards a request verbatim and returns the buffered response.
    ///
    /// `path_and_query` includes the query string. Hop-by-hop and credential
    /// headers must already be filtered by the caller.
    fn forward(
        &self,
        method: Method,
        path_and_query: String,
        headers: HeaderMap,
        body: Bytes,
    ) -> BoxFuture<'_, GatewayResult<UpstreamResponse>>;

    /// Fetches a document's source, `None` when it does not exist.
    fn get_doc<'a>(
        &'a self,
        index: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, GatewayResult<Option<Bytes>>>;

    /// Stores a document. With `create_only`, an existing document is a
    /// [`GatewayError::Conflict`].
    fn put_doc<'a>(
        &'a self,
        index: &'a str,
        id: &'a str,
        body: Bytes,
        create_only: bool,
    ) -> BoxFuture<'a, GatewayResult<()>>;

    /// Deletes a document; returns whether it existed.
    fn delete_doc<'a>(&'a self, index: &'a str, id: &'a str) -> BoxFuture<'a, GatewayResult<bool>>;

    /// Merge-upserts fields into a document.
    fn merge_doc<'a>(
        &'a self,
        index: &'a str,
        id: &'a str,
        doc: Value,
    ) -> BoxFuture<'a, GatewayResult<()>>;

    /// Checks that the cluster is reachable.
    fn ping(&self) -> BoxFuture<'_, GatewayResult<()>>;
}

/// HTTP implementation of [`SearchBackend`] over an Elasticsearch-compatible
/// cluster.
#[derive(Debug, Clone)]
pub struct EsBackend {
    client: Client,
    base_url: String,
}

impl EsBackend {
    /// Creates a client for the given base URL with a per-request deadline.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| GatewayError::internal(format!("failed to create http client: {e}")))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        headers: Option<HeaderMap>,
        body: Option<Bytes>,
    ) -> GatewayResult<UpstreamResponse> {
        let mut request = self.client.request(
            reqwest::Method::from_bytes(method.as_str().as_bytes())
                .map_err(|_| GatewayError::bad_request(format!("unsupported method: {method}")))?,
            self.url(path),
        );

        if let Some(headers) = headers {
            for (name, value) in &headers {
                request = request.header(name, value);
            }
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(map_transport_error)?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| GatewayError::internal(format!("invalid upstream status: {e}")))?;
        let headers = convert_headers(response.headers());
        let body = response.bytes().await.map_err(map_transport_error)?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

impl SearchBackend for EsBackend {
    fn forward(
        &self,
        method: Method,
        path_and_query: String,
        headers: HeaderMap,
        body: Bytes,
    ) -> BoxFuture<'_, GatewayResult<UpstreamResponse>> {
        Box::pin(async move {
            self.send(method, &path_and_query, Some(headers), Some(body))
                .await
        })
    }

    fn get_doc<'a>(
        &'a self,
        index: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, GatewayResult<Option<Bytes>>> {
        Box::pin(async move {
            let path = format!("/{index}/_doc/{id}");
            let response = self.send(Method::GET, &path, None, None).await?;

            if response.status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !response.status.is_success() {
                return Err(upstream_failure("document fetch", &response));
            }

            let parsed: Value = serde_json::from_slice(&response.body)
                .map_err(|e| GatewayError::upstream(format!("invalid document response: {e}")))?;
            let source = parsed
                .get("_source")
                .ok_or_else(|| GatewayError::upstream("document response missing _source"))?;
            let raw = serde_json::to_vec(source)
                .map_err(|e| GatewayError::internal(format!("failed to serialize source: {e}")))?;
            Ok(Some(Bytes::from(raw)))
        })
    }

    fn put_doc<'a>(
        &'a self,
        index: &'a str,
        id: &'a str,
        body: Bytes,
        create_only: bool,
    ) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            let path = if create_only {
                format!("/{index}/_create/{id}")
            } else {
                format!("/{index}/_doc/{id}")
            };

            let mut headers = HeaderMap::new();
            headers.insert(http::header::CONTENT_TYPE, "application/json".parse().expect("static"));

            let response = self.send(Method::PUT, &path, Some(headers), Some(body)).await?;

            if response.status == StatusCode::CONFLICT {
                return Err(GatewayError::conflict(format!(
                    r#"document "{id}" already exists"#
                )));
            }
            if !response.status.is_success() {
                return Err(upstream_failure("document write", &response));
            }
            Ok(())
        })
    }

    fn delete_doc<'a>(&'a self, index: &'a str, id: &'a str) -> BoxFuture<'a, GatewayResult<bool>> {
        Box::pin(async move {
            let path = format!("/{index}/_doc/{id}");
            let response = self.send(Method::DELETE, &path, None, None).await?;

            if response.status == StatusCode::NOT_FOUND {
                return Ok(false);
            }
            if !response.status.is_success() {
                return Err(upstream_failure("document delete", &response));
            }
            Ok(true)
        })
    }

    fn merge_doc<'a>(
        &'a self,
        index: &'a str,
        id: &'a str,
        doc: Value,
    ) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            let path = format!("/{index}/_update/{id}");
            let body = serde_json::json!({ "doc": doc, "doc_as_upsert": true });
            let raw = serde_json::to_vec(&body)
                .map_err(|e| GatewayError::internal(format!("failed to serialize update: {e}")))?;

            let mut headers = HeaderMap::new();
            headers.insert(http::header::CONTENT_TYPE, "application/json".parse().expect("static"));

            let response = self
                .send(Method::POST, &path, Some(headers), Some(Bytes::from(raw)))
                .await?;

            if response.status == StatusCode::CONFLICT {
                return Err(GatewayError::conflict(format!(
                    r#"concurrent update of document "{id}""#
                )));
            }
            if !response.status.is_success() {
                return Err(upstream_failure("document update", &response));
            }
            Ok(())
        })
    }

    fn ping(&self) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            let response = self.send(Method::GET, "/", None, None).await?;
            if response.status.is_success() {
                Ok(())
            } else {
                Err(upstream_failure("ping", &response))
            }
        })
    }
}

/// Persists analytics records into one index of a backend.
pub struct AnalyticsIndexSink {
    backend: Arc<dyn SearchBackend>,
    index: String,
}

impl AnalyticsIndexSink {
    /// Creates a sink writing into `index` on the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn SearchBackend>, index: impl Into<String>) -> Self {
        Self {
            backend,
            index: index.into(),
        }
    }
}

impl AnalyticsSink for AnalyticsIndexSink {
    fn upsert<'a>(
        &'a self,
        doc_id: &'a str,
        record: &'a Map<String, Value>,
    ) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            self.backend
                .merge_doc(&self.index, doc_id, Value::Object(record.clone()))
                .await
        })
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::upstream_timeout(format!("upstream deadline exceeded: {err}"))
    } else {
        GatewayError::upstream(format!("upstream request failed: {err}"))
    }
}

fn upstream_failure(what: &str, response: &UpstreamResponse) -> GatewayError {
    GatewayError::upstream_with_status(
        format!("{what} failed with status {}", response.status),
        response.status.as_u16(),
    )
}

fn convert_headers(headers: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            http::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            out.insert(name, value);
        }
    }
    out
}

/// Headers never forwarded in either direction.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Headers carrying gateway credentials, stripped before forwarding upstream.
const CREDENTIAL_HEADERS: &[&str] = &["authorization", "cookie"];

/// Returns whether a header is dropped when relaying a response downstream.
#[must_use]
pub fn is_hop_by_hop(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    HOP_BY_HOP_HEADERS.contains(&lower.as_str())
}

/// Filters request headers for forwarding to the upstream cluster.
#[must_use]
pub fn filter_upstream_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        let lower = name.as_str().to_ascii_lowercase();
        if HOP_BY_HOP_HEADERS.contains(&lower.as_str())
            || CREDENTIAL_HEADERS.contains(&lower.as_str())
        {
            continue;
        }
        out.insert(name.clone(), value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let backend = EsBackend::new("http://es:9200/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url("/idx/_search"), "http://es:9200/idx/_search");
    }

    #[test]
    fn test_is_hop_by_hop() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(is_hop_by_hop("content-length"));
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("x-search-id"));
    }

    #[test]
    fn test_filter_upstream_headers_strips_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc".parse().unwrap());
        headers.insert("cookie", "session=1".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("x-search-query", "shoes".parse().unwrap());

        let filtered = filter_upstream_headers(&headers);
        assert!(!filtered.contains_key("authorization"));
        assert!(!filtered.contains_key("cookie"));
        assert!(filtered.contains_key("content-type"));
        assert!(filtered.contains_key("x-search-query"));
    }
}
