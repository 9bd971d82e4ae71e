//! The response tee.
//!
//! [`Recorder`] is attached as plugin middleware on search routes. It runs
//! the downstream handler, relays the response to the client byte-identically
//! and, for annotated search requests, stamps the effective `X-Search-Id` on
//! the response and forks a capture into the analytics queue. Enqueueing is
//! non-blocking and happens for every response the upstream actually
//! produced, error statuses included; only a failed or timed-out upstream
//! call produces no event.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, StatusCode};
use http_body_util::{BodyExt, Full};
use searchgate_core::{AclCategory, RequestEnvelope};
use searchgate_middleware::{BoxFuture, Middleware, Next, Request, Response};
use uuid::Uuid;

use crate::event::SearchCapture;
use crate::headers::{
    X_SEARCH_CLICK, X_SEARCH_CLICK_POSITION, X_SEARCH_CONVERSION, X_SEARCH_CUSTOM_EVENT,
    X_SEARCH_FILTERS, X_SEARCH_ID, X_SEARCH_QUERY,
};
use crate::writer::AnalyticsRecorder;

/// Tee middleware for search routes; see the module docs.
#[derive(Clone)]
pub struct Recorder {
    analytics: AnalyticsRecorder,
}

impl Recorder {
    /// Creates a recorder feeding the given analytics queue.
    #[must_use]
    pub fn new(analytics: AnalyticsRecorder) -> Self {
        Self { analytics }
    }
}

impl Middleware for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestEnvelope,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let search_query = header_string(request.headers(), X_SEARCH_QUERY);
            let client_id = header_string(request.headers(), X_SEARCH_ID);

            let is_annotated_search = ctx.category() == Some(AclCategory::Search)
                && (search_query.is_some() || client_id.is_some());
            if !is_annotated_search {
                return next.run(ctx, request).await;
            }

            let doc_id = client_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            // Everything needed from the request, gathered before it moves
            // into the downstream handler.
            let path = request.uri().path().to_string();
            let ip = client_ip(request.headers(), ctx);
            let filters = header_string(request.headers(), X_SEARCH_FILTERS);
            let click = header_string(request.headers(), X_SEARCH_CLICK);
            let click_position = header_string(request.headers(), X_SEARCH_CLICK_POSITION);
            let conversion = header_string(request.headers(), X_SEARCH_CONVERSION);
            let custom_events = header_string(request.headers(), X_SEARCH_CUSTOM_EVENT);

            let response = next.run(ctx, request).await;

            let (mut parts, body) = response.into_parts();
            let body_bytes = collect_body(body).await;

            if let Ok(value) = doc_id.parse() {
                parts
                    .headers
                    .insert(HeaderName::from_static(X_SEARCH_ID), value);
            }
            // A 502/504 here is the gateway reporting that the upstream call
            // failed or timed out: there is no search response to record.
            // Everything else, including cluster error responses relayed
            // verbatim, goes to the worker, which drops whatever it cannot
            // parse.
            let upstream_failed = matches!(
                parts.status,
                StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT
            );

            if !upstream_failed {
                self.analytics.enqueue(SearchCapture {
                    doc_id,
                    is_origin: client_id.is_none(),
                    path,
                    indices: ctx.indices().to_vec(),
                    ip,
                    search_query,
                    filters,
                    click,
                    click_position,
                    conversion,
                    custom_events,
                    body: body_bytes.clone(),
                });
            }

            Response::from_parts(parts, Full::new(body_bytes))
        })
    }
}

async fn collect_body(body: Full<Bytes>) -> Bytes {
    match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// The client address: the first `X-Forwarded-For` entry when present,
/// otherwise the peer address of the connection.
fn client_ip(headers: &HeaderMap, ctx: &RequestEnvelope) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    ctx.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use tokio::sync::mpsc;

    fn recorder() -> (Recorder, mpsc::Receiver<SearchCapture>) {
        let (tx, rx) = mpsc::channel(16);
        (Recorder::new(AnalyticsRecorder::with_channel(tx)), rx)
    }

    fn search_envelope() -> RequestEnvelope {
        let mut ctx = RequestEnvelope::new();
        ctx.set_category(AclCategory::Search);
        ctx.set_indices(vec!["myidx".to_string()]);
        ctx
    }

    fn request(headers: &[(&str, &str)]) -> Request {
        let mut builder = http::Request::builder().uri("/myidx/_search");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    fn upstream_ok(body: &'static [u8]) -> Next<'static> {
        Next::handler(move |_ctx, _req| {
            Box::pin(async move {
                http::Response::builder()
                    .status(StatusCode::OK)
                    .body(Full::new(Bytes::from_static(body)))
                    .unwrap()
            })
        })
    }

    const BODY: &[u8] = br#"{"took":7,"hits":{"total":2,"hits":[]}}"#;

    async fn response_body(response: Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_annotated_search_gets_id_and_capture() {
        let (recorder, mut rx) = recorder();
        let mut ctx = search_envelope();

        let response = recorder
            .process(&mut ctx, request(&[(X_SEARCH_QUERY, "shoes")]), upstream_ok(BODY))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let id = response
            .headers()
            .get(X_SEARCH_ID)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(response_body(response).await, Bytes::from_static(BODY));

        let capture = rx.try_recv().unwrap();
        assert_eq!(capture.doc_id, id);
        assert!(capture.is_origin);
        assert_eq!(capture.search_query.as_deref(), Some("shoes"));
        assert_eq!(capture.indices, ["myidx".to_string()]);
        assert_eq!(capture.body, Bytes::from_static(BODY));
    }

    #[tokio::test]
    async fn test_client_supplied_id_is_echoed() {
        let (recorder, mut rx) = recorder();
        let mut ctx = search_envelope();

        let response = recorder
            .process(
                &mut ctx,
                request(&[(X_SEARCH_ID, "prev-id"), (X_SEARCH_CLICK, "true")]),
                upstream_ok(BODY),
            )
            .await;

        assert_eq!(response.headers().get(X_SEARCH_ID).unwrap(), "prev-id");

        let capture = rx.try_recv().unwrap();
        assert_eq!(capture.doc_id, "prev-id");
        assert!(!capture.is_origin);
        assert_eq!(capture.click.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_unannotated_search_passes_through() {
        let (recorder, mut rx) = recorder();
        let mut ctx = search_envelope();

        let response = recorder.process(&mut ctx, request(&[]), upstream_ok(BODY)).await;

        assert!(response.headers().get(X_SEARCH_ID).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_non_search_category_passes_through() {
        let (recorder, mut rx) = recorder();
        let mut ctx = RequestEnvelope::new();
        ctx.set_category(AclCategory::User);

        let response = recorder
            .process(&mut ctx, request(&[(X_SEARCH_QUERY, "shoes")]), upstream_ok(BODY))
            .await;

        assert!(response.headers().get(X_SEARCH_ID).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_upstream_timeout_sets_id_but_records_nothing() {
        let (recorder, mut rx) = recorder();
        let mut ctx = search_envelope();

        let timed_out = Next::handler(|_ctx, _req| {
            Box::pin(async {
                http::Response::builder()
                    .status(StatusCode::GATEWAY_TIMEOUT)
                    .body(Full::new(Bytes::new()))
                    .unwrap()
            })
        });

        let response = recorder
            .process(&mut ctx, request(&[(X_SEARCH_QUERY, "shoes")]), timed_out)
            .await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(response.headers().get(X_SEARCH_ID).is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_relayed_cluster_error_is_still_captured() {
        let (recorder, mut rx) = recorder();
        let mut ctx = search_envelope();

        // The cluster rejecting a query is a real upstream response; the
        // capture reaches the worker even though the status is an error.
        let rejected = Next::handler(|_ctx, _req| {
            Box::pin(async {
                http::Response::builder()
                    .status(StatusCode::BAD_REQUEST)
                    .body(Full::new(Bytes::from_static(b"{\"error\":\"parse\"}")))
                    .unwrap()
            })
        });

        let response = recorder
            .process(&mut ctx, request(&[(X_SEARCH_QUERY, "shoes")]), rejected)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let capture = rx.try_recv().unwrap();
        assert_eq!(capture.body, Bytes::from_static(b"{\"error\":\"parse\"}"));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        let ctx = RequestEnvelope::new();
        assert_eq!(client_ip(&headers, &ctx), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let ctx = RequestEnvelope::new().with_peer_addr("192.0.2.7:443".parse().unwrap());
        assert_eq!(client_ip(&headers, &ctx), "192.0.2.7");
    }
}
