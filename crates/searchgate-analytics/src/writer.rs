//! The analytics write path.
//!
//! One logical writer per process: captures flow through a bounded in-memory
//! queue into a single worker task. Enqueueing never blocks — on overflow the
//! newest capture is dropped and counted. The worker parses each capture,
//! assembles the event record, enriches it with geo data under a short
//! deadline, and persists it with a longer best-effort deadline. Every
//! failure on this path is logged and discarded; nothing here is ever
//! user-visible.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use searchgate_core::GatewayError;
use searchgate_middleware::BoxFuture;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::{self, SearchCapture};
use crate::geo::GeoLookup;
use crate::response;

/// Destination for assembled event records.
///
/// `upsert` must merge: writing a partial record under an existing document
/// id updates the named fields and leaves the rest intact.
pub trait AnalyticsSink: Send + Sync + 'static {
    /// Merge-upserts a record under the given document id.
    fn upsert<'a>(
        &'a self,
        doc_id: &'a str,
        record: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), GatewayError>>;
}

/// Tuning for the analytics write path.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Bounded queue capacity; overflow drops the newest capture.
    pub queue_capacity: usize,
    /// Record every response of an `_msearch` envelope instead of only the
    /// first; extra responses persist under `<id>-<n>`.
    pub record_all_msearch_responses: bool,
    /// Deadline for each geo lookup.
    pub geo_timeout: Duration,
    /// Deadline for each sink write.
    pub write_timeout: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            record_all_msearch_responses: false,
            geo_timeout: Duration::from_millis(500),
            write_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle to the analytics queue; cheap to clone.
#[derive(Clone)]
pub struct AnalyticsRecorder {
    tx: mpsc::Sender<SearchCapture>,
    dropped: Arc<AtomicU64>,
}

impl AnalyticsRecorder {
    /// Spawns the worker task and returns the queue handle.
    #[must_use]
    pub fn spawn(
        sink: Arc<dyn AnalyticsSink>,
        geo: Arc<dyn GeoLookup>,
        config: AnalyticsConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        tokio::spawn(worker(rx, sink, geo, config));
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueues a capture without waiting.
    ///
    /// On a full queue the capture is dropped, counted and logged.
    pub fn enqueue(&self, capture: SearchCapture) {
        if let Err(err) = self.tx.try_send(capture) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(total_dropped = dropped, error = %err, "analytics queue full, capture dropped");
        }
    }

    /// Returns how many captures have been dropped on overflow.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Builds a handle over an externally owned channel, with no worker.
    #[cfg(test)]
    pub(crate) fn with_channel(tx: mpsc::Sender<SearchCapture>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }
}

async fn worker(
    mut rx: mpsc::Receiver<SearchCapture>,
    sink: Arc<dyn AnalyticsSink>,
    geo: Arc<dyn GeoLookup>,
    config: AnalyticsConfig,
) {
    while let Some(capture) = rx.recv().await {
        record_capture(&capture, sink.as_ref(), geo.as_ref(), &config).await;
    }
    debug!("analytics worker stopped");
}

/// Processes one capture end to end. All failures log and return.
async fn record_capture(
    capture: &SearchCapture,
    sink: &dyn AnalyticsSink,
    geo: &dyn GeoLookup,
    config: &AnalyticsConfig,
) {
    let body = response::normalize(&capture.body);
    let responses = match response::parse(&body, capture.is_msearch()) {
        Ok(responses) => responses,
        Err(err) => {
            warn!(search_id = %capture.doc_id, error = %err, "unable to parse search response");
            return;
        }
    };
    if responses.is_empty() {
        return;
    }

    let recorded = if capture.is_msearch() && config.record_all_msearch_responses {
        responses.len()
    } else {
        1
    };

    for (i, response) in responses.iter().take(recorded).enumerate() {
        let doc_id = if i == 0 {
            capture.doc_id.clone()
        } else {
            format!("{}-{i}", capture.doc_id)
        };

        let mut record = event::build_record(capture, response);

        match tokio::time::timeout(config.geo_timeout, geo.coordinates(&capture.ip)).await {
            Ok(Ok(coordinates)) => {
                record.insert(
                    "location".to_string(),
                    serde_json::to_value(coordinates).unwrap_or(Value::Null),
                );
            }
            Ok(Err(err)) => debug!(ip = %capture.ip, error = %err, "no coordinates for address"),
            Err(_) => warn!(ip = %capture.ip, "geo coordinate lookup timed out"),
        }

        match tokio::time::timeout(config.geo_timeout, geo.country(&capture.ip)).await {
            Ok(Ok(country)) => {
                record.insert("country".to_string(), country.into());
            }
            Ok(Err(err)) => debug!(ip = %capture.ip, error = %err, "no country for address"),
            Err(_) => warn!(ip = %capture.ip, "geo country lookup timed out"),
        }

        match tokio::time::timeout(config.write_timeout, sink.upsert(&doc_id, &record)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(search_id = %doc_id, error = %err, "analytics write failed"),
            Err(_) => warn!(search_id = %doc_id, "analytics write timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Coordinates, DisabledGeo, GeoError};
    use bytes::Bytes;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MemorySink {
        records: Mutex<Vec<(String, Map<String, Value>)>>,
    }

    impl AnalyticsSink for MemorySink {
        fn upsert<'a>(
            &'a self,
            doc_id: &'a str,
            record: &'a Map<String, Value>,
        ) -> BoxFuture<'a, Result<(), GatewayError>> {
            Box::pin(async move {
                self.records.lock().push((doc_id.to_string(), record.clone()));
                Ok(())
            })
        }
    }

    struct FixedGeo;

    impl GeoLookup for FixedGeo {
        fn coordinates<'a>(
            &'a self,
            _addr: &'a str,
        ) -> BoxFuture<'a, Result<Coordinates, GeoError>> {
            Box::pin(async { Ok(Coordinates { lat: 1.0, lon: 2.0 }) })
        }

        fn country<'a>(&'a self, _addr: &'a str) -> BoxFuture<'a, Result<String, GeoError>> {
            Box::pin(async { Ok("Wonderland".to_string()) })
        }
    }

    fn capture(body: &'static [u8], path: &str) -> SearchCapture {
        SearchCapture {
            doc_id: "sid".to_string(),
            is_origin: true,
            path: path.to_string(),
            indices: vec!["myidx".to_string()],
            ip: "203.0.113.9".to_string(),
            search_query: Some("shoes".to_string()),
            filters: None,
            click: None,
            click_position: None,
            conversion: None,
            custom_events: None,
            body: Bytes::from_static(body),
        }
    }

    const SEARCH_BODY: &[u8] =
        br#"{"took":7,"hits":{"total":2,"hits":[{"_id":"a","_type":"t","_source":{"k":1}}]}}"#;

    #[tokio::test]
    async fn test_records_single_search() {
        let sink = MemorySink::default();
        let config = AnalyticsConfig::default();

        record_capture(
            &capture(SEARCH_BODY, "/myidx/_search"),
            &sink,
            &FixedGeo,
            &config,
        )
        .await;

        let records = sink.records.lock();
        assert_eq!(records.len(), 1);
        let (doc_id, record) = &records[0];
        assert_eq!(doc_id, "sid");
        assert_eq!(record["took"], 7.0);
        assert_eq!(record["total_hits"], 2);
        assert_eq!(record["location"]["lat"], 1.0);
        assert_eq!(record["country"], "Wonderland");
    }

    #[tokio::test]
    async fn test_geo_failure_omits_fields() {
        let sink = MemorySink::default();
        let config = AnalyticsConfig::default();

        record_capture(
            &capture(SEARCH_BODY, "/myidx/_search"),
            &sink,
            &DisabledGeo,
            &config,
        )
        .await;

        let records = sink.records.lock();
        let (_, record) = &records[0];
        assert!(!record.contains_key("location"));
        assert!(!record.contains_key("country"));
        assert_eq!(record["ip"], "203.0.113.9");
    }

    #[tokio::test]
    async fn test_unparseable_body_records_nothing() {
        let sink = MemorySink::default();
        let config = AnalyticsConfig::default();

        record_capture(&capture(b"not json", "/x/_search"), &sink, &DisabledGeo, &config).await;

        assert!(sink.records.lock().is_empty());
    }

    const MSEARCH_BODY: &[u8] = br#"{"responses":[
        {"took":1,"hits":{"total":1,"hits":[]}},
        {"took":2,"hits":{"total":5,"hits":[]}}]}"#;

    #[tokio::test]
    async fn test_msearch_records_first_by_default() {
        let sink = MemorySink::default();
        let config = AnalyticsConfig::default();

        record_capture(&capture(MSEARCH_BODY, "/_msearch"), &sink, &DisabledGeo, &config).await;

        let records = sink.records.lock();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1["took"], 1.0);
    }

    #[tokio::test]
    async fn test_msearch_records_all_when_configured() {
        let sink = MemorySink::default();
        let config = AnalyticsConfig {
            record_all_msearch_responses: true,
            ..AnalyticsConfig::default()
        };

        record_capture(&capture(MSEARCH_BODY, "/_msearch"), &sink, &DisabledGeo, &config).await;

        let records = sink.records.lock();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, "sid");
        assert_eq!(records[1].0, "sid-1");
        assert_eq!(records[1].1["took"], 2.0);
    }

    #[tokio::test]
    async fn test_enqueue_overflow_drops_and_counts() {
        // Capacity-1 queue with no worker draining it: the second and third
        // captures must be dropped and counted, never block.
        let (tx, _rx) = mpsc::channel(1);
        let recorder = AnalyticsRecorder::with_channel(tx);

        recorder.enqueue(capture(SEARCH_BODY, "/x/_search"));
        recorder.enqueue(capture(SEARCH_BODY, "/x/_search"));
        recorder.enqueue(capture(SEARCH_BODY, "/x/_search"));

        assert_eq!(recorder.dropped_count(), 2);
    }
}
