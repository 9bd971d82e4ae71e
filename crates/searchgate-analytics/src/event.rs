//! Search event assembly.
//!
//! A [`SearchCapture`] is the raw material the recorder forks off per search
//! exchange: the effective search id, the request metadata, the raw
//! `X-Search-*` header values and the response body bytes. [`build_record`]
//! turns one capture plus one parsed response into the event document
//! persisted under the search id.

use bytes::Bytes;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::warn;

use crate::headers::{self, X_SEARCH_CLICK, X_SEARCH_CLICK_POSITION, X_SEARCH_CONVERSION};
use crate::response::{self, SearchResponse};

/// How many hits of a response are recorded on the origin event.
pub const RECORDED_HITS: usize = 10;

/// A captured search exchange, queued for the analytics worker.
#[derive(Debug, Clone)]
pub struct SearchCapture {
    /// Effective search id: client-supplied or freshly minted.
    pub doc_id: String,
    /// True when the client did not supply `X-Search-Id`, i.e. this is the
    /// origin event rather than a follow-up.
    pub is_origin: bool,
    /// Request path, used to detect `_msearch`.
    pub path: String,
    /// Indices named in the request.
    pub indices: Vec<String>,
    /// Client address.
    pub ip: String,
    /// Raw `X-Search-Query` value.
    pub search_query: Option<String>,
    /// Raw `X-Search-Filters` value.
    pub filters: Option<String>,
    /// Raw `X-Search-Click` value.
    pub click: Option<String>,
    /// Raw `X-Search-Click-Position` value.
    pub click_position: Option<String>,
    /// Raw `X-Search-Conversion` value.
    pub conversion: Option<String>,
    /// Raw `X-Search-Custom-Event` value.
    pub custom_events: Option<String>,
    /// The response body as sent to the client.
    pub body: Bytes,
}

impl SearchCapture {
    /// Returns whether this capture came from a multi-search endpoint.
    #[must_use]
    pub fn is_msearch(&self) -> bool {
        self.path.contains("_msearch")
    }
}

/// Builds the event record for one capture and one parsed response.
///
/// Geo enrichment is not done here; the worker adds `location` and `country`
/// after its lookup. Invalid header values are logged and omitted.
#[must_use]
pub fn build_record(capture: &SearchCapture, response: &SearchResponse) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert("took".to_string(), response.took.into());

    // Origin events carry the query context; follow-ups only carry the
    // fields below, so the merge-upsert can never clobber these.
    if capture.is_origin {
        record.insert("indices".to_string(), capture.indices.clone().into());
        record.insert(
            "search_query".to_string(),
            capture.search_query.clone().unwrap_or_default().into(),
        );
        record.insert(
            "hits_in_response".to_string(),
            Value::Array(response::top_hits(response, RECORDED_HITS)),
        );
        record.insert("total_hits".to_string(), response.hits.total.into());
        record.insert(
            "datestamp".to_string(),
            Utc::now().format("%Y/%m/%d %H:%M:%S").to_string().into(),
        );

        if let Some(raw) = &capture.filters {
            let filters = headers::parse_key_values(raw);
            if !filters.is_empty() {
                record.insert("search_filters".to_string(), string_map(filters));
            }
        }
    }

    record.insert("ip".to_string(), capture.ip.clone().into());

    if let Some(raw) = &capture.click {
        match headers::parse_flag(raw) {
            Some(clicked) => {
                record.insert("click".to_string(), clicked.into());
            }
            None => warn!(value = %raw, header = X_SEARCH_CLICK, "invalid bool header value"),
        }
    }

    if let Some(raw) = &capture.click_position {
        match raw.parse::<i64>() {
            Ok(position) => {
                record.insert("click_position".to_string(), position.into());
            }
            Err(_) => {
                warn!(value = %raw, header = X_SEARCH_CLICK_POSITION, "invalid int header value");
            }
        }
    }

    if let Some(raw) = &capture.conversion {
        match headers::parse_flag(raw) {
            Some(converted) => {
                record.insert("conversion".to_string(), converted.into());
            }
            None => {
                warn!(value = %raw, header = X_SEARCH_CONVERSION, "invalid bool header value");
            }
        }
    }

    if let Some(raw) = &capture.custom_events {
        let events = headers::parse_key_values(raw);
        if !events.is_empty() {
            record.insert("custom_events".to_string(), string_map(events));
        }
    }

    record
}

fn string_map(map: std::collections::HashMap<String, String>) -> Value {
    Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response;

    fn capture() -> SearchCapture {
        SearchCapture {
            doc_id: "abc".to_string(),
            is_origin: true,
            path: "/myidx/_search".to_string(),
            indices: vec!["myidx".to_string()],
            ip: "203.0.113.9".to_string(),
            search_query: Some("shoes".to_string()),
            filters: None,
            click: None,
            click_position: None,
            conversion: None,
            custom_events: None,
            body: Bytes::new(),
        }
    }

    fn parsed() -> SearchResponse {
        let body = response::normalize(
            br#"{"took":7,"hits":{"total":2,"hits":[
                {"_id":"a","_type":"t","_source":{"k":1}},
                {"_id":"b","_type":"t","_source":{"k":2}}]}}"#,
        );
        response::parse(&body, false).unwrap().remove(0)
    }

    #[test]
    fn test_origin_record_fields() {
        let record = build_record(&capture(), &parsed());

        assert_eq!(record["took"], 7.0);
        assert_eq!(record["search_query"], "shoes");
        assert_eq!(record["total_hits"], 2);
        assert_eq!(record["indices"], serde_json::json!(["myidx"]));
        assert_eq!(record["ip"], "203.0.113.9");

        let hits = record["hits_in_response"].as_array().unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["id"], "a");
        assert_eq!(hits[0]["source"], r#"{"k":1}"#);

        let datestamp = record["datestamp"].as_str().unwrap();
        // 2024/01/31 12:00:00
        assert_eq!(datestamp.len(), 19);
        assert_eq!(&datestamp[4..5], "/");
    }

    #[test]
    fn test_follow_up_record_omits_query_context() {
        let mut c = capture();
        c.is_origin = false;
        c.click = Some("true".to_string());
        c.click_position = Some("3".to_string());

        let record = build_record(&c, &parsed());

        assert!(!record.contains_key("search_query"));
        assert!(!record.contains_key("total_hits"));
        assert!(!record.contains_key("hits_in_response"));
        assert!(!record.contains_key("indices"));
        assert_eq!(record["click"], true);
        assert_eq!(record["click_position"], 3);
    }

    #[test]
    fn test_invalid_header_values_are_omitted() {
        let mut c = capture();
        c.click = Some("yes".to_string());
        c.click_position = Some("third".to_string());
        c.conversion = Some("maybe".to_string());

        let record = build_record(&c, &parsed());

        assert!(!record.contains_key("click"));
        assert!(!record.contains_key("click_position"));
        assert!(!record.contains_key("conversion"));
    }

    #[test]
    fn test_numeric_and_short_bool_forms_are_accepted() {
        let mut c = capture();
        c.click = Some("t".to_string());
        c.conversion = Some("1".to_string());

        let record = build_record(&c, &parsed());

        assert_eq!(record["click"], true);
        assert_eq!(record["conversion"], true);

        let mut c = capture();
        c.click = Some("0".to_string());
        let record = build_record(&c, &parsed());
        assert_eq!(record["click"], false);
    }

    #[test]
    fn test_filters_and_custom_events_parsed() {
        let mut c = capture();
        c.filters = Some("brand:acme, year:2024".to_string());
        c.custom_events = Some("ab_test:blue".to_string());

        let record = build_record(&c, &parsed());

        assert_eq!(record["search_filters"]["brand"], "acme");
        assert_eq!(record["search_filters"]["year"], "2024");
        assert_eq!(record["custom_events"]["ab_test"], "blue");
    }

    #[test]
    fn test_msearch_detection() {
        let mut c = capture();
        assert!(!c.is_msearch());
        c.path = "/_msearch".to_string();
        assert!(c.is_msearch());
        c.path = "/idx/_msearch".to_string();
        assert!(c.is_msearch());
    }
}
