//! Search response normalization and parsing.
//!
//! Upstream responses are normalized at the byte level before structured
//! parsing: the keys `_source`, `_type` and `_id` are renamed to `source`,
//! `type` and `id`. This replicates the persisted schema of the original
//! analytics pipeline and is applied blindly across the whole body.

use serde::Deserialize;
use serde_json::Value;

/// A parsed (normalized) search response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    /// Upstream query time in milliseconds.
    #[serde(default)]
    pub took: f64,
    /// The hits envelope.
    #[serde(default)]
    pub hits: Hits,
}

/// The hits envelope of a search response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hits {
    /// Total number of matching documents.
    #[serde(default)]
    pub total: i64,
    /// The returned hits.
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// One returned hit, after key normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hit {
    /// Document id.
    #[serde(default)]
    pub id: String,
    /// Document type.
    #[serde(default, rename = "type")]
    pub doc_type: String,
    /// Document source.
    #[serde(default)]
    pub source: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct MsearchEnvelope {
    #[serde(default)]
    responses: Vec<SearchResponse>,
}

/// Renames `_source`/`_type`/`_id` to their unprefixed forms, byte-wise.
#[must_use]
pub fn normalize(body: &[u8]) -> Vec<u8> {
    let body = replace_all(body, b"_source", b"source");
    let body = replace_all(&body, b"_type", b"type");
    replace_all(&body, b"_id", b"id")
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = find(rest, needle) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(replacement);
        rest = &rest[pos + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Parses a normalized body into one or more search responses.
///
/// Multi-search bodies yield every response in the envelope; single-search
/// bodies yield exactly one.
pub fn parse(body: &[u8], msearch: bool) -> Result<Vec<SearchResponse>, serde_json::Error> {
    if msearch {
        let envelope: MsearchEnvelope = serde_json::from_slice(body)?;
        Ok(envelope.responses)
    } else {
        let response: SearchResponse = serde_json::from_slice(body)?;
        Ok(vec![response])
    }
}

/// Extracts the first `limit` hits as `{id, type, source}` records, where
/// `source` is the hit's source re-serialized as a raw JSON string.
#[must_use]
pub fn top_hits(response: &SearchResponse, limit: usize) -> Vec<Value> {
    response
        .hits
        .hits
        .iter()
        .take(limit)
        .filter_map(|hit| {
            let source = hit.source.as_ref()?;
            let raw = serde_json::to_string(source).ok()?;
            Some(serde_json::json!({
                "id": hit.id,
                "type": hit.doc_type,
                "source": raw,
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"took":7,"hits":{"total":2,"hits":[
        {"_id":"a","_type":"t","_source":{"k":1}},
        {"_id":"b","_type":"t","_source":{"k":2}}]}}"#;

    #[test]
    fn test_normalize_renames_keys() {
        let normalized = normalize(br#"{"_id":"a","_type":"t","_source":{}}"#);
        assert_eq!(normalized, br#"{"id":"a","type":"t","source":{}}"#);
    }

    #[test]
    fn test_normalize_is_blind_to_context() {
        // The rename applies anywhere in the body, including inside values.
        let normalized = normalize(br#"{"note":"my _id here"}"#);
        assert_eq!(normalized, br#"{"note":"my id here"}"#);
    }

    #[test]
    fn test_parse_single_response() {
        let responses = parse(&normalize(BODY), false).unwrap();
        assert_eq!(responses.len(), 1);
        let r = &responses[0];
        assert_eq!(r.took, 7.0);
        assert_eq!(r.hits.total, 2);
        assert_eq!(r.hits.hits.len(), 2);
        assert_eq!(r.hits.hits[0].id, "a");
        assert_eq!(r.hits.hits[0].doc_type, "t");
    }

    #[test]
    fn test_parse_msearch_envelope() {
        let body = normalize(
            br#"{"responses":[{"took":1,"hits":{"total":1,"hits":[]}},{"took":2,"hits":{"total":0,"hits":[]}}]}"#,
        );
        let responses = parse(&body, true).unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].took, 1.0);
        assert_eq!(responses[1].took, 2.0);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse(b"not json", false).is_err());
    }

    #[test]
    fn test_top_hits_limit_and_shape() {
        let responses = parse(&normalize(BODY), false).unwrap();
        let hits = top_hits(&responses[0], 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["id"], "a");
        assert_eq!(hits[0]["type"], "t");
        assert_eq!(hits[0]["source"], r#"{"k":1}"#);

        let hits = top_hits(&responses[0], 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_top_hits_skips_sourceless() {
        let body = normalize(br#"{"took":1,"hits":{"total":1,"hits":[{"_id":"a","_type":"t"}]}}"#);
        let responses = parse(&body, false).unwrap();
        assert!(top_hits(&responses[0], 10).is_empty());
    }
}
