//! The `X-Search-*` header protocol.
//!
//! Clients annotate search requests with these headers; the recorder captures
//! them and the writer parses them into event fields. Invalid values are
//! logged and omitted — they never fail the client response.

use std::collections::HashMap;

/// Search query text for the origin event.
pub const X_SEARCH_QUERY: &str = "x-search-query";
/// Client-supplied search id; links follow-up events to the origin event.
pub const X_SEARCH_ID: &str = "x-search-id";
/// Structured `key:value` filters applied to the search.
pub const X_SEARCH_FILTERS: &str = "x-search-filters";
/// Whether a result was clicked.
pub const X_SEARCH_CLICK: &str = "x-search-click";
/// Position of the clicked result.
pub const X_SEARCH_CLICK_POSITION: &str = "x-search-click-position";
/// Whether the search converted.
pub const X_SEARCH_CONVERSION: &str = "x-search-conversion";
/// Free-form `key:value` event annotations.
pub const X_SEARCH_CUSTOM_EVENT: &str = "x-search-custom-event";

/// Parses a boolean header value.
///
/// Accepts the literal set search clients already send: `1`, `t`, `T`,
/// `TRUE`, `true` and `True` are true; `0`, `f`, `F`, `FALSE`, `false` and
/// `False` are false. Anything else is `None`.
#[must_use]
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Parses a comma-separated `key:value` header into a map.
///
/// Whitespace around keys and values is trimmed, entries missing a `:` are
/// dropped, and a duplicated key retains its last occurrence. Parsing is
/// idempotent: re-parsing a serialized result yields the same map.
#[must_use]
pub fn parse_key_values(raw: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for entry in raw.split(',') {
        let Some((key, value)) = entry.split_once(':') else {
            continue;
        };
        out.insert(key.trim().to_string(), value.trim().to_string());
    }
    out
}
