//! # searchgate-analytics
//!
//! Search analytics for the gateway: a response tee and an asynchronous
//! event recorder.
//!
//! The [`recorder::Recorder`] middleware wraps search route handlers. It
//! relays the upstream response to the client byte-identically, stamps the
//! effective `X-Search-Id` on search responses, and forks a capture of the
//! exchange into a bounded queue — never delaying the client.
//!
//! A single background worker ([`writer::AnalyticsRecorder`]) drains the
//! queue: it normalizes the captured search response, assembles a
//! [`SearchEvent`](event) record enriched with parsed `X-Search-*` headers
//! and geo data, and persists it through an [`writer::AnalyticsSink`] with
//! the capture's search id as document id. Persistence is merge-upsert, so
//! follow-up click/conversion events update the original document without
//! clobbering it.

#![forbid(unsafe_code)]

pub mod event;
pub mod geo;
pub mod headers;
pub mod recorder;
pub mod response;
pub mod writer;

pub use event::SearchCapture;
pub use geo::{Coordinates, DisabledGeo, GeoError, GeoLookup};
pub use recorder::Recorder;
pub use writer::{AnalyticsConfig, AnalyticsRecorder, AnalyticsSink};
