//! IP geolocation seam.
//!
//! The gateway treats geolocation as an opaque collaborator: anything that
//! can resolve an address to coordinates and a country. Lookups run under a
//! short deadline independent of the client response; failures are logged
//! and the fields omitted.

use serde::Serialize;
use thiserror::Error;

use searchgate_middleware::BoxFuture;

/// A resolved coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// Geolocation failure.
#[derive(Debug, Error)]
pub enum GeoError {
    /// No geo database is configured.
    #[error("geo lookup is not configured")]
    Unavailable,
    /// The address is not in the database.
    #[error("no geo data for address")]
    NotFound,
    /// The address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Resolves client addresses to coordinates and countries.
pub trait GeoLookup: Send + Sync + 'static {
    /// Resolves an address to coordinates.
    fn coordinates<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, Result<Coordinates, GeoError>>;

    /// Resolves an address to an ISO country name.
    fn country<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, Result<String, GeoError>>;
}

/// The default lookup when no geo database is configured: every call fails
/// with [`GeoError::Unavailable`], so events simply omit geo fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeo;

impl GeoLookup for DisabledGeo {
    fn coordinates<'a>(&'a self, _addr: &'a str) -> BoxFuture<'a, Result<Coordinates, GeoError>> {
        Box::pin(async { Err(GeoError::Unavailable) })
    }

    fn country<'a>(&'a self, _addr: &'a str) -> BoxFuture<'a, Result<String, GeoError>> {
        Box::pin(async { Err(GeoError::Unavailable) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_geo_always_fails() {
        let geo = DisabledGeo;
        assert!(geo.coordinates("203.0.113.9").await.is_err());
        assert!(geo.country("203.0.113.9").await.is_err());
    }

    #[test]
    fn test_coordinates_serialize() {
        let c = Coordinates { lat: 52.52, lon: 13.405 };
        let json = serde_json::to_value(c).unwrap();
        assert_eq!(json["lat"], 52.52);
        assert_eq!(json["lon"], 13.405);
    }
}
