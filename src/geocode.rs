//! Free-text address resolution through the external geocoding service.
//!
//! The core only builds the request and distills the response; transport is
//! the Http capability's job. When geocoding is disabled by configuration
//! this whole module is bypassed and the draft's manual coordinates are
//! used as-is.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::event::Coordinate;

pub const GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

const STATUS_ZERO_RESULTS: &str = "ZERO_RESULTS";

/// Marker for a partially-populated response. Some upstream failures leak a
/// formatted address with this literal spliced in; treat those as no result.
const PARTIAL_RESPONSE_MARKER: &str = "undefined";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub coordinate: Coordinate,
    pub address: String,
}

impl ResolvedLocation {
    /// Bypass constructor for the geocoding-disabled path: the coordinates
    /// come straight from the draft and the address stays the raw text.
    pub fn manual(lat: f64, lng: f64, address: impl Into<String>) -> Result<Self, GeocodeError> {
        let coordinate =
            Coordinate::new(lat, lng).map_err(|_| GeocodeError::AddressUnresolvable)?;
        Ok(Self {
            coordinate,
            address: address.into(),
        })
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeocodeError {
    #[error("address could not be resolved")]
    AddressUnresolvable,

    #[error("geocoding request failed: {message}")]
    Transport { message: String },

    #[error("malformed geocoding response: {message}")]
    MalformedResponse { message: String },
}

// --- Wire types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeHit {
    pub formatted_address: String,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub location: WirePoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WirePoint {
    pub lat: f64,
    pub lng: f64,
}

/// Request URL for one address lookup. The address is percent-encoded as a
/// query parameter, never spliced into the path.
pub fn request_url(address: &str, api_key: &str) -> Result<Url, GeocodeError> {
    Url::parse_with_params(GEOCODE_ENDPOINT, &[("address", address), ("key", api_key)]).map_err(
        |e| GeocodeError::Transport {
            message: e.to_string(),
        },
    )
}

/// Reduce the raw HTTP outcome to a resolved location, so the event carries
/// plain data instead of a transport type.
pub fn distill(
    result: crux_http::Result<crux_http::Response<GeocodeResponse>>,
) -> Result<ResolvedLocation, GeocodeError> {
    match result {
        Err(e) => Err(GeocodeError::Transport {
            message: e.to_string(),
        }),
        Ok(mut response) => {
            let status = response.status();
            if !status.is_success() {
                return Err(GeocodeError::Transport {
                    message: format!("geocoding service returned {status}"),
                });
            }
            let body = response
                .take_body()
                .ok_or_else(|| GeocodeError::MalformedResponse {
                    message: "empty response body".to_string(),
                })?;
            resolve(&body)
        }
    }
}

/// Pure resolution policy over a decoded response.
pub fn resolve(response: &GeocodeResponse) -> Result<ResolvedLocation, GeocodeError> {
    if response.status == STATUS_ZERO_RESULTS {
        return Err(GeocodeError::AddressUnresolvable);
    }
    let hit = response
        .results
        .first()
        .ok_or(GeocodeError::AddressUnresolvable)?;
    if hit.formatted_address.contains(PARTIAL_RESPONSE_MARKER) {
        return Err(GeocodeError::AddressUnresolvable);
    }
    let point = hit.geometry.location;
    let coordinate =
        Coordinate::new(point.lat, point.lng).map_err(|_| GeocodeError::AddressUnresolvable)?;
    Ok(ResolvedLocation {
        coordinate,
        address: hit.formatted_address.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(address: &str, lat: f64, lng: f64) -> GeocodeHit {
        GeocodeHit {
            formatted_address: address.to_string(),
            geometry: Geometry {
                location: WirePoint { lat, lng },
            },
        }
    }

    #[test]
    fn resolves_first_hit() {
        let response = GeocodeResponse {
            status: "OK".into(),
            results: vec![
                hit("123 Main St, Springfield", 40.0, -75.0),
                hit("123 Main St, Shelbyville", 41.0, -76.0),
            ],
        };
        let location = resolve(&response).unwrap();
        assert_eq!(location.address, "123 Main St, Springfield");
        assert_eq!(location.coordinate, Coordinate::new(40.0, -75.0).unwrap());
    }

    #[test]
    fn zero_results_is_unresolvable() {
        let response = GeocodeResponse {
            status: STATUS_ZERO_RESULTS.into(),
            results: vec![],
        };
        assert_eq!(
            resolve(&response).unwrap_err(),
            GeocodeError::AddressUnresolvable
        );
    }

    #[test]
    fn empty_results_is_unresolvable() {
        let response = GeocodeResponse {
            status: "OK".into(),
            results: vec![],
        };
        assert_eq!(
            resolve(&response).unwrap_err(),
            GeocodeError::AddressUnresolvable
        );
    }

    #[test]
    fn partial_address_is_unresolvable() {
        let response = GeocodeResponse {
            status: "OK".into(),
            results: vec![hit("undefined, Springfield", 40.0, -75.0)],
        };
        assert_eq!(
            resolve(&response).unwrap_err(),
            GeocodeError::AddressUnresolvable
        );
    }

    #[test]
    fn out_of_range_coordinates_are_unresolvable() {
        let response = GeocodeResponse {
            status: "OK".into(),
            results: vec![hit("123 Main St", 95.0, 0.0)],
        };
        assert_eq!(
            resolve(&response).unwrap_err(),
            GeocodeError::AddressUnresolvable
        );
    }

    #[test]
    fn request_url_percent_encodes_the_address() {
        let url = request_url("12 Rose St & 5th Ave", "k3y").unwrap();
        let s = url.as_str();
        assert!(s.starts_with(GEOCODE_ENDPOINT));
        assert!(s.contains("address=12+Rose+St+%26+5th+Ave") || s.contains("address=12%20Rose"));
        assert!(s.contains("key=k3y"));
    }

    #[test]
    fn manual_location_keeps_raw_address_text() {
        let location = ResolvedLocation::manual(40.0, -75.0, "typed address").unwrap();
        assert_eq!(location.address, "typed address");
        assert_eq!(location.coordinate.lat(), 40.0);
    }

    #[test]
    fn manual_location_rejects_non_finite_coordinates() {
        assert!(ResolvedLocation::manual(f64::NAN, 0.0, "x").is_err());
    }

    #[test]
    fn response_decodes_without_results_field() {
        let response: GeocodeResponse =
            serde_json::from_str(r#"{"status":"ZERO_RESULTS"}"#).unwrap();
        assert!(response.results.is_empty());
    }
}
