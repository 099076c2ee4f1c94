//! Forward geocoding against a Nominatim-compatible service.
//!
//! Order addresses are geocoded once at create time and the coordinates are
//! stored on the row; radius searches geocode the requested zipcode per
//! request. Stored rows are never re-geocoded.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One place in a Nominatim search response. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

/// Resolved coordinates for an address or zipcode
#[derive(Debug, Clone)]
pub struct GeocodedAddress {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    /// Base URL of the geocoding service, without a trailing slash
    pub base_url: String,
    /// Nominatim's usage policy requires an identifying User-Agent
    pub user_agent: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "Platter/1.0 (orders API)".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    config: GeocoderConfig,
}

impl Geocoder {
    pub fn new(config: GeocoderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/search?q={}&format=json&limit=1",
            self.config.base_url,
            urlencoding::encode(query)
        )
    }

    /// Resolve a free-form address or zipcode to coordinates.
    ///
    /// Transport and decoding failures are upstream errors; an empty result
    /// set means the input itself could not be resolved.
    pub async fn forward(&self, query: &str) -> ApiResult<GeocodedAddress> {
        let url = self.search_url(query.trim());

        debug!("Geocoding '{}'", query);

        let places: Vec<NominatimPlace> = self
            .client
            .get(&url)
            .header("User-Agent", &self.config.user_agent)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|err| {
                ApiError::UpstreamFailure(format!("Geocoding request failed: {}", err))
            })?
            .json()
            .await
            .map_err(|err| {
                ApiError::UpstreamFailure(format!("Invalid geocoding response: {}", err))
            })?;

        let Some(place) = places.first() else {
            warn!("No geocoding result for '{}'", query);
            return Err(ApiError::Validation(format!(
                "Could not geocode address '{}'",
                query
            )));
        };

        let latitude: f64 = place.lat.parse().map_err(|_| {
            ApiError::UpstreamFailure(format!("Invalid latitude in geocoding response: {}", place.lat))
        })?;
        let longitude: f64 = place.lon.parse().map_err(|_| {
            ApiError::UpstreamFailure(format!(
                "Invalid longitude in geocoding response: {}",
                place.lon
            ))
        })?;

        debug!("Geocoded '{}' to ({}, {})", query, latitude, longitude);

        Ok(GeocodedAddress {
            latitude,
            longitude,
            formatted_address: place.display_name.clone(),
        })
    }
}
