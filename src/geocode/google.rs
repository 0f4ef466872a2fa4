use serde::Deserialize;

use super::Geocoder;
use crate::error::FetchError;

pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Deserialize, Debug)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize, Debug)]
struct Bounds {
    northeast: LatLng,
    southwest: LatLng,
}

#[derive(Deserialize, Debug)]
struct ResultGeometry {
    bounds: Option<Bounds>,
    viewport: Option<Bounds>,
}

#[derive(Deserialize, Debug)]
struct GeocodeResult {
    geometry: ResultGeometry,
}

#[derive(Deserialize, Debug)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

/// Client for the Google Maps Geocoding API. One blocking request per lookup, no retries.
pub struct GoogleGeocoder {
    api_key: String,
    base_url: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, GOOGLE_GEOCODE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
        }
    }

    fn fetch(&self, place_name: &str) -> Result<String, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("igt-spatial")
            .build()
            .map_err(|err| FetchError::Network(err.to_string()))?;
        let response = client
            .get(&self.base_url)
            .query(&[("address", place_name), ("key", self.api_key.as_str())])
            .send()
            .map_err(|err| FetchError::Network(err.to_string()))?;
        response
            .text()
            .map_err(|err| FetchError::Network(format!("No response text, {}", err)))
    }
}

impl Geocoder for GoogleGeocoder {
    fn service_name(&self) -> &str {
        "Google Maps"
    }

    fn resolve(&self, place_name: &str) -> Result<geo::Geometry, FetchError> {
        let body = self.fetch(place_name)?;
        parse_geocode_response(&body, place_name)
    }
}

/// Turn a geocoding JSON response into the bounds (or viewport) rectangle of the first result.
pub fn parse_geocode_response(body: &str, place_name: &str) -> Result<geo::Geometry, FetchError> {
    let response: GeocodeResponse = serde_json::from_str(body)
        .map_err(|err| FetchError::InvalidResponse(format!("Malformed JSON, {}", err)))?;
    let detail = || response.error_message.clone().unwrap_or_else(|| response.status.clone());
    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => return Err(FetchError::NoMatch(place_name.to_string())),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => return Err(FetchError::RateLimited(detail())),
        "REQUEST_DENIED" => return Err(FetchError::Denied(detail())),
        _ => return Err(FetchError::InvalidResponse(detail())),
    }

    let result = response
        .results
        .first()
        .ok_or_else(|| FetchError::NoMatch(place_name.to_string()))?;
    let bounds = result
        .geometry
        .bounds
        .as_ref()
        .or(result.geometry.viewport.as_ref())
        .ok_or_else(|| {
            FetchError::InvalidResponse(format!("No bounds or viewport for '{}'", place_name))
        })?;
    let rect = geo::Rect::new(
        (bounds.southwest.lng, bounds.southwest.lat),
        (bounds.northeast.lng, bounds.northeast.lat),
    );
    Ok(geo::Geometry::Polygon(rect.to_polygon()))
}
