//! Reverse geocoding: convert coordinates to a human-readable address.
//!
//! The orchestrator treats this as best-effort enrichment; a location counts
//! as resolved before the address arrives, and `None` is always acceptable.
//! The concrete implementation uses Nominatim (OpenStreetMap) - free, no API
//! key required.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

/// Future returned by [`AddressResolver::resolve`].
pub type AddressFuture = Pin<Box<dyn Future<Output = Option<String>> + Send>>;

/// Asynchronous coordinates-to-address contract.
pub trait AddressResolver: Send + Sync {
    fn resolve(&self, latitude: f64, longitude: f64, language: &str) -> AddressFuture;
}

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "GeoFix/0.1.0 (https://github.com/geofix)";

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

/// Nominatim-backed resolver.
#[derive(Debug, Clone)]
pub struct NominatimResolver {
    client: Client,
    base_url: String,
}

impl NominatimResolver {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_base_url(NOMINATIM_URL)
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    async fn lookup(client: Client, url: String) -> Option<String> {
        let response = match client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("Reverse geocode request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!("Reverse geocode returned status {}", response.status());
            return None;
        }

        let body: NominatimResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!("Reverse geocode parse error: {}", e);
                return None;
            }
        };

        let addr = body.address?;

        // Capture state/country before the place chain consumes them
        let state = addr.state.clone();
        let country = addr.country.clone();

        // Prefer city > town > village > municipality for the primary place name
        let place = addr
            .city
            .or(addr.town)
            .or(addr.village)
            .or(addr.municipality)
            .or(addr.state_district)
            .or(addr.county)
            .or(addr.state)
            .or(addr.country)?;

        // Add state/country for disambiguation when different from place
        let suffix = state
            .as_ref()
            .filter(|s| !s.is_empty() && s.as_str() != place)
            .map(String::as_str)
            .or_else(|| {
                country
                    .as_ref()
                    .filter(|c| !c.is_empty() && c.as_str() != place)
                    .map(String::as_str)
            });

        let result = match suffix {
            Some(s) => format!("{}, {}", place, s),
            None => place,
        };

        tracing::info!("Reverse geocoded to: {}", result);
        Some(result)
    }
}

impl AddressResolver for NominatimResolver {
    fn resolve(&self, latitude: f64, longitude: f64, language: &str) -> AddressFuture {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json&addressdetails=1&layer=address&zoom=10&accept-language={}",
            self.base_url, latitude, longitude, language
        );
        let client = self.client.clone();
        Box::pin(Self::lookup(client, url))
    }
}
