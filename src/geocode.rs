//! Reverse geocoding to a locality name (Google Geocoding JSON API shape).

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::UpstreamError;

#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResult {
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl GeocodeResponse {
    /// Locality of the best (first) match.
    pub fn locality(&self) -> Option<&str> {
        self.results
            .first()?
            .address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == "locality"))
            .map(|c| c.long_name.as_str())
    }
}

#[derive(Clone)]
pub struct Geocoder {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl Geocoder {
    pub fn new(http: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { http, url: url.into(), api_key }
    }

    pub async fn locality(&self, lat: f64, lon: f64) -> Result<Option<String>, UpstreamError> {
        let Some(key) = &self.api_key else {
            warn!("No geocoder API key configured, skipping reverse lookup");
            return Ok(None);
        };

        info!("Reverse geocoding {}, {}", lat, lon);
        let resp = self
            .http
            .get(&self.url)
            .query(&[("latlng", format!("{},{}", lat, lon)), ("key", key.clone())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(UpstreamError::Status {
                service: "geocoder",
                status: resp.status(),
            });
        }
        let body: GeocodeResponse = resp.json().await?;
        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(body.locality().map(str::to_string)),
            other => Err(UpstreamError::Geocoder(other.to_string())),
        }
    }

    /// Locality for the tab, or the coordinates when none is known.
    pub async fn label(&self, lat: f64, lon: f64) -> Result<String, UpstreamError> {
        Ok(self
            .locality(lat, lon)
            .await?
            .unwrap_or_else(|| coordinate_label(lat, lon)))
    }
}

/// Label used when no locality is known.
pub fn coordinate_label(lat: f64, lon: f64) -> String {
    format!("{:.3}, {:.3}", lat, lon)
}
