//! Reverse geocoding: coordinates to a locality name.
//! Uses Nominatim (OpenStreetMap), no API key required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::{error::LocationError, model::Coordinates};

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const USER_AGENT: &str = concat!("cityweather/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait ReverseGeocoder: Send + Sync + std::fmt::Debug {
    /// First locality name found for the coordinates, if any.
    async fn locality(&self, coords: Coordinates) -> Result<Option<String>, LocationError>;
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    http: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LocationError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LocationError::Geocoding(e.to_string()))?;

        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

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
}

impl NominatimAddress {
    fn into_locality(self) -> Option<String> {
        [self.city, self.town, self.village, self.municipality]
            .into_iter()
            .flatten()
            .find(|name| !name.trim().is_empty())
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    #[instrument(skip(self), level = "debug")]
    async fn locality(&self, coords: Coordinates) -> Result<Option<String>, LocationError> {
        let response = self
            .http
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", coords.latitude.to_string()),
                ("lon", coords.longitude.to_string()),
                ("format", "json".to_string()),
                ("zoom", "10".to_string()),
            ])
            .send()
            .await
            .map_err(|e| LocationError::Geocoding(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocationError::Geocoding(format!(
                "reverse geocode returned status {}",
                response.status()
            )));
        }

        let body: NominatimResponse =
            response.json().await.map_err(|e| LocationError::Geocoding(e.to_string()))?;

        let locality = body.address.and_then(NominatimAddress::into_locality);
        tracing::debug!(?locality, "reverse geocoded");
        Ok(locality)
    }
}
