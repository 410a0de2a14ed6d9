use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::instrument;

use crate::{
    error::FetchError,
    model::{CityQuery, Condition, CurrentConditions, ForecastPoint, ForecastSet},
    provider::truncate_body,
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// OpenWeather client for the `/weather` and `/forecast` endpoints.
#[derive(Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl std::fmt::Debug for OpenWeatherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl OpenWeatherClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(FetchError::MissingApiKey);
        }

        let parsed = Url::parse(base_url).map_err(|e| FetchError::InvalidEndpoint {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidEndpoint {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &CityQuery,
    ) -> Result<T, FetchError> {
        let res = self
            .http
            .get(self.endpoint(path))
            .query(&[
                ("q", query.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        tracing::debug!(%status, bytes = body.len(), "OpenWeather response");

        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(query.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
    main: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
    city: Option<OwCity>,
}

fn condition_from(weather: &[OwWeather]) -> Condition {
    weather
        .first()
        .map(|w| Condition {
            code: w.icon.clone(),
            group: w.main.clone(),
            description: w.description.clone(),
        })
        .unwrap_or_else(Condition::unknown)
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch_current(&self, query: &CityQuery) -> Result<CurrentConditions, FetchError> {
        let parsed: OwCurrentResponse = self.get_json("weather", query).await?;

        Ok(CurrentConditions {
            city_name: parsed.name,
            temperature_c: parsed.main.temp,
            feels_like_c: parsed.main.feels_like.unwrap_or(parsed.main.temp),
            condition: condition_from(&parsed.weather),
        })
    }

    async fn fetch_forecast(&self, query: &CityQuery) -> Result<ForecastSet, FetchError> {
        let parsed: OwForecastResponse = self.get_json("forecast", query).await?;

        let points = parsed
            .list
            .iter()
            .map(|entry| ForecastPoint {
                timestamp: entry.dt,
                temperature_c: entry.main.temp,
                feels_like_c: entry.main.feels_like.unwrap_or(entry.main.temp),
                condition: condition_from(&entry.weather),
            })
            .collect();

        let city = parsed.city.map(|c| c.name).unwrap_or_else(|| query.to_string());
        Ok(ForecastSet::new(city, points))
    }
}
