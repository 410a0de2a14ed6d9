use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc, time::Duration};

use crate::{
    Config,
    error::FetchError,
    model::{CityQuery, CurrentConditions, ForecastSet},
    provider::openweather::OpenWeatherClient,
};

pub mod openweather;

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch_current(&self, query: &CityQuery) -> Result<CurrentConditions, FetchError>;

    async fn fetch_forecast(&self, query: &CityQuery) -> Result<ForecastSet, FetchError>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured.\n\
             Hint: run `cityweather configure` or set OPENWEATHER_API_KEY."
        )
    })?;

    let client = OpenWeatherClient::new(
        api_key,
        &config.base_url,
        Duration::from_secs(config.timeout_secs),
    )?;

    Ok(Arc::new(client))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
