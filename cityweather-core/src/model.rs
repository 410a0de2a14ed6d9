use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// A validated, non-empty city query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CityQuery(String);

impl CityQuery {
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FetchError::EmptyQuery);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CityQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Condition summary: provider icon code, optional group and human text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub code: String,
    pub group: Option<String>,
    pub description: String,
}

impl Condition {
    pub fn unknown() -> Self {
        Self { code: String::new(), group: None, description: "Unknown".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub city_name: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub condition: Condition,
}

impl CurrentConditions {
    /// Temperature truncated toward zero, the way it is displayed.
    pub fn temperature_whole(&self) -> i64 {
        self.temperature_c.trunc() as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Epoch seconds.
    pub timestamp: i64,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub condition: Condition,
}

impl ForecastPoint {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    pub fn temperature_whole(&self) -> i64 {
        self.temperature_c.trunc() as i64
    }
}

/// Chronologically ordered forecast for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSet {
    pub city: String,
    pub points: Vec<ForecastPoint>,
}

impl ForecastSet {
    pub fn new(city: impl Into<String>, mut points: Vec<ForecastPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self { city: city.into(), points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Current conditions and forecast for the same resolved city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub current: CurrentConditions,
    pub forecast: ForecastSet,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherReport {
    pub fn new(current: CurrentConditions, forecast: ForecastSet) -> Self {
        let forecast = ForecastSet { city: current.city_name.clone(), points: forecast.points };
        Self { current, forecast, fetched_at: Utc::now() }
    }

    pub fn city(&self) -> &str {
        &self.current.city_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(ts: i64) -> ForecastPoint {
        ForecastPoint {
            timestamp: ts,
            temperature_c: 1.0,
            feels_like_c: 1.0,
            condition: Condition::unknown(),
        }
    }

    #[test]
    fn city_query_trims_and_rejects_blank() {
        assert_eq!(CityQuery::parse("  Kyiv ").unwrap().as_str(), "Kyiv");
        assert!(matches!(CityQuery::parse("   "), Err(FetchError::EmptyQuery)));
        assert!(matches!(CityQuery::parse(""), Err(FetchError::EmptyQuery)));
    }

    #[test]
    fn temperature_is_truncated_toward_zero() {
        let mut current = CurrentConditions {
            city_name: "Kyiv".into(),
            temperature_c: 5.9,
            feels_like_c: 5.9,
            condition: Condition::unknown(),
        };
        assert_eq!(current.temperature_whole(), 5);
        current.temperature_c = -3.7;
        assert_eq!(current.temperature_whole(), -3);
    }

    #[test]
    fn forecast_points_are_sorted() {
        let set = ForecastSet::new("Kyiv", vec![point(30), point(10), point(20)]);
        let ts: Vec<i64> = set.points.iter().map(|p| p.timestamp).collect();
        assert_eq!(ts, vec![10, 20, 30]);
    }

    #[test]
    fn report_binds_forecast_to_current_city() {
        let current = CurrentConditions {
            city_name: "Kyiv".into(),
            temperature_c: 1.0,
            feels_like_c: 1.0,
            condition: Condition::unknown(),
        };
        let report = WeatherReport::new(current, ForecastSet::new("kyiv", vec![point(1)]));
        assert_eq!(report.forecast.city, "Kyiv");
        assert_eq!(report.city(), "Kyiv");
    }
}
