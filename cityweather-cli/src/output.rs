use std::fmt::Write;

use chrono::Local;
use cityweather_core::{FetchError, ForecastPoint, WeatherReport};

pub const DEFAULT_FORECAST_ROWS: usize = 20;

fn format_time(point: &ForecastPoint) -> String {
    point
        .time()
        .map(|t| t.with_timezone(&Local).format("%d.%m %H:%M").to_string())
        .unwrap_or_else(|| "--.-- --:--".to_string())
}

pub fn render_report(report: &WeatherReport, limit: usize) -> String {
    let current = &report.current;
    let mut out = String::new();

    let _ = writeln!(out, "{}", current.city_name);
    let _ = writeln!(
        out,
        "  {}°C  {}  (feels like {}°C)",
        current.temperature_whole(),
        current.condition.description,
        current.feels_like_c.trunc() as i64,
    );

    if report.forecast.is_empty() || limit == 0 {
        return out;
    }

    let _ = writeln!(out, "\n5-day forecast:");
    for point in report.forecast.points.iter().take(limit) {
        let _ = writeln!(
            out,
            "  {}  {:>4}°C  {}",
            format_time(point),
            point.temperature_whole(),
            point.condition.description,
        );
    }

    out
}

/// One-line summary used for the favorites overview: condition group,
/// or the description when the provider sent no group.
pub fn render_summary(city: &str, report: &WeatherReport) -> String {
    let condition = &report.current.condition;
    let label = condition
        .group
        .as_deref()
        .filter(|g| !g.is_empty())
        .unwrap_or(&condition.description);
    format!("{city}: {}°C {label}", report.current.temperature_whole())
}

pub fn render_failure(city: &str, err: &FetchError) -> String {
    if err.is_retryable() {
        format!("{city}: {} (try again later)", err.user_message())
    } else {
        format!("{city}: {}", err.user_message())
    }
}
