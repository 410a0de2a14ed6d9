//! Core library for the `cityweather` client.
//!
//! This crate defines:
//! - The OpenWeather client and the provider abstraction
//! - Combined current + forecast loading with a per-session result channel
//! - City suggestions, reverse geocoding and the location flow
//! - Favorites persistence over a key-value store
//! - Configuration handling
//!
//! It is used by `cityweather-cli`, but can also be reused by other front ends.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod favorites;
pub mod geocode;
pub mod location;
pub mod model;
pub mod provider;
pub mod resolver;

pub use aggregator::{SessionState, SessionUpdate, WeatherAggregator, WeatherSession};
pub use config::Config;
pub use error::{FetchError, LocationError, StoreError};
pub use favorites::{FavoritesStore, JsonFileStore, KeyValueStore, MemoryStore};
pub use geocode::{NominatimGeocoder, ReverseGeocoder};
pub use location::{FixedLocation, LocateFlow, LocateOutcome, LocationService};
pub use model::{
    CityQuery, Condition, Coordinates, CurrentConditions, ForecastPoint, ForecastSet,
    WeatherReport,
};
pub use provider::{WeatherProvider, openweather::OpenWeatherClient};
pub use resolver::CityResolver;
