use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cityweather_core::{
    CityResolver, Config, Coordinates, FavoritesStore, FetchError, FixedLocation, JsonFileStore,
    LocateFlow, LocateOutcome, NominatimGeocoder, SessionUpdate, WeatherAggregator,
    WeatherSession, provider::provider_from_config, resolver,
};
use tokio::task::JoinSet;

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityweather", version, about = "Current weather and 5-day forecast by city")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key.
    Configure,

    /// Show current conditions and forecast for a city.
    Show {
        city: String,

        /// Number of forecast rows to print.
        #[arg(long, default_value_t = output::DEFAULT_FORECAST_ROWS)]
        limit: usize,

        /// Bookmark the resolved city.
        #[arg(long)]
        favorite: bool,
    },

    /// Suggest city names for a prefix.
    Suggest { query: String },

    /// Manage bookmarked cities.
    Favorites {
        #[command(subcommand)]
        action: FavoritesCommand,
    },

    /// Resolve coordinates to a city and show its weather.
    Locate {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        #[arg(long, default_value_t = output::DEFAULT_FORECAST_ROWS)]
        limit: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum FavoritesCommand {
    /// List bookmarked cities.
    List,
    /// Bookmark a city by name.
    Add { city: String },
    /// Current conditions for every bookmarked city.
    Weather,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, limit, favorite } => {
                let config = Config::load()?;
                show(&config, &city, limit, favorite).await
            }
            Command::Suggest { query } => {
                for name in resolver::suggest(resolver::DEFAULT_GAZETTEER.iter().copied(), &query) {
                    println!("{name}");
                }
                Ok(())
            }
            Command::Favorites { action } => favorites(action).await,
            Command::Locate { lat, lon, limit } => {
                let config = Config::load()?;
                locate(&config, Coordinates { latitude: lat, longitude: lon }, limit).await
            }
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(api_key.trim().to_string());
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn open_favorites() -> Result<FavoritesStore<JsonFileStore>> {
    Ok(FavoritesStore::open(JsonFileStore::new(Config::favorites_file_path()?)))
}

fn aggregator(config: &Config) -> Result<WeatherAggregator> {
    Ok(WeatherAggregator::new(provider_from_config(config)?))
}

fn user_facing(err: FetchError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

async fn show(config: &Config, city: &str, limit: usize, favorite: bool) -> Result<()> {
    let session = WeatherSession::new(aggregator(config)?);

    let report = match session.load(city).await.map_err(user_facing)? {
        SessionUpdate::Committed(report) => report,
        SessionUpdate::Superseded => return Ok(()),
    };

    print!("{}", output::render_report(&report, limit));

    if favorite {
        let mut favorites = open_favorites()?;
        if favorites.add(report.city()).context("Failed to save favorites")? {
            println!("\nAdded {} to favorites", report.city());
        } else {
            println!("\n{} is already a favorite", report.city());
        }
    }

    Ok(())
}

async fn favorites(action: FavoritesCommand) -> Result<()> {
    let mut favorites = open_favorites()?;

    match action {
        FavoritesCommand::List => {
            if favorites.list().is_empty() {
                println!("No favorite cities yet.");
            }
            for city in favorites.list() {
                println!("{city}");
            }
        }
        FavoritesCommand::Add { city } => {
            let city = city.trim();
            if favorites.add(city).context("Failed to save favorites")? {
                println!("Added {city} to favorites");
            } else {
                println!("{city} is already a favorite");
            }
        }
        FavoritesCommand::Weather => {
            let aggregator = aggregator(&Config::load()?)?;
            let mut tasks = JoinSet::new();

            for (idx, city) in favorites.list().iter().cloned().enumerate() {
                let aggregator = aggregator.clone();
                tasks.spawn(async move {
                    let result = aggregator.load_weather(&city).await;
                    (idx, city, result)
                });
            }

            let mut rows = Vec::with_capacity(tasks.len());
            while let Some(joined) = tasks.join_next().await {
                rows.push(joined.context("Favorite lookup task failed")?);
            }
            rows.sort_by_key(|(idx, _, _)| *idx);

            if rows.is_empty() {
                println!("No favorite cities yet.");
            }
            for (_, city, result) in rows {
                match result {
                    Ok(report) => println!("{}", output::render_summary(&city, &report)),
                    Err(err) => println!("{}", output::render_failure(&city, &err)),
                }
            }
        }
    }

    Ok(())
}

async fn locate(config: &Config, coords: Coordinates, limit: usize) -> Result<()> {
    let geocoder =
        NominatimGeocoder::new(&config.geocoder_url, Duration::from_secs(config.timeout_secs))?;
    let resolver = CityResolver::new(Arc::new(geocoder));

    let mut flow = LocateFlow::new();
    match flow.run(&FixedLocation(coords), &resolver).await? {
        LocateOutcome::Resolved(city) => {
            println!("Location: {city}\n");
            show(config, &city, limit, false).await
        }
        LocateOutcome::Denied => bail!("Location permission denied"),
    }
}
