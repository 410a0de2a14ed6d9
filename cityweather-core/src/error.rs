//! Error types shared across the core crate.

use thiserror::Error;

/// Failure of a provider call or of building one.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("City query must not be empty")]
    EmptyQuery,

    #[error("No API key configured")]
    MissingApiKey,

    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("City not found: {0}")]
    NotFound(String),

    #[error("Provider request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Failed to decode provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err)
        }
    }
}

impl FetchError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyQuery => "Enter a city name".to_string(),
            Self::MissingApiKey | Self::InvalidEndpoint { .. } => {
                "Weather service is not configured".to_string()
            }
            Self::NotFound(city) => format!("City not found: {city}"),
            Self::Status { status, .. } => format!("Weather service error ({status})"),
            Self::Timeout => "Weather service did not respond in time".to_string(),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
            Self::Decode(_) => "Unexpected response from weather service".to_string(),
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Failure of the "use my location" flow.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location service unavailable: {0}")]
    Unavailable(String),

    #[error("No locality found for coordinates")]
    NoLocality,

    #[error("Reverse geocoding failed: {0}")]
    Geocoding(String),
}

/// Failure of the key-value storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("City name must not be empty")]
    EmptyName,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage format error: {0}")]
    Serialize(#[from] serde_json::Error),
}
