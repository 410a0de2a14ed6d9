//! "Use my location" flow.

use async_trait::async_trait;

use crate::{error::LocationError, model::Coordinates, resolver::CityResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    NotDetermined,
    Granted,
    Denied,
}

/// Device location source.
#[async_trait]
pub trait LocationService: Send + Sync {
    fn permission_status(&self) -> PermissionStatus;

    async fn request_permission(&self) -> PermissionStatus;

    async fn request_once(&self) -> Result<Coordinates, LocationError>;

    /// Redirect the user to the OS settings after a denial.
    fn open_settings(&self);
}

/// Location source for callers that already know the coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl LocationService for FixedLocation {
    fn permission_status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request_once(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }

    fn open_settings(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateState {
    Idle,
    PermissionRequested,
    LocationFetching,
    Resolved(String),
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateOutcome {
    Resolved(String),
    Denied,
}

/// One request cycle of the location flow.
#[derive(Debug)]
pub struct LocateFlow {
    state: LocateState,
}

impl Default for LocateFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl LocateFlow {
    pub fn new() -> Self {
        Self { state: LocateState::Idle }
    }

    pub fn state(&self) -> &LocateState {
        &self.state
    }

    fn transition(&mut self, next: LocateState) {
        tracing::debug!(from = ?self.state, to = ?next, "location flow");
        self.state = next;
    }

    pub async fn run(
        &mut self,
        service: &dyn LocationService,
        resolver: &CityResolver,
    ) -> Result<LocateOutcome, LocationError> {
        self.transition(LocateState::Idle);

        let status = match service.permission_status() {
            PermissionStatus::NotDetermined => {
                self.transition(LocateState::PermissionRequested);
                service.request_permission().await
            }
            status => status,
        };

        if status != PermissionStatus::Granted {
            self.transition(LocateState::Denied);
            service.open_settings();
            return Ok(LocateOutcome::Denied);
        }

        self.transition(LocateState::LocationFetching);
        let city = match self.fetch_city(service, resolver).await {
            Ok(city) => city,
            Err(err) => {
                tracing::warn!(error = %err, "location lookup failed");
                self.transition(LocateState::Idle);
                return Err(err);
            }
        };

        self.transition(LocateState::Resolved(city.clone()));
        Ok(LocateOutcome::Resolved(city))
    }

    async fn fetch_city(
        &self,
        service: &dyn LocationService,
        resolver: &CityResolver,
    ) -> Result<String, LocationError> {
        let coords = service.request_once().await?;
        resolver.resolve_from_coordinates(coords).await
    }
}
