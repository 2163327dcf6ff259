/// Repository layer: storage collaborators of the coordination engine
mod memory;
mod postgres;

pub use memory::{MemoryAccountDirectory, MemoryGeocoder, MemoryReportStore, MemoryWeatherProvider};
pub use postgres::{init_db, PgAccountDirectory, PgGeocoder, PgReportStore, PgWeatherRepo};

use crate::domain::{
    Department, NewReport, PriorityLabel, Report, ReportFilter, ResponseStatus, WeatherSnapshot,
};
use crate::errors::ApiResult;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Report persistence. Every write touches only the columns it names and
/// is applied atomically to one row, so concurrent writers to different
/// columns of the same report never undo each other. Writes return the
/// report as stored afterwards.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// `NotFound` when the id is absent
    async fn get(&self, id: i64) -> ApiResult<Report>;

    async fn get_all(&self, filter: &ReportFilter) -> ApiResult<Vec<Report>>;

    /// Stores a submission and assigns its id
    async fn insert(&self, new: NewReport) -> ApiResult<Report>;

    /// Departments not named keep their current status
    async fn set_department_statuses(
        &self,
        id: i64,
        statuses: &BTreeMap<Department, ResponseStatus>,
    ) -> ApiResult<Report>;

    /// Newline-joined append to the communication log
    async fn append_log(&self, id: i64, entry: &str) -> ApiResult<Report>;

    /// Newline-joined append to the resources needed
    async fn append_resource(&self, id: i64, entry: &str) -> ApiResult<Report>;

    async fn set_coordinates(&self, id: i64, latitude: f64, longitude: f64) -> ApiResult<Report>;

    async fn set_priority(&self, id: i64, priority: PriorityLabel) -> ApiResult<Report>;

    /// Set one named field; a rejected value leaves the row untouched
    async fn update_field(&self, id: i64, field: &str, value: &str) -> ApiResult<Report>;
}

/// Weather lookup by coordinates
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn nearest(
        &self,
        latitude: f64,
        longitude: f64,
        tolerance: f64,
    ) -> ApiResult<Option<WeatherSnapshot>>;
}

/// Resolves a location name to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, location: &str) -> ApiResult<Option<(f64, f64)>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    UserNotFound,
    IncorrectPassword,
    RoleMismatch,
}

impl LoginOutcome {
    /// Admin accounts may sign in under any role
    pub fn evaluate(stored_password: &str, stored_role: &str, password: &str, role: &str) -> Self {
        if stored_password != password {
            LoginOutcome::IncorrectPassword
        } else if !stored_role.eq_ignore_ascii_case("admin")
            && !stored_role.eq_ignore_ascii_case(role)
        {
            LoginOutcome::RoleMismatch
        } else {
            LoginOutcome::Success
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoginOutcome::Success => "LOGIN_SUCCESS",
            LoginOutcome::UserNotFound => "USER_NOT_FOUND",
            LoginOutcome::IncorrectPassword => "INCORRECT_PASSWORD",
            LoginOutcome::RoleMismatch => "ROLE_MISMATCH",
        }
    }
}

/// Account lookup behind the LOGIN command
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn verify(&self, username: &str, password: &str, role: &str) -> ApiResult<LoginOutcome>;
}

/// Squared planar distance, good enough to rank candidates inside a small
/// tolerance box
pub(crate) fn within_tolerance(
    latitude: f64,
    longitude: f64,
    candidate: (f64, f64),
    tolerance: f64,
) -> Option<f64> {
    let dlat = candidate.0 - latitude;
    let dlon = candidate.1 - longitude;
    if dlat.abs() < tolerance && dlon.abs() < tolerance {
        Some(dlat * dlat + dlon * dlon)
    } else {
        None
    }
}
