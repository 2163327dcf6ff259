/// Domain models for the coordination engine
mod department;
mod report;
mod weather;

pub use department::{assignments_from_selection, Department, DepartmentStatusMap, ResponseStatus};
pub use report::{
    DisasterDetails, DisasterType, EarthquakeDetails, FloodDetails, HurricaneDetails,
    LandslideDetails, NewReport, OtherDetails, PriorityLabel, Report, ReportFilter, ReportStatus,
    WildfireDetails,
};
pub use weather::{RiskLevel, WeatherImpact, WeatherSnapshot};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub now: DateTime<Utc>,
    pub backend_reachable: bool,
}
