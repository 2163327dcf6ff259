/// Weather observations and their assessed impact on a disaster
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current conditions near a report's coordinates. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    /// km/h
    pub wind_speed: f64,
    pub wind_direction: String,
    pub condition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "High Impact")]
    High,
    #[serde(rename = "Medium Impact")]
    Medium,
    #[serde(rename = "Low Impact")]
    Low,
    Ineffective,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::High => "High Impact",
            RiskLevel::Medium => "Medium Impact",
            RiskLevel::Low => "Low Impact",
            RiskLevel::Ineffective => "Ineffective",
            RiskLevel::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherImpact {
    pub risk_level: RiskLevel,
    pub description: &'static str,
}

impl fmt::Display for WeatherImpact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Risk Level: {}\nDescription: {}",
            self.risk_level, self.description
        )
    }
}
