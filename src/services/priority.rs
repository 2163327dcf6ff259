/// Priority scoring
use crate::domain::{DisasterType, PriorityLabel, Report, RiskLevel, WeatherImpact};
use crate::errors::ApiResult;
use crate::utils::contains_ci;
use chrono::NaiveDateTime;
use serde::Serialize;

/// One contribution to a priority score
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreFactor {
    pub factor: String,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityAssessment {
    pub score: i32,
    pub label: PriorityLabel,
    pub trail: Vec<ScoreFactor>,
}

impl PriorityAssessment {
    /// Operator-facing trail: one line per factor, then score and label
    pub fn audit_trail(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .trail
            .iter()
            .map(|f| format!("{}: +{} points", f.factor, f.points))
            .collect();
        lines.push(format!("Final score: {}", self.score));
        lines.push(format!("Priority: {}", self.label));
        lines
    }
}

fn type_score(kind: DisasterType) -> (i32, &'static str) {
    match kind {
        DisasterType::Wildfire | DisasterType::Hurricane | DisasterType::Earthquake => {
            (3, "high impact")
        }
        DisasterType::Flood | DisasterType::Landslide => (2, "medium impact"),
        DisasterType::Other => (0, "unknown impact"),
    }
}

fn weather_score(risk: RiskLevel) -> (i32, &'static str) {
    match risk {
        RiskLevel::High => (5, "High impact"),
        RiskLevel::Medium => (3, "Medium impact"),
        RiskLevel::Low => (1, "Low impact"),
        RiskLevel::Ineffective | RiskLevel::NotApplicable => (0, "Minimal impact"),
    }
}

fn area_score(raw: &str) -> Option<(i32, &'static str)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Some(match raw.parse::<f64>() {
        Ok(area) if area > 1000.0 => (4, ">1000"),
        Ok(area) if area >= 100.0 => (3, "[100-1000]"),
        Ok(area) if area >= 10.0 => (2, "[10-100)"),
        Ok(_) => (1, "<10"),
        Err(_) => (0, "unparsable"),
    })
}

fn time_score(hours: i64) -> Option<(i32, &'static str)> {
    if hours < 6 {
        Some((3, "Very recent (<6hr)"))
    } else if hours < 24 {
        Some((2, "Recent [6-24hr]"))
    } else if hours < 72 {
        Some((1, "Older [24-72hr]"))
    } else {
        None
    }
}

/// Deterministic additive score. Report age comes from `now`, so the same
/// inputs always give the same trail.
pub fn calculate_priority(
    report: &Report,
    now: NaiveDateTime,
    weather: Option<&WeatherImpact>,
) -> ApiResult<PriorityAssessment> {
    let occurred = report.occurred_at()?;
    let kind = report.disaster_type();
    let mut trail = Vec::new();
    let mut push = |factor: String, points: i32| trail.push(ScoreFactor { factor, points });

    let (points, impact) = type_score(kind);
    push(format!("Disaster {}: {}", kind, impact), points);

    if let Some(weather) = weather {
        let (points, impact) = weather_score(weather.risk_level);
        push(format!("Weather: {}", impact), points);
    }

    if let Some((points, bucket)) = area_score(report.affected_area_size()) {
        push(format!("Affected area: {}", bucket), points);
    }

    let hours = (now - occurred).num_hours();
    if let Some((points, bucket)) = time_score(hours) {
        push(format!("Time: {}", bucket), points);
    }

    let infrastructure = report.nearby_infrastructure();
    if contains_ci(infrastructure, "hospital") || contains_ci(infrastructure, "power plant") {
        push("Critical infrastructure".to_string(), 5);
    }

    if kind == DisasterType::Earthquake && contains_ci(infrastructure, "dam") {
        push("Cascading effects".to_string(), 3);
    }

    let score = trail.iter().map(|f| f.points).sum();
    Ok(PriorityAssessment {
        score,
        label: PriorityLabel::from_score(score),
        trail,
    })
}
