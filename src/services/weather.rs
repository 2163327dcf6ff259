/// Weather impact ladders per disaster type
use crate::domain::{DisasterType, RiskLevel, WeatherImpact, WeatherSnapshot};

fn impact(risk_level: RiskLevel, description: &'static str) -> WeatherImpact {
    WeatherImpact {
        risk_level,
        description,
    }
}

/// Rate how current conditions affect a disaster of the given type
pub fn analyze_weather_impact(weather: &WeatherSnapshot, kind: DisasterType) -> WeatherImpact {
    let humidity = weather.humidity;
    let wind = weather.wind_speed;
    let temperature = weather.temperature;
    let condition = weather.condition.as_str();

    match kind {
        DisasterType::Wildfire => {
            if humidity < 20.0 && wind > 30.0 && temperature > 35.0 {
                impact(
                    RiskLevel::High,
                    "Extreme fire danger: Very low humidity, high winds, and high temperature significantly increase fire spread risk.",
                )
            } else if humidity < 30.0 && wind > 20.0 && temperature > 30.0 {
                impact(
                    RiskLevel::Medium,
                    "High fire danger: Low humidity and strong winds increase fire spread risk.",
                )
            } else {
                impact(
                    RiskLevel::Low,
                    "Moderate fire danger: Current weather conditions may affect fire behavior.",
                )
            }
        }
        DisasterType::Hurricane => {
            if wind > 120.0 {
                impact(
                    RiskLevel::High,
                    "Extreme hurricane danger: Catastrophic damage will occur. Most areas will be uninhabitable for weeks or months.",
                )
            } else if wind > 90.0 {
                impact(
                    RiskLevel::Medium,
                    "High hurricane danger: Extensive damage will occur. Many areas will be uninhabitable for days to weeks.",
                )
            } else if wind > 60.0 {
                impact(
                    RiskLevel::Low,
                    "Moderate hurricane danger: Some damage will occur. Some areas may be uninhabitable briefly.",
                )
            } else {
                impact(
                    RiskLevel::Ineffective,
                    "Wind speeds below hurricane force, but still dangerous conditions possible.",
                )
            }
        }
        DisasterType::Flood => {
            if condition.contains("Heavy Rain") && wind > 30.0 {
                impact(
                    RiskLevel::High,
                    "Severe flood risk: Heavy rainfall and strong winds may cause significant flooding and infrastructure damage.",
                )
            } else if condition.contains("Rain") && wind > 20.0 {
                impact(
                    RiskLevel::Medium,
                    "High flood risk: Rainfall and winds may cause flooding in low-lying areas.",
                )
            } else if condition.contains("Rain") {
                impact(
                    RiskLevel::Low,
                    "Moderate flood risk: Rainfall may cause some localized flooding.",
                )
            } else {
                impact(
                    RiskLevel::Ineffective,
                    "No immediate flood risk based on current weather conditions.",
                )
            }
        }
        // Informational only: weather never drives an earthquake, it only
        // complicates the response
        DisasterType::Earthquake => {
            if condition.contains("Rain") || wind > 20.0 {
                impact(
                    RiskLevel::Medium,
                    "Weather may complicate earthquake response: Rain or strong winds could affect rescue efforts and increase risks of landslides.",
                )
            } else {
                impact(
                    RiskLevel::Low,
                    "Current weather conditions unlikely to significantly impact earthquake response efforts.",
                )
            }
        }
        DisasterType::Landslide | DisasterType::Other => impact(
            RiskLevel::NotApplicable,
            "Weather impact assessment not available for this disaster type.",
        ),
    }
}
