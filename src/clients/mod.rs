/// External API clients module
use crate::domain::WeatherSnapshot;
use crate::errors::{ApiError, ApiResult};
use crate::repo::WeatherProvider;
use crate::utils::num;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// HTTP client wrapper with common configuration
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("drs-coordinator/1.0")
            .build()?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

/// Current-conditions client for an Open-Meteo compatible forecast API
pub struct OpenMeteoClient {
    http_client: HttpClient,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(base_url: String) -> ApiResult<Self> {
        Ok(Self {
            http_client: HttpClient::new()?,
            base_url,
        })
    }

    /// Fetch current conditions at a point
    pub async fn fetch_current(&self, latitude: f64, longitude: f64) -> ApiResult<Value> {
        let resp = self
            .http_client
            .get_client()
            .get(&self.base_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,wind_speed_10m,wind_direction_10m,weather_code"
                        .to_string(),
                ),
            ])
            .send()
            .await?
            .error_for_status()?;

        let json = resp.json().await?;
        Ok(json)
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    /// The API snaps to its own grid, so the tolerance is not applied
    async fn nearest(
        &self,
        latitude: f64,
        longitude: f64,
        _tolerance: f64,
    ) -> ApiResult<Option<WeatherSnapshot>> {
        let json = self.fetch_current(latitude, longitude).await?;
        snapshot_from_json(&json, latitude, longitude)
    }
}

/// Build a snapshot from an Open-Meteo `current` block. A response without
/// one means no observation is available.
fn snapshot_from_json(json: &Value, latitude: f64, longitude: f64) -> ApiResult<Option<WeatherSnapshot>> {
    let current = match json.get("current") {
        Some(c) if c.is_object() => c,
        _ => return Ok(None),
    };
    let field = |key: &str| {
        num(&current[key]).ok_or_else(|| {
            ApiError::Internal(format!("weather response is missing current.{}", key))
        })
    };

    Ok(Some(WeatherSnapshot {
        location: format!("{:.2},{:.2}", latitude, longitude),
        latitude: num(&json["latitude"]).unwrap_or(latitude),
        longitude: num(&json["longitude"]).unwrap_or(longitude),
        temperature: field("temperature_2m")?,
        humidity: field("relative_humidity_2m")?,
        wind_speed: field("wind_speed_10m")?,
        wind_direction: compass_point(num(&current["wind_direction_10m"]).unwrap_or(0.0)).to_string(),
        condition: condition_for_code(field("weather_code")? as i64).to_string(),
    }))
}

/// WMO weather interpretation code to condition text
pub fn condition_for_code(code: i64) -> &'static str {
    match code {
        0 => "Clear",
        1 | 2 => "Partly Cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 | 56 | 57 => "Drizzle",
        61 | 63 | 66 => "Rain",
        65 | 67 => "Heavy Rain",
        71 | 73 | 75 | 77 => "Snow",
        80 | 81 => "Rain Showers",
        82 => "Heavy Rain Showers",
        85 | 86 => "Snow Showers",
        95 | 96 | 99 => "Thunderstorm",
        _ => "Unknown",
    }
}

fn compass_point(degrees: f64) -> &'static str {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let index = ((degrees.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
    POINTS[index]
}
