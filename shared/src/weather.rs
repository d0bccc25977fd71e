//! OpenWeather-backed sunset score.

use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::scoring::{round1, score, ScoreBreakdown, WeatherObservation};
use crate::{Error, Result};

const CURRENT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const AIR_POLLUTION_URL: &str = "https://api.openweathermap.org/data/2.5/air_pollution";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Default, Deserialize)]
pub struct OwCurrentResponse {
    #[serde(default)]
    weather: Vec<OwCondition>,
    #[serde(default)]
    clouds: Option<OwClouds>,
    #[serde(default)]
    main: Option<OwMain>,
    #[serde(default)]
    wind: Option<OwWind>,
    #[serde(default)]
    visibility: Option<f64>,
    #[serde(default)]
    sys: Option<OwSys>,
    /// Shift from UTC in seconds
    #[serde(default)]
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    sunset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OwAirResponse {
    #[serde(default)]
    list: Vec<OwAirEntry>,
}

#[derive(Debug, Deserialize)]
struct OwAirEntry {
    #[serde(default)]
    components: Option<OwComponents>,
}

#[derive(Debug, Deserialize)]
struct OwComponents {
    pm2_5: Option<f64>,
}

impl OwCurrentResponse {
    fn observation(&self) -> WeatherObservation {
        WeatherObservation {
            clouds: self.clouds.as_ref().and_then(|c| c.all),
            humidity: self.main.as_ref().and_then(|m| m.humidity),
            wind: self.wind.as_ref().and_then(|w| w.speed),
            visibility: self.visibility,
        }
    }

    fn description(&self) -> String {
        let raw = self
            .weather
            .first()
            .and_then(|w| w.description.as_deref())
            .unwrap_or("weather data");
        title_case(raw)
    }
}

impl OwAirResponse {
    fn pm25(&self) -> Option<f64> {
        self.list.first()?.components.as_ref()?.pm2_5
    }
}

#[derive(Debug, Serialize)]
pub struct ScoreMetrics {
    pub weather: String,
    pub clouds: Option<f64>,
    pub humidity: Option<f64>,
    pub pm25: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
}

/// Body returned by the score endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub score: f64,
    pub sunset_time: String,
    pub sunset_time_iso: String,
    pub metrics: ScoreMetrics,
    pub breakdown: ScoreBreakdown,
    pub source: &'static str,
    pub coords: Coords,
}

pub struct WeatherClient {
    http: Client,
    api_key: String,
}

impl WeatherClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
        })
    }

    /// Score current conditions at (`lat`, `lon`).
    pub async fn sunset_score(&self, lat: f64, lon: f64) -> Result<ScoreResponse> {
        let fetched = async {
            let current: OwCurrentResponse = self
                .get_json(CURRENT_WEATHER_URL, lat, lon, true)
                .await
                .context("OpenWeather current weather request failed")?;
            let air: OwAirResponse = self
                .get_json(AIR_POLLUTION_URL, lat, lon, false)
                .await
                .context("OpenWeather air pollution request failed")?;
            Ok::<_, anyhow::Error>((current, air))
        }
        .await
        .map_err(|e| Error::Weather(format!("{:#}", e)))?;

        let (current, air) = fetched;
        build_score_response(&current, &air, lat, lon, Utc::now()).map_err(|e| Error::Weather(format!("{:#}", e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, lat: f64, lon: f64, localized: bool) -> anyhow::Result<T> {
        let mut params = vec![
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("appid", self.api_key.clone()),
        ];
        if localized {
            params.push(("units", "metric".to_string()));
            params.push(("lang", "ja".to_string()));
        }

        let response = self
            .http
            .get(url)
            .query(&params)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Request failed with status {}", status));
        }

        response.json::<T>().await.context("Failed to parse response JSON")
    }
}

pub fn build_score_response(
    current: &OwCurrentResponse,
    air: &OwAirResponse,
    lat: f64,
    lon: f64,
    now: DateTime<Utc>,
) -> anyhow::Result<ScoreResponse> {
    let pm25 = air.pm25();
    let report = score(&current.observation(), pm25);
    let (sunset_time, sunset_time_iso) = extract_sunset(
        current.sys.as_ref().and_then(|s| s.sunset),
        current.timezone.unwrap_or(0),
        now,
    )?;

    Ok(ScoreResponse {
        score: round1(report.score),
        sunset_time,
        sunset_time_iso,
        metrics: ScoreMetrics {
            weather: current.description(),
            clouds: current.clouds.as_ref().and_then(|c| c.all),
            humidity: current.main.as_ref().and_then(|m| m.humidity),
            pm25,
        },
        breakdown: report.breakdown,
        source: "openweather",
        coords: Coords { lat, lon },
    })
}

/// Local `HH:MM` and ISO timestamp of sunset; `now` stands in when the
/// report has no sunset.
pub fn extract_sunset(sunset: Option<i64>, offset_secs: i32, now: DateTime<Utc>) -> anyhow::Result<(String, String)> {
    let offset = FixedOffset::east_opt(offset_secs).ok_or_else(|| anyhow!("Invalid UTC offset {offset_secs}"))?;
    let instant = match sunset.filter(|ts| *ts != 0) {
        Some(ts) => DateTime::from_timestamp(ts, 0).ok_or_else(|| anyhow!("Sunset timestamp out of range: {ts}"))?,
        None => now,
    };
    let local = instant.with_timezone(&offset);
    Ok((
        local.format("%H:%M").to_string(),
        local.to_rfc3339_opts(SecondsFormat::Secs, false),
    ))
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
