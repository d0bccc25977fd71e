//! Standalone sunset forecast backed by Open-Meteo.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone};
use chrono_tz::Tz;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::sunset::SunsetCalculator;
use crate::{Error, Result};

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const AIR_QUALITY_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const CACHE_TTL_SEC: u32 = 3600;

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse<H> {
    #[serde(default)]
    hourly: Option<H>,
}

#[derive(Debug, Default, Deserialize)]
struct ForecastHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    cloudcover: Vec<Option<f64>>,
    #[serde(default)]
    relativehumidity_2m: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct AirQualityHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    pm2_5: Vec<Option<f64>>,
}

/// Hourly series for one day, aligned on the forecast time axis.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub cloudcover: Vec<Option<f64>>,
    pub humidity: Vec<Option<f64>>,
    pub pm25: Vec<Option<f64>>,
}

#[derive(Debug, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize)]
pub struct Predicted {
    #[serde(rename = "cloudCover_pct")]
    pub cloud_cover_pct: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub pm25_ugm3: Option<f64>,
}

/// Body of `GET …/forecast/sunset`.
#[derive(Debug, Serialize)]
pub struct ForecastPayload {
    pub location: Coordinates,
    pub sunset_jst: String,
    pub source: &'static str,
    pub predicted: Predicted,
    pub hourly_timestamp: String,
    pub cache_ttl_sec: u32,
}

pub struct ForecastClient {
    http: Client,
}

impl ForecastClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// Forecast conditions at the hour nearest to sunset on `date`.
    pub async fn sunset_forecast(&self, calculator: &SunsetCalculator, date: NaiveDate) -> Result<ForecastPayload> {
        let sunset = calculator.compute(date)?;
        let series = self
            .hourly(calculator.lat(), calculator.lon(), date)
            .await
            .map_err(|e| Error::Weather(format!("{:#}", e)))?;

        build_payload(calculator, &sunset, &series).map_err(|e| Error::Weather(format!("{:#}", e)))
    }

    async fn hourly(&self, lat: f64, lon: f64, date: NaiveDate) -> anyhow::Result<HourlySeries> {
        let day = date.format("%Y-%m-%d").to_string();

        let forecast: OpenMeteoResponse<ForecastHourly> = self
            .get_json(FORECAST_URL, lat, lon, &day, "cloudcover,relativehumidity_2m")
            .await
            .context("Open-Meteo forecast request failed")?;
        let air: OpenMeteoResponse<AirQualityHourly> = self
            .get_json(AIR_QUALITY_URL, lat, lon, &day, "pm2_5")
            .await
            .context("Open-Meteo air-quality request failed")?;

        Ok(align_series(forecast.hourly.unwrap_or_default(), air.hourly.unwrap_or_default()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        lat: f64,
        lon: f64,
        day: &str,
        hourly: &str,
    ) -> anyhow::Result<T> {
        let response = self
            .http
            .get(url)
            .query(&[
                ("latitude", lat.to_string().as_str()),
                ("longitude", lon.to_string().as_str()),
                ("timezone", "Asia/Tokyo"),
                ("start_date", day),
                ("end_date", day),
                ("hourly", hourly),
            ])
            .send()
            .await
            .context("Failed to send request")?
            .error_for_status()?;

        response.json::<T>().await.context("Failed to parse response JSON")
    }
}

/// Re-key air quality onto the forecast time axis; missing hours become null.
fn align_series(forecast: ForecastHourly, air: AirQualityHourly) -> HourlySeries {
    let pm_by_time: HashMap<&str, Option<f64>> = air
        .time
        .iter()
        .map(String::as_str)
        .zip(air.pm2_5.iter().copied())
        .collect();
    let pm25 = forecast
        .time
        .iter()
        .map(|ts| pm_by_time.get(ts.as_str()).copied().flatten())
        .collect();

    HourlySeries {
        pm25,
        time: forecast.time,
        cloudcover: forecast.cloudcover,
        humidity: forecast.relativehumidity_2m,
    }
}

/// Parse an hourly timestamp; naive values are local to `tz`.
fn parse_hour(raw: &str, tz: Tz) -> anyhow::Result<DateTime<Tz>> {
    if let Ok(aware) = DateTime::parse_from_rfc3339(raw) {
        return Ok(aware.with_timezone(&tz));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .with_context(|| format!("Invalid hourly timestamp {raw:?}"))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow!("Nonexistent local time {raw:?}"))
}

/// Index of the timestamp closest to `target`.
pub fn nearest_index(times: &[DateTime<Tz>], target: &DateTime<Tz>) -> Option<usize> {
    times
        .iter()
        .enumerate()
        .min_by_key(|(_, t)| (**t - *target).num_seconds().abs())
        .map(|(i, _)| i)
}

fn value_at(series: &[Option<f64>], index: usize, name: &str) -> anyhow::Result<Option<f64>> {
    series
        .get(index)
        .copied()
        .ok_or_else(|| anyhow!("Hourly {name} series has no entry {index}"))
}

fn build_payload(
    calculator: &SunsetCalculator,
    sunset: &DateTime<Tz>,
    series: &HourlySeries,
) -> anyhow::Result<ForecastPayload> {
    let times = series
        .time
        .iter()
        .map(|raw| parse_hour(raw, calculator.timezone()))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let index = nearest_index(&times, sunset).ok_or_else(|| anyhow!("No hourly forecast points in response"))?;

    Ok(ForecastPayload {
        location: Coordinates {
            lat: calculator.lat(),
            lon: calculator.lon(),
        },
        sunset_jst: sunset.to_rfc3339_opts(SecondsFormat::Secs, false),
        source: "open-meteo",
        predicted: Predicted {
            cloud_cover_pct: value_at(&series.cloudcover, index, "cloudcover")?,
            humidity_pct: value_at(&series.humidity, index, "relativehumidity_2m")?,
            pm25_ugm3: value_at(&series.pm25, index, "pm2_5")?,
        },
        hourly_timestamp: times[index].to_rfc3339_opts(SecondsFormat::Secs, false),
        cache_ttl_sec: CACHE_TTL_SEC,
    })
}
