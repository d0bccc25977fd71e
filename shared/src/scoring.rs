//! Sunset quality score.
//!
//! A hand-tuned heuristic, not a physical model: mid-range cloud cover near
//! 45% scores best because it catches colour, and humidity, wind, poor
//! visibility and particulates each subtract from an otherwise calm clear
//! evening. The constants are the tuned values; keep them as they are.

use serde::Serialize;

pub const DEFAULT_CLOUDS: f64 = 50.0;
pub const DEFAULT_HUMIDITY: f64 = 60.0;
pub const DEFAULT_WIND: f64 = 3.5;
pub const DEFAULT_VISIBILITY: f64 = 10_000.0;
pub const DEFAULT_PM25: f64 = 12.0;

const CLOUD_TERM_CAP: f64 = 45.0;

/// Raw observations; any field may be missing from the upstream report.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeatherObservation {
    /// Cloud cover, percent
    pub clouds: Option<f64>,
    /// Relative humidity, percent
    pub humidity: Option<f64>,
    /// Wind speed, m/s
    pub wind: Option<f64>,
    /// Visibility, meters
    pub visibility: Option<f64>,
}

/// One factor's input value and its contribution to the score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Factor {
    pub value: f64,
    #[serde(serialize_with = "one_decimal")]
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudFactor {
    pub value: f64,
    #[serde(serialize_with = "one_decimal")]
    pub weight: f64,
    /// Portion of `weight` earned by the clear-sky boost
    #[serde(serialize_with = "one_decimal")]
    pub clear_sky_boost: f64,
}

/// Itemized score contributions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub clouds: CloudFactor,
    pub humidity: Factor,
    pub wind: Factor,
    pub visibility: Factor,
    pub pm25: Factor,
}

impl ScoreBreakdown {
    pub fn total_weight(&self) -> f64 {
        self.clouds.weight + self.humidity.weight + self.wind.weight + self.visibility.weight + self.pm25.weight
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreReport {
    /// Total in `[0, 100]`
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Score an observation. `pm25` is in µg/m³.
pub fn score(weather: &WeatherObservation, pm25: Option<f64>) -> ScoreReport {
    let clouds = weather.clouds.unwrap_or(DEFAULT_CLOUDS);
    let humidity = weather.humidity.unwrap_or(DEFAULT_HUMIDITY);
    let wind = weather.wind.unwrap_or(DEFAULT_WIND);
    // Providers report 0 when visibility is unknown.
    let visibility = weather
        .visibility
        .filter(|v| *v != 0.0)
        .unwrap_or(DEFAULT_VISIBILITY);
    let pm25 = pm25.unwrap_or(DEFAULT_PM25);

    let (cloud, clear_sky_boost) = cloud_term(clouds);
    let humidity_term = humidity_term(humidity);
    let wind_term = wind_term(wind);
    let visibility_term = visibility_term(visibility);
    let pm_term = pm25_term(pm25);

    let breakdown = ScoreBreakdown {
        clouds: CloudFactor {
            value: clouds,
            weight: cloud,
            clear_sky_boost,
        },
        humidity: Factor { value: humidity, weight: humidity_term },
        wind: Factor { value: wind, weight: wind_term },
        visibility: Factor { value: visibility, weight: visibility_term },
        pm25: Factor { value: pm25, weight: pm_term },
    };

    ScoreReport {
        score: breakdown.total_weight().clamp(0.0, 100.0),
        breakdown,
    }
}

/// Cloud contribution and the clear-sky boost included in it.
pub fn cloud_term(clouds: f64) -> (f64, f64) {
    let base = (35.0 - (45.0 - clouds).abs() * 0.7).max(0.0);
    let clear_sky_boost = if clouds <= 25.0 {
        ((25.0 - clouds) * 1.0).max(0.0)
    } else {
        0.0
    };
    ((base + clear_sky_boost).min(CLOUD_TERM_CAP), clear_sky_boost)
}

fn humidity_term(humidity: f64) -> f64 {
    (20.0 - (humidity - 55.0).max(0.0) * 0.5).max(0.0)
}

fn wind_term(wind: f64) -> f64 {
    (20.0 - (wind - 3.0).max(0.0) * 6.0).max(0.0)
}

fn visibility_term(visibility: f64) -> f64 {
    (15.0 - ((7000.0 - visibility) / 400.0).max(0.0)).max(0.0)
}

fn pm25_term(pm25: f64) -> f64 {
    (30.0 - (pm25 - 12.0).max(0.0) * 2.0).max(0.0)
}

/// Round half away from zero to one decimal.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn one_decimal<S: serde::Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round1(*value))
}
