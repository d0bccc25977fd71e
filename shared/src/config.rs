//! Configuration management for Lambda functions.

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::provider::ProviderId;
use crate::{Error, Result};

const DEFAULT_MODEL_ID: &str = "amazon.titan-image-generator-v1";
const DEFAULT_STABILITY_ENDPOINT: &str = "https://api.stability.ai/v2beta/stable-image/generate/sd3";

/// Card generation configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bedrock model used by the fallback generator
    pub model_id: String,
    /// Region of the Bedrock runtime endpoint
    pub bedrock_region: String,
    /// Bucket receiving rendered cards
    pub output_bucket: String,
    /// CloudFront distribution domain (optional)
    pub cloudfront_domain: Option<String>,
    /// CDN base URL that takes precedence over CloudFront (optional)
    pub cdn_host: Option<String>,
    /// Build identifier echoed in every card response
    pub code_version: String,
    /// Which generator runs first
    pub image_provider: ProviderId,
    pub stability: StabilityConfig,
    /// Extra font files probed before the built-in list
    pub font_paths: Vec<PathBuf>,
}

/// Settings for the Stability AI generator.
#[derive(Debug, Clone)]
pub struct StabilityConfig {
    pub endpoint: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    /// SSM parameter holding the API key
    pub api_key_param: String,
    /// Secrets Manager ARN holding the API key; preferred over SSM when set
    pub api_key_secret_arn: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let output_bucket = non_empty_var("OUTPUT_BUCKET")
            .ok_or_else(|| Error::Config("OUTPUT_BUCKET not set".to_string()))?;

        let image_provider = provider_from(non_empty_var("IMG_PROVIDER").as_deref());

        Ok(Self {
            model_id: non_empty_var("MODEL_ID").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            bedrock_region: non_empty_var("BEDROCK_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            output_bucket,
            cloudfront_domain: non_empty_var("CLOUDFRONT_DOMAIN"),
            cdn_host: non_empty_var("CDN_HOST"),
            code_version: non_empty_var("CODE_VERSION").unwrap_or_else(|| "2025-11-07-02".to_string()),
            image_provider,
            stability: StabilityConfig {
                endpoint: non_empty_var("STABILITY_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_STABILITY_ENDPOINT.to_string()),
                model: non_empty_var("STABILITY_MODEL").unwrap_or_else(|| "sd3".to_string()),
                width: u32_var("STABILITY_WIDTH", 1344),
                height: u32_var("STABILITY_HEIGHT", 768),
                api_key_param: non_empty_var("STABILITY_API_KEY_PARAM")
                    .unwrap_or_else(|| "/sunset/STABILITY_API_KEY".to_string()),
                api_key_secret_arn: non_empty_var("STABILITY_API_KEY_SECRET_ARN"),
            },
            font_paths: non_empty_var("FONT_PATHS")
                .map(|raw| env::split_paths(&raw).collect())
                .unwrap_or_default(),
        })
    }
}

/// Configuration for the OpenWeather-backed score endpoint.
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    /// OpenWeather API key; the endpoint reports a configuration error without it
    pub openweather_api_key: Option<String>,
    pub default_lat: f64,
    pub default_lon: f64,
}

impl ScoreConfig {
    pub fn from_env() -> Self {
        Self {
            openweather_api_key: non_empty_var("OPENWEATHER_API"),
            default_lat: f64_var("LAT", crate::sunset::OBSERVER_LAT),
            default_lon: f64_var("LON", crate::sunset::OBSERVER_LON),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an integer variable, falling back to `default` on absent or invalid input.
fn u32_var(name: &str, default: u32) -> u32 {
    parse_or_default(name, non_empty_var(name).as_deref(), default)
}

fn f64_var(name: &str, default: f64) -> f64 {
    parse_or_default(name, non_empty_var(name).as_deref(), default)
}

fn parse_or_default<T>(name: &str, raw: Option<&str>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid {} value '{}', using default {}", name, raw, default);
            default
        }),
    }
}

/// Primary generator selection. An unrecognised name runs Bedrock only.
fn provider_from(raw: Option<&str>) -> ProviderId {
    let Some(raw) = raw else {
        return ProviderId::Stability;
    };
    ProviderId::try_from(raw).unwrap_or_else(|_| {
        warn!("Unknown IMG_PROVIDER '{}', using Bedrock only", raw);
        ProviderId::Titan
    })
}
