//! Sunset Score Lambda - Scores current sunset conditions from OpenWeather.
//!
//! Endpoints:
//! - OPTIONS * - CORS preflight
//! - GET * - Score for `?lat=&lon=` (defaults to Lake Shinji)

use std::sync::Arc;

use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shared::http::{json_response, options_response};
use shared::weather::WeatherClient;
use shared::ScoreConfig;

#[derive(Debug, Serialize)]
struct MessageBody {
    message: &'static str,
}

/// Application state
struct AppState {
    config: ScoreConfig,
    weather: Option<WeatherClient>,
}

impl AppState {
    fn new() -> Result<Self, Error> {
        let config = ScoreConfig::from_env();
        let weather = match &config.openweather_api_key {
            Some(key) => Some(WeatherClient::new(key.clone())?),
            None => None,
        };
        Ok(Self { config, weather })
    }
}

/// Parse a coordinate override, keeping `default` when absent or invalid.
fn coordinate(raw: Option<&str>, default: f64) -> f64 {
    raw.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if event.method().as_str() == "OPTIONS" {
        return options_response();
    }

    let Some(weather) = &state.weather else {
        error!("OPENWEATHER_API is not configured");
        return json_response(
            500,
            &MessageBody {
                message: "Weather integration not configured",
            },
        );
    };

    let params = event.query_string_parameters();
    let lat = coordinate(params.first("lat"), state.config.default_lat);
    let lon = coordinate(params.first("lon"), state.config.default_lon);

    match weather.sunset_score(lat, lon).await {
        Ok(score) => {
            info!(lat, lon, score = score.score, "score.computed");
            json_response(200, &score)
        }
        Err(e) => {
            error!(lat, lon, error = %e, "Failed to compute sunset index");
            json_response(
                500,
                &MessageBody {
                    message: "Score computation failed",
                },
            )
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new()?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> Arc<AppState> {
        Arc::new(AppState {
            config: ScoreConfig {
                openweather_api_key: None,
                default_lat: 35.469,
                default_lon: 133.0505,
            },
            weather: None,
        })
    }

    #[test]
    fn test_coordinate_overrides() {
        assert_eq!(coordinate(Some("35.5"), 1.0), 35.5);
        assert_eq!(coordinate(Some(" 133 "), 1.0), 133.0);
        assert_eq!(coordinate(Some("north"), 1.0), 1.0);
        assert_eq!(coordinate(Some("NaN"), 1.0), 1.0);
        assert_eq!(coordinate(None, 1.0), 1.0);
    }

    #[tokio::test]
    async fn test_preflight() {
        let event = lambda_http::http::Request::builder()
            .method("OPTIONS")
            .uri("/score")
            .body(Body::Empty)
            .unwrap();
        let response = handler(unconfigured(), event).await.unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_reported() {
        let event = lambda_http::http::Request::builder()
            .method("GET")
            .uri("/score?lat=35.4")
            .body(Body::Empty)
            .unwrap();
        let response = handler(unconfigured(), event).await.unwrap();
        assert_eq!(response.status(), 500);
        let body: serde_json::Value = serde_json::from_slice(response.body().as_ref()).unwrap();
        assert_eq!(body["message"], "Weather integration not configured");
    }
}
