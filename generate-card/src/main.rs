//! Sunset Card Lambda - Generates and stores Lake Shinji sunset cards.
//!
//! Endpoints:
//! - OPTIONS * - CORS preflight
//! - GET */forecast/sunset - Open-Meteo conditions at sunset (`?date=YYYY-MM-DD`)
//! - POST * - Generate a card image and return its URLs

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use shared::forecast::{ForecastClient, CACHE_TTL_SEC};
use shared::http::{cached_json_response, error_response, json_response, options_response};
use shared::provider::titan::bedrock_client;
use shared::provider::{FallbackChain, ImageGenerator, ImagePipeline, ProviderId, StabilityGenerator, TitanImageModel};
use shared::render::CardRenderer;
use shared::secrets::{CachedSecret, SecretStore, SecretsManagerStore, SsmParameterStore};
use shared::storage::S3Store;
use shared::validation::parse_card_request;
use shared::{CardService, Config, Publishing, SunsetCalculator};

/// Forecast endpoint failure body.
#[derive(Debug, Serialize)]
struct ForecastError {
    error: &'static str,
    detail: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
    Preflight,
    Forecast,
    Card,
}

impl Route {
    fn classify(method: &str, path: &str) -> Self {
        match method {
            "OPTIONS" => Route::Preflight,
            "GET" if path.ends_with("/forecast/sunset") => Route::Forecast,
            _ => Route::Card,
        }
    }
}

/// Application state
struct AppState {
    cards: CardService,
    forecast: ForecastClient,
    calculator: SunsetCalculator,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let titan = TitanImageModel::new(
            bedrock_client(&sdk_config, &config.bedrock_region),
            config.model_id.clone(),
        );
        let fallback: Box<dyn ImageGenerator> = Box::new(FallbackChain::new(titan));

        let primary: Option<Box<dyn ImageGenerator>> = match config.image_provider {
            ProviderId::Stability => {
                let api_key = match &config.stability.api_key_secret_arn {
                    Some(arn) => {
                        let store: Arc<dyn SecretStore> =
                            Arc::new(SecretsManagerStore::new(aws_sdk_secretsmanager::Client::new(&sdk_config)));
                        CachedSecret::new(store, arn.clone())
                    }
                    None => {
                        let store: Arc<dyn SecretStore> =
                            Arc::new(SsmParameterStore::new(aws_sdk_ssm::Client::new(&sdk_config)));
                        CachedSecret::new(store, config.stability.api_key_param.clone())
                    }
                };
                info!(secret = api_key.name(), "Stability API key source configured");
                Some(Box::new(StabilityGenerator::new(&config.stability, api_key)?))
            }
            ProviderId::Titan => None,
        };

        let pipeline = ImagePipeline::new(primary, fallback, config.stability.width, config.stability.height);
        let store = S3Store::new(aws_sdk_s3::Client::new(&sdk_config), config.output_bucket.clone());
        let calculator = SunsetCalculator::default();

        info!(
            provider = %config.image_provider,
            model_id = %config.model_id,
            bucket = %config.output_bucket,
            code_version = %config.code_version,
            "Card generator initialised"
        );

        Ok(Self {
            cards: CardService::new(
                pipeline,
                CardRenderer::new(&config.font_paths),
                Box::new(store),
                calculator,
                Publishing::from(&config),
            ),
            forecast: ForecastClient::new()?,
            calculator,
        })
    }
}

fn request_id(event: &Request) -> String {
    event
        .lambda_context_ref()
        .map(|ctx| ctx.request_id.clone())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Target date from the `date` query parameter, today when absent.
fn forecast_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(today),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("Invalid date '{}': {}", raw, e)),
    }
}

async fn handle_forecast(state: &AppState, event: &Request) -> Result<Response<Body>, Error> {
    let params = event.query_string_parameters();
    let date = match forecast_date(params.first("date"), state.calculator.today()) {
        Ok(date) => date,
        Err(detail) => {
            return json_response(400, &ForecastError { error: "forecast_failed", detail });
        }
    };

    let cache_control = format!("public, max-age={}", CACHE_TTL_SEC);
    match state.forecast.sunset_forecast(&state.calculator, date).await {
        Ok(payload) => cached_json_response(200, &payload, Some(cache_control.as_str())),
        Err(e) => {
            warn!(date = %date, error = %e, "forecast.failed");
            cached_json_response(
                502,
                &ForecastError {
                    error: "forecast_failed",
                    detail: e.to_string(),
                },
                Some(cache_control.as_str()),
            )
        }
    }
}

async fn handle_card(state: &AppState, event: &Request, request_id: &str) -> Result<Response<Body>, Error> {
    let outcome = match parse_card_request(event.body(), Utc::now().date_naive()) {
        Ok(card) => state.cards.create(card, request_id).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(response) => json_response(200, &response),
        Err(e) if e.status_code() == 400 => {
            warn!(request_id = %request_id, error = %e, "request.validation_failed");
            error_response(400, e.error_type(), e.public_message(), request_id)
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "request.failed");
            error_response(e.status_code(), e.error_type(), e.public_message(), request_id)
        }
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let method = event.method().as_str();
    let path = event.uri().path();

    match Route::classify(method, path) {
        Route::Preflight => options_response(),
        Route::Forecast => handle_forecast(&state, &event).await,
        Route::Card => {
            let request_id = request_id(&event);
            handle_card(&state, &event, &request_id).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_classification() {
        assert_eq!(Route::classify("OPTIONS", "/prod/generate"), Route::Preflight);
        assert_eq!(Route::classify("OPTIONS", "/prod/forecast/sunset"), Route::Preflight);
        assert_eq!(Route::classify("GET", "/prod/forecast/sunset"), Route::Forecast);
        assert_eq!(Route::classify("GET", "/forecast/sunset"), Route::Forecast);
        assert_eq!(Route::classify("POST", "/prod/forecast/sunset"), Route::Card);
        assert_eq!(Route::classify("GET", "/prod/generate"), Route::Card);
        assert_eq!(Route::classify("POST", "/prod/generate"), Route::Card);
    }

    #[test]
    fn test_forecast_date() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 7).unwrap();
        assert_eq!(forecast_date(None, today), Ok(today));
        assert_eq!(forecast_date(Some(" "), today), Ok(today));
        assert_eq!(
            forecast_date(Some("2025-06-21"), today),
            Ok(NaiveDate::from_ymd_opt(2025, 6, 21).unwrap())
        );
        assert!(forecast_date(Some("21/06/2025"), today).is_err());
    }

    #[test]
    fn test_request_id_falls_back_to_uuid() {
        let event = Request::default();
        let id = request_id(&event);
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
