//! Stability AI stable-image generator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::Form;
use reqwest::Client;
use serde::Deserialize;

use super::payload::decode_image_payload;
use super::{GenerationRequest, ImageGenerator, ProviderId};
use crate::config::StabilityConfig;
use crate::secrets::CachedSecret;
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct StabilityJson {
    image: Option<String>,
}

/// Primary generator calling the Stability REST API.
pub struct StabilityGenerator {
    http: Client,
    endpoint: String,
    model: String,
    api_key: CachedSecret,
}

impl StabilityGenerator {
    pub fn new(config: &StabilityConfig, api_key: CachedSecret) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ImageGenerator for StabilityGenerator {
    fn id(&self) -> ProviderId {
        ProviderId::Stability
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<u8>> {
        let api_key = self.api_key.get().await?;

        let form = Form::new()
            .text("prompt", request.prompt.to_string())
            .text("negative_prompt", request.negative.to_string())
            .text("width", request.width.to_string())
            .text("height", request.height.to_string())
            .text("output_format", "png")
            .text("model", self.model.clone());

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Stability request failed: {}", e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Provider(format!("Failed to read Stability response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Provider(format!(
                "Stability request failed with status {}: {}",
                status,
                truncate_body(&String::from_utf8_lossy(&body)),
            )));
        }

        image_from_response(&content_type, &body)
    }
}

/// Accept either raw image bytes or a JSON body carrying base64 `image`.
fn image_from_response(content_type: &str, body: &[u8]) -> Result<Vec<u8>> {
    if content_type.starts_with("image/") {
        return Ok(body.to_vec());
    }

    let parsed: StabilityJson = serde_json::from_slice(body)
        .map_err(|e| Error::Provider(format!("Unexpected response from Stability: {}", e)))?;
    let encoded = parsed
        .image
        .ok_or_else(|| Error::Provider("Unexpected response from Stability: no image".to_string()))?;

    decode_image_payload(&encoded).map_err(|e| Error::Provider(format!("Stability image decode failed: {}", e)))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_image_response() {
        let png = [0x89, b'P', b'N', b'G'];
        assert_eq!(image_from_response("image/png", &png).unwrap(), png.to_vec());
    }

    #[test]
    fn test_json_image_response() {
        let body = br#"{"image": "aGVsbG8=", "finish_reason": "SUCCESS", "seed": 42}"#;
        assert_eq!(image_from_response("application/json", body).unwrap(), b"hello");
    }

    #[test]
    fn test_json_without_image_is_error() {
        let body = br#"{"name": "content_moderation", "errors": ["flagged"]}"#;
        assert!(matches!(image_from_response("application/json", body), Err(Error::Provider(_))));
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        assert_eq!(truncate_body(&"x".repeat(400)).len(), 303);
    }
}
