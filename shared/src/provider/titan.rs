//! Amazon Titan Image Generator via Bedrock runtime.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_bedrockruntime::config::Region;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::operation::invoke_model::InvokeModelError;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use serde::Serialize;

use super::{AttemptError, ImageModel};

const INVOKE_TIMEOUT: Duration = Duration::from_secs(120);

/// Bedrock runtime client pinned to `region` with the invoke timeout applied.
pub fn bedrock_client(sdk_config: &aws_config::SdkConfig, region: &str) -> BedrockClient {
    let config = aws_sdk_bedrockruntime::config::Builder::from(sdk_config)
        .region(Region::new(region.to_string()))
        .timeout_config(TimeoutConfig::builder().operation_timeout(INVOKE_TIMEOUT).build())
        .build();
    BedrockClient::from_conf(config)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanRequest<'a> {
    task_type: &'static str,
    text_to_image_params: TextToImageParams<'a>,
    image_generation_config: ImageGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextToImageParams<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageGenerationConfig {
    number_of_images: u32,
    height: u32,
    width: u32,
    cfg_scale: f32,
    quality: &'static str,
}

/// Titan text-to-image model. Always renders a square 1024px image.
pub struct TitanImageModel {
    client: BedrockClient,
    model_id: String,
}

impl TitanImageModel {
    pub fn new(client: BedrockClient, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }
}

fn request_body(prompt: &str, negative: &str) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&TitanRequest {
        task_type: "TEXT_IMAGE",
        text_to_image_params: TextToImageParams {
            text: prompt,
            negative_text: Some(negative).filter(|n| !n.trim().is_empty()),
        },
        image_generation_config: ImageGenerationConfig {
            number_of_images: 1,
            height: 1024,
            width: 1024,
            cfg_scale: 8.0,
            quality: "standard",
        },
    })
}

/// Bedrock reports content-filter refusals as a `ValidationException`
/// mentioning "content filters".
fn is_content_filter_message(message: Option<&str>) -> bool {
    message
        .map(|m| m.to_lowercase().contains("content filters"))
        .unwrap_or(false)
}

#[async_trait]
impl ImageModel for TitanImageModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn invoke(&self, prompt: &str, negative: &str) -> Result<Vec<u8>, AttemptError> {
        let body = request_body(prompt, negative).map_err(|e| AttemptError::Transport(e.to_string()))?;

        let result = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.body().as_ref().to_vec()),
            Err(err) => {
                if let Some(InvokeModelError::ValidationException(e)) = err.as_service_error() {
                    if is_content_filter_message(e.message()) {
                        return Err(AttemptError::PolicyRejected(
                            e.message().unwrap_or_default().to_string(),
                        ));
                    }
                }
                Err(AttemptError::Transport(DisplayErrorContext(&err).to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body: serde_json::Value = serde_json::from_slice(&request_body("calm lake", "text").unwrap()).unwrap();
        assert_eq!(body["taskType"], "TEXT_IMAGE");
        assert_eq!(body["textToImageParams"]["text"], "calm lake");
        assert_eq!(body["textToImageParams"]["negativeText"], "text");
        assert_eq!(body["imageGenerationConfig"]["numberOfImages"], 1);
        assert_eq!(body["imageGenerationConfig"]["width"], 1024);
        assert_eq!(body["imageGenerationConfig"]["cfgScale"], 8.0);
    }

    #[test]
    fn test_blank_negative_is_omitted() {
        let body: serde_json::Value = serde_json::from_slice(&request_body("calm lake", " ").unwrap()).unwrap();
        assert!(body["textToImageParams"].get("negativeText").is_none());
    }

    #[test]
    fn test_content_filter_detection() {
        assert!(is_content_filter_message(Some(
            "This request has been blocked by our Content Filters."
        )));
        assert!(!is_content_filter_message(Some("Malformed input request: width must be 1024")));
        assert!(!is_content_filter_message(None));
    }
}
