//! Image generation providers and the primary → fallback pipeline.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::models::CardRequest;
use crate::prompt::compose;
use crate::{Error, Result};

pub mod fallback;
pub mod payload;
pub mod stability;
pub mod titan;

pub use fallback::FallbackChain;
pub use stability::StabilityGenerator;
pub use titan::TitanImageModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    /// Stability AI REST API
    Stability,
    /// Amazon Titan Image Generator on Bedrock
    Titan,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Stability => "stability",
            ProviderId::Titan => "titan",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "stability" => Ok(ProviderId::Stability),
            "titan" | "bedrock" => Ok(ProviderId::Titan),
            _ => Err(Error::Config(format!(
                "Unknown image provider '{value}'. Supported providers: stability, titan."
            ))),
        }
    }
}

/// Everything a generator needs for one card.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub card: &'a CardRequest,
    pub prompt: &'a str,
    pub negative: &'a str,
    pub width: u32,
    pub height: u32,
}

/// Capability shared by every image generator variant.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<u8>>;
}

/// Outcome of a single model invocation that did not yield an image.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    /// The provider refused the prompt under its content policy.
    #[error("content policy rejection: {0}")]
    PolicyRejected(String),

    /// Network, auth, throttling or any other non-policy provider failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response decoded but carried no image field.
    #[error("no image data returned")]
    NoImage,

    /// The image field was not valid base64.
    #[error("image payload decode failed: {0}")]
    Decode(String),
}

impl AttemptError {
    /// Whether the next candidate prompt should be tried.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AttemptError::Transport(_))
    }
}

/// A raw text-to-image model endpoint returning the undecoded response body.
#[async_trait]
pub trait ImageModel: Send + Sync {
    fn model_id(&self) -> &str;

    async fn invoke(&self, prompt: &str, negative: &str) -> std::result::Result<Vec<u8>, AttemptError>;
}

/// Primary generator (optional) backed by the fallback chain.
pub struct ImagePipeline {
    primary: Option<Box<dyn ImageGenerator>>,
    fallback: Box<dyn ImageGenerator>,
    width: u32,
    height: u32,
}

impl ImagePipeline {
    pub fn new(
        primary: Option<Box<dyn ImageGenerator>>,
        fallback: Box<dyn ImageGenerator>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            primary,
            fallback,
            width,
            height,
        }
    }

    /// Generate the raw image for a card.
    ///
    /// Any primary failure hands the same composed prompt to the fallback.
    pub async fn generate_image(&self, card: &CardRequest) -> Result<Vec<u8>> {
        if let Some(primary) = &self.primary {
            match self.run(primary.as_ref(), card).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    warn!(provider = %primary.id(), error = %e, "stability.failed");
                }
            }
        }

        self.run(self.fallback.as_ref(), card).await
    }

    async fn run(&self, generator: &dyn ImageGenerator, card: &CardRequest) -> Result<Vec<u8>> {
        let prompts = compose(card, generator.id());
        generator
            .generate(&GenerationRequest {
                card,
                prompt: &prompts.positive,
                negative: &prompts.negative,
                width: self.width,
                height: self.height,
            })
            .await
    }
}
