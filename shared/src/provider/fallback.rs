//! Candidate-prompt retry loop over a single image model.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::payload::{decode_base64, decode_image_payload, extract_image_base64};
use super::{AttemptError, GenerationRequest, ImageGenerator, ImageModel, ProviderId};
use crate::models::CardRequest;
use crate::prompt::{clamp_prompt, fallback_prompt};
use crate::sanitizer::sanitize;
use crate::{Error, Result};

/// Tries the original, sanitized and generic prompts in turn until the
/// model returns a decodable image.
pub struct FallbackChain<M> {
    model: M,
}

impl<M: ImageModel> FallbackChain<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Ordered, duplicate-free prompts to try for `prompt`.
    pub fn candidates(prompt: &str, card: &CardRequest) -> Vec<String> {
        let mut candidates = vec![clamp_prompt(prompt)];

        if let Some(sanitized) = sanitize(prompt) {
            if !candidates.contains(&sanitized) {
                candidates.push(sanitized);
            }
        }

        let generic = fallback_prompt(card);
        if !candidates.contains(&generic) {
            candidates.push(generic);
        }

        candidates
    }

    /// Run the candidates against the model.
    pub async fn run(&self, prompt: &str, negative: &str, card: &CardRequest) -> Result<Vec<u8>> {
        let mut last_cause: Option<AttemptError> = None;

        for (index, candidate) in Self::candidates(prompt, card).iter().enumerate() {
            info!(model_id = self.model.model_id(), candidate = index, "bedrock.invoke");

            let outcome = match self.model.invoke(candidate, negative).await {
                Ok(body) => decode_response(&body),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(image) => return Ok(image),
                Err(cause) if !cause.is_recoverable() => {
                    return Err(Error::Provider(format!("Image model invoke failed: {}", cause)));
                }
                Err(cause) => {
                    if matches!(cause, AttemptError::PolicyRejected(_)) {
                        warn!(model_id = self.model.model_id(), candidate = index, "bedrock.filtered");
                    } else {
                        warn!(model_id = self.model.model_id(), candidate = index, error = %cause, "bedrock.no_image");
                    }
                    last_cause = Some(cause);
                }
            }
        }

        Err(match last_cause {
            Some(cause) => Error::Provider(format!("Image generation failed after sanitizing prompts: {}", cause)),
            None => Error::Provider("Image generation failed: no valid response from the image model".to_string()),
        })
    }
}

#[async_trait]
impl<M: ImageModel> ImageGenerator for FallbackChain<M> {
    fn id(&self) -> ProviderId {
        ProviderId::Titan
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<u8>> {
        self.run(request.prompt, request.negative, request.card).await
    }
}

/// Turn a model response body into image bytes.
///
/// A body that is not JSON is taken to be the base64 image itself.
fn decode_response(body: &[u8]) -> std::result::Result<Vec<u8>, AttemptError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(json) => {
            let encoded = extract_image_base64(&json).ok_or(AttemptError::NoImage)?;
            decode_image_payload(encoded).map_err(|e| AttemptError::Decode(e.to_string()))
        }
        Err(_) => decode_base64(body).map_err(|e| AttemptError::Decode(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_card, ScriptedModel};

    fn torii_card() -> CardRequest {
        let mut card = sample_card();
        card.prompt = Some("a vermilion torii at dusk".to_string());
        card
    }

    #[test]
    fn test_candidate_order() {
        let card = torii_card();
        let prompt = "Lake Shinji with a torii gate";
        let candidates = FallbackChain::<ScriptedModel>::candidates(prompt, &card);
        assert_eq!(
            candidates,
            vec![
                prompt.to_string(),
                "Lake Shinji with a minimalist shrine gateway".to_string(),
                fallback_prompt(&card),
            ]
        );
    }

    #[test]
    fn test_candidates_skip_missing_and_duplicate_entries() {
        let card = sample_card();
        let generic = fallback_prompt(&card);

        let plain = FallbackChain::<ScriptedModel>::candidates("calm lake", &card);
        assert_eq!(plain, vec!["calm lake".to_string(), generic.clone()]);

        let same_as_generic = FallbackChain::<ScriptedModel>::candidates(&generic, &card);
        assert_eq!(same_as_generic, vec![generic]);
    }

    #[test]
    fn test_candidates_are_deterministic_and_unique() {
        let card = torii_card();
        let prompt = "sacred torii over vermilion water";
        let first = FallbackChain::<ScriptedModel>::candidates(prompt, &card);
        assert_eq!(first, FallbackChain::<ScriptedModel>::candidates(prompt, &card));
        for (i, a) in first.iter().enumerate() {
            assert!(first.iter().skip(i + 1).all(|b| a != b));
        }
    }

    #[tokio::test]
    async fn test_policy_rejection_advances_to_sanitized_prompt() {
        let card = torii_card();
        let model = ScriptedModel::new(vec![
            Err(AttemptError::PolicyRejected("This request has been blocked by our content filters.".into())),
            Ok(ScriptedModel::image_body(b"sanitized")),
            Ok(ScriptedModel::image_body(b"generic")),
        ]);
        let calls = model.calls();
        let chain = FallbackChain::new(model);

        let image = chain.run("a vermilion torii at dusk", "text", &card).await.unwrap();

        assert_eq!(image, b"sanitized");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "a vermilion torii at dusk");
        assert_eq!(calls[1].0, "a sunlit red shrine gateway at dusk");
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let card = torii_card();
        let model = ScriptedModel::new(vec![
            Err(AttemptError::Transport("ThrottlingException: slow down".into())),
            Ok(ScriptedModel::image_body(b"never")),
        ]);
        let calls = model.calls();
        let chain = FallbackChain::new(model);

        let err = chain.run("a torii", "text", &card).await.unwrap_err();

        assert!(matches!(err, Error::Provider(_)));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_image_field_advances() {
        let card = sample_card();
        let model = ScriptedModel::new(vec![
            Ok(br#"{"images": [], "error": null}"#.to_vec()),
            Ok(ScriptedModel::image_body(b"generic")),
        ]);
        let chain = FallbackChain::new(model);

        assert_eq!(chain.run("calm lake", "text", &card).await.unwrap(), b"generic");
    }

    #[tokio::test]
    async fn test_data_uri_and_raw_bodies_decode() {
        let card = sample_card();
        let model = ScriptedModel::new(vec![Ok(br#"{"image": "data:image/png;base64,AAAA"}"#.to_vec())]);
        let chain = FallbackChain::new(model);
        assert_eq!(chain.run("calm lake", "text", &card).await.unwrap(), vec![0, 0, 0]);

        let model = ScriptedModel::new(vec![Ok(b"aGVsbG8=".to_vec())]);
        let chain = FallbackChain::new(model);
        assert_eq!(chain.run("calm lake", "text", &card).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_exhaustion_wraps_last_cause() {
        let card = torii_card();
        let model = ScriptedModel::new(vec![
            Err(AttemptError::PolicyRejected("content filters".into())),
            Err(AttemptError::PolicyRejected("content filters".into())),
            Ok(br#"{"images": ["%%%"]}"#.to_vec()),
        ]);
        let chain = FallbackChain::new(model);

        let err = chain.run("a torii", "text", &card).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("after sanitizing prompts"), "{message}");
        assert!(message.contains("decode failed"), "{message}");
    }
}
