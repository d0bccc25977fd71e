//! In-memory fakes shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::models::{CardRequest, CardStyle, TextSize};
use crate::provider::{AttemptError, GenerationRequest, ImageGenerator, ImageModel, ProviderId};
use crate::secrets::SecretStore;
use crate::storage::ObjectStore;
use crate::{Error, Result};

pub fn sample_card() -> CardRequest {
    CardRequest {
        location: "Matsue".to_string(),
        date: "2025-11-07".to_string(),
        style: CardStyle::Gradient,
        text_size: TextSize::Md,
        score: "80".to_string(),
        sunset_time: "17:05".to_string(),
        conditions: "clear sky".to_string(),
        prompt: None,
    }
}

/// Secret store holding one value, counting lookups.
pub struct StaticSecret {
    value: Option<String>,
    pub calls: AtomicUsize,
}

impl StaticSecret {
    pub fn new(value: Option<&str>) -> Self {
        Self {
            value: value.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SecretStore for StaticSecret {
    async fn get_secret(&self, name: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.value
            .clone()
            .ok_or_else(|| Error::Aws(format!("Secret {} not found", name)))
    }
}

/// Image model replaying scripted responses in order.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<std::result::Result<Vec<u8>, AttemptError>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<std::result::Result<Vec<u8>, AttemptError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// JSON body in the Titan response shape carrying `image`.
    pub fn image_body(image: &[u8]) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({ "images": [STANDARD.encode(image)] })).unwrap()
    }

    /// Recorded `(prompt, negative)` pairs.
    pub fn calls(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ImageModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "test-model"
    }

    async fn invoke(&self, prompt: &str, negative: &str) -> std::result::Result<Vec<u8>, AttemptError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), negative.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AttemptError::Transport("no scripted response left".to_string())))
    }
}

/// Generator with a fixed outcome.
pub struct StubGenerator {
    image: Option<Vec<u8>>,
}

impl StubGenerator {
    pub fn failing() -> Self {
        Self { image: None }
    }

    pub fn returning(image: Vec<u8>) -> Self {
        Self { image: Some(image) }
    }
}

#[async_trait]
impl ImageGenerator for StubGenerator {
    fn id(&self) -> ProviderId {
        ProviderId::Stability
    }

    async fn generate(&self, _request: &GenerationRequest<'_>) -> Result<Vec<u8>> {
        self.image
            .clone()
            .ok_or_else(|| Error::Provider("Stability request failed with status 500".to_string()))
    }
}

/// Opaque single-colour PNG.
pub fn solid_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 150, 100]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Object store keeping everything in memory.
pub struct MemoryStore {
    bucket: String,
    objects: Arc<Mutex<Vec<StoredObject>>>,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn objects(&self) -> Arc<Mutex<Vec<StoredObject>>> {
        Arc::clone(&self.objects)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.objects.lock().unwrap().push(StoredObject {
            key: key.to_string(),
            body,
            content_type: content_type.to_string(),
        });
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket, key)
    }
}
