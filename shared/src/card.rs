//! Card generation pipeline: sunset, image, overlay, storage.

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::config::Config;
use crate::models::{CardRequest, CardResponse};
use crate::provider::ImagePipeline;
use crate::render::CardRenderer;
use crate::storage::{cloudfront_url, image_url, object_key, ObjectStore, CARD_CONTENT_TYPE};
use crate::sunset::{format_hhmm, SunsetCalculator};
use crate::{Error, Result};

/// Where finished cards are published.
#[derive(Debug, Clone, Default)]
pub struct Publishing {
    pub cdn_host: Option<String>,
    pub cloudfront_domain: Option<String>,
    pub code_version: String,
}

impl From<&Config> for Publishing {
    fn from(config: &Config) -> Self {
        Self {
            cdn_host: config.cdn_host.clone(),
            cloudfront_domain: config.cloudfront_domain.clone(),
            code_version: config.code_version.clone(),
        }
    }
}

pub struct CardService {
    pipeline: ImagePipeline,
    renderer: CardRenderer,
    store: Box<dyn ObjectStore>,
    calculator: SunsetCalculator,
    publishing: Publishing,
}

impl CardService {
    pub fn new(
        pipeline: ImagePipeline,
        renderer: CardRenderer,
        store: Box<dyn ObjectStore>,
        calculator: SunsetCalculator,
        publishing: Publishing,
    ) -> Self {
        Self {
            pipeline,
            renderer,
            store,
            calculator,
            publishing,
        }
    }

    /// Build, store and describe one card. The request's sunset time is
    /// replaced with the computed one for its date.
    pub async fn create(&self, mut card: CardRequest, request_id: &str) -> Result<CardResponse> {
        let date = NaiveDate::parse_from_str(&card.date, "%Y-%m-%d")
            .map_err(|_| Error::Validation("date must be an ISO calendar date (YYYY-MM-DD)".to_string()))?;
        let sunset = self.calculator.compute(date)?;
        card.sunset_time = format_hhmm(&sunset);

        info!(request_id = %request_id, payload = ?card.summary(), "request.received");

        let raw_image = self.pipeline.generate_image(&card).await?;
        let jpeg = self.renderer.render(&raw_image, &card)?;

        let key = object_key(&card.date, &card.location, Utc::now());
        self.store.put(&key, jpeg, CARD_CONTENT_TYPE).await?;

        let s3_url = self.store.object_url(&key);
        let cdn_host = self.publishing.cdn_host.as_deref();
        let cloudfront_domain = self.publishing.cloudfront_domain.as_deref();
        let response = CardResponse {
            image_url: image_url(&key, &s3_url, cdn_host, cloudfront_domain),
            cloud_front_url: cloudfront_domain.map(|domain| cloudfront_url(&key, domain)),
            request_id: request_id.to_string(),
            s3_url,
            object_key: key,
            code_version: self.publishing.code_version.clone(),
            sunset_jst: sunset.format("%Y-%m-%d %H:%M %Z").to_string(),
        };

        info!(request_id = %request_id, object_key = %response.object_key, "request.completed");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FontFace;
    use crate::testing::{sample_card, solid_png, MemoryStore, StubGenerator};

    fn service(primary: StubGenerator, fallback: StubGenerator, store: MemoryStore, publishing: Publishing) -> CardService {
        CardService::new(
            ImagePipeline::new(Some(Box::new(primary)), Box::new(fallback), 1344, 768),
            CardRenderer::with_font(FontFace::Bitmap),
            Box::new(store),
            SunsetCalculator::default(),
            publishing,
        )
    }

    #[tokio::test]
    async fn test_card_is_rendered_and_stored() {
        let store = MemoryStore::new("cards");
        let objects = store.objects();
        let publishing = Publishing {
            cdn_host: None,
            cloudfront_domain: Some("d111.cloudfront.net".to_string()),
            code_version: "2025-11-07-02".to_string(),
        };
        let service = service(
            StubGenerator::returning(solid_png(320, 180)),
            StubGenerator::failing(),
            store,
            publishing,
        );

        let mut card = sample_card();
        card.date = "2025-06-21".to_string();
        let response = service.create(card, "req-1").await.unwrap();

        assert!(response.object_key.starts_with("generated/2025-06-21/matsue-"));
        assert!(response.object_key.ends_with(".jpg"));
        assert_eq!(response.s3_url, format!("https://cards.s3.amazonaws.com/{}", response.object_key));
        assert_eq!(response.image_url, format!("https://d111.cloudfront.net/{}", response.object_key));
        assert_eq!(response.cloud_front_url.as_deref(), Some(response.image_url.as_str()));
        assert!(response.sunset_jst.starts_with("2025-06-21 19:"));
        assert!(response.sunset_jst.ends_with(" JST"));
        assert_eq!(response.code_version, "2025-11-07-02");

        let objects = objects.lock().unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].key, response.object_key);
        assert_eq!(objects[0].content_type, "image/jpeg");
        assert_eq!(image::guess_format(&objects[0].body).unwrap(), image::ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_primary_failure_uses_fallback_image() {
        let store = MemoryStore::new("cards");
        let service = service(
            StubGenerator::failing(),
            StubGenerator::returning(solid_png(64, 64)),
            store,
            Publishing::default(),
        );

        let response = service.create(sample_card(), "req-2").await.unwrap();
        assert_eq!(response.image_url, response.s3_url);
        assert!(response.cloud_front_url.is_none());
    }

    #[tokio::test]
    async fn test_generation_failure_stores_nothing() {
        let store = MemoryStore::new("cards");
        let objects = store.objects();
        let service = service(StubGenerator::failing(), StubGenerator::failing(), store, Publishing::default());

        let err = service.create(sample_card(), "req-3").await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Image generation failed");
        assert!(objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_date_is_validation_error() {
        let service = service(
            StubGenerator::returning(solid_png(8, 8)),
            StubGenerator::failing(),
            MemoryStore::new("cards"),
            Publishing::default(),
        );
        let mut card = sample_card();
        card.date = "2025-02-30".to_string();
        assert_eq!(service.create(card, "req-4").await.unwrap_err().status_code(), 400);
    }
}
