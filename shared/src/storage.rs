//! Object storage for finished cards.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};

use crate::{Error, Result};

pub const CARD_CONTENT_TYPE: &str = "image/jpeg";
pub const CARD_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Write-only blob store keyed by object key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Direct URL of a stored object.
    fn object_url(&self, key: &str) -> String;
}

pub struct S3Store {
    client: S3Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .cache_control(CARD_CACHE_CONTROL)
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to put object {}: {}", key, e)))?;
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket, key)
    }
}

/// Lower-case ASCII slug of a location name; `location` when nothing survives.
pub fn slugify(location: &str) -> String {
    let mut slug = String::with_capacity(location.len());
    for ch in location.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "location".to_string()
    } else {
        slug.to_string()
    }
}

/// `generated/<date>/<slug>-<YYYYMMDDTHHMMSSZ>.jpg`
pub fn object_key(date: &str, location: &str, now: DateTime<Utc>) -> String {
    format!(
        "generated/{}/{}-{}.jpg",
        date,
        slugify(location),
        now.format("%Y%m%dT%H%M%SZ")
    )
}

/// Public URL for a stored card: CDN host, then CloudFront, then S3.
pub fn image_url(key: &str, s3_url: &str, cdn_host: Option<&str>, cloudfront_domain: Option<&str>) -> String {
    let key = key.trim_start_matches('/');
    if let Some(host) = cdn_host {
        return format!("{}/{}", host.trim_end_matches('/'), key);
    }
    if let Some(domain) = cloudfront_domain {
        return cloudfront_url(key, domain);
    }
    s3_url.to_string()
}

pub fn cloudfront_url(key: &str, domain: &str) -> String {
    format!("https://{}/{}", domain.trim_end_matches('/'), key.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Lake Shinji, Matsue"), "lake-shinji-matsue");
        assert_eq!(slugify("  --Matsue--  "), "matsue");
        assert_eq!(slugify("宍道湖"), "location");
        assert_eq!(slugify("松江 Matsue 2"), "matsue-2");
    }

    #[test]
    fn test_object_key_layout() {
        let now = Utc.with_ymd_and_hms(2025, 11, 7, 8, 5, 9).unwrap();
        assert_eq!(
            object_key("2025-11-07", "Matsue Castle", now),
            "generated/2025-11-07/matsue-castle-20251107T080509Z.jpg"
        );
    }

    #[test]
    fn test_image_url_precedence() {
        let key = "generated/2025-11-07/matsue-20251107T080509Z.jpg";
        let s3 = "https://cards.s3.amazonaws.com/generated/2025-11-07/matsue-20251107T080509Z.jpg";

        assert_eq!(
            image_url(key, s3, Some("https://cdn.example.com/"), Some("d111.cloudfront.net")),
            format!("https://cdn.example.com/{key}")
        );
        assert_eq!(
            image_url(key, s3, None, Some("d111.cloudfront.net/")),
            format!("https://d111.cloudfront.net/{key}")
        );
        assert_eq!(image_url(key, s3, None, None), s3);
    }
}
