//! Shared data models.

use serde::{Deserialize, Serialize};

/// Visual treatment requested for the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardStyle {
    Simple,
    Gradient,
    /// Any style name the service does not know.
    Default,
}

impl CardStyle {
    /// Map a normalized (trimmed, lower-case) style name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "simple" => CardStyle::Simple,
            "gradient" => CardStyle::Gradient,
            _ => CardStyle::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardStyle::Simple => "simple",
            CardStyle::Gradient => "gradient",
            CardStyle::Default => "default",
        }
    }

    /// Photographic treatment phrase used in the image prompt.
    pub fn phrase(&self) -> &'static str {
        match self {
            CardStyle::Simple => {
                "documentary realism, sony alpha color science, gentle contrast, natural dynamic range"
            }
            CardStyle::Gradient => {
                "long exposure travel photography, magenta-to-amber gradient sky, subtle haze, editorial color grading"
            }
            CardStyle::Default => "cinematic sunset postcard with warm tones",
        }
    }
}

/// Overlay text size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextSize {
    #[default]
    Md,
    Lg,
}

impl TextSize {
    /// Anything other than `lg` renders at the medium size.
    pub fn from_name(name: &str) -> Self {
        match name {
            "lg" => TextSize::Lg,
            _ => TextSize::Md,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextSize::Md => "md",
            TextSize::Lg => "lg",
        }
    }

    pub fn multiplier(&self) -> f32 {
        match self {
            TextSize::Md => 1.0,
            TextSize::Lg => 1.2,
        }
    }
}

/// A validated card request.
#[derive(Debug, Clone, PartialEq)]
pub struct CardRequest {
    pub location: String,
    /// ISO calendar date (`YYYY-MM-DD`)
    pub date: String,
    pub style: CardStyle,
    pub text_size: TextSize,
    /// Opaque display text for the headline
    pub score: String,
    /// Local sunset time as `HH:MM`
    pub sunset_time: String,
    pub conditions: String,
    /// Free-text addendum appended to the image prompt
    pub prompt: Option<String>,
}

impl CardRequest {
    /// Fields worth logging for a request.
    pub fn summary(&self) -> CardSummary<'_> {
        CardSummary {
            location: &self.location,
            date: &self.date,
            style: self.style.as_str(),
            text_size: self.text_size.as_str(),
            score: &self.score,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary<'a> {
    pub location: &'a str,
    pub date: &'a str,
    pub style: &'a str,
    pub text_size: &'a str,
    pub score: &'a str,
}

/// Positive and negative prompt sent to an image generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub positive: String,
    pub negative: String,
}

/// Successful card generation response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    pub image_url: String,
    pub request_id: String,
    pub s3_url: String,
    pub object_key: String,
    pub code_version: String,
    pub sunset_jst: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_front_url: Option<String>,
}

/// Error body returned by the card endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_type: String,
    pub message: String,
    pub request_id: String,
}
