//! Shared library for the Matsue sunset card Lambda functions.
//!
//! Card pipeline components (validation, sunset time, prompts, image
//! providers, rendering, storage) plus the weather facades and the HTTP,
//! config, error and secret plumbing used by every function.

pub mod card;
pub mod config;
pub mod error;
pub mod forecast;
pub mod http;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod render;
pub mod sanitizer;
pub mod scoring;
pub mod secrets;
pub mod storage;
pub mod sunset;
pub mod validation;
pub mod weather;

#[cfg(test)]
pub(crate) mod testing;

pub use card::{CardService, Publishing};
pub use config::{Config, ScoreConfig};
pub use error::{Error, Result};
pub use models::{CardRequest, CardResponse, CardStyle, ErrorBody, PromptPair, TextSize};
pub use provider::{ImageGenerator, ImagePipeline, ProviderId};
pub use secrets::{CachedSecret, SecretStore};
pub use sunset::SunsetCalculator;
