//! Locating and decoding base64 image data in generator responses.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;

/// Standard alphabet, tolerant of missing padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Find the base64 image string in a generator response.
///
/// Probes `images[0]` (a string, or an object with `b64` or `image`), then
/// `output.images[0]`, then a top-level `image`.
pub fn extract_image_base64(payload: &Value) -> Option<&str> {
    let first = payload.get("images").and_then(|images| images.get(0));
    if let Some(found) = first.and_then(|first| {
        first
            .as_str()
            .or_else(|| first.get("b64").and_then(Value::as_str))
            .or_else(|| first.get("image").and_then(Value::as_str))
    }) {
        return Some(found);
    }

    if let Some(found) = payload
        .get("output")
        .and_then(|output| output.get("images"))
        .and_then(|images| images.get(0))
        .and_then(Value::as_str)
    {
        return Some(found);
    }

    payload.get("image").and_then(Value::as_str)
}

/// Decode a raw base64 string or a `data:image/...;base64,` URI.
pub fn decode_image_payload(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let data = if encoded.starts_with("data:image") {
        encoded.split_once(',').map(|(_, data)| data).unwrap_or_default()
    } else {
        encoded
    };
    decode_base64(data.as_bytes())
}

/// Decode base64, ignoring embedded line breaks and spaces.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: Vec<u8> = data.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    LENIENT.decode(compact)
}
