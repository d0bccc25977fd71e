//! Card request parsing and normalization.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::models::{CardRequest, CardStyle, TextSize};
use crate::{Error, Result};

const DEFAULT_STYLE: &str = "gradient";
const DEFAULT_SCORE: &str = "80";
const DEFAULT_SUNSET_TIME: &str = "18:45";
const DEFAULT_CONDITIONS: &str = "clear sky";

/// Decode a request body into a JSON object.
///
/// An empty body is an empty object, and a JSON value that is not an object
/// carries no fields.
pub fn decode_body(body: &[u8]) -> Result<Map<String, Value>> {
    let text = std::str::from_utf8(body)
        .map_err(|e| Error::Validation(format!("Invalid JSON payload: {}", e)))?
        .trim();
    if text.is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(e) => Err(Error::Validation(format!("Invalid JSON payload: {}", e))),
    }
}

/// Parse and validate a raw request body.
///
/// `today` is the date used when the caller omits one.
pub fn parse_card_request(body: &[u8], today: NaiveDate) -> Result<CardRequest> {
    let payload = decode_body(body)?;
    card_request_from_payload(&payload, today)
}

/// Build a [`CardRequest`] from an already decoded JSON object.
pub fn card_request_from_payload(payload: &Map<String, Value>, today: NaiveDate) -> Result<CardRequest> {
    let location = payload
        .get("location")
        .map(stringify)
        .unwrap_or_default()
        .trim()
        .to_string();
    if location.is_empty() {
        return Err(Error::Validation("location is required".to_string()));
    }

    let date = match first_present(payload, &["date"]) {
        Some(raw) => {
            let raw = raw.trim().to_string();
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                Error::Validation("date must be an ISO calendar date (YYYY-MM-DD)".to_string())
            })?;
            raw
        }
        None => today.format("%Y-%m-%d").to_string(),
    };

    let style = first_present(payload, &["style"])
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_STYLE.to_string());

    let text_size = first_present(payload, &["textSize", "text_size"])
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default();

    let conditions = first_present(payload, &["conditions", "weather"])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_CONDITIONS.to_string());

    let score = first_present(payload, &["score"])
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| DEFAULT_SCORE.to_string());

    let sunset_time = first_present(payload, &["sunsetTime", "sunset_time", "time"])
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| DEFAULT_SUNSET_TIME.to_string());

    let prompt = payload
        .get("prompt")
        .filter(|v| !v.is_null())
        .map(stringify)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(CardRequest {
        location,
        date,
        style: CardStyle::from_name(&style),
        text_size: TextSize::from_name(&text_size),
        score,
        sunset_time,
        conditions,
        prompt,
    })
}

/// First alias whose value is set and not blank-ish, stringified.
fn first_present(payload: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .find(|value| is_truthy(value))
        .map(stringify)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
