//! Image prompt composition.

use crate::models::{CardRequest, PromptPair};
use crate::provider::ProviderId;

/// Upper bound on the UTF-8 length of a positive prompt.
pub const MAX_PROMPT_BYTES: usize = 460;

const ELLIPSIS: char = '…';
const EMPTY_PROMPT_FALLBACK: &str = "Lake Shinji sunset postcard…";

const STABILITY_NEGATIVE: &str = "people, tourists, boats, birds, cars, anime, cartoon, cgi render, watercolor, \
heavy bloom, extreme fog, floating torii, floating island, multiple torii, exaggerated mountains, text, \
watermark, warped reflections, fantasy lighting";

// No shrine vocabulary: Titan's content filter matches on negative text too.
const TITAN_NEGATIVE: &str = "people, tourists, boats, birds, cars, anime, cartoon, cgi render, watercolor, \
heavy bloom, extreme fog, floating island, exaggerated mountains, text, watermark, warped reflections, \
fantasy lighting";

/// Negative prompt tuned for a given generator.
pub fn negative_prompt(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::Stability => STABILITY_NEGATIVE,
        ProviderId::Titan => TITAN_NEGATIVE,
    }
}

/// Build the prompt pair for a card.
pub fn compose(card: &CardRequest, provider: ProviderId) -> PromptPair {
    // Treatment first: clamping cuts from the tail.
    let mut positive = format!(
        "{}, photograph of Lake Shinji in Matsue, Japan, toward the small Yomegashima sandbar: stone \
shoreline, one windswept pine, a modest gray shrine gateway on dry rocks, calm mirror water reflecting the warm \
dusk sky, the city soft and low on the horizon. Atmosphere: {}. Location: {}. Date: {} around {} JST.",
        card.style.phrase(),
        card.conditions,
        card.location,
        card.date,
        card.sunset_time,
    );

    if let Some(addendum) = &card.prompt {
        positive.push(' ');
        positive.push_str(addendum);
    }

    PromptPair {
        positive: clamp_prompt(&positive),
        negative: negative_prompt(provider).to_string(),
    }
}

/// Generic last-resort prompt free of the terms the sanitizer rewrites.
pub fn fallback_prompt(card: &CardRequest) -> String {
    let prompt = format!(
        "peaceful golden-hour photograph of a tiny lakeside island with a subtle stone shoreline, a minimalist \
shrine gateway, a lone pine tree, warm reflections on calm water, and the city of Matsue softly blurred in the \
distance. Weather impression: {}. Shot inspired by Lake Shinji around {} JST on {}.",
        card.conditions, card.sunset_time, card.date,
    );
    clamp_prompt(&prompt)
}

/// Trim and bound `text` to [`MAX_PROMPT_BYTES`].
///
/// Oversized text is cut on a character boundary, stripped of trailing
/// whitespace and terminated with an ellipsis. Clamping a clamped prompt
/// returns it unchanged.
pub fn clamp_prompt(text: &str) -> String {
    clamp_to(text, MAX_PROMPT_BYTES)
}

fn clamp_to(text: &str, limit: usize) -> String {
    let text = text.trim();
    if text.len() <= limit {
        return text.to_string();
    }

    let budget = limit.saturating_sub(ELLIPSIS.len_utf8());
    let mut cut = budget.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }

    let truncated = text[..cut].trim_end();
    if truncated.is_empty() {
        return EMPTY_PROMPT_FALLBACK.to_string();
    }
    format!("{}{}", truncated, ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CardStyle;
    use crate::testing::sample_card;

    fn card() -> CardRequest {
        sample_card()
    }

    #[test]
    fn test_short_text_is_only_trimmed() {
        assert_eq!(clamp_prompt("  sunset over the lake \n"), "sunset over the lake");
    }

    #[test]
    fn test_clamp_bounds_bytes_and_marks_truncation() {
        let long = "夕日が宍道湖に沈む ".repeat(100);
        let clamped = clamp_prompt(&long);
        assert!(clamped.len() <= MAX_PROMPT_BYTES);
        assert!(clamped.ends_with(ELLIPSIS));
        assert!(long.starts_with(clamped.trim_end_matches(ELLIPSIS)));
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let inputs = [
            "a".repeat(1000),
            "é".repeat(400),
            format!("{}   {}", "x".repeat(455), "tail words here"),
            "🌅".repeat(200),
            "short".to_string(),
        ];
        for input in inputs {
            let once = clamp_prompt(&input);
            assert!(once.len() <= MAX_PROMPT_BYTES);
            assert_eq!(clamp_prompt(&once), once);
        }
    }

    #[test]
    fn test_clamp_strips_whitespace_before_ellipsis() {
        let text = format!("{}{}", "x".repeat(455), " ".repeat(20));
        let text = format!("{}yz", text);
        let clamped = clamp_prompt(&text);
        assert_eq!(clamped, format!("{}…", "x".repeat(455)));
    }

    #[test]
    fn test_clamp_falls_back_when_nothing_survives() {
        assert_eq!(clamp_to("🌅🌅", 5), EMPTY_PROMPT_FALLBACK);
    }

    #[test]
    fn test_compose_interpolates_card_fields() {
        let pair = compose(&card(), ProviderId::Stability);
        assert!(pair.positive.contains("Atmosphere: clear sky."));
        assert!(pair.positive.contains("Date: 2025-11-07 around 17:05 JST."));
        assert!(pair.positive.contains(CardStyle::Gradient.phrase()));
        assert!(pair.positive.len() <= MAX_PROMPT_BYTES);
        assert_eq!(pair.negative, STABILITY_NEGATIVE);
    }

    #[test]
    fn test_compose_appends_short_addendum() {
        let mut request = card();
        request.prompt = Some("with a heron".to_string());
        let pair = compose(&request, ProviderId::Stability);
        assert!(pair.positive.ends_with("17:05 JST. with a heron"));
    }

    #[test]
    fn test_compose_appends_addendum_then_clamps() {
        let mut request = card();
        request.prompt = Some("a heron standing in the shallows ".repeat(30));
        let pair = compose(&request, ProviderId::Titan);
        assert!(pair.positive.len() <= MAX_PROMPT_BYTES);
        assert!(pair.positive.ends_with(ELLIPSIS));
        assert_eq!(pair.negative, TITAN_NEGATIVE);
    }

    #[test]
    fn test_negative_prompts_differ_per_provider() {
        assert_ne!(negative_prompt(ProviderId::Stability), negative_prompt(ProviderId::Titan));
        assert!(!negative_prompt(ProviderId::Titan).contains("torii"));
    }

    #[test]
    fn test_fallback_prompt_mentions_card() {
        let prompt = fallback_prompt(&card());
        assert!(prompt.contains("around 17:05 JST on 2025-11-07"));
        assert!(prompt.len() <= MAX_PROMPT_BYTES);
    }
}
