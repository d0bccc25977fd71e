//! Rewrites prompt phrases that tend to trip image content filters.

use std::sync::OnceLock;

use regex::Regex;

use crate::prompt::clamp_prompt;

/// Ordered (pattern, replacement) rules. Longer phrases come first so
/// `torii gate` is not half-rewritten by the `torii` rule.
const REPLACEMENTS: &[(&str, &str)] = &[
    (r"(?i)\btorii gate\b", "minimalist shrine gateway"),
    (r"(?i)\btorii\b", "shrine gateway"),
    (r"(?i)\bvermilion\b", "sunlit red"),
    (r"(?i)\bsacred\b", "historic"),
];

fn rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        REPLACEMENTS
            .iter()
            .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, *replacement)))
            .collect()
    })
}

/// Return a rewritten prompt, or `None` when no rule applies.
///
/// A returned prompt always differs from the input and respects the prompt
/// length bound.
pub fn sanitize(prompt: &str) -> Option<String> {
    let mut matched = false;
    let mut sanitized = prompt.to_string();

    for (pattern, replacement) in rules() {
        if pattern.is_match(&sanitized) {
            matched = true;
            sanitized = pattern.replace_all(&sanitized, *replacement).into_owned();
        }
    }

    if !matched {
        return None;
    }

    let sanitized = clamp_prompt(&sanitized);
    (sanitized != prompt).then_some(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::MAX_PROMPT_BYTES;

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(rules().len(), REPLACEMENTS.len());
    }

    #[test]
    fn test_no_match_means_no_alternative() {
        assert_eq!(sanitize("calm lake at dusk with a lone pine"), None);
        assert_eq!(sanitize(""), None);
    }

    #[test]
    fn test_whitespace_alone_is_not_a_match() {
        assert_eq!(sanitize("  calm lake at dusk  "), None);
    }

    #[test]
    fn test_rules_apply_in_order_case_insensitively() {
        let sanitized = sanitize("A Vermilion TORII GATE beside a torii and a Sacred pine").unwrap();
        assert_eq!(
            sanitized,
            "A sunlit red minimalist shrine gateway beside a shrine gateway and a historic pine"
        );
    }

    #[test]
    fn test_word_boundaries_respected() {
        assert_eq!(sanitize("sacredness of the toriiyama ridge"), None);
    }

    #[test]
    fn test_sanitized_prompt_is_clamped() {
        let prompt = format!("{} torii", "calm lake ".repeat(45));
        let sanitized = sanitize(&prompt).unwrap();
        assert_ne!(sanitized, prompt);
        assert!(sanitized.len() <= MAX_PROMPT_BYTES);
    }
}
