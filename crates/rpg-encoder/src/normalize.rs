//! Feature normalization: re-applies the naming rules to every description,
//! whatever its source.
//!
//! A normalized description is lowercase, 3-8 words, verb+object, free of
//! punctuation, and single-responsibility. A phrase of the form "X and Y"
//! is split: X becomes the description, the remaining responsibilities move
//! into sub-features.

use rpg_core::model::SemanticFeature;

/// Words dropped from descriptions: articles and connective filler.
const FILLER: &[&str] = &["the", "a", "an", "of", "to", "that", "which", "using", "via"];

const MAX_WORDS: usize = 8;

/// Normalize one phrase: lowercase, strip punctuation, drop filler, clamp
/// word count.
pub fn normalize_phrase(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| !FILLER.contains(w))
        .take(MAX_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a multi-responsibility phrase on " and " into its parts.
pub fn split_responsibilities(raw: &str) -> Vec<String> {
    raw.split(" and ")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Apply the naming rules to a whole feature.
pub fn normalize_feature(feature: SemanticFeature) -> SemanticFeature {
    let parts = split_responsibilities(&feature.description);
    let (description, extra_subs) = match parts.split_first() {
        Some((first, rest)) => (
            normalize_phrase(first),
            rest.iter().map(|p| normalize_phrase(p)).collect::<Vec<_>>(),
        ),
        None => (String::new(), Vec::new()),
    };

    let mut keywords: Vec<String> = feature
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    keywords.dedup();

    let mut sub_features: Vec<String> = feature
        .sub_features
        .unwrap_or_default()
        .iter()
        .map(|s| normalize_phrase(s))
        .filter(|s| !s.is_empty())
        .collect();
    for sub in extra_subs {
        if !sub.is_empty() && !sub_features.contains(&sub) {
            sub_features.push(sub);
        }
    }

    SemanticFeature {
        description,
        keywords,
        sub_features: if sub_features.is_empty() {
            None
        } else {
            Some(sub_features)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(normalize_phrase("Parse the JSON config!"), "parse json config");
    }

    #[test]
    fn clamps_to_eight_words() {
        let long = "one two three four five six seven eight nine ten";
        assert_eq!(normalize_phrase(long).split_whitespace().count(), 8);
    }

    #[test]
    fn splits_multi_responsibility_phrases() {
        let feature = SemanticFeature::new(
            "parse config files and validate schema rules",
            vec!["Config".to_string()],
        );
        let normalized = normalize_feature(feature);
        assert_eq!(normalized.description, "parse config files");
        assert_eq!(
            normalized.sub_features,
            Some(vec!["validate schema rules".to_string()])
        );
        assert_eq!(normalized.keywords, vec!["config"]);
    }

    #[test]
    fn single_responsibility_has_no_sub_features() {
        let normalized = normalize_feature(SemanticFeature::new("render template output", vec![]));
        assert_eq!(normalized.description, "render template output");
        assert!(normalized.sub_features.is_none());
    }
}
