//! Language negotiation.

use std::sync::Arc;

/// Picks a language out of `available`, given the accepted languages (most
/// preferred first) and the inherited language.
pub type LanguageResolver =
    Arc<dyn Fn(&[String], Option<&str>, &[String]) -> Option<String> + Send + Sync>;

/// Default resolver.
///
/// Each accepted tag is tried in order (`*` is skipped). A tag that is not
/// available is truncated one subtag at a time (`de-ch-1901` → `de-ch` →
/// `de`), also dropping a dangling single-character subtag. Matching is
/// case-insensitive and the available spelling is returned. Without a
/// match the inherited language wins, then the first available language.
///
/// # Examples
/// ```
/// use jxt::language::basic_language_resolver;
///
/// let available = vec!["en".to_string(), "de".to_string()];
/// let accept = vec!["de-AT".to_string()];
///
/// assert_eq!(basic_language_resolver(&accept, None, &available), Some("de".to_string()));
/// assert_eq!(basic_language_resolver(&[], Some("en"), &available), Some("en".to_string()));
/// assert_eq!(basic_language_resolver(&[], None, &[]), None);
/// ```
pub fn basic_language_resolver(
    accept_languages: &[String],
    lang: Option<&str>,
    available: &[String],
) -> Option<String> {
    let find = |candidate: &str| {
        available
            .iter()
            .find(|language| language.eq_ignore_ascii_case(candidate))
            .cloned()
    };

    for accepted in accept_languages {
        let mut candidate = accepted.to_lowercase();
        if candidate == "*" {
            continue;
        }
        while !candidate.is_empty() {
            if let Some(found) = find(&candidate) {
                return Some(found);
            }
            match candidate.rfind('-') {
                Some(index) => candidate.truncate(index),
                None => candidate.clear(),
            }
            if let Some(index) = candidate.rfind('-') {
                if candidate.len() - index == 2 {
                    candidate.truncate(index);
                }
            }
        }
    }

    lang.map(String::from).or_else(|| available.first().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_exact_match_keeps_available_spelling() {
        let available = strings(&["en-US", "fr"]);
        assert_eq!(
            basic_language_resolver(&strings(&["EN-us"]), None, &available),
            Some("en-US".to_string())
        );
    }

    #[test]
    fn test_truncates_subtags() {
        let available = strings(&["de"]);
        assert_eq!(
            basic_language_resolver(&strings(&["de-ch-1901"]), None, &available),
            Some("de".to_string())
        );
    }

    #[test]
    fn test_drops_single_character_subtag() {
        let available = strings(&["zh-hant"]);
        assert_eq!(
            basic_language_resolver(&strings(&["zh-hant-x-private"]), None, &available),
            Some("zh-hant".to_string())
        );
    }

    #[test]
    fn test_preference_order_and_wildcard() {
        let available = strings(&["fr", "en"]);
        assert_eq!(
            basic_language_resolver(&strings(&["*", "it", "en", "fr"]), None, &available),
            Some("en".to_string())
        );
    }

    #[test]
    fn test_falls_back_to_inherited_then_first() {
        let available = strings(&["fr", "en"]);
        assert_eq!(
            basic_language_resolver(&strings(&["it"]), Some("de"), &available),
            Some("de".to_string())
        );
        assert_eq!(
            basic_language_resolver(&strings(&["it"]), None, &available),
            Some("fr".to_string())
        );
    }

    #[test]
    fn test_empty_candidates_do_not_panic() {
        assert_eq!(basic_language_resolver(&strings(&["en"]), None, &[]), None);
        assert_eq!(
            basic_language_resolver(&[], Some("en"), &[]),
            Some("en".to_string())
        );
    }
}
