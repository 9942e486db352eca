//! Word tokenization.

use once_cell::sync::Lazy;
use regex::Regex;

/// Words (keeping inner apostrophes and hyphens) or single punctuation marks.
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\w+(?:['’\-]\w+)*|[^\w\s]").expect("Invalid regex: token pattern")
});

/// Split `text` into tokens. Whitespace-only text yields no tokens.
pub fn tokenize(text: &str, lowercase: bool) -> Vec<String> {
    TOKEN_PATTERN
        .find_iter(text)
        .map(|m| {
            if lowercase {
                m.as_str().to_lowercase()
            } else {
                m.as_str().to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_and_punctuation() {
        assert_eq!(
            tokenize("Hello, world!", false),
            vec!["Hello", ",", "world", "!"]
        );
    }

    #[test]
    fn test_inner_apostrophes_and_hyphens() {
        assert_eq!(
            tokenize("I don't like state-of-the-art UIs", false),
            vec!["I", "don't", "like", "state-of-the-art", "UIs"]
        );
        assert_eq!(tokenize("it’s", false), vec!["it’s"]);
        assert_eq!(tokenize("'quoted'", false), vec!["'", "quoted", "'"]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(tokenize("", false).is_empty());
        assert!(tokenize("   \t\n", false).is_empty());
    }

    #[test]
    fn test_lowercase_option() {
        assert_eq!(tokenize("The Café", true), vec!["the", "café"]);
        assert_eq!(tokenize("The Café", false), vec!["The", "Café"]);
    }

    #[test]
    fn test_unicode_words() {
        assert_eq!(tokenize("naïve résumé 42", false), vec!["naïve", "résumé", "42"]);
    }
}
