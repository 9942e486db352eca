//! Porter stemmer.
//!
//! Implements the classic five-step algorithm (with the widely used `bli -> ble`
//! and `logi -> log` step 2 variants). Only ASCII alphabetic tokens are
//! stemmed; they are lowercased first. Anything else passes through unchanged.

fn is_consonant(word: &[u8], i: usize) -> bool {
    match word[i] {
        b'a' | b'e' | b'i' | b'o' | b'u' => false,
        b'y' => i == 0 || !is_consonant(word, i - 1),
        _ => true,
    }
}

/// Number of vowel-consonant sequences in `stem`: `[C](VC){m}[V]`.
fn measure(stem: &[u8]) -> usize {
    let n = stem.len();
    let mut i = 0;
    while i < n && is_consonant(stem, i) {
        i += 1;
    }

    let mut m = 0;
    loop {
        while i < n && !is_consonant(stem, i) {
            i += 1;
        }
        if i >= n {
            return m;
        }
        while i < n && is_consonant(stem, i) {
            i += 1;
        }
        m += 1;
        if i >= n {
            return m;
        }
    }
}

fn has_vowel(stem: &[u8]) -> bool {
    (0..stem.len()).any(|i| !is_consonant(stem, i))
}

fn ends_double_consonant(word: &[u8]) -> bool {
    let n = word.len();
    n >= 2 && word[n - 1] == word[n - 2] && is_consonant(word, n - 1)
}

/// consonant-vowel-consonant ending where the last consonant is not w, x or y
fn ends_cvc(word: &[u8]) -> bool {
    let n = word.len();
    n >= 3
        && is_consonant(word, n - 3)
        && !is_consonant(word, n - 2)
        && is_consonant(word, n - 1)
        && !matches!(word[n - 1], b'w' | b'x' | b'y')
}

fn replace_suffix(word: &mut Vec<u8>, suffix_len: usize, replacement: &str) {
    word.truncate(word.len() - suffix_len);
    word.extend_from_slice(replacement.as_bytes());
}

/// Apply the first rule whose suffix matches, if its stem has `m > min_measure`.
fn apply_rules(word: &mut Vec<u8>, rules: &[(&str, &str)], min_measure: usize) {
    for (suffix, replacement) in rules {
        if word.ends_with(suffix.as_bytes()) {
            let stem_len = word.len() - suffix.len();
            if measure(&word[..stem_len]) > min_measure {
                replace_suffix(word, suffix.len(), replacement);
            }
            return;
        }
    }
}

fn step1a(word: &mut Vec<u8>) {
    if word.ends_with(b"sses") {
        replace_suffix(word, 4, "ss");
    } else if word.ends_with(b"ies") {
        replace_suffix(word, 3, "i");
    } else if word.ends_with(b"ss") {
        // unchanged
    } else if word.ends_with(b"s") {
        word.pop();
    }
}

fn step1b(word: &mut Vec<u8>) {
    if word.ends_with(b"eed") {
        if measure(&word[..word.len() - 3]) > 0 {
            word.pop();
        }
        return;
    }

    let suffix_len = if word.ends_with(b"ed") && has_vowel(&word[..word.len() - 2]) {
        2
    } else if word.ends_with(b"ing") && has_vowel(&word[..word.len() - 3]) {
        3
    } else {
        return;
    };
    word.truncate(word.len() - suffix_len);

    if word.ends_with(b"at") || word.ends_with(b"bl") || word.ends_with(b"iz") {
        word.push(b'e');
    } else if ends_double_consonant(word) && !matches!(word.last(), Some(b'l' | b's' | b'z')) {
        word.pop();
    } else if measure(word) == 1 && ends_cvc(word) {
        word.push(b'e');
    }
}

fn step1c(word: &mut Vec<u8>) {
    if word.ends_with(b"y") && has_vowel(&word[..word.len() - 1]) {
        let last = word.len() - 1;
        word[last] = b'i';
    }
}

const STEP2_RULES: &[(&str, &str)] = &[
    ("ational", "ate"),
    ("tional", "tion"),
    ("enci", "ence"),
    ("anci", "ance"),
    ("izer", "ize"),
    ("bli", "ble"),
    ("alli", "al"),
    ("entli", "ent"),
    ("eli", "e"),
    ("ousli", "ous"),
    ("ization", "ize"),
    ("ation", "ate"),
    ("ator", "ate"),
    ("alism", "al"),
    ("iveness", "ive"),
    ("fulness", "ful"),
    ("ousness", "ous"),
    ("aliti", "al"),
    ("iviti", "ive"),
    ("biliti", "ble"),
    ("logi", "log"),
];

const STEP3_RULES: &[(&str, &str)] = &[
    ("icate", "ic"),
    ("ative", ""),
    ("alize", "al"),
    ("iciti", "ic"),
    ("ical", "ic"),
    ("ful", ""),
    ("ness", ""),
];

const STEP4_SUFFIXES: &[&str] = &[
    "al", "ance", "ence", "er", "ic", "able", "ible", "ant", "ement", "ment", "ent", "ion", "ou",
    "ism", "ate", "iti", "ous", "ive", "ize",
];

fn step4(word: &mut Vec<u8>) {
    for suffix in STEP4_SUFFIXES {
        if !word.ends_with(suffix.as_bytes()) {
            continue;
        }
        let stem_len = word.len() - suffix.len();
        if *suffix == "ion" && !matches!(word[..stem_len].last(), Some(b's' | b't')) {
            continue;
        }
        if measure(&word[..stem_len]) > 1 {
            word.truncate(stem_len);
        }
        return;
    }
}

fn step5(word: &mut Vec<u8>) {
    if word.ends_with(b"e") {
        let stem = &word[..word.len() - 1];
        let m = measure(stem);
        if m > 1 || (m == 1 && !ends_cvc(stem)) {
            word.pop();
        }
    }

    if word.ends_with(b"l") && ends_double_consonant(word) && measure(word) > 1 {
        word.pop();
    }
}

/// Stem a single token.
pub fn stem(token: &str) -> String {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_alphabetic()) {
        return token.to_string();
    }

    let mut word = token.to_ascii_lowercase().into_bytes();
    if word.len() <= 2 {
        return token.to_ascii_lowercase();
    }

    step1a(&mut word);
    step1b(&mut word);
    step1c(&mut word);
    apply_rules(&mut word, STEP2_RULES, 0);
    apply_rules(&mut word, STEP3_RULES, 0);
    step4(&mut word);
    step5(&mut word);

    // Only ASCII bytes were pushed, so this never fails.
    String::from_utf8(word).unwrap_or_else(|_| token.to_string())
}

/// Stem a token sequence, preserving length and order.
pub fn stem_all(tokens: &[String]) -> Vec<String> {
    tokens.iter().map(|token| stem(token)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_examples() {
        let cases = [
            ("caresses", "caress"),
            ("ponies", "poni"),
            ("cats", "cat"),
            ("running", "run"),
            ("hopping", "hop"),
            ("happy", "happi"),
            ("relational", "relat"),
            ("connection", "connect"),
            ("agreed", "agre"),
            ("feed", "feed"),
            ("filing", "file"),
            ("sky", "sky"),
            ("generalizations", "gener"),
            ("controlling", "control"),
        ];
        for (input, expected) in cases {
            assert_eq!(stem(input), expected, "stem({input})");
        }
    }

    #[test]
    fn test_non_alphabetic_unchanged() {
        assert_eq!(stem("co-operate"), "co-operate");
        assert_eq!(stem("42"), "42");
        assert_eq!(stem("naïve"), "naïve");
        assert_eq!(stem("!"), "!");
    }

    #[test]
    fn test_lowercases_ascii_words() {
        assert_eq!(stem("Running"), "run");
        assert_eq!(stem("IS"), "is");
    }

    #[test]
    fn test_sequence_preserves_length() {
        let tokens: Vec<String> = ["dogs", ",", "running"].iter().map(|s| s.to_string()).collect();
        assert_eq!(stem_all(&tokens), vec!["dog", ",", "run"]);
    }
}
