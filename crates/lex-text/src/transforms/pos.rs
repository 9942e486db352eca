//! Rule-based Universal POS tagging.
//!
//! Each token gets exactly one tag. Closed word classes come from lexicons,
//! open classes from irregular-verb tables, suffix shape and a small amount
//! of left context.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::lemmatize;

/// Universal Dependencies part-of-speech tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PosTag {
    Adj,
    Adp,
    Adv,
    Aux,
    Cconj,
    Det,
    Intj,
    Noun,
    Num,
    Part,
    Pron,
    Propn,
    Punct,
    Sconj,
    Sym,
    Verb,
    X,
}

impl PosTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adj => "ADJ",
            Self::Adp => "ADP",
            Self::Adv => "ADV",
            Self::Aux => "AUX",
            Self::Cconj => "CCONJ",
            Self::Det => "DET",
            Self::Intj => "INTJ",
            Self::Noun => "NOUN",
            Self::Num => "NUM",
            Self::Part => "PART",
            Self::Pron => "PRON",
            Self::Propn => "PROPN",
            Self::Punct => "PUNCT",
            Self::Sconj => "SCONJ",
            Self::Sym => "SYM",
            Self::Verb => "VERB",
            Self::X => "X",
        }
    }
}

impl std::fmt::Display for PosTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const DETERMINERS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "each", "every", "some", "any", "no",
    "another", "either", "neither", "all", "both", "such",
];

const PRONOUNS: &[&str] = &[
    "i", "me", "you", "he", "him", "she", "her", "it", "we", "us", "they", "them", "my", "your",
    "his", "its", "our", "their", "mine", "yours", "hers", "ours", "theirs", "myself",
    "yourself", "himself", "herself", "itself", "ourselves", "yourselves", "themselves", "who",
    "whom", "whose", "what", "which", "someone", "anyone", "everyone", "nobody", "somebody",
    "anybody", "everybody", "something", "anything", "everything", "nothing", "one",
];

const SUBJECT_PRONOUNS: &[&str] = &["i", "you", "he", "she", "it", "we", "they"];

const ADPOSITIONS: &[&str] = &[
    "of", "in", "on", "at", "by", "for", "with", "about", "against", "between", "into",
    "through", "during", "before", "after", "above", "below", "to", "from", "up", "down",
    "over", "under", "around", "among", "without", "within", "across", "behind", "beyond",
    "near", "since", "until", "upon", "toward", "towards", "via", "per", "despite", "off",
    "onto", "throughout", "except", "inside", "outside",
];

const COORDINATORS: &[&str] = &["and", "or", "but", "nor", "yet", "&"];

const SUBORDINATORS: &[&str] = &[
    "if", "because", "although", "though", "while", "whereas", "unless", "whether", "than",
    "whenever", "wherever",
];

const AUXILIARIES: &[&str] = &[
    "be", "am", "is", "are", "was", "were", "been", "being", "have", "has", "had", "having",
    "do", "does", "did", "will", "would", "shall", "should", "can", "could", "may", "might",
    "must", "'s", "'re", "'ve", "'ll", "'d", "'m",
];

const MODALS: &[&str] = &[
    "will", "would", "shall", "should", "can", "could", "may", "might", "must", "do", "does",
    "did",
];

const PARTICLES: &[&str] = &["not", "n't", "'s"];

const INTERJECTIONS: &[&str] = &[
    "oh", "wow", "hello", "hi", "hey", "yes", "ouch", "oops", "alas", "ok", "okay", "thanks",
    "please", "yeah", "yay", "ugh", "hmm", "bye",
];

const ADVERBS: &[&str] = &[
    "very", "really", "too", "also", "just", "only", "quite", "rather", "almost", "always",
    "never", "often", "sometimes", "usually", "here", "there", "now", "then", "soon",
    "already", "still", "again", "ever", "so", "well", "however", "perhaps", "maybe",
    "indeed", "even", "much", "more", "most", "less", "least", "how", "when", "where", "why",
    "away", "back", "once", "twice", "together", "instead", "anyway", "yesterday", "tomorrow",
];

const ADJECTIVES: &[&str] = &[
    "good", "bad", "new", "old", "great", "big", "small", "large", "little", "long", "short",
    "high", "low", "young", "important", "different", "same", "other", "best", "better",
    "worst", "worse", "happy", "sad", "nice", "easy", "hard", "early", "late", "real", "full",
    "free", "sure", "clear", "true", "whole", "amazing", "terrible", "awful", "excellent",
    "poor", "rich", "strong", "weak", "fast", "slow", "hot", "cold", "first", "last", "next",
    "few", "many", "fine", "cheap", "expensive", "open", "ready", "fresh", "dark", "bright",
];

const NUMBER_WORDS: &[&str] = &[
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "twenty", "thirty", "forty", "fifty", "hundred", "thousand", "million",
    "billion",
];

/// Base forms of frequent regular verbs; irregular forms come from the lemmatizer tables.
const VERBS: &[&str] = &[
    "say", "make", "go", "take", "come", "see", "know", "get", "give", "find", "think", "tell",
    "become", "show", "leave", "feel", "put", "bring", "begin", "keep", "hold", "write",
    "stand", "hear", "let", "mean", "set", "meet", "run", "pay", "sit", "speak", "lead",
    "read", "grow", "lose", "fall", "send", "build", "understand", "draw", "break", "spend",
    "cut", "rise", "drive", "buy", "wear", "choose", "love", "like", "want", "need", "use",
    "work", "play", "help", "try", "ask", "call", "seem", "turn", "start", "move", "live",
    "believe", "happen", "include", "continue", "learn", "change", "watch", "follow", "stop",
    "create", "walk", "win", "offer", "remember", "consider", "appear", "wait", "serve",
    "expect", "stay", "reach", "remain", "suggest", "raise", "pass", "sell", "require",
    "report", "decide", "pull", "recommend", "hate", "enjoy", "arrive", "order", "return",
];

const SYMBOLS: &[char] = &[
    '$', '%', '&', '+', '=', '<', '>', '#', '@', '©', '®', '€', '£', '¥', '^', '|', '~', '°',
];

static LEXICON: Lazy<HashMap<&'static str, PosTag>> = Lazy::new(|| {
    let mut lexicon = HashMap::new();
    // Later insertions win, so the most specific classes come last.
    let classes: [(&[&str], PosTag); 11] = [
        (ADJECTIVES, PosTag::Adj),
        (ADVERBS, PosTag::Adv),
        (INTERJECTIONS, PosTag::Intj),
        (NUMBER_WORDS, PosTag::Num),
        (ADPOSITIONS, PosTag::Adp),
        (SUBORDINATORS, PosTag::Sconj),
        (COORDINATORS, PosTag::Cconj),
        (PRONOUNS, PosTag::Pron),
        (DETERMINERS, PosTag::Det),
        (AUXILIARIES, PosTag::Aux),
        (PARTICLES, PosTag::Part),
    ];
    for (words, tag) in classes {
        for word in words {
            lexicon.insert(*word, tag);
        }
    }
    lexicon
});

const NOUN_SUFFIXES: &[&str] = &[
    "tion", "sion", "ment", "ness", "ity", "ship", "ism", "ist", "ance", "ence", "hood", "dom",
];
const ADJ_SUFFIXES: &[&str] = &[
    "ous", "ful", "ive", "able", "ible", "less", "ish", "ical", "ary", "ic", "est",
];
const VERB_SUFFIXES: &[&str] = &["ize", "ise", "ify"];

fn is_sentence_boundary(token: &str) -> bool {
    matches!(token, "." | "!" | "?" | "…")
}

fn is_verb_form(lower: &str) -> bool {
    if VERBS.contains(&lower) || lemmatize::irregular_verb_base(lower).is_some() {
        return true;
    }
    let stripped = lower
        .strip_suffix("es")
        .filter(|stem| VERBS.contains(stem))
        .or_else(|| lower.strip_suffix('s').filter(|stem| VERBS.contains(stem)));
    stripped.is_some()
}

/// Tag a token using only the token itself.
fn tag_in_isolation(token: &str, sentence_initial: bool) -> PosTag {
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return PosTag::X;
    };

    if token.chars().all(|c| SYMBOLS.contains(&c)) {
        return PosTag::Sym;
    }
    if token.chars().all(|c| !c.is_alphanumeric()) {
        return PosTag::Punct;
    }
    if token
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
        && first.is_ascii_digit()
    {
        return PosTag::Num;
    }

    let lower = token.to_lowercase();
    if let Some(tag) = LEXICON.get(lower.as_str()) {
        return *tag;
    }
    if lower.ends_with("n't") {
        return PosTag::Aux;
    }

    let has_alpha = token.chars().any(char::is_alphabetic);
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    if has_alpha && has_digit {
        return PosTag::X;
    }

    if first.is_uppercase() && !sentence_initial {
        return PosTag::Propn;
    }
    if is_verb_form(&lower) {
        return PosTag::Verb;
    }

    let len = lower.chars().count();
    if len > 4 && lower.ends_with("ing") {
        return PosTag::Verb;
    }
    if len > 3 && lower.ends_with("ed") {
        return PosTag::Verb;
    }
    if len > 3 && lower.ends_with("ly") {
        return PosTag::Adv;
    }
    if len > 4 {
        if NOUN_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            return PosTag::Noun;
        }
        if ADJ_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            return PosTag::Adj;
        }
        if VERB_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            return PosTag::Verb;
        }
    }
    // all-caps acronym opening a sentence
    if len > 1 && token.chars().all(char::is_uppercase) {
        return PosTag::Propn;
    }

    PosTag::Noun
}

/// Tag a token sequence. The output has the same length as the input.
pub fn tag(tokens: &[String]) -> Vec<PosTag> {
    let mut tags = Vec::with_capacity(tokens.len());
    let mut sentence_initial = true;

    for token in tokens {
        tags.push(tag_in_isolation(token, sentence_initial));
        sentence_initial = is_sentence_boundary(token);
    }

    // Left-context corrections.
    for i in 1..tokens.len() {
        let prev_lower = tokens[i - 1].to_lowercase();
        let prev = tags[i - 1];
        let lower = tokens[i].to_lowercase();

        match tags[i] {
            PosTag::Verb if matches!(prev, PosTag::Det | PosTag::Adj) => {
                // "the play", "a good read"; keep gerunds as nouns too
                tags[i] = PosTag::Noun;
            }
            PosTag::Noun
                if SUBJECT_PRONOUNS.contains(&prev_lower.as_str())
                    || MODALS.contains(&prev_lower.as_str()) =>
            {
                if lower.chars().all(char::is_alphabetic) {
                    tags[i] = PosTag::Verb;
                }
            }
            PosTag::Verb | PosTag::Aux if prev_lower == "to" => {
                tags[i - 1] = PosTag::Part;
            }
            _ => {}
        }
    }

    tags
}
