//! Dictionary lemmatizer.
//!
//! Lookups are case-insensitive and return the lowercase base form. Tokens the
//! dictionary does not know are returned unchanged, so the unit never guesses.

use once_cell::sync::Lazy;
use std::collections::HashMap;

const IRREGULAR_VERBS: &[(&str, &str)] = &[
    ("am", "be"), ("is", "be"), ("are", "be"), ("was", "be"), ("were", "be"), ("been", "be"),
    ("being", "be"), ("has", "have"), ("had", "have"), ("having", "have"), ("does", "do"),
    ("did", "do"), ("done", "do"), ("doing", "do"), ("goes", "go"), ("went", "go"),
    ("gone", "go"), ("saw", "see"), ("seen", "see"), ("took", "take"), ("taken", "take"),
    ("made", "make"), ("came", "come"), ("knew", "know"), ("known", "know"), ("got", "get"),
    ("gotten", "get"), ("gave", "give"), ("given", "give"), ("found", "find"),
    ("thought", "think"), ("told", "tell"), ("became", "become"), ("left", "leave"),
    ("felt", "feel"), ("brought", "bring"), ("began", "begin"), ("begun", "begin"),
    ("kept", "keep"), ("held", "hold"), ("wrote", "write"), ("written", "write"),
    ("stood", "stand"), ("heard", "hear"), ("meant", "mean"), ("met", "meet"), ("ran", "run"),
    ("paid", "pay"), ("said", "say"), ("says", "say"), ("sat", "sit"), ("spoke", "speak"),
    ("spoken", "speak"), ("led", "lead"), ("grew", "grow"), ("grown", "grow"), ("lost", "lose"),
    ("fell", "fall"), ("fallen", "fall"), ("sent", "send"), ("built", "build"),
    ("understood", "understand"), ("drew", "draw"), ("drawn", "draw"), ("broke", "break"),
    ("broken", "break"), ("spent", "spend"), ("rose", "rise"), ("risen", "rise"),
    ("drove", "drive"), ("driven", "drive"), ("bought", "buy"), ("wore", "wear"),
    ("worn", "wear"), ("chose", "choose"), ("chosen", "choose"), ("ate", "eat"),
    ("eaten", "eat"), ("sang", "sing"), ("sung", "sing"), ("swam", "swim"), ("flew", "fly"),
    ("flown", "fly"), ("threw", "throw"), ("thrown", "throw"), ("caught", "catch"),
    ("taught", "teach"), ("fought", "fight"), ("sold", "sell"), ("slept", "sleep"),
    ("won", "win"), ("forgot", "forget"), ("forgotten", "forget"), ("hid", "hide"),
    ("hidden", "hide"), ("rode", "ride"), ("ridden", "ride"), ("shook", "shake"),
    ("shaken", "shake"), ("stole", "steal"), ("stolen", "steal"), ("woke", "wake"),
    ("woken", "wake"), ("drank", "drink"), ("drunk", "drink"), ("fed", "feed"),
    ("fled", "flee"), ("bent", "bend"), ("lent", "lend"), ("dealt", "deal"), ("dug", "dig"),
    ("hung", "hang"), ("struck", "strike"), ("sought", "seek"), ("bore", "bear"),
    ("born", "bear"), ("tore", "tear"), ("torn", "tear"), ("froze", "freeze"),
    ("frozen", "freeze"), ("lay", "lie"), ("lain", "lie"), ("lying", "lie"), ("dying", "die"),
];

const IRREGULAR_NOUNS: &[(&str, &str)] = &[
    ("men", "man"), ("women", "woman"), ("children", "child"), ("feet", "foot"),
    ("teeth", "tooth"), ("mice", "mouse"), ("geese", "goose"), ("people", "person"),
    ("oxen", "ox"), ("lives", "life"), ("wives", "wife"), ("knives", "knife"),
    ("leaves", "leaf"), ("wolves", "wolf"), ("halves", "half"), ("shelves", "shelf"),
    ("selves", "self"), ("loaves", "loaf"), ("thieves", "thief"), ("criteria", "criterion"),
    ("phenomena", "phenomenon"), ("analyses", "analysis"), ("crises", "crisis"),
    ("theses", "thesis"), ("indices", "index"), ("cacti", "cactus"), ("fungi", "fungus"),
];

const COMPARATIVES: &[(&str, &str)] = &[
    ("better", "good"), ("best", "good"), ("worse", "bad"), ("worst", "bad"),
    ("more", "many"), ("most", "many"), ("less", "little"), ("least", "little"),
    ("further", "far"), ("furthest", "far"), ("farther", "far"), ("farthest", "far"),
];

#[derive(Clone, Copy)]
enum Base {
    Noun,
    Verb,
    /// Verb whose final consonant doubles before -ed and -ing.
    DoublingVerb,
    Adjective,
}

/// Common base forms whose regular inflections are expanded into the dictionary.
const REGULAR_BASES: &[(&str, Base)] = &[
    ("book", Base::Noun), ("movie", Base::Noun), ("film", Base::Noun), ("story", Base::Noun),
    ("product", Base::Noun), ("review", Base::Noun), ("service", Base::Noun),
    ("day", Base::Noun), ("company", Base::Noun), ("city", Base::Noun), ("country", Base::Noun),
    ("car", Base::Noun), ("cat", Base::Noun), ("dog", Base::Noun), ("house", Base::Noun),
    ("box", Base::Noun), ("church", Base::Noun), ("dish", Base::Noun), ("class", Base::Noun),
    ("word", Base::Noun), ("sentence", Base::Noun), ("document", Base::Noun),
    ("user", Base::Noun), ("customer", Base::Noun), ("friend", Base::Noun),
    ("family", Base::Noun), ("year", Base::Noun), ("week", Base::Noun), ("hour", Base::Noun),
    ("price", Base::Noun), ("item", Base::Noun), ("order", Base::Noun), ("problem", Base::Noun),
    ("question", Base::Noun), ("answer", Base::Noun), ("idea", Base::Noun),
    ("feature", Base::Noun), ("room", Base::Noun), ("hotel", Base::Noun), ("meal", Base::Noun),
    ("restaurant", Base::Noun), ("staff", Base::Noun), ("party", Base::Noun),
    ("baby", Base::Noun), ("lady", Base::Noun), ("study", Base::Noun), ("thing", Base::Noun),
    ("love", Base::Verb), ("like", Base::Verb), ("use", Base::Verb), ("work", Base::Verb),
    ("play", Base::Verb), ("help", Base::Verb), ("try", Base::Verb), ("ask", Base::Verb),
    ("call", Base::Verb), ("seem", Base::Verb), ("turn", Base::Verb), ("start", Base::Verb),
    ("move", Base::Verb), ("live", Base::Verb), ("believe", Base::Verb), ("happen", Base::Verb),
    ("include", Base::Verb), ("learn", Base::Verb), ("change", Base::Verb),
    ("watch", Base::Verb), ("follow", Base::Verb), ("create", Base::Verb), ("walk", Base::Verb),
    ("offer", Base::Verb), ("remember", Base::Verb), ("consider", Base::Verb),
    ("appear", Base::Verb), ("wait", Base::Verb), ("serve", Base::Verb), ("expect", Base::Verb),
    ("stay", Base::Verb), ("reach", Base::Verb), ("remain", Base::Verb), ("suggest", Base::Verb),
    ("raise", Base::Verb), ("pass", Base::Verb), ("require", Base::Verb), ("decide", Base::Verb),
    ("recommend", Base::Verb), ("hate", Base::Verb), ("enjoy", Base::Verb),
    ("arrive", Base::Verb), ("return", Base::Verb), ("cook", Base::Verb), ("clean", Base::Verb),
    ("look", Base::Verb), ("want", Base::Verb), ("need", Base::Verb), ("open", Base::Verb),
    ("visit", Base::Verb), ("finish", Base::Verb), ("carry", Base::Verb), ("cry", Base::Verb),
    ("study", Base::Verb), ("stop", Base::DoublingVerb), ("plan", Base::DoublingVerb),
    ("run", Base::DoublingVerb), ("sit", Base::DoublingVerb), ("get", Base::DoublingVerb),
    ("swim", Base::DoublingVerb), ("shop", Base::DoublingVerb), ("drop", Base::DoublingVerb),
    ("hop", Base::DoublingVerb), ("admit", Base::DoublingVerb), ("begin", Base::DoublingVerb),
    ("put", Base::DoublingVerb), ("cut", Base::DoublingVerb), ("win", Base::DoublingVerb),
    ("big", Base::Adjective), ("small", Base::Adjective), ("fast", Base::Adjective),
    ("slow", Base::Adjective), ("happy", Base::Adjective), ("easy", Base::Adjective),
    ("nice", Base::Adjective), ("large", Base::Adjective), ("cheap", Base::Adjective),
    ("hot", Base::Adjective), ("high", Base::Adjective), ("low", Base::Adjective),
];

fn ends_with_sibilant(word: &str) -> bool {
    ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s))
}

fn consonant_y_stem(word: &str) -> Option<&str> {
    let stem = word.strip_suffix('y')?;
    match stem.chars().last() {
        Some(c) if !"aeiou".contains(c) => Some(stem),
        _ => None,
    }
}

fn plural(word: &str) -> String {
    if let Some(stem) = consonant_y_stem(word) {
        format!("{stem}ies")
    } else if ends_with_sibilant(word) {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

fn past(word: &str, doubles: bool) -> String {
    if doubles {
        let last = word.chars().last().map(String::from).unwrap_or_default();
        format!("{word}{last}ed")
    } else if let Some(stem) = consonant_y_stem(word) {
        format!("{stem}ied")
    } else if word.ends_with('e') {
        format!("{word}d")
    } else {
        format!("{word}ed")
    }
}

fn gerund(word: &str, doubles: bool) -> String {
    if doubles {
        let last = word.chars().last().map(String::from).unwrap_or_default();
        format!("{word}{last}ing")
    } else if let Some(stem) = word.strip_suffix("ie") {
        format!("{stem}ying")
    } else if word.ends_with('e') && !word.ends_with("ee") {
        format!("{}ing", &word[..word.len() - 1])
    } else {
        format!("{word}ing")
    }
}

fn comparative(word: &str, suffix: &str) -> String {
    if let Some(stem) = consonant_y_stem(word) {
        format!("{stem}i{suffix}")
    } else if word.ends_with('e') {
        format!("{word}{}", &suffix[1..])
    } else if word == "big" || word == "hot" {
        let last = word.chars().last().map(String::from).unwrap_or_default();
        format!("{word}{last}{suffix}")
    } else {
        format!("{word}{suffix}")
    }
}

static IRREGULAR_VERB_INDEX: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| IRREGULAR_VERBS.iter().copied().collect());

static DICTIONARY: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut dictionary = HashMap::new();

    for (base, kind) in REGULAR_BASES {
        let forms = match kind {
            Base::Noun => vec![plural(base)],
            Base::Verb => vec![plural(base), past(base, false), gerund(base, false)],
            Base::DoublingVerb => vec![plural(base), past(base, true), gerund(base, true)],
            Base::Adjective => vec![comparative(base, "er"), comparative(base, "est")],
        };
        for form in forms {
            dictionary.entry(form).or_insert(*base);
        }
    }

    // Irregular entries take precedence over generated ones ("ran" is not "ranned").
    for (form, base) in IRREGULAR_VERBS
        .iter()
        .chain(IRREGULAR_NOUNS)
        .chain(COMPARATIVES)
    {
        dictionary.insert(form.to_string(), *base);
    }

    dictionary
});

/// Base form of an irregular verb form, if the token is one.
pub fn irregular_verb_base(lower: &str) -> Option<&'static str> {
    IRREGULAR_VERB_INDEX.get(lower).copied()
}

/// Lemma of a single token.
pub fn lemma(token: &str) -> String {
    let lower = token.to_lowercase();
    match DICTIONARY.get(&lower) {
        Some(base) => (*base).to_string(),
        None => token.to_string(),
    }
}

/// Lemmatize a token sequence, preserving length and order.
pub fn lemmatize(tokens: &[String]) -> Vec<String> {
    tokens.iter().map(|token| lemma(token)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irregular_forms() {
        assert_eq!(lemma("went"), "go");
        assert_eq!(lemma("Children"), "child");
        assert_eq!(lemma("better"), "good");
        assert_eq!(lemma("was"), "be");
        assert_eq!(lemma("ran"), "run");
    }

    #[test]
    fn test_regular_inflections() {
        assert_eq!(lemma("movies"), "movie");
        assert_eq!(lemma("stories"), "story");
        assert_eq!(lemma("boxes"), "box");
        assert_eq!(lemma("loved"), "love");
        assert_eq!(lemma("stopped"), "stop");
        assert_eq!(lemma("running"), "run");
        assert_eq!(lemma("studied"), "study");
        assert_eq!(lemma("happier"), "happy");
        assert_eq!(lemma("biggest"), "big");
        assert_eq!(lemma("larger"), "large");
    }

    #[test]
    fn test_unknown_tokens_unchanged() {
        assert_eq!(lemma("Zyzzyva"), "Zyzzyva");
        assert_eq!(lemma("!"), "!");
        assert_eq!(lemma("movie"), "movie");
    }

    #[test]
    fn test_sequence_preserves_length() {
        let tokens: Vec<String> = ["the", "dogs", "were", "running"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(lemmatize(&tokens), vec!["the", "dog", "be", "run"]);
    }
}
