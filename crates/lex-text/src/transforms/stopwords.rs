//! Stopword lists and filtering.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Language keys accepted by the `language` parameter.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "english",
    "french",
    "german",
    "spanish",
    "portuguese",
    "italian",
    "dutch",
];

pub const DEFAULT_LANGUAGE: &str = "english";

const ENGLISH: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

const FRENCH: &[&str] = &[
    "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "et", "eux",
    "il", "ils", "je", "la", "le", "les", "leur", "lui", "ma", "mais", "me", "même", "mes",
    "moi", "mon", "ne", "nos", "notre", "nous", "on", "ou", "par", "pas", "pour", "qu", "que",
    "qui", "sa", "se", "ses", "son", "sur", "ta", "te", "tes", "toi", "ton", "tu", "un", "une",
    "vos", "votre", "vous", "c", "d", "j", "l", "à", "m", "n", "s", "t", "y", "été", "étée",
    "étées", "étés", "étant", "suis", "es", "est", "sommes", "êtes", "sont", "serai", "sera",
    "serons", "serez", "seront", "étais", "était", "étions", "étiez", "étaient", "ai", "as",
    "avons", "avez", "ont", "aurai", "aura", "avait", "avais", "eu", "cette", "cet", "ceci",
];

const GERMAN: &[&str] = &[
    "aber", "alle", "allem", "allen", "aller", "alles", "als", "also", "am", "an", "ander",
    "auch", "auf", "aus", "bei", "bin", "bis", "bist", "da", "damit", "dann", "das", "dass",
    "dein", "dem", "den", "der", "des", "dich", "die", "dir", "doch", "dort", "du", "durch",
    "ein", "eine", "einem", "einen", "einer", "eines", "er", "es", "euer", "für", "hat",
    "hatte", "hier", "ich", "ihr", "ihre", "im", "in", "ist", "ja", "jede", "jetzt", "kann",
    "kein", "mein", "mich", "mir", "mit", "muss", "nach", "nicht", "nichts", "noch", "nun",
    "nur", "ob", "oder", "ohne", "sehr", "sein", "seine", "sich", "sie", "sind", "so", "soll",
    "über", "um", "und", "uns", "unser", "unter", "viel", "vom", "von", "vor", "war", "waren",
    "was", "weil", "welche", "wenn", "wer", "werden", "wie", "wieder", "will", "wir", "wird",
    "wo", "zu", "zum", "zur",
];

const SPANISH: &[&str] = &[
    "de", "la", "que", "el", "en", "y", "a", "los", "del", "se", "las", "por", "un", "para",
    "con", "no", "una", "su", "al", "lo", "como", "más", "pero", "sus", "le", "ya", "o",
    "este", "sí", "porque", "esta", "entre", "cuando", "muy", "sin", "sobre", "también", "me",
    "hasta", "hay", "donde", "quien", "desde", "todo", "nos", "durante", "todos", "uno", "les",
    "ni", "contra", "otros", "ese", "eso", "ante", "ellos", "e", "esto", "mí", "antes",
    "algunos", "qué", "unos", "yo", "otro", "otras", "otra", "él", "tanto", "esa", "estos",
    "mucho", "quienes", "nada", "muchos", "cual", "poco", "ella", "estar", "estas", "algunas",
    "algo", "nosotros", "mi", "mis", "tú", "te", "ti", "tu", "tus", "ellas", "es", "son", "fue",
    "ha", "era",
];

const PORTUGUESE: &[&str] = &[
    "de", "a", "o", "que", "e", "do", "da", "em", "um", "para", "com", "não", "uma", "os",
    "no", "se", "na", "por", "mais", "as", "dos", "como", "mas", "ao", "ele", "das", "à",
    "seu", "sua", "ou", "quando", "muito", "nos", "já", "eu", "também", "só", "pelo", "pela",
    "até", "isso", "ela", "entre", "depois", "sem", "mesmo", "aos", "seus", "quem", "nas",
    "me", "esse", "eles", "você", "essa", "num", "nem", "suas", "meu", "às", "minha", "numa",
    "pelos", "elas", "qual", "nós", "lhe", "deles", "essas", "esses", "pelas", "este", "dele",
    "tu", "te", "vocês", "vos", "lhes", "meus", "minhas", "teu", "tua", "nosso", "nossa",
    "é", "são", "foi", "era", "ser", "tem", "há",
];

const ITALIAN: &[&str] = &[
    "ad", "al", "allo", "ai", "agli", "all", "alla", "alle", "con", "col", "coi", "da", "dal",
    "dallo", "dai", "dagli", "dall", "dalla", "dalle", "di", "del", "dello", "dei", "degli",
    "dell", "della", "delle", "in", "nel", "nello", "nei", "negli", "nell", "nella", "nelle",
    "su", "sul", "sullo", "sui", "sugli", "sull", "sulla", "sulle", "per", "tra", "contro",
    "io", "tu", "lui", "lei", "noi", "voi", "loro", "mio", "mia", "miei", "mie", "tuo", "tua",
    "suo", "sua", "nostro", "nostra", "vostro", "vostra", "mi", "ti", "ci", "vi", "lo", "la",
    "li", "le", "gli", "ne", "il", "un", "uno", "una", "ma", "ed", "se", "perché", "anche",
    "come", "dov", "dove", "che", "chi", "cui", "non", "più", "quale", "quanto", "quello",
    "questo", "sono", "è", "e", "ho", "ha", "hanno", "era", "essere", "avere",
];

const DUTCH: &[&str] = &[
    "de", "en", "van", "ik", "te", "dat", "die", "in", "een", "hij", "het", "niet", "zijn",
    "is", "was", "op", "aan", "met", "als", "voor", "had", "er", "maar", "om", "hem", "dan",
    "zou", "of", "wat", "mijn", "men", "dit", "zo", "door", "over", "ze", "zich", "bij", "ook",
    "tot", "je", "mij", "uit", "der", "daar", "haar", "naar", "heb", "hoe", "heeft", "hebben",
    "deze", "u", "want", "nog", "zal", "me", "zij", "nu", "ge", "geen", "omdat", "iets",
    "worden", "toch", "al", "waren", "veel", "meer", "doen", "toen", "moet", "ben", "zonder",
    "kan", "hun", "dus", "alles", "onder", "ja", "eens", "hier", "wie", "werd", "altijd",
    "doch", "wordt", "wezen", "kunnen", "ons", "zelf", "tegen", "na", "reeds", "wil", "kon",
    "niets", "uw", "iemand", "geweest", "andere",
];

static STOPWORDS: Lazy<HashMap<&'static str, HashSet<&'static str>>> = Lazy::new(|| {
    let lists: [(&str, &[&str]); 7] = [
        ("english", ENGLISH),
        ("french", FRENCH),
        ("german", GERMAN),
        ("spanish", SPANISH),
        ("portuguese", PORTUGUESE),
        ("italian", ITALIAN),
        ("dutch", DUTCH),
    ];
    lists
        .into_iter()
        .map(|(language, words)| (language, words.iter().copied().collect()))
        .collect()
});

/// Normalise a language key, returning None if it has no stopword list.
pub fn normalize_language(language: &str) -> Option<&'static str> {
    let lower = language.trim().to_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|supported| *supported == lower)
}

/// Check whether `token` is a stopword in `language` (case-insensitive).
pub fn is_stopword(language: &str, token: &str) -> bool {
    let Some(list) = STOPWORDS.get(language) else {
        return false;
    };
    let lower = token.to_lowercase();
    // Typographic apostrophes are folded so "don’t" matches "don't".
    let folded = lower.replace('’', "'");
    list.contains(folded.as_str())
}

/// Remove stopwords while preserving the order of the remaining tokens.
pub fn remove_stopwords(language: &str, tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|token| !is_stopword(language, token))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_english_filter_is_case_insensitive() {
        let out = remove_stopwords("english", &tokens(&["The", "movie", "was", "NOT", "good"]));
        assert_eq!(out, vec!["movie", "good"]);
    }

    #[test]
    fn test_typographic_apostrophe() {
        assert!(is_stopword("english", "Don’t"));
        assert!(is_stopword("english", "don't"));
    }

    #[test]
    fn test_other_languages() {
        assert_eq!(
            remove_stopwords("french", &tokens(&["le", "chat", "et", "la", "souris"])),
            vec!["chat", "souris"]
        );
        assert_eq!(
            remove_stopwords("german", &tokens(&["Der", "Hund", "und", "die", "Katze"])),
            vec!["Hund", "Katze"]
        );
    }

    #[test]
    fn test_every_supported_language_has_a_list() {
        for language in SUPPORTED_LANGUAGES {
            assert!(STOPWORDS.contains_key(language), "missing list for {language}");
        }
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("English"), Some("english"));
        assert_eq!(normalize_language(" dutch "), Some("dutch"));
        assert_eq!(normalize_language("klingon"), None);
    }
}
