//! Rule-based named entity recognition.
//!
//! The scanner works on raw text in three passes, each claiming character
//! ranges that later passes may not overlap:
//!
//! 1. money amounts (`$12.50`, `3 million dollars`)
//! 2. dates (ISO and slash dates, month-day forms, weekdays, years)
//! 3. capitalised spans, classified with organisation suffixes, gazetteers,
//!    honorifics and a first-name list
//!
//! Capitalised spans that cannot be classified are dropped. Offsets are
//! character offsets into the original text, `end` exclusive.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::ops::Range;

/// Entity labels the scanner can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Person,
    Org,
    Gpe,
    Date,
    Money,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        Self::Person,
        Self::Org,
        Self::Gpe,
        Self::Date,
        Self::Money,
    ];

    /// Labels used when a step does not set `entity_types`.
    pub const DEFAULTS: [EntityType; 3] = [Self::Person, Self::Org, Self::Gpe];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Org => "ORG",
            Self::Gpe => "GPE",
            Self::Date => "DATE",
            Self::Money => "MONEY",
        }
    }

    /// Parse a label, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_uppercase();
        Self::ALL.into_iter().find(|label| label.as_str() == upper)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recognised entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: EntityType,
    pub start: usize,
    pub end: usize,
}

static MONEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[$€£¥]\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:million|billion|thousand|bn|m|k)\b)?|\b\d[\d,]*(?:\.\d+)?\s?(?:million\s|billion\s|thousand\s)?(?:dollars|euros|pounds|yen|usd|eur|gbp)\b",
    )
    .expect("Invalid regex: money")
});

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let month = "(?:January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)";
    let pattern = format!(
        r"\b(?:\d{{4}}-\d{{2}}-\d{{2}}|\d{{1,2}}/\d{{1,2}}/\d{{2,4}}|{month}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?(?:,?\s+\d{{4}})?|\d{{1,2}}(?:st|nd|rd|th)?\s+(?:of\s+)?{month}(?:,?\s+\d{{4}})?|{month}\s+\d{{4}}|(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)|(?:1[89]|20)\d{{2}})\b"
    );
    Regex::new(&pattern).expect("Invalid regex: date")
});

/// Runs of capitalised words, optionally joined by lowercase connectors and
/// preceded by an abbreviated title.
static SPAN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:\b(?:Mr|Mrs|Ms|Mx|Dr|Prof)\.\s+)?\b\p{Lu}[\p{L}\p{N}'’\-]*(?:\s+(?:(?:of|the|for|de|la|le|van|von|der|den|del|da|di|du|&)\s+)*\p{Lu}[\p{L}\p{N}'’\-]*)*",
    )
    .expect("Invalid regex: capitalised span")
});

const HONORIFICS: &[&str] = &[
    "mr", "mrs", "ms", "mx", "dr", "prof", "sir", "dame", "lord", "lady", "president",
    "senator", "judge", "captain", "king", "queen", "prince", "princess",
];

/// Capitalised words that open sentences without being part of a name.
const LEADING_FUNCTION_WORDS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "in", "on", "at", "but", "and", "or",
    "if", "when", "while", "after", "before", "from", "to", "for", "with", "by", "of", "my",
    "our", "his", "her", "their", "its", "we", "i", "he", "she", "they", "it", "yesterday",
    "today", "tomorrow", "last", "next", "every", "visit", "visited", "meet", "met", "ask",
    "dear", "hi", "hello", "thanks", "thank", "so", "then", "also", "however",
];

const ORG_SUFFIXES: &[&str] = &[
    "inc", "corp", "corporation", "ltd", "llc", "co", "company", "group", "bank", "university",
    "institute", "foundation", "association", "agency", "ministry", "department", "committee",
    "council", "party", "airlines", "airways", "technologies", "systems", "labs", "partners",
    "holdings", "plc", "gmbh", "ag", "sa", "bros", "industries", "motors", "studios", "times",
    "news", "college", "school", "hospital", "club", "united", "fc",
];

const ABBREVIATED_SUFFIXES: &[&str] = &["inc", "corp", "ltd", "co", "bros"];

const ORG_PREFIXES: &[&str] = &["university", "bank", "institute", "ministry", "department"];

const ORGANISATIONS: &[&str] = &[
    "google", "apple", "microsoft", "amazon", "facebook", "meta", "ibm", "intel", "tesla",
    "netflix", "twitter", "nasa", "fbi", "cia", "un", "eu", "nato", "who", "bbc", "cnn",
    "reuters", "toyota", "samsung", "sony", "nike", "walmart", "starbucks", "openai", "uber",
    "airbnb", "spotify", "oracle", "adobe", "nvidia", "youtube", "linkedin", "disney", "boeing",
    "unicef", "unesco", "congress", "parliament", "senate",
];

const PLACES: &[&str] = &[
    "afghanistan", "argentina", "australia", "austria", "belgium", "brazil", "canada", "chile",
    "china", "colombia", "cuba", "denmark", "egypt", "england", "ethiopia", "finland", "france",
    "germany", "greece", "india", "indonesia", "iran", "iraq", "ireland", "israel", "italy",
    "japan", "kenya", "korea", "south korea", "north korea", "mexico", "morocco", "netherlands",
    "new zealand", "nigeria", "norway", "pakistan", "peru", "philippines", "poland", "portugal",
    "russia", "saudi arabia", "scotland", "singapore", "south africa", "spain", "sweden",
    "switzerland", "syria", "taiwan", "thailand", "turkey", "ukraine", "united kingdom", "uk",
    "united states", "united states of america", "usa", "us", "america", "vietnam", "wales",
    "london", "paris", "berlin", "madrid", "rome", "lisbon", "amsterdam", "brussels", "vienna",
    "dublin", "moscow", "beijing", "shanghai", "tokyo", "seoul", "delhi", "new delhi", "mumbai",
    "sydney", "melbourne", "toronto", "vancouver", "montreal", "new york", "new york city",
    "los angeles", "chicago", "houston", "boston", "seattle", "san francisco", "washington",
    "miami", "atlanta", "dallas", "denver", "cairo", "lagos", "nairobi", "istanbul", "dubai",
    "hong kong", "bangkok", "jakarta", "manila", "mexico city", "buenos aires", "rio de janeiro",
    "sao paulo", "são paulo", "california", "texas", "florida", "ohio", "oregon", "nevada",
    "arizona", "georgia", "virginia", "michigan", "illinois", "europe", "asia", "africa",
];

const FIRST_NAMES: &[&str] = &[
    "james", "john", "robert", "michael", "william", "david", "richard", "joseph", "thomas",
    "charles", "daniel", "matthew", "anthony", "mark", "paul", "steven", "andrew", "kevin",
    "brian", "george", "edward", "peter", "jack", "harry", "oliver", "noah", "liam", "lucas",
    "ethan", "leo", "sam", "alex", "max", "tom", "ben", "mary", "patricia", "jennifer", "linda",
    "elizabeth", "barbara", "susan", "jessica", "sarah", "karen", "nancy", "lisa", "emily",
    "emma", "olivia", "sophia", "ava", "mia", "isabella", "charlotte", "amelia", "grace",
    "anna", "maria", "laura", "julia", "alice", "jane", "kate", "lucy", "hannah", "rachel",
    "rebecca", "claire", "marie", "pierre", "jean", "luc", "hans", "klaus", "jürgen", "carlos",
    "juan", "jose", "josé", "luis", "miguel", "ana", "sofia", "giulia", "marco", "giovanni",
    "ahmed", "mohammed", "muhammad", "ali", "fatima", "omar", "wei", "li", "yuki", "hiroshi",
    "raj", "priya", "arjun", "elon", "bill", "steve", "tim", "jeff", "barack", "donald", "joe",
];

static HONORIFIC_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| HONORIFICS.iter().copied().collect());
static LEADING_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| LEADING_FUNCTION_WORDS.iter().copied().collect());
static ORG_SUFFIX_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ORG_SUFFIXES.iter().copied().collect());
static ORG_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| ORGANISATIONS.iter().copied().collect());
static PLACE_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| PLACES.iter().copied().collect());
static FIRST_NAME_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| FIRST_NAMES.iter().copied().collect());

/// Byte offset to character offset mapping for one text.
struct CharOffsets {
    byte_starts: Vec<usize>,
}

impl CharOffsets {
    fn new(text: &str) -> Self {
        Self {
            byte_starts: text.char_indices().map(|(byte, _)| byte).collect(),
        }
    }

    fn to_char(&self, byte: usize) -> usize {
        self.byte_starts.partition_point(|&b| b < byte)
    }
}

/// Byte ranges already claimed by an earlier pass.
#[derive(Default)]
struct Claims {
    ranges: Vec<Range<usize>>,
}

impl Claims {
    fn overlaps(&self, range: &Range<usize>) -> bool {
        self.ranges
            .iter()
            .any(|claimed| claimed.start < range.end && range.start < claimed.end)
    }

    fn claim(&mut self, range: Range<usize>) -> bool {
        if range.is_empty() || self.overlaps(&range) {
            return false;
        }
        self.ranges.push(range);
        true
    }
}

fn normalize_word(word: &str) -> String {
    word.trim_end_matches('.').to_lowercase()
}

fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s")
        .or_else(|| word.strip_suffix("’s"))
        .unwrap_or(word)
}

/// Split a span into words with their byte ranges (relative to `base`).
fn words_of(span: &str, base: usize) -> Vec<(Range<usize>, &str)> {
    let mut words = Vec::new();
    let mut start = None;
    for (i, c) in span.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                words.push((base + s..base + i, &span[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push((base + s..base + span.len(), &span[s..]));
    }
    words
}

fn classify(words: &[&str], titled: bool, text: &str) -> Option<EntityType> {
    let lowered: Vec<String> = words.iter().map(|w| normalize_word(w)).collect();
    let first = lowered.first()?;
    let last = lowered.last()?;
    let joined = lowered.join(" ");

    if words.len() > 1 && ORG_SUFFIX_SET.contains(last.as_str()) {
        return Some(EntityType::Org);
    }
    if words.len() > 1 && ORG_PREFIXES.contains(&first.as_str()) {
        return Some(EntityType::Org);
    }
    if text.contains(" & ") || ORG_SET.contains(joined.as_str()) || ORG_SET.contains(first.as_str()) {
        return Some(EntityType::Org);
    }
    if PLACE_SET.contains(joined.as_str()) {
        return Some(EntityType::Gpe);
    }
    if titled || FIRST_NAME_SET.contains(first.as_str()) {
        return Some(EntityType::Person);
    }
    None
}

fn scan_spans(text: &str, claims: &mut Claims, found: &mut Vec<(Range<usize>, EntityType)>) {
    for m in SPAN_PATTERN.find_iter(text) {
        let mut words = words_of(m.as_str(), m.start());

        // Drop sentence-opening function words and any connectors they expose.
        while let Some((_, word)) = words.first() {
            let lower = normalize_word(word);
            if LEADING_SET.contains(lower.as_str()) && words.len() > 1 || is_connector(&lower) {
                words.remove(0);
            } else {
                break;
            }
        }
        if words.len() == 1 && LEADING_SET.contains(normalize_word(words[0].1).as_str()) {
            continue;
        }

        // "Dr. Jane Smith": the title marks a person but is not part of the name.
        let mut titled = false;
        while let Some((_, word)) = words.first() {
            if HONORIFIC_SET.contains(normalize_word(word).as_str()) {
                titled = true;
                words.remove(0);
            } else {
                break;
            }
        }
        // a lone honorific such as "President" is not an entity
        if words.is_empty() {
            continue;
        }

        let Some(last) = words.last_mut() else {
            continue;
        };
        let trimmed = strip_possessive(last.1);
        if trimmed.len() < last.1.len() {
            last.0.end = last.0.start + trimmed.len();
            last.1 = trimmed;
        }

        let start = words[0].0.start;
        let mut end = words[words.len() - 1].0.end;
        let span_text = &text[start..end];
        let word_texts: Vec<&str> = words.iter().map(|(_, w)| *w).collect();

        let Some(label) = classify(&word_texts, titled, span_text) else {
            continue;
        };

        // Include the period of abbreviated company suffixes ("Acme Inc.").
        if label == EntityType::Org
            && ABBREVIATED_SUFFIXES.contains(&normalize_word(word_texts[word_texts.len() - 1]).as_str())
            && text[end..].starts_with('.')
        {
            end += 1;
        }

        if claims.claim(start..end) {
            found.push((start..end, label));
        }
    }
}

fn is_connector(lower: &str) -> bool {
    matches!(
        lower,
        "of" | "the" | "for" | "de" | "la" | "le" | "van" | "von" | "der" | "den" | "del" | "da"
            | "di" | "du" | "&"
    )
}

/// Extract entities from `text`, keeping only the requested labels.
///
/// Results are ordered by start offset and never overlap.
pub fn extract(text: &str, labels: &BTreeSet<EntityType>) -> Vec<Entity> {
    let mut claims = Claims::default();
    let mut found: Vec<(Range<usize>, EntityType)> = Vec::new();

    for m in MONEY_PATTERN.find_iter(text) {
        if claims.claim(m.range()) {
            found.push((m.range(), EntityType::Money));
        }
    }
    for m in DATE_PATTERN.find_iter(text) {
        if claims.claim(m.range()) {
            found.push((m.range(), EntityType::Date));
        }
    }
    scan_spans(text, &mut claims, &mut found);

    found.sort_by_key(|(range, _)| range.start);

    let offsets = CharOffsets::new(text);
    found
        .into_iter()
        .filter(|(_, label)| labels.contains(label))
        .map(|(range, label)| Entity {
            text: text[range.clone()].to_string(),
            label,
            start: offsets.to_char(range.start),
            end: offsets.to_char(range.end),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn all_labels() -> BTreeSet<EntityType> {
        EntityType::ALL.into_iter().collect()
    }

    fn summary(entities: &[Entity]) -> Vec<(&str, EntityType)> {
        entities.iter().map(|e| (e.text.as_str(), e.label)).collect()
    }

    #[test]
    fn test_people_orgs_and_places() {
        let entities = extract(
            "Yesterday Barack Obama met executives from Google in Paris.",
            &all_labels(),
        );
        assert_eq!(
            summary(&entities),
            vec![
                ("Barack Obama", EntityType::Person),
                ("Google", EntityType::Org),
                ("Paris", EntityType::Gpe),
            ]
        );
    }

    #[test]
    fn test_honorific_and_org_suffix() {
        let entities = extract("Dr. Jane Smith joined Acme Widgets Inc. last year.", &all_labels());
        assert_eq!(
            summary(&entities),
            vec![
                ("Jane Smith", EntityType::Person),
                ("Acme Widgets Inc.", EntityType::Org),
            ]
        );
    }

    #[test]
    fn test_money_and_dates() {
        let entities = extract(
            "On March 5, 2024 the company paid $1,200.50 and 3 million dollars by 2025-01-31.",
            &all_labels(),
        );
        assert_eq!(
            summary(&entities),
            vec![
                ("March 5, 2024", EntityType::Date),
                ("$1,200.50", EntityType::Money),
                ("3 million dollars", EntityType::Money),
                ("2025-01-31", EntityType::Date),
            ]
        );
    }

    #[test]
    fn test_character_offsets() {
        let text = "Café owner Maria moved to Berlin";
        let entities = extract(text, &all_labels());
        let berlin = entities
            .iter()
            .find(|e| e.text == "Berlin")
            .expect("Berlin should be found");
        let chars: Vec<char> = text.chars().collect();
        let slice: String = chars[berlin.start..berlin.end].iter().collect();
        assert_eq!(slice, "Berlin");
        assert_eq!(berlin.start, 26);
    }

    #[test]
    fn test_label_filter() {
        let labels: BTreeSet<EntityType> = [EntityType::Gpe].into_iter().collect();
        let entities = extract("John flew from London to Tokyo", &labels);
        assert_eq!(
            summary(&entities),
            vec![("London", EntityType::Gpe), ("Tokyo", EntityType::Gpe)]
        );
    }

    #[test]
    fn test_unclassified_spans_dropped() {
        assert!(extract("The Quick Brown Fox", &all_labels()).is_empty());
        assert!(extract("", &all_labels()).is_empty());
    }

    #[test]
    fn test_possessive_stripped() {
        let entities = extract("We tried Apple's new phone", &all_labels());
        assert_eq!(summary(&entities), vec![("Apple", EntityType::Org)]);
    }

    #[test]
    fn test_entity_type_parsing() {
        assert_eq!(EntityType::from_name("person"), Some(EntityType::Person));
        assert_eq!(EntityType::from_name("GPE"), Some(EntityType::Gpe));
        assert_eq!(EntityType::from_name("LOC"), None);
        assert_eq!(serde_json::to_string(&EntityType::Money).unwrap(), "\"MONEY\"");
    }
}
