use std::sync::OnceLock;

use regex::Regex;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_date_like, r"\b\d{1,2}/\d{1,2}/\d{2,4}\b");
re!(re_amount, r"\$\s*\d+(?:[.,]\d+)*");
re!(re_long_digits, r"\d{4,}");

// ── Stop words ───────────────────────────────────────────────────────────────

const COMMON_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "day", "get", "has", "him", "his", "how", "its", "may", "new", "now", "old",
    "see", "two", "who", "boy", "did", "she", "use", "way", "will", "with", "from", "they",
    "know", "want", "been", "good", "much", "some", "time", "very", "when", "come", "here",
    "just", "like", "long", "make", "many", "over", "such", "take", "than", "them", "well",
    "were",
];

const TRANSACTION_NOISE: &[&str] = &[
    "purchase", "payment", "transaction", "card", "debit", "credit", "online", "store", "shop",
];

const LOCALE_NOISE: &[&str] = &[
    "pty", "ltd", "australia", "sydney", "melbourne", "brisbane", "perth", "adelaide",
];

fn is_stop_word(word: &str) -> bool {
    COMMON_STOP_WORDS.contains(&word)
        || TRANSACTION_NOISE.contains(&word)
        || LOCALE_NOISE.contains(&word)
}

// ── Extraction ───────────────────────────────────────────────────────────────

/// Pick the single most merchant-like keyword out of a raw bank
/// description. Deterministic; `None` when nothing survives the noise
/// filters.
pub fn extract_keyword(description: &str) -> Option<String> {
    let lowered = description.to_lowercase();
    let cleaned = re_date_like().replace_all(&lowered, " ");
    let cleaned = re_amount().replace_all(&cleaned, " ");
    let cleaned = re_long_digits().replace_all(&cleaned, " ");
    let cleaned: String = cleaned
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    // First-seen position per distinct surviving token.
    let mut candidates: Vec<(String, usize)> = Vec::new();
    for token in cleaned.split_whitespace() {
        if token.len() < 3 || is_stop_word(token) {
            continue;
        }
        if !candidates.iter().any(|(w, _)| w == token) {
            let pos = candidates.len();
            candidates.push((token.to_string(), pos));
        }
    }

    // Capitalized in the original beats length beats first occurrence.
    candidates.sort_by(|(a, ap), (b, bp)| {
        let a_cap = appears_capitalized(description, a);
        let b_cap = appears_capitalized(description, b);
        b_cap
            .cmp(&a_cap)
            .then(b.len().cmp(&a.len()))
            .then(ap.cmp(bp))
    });

    candidates.into_iter().next().map(|(w, _)| w)
}

fn appears_capitalized(original: &str, word: &str) -> bool {
    let mut chars = word.chars();
    let first = match chars.next() {
        Some(c) => c.to_ascii_uppercase(),
        None => return false,
    };
    let capitalized: String = std::iter::once(first).chain(chars).collect();
    original.contains(&capitalized)
}
