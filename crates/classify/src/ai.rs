use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use deducto_core::Transaction;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI backend error: {0}")]
    Backend(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed AI response: {0}")]
    Malformed(String),
}

/// One AI answer: who the merchant is and what industry it belongs to.
/// `merchant_name` of "unknown" (or empty) means the AI could not tell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantGuess {
    pub id: String,
    pub merchant_name: String,
    pub industry_code: String,
    pub confidence: u8,
}

impl MerchantGuess {
    pub fn unknown(id: &str) -> Self {
        MerchantGuess {
            id: id.to_string(),
            merchant_name: "unknown".to_string(),
            industry_code: String::new(),
            confidence: 0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        let name = self.merchant_name.trim();
        name.is_empty() || name.eq_ignore_ascii_case("unknown")
    }
}

/// Names the merchant and industry code for a chunk of transactions.
/// Chunking and rate pacing are the pipeline's concern, not the
/// implementation's.
#[async_trait]
pub trait AiClassifier: Send + Sync {
    async fn extract_merchants(&self, batch: &[Transaction]) -> Result<Vec<MerchantGuess>, AiError>;
}

// ── Mock classifier (tests) ──────────────────────────────────────────────────

/// Returns pre-set guesses by transaction id; ids without a preset come
/// back as unknown.
#[derive(Default)]
pub struct MockClassifier {
    replies: Vec<MerchantGuess>,
}

impl MockClassifier {
    pub fn new(replies: Vec<MerchantGuess>) -> Self {
        Self { replies }
    }
}

#[async_trait]
impl AiClassifier for MockClassifier {
    async fn extract_merchants(
        &self,
        batch: &[Transaction],
    ) -> Result<Vec<MerchantGuess>, AiError> {
        Ok(batch
            .iter()
            .map(|tx| {
                self.replies
                    .iter()
                    .find(|g| g.id == tx.id)
                    .cloned()
                    .unwrap_or_else(|| MerchantGuess::unknown(&tx.id))
            })
            .collect())
    }
}

// ── Heuristic classifier (offline) ───────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_star_ref, r"\*\S*");
re!(re_prefix,
    r"^(debit card purchase|eftpos purchase|eftpos debit|eftpos|visa purchase|card purchase|purchase|payment by authority to|payment to|payment|transfer to|transfer|direct debit|dd|deposit)\s+");
re!(re_trailing_ref, r"\s-[a-z0-9]+$");
re!(re_digit_run, r"\d{2,}");
re!(re_suffix,
    r"\s+(aus|au|australia|sydney|melbourne|brisbane|perth|adelaide|nsw|vic|qld|wa|sa|tas|act|nt|pty|ltd|aud|usd|incl|gst)$");

/// Words that mark a transaction as bank administration rather than a
/// merchant spend. Checked against raw description words.
const BLACKLIST_WORDS: &[&str] = &[
    "bpay", "payid", "osko", "withdrawal", "deposit", "transfer", "fee", "charge", "interest",
    "dividend", "refund", "reversal", "adjustment", "correction", "atm", "ato", "centrelink",
    "medicare", "rms", "vicroads", "supermarket", "grocery", "personal", "private",
];

/// Regex patterns for merchants whose descriptor rarely survives plain
/// word matching. Order matters: "uber eats" must fire before "uber",
/// "coles express" (fuel) before "coles" (groceries).
fn specific_patterns() -> &'static Vec<(Regex, &'static str, &'static str, u8)> {
    static P: OnceLock<Vec<(Regex, &'static str, &'static str, u8)>> = OnceLock::new();
    P.get_or_init(|| {
        let row = |pat: &str, name: &'static str, code: &'static str, conf: u8| {
            (Regex::new(pat).expect("invalid regex"), name, code, conf)
        };
        vec![
            row(r"\buber\s*eats\b", "Uber Eats", "5611", 95),
            row(r"\buber\b", "Uber", "4622", 95),
            row(r"\bcoles\s+express\b", "Shell Coles Express", "4613", 95),
            row(r"\b(shell|caltex|ampol|mobil|esso)\b", "Fuel Station", "4613", 95),
            row(r"\b7-?\s?eleven\b", "7-Eleven", "4613", 95),
            row(r"\bbp\b", "BP", "4613", 95),
            row(r"\bbunnings\b", "Bunnings Warehouse", "4231", 95),
            row(r"\bjb\s*hi\s*-?\s*fi\b", "JB Hi-Fi", "4252", 95),
            row(r"\bharvey\s+norman\b", "Harvey Norman", "4252", 95),
            row(r"\bofficeworks\b", "Officeworks", "4252", 95),
            row(r"\btelstra\b", "Telstra", "5910", 95),
            row(r"\boptus\b", "Optus", "5910", 95),
            row(r"\b(mcdonald'?s?|maccas)\b", "McDonald's", "5611", 95),
            row(r"\b(woolworths|woolies)\b", "Woolworths", "4110", 95),
            row(r"\bcoles\b", "Coles", "4110", 95),
            row(r"\bqantas\b", "Qantas", "4900", 95),
            row(r"\bjetstar\b", "Jetstar", "4900", 95),
        ]
    })
}

/// Single- and double-word merchant names matched against the first
/// cleaned words of a descriptor.
const KNOWN_MERCHANTS: &[(&str, &str)] = &[
    ("taxi", "4622"),
    ("cabs", "4622"),
    ("gocatch", "4622"),
    ("didi", "4622"),
    ("mitre", "4231"),
    ("masters", "4231"),
    ("dell", "4252"),
    ("vodafone", "5910"),
    ("tpg", "5910"),
    ("agl", "2610"),
    ("origin energy", "2610"),
    ("aldi", "4110"),
    ("iga", "4110"),
    ("kmart", "4251"),
    ("target", "4251"),
    ("big w", "4251"),
    ("kfc", "5611"),
    ("subway", "5611"),
    ("dominos", "5611"),
    ("nandos", "5611"),
    ("hungry jacks", "5611"),
    ("starbucks", "5613"),
    ("gloria jeans", "5613"),
    ("westpac", "6221"),
    ("anz", "6221"),
    ("nab", "6221"),
    ("commonwealth bank", "6221"),
    ("citibank", "6221"),
    ("officeworks", "4252"),
    ("nrma", "6322"),
    ("aami", "6322"),
    ("allianz", "6322"),
    ("bupa", "6323"),
    ("medibank", "6323"),
    ("hcf", "6323"),
];

/// Descriptor spellings normalized before the known-merchant pass.
const VARIATIONS: &[(&str, &str)] = &[
    ("woolworth", "woolworths"),
    ("commbank", "commonwealth bank"),
    ("cba", "commonwealth bank"),
    ("ofw", "officeworks"),
    ("7eleven", "7 eleven"),
    ("hungryjacks", "hungry jacks"),
    ("dominoes", "dominos"),
    ("vodaphone", "vodafone"),
];

/// Rule-based [`AiClassifier`] needing no network: merchant regex
/// patterns, a bank-noise blacklist, then cleaned-word matching against
/// a known merchant list.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    fn guess_one(tx: &Transaction) -> MerchantGuess {
        let lowered = tx.description.to_lowercase();

        for (pattern, name, code, conf) in specific_patterns() {
            if pattern.is_match(&lowered) {
                return MerchantGuess {
                    id: tx.id.clone(),
                    merchant_name: name.to_string(),
                    industry_code: code.to_string(),
                    confidence: *conf,
                };
            }
        }

        if lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|w| BLACKLIST_WORDS.contains(&w))
        {
            return MerchantGuess {
                id: tx.id.clone(),
                merchant_name: "Non-Deductible Transaction".to_string(),
                industry_code: "9999".to_string(),
                confidence: 100,
            };
        }

        let words = clean_words(&lowered);
        if words.is_empty() {
            return MerchantGuess::unknown(&tx.id);
        }

        if let Some((name, code, conf)) = direct_match(&words) {
            return MerchantGuess {
                id: tx.id.clone(),
                merchant_name: name,
                industry_code: code.to_string(),
                confidence: conf,
            };
        }

        let varied = apply_variations(&words);
        if varied != words {
            if let Some((name, code, _)) = direct_match(&varied) {
                return MerchantGuess {
                    id: tx.id.clone(),
                    merchant_name: name,
                    industry_code: code.to_string(),
                    confidence: 85,
                };
            }
        }

        // Cleaned words look like a merchant but we cannot place the
        // industry; low confidence, unknown code.
        MerchantGuess {
            id: tx.id.clone(),
            merchant_name: title_case(&words[..words.len().min(2)]),
            industry_code: String::new(),
            confidence: 30,
        }
    }
}

#[async_trait]
impl AiClassifier for HeuristicClassifier {
    async fn extract_merchants(
        &self,
        batch: &[Transaction],
    ) -> Result<Vec<MerchantGuess>, AiError> {
        Ok(batch.iter().map(Self::guess_one).collect())
    }
}

fn clean_words(lowered: &str) -> Vec<String> {
    let cleaned = re_star_ref().replace_all(lowered, " ");
    let cleaned = re_prefix().replace(cleaned.trim(), "");
    let cleaned = re_trailing_ref().replace(cleaned.trim_end(), "");
    let cleaned = re_digit_run().replace_all(&cleaned, " ");

    let mut cleaned = cleaned.trim_end().to_string();
    loop {
        let stripped = re_suffix().replace(&cleaned, "").trim_end().to_string();
        if stripped == cleaned {
            break;
        }
        cleaned = stripped;
    }

    cleaned
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn known_code(name: &str) -> Option<&'static str> {
    KNOWN_MERCHANTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, code)| *code)
}

fn direct_match(words: &[String]) -> Option<(String, &'static str, u8)> {
    if words.len() >= 2 {
        let two = format!("{} {}", words[0], words[1]);
        if let Some(code) = known_code(&two) {
            return Some((title_case(&words[..2]), code, 95));
        }
    }
    let first = words.first()?;
    known_code(first).map(|code| (title_case(&words[..1]), code, 90))
}

fn apply_variations(words: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for w in words {
        match VARIATIONS.iter().find(|(from, _)| from == w) {
            Some((_, to)) => out.extend(to.split(' ').map(str::to_string)),
            None => out.push(w.clone()),
        }
    }
    out
}

fn title_case(words: &[String]) -> String {
    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
