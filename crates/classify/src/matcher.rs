use serde::{Deserialize, Serialize};

use crate::store::MerchantRecord;

/// How a query matched a stored record. Ordering of variants is the
/// tie-break precedence for equal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    Exact,
    Alias,
    Keyword,
    Fuzzy,
}

impl MatchKind {
    pub(crate) fn rank(self) -> u8 {
        match self {
            MatchKind::Exact => 3,
            MatchKind::Alias => 2,
            MatchKind::Keyword => 1,
            MatchKind::Fuzzy => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredMatch {
    pub score: u8,
    pub kind: MatchKind,
}

impl ScoredMatch {
    pub fn new(score: u8, kind: MatchKind) -> Self {
        ScoredMatch { score, kind }
    }
}

pub const EXACT_SCORE: u8 = 100;
pub const ALIAS_SCORE: u8 = 90;
pub const CONTAINS_SCORE: u8 = 80;

/// Lowercase + trim; both sides of every comparison go through this.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Standard two-row Levenshtein.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Similarity in [0, 1]: 1 - distance / max_len.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

/// Score a single normalized candidate string against a normalized
/// query: equality, containment either way, then fuzzy above the floor.
pub fn score_candidate(query: &str, candidate: &str, fuzzy_floor: f64) -> Option<ScoredMatch> {
    if query.is_empty() || candidate.is_empty() {
        return None;
    }
    if query == candidate {
        return Some(ScoredMatch::new(EXACT_SCORE, MatchKind::Exact));
    }
    if query.contains(candidate) || candidate.contains(query) {
        return Some(ScoredMatch::new(CONTAINS_SCORE, MatchKind::Keyword));
    }
    let s = similarity(query, candidate);
    if s >= fuzzy_floor {
        return Some(ScoredMatch::new((s * 100.0).round() as u8, MatchKind::Fuzzy));
    }
    None
}

/// Score a merchant record against a normalized transaction description.
/// Name gets the full ladder, aliases match on equality, keywords on
/// containment in the description.
pub fn score_merchant(
    description: &str,
    record: &MerchantRecord,
    fuzzy_floor: f64,
) -> Option<ScoredMatch> {
    let mut best: Option<ScoredMatch> = None;

    if let Some(m) = score_candidate(description, &normalize(&record.name), fuzzy_floor) {
        best = keep_better(best, m);
    }
    for alias in &record.aliases {
        let alias = normalize(alias);
        if alias.is_empty() {
            continue;
        }
        if description == alias {
            best = keep_better(best, ScoredMatch::new(ALIAS_SCORE, MatchKind::Alias));
        } else if description.contains(&alias) {
            best = keep_better(best, ScoredMatch::new(CONTAINS_SCORE, MatchKind::Keyword));
        }
    }
    for keyword in &record.keywords {
        let keyword = normalize(keyword);
        if !keyword.is_empty() && description.contains(&keyword) {
            best = keep_better(best, ScoredMatch::new(CONTAINS_SCORE, MatchKind::Keyword));
        }
    }

    best
}

fn keep_better(best: Option<ScoredMatch>, candidate: ScoredMatch) -> Option<ScoredMatch> {
    match best {
        None => Some(candidate),
        Some(b) => {
            if candidate.score > b.score
                || (candidate.score == b.score && candidate.kind.rank() > b.kind.rank())
            {
                Some(candidate)
            } else {
                Some(b)
            }
        }
    }
}

/// Whether a stored keyword is worth scoring against a query at all.
/// Mirrors the SQL prefilter used by the persistent stores.
pub fn is_candidate(query: &str, keyword: &str) -> bool {
    if query.is_empty() || keyword.is_empty() {
        return false;
    }
    query == keyword
        || query.contains(keyword)
        || keyword.contains(query)
        || first_two(query) == first_two(keyword)
}

fn first_two(s: &str) -> String {
    s.chars().take(2).collect()
}
