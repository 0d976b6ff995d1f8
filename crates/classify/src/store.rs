use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

use deducto_core::Category;

use crate::matcher;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("record not found: {0}")]
    NotFound(i64),
}

/// Review state of a keyword mapping. Only confirmed mappings classify;
/// pending ones wait for review, rejected ones are kept as tombstones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingStatus {
    Confirmed,
    Pending,
    Rejected,
}

impl MappingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingStatus::Confirmed => "confirmed",
            MappingStatus::Pending => "pending",
            MappingStatus::Rejected => "rejected",
        }
    }

    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "confirmed" => Some(MappingStatus::Confirmed),
            "pending" => Some(MappingStatus::Pending),
            "rejected" => Some(MappingStatus::Rejected),
            _ => None,
        }
    }
}

/// Where a stored record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    Seed,
    Ai,
    User,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Seed => "seed",
            Provenance::Ai => "ai",
            Provenance::User => "user",
        }
    }

    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "seed" => Some(Provenance::Seed),
            "ai" => Some(Provenance::Ai),
            "user" => Some(Provenance::User),
            _ => None,
        }
    }
}

// ── Keyword mappings ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordMapping {
    pub id: i64,
    pub keyword: String,
    pub category: Option<Category>,
    pub is_deductible: bool,
    pub confidence_level: u8,
    pub status: MappingStatus,
    pub provenance: Provenance,
    pub usage_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKeywordMapping {
    pub keyword: String,
    pub category: Option<Category>,
    pub is_deductible: bool,
    pub confidence_level: u8,
    pub status: MappingStatus,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordStoreStats {
    pub total: i64,
    pub confirmed: i64,
    pub pending: i64,
}

#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// All mappings relevant to any of the queried keywords. May
    /// overshoot; scoring happens at the call site.
    async fn bulk_search(&self, keywords: &[String]) -> Result<Vec<KeywordMapping>, StoreError>;

    /// Insert a new mapping. Keywords are unique; inserting an existing
    /// one fails with [`StoreError::Duplicate`].
    async fn create(&self, mapping: NewKeywordMapping) -> Result<KeywordMapping, StoreError>;

    async fn increment_usage(&self, id: i64) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<KeywordStoreStats, StoreError>;
}

// ── Merchants ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantRecord {
    pub id: i64,
    /// Normalized lowercase key, unique.
    pub name: String,
    pub display_name: String,
    pub industry_code: String,
    pub keywords: Vec<String>,
    pub aliases: Vec<String>,
    pub provenance: Provenance,
    pub usage_count: i64,
    pub confidence: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMerchant {
    pub name: String,
    pub display_name: String,
    pub industry_code: String,
    pub keywords: Vec<String>,
    pub aliases: Vec<String>,
    pub provenance: Provenance,
    pub usage_count: i64,
    pub confidence: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MerchantStoreStats {
    pub total: i64,
    /// Industry code -> record count, highest first.
    pub by_industry: Vec<(String, i64)>,
}

#[async_trait]
pub trait MerchantStore: Send + Sync {
    /// Candidate records for the queried (normalized) descriptions. May
    /// overshoot; scoring happens at the call site.
    async fn bulk_search(&self, queries: &[String]) -> Result<Vec<MerchantRecord>, StoreError>;

    /// Insert a new merchant. Names are unique; inserting an existing
    /// one fails with [`StoreError::Duplicate`].
    async fn create(&self, merchant: NewMerchant) -> Result<MerchantRecord, StoreError>;

    async fn increment_usage(&self, id: i64) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<MerchantStoreStats, StoreError>;
}

// ── In-memory stores (tests and offline runs) ────────────────────────────────

/// Vec-backed [`KeywordStore`] with the same visible behavior as the
/// persistent one.
#[derive(Default)]
pub struct MemoryKeywordStore {
    rows: Mutex<Vec<KeywordMapping>>,
}

impl MemoryKeywordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mappings(mappings: Vec<NewKeywordMapping>) -> Self {
        let rows = mappings
            .into_iter()
            .enumerate()
            .map(|(i, m)| KeywordMapping {
                id: i as i64 + 1,
                keyword: matcher::normalize(&m.keyword),
                category: m.category,
                is_deductible: m.is_deductible,
                confidence_level: m.confidence_level,
                status: m.status,
                provenance: m.provenance,
                usage_count: 0,
            })
            .collect();
        Self { rows: Mutex::new(rows) }
    }

    pub fn snapshot(&self) -> Vec<KeywordMapping> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeywordStore for MemoryKeywordStore {
    async fn bulk_search(&self, keywords: &[String]) -> Result<Vec<KeywordMapping>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|m| keywords.iter().any(|q| matcher::is_candidate(q, &m.keyword)))
            .cloned()
            .collect())
    }

    async fn create(&self, mapping: NewKeywordMapping) -> Result<KeywordMapping, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let keyword = matcher::normalize(&mapping.keyword);
        if rows.iter().any(|m| m.keyword == keyword) {
            return Err(StoreError::Duplicate(keyword));
        }
        let created = KeywordMapping {
            id: rows.iter().map(|m| m.id).max().unwrap_or(0) + 1,
            keyword,
            category: mapping.category,
            is_deductible: mapping.is_deductible,
            confidence_level: mapping.confidence_level,
            status: mapping.status,
            provenance: mapping.provenance,
            usage_count: 0,
        };
        rows.push(created.clone());
        Ok(created)
    }

    async fn increment_usage(&self, id: i64) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|m| m.id == id) {
            Some(m) => {
                m.usage_count += 1;
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn stats(&self) -> Result<KeywordStoreStats, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(KeywordStoreStats {
            total: rows.len() as i64,
            confirmed: rows.iter().filter(|m| m.status == MappingStatus::Confirmed).count() as i64,
            pending: rows.iter().filter(|m| m.status == MappingStatus::Pending).count() as i64,
        })
    }
}

/// Vec-backed [`MerchantStore`].
#[derive(Default)]
pub struct MemoryMerchantStore {
    rows: Mutex<Vec<MerchantRecord>>,
}

impl MemoryMerchantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merchants(merchants: Vec<NewMerchant>) -> Self {
        let store = Self::default();
        {
            let mut rows = store.rows.lock().unwrap();
            for (i, m) in merchants.into_iter().enumerate() {
                rows.push(MerchantRecord {
                    id: i as i64 + 1,
                    name: matcher::normalize(&m.name),
                    display_name: m.display_name,
                    industry_code: m.industry_code,
                    keywords: m.keywords,
                    aliases: m.aliases,
                    provenance: m.provenance,
                    usage_count: m.usage_count,
                    confidence: m.confidence,
                });
            }
        }
        store
    }

    pub fn snapshot(&self) -> Vec<MerchantRecord> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl MerchantStore for MemoryMerchantStore {
    async fn bulk_search(&self, _queries: &[String]) -> Result<Vec<MerchantRecord>, StoreError> {
        // The merchant table is small and shared by the whole batch.
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn create(&self, merchant: NewMerchant) -> Result<MerchantRecord, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let name = matcher::normalize(&merchant.name);
        if rows.iter().any(|m| m.name == name) {
            return Err(StoreError::Duplicate(name));
        }
        let created = MerchantRecord {
            id: rows.iter().map(|m| m.id).max().unwrap_or(0) + 1,
            name,
            display_name: merchant.display_name,
            industry_code: merchant.industry_code,
            keywords: merchant.keywords,
            aliases: merchant.aliases,
            provenance: merchant.provenance,
            usage_count: merchant.usage_count,
            confidence: merchant.confidence,
        };
        rows.push(created.clone());
        Ok(created)
    }

    async fn increment_usage(&self, id: i64) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|m| m.id == id) {
            Some(m) => {
                m.usage_count += 1;
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn stats(&self) -> Result<MerchantStoreStats, StoreError> {
        let rows = self.rows.lock().unwrap();
        let mut counts = std::collections::BTreeMap::<String, i64>::new();
        for m in rows.iter() {
            *counts.entry(m.industry_code.clone()).or_default() += 1;
        }
        let mut by_industry: Vec<(String, i64)> = counts.into_iter().collect();
        by_industry.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(MerchantStoreStats { total: rows.len() as i64, by_industry })
    }
}
