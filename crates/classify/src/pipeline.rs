use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use deducto_core::{
    Category, Classification, ClassificationSource, ClassifiedTransaction, Transaction,
};

use crate::ai::{AiClassifier, MerchantGuess};
use crate::extract::extract_keyword;
use crate::industry::IndustryResolver;
use crate::learn::{LearnEntry, LearnQueue, DEFAULT_QUEUE_CAPACITY};
use crate::matcher::{self, ScoredMatch};
use crate::store::{
    KeywordMapping, KeywordStore, MappingStatus, MerchantRecord, MerchantStore,
    NewKeywordMapping, NewMerchant, Provenance,
};

/// Every pipeline knob in one place; nothing reads ambient globals.
#[derive(Debug, Clone)]
pub struct ClassifyThresholds {
    /// Minimum match score for a merchant-store hit.
    pub merchant_min_score: u8,
    /// Minimum match score for a keyword-store hit.
    pub keyword_min_score: u8,
    /// Transactions per AI request.
    pub ai_chunk_size: usize,
    /// Pause between consecutive AI requests (never before the first).
    pub ai_chunk_delay: Duration,
    /// Minimum final confidence before an AI result is learned.
    pub learn_min_confidence: u8,
    /// Learned keyword mappings never start below this confidence.
    pub learned_keyword_floor: u8,
    /// Minimum Levenshtein similarity for a fuzzy match.
    pub fuzzy_floor: f64,
}

impl Default for ClassifyThresholds {
    fn default() -> Self {
        ClassifyThresholds {
            merchant_min_score: 70,
            keyword_min_score: 60,
            ai_chunk_size: 15,
            ai_chunk_delay: Duration::from_millis(250),
            learn_min_confidence: 70,
            learned_keyword_floor: 60,
            fuzzy_floor: 0.7,
        }
    }
}

/// Per-source tallies for one classified batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub skip_rule: usize,
    pub merchant_db: usize,
    pub keyword_db: usize,
    pub ai: usize,
    pub fallback: usize,
    pub deductible: usize,
}

impl BatchSummary {
    pub fn of(results: &[ClassifiedTransaction]) -> Self {
        let mut summary = BatchSummary { total: results.len(), ..Default::default() };
        for r in results {
            match r.classification.source {
                ClassificationSource::SkipRule => summary.skip_rule += 1,
                ClassificationSource::MerchantDb => summary.merchant_db += 1,
                ClassificationSource::KeywordDb => summary.keyword_db += 1,
                ClassificationSource::Ai => summary.ai += 1,
                ClassificationSource::Fallback => summary.fallback += 1,
            }
            if r.classification.is_deductible {
                summary.deductible += 1;
            }
        }
        summary
    }
}

/// Orchestrates: skip rule → merchant store → keyword store → AI →
/// fallback, with asynchronous learning writeback.
///
/// Stage precedence is absolute: once a stage settles a transaction,
/// later stages never see it. Collaborator failures degrade the
/// affected transactions to the fallback shape instead of erroring;
/// `classify_batch` itself is total.
pub struct ClassificationPipeline<K, M, R, A> {
    keywords: Arc<K>,
    merchants: Arc<M>,
    resolver: R,
    ai: A,
    thresholds: ClassifyThresholds,
    learn: LearnQueue,
}

impl<K, M, R, A> ClassificationPipeline<K, M, R, A>
where
    K: KeywordStore + 'static,
    M: MerchantStore + 'static,
    R: IndustryResolver,
    A: AiClassifier,
{
    pub fn new(
        keywords: Arc<K>,
        merchants: Arc<M>,
        resolver: R,
        ai: A,
        thresholds: ClassifyThresholds,
    ) -> Self {
        let learn = LearnQueue::spawn(keywords.clone(), merchants.clone(), DEFAULT_QUEUE_CAPACITY);
        ClassificationPipeline { keywords, merchants, resolver, ai, thresholds, learn }
    }

    /// Wait for queued learning writebacks to land. Call before process
    /// exit; tests use it to observe writeback deterministically.
    pub async fn flush_learning(&self) {
        self.learn.flush().await;
    }

    /// Classify a batch, preserving input order. `enabled` only shapes
    /// the derived business-expense flag, never the classification.
    pub async fn classify_batch(
        &self,
        transactions: Vec<Transaction>,
        enabled: &BTreeSet<Category>,
    ) -> Vec<ClassifiedTransaction> {
        let total = transactions.len();
        let mut slots: Vec<Option<Classification>> = vec![None; total];

        // 1. Skip rule: credits and zero amounts are never deductions.
        for (i, tx) in transactions.iter().enumerate() {
            if !tx.amount.is_negative() {
                slots[i] = Some(Classification::skip());
            }
        }

        let normalized: Vec<String> = transactions
            .iter()
            .map(|tx| matcher::normalize(&tx.description))
            .collect();

        // 2. Merchant store, one bulk call for the whole batch.
        let pending = pending_indexes(&slots);
        if !pending.is_empty() {
            let queries: Vec<String> = pending.iter().map(|&i| normalized[i].clone()).collect();
            match self.merchants.bulk_search(&queries).await {
                Ok(records) => {
                    for &i in &pending {
                        if let Some((hit, record)) = self.best_merchant(&normalized[i], &records) {
                            let resolution = self.resolver.resolve(&record.industry_code);
                            slots[i] = Some(Classification {
                                is_deductible: resolution.is_deductible
                                    && resolution.category.is_some(),
                                category: resolution.category,
                                confidence: hit.score.min(resolution.confidence),
                                source: ClassificationSource::MerchantDb,
                                merchant: Some(record.display_name.clone()),
                            });
                            self.learn.enqueue(LearnEntry::MerchantUsed(record.id));
                        }
                    }
                }
                Err(e) => {
                    warn!("merchant lookup failed, degrading pending transactions: {e}");
                    fill_fallback(&mut slots, &pending);
                }
            }
        }

        // 3. Keyword store over extracted keywords.
        let pending = pending_indexes(&slots);
        let keyword_by_index: HashMap<usize, String> = pending
            .iter()
            .filter_map(|&i| extract_keyword(&transactions[i].description).map(|k| (i, k)))
            .collect();
        if !keyword_by_index.is_empty() {
            let mut distinct: Vec<String> = keyword_by_index.values().cloned().collect();
            distinct.sort();
            distinct.dedup();
            match self.keywords.bulk_search(&distinct).await {
                Ok(mappings) => {
                    for &i in &pending {
                        let hit = keyword_by_index
                            .get(&i)
                            .and_then(|keyword| self.best_keyword(keyword, &mappings));
                        if let Some(mapping) = hit {
                            slots[i] = Some(Classification {
                                is_deductible: mapping.is_deductible,
                                category: mapping.category,
                                confidence: mapping.confidence_level,
                                source: ClassificationSource::KeywordDb,
                                merchant: None,
                            });
                            self.learn.enqueue(LearnEntry::KeywordUsed(mapping.id));
                        }
                    }
                }
                Err(e) => {
                    warn!("keyword lookup failed, degrading pending transactions: {e}");
                    fill_fallback(&mut slots, &pending);
                }
            }
        }

        // 4. AI extraction, sequential chunks with a pause in between.
        let pending = pending_indexes(&slots);
        for (chunk_no, chunk) in pending.chunks(self.thresholds.ai_chunk_size).enumerate() {
            if chunk_no > 0 && !self.thresholds.ai_chunk_delay.is_zero() {
                sleep(self.thresholds.ai_chunk_delay).await;
            }
            let chunk_txs: Vec<Transaction> =
                chunk.iter().map(|&i| transactions[i].clone()).collect();
            debug!(chunk = chunk_no, size = chunk_txs.len(), "AI extraction chunk");
            match self.ai.extract_merchants(&chunk_txs).await {
                Ok(guesses) => {
                    let mut by_id: HashMap<&str, &MerchantGuess> =
                        guesses.iter().map(|g| (g.id.as_str(), g)).collect();
                    for &i in chunk {
                        let guess = match by_id.remove(transactions[i].id.as_str()) {
                            Some(guess) => guess,
                            None => continue,
                        };
                        if guess.is_unknown() {
                            continue;
                        }
                        let resolution = self.resolver.resolve(&guess.industry_code);
                        let classification = Classification {
                            is_deductible: resolution.is_deductible
                                && resolution.category.is_some(),
                            category: resolution.category,
                            confidence: guess.confidence.min(resolution.confidence),
                            source: ClassificationSource::Ai,
                            merchant: Some(guess.merchant_name.clone()),
                        };
                        self.maybe_learn(guess, &classification, keyword_by_index.get(&i));
                        slots[i] = Some(classification);
                    }
                }
                Err(e) => {
                    warn!(chunk = chunk_no, "AI extraction failed, degrading chunk: {e}");
                    fill_fallback(&mut slots, chunk);
                }
            }
        }

        // 5. Fallback for whatever is left, then derive business flags.
        let results: Vec<ClassifiedTransaction> = transactions
            .into_iter()
            .zip(slots)
            .map(|(tx, slot)| {
                let classification = slot.unwrap_or_else(Classification::fallback);
                ClassifiedTransaction::derive(tx, classification, enabled)
            })
            .collect();

        let summary = BatchSummary::of(&results);
        info!(
            total = summary.total,
            merchant_db = summary.merchant_db,
            keyword_db = summary.keyword_db,
            ai = summary.ai,
            fallback = summary.fallback,
            deductible = summary.deductible,
            "batch classified"
        );
        results
    }

    fn best_merchant<'r>(
        &self,
        description: &str,
        records: &'r [MerchantRecord],
    ) -> Option<(ScoredMatch, &'r MerchantRecord)> {
        let mut best: Option<(ScoredMatch, &MerchantRecord)> = None;
        for record in records {
            let hit = match matcher::score_merchant(
                description,
                record,
                self.thresholds.fuzzy_floor,
            ) {
                Some(hit) => hit,
                None => continue,
            };
            if hit.score < self.thresholds.merchant_min_score {
                continue;
            }
            best = match best {
                Some((b, br)) if !wins(hit, record.id, b, br.id) => Some((b, br)),
                _ => Some((hit, record)),
            };
        }
        best
    }

    fn best_keyword<'r>(
        &self,
        keyword: &str,
        mappings: &'r [KeywordMapping],
    ) -> Option<&'r KeywordMapping> {
        let mut best: Option<(ScoredMatch, &KeywordMapping)> = None;
        for mapping in mappings {
            if mapping.status != MappingStatus::Confirmed {
                continue;
            }
            let hit = match matcher::score_candidate(
                keyword,
                &mapping.keyword,
                self.thresholds.fuzzy_floor,
            ) {
                Some(hit) => hit,
                None => continue,
            };
            if hit.score < self.thresholds.keyword_min_score {
                continue;
            }
            best = match best {
                Some((b, bm)) if !wins(hit, mapping.id, b, bm.id) => Some((b, bm)),
                _ => Some((hit, mapping)),
            };
        }
        best.map(|(_, mapping)| mapping)
    }

    /// Learn from a settled AI result: a usable merchant name plus an
    /// industry code becomes a merchant record; otherwise a good
    /// extracted keyword becomes a pending keyword mapping.
    fn maybe_learn(
        &self,
        guess: &MerchantGuess,
        classification: &Classification,
        keyword: Option<&String>,
    ) {
        if classification.confidence < self.thresholds.learn_min_confidence {
            return;
        }

        let key = guess.merchant_name.trim().to_lowercase();
        let usable_name = key.chars().count() >= 3 && key != "unknown";
        if usable_name && !guess.industry_code.trim().is_empty() {
            self.learn.enqueue(LearnEntry::Merchant(NewMerchant {
                name: key.clone(),
                display_name: guess.merchant_name.trim().to_string(),
                industry_code: guess.industry_code.trim().to_string(),
                keywords: vec![key],
                aliases: vec![],
                provenance: Provenance::Ai,
                usage_count: 1,
                confidence: guess.confidence,
            }));
            return;
        }

        if let (Some(keyword), Some(category)) = (keyword, classification.category) {
            self.learn.enqueue(LearnEntry::Keyword(NewKeywordMapping {
                keyword: keyword.clone(),
                category: Some(category),
                is_deductible: classification.is_deductible,
                confidence_level: classification
                    .confidence
                    .max(self.thresholds.learned_keyword_floor),
                status: MappingStatus::Pending,
                provenance: Provenance::Ai,
            }));
        }
    }
}

// Higher score, then earliest-registered record, then kind precedence.
fn wins(a: ScoredMatch, a_id: i64, b: ScoredMatch, b_id: i64) -> bool {
    if a.score != b.score {
        return a.score > b.score;
    }
    if a_id != b_id {
        return a_id < b_id;
    }
    a.kind.rank() > b.kind.rank()
}

fn pending_indexes(slots: &[Option<Classification>]) -> Vec<usize> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_none())
        .map(|(i, _)| i)
        .collect()
}

fn fill_fallback(slots: &mut [Option<Classification>], indexes: &[usize]) {
    for &i in indexes {
        slots[i] = Some(Classification::fallback());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiError, MockClassifier};
    use crate::industry::AnzsicResolver;
    use crate::store::{MemoryKeywordStore, MemoryMerchantStore, StoreError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use deducto_core::{Money, ALL_CATEGORIES};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    fn tx(id: &str, description: &str, cents: i64) -> Transaction {
        Transaction::new(id, date(), description, Money::from_cents(cents))
    }

    fn all_enabled() -> BTreeSet<Category> {
        ALL_CATEGORIES.iter().copied().collect()
    }

    fn quick_thresholds() -> ClassifyThresholds {
        ClassifyThresholds { ai_chunk_delay: Duration::ZERO, ..Default::default() }
    }

    fn keyword_seed(keyword: &str, category: Category, confidence: u8) -> NewKeywordMapping {
        NewKeywordMapping {
            keyword: keyword.to_string(),
            category: Some(category),
            is_deductible: true,
            confidence_level: confidence,
            status: MappingStatus::Confirmed,
            provenance: Provenance::Seed,
        }
    }

    fn merchant_seed(name: &str, code: &str) -> NewMerchant {
        NewMerchant {
            name: name.to_string(),
            display_name: name.to_string(),
            industry_code: code.to_string(),
            keywords: vec![name.to_string()],
            aliases: vec![],
            provenance: Provenance::Seed,
            usage_count: 0,
            confidence: 95,
        }
    }

    fn guess(id: &str, name: &str, code: &str, confidence: u8) -> MerchantGuess {
        MerchantGuess {
            id: id.to_string(),
            merchant_name: name.to_string(),
            industry_code: code.to_string(),
            confidence,
        }
    }

    struct FailingMerchantStore;

    #[async_trait]
    impl MerchantStore for FailingMerchantStore {
        async fn bulk_search(&self, _: &[String]) -> Result<Vec<MerchantRecord>, StoreError> {
            Err(StoreError::Backend("connection lost".to_string()))
        }
        async fn create(&self, _: NewMerchant) -> Result<MerchantRecord, StoreError> {
            Err(StoreError::Backend("connection lost".to_string()))
        }
        async fn increment_usage(&self, _: i64) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection lost".to_string()))
        }
        async fn stats(&self) -> Result<crate::store::MerchantStoreStats, StoreError> {
            Err(StoreError::Backend("connection lost".to_string()))
        }
    }

    struct CountingAi {
        batches: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl AiClassifier for CountingAi {
        async fn extract_merchants(
            &self,
            batch: &[Transaction],
        ) -> Result<Vec<MerchantGuess>, AiError> {
            self.batches.lock().unwrap().push(batch.len());
            Ok(batch.iter().map(|tx| MerchantGuess::unknown(&tx.id)).collect())
        }
    }

    /// Fails the first call, answers the rest.
    struct FlakyAi {
        tripped: AtomicBool,
        replies: Vec<MerchantGuess>,
    }

    #[async_trait]
    impl AiClassifier for FlakyAi {
        async fn extract_merchants(
            &self,
            batch: &[Transaction],
        ) -> Result<Vec<MerchantGuess>, AiError> {
            if !self.tripped.swap(true, Ordering::SeqCst) {
                return Err(AiError::Backend("transient".to_string()));
            }
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

    fn pipeline_with<A: AiClassifier>(
        keywords: Arc<MemoryKeywordStore>,
        merchants: Arc<MemoryMerchantStore>,
        ai: A,
    ) -> ClassificationPipeline<MemoryKeywordStore, MemoryMerchantStore, AnzsicResolver, A> {
        ClassificationPipeline::new(keywords, merchants, AnzsicResolver, ai, quick_thresholds())
    }

    #[tokio::test]
    async fn skip_rule_claims_credits_and_zero_amounts() {
        let pipeline = pipeline_with(
            Arc::new(MemoryKeywordStore::new()),
            Arc::new(MemoryMerchantStore::new()),
            MockClassifier::default(),
        );
        let results = pipeline
            .classify_batch(
                vec![tx("a", "SALARY PAYMENT", 520_000), tx("b", "ROUNDING", 0)],
                &all_enabled(),
            )
            .await;

        for r in &results {
            assert_eq!(r.classification.source, ClassificationSource::SkipRule);
            assert_eq!(r.classification.confidence, 100);
            assert!(!r.classification.is_deductible);
            assert!(!r.is_business_expense);
        }
    }

    #[tokio::test]
    async fn uber_trip_resolves_from_keyword_store() {
        let keywords = Arc::new(MemoryKeywordStore::with_mappings(vec![keyword_seed(
            "uber",
            Category::VehiclesTravelTransport,
            90,
        )]));
        let pipeline = pipeline_with(
            keywords,
            Arc::new(MemoryMerchantStore::new()),
            MockClassifier::default(),
        );

        let results = pipeline
            .classify_batch(vec![tx("t1", "UBER *TRIP HELP.UBER.COM", -2480)], &all_enabled())
            .await;

        let c = &results[0].classification;
        assert!(c.is_deductible);
        assert_eq!(c.category, Some(Category::VehiclesTravelTransport));
        assert_eq!(c.confidence, 90);
        assert_eq!(c.source, ClassificationSource::KeywordDb);
        assert!(results[0].is_business_expense);
        assert_eq!(results[0].deduction_amount, Money::from_cents(2480));
    }

    #[tokio::test]
    async fn merchant_hit_beats_stronger_keyword_hit() {
        let keywords = Arc::new(MemoryKeywordStore::with_mappings(vec![keyword_seed(
            "bunnings",
            Category::WorkToolsEquipment,
            95,
        )]));
        let merchants = Arc::new(MemoryMerchantStore::with_merchants(vec![merchant_seed(
            "bunnings", "4231",
        )]));
        let pipeline = pipeline_with(keywords, merchants, MockClassifier::default());

        let results = pipeline
            .classify_batch(vec![tx("t1", "BUNNINGS 302000 ALEXANDRIA", -8925)], &all_enabled())
            .await;

        let c = &results[0].classification;
        // Containment scores 80, capped by the industry confidence 85.
        assert_eq!(c.source, ClassificationSource::MerchantDb);
        assert_eq!(c.confidence, 80);
        assert_eq!(c.category, Some(Category::WorkToolsEquipment));
    }

    #[tokio::test]
    async fn ai_result_is_learned_and_reused() {
        let keywords = Arc::new(MemoryKeywordStore::new());
        let merchants = Arc::new(MemoryMerchantStore::new());
        let pipeline = pipeline_with(
            keywords.clone(),
            merchants.clone(),
            MockClassifier::new(vec![guess("t1", "Acme Tools", "4231", 75)]),
        );

        let first = pipeline
            .classify_batch(vec![tx("t1", "ACME TOOLS PTY LTD", -15000)], &all_enabled())
            .await;
        let c = &first[0].classification;
        assert_eq!(c.source, ClassificationSource::Ai);
        assert_eq!(c.confidence, 75); // min(ai 75, industry 85)
        assert_eq!(c.category, Some(Category::WorkToolsEquipment));
        assert_eq!(c.merchant.as_deref(), Some("Acme Tools"));

        pipeline.flush_learning().await;
        let learned = merchants.snapshot();
        assert_eq!(learned.len(), 1);
        assert_eq!(learned[0].name, "acme tools");
        assert_eq!(learned[0].display_name, "Acme Tools");
        assert_eq!(learned[0].industry_code, "4231");
        assert_eq!(learned[0].provenance, Provenance::Ai);
        assert_eq!(learned[0].usage_count, 1);

        // Second run hits the merchant store, no AI involved.
        let second = pipeline
            .classify_batch(vec![tx("t2", "ACME TOOLS PTY LTD", -4200)], &all_enabled())
            .await;
        assert_eq!(second[0].classification.source, ClassificationSource::MerchantDb);
        assert_eq!(second[0].classification.confidence, 80);
    }

    #[tokio::test]
    async fn ai_requests_are_chunked() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let pipeline = pipeline_with(
            Arc::new(MemoryKeywordStore::new()),
            Arc::new(MemoryMerchantStore::new()),
            CountingAi { batches: batches.clone() },
        );

        let txs: Vec<Transaction> = (0..20)
            .map(|i| tx(&format!("t{i}"), &format!("MYSTERY MERCHANT {i}"), -1000))
            .collect();
        pipeline.classify_batch(txs, &all_enabled()).await;

        assert_eq!(*batches.lock().unwrap(), vec![15, 5]);
    }

    #[tokio::test]
    async fn ai_failure_degrades_only_the_failed_chunk() {
        let pipeline = pipeline_with(
            Arc::new(MemoryKeywordStore::new()),
            Arc::new(MemoryMerchantStore::new()),
            FlakyAi {
                tripped: AtomicBool::new(false),
                replies: vec![guess("t15", "Shell", "4613", 90)],
            },
        );

        let txs: Vec<Transaction> = (0..16)
            .map(|i| tx(&format!("t{i}"), &format!("MYSTERY MERCHANT {i}"), -1000))
            .collect();
        let results = pipeline.classify_batch(txs, &all_enabled()).await;

        for r in &results[..15] {
            assert_eq!(r.classification.source, ClassificationSource::Fallback);
            assert_eq!(r.classification.confidence, 0);
        }
        let last = &results[15].classification;
        assert_eq!(last.source, ClassificationSource::Ai);
        assert_eq!(last.confidence, 90); // min(ai 90, fuel 95)
    }

    #[tokio::test]
    async fn merchant_store_failure_degrades_all_pending() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let pipeline = ClassificationPipeline::new(
            Arc::new(MemoryKeywordStore::new()),
            Arc::new(FailingMerchantStore),
            AnzsicResolver,
            CountingAi { batches: batches.clone() },
            quick_thresholds(),
        );

        let results = pipeline
            .classify_batch(
                vec![tx("a", "SHELL COLES EXPRESS", -4000), tx("b", "SALARY", 100_000)],
                &all_enabled(),
            )
            .await;

        assert_eq!(results[0].classification.source, ClassificationSource::Fallback);
        assert_eq!(results[0].classification.confidence, 0);
        assert_eq!(results[1].classification.source, ClassificationSource::SkipRule);
        // Nothing was left for the AI stage.
        assert!(batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn results_preserve_input_order() {
        let keywords = Arc::new(MemoryKeywordStore::with_mappings(vec![keyword_seed(
            "uber",
            Category::VehiclesTravelTransport,
            90,
        )]));
        let pipeline = pipeline_with(
            keywords,
            Arc::new(MemoryMerchantStore::new()),
            MockClassifier::default(),
        );

        let results = pipeline
            .classify_batch(
                vec![
                    tx("first", "SALARY", 100_000),
                    tx("second", "UBER TRIP", -2000),
                    tx("third", "TOTAL MYSTERY", -500),
                ],
                &all_enabled(),
            )
            .await;

        let ids: Vec<&str> = results.iter().map(|r| r.transaction.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
        assert_eq!(results[0].classification.source, ClassificationSource::SkipRule);
        assert_eq!(results[1].classification.source, ClassificationSource::KeywordDb);
        assert_eq!(results[2].classification.source, ClassificationSource::Fallback);
    }

    #[tokio::test]
    async fn classification_is_repeatable() {
        let keywords = Arc::new(MemoryKeywordStore::with_mappings(vec![keyword_seed(
            "telstra",
            Category::HomeOffice,
            85,
        )]));
        let pipeline = pipeline_with(
            keywords,
            Arc::new(MemoryMerchantStore::new()),
            MockClassifier::default(),
        );

        let batch = vec![tx("t1", "TELSTRA BILL 04411", -11000), tx("t2", "SALARY", 250_000)];
        let first = pipeline.classify_batch(batch.clone(), &all_enabled()).await;
        let second = pipeline.classify_batch(batch, &all_enabled()).await;

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.classification.source, b.classification.source);
            assert_eq!(a.classification.confidence, b.classification.confidence);
            assert_eq!(a.classification.category, b.classification.category);
            assert_eq!(a.classification.is_deductible, b.classification.is_deductible);
        }
    }

    #[tokio::test]
    async fn unknown_industry_code_surfaces_as_zero_confidence_ai() {
        let pipeline = pipeline_with(
            Arc::new(MemoryKeywordStore::new()),
            Arc::new(MemoryMerchantStore::new()),
            MockClassifier::new(vec![guess("t1", "Mystery Holdings", "7777", 88)]),
        );

        let results = pipeline
            .classify_batch(vec![tx("t1", "MYSTERY HOLDINGS", -3000)], &all_enabled())
            .await;

        let c = &results[0].classification;
        assert_eq!(c.source, ClassificationSource::Ai);
        assert_eq!(c.confidence, 0);
        assert_eq!(c.category, None);
        assert!(!c.is_deductible);
    }

    #[tokio::test]
    async fn short_merchant_name_learns_a_keyword_instead() {
        let keywords = Arc::new(MemoryKeywordStore::new());
        let pipeline = pipeline_with(
            keywords.clone(),
            Arc::new(MemoryMerchantStore::new()),
            MockClassifier::new(vec![guess("t1", "BP", "4613", 90)]),
        );

        let results = pipeline
            .classify_batch(vec![tx("t1", "BP CONNECT MASCOT", -5500)], &all_enabled())
            .await;
        assert_eq!(results[0].classification.confidence, 90); // min(ai 90, fuel 95)

        pipeline.flush_learning().await;
        let learned = keywords.snapshot();
        assert_eq!(learned.len(), 1);
        assert_eq!(learned[0].keyword, "connect");
        assert_eq!(learned[0].category, Some(Category::VehiclesTravelTransport));
        assert_eq!(learned[0].status, MappingStatus::Pending);
        assert_eq!(learned[0].provenance, Provenance::Ai);
    }

    #[tokio::test]
    async fn enabled_categories_gate_the_business_flag_only() {
        let keywords = Arc::new(MemoryKeywordStore::with_mappings(vec![keyword_seed(
            "uber",
            Category::VehiclesTravelTransport,
            90,
        )]));
        let pipeline = pipeline_with(
            keywords,
            Arc::new(MemoryMerchantStore::new()),
            MockClassifier::default(),
        );

        let batch = vec![tx("t1", "UBER TRIP", -2000)];
        let all = pipeline.classify_batch(batch.clone(), &all_enabled()).await;
        let none = pipeline.classify_batch(batch, &BTreeSet::new()).await;

        assert!(all[0].is_business_expense);
        assert!(!none[0].is_business_expense);
        assert_eq!(all[0].classification.confidence, none[0].classification.confidence);
        assert_eq!(all[0].classification.source, none[0].classification.source);
    }

    #[tokio::test]
    async fn pending_mappings_never_classify() {
        let keywords = Arc::new(MemoryKeywordStore::with_mappings(vec![NewKeywordMapping {
            keyword: "uber".to_string(),
            category: Some(Category::VehiclesTravelTransport),
            is_deductible: true,
            confidence_level: 90,
            status: MappingStatus::Pending,
            provenance: Provenance::Ai,
        }]));
        let pipeline = pipeline_with(
            keywords,
            Arc::new(MemoryMerchantStore::new()),
            MockClassifier::default(),
        );

        let results = pipeline
            .classify_batch(vec![tx("t1", "UBER TRIP", -2000)], &all_enabled())
            .await;
        assert_eq!(results[0].classification.source, ClassificationSource::Fallback);
    }
}
