use async_trait::async_trait;

use deducto_classify::matcher;
use deducto_classify::store::{
    KeywordMapping, KeywordStore, KeywordStoreStats, MappingStatus, MerchantRecord, MerchantStore,
    MerchantStoreStats, NewKeywordMapping, NewMerchant, Provenance, StoreError,
};
use deducto_core::Category;

use crate::db::DbPool;

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn insert_error(key: &str, e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(key.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

// ── Keyword store ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SqliteKeywordStore {
    pool: DbPool,
}

impl SqliteKeywordStore {
    pub fn new(pool: DbPool) -> Self {
        SqliteKeywordStore { pool }
    }
}

type KeywordRow = (i64, String, Option<String>, bool, i64, String, String, i64);

fn keyword_from_row(row: KeywordRow) -> KeywordMapping {
    KeywordMapping {
        id: row.0,
        keyword: row.1,
        category: row.2.as_deref().and_then(Category::from_text),
        is_deductible: row.3,
        confidence_level: row.4.clamp(0, 100) as u8,
        status: MappingStatus::from_text(&row.5).unwrap_or(MappingStatus::Pending),
        provenance: Provenance::from_text(&row.6).unwrap_or(Provenance::Seed),
        usage_count: row.7,
    }
}

#[async_trait]
impl KeywordStore for SqliteKeywordStore {
    async fn bulk_search(&self, keywords: &[String]) -> Result<Vec<KeywordMapping>, StoreError> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        // One round trip for the whole batch: the queries travel as a
        // JSON array and fan out through json_each. The predicate is a
        // recall prefilter; precise scoring happens at the call site.
        let needles =
            serde_json::to_string(keywords).map_err(|e| StoreError::Backend(e.to_string()))?;
        let rows = sqlx::query_as::<_, KeywordRow>(
            r#"
            SELECT DISTINCT m.id, m.keyword, m.category, m.is_deductible, m.confidence_level,
                   m.status, m.provenance, m.usage_count
            FROM keyword_mappings m, json_each(?1) q
            WHERE m.keyword = q.value
               OR instr(q.value, m.keyword) > 0
               OR instr(m.keyword, q.value) > 0
               OR substr(m.keyword, 1, 2) = substr(q.value, 1, 2)
            "#,
        )
        .bind(needles)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(keyword_from_row).collect())
    }

    async fn create(&self, mapping: NewKeywordMapping) -> Result<KeywordMapping, StoreError> {
        let keyword = matcher::normalize(&mapping.keyword);
        let result = sqlx::query(
            "INSERT INTO keyword_mappings (keyword, category, is_deductible, confidence_level, status, provenance, usage_count) VALUES (?, ?, ?, ?, ?, ?, 0)"
        )
        .bind(&keyword)
        .bind(mapping.category.map(|c| c.as_str()))
        .bind(mapping.is_deductible)
        .bind(mapping.confidence_level)
        .bind(mapping.status.as_str())
        .bind(mapping.provenance.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(&keyword, e))?;

        Ok(KeywordMapping {
            id: result.last_insert_rowid(),
            keyword,
            category: mapping.category,
            is_deductible: mapping.is_deductible,
            confidence_level: mapping.confidence_level,
            status: mapping.status,
            provenance: mapping.provenance,
            usage_count: 0,
        })
    }

    async fn increment_usage(&self, id: i64) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE keyword_mappings SET usage_count = usage_count + 1 WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<KeywordStoreStats, StoreError> {
        let row = sqlx::query_as::<_, (i64, Option<i64>, Option<i64>)>(
            "SELECT COUNT(*), SUM(status = 'confirmed'), SUM(status = 'pending') FROM keyword_mappings"
        )
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(KeywordStoreStats {
            total: row.0,
            confirmed: row.1.unwrap_or(0),
            pending: row.2.unwrap_or(0),
        })
    }
}

// ── Merchant store ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SqliteMerchantStore {
    pool: DbPool,
}

impl SqliteMerchantStore {
    pub fn new(pool: DbPool) -> Self {
        SqliteMerchantStore { pool }
    }
}

type MerchantRow = (i64, String, String, String, String, String, String, i64, i64);

fn merchant_from_row(row: MerchantRow) -> MerchantRecord {
    MerchantRecord {
        id: row.0,
        name: row.1,
        display_name: row.2,
        industry_code: row.3,
        keywords: serde_json::from_str(&row.4).unwrap_or_default(),
        aliases: serde_json::from_str(&row.5).unwrap_or_default(),
        provenance: Provenance::from_text(&row.6).unwrap_or(Provenance::Seed),
        usage_count: row.7,
        confidence: row.8.clamp(0, 100) as u8,
    }
}

#[async_trait]
impl MerchantStore for SqliteMerchantStore {
    async fn bulk_search(&self, queries: &[String]) -> Result<Vec<MerchantRecord>, StoreError> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let needles =
            serde_json::to_string(queries).map_err(|e| StoreError::Backend(e.to_string()))?;
        let rows = sqlx::query_as::<_, MerchantRow>(
            r#"
            SELECT DISTINCT m.id, m.name, m.display_name, m.industry_code, m.keywords,
                   m.aliases, m.provenance, m.usage_count, m.confidence
            FROM merchants m, json_each(?1) q
            WHERE m.name = q.value
               OR instr(q.value, m.name) > 0
               OR instr(m.name, q.value) > 0
               OR substr(m.name, 1, 2) = substr(q.value, 1, 2)
               OR EXISTS (SELECT 1 FROM json_each(m.aliases) a
                          WHERE a.value = q.value OR instr(q.value, a.value) > 0)
               OR EXISTS (SELECT 1 FROM json_each(m.keywords) k
                          WHERE instr(q.value, k.value) > 0)
            "#,
        )
        .bind(needles)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(merchant_from_row).collect())
    }

    async fn create(&self, merchant: NewMerchant) -> Result<MerchantRecord, StoreError> {
        let name = matcher::normalize(&merchant.name);
        let keywords = serde_json::to_string(&merchant.keywords)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let aliases = serde_json::to_string(&merchant.aliases)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let result = sqlx::query(
            "INSERT INTO merchants (name, display_name, industry_code, keywords, aliases, provenance, usage_count, confidence) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&name)
        .bind(&merchant.display_name)
        .bind(&merchant.industry_code)
        .bind(keywords)
        .bind(aliases)
        .bind(merchant.provenance.as_str())
        .bind(merchant.usage_count)
        .bind(merchant.confidence)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(&name, e))?;

        Ok(MerchantRecord {
            id: result.last_insert_rowid(),
            name,
            display_name: merchant.display_name,
            industry_code: merchant.industry_code,
            keywords: merchant.keywords,
            aliases: merchant.aliases,
            provenance: merchant.provenance,
            usage_count: merchant.usage_count,
            confidence: merchant.confidence,
        })
    }

    async fn increment_usage(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE merchants SET usage_count = usage_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<MerchantStoreStats, StoreError> {
        let (total,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM merchants")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let by_industry = sqlx::query_as::<_, (String, i64)>(
            "SELECT industry_code, COUNT(*) AS n FROM merchants GROUP BY industry_code ORDER BY n DESC, industry_code ASC"
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(MerchantStoreStats { total, by_industry })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_db, seed_reference_data};
    use deducto_classify::ai::MockClassifier;
    use deducto_classify::industry::AnzsicResolver;
    use deducto_classify::pipeline::{ClassificationPipeline, ClassifyThresholds};
    use deducto_core::{Category, ClassificationSource, Money, Transaction, ALL_CATEGORIES};
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn test_pool() -> (TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_db(&dir.path().join("test.db")).await.unwrap();
        (dir, pool)
    }

    fn new_mapping(keyword: &str) -> NewKeywordMapping {
        NewKeywordMapping {
            keyword: keyword.to_string(),
            category: Some(Category::VehiclesTravelTransport),
            is_deductible: true,
            confidence_level: 90,
            status: MappingStatus::Confirmed,
            provenance: Provenance::Seed,
        }
    }

    fn new_merchant(name: &str, code: &str) -> NewMerchant {
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

    #[tokio::test]
    async fn keyword_create_and_search() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteKeywordStore::new(pool);

        let created = store.create(new_mapping("uber")).await.unwrap();
        assert!(created.id > 0);

        let hits = store
            .bulk_search(&["uber trip help".to_string()])
            .await
            .unwrap();
        assert!(hits.iter().any(|m| m.keyword == "uber"));
        assert_eq!(hits[0].category, Some(Category::VehiclesTravelTransport));
        assert_eq!(hits[0].status, MappingStatus::Confirmed);

        let misses = store.bulk_search(&["zzz".to_string()]).await.unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn keyword_duplicates_are_rejected_case_insensitively() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteKeywordStore::new(pool);

        store.create(new_mapping("uber")).await.unwrap();
        let err = store.create(new_mapping("  UBER ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(k) if k == "uber"));
    }

    #[tokio::test]
    async fn keyword_usage_and_missing_id() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteKeywordStore::new(pool);

        let created = store.create(new_mapping("fuel")).await.unwrap();
        store.increment_usage(created.id).await.unwrap();
        store.increment_usage(created.id).await.unwrap();

        let hits = store.bulk_search(&["fuel".to_string()]).await.unwrap();
        assert_eq!(hits[0].usage_count, 2);

        let err = store.increment_usage(9_999).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(9_999)));
    }

    #[tokio::test]
    async fn keyword_stats_count_by_status() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteKeywordStore::new(pool);

        store.create(new_mapping("uber")).await.unwrap();
        store.create(new_mapping("taxi")).await.unwrap();
        let mut pending = new_mapping("mascot");
        pending.status = MappingStatus::Pending;
        store.create(pending).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.confirmed, 2);
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn merchant_json_fields_round_trip() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteMerchantStore::new(pool);

        let mut m = new_merchant("commonwealth bank", "6221");
        m.aliases = vec!["commbank".to_string(), "cba".to_string()];
        store.create(m).await.unwrap();

        // Found through the alias, not the name.
        let hits = store
            .bulk_search(&["cba card payment".to_string()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "commonwealth bank");
        assert_eq!(hits[0].aliases, vec!["commbank", "cba"]);
        assert_eq!(hits[0].keywords, vec!["commonwealth bank"]);
    }

    #[tokio::test]
    async fn merchant_search_by_name_containment() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteMerchantStore::new(pool);

        store.create(new_merchant("bunnings", "4231")).await.unwrap();
        let hits = store
            .bulk_search(&["bunnings 302000 alexandria".to_string()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].industry_code, "4231");
    }

    #[tokio::test]
    async fn merchant_duplicate_name_rejected() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteMerchantStore::new(pool);

        store.create(new_merchant("shell", "4613")).await.unwrap();
        let err = store.create(new_merchant("Shell", "4613")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(n) if n == "shell"));
    }

    #[tokio::test]
    async fn merchant_stats_group_by_industry() {
        let (_dir, pool) = test_pool().await;
        let store = SqliteMerchantStore::new(pool);

        store.create(new_merchant("shell", "4613")).await.unwrap();
        store.create(new_merchant("bp", "4613")).await.unwrap();
        store.create(new_merchant("uber", "4622")).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(
            stats.by_industry,
            vec![("4613".to_string(), 2), ("4622".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn seeding_twice_changes_nothing() {
        let (_dir, pool) = test_pool().await;
        seed_reference_data(&pool).await.unwrap();
        let keywords = SqliteKeywordStore::new(pool.clone());
        let merchants = SqliteMerchantStore::new(pool.clone());
        let before_k = keywords.stats().await.unwrap();
        let before_m = merchants.stats().await.unwrap();
        assert!(before_k.total > 0);
        assert!(before_m.total > 0);

        seed_reference_data(&pool).await.unwrap();
        assert_eq!(keywords.stats().await.unwrap().total, before_k.total);
        assert_eq!(merchants.stats().await.unwrap().total, before_m.total);
    }

    #[tokio::test]
    async fn pipeline_runs_over_sqlite_stores() {
        let (_dir, pool) = test_pool().await;
        seed_reference_data(&pool).await.unwrap();

        let pipeline = ClassificationPipeline::new(
            Arc::new(SqliteKeywordStore::new(pool.clone())),
            Arc::new(SqliteMerchantStore::new(pool)),
            AnzsicResolver,
            MockClassifier::default(),
            ClassifyThresholds {
                ai_chunk_delay: Duration::ZERO,
                ..Default::default()
            },
        );

        let enabled: BTreeSet<Category> = ALL_CATEGORIES.iter().copied().collect();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let batch = vec![
            Transaction::new("t1", date, "UBER *TRIP HELP.UBER.COM", Money::from_cents(-2480)),
            Transaction::new("t2", date, "SALARY PAYMENT", Money::from_cents(520_000)),
            Transaction::new("t3", date, "NETFLIX.COM SYDNEY", Money::from_cents(-1599)),
        ];
        let results = pipeline.classify_batch(batch, &enabled).await;

        assert_eq!(results[0].classification.source, ClassificationSource::MerchantDb);
        assert_eq!(
            results[0].classification.category,
            Some(Category::VehiclesTravelTransport)
        );
        assert!(results[0].is_business_expense);

        assert_eq!(results[1].classification.source, ClassificationSource::SkipRule);

        // Known non-deductible keyword: classified, never a deduction.
        assert_eq!(results[2].classification.source, ClassificationSource::KeywordDb);
        assert!(!results[2].classification.is_deductible);
        assert!(!results[2].is_business_expense);
    }
}
