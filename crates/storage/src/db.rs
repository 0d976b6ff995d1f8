use std::path::Path;

use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use deducto_core::Category;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA cache_size = -32000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keyword_mappings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            keyword TEXT NOT NULL UNIQUE,
            category TEXT,
            is_deductible INTEGER NOT NULL DEFAULT 0,
            confidence_level INTEGER NOT NULL DEFAULT 50,
            status TEXT NOT NULL DEFAULT 'pending',
            provenance TEXT NOT NULL DEFAULT 'seed',
            usage_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS merchants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            industry_code TEXT NOT NULL,
            keywords TEXT NOT NULL DEFAULT '[]',
            aliases TEXT NOT NULL DEFAULT '[]',
            provenance TEXT NOT NULL DEFAULT 'seed',
            usage_count INTEGER NOT NULL DEFAULT 0,
            confidence INTEGER NOT NULL DEFAULT 50,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_merchants_industry ON merchants(industry_code)")
        .execute(pool)
        .await?;

    Ok(())
}

// ── Seed catalog ─────────────────────────────────────────────────────────────

// (name, display name, industry code, aliases, confidence)
const SEED_MERCHANTS: &[(&str, &str, &str, &[&str], u8)] = &[
    // Fuel and transport
    ("shell", "Shell", "4613", &[], 95),
    ("bp", "BP", "4613", &[], 95),
    ("caltex", "Caltex", "4613", &[], 95),
    ("ampol", "Ampol", "4613", &[], 95),
    ("7-eleven", "7-Eleven", "4613", &["7 eleven"], 90),
    ("uber", "Uber", "4622", &[], 95),
    // Hardware and technology
    ("bunnings", "Bunnings", "4231", &["bunnings warehouse"], 95),
    ("mitre 10", "Mitre 10", "4231", &[], 90),
    ("jb hi-fi", "JB Hi-Fi", "4252", &["jb hifi"], 95),
    ("harvey norman", "Harvey Norman", "4252", &[], 90),
    ("officeworks", "Officeworks", "4252", &[], 95),
    // Telcos
    ("telstra", "Telstra", "5910", &[], 95),
    ("optus", "Optus", "5910", &[], 95),
    ("vodafone", "Vodafone", "5910", &["vodaphone"], 90),
    ("tpg", "TPG", "5910", &[], 90),
    // Banks and accountants
    ("commonwealth bank", "Commonwealth Bank", "6221", &["commbank", "cba"], 95),
    ("westpac", "Westpac", "6221", &[], 95),
    ("anz", "ANZ", "6221", &[], 95),
    ("nab", "NAB", "6221", &[], 95),
    ("h&r block", "H&R Block", "6920", &["hr block"], 90),
    // Food
    ("mcdonald's", "McDonald's", "5611", &["maccas", "mcdonalds"], 95),
    ("kfc", "KFC", "5611", &[], 95),
    ("subway", "Subway", "5611", &[], 90),
    ("dominos", "Domino's", "5611", &["dominoes"], 90),
    ("starbucks", "Starbucks", "5613", &[], 90),
    ("gloria jeans", "Gloria Jeans", "5613", &[], 85),
    // Supermarkets and department stores
    ("woolworths", "Woolworths", "4110", &["woolies"], 95),
    ("coles", "Coles", "4110", &[], 95),
    ("aldi", "ALDI", "4110", &[], 95),
    ("iga", "IGA", "4110", &[], 90),
    ("kmart", "Kmart", "4251", &[], 85),
    ("target", "Target", "4251", &[], 85),
    ("big w", "Big W", "4251", &[], 85),
];

// (keyword, category, confidence); None marks known non-deductible noise.
const SEED_KEYWORDS: &[(&str, Option<Category>, u8)] = &[
    ("uber", Some(Category::VehiclesTravelTransport), 85),
    ("taxi", Some(Category::VehiclesTravelTransport), 90),
    ("fuel", Some(Category::VehiclesTravelTransport), 90),
    ("petrol", Some(Category::VehiclesTravelTransport), 90),
    ("laptop", Some(Category::WorkToolsEquipment), 90),
    ("computer", Some(Category::WorkToolsEquipment), 90),
    ("software", Some(Category::WorkToolsEquipment), 95),
    ("shopify", Some(Category::WorkToolsEquipment), 85),
    ("conference", Some(Category::EducationTraining), 90),
    ("conferencing", Some(Category::EducationTraining), 90),
    ("internet", Some(Category::HomeOffice), 85),
    ("phone", Some(Category::HomeOffice), 80),
    // Frequent sights in feeds that are not deductions
    ("woolworths", None, 85),
    ("coles", None, 85),
    ("sushi", None, 80),
    ("muscle", None, 75),
    ("netflix", None, 85),
    ("spotify", None, 85),
    ("bondi", None, 70),
    ("yennora", None, 70),
];

/// Idempotent: existing rows are left untouched, so re-running seed
/// never clobbers learned confidence or usage counts.
pub async fn seed_reference_data(pool: &DbPool) -> Result<(), sqlx::Error> {
    for (name, display_name, industry_code, aliases, confidence) in SEED_MERCHANTS {
        let keywords = serde_json::to_string(&[name]).unwrap_or_else(|_| "[]".to_string());
        let aliases = serde_json::to_string(aliases).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            "INSERT OR IGNORE INTO merchants (name, display_name, industry_code, keywords, aliases, provenance, usage_count, confidence) VALUES (?, ?, ?, ?, ?, 'seed', 0, ?)"
        )
        .bind(name)
        .bind(display_name)
        .bind(industry_code)
        .bind(keywords)
        .bind(aliases)
        .bind(*confidence)
        .execute(pool)
        .await?;
    }

    for (keyword, category, confidence) in SEED_KEYWORDS {
        sqlx::query(
            "INSERT OR IGNORE INTO keyword_mappings (keyword, category, is_deductible, confidence_level, status, provenance, usage_count) VALUES (?, ?, ?, ?, 'confirmed', 'seed', 0)"
        )
        .bind(keyword)
        .bind(category.map(|c| c.as_str()))
        .bind(category.is_some())
        .bind(*confidence)
        .execute(pool)
        .await?;
    }

    Ok(())
}
