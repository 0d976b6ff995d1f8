use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use deducto_classify::{
    load_transactions, AiClassifier, AiError, AnzsicResolver, BatchSummary,
    ClassificationPipeline, HeuristicClassifier, IndustryResolver, KeywordStore, LlmClassifier,
    MerchantGuess, MerchantStore,
};
use deducto_core::{Category, ClassifiedTransaction, FinancialYear, Transaction};
use deducto_storage::{
    create_db, seed_reference_data, DbPool, SqliteKeywordStore, SqliteMerchantStore,
};
use deducto_tax::{
    aggregate_deductions, compute_tax_summary, total_deductions, TaxSchedule, TaxSummary,
};
use rust_decimal::Decimal;

use crate::config::Config;

/// The config-selected AI backend behind one concrete type, so the
/// pipeline generics stay monomorphic.
pub enum AnyClassifier {
    Heuristic(HeuristicClassifier),
    Llm(LlmClassifier),
}

#[async_trait]
impl AiClassifier for AnyClassifier {
    async fn extract_merchants(
        &self,
        batch: &[Transaction],
    ) -> Result<Vec<MerchantGuess>, AiError> {
        match self {
            AnyClassifier::Heuristic(c) => c.extract_merchants(batch).await,
            AnyClassifier::Llm(c) => c.extract_merchants(batch).await,
        }
    }
}

fn build_classifier(config: &Config, ai_override: Option<&str>) -> Result<AnyClassifier> {
    let backend = ai_override.unwrap_or(config.ai.backend.as_str());
    match backend {
        "heuristic" => Ok(AnyClassifier::Heuristic(HeuristicClassifier)),
        "llm" => {
            let key = std::env::var(&config.ai.api_key_env).with_context(|| {
                format!("the llm backend needs an API key in ${}", config.ai.api_key_env)
            })?;
            Ok(AnyClassifier::Llm(LlmClassifier::new(
                &config.ai.endpoint,
                &config.ai.model,
                &key,
            )))
        }
        other => bail!("unknown AI backend {other:?} (expected \"heuristic\" or \"llm\")"),
    }
}

/// Opens (creating if needed) and seeds the database. Seeding is
/// idempotent, so every command goes through here.
async fn open_db(config: &Config) -> Result<DbPool> {
    let path = config.database_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let db = create_db(&path)
        .await
        .with_context(|| format!("open {}", path.display()))?;
    seed_reference_data(&db).await.context("seed reference data")?;
    Ok(db)
}

async fn run_pipeline(
    config: &Config,
    transactions: Vec<Transaction>,
    ai_override: Option<&str>,
) -> Result<Vec<ClassifiedTransaction>> {
    let ai = build_classifier(config, ai_override)?;
    let enabled = config.enabled_categories()?;

    let db = open_db(config).await?;
    let keywords = Arc::new(SqliteKeywordStore::new(db.clone()));
    let merchants = Arc::new(SqliteMerchantStore::new(db));

    let pipeline =
        ClassificationPipeline::new(keywords, merchants, AnzsicResolver, ai, config.thresholds());
    let results = pipeline.classify_batch(transactions, &enabled).await;
    pipeline.flush_learning().await;
    Ok(results)
}

pub async fn seed(config: &Config) -> Result<()> {
    let path = config.database_path()?;
    let db = open_db(config).await?;

    let m = SqliteMerchantStore::new(db.clone()).stats().await?;
    let k = SqliteKeywordStore::new(db).stats().await?;

    println!("Database ready: {}", path.display());
    println!(
        "{} merchants, {} keyword mappings ({} confirmed, {} pending)",
        m.total, k.total, k.confirmed, k.pending
    );
    Ok(())
}

pub async fn classify(config: &Config, csv: &Path, ai_override: Option<&str>) -> Result<()> {
    let transactions =
        load_transactions(csv).with_context(|| format!("reading {}", csv.display()))?;
    println!("Parsed {} transactions from {}\n", transactions.len(), csv.display());

    let results = run_pipeline(config, transactions, ai_override).await?;

    for r in &results {
        let c = &r.classification;
        println!(
            "{} | {:>11} | {:<11} {:>3} | {} | {}",
            r.transaction.date,
            r.transaction.amount.to_string(),
            c.source.as_str(),
            c.confidence,
            c.category.map(Category::as_str).unwrap_or("-"),
            r.transaction.description,
        );
    }

    let summary = BatchSummary::of(&results);
    println!(
        "\nSources: skip-rule {} | merchant-db {} | keyword-db {} | ai {} | fallback {}",
        summary.skip_rule, summary.merchant_db, summary.keyword_db, summary.ai, summary.fallback
    );

    let breakdown = aggregate_deductions(&results, None);
    println!(
        "Deductible: {} of {} transactions, {} claimable",
        summary.deductible,
        summary.total,
        total_deductions(&breakdown)
    );
    Ok(())
}

pub async fn summary(
    config: &Config,
    csv: &Path,
    income: Decimal,
    fy: Option<u16>,
    ai_override: Option<&str>,
) -> Result<()> {
    let transactions =
        load_transactions(csv).with_context(|| format!("reading {}", csv.display()))?;
    let results = run_pipeline(config, transactions, ai_override).await?;

    let period = fy.map(|year| FinancialYear::new(year).range());
    let breakdown = aggregate_deductions(&results, period);
    let deductions = total_deductions(&breakdown);

    match fy {
        Some(year) => println!("# Deductions FY {}\n", FinancialYear::new(year).label()),
        None => println!("# Deductions\n"),
    }
    if breakdown.is_empty() {
        println!("(no deductible business expenses found)");
    }
    for row in &breakdown {
        println!(
            "{:<45} {:>11}  {:>5}%  ({} transactions)",
            row.category.as_str(),
            row.total.to_string(),
            row.percentage.round_dp(1),
            row.count
        );
    }
    println!("{:<45} {:>11}", "Total", deductions.to_string());
    println!();

    let schedule = TaxSchedule::au_2024_25();
    let tax = compute_tax_summary(&schedule, income, deductions.to_decimal());
    print_tax(&schedule, &tax);
    Ok(())
}

pub fn tax(income: Decimal, deductions: Decimal) -> Result<()> {
    let schedule = TaxSchedule::au_2024_25();
    let summary = compute_tax_summary(&schedule, income, deductions);
    print_tax(&schedule, &summary);
    Ok(())
}

pub async fn stats(config: &Config) -> Result<()> {
    let db = open_db(config).await?;

    let m = SqliteMerchantStore::new(db.clone()).stats().await?;
    let k = SqliteKeywordStore::new(db).stats().await?;

    println!("Merchants: {}", m.total);
    for (code, count) in &m.by_industry {
        let description = AnzsicResolver.resolve(code).description;
        let label = if description.is_empty() { "Unknown industry" } else { description };
        println!("  {code}  {label:<42} {count}");
    }
    println!(
        "\nKeyword mappings: {} ({} confirmed, {} pending)",
        k.total, k.confirmed, k.pending
    );
    Ok(())
}

fn print_tax(schedule: &TaxSchedule, tax: &TaxSummary) {
    println!("# Tax position, {} rates\n", schedule.label());
    println!("Gross income       {:>12}", dollars(tax.total_income));
    println!("Deductions         {:>12}", dollars(tax.total_deductions));
    println!("Taxable income     {:>12}", dollars(tax.taxable_income));
    println!("Income tax         {:>12}", dollars(tax.income_tax));
    println!("Medicare levy      {:>12}", dollars(tax.medicare_levy));
    println!("Low income offset  {:>12}", dollars(tax.low_income_offset));
    println!("Net tax payable    {:>12}", dollars(tax.net_tax_payable));
    println!();
    println!("Marginal rate      {:>12}", format!("{}%", percent(tax.marginal_rate)));
    println!("Effective rate     {:>12}", format!("{:.2}%", tax.effective_rate));
    println!("Potential savings  {:>12}", dollars(tax.potential_savings));
}

fn dollars(d: Decimal) -> String {
    format!("${d:.2}")
}

/// A rate fraction as a percentage with no trailing zeros ("32.5").
fn percent(rate: Decimal) -> String {
    (rate * Decimal::from(100)).normalize().to_string()
}
