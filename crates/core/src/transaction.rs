use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::category::Category;
use super::money::Money;

/// A bank-feed transaction as ingested. Negative amounts are spends,
/// non-negative amounts are credits/income.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Money,
    pub account: Option<String>,
}

impl Transaction {
    pub fn new(id: &str, date: NaiveDate, description: &str, amount: Money) -> Self {
        Transaction {
            id: id.to_string(),
            date,
            description: description.to_string(),
            amount,
            account: None,
        }
    }
}

/// Which pipeline stage produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationSource {
    SkipRule,
    MerchantDb,
    KeywordDb,
    Ai,
    Fallback,
}

impl ClassificationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassificationSource::SkipRule => "skip-rule",
            ClassificationSource::MerchantDb => "merchant-db",
            ClassificationSource::KeywordDb => "keyword-db",
            ClassificationSource::Ai => "ai",
            ClassificationSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verdict for one transaction. `confidence` is 0-100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub is_deductible: bool,
    pub category: Option<Category>,
    pub confidence: u8,
    pub source: ClassificationSource,
    pub merchant: Option<String>,
}

impl Classification {
    /// Credits and income are never deductions.
    pub fn skip() -> Self {
        Classification {
            is_deductible: false,
            category: None,
            confidence: 100,
            source: ClassificationSource::SkipRule,
            merchant: None,
        }
    }

    /// Nothing resolved the transaction.
    pub fn fallback() -> Self {
        Classification {
            is_deductible: false,
            category: None,
            confidence: 0,
            source: ClassificationSource::Fallback,
            merchant: None,
        }
    }
}

/// A transaction with its verdict plus the settings-derived business
/// expense flag. The flag never feeds back into classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedTransaction {
    pub transaction: Transaction,
    pub classification: Classification,
    pub is_business_expense: bool,
    pub deduction_amount: Money,
}

impl ClassifiedTransaction {
    /// A transaction counts as a business expense when it is deductible,
    /// is a spend (negative amount), and its category is enabled.
    pub fn derive(
        transaction: Transaction,
        classification: Classification,
        enabled: &BTreeSet<Category>,
    ) -> Self {
        let is_business_expense = classification.is_deductible
            && transaction.amount.is_negative()
            && classification
                .category
                .map(|c| enabled.contains(&c))
                .unwrap_or(false);
        let deduction_amount = if is_business_expense {
            transaction.amount.abs()
        } else {
            Money::zero()
        };
        ClassifiedTransaction {
            transaction,
            classification,
            is_business_expense,
            deduction_amount,
        }
    }
}
