use std::collections::BTreeMap;

use rust_decimal::Decimal;

use deducto_core::{Category, ClassifiedTransaction, DateRange, Money};

/// Per-category deduction rollup over one batch of classified
/// transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBreakdown {
    pub category: Category,
    pub total: Money,
    pub count: usize,
    /// Share of the summed deduction total, exact; round for display.
    pub percentage: Decimal,
}

/// Rolls business expenses up by category, largest total first.
/// Only rows flagged as business expenses count; `period` (inclusive)
/// scopes by transaction date when given. Categories with no spend are
/// omitted.
pub fn aggregate_deductions(
    results: &[ClassifiedTransaction],
    period: Option<DateRange>,
) -> Vec<CategoryBreakdown> {
    let mut totals: BTreeMap<Category, (Money, usize)> = BTreeMap::new();
    for r in results {
        if !r.is_business_expense {
            continue;
        }
        if let Some(range) = period {
            if !range.contains(r.transaction.date) {
                continue;
            }
        }
        let category = match r.classification.category {
            Some(category) => category,
            None => continue,
        };
        let entry = totals.entry(category).or_insert((Money::zero(), 0));
        entry.0 = entry.0 + r.deduction_amount;
        entry.1 += 1;
    }

    let grand_total = totals
        .values()
        .fold(Money::zero(), |acc, (total, _)| acc + *total);

    let mut breakdown: Vec<CategoryBreakdown> = totals
        .into_iter()
        .map(|(category, (total, count))| {
            let percentage = if grand_total.is_zero() {
                Decimal::ZERO
            } else {
                total.to_decimal() / grand_total.to_decimal() * Decimal::from(100)
            };
            CategoryBreakdown { category, total, count, percentage }
        })
        .collect();

    breakdown.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    breakdown
}

/// Sum of every breakdown total; what flows into the tax summary.
pub fn total_deductions(breakdown: &[CategoryBreakdown]) -> Money {
    breakdown
        .iter()
        .fold(Money::zero(), |acc, b| acc + b.total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use deducto_core::{Classification, ClassificationSource, Transaction};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn expense(
        id: &str,
        day: NaiveDate,
        cents: i64,
        category: Category,
    ) -> ClassifiedTransaction {
        let tx = Transaction::new(id, day, "EXPENSE", Money::from_cents(-cents));
        ClassifiedTransaction {
            transaction: tx,
            classification: Classification {
                is_deductible: true,
                category: Some(category),
                confidence: 90,
                source: ClassificationSource::MerchantDb,
                merchant: None,
            },
            is_business_expense: true,
            deduction_amount: Money::from_cents(cents),
        }
    }

    fn personal(id: &str, day: NaiveDate, cents: i64) -> ClassifiedTransaction {
        let tx = Transaction::new(id, day, "PERSONAL", Money::from_cents(-cents));
        ClassifiedTransaction {
            transaction: tx,
            classification: Classification::fallback(),
            is_business_expense: false,
            deduction_amount: Money::zero(),
        }
    }

    #[test]
    fn groups_and_sorts_by_total() {
        let day = date(2024, 9, 1);
        let results = vec![
            expense("a", day, 10_00, Category::HomeOffice),
            expense("b", day, 50_00, Category::VehiclesTravelTransport),
            expense("c", day, 25_00, Category::VehiclesTravelTransport),
            personal("d", day, 99_00),
        ];

        let breakdown = aggregate_deductions(&results, None);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].category, Category::VehiclesTravelTransport);
        assert_eq!(breakdown[0].total, Money::from_cents(75_00));
        assert_eq!(breakdown[0].count, 2);
        assert_eq!(breakdown[1].category, Category::HomeOffice);
        assert_eq!(breakdown[1].count, 1);

        assert_eq!(total_deductions(&breakdown), Money::from_cents(85_00));
    }

    #[test]
    fn percentages_cover_the_whole() {
        let day = date(2024, 9, 1);
        let results = vec![
            expense("a", day, 60_00, Category::HomeOffice),
            expense("b", day, 40_00, Category::EducationTraining),
        ];

        let breakdown = aggregate_deductions(&results, None);
        assert_eq!(breakdown[0].percentage, Decimal::from(60));
        assert_eq!(breakdown[1].percentage, Decimal::from(40));
    }

    #[test]
    fn period_scopes_by_date_inclusive() {
        let range = DateRange::new(date(2024, 7, 1), date(2025, 6, 30));
        let results = vec![
            expense("in-start", date(2024, 7, 1), 10_00, Category::HomeOffice),
            expense("in-end", date(2025, 6, 30), 10_00, Category::HomeOffice),
            expense("before", date(2024, 6, 30), 10_00, Category::HomeOffice),
            expense("after", date(2025, 7, 1), 10_00, Category::HomeOffice),
        ];

        let breakdown = aggregate_deductions(&results, Some(range));
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].total, Money::from_cents(20_00));
        assert_eq!(breakdown[0].count, 2);
    }

    #[test]
    fn no_business_expenses_means_empty() {
        let results = vec![personal("a", date(2024, 9, 1), 12_00)];
        assert!(aggregate_deductions(&results, None).is_empty());
        assert_eq!(total_deductions(&[]), Money::zero());
    }

    #[test]
    fn order_of_input_does_not_matter() {
        let day = date(2024, 9, 1);
        let mut results = vec![
            expense("a", day, 10_00, Category::HomeOffice),
            expense("b", day, 50_00, Category::VehiclesTravelTransport),
            expense("c", day, 30_00, Category::EducationTraining),
        ];
        let forward = aggregate_deductions(&results, None);
        results.reverse();
        let backward = aggregate_deductions(&results, None);
        assert_eq!(forward, backward);
    }
}
