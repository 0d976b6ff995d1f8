use rust_decimal::Decimal;

use crate::schedule::TaxSchedule;

/// Everything the annual position report shows, exact and unrounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxSummary {
    pub total_income: Decimal,
    pub total_deductions: Decimal,
    pub taxable_income: Decimal,
    pub income_tax: Decimal,
    pub medicare_levy: Decimal,
    pub low_income_offset: Decimal,
    pub net_tax_payable: Decimal,
    /// Marginal rate at the taxable income, as a fraction.
    pub marginal_rate: Decimal,
    /// Deductions valued at the marginal rate.
    pub potential_savings: Decimal,
    /// Net payable over gross income, in percent. Zero when income is.
    pub effective_rate: Decimal,
}

/// Computes the annual position for a gross income and a deduction
/// total. Deductions beyond income floor taxable income at zero; they
/// never produce a refund.
pub fn compute_tax_summary(
    schedule: &TaxSchedule,
    total_income: Decimal,
    total_deductions: Decimal,
) -> TaxSummary {
    let total_income = total_income.max(Decimal::ZERO);
    let total_deductions = total_deductions.max(Decimal::ZERO);
    let taxable_income = (total_income - total_deductions).max(Decimal::ZERO);

    let income_tax = schedule.income_tax(taxable_income);
    let medicare_levy = schedule.medicare_levy(taxable_income);
    let low_income_offset = schedule.low_income_offset(taxable_income);
    let net_tax_payable = (income_tax + medicare_levy - low_income_offset).max(Decimal::ZERO);

    let marginal_rate = schedule.marginal_rate(taxable_income);
    let potential_savings = total_deductions * marginal_rate;
    let effective_rate = if total_income.is_zero() {
        Decimal::ZERO
    } else {
        net_tax_payable / total_income * Decimal::from(100)
    };

    TaxSummary {
        total_income,
        total_deductions,
        taxable_income,
        income_tax,
        medicare_levy,
        low_income_offset,
        net_tax_payable,
        marginal_rate,
        potential_savings,
        effective_rate,
    }
}
