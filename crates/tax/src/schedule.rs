use rust_decimal::Decimal;

/// One marginal bracket covering `[lower, upper)`; the top bracket is
/// open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxBracket {
    pub lower: Decimal,
    pub upper: Option<Decimal>,
    pub rate: Decimal,
}

impl TaxBracket {
    pub fn new(lower: Decimal, upper: Option<Decimal>, rate: Decimal) -> Self {
        TaxBracket { lower, upper, rate }
    }
}

/// A resident tax schedule: progressive brackets plus the Medicare levy
/// phase-in and the low income offset. All arithmetic is exact Decimal;
/// rounding happens only at display time.
#[derive(Debug, Clone)]
pub struct TaxSchedule {
    label: &'static str,
    brackets: Vec<TaxBracket>,
    levy_rate: Decimal,
    levy_threshold: Decimal,
    levy_taper_rate: Decimal,
    offset_max: Decimal,
    offset_entry_rate: Decimal,
    offset_full_limit: Decimal,
    offset_plateau_limit: Decimal,
    offset_taper_rate: Decimal,
}

impl TaxSchedule {
    /// Australian resident rates for the 2024-25 financial year.
    pub fn au_2024_25() -> Self {
        let d = Decimal::from;
        TaxSchedule {
            label: "2024-25",
            brackets: vec![
                TaxBracket::new(d(0), Some(d(18_200)), Decimal::ZERO),
                TaxBracket::new(d(18_200), Some(d(45_000)), Decimal::new(19, 2)),
                TaxBracket::new(d(45_000), Some(d(120_000)), Decimal::new(325, 3)),
                TaxBracket::new(d(120_000), Some(d(180_000)), Decimal::new(37, 2)),
                TaxBracket::new(d(180_000), None, Decimal::new(45, 2)),
            ],
            levy_rate: Decimal::new(2, 2),
            levy_threshold: d(29_207),
            levy_taper_rate: Decimal::new(10, 2),
            offset_max: d(700),
            offset_entry_rate: Decimal::new(19, 2),
            offset_full_limit: d(37_000),
            offset_plateau_limit: d(48_000),
            offset_taper_rate: Decimal::new(5, 2),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Gross income tax before levy and offsets. Negative taxable
    /// income is treated as zero.
    pub fn income_tax(&self, taxable: Decimal) -> Decimal {
        let taxable = taxable.max(Decimal::ZERO);
        let mut tax = Decimal::ZERO;
        for bracket in &self.brackets {
            if taxable <= bracket.lower {
                break;
            }
            let top = match bracket.upper {
                Some(upper) => taxable.min(upper),
                None => taxable,
            };
            tax += (top - bracket.lower) * bracket.rate;
        }
        tax
    }

    /// Rate of the bracket containing `taxable`. Bracket bounds are
    /// half-open, so an income sitting exactly on a boundary pays the
    /// higher bracket's rate on its next dollar.
    pub fn marginal_rate(&self, taxable: Decimal) -> Decimal {
        let taxable = taxable.max(Decimal::ZERO);
        for bracket in &self.brackets {
            let below_upper = bracket.upper.map_or(true, |upper| taxable < upper);
            if taxable >= bracket.lower && below_upper {
                return bracket.rate;
            }
        }
        Decimal::ZERO
    }

    /// Medicare levy with the low-income phase-in: nothing up to the
    /// threshold, then ten cents per dollar over it until that meets
    /// the flat two percent.
    pub fn medicare_levy(&self, taxable: Decimal) -> Decimal {
        let taxable = taxable.max(Decimal::ZERO);
        if taxable <= self.levy_threshold {
            return Decimal::ZERO;
        }
        let phased = self.levy_taper_rate * (taxable - self.levy_threshold);
        phased.min(self.levy_rate * taxable)
    }

    /// Low income tax offset: ramps up, plateaus at the maximum, then
    /// tapers away to nothing.
    pub fn low_income_offset(&self, taxable: Decimal) -> Decimal {
        let taxable = taxable.max(Decimal::ZERO);
        if taxable <= self.offset_full_limit {
            return self.offset_max.min(self.offset_entry_rate * taxable);
        }
        if taxable <= self.offset_plateau_limit {
            return self.offset_max;
        }
        let tapered =
            self.offset_max - self.offset_taper_rate * (taxable - self.offset_plateau_limit);
        tapered.max(Decimal::ZERO)
    }

    /// Tax plus levy minus offset, floored at zero. The offset is
    /// non-refundable.
    pub fn net_payable(&self, taxable: Decimal) -> Decimal {
        let gross = self.income_tax(taxable) + self.medicare_levy(taxable)
            - self.low_income_offset(taxable);
        gross.max(Decimal::ZERO)
    }
}
