use deducto_core::Category;

/// What an industry code tells us about deductibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndustryResolution {
    pub category: Option<Category>,
    pub is_deductible: bool,
    pub confidence: u8,
    pub description: &'static str,
}

impl IndustryResolution {
    pub fn unknown() -> Self {
        IndustryResolution {
            category: None,
            is_deductible: false,
            confidence: 0,
            description: "",
        }
    }
}

/// Maps industry codes to deduction categories. Never fails; unknown
/// codes resolve to the zero-confidence unknown shape.
pub trait IndustryResolver: Send + Sync {
    fn resolve(&self, code: &str) -> IndustryResolution;
}

// ── ANZSIC-style reference table ─────────────────────────────────────────────

type IndustryRow = (&'static str, &'static str, Option<Category>, bool, u8);

pub const INDUSTRY_CODES: &[IndustryRow] = &[
    // Vehicles, travel and transport
    ("4613", "Motor Vehicle Fuel Retailing", Some(Category::VehiclesTravelTransport), true, 95),
    ("4622", "Taxi and Other Road Transport", Some(Category::VehiclesTravelTransport), true, 95),
    ("4821", "Rail Passenger Transport", Some(Category::VehiclesTravelTransport), true, 90),
    ("4832", "Water Passenger Transport", Some(Category::VehiclesTravelTransport), true, 85),
    ("4900", "Air and Space Transport", Some(Category::VehiclesTravelTransport), true, 95),
    // Tools, equipment and technology
    (
        "4231",
        "Hardware and Building Supplies Retailing",
        Some(Category::WorkToolsEquipment),
        true,
        85,
    ),
    ("4252", "Computer and Peripheral Retailing", Some(Category::WorkToolsEquipment), true, 90),
    ("4253", "Telecommunication Goods Retailing", Some(Category::WorkToolsEquipment), true, 85),
    ("4259", "Other Electrical Goods Retailing", Some(Category::WorkToolsEquipment), true, 80),
    // Home office utilities and connectivity
    ("5910", "Telecommunications Services", Some(Category::HomeOffice), true, 95),
    ("2610", "Electricity Supply", Some(Category::HomeOffice), true, 75),
    ("2620", "Gas Supply", Some(Category::HomeOffice), true, 75),
    ("2800", "Water Supply, Sewerage and Drainage", Some(Category::HomeOffice), true, 70),
    // Professional services and memberships
    ("6962", "Management Advice and Consulting", Some(Category::ProfessionalMemberships), true, 85),
    (
        "9139",
        "Professional Interest Group Services",
        Some(Category::ProfessionalMemberships),
        true,
        85,
    ),
    ("5813", "Book and Periodical Publishing", Some(Category::ProfessionalMemberships), true, 80),
    // Education
    ("8552", "Vocational Education and Training", Some(Category::EducationTraining), true, 90),
    ("8102", "Higher Education", Some(Category::EducationTraining), true, 90),
    ("8551", "Sports and Recreation Instruction", Some(Category::EducationTraining), true, 70),
    // Tax, accounting and banking costs
    ("6920", "Accounting Services", Some(Category::TaxAccounting), true, 95),
    ("6931", "Legal Services", Some(Category::TaxAccounting), true, 90),
    ("6221", "Banking", Some(Category::TaxAccounting), true, 85),
    ("6222", "Building Society Operation", Some(Category::TaxAccounting), true, 80),
    // Insurance and superannuation
    ("6321", "Life Insurance", Some(Category::InvestmentsInsuranceSuper), true, 75),
    ("6322", "General Insurance", Some(Category::InvestmentsInsuranceSuper), true, 80),
    ("6323", "Health Insurance", Some(Category::InvestmentsInsuranceSuper), true, 75),
    // Meals and entertainment
    ("5611", "Takeaway Food Services", Some(Category::MealsEntertainment), true, 70),
    ("5613", "Cafes and Coffee Shops", Some(Category::MealsEntertainment), true, 65),
    ("5614", "Pubs, Taverns and Bars", Some(Category::MealsEntertainment), true, 60),
    // Clothing
    ("4251", "Clothing Retailing", Some(Category::WorkClothing), true, 50),
    // Donations and wellbeing
    ("9540", "Religious and Charitable Services", Some(Category::GiftsDonations), true, 70),
    ("9511", "Hairdressing and Beauty Services", Some(Category::PersonalGrooming), true, 50),
    // Confidently not deductible
    ("4110", "Supermarket and Grocery Stores", None, false, 95),
];

/// Const-table resolver over [`INDUSTRY_CODES`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AnzsicResolver;

impl IndustryResolver for AnzsicResolver {
    fn resolve(&self, code: &str) -> IndustryResolution {
        let code = code.trim();
        INDUSTRY_CODES
            .iter()
            .find(|(c, ..)| *c == code)
            .map(|&(_, description, category, is_deductible, confidence)| IndustryResolution {
                category,
                is_deductible,
                confidence,
                description,
            })
            .unwrap_or_else(IndustryResolution::unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_code_resolves() {
        let r = AnzsicResolver.resolve("4613");
        assert_eq!(r.category, Some(Category::VehiclesTravelTransport));
        assert!(r.is_deductible);
        assert_eq!(r.confidence, 95);
        assert_eq!(r.description, "Motor Vehicle Fuel Retailing");
    }

    #[test]
    fn unknown_code_is_zero_confidence() {
        let r = AnzsicResolver.resolve("0000");
        assert_eq!(r.category, None);
        assert!(!r.is_deductible);
        assert_eq!(r.confidence, 0);
    }

    #[test]
    fn code_is_trimmed() {
        assert_eq!(AnzsicResolver.resolve(" 5910 ").category, Some(Category::HomeOffice));
    }

    #[test]
    fn supermarkets_are_confidently_non_deductible() {
        let r = AnzsicResolver.resolve("4110");
        assert_eq!(r.category, None);
        assert!(!r.is_deductible);
        assert_eq!(r.confidence, 95);
    }

    #[test]
    fn table_codes_are_unique() {
        for (i, (a, ..)) in INDUSTRY_CODES.iter().enumerate() {
            for (b, ..) in &INDUSTRY_CODES[i + 1..] {
                assert_ne!(a, b, "duplicate industry code");
            }
        }
    }
}
