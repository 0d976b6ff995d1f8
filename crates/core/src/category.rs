use serde::{Deserialize, Serialize};
use std::fmt;

/// The canonical deduction categories. Storage and AI boundaries speak
/// category text; everything past parsing uses this closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Vehicles, Travel & Transport")]
    VehiclesTravelTransport,
    #[serde(rename = "Work Tools, Equipment & Technology")]
    WorkToolsEquipment,
    #[serde(rename = "Home Office Expenses")]
    HomeOffice,
    #[serde(rename = "Professional Memberships & Subscriptions")]
    ProfessionalMemberships,
    #[serde(rename = "Education & Training")]
    EducationTraining,
    #[serde(rename = "Tax & Accounting Expenses")]
    TaxAccounting,
    #[serde(rename = "Investments, Insurance & Superannuation")]
    InvestmentsInsuranceSuper,
    #[serde(rename = "Meals & Entertainment (Work-Related)")]
    MealsEntertainment,
    #[serde(rename = "Work Clothing & Uniforms")]
    WorkClothing,
    #[serde(rename = "Gifts & Donations")]
    GiftsDonations,
    #[serde(rename = "Personal Grooming & Wellbeing")]
    PersonalGrooming,
}

pub const ALL_CATEGORIES: &[Category] = &[
    Category::VehiclesTravelTransport,
    Category::WorkToolsEquipment,
    Category::HomeOffice,
    Category::ProfessionalMemberships,
    Category::EducationTraining,
    Category::TaxAccounting,
    Category::InvestmentsInsuranceSuper,
    Category::MealsEntertainment,
    Category::WorkClothing,
    Category::GiftsDonations,
    Category::PersonalGrooming,
];

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::VehiclesTravelTransport => "Vehicles, Travel & Transport",
            Category::WorkToolsEquipment => "Work Tools, Equipment & Technology",
            Category::HomeOffice => "Home Office Expenses",
            Category::ProfessionalMemberships => "Professional Memberships & Subscriptions",
            Category::EducationTraining => "Education & Training",
            Category::TaxAccounting => "Tax & Accounting Expenses",
            Category::InvestmentsInsuranceSuper => "Investments, Insurance & Superannuation",
            Category::MealsEntertainment => "Meals & Entertainment (Work-Related)",
            Category::WorkClothing => "Work Clothing & Uniforms",
            Category::GiftsDonations => "Gifts & Donations",
            Category::PersonalGrooming => "Personal Grooming & Wellbeing",
        }
    }

    /// Case-insensitive parse tolerant of punctuation and "and"/"&"
    /// variation. Unknown text is `None`, never an error.
    pub fn from_text(text: &str) -> Option<Self> {
        let wanted = normalize(text);
        if wanted.is_empty() {
            return None;
        }
        ALL_CATEGORIES
            .iter()
            .copied()
            .find(|c| normalize(c.as_str()) == wanted)
    }
}

fn normalize(s: &str) -> String {
    s.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty() && *w != "and")
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
