pub mod category;
pub mod money;
pub mod period;
pub mod transaction;

pub use category::{Category, ALL_CATEGORIES};
pub use money::Money;
pub use period::{DateRange, FinancialYear};
pub use transaction::{
    Classification, ClassificationSource, ClassifiedTransaction, Transaction,
};
