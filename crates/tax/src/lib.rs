pub mod aggregate;
pub mod schedule;
pub mod summary;

pub use aggregate::{aggregate_deductions, total_deductions, CategoryBreakdown};
pub use schedule::{TaxBracket, TaxSchedule};
pub use summary::{compute_tax_summary, TaxSummary};
