pub mod db;
pub mod stores;

pub use db::{create_db, seed_reference_data, DbPool};
pub use stores::{SqliteKeywordStore, SqliteMerchantStore};
