pub mod ai;
pub mod extract;
pub mod industry;
pub mod ingest;
pub mod learn;
pub mod llm;
pub mod matcher;
pub mod pipeline;
pub mod store;

pub use ai::{AiClassifier, AiError, HeuristicClassifier, MerchantGuess, MockClassifier};
pub use extract::extract_keyword;
pub use industry::{AnzsicResolver, IndustryResolution, IndustryResolver};
pub use ingest::{load_transactions, read_transactions, IngestError};
pub use learn::{LearnEntry, LearnQueue};
pub use llm::LlmClassifier;
pub use matcher::{MatchKind, ScoredMatch};
pub use pipeline::{BatchSummary, ClassificationPipeline, ClassifyThresholds};
pub use store::{
    KeywordMapping, KeywordStore, KeywordStoreStats, MappingStatus, MemoryKeywordStore,
    MemoryMerchantStore, MerchantRecord, MerchantStore, MerchantStoreStats, NewKeywordMapping,
    NewMerchant, Provenance, StoreError,
};
