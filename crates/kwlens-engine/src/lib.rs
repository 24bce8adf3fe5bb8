pub mod aggregator;
pub mod cache;
pub mod collector;
pub mod comparison;
pub mod enhance;
pub mod error;
pub mod gaps;
pub mod opportunity;
pub mod pipeline;
pub mod reconstruct;
pub mod score;
pub mod traits;

pub use cache::{CacheFacade, MemoryCache};
pub use enhance::EnhanceConfig;
pub use error::EngineError;
pub use pipeline::{CompletedResearch, PipelineConfig, ResearchPipeline};
pub use reconstruct::reconstruct_session;
pub use traits::{
    KeywordDataProvider, ResultCache, SessionRows, SessionStore, StoreError, StoredProduct,
    StoredRanking,
};

#[cfg(test)]
pub(crate) mod testutil;
