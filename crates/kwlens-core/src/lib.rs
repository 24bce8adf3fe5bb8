use thiserror::Error;

pub mod app_config;
pub mod keywords;
pub mod options;
pub mod progress;
pub mod session;
pub mod validate;

pub use app_config::{load_app_config, AppConfig};
pub use keywords::{
    fold_keyword, KeywordAttributes, KeywordOccurrence, ProductCollection, ProductStatus,
    RankingEntry,
};
pub use options::{load_profiles, ProfilesFile, ResearchOptions};
pub use progress::{ProgressEvent, ProgressSender, ResearchPhase};
pub use session::{
    AggregatedKeyword, ComparisonKeyword, GapAnalysis, GapImpact, GapRecord, GapSummary,
    GapType, OpportunityCandidate, OpportunityReport, OpportunityType, ProductComparison,
    ResearchSession, SessionSummary,
};
pub use validate::validate_product_ids;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid product id '{0}': expected 10 alphanumeric characters")]
    InvalidProductId(String),

    #[error("expected between 1 and 10 product ids, got {0}")]
    InvalidProductCount(usize),

    #[error("required environment variable {0} is not set")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read profiles file {path}: {source}")]
    ProfilesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse profiles file: {0}")]
    ProfilesFileParse(#[from] serde_yaml::Error),

    #[error("invalid profiles file: {0}")]
    ProfilesValidation(String),
}
