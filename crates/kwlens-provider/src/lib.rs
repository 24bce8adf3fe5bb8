pub mod client;
pub mod error;
pub mod normalize;
mod retry;
pub mod types;

pub use client::ProviderClient;
pub use error::ProviderError;
pub use normalize::{normalize_row, normalize_rows};
pub use types::{KeywordRow, MiningFilters};
