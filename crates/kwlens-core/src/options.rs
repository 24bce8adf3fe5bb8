//! Research options and named option profiles.
//!
//! Profiles live in a YAML file (`config/profiles.yaml` by default) so that
//! recurring research setups can be named instead of respecified per run.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Tunable parameters of one research run.
///
/// Defaults match a mid-size niche: enough volume to matter, few enough
/// entrenched competitors to leave room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchOptions {
    /// Occurrences below this search volume are dropped at collection time.
    pub min_search_volume: u32,
    /// Upper volume bound for the targeted-opportunity filter.
    pub max_search_volume: u32,
    /// Opportunity filter: at most this many competitors ranking top-15.
    pub max_competitors_in_top15: u32,
    /// Opportunity filter: at least this many competitors ranking top-50.
    pub min_competitors_ranking: u32,
    /// Opportunity filter: competitor strength ceiling (1 = weakest field).
    pub max_competitor_strength: f64,
    /// Keywords below this volume do not participate in gap analysis.
    pub min_gap_volume: u32,
    /// Gap analysis: user positions beyond this count as "not ranking".
    pub max_gap_position: u32,
    /// Volume at which a gap's potential impact is rated high.
    pub focus_volume_threshold: u32,
    /// Whether to run the enrichment phase at all.
    pub enhancement: bool,
    /// Pages fetched per product from the reverse-ASIN endpoint.
    pub pages: u32,
    /// Page size for the reverse-ASIN endpoint.
    pub page_size: u32,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            min_search_volume: 100,
            max_search_volume: 50_000,
            max_competitors_in_top15: 2,
            min_competitors_ranking: 1,
            max_competitor_strength: 5.0,
            min_gap_volume: 500,
            max_gap_position: 30,
            focus_volume_threshold: 5_000,
            enhancement: true,
            pages: 1,
            page_size: 200,
        }
    }
}

/// A named options profile from the profiles file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub options: ResearchOptions,
}

#[derive(Debug, Deserialize)]
pub struct ProfilesFile {
    pub profiles: Vec<Profile>,
}

impl ProfilesFile {
    /// Look up a profile by case-insensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Profile> {
        let lower = name.to_lowercase();
        self.profiles.iter().find(|p| p.name.to_lowercase() == lower)
    }
}

/// Load and validate research profiles from a YAML file.
///
/// # Errors
///
/// Returns `CoreError` if the file cannot be read, parsed, or fails
/// validation (empty/duplicate names, inverted volume bounds).
pub fn load_profiles(path: &Path) -> Result<ProfilesFile, CoreError> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::ProfilesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: ProfilesFile = serde_yaml::from_str(&content)?;
    validate_profiles(&file)?;
    Ok(file)
}

fn validate_profiles(file: &ProfilesFile) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for profile in &file.profiles {
        if profile.name.trim().is_empty() {
            return Err(CoreError::ProfilesValidation(
                "profile name must be non-empty".to_string(),
            ));
        }
        if !seen.insert(profile.name.to_lowercase()) {
            return Err(CoreError::ProfilesValidation(format!(
                "duplicate profile name: '{}'",
                profile.name
            )));
        }
        let o = &profile.options;
        if o.min_search_volume > o.max_search_volume {
            return Err(CoreError::ProfilesValidation(format!(
                "profile '{}': min_search_volume {} exceeds max_search_volume {}",
                profile.name, o.min_search_volume, o.max_search_volume
            )));
        }
        if o.page_size == 0 || o.pages == 0 {
            return Err(CoreError::ProfilesValidation(format!(
                "profile '{}': pages and page_size must be positive",
                profile.name
            )));
        }
    }
    Ok(())
}
