//! HTTP client for the keyword-data provider's REST API.
//!
//! Wraps `reqwest` with provider-specific error handling, API key
//! management, and typed response deserialization. All endpoints check the
//! `"code"` field in the JSON envelope and surface API-level errors as
//! [`ProviderError::Api`]; transient failures are retried with jittered
//! exponential back-off.

use std::time::Duration;

use reqwest::{Client, Url};

use kwlens_core::KeywordOccurrence;

use crate::error::ProviderError;
use crate::normalize::normalize_rows;
use crate::retry::retry_with_backoff;
use crate::types::{ApiResponse, KeywordMiningResponse, MiningFilters, ReverseAsinResponse};

const DEFAULT_BASE_URL: &str = "https://api.keyworddata.example/";

/// Client for the keyword-data provider.
///
/// Use [`ProviderClient::new`] for production or
/// [`ProviderClient::with_base_url`] to point at a mock server in tests.
pub struct ProviderClient {
    client: Client,
    api_key: Option<String>,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl ProviderClient {
    /// Creates a new client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: Option<&str>,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, timeout_secs, max_retries, backoff_base_ms, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ProviderError::Api`] if `base_url` is not
    /// a valid URL.
    pub fn with_base_url(
        api_key: Option<&str>,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("kwlens/0.1 (keyword-research)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // join() appends path segments instead of replacing the last one.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ProviderError::Api(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.map(str::to_owned),
            base_url,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Fetches one page of keyword occurrences for a product (reverse-ASIN).
    ///
    /// Rows are normalized on the way out: keyword text folded, empty rows
    /// dropped, within-page duplicates removed.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::Api`] if the API returns an error envelope.
    /// - [`ProviderError::QuotaExceeded`] when the account budget is spent.
    /// - [`ProviderError::Http`] on network failure or non-2xx status after
    ///   retries are exhausted.
    /// - [`ProviderError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn reverse_asin(
        &self,
        asin: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<KeywordOccurrence>, ProviderError> {
        let url = self.build_url(
            "traffic/keywords",
            &[
                ("asin", asin),
                ("page", &page.to_string()),
                ("size", &page_size.to_string()),
            ],
        )?;
        let body = self.request_json(&url).await?;
        Self::check_api_error(&body)?;

        let envelope: ApiResponse<ReverseAsinResponse> =
            serde_json::from_value(body).map_err(|e| ProviderError::Deserialize {
                context: format!("reverseAsin(asin={asin}, page={page})"),
                source: e,
            })?;

        Ok(normalize_rows(envelope.data.items))
    }

    /// Looks up related keywords for a seed keyword (mining endpoint).
    ///
    /// This is the expensive enrichment call; callers are expected to apply
    /// their own rate limiting.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::reverse_asin`].
    pub async fn keyword_mining(
        &self,
        keyword: &str,
        filters: &MiningFilters,
    ) -> Result<Vec<KeywordOccurrence>, ProviderError> {
        let url = self.build_url(
            "keywords/mining",
            &[
                ("keyword", keyword),
                ("minSearch", &filters.min_search.to_string()),
                (
                    "maxSupplyDemandRatio",
                    &filters.max_supply_demand_ratio.to_string(),
                ),
                ("size", &filters.size.to_string()),
            ],
        )?;
        let body = self.request_json(&url).await?;
        Self::check_api_error(&body)?;

        let envelope: ApiResponse<KeywordMiningResponse> =
            serde_json::from_value(body).map_err(|e| ProviderError::Deserialize {
                context: format!("keywordMining(keyword={keyword})"),
                source: e,
            })?;

        Ok(normalize_rows(envelope.data.items))
    }

    /// Builds the full request URL with percent-encoded query parameters.
    fn build_url(&self, path: &str, extra: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ProviderError::Api(format!("invalid endpoint path '{path}': {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
            for (k, v) in extra {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Sends a GET request (with retry on transient failures), asserts a 2xx
    /// status, and parses the body as JSON.
    async fn request_json(&self, url: &Url) -> Result<serde_json::Value, ProviderError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async {
            let response = self.client.get(url.clone()).send().await?;
            let response = response.error_for_status()?;
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| ProviderError::Deserialize {
                context: url.to_string(),
                source: e,
            })
        })
        .await
    }

    /// Checks the envelope `"code"` field and maps non-OK codes to errors.
    fn check_api_error(body: &serde_json::Value) -> Result<(), ProviderError> {
        let code = body.get("code").and_then(serde_json::Value::as_str);
        if code == Some("OK") {
            return Ok(());
        }
        let msg = body
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        if code == Some("QUOTA_EXCEEDED") {
            return Err(ProviderError::QuotaExceeded(msg));
        }
        Err(ProviderError::Api(msg))
    }
}
