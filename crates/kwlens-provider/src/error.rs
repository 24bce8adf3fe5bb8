use thiserror::Error;

/// Errors returned by the keyword-data provider client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned an error envelope (`"code"` other than `"OK"`).
    #[error("provider API error: {0}")]
    Api(String),

    /// The provider signalled that the account's call quota is exhausted.
    /// Never retried; surfaced so callers can stop burning requests.
    #[error("provider quota exhausted: {0}")]
    QuotaExceeded(String),

    /// The response body could not be deserialized into the expected shape.
    #[error("deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
