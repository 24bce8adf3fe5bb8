//! Input validation performed before any provider call.

use std::sync::LazyLock;

use regex::Regex;

use crate::CoreError;

static PRODUCT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Za-z0-9]{10}$").expect("product id regex is valid"));

pub const MAX_PRODUCTS: usize = 10;

/// Validate a research run's product id list: between 1 and 10 ids, each
/// exactly 10 alphanumeric characters.
///
/// Fails fast so that a malformed request never costs a provider call.
///
/// # Errors
///
/// Returns [`CoreError::InvalidProductCount`] or
/// [`CoreError::InvalidProductId`] naming the first offending id.
pub fn validate_product_ids(product_ids: &[String]) -> Result<(), CoreError> {
    if product_ids.is_empty() || product_ids.len() > MAX_PRODUCTS {
        return Err(CoreError::InvalidProductCount(product_ids.len()));
    }
    for id in product_ids {
        if !PRODUCT_ID_RE.is_match(id) {
            return Err(CoreError::InvalidProductId(id.clone()));
        }
    }
    Ok(())
}
