//! Errors the engine reports to its callers.
//!
//! Provider failures never appear here; the distance resolver absorbs them.

use std::time::Duration;

use crate::model::{ServiceCode, TableError};

#[derive(thiserror::Error, Debug)]
/// Caller-visible failures of quote and administrative operations.
pub enum QuoteError {
    /// The destination address or area is blank.
    #[error("Destination address and area are required")]
    MissingDestination,
    /// No service with this code is configured.
    #[error("Unknown service: {0}")]
    UnknownService(ServiceCode),
    /// A replacement price table breaks the coverage invariant.
    #[error("Invalid price table for {code}: {source}")]
    InvalidPriceTable {
        /// Service being updated.
        code: ServiceCode,
        /// First problem found in the table.
        #[source]
        source: TableError,
    },
    /// A replacement schedule is unusable.
    #[error("Invalid schedule for {code}: {reason}")]
    InvalidSchedule {
        /// Service being updated.
        code: ServiceCode,
        /// What is wrong with it.
        reason: String,
    },
    /// A replacement area override list is unusable.
    #[error("Invalid area override for {code}: {reason}")]
    InvalidOverride {
        /// Service being updated.
        code: ServiceCode,
        /// What is wrong with it.
        reason: String,
    },
    /// Too many quote requests in the current window.
    #[error("Too many requests, retry in {} s", .retry_after.as_secs().max(1))]
    RateLimited {
        /// Time until a slot frees up.
        retry_after: Duration,
    },
}

impl QuoteError {
    /// True for failures the caller may retry after waiting.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// True for failures caused by the request itself.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        !self.is_retryable()
    }
}
