//! Driven port for bulk IP geolocation lookups.
//!
//! The domain owns the per-address result shape so the enricher can stay
//! adapter-agnostic; the ip-api.com HTTP adapter is one implementation.

use async_trait::async_trait;

use crate::domain::GeoEnrichment;

use super::define_port_error;

/// Upper bound on addresses accepted by one lookup call.
pub const GEOLOCATION_BATCH_LIMIT: usize = 100;

/// Outcome reported by the service for a single address.
#[derive(Debug, Clone, PartialEq)]
pub enum GeolocationOutcome {
    /// The address resolved.
    Success(GeoEnrichment),
    /// The service could not resolve the address (private range, reserved,
    /// malformed input, and so on).
    Failed {
        /// Service-provided reason, when present.
        message: Option<String>,
    },
}

/// One per-address entry in a lookup response.
#[derive(Debug, Clone, PartialEq)]
pub struct GeolocationResult {
    /// Address as echoed by the service.
    pub ip_address: String,
    /// Lookup outcome.
    pub outcome: GeolocationOutcome,
}

impl GeolocationResult {
    /// Build a successful result.
    pub fn success(ip_address: impl Into<String>, enrichment: GeoEnrichment) -> Self {
        Self {
            ip_address: ip_address.into(),
            outcome: GeolocationOutcome::Success(enrichment),
        }
    }

    /// Build a failed result.
    pub fn failed(ip_address: impl Into<String>, message: Option<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            outcome: GeolocationOutcome::Failed { message },
        }
    }
}

define_port_error! {
    /// Errors surfaced while calling the geolocation service.
    pub enum GeolocationSourceError {
        /// Network transport failed before a usable response arrived.
        Transport { message: String } =>
            "geolocation transport failed: {message}",
        /// The call exceeded its timeout.
        Timeout { message: String } =>
            "geolocation timeout: {message}",
        /// The service rate-limited the call.
        RateLimited { message: String } =>
            "geolocation service rate limited request: {message}",
        /// The response body could not be decoded.
        Decode { message: String } =>
            "geolocation response decode failed: {message}",
        /// The adapter refused the request before sending it.
        InvalidRequest { message: String } =>
            "geolocation request invalid: {message}",
    }
}

/// Port for resolving up to [`GEOLOCATION_BATCH_LIMIT`] addresses per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeolocationSource: Send + Sync {
    /// Look up every address in `ip_addresses` with a single external call.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let results = source
    ///     .lookup_batch(&["1.1.1.1".to_owned(), "10.0.0.1".to_owned()])
    ///     .await?;
    /// assert_eq!(results.len(), 2);
    /// # Ok::<(), user_migration::domain::ports::GeolocationSourceError>(())
    /// ```
    async fn lookup_batch(
        &self,
        ip_addresses: &[String],
    ) -> Result<Vec<GeolocationResult>, GeolocationSourceError>;
}
