//! Batch-level failure taxonomy.
//!
//! Every variant aborts the batch being processed. Port errors are mapped
//! into these kinds at the domain boundary so callers only need to decide
//! whether to continue with the next batch or halt the run.

use super::ports::{
    GeolocationSourceError, UserRecordSourceError, UserStoreError, define_port_error,
};

define_port_error! {
    /// Reasons a batch was aborted.
    pub enum BatchError {
        /// The user store could not be queried or written.
        StoreUnavailable { message: String } =>
            "user store unavailable: {message}",
        /// A geolocation lookup failed at the transport level.
        EnrichmentUnavailable { message: String } =>
            "geolocation enrichment unavailable: {message}",
        /// The batch input is structurally unusable.
        MalformedRecord { message: String } =>
            "malformed record: {message}",
    }
}

impl From<UserStoreError> for BatchError {
    fn from(error: UserStoreError) -> Self {
        Self::store_unavailable(error.to_string())
    }
}

impl From<GeolocationSourceError> for BatchError {
    fn from(error: GeolocationSourceError) -> Self {
        Self::enrichment_unavailable(error.to_string())
    }
}

impl From<UserRecordSourceError> for BatchError {
    fn from(error: UserRecordSourceError) -> Self {
        Self::malformed_record(error.to_string())
    }
}
