//! Domain primitives and services for the user migration pipeline.
//!
//! Purpose: reconcile extracted user rows with the persisted store by email
//! identity, enrich them with IP geolocation, and apply inserts or updates.
//! Services depend only on the ports in [`ports`]; adapters live in
//! `crate::outbound`.
//!
//! Public surface:
//! - Email, RawUserRow, UserRecord, GeoEnrichment: record model.
//! - BatchError: batch-level failure taxonomy.
//! - IdentityResolver, GeolocationEnricher, RecordReconciler,
//!   PersistenceApplier: per-batch services.
//! - MigrationPipeline: batch driver and run loop.

pub mod error;
pub mod geolocation_enricher;
pub mod identity_resolver;
pub mod migration_pipeline;
pub mod persistence_applier;
pub mod ports;
pub mod record_reconciler;
pub mod user_record;

pub use self::error::BatchError;
pub use self::geolocation_enricher::{
    DEFAULT_GEOLOCATION_DELAY, EnrichmentSleeper, GeolocationEnricher, GeolocationEnricherConfig,
    TokioSleeper,
};
pub use self::identity_resolver::IdentityResolver;
pub use self::migration_pipeline::{
    BatchOutcome, MigrationPipeline, MigrationRunError, RunSummary,
};
pub use self::persistence_applier::{ApplyResult, PersistenceApplier};
pub use self::record_reconciler::{ReconciledBatch, RecordReconciler};
pub use self::user_record::{
    EMAIL_MAX, Email, EmailValidationError, GeoEnrichment, RawUserRow, RecordValidationError,
    UserRecord, field, parse_timestamp,
};
