//! Batch driver composing reconciliation and persistence.
//!
//! Batches are processed strictly one after another. A failed batch stops
//! the run; batches applied before it stay applied.

use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};

use crate::domain::ports::UserRecordSource;
use crate::domain::{
    ApplyResult, BatchError, PersistenceApplier, RawUserRow, ReconciledBatch, RecordReconciler,
};

/// Counts for one processed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    /// Rows inserted.
    pub inserted: usize,
    /// Rows updated.
    pub updated: usize,
    /// Rows rejected during normalisation.
    pub rejected: usize,
}

/// Totals for a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Batches processed.
    pub batches: usize,
    /// Rows inserted across all batches.
    pub inserted: usize,
    /// Rows updated across all batches.
    pub updated: usize,
    /// Rows rejected across all batches.
    pub rejected: usize,
}

impl RunSummary {
    fn absorb(&mut self, outcome: BatchOutcome) {
        self.batches += 1;
        self.inserted += outcome.inserted;
        self.updated += outcome.updated;
        self.rejected += outcome.rejected;
    }
}

/// Reasons a run halted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationRunError {
    /// The record source failed before producing the next batch.
    #[error("reading the next batch failed after {completed_batches} completed batches: {error}")]
    Extraction {
        /// Batches applied before the failure.
        completed_batches: usize,
        /// Underlying failure.
        #[source]
        error: BatchError,
    },
    /// A batch was aborted.
    #[error("batch {label} failed after {completed_batches} completed batches: {error}")]
    Batch {
        /// Label of the aborted batch.
        label: String,
        /// Batches applied before the failure.
        completed_batches: usize,
        /// Underlying failure.
        #[source]
        error: BatchError,
    },
}

impl MigrationRunError {
    /// Batches applied before the run halted.
    pub fn completed_batches(&self) -> usize {
        match self {
            Self::Extraction {
                completed_batches, ..
            }
            | Self::Batch {
                completed_batches, ..
            } => *completed_batches,
        }
    }

    /// The batch-level failure that halted the run.
    pub fn batch_error(&self) -> &BatchError {
        match self {
            Self::Extraction { error, .. } | Self::Batch { error, .. } => error,
        }
    }
}

/// Drives reconciliation then persistence for each batch.
pub struct MigrationPipeline {
    reconciler: RecordReconciler,
    applier: PersistenceApplier,
}

impl MigrationPipeline {
    /// Compose a pipeline from its domain services.
    ///
    /// ```rust,ignore
    /// let store: Arc<dyn UserStore> = Arc::new(DieselUserStore::new(pool));
    /// let pipeline = MigrationPipeline::new(
    ///     RecordReconciler::new(
    ///         IdentityResolver::new(store.clone()),
    ///         GeolocationEnricher::new(geolocation, GeolocationEnricherConfig::default()),
    ///         Arc::new(DefaultClock),
    ///     ),
    ///     PersistenceApplier::new(store),
    /// );
    /// ```
    pub fn new(reconciler: RecordReconciler, applier: PersistenceApplier) -> Self {
        Self {
            reconciler,
            applier,
        }
    }

    /// Reconcile and apply one batch.
    ///
    /// # Errors
    ///
    /// Propagates any [`BatchError`] raised by reconciliation or persistence.
    pub async fn process_batch(&self, rows: Vec<RawUserRow>) -> Result<BatchOutcome, BatchError> {
        let ReconciledBatch { records, rejected } = self.reconciler.reconcile(rows).await?;
        let ApplyResult { inserted, updated } = self.applier.apply(&records).await?;
        info!(inserted, updated, rejected, "batch applied");
        Ok(BatchOutcome {
            inserted,
            updated,
            rejected,
        })
    }

    /// Process every chunk yielded by `source`, halting on the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationRunError`] naming how many batches completed.
    pub async fn run(
        &self,
        source: &mut dyn UserRecordSource,
    ) -> Result<RunSummary, MigrationRunError> {
        let mut summary = RunSummary::default();
        loop {
            let chunk = match source.next_chunk() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(error) => {
                    warn!(%error, completed_batches = summary.batches, "record source failed");
                    return Err(MigrationRunError::Extraction {
                        completed_batches: summary.batches,
                        error: error.into(),
                    });
                }
            };

            let span = info_span!("batch", label = %chunk.label, rows = chunk.rows.len());
            match self.process_batch(chunk.rows).instrument(span).await {
                Ok(outcome) => summary.absorb(outcome),
                Err(error) => {
                    warn!(label = %chunk.label, %error, "batch aborted; halting run");
                    return Err(MigrationRunError::Batch {
                        label: chunk.label,
                        completed_batches: summary.batches,
                        error,
                    });
                }
            }
        }

        info!(
            batches = summary.batches,
            inserted = summary.inserted,
            updated = summary.updated,
            rejected = summary.rejected,
            "migration run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[path = "migration_pipeline_tests.rs"]
mod tests;
