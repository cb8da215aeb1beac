//! Batch reconciliation: normalise, deduplicate, classify, and enrich.
//!
//! The reconciler turns one chunk of raw rows into records ready for the
//! persistence applier. Rows that cannot be normalised are rejected one at a
//! time; store and enrichment failures abort the whole batch.

use std::collections::BTreeSet;
use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, warn};

use crate::domain::{
    BatchError, GeolocationEnricher, IdentityResolver, RawUserRow, UserRecord,
};

/// Output of [`RecordReconciler::reconcile`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconciledBatch {
    /// One record per identity, classified and enriched. Order is unspecified.
    pub records: Vec<UserRecord>,
    /// Rows dropped during normalisation.
    pub rejected: usize,
}

/// Domain service producing classified, enriched batches.
pub struct RecordReconciler {
    resolver: IdentityResolver,
    enricher: GeolocationEnricher,
    clock: Arc<dyn Clock>,
}

impl RecordReconciler {
    /// Create a reconciler from its collaborators.
    pub fn new(
        resolver: IdentityResolver,
        enricher: GeolocationEnricher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            enricher,
            clock,
        }
    }

    /// Reconcile one batch of raw rows.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::StoreUnavailable`] when identity resolution fails
    /// and [`BatchError::EnrichmentUnavailable`] when a geolocation call fails.
    pub async fn reconcile(&self, rows: Vec<RawUserRow>) -> Result<ReconciledBatch, BatchError> {
        let (normalised, rejected) = normalise(&rows);
        let mut records = deduplicate(normalised);

        let identities = records
            .iter()
            .map(|record| record.email.clone())
            .collect::<BTreeSet<_>>();
        let existing = self.resolver.resolve_existing(&identities).await?;
        for record in &mut records {
            record.exists_in_store = existing.contains(&record.email);
        }

        let ip_addresses = records
            .iter()
            .filter_map(|record| record.ip_address.clone())
            .collect::<BTreeSet<_>>();
        let enrichments = self.enricher.enrich(&ip_addresses).await?;

        let migrated_at = self.clock.utc();
        for record in &mut records {
            record.geolocation = record
                .ip_address
                .as_ref()
                .and_then(|ip_address| enrichments.get(ip_address))
                .cloned();
            record.migrated_at = Some(migrated_at);
        }

        debug!(
            rows = rows.len(),
            records = records.len(),
            existing = existing.len(),
            enriched = enrichments.len(),
            rejected,
            "batch reconciled"
        );
        Ok(ReconciledBatch { records, rejected })
    }
}

fn normalise(rows: &[RawUserRow]) -> (Vec<UserRecord>, usize) {
    let mut records = Vec::with_capacity(rows.len());
    let mut rejected = 0_usize;
    for row in rows {
        match UserRecord::from_raw(row) {
            Ok(record) => records.push(record),
            Err(error) => {
                rejected += 1;
                warn!(position = row.position(), %error, "rejected malformed row");
            }
        }
    }
    (records, rejected)
}

/// Keep the most recently updated record per identity.
///
/// Ties keep the earliest row in input order.
fn deduplicate(mut records: Vec<UserRecord>) -> Vec<UserRecord> {
    records.sort_by(|left, right| {
        left.email
            .cmp(&right.email)
            .then_with(|| right.updated_at.cmp(&left.updated_at))
    });
    records.dedup_by(|later, kept| later.email == kept.email);
    records
}

#[cfg(test)]
#[path = "record_reconciler_tests.rs"]
mod tests;
