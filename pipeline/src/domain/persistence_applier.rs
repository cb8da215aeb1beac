//! Insert/update application of reconciled records.
//!
//! New identities are inserted in one statement. Existing identities are
//! updated one at a time and each update commits on its own, so an error
//! part-way through leaves earlier updates in place.

use std::sync::Arc;

use tracing::debug;

use crate::domain::ports::{NewPersistedUser, PersistedUserChanges, UserStore};
use crate::domain::{BatchError, UserRecord};

/// Row counts written by [`PersistenceApplier::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyResult {
    /// Rows inserted for new identities.
    pub inserted: usize,
    /// Rows updated for existing identities.
    pub updated: usize,
}

/// Domain service writing reconciled records to the store.
#[derive(Clone)]
pub struct PersistenceApplier {
    store: Arc<dyn UserStore>,
}

impl PersistenceApplier {
    /// Create an applier writing through `store`.
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Insert new records and update existing ones.
    ///
    /// Existing records whose row can no longer be found are skipped and not
    /// counted.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::StoreUnavailable`] when the insert, a lookup, or
    /// an update fails.
    pub async fn apply(&self, records: &[UserRecord]) -> Result<ApplyResult, BatchError> {
        let (existing, new): (Vec<&UserRecord>, Vec<&UserRecord>) =
            records.iter().partition(|record| record.exists_in_store);

        let inserted = if new.is_empty() {
            0
        } else {
            let rows = new
                .into_iter()
                .map(NewPersistedUser::from)
                .collect::<Vec<_>>();
            self.store.insert_users(&rows).await?
        };

        let mut updated = 0_usize;
        for record in existing {
            let Some(stored) = self.store.find_by_email(&record.email).await? else {
                debug!(email = %record.email, "stored user vanished before update; skipping");
                continue;
            };
            self.store
                .update_user(stored.id, &PersistedUserChanges::from(record))
                .await?;
            updated += 1;
        }

        Ok(ApplyResult { inserted, updated })
    }
}
