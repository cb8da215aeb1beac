//! Identity resolution against the persisted user store.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::domain::ports::UserStore;
use crate::domain::{BatchError, Email};

/// Domain service answering which identities are already stored.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn UserStore>,
}

impl IdentityResolver {
    /// Create a resolver reading through `store`.
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Return the subset of `identities` present in the store.
    ///
    /// An empty input short-circuits without a store round-trip.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::StoreUnavailable`] when the lookup fails.
    pub async fn resolve_existing(
        &self,
        identities: &BTreeSet<Email>,
    ) -> Result<BTreeSet<Email>, BatchError> {
        if identities.is_empty() {
            return Ok(BTreeSet::new());
        }

        let requested = identities.iter().cloned().collect::<Vec<_>>();
        let found = self.store.find_existing_emails(&requested).await?;
        // Adapters may echo identities that were never asked for.
        let existing = found
            .into_iter()
            .filter(|email| identities.contains(email))
            .collect::<BTreeSet<_>>();

        debug!(
            requested = identities.len(),
            existing = existing.len(),
            "resolved stored identities"
        );
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::ports::{MockUserStore, UserStoreError};

    fn email(value: &str) -> Email {
        Email::new(value).expect("valid email")
    }

    #[rstest]
    #[tokio::test]
    async fn returns_the_stored_subset() {
        let mut store = MockUserStore::new();
        store
            .expect_find_existing_emails()
            .withf(|emails| emails.to_vec() == vec![email("a@x.com"), email("b@x.com")])
            .times(1)
            .return_once(|_| Ok(vec![email("b@x.com")]));
        let resolver = IdentityResolver::new(Arc::new(store));

        let existing = resolver
            .resolve_existing(&BTreeSet::from([email("b@x.com"), email("a@x.com")]))
            .await
            .expect("lookup succeeds");

        assert_eq!(existing, BTreeSet::from([email("b@x.com")]));
    }

    #[rstest]
    #[tokio::test]
    async fn ignores_identities_that_were_not_requested() {
        let mut store = MockUserStore::new();
        store
            .expect_find_existing_emails()
            .return_once(|_| Ok(vec![email("a@x.com"), email("stray@x.com")]));
        let resolver = IdentityResolver::new(Arc::new(store));

        let existing = resolver
            .resolve_existing(&BTreeSet::from([email("a@x.com")]))
            .await
            .expect("lookup succeeds");

        assert_eq!(existing, BTreeSet::from([email("a@x.com")]));
    }

    #[rstest]
    #[tokio::test]
    async fn empty_input_skips_the_store() {
        let mut store = MockUserStore::new();
        store.expect_find_existing_emails().times(0);
        let resolver = IdentityResolver::new(Arc::new(store));

        let existing = resolver
            .resolve_existing(&BTreeSet::new())
            .await
            .expect("empty lookup succeeds");

        assert!(existing.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn store_failures_become_store_unavailable() {
        let mut store = MockUserStore::new();
        store
            .expect_find_existing_emails()
            .return_once(|_| Err(UserStoreError::connection("pool timed out")));
        let resolver = IdentityResolver::new(Arc::new(store));

        let error = resolver
            .resolve_existing(&BTreeSet::from([email("a@x.com")]))
            .await
            .expect_err("lookup fails");

        assert_eq!(
            error,
            BatchError::store_unavailable("user store connection failed: pool timed out")
        );
    }
}
