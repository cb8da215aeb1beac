//! In-memory user store honouring the store port's semantics.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::Email;
use crate::domain::ports::{
    NewPersistedUser, PersistedUser, PersistedUserChanges, UserStore, UserStoreError,
};

/// Store operation names used for failure injection and call recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StoreOperation {
    /// `find_existing_emails`.
    FindExisting,
    /// `insert_users`.
    Insert,
    /// `find_by_email`.
    FindByEmail,
    /// `update_user`.
    Update,
}

#[derive(Default)]
struct StoreState {
    users: Vec<PersistedUser>,
    next_id: i32,
    failing: BTreeSet<StoreOperation>,
    hidden_from_lookup: BTreeSet<Email>,
    calls: Vec<StoreOperation>,
}

impl StoreState {
    fn record(&mut self, operation: StoreOperation) -> Result<(), UserStoreError> {
        self.calls.push(operation);
        if self.failing.contains(&operation) {
            return Err(UserStoreError::connection(format!(
                "injected {operation:?} failure"
            )));
        }
        Ok(())
    }

    fn persist(&mut self, user: &NewPersistedUser) {
        self.next_id += 1;
        self.users.push(PersistedUser {
            id: self.next_id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            gender: user.gender.clone(),
            ip_address: user.ip_address.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
            password: user.password.clone(),
            status: user.status,
            geolocation: user.geolocation.clone(),
            updated: user.updated,
            migrated_at: user.migrated_at,
        });
    }
}

/// Mutex-guarded store with a unique email constraint.
#[derive(Default)]
pub struct InMemoryUserStore {
    state: Mutex<StoreState>,
}

impl InMemoryUserStore {
    /// Seed the store with existing rows, assigning ids from 1.
    pub fn with_users(users: impl IntoIterator<Item = NewPersistedUser>) -> Self {
        let store = Self::default();
        {
            let mut state = store.lock_state();
            for user in users {
                state.persist(&user);
            }
        }
        store
    }

    /// Make every call to `operation` fail with a connection error.
    #[must_use]
    pub fn failing_on(self, operation: StoreOperation) -> Self {
        self.lock_state().failing.insert(operation);
        self
    }

    /// Report `email` as existing but miss it on `find_by_email`, as if the
    /// row vanished between classification and update.
    #[must_use]
    pub fn hiding_on_lookup(self, email: Email) -> Self {
        self.lock_state().hidden_from_lookup.insert(email);
        self
    }

    /// Snapshot of every stored row, in insertion order.
    pub fn users(&self) -> Vec<PersistedUser> {
        self.lock_state().users.clone()
    }

    /// Stored row for `email`, ignoring lookup hiding.
    pub fn find(&self, email: &Email) -> Option<PersistedUser> {
        self.lock_state()
            .users
            .iter()
            .find(|user| &user.email == email)
            .cloned()
    }

    /// Operations invoked so far, in call order.
    pub fn calls(&self) -> Vec<StoreOperation> {
        self.lock_state().calls.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("user store mutex"),
        }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_existing_emails(&self, emails: &[Email]) -> Result<Vec<Email>, UserStoreError> {
        let mut state = self.lock_state();
        state.record(StoreOperation::FindExisting)?;
        Ok(state
            .users
            .iter()
            .filter(|user| emails.contains(&user.email))
            .map(|user| user.email.clone())
            .collect())
    }

    async fn insert_users(&self, users: &[NewPersistedUser]) -> Result<usize, UserStoreError> {
        let mut state = self.lock_state();
        state.record(StoreOperation::Insert)?;

        let mut seen = state
            .users
            .iter()
            .map(|user| user.email.clone())
            .collect::<BTreeSet<_>>();
        if users.iter().any(|user| !seen.insert(user.email.clone())) {
            return Err(UserStoreError::query(
                "duplicate key value violates unique constraint \"users_email_key\"",
            ));
        }
        for user in users {
            state.persist(user);
        }
        Ok(users.len())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<PersistedUser>, UserStoreError> {
        let mut state = self.lock_state();
        state.record(StoreOperation::FindByEmail)?;
        if state.hidden_from_lookup.contains(email) {
            return Ok(None);
        }
        Ok(state
            .users
            .iter()
            .find(|user| &user.email == email)
            .cloned())
    }

    async fn update_user(
        &self,
        id: i32,
        changes: &PersistedUserChanges,
    ) -> Result<(), UserStoreError> {
        let mut state = self.lock_state();
        state.record(StoreOperation::Update)?;
        if let Some(user) = state.users.iter_mut().find(|user| user.id == id) {
            user.ip_address.clone_from(&changes.ip_address);
            user.password.clone_from(&changes.password);
            user.status = changes.status;
            user.geolocation.clone_from(&changes.geolocation);
            user.migrated_at = changes.migrated_at;
            user.updated = true;
        }
        Ok(())
    }
}

/// Build a stored-row fixture with only the identity populated.
///
/// # Panics
///
/// Panics when `email` is not a valid address.
pub fn new_user(address: &str) -> NewPersistedUser {
    let email = match Email::new(address) {
        Ok(email) => email,
        Err(error) => panic!("fixture email '{address}' is invalid: {error}"),
    };
    NewPersistedUser {
        email,
        first_name: None,
        last_name: None,
        gender: None,
        ip_address: None,
        created_at: None,
        updated_at: None,
        password: None,
        status: None,
        geolocation: None,
        updated: false,
        migrated_at: None,
    }
}
