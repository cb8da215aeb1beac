//! PostgreSQL-backed user store adapter.
//!
//! Each operation checks out its own pooled connection. Statements run in
//! autocommit mode, so every update commits on its own.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;

use super::diesel_helpers::{map_diesel_error, map_pool_error};
use super::models::{NewUserRow, UserChangeset, UserRow};
use super::pool::DbPool;
use super::schema::users;
use crate::domain::Email;
use crate::domain::ports::{
    NewPersistedUser, PersistedUser, PersistedUserChanges, UserStore, UserStoreError,
};

/// Diesel-backed implementation of the user store port.
#[derive(Clone)]
pub struct DieselUserStore {
    pool: DbPool,
}

impl DieselUserStore {
    /// Create a store over `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for DieselUserStore {
    async fn find_existing_emails(&self, emails: &[Email]) -> Result<Vec<Email>, UserStoreError> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        let addresses = emails.iter().map(AsRef::as_ref).collect::<Vec<&str>>();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let stored: Vec<String> = users::table
            .filter(users::email.eq_any(addresses))
            .select(users::email)
            .load(&mut conn)
            .await
            .map_err(|error| map_diesel_error(error, "find existing emails"))?;

        Ok(stored
            .into_iter()
            .filter_map(|address| match Email::new(&address) {
                Ok(email) => Some(email),
                Err(error) => {
                    warn!(%address, %error, "ignoring stored row with an invalid email");
                    None
                }
            })
            .collect())
    }

    async fn insert_users(&self, new_users: &[NewPersistedUser]) -> Result<usize, UserStoreError> {
        if new_users.is_empty() {
            return Ok(0);
        }

        let rows = new_users.iter().map(NewUserRow::from).collect::<Vec<_>>();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(users::table)
            .values(&rows)
            .execute(&mut conn)
            .await
            .map_err(|error| map_diesel_error(error, "insert users"))
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<PersistedUser>, UserStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = users::table
            .filter(users::email.eq(email.as_ref()))
            .select(UserRow::as_select())
            .first::<UserRow>(&mut conn)
            .await
            .optional()
            .map_err(|error| map_diesel_error(error, "find user by email"))?;

        row.map(|stored| {
            stored.into_persisted().map_err(|error| {
                UserStoreError::query(format!("stored email for {email} is invalid: {error}"))
            })
        })
        .transpose()
    }

    async fn update_user(
        &self,
        id: i32,
        changes: &PersistedUserChanges,
    ) -> Result<(), UserStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let affected = diesel::update(users::table.find(id))
            .set(&UserChangeset::from(changes))
            .execute(&mut conn)
            .await
            .map_err(|error| map_diesel_error(error, "update user"))?;
        if affected == 0 {
            warn!(id, "update matched no rows");
        }
        Ok(())
    }
}
