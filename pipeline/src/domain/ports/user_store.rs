//! Driven port for the persisted user store.
//!
//! The identity resolver reads through this port and the persistence applier
//! writes through it. Adapters own connection handling; each call acquires
//! whatever it needs and releases it before returning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Email, GeoEnrichment, UserRecord};

use super::define_port_error;

/// A user row as stored, including its primary key and pipeline flag.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedUser {
    /// Stable primary key.
    pub id: i32,
    /// Identity.
    pub email: Email,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Gender.
    pub gender: Option<String>,
    /// Last known IP address.
    pub ip_address: Option<String>,
    /// Source creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
    /// Source modification timestamp.
    pub updated_at: Option<DateTime<Utc>>,
    /// Password hash.
    pub password: Option<String>,
    /// Active-status flag.
    pub status: Option<bool>,
    /// Geolocation columns, present when latitude and longitude are set.
    pub geolocation: Option<GeoEnrichment>,
    /// True once the pipeline has updated this row at least once.
    pub updated: bool,
    /// Timestamp of the pipeline run that last wrote the row.
    pub migrated_at: Option<DateTime<Utc>>,
}

/// Row written for an identity that is not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPersistedUser {
    /// Identity.
    pub email: Email,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Gender.
    pub gender: Option<String>,
    /// IP address.
    pub ip_address: Option<String>,
    /// Source creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
    /// Source modification timestamp.
    pub updated_at: Option<DateTime<Utc>>,
    /// Password hash.
    pub password: Option<String>,
    /// Active-status flag.
    pub status: Option<bool>,
    /// Joined geolocation, if any.
    pub geolocation: Option<GeoEnrichment>,
    /// Pipeline flag; new rows start untouched.
    pub updated: bool,
    /// Pipeline run timestamp.
    pub migrated_at: Option<DateTime<Utc>>,
}

impl From<&UserRecord> for NewPersistedUser {
    fn from(record: &UserRecord) -> Self {
        Self {
            email: record.email.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            gender: record.gender.clone(),
            ip_address: record.ip_address.clone(),
            created_at: record.created_at,
            updated_at: Some(record.updated_at),
            password: record.password.clone(),
            status: record.status,
            geolocation: record.geolocation.clone(),
            // Mirrors `exists_in_store`, which is false for every insert.
            updated: record.exists_in_store,
            migrated_at: record.migrated_at,
        }
    }
}

/// Mutable columns overwritten for an identity that is already stored.
///
/// `None` values clear the column.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedUserChanges {
    /// IP address.
    pub ip_address: Option<String>,
    /// Password hash.
    pub password: Option<String>,
    /// Active-status flag.
    pub status: Option<bool>,
    /// Joined geolocation; `None` clears every geolocation column.
    pub geolocation: Option<GeoEnrichment>,
    /// Pipeline run timestamp.
    pub migrated_at: Option<DateTime<Utc>>,
}

impl From<&UserRecord> for PersistedUserChanges {
    fn from(record: &UserRecord) -> Self {
        Self {
            ip_address: record.ip_address.clone(),
            password: record.password.clone(),
            status: record.status,
            geolocation: record.geolocation.clone(),
            migrated_at: record.migrated_at,
        }
    }
}

define_port_error! {
    /// Errors raised by user store adapters.
    pub enum UserStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "user store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "user store query failed: {message}",
    }
}

/// Port for reading and writing persisted users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Return the subset of `emails` that already exist in the store.
    async fn find_existing_emails(&self, emails: &[Email]) -> Result<Vec<Email>, UserStoreError>;

    /// Insert `users` in one statement and return the number of rows written.
    async fn insert_users(&self, users: &[NewPersistedUser]) -> Result<usize, UserStoreError>;

    /// Fetch a single user by identity.
    async fn find_by_email(&self, email: &Email) -> Result<Option<PersistedUser>, UserStoreError>;

    /// Overwrite mutable columns on row `id`, set `updated = true`, and commit.
    async fn update_user(
        &self,
        id: i32,
        changes: &PersistedUserChanges,
    ) -> Result<(), UserStoreError>;
}
