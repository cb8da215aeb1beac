//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `migrations/` exactly. When the migration
//! changes, update this file by hand or regenerate it with
//! `diesel print-schema` against a migrated database.

diesel::table! {
    /// Migrated user accounts.
    ///
    /// `email` is unique. Descriptive columns are written on insert only;
    /// the pipeline overwrites the contact, status, and geolocation columns
    /// on update and flips `updated`.
    users (id) {
        /// Primary key.
        id -> Int4,
        first_name -> Nullable<Varchar>,
        last_name -> Nullable<Varchar>,
        /// Identity; unique across the table.
        email -> Varchar,
        gender -> Nullable<Varchar>,
        ip_address -> Nullable<Varchar>,
        /// Source creation timestamp.
        created_at -> Nullable<Timestamptz>,
        /// Source modification timestamp.
        updated_at -> Nullable<Timestamptz>,
        /// Password hash as exported.
        password -> Nullable<Varchar>,
        status -> Nullable<Bool>,
        latitude -> Nullable<Float8>,
        longitude -> Nullable<Float8>,
        country -> Nullable<Varchar>,
        region -> Nullable<Varchar>,
        city -> Nullable<Varchar>,
        timezone -> Nullable<Varchar>,
        isp_name -> Nullable<Varchar>,
        /// Set once the pipeline has updated the row.
        updated -> Bool,
        /// Timestamp of the run that last wrote the row.
        migrated_at -> Nullable<Timestamptz>,
    }
}
