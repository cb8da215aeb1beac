//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL user store using Diesel and `diesel-async`
//! - **ip_api**: ip-api.com batch geolocation over reqwest
//! - **csv_source**: CSV directory record source over `cap-std`
//! - **column_mapping**: source-column to canonical-field renames
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod column_mapping;
pub mod csv_source;
pub mod ip_api;
pub mod persistence;
