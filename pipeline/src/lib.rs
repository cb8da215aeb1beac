//! User migration library: CSV ingest, identity reconciliation, IP
//! geolocation enrichment, and PostgreSQL persistence.

pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
