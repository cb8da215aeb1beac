//! PostgreSQL persistence adapter.
//!
//! - `pool`: bb8 pool of `diesel-async` connections.
//! - `schema`: Diesel table definitions.
//! - `models`: internal row structs (never exposed to the domain).
//! - `diesel_user_store`: the `UserStore` port implementation.
//! - `migrations`: bundled schema SQL.

mod diesel_helpers;
mod diesel_user_store;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_user_store::DieselUserStore;
pub use migrations::{CREATE_USERS_SQL, apply_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
