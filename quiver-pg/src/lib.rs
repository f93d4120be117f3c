//! Quiver PG - PostgreSQL Entity Store
//!
//! `PgStore` implements `EntityStore` over a deadpool-postgres pool with the
//! pgvector extension. Run `PgStore::migrate` once to create the schema in
//! `sql/quiver_init.sql`; every statement in it is idempotent.

mod config;
mod error;
mod rows;
mod store;

pub use config::DbConfig;
pub use store::PgStore;
