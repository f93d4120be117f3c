//! Quiver Core - Entity Types
//!
//! Data structures shared by every Quiver crate: the tenant-scoped business
//! hierarchy (domains, capabilities, skills, tools), workflows, IAM rows,
//! the hierarchical tool filter, and the layered error types.

mod chain;
mod config;
mod embedding;
mod entities;
mod enums;
mod error;
mod filter;
mod identity;

pub use chain::*;
pub use config::*;
pub use embedding::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use filter::*;
pub use identity::*;
