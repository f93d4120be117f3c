//! Quiver Storage - Entity Store Trait and Mock Implementation
//!
//! Defines the relational storage abstraction for Quiver entities.
//! The PostgreSQL implementation lives in quiver-pg.

mod mock;
mod store;

pub use mock::MockStorage;
pub use store::{
    EntityStore, RankedTool, SkillIngest, SkillIngestOutcome, ToolDeletion,
};
