//! Quiver Graph - Property-Graph Mirror
//!
//! Projects domains, capabilities, skills, tools and workflows from the
//! entity store into a property graph, keeps the projection current on
//! incremental writes, re-derives it on full resync, and reads candidate
//! tool paths back out for skill inference.

mod config;
mod memory;
mod mirror;
mod neo4j;
mod paths;
pub mod project;
mod store;
mod sync;

pub use config::GraphConfig;
pub use memory::InMemoryGraph;
pub use mirror::GraphMirror;
pub use neo4j::Neo4jHttpGraph;
pub use paths::candidate_paths;
pub use store::{
    Direction, GraphCounts, GraphEdge, GraphNode, GraphResult, GraphStore, NodeKey, Properties,
};
pub use sync::{
    sync_domains_from_db_to_graph, sync_skills_tools_from_db_to_graph,
    sync_workflows_from_db_to_graph, SyncReport,
};
