//! Quiver Registry - Tool Search and Skill Inference
//!
//! `Registry` ties the entity store, the graph mirror and the LLM
//! collaborators together:
//!
//! - `search_mcp_tools`: system tools plus the general tools an agent and a
//!   hierarchical filter admit, optionally ranked by embedding similarity
//! - registry writes for tools, domains, capabilities, workflows, tool
//!   relationships and IAM rows, mirrored into the graph best-effort
//! - `ingest_skill`, `analyze_tool_relationships` and
//!   `infer_skills_for_capability` for skill discovery

mod catalog;
mod config;
mod registry;
mod search;
mod skills;
pub mod telemetry;

pub use config::QuiverConfig;
pub use registry::Registry;
pub use search::{SearchRequest, ToolSearchResult};
pub use skills::{RelationshipReport, SkillIngestReport};

// Re-export the graph sync entry points used by the quiver-sync binary.
pub use quiver_graph::{
    sync_domains_from_db_to_graph, sync_skills_tools_from_db_to_graph,
    sync_workflows_from_db_to_graph, SyncReport,
};
