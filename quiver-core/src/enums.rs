//! Enum types for Quiver entities and the graph projection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTITY ENUMS
// ============================================================================

/// Entity type discriminator, used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Tenant,
    Domain,
    Capability,
    Skill,
    Tool,
    ToolRel,
    Workflow,
    Role,
    User,
    Agent,
    Application,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EntityType::Tenant => "Tenant",
            EntityType::Domain => "Domain",
            EntityType::Capability => "Capability",
            EntityType::Skill => "Skill",
            EntityType::Tool => "Tool",
            EntityType::ToolRel => "ToolRel",
            EntityType::Workflow => "Workflow",
            EntityType::Role => "Role",
            EntityType::User => "User",
            EntityType::Agent => "Agent",
            EntityType::Application => "Application",
        };
        write!(f, "{}", value)
    }
}

/// Tool classification. System tools bypass all hierarchical filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    /// Subject to role/domain/capability filtering
    #[default]
    General,
    /// Always visible to every caller in the tenant
    System,
}

impl ToolType {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ToolType::General => "general",
            ToolType::System => "system",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, ToolTypeParseError> {
        match s.to_lowercase().as_str() {
            "general" => Ok(ToolType::General),
            "system" => Ok(ToolType::System),
            _ => Err(ToolTypeParseError(s.to_string())),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, ToolType::System)
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for ToolType {
    type Err = ToolTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid tool type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolTypeParseError(pub String);

impl fmt::Display for ToolTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid tool type: {}", self.0)
    }
}

impl std::error::Error for ToolTypeParseError {}

// ============================================================================
// GRAPH ENUMS
// ============================================================================

/// Node labels of the graph projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeLabel {
    Domain,
    Capability,
    Skill,
    Tool,
    Workflow,
    WorkflowStep,
}

impl NodeLabel {
    /// Label as written in Cypher.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Domain => "Domain",
            NodeLabel::Capability => "Capability",
            NodeLabel::Skill => "Skill",
            NodeLabel::Tool => "Tool",
            NodeLabel::Workflow => "Workflow",
            NodeLabel::WorkflowStep => "WorkflowStep",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Relationship types of the graph projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Domain -> Capability
    HasCapability,
    /// Capability -> Skill
    HasSkill,
    /// Capability -> Tool
    HasTool,
    /// Skill -> Tool, carries step_index and step_intent
    UsesTool,
    /// Tool -> Tool data-flow edge
    NextTool,
    /// Workflow -> WorkflowStep
    HasStep,
    /// WorkflowStep -> WorkflowStep
    NextStep,
    /// WorkflowStep -> Domain
    InDomain,
    /// WorkflowStep -> Capability
    RequiresCapability,
}

impl EdgeKind {
    /// Relationship type as written in Cypher.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::HasCapability => "HAS_CAPABILITY",
            EdgeKind::HasSkill => "HAS_SKILL",
            EdgeKind::HasTool => "HAS_TOOL",
            EdgeKind::UsesTool => "USES_TOOL",
            EdgeKind::NextTool => "NEXT_TOOL",
            EdgeKind::HasStep => "HAS_STEP",
            EdgeKind::NextStep => "NEXT_STEP",
            EdgeKind::InDomain => "IN_DOMAIN",
            EdgeKind::RequiresCapability => "REQUIRES_CAPABILITY",
        }
    }

    /// The (source, target) labels this relationship connects.
    pub fn endpoints(&self) -> (NodeLabel, NodeLabel) {
        match self {
            EdgeKind::HasCapability => (NodeLabel::Domain, NodeLabel::Capability),
            EdgeKind::HasSkill => (NodeLabel::Capability, NodeLabel::Skill),
            EdgeKind::HasTool => (NodeLabel::Capability, NodeLabel::Tool),
            EdgeKind::UsesTool => (NodeLabel::Skill, NodeLabel::Tool),
            EdgeKind::NextTool => (NodeLabel::Tool, NodeLabel::Tool),
            EdgeKind::HasStep => (NodeLabel::Workflow, NodeLabel::WorkflowStep),
            EdgeKind::NextStep => (NodeLabel::WorkflowStep, NodeLabel::WorkflowStep),
            EdgeKind::InDomain => (NodeLabel::WorkflowStep, NodeLabel::Domain),
            EdgeKind::RequiresCapability => (NodeLabel::WorkflowStep, NodeLabel::Capability),
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_type_db_roundtrip_is_case_insensitive() {
        assert_eq!(ToolType::from_db_str("SYSTEM").unwrap(), ToolType::System);
        assert_eq!("general".parse::<ToolType>().unwrap(), ToolType::General);
        assert!(ToolType::from_db_str("admin").is_err());
    }

    #[test]
    fn test_tool_type_serializes_lowercase() {
        let json = serde_json::to_string(&ToolType::System).unwrap();
        assert_eq!(json, "\"system\"");
    }

    #[test]
    fn test_edge_endpoints() {
        assert_eq!(
            EdgeKind::UsesTool.endpoints(),
            (NodeLabel::Skill, NodeLabel::Tool)
        );
        assert_eq!(EdgeKind::NextTool.as_str(), "NEXT_TOOL");
    }
}
