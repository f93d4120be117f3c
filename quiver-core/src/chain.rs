//! Candidate tool paths handed to skill extraction

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of a candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    /// Two or more tools linked by NEXT_TOOL edges
    Chain,
    /// A lone tool
    SingleTool,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKind::Chain => write!(f, "chain"),
            PathKind::SingleTool => write!(f, "single_tool"),
        }
    }
}

/// An ordered run of tool names within one capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePath {
    #[serde(rename = "type")]
    pub kind: PathKind,
    pub tools: Vec<String>,
}

impl CandidatePath {
    pub fn new(tools: Vec<String>) -> Self {
        let kind = if tools.len() > 1 {
            PathKind::Chain
        } else {
            PathKind::SingleTool
        };
        Self { kind, tools }
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_length() {
        assert_eq!(CandidatePath::new(vec!["a".into(), "b".into()]).kind, PathKind::Chain);
        assert_eq!(CandidatePath::new(vec!["d".into()]).kind, PathKind::SingleTool);
    }

    #[test]
    fn test_serializes_type_tag() {
        let json = serde_json::to_value(CandidatePath::new(vec!["d".into()])).unwrap();
        assert_eq!(json["type"], "single_tool");
        assert_eq!(json["tools"][0], "d");
    }
}
