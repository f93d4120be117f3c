//! Hierarchical tool filter
//!
//! A filter is a tree of named roles, each optionally narrowing to domains,
//! capabilities and finally skill names. An empty child list means "stop
//! narrowing here": the resolver uses the join path of the deepest level
//! that was given.
//!
//! ```json
//! {"tool_query": "send an email",
//!  "roles": [{"name": "viewer",
//!             "domains": [{"name": "sales",
//!                          "capabilities": [{"name": "leads", "skills": ["qualify_lead"]}]}]}]}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level filter passed to tool search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_query: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFilter {
    pub name: String,
    #[serde(default)]
    pub domains: Vec<DomainFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFilter {
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<CapabilityFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFilter {
    pub name: String,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// How far down the hierarchy a filter branch was specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterDepth {
    Role,
    Domain,
    Capability,
    Skill,
}

impl fmt::Display for FilterDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            FilterDepth::Role => "role",
            FilterDepth::Domain => "domain",
            FilterDepth::Capability => "capability",
            FilterDepth::Skill => "skill",
        };
        write!(f, "{}", value)
    }
}

impl ToolFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role branch.
    pub fn with_role(mut self, role: RoleFilter) -> Self {
        self.roles.push(role);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.tool_query = Some(query.into());
        self
    }

    /// Whether the role-filter stage runs at all.
    pub fn has_roles(&self) -> bool {
        !self.roles.is_empty()
    }
}

/// Pick the effective free-text query. An explicit argument wins over the
/// filter's own query; blank strings count as absent.
pub fn resolve_query<'a>(
    explicit: Option<&'a str>,
    filter: Option<&'a ToolFilter>,
) -> Option<&'a str> {
    let non_blank = |q: &&str| !q.trim().is_empty();
    explicit
        .filter(non_blank)
        .or_else(|| {
            filter
                .and_then(|f| f.tool_query.as_deref())
                .filter(non_blank)
        })
}

impl RoleFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domains: Vec::new(),
        }
    }

    pub fn with_domain(mut self, domain: DomainFilter) -> Self {
        self.domains.push(domain);
        self
    }

    /// Deepest level specified anywhere beneath this role.
    pub fn depth(&self) -> FilterDepth {
        self.domains
            .iter()
            .map(DomainFilter::depth)
            .max()
            .unwrap_or(FilterDepth::Role)
    }
}

impl DomainFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capability(mut self, capability: CapabilityFilter) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn depth(&self) -> FilterDepth {
        self.capabilities
            .iter()
            .map(CapabilityFilter::depth)
            .max()
            .unwrap_or(FilterDepth::Domain)
    }
}

impl CapabilityFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skills: Vec::new(),
        }
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.push(skill.into());
        self
    }

    pub fn depth(&self) -> FilterDepth {
        if self.skills.is_empty() {
            FilterDepth::Capability
        } else {
            FilterDepth::Skill
        }
    }
}
