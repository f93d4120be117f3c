//! Quiver Test Utilities
//!
//! Shared test infrastructure for the Quiver workspace:
//! - Proptest generators for tools, embeddings and tool filters
//! - The "acme" fixture: a seeded `MockStorage` with its graph projection
//! - Assertions for Quiver error variants

// Re-export the in-memory collaborators from their source crates
pub use quiver_graph::{GraphMirror, InMemoryGraph};
pub use quiver_llm::{MockChainAnalyst, MockEmbeddingProvider};
pub use quiver_storage::MockStorage;

pub use quiver_core::{
    CapabilityFilter, DomainFilter, EmbeddingVector, EntityType, QuiverError, QuiverResult,
    RoleFilter, StorageError, Tool, ToolFilter, ToolId, ToolType,
};

/// Tenant every fixture seeds.
pub const ACME: &str = "acme";

/// Model id and size of the fixture embedder.
pub const FIXTURE_MODEL: &str = "mock-embedding";
pub const FIXTURE_DIMENSIONS: i32 = 64;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Quiver types.

    use super::*;
    use proptest::prelude::*;

    /// Role, domain, capability and skill names the acme fixture knows,
    /// plus one unknown name per level.
    pub const ROLE_NAMES: &[&str] = &["viewer", "editor", "ghost_role"];
    pub const DOMAIN_NAMES: &[&str] = &["sales", "finance", "ghost_domain"];
    pub const CAPABILITY_NAMES: &[&str] = &["leads", "billing", "ghost_capability"];
    pub const SKILL_NAMES: &[&str] = &["draft_email", "send_and_log", "qualify_lead", "ghost_skill"];

    pub fn arb_tool_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{2,15}"
    }

    pub fn arb_tool_type() -> impl Strategy<Value = ToolType> {
        prop_oneof![3 => Just(ToolType::General), 1 => Just(ToolType::System)]
    }

    /// A tool in `tenant` without embedding.
    pub fn arb_tool(tenant: &'static str) -> impl Strategy<Value = Tool> {
        (arb_tool_name(), "[a-z ]{0,40}", arb_tool_type()).prop_map(move |(name, description, tool_type)| {
            let mut tool = Tool::new(name, tenant, description);
            tool.tool_type = tool_type;
            tool
        })
    }

    pub fn arb_embedding_vector(dimensions: usize) -> impl Strategy<Value = EmbeddingVector> {
        prop::collection::vec(-1.0f32..1.0f32, dimensions)
            .prop_map(|data| EmbeddingVector::new(data, FIXTURE_MODEL))
    }

    fn pick(names: &'static [&'static str]) -> impl Strategy<Value = String> {
        prop::sample::select(names).prop_map(str::to_string)
    }

    pub fn arb_capability_filter() -> impl Strategy<Value = CapabilityFilter> {
        (pick(CAPABILITY_NAMES), prop::collection::vec(pick(SKILL_NAMES), 0..3))
            .prop_map(|(name, skills)| CapabilityFilter { name, skills })
    }

    pub fn arb_domain_filter() -> impl Strategy<Value = DomainFilter> {
        (pick(DOMAIN_NAMES), prop::collection::vec(arb_capability_filter(), 0..3))
            .prop_map(|(name, capabilities)| DomainFilter { name, capabilities })
    }

    pub fn arb_role_filter() -> impl Strategy<Value = RoleFilter> {
        (pick(ROLE_NAMES), prop::collection::vec(arb_domain_filter(), 0..3))
            .prop_map(|(name, domains)| RoleFilter { name, domains })
    }

    /// Filters over the acme vocabulary, at every depth, sometimes with a
    /// (possibly blank) query.
    pub fn arb_tool_filter() -> impl Strategy<Value = ToolFilter> {
        (
            proptest::option::of(prop_oneof![
                Just(String::new()),
                Just("send email".to_string()),
                Just("find a lead".to_string()),
            ]),
            prop::collection::vec(arb_role_filter(), 0..3),
        )
            .prop_map(|(tool_query, roles)| ToolFilter { tool_query, roles })
    }

    /// Agent ids: the fixture's agent, an agent without roles, an unknown id.
    pub fn arb_agent_id() -> impl Strategy<Value = Option<String>> {
        proptest::option::of(pick(&["bob", "carol", "nobody"]))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! The acme tenant.
    //!
    //! `Acme::seed` builds: tools sys1 (system), t1 and t2 (general); role
    //! "viewer" held by agent "bob" and user "alice"; viewer granted domain
    //! "sales"; "sales" holds capability "leads"; "leads" holds t1 through
    //! CapabilityTool. Agent "carol" exists without roles. The `add_*`
    //! helpers extend it per test.

    use super::*;
    use quiver_core::{
        Agent, Capability, CapabilitySkill, CapabilityTool, Domain, DomainCapability, Role,
        RoleAgent, RoleDomain, RoleUser, Skill, Tenant, ToolRel, ToolSkill, User, UserAgent,
    };
    use quiver_graph::{
        sync_domains_from_db_to_graph, sync_skills_tools_from_db_to_graph,
        sync_workflows_from_db_to_graph, SyncReport,
    };
    use quiver_llm::EmbeddingProvider;
    use quiver_storage::{EntityStore, SkillIngest};
    use std::sync::Arc;

    pub struct Acme {
        pub store: MockStorage,
        pub graph: InMemoryGraph,
        pub embedder: Arc<MockEmbeddingProvider>,
        pub sys1: Tool,
        pub t1: Tool,
        pub t2: Tool,
    }

    impl Acme {
        pub async fn seed() -> QuiverResult<Self> {
            let store = MockStorage::new();
            let embedder = Arc::new(MockEmbeddingProvider::new(FIXTURE_MODEL, FIXTURE_DIMENSIONS));

            store.tenant_upsert(&Tenant::new(ACME)).await?;
            store
                .role_upsert(&Role {
                    name: "viewer".to_string(),
                    tenant_name: ACME.to_string(),
                    role_type: Some("read".to_string()),
                })
                .await?;
            for agent_id in ["bob", "carol"] {
                store
                    .agent_upsert(&Agent {
                        agent_id: agent_id.to_string(),
                        tenant_name: ACME.to_string(),
                        name: None,
                        description: None,
                    })
                    .await?;
            }
            store
                .user_upsert(&User {
                    user_id: "alice".to_string(),
                    tenant_name: ACME.to_string(),
                    email: Some("alice@acme.test".to_string()),
                })
                .await?;
            store
                .role_agent_link(&RoleAgent {
                    tenant_name: ACME.to_string(),
                    role_name: "viewer".to_string(),
                    agent_id: "bob".to_string(),
                })
                .await?;
            store
                .role_user_link(&RoleUser {
                    tenant_name: ACME.to_string(),
                    role_name: "viewer".to_string(),
                    user_id: "alice".to_string(),
                })
                .await?;
            store
                .user_agent_link(&UserAgent {
                    tenant_name: ACME.to_string(),
                    user_id: "alice".to_string(),
                    agent_id: "bob".to_string(),
                })
                .await?;

            store
                .domain_upsert(&Domain::new("sales", ACME).with_description("Selling to customers"))
                .await?;
            store
                .role_domain_link(&RoleDomain {
                    tenant_name: ACME.to_string(),
                    role_name: "viewer".to_string(),
                    domain_name: "sales".to_string(),
                })
                .await?;
            store
                .capability_upsert(&Capability::new("leads", ACME).with_description("Work sales leads"))
                .await?;
            store
                .domain_capability_link(&DomainCapability {
                    tenant_name: ACME.to_string(),
                    domain_name: "sales".to_string(),
                    capability_name: "leads".to_string(),
                })
                .await?;

            let mut acme = Self {
                store,
                graph: InMemoryGraph::new(),
                embedder,
                sys1: Tool::new("sys1", ACME, "List the tools available"),
                t1: Tool::new("t1", ACME, "Find a sales lead by email address"),
                t2: Tool::new("t2", ACME, "Send an email message to a contact"),
            };
            acme.sys1 = acme.add_tool("sys1", "List the tools available", ToolType::System).await?;
            acme.t1 = acme.add_tool("t1", "Find a sales lead by email address", ToolType::General).await?;
            acme.t2 = acme.add_tool("t2", "Send an email message to a contact", ToolType::General).await?;
            acme.add_capability_tool("leads", &acme.t1.clone()).await?;
            Ok(acme)
        }

        pub fn mirror(&self) -> GraphMirror {
            GraphMirror::new(Arc::new(self.graph.clone())).with_strict(true)
        }

        /// Store an embedded tool.
        pub async fn add_tool(
            &self,
            name: &str,
            description: &str,
            tool_type: ToolType,
        ) -> QuiverResult<Tool> {
            let mut tool = Tool::new(name, ACME, description);
            tool.tool_type = tool_type;
            let embedding = self.embedder.embed(description).await?;
            self.store.tool_upsert(&tool.with_embedding(embedding)).await
        }

        pub async fn add_capability(&self, name: &str, domain: Option<&str>) -> QuiverResult<()> {
            self.store.capability_upsert(&Capability::new(name, ACME)).await?;
            if let Some(domain) = domain {
                if self.store.domain_get(ACME, domain).await?.is_none() {
                    self.store.domain_upsert(&Domain::new(domain, ACME)).await?;
                }
                self.store
                    .domain_capability_link(&DomainCapability {
                        tenant_name: ACME.to_string(),
                        domain_name: domain.to_string(),
                        capability_name: name.to_string(),
                    })
                    .await?;
            }
            Ok(())
        }

        pub async fn add_capability_tool(&self, capability: &str, tool: &Tool) -> QuiverResult<bool> {
            self.store
                .capability_tool_link(&CapabilityTool {
                    tenant_name: ACME.to_string(),
                    capability_name: capability.to_string(),
                    tool_id: tool.id,
                })
                .await
        }

        pub async fn add_capability_skill(&self, capability: &str, skill: &str) -> QuiverResult<bool> {
            self.store
                .capability_skill_link(&CapabilitySkill {
                    tenant_name: ACME.to_string(),
                    capability_name: capability.to_string(),
                    skill_name: skill.to_string(),
                })
                .await
        }

        /// Store a skill whose chain is `tools` in order, straight into the
        /// store.
        pub async fn add_skill(
            &self,
            name: &str,
            tools: &[&Tool],
            capabilities: &[&str],
        ) -> QuiverResult<()> {
            let mut skill = Skill::new(name, ACME);
            for tool in tools {
                skill = skill.with_step(tool.name.clone(), None);
            }
            let steps = tools
                .iter()
                .enumerate()
                .map(|(i, tool)| ToolSkill {
                    tenant_name: ACME.to_string(),
                    tool_id: tool.id,
                    skill_name: name.to_string(),
                    step_index: i as i32,
                    step_intent: None,
                })
                .collect();
            self.store
                .skill_ingest(&SkillIngest {
                    skill,
                    steps,
                    capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
                })
                .await?;
            Ok(())
        }

        pub async fn add_tool_rel(&self, source: &Tool, target: &Tool) -> QuiverResult<bool> {
            self.store
                .tool_rel_upsert(&ToolRel {
                    tenant_name: ACME.to_string(),
                    source_tool_id: source.id,
                    target_tool_id: target.id,
                    composite_intent: None,
                    field_mapping: None,
                })
                .await
        }

        /// t3 and skill "qualify_lead" (chain [t3]), with no capability link.
        pub async fn add_qualify_lead(&self) -> QuiverResult<Tool> {
            let t3 = self
                .add_tool("t3", "Score a lead for qualification", ToolType::General)
                .await?;
            self.add_skill("qualify_lead", &[&t3], &[]).await?;
            Ok(t3)
        }

        /// Skills "draft_email" (chain [t1]) and "send_and_log" (chain
        /// [t1, t2]), both under "leads".
        pub async fn add_email_skills(&self) -> QuiverResult<()> {
            self.add_skill("draft_email", &[&self.t1], &["leads"]).await?;
            self.add_skill("send_and_log", &[&self.t1, &self.t2], &["leads"])
                .await
        }

        /// Capability "billing" in domain "finance" with tools a, b, c, d and
        /// relationships a->b, b->c.
        pub async fn add_billing(&self) -> QuiverResult<Vec<Tool>> {
            self.add_capability("billing", Some("finance")).await?;
            let mut tools = Vec::new();
            for name in ["a", "b", "c", "d"] {
                let tool = self
                    .add_tool(name, &format!("billing step {}", name), ToolType::General)
                    .await?;
                self.add_capability_tool("billing", &tool).await?;
                tools.push(tool);
            }
            self.add_tool_rel(&tools[0], &tools[1]).await?;
            self.add_tool_rel(&tools[1], &tools[2]).await?;
            Ok(tools)
        }

        /// Project the whole tenant into the graph.
        pub async fn project(&self) -> QuiverResult<SyncReport> {
            let mirror = self.mirror();
            let mut report = sync_domains_from_db_to_graph(&self.store, &mirror, Some(ACME)).await?;
            report.absorb(sync_skills_tools_from_db_to_graph(&self.store, &mirror, Some(ACME)).await?);
            report.absorb(sync_workflows_from_db_to_graph(&self.store, &mirror, Some(ACME)).await?);
            Ok(report)
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Quiver results.

    use super::*;

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &QuiverResult<T>, entity_type: EntityType) {
        match result {
            Err(QuiverError::Storage(StorageError::NotFound { entity_type: et, .. })) => {
                assert_eq!(*et, entity_type, "NotFound for the wrong entity type");
            }
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_duplicate_tool<T: std::fmt::Debug>(result: &QuiverResult<T>, existing: ToolId) {
        match result {
            Err(e) => assert_eq!(e.duplicate_tool_id(), Some(existing), "got {:?}", e),
            Ok(v) => panic!("Expected DuplicateTool, got Ok: {:?}", v),
        }
    }

    /// All system tools come first, and every system tool of `expected` is present.
    #[track_caller]
    pub fn assert_system_tools_lead(types: &[ToolType], ids: &[ToolId], expected: &[ToolId]) {
        let first_general = types
            .iter()
            .position(|t| *t == ToolType::General)
            .unwrap_or(types.len());
        assert!(
            types[first_general..].iter().all(|t| *t == ToolType::General),
            "system tool after a general tool: {:?}",
            types
        );
        for id in expected {
            assert!(ids.contains(id), "missing system tool {}", id);
        }
    }
}
