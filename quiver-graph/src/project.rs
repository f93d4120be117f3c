//! Projection of relational entities onto graph nodes and edges.

use crate::store::{GraphEdge, GraphNode, NodeKey, Properties};
use quiver_core::{
    Capability, Domain, EdgeKind, NodeLabel, Skill, Tool, ToolSkill, Workflow, WorkflowStep,
};
use serde_json::Value;

fn node(label: NodeLabel, name: &str, tenant: &str) -> GraphNode {
    let mut properties = Properties::new();
    properties.insert("name".into(), Value::from(name));
    properties.insert("tenant_name".into(), Value::from(tenant));
    GraphNode {
        key: NodeKey::new(label, name, tenant),
        properties,
    }
}

fn set_opt(props: &mut Properties, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        props.insert(key.to_string(), Value::from(v.as_str()));
    }
}

pub fn domain_node(domain: &Domain) -> GraphNode {
    let mut n = node(NodeLabel::Domain, &domain.name, &domain.tenant_name);
    set_opt(&mut n.properties, "label", &domain.label);
    set_opt(&mut n.properties, "description", &domain.description);
    n
}

pub fn capability_node(capability: &Capability) -> GraphNode {
    let mut n = node(NodeLabel::Capability, &capability.name, &capability.tenant_name);
    set_opt(&mut n.properties, "label", &capability.label);
    set_opt(&mut n.properties, "description", &capability.description);
    n
}

pub fn skill_node(skill: &Skill) -> GraphNode {
    let mut n = node(NodeLabel::Skill, &skill.name, &skill.tenant_name);
    set_opt(&mut n.properties, "label", &skill.label);
    set_opt(&mut n.properties, "description", &skill.description);
    set_opt(&mut n.properties, "operational_intent", &skill.operational_intent);
    n
}

/// Tool node. The relational id travels as a property; the graph key stays
/// the tool name.
pub fn tool_node(tool: &Tool) -> GraphNode {
    let mut n = node(NodeLabel::Tool, &tool.name, &tool.tenant);
    let props = &mut n.properties;
    props.insert("id".into(), Value::from(tool.id.to_string()));
    props.insert("description".into(), Value::from(tool.description.as_str()));
    props.insert("tool_type".into(), Value::from(tool.tool_type.as_db_str()));
    set_opt(props, "app_name", &tool.app_name);
    n
}

pub fn workflow_node(workflow: &Workflow) -> GraphNode {
    let mut n = node(NodeLabel::Workflow, &workflow.name, &workflow.tenant_name);
    set_opt(&mut n.properties, "label", &workflow.label);
    set_opt(&mut n.properties, "description", &workflow.description);
    n
}

pub fn workflow_step_node(workflow: &Workflow, step: &WorkflowStep) -> GraphNode {
    let mut n = node(
        NodeLabel::WorkflowStep,
        &workflow.step_node_name(step),
        &workflow.tenant_name,
    );
    let props = &mut n.properties;
    props.insert("step_name".into(), Value::from(step.name.as_str()));
    props.insert("step_index".into(), Value::from(step.step_index));
    props.insert("workflow".into(), Value::from(workflow.name.as_str()));
    set_opt(props, "intent", &step.intent);
    n
}

/// Key of a node without its properties.
pub fn key(label: NodeLabel, name: &str, tenant: &str) -> NodeKey {
    NodeKey::new(label, name, tenant)
}

pub fn uses_tool_edge(tenant: &str, skill: &str, tool: &str, step: &ToolSkill) -> GraphEdge {
    let mut edge = GraphEdge::between(EdgeKind::UsesTool, tenant, skill, tool)
        .with_property("step_index", step.step_index);
    if let Some(intent) = &step.step_intent {
        edge = edge.with_property("step_intent", intent.as_str());
    }
    edge
}

pub fn next_tool_edge(
    tenant: &str,
    source: &str,
    target: &str,
    composite_intent: Option<&str>,
) -> GraphEdge {
    let edge = GraphEdge::between(EdgeKind::NextTool, tenant, source, target);
    match composite_intent {
        Some(intent) => edge.with_property("composite_intent", intent),
        None => edge,
    }
}

/// Every edge a workflow projects to: HAS_STEP per step, NEXT_STEP between
/// consecutive steps, IN_DOMAIN and REQUIRES_CAPABILITY per step link.
pub fn workflow_edges(workflow: &Workflow) -> Vec<GraphEdge> {
    let tenant = workflow.tenant_name.as_str();
    let mut steps: Vec<&WorkflowStep> = workflow.steps.iter().collect();
    steps.sort_by_key(|s| s.step_index);

    let mut edges = Vec::new();
    for step in &steps {
        let step_name = workflow.step_node_name(step);
        edges.push(
            GraphEdge::between(EdgeKind::HasStep, tenant, workflow.name.as_str(), step_name.as_str())
                .with_property("step_index", step.step_index),
        );
        for domain in &step.domains {
            edges.push(GraphEdge::between(
                EdgeKind::InDomain,
                tenant,
                step_name.as_str(),
                domain.as_str(),
            ));
        }
        for capability in &step.capabilities {
            edges.push(GraphEdge::between(
                EdgeKind::RequiresCapability,
                tenant,
                step_name.as_str(),
                capability.as_str(),
            ));
        }
    }
    for pair in steps.windows(2) {
        edges.push(GraphEdge::between(
            EdgeKind::NextStep,
            tenant,
            workflow.step_node_name(pair[0]),
            workflow.step_node_name(pair[1]),
        ));
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(idx: i32, name: &str) -> WorkflowStep {
        WorkflowStep {
            step_index: idx,
            name: name.to_string(),
            intent: None,
            domains: vec!["sales".to_string()],
            capabilities: Vec::new(),
        }
    }

    #[test]
    fn test_tool_node_carries_id_and_type() {
        let tool = Tool::new("lookup_lead", "acme", "Find a lead");
        let n = tool_node(&tool);
        assert_eq!(n.key, NodeKey::new(NodeLabel::Tool, "lookup_lead", "acme"));
        assert_eq!(n.properties["id"], Value::from(tool.id.to_string()));
        assert_eq!(n.properties["tool_type"], Value::from("general"));
    }

    #[test]
    fn test_workflow_edges_link_steps_in_order() {
        let mut workflow = Workflow::new("onboard", "acme");
        workflow.steps = vec![step(1, "verify"), step(0, "collect")];
        let edges = workflow_edges(&workflow);

        let next: Vec<_> = edges
            .iter()
            .filter(|e| e.kind == EdgeKind::NextStep)
            .collect();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].source.name, "onboard#0");
        assert_eq!(next[0].target.name, "onboard#1");
        assert_eq!(edges.iter().filter(|e| e.kind == EdgeKind::HasStep).count(), 2);
        assert_eq!(edges.iter().filter(|e| e.kind == EdgeKind::InDomain).count(), 2);
    }

    #[test]
    fn test_uses_tool_edge_properties() {
        let step = ToolSkill {
            tenant_name: "acme".into(),
            tool_id: quiver_core::new_tool_id(),
            skill_name: "qualify".into(),
            step_index: 2,
            step_intent: Some("score".into()),
        };
        let edge = uses_tool_edge("acme", "qualify", "score_lead", &step);
        assert_eq!(edge.properties["step_index"], Value::from(2));
        assert_eq!(edge.properties["step_intent"], Value::from("score"));
    }
}
