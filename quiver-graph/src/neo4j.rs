//! Neo4j graph store over the HTTP transactional endpoint

use crate::config::GraphConfig;
use crate::store::{
    Direction, GraphCounts, GraphEdge, GraphNode, GraphResult, GraphStore, NodeKey, Properties,
};
use ::async_trait::async_trait;
use quiver_core::{EdgeKind, GraphError, NodeLabel};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
struct Statement {
    statement: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct CommitRequest {
    statements: Vec<Statement>,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<ServerError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    data: Vec<ResultRow>,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    code: String,
    message: String,
}

/// Graph store speaking Cypher to `{uri}/db/{database}/tx/commit`.
///
/// Every call is one auto-committed transaction. Labels and relationship
/// types come from the closed `NodeLabel`/`EdgeKind` enums; all values
/// travel as parameters.
pub struct Neo4jHttpGraph {
    client: Client,
    commit_url: String,
    user: String,
    password: String,
}

impl Neo4jHttpGraph {
    pub fn new(config: &GraphConfig) -> GraphResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GraphError::Unavailable {
                reason: format!("Failed to build client: {}", e),
            })?;
        Ok(Self {
            client,
            commit_url: config.commit_url(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    async fn run(&self, statements: Vec<Statement>) -> GraphResult<Vec<Vec<Vec<Value>>>> {
        let expected = statements.len();
        let response = self
            .client
            .post(&self.commit_url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&CommitRequest { statements })
            .send()
            .await
            .map_err(|e| GraphError::Unavailable {
                reason: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(GraphError::Unavailable {
                reason: format!("graph server answered {}", status),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Query {
                code: status.as_u16().to_string(),
                message: body,
            });
        }

        let parsed: CommitResponse =
            response
                .json()
                .await
                .map_err(|e| GraphError::InvalidResponse {
                    reason: format!("Failed to parse response: {}", e),
                })?;

        if let Some(err) = parsed.errors.into_iter().next() {
            return Err(GraphError::Query {
                code: err.code,
                message: err.message,
            });
        }
        if parsed.results.len() != expected {
            return Err(GraphError::InvalidResponse {
                reason: format!(
                    "Expected {} results but got {}",
                    expected,
                    parsed.results.len()
                ),
            });
        }

        Ok(parsed
            .results
            .into_iter()
            .map(|r| r.data.into_iter().map(|d| d.row).collect())
            .collect())
    }

    async fn run_one(&self, statement: String, parameters: Value) -> GraphResult<Vec<Vec<Value>>> {
        self.run(vec![Statement {
            statement,
            parameters,
        }])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| GraphError::InvalidResponse {
            reason: "No result in response".to_string(),
        })
    }
}

// ============================================================================
// STATEMENT BUILDERS
// ============================================================================

fn node_pattern(var: &str, label: NodeLabel, name_param: &str) -> String {
    format!(
        "({}:{} {{name: ${}, tenant_name: $tenant}})",
        var,
        label.as_str(),
        name_param
    )
}

fn edge_pattern(kind: EdgeKind, direction: Direction) -> String {
    match direction {
        Direction::Outgoing => format!("-[r:{}]->", kind.as_str()),
        Direction::Incoming => format!("<-[r:{}]-", kind.as_str()),
        Direction::Both => format!("-[r:{}]-", kind.as_str()),
    }
}

fn merge_node_statement(label: NodeLabel) -> String {
    format!(
        "MERGE {} SET n += $props",
        node_pattern("n", label, "name")
    )
}

fn merge_edge_statement(edge: &GraphEdge) -> String {
    format!(
        "MATCH {} MATCH {} MERGE (a)-[r:{}]->(b) SET r += $props RETURN count(r)",
        node_pattern("a", edge.source.label, "source"),
        node_pattern("b", edge.target.label, "target"),
        edge.kind.as_str()
    )
}

fn first_count(rows: &[Vec<Value>]) -> GraphResult<usize> {
    match rows.first().and_then(|row| row.first()) {
        None => Ok(0),
        Some(value) => value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| GraphError::InvalidResponse {
                reason: format!("Expected a count, got {}", value),
            }),
    }
}

fn props_of(value: &Value) -> GraphResult<Properties> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        other => Err(GraphError::InvalidResponse {
            reason: format!("Expected a property map, got {}", other),
        }),
    }
}

fn key_from_props(label: NodeLabel, props: &Properties) -> GraphResult<NodeKey> {
    let field = |name: &str| {
        props
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GraphError::InvalidResponse {
                reason: format!("{} node without {}", label, name),
            })
    };
    Ok(NodeKey::new(label, field("name")?, field("tenant_name")?))
}

fn tenant_match(var: &str, tenant: Option<&str>) -> String {
    match tenant {
        Some(_) => format!("WHERE {}.tenant_name = $tenant", var),
        None => String::new(),
    }
}

#[async_trait]
impl GraphStore for Neo4jHttpGraph {
    async fn merge_node(&self, node: &GraphNode) -> GraphResult<()> {
        self.run_one(
            merge_node_statement(node.key.label),
            json!({
                "name": node.key.name,
                "tenant": node.key.tenant,
                "props": node.properties,
            }),
        )
        .await?;
        Ok(())
    }

    async fn merge_edge(&self, edge: &GraphEdge) -> GraphResult<bool> {
        if edge.source.tenant != edge.target.tenant {
            return Err(GraphError::InvalidInput {
                reason: format!(
                    "{} edge crosses tenants {} and {}",
                    edge.kind, edge.source.tenant, edge.target.tenant
                ),
            });
        }
        let rows = self
            .run_one(
                merge_edge_statement(edge),
                json!({
                    "source": edge.source.name,
                    "target": edge.target.name,
                    "tenant": edge.source.tenant,
                    "props": edge.properties,
                }),
            )
            .await?;
        Ok(first_count(&rows)? > 0)
    }

    async fn set_node_properties(
        &self,
        key: &NodeKey,
        properties: &Properties,
    ) -> GraphResult<bool> {
        let statement = format!(
            "MATCH {} SET n += $props RETURN count(n)",
            node_pattern("n", key.label, "name")
        );
        let rows = self
            .run_one(
                statement,
                json!({ "name": key.name, "tenant": key.tenant, "props": properties }),
            )
            .await?;
        Ok(first_count(&rows)? > 0)
    }

    async fn delete_edge(
        &self,
        kind: EdgeKind,
        source: &NodeKey,
        target: &NodeKey,
    ) -> GraphResult<usize> {
        let statement = format!(
            "MATCH {}{}{} DELETE r RETURN count(r)",
            node_pattern("a", source.label, "source"),
            edge_pattern(kind, Direction::Outgoing),
            node_pattern("b", target.label, "target"),
        );
        let rows = self
            .run_one(
                statement,
                json!({ "source": source.name, "target": target.name, "tenant": source.tenant }),
            )
            .await?;
        first_count(&rows)
    }

    async fn delete_edges(
        &self,
        kind: EdgeKind,
        node: &NodeKey,
        direction: Direction,
    ) -> GraphResult<usize> {
        let statement = format!(
            "MATCH {}{}() DELETE r RETURN count(r)",
            node_pattern("n", node.label, "name"),
            edge_pattern(kind, direction),
        );
        let rows = self
            .run_one(statement, json!({ "name": node.name, "tenant": node.tenant }))
            .await?;
        first_count(&rows)
    }

    async fn delete_node(&self, key: &NodeKey) -> GraphResult<bool> {
        let statement = format!(
            "MATCH {} DETACH DELETE n RETURN count(*)",
            node_pattern("n", key.label, "name")
        );
        let rows = self
            .run_one(statement, json!({ "name": key.name, "tenant": key.tenant }))
            .await?;
        Ok(first_count(&rows)? > 0)
    }

    async fn node(&self, key: &NodeKey) -> GraphResult<Option<GraphNode>> {
        let statement = format!(
            "MATCH {} RETURN properties(n)",
            node_pattern("n", key.label, "name")
        );
        let rows = self
            .run_one(statement, json!({ "name": key.name, "tenant": key.tenant }))
            .await?;
        match rows.first().and_then(|row| row.first()) {
            None => Ok(None),
            Some(value) => Ok(Some(GraphNode {
                key: key.clone(),
                properties: props_of(value)?,
            })),
        }
    }

    async fn neighbors(
        &self,
        kind: EdgeKind,
        node: &NodeKey,
        direction: Direction,
    ) -> GraphResult<Vec<GraphNode>> {
        let (source, target) = kind.endpoints();
        let other = match direction {
            Direction::Outgoing => target,
            Direction::Incoming => source,
            Direction::Both if node.label == source => target,
            Direction::Both => source,
        };
        let statement = format!(
            "MATCH {}{}(m:{}) RETURN DISTINCT properties(m) ORDER BY m.name",
            node_pattern("n", node.label, "name"),
            edge_pattern(kind, direction),
            other.as_str(),
        );
        let rows = self
            .run_one(statement, json!({ "name": node.name, "tenant": node.tenant }))
            .await?;
        rows.iter()
            .filter_map(|row| row.first())
            .map(|value| {
                let properties = props_of(value)?;
                Ok(GraphNode {
                    key: key_from_props(other, &properties)?,
                    properties,
                })
            })
            .collect()
    }

    async fn edges_among(
        &self,
        kind: EdgeKind,
        tenant: &str,
        names: &[String],
    ) -> GraphResult<Vec<GraphEdge>> {
        let (source, target) = kind.endpoints();
        let statement = format!(
            "MATCH (a:{} {{tenant_name: $tenant}})-[r:{}]->(b:{} {{tenant_name: $tenant}}) \
             WHERE a.name IN $names AND b.name IN $names \
             RETURN a.name, b.name, properties(r) ORDER BY a.name, b.name",
            source.as_str(),
            kind.as_str(),
            target.as_str(),
        );
        let rows = self
            .run_one(statement, json!({ "tenant": tenant, "names": names }))
            .await?;
        rows.iter()
            .map(|row| match row.as_slice() {
                [Value::String(a), Value::String(b), props] => Ok(GraphEdge {
                    kind,
                    source: NodeKey::new(source, a.clone(), tenant),
                    target: NodeKey::new(target, b.clone(), tenant),
                    properties: props_of(props)?,
                }),
                other => Err(GraphError::InvalidResponse {
                    reason: format!("Unexpected edge row {:?}", other),
                }),
            })
            .collect()
    }

    async fn counts(&self, tenant: Option<&str>) -> GraphResult<GraphCounts> {
        let parameters = json!({ "tenant": tenant });
        let results = self
            .run(vec![
                Statement {
                    statement: format!("MATCH (n) {} RETURN count(n)", tenant_match("n", tenant)),
                    parameters: parameters.clone(),
                },
                Statement {
                    statement: format!(
                        "MATCH (a)-[r]->() {} RETURN count(r)",
                        tenant_match("a", tenant)
                    ),
                    parameters,
                },
            ])
            .await?;
        Ok(GraphCounts {
            nodes: first_count(&results[0])?,
            edges: first_count(&results[1])?,
        })
    }
}

impl std::fmt::Debug for Neo4jHttpGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jHttpGraph")
            .field("commit_url", &self.commit_url)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
