//! Re-derive the graph projection from the entity store.
//!
//! Usage: `quiver-sync [domains|workflows|skills|all] [--tenant NAME]`

use quiver_core::{QuiverError, QuiverResult, RegistryError};
use quiver_registry::{
    sync_domains_from_db_to_graph, sync_skills_tools_from_db_to_graph,
    sync_workflows_from_db_to_graph, telemetry, QuiverConfig, Registry, SyncReport,
};
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Domains,
    Workflows,
    Skills,
    All,
}

#[derive(Debug)]
struct Args {
    target: Target,
    tenant: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> QuiverResult<Args> {
    let mut target = Target::All;
    let mut tenant = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--tenant" => {
                tenant = Some(args.next().ok_or_else(|| {
                    QuiverError::Registry(RegistryError::UnknownSyncTarget {
                        target: "--tenant requires a value".to_string(),
                    })
                })?);
            }
            "domains" => target = Target::Domains,
            "workflows" => target = Target::Workflows,
            "skills" => target = Target::Skills,
            "all" => target = Target::All,
            other => {
                return Err(QuiverError::Registry(RegistryError::UnknownSyncTarget {
                    target: other.to_string(),
                }))
            }
        }
    }
    Ok(Args { target, tenant })
}

async fn run(args: Args) -> QuiverResult<SyncReport> {
    let config = QuiverConfig::from_env()?;
    let registry = Registry::connect(&config).await?;
    let store = registry.store().as_ref();
    let mirror = registry.mirror();
    let tenant = args.tenant.as_deref();

    let mut report = SyncReport::default();
    if matches!(args.target, Target::Domains | Target::All) {
        report.absorb(sync_domains_from_db_to_graph(store, mirror, tenant).await?);
    }
    if matches!(args.target, Target::Skills | Target::All) {
        report.absorb(sync_skills_tools_from_db_to_graph(store, mirror, tenant).await?);
    }
    if matches!(args.target, Target::Workflows | Target::All) {
        report.absorb(sync_workflows_from_db_to_graph(store, mirror, tenant).await?);
    }
    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = telemetry::init_tracing() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            tracing::error!(error = %e, "Invalid arguments");
            eprintln!("usage: quiver-sync [domains|workflows|skills|all] [--tenant NAME]");
            return ExitCode::from(2);
        }
    };

    tracing::info!(target_set = ?args.target, tenant = ?args.tenant, "Starting graph sync");
    match run(args).await {
        Ok(report) => {
            tracing::info!(
                tenants = report.tenants,
                nodes = report.nodes_merged,
                edges = report.edges_merged,
                skipped = report.edges_skipped,
                failures = report.failures,
                aborted = ?report.aborted_tenants,
                "Graph sync finished"
            );
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Graph sync failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> QuiverResult<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults_to_all_tenants() {
        let parsed = args(&[]).unwrap();
        assert_eq!(parsed.target, Target::All);
        assert!(parsed.tenant.is_none());
    }

    #[test]
    fn test_target_and_tenant() {
        let parsed = args(&["skills", "--tenant", "acme"]).unwrap();
        assert_eq!(parsed.target, Target::Skills);
        assert_eq!(parsed.tenant.as_deref(), Some("acme"));
    }

    #[test]
    fn test_unknown_target_rejected() {
        assert!(matches!(
            args(&["everything"]),
            Err(QuiverError::Registry(RegistryError::UnknownSyncTarget { .. }))
        ));
        assert!(args(&["--tenant"]).is_err());
    }
}
