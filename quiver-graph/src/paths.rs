//! Candidate tool-path detection over NEXT_TOOL edges.

use quiver_core::CandidatePath;
use std::collections::{HashMap, HashSet};

/// Split one capability's tools into candidate paths.
///
/// Linear runs of NEXT_TOOL edges become chains: a chain starts at a tool
/// with successors whose in-degree is not exactly one, and grows while the
/// next tool has a single predecessor and the current tool a single
/// successor. Tools left over after that become a two-tool chain with their
/// first unvisited successor, or stand alone. Tools without any edge come
/// last as single-tool paths.
///
/// Each tool lands in exactly one path. Edges touching tools outside `tools`
/// are ignored. With `src_tool`, only paths containing that tool are kept.
pub fn candidate_paths(
    tools: &[String],
    edges: &[(String, String)],
    src_tool: Option<&str>,
) -> Vec<CandidatePath> {
    let mut order: Vec<&str> = Vec::with_capacity(tools.len());
    let mut known: HashSet<&str> = HashSet::new();
    for tool in tools {
        if known.insert(tool.as_str()) {
            order.push(tool.as_str());
        }
    }

    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut seen_edges: HashSet<(&str, &str)> = HashSet::new();
    for (source, target) in edges {
        let (s, t) = (source.as_str(), target.as_str());
        if !known.contains(s) || !known.contains(t) || !seen_edges.insert((s, t)) {
            continue;
        }
        successors.entry(s).or_default().push(t);
        *in_degree.entry(t).or_default() += 1;
    }

    let out_of = |n: &str| successors.get(n).map_or(0, Vec::len);
    let in_of = |n: &str| in_degree.get(n).copied().unwrap_or(0);

    let mut visited: HashSet<&str> = HashSet::new();
    let mut paths = Vec::new();

    for &start in &order {
        if visited.contains(start) || out_of(start) == 0 || in_of(start) == 1 {
            continue;
        }
        visited.insert(start);
        let mut chain = vec![start];
        let mut current = start;
        loop {
            let next = successors
                .get(current)
                .into_iter()
                .flatten()
                .copied()
                .find(|n| !visited.contains(n) && in_of(*n) == 1);
            let Some(next) = next else { break };
            visited.insert(next);
            chain.push(next);
            if out_of(next) != 1 {
                break;
            }
            current = next;
        }
        paths.push(to_path(&chain));
    }

    // Cycles and branch leftovers
    for &tool in &order {
        if visited.contains(tool) || (in_of(tool) == 0 && out_of(tool) == 0) {
            continue;
        }
        visited.insert(tool);
        let next = successors
            .get(tool)
            .into_iter()
            .flatten()
            .copied()
            .find(|n| !visited.contains(n));
        match next {
            Some(next) => {
                visited.insert(next);
                paths.push(to_path(&[tool, next]));
            }
            None => paths.push(to_path(&[tool])),
        }
    }

    for &tool in &order {
        if !visited.contains(tool) {
            paths.push(to_path(&[tool]));
        }
    }

    match src_tool {
        Some(src) => paths.into_iter().filter(|p| p.contains(src)).collect(),
        None => paths,
    }
}

fn to_path(tools: &[&str]) -> CandidatePath {
    CandidatePath::new(tools.iter().map(|t| t.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_core::PathKind;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn edge(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    fn tools_of(paths: &[CandidatePath]) -> Vec<Vec<&str>> {
        paths
            .iter()
            .map(|p| p.tools.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_linear_chain_and_isolated_tool() {
        let paths = candidate_paths(
            &names(&["a", "b", "c", "d"]),
            &[edge("a", "b"), edge("b", "c")],
            None,
        );
        assert_eq!(tools_of(&paths), vec![vec!["a", "b", "c"], vec!["d"]]);
        assert_eq!(paths[0].kind, PathKind::Chain);
        assert_eq!(paths[1].kind, PathKind::SingleTool);
    }

    #[test]
    fn test_src_tool_filter() {
        let paths = candidate_paths(
            &names(&["a", "b", "c", "d"]),
            &[edge("a", "b"), edge("b", "c")],
            Some("d"),
        );
        assert_eq!(tools_of(&paths), vec![vec!["d"]]);
    }

    #[test]
    fn test_branch_stops_chain() {
        // a -> b, b -> c, b -> d
        let paths = candidate_paths(
            &names(&["a", "b", "c", "d"]),
            &[edge("a", "b"), edge("b", "c"), edge("b", "d")],
            None,
        );
        assert_eq!(tools_of(&paths), vec![vec!["a", "b"], vec!["c"], vec!["d"]]);
    }

    #[test]
    fn test_merge_point_starts_new_chain() {
        // a -> c, b -> c, c -> d
        let paths = candidate_paths(
            &names(&["a", "b", "c", "d"]),
            &[edge("a", "c"), edge("b", "c"), edge("c", "d")],
            None,
        );
        assert_eq!(tools_of(&paths), vec![vec!["a"], vec!["b"], vec!["c", "d"]]);
    }

    #[test]
    fn test_pure_cycle_falls_to_leftovers() {
        let paths = candidate_paths(
            &names(&["a", "b", "c"]),
            &[edge("a", "b"), edge("b", "c"), edge("c", "a")],
            None,
        );
        assert_eq!(tools_of(&paths), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn test_unknown_and_duplicate_edges_ignored() {
        let paths = candidate_paths(
            &names(&["a", "b"]),
            &[edge("a", "b"), edge("a", "b"), edge("a", "ghost")],
            None,
        );
        assert_eq!(tools_of(&paths), vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_empty_input() {
        assert!(candidate_paths(&[], &[], None).is_empty());
    }
}
