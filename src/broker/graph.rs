//! Static dependency graph between the role dashboards

use crate::error::{ExsimError, ExsimResult};
use crate::types::Dashboard;

/// Canonical run order of the cascade.
pub const EXECUTION_ORDER: [Dashboard; 7] = [
    Dashboard::Cmo,
    Dashboard::Production,
    Dashboard::Purchasing,
    Dashboard::Clo,
    Dashboard::Cpo,
    Dashboard::Esg,
    Dashboard::Cfo,
];

/// Topological order of the dependency graph (every dependency before its dependents)
pub fn cascade_order() -> ExsimResult<Vec<Dashboard>> {
    use petgraph::algo::toposort;
    use petgraph::graph::DiGraph;
    use std::collections::HashMap;

    let mut graph = DiGraph::new();
    let mut node_indices = HashMap::new();

    for dashboard in EXECUTION_ORDER {
        let idx = graph.add_node(dashboard);
        node_indices.insert(dashboard, idx);
    }

    for dashboard in EXECUTION_ORDER {
        for dep in dashboard.dependencies() {
            graph.add_edge(node_indices[dep], node_indices[&dashboard], ());
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        let node = graph
            .node_weight(cycle.node_id())
            .map(|d| d.name())
            .unwrap_or("?");
        ExsimError::CircularDependency(format!("Dashboard graph has a cycle through {}", node))
    })?;

    Ok(order
        .iter()
        .filter_map(|idx| graph.node_weight(*idx).copied())
        .collect())
}

/// Dashboards that declare `dashboard` as one of their dependencies.
pub fn dependents(dashboard: Dashboard) -> Vec<Dashboard> {
    Dashboard::ALL
        .into_iter()
        .filter(|d| d.dependencies().contains(&dashboard))
        .collect()
}

/// Human readable rendering of the graph, one line per dashboard.
pub fn dependency_summary() -> Vec<String> {
    EXECUTION_ORDER
        .iter()
        .map(|dashboard| {
            let deps = dashboard.dependencies();
            if deps.is_empty() {
                format!("{} (no dependencies)", dashboard)
            } else {
                let names: Vec<&str> = deps.iter().map(|d| d.name()).collect();
                format!("{} ← {}", dashboard, names.join(", "))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[Dashboard], d: Dashboard) -> usize {
        order.iter().position(|x| *x == d).unwrap()
    }

    #[test]
    fn test_cascade_order_respects_dependencies() {
        let order = cascade_order().unwrap();
        assert_eq!(order.len(), 7);

        for dashboard in Dashboard::ALL {
            for dep in dashboard.dependencies() {
                assert!(
                    position(&order, *dep) < position(&order, dashboard),
                    "{} must run before {}",
                    dep,
                    dashboard
                );
            }
        }
    }

    #[test]
    fn test_cascade_starts_with_cmo_and_ends_with_cfo() {
        let order = cascade_order().unwrap();
        assert_eq!(order.first(), Some(&Dashboard::Cmo));
        assert_eq!(order.last(), Some(&Dashboard::Cfo));
    }

    #[test]
    fn test_execution_order_is_a_valid_cascade() {
        for (i, dashboard) in EXECUTION_ORDER.iter().enumerate() {
            for dep in dashboard.dependencies() {
                assert!(EXECUTION_ORDER[..i].contains(dep));
            }
        }
    }

    #[test]
    fn test_dependents() {
        let prod = dependents(Dashboard::Production);
        assert_eq!(
            prod,
            vec![
                Dashboard::Purchasing,
                Dashboard::Clo,
                Dashboard::Cpo,
                Dashboard::Esg,
                Dashboard::Cfo
            ]
        );
        assert!(dependents(Dashboard::Cfo).is_empty());
    }

    #[test]
    fn test_dependency_summary_lines() {
        let lines = dependency_summary();
        assert_eq!(lines[0], "CMO (no dependencies)");
        assert_eq!(lines[1], "Production ← CMO");
        assert_eq!(lines[3], "CLO ← Production, CMO");
    }
}
