//! Property tests for circular-reference detection.

use std::collections::BTreeMap;

use proptest::prelude::*;

use canister::def::{ContainerDef, ServiceDef, ValueDef};
use canister::{check_circular_references, CanisterError};

fn service_name(at: usize) -> String {
    format!("Service{at}")
}

/// Edges as (from, to) index pairs over `count` services.
fn definition_with_edges(count: usize, edges: &[(usize, usize)]) -> ContainerDef {
    let mut services = BTreeMap::new();
    for at in 0..count {
        let arguments = edges
            .iter()
            .filter(|(from, _)| *from == at)
            .map(|(_, to)| ValueDef::ServiceRef(service_name(*to)))
            .collect();
        services.insert(
            service_name(at),
            ServiceDef::by_factory("example.New", arguments),
        );
    }
    ContainerDef {
        services,
        ..ContainerDef::default()
    }
}

/// Forward-only edges over a fixed node count: (from, to) with from < to.
fn dag_edges(count: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    proptest::collection::vec((0..count, 0..count), 0..=16).prop_map(|pairs| {
        pairs
            .into_iter()
            .filter_map(|(a, b)| match a.cmp(&b) {
                std::cmp::Ordering::Less => Some((a, b)),
                std::cmp::Ordering::Greater => Some((b, a)),
                std::cmp::Ordering::Equal => None,
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: Any graph whose edges all point "forward" is acyclic and
    /// passes the check.
    #[test]
    fn property_forward_edge_graphs_pass(edges in dag_edges(8)) {
        let def = definition_with_edges(8, &edges);
        check_circular_references(&def).expect("forward-only graph must be acyclic");
    }

    /// PROPERTY: Closing a forward chain back to its start is always caught,
    /// no matter what else the graph contains.
    #[test]
    fn property_back_edge_always_detected(
        edges in dag_edges(8),
        chain_len in 2usize..=8,
    ) {
        let mut edges = edges;
        for at in 0..chain_len - 1 {
            edges.push((at, at + 1));
        }
        edges.push((chain_len - 1, 0));

        let def = definition_with_edges(8, &edges);
        let err = check_circular_references(&def)
            .expect_err("graph contains a directed cycle");
        let is_cycle = matches!(err, CanisterError::CircularReference { .. });
        prop_assert!(is_cycle, "expected a circular reference, got {}", err);
    }

    /// PROPERTY: A reported cycle path always starts and ends at the same
    /// service and mentions at least two hops.
    #[test]
    fn property_cycle_path_is_closed(
        chain_len in 1usize..=8,
    ) {
        let mut edges: Vec<(usize, usize)> = (0..chain_len - 1).map(|at| (at, at + 1)).collect();
        edges.push((chain_len - 1, 0));

        let def = definition_with_edges(chain_len, &edges);
        match check_circular_references(&def) {
            Err(CanisterError::CircularReference { path }) => {
                prop_assert_eq!(path.first(), path.last());
                prop_assert_eq!(path.len(), chain_len + 1);
            }
            other => prop_assert!(false, "expected a cycle, got {other:?}"),
        }
    }
}
