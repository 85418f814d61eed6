//! Graph manifest round trips.

use fathom::{ComputeResult, ErrorKind, Graph, Node};
use fathom_integration_test::{constant, diamond, sorted_names};

fn constant_factory(
) -> impl FnMut(&str) -> Option<std::sync::Arc<Node<f64>>> {
    |name: &str| Some(Node::constant(name, 1.0))
}

#[test]
fn manifests_round_trip_nodes_and_edges() {
    let (graph, _) = diamond(constant("source", 2.0));
    let manifest = graph.manifest();

    let restored: Graph<f64> = Graph::new();
    restored.restore(&manifest, &mut constant_factory());

    assert_eq!(restored.manifest(), manifest);
    assert_eq!(sorted_names(&restored), ["left", "right", "sink", "source"]);
    assert_eq!(restored.edge_count(), 4);
}

#[test]
fn json_round_trips() {
    let (graph, _) = diamond(constant("source", 2.0));

    let json = graph.to_json().unwrap();
    let restored: Graph<f64> = Graph::new();
    restored.from_json(&json, &mut constant_factory()).unwrap();

    assert_eq!(restored.manifest(), graph.manifest());
}

#[test]
fn manifest_output_is_deterministic() {
    let (graph, _) = diamond(constant("source", 2.0));

    assert_eq!(graph.to_json().unwrap(), graph.to_json().unwrap());
}

#[test]
fn unresolvable_nodes_and_their_edges_are_dropped() {
    let (graph, _) = diamond(constant("source", 2.0));
    let manifest = graph.manifest();

    let restored: Graph<f64> = Graph::new();
    restored.restore(&manifest, &mut |name: &str| {
        (name != "left").then(|| Node::constant(name, 1.0))
    });

    assert_eq!(sorted_names(&restored), ["right", "sink", "source"]);
    // source -> left and left -> sink disappeared with the node
    assert_eq!(restored.edge_count(), 2);
}

#[test]
fn restore_replaces_previous_contents() {
    let (graph, _) = diamond(constant("source", 2.0));

    let other: Graph<f64> = Graph::new();
    other.add_node(constant("stale", 9.0));

    other.restore(&graph.manifest(), &mut constant_factory());

    assert!(other.node("stale").is_none());
    assert_eq!(sorted_names(&other), ["left", "right", "sink", "source"]);
}

#[test]
fn restored_graphs_execute() {
    let (graph, _) = diamond(constant("source", 2.0));

    let restored: Graph<f64> = Graph::new();
    restored.restore(&graph.manifest(), &mut constant_factory());
    restored.execute().get().unwrap();

    for node in restored.get_nodes() {
        assert_eq!(node.last_result(), Some(ComputeResult::Value(1.0)));
    }
}

#[test]
fn precision_windows_reset_on_restore() {
    let graph: Graph<f64> = Graph::new();
    let node = constant("windowed", 1.0);
    node.set_precision_range(2, 6).unwrap();
    graph.add_node(node);

    let restored: Graph<f64> = Graph::new();
    restored.restore(&graph.manifest(), &mut constant_factory());

    let rebuilt = restored.node("windowed").unwrap();
    assert_eq!(rebuilt.min_precision_level(), 0);
    assert_eq!(rebuilt.max_precision_level(), 8);
}

#[test]
fn malformed_json_is_a_validation_error() {
    let graph: Graph<f64> = Graph::new();

    let error = graph
        .from_json("{ not json", &mut constant_factory())
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Validation);
}

#[test]
fn manifest_json_has_the_documented_shape() {
    let graph: Graph<f64> = Graph::new();
    let a = constant("a", 1.0);
    let b = constant("b", 2.0);
    graph.add_node(a.clone());
    graph.add_node(b.clone());
    graph.connect(&a, &b).unwrap();

    let json = graph.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["nodes"][0]["name"], "a");
    assert_eq!(value["edges"][0]["from"], "a");
    assert_eq!(value["edges"][0]["to"], "b");
}
