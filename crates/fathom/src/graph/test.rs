use crate::{
    error::ErrorKind,
    graph::{Edge, Graph},
    node::Node,
};

fn constant(name: &str, value: f64) -> std::sync::Arc<Node<f64>> {
    Node::constant(name, value)
}

#[test]
fn membership_and_lookup() {
    let graph = Graph::new();
    let a = constant("a", 1.0);

    graph.add_node(a.clone());

    assert_eq!(graph.node_count(), 1);
    assert!(graph.node("a").is_some());
    assert!(graph.node("b").is_none());
}

#[test]
fn edges_require_member_endpoints() {
    let graph = Graph::new();
    let a = constant("a", 1.0);
    let b = constant("b", 2.0);
    graph.add_node(a.clone());

    let error = graph.connect(&a, &b).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Validation);
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn cycle_insertion_is_rejected_atomically() {
    let graph = Graph::new();
    let a = constant("a", 1.0);
    let b = constant("b", 2.0);
    let c = constant("c", 3.0);
    for node in [&a, &b, &c] {
        graph.add_node(node.clone());
    }

    graph.connect(&a, &b).unwrap();
    graph.connect(&b, &c).unwrap();

    let error = graph.connect(&c, &a).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Validation);
    assert_eq!(graph.edge_count(), 2);
    assert!(graph.get_outgoing_edges(&c).is_empty());
}

#[test]
fn self_edges_are_cycles() {
    let graph = Graph::new();
    let a = constant("a", 1.0);
    graph.add_node(a.clone());

    assert_eq!(
        graph.connect(&a, &a).unwrap_err().kind(),
        ErrorKind::Validation
    );
}

#[test]
fn duplicate_edges_are_no_ops() {
    let graph = Graph::new();
    let a = constant("a", 1.0);
    let b = constant("b", 2.0);
    graph.add_node(a.clone());
    graph.add_node(b.clone());

    graph.connect(&a, &b).unwrap();
    graph.add_edge(&Edge::new(a.clone(), b.clone())).unwrap();

    assert_eq!(graph.edge_count(), 1);
}

#[test]
fn removing_a_node_removes_incident_edges() {
    let graph = Graph::new();
    let a = constant("a", 1.0);
    let b = constant("b", 2.0);
    let c = constant("c", 3.0);
    for node in [&a, &b, &c] {
        graph.add_node(node.clone());
    }
    graph.connect(&a, &b).unwrap();
    graph.connect(&b, &c).unwrap();

    graph.remove_node(&b);

    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.get_outgoing_edges(&a).is_empty());
    assert!(graph.get_incoming_edges(&c).is_empty());
}

#[test]
fn output_nodes_have_no_outgoing_edges() {
    let graph = Graph::new();
    let a = constant("a", 1.0);
    let b = constant("b", 2.0);
    let c = constant("c", 3.0);
    for node in [&a, &b, &c] {
        graph.add_node(node.clone());
    }
    graph.connect(&a, &b).unwrap();
    graph.connect(&a, &c).unwrap();

    let mut outputs: Vec<_> = graph
        .get_output_nodes()
        .iter()
        .map(|node| node.name().to_owned())
        .collect();
    outputs.sort();

    assert_eq!(outputs, ["b", "c"]);
}

#[test]
fn incoming_and_outgoing_edges_resolve_node_pairs() {
    let graph = Graph::new();
    let a = constant("a", 1.0);
    let b = constant("b", 2.0);
    graph.add_node(a.clone());
    graph.add_node(b.clone());
    graph.connect(&a, &b).unwrap();

    let incoming = graph.get_incoming_edges(&b);
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].from().name(), "a");
    assert_eq!(incoming[0].to().name(), "b");

    let outgoing = graph.get_outgoing_edges(&a);
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].to().name(), "b");
}

#[test]
fn clear_empties_everything() {
    let graph = Graph::new();
    let a = constant("a", 1.0);
    let b = constant("b", 2.0);
    graph.add_node(a.clone());
    graph.add_node(b.clone());
    graph.connect(&a, &b).unwrap();
    graph.cache().store(1.0);

    graph.clear();

    assert!(graph.is_empty());
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.cache().is_empty());
}

#[test]
fn removed_nodes_lose_their_error_table_entry() {
    let graph: Graph<f64> = Graph::new();
    let failing: std::sync::Arc<Node<f64>> = Node::new("failing", |_| {
        crate::result::ComputeResult::Error(
            crate::error::ErrorState::computation("always fails"),
        )
    });
    graph.add_node(failing.clone());

    graph.execute().get().unwrap();
    assert!(graph.node_error("failing").is_some());

    graph.remove_node(&failing);
    assert!(graph.node_error("failing").is_none());
}

#[test]
fn detached_nodes_compute_standalone() {
    let graph: Graph<f64> = Graph::new();
    let a = constant("a", 5.0);
    graph.add_node(a.clone());
    graph.remove_node(&a);

    let result = crate::result::ComputeResult::from(a.compute(0).get());

    assert_eq!(result, crate::result::ComputeResult::Value(5.0));
}
