//! Minimal usage: two nodes, one edge, one execution.

use fathom::{ComputeResult, Graph, Node};

fn main() {
    let graph: Graph<i64> = Graph::new();

    let first = Node::new("first-square", |_| ComputeResult::Value(5_i64 * 5));
    let second =
        Node::new("second-square", |_| ComputeResult::Value(10_i64 * 10));

    first.add_completion_callback(|result| {
        println!("first square: {result:?}");
    });
    second.add_completion_callback(|result| {
        println!("second square: {result:?}");
    });

    graph.add_node(first.clone());
    graph.add_node(second.clone());
    graph.connect(&first, &second).unwrap();

    graph.execute().get().unwrap();
}
