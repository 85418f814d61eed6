//! End-to-end graph execution tests.

use fathom::{ComputeResult, Graph, LruPolicy, Node};
use fathom_integration_test::{adder, constant, counting, diamond, doubler};

#[test]
fn empty_graph_executes_to_void() {
    let graph: Graph<f64> = Graph::new();

    assert_eq!(graph.execute().get(), Ok(()));
}

#[test]
fn two_node_pipeline_produces_the_downstream_value() {
    let graph = Graph::new();
    let source = constant("source", 3.0);
    let sink = doubler("sink", &source);

    graph.add_node(source.clone());
    graph.add_node(sink.clone());
    graph.connect(&source, &sink).unwrap();

    graph.execute().get().unwrap();

    assert_eq!(sink.last_result(), Some(ComputeResult::Value(6.0)));
    assert!(graph.node_error("sink").is_none());
}

#[test]
fn diamond_converges_on_both_branches() {
    let (graph, sink) = diamond(constant("source", 2.0));

    graph.execute().get().unwrap();

    // 2 -> double -> 4 on each branch, summed at the sink
    assert_eq!(sink.last_result(), Some(ComputeResult::Value(8.0)));
}

#[test]
fn every_node_completes_on_success() {
    let (graph, _) = diamond(constant("source", 1.0));

    graph.execute().get().unwrap();

    for node in graph.get_nodes() {
        let result = node.last_result().expect("every node was computed");
        assert!(!result.has_error(), "{} failed", node.name());
        assert!(node.store().pending_count() > 0 || node.store().level_count() > 0);
        assert!(graph.node_error(node.name()).is_none());
    }
}

#[test]
fn execution_respects_current_precision_levels() {
    let graph = Graph::new();
    let node = constant("leveled", 1.5);
    graph.add_node(node.clone());
    node.adjust_precision(3);

    graph.execute().get().unwrap();

    node.merge_updates();
    assert_eq!(node.current_precision_level(), 3);
    assert_eq!(node.store().levels(), [3]);
}

#[test]
fn computed_values_land_in_the_graph_cache() {
    let graph = Graph::new();
    let source = constant("source", 2.0);
    let sink = doubler("sink", &source);
    graph.add_node(source.clone());
    graph.add_node(sink.clone());
    graph.connect(&source, &sink).unwrap();
    graph.set_cache_policy(Box::new(LruPolicy::new(8)));

    graph.execute().get().unwrap();

    assert!(graph.cache().get(&2.0).is_some());
    assert!(graph.cache().get(&4.0).is_some());
}

#[test]
fn wide_fan_out_executes_every_branch() {
    let graph = Graph::new();
    let source = constant("source", 1.0);
    graph.add_node(source.clone());

    let branches: Vec<_> = (0..16)
        .map(|i| {
            let branch = doubler(&format!("branch-{i}"), &source);
            graph.add_node(branch.clone());
            graph.connect(&source, &branch).unwrap();
            branch
        })
        .collect();

    graph.execute().get().unwrap();

    for branch in branches {
        assert_eq!(branch.last_result(), Some(ComputeResult::Value(2.0)));
    }
}

#[test]
fn deep_chain_executes_in_dependency_order() {
    let graph = Graph::new();
    let mut previous = constant("n0", 1.0);
    graph.add_node(previous.clone());

    for i in 1..=10 {
        let next = doubler(&format!("n{i}"), &previous);
        graph.add_node(next.clone());
        graph.connect(&previous, &next).unwrap();
        previous = next;
    }

    graph.execute().get().unwrap();

    assert_eq!(previous.last_result(), Some(ComputeResult::Value(1024.0)));
}

#[test]
fn re_execution_recomputes_cleanly() {
    let graph = Graph::new();
    let (node, invocations) = counting("recount", 5.0);
    graph.add_node(node.clone());

    graph.execute().get().unwrap();
    graph.execute().get().unwrap();

    assert_eq!(invocations.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(node.last_result(), Some(ComputeResult::Value(5.0)));
}

#[test]
fn single_threaded_pool_still_completes_diamonds() {
    let (graph, sink) = diamond(constant("source", 2.0));
    graph.set_thread_pool(std::sync::Arc::new(
        fathom::WorkerPool::with_threads(1),
    ));

    graph.execute().get().unwrap();

    assert_eq!(sink.last_result(), Some(ComputeResult::Value(8.0)));
}

#[test]
fn sums_of_independent_sources() {
    let graph = Graph::new();
    let left = constant("left", 1.0);
    let right = constant("right", 2.0);
    let sum = adder("sum", &left, &right);

    for node in [&left, &right, &sum] {
        graph.add_node(node.clone());
    }
    graph.connect(&left, &sum).unwrap();
    graph.connect(&right, &sum).unwrap();

    graph.execute().get().unwrap();

    assert_eq!(sum.last_result(), Some(ComputeResult::Value(3.0)));
}

#[tokio::test]
async fn execution_is_awaitable() {
    let (graph, sink) = diamond(constant("source", 2.0));

    graph.execute().await.unwrap();

    assert_eq!(sink.last_result(), Some(ComputeResult::Value(8.0)));
}

#[test]
fn node_names_survive_unusual_characters() {
    let graph = Graph::new();
    let odd = constant("node with spaces + symbols/❄", 1.0);
    graph.add_node(odd.clone());

    graph.execute().get().unwrap();

    assert_eq!(odd.last_result(), Some(ComputeResult::Value(1.0)));
    assert!(graph.node("node with spaces + symbols/❄").is_some());
}
