//! A small signal chain over a user-defined element type.
//!
//! The precision level controls the sample resolution of the generated
//! signal: coarse levels are cheap previews, finer levels carry more
//! samples. Re-running the graph at increasing levels refines the result.

use std::sync::Arc;

use fathom::{CacheKey, ComputeResult, Element, Graph, Node, PrecisionLevel};

#[derive(Debug, Clone, PartialEq)]
struct Signal(Vec<f64>);

impl Element for Signal {
    fn distance(&self, other: &Self) -> f64 {
        let len = self.0.len().min(other.0.len());
        if len == 0 {
            return if self == other { 0.0 } else { 1.0 };
        }

        let sum: f64 = self
            .0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        (sum / len as f64).sqrt()
    }

    fn cache_key(&self) -> CacheKey {
        let folded = self
            .0
            .iter()
            .fold(0_u64, |acc, sample| acc.rotate_left(7) ^ sample.to_bits());
        CacheKey(folded)
    }
}

fn sine_source(frequency: f64, amplitude: f64) -> Arc<Node<Signal>> {
    Node::new("sine", move |level: PrecisionLevel| {
        let samples = 64_usize << level;
        let signal = (0..samples)
            .map(|i| {
                let t = i as f64 / samples as f64;
                amplitude
                    * (2.0 * std::f64::consts::PI * frequency * t).sin()
            })
            .collect();
        ComputeResult::Value(Signal(signal))
    })
}

fn gain(
    name: &str,
    upstream: &Arc<Node<Signal>>,
    factor: f64,
) -> Arc<Node<Signal>> {
    let upstream = upstream.clone();
    Node::new(name, move |level| {
        match ComputeResult::from(upstream.compute(level).get()) {
            ComputeResult::Value(signal) => ComputeResult::Value(Signal(
                signal.0.iter().map(|sample| sample * factor).collect(),
            )),
            error => error,
        }
    })
}

fn level_meter(name: &str, upstream: &Arc<Node<Signal>>) -> Arc<Node<Signal>> {
    let upstream = upstream.clone();
    Node::new(name, move |level| {
        match ComputeResult::from(upstream.compute(level).get()) {
            ComputeResult::Value(signal) => {
                let mean_square = signal.0.iter().map(|s| s * s).sum::<f64>()
                    / signal.0.len().max(1) as f64;
                ComputeResult::Value(Signal(vec![mean_square.sqrt()]))
            }
            error => error,
        }
    })
}

fn main() {
    let graph: Graph<Signal> = Graph::new();

    let source = sine_source(4.0, 1.0);
    let amplified = gain("gain", &source, 0.5);
    let meter = level_meter("rms", &amplified);

    for node in [&source, &amplified, &meter] {
        graph.add_node(node.clone());
    }
    graph.connect(&source, &amplified).unwrap();
    graph.connect(&amplified, &meter).unwrap();

    for level in [0, 2, 4] {
        for node in [&source, &amplified, &meter] {
            node.adjust_precision(level);
        }

        graph.execute().get().unwrap();

        if let Some(ComputeResult::Value(value)) = meter.last_result() {
            println!(
                "rms at level {level}: {:.6} ({} samples)",
                value.0[0],
                64_usize << level,
            );
        }
    }
}
