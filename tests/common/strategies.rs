//! Proptest strategies for dependency graphs.

use proptest::prelude::*;

/// Acyclic dependency graph over `step-0..step-n`
///
/// Each step may only depend on lower-numbered steps; `registration` is a
/// shuffled order so registration order and dependency order disagree.
#[derive(Debug, Clone)]
pub struct DagSpec {
    pub dependencies: Vec<Vec<usize>>,
    pub registration: Vec<usize>,
}

impl DagSpec {
    pub fn name(index: usize) -> String {
        format!("step-{index}")
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }
}

pub fn dag_strategy(max_steps: usize) -> impl Strategy<Value = DagSpec> {
    (1..=max_steps)
        .prop_flat_map(|n| {
            let deps = (0..n)
                .map(|i| proptest::sample::subsequence((0..i).collect::<Vec<_>>(), 0..=i.min(3)))
                .collect::<Vec<_>>();
            let order = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
            (deps, order)
        })
        .prop_map(|(dependencies, registration)| DagSpec {
            dependencies,
            registration,
        })
}

/// Dependency graph with a cycle among at least two steps
pub fn cyclic_graph_strategy(max_steps: usize) -> impl Strategy<Value = DagSpec> {
    dag_strategy(max_steps)
        .prop_filter("need two steps for a cycle", |dag| dag.len() >= 2)
        .prop_flat_map(|dag| {
            let n = dag.len();
            (Just(dag), 0..n - 1).prop_flat_map(move |(dag, low)| {
                (Just(dag), Just(low), (low + 1)..n)
            })
        })
        .prop_map(|(mut dag, low, high)| {
            // high depends on low, and low on high closes the loop
            if !dag.dependencies[high].contains(&low) {
                dag.dependencies[high].push(low);
            }
            dag.dependencies[low].push(high);
            dag
        })
}

/// Concurrency limit for scheduler properties
pub fn concurrency_strategy() -> impl Strategy<Value = usize> {
    1usize..=4
}
