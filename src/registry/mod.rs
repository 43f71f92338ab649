//! # Step Registry
//!
//! Collects steps, then validates them into an immutable
//! [`ValidatedRegistry`] with a deterministic execution order. Validation
//! rejects unknown dependencies and cycles before anything runs; there is no
//! way to add a step to a registry that has been validated.
//!
//! Ordering uses Kahn's algorithm. When several steps are ready at once the
//! one registered first goes first, so the same definition always yields the
//! same order.

pub mod definition;
pub mod step;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{Result, StagehandError};

pub use definition::{RegistryDefinition, RetryDefinition, StepDefinition};
pub use step::{FailureScope, RetryPolicy, Step};

/// Mutable collection of steps prior to validation
#[derive(Debug, Default)]
pub struct StepRegistry {
    steps: Vec<Step>,
    index: HashMap<String, usize>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step; fails with `DuplicateStepId` if the id is taken
    pub fn register(&mut self, mut step: Step) -> Result<()> {
        if step.id.trim().is_empty() {
            return Err(StagehandError::InvalidDefinition(
                "step id must not be empty".to_string(),
            ));
        }
        if self.index.contains_key(&step.id) {
            return Err(StagehandError::DuplicateStepId(step.id));
        }

        let mut seen = BTreeSet::new();
        step.depends_on.retain(|dependency| seen.insert(dependency.clone()));

        self.index.insert(step.id.clone(), self.steps.len());
        self.steps.push(step);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Check dependencies and compute the execution order
    ///
    /// Unknown dependencies are reported before cycles, in registration order.
    pub fn validate(self) -> Result<ValidatedRegistry> {
        let count = self.steps.len();

        let mut dependencies: Vec<Vec<usize>> = Vec::with_capacity(count);
        for step in &self.steps {
            let mut resolved = Vec::with_capacity(step.depends_on.len());
            for dependency in &step.depends_on {
                match self.index.get(dependency) {
                    Some(&position) => resolved.push(position),
                    None => {
                        return Err(StagehandError::UnknownDependency {
                            step_id: step.id.clone(),
                            missing_id: dependency.clone(),
                        })
                    }
                }
            }
            dependencies.push(resolved);
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (position, deps) in dependencies.iter().enumerate() {
            for &dependency in deps {
                dependents[dependency].push(position);
            }
        }

        let mut in_degree: Vec<usize> = dependencies.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(position) = ready.pop_first() {
            order.push(position);
            for &dependent in &dependents[position] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < count {
            let cycle = find_cycle(&dependencies, &in_degree)
                .into_iter()
                .map(|position| self.steps[position].id.clone())
                .collect();
            return Err(StagehandError::CyclicDependency(cycle));
        }

        tracing::debug!(
            steps = count,
            order = ?order.iter().map(|&i| self.steps[i].id.as_str()).collect::<Vec<_>>(),
            "Step registry validated"
        );

        Ok(ValidatedRegistry {
            steps: self.steps.into_iter().map(Arc::new).collect(),
            index: self.index,
            order,
            dependencies,
            dependents,
        })
    }
}

/// Walk dependency edges among the steps Kahn's algorithm could not order
///
/// Every such step still has an unprocessed dependency, so the walk must
/// revisit a step; the path from that step back to itself is a cycle.
fn find_cycle(dependencies: &[Vec<usize>], in_degree: &[usize]) -> Vec<usize> {
    let Some(start) = (0..in_degree.len()).find(|&i| in_degree[i] > 0) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut position_in_path: HashMap<usize, usize> = HashMap::from([(start, 0)]);
    let mut current = start;

    loop {
        let Some(&next) = dependencies[current].iter().find(|&&d| in_degree[d] > 0) else {
            return path;
        };
        if let Some(&cycle_start) = position_in_path.get(&next) {
            let mut cycle = path.split_off(cycle_start);
            cycle.push(next);
            return cycle;
        }
        position_in_path.insert(next, path.len());
        path.push(next);
        current = next;
    }
}

/// Immutable, acyclic set of steps with a fixed execution order
#[derive(Debug, Clone)]
pub struct ValidatedRegistry {
    steps: Vec<Arc<Step>>,
    index: HashMap<String, usize>,
    order: Vec<usize>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl ValidatedRegistry {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step ids in execution order
    pub fn execution_order(&self) -> Vec<String> {
        self.order.iter().map(|&i| self.steps[i].id.clone()).collect()
    }

    /// Steps in execution order
    pub fn ordered_steps(&self) -> impl Iterator<Item = &Arc<Step>> {
        self.order.iter().map(move |&i| &self.steps[i])
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Step>> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    /// The step that runs first, if any
    pub fn first_step_id(&self) -> Option<&str> {
        self.order.first().map(|&i| self.steps[i].id.as_str())
    }

    /// Direct dependencies of `id`
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&i| {
                self.dependencies[i]
                    .iter()
                    .map(|&d| self.steps[d].id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every step that depends on `id` directly or transitively, in execution order
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        let Some(&root) = self.index.get(id) else {
            return Vec::new();
        };

        let mut reached = vec![false; self.steps.len()];
        let mut stack = vec![root];
        while let Some(position) = stack.pop() {
            for &dependent in &self.dependents[position] {
                if !reached[dependent] {
                    reached[dependent] = true;
                    stack.push(dependent);
                }
            }
        }

        self.order
            .iter()
            .filter(|&&i| reached[i])
            .map(|&i| self.steps[i].id.clone())
            .collect()
    }
}
