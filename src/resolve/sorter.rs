//! Activation ordering.
//!
//! Ordering is layered: an alphabetical baseline, a stable sort by explicit
//! priority, then a constraint-respecting topological pass (Kahn's
//! algorithm) that always takes the ready module appearing earliest in the
//! priority order. Unsatisfiable constraints are reported, never guessed.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use super::metadata::{MetadataStore, ModuleMetadata};
use super::ResolveError;

/// Sorts accepted modules into activation order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrioritySorter;

impl PrioritySorter {
    /// Create a sorter.
    pub fn new() -> Self {
        Self
    }

    /// Order `ids` for activation.
    ///
    /// Duplicate ids collapse. Constraints that reference ids outside the
    /// set, or a module itself, are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::CyclicOrdering`] when the before/after
    /// constraints cannot all be satisfied.
    pub fn sort<I>(&self, ids: I, metadata: &MetadataStore) -> Result<Vec<String>, ResolveError>
    where
        I: IntoIterator<Item = String>,
    {
        // Baseline: alphabetical, duplicates removed.
        let baseline: BTreeSet<String> = ids.into_iter().collect();
        let mut ordered: Vec<(String, ModuleMetadata)> = baseline
            .into_iter()
            .map(|id| {
                let meta = metadata.get(&id);
                (id, meta)
            })
            .collect();

        // Priority pass; `sort_by_key` is stable so equal priorities keep
        // their alphabetical order.
        ordered.sort_by_key(|(_, meta)| meta.priority);

        let graph = ConstraintGraph::build(&ordered);
        let order = graph.topological_order().map_err(|unplaced| {
            let ids: Vec<String> = unplaced
                .into_iter()
                .filter_map(|index| ordered.get(index).map(|(id, _)| id.clone()))
                .collect();
            ResolveError::CyclicOrdering { ids }
        })?;

        let mut slots: Vec<Option<String>> =
            ordered.into_iter().map(|(id, _)| Some(id)).collect();
        let sorted: Vec<String> = order
            .into_iter()
            .filter_map(|index| slots.get_mut(index).and_then(Option::take))
            .collect();
        debug!(modules = sorted.len(), "sorted auto-activation modules");
        Ok(sorted)
    }
}

/// Must-precede edges over positions in the priority order.
struct ConstraintGraph {
    successors: Vec<BTreeSet<usize>>,
    in_degree: Vec<usize>,
}

impl ConstraintGraph {
    fn build(ordered: &[(String, ModuleMetadata)]) -> Self {
        let position: HashMap<&str, usize> = ordered
            .iter()
            .enumerate()
            .map(|(index, (id, _))| (id.as_str(), index))
            .collect();
        let mut graph = Self {
            successors: vec![BTreeSet::new(); ordered.len()],
            in_degree: vec![0; ordered.len()],
        };

        for (index, (_, meta)) in ordered.iter().enumerate() {
            for before in &meta.before {
                if let Some(&target) = position.get(before.as_str()) {
                    graph.add_edge(index, target);
                }
            }
            for after in &meta.after {
                if let Some(&source) = position.get(after.as_str()) {
                    graph.add_edge(source, index);
                }
            }
        }

        for (a, (_, meta_a)) in ordered.iter().enumerate() {
            for (b, (_, meta_b)) in ordered.iter().enumerate() {
                if (meta_a.before_all && !meta_b.before_all)
                    || (meta_b.after_all && !meta_a.after_all)
                {
                    graph.add_edge(a, b);
                }
            }
        }
        graph
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let inserted = self
            .successors
            .get_mut(from)
            .is_some_and(|targets| targets.insert(to));
        if inserted {
            if let Some(degree) = self.in_degree.get_mut(to) {
                *degree = degree.saturating_add(1);
            }
        }
    }

    /// Kahn's algorithm, always releasing the lowest ready position.
    ///
    /// On a cycle, returns the positions that could not be placed.
    fn topological_order(mut self) -> Result<Vec<usize>, Vec<usize>> {
        let mut ready: BTreeSet<usize> = self
            .in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| index)
            .collect();
        let mut order = Vec::with_capacity(self.in_degree.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            let targets = self
                .successors
                .get_mut(next)
                .map(std::mem::take)
                .unwrap_or_default();
            for target in targets {
                if let Some(degree) = self.in_degree.get_mut(target) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.insert(target);
                    }
                }
            }
        }

        if order.len() == self.in_degree.len() {
            Ok(order)
        } else {
            let placed: BTreeSet<usize> = order.into_iter().collect();
            Err((0..self.in_degree.len())
                .filter(|index| !placed.contains(index))
                .collect())
        }
    }
}
