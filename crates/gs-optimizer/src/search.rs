//! Combination enumeration and sweep task descriptors.

use std::sync::Arc;

use gs_types::{FeatureCombination, FeatureUniverse, TaskContext};

/// Lazy power-set enumeration of a feature universe.
///
/// Yields all 2^k subsets in ascending bitmask order: index 0 is the empty
/// set and index 2^k - 1 the full universe. Combination `i` contains the
/// `j`-th feature exactly when bit `j` of `i` is set. Nothing is filtered or
/// pruned.
#[derive(Debug, Clone)]
pub struct CombinationGenerator {
    universe: Arc<FeatureUniverse>,
    cursor: u64,
    end: u64,
}

impl CombinationGenerator {
    pub fn new(universe: impl Into<Arc<FeatureUniverse>>) -> Self {
        let universe = universe.into();
        let end = universe.combination_count();
        Self {
            universe,
            cursor: 0,
            end,
        }
    }

    pub fn universe(&self) -> &FeatureUniverse {
        &self.universe
    }

    /// Total number of combinations, independent of cursor position.
    pub fn total(&self) -> u64 {
        self.end
    }

    /// Combinations not yet yielded.
    pub fn remaining(&self) -> u64 {
        self.end - self.cursor
    }

    /// Random access to the combination at `index`.
    pub fn combination_at(&self, index: u64) -> Option<FeatureCombination> {
        (index < self.end).then(|| self.universe.combination(index))
    }

    /// Take up to `count` combinations, paired with their task index.
    pub fn suggest(&mut self, count: usize) -> Vec<(usize, FeatureCombination)> {
        self.by_ref()
            .take(count)
            .map(|c| (c.mask() as usize, c))
            .collect()
    }

    /// Turn the remaining combinations into sweep tasks sharing `context`.
    pub fn into_tasks(self, context: Arc<TaskContext>) -> impl Iterator<Item = SweepTask> + Send {
        self.map(move |combination| {
            SweepTask::new(combination.mask() as usize, combination, Arc::clone(&context))
        })
    }
}

impl Iterator for CombinationGenerator {
    type Item = FeatureCombination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }
        let combination = self.universe.combination(self.cursor);
        self.cursor += 1;
        Some(combination)
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.cursor = self.cursor.saturating_add(n as u64).min(self.end);
        self.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CombinationGenerator {}

impl std::iter::FusedIterator for CombinationGenerator {}

/// One unit of sweep work: a combination at a fixed enumeration index.
///
/// The index is carried explicitly so results can be realigned regardless of
/// completion order.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepTask {
    pub index: usize,
    pub combination: FeatureCombination,
    pub context: Arc<TaskContext>,
}

impl SweepTask {
    pub fn new(index: usize, combination: FeatureCombination, context: Arc<TaskContext>) -> Self {
        Self {
            index,
            combination,
            context,
        }
    }

    pub fn fold_counts(&self) -> &[u32] {
        &self.context.fold_counts
    }
}
