//! Enumeration of candidate assignments.
//!
//! Every set partition of the variable groups is a candidate: each block of
//! the partition becomes one [`VariableAssignment`]. Partitions are produced
//! lazily as restricted growth strings in lexicographic order, so the first
//! candidate places every group into a single assignment and the last gives
//! each group its own.
//!
//! The number of candidates is the Bell number of the group count, which
//! grows super-exponentially. Grouping keeps the count small in practice.

use std::collections::BTreeSet;

use crate::grouper::VariableGroup;
use crate::metadata::DatasetMetadata;
use crate::types::VariableAssignment;

/// Lazy iterator over all set partitions of `0..n`.
///
/// Each item lists the blocks of one partition, ordered by size descending
/// and then by smallest element. Elements within a block are ascending.
#[derive(Debug, Clone)]
pub struct SetPartitions {
    n: usize,
    /// `rgs[i]` is the block index of element `i`.
    rgs: Vec<usize>,
    /// `prefix_max[i]` is `max(rgs[0..=i])`.
    prefix_max: Vec<usize>,
    done: bool,
}

impl SetPartitions {
    /// Partitions of a set of `n` elements.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            rgs: vec![0; n],
            prefix_max: vec![0; n],
            done: false,
        }
    }

    fn blocks(&self) -> Vec<Vec<usize>> {
        let count = self.prefix_max.last().map_or(0, |m| m + 1);
        let mut blocks = vec![Vec::new(); count];
        for (element, &block) in self.rgs.iter().enumerate() {
            blocks[block].push(element);
        }
        blocks.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
        blocks
    }

    fn advance(&mut self) -> bool {
        for i in (1..self.n).rev() {
            if self.rgs[i] <= self.prefix_max[i - 1] {
                self.rgs[i] += 1;
                self.prefix_max[i] = self.prefix_max[i - 1].max(self.rgs[i]);
                for j in i + 1..self.n {
                    self.rgs[j] = 0;
                    self.prefix_max[j] = self.prefix_max[i];
                }
                return true;
            }
        }
        false
    }
}

impl Iterator for SetPartitions {
    type Item = Vec<Vec<usize>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.blocks();
        self.done = !self.advance();
        Some(item)
    }
}

/// Bell number `B(n)`, or `None` if it overflows `u64`.
pub fn bell_number(n: usize) -> Option<u64> {
    let mut row: Vec<u64> = vec![1];
    for _ in 0..n {
        let mut next = Vec::with_capacity(row.len() + 1);
        next.push(*row.last()?);
        for value in &row {
            let previous = *next.last()?;
            next.push(previous.checked_add(*value)?);
        }
        row = next;
    }
    row.first().copied()
}

/// Build the assignment for one block of groups.
///
/// A root is an unlimited variable if it spans an unlimited dimension,
/// otherwise an ordinary one. Reachable variables are classified as bounds,
/// coordinate (dimension) or ordinary. Constants join every assignment.
pub fn assignment_for(
    block: &[usize],
    groups: &[VariableGroup],
    metadata: &DatasetMetadata,
) -> VariableAssignment {
    let mut unlimited = BTreeSet::new();
    let mut dimension = BTreeSet::new();
    let mut bounds = BTreeSet::new();
    let mut other = BTreeSet::new();

    for group in block.iter().filter_map(|&index| groups.get(index)) {
        let root = group.root().to_string();
        if metadata.is_unlimited_variable(&root) {
            unlimited.insert(root);
        } else {
            other.insert(root);
        }
        for name in group.reachable().keys() {
            if metadata.is_bounds(name) {
                bounds.insert(name.clone());
            } else if metadata.is_description(name) {
                dimension.insert(name.clone());
            } else {
                other.insert(name.clone());
            }
        }
    }

    VariableAssignment::new(
        unlimited,
        dimension,
        bounds,
        other,
        metadata.constants().clone(),
    )
}

/// Map a partition of group indices to its assignments, one per block.
pub fn to_assignments(
    partition: &[Vec<usize>],
    groups: &[VariableGroup],
    metadata: &DatasetMetadata,
) -> Vec<VariableAssignment> {
    partition
        .iter()
        .map(|block| assignment_for(block, groups, metadata))
        .collect()
}
