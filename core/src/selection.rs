//! Set of slice indices marked for export.

use std::collections::BTreeSet;

use crate::types::SliceIndex;

/// Selected slice indices, bounded by the current slice count and iterated in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    members: BTreeSet<SliceIndex>,
    bound: u32,
}

impl SelectionSet {
    /// Empty selection over `0..slice_count`.
    pub fn with_bound(slice_count: u32) -> Self {
        Self { members: BTreeSet::new(), bound: slice_count }
    }

    /// Number of selectable indices.
    pub fn bound(&self) -> u32 {
        self.bound
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, index: SliceIndex) -> bool {
        self.members.contains(&index)
    }

    pub fn is_all(&self) -> bool {
        self.bound > 0 && self.members.len() == self.bound as usize
    }

    /// Flip membership of `index`. Out-of-range indices are ignored; returns the new membership.
    pub fn toggle(&mut self, index: SliceIndex) -> bool {
        if index.0 >= self.bound {
            return false;
        }
        if self.members.remove(&index) {
            false
        } else {
            self.members.insert(index);
            true
        }
    }

    /// Insert `index` if in range. Returns whether it is a member afterwards.
    pub fn insert(&mut self, index: SliceIndex) -> bool {
        if index.0 >= self.bound {
            return false;
        }
        self.members.insert(index);
        true
    }

    pub fn select_all(&mut self) {
        self.members = (0..self.bound).map(SliceIndex).collect();
    }

    pub fn deselect_all(&mut self) {
        self.members.clear();
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = SliceIndex> + '_ {
        self.members.iter().copied()
    }
}
