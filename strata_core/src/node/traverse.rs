// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use alloc::vec;
use alloc::vec::Vec;

use super::id::{NO_NODE, NodeId};
use super::store::NodeStore;

/// An iterator over the direct children of a node.
///
/// Created by [`NodeStore::children`].
#[derive(Debug)]
pub struct Children<'a> {
    store: &'a NodeStore,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(store: &'a NodeStore, first: u32) -> Self {
        Self {
            store,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current == NO_NODE {
            return None;
        }
        let idx = self.current;
        self.current = self.store.next_sibling[idx as usize];
        Some(self.store.id_at(idx))
    }
}

impl NodeStore {
    /// Returns the slot indices of the subtree rooted at `idx`, pre-order.
    pub(crate) fn subtree_indices(&self, idx: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            out.push(i);
            // Push in reverse so the first child is visited first.
            let mut children: Vec<u32> = Vec::new();
            let mut child = self.first_child[i as usize];
            while child != NO_NODE {
                children.push(child);
                child = self.next_sibling[child as usize];
            }
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Returns the subtree rooted at `id`, pre-order.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        self.validate(id);
        self.subtree_indices(id.idx)
            .into_iter()
            .map(|idx| self.id_at(idx))
            .collect()
    }
}
