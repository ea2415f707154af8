//! Lazily cached depth, height and size of every node.
//!
//! Each node caches its statistics in [`Cell`]s, so reading them only needs `&TreeStore`.
//! Structural edits mark caches [`Cached::Stale`] instead of recomputing them:
//!
//! *   a change of parent makes the depth of the moved node and its whole subtree stale,
//! *   a change of a child list makes height and size of its owner and every ancestor stale.
//!
//! Both walks stop at a node that is already stale, which relies on staleness being closed
//! downwards (depth) or upwards (height and size). Reads recompute only what is stale.
//! Reordering children changes none of the statistics.

use std::cell::Cell;

use super::{Hierarchy, TreeNodeId, TreeStore};

/// A cached value, or the knowledge that it must be recomputed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cached<T> {
    Valid(T),
    Stale,
}

impl<T: Copy> Cached<T> {
    pub fn valid(self) -> Option<T> {
        match self {
            Cached::Valid(value) => Some(value),
            Cached::Stale => None,
        }
    }

    pub fn is_valid(self) -> bool {
        matches!(self, Cached::Valid(_))
    }
}

/// Cached statistics of a single node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeStats {
    depth: Cell<Cached<usize>>,
    height: Cell<Cached<usize>>,
    size: Cell<Cached<usize>>,
}

impl Default for NodeStats {
    /// The statistics of a detached leaf.
    fn default() -> Self {
        NodeStats {
            depth: Cell::new(Cached::Valid(0)),
            height: Cell::new(Cached::Valid(0)),
            size: Cell::new(Cached::Valid(1)),
        }
    }
}

impl NodeStats {
    pub fn depth(&self) -> Cached<usize> {
        self.depth.get()
    }

    pub fn height(&self) -> Cached<usize> {
        self.height.get()
    }

    pub fn size(&self) -> Cached<usize> {
        self.size.get()
    }

    fn extent(&self) -> Option<(usize, usize)> {
        Some((self.height.get().valid()?, self.size.get().valid()?))
    }
}

impl<V> TreeStore<V> {
    /// Number of edges between `node` and its root.
    pub fn depth(&self, node: TreeNodeId) -> usize {
        if let Cached::Valid(depth) = self.nodes[node.0].stats.depth.get() {
            return depth;
        }

        // stale chain, ending below the first ancestor with a valid depth (or at the root)
        let mut chain = vec![node];
        let mut depth = 0;
        let mut current = node;
        while let Some(parent) = self.parent_of(current) {
            if let Cached::Valid(parent_depth) = self.nodes[parent.0].stats.depth.get() {
                depth = parent_depth + 1;
                break;
            }
            chain.push(parent);
            current = parent;
        }

        for &n in chain.iter().rev() {
            self.nodes[n.0].stats.depth.set(Cached::Valid(depth));
            depth += 1;
        }
        depth - 1
    }

    /// Number of edges on the longest downward path from `node` to a leaf; 0 for a leaf.
    pub fn height(&self, node: TreeNodeId) -> usize {
        self.extent(node).0
    }

    /// Number of nodes in the subtree rooted at `node`, itself included.
    pub fn size(&self, node: TreeNodeId) -> usize {
        self.extent(node).1
    }

    pub fn is_depth_valid(&self, node: TreeNodeId) -> bool {
        self.nodes[node.0].stats.depth.get().is_valid()
    }

    pub fn is_height_size_valid(&self, node: TreeNodeId) -> bool {
        self.nodes[node.0].stats.extent().is_some()
    }

    /// Height and size of `node`, recomputing stale entries of its subtree bottom-up.
    fn extent(&self, node: TreeNodeId) -> (usize, usize) {
        if let Some(extent) = self.nodes[node.0].stats.extent() {
            return extent;
        }

        let mut stack = vec![(node, false)];
        while let Some((n, expanded)) = stack.pop() {
            let stats = &self.nodes[n.0].stats;
            if expanded {
                let (mut height, mut size) = (0, 1);
                for &child in self.children_of(n) {
                    let (child_height, child_size) = self.nodes[child.0]
                        .stats
                        .extent()
                        .unwrap_or_else(|| unreachable!("children are validated first"));
                    height = height.max(child_height + 1);
                    size += child_size;
                }
                stats.height.set(Cached::Valid(height));
                stats.size.set(Cached::Valid(size));
            } else if stats.extent().is_none() {
                stack.push((n, true));
                stack.extend(
                    self.children_of(n)
                        .iter()
                        .filter(|c| self.nodes[c.0].stats.extent().is_none())
                        .map(|&c| (c, false)),
                );
            }
        }

        self.nodes[node.0]
            .stats
            .extent()
            .unwrap_or_else(|| unreachable!("just recomputed"))
    }

    /// Marks the depth of `node` and of its subtree stale.
    pub(crate) fn invalidate_depth(&self, node: TreeNodeId) {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            let depth = &self.nodes[n.0].stats.depth;
            if !depth.get().is_valid() {
                continue;
            }
            depth.set(Cached::Stale);
            stack.extend_from_slice(self.children_of(n));
        }
    }

    /// Marks height and size of `node` and of its ancestors stale.
    pub(crate) fn invalidate_height_size(&self, node: TreeNodeId) {
        let mut current = Some(node);
        while let Some(n) = current {
            let stats = &self.nodes[n.0].stats;
            if stats.extent().is_none() {
                break;
            }
            stats.height.set(Cached::Stale);
            stats.size.set(Cached::Stale);
            current = self.parent_of(n);
        }
    }

    /// Deepest node that is an ancestor of both `a` and `b` (a node counts as its own
    /// ancestor). `None` if they belong to different trees.
    pub fn latest_common_ancestor(&self, a: TreeNodeId, b: TreeNodeId) -> Option<TreeNodeId> {
        let (mut a, mut b) = (a, b);
        let (depth_a, depth_b) = (self.depth(a), self.depth(b));
        for _ in depth_b..depth_a {
            a = self.parent_of(a)?;
        }
        for _ in depth_a..depth_b {
            b = self.parent_of(b)?;
        }
        while a != b {
            a = self.parent_of(a)?;
            b = self.parent_of(b)?;
        }
        Some(a)
    }
}
