//! Traversal iterators shared by every [`Hierarchy`] implementation.

use std::collections::VecDeque;

use super::{Hierarchy, TreeNodeId};

/// Order in which [`Hierarchy::traverse`] visits a subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraversalOrder {
    /// Node first, then each child's subtree in order.
    PreOrder,
    /// Only meaningful for binary trees, hence always rejected.
    InOrder,
    /// Each child's subtree in order, then the node.
    PostOrder,
    /// Level by level.
    BreadthFirst,
}

// --- Ancestors Iterator ---

/// Walks the parent chain upwards, excluding the starting node.
#[derive(Clone)]
pub struct AncestorsIter<'a, S: Hierarchy + ?Sized> {
    store: &'a S,
    /// The next node ID to yield. `None` once the root has been yielded.
    current: Option<TreeNodeId>,
}

impl<'a, S: Hierarchy + ?Sized> AncestorsIter<'a, S> {
    pub fn new(store: &'a S, start_node: TreeNodeId) -> Self {
        AncestorsIter {
            store,
            current: store.parent_of(start_node),
        }
    }
}

impl<S: Hierarchy + ?Sized> Iterator for AncestorsIter<'_, S> {
    type Item = TreeNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = self.store.parent_of(node);
        Some(node)
    }
}

// --- BFS Iterator ---

/// A breadth-first iterator over a subtree, starting node included.
#[derive(Clone)]
pub struct BfsIter<'a, S: Hierarchy + ?Sized> {
    store: &'a S,
    queue: VecDeque<TreeNodeId>,
}

impl<'a, S: Hierarchy + ?Sized> BfsIter<'a, S> {
    pub fn new(store: &'a S, start: TreeNodeId) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(start);
        BfsIter { store, queue }
    }
}

impl<S: Hierarchy + ?Sized> Iterator for BfsIter<'_, S> {
    type Item = TreeNodeId;
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        self.queue.extend(self.store.children_of(node).iter().copied());
        Some(node)
    }
}

// --- Preorder Iterator ---

/// A pre-order DFS iterator over a subtree, starting node included.
pub struct PreorderIter<'a, S: Hierarchy + ?Sized> {
    store: &'a S,
    /// Nodes still to visit, next one on top.
    stack: Vec<TreeNodeId>,
}

impl<S: Hierarchy + ?Sized> Clone for PreorderIter<'_, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            stack: self.stack.clone(),
        }
    }
}

impl<'a, S: Hierarchy + ?Sized> PreorderIter<'a, S> {
    pub fn new(store: &'a S, start: TreeNodeId) -> Self {
        PreorderIter {
            store,
            stack: vec![start],
        }
    }
}

impl<S: Hierarchy + ?Sized> Iterator for PreorderIter<'_, S> {
    type Item = TreeNodeId;
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // reversed, so that the first child is visited next
        self.stack.extend(self.store.children_of(node).iter().rev().copied());
        Some(node)
    }
}

// --- Postorder Iterator ---

/// A post-order DFS iterator over a subtree, starting node included (last).
pub struct PostorderIter<'a, S: Hierarchy + ?Sized> {
    store: &'a S,
    /// Each entry is a node and the position of its next unvisited child.
    stack: Vec<(TreeNodeId, usize)>,
}

impl<S: Hierarchy + ?Sized> Clone for PostorderIter<'_, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            stack: self.stack.clone(),
        }
    }
}

impl<'a, S: Hierarchy + ?Sized> PostorderIter<'a, S> {
    pub fn new(store: &'a S, start: TreeNodeId) -> Self {
        PostorderIter {
            store,
            stack: vec![(start, 0)],
        }
    }
}

impl<S: Hierarchy + ?Sized> Iterator for PostorderIter<'_, S> {
    type Item = TreeNodeId;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (node, cursor) = self.stack.last_mut()?;
            let node = *node;
            match self.store.children_of(node).get(*cursor) {
                Some(&child) => {
                    *cursor += 1;
                    self.stack.push((child, 0));
                }
                None => {
                    self.stack.pop();
                    return Some(node);
                }
            }
        }
    }
}

// --- Order-selected traversal ---

/// Iterator returned by [`Hierarchy::traverse`].
pub enum Traverse<'a, S: Hierarchy + ?Sized> {
    PreOrder(PreorderIter<'a, S>),
    PostOrder(PostorderIter<'a, S>),
    BreadthFirst(BfsIter<'a, S>),
}

impl<S: Hierarchy + ?Sized> Iterator for Traverse<'_, S> {
    type Item = TreeNodeId;
    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Traverse::PreOrder(iter) => iter.next(),
            Traverse::PostOrder(iter) => iter.next(),
            Traverse::BreadthFirst(iter) => iter.next(),
        }
    }
}
