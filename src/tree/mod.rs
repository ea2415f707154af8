//! Self-synchronizing trees stored in an arena.
//!
//! All nodes live in a [`TreeStore<V>`] and are addressed by [`TreeNodeId`]. Each node keeps a
//! non-owning parent link and an ordered [`ControllableList`] of children. The store keeps the
//! two directions consistent whichever side is edited:
//!
//! *   [`TreeStore::set_parent`] moves a node under a new parent (appended last) or detaches it.
//! *   [`TreeStore::children_mut`] returns a [`ChildrenMut`] handle whose list operations rewrite
//!     the parent links of every node they add, remove or replace.
//! *   [`TreeStore::unlink`] removes a node and splices its children into its old position.
//!
//! Every structural edit is checked first (self loops, cycles, duplicate children), then every
//! affected child list is asked for approval through its changing callbacks. Only when all
//! approve are the lists mutated, the parent links rewritten, the cached statistics
//! (see [`stats`]) invalidated and the changed/parent-changed callbacks informed. A veto turns
//! the whole edit into a no-op reported as `Ok(false)`.
//!
//! Read-only navigation is provided by the [`Hierarchy`] trait, whose default methods build
//! on the iterators in [`iterato`].

use std::{
    fmt::{self, Write},
    ops::{Index, IndexMut},
};

use bitvec::bitvec;
use derive_more::{From, Into};
use itertools::Itertools;
use log::{debug, trace};
use thiserror::Error;

use crate::list::{ControllableList, ListChange, ListError, ListenerId};

pub use children::ChildrenMut;
pub use forest::{Forest, ForestError, Tree};
pub use iterato::{AncestorsIter, BfsIter, PostorderIter, PreorderIter, TraversalOrder, Traverse};
pub use stats::{Cached, NodeStats};

pub mod children;
pub mod forest;
pub mod iterato;
pub mod stats;

/// A type-safe identifier for a node within a [`TreeStore`].
/// Wraps a `usize` index into the underlying node storage vector.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into)]
pub struct TreeNodeId(pub(crate) usize);

impl fmt::Display for TreeNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload of the parent-changed notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParentChange {
    pub node: TreeNodeId,
    pub old: Option<TreeNodeId>,
    pub new: Option<TreeNodeId>,
}

/// Errors that can occur during structural tree operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0} cannot be its own parent")]
    SelfLoop(TreeNodeId),
    #[error("making {child} a child of {parent} would create a cycle")]
    Cycle {
        parent: TreeNodeId,
        child: TreeNodeId,
    },
    #[error("node {child} is already a child of {parent}")]
    DuplicateChild {
        parent: TreeNodeId,
        child: TreeNodeId,
    },
    #[error("a non-binary tree cannot be traversed in order")]
    InOrderUnsupported,
    #[error("invalid TreeNodeId: {0}")]
    InvalidNodeId(TreeNodeId),
    #[error("node {child} is listed under {parent}, but its parent link disagrees")]
    Desynchronized {
        parent: TreeNodeId,
        child: TreeNodeId,
    },
    #[error(transparent)]
    List(#[from] ListError),
}

// --- Navigation ---

/// Read access to a parent/children structure.
///
/// Only [`Hierarchy::parent_of`] and [`Hierarchy::children_of`] are required, every query
/// and traversal is derived from them.
pub trait Hierarchy {
    fn parent_of(&self, node: TreeNodeId) -> Option<TreeNodeId>;

    fn children_of(&self, node: TreeNodeId) -> &[TreeNodeId];

    fn is_root(&self, node: TreeNodeId) -> bool {
        self.parent_of(node).is_none()
    }

    fn is_leaf(&self, node: TreeNodeId) -> bool {
        self.children_of(node).is_empty()
    }

    /// Last node of the parent chain.
    fn root(&self, node: TreeNodeId) -> TreeNodeId {
        self.ancestors(node).last().unwrap_or(node)
    }

    /// From the parent of `node` up to its root.
    fn ancestors(&self, node: TreeNodeId) -> AncestorsIter<'_, Self> {
        AncestorsIter::new(self, node)
    }

    /// Every node below `node`, in pre-order.
    fn descendants(&self, node: TreeNodeId) -> std::iter::Skip<PreorderIter<'_, Self>> {
        self.iter_preorder(node).skip(1)
    }

    /// Leaves of the subtree rooted at `node`, in pre-order.
    fn leaves(&self, node: TreeNodeId) -> impl Iterator<Item = TreeNodeId> + '_ {
        self.iter_preorder(node).filter(move |&n| self.is_leaf(n))
    }

    /// Whether `ancestor` is a proper ancestor of `node`.
    fn is_child_of(&self, node: TreeNodeId, ancestor: TreeNodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Whether `node` is a proper ancestor of `descendant`.
    fn is_ancestor_of(&self, node: TreeNodeId, descendant: TreeNodeId) -> bool {
        self.is_child_of(descendant, node)
    }

    fn iter_preorder(&self, start: TreeNodeId) -> PreorderIter<'_, Self> {
        PreorderIter::new(self, start)
    }

    fn iter_postorder(&self, start: TreeNodeId) -> PostorderIter<'_, Self> {
        PostorderIter::new(self, start)
    }

    fn iter_bfs(&self, start: TreeNodeId) -> BfsIter<'_, Self> {
        BfsIter::new(self, start)
    }

    /// Traverses the subtree rooted at `start` in the given order.
    ///
    /// [`TraversalOrder::InOrder`] is rejected, as these trees are not binary.
    fn traverse(
        &self,
        start: TreeNodeId,
        order: TraversalOrder,
    ) -> Result<Traverse<'_, Self>, TreeError> {
        match order {
            TraversalOrder::PreOrder => Ok(Traverse::PreOrder(self.iter_preorder(start))),
            TraversalOrder::PostOrder => Ok(Traverse::PostOrder(self.iter_postorder(start))),
            TraversalOrder::BreadthFirst => Ok(Traverse::BreadthFirst(self.iter_bfs(start))),
            TraversalOrder::InOrder => Err(TreeError::InOrderUnsupported),
        }
    }
}

// --- Storage ---

type ParentHandler = Box<dyn FnMut(&ParentChange)>;

/// A node: its data, its parent link, its children and its cached statistics.
pub struct TreeNode<V> {
    pub(crate) data: V,
    pub(crate) parent: Option<TreeNodeId>,
    pub(crate) children: ControllableList<TreeNodeId>,
    pub(crate) stats: NodeStats,
    parent_listeners: Vec<(ListenerId, ParentHandler)>,
}

impl<V> TreeNode<V> {
    fn new(data: V, config: ChildrenConfig) -> Self {
        let mut children = ControllableList::new();
        children.set_changing_enabled(config.changing_enabled);
        children.set_changed_enabled(config.changed_enabled);
        TreeNode {
            data,
            parent: None,
            children,
            stats: NodeStats::default(),
            parent_listeners: Vec::new(),
        }
    }

    pub fn data(&self) -> &V {
        &self.data
    }

    pub fn parent(&self) -> Option<TreeNodeId> {
        self.parent
    }

    pub fn children(&self) -> &[TreeNodeId] {
        self.children.as_slice()
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }
}

impl<V: fmt::Debug> fmt::Debug for TreeNode<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("data", &self.data)
            .field("parent", &self.parent)
            .field("children", &self.children.as_slice())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Channel switches applied to the child list of every node a [`TreeStore`] creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildrenConfig {
    pub changing_enabled: bool,
    pub changed_enabled: bool,
}

impl Default for ChildrenConfig {
    fn default() -> Self {
        ChildrenConfig {
            changing_enabled: true,
            changed_enabled: true,
        }
    }
}

/// Arena holding every node of one or more trees.
pub struct TreeStore<V> {
    pub(crate) nodes: Vec<TreeNode<V>>,
    config: ChildrenConfig,
    next_listener: usize,
}

impl<V> Default for TreeStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for TreeStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeStore")
            .field("nodes", &self.nodes)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<V> Index<TreeNodeId> for TreeStore<V> {
    type Output = V;
    fn index(&self, index: TreeNodeId) -> &Self::Output {
        &self.nodes[index.0].data
    }
}

impl<V> IndexMut<TreeNodeId> for TreeStore<V> {
    fn index_mut(&mut self, index: TreeNodeId) -> &mut Self::Output {
        &mut self.nodes[index.0].data
    }
}

impl<V> Hierarchy for TreeStore<V> {
    fn parent_of(&self, node: TreeNodeId) -> Option<TreeNodeId> {
        self.nodes[node.0].parent
    }

    fn children_of(&self, node: TreeNodeId) -> &[TreeNodeId] {
        self.nodes[node.0].children.as_slice()
    }
}

/// One change on the child list of `owner`.
pub(crate) struct Edit {
    pub(crate) owner: TreeNodeId,
    pub(crate) change: ListChange<TreeNodeId>,
}

/// Child list edits plus the parent links they imply, executed all or nothing.
#[derive(Default)]
pub(crate) struct Plan {
    pub(crate) edits: Vec<Edit>,
    pub(crate) relinks: Vec<(TreeNodeId, Option<TreeNodeId>)>,
}

impl<V> TreeStore<V> {
    pub fn new() -> Self {
        Self::with_config(ChildrenConfig::default())
    }

    pub fn with_config(config: ChildrenConfig) -> Self {
        TreeStore {
            nodes: Vec::new(),
            config,
            next_listener: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        TreeStore {
            nodes: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    pub fn config(&self) -> ChildrenConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: TreeNodeId) -> bool {
        node.0 < self.nodes.len()
    }

    pub(crate) fn check_id(&self, node: TreeNodeId) -> Result<(), TreeError> {
        if self.contains(node) {
            Ok(())
        } else {
            Err(TreeError::InvalidNodeId(node))
        }
    }

    /// Adds a detached node (a new root).
    pub fn add_node(&mut self, data: V) -> TreeNodeId {
        let node_id = TreeNodeId(self.nodes.len());
        self.nodes.push(TreeNode::new(data, self.config));
        node_id
    }

    /// Adds a node as the *last* child of `parent`.
    ///
    /// If a changing callback of `parent`'s children vetoes the insertion, the node is still
    /// created, but as a detached root.
    pub fn add_child(&mut self, parent: TreeNodeId, data: V) -> Result<TreeNodeId, TreeError> {
        self.check_id(parent)?;
        let node_id = self.add_node(data);
        self.set_parent(node_id, Some(parent))?;
        Ok(node_id)
    }

    pub fn node(&self, node: TreeNodeId) -> Option<&TreeNode<V>> {
        self.nodes.get(node.0)
    }

    pub fn data(&self, node: TreeNodeId) -> Option<&V> {
        self.nodes.get(node.0).map(|n| &n.data)
    }

    pub fn data_mut(&mut self, node: TreeNodeId) -> Option<&mut V> {
        self.nodes.get_mut(node.0).map(|n| &mut n.data)
    }

    pub fn parent(&self, node: TreeNodeId) -> Option<TreeNodeId> {
        self.parent_of(node)
    }

    pub fn children(&self, node: TreeNodeId) -> &[TreeNodeId] {
        self.children_of(node)
    }

    /// The child list of `node`, with its listeners and channel switches.
    pub fn children_list(&self, node: TreeNodeId) -> &ControllableList<TreeNodeId> {
        &self.nodes[node.0].children
    }

    /// Position of `node` among its siblings.
    pub fn index_in_parent(&self, node: TreeNodeId) -> Option<usize> {
        let parent = self.nodes[node.0].parent?;
        self.nodes[parent.0].children.index_of(&node)
    }

    pub fn iter_node_ids(&self) -> impl Iterator<Item = TreeNodeId> + '_ {
        (0..self.nodes.len()).map(TreeNodeId)
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = (TreeNodeId, &V)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (TreeNodeId(i), &n.data))
    }

    /// Every node without a parent, in creation order.
    pub fn roots(&self) -> impl Iterator<Item = TreeNodeId> + '_ {
        self.iter_node_ids().filter(|&n| self.is_root(n))
    }

    // --- Listeners ---

    /// Registers a callback informed whenever the parent of `node` changes.
    pub fn on_parent_changed(
        &mut self,
        node: TreeNodeId,
        handler: impl FnMut(&ParentChange) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.nodes[node.0]
            .parent_listeners
            .push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe_parent_changed(&mut self, node: TreeNodeId, listener: ListenerId) -> bool {
        let listeners = &mut self.nodes[node.0].parent_listeners;
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != listener);
        before != listeners.len()
    }

    /// Registers a callback asked to approve every change of the children of `node`.
    pub fn on_children_changing(
        &mut self,
        node: TreeNodeId,
        handler: impl FnMut(&ListChange<TreeNodeId>) -> bool + 'static,
    ) -> ListenerId {
        self.nodes[node.0].children.on_changing(handler)
    }

    /// Registers a callback informed after every change of the children of `node`.
    pub fn on_children_changed(
        &mut self,
        node: TreeNodeId,
        handler: impl FnMut(&ListChange<TreeNodeId>) + 'static,
    ) -> ListenerId {
        self.nodes[node.0].children.on_changed(handler)
    }

    pub fn unsubscribe_children_changing(
        &mut self,
        node: TreeNodeId,
        listener: ListenerId,
    ) -> bool {
        self.nodes[node.0].children.unsubscribe_changing(listener)
    }

    pub fn unsubscribe_children_changed(&mut self, node: TreeNodeId, listener: ListenerId) -> bool {
        self.nodes[node.0].children.unsubscribe_changed(listener)
    }

    /// Switches the channels of the child list of a single node.
    pub fn set_children_channels(&mut self, node: TreeNodeId, config: ChildrenConfig) {
        let children = &mut self.nodes[node.0].children;
        children.set_changing_enabled(config.changing_enabled);
        children.set_changed_enabled(config.changed_enabled);
    }

    fn notify_parent_changed(&mut self, change: &ParentChange) {
        for (_, handler) in &mut self.nodes[change.node.0].parent_listeners {
            handler(change);
        }
    }

    // --- Structural edits ---

    /// Fails if `child` may not be attached below `parent`.
    pub(crate) fn check_attach(
        &self,
        parent: TreeNodeId,
        child: TreeNodeId,
    ) -> Result<(), TreeError> {
        self.check_id(parent)?;
        self.check_id(child)?;
        if parent == child {
            return Err(TreeError::SelfLoop(child));
        }
        if self.nodes[child.0].parent == Some(parent) {
            return Err(TreeError::DuplicateChild { parent, child });
        }
        // A leaf other than `parent` cannot be one of its ancestors.
        if !self.nodes[child.0].children.is_empty() && self.is_child_of(parent, child) {
            return Err(TreeError::Cycle { parent, child });
        }
        Ok(())
    }

    /// Removals detaching each of `nodes` from its current parent.
    ///
    /// Removals from the same list are ordered by decreasing index, so that every index is
    /// still valid when its turn comes.
    pub(crate) fn detach_edits(&self, nodes: &[TreeNodeId]) -> Vec<Edit> {
        nodes
            .iter()
            .filter_map(|&n| {
                let parent = self.nodes[n.0].parent?;
                let index = self.nodes[parent.0].children.index_of(&n)?;
                Some((parent, index, n))
            })
            .sorted_by_key(|&(parent, index, _)| (parent, std::cmp::Reverse(index)))
            .map(|(owner, index, value)| Edit {
                owner,
                change: ListChange::Remove { index, value },
            })
            .collect()
    }

    /// Asks every affected list for approval, then applies `plan` in full.
    pub(crate) fn execute(&mut self, plan: Plan) -> bool {
        for edit in &plan.edits {
            if !self.nodes[edit.owner.0].children.approve(&edit.change) {
                debug!(
                    "structural edit vetoed by the children of {}: {:?} of {} node(s)",
                    edit.owner,
                    edit.change.action(),
                    edit.change.len()
                );
                return false;
            }
        }

        for edit in &plan.edits {
            self.nodes[edit.owner.0].children.apply(&edit.change);
        }
        let mut moved = Vec::with_capacity(plan.relinks.len());
        for (node, new) in plan.relinks {
            let old = std::mem::replace(&mut self.nodes[node.0].parent, new);
            if old != new {
                trace!("parent of {node}: {old:?} -> {new:?}");
                moved.push(ParentChange { node, old, new });
            }
        }

        for edit in &plan.edits {
            self.invalidate_height_size(edit.owner);
        }
        for change in &moved {
            self.invalidate_depth(change.node);
        }

        for edit in &plan.edits {
            self.nodes[edit.owner.0].children.notify(&edit.change);
        }
        for change in &moved {
            self.notify_parent_changed(change);
        }
        true
    }

    /// Mutable access to the children of `node`; every edit keeps parent links in sync.
    pub fn children_mut(&mut self, node: TreeNodeId) -> Result<ChildrenMut<'_, V>, TreeError> {
        self.check_id(node)?;
        Ok(ChildrenMut::new(self, node))
    }

    /// Moves `node` below `parent` (as its last child), or detaches it when `parent` is `None`.
    ///
    /// Returns `Ok(false)` if a changing callback vetoed the move.
    pub fn set_parent(
        &mut self,
        node: TreeNodeId,
        parent: Option<TreeNodeId>,
    ) -> Result<bool, TreeError> {
        self.check_id(node)?;
        let old = self.nodes[node.0].parent;
        if old == parent {
            return Ok(true);
        }
        if let Some(parent) = parent {
            self.check_attach(parent, node)?;
        }

        let mut edits = self.detach_edits(&[node]);
        if let Some(parent) = parent {
            edits.push(Edit {
                owner: parent,
                change: ListChange::Add {
                    index: self.nodes[parent.0].children.len(),
                    value: node,
                },
            });
        }
        Ok(self.execute(Plan {
            edits,
            relinks: vec![(node, parent)],
        }))
    }

    /// Removes `node` from its tree, keeping the rest connected.
    ///
    /// The children of `node` take its place among its former siblings, in their original
    /// order. A root's children become roots themselves. Afterwards `node` has neither parent
    /// nor children.
    pub fn unlink(&mut self, node: TreeNodeId) -> Result<bool, TreeError> {
        self.check_id(node)?;
        let children = self.nodes[node.0].children.as_slice().to_vec();
        let parent = self.nodes[node.0].parent;

        let mut plan = Plan::default();
        let mut position = None;
        if let Some(parent) = parent {
            let index = self.nodes[parent.0]
                .children
                .index_of(&node)
                .ok_or(TreeError::Desynchronized {
                    parent,
                    child: node,
                })?;
            plan.edits.push(Edit {
                owner: parent,
                change: ListChange::Remove { index, value: node },
            });
            plan.relinks.push((node, None));
            position = Some((parent, index));
        }
        if !children.is_empty() {
            plan.edits.push(Edit {
                owner: node,
                change: ListChange::removal(0, children.clone()),
            });
            plan.relinks.extend(children.iter().map(|&c| (c, parent)));
            if let Some((parent, index)) = position {
                plan.edits.push(Edit {
                    owner: parent,
                    change: ListChange::insertion(index, children),
                });
            }
        }
        if plan.edits.is_empty() {
            return Ok(true);
        }
        Ok(self.execute(plan))
    }

    // --- Consistency ---

    /// Checks the bidirectional parent/children invariant and acyclicity of the whole store.
    ///
    /// Returns the roots, in creation order.
    pub fn validate(&self) -> Result<Vec<TreeNodeId>, TreeError> {
        let n_nodes = self.nodes.len();
        let mut listed = bitvec![0; n_nodes];

        for parent in self.iter_node_ids() {
            for &child in self.children_of(parent) {
                self.check_id(child)?;
                if child == parent {
                    return Err(TreeError::SelfLoop(child));
                }
                if self.nodes[child.0].parent != Some(parent) || listed.replace(child.0, true) {
                    return Err(TreeError::Desynchronized { parent, child });
                }
            }
        }

        let mut roots = vec![];
        for node in self.iter_node_ids() {
            match self.nodes[node.0].parent {
                None => roots.push(node),
                Some(parent) => {
                    self.check_id(parent)?;
                    if !listed[node.0] {
                        return Err(TreeError::Desynchronized {
                            parent,
                            child: node,
                        });
                    }
                    let mut seen = bitvec![0; n_nodes];
                    seen.set(node.0, true);
                    for ancestor in self.ancestors(node) {
                        if seen.replace(ancestor.0, true) {
                            return Err(TreeError::Cycle {
                                parent: ancestor,
                                child: node,
                            });
                        }
                    }
                }
            }
        }
        Ok(roots)
    }

    /// Draws every tree of the store, one line per node.
    pub fn debug_draw(&self, mut node_display: impl FnMut(TreeNodeId, &V) -> String) -> String {
        let mut output = String::new();
        for root_id in self.roots() {
            let _ = self.draw_tree(&mut output, root_id, &mut node_display);
        }
        output
    }

    /// Draws the subtree rooted at `root`, which sits at column 0.
    pub fn draw_tree<W: Write>(
        &self,
        f: &mut W,
        root: TreeNodeId,
        node_display: &mut impl FnMut(TreeNodeId, &V) -> String,
    ) -> fmt::Result {
        fn draw_subtree_recursive<V, W: Write>(
            f: &mut W,
            store: &TreeStore<V>,
            node_id: TreeNodeId,
            prefix: &str,
            is_last_child: bool,
            format_node: &mut impl FnMut(TreeNodeId, &V) -> String,
        ) -> fmt::Result {
            let connector = if is_last_child {
                "└── "
            } else {
                "├── "
            };
            writeln!(
                f,
                "{prefix}{connector}{}",
                format_node(node_id, &store.nodes[node_id.0].data)
            )?;

            let indent = if is_last_child { "    " } else { "│   " };
            let child_prefix = format!("{prefix}{indent}");
            let children = store.children_of(node_id);
            for (i, &child_id) in children.iter().enumerate() {
                draw_subtree_recursive(
                    f,
                    store,
                    child_id,
                    &child_prefix,
                    i == children.len() - 1,
                    format_node,
                )?;
            }
            Ok(())
        }

        writeln!(f, "{}", node_display(root, &self.nodes[root.0].data))?;
        let children = self.children_of(root);
        for (i, &child_id) in children.iter().enumerate() {
            draw_subtree_recursive(
                f,
                self,
                child_id,
                "",
                i == children.len() - 1,
                node_display,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test;
