//! Building trees from flat parent-pointer data.
//!
//! A [`Forest<V>`] owns a [`TreeStore<V>`] plus the ordered list of its trees. The builders
//! create every node first, then resolve each item's parent among the built nodes and link
//! them through [`TreeStore::set_parent`], so structural problems in the input (an item that
//! is its own parent, cyclic parent data) surface as [`TreeError`]s.
//!
//! Children and roots appear in source order.

use std::{
    collections::hash_map::Entry,
    hash::Hash,
    ops::{Index, IndexMut},
    slice,
};

use ahash::AHashMap;
use by_address::ByAddress;
use derive_more::Display;
use log::debug;
use thiserror::Error;

use crate::list::{check_bound, check_index, ListError};

use super::{Hierarchy, TreeError, TreeNodeId, TreeStore};

/// Errors raised while building or extending a [`Forest`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ForestError {
    #[error("parent of source item {index} is not part of the source")]
    ParentNotFound { index: usize },
    #[error("source item {index} repeats the key of item {first}")]
    DuplicateKey { index: usize, first: usize },
    #[error("node {0} has a parent and cannot root a tree")]
    NotARoot(TreeNodeId),
    #[error(transparent)]
    Structure(#[from] TreeError),
    #[error(transparent)]
    Range(#[from] ListError),
}

/// A tree of a [`Forest`], identified by its root node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[display(fmt = "tree rooted at {}", root)]
pub struct Tree {
    pub(crate) root: TreeNodeId,
}

impl Tree {
    pub fn root(&self) -> TreeNodeId {
        self.root
    }
}

/// An ordered collection of independent trees sharing one node store.
#[derive(Debug)]
pub struct Forest<V> {
    pub(crate) nodes: TreeStore<V>,
    pub(crate) roots: Vec<Tree>,
}

impl<V> Default for Forest<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Index<usize> for Forest<V> {
    type Output = Tree;
    fn index(&self, index: usize) -> &Self::Output {
        &self.roots[index]
    }
}

impl<V> Index<TreeNodeId> for Forest<V> {
    type Output = V;
    fn index(&self, index: TreeNodeId) -> &Self::Output {
        &self.nodes[index]
    }
}

impl<V> IndexMut<TreeNodeId> for Forest<V> {
    fn index_mut(&mut self, index: TreeNodeId) -> &mut Self::Output {
        &mut self.nodes[index]
    }
}

impl<'a, V> IntoIterator for &'a Forest<V> {
    type Item = &'a Tree;
    type IntoIter = slice::Iter<'a, Tree>;
    fn into_iter(self) -> Self::IntoIter {
        self.roots.iter()
    }
}

impl<V> Forest<V> {
    pub fn new() -> Self {
        Forest {
            nodes: TreeStore::new(),
            roots: Vec::new(),
        }
    }

    /// Number of trees.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Tree> {
        self.roots.iter()
    }

    pub fn trees(&self) -> &[Tree] {
        &self.roots
    }

    pub fn get(&self, index: usize) -> Option<&Tree> {
        self.roots.get(index)
    }

    /// Data of the root of the `index`-th tree.
    pub fn root_data(&self, index: usize) -> Option<&V> {
        let tree = self.roots.get(index)?;
        self.nodes.data(tree.root)
    }

    /// Creates a detached node and registers it as a new last tree.
    pub fn add_tree(&mut self, data: V) -> Tree {
        let tree = Tree {
            root: self.nodes.add_node(data),
        };
        self.roots.push(tree);
        tree
    }

    /// Registers an existing root of the store as the last tree.
    pub fn push(&mut self, root: TreeNodeId) -> Result<Tree, ForestError> {
        let len = self.roots.len();
        self.insert(len, root)
    }

    pub fn insert(&mut self, index: usize, root: TreeNodeId) -> Result<Tree, ForestError> {
        check_bound("index", index, self.roots.len())?;
        let tree = self.as_tree(root)?;
        self.roots.insert(index, tree);
        Ok(tree)
    }

    /// Replaces the `index`-th tree with the one rooted at `root`, returning the replaced tree.
    pub fn set(&mut self, index: usize, root: TreeNodeId) -> Result<Tree, ForestError> {
        check_index("index", index, self.roots.len())?;
        let tree = self.as_tree(root)?;
        Ok(std::mem::replace(&mut self.roots[index], tree))
    }

    /// Forgets the `index`-th tree. Its nodes stay in the store.
    pub fn remove(&mut self, index: usize) -> Result<Tree, ForestError> {
        check_index("index", index, self.roots.len())?;
        Ok(self.roots.remove(index))
    }

    /// Forgets every tree; the store keeps all nodes.
    pub fn clear(&mut self) {
        self.roots.clear()
    }

    pub fn contains(&self, tree: &Tree) -> bool {
        self.roots.contains(tree)
    }

    pub fn index_of(&self, tree: &Tree) -> Option<usize> {
        self.roots.iter().position(|t| t == tree)
    }

    fn as_tree(&self, root: TreeNodeId) -> Result<Tree, ForestError> {
        self.nodes.check_id(root)?;
        if !self.nodes.is_root(root) {
            return Err(ForestError::NotARoot(root));
        }
        Ok(Tree { root })
    }

    pub fn store(&self) -> &TreeStore<V> {
        &self.nodes
    }

    pub fn store_mut(&mut self) -> &mut TreeStore<V> {
        &mut self.nodes
    }

    pub fn into_store(self) -> TreeStore<V> {
        self.nodes
    }

    /// Box-drawing rendering of the `index`-th tree.
    pub fn display_tree(
        &self,
        index: usize,
        mut node_display: impl FnMut(TreeNodeId, &V) -> String,
    ) -> Result<String, ForestError> {
        check_index("index", index, self.roots.len())?;
        let mut output = String::new();
        let _ = self
            .nodes
            .draw_tree(&mut output, self.roots[index].root, &mut node_display);
        Ok(output)
    }

    /// Links each node below its resolved parent. Node `i` of `store` is source item `i`.
    fn link(
        mut store: TreeStore<V>,
        parents: Vec<Option<TreeNodeId>>,
    ) -> Result<Self, ForestError> {
        let mut roots = Vec::new();
        for (index, parent) in parents.into_iter().enumerate() {
            let node = TreeNodeId(index);
            match parent {
                None => roots.push(Tree { root: node }),
                Some(parent) => {
                    store.set_parent(node, Some(parent)).inspect_err(|err| {
                        debug!("cannot link source item {index}: {err}");
                    })?;
                }
            }
        }
        Ok(Forest {
            nodes: store,
            roots,
        })
    }
}

/// Builds a forest whose parents are given by reference into `source`.
///
/// `parent_selector` must return `None` for roots and otherwise a reference to an element of
/// `source` itself; a reference to anything else (even an equal value) is
/// [`ForestError::ParentNotFound`].
pub fn build_forest<'a, S, V>(
    source: &'a [S],
    mut node_selector: impl FnMut(&'a S) -> V,
    mut parent_selector: impl FnMut(&'a S) -> Option<&'a S>,
) -> Result<Forest<V>, ForestError> {
    let mut store = TreeStore::with_capacity(source.len());
    let mut by_address = AHashMap::with_capacity(source.len());
    for item in source {
        let node = store.add_node(node_selector(item));
        by_address.insert(ByAddress(item), node);
    }

    let parents = source
        .iter()
        .enumerate()
        .map(|(index, item)| match parent_selector(item) {
            None => Ok(None),
            Some(parent) => by_address
                .get(&ByAddress(parent))
                .copied()
                .map(Some)
                .ok_or(ForestError::ParentNotFound { index }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Forest::link(store, parents)
}

/// Builds a forest from items identified by a key, each naming the key of its parent.
pub fn build_forest_by_key<S, K, V>(
    source: &[S],
    mut key_selector: impl FnMut(&S) -> K,
    mut node_selector: impl FnMut(&S) -> V,
    mut parent_key_selector: impl FnMut(&S) -> Option<K>,
) -> Result<Forest<V>, ForestError>
where
    K: Eq + Hash,
{
    let mut store = TreeStore::with_capacity(source.len());
    let mut by_key: AHashMap<K, TreeNodeId> = AHashMap::with_capacity(source.len());
    for (index, item) in source.iter().enumerate() {
        let node = store.add_node(node_selector(item));
        match by_key.entry(key_selector(item)) {
            Entry::Occupied(first) => {
                return Err(ForestError::DuplicateKey {
                    index,
                    first: first.get().0,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(node);
            }
        }
    }

    let parents = source
        .iter()
        .enumerate()
        .map(|(index, item)| match parent_key_selector(item) {
            None => Ok(None),
            Some(key) => by_key
                .get(&key)
                .copied()
                .map(Some)
                .ok_or(ForestError::ParentNotFound { index }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Forest::link(store, parents)
}

/// Builds a forest whose node values are the items themselves, parents given by value.
pub fn build_forest_by_value<T>(
    source: &[T],
    parent_selector: impl FnMut(&T) -> Option<T>,
) -> Result<Forest<T>, ForestError>
where
    T: Eq + Hash + Clone,
{
    build_forest_by_key(source, T::clone, T::clone, parent_selector)
}
