use std::cmp::Ordering;

use itertools::Itertools;

use super::{Edit, Plan, TreeError, TreeNodeId, TreeStore};
use crate::list::{check_range, ListChange, ListError};

/// Mutable view of the children of one node.
///
/// Mirrors the mutating API of [`ControllableList`](crate::list::ControllableList), but every
/// operation also rewrites the parent links of the nodes it moves. A node added here is first
/// detached from its previous parent; a node removed here becomes a root.
///
/// Every operation returns `Ok(false)` if any affected child list vetoed it, in which case
/// nothing changed.
pub struct ChildrenMut<'a, V> {
    store: &'a mut TreeStore<V>,
    parent: TreeNodeId,
}

impl<'a, V> ChildrenMut<'a, V> {
    pub(crate) fn new(store: &'a mut TreeStore<V>, parent: TreeNodeId) -> Self {
        ChildrenMut { store, parent }
    }

    pub fn parent(&self) -> TreeNodeId {
        self.parent
    }

    pub fn as_slice(&self) -> &[TreeNodeId] {
        self.store.nodes[self.parent.0].children.as_slice()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Rejects the whole batch if any node may not become a child of this one.
    fn check_incoming(&self, incoming: &[TreeNodeId]) -> Result<(), TreeError> {
        for &child in incoming {
            self.store.check_attach(self.parent, child)?;
        }
        if let Some(&child) = incoming.iter().duplicates().next() {
            return Err(TreeError::DuplicateChild {
                parent: self.parent,
                child,
            });
        }
        Ok(())
    }

    pub fn push(&mut self, child: TreeNodeId) -> Result<bool, TreeError> {
        let len = self.len();
        self.insert_range(len, [child])
    }

    pub fn insert(&mut self, index: usize, child: TreeNodeId) -> Result<bool, TreeError> {
        self.insert_range(index, [child])
    }

    pub fn add_range(
        &mut self,
        children: impl IntoIterator<Item = TreeNodeId>,
    ) -> Result<bool, TreeError> {
        let len = self.len();
        self.insert_range(len, children)
    }

    /// Inserts `children` at `index`, in order, detaching them from their current parents.
    pub fn insert_range(
        &mut self,
        index: usize,
        children: impl IntoIterator<Item = TreeNodeId>,
    ) -> Result<bool, TreeError> {
        check_range(index, 0, self.len())?;
        let incoming = children.into_iter().collect_vec();
        if incoming.is_empty() {
            return Ok(true);
        }
        self.check_incoming(&incoming)?;

        let mut edits = self.store.detach_edits(&incoming);
        let relinks = incoming.iter().map(|&c| (c, Some(self.parent))).collect();
        edits.push(Edit {
            owner: self.parent,
            change: ListChange::insertion(index, incoming),
        });
        Ok(self.store.execute(Plan { edits, relinks }))
    }

    /// Removes `child` if it belongs to this node. Returns `Ok(false)` if it does not.
    pub fn remove(&mut self, child: TreeNodeId) -> Result<bool, TreeError> {
        match self.store.nodes[self.parent.0].children.index_of(&child) {
            Some(index) => self.remove_range(index, 1),
            None => Ok(false),
        }
    }

    /// Removes the child at `index`, returning it unless the removal was vetoed.
    pub fn remove_at(&mut self, index: usize) -> Result<Option<TreeNodeId>, TreeError> {
        let child = self.store.nodes[self.parent.0]
            .children
            .get(index)
            .copied()
            .ok_or(ListError::IndexOutOfRange {
                name: "index",
                value: index,
                bound: self.len(),
            })?;
        Ok(self.remove_range(index, 1)?.then_some(child))
    }

    pub fn remove_range(&mut self, index: usize, count: usize) -> Result<bool, TreeError> {
        check_range(index, count, self.len())?;
        if count == 0 {
            return Ok(true);
        }
        let outgoing = self.as_slice()[index..index + count].to_vec();
        let relinks = outgoing.iter().map(|&c| (c, None)).collect();
        Ok(self.store.execute(Plan {
            edits: vec![Edit {
                owner: self.parent,
                change: ListChange::removal(index, outgoing),
            }],
            relinks,
        }))
    }

    /// Detaches every child.
    pub fn clear(&mut self) -> Result<bool, TreeError> {
        let len = self.len();
        self.remove_range(0, len)
    }

    /// Replaces the child at `index` with `child`, returning the replaced child unless the
    /// replacement was vetoed. Replacing a child with itself changes nothing.
    pub fn set(
        &mut self,
        index: usize,
        child: TreeNodeId,
    ) -> Result<Option<TreeNodeId>, TreeError> {
        let old = self.store.nodes[self.parent.0]
            .children
            .get(index)
            .copied()
            .ok_or(ListError::IndexOutOfRange {
                name: "index",
                value: index,
                bound: self.len(),
            })?;
        if old == child {
            return Ok(Some(old));
        }
        self.check_incoming(&[child])?;

        let mut edits = self.store.detach_edits(&[child]);
        edits.push(Edit {
            owner: self.parent,
            change: ListChange::Replace {
                index,
                old,
                new: child,
            },
        });
        let done = self.store.execute(Plan {
            edits,
            relinks: vec![(old, None), (child, Some(self.parent))],
        });
        Ok(done.then_some(old))
    }

    /// Replaces the `count` children at `index` with `children`.
    ///
    /// The overlapping prefix is replaced in place, then the surplus of old children is
    /// removed or the surplus of new ones inserted. A node may only stay in the window at its
    /// current position.
    pub fn set_range(
        &mut self,
        index: usize,
        count: usize,
        children: impl IntoIterator<Item = TreeNodeId>,
    ) -> Result<bool, TreeError> {
        check_range(index, count, self.len())?;
        let incoming = children.into_iter().collect_vec();
        if count == 0 {
            return self.insert_range(index, incoming);
        }
        if incoming.is_empty() {
            return self.remove_range(index, count);
        }

        let window = self.as_slice()[index..index + count].to_vec();
        let kept = |k: usize| window.get(k) == incoming.get(k);
        let arriving = incoming
            .iter()
            .enumerate()
            .filter(|&(k, _)| !kept(k))
            .map(|(_, &c)| c)
            .collect_vec();
        self.check_incoming(&arriving)?;

        let mut plan = Plan {
            edits: self.store.detach_edits(&arriving),
            relinks: window
                .iter()
                .enumerate()
                .filter(|&(k, _)| !kept(k))
                .map(|(_, &c)| (c, None))
                .collect(),
        };
        plan.relinks.extend(arriving.iter().map(|&c| (c, Some(self.parent))));

        let replaced = count.min(incoming.len());
        let change = if replaced == 1 {
            ListChange::Replace {
                index,
                old: window[0],
                new: incoming[0],
            }
        } else {
            ListChange::ReplaceRange {
                index,
                old: window[..replaced].to_vec(),
                new: incoming[..replaced].to_vec(),
            }
        };
        plan.edits.push(Edit {
            owner: self.parent,
            change,
        });
        if count > replaced {
            plan.edits.push(Edit {
                owner: self.parent,
                change: ListChange::removal(index + replaced, window[replaced..].to_vec()),
            });
        } else if incoming.len() > replaced {
            plan.edits.push(Edit {
                owner: self.parent,
                change: ListChange::insertion(index + replaced, incoming[replaced..].to_vec()),
            });
        }
        Ok(self.store.execute(plan))
    }

    // Reordering keeps membership, hence parent links and statistics.

    pub fn reverse(&mut self) -> bool {
        self.store.nodes[self.parent.0].children.reverse()
    }

    pub fn reverse_range(&mut self, index: usize, count: usize) -> Result<bool, TreeError> {
        Ok(self.store.nodes[self.parent.0]
            .children
            .reverse_range(index, count)?)
    }

    /// Sorts the children by comparing their data.
    pub fn sort_by_data(&mut self, mut compare: impl FnMut(&V, &V) -> Ordering) -> bool {
        let mut children = std::mem::take(&mut self.store.nodes[self.parent.0].children);
        let nodes = &self.store.nodes;
        let sorted = children.sort_by(|a, b| compare(&nodes[a.0].data, &nodes[b.0].data));
        self.store.nodes[self.parent.0].children = children;
        sorted
    }

    pub fn sort_by_key<K: Ord>(&mut self, mut key: impl FnMut(&V) -> K) -> bool {
        self.sort_by_data(|a, b| key(a).cmp(&key(b)))
    }
}
