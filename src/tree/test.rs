use std::{cell::RefCell, cmp::Reverse, rc::Rc};

use itertools::Itertools;
use proptest::prelude::*;
use similar_asserts::assert_eq;

use super::*;
use crate::list::ChangeAction;

const NAMES: [&str; 8] = ["0", "1", "2", "3", "4", "5", "6", "7"];

/// root -> {0, 1, 2}, 1 -> {3, 4}, 3 -> {5, 6}, 2 -> {7}
fn sample() -> (TreeStore<&'static str>, TreeNodeId, Vec<TreeNodeId>) {
    let mut store = TreeStore::new();
    let root = store.add_node("root");
    let parents = [None, None, None, Some(1), Some(1), Some(3), Some(3), Some(2)];
    let mut nodes: Vec<TreeNodeId> = Vec::new();
    for (name, parent) in NAMES.into_iter().zip(parents) {
        let parent = parent.map_or(root, |p| nodes[p]);
        nodes.push(store.add_child(parent, name).unwrap());
    }
    (store, root, nodes)
}

fn draw(store: &TreeStore<&str>) -> String {
    store.debug_draw(|_, name| name.to_string())
}

#[test]
fn draws_every_tree() {
    let (store, _, _) = sample();
    insta::assert_snapshot!(draw(&store).trim_end(), @r"
    root
    ├── 0
    ├── 1
    │   ├── 3
    │   │   ├── 5
    │   │   └── 6
    │   └── 4
    └── 2
        └── 7
    ");
}

#[test]
fn statistics() {
    let (store, root, n) = sample();
    assert_eq!(store.depth(root), 0);
    assert_eq!(store.height(root), 3);
    assert_eq!(store.size(root), 9);

    assert_eq!(store.depth(n[3]), 2);
    assert_eq!(store.height(n[3]), 1);
    assert_eq!(store.size(n[3]), 3);

    assert_eq!(store.depth(n[5]), 3);
    assert_eq!(store.height(n[5]), 0);
    assert_eq!(store.size(n[5]), 1);
}

#[test]
fn moving_a_subtree_invalidates_what_it_affects() {
    let (mut store, root, n) = sample();
    for node in store.iter_node_ids().collect_vec() {
        store.depth(node);
        store.size(node);
    }

    assert!(store.set_parent(n[3], Some(n[7])).unwrap());
    assert!(!store.is_depth_valid(n[3]));
    assert!(!store.is_depth_valid(n[5]));
    assert!(store.is_depth_valid(n[4]));
    assert!(!store.is_height_size_valid(n[1]));
    assert!(!store.is_height_size_valid(n[7]));
    assert!(!store.is_height_size_valid(root));
    assert!(store.is_height_size_valid(n[3]));
    assert!(store.is_height_size_valid(n[0]));

    assert_eq!(store.depth(n[5]), 4);
    assert_eq!(store.height(root), 4);
    assert_eq!(store.size(root), 9);
    assert_eq!(store.size(n[1]), 2);
    assert_eq!(store.height(n[1]), 1);
    assert_eq!(store.size(n[2]), 5);
}

#[test]
fn reordering_keeps_statistics() {
    let (mut store, root, n) = sample();
    store.size(root);
    store.depth(n[6]);

    assert!(store.children_mut(root).unwrap().reverse());
    assert!(store.children_mut(n[3]).unwrap().sort_by_key(|name| Reverse(*name)));
    assert!(store.is_height_size_valid(root));
    assert!(store.is_depth_valid(n[6]));
    assert_eq!(store.children(root), &[n[2], n[1], n[0]]);
    assert_eq!(store.children(n[3]), &[n[6], n[5]]);
}

#[test]
fn latest_common_ancestor() {
    let (mut store, root, n) = sample();
    assert_eq!(store.latest_common_ancestor(n[5], n[4]), Some(n[1]));
    assert_eq!(store.latest_common_ancestor(n[5], n[6]), Some(n[3]));
    assert_eq!(store.latest_common_ancestor(n[0], n[7]), Some(root));
    assert_eq!(store.latest_common_ancestor(n[3], n[6]), Some(n[3]));
    assert_eq!(store.latest_common_ancestor(n[2], n[2]), Some(n[2]));

    let stranger = store.add_node("stranger");
    assert_eq!(store.latest_common_ancestor(n[5], stranger), None);
}

#[test]
fn navigation() {
    let (store, root, n) = sample();
    assert!(store.is_root(root));
    assert!(store.is_leaf(n[7]));
    assert!(!store.is_leaf(n[2]));
    assert_eq!(store.root(n[6]), root);
    assert_eq!(store.root(root), root);
    assert_eq!(store.ancestors(n[5]).collect_vec(), vec![n[3], n[1], root]);
    assert_eq!(
        store.descendants(n[1]).collect_vec(),
        vec![n[3], n[5], n[6], n[4]]
    );
    assert_eq!(
        store.leaves(root).collect_vec(),
        vec![n[0], n[5], n[6], n[4], n[7]]
    );
    assert!(store.is_child_of(n[5], n[1]));
    assert!(!store.is_child_of(n[5], n[2]));
    assert!(store.is_ancestor_of(root, n[7]));
    assert!(!store.is_ancestor_of(n[7], n[7]));
    assert_eq!(store.index_in_parent(n[4]), Some(1));
    assert_eq!(store.index_in_parent(root), None);
}

#[test]
fn traversal_orders() {
    let (store, root, n) = sample();
    let names = |order: TraversalOrder| {
        store
            .traverse(root, order)
            .unwrap()
            .map(|id| store[id])
            .join(" ")
    };
    assert_eq!(names(TraversalOrder::PreOrder), "root 0 1 3 5 6 4 2 7");
    assert_eq!(names(TraversalOrder::PostOrder), "0 5 6 3 4 1 7 2 root");
    assert_eq!(names(TraversalOrder::BreadthFirst), "root 0 1 2 3 4 7 5 6");
    assert!(matches!(
        store.traverse(n[1], TraversalOrder::InOrder),
        Err(TreeError::InOrderUnsupported)
    ));
}

#[test]
fn unlink_splices_children_into_place() {
    let (mut store, root, n) = sample();
    store.size(root);

    assert!(store.unlink(n[1]).unwrap());
    assert_eq!(store.children(root), &[n[0], n[3], n[4], n[2]]);
    assert_eq!(store.parent(n[3]), Some(root));
    assert_eq!(store.parent(n[1]), None);
    assert!(store.is_leaf(n[1]));
    assert_eq!(store.size(root), 8);
    assert_eq!(store.depth(n[5]), 2);
    assert_eq!(store.validate().unwrap(), vec![root, n[1]]);
}

#[test]
fn unlinking_a_root_frees_its_children() {
    let (mut store, root, n) = sample();
    assert!(store.unlink(root).unwrap());
    assert_eq!(store.validate().unwrap(), vec![root, n[0], n[1], n[2]]);
    assert_eq!(store.depth(n[5]), 2);

    // nothing left to do
    assert!(store.unlink(root).unwrap());
}

#[test]
fn removing_and_adding_back() {
    let (mut store, root, n) = sample();
    assert!(store.children_mut(root).unwrap().remove(n[1]).unwrap());
    assert_eq!(store.parent(n[1]), None);
    assert_eq!(store.size(root), 4);
    assert!(!store.children_mut(root).unwrap().remove(n[1]).unwrap());

    assert!(store.children_mut(root).unwrap().push(n[1]).unwrap());
    assert_eq!(store.children(root), &[n[0], n[2], n[1]]);
    assert_eq!(store.parent(n[1]), Some(root));
    assert_eq!(store.size(root), 9);
    assert_eq!(store.depth(n[6]), 3);
    store.validate().unwrap();
}

#[test]
fn structural_errors() {
    let (mut store, root, n) = sample();
    assert_eq!(
        store.set_parent(root, Some(n[5])),
        Err(TreeError::Cycle {
            parent: n[5],
            child: root,
        })
    );
    assert_eq!(
        store.set_parent(n[2], Some(n[2])),
        Err(TreeError::SelfLoop(n[2]))
    );
    assert_eq!(
        store.children_mut(n[1]).unwrap().push(n[3]),
        Err(TreeError::DuplicateChild {
            parent: n[1],
            child: n[3],
        })
    );
    assert_eq!(
        store.set_parent(TreeNodeId(40), None),
        Err(TreeError::InvalidNodeId(TreeNodeId(40)))
    );
    assert!(matches!(
        store.children_mut(n[0]).unwrap().insert(1, n[7]),
        Err(TreeError::List(_))
    ));
    // already there
    assert_eq!(store.set_parent(n[3], Some(n[1])), Ok(true));
}

#[test]
fn attaching_leaves_and_subtrees() {
    let (mut store, root, n) = sample();

    assert_eq!(
        store.set_parent(n[5], Some(n[5])),
        Err(TreeError::SelfLoop(n[5]))
    );
    assert_eq!(
        store.children_mut(n[3]).unwrap().push(n[6]),
        Err(TreeError::DuplicateChild {
            parent: n[3],
            child: n[6],
        })
    );
    assert_eq!(store.set_parent(n[0], Some(n[6])), Ok(true));
    assert_eq!(store.depth(n[0]), 4);

    assert_eq!(
        store.set_parent(n[1], Some(n[0])),
        Err(TreeError::Cycle {
            parent: n[0],
            child: n[1],
        })
    );
    assert_eq!(
        store.children_mut(n[5]).unwrap().push(n[3]),
        Err(TreeError::Cycle {
            parent: n[5],
            child: n[3],
        })
    );
    assert_eq!(store.set_parent(n[2], Some(n[4])), Ok(true));
    assert_eq!(store.children(root), &[n[1]]);
    store.validate().unwrap();
}

#[test]
fn long_chains() {
    const LEN: usize = 20_000;
    let mut store = TreeStore::with_capacity(LEN);
    let root = store.add_node(0);
    let mut last = root;
    for i in 1..LEN {
        last = store.add_child(last, i).unwrap();
    }

    assert_eq!(store.depth(last), LEN - 1);
    assert_eq!(store.height(root), LEN - 1);
    assert_eq!(store.size(root), LEN);
    assert_eq!(
        store.set_parent(root, Some(last)),
        Err(TreeError::Cycle {
            parent: last,
            child: root,
        })
    );
}

#[test]
fn offending_batches_are_rejected_whole() {
    let (mut store, root, n) = sample();
    let before = draw(&store);

    assert!(store.children_mut(n[7]).unwrap().add_range([n[0], n[0]]).is_err());
    assert!(store.children_mut(n[7]).unwrap().add_range([n[0], root]).is_err());
    assert!(store.children_mut(n[7]).unwrap().add_range([n[0], n[4]]).is_ok());
    assert!(store
        .children_mut(n[5])
        .unwrap()
        .set_range(0, 0, [n[7], n[1]])
        .is_err());

    assert_ne!(before, draw(&store));
    assert_eq!(store.children(n[7]), &[n[0], n[4]]);
    assert_eq!(store.children(root), &[n[1], n[2]]);
    assert_eq!(store.children(n[1]), &[n[3]]);
    store.validate().unwrap();
}

#[test]
fn a_veto_anywhere_cancels_the_move() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut store, root, n) = sample();
    let before = draw(&store);
    store.size(root);
    let veto = store.on_children_changing(n[1], |change| {
        !matches!(
            change.action(),
            ChangeAction::Remove | ChangeAction::RemoveRange
        )
    });

    assert_eq!(store.children_mut(root).unwrap().push(n[3]), Ok(false));
    assert_eq!(store.set_parent(n[4], None), Ok(false));
    assert_eq!(store.unlink(n[1]), Ok(false));
    assert_eq!(before, draw(&store));
    assert!(store.is_height_size_valid(root));

    assert!(store.unsubscribe_children_changing(n[1], veto));
    assert_eq!(store.set_parent(n[4], None), Ok(true));
    assert_eq!(store.children(n[1]), &[n[3]]);
}

#[test]
fn vetoed_initial_parent_leaves_a_detached_node() {
    let (mut store, root, _) = sample();
    store.on_children_changing(root, |_| false);
    let orphan = store.add_child(root, "orphan").unwrap();
    assert!(store.is_root(orphan));
    assert_eq!(store.children(root).len(), 3);
}

#[test]
fn disabled_channels_cannot_veto() {
    let mut store = TreeStore::with_config(ChildrenConfig {
        changing_enabled: false,
        changed_enabled: true,
    });
    let root = store.add_node(0);
    store.on_children_changing(root, |_| false);
    let changed = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&changed);
    store.on_children_changed(root, move |_| *counter.borrow_mut() += 1);

    let child = store.add_child(root, 1).unwrap();
    assert_eq!(store.parent(child), Some(root));
    assert_eq!(*changed.borrow(), 1);

    store.set_children_channels(root, ChildrenConfig {
        changing_enabled: true,
        changed_enabled: false,
    });
    assert_eq!(store.set_parent(child, None), Ok(false));
    assert_eq!(*changed.borrow(), 1);
}

#[test]
fn notifications_describe_the_move() {
    let (mut store, root, n) = sample();
    let parents = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&parents);
    let listener = store.on_parent_changed(n[4], move |change| sink.borrow_mut().push(*change));
    let lists = Rc::new(RefCell::new(Vec::new()));
    for owner in [n[1], n[2]] {
        let sink = Rc::clone(&lists);
        store.on_children_changed(owner, move |change| {
            sink.borrow_mut().push((owner, change.clone()))
        });
    }

    store.children_mut(n[2]).unwrap().insert(0, n[4]).unwrap();
    assert_eq!(
        *parents.borrow(),
        vec![ParentChange {
            node: n[4],
            old: Some(n[1]),
            new: Some(n[2]),
        }]
    );
    assert_eq!(
        *lists.borrow(),
        vec![
            (n[1], ListChange::Remove { index: 1, value: n[4] }),
            (n[2], ListChange::Add { index: 0, value: n[4] }),
        ]
    );

    assert!(store.unsubscribe_parent_changed(n[4], listener));
    store.set_parent(n[4], Some(root)).unwrap();
    assert_eq!(parents.borrow().len(), 1);
}

#[test]
fn set_replaces_and_detaches() {
    let (mut store, _, n) = sample();
    assert_eq!(store.children_mut(n[2]).unwrap().set(0, n[4]), Ok(Some(n[7])));
    assert_eq!(store.parent(n[7]), None);
    assert_eq!(store.parent(n[4]), Some(n[2]));
    assert_eq!(store.children(n[1]), &[n[3]]);

    assert_eq!(store.children_mut(n[2]).unwrap().set(0, n[4]), Ok(Some(n[4])));
    assert_eq!(store.children_mut(n[2]).unwrap().remove_at(0), Ok(Some(n[4])));
    store.validate().unwrap();
}

#[test]
fn set_range_keeps_unchanged_positions() {
    let (mut store, root, n) = sample();
    let changed = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changed);
    store.on_children_changed(root, move |change| sink.borrow_mut().push(change.clone()));

    assert!(store
        .children_mut(root)
        .unwrap()
        .set_range(0, 2, [n[0], n[5]])
        .unwrap());
    assert_eq!(store.children(root), &[n[0], n[5], n[2]]);
    assert_eq!(store.parent(n[0]), Some(root));
    assert!(store.is_root(n[1]));
    assert_eq!(store.children(n[3]), &[n[6]]);
    assert_eq!(
        *changed.borrow(),
        vec![ListChange::ReplaceRange {
            index: 0,
            old: vec![n[0], n[1]],
            new: vec![n[0], n[5]],
        }]
    );

    assert!(store.children_mut(root).unwrap().set_range(1, 2, [n[7]]).unwrap());
    assert_eq!(store.children(root), &[n[0], n[7]]);
    assert!(store.children_mut(root).unwrap().clear().unwrap());
    assert!(store.children_mut(root).unwrap().is_empty());
    store.validate().unwrap();
}

#[test]
fn validate_catches_desynchronized_links() {
    let (mut store, root, n) = sample();
    assert_eq!(store.validate(), Ok(vec![root]));

    store.nodes[n[7].0].parent = None;
    assert_eq!(
        store.validate(),
        Err(TreeError::Desynchronized {
            parent: n[2],
            child: n[7],
        })
    );
}

#[derive(Debug, Clone)]
enum Op {
    SetParent(usize, Option<usize>),
    Unlink(usize),
    Insert(usize, usize, usize),
    RemoveAt(usize, usize),
    Reverse(usize),
}

const N_NODES: usize = 10;

/// Depth, height and size of `id` counted from the links alone.
fn counted_stats(store: &TreeStore<usize>, id: TreeNodeId) -> (usize, usize, usize) {
    let height = store
        .iter_preorder(id)
        .map(|d| store.ancestors(d).position(|a| a == id).map_or(0, |p| p + 1))
        .max()
        .unwrap_or(0);
    (
        store.ancestors(id).count(),
        height,
        store.iter_preorder(id).count(),
    )
}

fn cached_stats(store: &TreeStore<usize>, id: TreeNodeId) -> (usize, usize, usize) {
    (store.depth(id), store.height(id), store.size(id))
}

fn op() -> impl Strategy<Value = Op> {
    let node = 0..N_NODES;
    prop_oneof![
        (node.clone(), proptest::option::of(node.clone())).prop_map(|(a, b)| Op::SetParent(a, b)),
        node.clone().prop_map(Op::Unlink),
        (node.clone(), 0..4usize, node.clone()).prop_map(|(p, i, c)| Op::Insert(p, i, c)),
        (node.clone(), 0..4usize).prop_map(|(p, i)| Op::RemoveAt(p, i)),
        node.prop_map(Op::Reverse),
    ]
}

#[derive(Debug, Clone)]
enum BulkOp {
    InsertRange(usize, usize, Vec<usize>),
    RemoveRange(usize, usize, usize),
    Set(usize, usize, usize),
    SetRange(usize, usize, usize, Vec<usize>),
    SetParent(usize, Option<usize>),
    Read(usize),
}

fn bulk_op() -> impl Strategy<Value = BulkOp> {
    let node = 0..N_NODES;
    let nodes = prop::collection::vec(node.clone(), 0..4);
    prop_oneof![
        (node.clone(), 0..4usize, nodes.clone())
            .prop_map(|(p, i, c)| BulkOp::InsertRange(p, i, c)),
        (node.clone(), 0..4usize, 0..3usize).prop_map(|(p, i, n)| BulkOp::RemoveRange(p, i, n)),
        (node.clone(), 0..4usize, node.clone()).prop_map(|(p, i, c)| BulkOp::Set(p, i, c)),
        (node.clone(), 0..4usize, 0..3usize, nodes)
            .prop_map(|(p, i, n, c)| BulkOp::SetRange(p, i, n, c)),
        (node.clone(), proptest::option::of(node.clone()))
            .prop_map(|(a, b)| BulkOp::SetParent(a, b)),
        node.prop_map(BulkOp::Read),
    ]
}

proptest! {
    #[test]
    fn structure_and_statistics_stay_consistent(ops in prop::collection::vec(op(), 1..60)) {
        let mut store = TreeStore::new();
        let ids = (0..N_NODES).map(|i| store.add_node(i)).collect_vec();

        for op in ops {
            match op {
                Op::SetParent(a, b) => {
                    let _ = store.set_parent(ids[a], b.map(|b| ids[b]));
                }
                Op::Unlink(a) => {
                    store.unlink(ids[a]).unwrap();
                }
                Op::Insert(p, i, c) => {
                    let mut children = store.children_mut(ids[p]).unwrap();
                    let i = i.min(children.len());
                    let _ = children.insert(i, ids[c]);
                }
                Op::RemoveAt(p, i) => {
                    let mut children = store.children_mut(ids[p]).unwrap();
                    if i < children.len() {
                        prop_assert!(children.remove_at(i).unwrap().is_some());
                    }
                }
                Op::Reverse(p) => {
                    store.children_mut(ids[p]).unwrap().reverse();
                }
            }

            store.validate().unwrap();
            for &id in &ids {
                prop_assert_eq!(cached_stats(&store, id), counted_stats(&store, id));
            }
        }
    }

    #[test]
    fn statistics_read_between_bulk_edits(ops in prop::collection::vec(bulk_op(), 1..80)) {
        let mut store = TreeStore::new();
        let ids = (0..N_NODES).map(|i| store.add_node(i)).collect_vec();
        let picked = |nodes: Vec<usize>| nodes.into_iter().map(|c| ids[c]).collect_vec();

        for op in ops {
            match op {
                BulkOp::InsertRange(p, i, c) => {
                    let mut children = store.children_mut(ids[p]).unwrap();
                    let i = i.min(children.len());
                    let _ = children.insert_range(i, picked(c));
                }
                BulkOp::RemoveRange(p, i, count) => {
                    let mut children = store.children_mut(ids[p]).unwrap();
                    let i = i.min(children.len());
                    let count = count.min(children.len() - i);
                    prop_assert_eq!(children.remove_range(i, count), Ok(true));
                }
                BulkOp::Set(p, i, c) => {
                    let mut children = store.children_mut(ids[p]).unwrap();
                    if i < children.len() {
                        let _ = children.set(i, ids[c]);
                    }
                }
                BulkOp::SetRange(p, i, count, c) => {
                    let mut children = store.children_mut(ids[p]).unwrap();
                    let i = i.min(children.len());
                    let count = count.min(children.len() - i);
                    let _ = children.set_range(i, count, picked(c));
                }
                BulkOp::SetParent(a, b) => {
                    let _ = store.set_parent(ids[a], b.map(|b| ids[b]));
                }
                BulkOp::Read(a) => {
                    prop_assert_eq!(cached_stats(&store, ids[a]), counted_stats(&store, ids[a]));
                }
            }
        }

        store.validate().unwrap();
        for &id in &ids {
            prop_assert_eq!(cached_stats(&store, id), counted_stats(&store, id));
        }
    }
}
