//! # Synctree
//!
//! Synctree provides trees whose parent links and child lists can never disagree.
//!
//! Every node of a [`tree::TreeStore`] has an ordered child list built on
//! [`list::ControllableList`], a list that asks registered callbacks for approval before each
//! change and informs others after it. Structural edits may start from either side (moving a
//! node to a new parent, or editing a child list) and the store updates the other side in the
//! same step. Depth, height and subtree size are cached per node and recomputed lazily after
//! edits invalidate them.
//!
//! [`tree::forest`] builds trees from flat parent-pointer data, and [`dictionary`] provides a
//! map keyed by pairs with row-wise access.

pub mod dictionary;
pub mod list;
pub mod tree;
