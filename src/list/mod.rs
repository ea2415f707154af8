//! A vector with a cancelable *changing* channel and an informational *changed* channel.
//!
//! Every mutation of a [`ControllableList`] is described by a [`ListChange`]. Before the
//! mutation happens, each callback registered with [`ControllableList::on_changing`] is asked
//! to approve it; a single `false` vetoes the mutation and the call becomes a no-op. After the
//! mutation, every callback registered with [`ControllableList::on_changed`] is informed.
//!
//! Bulk operations ([`ControllableList::add_range`], [`ControllableList::insert_range`],
//! [`ControllableList::remove_range`], [`ControllableList::set_range`],
//! [`ControllableList::sort_by`], [`ControllableList::reverse`]) produce one range change
//! carrying the whole affected sub-sequence, never one change per item. Ranges of exactly one
//! element degrade to the single-item variants.
//!
//! Index and count parameters are validated before anything is announced; a violation is
//! reported as [`ListError`] and leaves the list untouched.

use std::{cmp::Ordering, fmt, ops::Index, slice};

use derive_more::{From, Into};
use log::{debug, trace};
use thiserror::Error;

/// Tag of a [`ListChange`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeAction {
    Add,
    AddRange,
    Remove,
    RemoveRange,
    Replace,
    ReplaceRange,
    Reorder,
}

/// Description of a single mutation of a [`ControllableList`].
///
/// The same value is handed to the changing callbacks (before) and to the changed callbacks
/// (after), except for [`ListChange::Reorder`], whose `values` hold the order *before* the
/// mutation when asking for approval and the order *after* it when notifying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListChange<T> {
    Add { index: usize, value: T },
    AddRange { index: usize, values: Vec<T> },
    Remove { index: usize, value: T },
    RemoveRange { index: usize, values: Vec<T> },
    Replace { index: usize, old: T, new: T },
    ReplaceRange { index: usize, old: Vec<T>, new: Vec<T> },
    Reorder { index: usize, values: Vec<T> },
}

impl<T> ListChange<T> {
    pub fn action(&self) -> ChangeAction {
        match self {
            ListChange::Add { .. } => ChangeAction::Add,
            ListChange::AddRange { .. } => ChangeAction::AddRange,
            ListChange::Remove { .. } => ChangeAction::Remove,
            ListChange::RemoveRange { .. } => ChangeAction::RemoveRange,
            ListChange::Replace { .. } => ChangeAction::Replace,
            ListChange::ReplaceRange { .. } => ChangeAction::ReplaceRange,
            ListChange::Reorder { .. } => ChangeAction::Reorder,
        }
    }

    /// First position touched by the change.
    pub fn index(&self) -> usize {
        match self {
            ListChange::Add { index, .. }
            | ListChange::AddRange { index, .. }
            | ListChange::Remove { index, .. }
            | ListChange::RemoveRange { index, .. }
            | ListChange::Replace { index, .. }
            | ListChange::ReplaceRange { index, .. }
            | ListChange::Reorder { index, .. } => *index,
        }
    }

    /// Number of positions touched by the change.
    pub fn len(&self) -> usize {
        match self {
            ListChange::Add { .. } | ListChange::Remove { .. } | ListChange::Replace { .. } => 1,
            ListChange::AddRange { values, .. }
            | ListChange::RemoveRange { values, .. }
            | ListChange::Reorder { values, .. } => values.len(),
            ListChange::ReplaceRange { old, .. } => old.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One past the last position touched by the change.
    pub fn end_index(&self) -> usize {
        self.index() + self.len()
    }

    /// Values that enter the list.
    pub fn added(&self) -> &[T] {
        match self {
            ListChange::Add { value, .. } => slice::from_ref(value),
            ListChange::AddRange { values, .. } => values,
            ListChange::Replace { new, .. } => slice::from_ref(new),
            ListChange::ReplaceRange { new, .. } => new,
            _ => &[],
        }
    }

    /// Values that leave the list.
    pub fn removed(&self) -> &[T] {
        match self {
            ListChange::Remove { value, .. } => slice::from_ref(value),
            ListChange::RemoveRange { values, .. } => values,
            ListChange::Replace { old, .. } => slice::from_ref(old),
            ListChange::ReplaceRange { old, .. } => old,
            _ => &[],
        }
    }

    /// Removal of `values` starting at `index`, as a single or a range variant.
    pub(crate) fn removal(index: usize, mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            if let Some(value) = values.pop() {
                return ListChange::Remove { index, value };
            }
        }
        ListChange::RemoveRange { index, values }
    }

    /// Insertion of `values` starting at `index`, as a single or a range variant.
    pub(crate) fn insertion(index: usize, mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            if let Some(value) = values.pop() {
                return ListChange::Add { index, value };
            }
        }
        ListChange::AddRange { index, values }
    }
}

/// Handle returned when registering a callback, used to unregister it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into)]
pub struct ListenerId(pub(crate) usize);

/// Errors raised by [`ControllableList`] before any change is announced.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("parameter `{name}` is {value}, but must be less than {bound}")]
    IndexOutOfRange {
        name: &'static str,
        value: usize,
        bound: usize,
    },
    #[error("parameter `{name}` is {value}, but must be no greater than {bound}")]
    ExceedsBound {
        name: &'static str,
        value: usize,
        bound: usize,
    },
}

pub(crate) fn check_index(name: &'static str, value: usize, len: usize) -> Result<(), ListError> {
    if value < len {
        Ok(())
    } else {
        Err(ListError::IndexOutOfRange {
            name,
            value,
            bound: len,
        })
    }
}

pub(crate) fn check_bound(name: &'static str, value: usize, bound: usize) -> Result<(), ListError> {
    if value <= bound {
        Ok(())
    } else {
        Err(ListError::ExceedsBound { name, value, bound })
    }
}

/// Validates a `(index, count)` window over a list of length `len`.
pub(crate) fn check_range(index: usize, count: usize, len: usize) -> Result<(), ListError> {
    check_bound("index", index, len)?;
    check_bound("count", count, len - index)
}

type ChangingHandler<T> = Box<dyn FnMut(&ListChange<T>) -> bool>;
type ChangedHandler<T> = Box<dyn FnMut(&ListChange<T>)>;

/// A list of values with a cancelable changing channel and an informational changed channel.
pub struct ControllableList<T> {
    items: Vec<T>,
    changing: Vec<(ListenerId, ChangingHandler<T>)>,
    changed: Vec<(ListenerId, ChangedHandler<T>)>,
    next_listener: usize,
    changing_enabled: bool,
    changed_enabled: bool,
}

impl<T> Default for ControllableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ControllableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllableList")
            .field("items", &self.items)
            .field("changing_listeners", &self.changing.len())
            .field("changed_listeners", &self.changed.len())
            .field("changing_enabled", &self.changing_enabled)
            .field("changed_enabled", &self.changed_enabled)
            .finish()
    }
}

impl<T> FromIterator<T> for ControllableList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ControllableList {
            items: iter.into_iter().collect(),
            ..Self::new()
        }
    }
}

impl<T> Index<usize> for ControllableList<T> {
    type Output = T;
    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a ControllableList<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Clone> Extend<T> for ControllableList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.add_range(iter);
    }
}

// --- Reading ---

impl<T> ControllableList<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ControllableList {
            items: Vec::with_capacity(capacity),
            changing: Vec::new(),
            changed: Vec::new(),
            next_listener: 0,
            changing_enabled: true,
            changed_enabled: true,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.clone()
    }

    /// The sub-slice `index..index + count`.
    pub fn get_range(&self, index: usize, count: usize) -> Result<&[T], ListError> {
        check_range(index, count, self.items.len())?;
        Ok(&self.items[index..index + count])
    }

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.items.contains(item)
    }

    pub fn index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.items.iter().position(|i| i == item)
    }

    pub fn last_index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.items.iter().rposition(|i| i == item)
    }

    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<&T> {
        self.items.iter().find(|i| pred(i))
    }

    pub fn find_last(&self, mut pred: impl FnMut(&T) -> bool) -> Option<&T> {
        self.items.iter().rev().find(|i| pred(i))
    }

    pub fn find_index(&self, pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.items.iter().position(pred)
    }

    pub fn find_last_index(&self, pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.items.iter().rposition(pred)
    }

    pub fn find_all(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<&T> {
        self.items.iter().filter(|i| pred(i)).collect()
    }

    // --- Listeners ---

    /// Registers a callback asked to approve every mutation. Returning `false` vetoes it.
    pub fn on_changing(
        &mut self,
        handler: impl FnMut(&ListChange<T>) -> bool + 'static,
    ) -> ListenerId {
        let id = self.next_listener_id();
        self.changing.push((id, Box::new(handler)));
        id
    }

    /// Registers a callback informed after every mutation.
    pub fn on_changed(&mut self, handler: impl FnMut(&ListChange<T>) + 'static) -> ListenerId {
        let id = self.next_listener_id();
        self.changed.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe_changing(&mut self, id: ListenerId) -> bool {
        let before = self.changing.len();
        self.changing.retain(|(l, _)| *l != id);
        before != self.changing.len()
    }

    pub fn unsubscribe_changed(&mut self, id: ListenerId) -> bool {
        let before = self.changed.len();
        self.changed.retain(|(l, _)| *l != id);
        before != self.changed.len()
    }

    fn next_listener_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        id
    }

    pub fn changing_enabled(&self) -> bool {
        self.changing_enabled
    }

    /// Disabling the changing channel means no approval is ever asked for.
    pub fn set_changing_enabled(&mut self, enabled: bool) {
        self.changing_enabled = enabled;
    }

    pub fn changed_enabled(&self) -> bool {
        self.changed_enabled
    }

    pub fn set_changed_enabled(&mut self, enabled: bool) {
        self.changed_enabled = enabled;
    }

    /// Whether any channel needs a [`ListChange`] to be built.
    fn observed(&self) -> bool {
        self.changing_enabled || self.changed_enabled
    }

    /// Runs every changing callback on `change`; all of them are called even after a veto.
    pub(crate) fn approve(&mut self, change: &ListChange<T>) -> bool {
        if !self.changing_enabled {
            return true;
        }
        let mut accepted = true;
        for (_, handler) in &mut self.changing {
            accepted &= handler(change);
        }
        if !accepted {
            debug!(
                "vetoed {:?} of {} item(s) at index {}",
                change.action(),
                change.len(),
                change.index()
            );
        }
        accepted
    }

    pub(crate) fn notify(&mut self, change: &ListChange<T>) {
        trace!(
            "applied {:?} of {} item(s) at index {}",
            change.action(),
            change.len(),
            change.index()
        );
        if !self.changed_enabled {
            return;
        }
        for (_, handler) in &mut self.changed {
            handler(change);
        }
    }
}

// --- Mutating ---

impl<T: Clone> ControllableList<T> {
    /// Performs `change` without asking or informing anyone.
    pub(crate) fn apply(&mut self, change: &ListChange<T>) {
        match change {
            ListChange::Add { index, value } => self.items.insert(*index, value.clone()),
            ListChange::AddRange { index, values } => {
                self.items.splice(*index..*index, values.iter().cloned());
            }
            ListChange::Remove { index, .. } => {
                self.items.remove(*index);
            }
            ListChange::RemoveRange { index, values } => {
                self.items.drain(*index..*index + values.len());
            }
            ListChange::Replace { index, new, .. } => self.items[*index] = new.clone(),
            ListChange::ReplaceRange { index, new, .. }
            | ListChange::Reorder { index, values: new } => {
                self.items[*index..*index + new.len()].clone_from_slice(new);
            }
        }
    }

    /// Asks for approval, applies and informs. Returns whether the change happened.
    fn commit(&mut self, change: &ListChange<T>) -> bool {
        if !self.approve(change) {
            return false;
        }
        self.apply(change);
        self.notify(change);
        true
    }

    /// Appends `item`. Returns `false` if the change was vetoed.
    pub fn push(&mut self, item: T) -> bool {
        let index = self.items.len();
        if !self.observed() {
            self.items.push(item);
            return true;
        }
        self.commit(&ListChange::Add { index, value: item })
    }

    /// Inserts `item` at `index`, which may equal the length.
    pub fn insert(&mut self, index: usize, item: T) -> Result<bool, ListError> {
        check_bound("index", index, self.items.len())?;
        if !self.observed() {
            self.items.insert(index, item);
            return Ok(true);
        }
        Ok(self.commit(&ListChange::Add { index, value: item }))
    }

    /// Removes the first occurrence of `item`. Returns `false` if it is absent or the
    /// removal was vetoed.
    pub fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        match self.index_of(item) {
            Some(index) => matches!(self.remove_at(index), Ok(Some(_))),
            None => false,
        }
    }

    /// Removes the item at `index`. `Ok(None)` means the removal was vetoed.
    pub fn remove_at(&mut self, index: usize) -> Result<Option<T>, ListError> {
        check_index("index", index, self.items.len())?;
        if !self.observed() {
            return Ok(Some(self.items.remove(index)));
        }
        let change = ListChange::Remove {
            index,
            value: self.items[index].clone(),
        };
        if !self.commit(&change) {
            return Ok(None);
        }
        match change {
            ListChange::Remove { value, .. } => Ok(Some(value)),
            _ => unreachable!(),
        }
    }

    /// Replaces the item at `index`, returning the old one. `Ok(None)` means the
    /// replacement was vetoed.
    pub fn set(&mut self, index: usize, item: T) -> Result<Option<T>, ListError> {
        check_index("index", index, self.items.len())?;
        if !self.observed() {
            return Ok(Some(std::mem::replace(&mut self.items[index], item)));
        }
        let change = ListChange::Replace {
            index,
            old: self.items[index].clone(),
            new: item,
        };
        if !self.commit(&change) {
            return Ok(None);
        }
        match change {
            ListChange::Replace { old, .. } => Ok(Some(old)),
            _ => unreachable!(),
        }
    }

    /// Removes every item as a single range change.
    pub fn clear(&mut self) -> bool {
        let len = self.items.len();
        self.remove_range(0, len).unwrap_or_else(|_| unreachable!())
    }

    /// Appends all `items` as a single range change.
    pub fn add_range(&mut self, items: impl IntoIterator<Item = T>) -> bool {
        let len = self.items.len();
        self.insert_range(len, items)
            .unwrap_or_else(|_| unreachable!("appending is always in range"))
    }

    /// Inserts all `items` at `index` as a single range change.
    pub fn insert_range(
        &mut self,
        index: usize,
        items: impl IntoIterator<Item = T>,
    ) -> Result<bool, ListError> {
        check_bound("index", index, self.items.len())?;
        let values: Vec<T> = items.into_iter().collect();
        if values.is_empty() {
            return Ok(true);
        }
        if !self.observed() {
            self.items.splice(index..index, values);
            return Ok(true);
        }
        Ok(self.commit(&ListChange::insertion(index, values)))
    }

    /// Removes `count` items starting at `index` as a single range change.
    pub fn remove_range(&mut self, index: usize, count: usize) -> Result<bool, ListError> {
        check_range(index, count, self.items.len())?;
        if count == 0 {
            return Ok(true);
        }
        if !self.observed() {
            self.items.drain(index..index + count);
            return Ok(true);
        }
        let values = self.items[index..index + count].to_vec();
        Ok(self.commit(&ListChange::removal(index, values)))
    }

    /// Replaces the window `index..index + count` by `values`, which need not have `count`
    /// elements.
    ///
    /// The overlapping prefix is replaced first; then the excess of the old window is
    /// removed, or the excess of `values` is inserted, each as its own change. Returns
    /// `false` as soon as one of these steps is vetoed.
    pub fn set_range(
        &mut self,
        index: usize,
        count: usize,
        values: impl IntoIterator<Item = T>,
    ) -> Result<bool, ListError> {
        check_range(index, count, self.items.len())?;
        let mut values: Vec<T> = values.into_iter().collect();
        if count == 0 {
            return self.insert_range(index, values);
        }
        if values.is_empty() {
            return self.remove_range(index, count);
        }
        let replace_count = count.min(values.len());
        let excess = values.split_off(replace_count);
        let replaced = if replace_count == 1 {
            let item = values.pop().unwrap_or_else(|| unreachable!());
            self.set(index, item)?.is_some()
        } else if !self.observed() {
            self.items[index..index + replace_count].clone_from_slice(&values);
            true
        } else {
            let old = self.items[index..index + replace_count].to_vec();
            self.commit(&ListChange::ReplaceRange {
                index,
                old,
                new: values,
            })
        };
        if !replaced {
            return Ok(false);
        }
        if count > replace_count {
            self.remove_range(index + replace_count, count - replace_count)
        } else {
            self.insert_range(index + replace_count, excess)
        }
    }

    /// Reorders the window `index..index + count` with `reorder` as a single change.
    fn reorder_window(
        &mut self,
        index: usize,
        count: usize,
        reorder: impl FnOnce(&mut [T]),
    ) -> bool {
        if count < 2 {
            return true;
        }
        if !self.observed() {
            reorder(&mut self.items[index..index + count]);
            return true;
        }
        let before = ListChange::Reorder {
            index,
            values: self.items[index..index + count].to_vec(),
        };
        if !self.approve(&before) {
            return false;
        }
        reorder(&mut self.items[index..index + count]);
        let after = ListChange::Reorder {
            index,
            values: self.items[index..index + count].to_vec(),
        };
        self.notify(&after);
        true
    }

    pub fn reverse_range(&mut self, index: usize, count: usize) -> Result<bool, ListError> {
        check_range(index, count, self.items.len())?;
        Ok(self.reorder_window(index, count, <[T]>::reverse))
    }

    pub fn reverse(&mut self) -> bool {
        let len = self.items.len();
        self.reorder_window(0, len, <[T]>::reverse)
    }

    /// Stable sort of the window `index..index + count`.
    pub fn sort_range_by(
        &mut self,
        index: usize,
        count: usize,
        compare: impl FnMut(&T, &T) -> Ordering,
    ) -> Result<bool, ListError> {
        check_range(index, count, self.items.len())?;
        Ok(self.reorder_window(index, count, |window| window.sort_by(compare)))
    }

    pub fn sort_by(&mut self, compare: impl FnMut(&T, &T) -> Ordering) -> bool {
        let len = self.items.len();
        self.reorder_window(0, len, |window| window.sort_by(compare))
    }

    pub fn sort(&mut self) -> bool
    where
        T: Ord,
    {
        self.sort_by(T::cmp)
    }
}
