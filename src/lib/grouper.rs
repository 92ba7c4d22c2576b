//! Grouping of key-sorted record streams.
//!
//! [`KeyGrouper`] splits a stream that is already sorted by some key (typically a tag
//! prefix) into runs of records sharing the same key. It never re-sorts: a key smaller than
//! the current group's key is reported as [`ConsistencyError::GroupKeyOutOfOrder`].
//!
//! Groups are handed out one at a time as borrowing iterators ([`Group`]). A group that is
//! dropped before being exhausted drains its remaining records, so the parent stream is
//! always positioned at the start of the next group.
//!
//! [`PairedGroups`] walks two groupers in lock-step and fails with
//! [`ConsistencyError::GroupKeyMismatch`] as soon as their keys disagree.

use std::cmp::Ordering;
use std::fmt::Debug;

use anyhow::Result;

use crate::codec::BincodeCodec;
use crate::errors::{ClonekitError, ConsistencyError};
use crate::model::{TreeNodeRow, TreeRecord};
use crate::sort::ExternalSorter;

/// Splits a key-sorted stream into groups of equal keys.
pub struct KeyGrouper<I, K, F, T>
where
    I: Iterator<Item = Result<T>>,
    K: Ord + Clone + Debug,
    F: FnMut(&T) -> Result<K>,
{
    input: I,
    key_fn: F,
    /// First record of the next group, already read from `input`.
    pending: Option<(K, T)>,
    /// Error hit while draining a dropped group, reported by the next `next_group` call.
    error: Option<anyhow::Error>,
    finished: bool,
}

impl<I, K, F, T> KeyGrouper<I, K, F, T>
where
    I: Iterator<Item = Result<T>>,
    K: Ord + Clone + Debug,
    F: FnMut(&T) -> Result<K>,
{
    pub fn new(input: I, key_fn: F) -> Self {
        Self { input, key_fn, pending: None, error: None, finished: false }
    }

    /// Starts the next group; `None` once the input is exhausted.
    ///
    /// The previous group must have been dropped (the borrow checker enforces this).
    pub fn next_group(&mut self) -> Result<Option<Group<'_, I, K, F, T>>> {
        if let Some(e) = self.error.take() {
            self.finished = true;
            return Err(e);
        }
        if self.finished {
            return Ok(None);
        }
        if self.pending.is_none() {
            match self.pull()? {
                Some(entry) => self.pending = Some(entry),
                None => {
                    self.finished = true;
                    return Ok(None);
                }
            }
        }
        let key = match &self.pending {
            Some((key, _)) => key.clone(),
            None => return Ok(None),
        };
        Ok(Some(Group { grouper: self, key, done: false }))
    }

    fn pull(&mut self) -> Result<Option<(K, T)>> {
        match self.input.next() {
            None => Ok(None),
            Some(record) => {
                let record = record?;
                let key = (self.key_fn)(&record)?;
                Ok(Some((key, record)))
            }
        }
    }

    /// Reads every group into memory.
    pub fn collect_groups(mut self) -> Result<Vec<(K, Vec<T>)>> {
        let mut groups = Vec::new();
        while let Some(group) = self.next_group()? {
            let key = group.key().clone();
            let records = group.collect::<Result<Vec<T>>>()?;
            groups.push((key, records));
        }
        Ok(groups)
    }
}

/// The records of one key, borrowed from a [`KeyGrouper`].
pub struct Group<'a, I, K, F, T>
where
    I: Iterator<Item = Result<T>>,
    K: Ord + Clone + Debug,
    F: FnMut(&T) -> Result<K>,
{
    grouper: &'a mut KeyGrouper<I, K, F, T>,
    key: K,
    done: bool,
}

impl<I, K, F, T> Group<'_, I, K, F, T>
where
    I: Iterator<Item = Result<T>>,
    K: Ord + Clone + Debug,
    F: FnMut(&T) -> Result<K>,
{
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    fn fail(&mut self, error: anyhow::Error) -> Option<Result<T>> {
        self.done = true;
        self.grouper.finished = true;
        Some(Err(error))
    }
}

impl<I, K, F, T> Iterator for Group<'_, I, K, F, T>
where
    I: Iterator<Item = Result<T>>,
    K: Ord + Clone + Debug,
    F: FnMut(&T) -> Result<K>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        if self.done {
            return None;
        }
        if matches!(&self.grouper.pending, Some((k, _)) if *k == self.key) {
            return self.grouper.pending.take().map(|(_, record)| Ok(record));
        }
        match self.grouper.pull() {
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => self.fail(e),
            Ok(Some((key, record))) => match key.cmp(&self.key) {
                Ordering::Equal => Some(Ok(record)),
                Ordering::Greater => {
                    self.grouper.pending = Some((key, record));
                    self.done = true;
                    None
                }
                Ordering::Less => {
                    let error = ClonekitError::from(ConsistencyError::out_of_order(&self.key, &key));
                    self.fail(error.into())
                }
            },
        }
    }
}

impl<I, K, F, T> Drop for Group<'_, I, K, F, T>
where
    I: Iterator<Item = Result<T>>,
    K: Ord + Clone + Debug,
    F: FnMut(&T) -> Result<K>,
{
    fn drop(&mut self) {
        while let Some(item) = self.next() {
            if let Err(e) = item {
                if self.grouper.error.is_none() {
                    self.grouper.error = Some(e);
                }
                break;
            }
        }
    }
}

/// Two groupers advanced in lock-step, asserting equal keys.
pub struct PairedGroups<IL, IR, K, FL, FR, TL, TR>
where
    IL: Iterator<Item = Result<TL>>,
    IR: Iterator<Item = Result<TR>>,
    K: Ord + Clone + Debug,
    FL: FnMut(&TL) -> Result<K>,
    FR: FnMut(&TR) -> Result<K>,
{
    left: KeyGrouper<IL, K, FL, TL>,
    right: KeyGrouper<IR, K, FR, TR>,
}

/// Left and right groups of one key.
pub type GroupPair<'a, IL, IR, K, FL, FR, TL, TR> =
    (Group<'a, IL, K, FL, TL>, Group<'a, IR, K, FR, TR>);

impl<IL, IR, K, FL, FR, TL, TR> PairedGroups<IL, IR, K, FL, FR, TL, TR>
where
    IL: Iterator<Item = Result<TL>>,
    IR: Iterator<Item = Result<TR>>,
    K: Ord + Clone + Debug,
    FL: FnMut(&TL) -> Result<K>,
    FR: FnMut(&TR) -> Result<K>,
{
    pub fn new(left: KeyGrouper<IL, K, FL, TL>, right: KeyGrouper<IR, K, FR, TR>) -> Self {
        Self { left, right }
    }

    /// Next pair of groups; fails if the two sides disagree on the key or one side ends
    /// before the other.
    pub fn next_pair(&mut self) -> Result<Option<GroupPair<'_, IL, IR, K, FL, FR, TL, TR>>> {
        let left = self.left.next_group()?;
        let right = self.right.next_group()?;
        match (left, right) {
            (None, None) => Ok(None),
            (Some(l), Some(r)) if l.key() == r.key() => Ok(Some((l, r))),
            (l, r) => Err(ClonekitError::from(ConsistencyError::mismatch(
                l.as_ref().map(|g| g.key()),
                r.as_ref().map(|g| g.key()),
            ))
            .into()),
        }
    }
}

/// Flattens trees into (dataset, tree, node) rows, sorts them and groups them by dataset.
pub fn group_tree_nodes_by_dataset<I>(
    trees: I,
    sorter: &ExternalSorter,
) -> Result<Vec<(u32, Vec<TreeNodeRow>)>>
where
    I: IntoIterator<Item = Result<TreeRecord>>,
{
    let rows = trees.into_iter().flat_map(|tree| match tree {
        Ok(tree) => TreeNodeRow::rows_of(&tree).into_iter().map(Ok).collect::<Vec<_>>(),
        Err(e) => vec![Err(e)],
    });
    let sorted = sorter.sort_by_key(rows, BincodeCodec::<TreeNodeRow>::new(), |r| {
        (r.dataset, r.tree_id, r.node_id, r.clone_id)
    })?;
    KeyGrouper::new(sorted, |r: &TreeNodeRow| Ok(r.dataset)).collect_groups()
}
