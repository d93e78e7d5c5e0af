//! Module: key
//! Responsibility: identifier vocabulary and seek ranges.
//! Does not own: identifier encoding in the backing store.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, ops::Bound};

///
/// SequenceKey
///
/// Anything that can flow through an evaluation tree. The engine treats keys
/// as opaque and relies only on their total order.
///

pub trait SequenceKey: Ord + Clone + Debug + Send + 'static {}

impl<T> SequenceKey for T where T: Ord + Clone + Debug + Send + 'static {}

///
/// DocKey
///
/// Event identifier ordered by shard, then datatype, then uid.
///

#[derive(
    Clone, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[display("{shard}/{datatype}/{uid}")]
pub struct DocKey {
    pub shard: String,
    pub datatype: String,
    pub uid: String,
}

impl DocKey {
    pub fn new(
        shard: impl Into<String>,
        datatype: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            shard: shard.into(),
            datatype: datatype.into(),
            uid: uid.into(),
        }
    }
}

///
/// KeyRange
///
/// Half-open or closed key window handed to `seek`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyRange<K> {
    pub start: Bound<K>,
    pub end: Bound<K>,
}

impl<K: Ord> KeyRange<K> {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    #[must_use]
    pub const fn new(start: Bound<K>, end: Bound<K>) -> Self {
        Self { start, end }
    }

    /// Closed range `[start, end]`.
    #[must_use]
    pub const fn closed(start: K, end: K) -> Self {
        Self::new(Bound::Included(start), Bound::Included(end))
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        !self.is_before_start(key) && !self.is_after_end(key)
    }

    #[must_use]
    pub fn is_before_start(&self, key: &K) -> bool {
        match &self.start {
            Bound::Included(start) => key < start,
            Bound::Excluded(start) => key <= start,
            Bound::Unbounded => false,
        }
    }

    #[must_use]
    pub fn is_after_end(&self, key: &K) -> bool {
        match &self.end {
            Bound::Included(end) => key > end,
            Bound::Excluded(end) => key >= end,
            Bound::Unbounded => false,
        }
    }

    /// Borrowed bounds, suitable for `BTreeMap::range`.
    #[must_use]
    pub fn as_bounds(&self) -> (Bound<&K>, Bound<&K>) {
        (self.start.as_ref(), self.end.as_ref())
    }
}

impl<K: Ord> Default for KeyRange<K> {
    fn default() -> Self {
        Self::all()
    }
}
