use crate::{key::DocKey, source::PostingEntry};
use std::collections::BTreeSet;

///
/// EntryFilter
///
/// Predicate applied by an index leaf before an entry is surfaced.
/// Rejected entries are stepped over and never reach the tree.
///

pub trait EntryFilter<K>: Send + Sync {
    fn accept(&self, entry: &PostingEntry<K>) -> bool;
}

///
/// TimeFilter
///
/// Inclusive window on the posting timestamp.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeFilter {
    pub start: u64,
    pub end: u64,
}

impl TimeFilter {
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
}

impl<K> EntryFilter<K> for TimeFilter {
    fn accept(&self, entry: &PostingEntry<K>) -> bool {
        (self.start..=self.end).contains(&entry.posting.timestamp)
    }
}

///
/// DatatypeFilter
///
/// Admits only events of the listed datatypes.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DatatypeFilter {
    datatypes: BTreeSet<String>,
}

impl DatatypeFilter {
    pub fn new<I, S>(datatypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            datatypes: datatypes.into_iter().map(Into::into).collect(),
        }
    }
}

impl EntryFilter<DocKey> for DatatypeFilter {
    fn accept(&self, entry: &PostingEntry<DocKey>) -> bool {
        self.datatypes.contains(&entry.key.datatype)
    }
}
