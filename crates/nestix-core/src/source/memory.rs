use crate::{
    error::EvalError,
    key::{KeyRange, SequenceKey},
    source::{Posting, PostingEntry, PostingSource},
};
use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::Arc,
};

type PostingList<K> = Arc<BTreeMap<K, Posting>>;

///
/// FieldIndex
///
/// In-memory inverted index keyed by `(field, value)`. Posting lists are
/// shared with the cursors handed out, so cursors stay valid after later
/// inserts (which copy-on-write the touched list).
///

#[derive(Clone, Debug, Default)]
pub struct FieldIndex<K> {
    lists: BTreeMap<(String, String), PostingList<K>>,
}

impl<K> FieldIndex<K>
where
    K: SequenceKey + Sync,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lists: BTreeMap::new(),
        }
    }

    /// Record `key` under `field == value`; the payload value defaults to `value`.
    pub fn insert(&mut self, field: &str, value: &str, key: K, posting: Posting) {
        let list = self
            .lists
            .entry((field.to_string(), value.to_string()))
            .or_default();
        Arc::make_mut(list).insert(key, posting);
    }

    /// Convenience for postings that only carry a visibility and timestamp.
    pub fn insert_key(
        &mut self,
        field: &str,
        value: &str,
        key: K,
        visibility: &str,
        timestamp: u64,
    ) {
        self.insert(field, value, key, Posting::new(value, visibility, timestamp));
    }

    #[must_use]
    pub fn cursor(&self, field: &str, value: &str) -> MemoryPostingCursor<K> {
        let postings = self
            .lists
            .get(&(field.to_string(), value.to_string()))
            .cloned()
            .unwrap_or_default();

        MemoryPostingCursor::new(field, value, postings)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        let mut fields: Vec<&str> = self.lists.keys().map(|(field, _)| field.as_str()).collect();
        fields.dedup();

        fields.into_iter()
    }

    #[must_use]
    pub fn postings_len(&self, field: &str, value: &str) -> usize {
        self.lists
            .get(&(field.to_string(), value.to_string()))
            .map_or(0, |list| list.len())
    }
}

///
/// MemoryPostingCursor
///
/// `PostingSource` over one shared posting list. Every reposition is a
/// `BTreeMap::range` lookup, so skipping never rescans.
///

#[derive(Clone, Debug)]
pub struct MemoryPostingCursor<K> {
    field: String,
    value: String,
    postings: PostingList<K>,
    range: KeyRange<K>,
    top: Option<PostingEntry<K>>,
}

impl<K> MemoryPostingCursor<K>
where
    K: SequenceKey + Sync,
{
    fn new(field: &str, value: &str, postings: PostingList<K>) -> Self {
        let mut cursor = Self {
            field: field.to_string(),
            value: value.to_string(),
            postings,
            range: KeyRange::all(),
            top: None,
        };
        cursor.reposition(Bound::Unbounded);

        cursor
    }

    // Rest on the first entry strictly inside both `lower` and the seek window.
    fn reposition(&mut self, lower: Bound<&K>) {
        let (start, end) = self.range.as_bounds();
        let lower = match lower {
            Bound::Unbounded => start,
            Bound::Included(key) if self.range.is_before_start(key) => start,
            bound => bound,
        };

        if let Bound::Included(key) | Bound::Excluded(key) = lower
            && self.range.is_after_end(key)
        {
            self.top = None;
            return;
        }

        self.top = self
            .postings
            .range((lower, end))
            .next()
            .map(|(key, posting)| PostingEntry {
                key: key.clone(),
                posting: posting.clone(),
            });
    }
}

impl<K> PostingSource<K> for MemoryPostingCursor<K>
where
    K: SequenceKey + Sync,
{
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        self.range = range.clone();
        self.reposition(Bound::Unbounded);

        Ok(())
    }

    fn top(&self) -> Option<&PostingEntry<K>> {
        self.top.as_ref()
    }

    fn advance(&mut self) -> Result<(), EvalError> {
        if let Some(entry) = self.top.take() {
            self.reposition(Bound::Excluded(&entry.key));
        }

        Ok(())
    }

    fn skip_to(&mut self, minimum: &K) -> Result<(), EvalError> {
        if self.top.as_ref().is_some_and(|entry| entry.key >= *minimum) {
            return Ok(());
        }
        self.reposition(Bound::Included(minimum));

        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}=={}", self.field, self.value)
    }
}
