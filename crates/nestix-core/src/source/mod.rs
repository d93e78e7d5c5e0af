//! Module: source
//! Responsibility: the posting-list cursor contract consumed by index leaves.
//! Does not own: on-disk table layout or scanning; those sit behind `PostingSource`.
//! Boundary: every leaf read flows through `PostingSource`, and so does every
//! cancellation signal.

mod cancel;
mod filter;
mod memory;

#[cfg(test)]
mod tests;

pub use cancel::{CancelFlag, CancellableSource};
pub use filter::{DatatypeFilter, EntryFilter, TimeFilter};
pub use memory::{FieldIndex, MemoryPostingCursor};

use crate::{error::EvalError, key::KeyRange};
use serde::{Deserialize, Serialize};

///
/// Posting
///
/// Payload stored next to one key in a field/value posting list.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Posting {
    pub value: String,
    pub visibility: String,
    pub timestamp: u64,
}

impl Posting {
    pub fn new(value: impl Into<String>, visibility: impl Into<String>, timestamp: u64) -> Self {
        Self {
            value: value.into(),
            visibility: visibility.into(),
            timestamp,
        }
    }
}

///
/// PostingEntry
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PostingEntry<K> {
    pub key: K,
    pub posting: Posting,
}

///
/// PostingSource
///
/// Cursor over one field/value posting list, strictly ascending by key.
/// `top()` is the entry the cursor rests on; `None` means exhausted.
///

pub trait PostingSource<K>: Send {
    /// Restrict the cursor to `range` and rest on its first entry.
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError>;

    fn top(&self) -> Option<&PostingEntry<K>>;

    /// Step past the current top entry.
    fn advance(&mut self) -> Result<(), EvalError>;

    /// Rest on the first entry at or after `minimum` without rescanning.
    fn skip_to(&mut self, minimum: &K) -> Result<(), EvalError>;

    fn describe(&self) -> String;
}

impl<K, S> PostingSource<K> for Box<S>
where
    S: PostingSource<K> + ?Sized,
{
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        self.as_mut().seek(range)
    }

    fn top(&self) -> Option<&PostingEntry<K>> {
        self.as_ref().top()
    }

    fn advance(&mut self) -> Result<(), EvalError> {
        self.as_mut().advance()
    }

    fn skip_to(&mut self, minimum: &K) -> Result<(), EvalError> {
        self.as_mut().skip_to(minimum)
    }

    fn describe(&self) -> String {
        self.as_ref().describe()
    }
}
