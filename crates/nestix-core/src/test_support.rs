use crate::{
    config::EvalConfig,
    error::EvalError,
    eval::Evaluator,
    key::{DocKey, KeyRange},
    plan::QueryTree,
    sequence::{
        Anchor, ArrayLeaf, IndexLeaf, InstrumentedSequence, KeySequence, SequenceBox,
        SequenceMetrics,
    },
    source::{FieldIndex, MemoryPostingCursor, PostingEntry, PostingSource},
};
use std::{
    io,
    sync::{Arc, Mutex, PoisonError},
};
use tracing_subscriber::EnvFilter;

pub(crate) fn array(name: &str, keys: &[u32]) -> SequenceBox<u32> {
    Box::new(ArrayLeaf::from_unsorted(name, keys.to_vec()))
}

pub(crate) fn array_tree(name: &str, keys: &[u32]) -> QueryTree<u32> {
    QueryTree::Leaf(array(name, keys))
}

pub(crate) fn counted(name: &str, keys: &[u32], metrics: &SequenceMetrics) -> SequenceBox<u32> {
    Box::new(InstrumentedSequence::new(
        ArrayLeaf::from_unsorted(name, keys.to_vec()),
        metrics.clone(),
    ))
}

/// Initialize with a free anchor and pull every position.
pub(crate) fn drain(seq: &mut dyn KeySequence<u32>) -> Vec<u32> {
    seq.initialize(Anchor::Free)
        .expect("initialize should succeed");

    let mut out = Vec::new();
    while seq.has_next(None).expect("has_next should succeed") {
        out.push(seq.next().expect("next should succeed after has_next"));
    }

    out
}

pub(crate) fn evaluate(tree: QueryTree<u32>) -> Vec<u32> {
    Evaluator::from_tree(tree, &EvalConfig::default())
        .map(|found| found.expect("evaluation should succeed").key)
        .collect()
}

pub(crate) fn evaluate_in_context(tree: QueryTree<u32>, contexts: &[u32]) -> Vec<u32> {
    Evaluator::from_tree(tree, &EvalConfig::default())
        .with_context_keys(contexts.to_vec())
        .map(|found| found.expect("evaluation should succeed").key)
        .collect()
}

pub(crate) fn uid(uid: &str) -> DocKey {
    DocKey::new("20240101_0", "csv", uid)
}

/// Index holding one posting list per field, all under the value `value`.
pub(crate) fn doc_index(fields: &[(&str, &[&str])]) -> FieldIndex<DocKey> {
    let mut index = FieldIndex::new();
    for (field, uids) in fields {
        for (timestamp, id) in (0_u64..).zip(uids.iter()) {
            index.insert_key(field, "value", uid(id), "PUBLIC", timestamp);
        }
    }

    index
}

pub(crate) fn index_only(
    index: &FieldIndex<DocKey>,
    field: &str,
) -> IndexLeaf<DocKey, MemoryPostingCursor<DocKey>> {
    IndexLeaf::new(field, "value", index.cursor(field, "value")).non_event(true)
}

///
/// FailingSource
///
/// Posting source that fails its `seek`, or its n-th `advance`, with a
/// source error or a cancellation.
///

pub(crate) struct FailingSource<S> {
    inner: S,
    fail_seek: bool,
    advances_left: Option<usize>,
    cancel: bool,
}

impl<S> FailingSource<S> {
    pub(crate) const fn on_seek(inner: S) -> Self {
        Self {
            inner,
            fail_seek: true,
            advances_left: None,
            cancel: false,
        }
    }

    pub(crate) const fn after_advances(inner: S, advances: usize) -> Self {
        Self {
            inner,
            fail_seek: false,
            advances_left: Some(advances),
            cancel: false,
        }
    }

    pub(crate) fn cancelling(mut self) -> Self {
        self.cancel = true;
        self
    }

    fn failure(&self) -> EvalError {
        if self.cancel {
            EvalError::cancelled("test source interrupted")
        } else {
            EvalError::source_failure("FIELD", "test source failure")
        }
    }
}

impl<K, S> PostingSource<K> for FailingSource<S>
where
    S: PostingSource<K>,
{
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        if self.fail_seek {
            return Err(self.failure());
        }
        self.inner.seek(range)
    }

    fn top(&self) -> Option<&PostingEntry<K>> {
        self.inner.top()
    }

    fn advance(&mut self) -> Result<(), EvalError> {
        match self.advances_left {
            Some(0) => return Err(self.failure()),
            Some(left) => self.advances_left = Some(left - 1),
            None => {}
        }
        self.inner.advance()
    }

    fn skip_to(&mut self, minimum: &K) -> Result<(), EvalError> {
        if self.advances_left == Some(0) {
            return Err(self.failure());
        }
        self.inner.skip_to(minimum)
    }

    fn describe(&self) -> String {
        format!("failing({})", self.inner.describe())
    }
}

///
/// CapturedLog
///
/// In-memory writer shared by every event of one `capture_log` run.
///

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber at trace level and return what it logged.
pub(crate) fn capture_log(f: impl FnOnce()) -> String {
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("nestix_core=trace"))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    tracing::subscriber::with_default(subscriber, f);

    let bytes = log.0.lock().unwrap_or_else(PoisonError::into_inner).clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
