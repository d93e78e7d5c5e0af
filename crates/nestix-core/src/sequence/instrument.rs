//! Call counting for sequence trees.
//!
//! Sequences never touch counters directly; a wrapped node reports every
//! protocol call as a `SequenceEvent` to its `MetricsSink`.

use crate::{
    config::EvalConfig,
    document::Document,
    error::EvalError,
    key::{KeyRange, SequenceKey},
    sequence::contracts::{Anchor, KeySequence},
};
use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

///
/// SequenceEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SequenceEvent {
    Seek,
    HasNext,
    Next,
    MoveTo,
}

///
/// MetricsSink
///

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: SequenceEvent);
}

///
/// SequenceMetrics
///
/// Shared atomic counters. Clones observe the same totals.
///

#[derive(Clone, Debug, Default)]
pub struct SequenceMetrics {
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    seek: AtomicU64,
    has_next: AtomicU64,
    next: AtomicU64,
    move_to: AtomicU64,
}

impl SequenceMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            seek: self.counters.seek.load(Ordering::Relaxed),
            has_next: self.counters.has_next.load(Ordering::Relaxed),
            next: self.counters.next.load(Ordering::Relaxed),
            move_to: self.counters.move_to.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.counters.seek,
            &self.counters.has_next,
            &self.counters.next,
            &self.counters.move_to,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl MetricsSink for SequenceMetrics {
    fn record(&self, event: SequenceEvent) {
        let counter = match event {
            SequenceEvent::Seek => &self.counters.seek,
            SequenceEvent::HasNext => &self.counters.has_next,
            SequenceEvent::Next => &self.counters.next,
            SequenceEvent::MoveTo => &self.counters.move_to,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

///
/// MetricsReport
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MetricsReport {
    pub seek: u64,
    pub has_next: u64,
    pub next: u64,
    pub move_to: u64,
}

///
/// InstrumentedSequence
///
/// Transparent wrapper that reports each call before delegating.
///

pub struct InstrumentedSequence<S> {
    inner: S,
    sink: Arc<dyn MetricsSink>,
}

impl<S> InstrumentedSequence<S> {
    pub fn new(inner: S, sink: impl MetricsSink + 'static) -> Self {
        Self {
            inner,
            sink: Arc::new(sink),
        }
    }
}

impl<K, S> KeySequence<K> for InstrumentedSequence<S>
where
    K: SequenceKey,
    S: KeySequence<K>,
{
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        self.sink.record(SequenceEvent::Seek);
        self.inner.seek(range)
    }

    fn initialize(&mut self, anchor: Anchor) -> Result<(), EvalError> {
        self.inner.initialize(anchor)
    }

    fn configure(&mut self, config: &EvalConfig) {
        self.inner.configure(config);
    }

    fn has_next(&mut self, context: Option<&K>) -> Result<bool, EvalError> {
        self.sink.record(SequenceEvent::HasNext);
        self.inner.has_next(context)
    }

    fn next(&mut self) -> Result<K, EvalError> {
        self.sink.record(SequenceEvent::Next);
        self.inner.next()
    }

    fn move_to(&mut self, minimum: &K, context: Option<&K>) -> Result<Option<K>, EvalError> {
        self.sink.record(SequenceEvent::MoveTo);
        self.inner.move_to(minimum, context)
    }

    fn peek(&self) -> Option<&K> {
        self.inner.peek()
    }

    fn current(&self) -> Option<&K> {
        self.inner.current()
    }

    fn document(&self) -> &Document<K> {
        self.inner.document()
    }

    fn is_context_required(&self) -> bool {
        self.inner.is_context_required()
    }

    fn is_non_event(&self) -> bool {
        self.inner.is_non_event()
    }

    fn leaves(&self) -> Vec<&dyn KeySequence<K>> {
        self.inner.leaves()
    }

    fn children(&self) -> Vec<&dyn KeySequence<K>> {
        self.inner.children()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
