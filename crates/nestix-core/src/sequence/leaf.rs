use crate::{
    config::EvalConfig,
    document::{Attribute, Document},
    error::{EvalError, ProtocolViolation, SourceError},
    key::{KeyRange, SequenceKey},
    sequence::contracts::{Anchor, Emission, KeySequence, Lifecycle},
    source::{EntryFilter, PostingEntry, PostingSource},
};

///
/// ArrayLeaf
///
/// Leaf over a pre-sorted in-memory key list. `move_to` scans a short window
/// linearly, then binary-searches the remainder.
///

pub struct ArrayLeaf<K: SequenceKey> {
    name: String,
    keys: Vec<K>,
    window: (usize, usize),
    cursor: usize,
    skip_window: usize,
    lifecycle: Lifecycle,
    emission: Emission<K>,
}

impl<K: SequenceKey> ArrayLeaf<K> {
    /// Build from keys that must already be strictly ascending.
    pub fn new(name: impl Into<String>, keys: Vec<K>) -> Result<Self, EvalError> {
        if let Some(position) = keys.windows(2).position(|pair| pair[0] >= pair[1]) {
            return Err(ProtocolViolation::UnsortedInput {
                position: position + 1,
            }
            .into());
        }

        Ok(Self::from_sorted(name.into(), keys))
    }

    /// Build from arbitrary keys; duplicates collapse.
    pub fn from_unsorted(name: impl Into<String>, mut keys: Vec<K>) -> Self {
        keys.sort();
        keys.dedup();

        Self::from_sorted(name.into(), keys)
    }

    fn from_sorted(name: String, keys: Vec<K>) -> Self {
        let end = keys.len();

        Self {
            name,
            keys,
            window: (0, end),
            cursor: 0,
            skip_window: EvalConfig::DEFAULT_LINEAR_SKIP_WINDOW,
            lifecycle: Lifecycle::Seeked,
            emission: Emission::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: &EvalConfig) -> Self {
        self.configure(config);
        self
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn ensure_initialized(&self) -> Result<(), EvalError> {
        if self.lifecycle.is_initialized() {
            Ok(())
        } else {
            Err(ProtocolViolation::NotInitialized {
                node: self.describe(),
            }
            .into())
        }
    }

    // Index of the first key at or after `minimum`, starting from the cursor.
    fn skip_index(&self, minimum: &K) -> usize {
        let end = self.window.1;
        let linear_end = (self.cursor + self.skip_window).min(end);

        if let Some(offset) = self.keys[self.cursor..linear_end]
            .iter()
            .position(|key| key >= minimum)
        {
            return self.cursor + offset;
        }

        linear_end + self.keys[linear_end..end].partition_point(|key| key < minimum)
    }

    fn consume(&mut self, index: usize) -> Option<K> {
        if index >= self.window.1 {
            self.cursor = self.window.1;
            self.lifecycle = Lifecycle::Exhausted;
            return None;
        }

        let key = self.keys[index].clone();
        self.cursor = index + 1;
        self.emission.stage(key, Document::new());

        self.emission.take()
    }
}

impl<K: SequenceKey> KeySequence<K> for ArrayLeaf<K> {
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        let start = self.keys.partition_point(|key| range.is_before_start(key));
        let end = start + self.keys[start..].partition_point(|key| !range.is_after_end(key));

        self.window = (start, end);
        self.cursor = start;
        self.lifecycle = Lifecycle::Seeked;
        self.emission.reset();

        Ok(())
    }

    fn initialize(&mut self, _anchor: Anchor) -> Result<(), EvalError> {
        if self.lifecycle == Lifecycle::Seeked {
            self.lifecycle = Lifecycle::Initialized;
        }

        Ok(())
    }

    fn configure(&mut self, config: &EvalConfig) {
        self.skip_window = config.linear_skip_window.max(1);
    }

    fn has_next(&mut self, _context: Option<&K>) -> Result<bool, EvalError> {
        self.ensure_initialized()?;

        if self.cursor < self.window.1 {
            self.emission
                .stage(self.keys[self.cursor].clone(), Document::new());
            Ok(true)
        } else {
            self.lifecycle = Lifecycle::Exhausted;
            Ok(false)
        }
    }

    fn next(&mut self) -> Result<K, EvalError> {
        self.ensure_initialized()?;

        let Some(key) = self.emission.take() else {
            return Err(ProtocolViolation::NextWithoutHasNext {
                node: self.describe(),
            }
            .into());
        };
        self.cursor += 1;

        Ok(key)
    }

    fn move_to(&mut self, minimum: &K, _context: Option<&K>) -> Result<Option<K>, EvalError> {
        self.ensure_initialized()?;
        if self.emission.is_backward(minimum) {
            return Err(self.emission.backward_move(self.describe(), minimum));
        }
        self.emission.discard_pending();

        let index = self.skip_index(minimum);

        Ok(self.consume(index))
    }

    fn peek(&self) -> Option<&K> {
        self.keys[self.cursor..self.window.1].first()
    }

    fn current(&self) -> Option<&K> {
        self.emission.last()
    }

    fn document(&self) -> &Document<K> {
        self.emission.document()
    }

    fn is_context_required(&self) -> bool {
        false
    }

    fn leaves(&self) -> Vec<&dyn KeySequence<K>> {
        vec![self as &dyn KeySequence<K>]
    }

    fn children(&self) -> Vec<&dyn KeySequence<K>> {
        Vec::new()
    }

    fn describe(&self) -> String {
        format!("{}[{}]", self.name, self.keys.len())
    }
}

///
/// IndexLeaf
///
/// Leaf over a field/value posting source. Non-event leaves attach the
/// posting payload to the document; event leaves only contribute keys.
///

pub struct IndexLeaf<K: SequenceKey, S> {
    field: String,
    value: String,
    source: S,
    non_event: bool,
    verify_order: bool,
    filters: Vec<Box<dyn EntryFilter<K>>>,
    ready: bool,
    lifecycle: Lifecycle,
    emission: Emission<K>,
}

impl<K, S> IndexLeaf<K, S>
where
    K: SequenceKey,
    S: PostingSource<K>,
{
    pub fn new(field: impl Into<String>, value: impl Into<String>, source: S) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            source,
            non_event: false,
            verify_order: true,
            filters: Vec::new(),
            ready: false,
            lifecycle: Lifecycle::Seeked,
            emission: Emission::new(),
        }
    }

    /// Mark the field as index-only so its values land in the document.
    #[must_use]
    pub fn non_event(mut self, non_event: bool) -> Self {
        self.non_event = non_event;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl EntryFilter<K> + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: &EvalConfig) -> Self {
        self.configure(config);
        self
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    fn ensure_initialized(&self) -> Result<(), EvalError> {
        if self.lifecycle.is_initialized() {
            Ok(())
        } else {
            Err(ProtocolViolation::NotInitialized {
                node: self.describe(),
            }
            .into())
        }
    }

    // Step over entries rejected by any filter.
    fn settle(&mut self) -> Result<(), EvalError> {
        while let Some(entry) = self.source.top() {
            if self.filters.iter().all(|filter| filter.accept(entry)) {
                break;
            }
            self.source.advance()?;
        }

        Ok(())
    }

    fn check_order(&self, entry: &PostingEntry<K>) -> Result<(), EvalError> {
        if !self.verify_order {
            return Ok(());
        }

        match self.emission.last() {
            Some(previous) if entry.key <= *previous => Err(SourceError::OutOfOrder {
                field: self.field.clone(),
                previous: format!("{previous:?}"),
                current: format!("{:?}", entry.key),
            }
            .into()),
            _ => Ok(()),
        }
    }

    fn document_for(&self, entry: &PostingEntry<K>) -> Document<K> {
        let mut document = Document::new();
        if self.non_event {
            document.put(Attribute {
                field: self.field.clone(),
                value: entry.posting.value.clone(),
                visibility: entry.posting.visibility.clone(),
                timestamp: entry.posting.timestamp,
                source: entry.key.clone(),
            });
        }

        document
    }

    // Stage the top entry, step the source past it, and return its key.
    fn consume_top(&mut self) -> Result<Option<K>, EvalError> {
        self.ready = false;
        let Some(entry) = self.source.top().cloned() else {
            self.lifecycle = Lifecycle::Exhausted;
            return Ok(None);
        };
        self.check_order(&entry)?;

        let document = self.document_for(&entry);
        self.emission.stage(entry.key, document);
        let key = self.emission.take();

        self.source.advance()?;
        self.settle()?;

        Ok(key)
    }
}

impl<K, S> KeySequence<K> for IndexLeaf<K, S>
where
    K: SequenceKey,
    S: PostingSource<K>,
{
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        self.lifecycle = Lifecycle::Seeked;
        self.ready = false;
        self.emission.reset();
        self.source.seek(range)?;

        self.settle()
    }

    fn initialize(&mut self, _anchor: Anchor) -> Result<(), EvalError> {
        if self.lifecycle == Lifecycle::Seeked {
            self.settle()?;
            self.lifecycle = Lifecycle::Initialized;
        }

        Ok(())
    }

    fn configure(&mut self, config: &EvalConfig) {
        self.verify_order = config.verify_order;
    }

    fn has_next(&mut self, _context: Option<&K>) -> Result<bool, EvalError> {
        self.ensure_initialized()?;

        self.ready = self.source.top().is_some();
        if !self.ready {
            self.lifecycle = Lifecycle::Exhausted;
        }

        Ok(self.ready)
    }

    fn next(&mut self) -> Result<K, EvalError> {
        self.ensure_initialized()?;

        let key = if self.ready { self.consume_top()? } else { None };
        key.ok_or_else(|| {
            ProtocolViolation::NextWithoutHasNext {
                node: self.describe(),
            }
            .into()
        })
    }

    fn move_to(&mut self, minimum: &K, _context: Option<&K>) -> Result<Option<K>, EvalError> {
        self.ensure_initialized()?;
        if self.emission.is_backward(minimum) {
            return Err(self.emission.backward_move(self.describe(), minimum));
        }

        if self.source.top().is_some_and(|entry| entry.key < *minimum) {
            self.source.skip_to(minimum)?;
            self.settle()?;
        }

        self.consume_top()
    }

    fn peek(&self) -> Option<&K> {
        self.source.top().map(|entry| &entry.key)
    }

    fn current(&self) -> Option<&K> {
        self.emission.last()
    }

    fn document(&self) -> &Document<K> {
        self.emission.document()
    }

    fn is_context_required(&self) -> bool {
        false
    }

    fn is_non_event(&self) -> bool {
        self.non_event
    }

    fn leaves(&self) -> Vec<&dyn KeySequence<K>> {
        vec![self as &dyn KeySequence<K>]
    }

    fn children(&self) -> Vec<&dyn KeySequence<K>> {
        Vec::new()
    }

    fn describe(&self) -> String {
        format!("{}=={}", self.field, self.value)
    }
}
