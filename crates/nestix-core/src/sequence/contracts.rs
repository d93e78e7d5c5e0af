use crate::{
    config::EvalConfig,
    document::Document,
    error::{EvalError, ProtocolViolation},
    key::{KeyRange, SequenceKey},
};

///
/// KeySequence
///
/// Pull-based contract shared by leaves, intersections, and unions.
///
/// Positions are strictly ascending. Independent sequences enumerate their
/// own members; context-required sequences only answer whether a supplied
/// context key is a member.
///

pub trait KeySequence<K: SequenceKey>: Send {
    /// Position every leaf of this subtree inside `range` and return the node
    /// to its pre-initialize state.
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError>;

    fn initialize(&mut self, anchor: Anchor) -> Result<(), EvalError>;

    /// Apply tree-wide tunables; composites forward them to every child.
    fn configure(&mut self, _config: &EvalConfig) {}

    /// Independent sequences ignore `context`; context-required sequences
    /// report whether `context` is a member.
    fn has_next(&mut self, context: Option<&K>) -> Result<bool, EvalError>;

    fn next(&mut self) -> Result<K, EvalError>;

    /// Consume and return the first position at or after `minimum`.
    fn move_to(&mut self, minimum: &K, context: Option<&K>) -> Result<Option<K>, EvalError>;

    /// Lowest key the next position can take (exact for leaves and for any
    /// node whose lookahead is staged). `None` only once exhausted.
    fn peek(&self) -> Option<&K>;

    /// Last returned position.
    fn current(&self) -> Option<&K>;

    /// Attributes assembled for the last returned position.
    fn document(&self) -> &Document<K>;

    fn is_context_required(&self) -> bool;

    fn is_non_event(&self) -> bool {
        false
    }

    fn leaves(&self) -> Vec<&dyn KeySequence<K>>;

    fn children(&self) -> Vec<&dyn KeySequence<K>>;

    fn describe(&self) -> String;
}

pub type SequenceBox<K> = Box<dyn KeySequence<K>>;

impl<K, T> KeySequence<K> for Box<T>
where
    K: SequenceKey,
    T: KeySequence<K> + ?Sized,
{
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        self.as_mut().seek(range)
    }

    fn initialize(&mut self, anchor: Anchor) -> Result<(), EvalError> {
        self.as_mut().initialize(anchor)
    }

    fn configure(&mut self, config: &EvalConfig) {
        self.as_mut().configure(config);
    }

    fn has_next(&mut self, context: Option<&K>) -> Result<bool, EvalError> {
        self.as_mut().has_next(context)
    }

    fn next(&mut self) -> Result<K, EvalError> {
        self.as_mut().next()
    }

    fn move_to(&mut self, minimum: &K, context: Option<&K>) -> Result<Option<K>, EvalError> {
        self.as_mut().move_to(minimum, context)
    }

    fn peek(&self) -> Option<&K> {
        self.as_ref().peek()
    }

    fn current(&self) -> Option<&K> {
        self.as_ref().current()
    }

    fn document(&self) -> &Document<K> {
        self.as_ref().document()
    }

    fn is_context_required(&self) -> bool {
        self.as_ref().is_context_required()
    }

    fn is_non_event(&self) -> bool {
        self.as_ref().is_non_event()
    }

    fn leaves(&self) -> Vec<&dyn KeySequence<K>> {
        self.as_ref().leaves()
    }

    fn children(&self) -> Vec<&dyn KeySequence<K>> {
        self.as_ref().children()
    }

    fn describe(&self) -> String {
        self.as_ref().describe()
    }
}

///
/// Anchor
///
/// Whether someone will hand this node a context per candidate.
/// Parents initialize deferred children with `Supplied`; a driver does so
/// for the root only when it feeds context keys itself.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Anchor {
    #[default]
    Free,
    Supplied,
}

///
/// Lifecycle
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Lifecycle {
    #[default]
    Seeked,
    Initialized,
    Exhausted,
}

impl Lifecycle {
    #[must_use]
    pub const fn is_initialized(self) -> bool {
        matches!(self, Self::Initialized | Self::Exhausted)
    }
}

/// Test whether `candidate` is a member of `seq`, consuming it when it is.
///
/// Candidates must be non-decreasing across calls on the same sequence.
pub fn probe<K: SequenceKey>(
    seq: &mut dyn KeySequence<K>,
    candidate: &K,
) -> Result<bool, EvalError> {
    if seq.is_context_required() {
        if seq.has_next(Some(candidate))? {
            seq.next()?;
            return Ok(true);
        }

        return Ok(false);
    }

    // A position already past the candidate proves it was skipped over.
    match seq.current() {
        Some(current) if current == candidate => return Ok(true),
        Some(current) if current > candidate => return Ok(false),
        _ => {}
    }
    match seq.peek() {
        None => return Ok(false),
        Some(hint) if hint > candidate => return Ok(false),
        Some(_) => {}
    }

    Ok(seq.move_to(candidate, None)?.as_ref() == Some(candidate))
}

/// True when any leaf under `seq` contributes index-only attributes.
pub fn has_non_event_leaf<K: SequenceKey>(seq: &dyn KeySequence<K>) -> bool {
    seq.leaves().iter().any(|leaf| leaf.is_non_event())
}

///
/// IncludeHead
///
/// One independent child of a composite node plus the position consumed from
/// it that the parent has not yet emitted past.
///

pub(crate) struct IncludeHead<K: SequenceKey> {
    pub(crate) seq: SequenceBox<K>,
    pub(crate) held: Option<K>,
    pub(crate) exhausted: bool,
}

impl<K: SequenceKey> IncludeHead<K> {
    pub(crate) const fn new(seq: SequenceBox<K>) -> Self {
        Self {
            seq,
            held: None,
            exhausted: false,
        }
    }

    // Held position when one is outstanding, otherwise the child's hint.
    pub(crate) fn position(&self) -> Option<&K> {
        self.held.as_ref().or_else(|| self.seq.peek())
    }

    pub(crate) fn reset(&mut self) {
        self.held = None;
        self.exhausted = false;
    }
}

///
/// Emission
///
/// Output bookkeeping for one sequence: the staged lookahead, the last
/// returned key, and the document that goes with it.
///

#[derive(Debug)]
pub(crate) struct Emission<K> {
    last: Option<K>,
    pending: Option<(K, Document<K>)>,
    document: Document<K>,
}

impl<K: SequenceKey> Emission<K> {
    pub(crate) const fn new() -> Self {
        Self {
            last: None,
            pending: None,
            document: Document::new(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.last = None;
        self.pending = None;
        self.document.clear();
    }

    pub(crate) const fn last(&self) -> Option<&K> {
        self.last.as_ref()
    }

    pub(crate) fn pending(&self) -> Option<&K> {
        self.pending.as_ref().map(|(key, _)| key)
    }

    pub(crate) fn stage(&mut self, key: K, document: Document<K>) {
        self.pending = Some((key, document));
    }

    pub(crate) fn discard_pending(&mut self) {
        self.pending = None;
    }

    /// Promote the staged key to the last returned position.
    pub(crate) fn take(&mut self) -> Option<K> {
        let (key, document) = self.pending.take()?;
        self.last = Some(key.clone());
        self.document = document;

        Some(key)
    }

    pub(crate) fn is_backward(&self, minimum: &K) -> bool {
        self.last.as_ref().is_some_and(|last| minimum < last)
    }

    pub(crate) const fn document(&self) -> &Document<K> {
        &self.document
    }

    pub(crate) fn backward_move(&self, node: String, minimum: &K) -> EvalError {
        ProtocolViolation::BackwardMove {
            node,
            last: format!("{:?}", self.last),
            minimum: format!("{minimum:?}"),
        }
        .into()
    }
}

///
/// ContextProbe
///
/// Last context a context-required node answered for. Repeated probes with
/// the same key return the cached answer; smaller keys are rejected.
///

#[derive(Debug)]
pub(crate) struct ContextProbe<K> {
    last: Option<(K, bool)>,
}

impl<K: SequenceKey> ContextProbe<K> {
    pub(crate) const fn new() -> Self {
        Self { last: None }
    }

    pub(crate) fn reset(&mut self) {
        self.last = None;
    }

    /// `Ok(Some(answer))` for a repeated context, `Ok(None)` for a fresh one.
    pub(crate) fn check(
        &self,
        node: impl FnOnce() -> String,
        context: &K,
    ) -> Result<Option<bool>, EvalError> {
        match &self.last {
            Some((last, answer)) if last == context => Ok(Some(*answer)),
            Some((last, _)) if context < last => Err(ProtocolViolation::BackwardContext {
                node: node(),
                last: format!("{last:?}"),
                context: format!("{context:?}"),
            }
            .into()),
            _ => Ok(None),
        }
    }

    pub(crate) fn record(&mut self, context: &K, answer: bool) {
        self.last = Some((context.clone(), answer));
    }
}

/// `LABEL(a, b, !c)` style rendering shared by composite nodes.
pub(crate) fn describe_group<'a, K, I, J>(label: &str, includes: I, excludes: J) -> String
where
    K: SequenceKey,
    I: IntoIterator<Item = &'a dyn KeySequence<K>>,
    J: IntoIterator<Item = &'a dyn KeySequence<K>>,
{
    let parts: Vec<String> = includes
        .into_iter()
        .map(KeySequence::describe)
        .chain(excludes.into_iter().map(|seq| format!("!{}", seq.describe())))
        .collect();

    format!("{label}({})", parts.join(", "))
}
