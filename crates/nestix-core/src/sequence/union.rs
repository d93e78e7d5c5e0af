use crate::{
    config::EvalConfig,
    document::Document,
    error::{ConfigurationError, EvalError, ProtocolViolation},
    key::{KeyRange, SequenceKey},
    sequence::{
        contracts::{
            Anchor, ContextProbe, Emission, IncludeHead, KeySequence, Lifecycle, SequenceBox,
            describe_group, probe,
        },
        negation::NegationFilter,
    },
};
use tracing::trace;

///
/// UnionSequence
///
/// Ordered merge of its includes. A union with only independent includes
/// enumerates the smallest outstanding head each step and collapses
/// duplicates.
///
/// Any negated or context-required branch makes the union context-required:
/// membership for a supplied key `c` is then
/// `any(include contains c) || any(exclude lacks c)`.
///

pub struct UnionSequence<K: SequenceKey> {
    includes: Vec<IncludeHead<K>>,
    deferred_includes: Vec<SequenceBox<K>>,
    excludes: NegationFilter<K>,
    deferred_excludes: Vec<SequenceBox<K>>,
    lifecycle: Lifecycle,
    emission: Emission<K>,
    context: ContextProbe<K>,
}

impl<K: SequenceKey> UnionSequence<K> {
    #[must_use]
    pub fn new(includes: Vec<SequenceBox<K>>, excludes: Vec<SequenceBox<K>>) -> Self {
        let (deferred_includes, includes): (Vec<_>, Vec<_>) = includes
            .into_iter()
            .partition(|seq| seq.is_context_required());
        let (deferred_excludes, excludes): (Vec<_>, Vec<_>) = excludes
            .into_iter()
            .partition(|seq| seq.is_context_required());

        Self {
            includes: includes.into_iter().map(IncludeHead::new).collect(),
            deferred_includes,
            excludes: NegationFilter::new(excludes),
            deferred_excludes,
            lifecycle: Lifecycle::Seeked,
            emission: Emission::new(),
            context: ContextProbe::new(),
        }
    }

    fn has_no_children(&self) -> bool {
        self.includes.is_empty()
            && self.deferred_includes.is_empty()
            && self.excludes.is_empty()
            && self.deferred_excludes.is_empty()
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

    // Refill every head that has nothing outstanding at or after `floor`,
    // then stage the smallest one.
    fn find_next(&mut self, floor: Option<&K>) -> Result<bool, EvalError> {
        for head in &mut self.includes {
            if head.exhausted {
                continue;
            }
            let lagging = match (&head.held, floor) {
                (None, _) => true,
                (Some(held), Some(floor)) => held < floor,
                (Some(_), None) => false,
            };
            if !lagging {
                continue;
            }

            let jump =
                floor.filter(|floor| head.position().is_some_and(|position| position < *floor));
            let position = if let Some(floor) = jump {
                head.seq.move_to(floor, None)?
            } else if head.seq.has_next(None)? {
                Some(head.seq.next()?)
            } else {
                None
            };
            head.exhausted = position.is_none();
            head.held = position;
        }

        let Some(candidate) = self
            .includes
            .iter()
            .filter_map(|head| head.held.as_ref())
            .min()
            .cloned()
        else {
            self.lifecycle = Lifecycle::Exhausted;
            return Ok(false);
        };

        let mut document = Document::new();
        for head in &mut self.includes {
            if head.held.as_ref() == Some(&candidate) {
                document.merge(head.seq.document());
                head.held = None;
            }
        }
        self.emission.stage(candidate, document);

        Ok(true)
    }

    fn answer_context(&mut self, context: Option<&K>) -> Result<bool, EvalError> {
        let Some(context) = context else {
            return Err(ProtocolViolation::ContextMissing {
                node: self.describe(),
            }
            .into());
        };
        if let Some(answer) = self.context.check(|| self.describe(), context)? {
            if answer && self.emission.pending() != Some(context) {
                let document = self.emission.document().clone();
                self.emission.stage(context.clone(), document);
            }
            return Ok(answer);
        }

        // Every include is probed so the document carries all contributors.
        let mut member = false;
        let mut document = Document::new();
        for head in &mut self.includes {
            if probe(head.seq.as_mut(), context)? {
                member = true;
                document.merge(head.seq.document());
            }
        }
        for seq in &mut self.deferred_includes {
            if probe(seq.as_mut(), context)? {
                member = true;
                document.merge(seq.document());
            }
        }
        let included = member;
        if !member && !self.excludes.is_empty() {
            member = !self.excludes.is_excluded_by_all(context)?;
        }
        if !member {
            for seq in &mut self.deferred_excludes {
                if !probe(seq.as_mut(), context)? {
                    member = true;
                    break;
                }
            }
        }
        if member && !included {
            trace!(context = ?context, "union context admitted by a negated branch");
        } else if !member {
            trace!(context = ?context, "union context excluded by every branch");
        }

        if member {
            self.emission.stage(context.clone(), document);
        } else {
            self.emission.discard_pending();
        }
        self.context.record(context, member);

        Ok(member)
    }
}

impl<K: SequenceKey> KeySequence<K> for UnionSequence<K> {
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        self.lifecycle = Lifecycle::Seeked;
        self.emission.reset();
        self.context.reset();
        for head in &mut self.includes {
            head.reset();
            head.seq.seek(range)?;
        }
        for seq in &mut self.deferred_includes {
            seq.seek(range)?;
        }
        self.excludes.seek(range)?;
        for seq in &mut self.deferred_excludes {
            seq.seek(range)?;
        }

        Ok(())
    }

    fn initialize(&mut self, anchor: Anchor) -> Result<(), EvalError> {
        if self.lifecycle.is_initialized() {
            return Ok(());
        }
        if self.has_no_children() {
            return Err(ConfigurationError::EmptyNode {
                node: self.describe(),
            }
            .into());
        }
        if self.is_context_required() && anchor == Anchor::Free {
            return Err(ConfigurationError::UnanchoredUnion {
                node: self.describe(),
            }
            .into());
        }

        for head in &mut self.includes {
            head.seq.initialize(Anchor::Free)?;
        }
        for seq in &mut self.deferred_includes {
            seq.initialize(Anchor::Supplied)?;
        }
        self.excludes.initialize()?;
        for seq in &mut self.deferred_excludes {
            seq.initialize(Anchor::Supplied)?;
        }
        self.lifecycle = Lifecycle::Initialized;

        Ok(())
    }

    fn configure(&mut self, config: &EvalConfig) {
        for head in &mut self.includes {
            head.seq.configure(config);
        }
        for seq in &mut self.deferred_includes {
            seq.configure(config);
        }
        self.excludes.configure(config);
        for seq in &mut self.deferred_excludes {
            seq.configure(config);
        }
    }

    fn has_next(&mut self, context: Option<&K>) -> Result<bool, EvalError> {
        self.ensure_initialized()?;
        if self.is_context_required() {
            return self.answer_context(context);
        }
        if self.emission.pending().is_some() {
            return Ok(true);
        }
        if self.lifecycle == Lifecycle::Exhausted {
            return Ok(false);
        }

        self.find_next(None)
    }

    fn next(&mut self) -> Result<K, EvalError> {
        self.ensure_initialized()?;

        self.emission.take().ok_or_else(|| {
            ProtocolViolation::NextWithoutHasNext {
                node: self.describe(),
            }
            .into()
        })
    }

    fn move_to(&mut self, minimum: &K, context: Option<&K>) -> Result<Option<K>, EvalError> {
        self.ensure_initialized()?;
        if self.emission.is_backward(minimum) {
            return Err(self.emission.backward_move(self.describe(), minimum));
        }

        if self.is_context_required() {
            let found = match context {
                Some(context) if context < minimum => false,
                _ => self.answer_context(context)?,
            };
            return if found { self.next().map(Some) } else { Ok(None) };
        }

        match self.emission.pending() {
            Some(pending) if pending >= minimum => return self.next().map(Some),
            Some(_) => self.emission.discard_pending(),
            None => {}
        }
        if self.lifecycle == Lifecycle::Exhausted {
            return Ok(None);
        }

        if self.find_next(Some(minimum))? {
            self.next().map(Some)
        } else {
            Ok(None)
        }
    }

    fn peek(&self) -> Option<&K> {
        if let Some(pending) = self.emission.pending() {
            return Some(pending);
        }
        if self.lifecycle == Lifecycle::Exhausted || self.is_context_required() {
            return None;
        }

        self.includes
            .iter()
            .filter(|head| !head.exhausted)
            .filter_map(IncludeHead::position)
            .min()
    }

    fn current(&self) -> Option<&K> {
        self.emission.last()
    }

    fn document(&self) -> &Document<K> {
        self.emission.document()
    }

    fn is_context_required(&self) -> bool {
        self.includes.is_empty()
            || !self.deferred_includes.is_empty()
            || !self.excludes.is_empty()
            || !self.deferred_excludes.is_empty()
    }

    fn leaves(&self) -> Vec<&dyn KeySequence<K>> {
        self.children()
            .into_iter()
            .flat_map(|child| child.leaves())
            .collect()
    }

    fn children(&self) -> Vec<&dyn KeySequence<K>> {
        let mut children: Vec<&dyn KeySequence<K>> = Vec::new();
        children.extend(self.includes.iter().map(|head| &*head.seq as &dyn KeySequence<K>));
        children.extend(self.deferred_includes.iter().map(|seq| &**seq as &dyn KeySequence<K>));
        children.extend(self.excludes.sequences().map(|seq| &**seq as &dyn KeySequence<K>));
        children.extend(self.deferred_excludes.iter().map(|seq| &**seq as &dyn KeySequence<K>));

        children
    }

    fn describe(&self) -> String {
        let includes = self
            .includes
            .iter()
            .map(|head| &*head.seq as &dyn KeySequence<K>)
            .chain(self.deferred_includes.iter().map(|seq| &**seq as &dyn KeySequence<K>));
        let excludes = self
            .excludes
            .sequences()
            .map(|seq| &**seq as &dyn KeySequence<K>)
            .chain(self.deferred_excludes.iter().map(|seq| &**seq as &dyn KeySequence<K>));

        describe_group("OR", includes, excludes)
    }
}
