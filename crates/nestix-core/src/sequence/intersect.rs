use crate::{
    config::EvalConfig,
    document::Document,
    error::{ConfigurationError, EvalError, ProtocolViolation},
    key::{KeyRange, SequenceKey},
    sequence::{
        contracts::{
            Anchor, ContextProbe, Emission, IncludeHead, KeySequence, Lifecycle, SequenceBox,
            describe_group, has_non_event_leaf, probe,
        },
        negation::NegationFilter,
    },
};
use tracing::{trace, warn};

///
/// IntersectSequence
///
/// Leapfrog intersection. Independent includes drive candidate generation;
/// context-required includes and excludes are probed per candidate; the
/// remaining excludes sit in a `NegationFilter`.
///
/// With no independent include the node becomes context-required itself and
/// only answers membership for keys supplied by its parent.
///

pub struct IntersectSequence<K: SequenceKey> {
    includes: Vec<IncludeHead<K>>,
    deferred_includes: Vec<SequenceBox<K>>,
    excludes: NegationFilter<K>,
    deferred_excludes: Vec<SequenceBox<K>>,
    degrade_on_event_seek_failure: bool,
    lifecycle: Lifecycle,
    emission: Emission<K>,
    context: ContextProbe<K>,
}

impl<K: SequenceKey> IntersectSequence<K> {
    /// Partition children by whether they can enumerate on their own.
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
            degrade_on_event_seek_failure: EvalConfig::default().degrade_on_event_seek_failure,
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

    fn reset(&mut self) {
        self.lifecycle = Lifecycle::Seeked;
        self.emission.reset();
        self.context.reset();
        for head in &mut self.includes {
            head.reset();
        }
    }

    // A failed include may be dropped only if it is a plain event lookup and
    // something else still drives the intersection.
    fn can_drop_after_seek_failure(&self, index: usize, err: &EvalError) -> bool {
        self.degrade_on_event_seek_failure
            && matches!(err, EvalError::Source(_))
            && self.includes.len() > 1
            && !has_non_event_leaf(&*self.includes[index].seq)
    }

    fn seek_includes(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        let mut index = 0;
        while index < self.includes.len() {
            match self.includes[index].seq.seek(range) {
                Ok(()) => index += 1,
                Err(err) if self.can_drop_after_seek_failure(index, &err) => {
                    let dropped = self.includes.remove(index);
                    warn!(
                        include = %dropped.seq.describe(),
                        error = %err,
                        "dropping intersection include after seek failure"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    // Align every independent include on the smallest common key at or after
    // `floor`. `None` once any include runs out.
    fn converge(&mut self, floor: Option<&K>) -> Result<Option<K>, EvalError> {
        let mut target = floor.cloned();
        for head in &self.includes {
            let Some(position) = head.position() else {
                return Ok(None);
            };
            if target.as_ref().is_none_or(|target| position > target) {
                target = Some(position.clone());
            }
        }
        let Some(target) = target else {
            return Ok(None);
        };

        // First round: a child whose hint already sits on the target is
        // stepped, everything else jumps to it.
        for head in &mut self.includes {
            if head.held.as_ref().is_some_and(|held| *held >= target) {
                continue;
            }
            let position = if head.held.is_none() && head.seq.peek() == Some(&target) {
                if head.seq.has_next(None)? {
                    Some(head.seq.next()?)
                } else {
                    None
                }
            } else {
                head.seq.move_to(&target, None)?
            };
            let Some(position) = position else {
                return Ok(None);
            };
            head.held = Some(position);
        }

        let held = self.includes.iter().filter_map(|head| head.held.clone());
        let Some(mut target) = held.max() else {
            return Ok(None);
        };
        loop {
            let mut aligned = true;
            for head in &mut self.includes {
                if head.held.as_ref().is_some_and(|held| *held >= target) {
                    continue;
                }
                aligned = false;
                let Some(position) = head.seq.move_to(&target, None)? else {
                    return Ok(None);
                };
                if position > target {
                    target = position.clone();
                }
                head.held = Some(position);
            }

            if aligned {
                return Ok(Some(target));
            }
        }
    }

    // Deferred includes, then the negation filter, then deferred excludes.
    fn accept(&mut self, candidate: &K) -> Result<bool, EvalError> {
        for seq in &mut self.deferred_includes {
            if !probe(seq.as_mut(), candidate)? {
                return Ok(false);
            }
        }
        if !self.excludes.is_empty() && self.excludes.is_excluded(candidate)? {
            return Ok(false);
        }
        for seq in &mut self.deferred_excludes {
            if probe(seq.as_mut(), candidate)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn assemble_document(&self) -> Document<K> {
        let mut document = Document::new();
        for head in &self.includes {
            document.merge(head.seq.document());
        }
        for seq in &self.deferred_includes {
            document.merge(seq.document());
        }

        document
    }

    // Stage the next match at or after `floor`.
    fn find_next(&mut self, floor: Option<&K>) -> Result<bool, EvalError> {
        let mut floor = floor.cloned();
        loop {
            let Some(candidate) = self.converge(floor.as_ref())? else {
                self.lifecycle = Lifecycle::Exhausted;
                return Ok(false);
            };
            let accepted = self.accept(&candidate)?;
            for head in &mut self.includes {
                head.held = None;
            }

            if accepted {
                let document = self.assemble_document();
                self.emission.stage(candidate, document);
                return Ok(true);
            }
            trace!(candidate = ?candidate, "intersection candidate rejected");
            floor = None;
        }
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

        let member = self.accept(context)?;
        if member {
            let document = self.assemble_document();
            self.emission.stage(context.clone(), document);
        } else {
            self.emission.discard_pending();
        }
        self.context.record(context, member);

        Ok(member)
    }
}

impl<K: SequenceKey> KeySequence<K> for IntersectSequence<K> {
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        self.reset();
        self.seek_includes(range)?;
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
        if self.includes.is_empty() && anchor == Anchor::Free {
            return Err(ConfigurationError::NoIndependentInclude {
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
        self.degrade_on_event_seek_failure = config.degrade_on_event_seek_failure;
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

        let mut hint = None;
        for head in &self.includes {
            let position = head.position()?;
            if hint.is_none_or(|hint| position > hint) {
                hint = Some(position);
            }
        }

        hint
    }

    fn current(&self) -> Option<&K> {
        self.emission.last()
    }

    fn document(&self) -> &Document<K> {
        self.emission.document()
    }

    fn is_context_required(&self) -> bool {
        self.includes.is_empty()
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

        describe_group("AND", includes, excludes)
    }
}
