//! Module: eval
//! Responsibility: driving a sequence tree and collecting matches.
//! Does not own: tree construction (see `plan`) or posting storage.
//! Boundary: the only place a root is seeked, initialized, and pulled.

use crate::{
    config::EvalConfig,
    document::Document,
    error::EvalError,
    key::{KeyRange, SequenceKey},
    plan::QueryTree,
    sequence::{Anchor, KeySequence, SequenceBox, probe},
};
use serde::Serialize;
use std::thread;
use tracing::debug;

///
/// Match
///
/// One matching identifier plus the index-only attributes assembled for it.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Match<K: SequenceKey> {
    pub key: K,
    pub document: Document<K>,
}

type ContextKeys<K> = Box<dyn Iterator<Item = K> + Send>;

///
/// Evaluator
///
/// Owns one root. Without context keys the root must be independent and is
/// pulled directly; with context keys each key is probed against the root in
/// order.
///

pub struct Evaluator<K: SequenceKey> {
    root: SequenceBox<K>,
    contexts: Option<ContextKeys<K>>,
    last: Option<K>,
    initialized: bool,
    failed: bool,
}

impl<K: SequenceKey> Evaluator<K> {
    #[must_use]
    pub fn new(root: SequenceBox<K>) -> Self {
        Self {
            root,
            contexts: None,
            last: None,
            initialized: false,
            failed: false,
        }
    }

    #[must_use]
    pub fn from_tree(tree: QueryTree<K>, config: &EvalConfig) -> Self {
        Self::new(tree.build(config))
    }

    /// Supply candidate keys from outside the tree (for example an event scan).
    /// Keys must be ascending; keys at or below the last match are skipped.
    #[must_use]
    pub fn with_context_keys<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        I::IntoIter: Send + 'static,
    {
        self.contexts = Some(Box::new(keys.into_iter()));
        self
    }

    #[must_use]
    pub fn root(&self) -> &dyn KeySequence<K> {
        self.root.as_ref()
    }

    const fn anchor(&self) -> Anchor {
        if self.contexts.is_some() {
            Anchor::Supplied
        } else {
            Anchor::Free
        }
    }

    pub fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        self.initialized = false;
        self.last = None;
        self.failed = false;

        self.root.seek(range)
    }

    pub fn initialize(&mut self) -> Result<(), EvalError> {
        if self.initialized {
            return Ok(());
        }
        self.root.initialize(self.anchor())?;
        self.initialized = true;

        debug!(
            root = %self.root.describe(),
            context_required = self.root.is_context_required(),
            anchor = ?self.anchor(),
            "evaluation tree initialized"
        );

        Ok(())
    }

    /// Next matching key; initializes the tree on first use.
    pub fn next_match(&mut self) -> Result<Option<Match<K>>, EvalError> {
        self.initialize()?;

        if self.contexts.is_some() {
            return self.next_context_match(None);
        }
        if !self.root.has_next(None)? {
            return Ok(None);
        }
        let key = self.root.next()?;

        Ok(Some(self.capture(key)))
    }

    /// First match at or after `minimum`.
    pub fn move_to(&mut self, minimum: &K) -> Result<Option<Match<K>>, EvalError> {
        self.initialize()?;

        if self.contexts.is_some() {
            return self.next_context_match(Some(minimum));
        }
        match self.root.move_to(minimum, None)? {
            Some(key) => Ok(Some(self.capture(key))),
            None => Ok(None),
        }
    }

    /// Drain every remaining match.
    pub fn collect_matches(&mut self) -> Result<Vec<Match<K>>, EvalError> {
        self.by_ref().collect()
    }

    fn next_context_match(&mut self, minimum: Option<&K>) -> Result<Option<Match<K>>, EvalError> {
        loop {
            let Some(context) = self.contexts.as_mut().and_then(Iterator::next) else {
                return Ok(None);
            };
            if self.last.as_ref().is_some_and(|last| context <= *last)
                || minimum.is_some_and(|minimum| context < *minimum)
            {
                continue;
            }
            if probe(self.root.as_mut(), &context)? {
                return Ok(Some(self.capture(context)));
            }
        }
    }

    fn capture(&mut self, key: K) -> Match<K> {
        self.last = Some(key.clone());

        Match {
            key,
            document: self.root.document().clone(),
        }
    }
}

impl<K: SequenceKey> Iterator for Evaluator<K> {
    type Item = Result<Match<K>, EvalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.next_match() {
            Ok(found) => found.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Evaluate independent partitions concurrently, one tree per thread.
/// Results come back in input order.
pub fn evaluate_partitions<K: SequenceKey>(
    partitions: Vec<Evaluator<K>>,
) -> Vec<Result<Vec<Match<K>>, EvalError>> {
    debug!(partitions = partitions.len(), "evaluating partitions");

    thread::scope(|scope| {
        let handles: Vec<_> = partitions
            .into_iter()
            .map(|mut evaluator| scope.spawn(move || evaluator.collect_matches()))
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::array_tree;

    #[test]
    fn context_keys_at_or_below_last_match_are_skipped() {
        let tree = QueryTree::and(vec![array_tree("a", &[2, 4, 6])]);
        let mut evaluator = Evaluator::from_tree(tree, &EvalConfig::default())
            .with_context_keys(vec![2_u32, 2, 3, 4, 4, 6]);

        let keys: Vec<u32> = evaluator
            .collect_matches()
            .expect("evaluation should succeed")
            .into_iter()
            .map(|found| found.key)
            .collect();

        assert_eq!(keys, vec![2, 4, 6]);
    }

    #[test]
    fn context_move_to_skips_smaller_contexts() {
        let tree = QueryTree::and(vec![array_tree("a", &[1, 3, 5, 7])]);
        let mut evaluator = Evaluator::from_tree(tree, &EvalConfig::default())
            .with_context_keys(1_u32..=8);

        let found = evaluator
            .move_to(&4)
            .expect("move should succeed")
            .expect("a match should follow");
        assert_eq!(found.key, 5);
    }

    #[test]
    fn seek_restarts_evaluation() {
        let tree = QueryTree::or(vec![array_tree("a", &[1, 5]), array_tree("b", &[3, 9])]);
        let mut evaluator = Evaluator::from_tree(tree, &EvalConfig::default());
        assert_eq!(evaluator.root().describe(), "OR(a[2], b[2])");
        assert_eq!(evaluator.collect_matches().expect("first pass").len(), 4);

        evaluator
            .seek(&KeyRange::closed(2, 6))
            .expect("seek should succeed");
        let keys: Vec<u32> = evaluator
            .collect_matches()
            .expect("second pass")
            .into_iter()
            .map(|found| found.key)
            .collect();

        assert_eq!(keys, vec![3, 5]);
    }
}
