use crate::{
    config::EvalConfig,
    error::EvalError,
    key::{KeyRange, SequenceKey},
    sequence::contracts::{Anchor, KeySequence, SequenceBox},
};
use std::collections::BTreeMap;
use tracing::trace;

///
/// NegationFilter
///
/// Owns the independent excludes of one composite node and answers, for a
/// non-decreasing series of candidates, whether any (or every) exclude
/// contains the candidate. Excludes are only advanced when a candidate
/// passes their head, and then straight to the candidate.
///

pub struct NegationFilter<K: SequenceKey> {
    heads: BTreeMap<K, Vec<SequenceBox<K>>>,
    unprimed: Vec<SequenceBox<K>>,
    exhausted: Vec<SequenceBox<K>>,
}

impl<K: SequenceKey> NegationFilter<K> {
    #[must_use]
    pub fn new(excludes: Vec<SequenceBox<K>>) -> Self {
        Self {
            heads: BTreeMap::new(),
            unprimed: excludes,
            exhausted: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let placed: usize = self.heads.values().map(Vec::len).sum();

        placed + self.unprimed.len() + self.exhausted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seek every exclude and forget all positions.
    pub fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        self.collect_all();
        for seq in &mut self.unprimed {
            seq.seek(range)?;
        }

        Ok(())
    }

    pub fn configure(&mut self, config: &EvalConfig) {
        for seq in self.sequences_mut() {
            seq.configure(config);
        }
    }

    pub fn initialize(&mut self) -> Result<(), EvalError> {
        for seq in &mut self.unprimed {
            seq.initialize(Anchor::Free)?;
        }

        Ok(())
    }

    /// Place every not-yet-positioned exclude at its first key.
    pub fn prime(&mut self) -> Result<(), EvalError> {
        for mut seq in std::mem::take(&mut self.unprimed) {
            let first = if seq.has_next(None)? { Some(seq.next()?) } else { None };
            self.place(seq, first);
        }

        Ok(())
    }

    /// True when at least one exclude contains `candidate`.
    pub fn is_excluded(&mut self, candidate: &K) -> Result<bool, EvalError> {
        self.advance_to(candidate)?;

        let excluded = self.heads.contains_key(candidate);
        if excluded {
            trace!(candidate = ?candidate, "candidate excluded by negation filter");
        }

        Ok(excluded)
    }

    /// True when every exclude contains `candidate`.
    pub fn is_excluded_by_all(&mut self, candidate: &K) -> Result<bool, EvalError> {
        if self.is_empty() {
            return Ok(false);
        }
        self.advance_to(candidate)?;

        Ok(self.exhausted.is_empty() && self.heads.len() == 1 && self.heads.contains_key(candidate))
    }

    pub fn sequences(&self) -> impl Iterator<Item = &SequenceBox<K>> {
        self.heads
            .values()
            .flatten()
            .chain(&self.unprimed)
            .chain(&self.exhausted)
    }

    fn sequences_mut(&mut self) -> impl Iterator<Item = &mut SequenceBox<K>> {
        self.heads
            .values_mut()
            .flatten()
            .chain(&mut self.unprimed)
            .chain(&mut self.exhausted)
    }

    fn collect_all(&mut self) {
        let heads = std::mem::take(&mut self.heads);
        self.unprimed.extend(heads.into_values().flatten());
        self.unprimed.append(&mut self.exhausted);
    }

    fn place(&mut self, seq: SequenceBox<K>, position: Option<K>) {
        match position {
            Some(key) => self.heads.entry(key).or_default().push(seq),
            None => self.exhausted.push(seq),
        }
    }

    // Move every exclude resting below `candidate` up to it.
    fn advance_to(&mut self, candidate: &K) -> Result<(), EvalError> {
        let mut lagging = std::mem::take(&mut self.unprimed);
        while let Some(entry) = self.heads.first_entry() {
            if entry.key() >= candidate {
                break;
            }
            lagging.extend(entry.remove());
        }

        let mut lagging = lagging.into_iter();
        while let Some(mut seq) = lagging.next() {
            match seq.move_to(candidate, None) {
                Ok(position) => self.place(seq, position),
                Err(err) => {
                    // Lagging excludes stay owned after a failure.
                    self.unprimed.push(seq);
                    self.unprimed.extend(lagging);
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}

impl<K: SequenceKey> std::fmt::Debug for NegationFilter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegationFilter")
            .field("heads", &self.heads.keys().collect::<Vec<_>>())
            .field("unprimed", &self.unprimed.len())
            .field("exhausted", &self.exhausted.len())
            .finish()
    }
}
