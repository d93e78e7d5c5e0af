//! Module: plan
//! Responsibility: turning an already-planned boolean shape into a sequence tree.
//! Does not own: query parsing or optimisation.

use crate::{
    config::EvalConfig,
    key::SequenceKey,
    sequence::{IntersectSequence, KeySequence, SequenceBox, UnionSequence},
};

///
/// QueryTree
///
/// Boolean shape handed over by the planner. Negation only appears as the
/// `excludes` of an `And` or `Or`.
///

pub enum QueryTree<K: SequenceKey> {
    Leaf(SequenceBox<K>),
    And {
        includes: Vec<Self>,
        excludes: Vec<Self>,
    },
    Or {
        includes: Vec<Self>,
        excludes: Vec<Self>,
    },
}

impl<K: SequenceKey> QueryTree<K> {
    pub fn leaf(seq: impl KeySequence<K> + 'static) -> Self {
        Self::Leaf(Box::new(seq))
    }

    #[must_use]
    pub const fn and(includes: Vec<Self>) -> Self {
        Self::And {
            includes,
            excludes: Vec::new(),
        }
    }

    #[must_use]
    pub const fn and_not(includes: Vec<Self>, excludes: Vec<Self>) -> Self {
        Self::And { includes, excludes }
    }

    #[must_use]
    pub const fn or(includes: Vec<Self>) -> Self {
        Self::Or {
            includes,
            excludes: Vec::new(),
        }
    }

    #[must_use]
    pub const fn or_not(includes: Vec<Self>, excludes: Vec<Self>) -> Self {
        Self::Or { includes, excludes }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::And { includes, excludes } | Self::Or { includes, excludes } => {
                1 + includes
                    .iter()
                    .chain(excludes)
                    .map(Self::depth)
                    .max()
                    .unwrap_or(0)
            }
        }
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::And { includes, excludes } | Self::Or { includes, excludes } => {
                includes.iter().chain(excludes).map(Self::leaf_count).sum()
            }
        }
    }

    /// Build the sequence tree and hand `config` to every node in it.
    #[must_use]
    pub fn build(self, config: &EvalConfig) -> SequenceBox<K> {
        let mut root = self.assemble();
        root.configure(config);

        root
    }

    // Children first, so every composite sees whether its children are
    // context-required.
    fn assemble(self) -> SequenceBox<K> {
        let assemble_all = |nodes: Vec<Self>| -> Vec<SequenceBox<K>> {
            nodes.into_iter().map(Self::assemble).collect()
        };

        match self {
            Self::Leaf(seq) => seq,
            Self::And { includes, excludes } => Box::new(IntersectSequence::new(
                assemble_all(includes),
                assemble_all(excludes),
            )),
            Self::Or { includes, excludes } => {
                Box::new(UnionSequence::new(assemble_all(includes), assemble_all(excludes)))
            }
        }
    }
}

impl<K: SequenceKey> std::fmt::Debug for QueryTree<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leaf(seq) => write!(f, "Leaf({})", seq.describe()),
            Self::And { includes, excludes } => f
                .debug_struct("And")
                .field("includes", includes)
                .field("excludes", excludes)
                .finish(),
            Self::Or { includes, excludes } => f
                .debug_struct("Or")
                .field("includes", includes)
                .field("excludes", excludes)
                .finish(),
        }
    }
}
