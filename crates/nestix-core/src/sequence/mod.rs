//! Module: sequence
//! Responsibility: lazy evaluation of boolean trees over ordered key sequences.
//! Does not own: posting storage (see `source`) or tree construction (see `plan`).
//! Boundary: every node speaks `KeySequence`; parents never look past it.

mod contracts;
mod instrument;
mod intersect;
mod leaf;
mod negation;
mod union;

#[cfg(test)]
mod tests;

pub use contracts::{
    Anchor, KeySequence, Lifecycle, SequenceBox, has_non_event_leaf, probe,
};
pub use instrument::{
    InstrumentedSequence, MetricsReport, MetricsSink, SequenceEvent, SequenceMetrics,
};
pub use intersect::IntersectSequence;
pub use leaf::{ArrayLeaf, IndexLeaf};
pub use negation::NegationFilter;
pub use union::UnionSequence;
