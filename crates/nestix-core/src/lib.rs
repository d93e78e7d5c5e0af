//! Core runtime for nestix: lazy leapfrog evaluation of nested boolean
//! queries over sorted posting lists, plus the vocabulary exported via the
//! `prelude`.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod document;
pub mod error;
pub mod eval;
pub mod key;
pub mod plan;
pub mod sequence;
pub mod source;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No sources, instrumentation, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        config::EvalConfig,
        document::{Attribute, Document},
        error::EvalError,
        eval::{Evaluator, Match},
        key::{DocKey, KeyRange, SequenceKey},
        plan::QueryTree,
        sequence::{Anchor, KeySequence, SequenceBox},
    };
}
