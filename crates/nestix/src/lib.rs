//! ## Crate layout
//! - `core`: sequence contract, leaves, intersections, unions, sources, and
//!   the evaluation driver.
//!
//! The `prelude` module mirrors the surface used to build and drive a tree.

pub use nestix_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::core::{
        config::EvalConfig,
        document::{Attribute, Document},
        error::{ErrorClass, EvalError},
        eval::{Evaluator, Match, evaluate_partitions},
        key::{DocKey, KeyRange},
        plan::QueryTree,
        sequence::{ArrayLeaf, IndexLeaf, KeySequence as _},
        source::{CancelFlag, CancellableSource, FieldIndex},
    };
}
