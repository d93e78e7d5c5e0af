use std::fmt;
use thiserror::Error as ThisError;

///
/// EvalError
///
/// Failure surfaced while building, seeking, or pulling an evaluation tree.
/// Exhaustion is never an error; it is reported as `false` / `None`.
///

#[derive(Debug, ThisError)]
pub enum EvalError {
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    #[error("{0}")]
    Protocol(#[from] ProtocolViolation),

    /// Raised by a leaf source; callers must propagate it and treat any
    /// partially consumed tree as invalid.
    #[error("evaluation cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("{0}")]
    Source(#[from] SourceError),
}

impl EvalError {
    /// Construct a cancellation signal with a human-readable reason.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Construct a source lookup failure for one field.
    pub fn source_failure(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source(SourceError::Lookup {
            field: field.into(),
            message: message.into(),
        })
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Configuration(_) => ErrorClass::Configuration,
            Self::Protocol(_) => ErrorClass::Protocol,
            Self::Cancelled { .. } => ErrorClass::Cancelled,
            Self::Source(_) => ErrorClass::Source,
        }
    }

    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        match self {
            Self::Configuration(err) => err.origin(),
            Self::Protocol(_) => ErrorOrigin::Sequence,
            Self::Cancelled { .. } | Self::Source(_) => ErrorOrigin::Source,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {self}", self.origin(), self.class())
    }
}

///
/// ConfigurationError
///
/// Fatal tree-shape problems detected at `initialize()` or while loading
/// an `EvalConfig`.
///

#[derive(Debug, ThisError)]
pub enum ConfigurationError {
    #[error("intersection has no independent include to enumerate from: {node}")]
    NoIndependentInclude { node: String },

    #[error("union requires an externally supplied context that was never provided: {node}")]
    UnanchoredUnion { node: String },

    #[error("node has no children: {node}")]
    EmptyNode { node: String },

    #[error("invalid evaluation config: {message}")]
    InvalidConfig { message: String },
}

impl ConfigurationError {
    const fn origin(&self) -> ErrorOrigin {
        match self {
            Self::NoIndependentInclude { .. } => ErrorOrigin::Intersection,
            Self::UnanchoredUnion { .. } => ErrorOrigin::Union,
            Self::EmptyNode { .. } => ErrorOrigin::Sequence,
            Self::InvalidConfig { .. } => ErrorOrigin::Config,
        }
    }
}

///
/// ProtocolViolation
///
/// Programmer errors against the pull protocol. Never recovered.
///

#[derive(Debug, ThisError)]
pub enum ProtocolViolation {
    #[error("initialize() was never called on {node}")]
    NotInitialized { node: String },

    #[error("next() called without a preceding successful has_next() on {node}")]
    NextWithoutHasNext { node: String },

    #[error("move_to() below the last returned position on {node}: last={last}, minimum={minimum}")]
    BackwardMove {
        node: String,
        last: String,
        minimum: String,
    },

    #[error("context must be supplied before probing context-required {node}")]
    ContextMissing { node: String },

    #[error("context moved backwards on {node}: last={last}, context={context}")]
    BackwardContext {
        node: String,
        last: String,
        context: String,
    },

    #[error("leaf input is not strictly ascending at position {position}")]
    UnsortedInput { position: usize },
}

///
/// SourceError
///
/// Failures raised by posting sources other than cancellation.
///

#[derive(Debug, ThisError)]
pub enum SourceError {
    #[error("lookup failed for field {field}: {message}")]
    Lookup { field: String, message: String },

    #[error("source for field {field} emitted out-of-order key (previous: {previous}, current: {current})")]
    OutOfOrder {
        field: String,
        previous: String,
        current: String,
    },
}

///
/// ErrorClass
/// Error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Configuration,
    Protocol,
    Cancelled,
    Source,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Protocol => "protocol",
            Self::Cancelled => "cancelled",
            Self::Source => "source",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Config,
    Source,
    Sequence,
    Intersection,
    Union,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Source => "source",
            Self::Sequence => "sequence",
            Self::Intersection => "intersection",
            Self::Union => "union",
        };
        write!(f, "{label}")
    }
}
