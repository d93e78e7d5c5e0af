use crate::{
    error::EvalError,
    key::KeyRange,
    source::{PostingEntry, PostingSource},
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

///
/// CancelFlag
///
/// Cooperative cancellation shared between a driver and its sources.
///

#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

///
/// CancellableSource
///
/// Source decorator that fails every call with `EvalError::Cancelled` once
/// its flag is raised. The wrapped cursor is left where it was.
///

pub struct CancellableSource<S> {
    inner: S,
    flag: CancelFlag,
}

impl<S> CancellableSource<S> {
    #[must_use]
    pub const fn new(inner: S, flag: CancelFlag) -> Self {
        Self { inner, flag }
    }

    fn check<K>(&self) -> Result<(), EvalError>
    where
        S: PostingSource<K>,
    {
        if self.flag.is_cancelled() {
            return Err(EvalError::cancelled(format!(
                "scan of {} was cancelled",
                self.inner.describe()
            )));
        }

        Ok(())
    }
}

impl<K, S> PostingSource<K> for CancellableSource<S>
where
    S: PostingSource<K>,
{
    fn seek(&mut self, range: &KeyRange<K>) -> Result<(), EvalError> {
        self.check::<K>()?;
        self.inner.seek(range)
    }

    fn top(&self) -> Option<&PostingEntry<K>> {
        self.inner.top()
    }

    fn advance(&mut self) -> Result<(), EvalError> {
        self.check::<K>()?;
        self.inner.advance()
    }

    fn skip_to(&mut self, minimum: &K) -> Result<(), EvalError> {
        self.check::<K>()?;
        self.inner.skip_to(minimum)
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
