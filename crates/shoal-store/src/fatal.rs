//! The group's fatal-error path.
//!
//! Programmer errors (a second primary, a malformed identifier) halt the
//! offending process. Failures nobody is waiting for (an unobserved
//! transaction) are reported here instead of being dropped.

use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::error::StoreError;

type Hook = Arc<dyn Fn(&StoreError) + Send + Sync>;

/// Destination for errors that have no caller to return to.
#[derive(Clone, Default)]
pub struct FatalSink {
    hook: Option<Hook>,
}

impl FatalSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that also forwards every report to `hook`.
    pub fn with_hook(hook: impl Fn(&StoreError) + Send + Sync + 'static) -> Self {
        Self {
            hook: Some(Arc::new(hook)),
        }
    }

    /// Log and forward an error that has no other observer.
    pub fn report(&self, err: &StoreError) {
        error!(error = %err, "unobserved store failure");
        if let Some(hook) = &self.hook {
            hook(err);
        }
    }

    /// Report an unrecoverable error and halt.
    #[track_caller]
    pub fn fail(&self, err: StoreError) -> ! {
        self.report(&err);
        panic!("fatal store error: {err}");
    }
}

impl fmt::Debug for FatalSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FatalSink")
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn report_invokes_hook() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let sink = FatalSink::with_hook(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        sink.report(&StoreError::NothingToUndo);
        sink.report(&StoreError::NotStarted);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn report_without_hook_is_fine() {
        FatalSink::new().report(&StoreError::NotStarted);
    }

    #[test]
    #[should_panic(expected = "fatal store error")]
    fn fail_panics() {
        FatalSink::new().fail(StoreError::NoPrimary);
    }

    #[test]
    fn debug_format() {
        assert!(format!("{:?}", FatalSink::new()).contains("hook: false"));
    }
}
