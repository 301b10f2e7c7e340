//! Uniform per-container state lifecycle.
//!
//! Every container owns one [`SliceState`] and drives it through the same
//! template: `idle -> pending -> fulfilled | rejected`. Beginning an
//! operation sets `is_loading` and clears `error` synchronously, before the
//! first gateway await; settlement clears `is_loading` and either applies
//! the payload or records the error message. Rejections never touch the
//! primary collection. Operations are non-retrying; callers re-invoke to
//! retry.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

/// One domain's state slice, as rendered by the view layer
#[derive(Debug, Clone)]
pub struct SliceState<T> {
    /// Primary collection for the domain
    pub items: Vec<T>,
    /// Currently selected/active record (session account, open listing, ...)
    pub current: Option<T>,
    /// True from operation start until settlement
    pub is_loading: bool,
    /// Message of the most recent rejection; cleared on every new attempt
    pub error: Option<String>,
}

impl<T> Default for SliceState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current: None,
            is_loading: false,
            error: None,
        }
    }
}

/// Interior-mutable holder for a [`SliceState`].
///
/// The lock is only ever held for synchronous reducer bodies; containers
/// never hold it across a gateway await.
pub(crate) struct Slice<T> {
    inner: Mutex<SliceState<T>>,
}

impl<T: Clone> Slice<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SliceState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SliceState<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter the pending state: `is_loading = true`, `error = None`
    pub fn begin(&self) {
        let mut state = self.lock();
        state.is_loading = true;
        state.error = None;
    }

    /// Settle an operation, applying `apply` to the state on fulfillment
    pub fn settle<R>(
        &self,
        result: Result<R>,
        apply: impl FnOnce(&mut SliceState<T>, &R),
    ) -> Result<R> {
        match result {
            Ok(value) => {
                let mut state = self.lock();
                state.is_loading = false;
                state.error = None;
                apply(&mut state, &value);
                Ok(value)
            }
            Err(error) => {
                self.reject(&error);
                Err(error)
            }
        }
    }

    /// Enter the rejected state without touching the collections
    pub fn reject(&self, error: &Error) {
        let mut state = self.lock();
        state.is_loading = false;
        state.error = Some(error.to_string());
    }

    /// Run a synchronous reducer outside the pending/settled lifecycle
    pub fn mutate(&self, apply: impl FnOnce(&mut SliceState<T>)) {
        apply(&mut self.lock());
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> SliceState<T> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_sets_pending_and_clears_error() {
        let slice: Slice<String> = Slice::new();
        slice.reject(&Error::Read("boom".to_string()));
        assert!(slice.snapshot().error.is_some());

        slice.begin();
        let state = slice.snapshot();
        assert!(state.is_loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_settle_fulfilled_applies_payload() {
        let slice: Slice<String> = Slice::new();
        slice.begin();

        let result = slice.settle(Ok(vec!["a".to_string()]), |state, items| {
            state.items = items.clone();
        });
        assert!(result.is_ok());

        let state = slice.snapshot();
        assert!(!state.is_loading);
        assert_eq!(state.items, vec!["a".to_string()]);
    }

    #[test]
    fn test_settle_rejected_preserves_items() {
        let slice: Slice<String> = Slice::new();
        slice.mutate(|state| state.items = vec!["kept".to_string()]);
        slice.begin();

        let result: Result<Vec<String>> = slice.settle(
            Err(Error::Read("remote unavailable".to_string())),
            |state, items: &Vec<String>| state.items = items.clone(),
        );
        assert!(result.is_err());

        let state = slice.snapshot();
        assert!(!state.is_loading);
        assert_eq!(state.items, vec!["kept".to_string()]);
        assert_eq!(state.error.as_deref(), Some("read error: remote unavailable"));
    }
}
