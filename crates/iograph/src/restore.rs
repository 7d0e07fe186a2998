// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Restore sessions and the context handed to state functions.

use crate::element::{ElementRef, ElementRegistry};
use crate::error::StateError;
use crate::id::Identifier;
use crate::retry::NotYetDeserializable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "a state restore is running" flag.
///
/// Sessions are scoped: [`begin`](Self::begin) returns a guard that clears
/// the flag when dropped, including on early return.
#[derive(Debug, Clone, Default)]
pub struct RestoreFlag(Arc<AtomicBool>);

impl RestoreFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Enter a restore session. Nested sessions are rejected.
    pub fn begin(&self) -> Result<RestoreSession, StateError> {
        if self
            .0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StateError::RestoreInProgress);
        }
        log::debug!("[restore] session started");
        Ok(RestoreSession {
            flag: Arc::clone(&self.0),
        })
    }
}

/// Guard for an active restore session.
#[derive(Debug)]
pub struct RestoreSession {
    flag: Arc<AtomicBool>,
}

impl Drop for RestoreSession {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        log::debug!("[restore] session ended");
    }
}

/// Context passed to `from_state`, `state_to_args` and `apply_state`.
#[derive(Clone, Default)]
pub struct ApplyContext {
    registry: ElementRegistry,
    restoring: bool,
}

impl ApplyContext {
    pub fn new(registry: ElementRegistry, restoring: bool) -> Self {
        Self {
            registry,
            restoring,
        }
    }

    /// Context with an empty registry, outside any restore session.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    /// True while a state document is being applied. Side effects that
    /// would duplicate restored data (default children, notifications)
    /// should be skipped.
    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    /// Look an element up, signalling a deferral when it does not exist yet.
    pub fn resolve(&self, id: &Identifier) -> Result<ElementRef, NotYetDeserializable> {
        self.registry
            .get(id)
            .ok_or_else(|| NotYetDeserializable::new(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_clears_flag_on_drop() {
        let flag = RestoreFlag::new();
        assert!(!flag.is_active());
        {
            let _session = flag.begin().unwrap();
            assert!(flag.is_active());
        }
        assert!(!flag.is_active());
    }

    #[test]
    fn test_nested_session_rejected() {
        let flag = RestoreFlag::new();
        let _session = flag.begin().unwrap();
        assert!(matches!(
            flag.clone().begin(),
            Err(StateError::RestoreInProgress)
        ));
    }

    #[test]
    fn test_session_cleared_after_early_return() {
        fn failing_restore(flag: &RestoreFlag) -> Result<(), StateError> {
            let _session = flag.begin()?;
            Err(StateError::Invalid("boom".into()))
        }

        let flag = RestoreFlag::new();
        assert!(failing_restore(&flag).is_err());
        assert!(!flag.is_active());
    }

    #[test]
    fn test_resolve_missing_element_defers() {
        let ctx = ApplyContext::detached();
        let id = Identifier::new("sim.model.missing").unwrap();
        let err = ctx.resolve(&id).err().unwrap();
        assert_eq!(err.id, id);
        assert!(!ctx.is_restoring());
    }
}
