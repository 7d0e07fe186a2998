// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deferred-pass application of state entries.
//!
//! Entries of a state document may depend on elements that other entries
//! create. Each pass applies every pending entry; an entry failing with
//! [`NotYetDeserializable`] is re-queued for the next pass, any other
//! failure aborts. A pass that applies nothing ends the run.

use crate::error::StateError;
use crate::id::Identifier;
use thiserror::Error;

/// Transient "dependency missing" signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{id} is not yet available for deserialization")]
pub struct NotYetDeserializable {
    pub id: Identifier,
}

impl NotYetDeserializable {
    pub fn new(id: Identifier) -> Self {
        Self { id }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub passes: usize,
    pub applied: usize,
}

/// Apply `ops` until all succeed, re-queueing deferrable failures.
pub fn run_passes<T, F>(ops: impl IntoIterator<Item = T>, mut apply: F) -> Result<PassReport, StateError>
where
    F: FnMut(&T) -> Result<(), StateError>,
{
    let mut pending: Vec<T> = ops.into_iter().collect();
    let mut report = PassReport::default();

    while !pending.is_empty() {
        report.passes += 1;
        let queued = pending.len();
        let mut deferred = Vec::new();
        let mut missing = Vec::new();

        for op in pending {
            match apply(&op) {
                Ok(()) => report.applied += 1,
                Err(err) => match err.deferred_dependency() {
                    Some(id) => {
                        missing.push(id.clone());
                        deferred.push(op);
                    }
                    None => return Err(err),
                },
            }
        }

        log::debug!(
            "[retry] pass {}: {} applied, {} deferred",
            report.passes,
            queued - deferred.len(),
            deferred.len()
        );

        if deferred.len() == queued {
            missing.sort();
            missing.dedup();
            log::warn!(
                "[retry] no progress after {} passes; {} entries unresolved",
                report.passes,
                deferred.len()
            );
            return Err(StateError::Unresolved { missing });
        }
        pending = deferred;
    }

    Ok(report)
}
