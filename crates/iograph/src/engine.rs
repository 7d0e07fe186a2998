// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! State capture, restore and remote invocation over an element registry.

use crate::container::DynamicContainer;
use crate::element::{participates_in_state, ElementRef, ElementRegistry};
use crate::error::StateError;
use crate::id::Identifier;
use crate::io_type::StateObject;
use crate::restore::{ApplyContext, RestoreFlag};
use crate::retry::{run_passes, NotYetDeserializable, PassReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Flat id → state value map describing the whole application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDocument {
    entries: BTreeMap<Identifier, StateObject>,
}

impl StateDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: Identifier, state: StateObject) -> Option<StateObject> {
        self.entries.insert(id, state)
    }

    pub fn remove(&mut self, id: &Identifier) -> Option<StateObject> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &Identifier) -> Option<&StateObject> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.entries.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &StateObject)> {
        self.entries.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &Identifier> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl FromIterator<(Identifier, StateObject)> for StateDocument {
    fn from_iter<I: IntoIterator<Item = (Identifier, StateObject)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// One entry of a [`StateDelta`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StateEntry {
    Value(StateObject),
    /// The element existed in the baseline and is gone now.
    Deleted,
}

/// Difference between two state documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDelta {
    entries: BTreeMap<Identifier, StateEntry>,
}

impl StateDelta {
    /// Changed and added entries carry their new value; entries missing
    /// from `current` become deletion markers.
    pub fn between(baseline: &StateDocument, current: &StateDocument) -> Self {
        let mut entries = BTreeMap::new();
        for (id, state) in current.iter() {
            if baseline.get(id) != Some(state) {
                entries.insert(id.clone(), StateEntry::Value(state.clone()));
            }
        }
        for id in baseline.ids() {
            if !current.contains(id) {
                entries.insert(id.clone(), StateEntry::Deleted);
            }
        }
        Self { entries }
    }

    /// Rebuild the current document from the baseline.
    pub fn apply_to(&self, baseline: &StateDocument) -> StateDocument {
        let mut document = baseline.clone();
        for (id, entry) in &self.entries {
            match entry {
                StateEntry::Value(state) => {
                    document.insert(id.clone(), state.clone());
                }
                StateEntry::Deleted => {
                    document.remove(id);
                }
            }
        }
        document
    }

    pub fn get(&self, id: &Identifier) -> Option<&StateEntry> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &StateEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Captures and restores the state of every registered element.
pub struct StateEngine {
    registry: ElementRegistry,
    restore: RestoreFlag,
}

impl StateEngine {
    pub fn new(registry: ElementRegistry) -> Self {
        Self {
            registry,
            restore: RestoreFlag::new(),
        }
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    /// Containers whose members are restorable from state, including
    /// those nested inside dynamic elements.
    pub fn containers(&self) -> Vec<Arc<DynamicContainer>> {
        self.registry.containers()
    }

    pub fn is_restoring(&self) -> bool {
        self.restore.is_active()
    }

    /// Serialize every element that participates in state.
    ///
    /// Archetypes, stateless elements and types without a schema are
    /// skipped.
    pub fn get_state(&self) -> Result<StateDocument, StateError> {
        let mut document = StateDocument::new();
        for (id, element) in self.registry.elements() {
            let guard = element.read();
            if !participates_in_state(&*guard) {
                continue;
            }
            document.insert(id, guard.io_type().to_state_object(guard.core())?);
        }
        log::debug!("[engine] captured {} state entries", document.len());
        Ok(document)
    }

    /// Bring the application to `document`.
    ///
    /// Dynamic members a snapshot would capture but the document lacks are
    /// disposed, missing members present in it are recreated by their
    /// container, and every entry is applied. Entries that depend on
    /// not-yet-created elements (a reference target, or the dynamic parent
    /// owning a nested container) are retried in later passes. Container
    /// notifications are held back until the whole document is applied.
    pub fn set_state(&self, document: &StateDocument) -> Result<PassReport, StateError> {
        let _session = self.restore.begin()?;
        let ctx = ApplyContext::new(self.registry.clone(), true);

        let mut deferred = self.containers();
        for container in &deferred {
            container.defer_notifications(true);
        }
        let result = self.restore_document(document, &mut deferred, &ctx);
        for container in &deferred {
            container.defer_notifications(false);
        }

        match &result {
            Ok(report) => log::debug!(
                "[engine] restored {} entries in {} passes",
                report.applied,
                report.passes
            ),
            Err(err) => log::warn!("[engine] state restore failed: {}", err),
        }
        result
    }

    fn restore_document(
        &self,
        document: &StateDocument,
        deferred: &mut Vec<Arc<DynamicContainer>>,
        ctx: &ApplyContext,
    ) -> Result<PassReport, StateError> {
        // Parents come first; a container disposed with its parent is skipped.
        for container in deferred.iter() {
            if !self.registry.contains(container.id()) {
                continue;
            }
            for member in container.members() {
                let (member_id, captured) = {
                    let guard = member.read();
                    (guard.id().clone(), participates_in_state(&*guard))
                };
                if captured && !document.contains(&member_id) {
                    container.dispose(&member_id)?;
                }
            }
        }

        run_passes(document.iter(), |(id, state)| {
            self.restore_entry(id, state, deferred, ctx)
        })
    }

    fn restore_entry(
        &self,
        id: &Identifier,
        state: &StateObject,
        deferred: &mut Vec<Arc<DynamicContainer>>,
        ctx: &ApplyContext,
    ) -> Result<(), StateError> {
        let element = match self.registry.get(id) {
            Some(element) => element,
            None => match self.owning_container(id) {
                Some(container) => {
                    if !deferred.iter().any(|c| Arc::ptr_eq(c, &container)) {
                        container.defer_notifications(true);
                        deferred.push(Arc::clone(&container));
                    }
                    container.create_from_state(id.component_name(), state, ctx)?
                }
                None => return Err(NotYetDeserializable::new(id.clone()).into()),
            },
        };
        apply_to_element(&element, state, ctx)
    }

    /// The live container whose member slot `id` names. Looked up on every
    /// call: nested containers appear once their parent is recreated.
    fn owning_container(&self, id: &Identifier) -> Option<Arc<DynamicContainer>> {
        let container = self.registry.container(&id.parent()?)?;
        container.owns_child(id).then_some(container)
    }

    /// Invoke a method on a registered element.
    pub fn invoke(
        &self,
        id: &Identifier,
        method: &str,
        args: &[StateObject],
    ) -> Result<StateObject, StateError> {
        let element = self
            .registry
            .get(id)
            .ok_or_else(|| StateError::UnknownElement(id.clone()))?;
        let mut guard = element.write();
        let io_type = guard.io_type().clone();
        let read_only = guard.flags().read_only;
        log::debug!("[engine] invoke {}.{}", id, method);
        io_type.invoke(guard.core_mut(), method, args, read_only)
    }
}

fn apply_to_element(
    element: &ElementRef,
    state: &StateObject,
    ctx: &ApplyContext,
) -> Result<(), StateError> {
    let mut guard = element.write();
    let io_type = guard.io_type().clone();
    io_type.apply_state(guard.core_mut(), state, ctx)
}
