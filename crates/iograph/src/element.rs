// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instrumented elements and the element registry.
//!
//! The host application owns its objects; this module only describes the
//! capabilities the engine needs from them ([`Instrumented`]) and provides a
//! shared id → element table.

use crate::api::{ApiMismatch, ApiValidator};
use crate::container::DynamicContainer;
use crate::id::{Identifier, ARCHETYPE};
use crate::io_type::IoType;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use thiserror::Error;

/// Per-element instrumentation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementFlags {
    /// Created at runtime by a container.
    pub dynamic: bool,
    /// Prototype instance built for the API description.
    pub archetype: bool,
    /// Participates in state snapshots.
    pub state: bool,
    pub read_only: bool,
    pub featured: bool,
}

impl Default for ElementFlags {
    fn default() -> Self {
        Self {
            dynamic: false,
            archetype: false,
            state: true,
            read_only: false,
            featured: false,
        }
    }
}

impl ElementFlags {
    /// Flags of a container member.
    pub fn dynamic() -> Self {
        Self {
            dynamic: true,
            ..Self::default()
        }
    }

    /// Flags of a container archetype. State capture skips archetypes by
    /// id, so `state` keeps its default.
    pub fn archetype() -> Self {
        Self {
            dynamic: true,
            archetype: true,
            ..Self::default()
        }
    }

    pub fn stateless() -> Self {
        Self {
            state: false,
            ..Self::default()
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_featured(mut self, featured: bool) -> Self {
        self.featured = featured;
        self
    }
}

/// Capabilities the engine needs from a host object.
pub trait Instrumented: Send + Sync {
    fn id(&self) -> &Identifier;

    fn io_type(&self) -> &IoType;

    fn flags(&self) -> ElementFlags;

    /// Per-element metadata overriding the type defaults.
    fn metadata_overrides(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }

    /// The value the IO type converts.
    fn core(&self) -> &dyn Any;

    fn core_mut(&mut self) -> &mut dyn Any;

    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

/// Shared handle to a registered element.
pub type ElementRef = Arc<RwLock<dyn Instrumented>>;

/// True for archetypes and every element built beneath one.
pub fn is_in_archetype(element: &dyn Instrumented) -> bool {
    element.flags().archetype || element.id().segments().any(|s| s == ARCHETYPE)
}

/// True when a state snapshot captures `element`: not an archetype, flagged
/// `state` and of a serializable type.
pub fn participates_in_state(element: &dyn Instrumented) -> bool {
    !is_in_archetype(element) && element.flags().state && element.io_type().is_serializable()
}

/// Effective metadata: type defaults, then flags, then overrides.
pub fn element_metadata(element: &dyn Instrumented) -> BTreeMap<String, Value> {
    let flags = element.flags();
    let mut metadata = element.io_type().resolved_metadata_defaults();
    metadata.insert("state".into(), json!(flags.state));
    metadata.insert("readOnly".into(), json!(flags.read_only));
    metadata.insert("featured".into(), json!(flags.featured));
    metadata.insert("dynamicElement".into(), json!(flags.dynamic));
    metadata.insert("archetype".into(), json!(is_in_archetype(element)));
    metadata.extend(element.metadata_overrides());
    metadata
}

/// Generic element wrapping a core value of type `T`.
pub struct Element<T> {
    id: Identifier,
    io_type: IoType,
    flags: ElementFlags,
    metadata: BTreeMap<String, Value>,
    value: T,
    disposed: bool,
}

impl<T: Any + Send + Sync> Element<T> {
    pub fn new(id: Identifier, io_type: IoType, value: T) -> Self {
        Self {
            id,
            io_type,
            flags: ElementFlags::default(),
            metadata: BTreeMap::new(),
            value,
            disposed: false,
        }
    }

    pub fn with_flags(mut self, flags: ElementFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_ref(self) -> ElementRef {
        Arc::new(RwLock::new(self))
    }
}

impl<T: Any + Send + Sync> Instrumented for Element<T> {
    fn id(&self) -> &Identifier {
        &self.id
    }

    fn io_type(&self) -> &IoType {
        &self.io_type
    }

    fn flags(&self) -> ElementFlags {
        self.flags
    }

    fn metadata_overrides(&self) -> BTreeMap<String, Value> {
        self.metadata.clone()
    }

    fn core(&self) -> &dyn Any {
        &self.value
    }

    fn core_mut(&mut self) -> &mut dyn Any {
        &mut self.value
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl<T> fmt::Debug for Element<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("io_type", &self.io_type)
            .field("flags", &self.flags)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl fmt::Debug for dyn Instrumented {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumented")
            .field("id", self.id())
            .field("io_type", self.io_type())
            .field("flags", &self.flags())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Read the core value of `element` as `T`.
pub fn with_core<T: Any, R>(element: &ElementRef, f: impl FnOnce(&T) -> R) -> Option<R> {
    let guard = element.read();
    guard.core().downcast_ref::<T>().map(f)
}

/// Mutate the core value of `element` as `T`.
pub fn with_core_mut<T: Any, R>(element: &ElementRef, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    let mut guard = element.write();
    guard.core_mut().downcast_mut::<T>().map(f)
}

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("an element is already registered as {0}")]
    Duplicate(Identifier),

    #[error(transparent)]
    Api(#[from] ApiMismatch),
}

#[derive(Default)]
struct RegistryInner {
    elements: BTreeMap<Identifier, ElementRef>,
    containers: BTreeMap<Identifier, Weak<DynamicContainer>>,
    validator: Option<ApiValidator>,
}

impl RegistryInner {
    fn detach(&mut self, id: &Identifier) -> DetachedSubtree {
        let in_subtree = |candidate: &Identifier| candidate == id || id.is_ancestor_of(candidate);
        let element_ids: Vec<Identifier> =
            self.elements.keys().filter(|c| in_subtree(*c)).cloned().collect();
        let container_ids: Vec<Identifier> =
            self.containers.keys().filter(|c| in_subtree(*c)).cloned().collect();
        DetachedSubtree {
            elements: element_ids
                .into_iter()
                .filter_map(|i| self.elements.remove(&i).map(|e| (i, e)))
                .collect(),
            containers: container_ids
                .into_iter()
                .filter_map(|i| self.containers.remove(&i).map(|c| (i, c)))
                .collect(),
        }
    }
}

/// Elements and containers taken out of the registry but not disposed.
pub(crate) struct DetachedSubtree {
    elements: Vec<(Identifier, ElementRef)>,
    containers: Vec<(Identifier, Weak<DynamicContainer>)>,
}

impl DetachedSubtree {
    /// Dispose every detached element, returning their ids.
    pub(crate) fn dispose(self) -> Vec<Identifier> {
        for (_, element) in &self.elements {
            element.write().dispose();
        }
        self.elements.into_iter().map(|(i, _)| i).collect()
    }
}

/// Shared id → element table. Clones share the same table.
#[derive(Clone, Default)]
pub struct ElementRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate newly registered elements against a reference API.
    pub fn set_api_validator(&self, validator: ApiValidator) {
        self.inner.write().validator = Some(validator);
    }

    pub fn take_api_validator(&self) -> Option<ApiValidator> {
        self.inner.write().validator.take()
    }

    /// Register an element under its id.
    pub fn register(&self, element: ElementRef) -> Result<ElementRef, RegistryError> {
        let id = element.read().id().clone();
        let mut inner = self.inner.write();
        if inner.elements.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        if let Some(validator) = inner.validator.as_mut() {
            validator.check(&*element.read())?;
        }
        inner.elements.insert(id.clone(), Arc::clone(&element));
        log::debug!("[registry] registered {}", id);
        Ok(element)
    }

    /// Wrap and register a typed element.
    pub fn instrument<T: Any + Send + Sync>(
        &self,
        element: Element<T>,
    ) -> Result<ElementRef, RegistryError> {
        self.register(element.into_ref())
    }

    pub fn unregister(&self, id: &Identifier) -> Option<ElementRef> {
        let removed = self.inner.write().elements.remove(id);
        if removed.is_some() {
            log::debug!("[registry] unregistered {}", id);
        }
        removed
    }

    /// Unregister and dispose `id` and every descendant. Containers living
    /// in the subtree are forgotten as well.
    pub fn dispose_subtree(&self, id: &Identifier) -> Vec<Identifier> {
        let detached = self.inner.write().detach(id);
        detached.dispose()
    }

    /// Take `id` and its descendants out of the table without disposing
    /// them.
    pub(crate) fn detach_subtree(&self, id: &Identifier) -> DetachedSubtree {
        self.inner.write().detach(id)
    }

    /// Put a detached subtree back. Entries registered meanwhile under the
    /// same ids are replaced.
    pub(crate) fn reattach(&self, detached: DetachedSubtree) {
        let mut inner = self.inner.write();
        inner.elements.extend(detached.elements);
        inner.containers.extend(detached.containers);
    }

    /// Make `container` discoverable by its id.
    pub(crate) fn register_container(&self, container: &Arc<DynamicContainer>) {
        self.inner
            .write()
            .containers
            .insert(container.id().clone(), Arc::downgrade(container));
    }

    /// The live container registered as `id`.
    pub fn container(&self, id: &Identifier) -> Option<Arc<DynamicContainer>> {
        self.inner.read().containers.get(id).and_then(Weak::upgrade)
    }

    /// Every live container, in id order (parents before nested ones).
    pub fn containers(&self) -> Vec<Arc<DynamicContainer>> {
        self.inner
            .read()
            .containers
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn get(&self, id: &Identifier) -> Option<ElementRef> {
        self.inner.read().elements.get(id).cloned()
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.inner.read().elements.contains_key(id)
    }

    /// True when exactly this element is registered under its id.
    pub fn is_registered(&self, element: &ElementRef) -> bool {
        let id = element.read().id().clone();
        self.inner
            .read()
            .elements
            .get(&id)
            .is_some_and(|registered| Arc::ptr_eq(registered, element))
    }

    pub fn ids(&self) -> Vec<Identifier> {
        self.inner.read().elements.keys().cloned().collect()
    }

    /// Direct children of `parent`.
    pub fn children_of(&self, parent: &Identifier) -> Vec<ElementRef> {
        self.inner
            .read()
            .elements
            .iter()
            .filter(|(id, _)| id.parent().as_ref() == Some(parent))
            .map(|(_, e)| Arc::clone(e))
            .collect()
    }

    /// Snapshot of every registered element, in id order.
    pub fn elements(&self) -> Vec<(Identifier, ElementRef)> {
        self.inner
            .read()
            .elements
            .iter()
            .map(|(id, e)| (id.clone(), Arc::clone(e)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().elements.is_empty()
    }
}

impl fmt::Debug for ElementRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRegistry")
            .field("elements", &self.len())
            .finish()
    }
}
