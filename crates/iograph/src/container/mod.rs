// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic element containers.
//!
//! A container owns elements created at runtime from a [`Recipe`]:
//!
//! - **Group**: any number of members named `<element>_<N>`, where `N` comes
//!   from a counter that only ever grows.
//! - **Capsule**: at most one member named `<element>`; creating again
//!   replaces the current member.
//! - **Singleton**: at most one member named `<element>`; creating again is
//!   rejected while occupied.
//!
//! In API generate/validate mode each container also builds an archetype
//! (`<container>.archetype`) from its default arguments before the
//! application starts.
//!
//! Every container registers itself in its [`ElementRegistry`], so
//! containers built by a recipe (nested inside a dynamic element) are found
//! by id during state restore and forgotten when their parent is disposed.

mod recipe;


pub use recipe::{validate_dynamic_element, CreateFn, DefaultArgs, ElementSeed, Recipe};

use crate::builtins::container_io;
use crate::config::Environment;
use crate::element::{
    participates_in_state, Element, ElementFlags, ElementRef, ElementRegistry, RegistryError,
};
use crate::error::StateError;
use crate::id::{group_element_index, group_element_name, IdError, Identifier, ARCHETYPE};
use crate::io_type::{IoType, StateObject};
use crate::restore::ApplyContext;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Container flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Group,
    Capsule,
    Singleton,
}

impl ContainerKind {
    /// Suffix the container's own id segment carries by convention.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Group => "Group",
            Self::Capsule => "Capsule",
            Self::Singleton => "Singleton",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Container errors.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("recipe expects {expected} argument(s), got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("container id {id} must end with '{suffix}' or set an explicit element name")]
    Naming { id: Identifier, suffix: &'static str },

    #[error("created element {actual} does not use the assigned id {expected}")]
    IdMismatch {
        expected: Identifier,
        actual: Identifier,
    },

    #[error("created element {0} is not flagged dynamic")]
    NotDynamic(Identifier),

    #[error("created element {0} is flagged as an archetype")]
    IsArchetype(Identifier),

    #[error("archetype {0} is not flagged as an archetype")]
    ArchetypeNotFlagged(Identifier),

    #[error("created element {0} is not registered under its id")]
    NotRegistered(Identifier),

    #[error("created element {id} is a {actual}, expected {expected}")]
    WrongType {
        id: Identifier,
        expected: String,
        actual: String,
    },

    #[error("{0} already holds an element")]
    Occupied(Identifier),

    #[error("member index {index} of {container} is in use")]
    IndexInUse { container: Identifier, index: u64 },

    #[error("{id} is not a member of {container}")]
    NotAMember {
        container: Identifier,
        id: Identifier,
    },

    #[error("{0} cannot be created by this operation")]
    UnexpectedChild(Identifier),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    State(Box<StateError>),
}

impl From<StateError> for ContainerError {
    fn from(err: StateError) -> Self {
        Self::State(Box::new(err))
    }
}

/// Lifecycle notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerEvent {
    /// A member was created; `state` is its serialized state when it
    /// participates in state.
    Created {
        id: Identifier,
        state: Option<StateObject>,
    },
    Disposed {
        id: Identifier,
    },
}

/// Event callback.
pub type Listener = Arc<dyn Fn(&ContainerEvent) + Send + Sync>;

struct Members {
    live: Vec<ElementRef>,
    next_index: u64,
    deferred: bool,
    pending: Vec<ContainerEvent>,
}

/// Group, Capsule or Singleton container.
pub struct DynamicContainer {
    kind: ContainerKind,
    id: Identifier,
    element_name: String,
    parameter_type: IoType,
    recipe: Recipe,
    registry: ElementRegistry,
    archetype: Option<ElementRef>,
    members: Mutex<Members>,
    listeners: RwLock<Vec<Listener>>,
}

impl DynamicContainer {
    /// Create a container, register its own element and make it
    /// discoverable through the registry.
    ///
    /// The element name is the container's last id segment with the kind
    /// suffix stripped (`batteryGroup` → `battery`), unless `element_name`
    /// is given.
    pub fn new(
        kind: ContainerKind,
        id: Identifier,
        parameter_type: IoType,
        recipe: Recipe,
        element_name: Option<&str>,
        env: &Environment,
        registry: ElementRegistry,
    ) -> Result<Arc<Self>, ContainerError> {
        let element_name = match element_name {
            Some(name) => name.to_string(),
            None => {
                let segment = id.component_name();
                match segment.strip_suffix(kind.suffix()) {
                    Some(stem) if !stem.is_empty() => stem.to_string(),
                    _ => {
                        return Err(ContainerError::Naming {
                            id: id.clone(),
                            suffix: kind.suffix(),
                        })
                    }
                }
            }
        };

        registry.instrument(
            Element::new(id.clone(), container_io(kind, &parameter_type), kind)
                .with_flags(ElementFlags::stateless()),
        )?;

        let archetype = if env.should_create_archetypes() {
            Some(build_archetype(&id, &recipe, &registry)?)
        } else {
            None
        };

        log::debug!(
            "[container] {} {} ready (element name '{}', archetype: {})",
            kind,
            id,
            element_name,
            archetype.is_some()
        );

        let container = Arc::new(Self {
            kind,
            id,
            element_name,
            parameter_type,
            recipe,
            registry,
            archetype,
            members: Mutex::new(Members {
                live: Vec::new(),
                next_index: 0,
                deferred: false,
                pending: Vec::new(),
            }),
            listeners: RwLock::new(Vec::new()),
        });
        container.registry.register_container(&container);
        Ok(container)
    }

    pub fn group(
        id: Identifier,
        parameter_type: IoType,
        recipe: Recipe,
        env: &Environment,
        registry: ElementRegistry,
    ) -> Result<Arc<Self>, ContainerError> {
        Self::new(ContainerKind::Group, id, parameter_type, recipe, None, env, registry)
    }

    pub fn capsule(
        id: Identifier,
        parameter_type: IoType,
        recipe: Recipe,
        env: &Environment,
        registry: ElementRegistry,
    ) -> Result<Arc<Self>, ContainerError> {
        Self::new(ContainerKind::Capsule, id, parameter_type, recipe, None, env, registry)
    }

    pub fn singleton(
        id: Identifier,
        parameter_type: IoType,
        recipe: Recipe,
        env: &Environment,
        registry: ElementRegistry,
    ) -> Result<Arc<Self>, ContainerError> {
        Self::new(ContainerKind::Singleton, id, parameter_type, recipe, None, env, registry)
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    pub fn parameter_type(&self) -> &IoType {
        &self.parameter_type
    }

    pub fn archetype(&self) -> Option<&ElementRef> {
        self.archetype.as_ref()
    }

    /// Next group ordinal.
    pub fn next_index(&self) -> u64 {
        self.members.lock().next_index
    }

    pub fn count(&self) -> usize {
        self.members.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Live members in creation order.
    pub fn members(&self) -> Vec<ElementRef> {
        self.members.lock().live.clone()
    }

    pub fn member_ids(&self) -> Vec<Identifier> {
        self.members
            .lock()
            .live
            .iter()
            .map(|e| e.read().id().clone())
            .collect()
    }

    pub fn get(&self, id: &Identifier) -> Option<ElementRef> {
        self.members
            .lock()
            .live
            .iter()
            .find(|e| e.read().id() == id)
            .cloned()
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.get(id).is_some()
    }

    /// The Capsule/Singleton member, if any.
    pub fn current(&self) -> Option<ElementRef> {
        self.members.lock().live.first().cloned()
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&ContainerEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Queue notifications while `true`; turning it off flushes the queue
    /// in order.
    pub fn defer_notifications(&self, defer: bool) {
        let flushed = {
            let mut members = self.members.lock();
            members.deferred = defer;
            if defer {
                Vec::new()
            } else {
                std::mem::take(&mut members.pending)
            }
        };
        for event in flushed {
            let event = self.refreshed(event);
            self.notify(&event);
        }
    }

    /// Created events queued during a restore carry the state the member
    /// had at creation; report the state it ended up with instead.
    fn refreshed(&self, event: ContainerEvent) -> ContainerEvent {
        match event {
            ContainerEvent::Created { id, state } => {
                let state = match self.get(&id) {
                    Some(element) => member_state(&element).ok().flatten().or(state),
                    None => state,
                };
                ContainerEvent::Created { id, state }
            }
            other => other,
        }
    }

    /// True when `id` names a member slot of this container (live or not).
    pub fn owns_child(&self, id: &Identifier) -> bool {
        if id.parent().as_ref() != Some(&self.id) {
            return false;
        }
        let component = id.component_name();
        match self.kind {
            ContainerKind::Group => self.parse_member_index(component).is_some(),
            ContainerKind::Capsule | ContainerKind::Singleton => component == self.element_name,
        }
    }

    fn parse_member_index(&self, component: &str) -> Option<u64> {
        let index = group_element_index(component)?;
        (group_element_name(&self.element_name, index) == component).then_some(index)
    }

    /// Create a member from `args`.
    pub fn create(&self, args: &[StateObject]) -> Result<ElementRef, ContainerError> {
        self.recipe.check_arity(args)?;
        match self.kind {
            ContainerKind::Group => {
                let index = self.members.lock().next_index;
                self.create_indexed(index, args)
            }
            ContainerKind::Capsule => match self.current() {
                Some(current) => self.replace(&current, args),
                None => self.create_fixed(args),
            },
            ContainerKind::Singleton => {
                if self.current().is_some() {
                    return Err(ContainerError::Occupied(self.id.clone()));
                }
                self.create_fixed(args)
            }
        }
    }

    /// Capsule/Singleton: the current member, creating it when empty.
    pub fn get_or_create(&self, args: &[StateObject]) -> Result<ElementRef, ContainerError> {
        match self.current() {
            Some(current) if self.kind != ContainerKind::Group => Ok(current),
            _ => self.create(args),
        }
    }

    /// Group: create the member with ordinal `index`.
    ///
    /// The counter is raised to `index + 1` so later [`create`](Self::create)
    /// calls never reuse an ordinal.
    pub fn create_indexed(
        &self,
        index: u64,
        args: &[StateObject],
    ) -> Result<ElementRef, ContainerError> {
        self.recipe.check_arity(args)?;
        let id = self
            .id
            .child(&group_element_name(&self.element_name, index))?;
        {
            let mut members = self.members.lock();
            if members.live.iter().any(|e| e.read().id() == &id) {
                return Err(ContainerError::IndexInUse {
                    container: self.id.clone(),
                    index,
                });
            }
            members.next_index = members.next_index.max(index + 1);
        }
        self.build_member(id, args)
    }

    fn create_fixed(&self, args: &[StateObject]) -> Result<ElementRef, ContainerError> {
        let id = self.id.child(&self.element_name)?;
        self.build_member(id, args)
    }

    /// Capsule: build the replacement while the current member's subtree is
    /// detached from the registry. A failed build puts it back untouched and
    /// emits nothing.
    fn replace(
        &self,
        current: &ElementRef,
        args: &[StateObject],
    ) -> Result<ElementRef, ContainerError> {
        let id = self.id.child(&self.element_name)?;
        let detached = self.registry.detach_subtree(&id);
        let (element, state) = match self.build_validated(&id, args) {
            Ok(built) => built,
            Err(err) => {
                self.registry.reattach(detached);
                log::debug!("[container] {} kept {}: {}", self.id, id, err);
                return Err(err);
            }
        };

        self.members
            .lock()
            .live
            .retain(|member| !Arc::ptr_eq(member, current));
        detached.dispose();
        log::debug!("[container] {} replaced {}", self.id, id);
        self.emit(ContainerEvent::Disposed { id: id.clone() });
        self.admit(id, Arc::clone(&element), state);
        Ok(element)
    }

    fn build_member(
        &self,
        id: Identifier,
        args: &[StateObject],
    ) -> Result<ElementRef, ContainerError> {
        let (element, state) = self.build_validated(&id, args)?;
        self.admit(id, Arc::clone(&element), state);
        Ok(element)
    }

    /// Runs the recipe without holding any container lock; the recipe may
    /// build nested containers or look at this one. Anything a failed build
    /// registered under `id` is disposed.
    fn build_validated(
        &self,
        id: &Identifier,
        args: &[StateObject],
    ) -> Result<(ElementRef, Option<StateObject>), ContainerError> {
        let seed = ElementSeed {
            id: id.clone(),
            flags: ElementFlags::dynamic(),
            registry: self.registry.clone(),
        };
        let occupied = self.registry.contains(id);
        let element = match self.recipe.invoke(&seed, args) {
            Ok(element) => element,
            Err(err) => {
                if !occupied {
                    self.registry.dispose_subtree(id);
                }
                return Err(err);
            }
        };
        let checked = validate_dynamic_element(&element, id, &self.parameter_type, &self.registry)
            .and_then(|()| member_state(&element).map_err(ContainerError::from));
        match checked {
            Ok(state) => Ok((element, state)),
            Err(err) => {
                if self.registry.is_registered(&element) {
                    self.registry.dispose_subtree(id);
                }
                Err(err)
            }
        }
    }

    fn admit(&self, id: Identifier, element: ElementRef, state: Option<StateObject>) {
        self.members.lock().live.push(element);
        log::debug!("[container] created {}", id);
        self.emit(ContainerEvent::Created { id, state });
    }

    /// Dispose one member and everything registered beneath it.
    pub fn dispose(&self, id: &Identifier) -> Result<(), ContainerError> {
        {
            let mut members = self.members.lock();
            let position = members
                .live
                .iter()
                .position(|e| e.read().id() == id)
                .ok_or_else(|| ContainerError::NotAMember {
                    container: self.id.clone(),
                    id: id.clone(),
                })?;
            members.live.remove(position);
        }
        self.registry.dispose_subtree(id);
        log::debug!("[container] disposed {}", id);
        self.emit(ContainerEvent::Disposed { id: id.clone() });
        Ok(())
    }

    /// Dispose every member, oldest first.
    pub fn clear(&self) -> Result<(), ContainerError> {
        for id in self.member_ids() {
            self.dispose(&id)?;
        }
        Ok(())
    }

    /// Recreate the member `component` from its serialized state.
    ///
    /// Constructor arguments come from the parameter type's
    /// `state_to_args`; a missing dependency surfaces as the deferrable
    /// error so the restore pass can retry.
    pub fn create_from_state(
        &self,
        component: &str,
        state: &StateObject,
        ctx: &ApplyContext,
    ) -> Result<ElementRef, StateError> {
        let child = self.id.child(component).map_err(ContainerError::from)?;
        let args = self.parameter_type.state_to_args(state, ctx)?;
        let element = match self.kind {
            ContainerKind::Group => {
                let index = self
                    .parse_member_index(component)
                    .ok_or(ContainerError::UnexpectedChild(child))?;
                self.create_indexed(index, &args)?
            }
            ContainerKind::Capsule | ContainerKind::Singleton => {
                if component != self.element_name {
                    return Err(ContainerError::UnexpectedChild(child).into());
                }
                self.create(&args)?
            }
        };
        Ok(element)
    }

    fn emit(&self, event: ContainerEvent) {
        {
            let mut members = self.members.lock();
            if members.deferred {
                members.pending.push(event);
                return;
            }
        }
        self.notify(&event);
    }

    fn notify(&self, event: &ContainerEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for DynamicContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicContainer")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("element_name", &self.element_name)
            .field("parameter_type", &self.parameter_type)
            .field("members", &self.count())
            .finish()
    }
}

fn member_state(element: &ElementRef) -> Result<Option<StateObject>, StateError> {
    let guard = element.read();
    if participates_in_state(&*guard) {
        Ok(Some(guard.io_type().to_state_object(guard.core())?))
    } else {
        Ok(None)
    }
}

fn build_archetype(
    container_id: &Identifier,
    recipe: &Recipe,
    registry: &ElementRegistry,
) -> Result<ElementRef, ContainerError> {
    let id = container_id.child(ARCHETYPE)?;
    let args = recipe.defaults().resolve();
    let seed = ElementSeed {
        id: id.clone(),
        flags: ElementFlags::archetype(),
        registry: registry.clone(),
    };
    let element = recipe.invoke(&seed, &args)?;
    {
        let guard = element.read();
        if guard.id() != &id {
            return Err(ContainerError::IdMismatch {
                expected: id,
                actual: guard.id().clone(),
            });
        }
        if !guard.flags().archetype {
            return Err(ContainerError::ArchetypeNotFlagged(id));
        }
    }
    if !registry.is_registered(&element) {
        return Err(ContainerError::NotRegistered(id));
    }
    log::debug!("[container] built archetype {}", id);
    Ok(element)
}
