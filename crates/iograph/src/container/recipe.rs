// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Element recipes and the validation shared by every container kind.

use super::ContainerError;
use crate::element::{ElementFlags, ElementRef, ElementRegistry};
use crate::id::Identifier;
use crate::io_type::{IoType, StateObject};
use std::fmt;
use std::sync::Arc;

/// What a recipe receives when asked to build an element.
#[derive(Debug, Clone)]
pub struct ElementSeed {
    /// Id the new element must use.
    pub id: Identifier,
    /// Flags the new element must carry.
    pub flags: ElementFlags,
    /// Registry the element must be registered in before returning.
    pub registry: ElementRegistry,
}

/// Element factory.
pub type CreateFn =
    Arc<dyn Fn(&ElementSeed, &[StateObject]) -> Result<ElementRef, ContainerError> + Send + Sync>;

/// Arguments used to build the archetype.
#[derive(Clone)]
pub enum DefaultArgs {
    Literal(Vec<StateObject>),
    /// Computed lazily, once per archetype.
    Thunk(Arc<dyn Fn() -> Vec<StateObject> + Send + Sync>),
}

impl DefaultArgs {
    pub fn resolve(&self) -> Vec<StateObject> {
        match self {
            Self::Literal(args) => args.clone(),
            Self::Thunk(thunk) => thunk(),
        }
    }
}

impl fmt::Debug for DefaultArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(args) => f.debug_tuple("Literal").field(args).finish(),
            Self::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

/// Factory plus declared arity and archetype arguments.
#[derive(Clone)]
pub struct Recipe {
    arity: usize,
    create: CreateFn,
    defaults: DefaultArgs,
}

impl Recipe {
    /// Recipe taking `arity` arguments. Archetype arguments default to
    /// `arity` nulls.
    pub fn new<F>(arity: usize, create: F) -> Self
    where
        F: Fn(&ElementSeed, &[StateObject]) -> Result<ElementRef, ContainerError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            arity,
            create: Arc::new(create),
            defaults: DefaultArgs::Literal(vec![StateObject::Null; arity]),
        }
    }

    pub fn default_args(mut self, args: Vec<StateObject>) -> Self {
        self.defaults = DefaultArgs::Literal(args);
        self
    }

    pub fn default_args_with<F>(mut self, thunk: F) -> Self
    where
        F: Fn() -> Vec<StateObject> + Send + Sync + 'static,
    {
        self.defaults = DefaultArgs::Thunk(Arc::new(thunk));
        self
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn defaults(&self) -> &DefaultArgs {
        &self.defaults
    }

    pub fn check_arity(&self, args: &[StateObject]) -> Result<(), ContainerError> {
        if args.len() == self.arity {
            Ok(())
        } else {
            Err(ContainerError::Arity {
                expected: self.arity,
                actual: args.len(),
            })
        }
    }

    pub(crate) fn invoke(
        &self,
        seed: &ElementSeed,
        args: &[StateObject],
    ) -> Result<ElementRef, ContainerError> {
        self.check_arity(args)?;
        (self.create)(seed, args)
    }
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("arity", &self.arity)
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Checks every container applies to a freshly built member.
///
/// The element must use the expected id, be flagged dynamic and not
/// archetype, be the instance registered under its id, and be a valid
/// instance of the container's parameter type.
pub fn validate_dynamic_element(
    element: &ElementRef,
    expected_id: &Identifier,
    parameter_type: &IoType,
    registry: &ElementRegistry,
) -> Result<(), ContainerError> {
    {
        let guard = element.read();
        if guard.id() != expected_id {
            return Err(ContainerError::IdMismatch {
                expected: expected_id.clone(),
                actual: guard.id().clone(),
            });
        }
        let flags = guard.flags();
        if !flags.dynamic {
            return Err(ContainerError::NotDynamic(expected_id.clone()));
        }
        if flags.archetype {
            return Err(ContainerError::IsArchetype(expected_id.clone()));
        }
        if !guard.io_type().inherits_from(parameter_type) {
            return Err(ContainerError::WrongType {
                id: expected_id.clone(),
                expected: parameter_type.name().to_string(),
                actual: guard.io_type().name().to_string(),
            });
        }
        parameter_type
            .validate_instance(guard.core())
            .map_err(|e| ContainerError::State(Box::new(e.into())))?;
    }
    if !registry.is_registered(element) {
        return Err(ContainerError::NotRegistered(expected_id.clone()));
    }
    Ok(())
}
