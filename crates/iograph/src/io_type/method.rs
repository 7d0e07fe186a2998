// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remotely invocable methods declared on IO types.

use super::{IoType, StateObject};
use crate::error::{StateError, ValidationError};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Method body: receives the element's core value and already-validated
/// arguments.
pub type MethodFn =
    Arc<dyn Fn(&mut dyn Any, &[StateObject]) -> Result<StateObject, StateError> + Send + Sync>;

/// Signature, documentation and implementation of one method.
#[derive(Clone)]
pub struct Method {
    return_type: IoType,
    parameter_types: Vec<IoType>,
    documentation: String,
    invocable_for_read_only: bool,
    implementation: MethodFn,
}

impl Method {
    pub fn new<F>(
        return_type: IoType,
        parameter_types: Vec<IoType>,
        documentation: impl Into<String>,
        implementation: F,
    ) -> Self
    where
        F: Fn(&mut dyn Any, &[StateObject]) -> Result<StateObject, StateError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            return_type,
            parameter_types,
            documentation: documentation.into(),
            invocable_for_read_only: false,
            implementation: Arc::new(implementation),
        }
    }

    /// Method over a concrete core type `T`.
    pub fn typed<T, F>(
        return_type: IoType,
        parameter_types: Vec<IoType>,
        documentation: impl Into<String>,
        implementation: F,
    ) -> Self
    where
        T: Any,
        F: Fn(&mut T, &[StateObject]) -> Result<StateObject, StateError> + Send + Sync + 'static,
    {
        Self::new(
            return_type,
            parameter_types,
            documentation,
            move |instance: &mut dyn Any, args: &[StateObject]| -> Result<StateObject, StateError> {
                let typed = instance.downcast_mut::<T>().ok_or_else(|| {
                    ValidationError::InvalidInstance {
                        type_name: "method receiver".to_string(),
                        expected: std::any::type_name::<T>().to_string(),
                    }
                })?;
                implementation(typed, args)
            },
        )
    }

    /// Allow calls on read-only elements (getters).
    pub fn invocable_for_read_only(mut self) -> Self {
        self.invocable_for_read_only = true;
        self
    }

    pub fn return_type(&self) -> &IoType {
        &self.return_type
    }

    pub fn parameter_types(&self) -> &[IoType] {
        &self.parameter_types
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn is_invocable_for_read_only(&self) -> bool {
        self.invocable_for_read_only
    }

    pub(crate) fn call(
        &self,
        instance: &mut dyn Any,
        args: &[StateObject],
    ) -> Result<StateObject, StateError> {
        (self.implementation)(instance, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.parameter_types.iter().map(IoType::name).collect();
        f.debug_struct("Method")
            .field("parameters", &params)
            .field("returns", &self.return_type.name())
            .field("invocable_for_read_only", &self.invocable_for_read_only)
            .finish()
    }
}
