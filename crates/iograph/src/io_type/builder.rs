// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder for IO type descriptors.

use super::{
    IoType, IoTypeError, IoTypeInner, Method, StateFunctions, StateObject, Validator,
};
use crate::builtins::object_io;
use crate::error::{StateError, ValidationError};
use crate::restore::ApplyContext;
use crate::schema::StateSchema;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A core type that knows how to serialize itself.
///
/// Implementing this trait lets [`IoType::from_core_type`] derive a complete
/// descriptor without hand-written conversion closures.
pub trait CoreState: Any + Send + Sync + Sized {
    fn state_schema() -> StateSchema;

    fn to_state_object(&self) -> Result<StateObject, StateError>;

    fn apply_state(&mut self, state: &StateObject, ctx: &ApplyContext) -> Result<(), StateError>;

    /// Constructor arguments for recreating a dynamic instance.
    fn state_to_args(_state: &StateObject, _ctx: &ApplyContext) -> Result<Vec<StateObject>, StateError> {
        Ok(Vec::new())
    }
}

impl IoType {
    /// Descriptor for a [`CoreState`] type.
    pub fn from_core_type<T: CoreState>(
        name: impl Into<String>,
        documentation: impl Into<String>,
    ) -> Result<IoType, IoTypeError> {
        IoTypeBuilder::new(name)
            .documentation(documentation)
            .value_type::<T>()
            .state_schema(T::state_schema())
            .to_state::<T, _>(T::to_state_object)
            .apply_state::<T, _>(T::apply_state)
            .state_to_args(T::state_to_args)
            .build()
    }
}

/// Builder for [`IoType`] descriptors.
pub struct IoTypeBuilder {
    name: String,
    supertype: Option<IoType>,
    documentation: String,
    validator: Option<Validator>,
    state_schema: Option<StateSchema>,
    functions: StateFunctions,
    parameter_types: Vec<IoType>,
    methods: BTreeMap<String, Method>,
    method_order: Vec<String>,
    events: Vec<String>,
    metadata_defaults: BTreeMap<String, Value>,
}

impl IoTypeBuilder {
    /// New descriptor deriving from `ObjectIO`.
    pub fn new(name: impl Into<String>) -> Self {
        let mut builder = Self::root(name);
        builder.supertype = Some(object_io());
        builder
    }

    /// New root descriptor (no supertype). Roots must supply all four state
    /// functions.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertype: None,
            documentation: String::new(),
            validator: None,
            state_schema: None,
            functions: StateFunctions::default(),
            parameter_types: Vec::new(),
            methods: BTreeMap::new(),
            method_order: Vec::new(),
            events: Vec::new(),
            metadata_defaults: BTreeMap::new(),
        }
    }

    pub fn supertype(mut self, supertype: &IoType) -> Self {
        self.supertype = Some(supertype.clone());
        self
    }

    pub fn documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = documentation.into();
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Instances must be exactly `T`.
    pub fn value_type<T: Any>(self) -> Self {
        self.validator(Validator::value_type::<T>())
    }

    pub fn state_schema(mut self, schema: StateSchema) -> Self {
        self.state_schema = Some(schema);
        self
    }

    pub fn parameter_types(mut self, parameters: Vec<IoType>) -> Self {
        self.parameter_types = parameters;
        self
    }

    pub fn method(mut self, name: impl Into<String>, method: Method) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    pub fn method_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.method_order = order.into_iter().map(Into::into).collect();
        self
    }

    pub fn events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events.extend(events.into_iter().map(Into::into));
        self
    }

    pub fn metadata_default(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata_defaults.insert(key.into(), value);
        self
    }

    /// Untyped instance → state conversion.
    pub fn to_state_any<F>(mut self, convert: F) -> Self
    where
        F: Fn(&dyn Any) -> Result<StateObject, StateError> + Send + Sync + 'static,
    {
        self.functions.to_state = Some(Arc::new(convert));
        self
    }

    /// Instance → state conversion over a concrete `T`.
    pub fn to_state<T, F>(self, convert: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Result<StateObject, StateError> + Send + Sync + 'static,
    {
        let type_name = self.name.clone();
        self.to_state_any(move |instance: &dyn Any| -> Result<StateObject, StateError> {
            let typed = downcast_ref::<T>(&type_name, instance)?;
            convert(typed)
        })
    }

    /// State → new `T`.
    pub fn from_state<T, F>(mut self, convert: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&StateObject, &ApplyContext) -> Result<T, StateError> + Send + Sync + 'static,
    {
        self.functions.from_state = Some(Arc::new(
            move |state: &StateObject,
                  ctx: &ApplyContext|
                  -> Result<Box<dyn Any + Send + Sync>, StateError> {
                let value = convert(state, ctx)?;
                Ok(Box::new(value))
            },
        ));
        self
    }

    /// Untyped state → instance conversion.
    pub fn from_state_any<F>(mut self, convert: F) -> Self
    where
        F: Fn(&StateObject, &ApplyContext) -> Result<Box<dyn Any + Send + Sync>, StateError>
            + Send
            + Sync
            + 'static,
    {
        self.functions.from_state = Some(Arc::new(convert));
        self
    }

    pub fn state_to_args<F>(mut self, derive: F) -> Self
    where
        F: Fn(&StateObject, &ApplyContext) -> Result<Vec<StateObject>, StateError>
            + Send
            + Sync
            + 'static,
    {
        self.functions.state_to_args = Some(Arc::new(derive));
        self
    }

    /// Untyped in-place state application.
    pub fn apply_state_any<F>(mut self, apply: F) -> Self
    where
        F: Fn(&mut dyn Any, &StateObject, &ApplyContext) -> Result<(), StateError>
            + Send
            + Sync
            + 'static,
    {
        self.functions.apply_state = Some(Arc::new(apply));
        self
    }

    /// In-place state application over a concrete `T`.
    pub fn apply_state<T, F>(self, apply: F) -> Self
    where
        T: Any,
        F: Fn(&mut T, &StateObject, &ApplyContext) -> Result<(), StateError>
            + Send
            + Sync
            + 'static,
    {
        let type_name = self.name.clone();
        self.apply_state_any(
            move |instance: &mut dyn Any,
                  state: &StateObject,
                  ctx: &ApplyContext|
                  -> Result<(), StateError> {
                let typed = instance.downcast_mut::<T>().ok_or_else(|| {
                    ValidationError::InvalidInstance {
                        type_name: type_name.clone(),
                        expected: std::any::type_name::<T>().to_string(),
                    }
                })?;
                apply(typed, state, ctx)
            },
        )
    }

    /// Validate the declaration and freeze it.
    pub fn build(self) -> Result<IoType, IoTypeError> {
        check_name(&self.name)?;
        let validator = self
            .validator
            .clone()
            .ok_or_else(|| IoTypeError::MissingValidator {
                name: self.name.clone(),
            })?;

        for (method_name, method) in &self.methods {
            if method.documentation().trim().is_empty() {
                return Err(IoTypeError::MethodDocumentation {
                    type_name: self.name.clone(),
                    method: method_name.clone(),
                });
            }
        }
        for method_name in &self.method_order {
            if !self.methods.contains_key(method_name) {
                return Err(IoTypeError::UnknownMethodInOrder {
                    type_name: self.name.clone(),
                    method: method_name.clone(),
                });
            }
        }

        match &self.supertype {
            Some(supertype) => self.check_against_ancestors(supertype)?,
            None => self.check_root_functions()?,
        }

        log::debug!(
            "[io_type] built {} (supertype: {})",
            self.name,
            self.supertype.as_ref().map_or("-", IoType::name)
        );

        Ok(IoType::from_inner(IoTypeInner {
            name: self.name,
            supertype: self.supertype,
            documentation: self.documentation,
            validator,
            state_schema: self.state_schema,
            functions: self.functions,
            parameter_types: self.parameter_types,
            methods: self.methods,
            method_order: self.method_order,
            events: self.events,
            metadata_defaults: self.metadata_defaults,
        }))
    }

    fn check_against_ancestors(&self, supertype: &IoType) -> Result<(), IoTypeError> {
        for ancestor in supertype.chain() {
            if let Some(event) = self
                .events
                .iter()
                .find(|e| ancestor.declared_events().contains(*e))
            {
                return Err(IoTypeError::DuplicateEvent {
                    type_name: self.name.clone(),
                    event: event.clone(),
                    ancestor: ancestor.name().to_string(),
                });
            }
            if let Some(key) = self
                .metadata_defaults
                .keys()
                .find(|k| ancestor.declared_metadata_defaults().contains_key(*k))
            {
                return Err(IoTypeError::DuplicateMetadataKey {
                    type_name: self.name.clone(),
                    key: key.clone(),
                    ancestor: ancestor.name().to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_root_functions(&self) -> Result<(), IoTypeError> {
        let missing = if self.functions.to_state.is_none() {
            Some("to_state")
        } else if self.functions.from_state.is_none() {
            Some("from_state")
        } else if self.functions.state_to_args.is_none() {
            Some("state_to_args")
        } else if self.functions.apply_state.is_none() {
            Some("apply_state")
        } else {
            None
        };
        match missing {
            Some(function) => Err(IoTypeError::RootMissingStateFunction {
                type_name: self.name.clone(),
                function,
            }),
            None => Ok(()),
        }
    }
}

/// Names end in `IO`, ignoring a parametric `<...>` or `(...)` suffix.
fn check_name(name: &str) -> Result<(), IoTypeError> {
    let base = match name.find(['<', '(']) {
        Some(idx) => &name[..idx],
        None => name,
    };
    if base.ends_with("IO") {
        Ok(())
    } else {
        Err(IoTypeError::InvalidName {
            name: name.to_string(),
        })
    }
}

pub(crate) fn downcast_ref<'a, T: Any>(
    type_name: &str,
    instance: &'a dyn Any,
) -> Result<&'a T, ValidationError> {
    instance
        .downcast_ref::<T>()
        .ok_or_else(|| ValidationError::InvalidInstance {
            type_name: type_name.to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
}
