// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! IO type descriptors.
//!
//! An [`IoType`] describes how a live value is validated, converted to a
//! plain-data state object and reconstructed from one. Descriptors form a
//! single-inheritance chain rooted at `ObjectIO`; state functions and method
//! lookups resolve up that chain, while state validation combines the
//! schemas of every level.
//!
//! # Example
//!
//! ```
//! use iograph::builtins::number_io;
//! use iograph::io_type::IoType;
//! use iograph::schema::StateSchema;
//! use serde_json::json;
//!
//! #[derive(Debug)]
//! struct Battery {
//!     voltage: f64,
//! }
//!
//! let battery_io = IoType::builder("BatteryIO")
//!     .value_type::<Battery>()
//!     .state_schema(StateSchema::composite([("voltage", number_io())]))
//!     .to_state::<Battery, _>(|b| Ok(json!({ "voltage": b.voltage })))
//!     .apply_state::<Battery, _>(|b, state, _ctx| {
//!         b.voltage = state["voltage"].as_f64().unwrap_or_default();
//!         Ok(())
//!     })
//!     .build()
//!     .unwrap();
//!
//! let state = battery_io.to_state_object(&Battery { voltage: 9.0 }).unwrap();
//! assert_eq!(state, json!({ "voltage": 9.0 }));
//! ```

mod builder;
mod method;
mod registry;
mod validator;

#[cfg(test)]
mod tests;

pub use builder::{CoreState, IoTypeBuilder};
pub use method::{Method, MethodFn};
pub use registry::TypeRegistry;
pub use validator::{InstancePredicate, Validator};

use crate::error::{StateError, ValidationError};
use crate::restore::ApplyContext;
use crate::schema::{KeyClaims, StateSchema};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// Plain-data state value.
pub type StateObject = Value;

/// Instance → state conversion.
pub type ToStateFn = Arc<dyn Fn(&dyn Any) -> Result<StateObject, StateError> + Send + Sync>;
/// State → new instance.
pub type FromStateFn = Arc<
    dyn Fn(&StateObject, &ApplyContext) -> Result<Box<dyn Any + Send + Sync>, StateError>
        + Send
        + Sync,
>;
/// State → constructor arguments for a dynamic element recipe.
pub type StateToArgsFn =
    Arc<dyn Fn(&StateObject, &ApplyContext) -> Result<Vec<StateObject>, StateError> + Send + Sync>;
/// State applied in place to an existing instance.
pub type ApplyStateFn =
    Arc<dyn Fn(&mut dyn Any, &StateObject, &ApplyContext) -> Result<(), StateError> + Send + Sync>;

/// Descriptor construction errors. Fatal: they indicate a programming error
/// in the type declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoTypeError {
    #[error("{name}: a validator (value type or predicate) is required")]
    MissingValidator { name: String },

    #[error("IO type name {name:?} must end with \"IO\"")]
    InvalidName { name: String },

    #[error("{type_name}.{method}: documentation is required")]
    MethodDocumentation { type_name: String, method: String },

    #[error("{type_name}: method_order names undeclared method '{method}'")]
    UnknownMethodInOrder { type_name: String, method: String },

    #[error("{type_name}: event '{event}' is already declared by {ancestor}")]
    DuplicateEvent {
        type_name: String,
        event: String,
        ancestor: String,
    },

    #[error("{type_name}: metadata key '{key}' is already declared by {ancestor}")]
    DuplicateMetadataKey {
        type_name: String,
        key: String,
        ancestor: String,
    },

    #[error("root type {type_name} must define {function}")]
    RootMissingStateFunction {
        type_name: String,
        function: &'static str,
    },

    #[error("two distinct IO types are named {name}")]
    DuplicateName { name: String },

    #[error("more than one root IO type: {first} and {second}")]
    MultipleRoots { first: String, second: String },
}

/// The four state functions a level may supply. Missing entries are
/// inherited from the supertype.
#[derive(Clone, Default)]
pub(crate) struct StateFunctions {
    pub(crate) to_state: Option<ToStateFn>,
    pub(crate) from_state: Option<FromStateFn>,
    pub(crate) state_to_args: Option<StateToArgsFn>,
    pub(crate) apply_state: Option<ApplyStateFn>,
}

pub(crate) struct IoTypeInner {
    pub(crate) name: String,
    pub(crate) supertype: Option<IoType>,
    pub(crate) documentation: String,
    pub(crate) validator: Validator,
    pub(crate) state_schema: Option<StateSchema>,
    pub(crate) functions: StateFunctions,
    pub(crate) parameter_types: Vec<IoType>,
    pub(crate) methods: BTreeMap<String, Method>,
    pub(crate) method_order: Vec<String>,
    pub(crate) events: Vec<String>,
    pub(crate) metadata_defaults: BTreeMap<String, Value>,
}

/// Identity tag of a descriptor, usable as a cache key component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IoTypeId(usize);

/// Shared handle to an immutable IO type descriptor.
///
/// Equality and hashing are by identity: two descriptors with the same name
/// built separately are different types.
#[derive(Clone)]
pub struct IoType(Arc<IoTypeInner>);

impl IoType {
    /// Start a descriptor deriving from `ObjectIO`.
    pub fn builder(name: impl Into<String>) -> IoTypeBuilder {
        IoTypeBuilder::new(name)
    }

    pub(crate) fn from_inner(inner: IoTypeInner) -> Self {
        Self(Arc::new(inner))
    }

    pub fn id(&self) -> IoTypeId {
        IoTypeId(Arc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn documentation(&self) -> &str {
        &self.0.documentation
    }

    pub fn supertype(&self) -> Option<&IoType> {
        self.0.supertype.as_ref()
    }

    pub fn validator(&self) -> &Validator {
        &self.0.validator
    }

    /// This level's own schema (not the combined chain).
    pub fn state_schema(&self) -> Option<&StateSchema> {
        self.0.state_schema.as_ref()
    }

    pub fn parameter_types(&self) -> &[IoType] {
        &self.0.parameter_types
    }

    /// Methods declared on this level only.
    pub fn declared_methods(&self) -> &BTreeMap<String, Method> {
        &self.0.methods
    }

    pub fn method_order(&self) -> &[String] {
        &self.0.method_order
    }

    /// Events declared on this level only.
    pub fn declared_events(&self) -> &[String] {
        &self.0.events
    }

    /// Metadata defaults declared on this level only.
    pub fn declared_metadata_defaults(&self) -> &BTreeMap<String, Value> {
        &self.0.metadata_defaults
    }

    pub fn is_root(&self) -> bool {
        self.0.supertype.is_none()
    }

    /// This type followed by every ancestor, nearest first.
    pub fn chain(&self) -> impl Iterator<Item = &IoType> {
        std::iter::successors(Some(self), |t| t.supertype())
    }

    /// Every ancestor, nearest first.
    pub fn supertypes(&self) -> Vec<IoType> {
        self.chain().skip(1).cloned().collect()
    }

    /// True when `other` is this type or one of its ancestors.
    pub fn inherits_from(&self, other: &IoType) -> bool {
        self.chain().any(|t| t == other)
    }

    /// Some level of the chain declares a state schema.
    pub fn is_serializable(&self) -> bool {
        self.chain().any(|t| t.0.state_schema.is_some())
    }

    /// A level of the chain can reconstruct instances from state.
    pub fn is_deserializable(&self) -> bool {
        self.chain()
            .take_while(|t| !t.is_root())
            .any(|t| t.0.functions.from_state.is_some() || t.0.functions.apply_state.is_some())
    }

    /// Events of the whole chain, root first.
    pub fn events(&self) -> Vec<String> {
        let mut levels: Vec<&IoType> = self.chain().collect();
        levels.reverse();
        levels
            .into_iter()
            .flat_map(|t| t.0.events.iter().cloned())
            .collect()
    }

    /// Metadata defaults merged root first, so subtypes see inherited keys.
    pub fn resolved_metadata_defaults(&self) -> BTreeMap<String, Value> {
        let mut levels: Vec<&IoType> = self.chain().collect();
        levels.reverse();
        let mut merged = BTreeMap::new();
        for level in levels {
            for (key, value) in &level.0.metadata_defaults {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Look a method up on this type, then on its ancestors.
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.chain().find_map(|t| t.0.methods.get(name))
    }

    fn resolve<F, T>(&self, pick: F) -> Option<T>
    where
        F: Fn(&StateFunctions) -> Option<T>,
    {
        self.chain().find_map(|t| pick(&t.0.functions))
    }

    pub fn is_valid_instance(&self, instance: &dyn Any) -> bool {
        self.0.validator.is_valid(instance)
    }

    pub fn validate_instance(&self, instance: &dyn Any) -> Result<(), ValidationError> {
        if self.is_valid_instance(instance) {
            Ok(())
        } else {
            Err(ValidationError::InvalidInstance {
                type_name: self.name().to_string(),
                expected: self.0.validator.describe(),
            })
        }
    }

    /// Validate a state value against every schema of the chain.
    ///
    /// Each level checks its own part and claims its keys; the root closure
    /// then rejects keys that no composite level claimed.
    pub fn validate_state_object(&self, value: &StateObject) -> Result<(), ValidationError> {
        let mut claims = KeyClaims::default();
        for level in self.chain() {
            if let Some(schema) = &level.0.state_schema {
                schema.check(level.name(), value, &mut claims)?;
            }
        }
        claims.check_closure(self.name(), value)
    }

    pub fn is_state_object_valid(&self, value: &StateObject) -> bool {
        self.validate_state_object(value).is_ok()
    }

    /// Serialize `instance`.
    ///
    /// The result is validated against the full schema chain whenever this
    /// level contributes its own conversion or schema.
    pub fn to_state_object(&self, instance: &dyn Any) -> Result<StateObject, StateError> {
        self.validate_instance(instance)?;
        let convert = self
            .resolve(|f| f.to_state.clone())
            .ok_or_else(|| missing_function(self, "to_state"))?;
        let state = convert(instance)?;
        if self.0.functions.to_state.is_some() || self.0.state_schema.is_some() {
            self.validate_state_object(&state)?;
        }
        Ok(state)
    }

    /// Reconstruct a fresh instance from state.
    pub fn from_state_object(
        &self,
        state: &StateObject,
        ctx: &ApplyContext,
    ) -> Result<Box<dyn Any + Send + Sync>, StateError> {
        self.validate_state_object(state)?;
        let convert = self
            .resolve(|f| f.from_state.clone())
            .ok_or_else(|| missing_function(self, "from_state"))?;
        convert(state, ctx)
    }

    /// [`from_state_object`](Self::from_state_object) downcast to `T`.
    pub fn from_state_as<T: Any>(
        &self,
        state: &StateObject,
        ctx: &ApplyContext,
    ) -> Result<T, StateError> {
        let boxed = self.from_state_object(state, ctx)?;
        let boxed: Box<dyn Any> = boxed;
        boxed
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| StateError::TypeMismatch {
                type_name: self.name().to_string(),
                expected: std::any::type_name::<T>().to_string(),
                actual: "another type".to_string(),
            })
    }

    /// Constructor arguments that recreate a dynamic element from its state.
    pub fn state_to_args(
        &self,
        state: &StateObject,
        ctx: &ApplyContext,
    ) -> Result<Vec<StateObject>, StateError> {
        self.validate_state_object(state)?;
        let derive = self
            .resolve(|f| f.state_to_args.clone())
            .ok_or_else(|| missing_function(self, "state_to_args"))?;
        derive(state, ctx)
    }

    /// Apply `state` in place.
    pub fn apply_state(
        &self,
        instance: &mut dyn Any,
        state: &StateObject,
        ctx: &ApplyContext,
    ) -> Result<(), StateError> {
        self.validate_instance(&*instance)?;
        self.validate_state_object(state)?;
        let apply = self
            .resolve(|f| f.apply_state.clone())
            .ok_or_else(|| missing_function(self, "apply_state"))?;
        apply(instance, state, ctx)
    }

    /// Invoke a method declared on this type or an ancestor.
    ///
    /// Arguments are checked against the declared parameter types and the
    /// return value against the declared return type.
    pub fn invoke(
        &self,
        instance: &mut dyn Any,
        name: &str,
        args: &[StateObject],
        read_only: bool,
    ) -> Result<StateObject, StateError> {
        let method = self.method(name).ok_or_else(|| StateError::UnknownMethod {
            type_name: self.name().to_string(),
            method: name.to_string(),
        })?;
        if read_only && !method.is_invocable_for_read_only() {
            return Err(StateError::ReadOnly {
                type_name: self.name().to_string(),
                method: name.to_string(),
            });
        }
        if args.len() != method.parameter_types().len() {
            return Err(StateError::MethodArity {
                method: name.to_string(),
                expected: method.parameter_types().len(),
                actual: args.len(),
            });
        }
        for (param, arg) in method.parameter_types().iter().zip(args) {
            param.validate_state_object(arg)?;
        }
        let result = method.call(instance, args)?;
        method.return_type().validate_state_object(&result)?;
        Ok(result)
    }
}

fn missing_function(io_type: &IoType, function: &str) -> StateError {
    StateError::Invalid(format!(
        "{} resolves no {} function",
        io_type.name(),
        function
    ))
}

impl PartialEq for IoType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for IoType {}

impl Hash for IoType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IoType({})", self.name())
    }
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
