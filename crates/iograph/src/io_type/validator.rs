// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Instance validators.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Predicate over a live instance.
pub type InstancePredicate = Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>;

/// Decides whether a live value is a valid instance of an IO type.
#[derive(Clone)]
pub enum Validator {
    /// Accepts any instance (root type only).
    Any,
    /// Instance must be exactly this Rust type.
    ValueType {
        type_id: TypeId,
        type_name: &'static str,
    },
    /// Custom rule.
    Predicate {
        description: String,
        predicate: InstancePredicate,
    },
    /// Rust type check followed by a rule on the typed value.
    Refined {
        type_id: TypeId,
        type_name: &'static str,
        description: String,
        predicate: InstancePredicate,
    },
}

impl Validator {
    pub fn value_type<T: Any>() -> Self {
        Self::ValueType {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn predicate<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&dyn Any) -> bool + Send + Sync + 'static,
    {
        Self::Predicate {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Typed rule: the instance must be a `T` satisfying `predicate`.
    pub fn refined<T, F>(description: impl Into<String>, predicate: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::Refined {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            description: description.into(),
            predicate: Arc::new(move |instance: &dyn Any| {
                instance.downcast_ref::<T>().map_or(false, &predicate)
            }),
        }
    }

    pub fn is_valid(&self, instance: &dyn Any) -> bool {
        match self {
            Self::Any => true,
            Self::ValueType { type_id, .. } => instance.type_id() == *type_id,
            Self::Predicate { predicate, .. } => predicate(instance),
            Self::Refined {
                type_id, predicate, ..
            } => instance.type_id() == *type_id && predicate(instance),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Any => "any value".into(),
            Self::ValueType { type_name, .. } => (*type_name).to_string(),
            Self::Predicate { description, .. } => description.clone(),
            Self::Refined {
                type_name,
                description,
                ..
            } => format!("{} ({})", type_name, description),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator({})", self.describe())
    }
}
