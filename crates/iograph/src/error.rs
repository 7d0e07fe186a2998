// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Validation and state-conversion errors shared across modules.

use crate::container::ContainerError;
use crate::id::Identifier;
use crate::retry::NotYetDeserializable;
use thiserror::Error;

/// An instance or state value does not match its declared type.
///
/// Always carries the name of the IO type level that rejected the value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{type_name}: instance is not a valid {expected}")]
    InvalidInstance { type_name: String, expected: String },

    #[error("{type_name}: expected {expected}, got {actual}")]
    InvalidValue {
        type_name: String,
        expected: String,
        actual: String,
    },

    #[error("{type_name}: expected a composite state record, got {actual}")]
    NotComposite { type_name: String, actual: String },

    #[error("{type_name}: missing key '{key}'")]
    MissingKey { type_name: String, key: String },

    #[error("{type_name}: unknown key '{key}'")]
    UnknownKey { type_name: String, key: String },

    #[error("{type_name}.{key}: {source}")]
    Field {
        type_name: String,
        key: String,
        #[source]
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    pub(crate) fn in_field(self, type_name: &str, key: &str) -> Self {
        Self::Field {
            type_name: type_name.to_string(),
            key: key.to_string(),
            source: Box::new(self),
        }
    }

    /// Innermost error (unwraps nested field context).
    pub fn root_cause(&self) -> &ValidationError {
        match self {
            Self::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Errors raised while converting, applying or restoring state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotYetDeserializable(#[from] NotYetDeserializable),

    #[error("{type_name} cannot be reconstructed from a state value")]
    NotDeserializable { type_name: String },

    #[error("{type_name}: conversion produced {actual}, expected {expected}")]
    TypeMismatch {
        type_name: String,
        expected: String,
        actual: String,
    },

    #[error("no element registered as {0}")]
    UnknownElement(Identifier),

    #[error("{type_name} declares no method '{method}'")]
    UnknownMethod { type_name: String, method: String },

    #[error("{method} expects {expected} argument(s), got {actual}")]
    MethodArity {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("{type_name}.{method} cannot be invoked on a read-only element")]
    ReadOnly { type_name: String, method: String },

    #[error("a state restore session is already in progress")]
    RestoreInProgress,

    #[error("state restore made no progress; missing: {}", join_ids(.missing))]
    Unresolved { missing: Vec<Identifier> },

    #[error("container error: {0}")]
    Container(Box<ContainerError>),

    #[error("{0}")]
    Invalid(String),
}

impl StateError {
    /// The missing dependency when this failure is the transient
    /// "not yet deserializable" condition.
    pub fn deferred_dependency(&self) -> Option<&Identifier> {
        match self {
            Self::NotYetDeserializable(signal) => Some(&signal.id),
            Self::Container(err) => match err.as_ref() {
                ContainerError::State(inner) => inner.deferred_dependency(),
                _ => None,
            },
            _ => None,
        }
    }

    /// True for the one failure a restore pass re-queues.
    pub fn is_deferrable(&self) -> bool {
        self.deferred_dependency().is_some()
    }
}

impl From<ContainerError> for StateError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::State(inner) => *inner,
            other => Self::Container(Box::new(other)),
        }
    }
}

fn join_ids(ids: &[Identifier]) -> String {
    ids.iter()
        .map(Identifier::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Short human description of a JSON value's kind, used in diagnostics.
pub(crate) fn describe_value(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(a) => format!("array of {}", a.len()),
        Value::Object(o) => format!("record with {} key(s)", o.len()),
    }
}
