// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! State schemas.
//!
//! A schema describes the shape of the plain-data state one IO type level
//! contributes. It is either an opaque value checked by a [`StateValidator`]
//! or a composite record whose fields are themselves IO types. Composite
//! levels along a supertype chain each claim their own keys; the closure
//! check at the end of the walk rejects anything nobody claimed.

use crate::error::{describe_value, ValidationError};
use crate::io_type::IoType;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Reserved key holding the hidden (private) part of a composite state.
pub const PRIVATE_KEY: &str = "_private";

/// Predicate over a state value.
pub type ValuePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Validation rule for an opaque state value.
#[derive(Clone)]
pub enum StateValidator {
    Number,
    String,
    Boolean,
    Null,
    Array,
    Object,
    Any,
    /// Value must equal one of the listed constants.
    OneOf(Vec<Value>),
    /// Custom rule, with a short description for diagnostics.
    Predicate {
        description: String,
        predicate: ValuePredicate,
    },
}

impl StateValidator {
    pub fn predicate<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Predicate {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
            Self::OneOf(values) => values.contains(value),
            Self::Predicate { predicate, .. } => predicate(value),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Number => "number".into(),
            Self::String => "string".into(),
            Self::Boolean => "boolean".into(),
            Self::Null => "null".into(),
            Self::Array => "array".into(),
            Self::Object => "object".into(),
            Self::Any => "any".into(),
            Self::OneOf(values) => {
                let rendered: Vec<String> = values.iter().map(Value::to_string).collect();
                format!("one of [{}]", rendered.join(", "))
            }
            Self::Predicate { description, .. } => description.clone(),
        }
    }
}

impl fmt::Debug for StateValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateValidator({})", self.describe())
    }
}

/// Keys claimed by the composite levels visited during a validation walk.
#[derive(Debug, Default)]
pub struct KeyClaims {
    composite: bool,
    public: BTreeSet<String>,
    private: BTreeSet<String>,
}

impl KeyClaims {
    /// Reject keys no composite level claimed.
    ///
    /// Walks that never met a composite level (pure value types) pass.
    pub fn check_closure(&self, type_name: &str, value: &Value) -> Result<(), ValidationError> {
        if !self.composite {
            return Ok(());
        }
        let Some(record) = value.as_object() else {
            return Err(ValidationError::NotComposite {
                type_name: type_name.to_string(),
                actual: describe_value(value),
            });
        };
        for key in record.keys() {
            if key == PRIVATE_KEY && !self.private.is_empty() {
                continue;
            }
            if !self.public.contains(key) {
                return Err(ValidationError::UnknownKey {
                    type_name: type_name.to_string(),
                    key: key.clone(),
                });
            }
        }
        if let Some(private) = record.get(PRIVATE_KEY).and_then(Value::as_object) {
            for key in private.keys() {
                if !self.private.contains(key) {
                    return Err(ValidationError::UnknownKey {
                        type_name: type_name.to_string(),
                        key: format!("{}.{}", PRIVATE_KEY, key),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Shape of the state one IO type level contributes.
#[derive(Clone)]
pub enum StateSchema {
    Value {
        display: String,
        validator: StateValidator,
    },
    Composite {
        fields: BTreeMap<String, IoType>,
        hidden: BTreeMap<String, IoType>,
    },
}

impl StateSchema {
    pub fn value(display: impl Into<String>, validator: StateValidator) -> Self {
        Self::Value {
            display: display.into(),
            validator,
        }
    }

    /// Composite schema from `(key, type)` pairs.
    pub fn composite<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, IoType)>,
        S: Into<String>,
    {
        Self::Composite {
            fields: fields.into_iter().map(|(k, t)| (k.into(), t)).collect(),
            hidden: BTreeMap::new(),
        }
    }

    /// Add hidden fields (serialized under [`PRIVATE_KEY`]).
    ///
    /// No effect on value schemas.
    pub fn with_hidden<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, IoType)>,
        S: Into<String>,
    {
        if let Self::Composite { hidden, .. } = &mut self {
            hidden.extend(entries.into_iter().map(|(k, t)| (k.into(), t)));
        }
        self
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite { .. })
    }

    /// Validate this level and record its keys.
    pub fn check(
        &self,
        type_name: &str,
        value: &Value,
        claims: &mut KeyClaims,
    ) -> Result<(), ValidationError> {
        match self {
            Self::Value { display, validator } => {
                if validator.accepts(value) {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidValue {
                        type_name: type_name.to_string(),
                        expected: display.clone(),
                        actual: describe_value(value),
                    })
                }
            }
            Self::Composite { fields, hidden } => {
                let record = value
                    .as_object()
                    .ok_or_else(|| ValidationError::NotComposite {
                        type_name: type_name.to_string(),
                        actual: describe_value(value),
                    })?;
                claims.composite = true;
                check_fields(type_name, record, fields, &mut claims.public, "")?;
                if !hidden.is_empty() {
                    let private = record
                        .get(PRIVATE_KEY)
                        .and_then(Value::as_object)
                        .ok_or_else(|| ValidationError::MissingKey {
                            type_name: type_name.to_string(),
                            key: PRIVATE_KEY.to_string(),
                        })?;
                    check_fields(type_name, private, hidden, &mut claims.private, PRIVATE_KEY)?;
                }
                Ok(())
            }
        }
    }

    /// JSON description used in the API snapshot.
    pub fn describe(&self) -> Value {
        match self {
            Self::Value { display, validator } => json!({
                "display": display,
                "validator": validator.describe(),
            }),
            Self::Composite { fields, hidden } => {
                let mut out = Map::new();
                for (key, ty) in fields {
                    out.insert(key.clone(), Value::String(ty.name().to_string()));
                }
                if !hidden.is_empty() {
                    let private: Map<String, Value> = hidden
                        .iter()
                        .map(|(k, t)| (k.clone(), Value::String(t.name().to_string())))
                        .collect();
                    out.insert(PRIVATE_KEY.to_string(), Value::Object(private));
                }
                json!({ "composite": out })
            }
        }
    }

    /// Every IO type referenced by this schema.
    pub fn field_types(&self) -> Vec<IoType> {
        match self {
            Self::Value { .. } => Vec::new(),
            Self::Composite { fields, hidden } => {
                fields.values().chain(hidden.values()).cloned().collect()
            }
        }
    }
}

impl fmt::Debug for StateSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value { display, .. } => write!(f, "StateSchema::Value({})", display),
            Self::Composite { fields, hidden } => f
                .debug_struct("StateSchema::Composite")
                .field("fields", &fields.keys().collect::<Vec<_>>())
                .field("hidden", &hidden.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

fn check_fields(
    type_name: &str,
    record: &Map<String, Value>,
    fields: &BTreeMap<String, IoType>,
    claimed: &mut BTreeSet<String>,
    scope: &str,
) -> Result<(), ValidationError> {
    for (key, field_type) in fields {
        let qualified = if scope.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", scope, key)
        };
        let field = record.get(key).ok_or_else(|| ValidationError::MissingKey {
            type_name: type_name.to_string(),
            key: qualified.clone(),
        })?;
        field_type
            .validate_state_object(field)
            .map_err(|e| e.in_field(type_name, &qualified))?;
        claimed.insert(key.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{number_io, string_io};

    #[test]
    fn test_value_validators() {
        assert!(StateValidator::Number.accepts(&json!(1.5)));
        assert!(!StateValidator::Number.accepts(&json!("1.5")));
        assert!(StateValidator::OneOf(vec![json!("a"), json!("b")]).accepts(&json!("b")));
        assert!(!StateValidator::OneOf(vec![json!("a")]).accepts(&json!("c")));

        let even = StateValidator::predicate("even number", |v| {
            v.as_i64().map(|n| n % 2 == 0).unwrap_or(false)
        });
        assert!(even.accepts(&json!(4)));
        assert!(!even.accepts(&json!(3)));
        assert_eq!(even.describe(), "even number");
    }

    #[test]
    fn test_composite_claims_keys() {
        let schema = StateSchema::composite([("voltage", number_io()), ("label", string_io())]);
        let mut claims = KeyClaims::default();
        let value = json!({ "voltage": 9.0, "label": "cell" });
        schema.check("BatteryIO", &value, &mut claims).unwrap();
        claims.check_closure("BatteryIO", &value).unwrap();
    }

    #[test]
    fn test_composite_missing_key() {
        let schema = StateSchema::composite([("voltage", number_io())]);
        let mut claims = KeyClaims::default();
        let err = schema
            .check("BatteryIO", &json!({}), &mut claims)
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingKey {
                type_name: "BatteryIO".into(),
                key: "voltage".into()
            }
        );
    }

    #[test]
    fn test_closure_rejects_unclaimed_key() {
        let schema = StateSchema::composite([("voltage", number_io())]);
        let mut claims = KeyClaims::default();
        let value = json!({ "voltage": 1.0, "extra": true });
        schema.check("BatteryIO", &value, &mut claims).unwrap();
        let err = claims.check_closure("BatteryIO", &value).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownKey { key, .. } if key == "extra"));
    }

    #[test]
    fn test_hidden_fields_live_under_private() {
        let schema = StateSchema::composite([("voltage", number_io())])
            .with_hidden([("serial", string_io())]);
        let value = json!({ "voltage": 1.0, "_private": { "serial": "x1" } });
        let mut claims = KeyClaims::default();
        schema.check("BatteryIO", &value, &mut claims).unwrap();
        claims.check_closure("BatteryIO", &value).unwrap();

        let stray = json!({ "voltage": 1.0, "_private": { "serial": "x1", "pin": 4 } });
        let mut claims = KeyClaims::default();
        schema.check("BatteryIO", &stray, &mut claims).unwrap();
        assert!(claims.check_closure("BatteryIO", &stray).is_err());

        let missing = json!({ "voltage": 1.0 });
        let mut claims = KeyClaims::default();
        assert!(schema.check("BatteryIO", &missing, &mut claims).is_err());
    }

    #[test]
    fn test_nested_field_error_names_path() {
        let schema = StateSchema::composite([("voltage", number_io())]);
        let mut claims = KeyClaims::default();
        let err = schema
            .check("BatteryIO", &json!({ "voltage": "high" }), &mut claims)
            .unwrap_err();
        assert!(matches!(err, ValidationError::Field { ref key, .. } if key == "voltage"));
        assert!(matches!(err.root_cause(), ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_describe_lists_field_types() {
        let schema = StateSchema::composite([("voltage", number_io())]);
        assert_eq!(
            schema.describe(),
            json!({ "composite": { "voltage": "NumberIO" } })
        );
    }
}
