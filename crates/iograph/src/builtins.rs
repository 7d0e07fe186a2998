// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Built-in IO types: the `ObjectIO` root, leaf value types and the cached
//! parametric descriptors.

use crate::cache::{ParametricKey, TypeCache};
use crate::container::ContainerKind;
use crate::element::ElementRef;
use crate::error::{describe_value, StateError, ValidationError};
use crate::id::Identifier;
use crate::io_type::{IoType, IoTypeBuilder, StateObject, Validator};
use crate::restore::ApplyContext;
use crate::schema::{StateSchema, StateValidator};
use serde_json::{json, Value};
use std::any::Any;
use std::sync::{Arc, OnceLock};

pub const OBJECT_IO: &str = "ObjectIO";

#[allow(clippy::expect_used)] // builtin declarations are fixed and valid by construction
fn finish(builder: IoTypeBuilder) -> IoType {
    builder
        .build()
        .expect("builtin IO type declaration is valid")
}

/// The root descriptor. Supplies every state function and the base
/// metadata defaults.
pub fn object_io() -> IoType {
    static ROOT: OnceLock<IoType> = OnceLock::new();
    ROOT.get_or_init(|| {
        finish(
            IoTypeBuilder::root(OBJECT_IO)
                .documentation("The root of the IO type hierarchy")
                .validator(Validator::Any)
                .to_state_any(|_| Ok(Value::Null))
                .from_state_any(|_, _| {
                    Err(StateError::NotDeserializable {
                        type_name: OBJECT_IO.to_string(),
                    })
                })
                .state_to_args(|_, _| Ok(Vec::new()))
                .apply_state_any(|_, _, _| Ok(()))
                .metadata_default("documentation", json!(""))
                .metadata_default("state", json!(true))
                .metadata_default("readOnly", json!(false))
                .metadata_default("featured", json!(false))
                .metadata_default("dynamicElement", json!(false))
                .metadata_default("archetype", json!(false))
                .metadata_default("designed", json!(false))
                .metadata_default("highFrequency", json!(false)),
        )
    })
    .clone()
}

/// Return type of methods that produce nothing.
pub fn void_io() -> IoType {
    static VOID: OnceLock<IoType> = OnceLock::new();
    VOID.get_or_init(|| {
        finish(
            IoType::builder("VoidIO")
                .documentation("Type for methods that return nothing")
                .value_type::<()>()
                .state_schema(StateSchema::value("null", StateValidator::Null))
                .to_state::<(), _>(|_| Ok(Value::Null))
                .from_state(|_, _| Ok(())),
        )
    })
    .clone()
}

const NAN: &str = "NaN";
const POS_INFINITY: &str = "Infinity";
const NEG_INFINITY: &str = "-Infinity";

fn number_to_state(value: f64) -> Value {
    if value.is_nan() {
        json!(NAN)
    } else if value == f64::INFINITY {
        json!(POS_INFINITY)
    } else if value == f64::NEG_INFINITY {
        json!(NEG_INFINITY)
    } else {
        serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

fn number_from_state(state: &Value) -> Result<f64, StateError> {
    match state {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s == NAN => Some(f64::NAN),
        Value::String(s) if s == POS_INFINITY => Some(f64::INFINITY),
        Value::String(s) if s == NEG_INFINITY => Some(f64::NEG_INFINITY),
        _ => None,
    }
    .ok_or_else(|| {
        ValidationError::InvalidValue {
            type_name: "NumberIO".to_string(),
            expected: "number".to_string(),
            actual: describe_value(state),
        }
        .into()
    })
}

/// `f64` values. Non-finite numbers are encoded as `"NaN"`, `"Infinity"`
/// and `"-Infinity"`.
pub fn number_io() -> IoType {
    static NUMBER: OnceLock<IoType> = OnceLock::new();
    NUMBER
        .get_or_init(|| {
            finish(
                IoType::builder("NumberIO")
                    .documentation("IO type for numbers")
                    .value_type::<f64>()
                    .state_schema(StateSchema::value(
                        "number",
                        StateValidator::predicate("number or non-finite marker", |v| {
                            v.is_number()
                                || matches!(v.as_str(), Some(NAN | POS_INFINITY | NEG_INFINITY))
                        }),
                    ))
                    .to_state::<f64, _>(|v| Ok(number_to_state(*v)))
                    .from_state(|state, _| number_from_state(state))
                    .apply_state::<f64, _>(|v, state, _| {
                        *v = number_from_state(state)?;
                        Ok(())
                    }),
            )
        })
        .clone()
}

pub fn string_io() -> IoType {
    static STRING: OnceLock<IoType> = OnceLock::new();
    STRING
        .get_or_init(|| {
            finish(
                IoType::builder("StringIO")
                    .documentation("IO type for strings")
                    .value_type::<String>()
                    .state_schema(StateSchema::value("string", StateValidator::String))
                    .to_state::<String, _>(|v| Ok(json!(v)))
                    .from_state(|state, _| Ok(state.as_str().unwrap_or_default().to_string()))
                    .apply_state::<String, _>(|v, state, _| {
                        *v = state.as_str().unwrap_or_default().to_string();
                        Ok(())
                    }),
            )
        })
        .clone()
}

pub fn boolean_io() -> IoType {
    static BOOLEAN: OnceLock<IoType> = OnceLock::new();
    BOOLEAN
        .get_or_init(|| {
            finish(
                IoType::builder("BooleanIO")
                    .documentation("IO type for booleans")
                    .value_type::<bool>()
                    .state_schema(StateSchema::value("boolean", StateValidator::Boolean))
                    .to_state::<bool, _>(|v| Ok(json!(v)))
                    .from_state(|state, _| Ok(state.as_bool().unwrap_or_default()))
                    .apply_state::<bool, _>(|v, state, _| {
                        *v = state.as_bool().unwrap_or_default();
                        Ok(())
                    }),
            )
        })
        .clone()
}

fn parametric_cache(slot: &'static OnceLock<Arc<TypeCache<ParametricKey>>>) -> &'static TypeCache<ParametricKey> {
    slot.get_or_init(TypeCache::new)
}

/// `Option<T>` where `Some` values are instances of `inner`. `None`
/// serializes as `null`.
pub fn nullable_io<T: Any + Send + Sync>(inner: &IoType) -> IoType {
    static CACHE: OnceLock<Arc<TypeCache<ParametricKey>>> = OnceLock::new();
    parametric_cache(&CACHE).get_or_create(ParametricKey::typed::<T>(&[inner]), || {
        let name = format!("NullableIO<{}>", inner.name());
        let (for_valid, for_schema, for_to, for_from, for_apply) = (
            inner.clone(),
            inner.clone(),
            inner.clone(),
            inner.clone(),
            inner.clone(),
        );
        finish(
            IoType::builder(name)
                .documentation(format!("A wrapper for a nullable {}", inner.name()))
                .parameter_types(vec![inner.clone()])
                .validator(Validator::refined::<Option<T>, _>(
                    format!("none or a valid {}", inner.name()),
                    move |v| v.as_ref().map_or(true, |x| for_valid.is_valid_instance(x)),
                ))
                .state_schema(StateSchema::value(
                    format!("null | {}", inner.name()),
                    StateValidator::predicate(format!("null or {}", inner.name()), move |v| {
                        v.is_null() || for_schema.is_state_object_valid(v)
                    }),
                ))
                .to_state::<Option<T>, _>(move |v| match v {
                    None => Ok(Value::Null),
                    Some(x) => for_to.to_state_object(x),
                })
                .from_state(move |state, ctx| nullable_from_state::<T>(&for_from, state, ctx))
                .apply_state::<Option<T>, _>(move |v, state, ctx| {
                    *v = nullable_from_state::<T>(&for_apply, state, ctx)?;
                    Ok(())
                }),
        )
    })
}

fn nullable_from_state<T: Any>(
    inner: &IoType,
    state: &StateObject,
    ctx: &ApplyContext,
) -> Result<Option<T>, StateError> {
    if state.is_null() {
        Ok(None)
    } else {
        inner.from_state_as::<T>(state, ctx).map(Some)
    }
}

/// `Vec<T>` of `element` instances, serialized as a JSON array.
pub fn array_io<T: Any + Send + Sync>(element: &IoType) -> IoType {
    static CACHE: OnceLock<Arc<TypeCache<ParametricKey>>> = OnceLock::new();
    parametric_cache(&CACHE).get_or_create(ParametricKey::typed::<T>(&[element]), || {
        let name = format!("ArrayIO<{}>", element.name());
        let (for_valid, for_schema, for_to, for_from, for_apply) = (
            element.clone(),
            element.clone(),
            element.clone(),
            element.clone(),
            element.clone(),
        );
        finish(
            IoType::builder(name)
                .documentation(format!("An array of {}", element.name()))
                .parameter_types(vec![element.clone()])
                .validator(Validator::refined::<Vec<T>, _>(
                    format!("every element a valid {}", element.name()),
                    move |items| items.iter().all(|x| for_valid.is_valid_instance(x)),
                ))
                .state_schema(StateSchema::value(
                    format!("Array<{}>", element.name()),
                    StateValidator::predicate(format!("array of {}", element.name()), move |v| {
                        v.as_array()
                            .is_some_and(|items| items.iter().all(|x| for_schema.is_state_object_valid(x)))
                    }),
                ))
                .to_state::<Vec<T>, _>(move |items| {
                    items
                        .iter()
                        .map(|x| for_to.to_state_object(x))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::Array)
                })
                .from_state(move |state, ctx| array_from_state::<T>(&for_from, state, ctx))
                .apply_state::<Vec<T>, _>(move |items, state, ctx| {
                    *items = array_from_state::<T>(&for_apply, state, ctx)?;
                    Ok(())
                }),
        )
    })
}

fn array_from_state<T: Any>(
    element: &IoType,
    state: &StateObject,
    ctx: &ApplyContext,
) -> Result<Vec<T>, StateError> {
    state
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|x| element.from_state_as::<T>(x, ctx))
        .collect()
}

/// `Vec<(K, V)>` serialized as an array of `[key, value]` pairs.
pub fn map_io<K, V>(key: &IoType, value: &IoType) -> IoType
where
    K: Any + Send + Sync,
    V: Any + Send + Sync,
{
    static CACHE: OnceLock<Arc<TypeCache<ParametricKey>>> = OnceLock::new();
    parametric_cache(&CACHE).get_or_create(ParametricKey::typed::<(K, V)>(&[key, value]), || {
        let name = format!("MapIO<{},{}>", key.name(), value.name());
        let pair = MapPair {
            key: key.clone(),
            value: value.clone(),
        };
        let (for_valid, for_schema, for_to, for_from, for_apply) = (
            pair.clone(),
            pair.clone(),
            pair.clone(),
            pair.clone(),
            pair,
        );
        finish(
            IoType::builder(name)
                .documentation(format!(
                    "A map of {} keys to {} values",
                    key.name(),
                    value.name()
                ))
                .parameter_types(vec![key.clone(), value.clone()])
                .validator(Validator::refined::<Vec<(K, V)>, _>("valid key/value pairs", move |entries| {
                    entries.iter().all(|(k, v)| {
                        for_valid.key.is_valid_instance(k) && for_valid.value.is_valid_instance(v)
                    })
                }))
                .state_schema(StateSchema::value(
                    format!("Array<[{}, {}]>", key.name(), value.name()),
                    StateValidator::predicate("array of [key, value] pairs", move |v| {
                        v.as_array().is_some_and(|entries| {
                            entries.iter().all(|entry| for_schema.is_valid_entry(entry))
                        })
                    }),
                ))
                .to_state::<Vec<(K, V)>, _>(move |entries| {
                    entries
                        .iter()
                        .map(|(k, v)| -> Result<Value, StateError> {
                            Ok(json!([
                                for_to.key.to_state_object(k)?,
                                for_to.value.to_state_object(v)?
                            ]))
                        })
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::Array)
                })
                .from_state(move |state, ctx| for_from.entries_from_state::<K, V>(state, ctx))
                .apply_state::<Vec<(K, V)>, _>(move |entries, state, ctx| {
                    *entries = for_apply.entries_from_state::<K, V>(state, ctx)?;
                    Ok(())
                }),
        )
    })
}

#[derive(Clone)]
struct MapPair {
    key: IoType,
    value: IoType,
}

impl MapPair {
    fn is_valid_entry(&self, entry: &Value) -> bool {
        match entry.as_array().map(Vec::as_slice) {
            Some([k, v]) => self.key.is_state_object_valid(k) && self.value.is_state_object_valid(v),
            _ => false,
        }
    }

    fn entries_from_state<K: Any, V: Any>(
        &self,
        state: &StateObject,
        ctx: &ApplyContext,
    ) -> Result<Vec<(K, V)>, StateError> {
        let mut entries = Vec::new();
        for entry in state.as_array().map(Vec::as_slice).unwrap_or_default() {
            if let Some([k, v]) = entry.as_array().map(Vec::as_slice) {
                entries.push((
                    self.key.from_state_as::<K>(k, ctx)?,
                    self.value.from_state_as::<V>(v, ctx)?,
                ));
            }
        }
        Ok(entries)
    }
}

/// Reference to another registered element, serialized as `{ "id": ... }`.
///
/// Reconstruction resolves the id through the restore context and signals
/// "not yet deserializable" while the target is missing.
pub fn reference_io(target: &IoType) -> IoType {
    static CACHE: OnceLock<Arc<TypeCache<ParametricKey>>> = OnceLock::new();
    parametric_cache(&CACHE).get_or_create(ParametricKey::untyped(&[target]), || {
        let name = format!("ReferenceIO<{}>", target.name());
        let (for_valid, for_from, for_apply) = (target.clone(), target.clone(), target.clone());
        finish(
            IoType::builder(name)
                .documentation(format!("Uses reference identity to serialize a {}", target.name()))
                .parameter_types(vec![target.clone()])
                .validator(Validator::refined::<ElementRef, _>(
                    format!("element of type {}", target.name()),
                    move |element| {
                        // A write-locked target is being mutated by the caller; accept it.
                        element
                            .try_read_recursive()
                            .map_or(true, |el| el.io_type().inherits_from(&for_valid))
                    },
                ))
                .state_schema(StateSchema::composite([("id", string_io())]))
                .to_state::<ElementRef, _>(|element| {
                    Ok(json!({ "id": element.read_recursive().id().as_str() }))
                })
                .from_state(move |state, ctx| resolve_reference(&for_from, state, ctx))
                .apply_state::<ElementRef, _>(move |element, state, ctx| {
                    *element = resolve_reference(&for_apply, state, ctx)?;
                    Ok(())
                }),
        )
    })
}

fn resolve_reference(
    target: &IoType,
    state: &StateObject,
    ctx: &ApplyContext,
) -> Result<ElementRef, StateError> {
    let raw = state["id"].as_str().unwrap_or_default();
    let id = Identifier::new(raw).map_err(|e| StateError::Invalid(e.to_string()))?;
    let element = ctx.resolve(&id)?;
    // A reference applied to its own element finds the target write-locked
    // by the caller, which leaves no way to read its type.
    let actual = {
        let guard = element.try_read_recursive();
        guard.map(|guard| guard.io_type().clone())
    };
    let actual = match actual {
        Some(actual) => actual,
        None => return Ok(element),
    };
    if !actual.inherits_from(target) {
        return Err(StateError::TypeMismatch {
            type_name: format!("ReferenceIO<{}>", target.name()),
            expected: target.name().to_string(),
            actual: actual.name().to_string(),
        });
    }
    Ok(element)
}

/// Descriptor of a dynamic element container holding `parameter`
/// instances.
pub fn container_io(kind: ContainerKind, parameter: &IoType) -> IoType {
    static GROUP: OnceLock<Arc<TypeCache<ParametricKey>>> = OnceLock::new();
    static CAPSULE: OnceLock<Arc<TypeCache<ParametricKey>>> = OnceLock::new();
    static SINGLETON: OnceLock<Arc<TypeCache<ParametricKey>>> = OnceLock::new();
    let (slot, base) = match kind {
        ContainerKind::Group => (&GROUP, "GroupIO"),
        ContainerKind::Capsule => (&CAPSULE, "CapsuleIO"),
        ContainerKind::Singleton => (&SINGLETON, "SingletonIO"),
    };
    parametric_cache(slot).get_or_create(ParametricKey::untyped(&[parameter]), || {
        finish(
            IoType::builder(format!("{}<{}>", base, parameter.name()))
                .documentation(format!(
                    "Container of dynamically created {} elements",
                    parameter.name()
                ))
                .parameter_types(vec![parameter.clone()])
                .value_type::<ContainerKind>()
                .events(["elementCreated", "elementDisposed"]),
        )
    })
}

pub fn group_io(parameter: &IoType) -> IoType {
    container_io(ContainerKind::Group, parameter)
}

pub fn capsule_io(parameter: &IoType) -> IoType {
    container_io(ContainerKind::Capsule, parameter)
}

pub fn singleton_io(parameter: &IoType) -> IoType {
    container_io(ContainerKind::Singleton, parameter)
}
