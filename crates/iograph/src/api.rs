// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Static API snapshot: every instrumented element (keyed by archetypal
//! id) and every IO type it uses, plus comparison between two snapshots
//! and validation of live elements against a reference.

use crate::element::{element_metadata, is_in_archetype, ElementRegistry, Instrumented};
use crate::io_type::{IoType, IoTypeError, TypeRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Snapshot format version.
pub const API_VERSION: ApiVersion = ApiVersion { major: 1, minor: 0 };

/// Metadata keys that legitimately differ between an archetype and the
/// live members mapped onto it.
const INSTANCE_KEYS: [&str; 2] = ["archetype", "dynamicElement"];

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

/// One element of the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementApi {
    pub type_name: String,
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodApi {
    pub parameter_types: Vec<String>,
    pub return_type: String,
    pub documentation: String,
    pub invocable_for_read_only: bool,
}

/// One IO type of the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeApi {
    pub supertype: Option<String>,
    pub documentation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameter_types: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub methods: BTreeMap<String, MethodApi>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub method_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata_defaults: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_schema: Option<Value>,
}

impl TypeApi {
    pub fn describe(io_type: &IoType) -> Self {
        Self {
            supertype: io_type.supertype().map(|s| s.name().to_string()),
            documentation: io_type.documentation().to_string(),
            parameter_types: io_type
                .parameter_types()
                .iter()
                .map(|t| t.name().to_string())
                .collect(),
            methods: io_type
                .declared_methods()
                .iter()
                .map(|(name, method)| {
                    (
                        name.clone(),
                        MethodApi {
                            parameter_types: method
                                .parameter_types()
                                .iter()
                                .map(|t| t.name().to_string())
                                .collect(),
                            return_type: method.return_type().name().to_string(),
                            documentation: method.documentation().to_string(),
                            invocable_for_read_only: method.is_invocable_for_read_only(),
                        },
                    )
                })
                .collect(),
            method_order: io_type.method_order().to_vec(),
            events: io_type.declared_events().to_vec(),
            metadata_defaults: io_type.declared_metadata_defaults().clone(),
            state_schema: io_type.state_schema().map(|s| s.describe()),
        }
    }
}

/// Errors capturing or loading a snapshot.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Types(#[from] IoTypeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The whole static API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSnapshot {
    pub version: ApiVersion,
    pub elements: BTreeMap<String, ElementApi>,
    pub types: BTreeMap<String, TypeApi>,
}

impl ApiSnapshot {
    /// Describe every registered element and the closure of their types.
    ///
    /// Live dynamic members collapse onto their archetypal id; when an
    /// archetype is registered its description wins.
    pub fn capture(registry: &ElementRegistry) -> Result<Self, ApiError> {
        let mut elements = BTreeMap::new();
        let mut used_types = Vec::new();
        let mut prototypes = Vec::new();
        let mut instances = Vec::new();

        for (_, element) in registry.elements() {
            let guard = element.read();
            used_types.push(guard.io_type().clone());
            let entry = (guard.id().archetypal().to_string(), element_api(&*guard));
            if is_in_archetype(&*guard) {
                prototypes.push(entry);
            } else {
                instances.push(entry);
            }
        }
        for (key, api) in prototypes.into_iter().chain(instances) {
            elements.entry(key).or_insert(api);
        }

        let type_registry = TypeRegistry::collect(&used_types)?;
        let types = type_registry
            .iter()
            .map(|t| (t.name().to_string(), TypeApi::describe(t)))
            .collect();

        log::debug!(
            "[api] captured {} elements, {} types",
            elements.len(),
            type_registry.len()
        );
        Ok(Self {
            version: API_VERSION,
            elements,
            types,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ApiError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ApiError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// API description of a single element.
pub fn element_api(element: &dyn Instrumented) -> ElementApi {
    ElementApi {
        type_name: element.io_type().name().to_string(),
        metadata: element_metadata(element),
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// How two snapshots relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Identical.
    Full,
    /// Only additions: clients of the old API keep working.
    Backward,
    Breaking,
}

/// Result of [`compare`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiComparison {
    pub breaking: Vec<String>,
    pub additions: Vec<String>,
}

impl ApiComparison {
    pub fn compatibility(&self) -> Compatibility {
        if !self.breaking.is_empty() {
            Compatibility::Breaking
        } else if !self.additions.is_empty() {
            Compatibility::Backward
        } else {
            Compatibility::Full
        }
    }

    pub fn is_compatible(&self) -> bool {
        self.breaking.is_empty()
    }
}

/// Compare a reference snapshot against a newer one.
pub fn compare(old: &ApiSnapshot, new: &ApiSnapshot) -> ApiComparison {
    let mut result = ApiComparison::default();

    for (id, old_element) in &old.elements {
        match new.elements.get(id) {
            None => result.breaking.push(format!("element {} removed", id)),
            Some(new_element) => compare_element(id, old_element, new_element, &mut result),
        }
    }
    for id in new.elements.keys().filter(|id| !old.elements.contains_key(*id)) {
        result.additions.push(format!("element {} added", id));
    }

    for (name, old_type) in &old.types {
        match new.types.get(name) {
            None => result.breaking.push(format!("type {} removed", name)),
            Some(new_type) => compare_type(name, old_type, new_type, &mut result),
        }
    }
    for name in new.types.keys().filter(|n| !old.types.contains_key(*n)) {
        result.additions.push(format!("type {} added", name));
    }

    result
}

fn compare_element(id: &str, old: &ElementApi, new: &ElementApi, result: &mut ApiComparison) {
    if old.type_name != new.type_name {
        result.breaking.push(format!(
            "element {} changed type {} -> {}",
            id, old.type_name, new.type_name
        ));
    }
    for (key, old_value) in &old.metadata {
        match new.metadata.get(key) {
            None => result
                .breaking
                .push(format!("element {} lost metadata '{}'", id, key)),
            Some(new_value) if new_value != old_value && key != "documentation" => {
                result.breaking.push(format!(
                    "element {} metadata '{}' changed {} -> {}",
                    id, key, old_value, new_value
                ));
            }
            Some(_) => {}
        }
    }
    for key in new.metadata.keys().filter(|k| !old.metadata.contains_key(*k)) {
        result
            .additions
            .push(format!("element {} gained metadata '{}'", id, key));
    }
}

fn compare_type(name: &str, old: &TypeApi, new: &TypeApi, result: &mut ApiComparison) {
    if old.supertype != new.supertype {
        result.breaking.push(format!(
            "type {} changed supertype {:?} -> {:?}",
            name, old.supertype, new.supertype
        ));
    }
    if old.parameter_types != new.parameter_types {
        result
            .breaking
            .push(format!("type {} changed parameter types", name));
    }
    if old.state_schema != new.state_schema {
        result
            .breaking
            .push(format!("type {} changed its state schema", name));
    }

    for (method, old_method) in &old.methods {
        match new.methods.get(method) {
            None => result
                .breaking
                .push(format!("method {}.{} removed", name, method)),
            Some(new_method)
                if new_method.parameter_types != old_method.parameter_types
                    || new_method.return_type != old_method.return_type =>
            {
                result
                    .breaking
                    .push(format!("method {}.{} changed signature", name, method));
            }
            Some(new_method)
                if old_method.invocable_for_read_only && !new_method.invocable_for_read_only =>
            {
                result.breaking.push(format!(
                    "method {}.{} no longer invocable on read-only elements",
                    name, method
                ));
            }
            Some(_) => {}
        }
    }
    for method in new.methods.keys().filter(|m| !old.methods.contains_key(*m)) {
        result
            .additions
            .push(format!("method {}.{} added", name, method));
    }

    let old_events: BTreeSet<&String> = old.events.iter().collect();
    let new_events: BTreeSet<&String> = new.events.iter().collect();
    for event in old_events.difference(&new_events) {
        result
            .breaking
            .push(format!("event {}.{} removed", name, event));
    }
    for event in new_events.difference(&old_events) {
        result
            .additions
            .push(format!("event {}.{} added", name, event));
    }
}

// ---------------------------------------------------------------------------
// Live validation
// ---------------------------------------------------------------------------

/// A live element disagrees with the reference API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiMismatch {
    #[error("{archetypal} is not part of the reference API")]
    UnknownElement { archetypal: String },

    #[error("{archetypal} has type {actual}, the reference API says {expected}")]
    TypeChanged {
        archetypal: String,
        expected: String,
        actual: String,
    },

    #[error("{archetypal} metadata '{key}' is {actual}, the reference API says {expected}")]
    MetadataChanged {
        archetypal: String,
        key: String,
        expected: Value,
        actual: Value,
    },
}

/// Checks newly registered elements against a reference snapshot.
///
/// Each archetypal id is checked once; later members of the same pool are
/// accepted without another comparison.
#[derive(Debug, Clone)]
pub struct ApiValidator {
    reference: ApiSnapshot,
    checked: BTreeSet<String>,
}

impl ApiValidator {
    pub fn new(reference: ApiSnapshot) -> Self {
        Self {
            reference,
            checked: BTreeSet::new(),
        }
    }

    /// Returns `true` when a comparison actually ran.
    pub fn check(&mut self, element: &dyn Instrumented) -> Result<bool, ApiMismatch> {
        let archetypal = element.id().archetypal().to_string();
        if self.checked.contains(&archetypal) {
            return Ok(false);
        }
        let expected = self
            .reference
            .elements
            .get(&archetypal)
            .ok_or_else(|| ApiMismatch::UnknownElement {
                archetypal: archetypal.clone(),
            })?;

        let actual = element_api(element);
        if actual.type_name != expected.type_name {
            return Err(ApiMismatch::TypeChanged {
                archetypal,
                expected: expected.type_name.clone(),
                actual: actual.type_name,
            });
        }
        for (key, expected_value) in &expected.metadata {
            if INSTANCE_KEYS.contains(&key.as_str()) {
                continue;
            }
            let actual_value = actual.metadata.get(key).cloned().unwrap_or(Value::Null);
            if &actual_value != expected_value {
                return Err(ApiMismatch::MetadataChanged {
                    archetypal,
                    key: key.clone(),
                    expected: expected_value.clone(),
                    actual: actual_value,
                });
            }
        }

        self.checked.insert(archetypal);
        Ok(true)
    }

    pub fn checked_count(&self) -> usize {
        self.checked.len()
    }
}
