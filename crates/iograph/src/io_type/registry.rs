// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read-only table of every IO type reachable from a set of descriptors.

use super::{IoType, IoTypeError};
use std::collections::BTreeMap;

/// Name → descriptor table, validated once at construction.
///
/// Collecting walks supertypes, parameter types, schema field types and
/// method signatures, so a registry built from the element types in use
/// covers every type the API exposes.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, IoType>,
}

impl TypeRegistry {
    /// Collect the closure of `roots`.
    ///
    /// Two distinct descriptors sharing a name, or two distinct root
    /// descriptors, are rejected.
    pub fn collect<'a, I>(roots: I) -> Result<Self, IoTypeError>
    where
        I: IntoIterator<Item = &'a IoType>,
    {
        let mut registry = Self::default();
        let mut root: Option<IoType> = None;
        let mut pending: Vec<IoType> = roots.into_iter().cloned().collect();

        while let Some(io_type) = pending.pop() {
            if let Some(existing) = registry.types.get(io_type.name()) {
                if existing != &io_type {
                    return Err(IoTypeError::DuplicateName {
                        name: io_type.name().to_string(),
                    });
                }
                continue;
            }

            if io_type.is_root() {
                match &root {
                    Some(first) if first != &io_type => {
                        return Err(IoTypeError::MultipleRoots {
                            first: first.name().to_string(),
                            second: io_type.name().to_string(),
                        });
                    }
                    _ => root = Some(io_type.clone()),
                }
            }

            pending.extend(io_type.supertype().cloned());
            pending.extend(io_type.parameter_types().iter().cloned());
            if let Some(schema) = io_type.state_schema() {
                pending.extend(schema.field_types());
            }
            for method in io_type.declared_methods().values() {
                pending.push(method.return_type().clone());
                pending.extend(method.parameter_types().iter().cloned());
            }

            registry.types.insert(io_type.name().to_string(), io_type);
        }

        log::debug!("[type_registry] collected {} IO types", registry.types.len());
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&IoType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IoType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
