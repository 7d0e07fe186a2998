// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hierarchical identifiers.
//!
//! Identifiers are dotted paths (`sim.screen.model.batteryGroup.battery_3`).
//! A segment carrying a [`GROUP_SEPARATOR`] ordinal marks the Nth member of a
//! dynamic element pool; a segment may embed several terms joined by
//! [`INTER_TERM_SEPARATOR`] when it refers to other elements.
//!
//! All functions here are pure. A segment containing [`SEPARATOR`] is a
//! caller contract violation and is reported immediately.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Separates path segments.
pub const SEPARATOR: char = '.';
/// Separates a dynamic element name from its ordinal (`battery_3`).
pub const GROUP_SEPARATOR: char = '_';
/// Joins terms inside one segment when an id embeds references to others.
pub const INTER_TERM_SEPARATOR: char = '-';
/// Placeholder substituted for dynamic segments in archetypal ids.
pub const ARCHETYPE: &str = "archetype";
/// Container suffixes whose single child has a fixed (non-ordinal) name.
pub const CAPSULE_SUFFIXES: [&str; 2] = ["Capsule", "Singleton"];

/// Identifier errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("segment {segment:?} contains the '.' separator")]
    SeparatorInSegment { segment: String },

    #[error("identifier is empty")]
    Empty,
}

/// Immutable hierarchical identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(Arc<str>);

impl Identifier {
    /// Create an identifier from a full dotted path.
    ///
    /// Empty paths and empty segments (`a..b`) are rejected.
    pub fn new(path: impl AsRef<str>) -> Result<Self, IdError> {
        let path = path.as_ref();
        if path.is_empty() || path.split(SEPARATOR).any(str::is_empty) {
            return Err(IdError::Empty);
        }
        Ok(Self(Arc::from(path)))
    }

    /// Create a root-level identifier (a single segment).
    pub fn root(name: &str) -> Result<Self, IdError> {
        check_segment(name)?;
        if name.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(Arc::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a single child segment.
    pub fn child(&self, name: &str) -> Result<Self, IdError> {
        append(self, &[name])
    }

    /// Last segment.
    pub fn component_name(&self) -> &str {
        component_name(self.as_str())
    }

    /// Parent identifier, `None` at root level.
    pub fn parent(&self) -> Option<Self> {
        parent_id(self.as_str()).map(|p| Self(Arc::from(p)))
    }

    /// Strict ancestor test (`self` is a proper prefix of `other`).
    pub fn is_ancestor_of(&self, other: &Identifier) -> bool {
        is_ancestor(self.as_str(), other.as_str())
    }

    /// Canonical form shared by every member of the same dynamic pool.
    pub fn archetypal(&self) -> Self {
        Self(Arc::from(archetypal_id(self.as_str())))
    }

    /// Iterate over segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", &self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0.to_string()
    }
}

impl std::str::FromStr for Identifier {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

fn check_segment(segment: &str) -> Result<(), IdError> {
    if segment.contains(SEPARATOR) {
        return Err(IdError::SeparatorInSegment {
            segment: segment.to_string(),
        });
    }
    Ok(())
}

/// Append segments to `base`. Empty segments are skipped.
pub fn append(base: &Identifier, segments: &[&str]) -> Result<Identifier, IdError> {
    let mut path = String::from(base.as_str());
    for segment in segments {
        check_segment(segment)?;
        if segment.is_empty() {
            continue;
        }
        path.push(SEPARATOR);
        path.push_str(segment);
    }
    Ok(Identifier(Arc::from(path)))
}

/// Last segment of `id`; the whole id when it has no separator.
pub fn component_name(id: &str) -> &str {
    match id.rfind(SEPARATOR) {
        Some(idx) => &id[idx + 1..],
        None => id,
    }
}

/// Parent of `id`, `None` for root-level ids.
pub fn parent_id(id: &str) -> Option<&str> {
    id.rfind(SEPARATOR).map(|idx| &id[..idx])
}

/// True when `ancestor` is a strict segment prefix of `descendant`.
pub fn is_ancestor(ancestor: &str, descendant: &str) -> bool {
    descendant.len() > ancestor.len()
        && descendant.starts_with(ancestor)
        && descendant[ancestor.len()..].starts_with(SEPARATOR)
}

/// Map every dynamic segment of `id` to [`ARCHETYPE`].
///
/// The segment following a capsule-style container is forced to the
/// placeholder; elsewhere each inter-term carrying a group ordinal is
/// replaced.
pub fn archetypal_id(id: &str) -> String {
    let mut parts: Vec<String> = id.split(SEPARATOR).map(str::to_string).collect();
    let mut i = 0;
    while i < parts.len() {
        let is_capsule = CAPSULE_SUFFIXES.iter().any(|s| parts[i].ends_with(s));
        if is_capsule && i + 1 < parts.len() {
            parts[i + 1] = ARCHETYPE.to_string();
            i += 2;
            continue;
        }
        let mapped: Vec<&str> = parts[i]
            .split(INTER_TERM_SEPARATOR)
            .map(|term| {
                if term.contains(GROUP_SEPARATOR) {
                    ARCHETYPE
                } else {
                    term
                }
            })
            .collect();
        parts[i] = mapped.join(&INTER_TERM_SEPARATOR.to_string());
        i += 1;
    }
    parts.join(&SEPARATOR.to_string())
}

/// Component name of the `index`th member of a group.
pub fn group_element_name(prefix: &str, index: u64) -> String {
    format!("{}{}{}", prefix, GROUP_SEPARATOR, index)
}

/// Ordinal carried by a group member's component name.
pub fn group_element_index(component: &str) -> Option<u64> {
    let (_, ordinal) = component.rsplit_once(GROUP_SEPARATOR)?;
    ordinal.parse().ok()
}
