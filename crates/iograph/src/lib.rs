// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # iograph - instrumented object graphs
//!
//! Exposes a running application's live objects as a versioned,
//! introspectable and serializable API. Every significant object has a
//! stable hierarchical [`Identifier`], an [`IoType`] describing how it is
//! converted to and from plain-data state, and may be created or destroyed at
//! runtime through a [`DynamicContainer`].
//!
//! ## Quick Start
//!
//! ```rust
//! use iograph::builtins::number_io;
//! use iograph::{Element, ElementRegistry, Identifier, StateEngine};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ElementRegistry::new();
//! let speed = Identifier::new("sim.model.speed")?;
//! registry.instrument(Element::new(speed.clone(), number_io(), 1.0f64))?;
//!
//! let engine = StateEngine::new(registry);
//! let mut state = engine.get_state()?;
//! assert_eq!(state.get(&speed), Some(&json!(1.0)));
//!
//! state.insert(speed.clone(), json!(4.0));
//! engine.set_state(&state)?;
//! assert_eq!(engine.get_state()?.get(&speed), Some(&json!(4.0)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  StateEngine: get_state / set_state / invoke      ApiSnapshot       |
//! +---------------------------------------------------------------------+
//! |  DynamicContainer (Group | Capsule | Singleton)   restore + retry   |
//! +---------------------------------------------------------------------+
//! |  ElementRegistry: Identifier -> Instrumented element                |
//! +---------------------------------------------------------------------+
//! |  IoType chain (ObjectIO root) | StateSchema | TypeCache             |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`id`] - identifier namespace (archetypal ids, group element names)
//! - [`io_type`] - IO type descriptors, builder, type registry
//! - [`schema`] - state schemas and key validation
//! - [`builtins`] - `ObjectIO`, leaf and parametric descriptors
//! - [`container`] - dynamic element containers
//! - [`engine`] - state capture, restore, deltas
//! - [`api`] - API snapshots, comparison and validation

pub mod api;
pub mod builtins;
pub mod cache;
pub mod config;
pub mod container;
pub mod element;
pub mod engine;
pub mod error;
pub mod id;
pub mod io_type;
pub mod restore;
pub mod retry;
pub mod schema;

pub use api::{compare, ApiComparison, ApiSnapshot, ApiValidator, Compatibility};
pub use cache::{clear_all_caches, TypeCache};
pub use config::{ApiMode, ConfigError, Environment, IographConfig};
pub use container::{ContainerError, ContainerEvent, ContainerKind, DynamicContainer, Recipe};
pub use element::{Element, ElementFlags, ElementRef, ElementRegistry, Instrumented};
pub use engine::{StateDelta, StateDocument, StateEngine};
pub use error::{StateError, ValidationError};
pub use id::{IdError, Identifier};
pub use io_type::{IoType, IoTypeError, StateObject};
pub use restore::ApplyContext;
pub use retry::NotYetDeserializable;
pub use schema::StateSchema;
