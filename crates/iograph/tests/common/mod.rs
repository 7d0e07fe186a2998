// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared circuit fixture: a group of batteries, a group of leads that
//! reference batteries, and a capsule holding one meter. [`Wiring`] nests a
//! vertex group inside every wire of a wire group.

#![allow(dead_code)]

use iograph::builtins::{number_io, reference_io, string_io};
use iograph::io_type::Method;
use iograph::restore::ApplyContext;
use iograph::schema::StateSchema;
use iograph::element::with_core;
use iograph::{
    ContainerError, DynamicContainer, Element, ElementFlags, ElementRef, ElementRegistry,
    Environment, Identifier, IoType, Recipe, StateEngine, StateError,
};
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
pub struct Battery {
    pub voltage: f64,
}

pub struct Lead {
    pub source: ElementRef,
}

#[derive(Debug)]
pub struct Meter {
    pub label: String,
}

pub struct Wire {
    pub gauge: f64,
    pub vertices: Arc<DynamicContainer>,
}

#[derive(Debug)]
pub struct Vertex {
    pub x: f64,
}

pub fn id(s: &str) -> Identifier {
    Identifier::new(s).unwrap()
}

pub fn battery_io() -> IoType {
    static BATTERY: OnceLock<IoType> = OnceLock::new();
    BATTERY
        .get_or_init(|| {
            IoType::builder("BatteryIO")
                .documentation("A battery with a fixed voltage")
                .value_type::<Battery>()
                .state_schema(StateSchema::composite([("voltage", number_io())]))
                .to_state::<Battery, _>(|b| Ok(json!({ "voltage": b.voltage })))
                .apply_state::<Battery, _>(|b, state, _| {
                    b.voltage = state["voltage"].as_f64().unwrap_or_default();
                    Ok(())
                })
                .state_to_args(|state, _| Ok(vec![state["voltage"].clone()]))
                .method(
                    "getVoltage",
                    Method::typed::<Battery, _>(number_io(), vec![], "Current voltage", |b, _| {
                        Ok(json!(b.voltage))
                    })
                    .invocable_for_read_only(),
                )
                .build()
                .unwrap()
        })
        .clone()
}

fn source_io() -> IoType {
    reference_io(&battery_io())
}

fn resolve_source(source: &Value, ctx: &ApplyContext) -> Result<ElementRef, StateError> {
    source_io().from_state_as::<ElementRef>(source, ctx)
}

pub fn lead_io() -> IoType {
    static LEAD: OnceLock<IoType> = OnceLock::new();
    LEAD.get_or_init(|| {
        IoType::builder("LeadIO")
            .documentation("A lead attached to a battery")
            .value_type::<Lead>()
            .state_schema(StateSchema::composite([("source", source_io())]))
            .to_state::<Lead, _>(|lead| {
                Ok(json!({ "source": source_io().to_state_object(&lead.source)? }))
            })
            .apply_state::<Lead, _>(|lead, state, ctx| {
                lead.source = resolve_source(&state["source"], ctx)?;
                Ok(())
            })
            .state_to_args(|state, ctx| {
                resolve_source(&state["source"], ctx)?;
                Ok(vec![state["source"].clone()])
            })
            .build()
            .unwrap()
    })
    .clone()
}

pub fn meter_io() -> IoType {
    static METER: OnceLock<IoType> = OnceLock::new();
    METER
        .get_or_init(|| {
            IoType::builder("MeterIO")
                .documentation("A labelled meter")
                .value_type::<Meter>()
                .state_schema(StateSchema::composite([("label", string_io())]))
                .to_state::<Meter, _>(|m| Ok(json!({ "label": m.label })))
                .apply_state::<Meter, _>(|m, state, _| {
                    m.label = state["label"].as_str().unwrap_or_default().to_string();
                    Ok(())
                })
                .state_to_args(|state, _| Ok(vec![state["label"].clone()]))
                .build()
                .unwrap()
        })
        .clone()
}

pub fn battery_recipe() -> Recipe {
    Recipe::new(1, |seed, args| {
        let voltage = args[0].as_f64().unwrap_or_default();
        let element = Element::new(seed.id.clone(), battery_io(), Battery { voltage })
            .with_flags(seed.flags);
        Ok(seed.registry.instrument(element)?)
    })
    .default_args(vec![json!(1.5)])
}

pub fn lead_recipe() -> Recipe {
    Recipe::new(1, |seed, args| {
        let ctx = ApplyContext::new(seed.registry.clone(), false);
        let source = resolve_source(&args[0], &ctx).map_err(ContainerError::from)?;
        let element = Element::new(seed.id.clone(), lead_io(), Lead { source }).with_flags(seed.flags);
        Ok(seed.registry.instrument(element)?)
    })
    .default_args(vec![json!({ "id": "circuit.stack.batteryGroup.archetype" })])
}

pub fn meter_recipe() -> Recipe {
    Recipe::new(1, |seed, args| {
        let label = args[0].as_str().unwrap_or_default().to_string();
        let element = Element::new(seed.id.clone(), meter_io(), Meter { label }).with_flags(seed.flags);
        Ok(seed.registry.instrument(element)?)
    })
    .default_args(vec![json!("V")])
}

/// Members are plain strings flagged out of state.
pub fn marker_recipe() -> Recipe {
    Recipe::new(1, |seed, args| {
        let label = args[0].as_str().unwrap_or_default().to_string();
        let flags = ElementFlags {
            state: false,
            ..seed.flags
        };
        let element = Element::new(seed.id.clone(), string_io(), label).with_flags(flags);
        Ok(seed.registry.instrument(element)?)
    })
}

pub fn vertex_io() -> IoType {
    static VERTEX: OnceLock<IoType> = OnceLock::new();
    VERTEX
        .get_or_init(|| {
            IoType::builder("VertexIO")
                .value_type::<Vertex>()
                .state_schema(StateSchema::composite([("x", number_io())]))
                .to_state::<Vertex, _>(|v| Ok(json!({ "x": v.x })))
                .apply_state::<Vertex, _>(|v, state, _| {
                    v.x = state["x"].as_f64().unwrap_or_default();
                    Ok(())
                })
                .state_to_args(|state, _| Ok(vec![state["x"].clone()]))
                .build()
                .unwrap()
        })
        .clone()
}

pub fn wire_io() -> IoType {
    static WIRE: OnceLock<IoType> = OnceLock::new();
    WIRE.get_or_init(|| {
        IoType::builder("WireIO")
            .documentation("A wire bending through a group of vertices")
            .value_type::<Wire>()
            .state_schema(StateSchema::composite([("gauge", number_io())]))
            .to_state::<Wire, _>(|w| Ok(json!({ "gauge": w.gauge })))
            .apply_state::<Wire, _>(|w, state, _| {
                w.gauge = state["gauge"].as_f64().unwrap_or_default();
                Ok(())
            })
            .state_to_args(|state, _| Ok(vec![state["gauge"].clone()]))
            .build()
            .unwrap()
    })
    .clone()
}

pub fn vertex_recipe() -> Recipe {
    Recipe::new(1, |seed, args| {
        let x = args[0].as_f64().unwrap_or_default();
        let element = Element::new(seed.id.clone(), vertex_io(), Vertex { x }).with_flags(seed.flags);
        Ok(seed.registry.instrument(element)?)
    })
    .default_args(vec![json!(0.0)])
}

/// Every wire owns a `vertexGroup` built by the recipe itself.
pub fn wire_recipe(env: Arc<Environment>) -> Recipe {
    Recipe::new(1, move |seed, args| {
        let gauge = args[0].as_f64().unwrap_or_default();
        let vertices = DynamicContainer::group(
            seed.id.child("vertexGroup")?,
            vertex_io(),
            vertex_recipe(),
            &env,
            seed.registry.clone(),
        )?;
        let element = Element::new(seed.id.clone(), wire_io(), Wire { gauge, vertices })
            .with_flags(seed.flags);
        Ok(seed.registry.instrument(element)?)
    })
    .default_args(vec![json!(1.0)])
}

/// The vertex group nested in `wire`.
pub fn wire_vertices(wire: &ElementRef) -> Arc<DynamicContainer> {
    with_core(wire, |w: &Wire| Arc::clone(&w.vertices)).unwrap()
}

pub struct Wiring {
    pub registry: ElementRegistry,
    pub engine: StateEngine,
    pub wires: Arc<DynamicContainer>,
}

impl Wiring {
    pub fn new() -> Self {
        let registry = ElementRegistry::new();
        let env = Arc::new(Environment::default());
        let wires = DynamicContainer::group(
            id("circuit.wireGroup"),
            wire_io(),
            wire_recipe(Arc::clone(&env)),
            &env,
            registry.clone(),
        )
        .unwrap();
        Self {
            engine: StateEngine::new(registry.clone()),
            registry,
            wires,
        }
    }

    pub fn add_wire(&self, gauge: f64) -> ElementRef {
        self.wires.create(&[json!(gauge)]).unwrap()
    }
}

/// Ids sort as `circuit.leadGroup...` < `circuit.meterCapsule...` <
/// `circuit.stack...`, so leads are restored before their batteries.
pub struct Circuit {
    pub registry: ElementRegistry,
    pub engine: Arc<StateEngine>,
    pub batteries: Arc<DynamicContainer>,
    pub leads: Arc<DynamicContainer>,
    pub meter: Arc<DynamicContainer>,
}

impl Circuit {
    pub fn new(env: &Environment) -> Self {
        Self::with_registry(env, ElementRegistry::new())
    }

    pub fn with_registry(env: &Environment, registry: ElementRegistry) -> Self {
        let batteries = DynamicContainer::group(
            id("circuit.stack.batteryGroup"),
            battery_io(),
            battery_recipe(),
            env,
            registry.clone(),
        )
        .unwrap();
        let leads = DynamicContainer::group(
            id("circuit.leadGroup"),
            lead_io(),
            lead_recipe(),
            env,
            registry.clone(),
        )
        .unwrap();
        let meter = DynamicContainer::capsule(
            id("circuit.meterCapsule"),
            meter_io(),
            meter_recipe(),
            env,
            registry.clone(),
        )
        .unwrap();

        Self {
            engine: Arc::new(StateEngine::new(registry.clone())),
            registry,
            batteries,
            leads,
            meter,
        }
    }

    pub fn add_battery(&self, voltage: f64) -> ElementRef {
        self.batteries.create(&[json!(voltage)]).unwrap()
    }

    pub fn add_lead(&self, battery: &ElementRef) -> ElementRef {
        let source = json!({ "id": battery.read().id().as_str() });
        self.leads.create(&[source]).unwrap()
    }
}
