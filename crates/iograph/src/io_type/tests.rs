// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tests for IoType.

use super::*;
use crate::builtins::{number_io, object_io, string_io, void_io};
use crate::error::StateError;
use crate::schema::StateSchema;
use serde_json::json;

#[derive(Debug, Default)]
struct Battery {
    voltage: f64,
}

#[derive(Debug, Default)]
struct ChargedBattery {
    voltage: f64,
    charge: f64,
}

fn ctx() -> ApplyContext {
    ApplyContext::detached()
}

fn battery_io() -> IoType {
    IoType::builder("BatteryIO")
        .documentation("A battery")
        .value_type::<Battery>()
        .state_schema(StateSchema::composite([("voltage", number_io())]))
        .to_state::<Battery, _>(|b| Ok(json!({ "voltage": b.voltage })))
        .apply_state::<Battery, _>(|b, state, _| {
            b.voltage = state["voltage"].as_f64().unwrap_or_default();
            Ok(())
        })
        .events(["voltageChanged"])
        .metadata_default("unit", json!("V"))
        .method(
            "getVoltage",
            Method::typed::<Battery, _>(number_io(), vec![], "Current voltage", |b, _| {
                Ok(json!(b.voltage))
            })
            .invocable_for_read_only(),
        )
        .method(
            "setVoltage",
            Method::typed::<Battery, _>(void_io(), vec![number_io()], "Set the voltage", |b, args| {
                b.voltage = args[0].as_f64().unwrap_or_default();
                Ok(Value::Null)
            }),
        )
        .method_order(["getVoltage", "setVoltage"])
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn test_validator_required() {
    let err = IoType::builder("BareIO").build().unwrap_err();
    assert_eq!(
        err,
        IoTypeError::MissingValidator {
            name: "BareIO".into()
        }
    );
}

#[test]
fn test_name_must_end_in_io() {
    assert!(IoType::builder("BatteryIO<Cell>")
        .value_type::<Battery>()
        .build()
        .is_ok());
    assert!(IoType::builder("FunctionIO(NumberIO)")
        .value_type::<Battery>()
        .build()
        .is_ok());
    assert!(matches!(
        IoType::builder("Battery").value_type::<Battery>().build(),
        Err(IoTypeError::InvalidName { .. })
    ));
}

#[test]
fn test_method_documentation_required() {
    let err = IoType::builder("QuietIO")
        .value_type::<Battery>()
        .method("reset", Method::new(void_io(), vec![], "  ", |_, _| Ok(Value::Null)))
        .build()
        .unwrap_err();
    assert!(matches!(err, IoTypeError::MethodDocumentation { .. }));
}

#[test]
fn test_method_order_names_declared_methods() {
    let err = IoType::builder("OrderedIO")
        .value_type::<Battery>()
        .method("reset", Method::new(void_io(), vec![], "Reset", |_, _| Ok(Value::Null)))
        .method_order(["reset", "explode"])
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        IoTypeError::UnknownMethodInOrder {
            type_name: "OrderedIO".into(),
            method: "explode".into()
        }
    );
}

#[test]
fn test_events_and_metadata_cannot_shadow_ancestors() {
    let parent = battery_io();
    let err = IoType::builder("LoudBatteryIO")
        .supertype(&parent)
        .value_type::<Battery>()
        .events(["voltageChanged"])
        .build()
        .unwrap_err();
    assert!(matches!(err, IoTypeError::DuplicateEvent { ref ancestor, .. } if ancestor == "BatteryIO"));

    let err = IoType::builder("PinnedIO")
        .value_type::<Battery>()
        .metadata_default("readOnly", json!(true))
        .build()
        .unwrap_err();
    assert!(
        matches!(err, IoTypeError::DuplicateMetadataKey { ref ancestor, .. } if ancestor == "ObjectIO")
    );
}

#[test]
fn test_root_requires_every_state_function() {
    let err = IoTypeBuilder::root("OtherRootIO")
        .validator(Validator::Any)
        .to_state_any(|_| Ok(Value::Null))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        IoTypeError::RootMissingStateFunction {
            type_name: "OtherRootIO".into(),
            function: "from_state"
        }
    );
}

// ---------------------------------------------------------------------------
// Chain resolution
// ---------------------------------------------------------------------------

#[test]
fn test_chain_and_inheritance() {
    let battery = battery_io();
    assert_eq!(battery.supertype(), Some(&object_io()));
    assert!(battery.inherits_from(&object_io()));
    assert!(!object_io().inherits_from(&battery));
    assert_eq!(battery.supertypes(), vec![object_io()]);
    assert!(battery.is_serializable());
    assert!(battery.is_deserializable());
    assert!(!object_io().is_serializable());
}

#[test]
fn test_metadata_defaults_merge_up_the_chain() {
    let defaults = battery_io().resolved_metadata_defaults();
    assert_eq!(defaults["unit"], json!("V"));
    assert_eq!(defaults["state"], json!(true));
    assert_eq!(defaults.len(), object_io().resolved_metadata_defaults().len() + 1);
}

#[test]
fn test_identity_not_name_equality() {
    assert_ne!(battery_io(), battery_io());
    let battery = battery_io();
    assert_eq!(battery.clone(), battery);
    assert_eq!(battery.id(), battery.clone().id());
}

// ---------------------------------------------------------------------------
// State conversion
// ---------------------------------------------------------------------------

#[test]
fn test_to_state_is_schema_exact() {
    let battery = battery_io();
    let state = battery.to_state_object(&Battery { voltage: 9.0 }).unwrap();
    assert_eq!(state, json!({ "voltage": 9.0 }));

    let chatty = IoType::builder("ChattyIO")
        .value_type::<Battery>()
        .state_schema(StateSchema::composite([("voltage", number_io())]))
        .to_state::<Battery, _>(|b| Ok(json!({ "voltage": b.voltage, "extra": 1 })))
        .build()
        .unwrap();
    let err = chatty.to_state_object(&Battery::default()).unwrap_err();
    assert!(matches!(
        err,
        StateError::Validation(ValidationError::UnknownKey { ref key, .. }) if key == "extra"
    ));
}

#[test]
fn test_to_state_rejects_wrong_instance() {
    let err = battery_io().to_state_object(&42u8).unwrap_err();
    assert!(matches!(
        err,
        StateError::Validation(ValidationError::InvalidInstance { .. })
    ));
}

#[test]
fn test_subtype_schema_combines_parent_keys() {
    let parent = IoType::builder("CellIO")
        .value_type::<ChargedBattery>()
        .state_schema(StateSchema::composite([("voltage", number_io())]))
        .build()
        .unwrap();
    let child = IoType::builder("ChargedCellIO")
        .supertype(&parent)
        .value_type::<ChargedBattery>()
        .state_schema(StateSchema::composite([("charge", number_io())]))
        .to_state::<ChargedBattery, _>(|b| Ok(json!({ "voltage": b.voltage, "charge": b.charge })))
        .build()
        .unwrap();

    assert!(child.is_state_object_valid(&json!({ "voltage": 1.0, "charge": 0.5 })));
    assert!(matches!(
        child.validate_state_object(&json!({ "charge": 0.5 })),
        Err(ValidationError::MissingKey { ref key, .. }) if key == "voltage"
    ));
    assert!(matches!(
        child.validate_state_object(&json!({ "voltage": 1.0, "charge": 0.5, "x": 0 })),
        Err(ValidationError::UnknownKey { .. })
    ));
    // The parent alone does not claim "charge".
    assert!(!parent.is_state_object_valid(&json!({ "voltage": 1.0, "charge": 0.5 })));

    let state = child
        .to_state_object(&ChargedBattery {
            voltage: 3.0,
            charge: 0.25,
        })
        .unwrap();
    assert_eq!(state, json!({ "voltage": 3.0, "charge": 0.25 }));
}

#[test]
fn test_inherited_conversion_is_revalidated_against_new_schema() {
    let battery = battery_io();
    let labeled = IoType::builder("LabeledBatteryIO")
        .supertype(&battery)
        .value_type::<Battery>()
        .state_schema(StateSchema::composite([("label", string_io())]))
        .build()
        .unwrap();
    let err = labeled.to_state_object(&Battery { voltage: 1.0 }).unwrap_err();
    assert!(matches!(
        err,
        StateError::Validation(ValidationError::MissingKey { ref key, .. }) if key == "label"
    ));

    let plain = IoType::builder("PlainBatteryIO")
        .supertype(&battery)
        .value_type::<Battery>()
        .build()
        .unwrap();
    assert_eq!(
        plain.to_state_object(&Battery { voltage: 2.0 }).unwrap(),
        json!({ "voltage": 2.0 })
    );
}

#[test]
fn test_apply_state_round_trip() {
    let battery = battery_io();
    let mut target = Battery::default();
    let state = battery.to_state_object(&Battery { voltage: 4.5 }).unwrap();
    battery.apply_state(&mut target, &state, &ctx()).unwrap();
    assert_eq!(battery.to_state_object(&target).unwrap(), state);

    let err = battery
        .apply_state(&mut target, &json!({ "voltage": "high" }), &ctx())
        .unwrap_err();
    assert!(matches!(
        err,
        StateError::Validation(ValidationError::Field { .. })
    ));
}

#[test]
fn test_from_state_falls_back_to_root() {
    let err = battery_io()
        .from_state_object(&json!({ "voltage": 1.0 }), &ctx())
        .unwrap_err();
    assert!(matches!(err, StateError::NotDeserializable { ref type_name } if type_name == "ObjectIO"));
}

#[test]
fn test_from_state_as_downcasts() {
    let value: f64 = number_io().from_state_as(&json!(2.5), &ctx()).unwrap();
    assert_eq!(value, 2.5);
    assert!(matches!(
        number_io().from_state_as::<String>(&json!(2.5), &ctx()),
        Err(StateError::TypeMismatch { .. })
    ));
}

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

#[test]
fn test_invoke_methods() {
    let battery = battery_io();
    let mut core = Battery { voltage: 1.0 };
    battery
        .invoke(&mut core, "setVoltage", &[json!(6.0)], false)
        .unwrap();
    assert_eq!(
        battery.invoke(&mut core, "getVoltage", &[], false).unwrap(),
        json!(6.0)
    );
    assert_eq!(battery.method_order(), ["getVoltage", "setVoltage"]);
}

#[test]
fn test_invoke_checks_read_only_arity_and_params() {
    let battery = battery_io();
    let mut core = Battery::default();

    assert!(battery.invoke(&mut core, "getVoltage", &[], true).is_ok());
    assert!(matches!(
        battery.invoke(&mut core, "setVoltage", &[json!(1.0)], true),
        Err(StateError::ReadOnly { .. })
    ));
    assert!(matches!(
        battery.invoke(&mut core, "setVoltage", &[], false),
        Err(StateError::MethodArity {
            expected: 1,
            actual: 0,
            ..
        })
    ));
    assert!(matches!(
        battery.invoke(&mut core, "setVoltage", &[json!("six")], false),
        Err(StateError::Validation(_))
    ));
    assert!(matches!(
        battery.invoke(&mut core, "explode", &[], false),
        Err(StateError::UnknownMethod { .. })
    ));
}

#[test]
fn test_methods_resolve_up_the_chain() {
    let child = IoType::builder("SpareBatteryIO")
        .supertype(&battery_io())
        .value_type::<Battery>()
        .build()
        .unwrap();
    let mut core = Battery { voltage: 7.0 };
    assert_eq!(
        child.invoke(&mut core, "getVoltage", &[], true).unwrap(),
        json!(7.0)
    );
    assert_eq!(child.events(), vec!["voltageChanged".to_string()]);
}

// ---------------------------------------------------------------------------
// Core-type descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counter {
    count: f64,
}

impl CoreState for Counter {
    fn state_schema() -> StateSchema {
        StateSchema::composite([("count", number_io())])
    }

    fn to_state_object(&self) -> Result<StateObject, StateError> {
        Ok(json!({ "count": self.count }))
    }

    fn apply_state(&mut self, state: &StateObject, _ctx: &ApplyContext) -> Result<(), StateError> {
        self.count = state["count"].as_f64().unwrap_or_default();
        Ok(())
    }
}

#[test]
fn test_from_core_type() {
    let counter_io = IoType::from_core_type::<Counter>("CounterIO", "Counts things").unwrap();
    assert_eq!(counter_io.documentation(), "Counts things");

    let mut counter = Counter::default();
    counter_io
        .apply_state(&mut counter, &json!({ "count": 3 }), &ctx())
        .unwrap();
    assert_eq!(counter.count, 3.0);
    assert_eq!(
        counter_io.to_state_object(&counter).unwrap(),
        json!({ "count": 3.0 })
    );
    assert_eq!(
        counter_io
            .state_to_args(&json!({ "count": 3 }), &ctx())
            .unwrap(),
        Vec::<Value>::new()
    );
}

// ---------------------------------------------------------------------------
// Type registry
// ---------------------------------------------------------------------------

#[test]
fn test_registry_collects_closure() {
    let battery = battery_io();
    let registry = TypeRegistry::collect([&battery]).unwrap();
    for name in ["BatteryIO", "ObjectIO", "NumberIO", "VoidIO"] {
        assert!(registry.contains(name), "missing {}", name);
    }
    assert!(registry.get("BatteryIO").is_some_and(|t| t == &battery));
}

#[test]
fn test_registry_rejects_duplicate_names() {
    let a = battery_io();
    let b = battery_io();
    assert_eq!(
        TypeRegistry::collect([&a, &b]).unwrap_err(),
        IoTypeError::DuplicateName {
            name: "BatteryIO".into()
        }
    );
}

#[test]
fn test_registry_rejects_second_root() {
    let other_root = IoTypeBuilder::root("OtherRootIO")
        .validator(Validator::Any)
        .to_state_any(|_| Ok(Value::Null))
        .from_state_any(|_, _| Ok(Box::new(())))
        .state_to_args(|_, _| Ok(Vec::new()))
        .apply_state_any(|_, _, _| Ok(()))
        .build()
        .unwrap();
    let battery = battery_io();
    assert!(matches!(
        TypeRegistry::collect([&battery, &other_root]),
        Err(IoTypeError::MultipleRoots { .. })
    ));
}
