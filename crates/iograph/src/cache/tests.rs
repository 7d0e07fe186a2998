// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//! Tests for TypeCache.

use super::*;
use crate::builtins::{map_io, number_io, string_io};
use crate::io_type::IoTypeError;

fn pair_io(cache: &TypeCache<ParametricKey>, a: &IoType, b: &IoType) -> IoType {
    cache.get_or_create(ParametricKey::untyped(&[a, b]), || {
        IoType::builder(format!("PairIO<{},{}>", a.name(), b.name()))
            .value_type::<(f64, f64)>()
            .parameter_types(vec![a.clone(), b.clone()])
            .build()
            .unwrap()
    })
}

#[test]
fn test_same_key_returns_identical_descriptor() {
    let cache: Arc<TypeCache<ParametricKey>> = TypeCache::new();
    let first = pair_io(&cache, &number_io(), &string_io());
    let second = pair_io(&cache, &number_io(), &string_io());
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats(), LookupStats { hits: 1, misses: 1 });
}

#[test]
fn test_parameter_order_matters() {
    let cache: Arc<TypeCache<ParametricKey>> = TypeCache::new();
    let ns = pair_io(&cache, &number_io(), &string_io());
    let sn = pair_io(&cache, &string_io(), &number_io());
    assert_ne!(ns, sn);
    assert_eq!(cache.len(), 2);

    let map_ns = map_io::<f64, String>(&number_io(), &string_io());
    let map_sn = map_io::<String, f64>(&string_io(), &number_io());
    assert_ne!(map_ns, map_sn);
    assert_eq!(map_ns.name(), "MapIO<NumberIO,StringIO>");
    assert_eq!(map_sn.name(), "MapIO<StringIO,NumberIO>");
}

#[test]
fn test_typed_key_separates_rust_types() {
    let a = ParametricKey::typed::<f64>(&[&number_io()]);
    let b = ParametricKey::typed::<i32>(&[&number_io()]);
    assert_ne!(a, b);
    assert_ne!(a, ParametricKey::untyped(&[&number_io()]));
    assert_eq!(a, ParametricKey::typed::<f64>(&[&number_io()]));
}

#[test]
fn test_failed_build_is_not_cached() {
    let cache: Arc<TypeCache<ParametricKey>> = TypeCache::new();
    let key = ParametricKey::untyped(&[&number_io()]);

    let failed: Result<IoType, IoTypeError> =
        cache.get_or_try_create(key.clone(), || IoType::builder("Broken").build());
    assert!(matches!(failed, Err(IoTypeError::InvalidName { .. })));
    assert!(cache.get(&key).is_none());
    assert!(cache.is_empty());

    let built = cache
        .get_or_try_create(key.clone(), || {
            IoType::builder("FixedIO").value_type::<f64>().build()
        })
        .unwrap();
    assert_eq!(cache.get(&key), Some(built));
}

#[test]
fn test_clear_empties_one_cache() {
    let cache: Arc<TypeCache<ParametricKey>> = TypeCache::new();
    let before = pair_io(&cache, &number_io(), &number_io());
    cache.clear();
    assert!(cache.is_empty());
    let after = pair_io(&cache, &number_io(), &number_io());
    assert_ne!(before, after);
    assert_eq!(after.name(), "PairIO<NumberIO,NumberIO>");
}
