// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resetting the process-wide descriptor caches. A single test in its own
//! binary: clearing affects every parametric descriptor in the process.

use iograph::builtins::{array_io, map_io, nullable_io, number_io, string_io};
use iograph::cache::{clear_all_caches, ParametricKey, TypeCache};
use iograph::IoType;
use std::sync::Arc;

#[test]
fn test_clear_all_caches_rebuilds_descriptors() {
    let dropped: Arc<TypeCache<ParametricKey>> = TypeCache::new();
    drop(dropped);

    let private: Arc<TypeCache<ParametricKey>> = TypeCache::new();
    let key = ParametricKey::untyped(&[&number_io()]);
    private.get_or_create(key.clone(), || {
        IoType::builder("WrapperIO<NumberIO>")
            .value_type::<f64>()
            .build()
            .unwrap()
    });

    let nullable = nullable_io::<f64>(&number_io());
    let array = array_io::<String>(&string_io());
    let map = map_io::<String, f64>(&string_io(), &number_io());
    assert_eq!(nullable, nullable_io::<f64>(&number_io()));

    clear_all_caches();

    assert!(private.get(&key).is_none());
    let nullable_again = nullable_io::<f64>(&number_io());
    assert_ne!(nullable, nullable_again);
    assert_eq!(nullable.name(), nullable_again.name());
    assert_ne!(array, array_io::<String>(&string_io()));
    assert_ne!(map, map_io::<String, f64>(&string_io(), &number_io()));

    // Leaf descriptors are not parametric and survive.
    assert_eq!(number_io(), number_io());
    // Fresh descriptors are memoized again.
    assert_eq!(nullable_again, nullable_io::<f64>(&number_io()));
}
