//! Property-based test generators using proptest.
//!
//! Provides strategies for keys, key ranges and records.

use neoidb_engine::{Key, KeyRange};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for valid store and index names.
pub fn store_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for scalar keys of every scalar type.
pub fn scalar_key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        any::<i64>().prop_map(Key::Integer),
        "[a-z]{0,8}".prop_map(Key::Text),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Key::Binary),
    ]
}

/// Strategy for keys, including nested arrays.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    scalar_key_strategy().prop_recursive(2, 8, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Key::Array)
    })
}

/// Strategy for distinct integer keys in a small domain.
pub fn distinct_int_keys_strategy(max: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(0i64..1000, 0..=max).prop_map(|set| set.into_iter().collect())
}

/// Strategy for valid (non-empty) integer key ranges.
pub fn int_range_strategy() -> impl Strategy<Value = KeyRange> {
    (0i64..1000, 0i64..100, any::<bool>(), any::<bool>()).prop_map(
        |(lower, width, lower_open, upper_open)| {
            let upper = lower + width + 1;
            KeyRange::bound(lower, upper, lower_open, upper_open).expect("lower is below upper")
        },
    )
}

/// Strategy for note records matching the fixture schema.
pub fn note_strategy() -> impl Strategy<Value = Value> {
    (
        "[a-z ]{1,12}",
        0i64..5,
        prop::collection::vec("[a-c]", 0..3),
    )
        .prop_map(|(title, priority, tags)| {
            json!({ "title": title, "priority": priority, "tags": tags })
        })
}

/// Strategy for schema-less record values.
pub fn record_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}
