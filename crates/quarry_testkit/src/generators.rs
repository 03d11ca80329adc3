//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data that stays within
//! the constraints stores place on names and records.

use crate::structures::Event;
use proptest::prelude::*;

/// Strategy for generating raw records (arbitrary bytes).
pub fn record_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for generating a batch of raw records.
pub fn records_strategy(max: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(record_strategy(), 0..max)
}

/// Strategy for generating one name component that is never reserved.
pub fn name_component_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,7}").expect("Invalid regex")
}

/// Strategy for generating logical names of one to three components.
pub fn logical_name_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(name_component_strategy(), 1..=3).prop_map(|parts| parts.join("/"))
}

/// Strategy for generating strings [`PrefixStructure`](crate::PrefixStructure)
/// can route.
pub fn prefix_record_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-y][a-z]{0,8}|z[a-z]{1,8}").expect("Invalid regex")
}

/// Strategy for generating [`Event`]s over a few regions and days.
pub fn event_strategy() -> impl Strategy<Value = Event> {
    (
        prop::sample::select(vec!["eu", "us", "ap"]),
        0u32..5,
        prop::string::string_regex("[a-z]{0,12}").expect("Invalid regex"),
    )
        .prop_map(|(region, day, payload)| Event::new(region, day, &payload))
}

/// Strategy for generating stored files: each file is a batch of records.
pub fn files_strategy(max_files: usize, max_records: usize) -> impl Strategy<Value = Vec<Vec<Vec<u8>>>> {
    prop::collection::vec(records_strategy(max_records), 1..max_files)
}
