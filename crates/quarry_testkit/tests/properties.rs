//! Property tests for store invariants.

use proptest::prelude::*;
use quarry_core::{CopyArgs, RenameMode, Store, StoreSpec, TypedStore, RENAME_PREFIX};
use quarry_storage::{FileSystem, MemoryFileSystem};
use quarry_testkit::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn memory() -> Arc<dyn FileSystem> {
    Arc::new(MemoryFileSystem::new())
}

fn sorted<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort();
    values
}

fn write_named(store: &Store, names: &BTreeSet<String>) {
    for name in names {
        write_strings(store, name, &[name.as_str()]);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn typed_writes_read_back_the_same_records(
        records in prop::collection::vec(prefix_record_strategy(), 0..40),
    ) {
        let store = TypedStore::create(memory(), "/p", PrefixStructure, true).unwrap();
        store.write_all(records.iter()).unwrap();
        prop_assert_eq!(sorted_records(store.iter().unwrap()), sorted(records));
    }

    #[test]
    fn sub_stores_hold_exactly_their_partition(
        records in prop::collection::vec(prefix_record_strategy(), 1..40),
    ) {
        let store = TypedStore::create(memory(), "/p", PrefixStructure, true).unwrap();
        store.write_all(records.iter()).unwrap();

        let prefixes: BTreeSet<String> = records.iter().map(|r| r[..1].to_string()).collect();
        for prefix in prefixes {
            let expected: Vec<String> = records.iter().filter(|r| r.starts_with(&prefix)).cloned().collect();
            let sub = store.sub_store(&prefix).unwrap();
            prop_assert_eq!(sorted_records(sub.iter().unwrap()), sorted(expected));
        }
    }

    #[test]
    fn events_round_trip_through_cbor(
        events in prop::collection::vec(event_strategy(), 0..30),
    ) {
        let store = TypedStore::create(memory(), "/e", EventStructure::default(), true).unwrap();
        store.write_all(events.iter()).unwrap();
        prop_assert_eq!(sorted_records(store.iter().unwrap()), sorted(events.clone()));

        for event in &events {
            let sub = store.sub_store(&format!("{}/{}", event.region, event.day)).unwrap();
            let held = sorted_records(sub.iter().unwrap());
            prop_assert!(held.iter().all(|e| e.region == event.region && e.day == event.day));
            prop_assert!(held.contains(event));
        }
    }

    #[test]
    fn consolidation_preserves_records(
        files in files_strategy(8, 6),
        budget in 1u64..256,
    ) {
        let store = Store::create(memory(), "/s", &StoreSpec::default(), true).unwrap();
        let mut expected = Vec::new();
        for (i, records) in files.iter().enumerate() {
            let refs: Vec<&[u8]> = records.iter().map(Vec::as_slice).collect();
            write_file(&store, &format!("part{i}"), &refs);
            expected.extend(records.iter().cloned());
        }
        let before = store.user_file_names().unwrap().len();

        let result = store.consolidate_with(budget).unwrap();
        prop_assert_eq!(result.files_before, before);
        prop_assert!(result.files_after <= before);
        prop_assert_eq!(all_records(&store), sorted(expected));
    }

    #[test]
    fn rename_if_necessary_only_renames_collisions(
        existing in prop::collection::btree_set(name_component_strategy(), 0..6),
        incoming in prop::collection::btree_set(name_component_strategy(), 1..6),
    ) {
        let fs = memory();
        let dest = Store::create(Arc::clone(&fs), "/dest", &StoreSpec::default(), true).unwrap();
        let source = Store::create(fs, "/source", &StoreSpec::default(), true).unwrap();
        write_named(&dest, &existing);
        write_named(&source, &incoming);

        let args = CopyArgs::new().rename_mode(RenameMode::RenameIfNecessary);
        let result = dest.copy_append(&source, &args).unwrap();
        let collisions = existing.intersection(&incoming).count();
        prop_assert_eq!(result.renamed, collisions);

        let names: BTreeSet<String> = dest.user_file_names().unwrap().into_iter().collect();
        for name in existing.union(&incoming) {
            prop_assert!(names.contains(name), "{} is missing", name);
        }
        let minted = names.iter().filter(|n| n.starts_with(RENAME_PREFIX)).count();
        prop_assert_eq!(minted, collisions);
        prop_assert_eq!(names.len(), existing.len() + incoming.len());
    }

    #[test]
    fn always_rename_keeps_no_incoming_name(
        incoming in prop::collection::btree_set(name_component_strategy(), 1..6),
    ) {
        let fs = memory();
        let dest = Store::create(Arc::clone(&fs), "/dest", &StoreSpec::default(), true).unwrap();
        let source = Store::create(fs, "/source", &StoreSpec::default(), true).unwrap();
        write_named(&source, &incoming);

        let args = CopyArgs::new().rename_mode(RenameMode::AlwaysRename);
        let result = dest.copy_append(&source, &args).unwrap();
        prop_assert_eq!(result.renamed, incoming.len());

        let names = dest.user_file_names().unwrap();
        prop_assert_eq!(names.len(), incoming.len());
        prop_assert!(names.iter().all(|n| n.starts_with(RENAME_PREFIX)));
        let mut expected: Vec<&str> = incoming.iter().map(String::as_str).collect();
        expected.sort_unstable();
        assert_contents(&dest, &expected);
    }
}
