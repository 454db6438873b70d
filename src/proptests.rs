#![cfg(test)]

// State-machine property tests for the three tables, compared against
// std::collections::HashMap as the model.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::vec::Vec;

use proptest::prelude::*;

use crate::IdLookup;
use crate::IndexedMap;
use crate::Mapping;
use crate::NULL_ID;
use crate::UniqueRefTable;
use crate::testing::ConstBuildHasher;
use crate::testing::LowBitsBuildHasher;
use crate::testing::SipHashBuilder;

#[derive(Clone, Debug)]
enum Op {
    Insert(u64, i32),
    Remove(u64),
    Get(u64),
    Upsert(u64),
    Reserve(usize),
    Clear,
}

// Keys come from a small range so inserts, removals and lookups keep hitting
// the same entries.
fn arb_ops(key_range: u64) -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        6 => (0..key_range, any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        4 => (0..key_range).prop_map(Op::Remove),
        3 => (0..key_range).prop_map(Op::Get),
        2 => (0..key_range).prop_map(Op::Upsert),
        1 => (0usize..24).prop_map(Op::Reserve),
        1 => Just(Op::Clear),
    ];
    proptest::collection::vec(op, 1..200)
}

fn run_mapping<S>(mut sut: Mapping<u64, i32, S>, ops: Vec<Op>) -> Result<(), TestCaseError>
where
    S: core::hash::BuildHasher,
{
    let mut model: HashMap<u64, i32> = HashMap::new();
    // Slot each live key was placed in; it must never change while live.
    let mut slots: HashMap<u64, usize> = HashMap::new();

    for op in ops {
        match op {
            Op::Insert(k, v) => {
                prop_assert_eq!(sut.insert(k, v), model.insert(k, v));
                let slot = sut.find_slot(&k);
                prop_assert!(slot.is_some());
                if let Some(&before) = slots.get(&k) {
                    prop_assert_eq!(slot, Some(before), "overwrite moved the slot");
                }
                slots.insert(k, slot.unwrap_or_default());
            }
            Op::Remove(k) => {
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
                slots.remove(&k);
                prop_assert!(!sut.contains_key(&k));
            }
            Op::Get(k) => {
                prop_assert_eq!(sut.get(&k), model.get(&k));
            }
            Op::Upsert(k) => {
                let got = *sut.get_or_insert_with(k, || -1);
                prop_assert_eq!(got, *model.entry(k).or_insert(-1));
                if let Some(slot) = sut.find_slot(&k) {
                    slots.entry(k).or_insert(slot);
                }
            }
            Op::Reserve(n) => {
                sut.reserve(n);
                prop_assert!(sut.capacity() >= sut.len() + n);
            }
            Op::Clear => {
                sut.clear();
                model.clear();
                slots.clear();
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        for (k, &slot) in &slots {
            prop_assert_eq!(sut.find_slot(k), Some(slot), "slot of {} moved", k);
            prop_assert_eq!(sut.slot(slot).map(|(key, _)| *key), Some(*k));
        }
        sut.assert_invariants();
    }

    let live: BTreeSet<u64> = sut.keys().copied().collect();
    prop_assert_eq!(live, model.keys().copied().collect::<BTreeSet<u64>>());
    Ok(())
}

fn run_indexed<S>(mut sut: IndexedMap<u64, i32, S>, ops: Vec<Op>) -> Result<(), TestCaseError>
where
    S: core::hash::BuildHasher,
{
    let mut model: HashMap<u64, i32> = HashMap::new();

    for op in ops {
        match op {
            Op::Insert(k, v) => {
                let position = sut.get_index_of(&k);
                let len = sut.len();
                prop_assert_eq!(sut.insert(k, v), model.insert(k, v));
                prop_assert_eq!(sut.get_index_of(&k), Some(position.unwrap_or(len)));
            }
            Op::Remove(k) => {
                let before: Vec<u64> = sut.keys().to_vec();
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
                if let Some(i) = before.iter().position(|&key| key == k) {
                    let mut expected = before;
                    expected.swap_remove(i);
                    prop_assert_eq!(sut.keys(), expected.as_slice());
                } else {
                    prop_assert_eq!(sut.keys(), before.as_slice());
                }
            }
            Op::Get(k) => {
                prop_assert_eq!(sut.get(&k), model.get(&k));
            }
            Op::Upsert(k) => {
                let got = *sut.get_or_insert(k);
                prop_assert_eq!(got, *model.entry(k).or_default());
            }
            Op::Reserve(n) => {
                sut.reserve(n);
                prop_assert!(sut.capacity() >= sut.len() + n);
            }
            Op::Clear => {
                sut.clear();
                model.clear();
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        for i in 0..sut.len() {
            let (k, v) = sut.at(i);
            prop_assert_eq!(model.get(k), Some(&*v));
        }
        sut.assert_invariants();
    }

    let live: BTreeSet<u64> = sut.keys().iter().copied().collect();
    prop_assert_eq!(live.len(), sut.len(), "duplicate key in packed storage");
    prop_assert_eq!(live, model.keys().copied().collect::<BTreeSet<u64>>());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_mapping_matches_model(ops in arb_ops(48)) {
        run_mapping(Mapping::with_hasher(SipHashBuilder::default()), ops)?;
    }

    #[test]
    fn prop_mapping_single_chain(ops in arb_ops(12)) {
        run_mapping(Mapping::with_hasher(ConstBuildHasher), ops)?;
    }

    #[test]
    fn prop_mapping_grouped_chains(ops in arb_ops(32)) {
        run_mapping(Mapping::with_capacity_and_hasher(4, LowBitsBuildHasher), ops)?;
    }

    #[test]
    fn prop_indexed_matches_model(ops in arb_ops(48)) {
        run_indexed(IndexedMap::with_hasher(SipHashBuilder::default()), ops)?;
    }

    #[test]
    fn prop_indexed_single_chain(ops in arb_ops(12)) {
        run_indexed(IndexedMap::with_hasher(ConstBuildHasher), ops)?;
    }

    #[test]
    fn prop_indexed_grouped_chains(ops in arb_ops(32)) {
        run_indexed(IndexedMap::with_capacity_and_hasher(4, LowBitsBuildHasher), ops)?;
    }

    // Visits are indices into a pool of boxed values, `None` standing for a
    // null reference. IDs must be dense in first-seen order, repeats must
    // return the complement, and null must never be stored.
    #[test]
    fn prop_unique_ids(pool_len in 1usize..64, visits in proptest::collection::vec(proptest::option::of(0usize..64), 0..256)) {
        let pool: Vec<Box<u64>> = (0..pool_len as u64).map(Box::new).collect();
        let mut table = UniqueRefTable::new();
        let mut first_seen: HashMap<usize, i32> = HashMap::new();

        for visit in visits {
            let target = visit.map(|i| &*pool[i % pool_len]);
            let raw = table.get_id(target);
            match (visit.map(|i| i % pool_len), IdLookup::from_raw(raw)) {
                (None, IdLookup::Null) => prop_assert_eq!(raw, NULL_ID),
                (Some(i), IdLookup::New(id)) => {
                    prop_assert!(!first_seen.contains_key(&i), "{} assigned twice", i);
                    prop_assert_eq!(id, first_seen.len());
                    first_seen.insert(i, raw);
                }
                (Some(i), IdLookup::Seen(id)) => {
                    prop_assert_eq!(first_seen.get(&i).copied(), Some(id as i32));
                }
                (visit, decoded) => {
                    prop_assert!(false, "visit {:?} decoded as {:?}", visit, decoded);
                }
            }
            prop_assert_eq!(table.len(), first_seen.len());
        }

        for (&i, &id) in &first_seen {
            prop_assert!(core::ptr::eq(table.get(id as usize).unwrap_or(&0), &*pool[i]));
        }
        table.assert_invariants();
    }
}
