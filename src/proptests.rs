use super::*;

use crate::fingerprint::testing::FoldedBuilder;
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::HashMap;

/// 64 keys over 16 fingerprints with 4 ids per bucket: overflow is routine.
type Colliding = UnorderedMap<u16, u64, 4, FoldedBuilder<16>>;

fn validate_map<const N: usize, S>(m: &UnorderedMap<u16, u64, N, S>, model: &HashMap<u16, u64>)
where
    S: std::hash::BuildHasher,
{
    m.assert_consistent();

    assert_eq!(m.len(), model.len(), "live count must match model");
    for (k, v) in m.iter() {
        assert_eq!(model.get(k), Some(v), "map holds a record the model lacks");
    }

    let stats = m.index().stats();
    assert_eq!(
        stats.quick_entries + stats.bucketed_ids,
        m.len(),
        "every live record needs exactly one index id"
    );
    assert!(stats.bucketed_ids <= stats.collision_buckets * N);
    assert!(stats.bucketed_ids >= stats.collision_buckets * 2);

    let pool = m.pool();
    assert_eq!(
        pool.capacity(),
        pool.outstanding() + pool.free_slots(),
        "every pool slot is either live or free"
    );
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 8)]
    Add(#[proptest(strategy = "0u16..64")] u16, u64),
    #[proptest(weight = 4)]
    Delete(#[proptest(strategy = "0u16..64")] u16),
    #[proptest(weight = 2)]
    DeleteAt(#[proptest(strategy = "0usize..80")] usize),
    #[proptest(weight = 1)]
    DeleteRange(
        #[proptest(strategy = "0usize..70")] usize,
        #[proptest(strategy = "0usize..12")] usize,
    ),
    #[proptest(weight = 2)]
    Change(#[proptest(strategy = "0u16..64")] u16, u64),
    #[proptest(weight = 2)]
    ChangeOrAdd(#[proptest(strategy = "0u16..64")] u16, u64),
    #[proptest(weight = 4)]
    Get(#[proptest(strategy = "0u16..64")] u16),
    #[proptest(weight = 1)]
    Clear,
}

fn apply<const N: usize, S>(m: &mut UnorderedMap<u16, u64, N, S>, model: &mut HashMap<u16, u64>, op: Op)
where
    S: std::hash::BuildHasher,
{
    match op {
        Op::Add(key, value) => match m.add(key, value) {
            Ok(handle) => {
                assert!(model.insert(key, value).is_none(), "added a present key");
                assert_eq!(m.record(handle), Some((&key, &value)));
            }
            Err(MapError::DuplicateKey) => assert!(model.contains_key(&key)),
            Err(MapError::IndexFull { fingerprint, capacity }) => {
                assert!(!model.contains_key(&key));
                assert_eq!(capacity, N);
                assert_eq!(m.index().ids_for(fingerprint), N);
            }
            Err(MapError::NotFound) => panic!("add reported NotFound"),
        },
        Op::Delete(key) => {
            assert_eq!(m.delete(&key), model.remove(&key));
        }
        Op::DeleteAt(at) => {
            let last = m.key_at(m.len().wrapping_sub(1)).copied();
            match m.delete_at(at) {
                Some((k, v)) => {
                    assert_eq!(model.remove(&k), Some(v));
                    // The former last record fills the hole.
                    if let Some(last) = last.filter(|&l| l != k) {
                        assert_eq!(m.find_index(&last), Some(at));
                    }
                }
                None => assert!(at >= model.len()),
            }
        }
        Op::DeleteRange(start, count) => {
            let before: Vec<u16> = m.keys().copied().collect();
            let doomed: Vec<u16> = before.iter().skip(start).take(count).copied().collect();
            assert_eq!(m.delete_range(start, count), doomed.len());
            for k in &doomed {
                assert!(model.remove(k).is_some());
            }
            let survivors: Vec<u16> = before.into_iter().filter(|k| !doomed.contains(k)).collect();
            let after: Vec<u16> = m.keys().copied().collect();
            assert_eq!(after, survivors, "range delete must keep relative order");
        }
        Op::Change(key, value) => {
            let expected = model.get_mut(&key).map(|old| std::mem::replace(old, value));
            assert_eq!(m.change(&key, value).ok(), expected);
        }
        Op::ChangeOrAdd(key, value) => match m.change_or_add(key, value) {
            Ok(Some(old)) => assert_eq!(model.insert(key, value), Some(old)),
            Ok(None) => assert_eq!(model.insert(key, value), None),
            Err(MapError::IndexFull { .. }) => assert!(!model.contains_key(&key)),
            Err(e) => panic!("change_or_add failed with {e}"),
        },
        Op::Get(key) => {
            assert_eq!(m.get(&key), model.get(&key));
            assert_eq!(m.find_index(&key).is_some(), model.contains_key(&key));
        }
        Op::Clear => {
            m.clear();
            model.clear();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_colliding(ops in prop::collection::vec(any::<Op>(), 0..=1000)) {
        let mut m: Colliding = UnorderedMap::with_hasher(FoldedBuilder);
        let mut model: HashMap<u16, u64> = HashMap::new();

        for op in ops {
            apply(&mut m, &mut model, op);
            prop_assert_eq!(m.len(), model.len());
        }
        validate_map(&m, &model);
    }

    #[test]
    fn prop_equivalence_default_hasher(ops in prop::collection::vec(any::<Op>(), 0..=1000)) {
        let mut m: UnorderedMap<u16, u64> = UnorderedMap::new();
        let mut model: HashMap<u16, u64> = HashMap::new();

        for op in ops {
            apply(&mut m, &mut model, op);
            prop_assert_eq!(m.len(), model.len());
        }
        validate_map(&m, &model);
        prop_assert_eq!(m.index().collision_overflow_count(), 0);
    }

    #[test]
    fn prop_rebuild_is_identity(keys in prop::collection::hash_set(0u16..64, 0..32)) {
        let mut m: Colliding = UnorderedMap::with_hasher(FoldedBuilder);
        let mut model = HashMap::new();
        for k in keys {
            if m.add(k, u64::from(k)).is_ok() {
                model.insert(k, u64::from(k));
            }
        }
        let positions: Vec<u16> = m.keys().copied().collect();
        let overflow = m.index().collision_overflow_count();

        m.rebuild_index();

        validate_map(&m, &model);
        prop_assert_eq!(m.keys().copied().collect::<Vec<_>>(), positions);
        prop_assert_eq!(m.index().collision_overflow_count(), overflow);
    }
}

/// Visit every ordering of `items`, starting from the given one.
fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    let mut order: Vec<usize> = (0..items.len()).collect();
    loop {
        f(order.iter().map(|&i| items[i].clone()).collect());

        // Lexicographic successor of `order`.
        let Some(pivot) = (1..order.len()).rev().find(|&i| order[i - 1] < order[i]) else {
            return;
        };
        let swap = (pivot..order.len())
            .rev()
            .find(|&j| order[j] > order[pivot - 1])
            .unwrap();
        order.swap(pivot - 1, swap);
        order[pivot..].reverse();
    }
}

#[test]
fn exhaustive_delete_order_shared_fingerprints() {
    // Six keys over two fingerprints.
    let keys: Vec<u16> = (0..6).collect();
    let mut base: UnorderedMap<u16, u64, 8, FoldedBuilder<2>> = UnorderedMap::with_hasher(FoldedBuilder);
    let mut base_model = HashMap::new();
    for &k in &keys {
        base.add(k, u64::from(k) * 10).unwrap();
        base_model.insert(k, u64::from(k) * 10);
    }
    validate_map(&base, &base_model);

    for_each_permutation(&keys, |perm| {
        let mut m = base.clone();
        let mut model = base_model.clone();
        for k in perm {
            assert_eq!(m.delete(&k), model.remove(&k));
            validate_map(&m, &model);
        }
        assert!(m.is_empty());
        assert!(m.index().is_empty());
        assert_eq!(m.index().quick_map_count(), 0);
        assert_eq!(m.index().collision_count(), 0);
    });
}

#[test]
fn exhaustive_positional_delete_order() {
    let mut base: UnorderedMap<u16, u64, 4, FoldedBuilder<3>> = UnorderedMap::with_hasher(FoldedBuilder);
    let mut base_model = HashMap::new();
    for k in 0..6u16 {
        if base.add(k, u64::from(k)).is_ok() {
            base_model.insert(k, u64::from(k));
        }
    }
    let positions: Vec<usize> = (0..base.len()).collect();

    // Delete by position: the i-th chosen offset is taken modulo the live count.
    for_each_permutation(&positions, |perm| {
        let mut m = base.clone();
        let mut model = base_model.clone();
        for at in perm {
            let at = at % m.len();
            let (k, v) = m.delete_at(at).unwrap();
            assert_eq!(model.remove(&k), Some(v));
            validate_map(&m, &model);
        }
        assert!(m.is_empty());
    });
}
