use super::{AvlTree, Error};

use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum Op {
    Put(u16, u32),
    Delete(u16),
    Get(u16),
}

// A narrow key range makes overwrites and hits on delete common.
fn key_strategy() -> impl Strategy<Value = u16> + Clone {
    0u16..512
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = key_strategy();
    let op = prop_oneof![
        50 => (key.clone(), any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        30 => key.clone().prop_map(Op::Delete),
        20 => key.prop_map(Op::Get),
    ];
    prop::collection::vec(op, 0..=1000)
}

fn entries(tree: &AvlTree<u16, u32>) -> Vec<(u16, u32)> {
    tree.iter().map(|(k, v)| (*k, *v)).collect()
}

fn reference_entries(m: &BTreeMap<u16, u32>) -> Vec<(u16, u32)> {
    m.iter().map(|(k, v)| (*k, *v)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut t: AvlTree<u16, u32> = AvlTree::new();
        let mut m: BTreeMap<u16, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Put(key, value) => {
                    let old_t = t.put(key, value);
                    let old_m = m.insert(key, value);
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Delete(key) => {
                    let old_t = t.delete(&key);
                    let old_m = m.remove(&key).ok_or(Error::KeyNotFound);
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key), m.get(&key));
                    prop_assert_eq!(t.contains(&key), m.contains_key(&key));
                }
            }

            prop_assert_eq!(t.len(), m.len());
            t.check_consistency();
        }

        prop_assert_eq!(entries(&t), reference_entries(&m));
    }

    #[test]
    fn prop_last_value_wins(pairs in prop::collection::vec((key_strategy(), any::<u32>()), 0..=500)) {
        let t: AvlTree<u16, u32> = pairs.iter().copied().collect();
        let m: BTreeMap<u16, u32> = pairs.iter().copied().collect();

        t.check_consistency();
        prop_assert_eq!(t.len(), m.len());
        prop_assert_eq!(t.iter().len(), m.len());
        prop_assert_eq!(entries(&t), reference_entries(&m));
    }

    #[test]
    fn prop_delete_any_subset(
        keys in prop::collection::btree_set(key_strategy(), 0..=300),
        seed in any::<u64>(),
    ) {
        use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

        let mut t: AvlTree<u16, u32> = keys.iter().map(|&k| (k, u32::from(k) * 2)).collect();
        let mut m: BTreeMap<u16, u32> = keys.iter().map(|&k| (k, u32::from(k) * 2)).collect();

        let mut order: Vec<u16> = keys.into_iter().collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let half = order.len() / 2;
        for key in &order[..half] {
            prop_assert_eq!(t.delete(key), Ok(u32::from(*key) * 2));
            m.remove(key);
            t.check_consistency();
            prop_assert_eq!(entries(&t), reference_entries(&m));
        }

        // Deleted keys stay deleted
        for key in &order[..half] {
            prop_assert_eq!(t.delete(key), Err(Error::KeyNotFound));
        }
        prop_assert_eq!(t.len(), order.len() - half);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_put_order_small_set() {
    let keys = [1, 2, 3, 4, 5, 6];
    for_each_permutation(&keys, |order| {
        let mut t = AvlTree::new();
        for key in &order {
            t.put(*key, *key);
            t.check_consistency();
        }
        let got: Vec<i32> = t.iter().map(|(k, _)| *k).collect();
        assert_eq!(got, keys);
        assert!(t.height() <= 3);
    });
}

#[test]
fn exhaustive_delete_order_small_set() {
    let keys = [1, 2, 3, 4, 5, 6];
    let base: AvlTree<i32, i32> = keys.iter().map(|&k| (k, k)).collect();
    for_each_permutation(&keys, |order| {
        let mut t = base.clone();
        let mut remaining = keys.to_vec();
        for key in &order {
            assert_eq!(t.delete(key), Ok(*key));
            remaining.retain(|k| k != key);
            t.check_consistency();
            let got: Vec<i32> = t.iter().map(|(k, _)| *k).collect();
            assert_eq!(got, remaining);
        }
        assert!(t.is_empty());
    });
}
