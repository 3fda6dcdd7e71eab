use super::*;

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

const BUCKETS: usize = 12;
type Pool = BytePool<24, BUCKETS, Align8>;

#[derive(Debug, Clone)]
enum PoolOp {
    Alloc(usize),
    /// Free the bucket at this index, live or not.
    FreeBucket(usize),
    /// Free an arbitrary byte offset from the arena base.
    FreeOffset(usize),
    Reset,
}

fn pool_op() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        6 => (0usize..=32).prop_map(PoolOp::Alloc),
        4 => (0usize..BUCKETS + 2).prop_map(PoolOp::FreeBucket),
        2 => (0usize..Pool::stride() * (BUCKETS + 2)).prop_map(PoolOp::FreeOffset),
        1 => Just(PoolOp::Reset),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_pool_matches_bitmap_model(ops in prop::collection::vec(pool_op(), 1..200)) {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut pool = Pool::new();
        let mut model = BTreeSet::new();
        let base = pool.base().as_ptr();

        for op in ops {
            match op {
                PoolOp::Alloc(size) => {
                    let res = pool.allocate(size);
                    if size > Pool::bucket_size() {
                        prop_assert!(
                            matches!(res, Err(AllocError::TooLarge { .. })),
                            "oversized request must be rejected"
                        );
                    } else if model.len() == BUCKETS {
                        prop_assert_eq!(res, Err(AllocError::Exhausted { capacity: BUCKETS }));
                    } else {
                        let expected = (0..BUCKETS).find(|i| !model.contains(i)).unwrap();
                        let ptr = res.unwrap();
                        prop_assert_eq!(pool.index_of(ptr.as_ptr()), Some(expected));
                        prop_assert_eq!(ptr.as_ptr().addr() % Pool::bucket_align(), 0);
                        model.insert(expected);
                    }
                }
                PoolOp::FreeBucket(index) => {
                    pool.deallocate(base.wrapping_add(index * Pool::stride()));
                    model.remove(&index);
                }
                PoolOp::FreeOffset(offset) => {
                    pool.deallocate(base.wrapping_add(offset));
                    if offset % Pool::stride() == 0 {
                        model.remove(&(offset / Pool::stride()));
                    }
                }
                PoolOp::Reset => {
                    pool.reset();
                    model.clear();
                }
            }

            prop_assert_eq!(pool.reserved(), model.len());
            prop_assert_eq!(pool.reserved() + pool.available(), pool.capacity());
            for index in 0..BUCKETS {
                let addr = base.wrapping_add(index * Pool::stride());
                prop_assert_eq!(pool.is_allocated(addr), model.contains(&index));
            }
        }
    }

    #[test]
    fn prop_typed_pool_drops_each_value_once(
        ops in prop::collection::vec((any::<bool>(), 0usize..8), 1..100)
    ) {
        use std::rc::Rc;

        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let token = Rc::new(());
        {
            let mut pool = TypedPool::<Rc<()>, 6>::new();
            let mut model = BTreeSet::new();
            for (store, index) in ops {
                if store {
                    match pool.insert(Rc::clone(&token)) {
                        Ok(i) => prop_assert!(model.insert(i)),
                        Err(err) => prop_assert_eq!(err.capacity(), 6),
                    }
                } else {
                    prop_assert_eq!(pool.remove(index).is_some(), model.remove(&index));
                }
                prop_assert_eq!(Rc::strong_count(&token), model.len() + 1);
                prop_assert_eq!(pool.iter().map(|(i, _)| i).collect::<Vec<_>>(),
                    model.iter().copied().collect::<Vec<_>>());
            }
        }
        prop_assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn prop_tree_stays_balanced(keys in prop::collection::vec(any::<i16>(), 0..80)) {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut tree = RbTree::<i16, 64>::new();
        let mut model = Vec::new();

        for key in keys {
            match tree.insert(key) {
                Ok(()) => model.push(key),
                Err(err) => {
                    prop_assert_eq!(model.len(), 64);
                    prop_assert_eq!(err.into_inner(), key);
                }
            }
            tree.check_invariants();
        }

        model.sort_unstable();
        prop_assert_eq!(tree.len(), model.len());
        prop_assert_eq!(tree.iter().copied().collect::<Vec<_>>(), model.clone());
        for key in &model {
            prop_assert_eq!(tree.search(key), Some(key));
        }
        prop_assert_eq!(tree.first(), model.first());
        prop_assert_eq!(tree.last(), model.last());
    }

    #[test]
    fn prop_tree_search_misses_absent_keys(
        present in prop::collection::btree_set(0u32..1000, 0..40),
        probes in prop::collection::vec(0u32..1000, 1..40),
    ) {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut tree = RbTree::<u32, 40>::new();
        prop_assert_eq!(tree.insert_all(present.iter().copied()), present.len());

        for probe in probes {
            prop_assert_eq!(tree.contains(&probe), present.contains(&probe));
        }
    }

    #[test]
    fn prop_static_map_matches_btreemap(
        entries in prop::collection::vec((0u8..40, any::<u32>()), 0..60)
    ) {
        let _guard = crate::memory::TEST_MUTEX.read().unwrap();
        let mut map = StaticMap::<u8, u32, 16>::new();
        let mut model = BTreeMap::new();

        for (key, value) in entries {
            let fits = model.len() < 16 || model.contains_key(&key);
            match map.insert(key, value) {
                Ok(previous) => {
                    prop_assert!(fits);
                    prop_assert_eq!(previous, model.insert(key, value));
                }
                Err(err) => {
                    prop_assert!(!fits);
                    prop_assert_eq!(err.into_inner(), (key, value));
                }
            }
        }

        prop_assert_eq!(map.len(), model.len());
        prop_assert!(map.iter().map(|(k, v)| (*k, *v)).eq(model.iter().map(|(k, v)| (*k, *v))));
        for key in 0u8..40 {
            prop_assert_eq!(map.get(&key), model.get(&key));
        }
    }
}
