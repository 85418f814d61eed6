use crate::cache::{
    CacheKey, CachePolicy, FractalPolicy, GraphCache, LfuPolicy, LruPolicy,
    NodeCache,
};

#[test]
fn lru_evicts_the_least_recently_used_entry() {
    let cache = GraphCache::with_policy(Box::new(LruPolicy::new(2)));

    cache.store(1.0);
    cache.store(2.0);
    assert!(cache.get(&1.0).is_some()); // 1 becomes most recent
    cache.store(3.0); // evicts 2

    assert!(cache.get(&1.0).is_some());
    assert!(cache.get(&2.0).is_none());
    assert!(cache.get(&3.0).is_some());
    assert_eq!(cache.len(), 2);
}

#[test]
fn lfu_evicts_the_least_frequently_used_entry() {
    let cache = GraphCache::with_policy(Box::new(LfuPolicy::new(2)));

    cache.store(1.0);
    cache.store(2.0);
    cache.get(&1.0);
    cache.get(&1.0);
    cache.store(3.0); // 2.0 has the lowest count

    assert!(cache.get(&1.0).is_some());
    assert!(cache.get(&2.0).is_none());
    assert!(cache.get(&3.0).is_some());
}

#[test]
fn capacity_is_never_exceeded() {
    let cache = GraphCache::with_policy(Box::new(LruPolicy::new(3)));

    for i in 0..100 {
        cache.store(f64::from(i));
        assert!(cache.len() <= 3);
    }
}

#[test]
fn restore_notifies_access_instead_of_duplicating() {
    let cache = GraphCache::with_policy(Box::new(LruPolicy::new(2)));

    cache.store(1.0);
    cache.store(2.0);
    cache.store(1.0); // refresh, not insert
    cache.store(3.0); // evicts 2

    assert!(cache.get(&1.0).is_some());
    assert!(cache.get(&2.0).is_none());
}

#[test]
fn unbounded_cache_keeps_everything() {
    let cache = GraphCache::default();

    for i in 0..50 {
        cache.store(f64::from(i));
    }

    assert_eq!(cache.len(), 50);
}

#[test]
fn empty_policy_has_no_victim() {
    let mut policy = LruPolicy::new(2);

    let error =
        <LruPolicy as CachePolicy<f64>>::select_victim(&mut policy)
            .unwrap_err();
    assert_eq!(error.kind(), crate::error::ErrorKind::Resource);
}

#[test]
fn custom_key_fn_overrides_value_identity() {
    let cache = GraphCache::default();
    cache.set_key_fn(|value: &f64| CacheKey(*value as u64));

    cache.store(1.2);
    // 1.7 collides with 1.2 under the truncating key, so it only refreshes
    cache.store(1.7);

    assert_eq!(cache.len(), 1);
}

#[test]
fn fractal_policy_evicts_from_the_fullest_stale_level() {
    let mut policy: FractalPolicy<f64> =
        FractalPolicy::with_estimator(4, |value| *value as u8);

    for i in 0..4 {
        policy.on_insert(CacheKey(i), &2.0); // level 2 fills its budget
    }
    policy.on_insert(CacheKey(100), &5.0); // level 5, most recent

    // level 2 exceeds half its budget and is staler than level 5
    let victim = policy.select_victim().unwrap();
    assert_eq!(victim, CacheKey(0)); // oldest key of level 2
}

#[test]
fn fractal_policy_compresses_a_full_level_downward() {
    let mut policy: FractalPolicy<f64> =
        FractalPolicy::with_estimator(2, |value| *value as u8);

    policy.on_insert(CacheKey(1), &3.0);
    policy.on_insert(CacheKey(2), &3.0);
    // level 3 is at its budget; the next insert displaces its oldest half
    policy.on_insert(CacheKey(3), &3.0);

    // the displaced key now evicts from level 2 via the highest-level
    // fallback path once level 3 drains
    let first = policy.select_victim().unwrap();
    let second = policy.select_victim().unwrap();
    let third = policy.select_victim().unwrap();

    let mut evicted = [first, second, third];
    evicted.sort_by_key(|key| key.0);
    assert_eq!(evicted, [CacheKey(1), CacheKey(2), CacheKey(3)]);

    assert!(policy.select_victim().is_err());
}

#[test]
fn fractal_cache_end_to_end_capacity() {
    let cache =
        GraphCache::with_policy(Box::new(FractalPolicy::<f64>::new(1)));

    for i in 0..100 {
        cache.store(f64::from(i));
        assert!(cache.len() <= 32);
    }
}

#[test]
fn node_cache_holds_one_value() {
    let cache = NodeCache::default();

    assert_eq!(cache.get(), None);
    cache.store(1);
    cache.store(2);
    assert_eq!(cache.get(), Some(2));
    cache.clear();
    assert_eq!(cache.get(), None);
}
