// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use wd_core::test_support::{config, strategies::arb_config};

fn hashes(cfgs: &[Config]) -> HashSet<ConfigHash> {
    cfgs.iter().map(Config::hash).collect()
}

#[test]
fn first_assertion_is_added() {
    let mut cache = GroupCache::new();
    let (added, removed) = cache.put(&Group::new("s1", vec![config("x", "a")]));
    assert_eq!(hashes(&added), hashes(&[config("x", "a")]));
    assert!(removed.is_empty());
    assert_eq!(cache.refcount(config("x", "a").hash()), 1);
}

#[test]
fn unchanged_group_is_idempotent() {
    let mut cache = GroupCache::new();
    let group = Group::new("s1", vec![config("x", "a"), config("x", "b")]);
    cache.put(&group);
    let (added, removed) = cache.put(&group);
    assert!(added.is_empty());
    assert!(removed.is_empty());
}

#[test]
fn shared_config_is_added_once_and_survives_one_withdrawal() {
    let mut cache = GroupCache::new();
    let mut a = config("x", "a");
    a.set_source("s1");
    let mut b = config("x", "a");
    b.set_source("s2");

    let (added, _) = cache.put(&Group::new("s1", vec![a]));
    assert_eq!(added.len(), 1);
    let (added, _) = cache.put(&Group::new("s2", vec![b]));
    assert!(added.is_empty(), "already asserted by another source");
    assert_eq!(cache.refcount(config("x", "a").hash()), 2);

    let (_, removed) = cache.put(&Group::empty("s1"));
    assert!(removed.is_empty());
    assert_eq!(cache.refcount(config("x", "a").hash()), 1);

    let (_, removed) = cache.put(&Group::empty("s2"));
    assert_eq!(removed.len(), 1);
    assert!(cache.is_empty());
    assert_eq!(cache.source_count(), 0);
}

#[test]
fn withdrawal_reports_only_unshared_configs() {
    let mut cache = GroupCache::new();
    cache.put(&Group::new("s1", vec![config("x", "a"), config("x", "b"), config("x", "c")]));
    cache.put(&Group::new("s2", vec![config("x", "b")]));

    let (added, removed) = cache.put(&Group::empty("s1"));
    assert!(added.is_empty());
    assert_eq!(hashes(&removed), hashes(&[config("x", "a"), config("x", "c")]));
    assert_eq!(cache.source_count(), 1);
}

#[test]
fn replacing_a_list_reports_both_sides() {
    let mut cache = GroupCache::new();
    cache.put(&Group::new("s1", vec![config("x", "a"), config("x", "b")]));
    let (added, removed) = cache.put(&Group::new("s1", vec![config("x", "b"), config("x", "c")]));
    assert_eq!(hashes(&added), hashes(&[config("x", "c")]));
    assert_eq!(hashes(&removed), hashes(&[config("x", "a")]));
}

#[test]
fn duplicate_configs_within_a_group_count_once() {
    let mut cache = GroupCache::new();
    let (added, _) = cache.put(&Group::new("s1", vec![config("x", "a"), config("x", "a")]));
    assert_eq!(added.len(), 1);
    assert_eq!(cache.refcount(config("x", "a").hash()), 1);
}

#[test]
fn withdrawing_an_unknown_source_is_a_no_op() {
    let mut cache = GroupCache::new();
    let (added, removed) = cache.put(&Group::empty("never-seen"));
    assert!(added.is_empty() && removed.is_empty());
}

proptest! {
    #[test]
    fn refcount_matches_sources_asserting_hash(
        puts in prop::collection::vec(
            (0u8..3, prop::collection::vec(arb_config(), 0..4)),
            1..30,
        )
    ) {
        let mut cache = GroupCache::new();
        let mut latest: HashMap<String, HashSet<ConfigHash>> = HashMap::new();
        let mut live: HashSet<ConfigHash> = HashSet::new();

        for (source, cfgs) in puts {
            let source = format!("s{source}");
            let (added, removed) = cache.put(&Group::new(source.clone(), cfgs.clone()));

            for cfg in &added {
                prop_assert!(live.insert(cfg.hash()), "added twice without removal");
            }
            for cfg in &removed {
                prop_assert!(live.remove(&cfg.hash()), "removed while not live");
            }

            if cfgs.is_empty() {
                latest.remove(&source);
            } else {
                latest.insert(source, cfgs.iter().map(Config::hash).collect());
            }

            let mut expected: HashMap<ConfigHash, usize> = HashMap::new();
            for set in latest.values() {
                for hash in set {
                    *expected.entry(*hash).or_default() += 1;
                }
            }
            for (hash, count) in &expected {
                prop_assert_eq!(cache.refcount(*hash), *count);
            }
            prop_assert_eq!(cache.len(), expected.len());
            prop_assert_eq!(&live, &expected.keys().copied().collect::<HashSet<_>>());
        }
    }
}
