//! Integration tests for the shared completion cache
//!
//! Verifies that the cache:
//! - Overwrites file entries idempotently
//! - Keeps the merged global list equal to the dedup union of both partitions
//! - Invalidates single files and all files without touching partitions
//! - Never exposes a torn merged list to concurrent readers

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use quickcheck::{QuickCheck, TestResult};

use hs_autocomplete::cache::SharedCompletionCache;
use hs_autocomplete::candidate::{Candidate, CandidateList};

/// Small alphabet so generated lists overlap often
fn candidates(raw: &[(u8, u8)]) -> CandidateList {
    raw.iter()
        .map(|(d, i)| Candidate::new(format!("sym{}\tFn", d % 8), format!("sym{}", i % 4)))
        .collect()
}

fn as_set(list: &[Candidate]) -> BTreeSet<(String, String)> {
    list.iter().map(|c| (c.display.clone(), c.insert.clone())).collect()
}

fn is_sorted_unique(list: &[Candidate]) -> bool {
    list.windows(2).all(|w| w[0] < w[1])
}

#[test]
fn test_set_file_candidates_is_idempotent() {
    fn prop(raw: Vec<(u8, u8)>) -> TestResult {
        let cache = SharedCompletionCache::new();
        let path = Path::new("/work/A.hs");
        let list = candidates(&raw);

        cache.set_file_candidates(path, list.clone());
        cache.set_file_candidates(path, list.clone());

        match cache.get_file_candidates(path) {
            Some(stored) if as_set(&stored) == as_set(&list) => TestResult::passed(),
            _ => TestResult::failed(),
        }
    }

    QuickCheck::new()
        .tests(200)
        .quickcheck(prop as fn(Vec<(u8, u8)>) -> TestResult);
}

#[test]
fn test_global_is_dedup_union_of_partitions() {
    fn prop(cabal: Vec<(u8, u8)>, sources: Vec<(u8, u8)>) -> TestResult {
        let cache = SharedCompletionCache::new();
        let a = candidates(&cabal);
        let b = candidates(&sources);

        cache.set_cabal_partition(a.clone());
        cache.set_source_partition(b.clone());

        let global = cache.global_candidates();
        let expected: BTreeSet<_> = as_set(&a).union(&as_set(&b)).cloned().collect();

        TestResult::from_bool(as_set(&global) == expected && is_sorted_unique(&global) && global.len() == expected.len())
    }

    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(Vec<(u8, u8)>, Vec<(u8, u8)>) -> TestResult);
}

#[test]
fn test_empty_partitions_give_empty_global() {
    let cache = SharedCompletionCache::new();
    cache.set_cabal_partition(Vec::new());
    cache.set_source_partition(Vec::new());
    assert!(cache.global_candidates().is_empty());
}

#[test]
fn test_invalidate_single_file() {
    let cache = SharedCompletionCache::new();
    let a = PathBuf::from("/work/A.hs");
    let b = PathBuf::from("/work/B.hs");
    cache.set_file_candidates(&a, vec![Candidate::new("foo\tFn", "foo")]);
    cache.set_file_candidates(&b, vec![Candidate::new("bar\tFn", "bar")]);

    assert!(cache.invalidate(&a));
    assert!(cache.get_file_candidates(&a).is_none());
    assert!(cache.get_file_candidates(&b).is_some());
}

#[test]
fn test_invalidate_all_keeps_partitions() {
    let cache = SharedCompletionCache::new();
    cache.set_cabal_partition(vec![Candidate::new("map\tFn", "map")]);
    cache.set_source_partition(vec![Candidate::new("helper\tFn", "helper")]);
    let global_before = cache.global_candidates();

    for i in 0..5 {
        cache.set_file_candidates(format!("/work/M{}.hs", i), vec![Candidate::plain("x")]);
    }
    assert_eq!(cache.invalidate_all(), 5);

    for i in 0..5 {
        assert!(cache.get_file_candidates(Path::new(&format!("/work/M{}.hs", i))).is_none());
    }
    assert_eq!(cache.global_candidates(), global_before);
    assert_eq!(cache.stats().files, 0);
    assert_eq!(cache.stats().invalidations, 5);
}

#[test]
fn test_concurrent_partition_writes_never_tear_global() {
    let cache = SharedCompletionCache::new();
    let small = vec![Candidate::plain("a")];
    let large = vec![Candidate::plain("a"), Candidate::plain("b"), Candidate::plain("c")];
    cache.set_source_partition(vec![Candidate::plain("z")]);

    let writer = {
        let cache = cache.clone();
        let (small, large) = (small.clone(), large.clone());
        thread::spawn(move || {
            for i in 0..2000 {
                cache.set_cabal_partition(if i % 2 == 0 { small.clone() } else { large.clone() });
            }
        })
    };

    let allowed: Vec<BTreeSet<_>> = [&small, &large]
        .iter()
        .map(|cabal| {
            let mut merged = as_set(cabal);
            merged.insert(("z".to_string(), "z".to_string()));
            merged
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            let allowed = allowed.clone();
            thread::spawn(move || {
                for _ in 0..2000 {
                    let global = as_set(&cache.global_candidates());
                    let initial = BTreeSet::from([("z".to_string(), "z".to_string())]);
                    assert!(global == initial || allowed.contains(&global), "torn global list: {:?}", global);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_concurrent_population_last_write_wins() {
    let cache = Arc::new(SharedCompletionCache::new());
    let path = PathBuf::from("/work/Race.hs");
    let resolved = vec![Candidate::new("foo\tFn", "foo"), Candidate::new("bar\tFn", "bar")];

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let path = path.clone();
            let resolved = resolved.clone();
            thread::spawn(move || {
                if cache.get_file_candidates(&path).is_none() {
                    cache.set_file_candidates(&path, resolved);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.get_file_candidates(&path), Some(resolved));
}
