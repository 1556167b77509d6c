// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::allocator::SequenceAllocator;
use crate::config::COUNTER_KEY;
use crate::error::StoreError;
use crate::store::MemoryStore;
use crate::types::SequenceId;

#[tokio::test]
async fn test_first_allocation_creates_counter_at_one() {
    let store = Arc::new(MemoryStore::new());
    let allocator = SequenceAllocator::new(store.clone());

    assert_eq!(store.counter(COUNTER_KEY), None);
    assert_eq!(allocator.allocate_next().await.unwrap(), SequenceId(1));
    assert_eq!(allocator.allocate_next().await.unwrap(), SequenceId(2));
    assert_eq!(store.counter(COUNTER_KEY), Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocations_are_distinct() {
    const WORKERS: usize = 8;
    const PER_WORKER: usize = 250;

    let store = Arc::new(MemoryStore::new());
    let mut handles = Vec::new();

    // Separate allocators stand in for separate worker processes.
    for _ in 0..WORKERS {
        let allocator = SequenceAllocator::new(store.clone());
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::with_capacity(PER_WORKER);
            for _ in 0..PER_WORKER {
                ids.push(allocator.allocate_next().await.unwrap());
            }
            ids
        }));
    }

    let mut seen = HashSet::new();
    for h in handles {
        for id in h.await.unwrap() {
            assert!(seen.insert(id), "duplicate id {}", id);
        }
    }

    let total = (WORKERS * PER_WORKER) as u64;
    assert_eq!(seen.len() as u64, total);
    assert_eq!(seen.iter().max(), Some(&SequenceId(total)));
    assert_eq!(store.counter(COUNTER_KEY), Some(total));
}

#[tokio::test]
async fn test_ids_increase_per_allocator() {
    let store = Arc::new(MemoryStore::new());
    let a = SequenceAllocator::new(store.clone());
    let b = SequenceAllocator::new(store.clone());

    let mut last = SequenceId(0);
    for i in 0..20 {
        let id = if i % 2 == 0 { a.allocate_next().await } else { b.allocate_next().await }.unwrap();
        assert!(id > last);
        last = id;
    }
}

#[tokio::test]
async fn test_missing_document_is_an_error_not_zero() {
    let store = Arc::new(MemoryStore::new());
    store.set_missing_document(true);
    let allocator = SequenceAllocator::new(store.clone());

    let err = allocator.allocate_next().await.unwrap_err();
    assert_eq!(err, StoreError::MissingDocument(COUNTER_KEY.to_string()));
}

#[tokio::test]
async fn test_unavailable_store_fails_allocation() {
    let store = Arc::new(MemoryStore::new());
    store.set_counter_unavailable(true);
    let allocator = SequenceAllocator::new(store.clone());

    assert!(matches!(
        allocator.allocate_next().await,
        Err(StoreError::Unavailable(_))
    ));
    assert_eq!(store.counter(COUNTER_KEY), None);
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out() {
    let store = Arc::new(MemoryStore::new());
    store.set_latency(Some(Duration::from_secs(10)));
    let allocator = SequenceAllocator::new(store.clone()).with_timeout(Duration::from_millis(50));

    assert_eq!(allocator.allocate_next().await, Err(StoreError::Timeout(50)));
}

#[tokio::test]
async fn test_separate_keys_are_independent() {
    let store = Arc::new(MemoryStore::new());
    let a = SequenceAllocator::new(store.clone()).with_key("a");
    let b = SequenceAllocator::new(store.clone()).with_key("b");

    a.allocate_next().await.unwrap();
    a.allocate_next().await.unwrap();
    assert_eq!(b.allocate_next().await.unwrap(), SequenceId(1));
    assert_eq!(store.counter("a"), Some(2));
}
