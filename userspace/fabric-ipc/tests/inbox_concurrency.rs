// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Concurrency tests for the per-node inbox
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 4 integration tests
//!
//! TEST_SCENARIOS:
//!   - producer_consumer_loses_nothing(): one producer, one consumer, both wait strategies
//!   - blocked_pop_wakes_on_push(): a parked consumer wakes on a late push
//!   - close_wakes_blocked_consumer(): close ends a blocking receive with Shutdown
//!   - two_producers_keep_per_source_order(): FIFO per producer under interleaving

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fabric_ipc::{Inbox, InboxConfig, InboxError, Message, NodeId, WaitStrategy};

const COUNT: u32 = 10_000;

fn run_spsc(strategy: WaitStrategy) {
    let inbox = Arc::new(Inbox::new(InboxConfig { strategy, ..InboxConfig::default() }));
    let producer = {
        let inbox = Arc::clone(&inbox);
        thread::spawn(move || {
            for word in 0..COUNT {
                inbox.push(Message::new(NodeId::new(1), 0, word)).unwrap();
            }
        })
    };
    let mut seen = Vec::with_capacity(COUNT as usize);
    while seen.len() < COUNT as usize {
        seen.push(inbox.pop_blocking().unwrap().word());
    }
    producer.join().unwrap();
    assert_eq!(seen, (0..COUNT).collect::<Vec<_>>());
    assert_eq!(inbox.pop_nonblocking(), Err(InboxError::QueueEmpty));
    let stats = inbox.stats();
    assert_eq!(stats.pushed, u64::from(COUNT));
    assert_eq!(stats.popped, u64::from(COUNT));
}

#[test]
fn producer_consumer_loses_nothing() {
    run_spsc(WaitStrategy::Park);
    run_spsc(WaitStrategy::Spin);
}

#[test]
fn blocked_pop_wakes_on_push() {
    let inbox = Arc::new(Inbox::unbounded());
    let consumer = {
        let inbox = Arc::clone(&inbox);
        thread::spawn(move || {
            let started = Instant::now();
            let msg = inbox.pop_blocking().unwrap();
            (msg, started.elapsed())
        })
    };
    thread::sleep(Duration::from_millis(30));
    inbox.push(Message::with_value(NodeId::new(0), 1, -70)).unwrap();
    let (msg, waited) = consumer.join().unwrap();
    assert_eq!(msg.value(), -70);
    assert!(waited >= Duration::from_millis(20), "consumer returned before the push");
}

#[test]
fn close_wakes_blocked_consumer() {
    let inbox = Arc::new(Inbox::unbounded());
    let consumer = {
        let inbox = Arc::clone(&inbox);
        thread::spawn(move || inbox.pop_blocking())
    };
    thread::sleep(Duration::from_millis(10));
    inbox.close();
    assert_eq!(consumer.join().unwrap(), Err(InboxError::Shutdown));
}

#[test]
fn two_producers_keep_per_source_order() {
    let inbox = Arc::new(Inbox::unbounded());
    let producers: Vec<_> = [1u8, 2]
        .into_iter()
        .map(|src| {
            let inbox = Arc::clone(&inbox);
            thread::spawn(move || {
                for word in 0..1_000 {
                    inbox.push(Message::new(NodeId::new(src), 0, word)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    let mut next = [0u32; 3];
    while let Ok(msg) = inbox.pop_nonblocking() {
        let src = usize::from(msg.source.raw());
        assert_eq!(msg.word(), next[src], "per-source order broken for {}", msg.source);
        next[src] += 1;
    }
    assert_eq!(next[1..], [1_000, 1_000]);
}
