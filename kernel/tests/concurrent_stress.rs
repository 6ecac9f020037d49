// Concurrent appenders and compactors must never lose an appended element.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use chainstore_kernel::chain::{Chain, ChainBuilder};
use chainstore_kernel::store::{ReplaceOutcome, ServerStore, ShardedServerStore, SwapServerStore};

const WRITERS: u64 = 4;
const APPENDS_PER_WRITER: u64 = 500;
const KEYS: i64 = 3;
const TAIL_COMPACTIONS: usize = 5;

fn encode(writer: u64, n: u64) -> Vec<u8> {
    let mut bytes = writer.to_be_bytes().to_vec();
    bytes.extend_from_slice(&n.to_be_bytes());
    bytes
}

/// Compacted chains carry every folded payload, concatenated, in a single
/// element; unfold them again to count what survived.
fn unfold(chain: &Chain) -> Vec<Vec<u8>> {
    chain
        .payloads()
        .flat_map(|payload| payload.chunks(16).map(<[u8]>::to_vec).collect::<Vec<_>>())
        .collect()
}

fn fold(chain: &Chain) -> Chain {
    let folded: Vec<u8> = chain.payloads().flatten().copied().collect();
    ChainBuilder.from_payloads([folded])
}

/// Writers append until the compactor has seen enough compactions that kept
/// a tail appended between its read and its swap, or until the deadline.
fn hammer(store: &dyn ServerStore) {
    let _ = env_logger::builder().is_test(true).try_init();

    let stop = AtomicBool::new(false);
    let start = Barrier::new(WRITERS as usize + 1);

    let (written, (compactions, with_tail)) = crossbeam::scope(|s| {
        let writers: Vec<_> = (0..WRITERS)
            .map(|writer| {
                let (stop, start) = (&stop, &start);
                s.spawn(move |_| {
                    start.wait();
                    let mut n = 0;
                    while n < APPENDS_PER_WRITER || !stop.load(Ordering::Relaxed) {
                        let key = (n as i64) % KEYS;
                        store.append(key, &encode(writer, n)).unwrap();
                        n += 1;
                    }
                    n
                })
            })
            .collect();

        let compactor = s.spawn(|_| {
            start.wait();
            let deadline = Instant::now() + Duration::from_secs(10);
            let (mut compactions, mut with_tail) = (0, 0);
            let mut round: i64 = 0;

            while with_tail < TAIL_COMPACTIONS && Instant::now() < deadline {
                let key = round % KEYS;
                round += 1;

                let read = store.get(key).unwrap();
                if read.len() < 2 {
                    continue;
                }
                thread::yield_now();
                if let ReplaceOutcome::Replaced { preserved } =
                    store.replace_at_head(key, &read, &fold(&read)).unwrap()
                {
                    compactions += 1;
                    if preserved > 0 {
                        with_tail += 1;
                    }
                }
            }
            stop.store(true, Ordering::Relaxed);
            (compactions, with_tail)
        });

        let counts = compactor.join().unwrap();
        let written: Vec<u64> = writers.into_iter().map(|w| w.join().unwrap()).collect();
        (written, counts)
    })
    .unwrap();

    assert!(compactions > 0, "no compaction succeeded");
    assert!(
        with_tail > 0,
        "no compaction kept a concurrently appended tail ({compactions} compactions)"
    );

    let mut seen = HashSet::new();
    for key in 0..KEYS {
        for payload in unfold(&store.get(key).unwrap()) {
            assert!(seen.insert(payload), "payload recorded twice");
        }
    }

    let total: u64 = written.iter().sum();
    assert_eq!(seen.len() as u64, total);
    for (writer, &count) in written.iter().enumerate() {
        for n in 0..count {
            assert!(
                seen.contains(&encode(writer as u64, n)),
                "lost append {writer}/{n}"
            );
        }
    }
}

fn per_writer_order_is_kept(store: &dyn ServerStore) {
    crossbeam::scope(|s| {
        for writer in 0..WRITERS {
            s.spawn(move |_| {
                for n in 0..APPENDS_PER_WRITER {
                    store.append(0, &encode(writer, n)).unwrap();
                }
            });
        }
    })
    .unwrap();

    let chain = store.get(0).unwrap();
    assert_eq!(chain.len() as u64, WRITERS * APPENDS_PER_WRITER);

    let mut last = vec![None; WRITERS as usize];
    for payload in chain.payloads() {
        let writer = u64::from_be_bytes(payload[..8].try_into().unwrap());
        let n = u64::from_be_bytes(payload[8..].try_into().unwrap());
        let previous = last[writer as usize].replace(n);
        assert!(previous.map_or(true, |p| p < n));
    }
}

#[test]
fn sharded_store_loses_no_appends_under_compaction() {
    hammer(&ShardedServerStore::with_shards(2));
}

#[test]
fn swap_store_loses_no_appends_under_compaction() {
    hammer(&SwapServerStore::with_shards(2));
}

#[test]
fn sharded_store_keeps_per_writer_order() {
    per_writer_order_is_kept(&ShardedServerStore::new());
}

#[test]
fn swap_store_keeps_per_writer_order() {
    per_writer_order_is_kept(&SwapServerStore::new());
}
