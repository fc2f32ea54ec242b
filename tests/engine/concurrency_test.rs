// Concurrency Tests
// Racing transfers, conflict retries and lost-update checks

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use supplychain::engine::{EngineConfig, TransferEngine, TransferError, TransferRequest};
use supplychain::events::EventEmitter;
use supplychain::model::{Package, PackageId, Participant, ParticipantId, Role};
use supplychain::registry::{demo_network, PackageBuilder, ParticipantBuilder, Registry};
use supplychain::storage::{
    LedgerStore, Put, Record, RecordKey, RecordKind, SledLedger, StoreError, Versioned,
};

// ============================================================================
// CONTENDED STORE
// ============================================================================

/// Store wrapper that fails the next N batches with a version conflict,
/// as if another writer had committed first
struct ContendedStore {
    inner: SledLedger,
    conflicts_left: AtomicU32,
    commits_seen: AtomicU32,
}

impl ContendedStore {
    fn new() -> Self {
        Self {
            inner: SledLedger::temporary().unwrap(),
            conflicts_left: AtomicU32::new(0),
            commits_seen: AtomicU32::new(0),
        }
    }

    fn inject_conflicts(&self, n: u32) {
        self.conflicts_left.store(n, Ordering::SeqCst);
        self.commits_seen.store(0, Ordering::SeqCst);
    }

    fn commits_seen(&self) -> u32 {
        self.commits_seen.load(Ordering::SeqCst)
    }
}

impl LedgerStore for ContendedStore {
    fn get(&self, key: &RecordKey) -> Result<Versioned<Record>, StoreError> {
        self.inner.get(key)
    }

    fn commit_batch(&self, ops: Vec<Put>) -> Result<Vec<u64>, StoreError> {
        self.commits_seen.fetch_add(1, Ordering::SeqCst);
        let inject = self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if inject {
            if let Some(first) = ops.first() {
                return Err(StoreError::Conflict {
                    key: first.key(),
                    expected: first.expected_version(),
                    actual: first.expected_version() + 1,
                });
            }
        }
        self.inner.commit_batch(ops)
    }

    fn scan(&self, kind: RecordKind) -> Result<Vec<Versioned<Record>>, StoreError> {
        self.inner.scan(kind)
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn fast_config(max_retries: u32) -> EngineConfig {
    EngineConfig::new()
        .with_max_retries(max_retries)
        .with_backoff_base_ms(0)
        .with_backoff_jitter_ms(2)
}

fn onboard<S: LedgerStore>(store: &Arc<S>, extra: Vec<Record>) {
    let mut records = demo_network().unwrap();
    records.extend(extra);
    Registry::new(store.clone()).add_all(records).unwrap();
}

fn shipper(id: &str) -> Record {
    ParticipantBuilder::new()
        .id(id)
        .role(Role::Shipper)
        .build()
        .unwrap()
        .into()
}

fn batch(id: &str) -> Record {
    PackageBuilder::new()
        .id(id)
        .owner("MAN_0001")
        .build()
        .unwrap()
        .into()
}

fn wallet<S: LedgerStore>(store: &S, id: &str) -> u64 {
    let found: Versioned<Participant> = store
        .fetch(&RecordKey::participant(&ParticipantId::from(id)))
        .unwrap();
    found.record.wallet()
}

fn owner<S: LedgerStore>(store: &S, id: &str) -> String {
    let found: Versioned<Package> = store.fetch(&RecordKey::package(&PackageId::from(id))).unwrap();
    found.record.owner().to_string()
}

// ============================================================================
// RACING TRANSFERS
// ============================================================================

#[test]
fn test_racing_ships_commit_exactly_once() {
    let store = Arc::new(SledLedger::temporary().unwrap());
    onboard(&store, vec![shipper("SH_0002")]);
    let (_emitter, queue) = EventEmitter::new(Default::default());
    let engine = TransferEngine::with_config(store.clone(), queue, fast_config(5));

    let barrier = Barrier::new(2);
    let results: Vec<Result<_, TransferError>> = std::thread::scope(|s| {
        let handles: Vec<_> = ["SH_0001", "SH_0002"]
            .into_iter()
            .map(|to| {
                let engine = &engine;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    engine.transfer(&TransferRequest::ship("BAT_0001", "MAN_0001", to))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(loser, TransferError::StaleOwner { .. }));

    let new_owner = winners[0].event().new_owner().to_string();
    assert_eq!(owner(store.as_ref(), "BAT_0001"), new_owner);
    assert_eq!(wallet(store.as_ref(), "MAN_0001"), 2500);
    assert_eq!(wallet(store.as_ref(), &new_owner), 1500);
    let other = if new_owner == "SH_0001" { "SH_0002" } else { "SH_0001" };
    assert_eq!(wallet(store.as_ref(), other), 2000);
}

#[test]
fn test_parallel_ships_lose_no_credit() {
    const PACKAGES: usize = 8;

    let store = Arc::new(SledLedger::temporary().unwrap());
    let mut extra = Vec::new();
    for i in 0..PACKAGES {
        extra.push(shipper(&format!("SH_1{i:03}")));
        extra.push(batch(&format!("BAT_1{i:03}")));
    }
    onboard(&store, extra);

    let (_emitter, queue) = EventEmitter::new(Default::default());
    // Every transfer credits MAN_0001, so they all contend on one record
    let engine = TransferEngine::with_config(store.clone(), queue, fast_config(500));

    std::thread::scope(|s| {
        for i in 0..PACKAGES {
            let engine = &engine;
            s.spawn(move || {
                let request = TransferRequest::ship(
                    &format!("BAT_1{i:03}"),
                    "MAN_0001",
                    &format!("SH_1{i:03}"),
                );
                engine.transfer(&request).unwrap();
            });
        }
    });

    assert_eq!(wallet(store.as_ref(), "MAN_0001"), 2000 + 500 * PACKAGES as u64);
    for i in 0..PACKAGES {
        assert_eq!(wallet(store.as_ref(), &format!("SH_1{i:03}")), 1500);
        assert_eq!(owner(store.as_ref(), &format!("BAT_1{i:03}")), format!("SH_1{i:03}"));
    }
}

// ============================================================================
// RETRY LOOP
// ============================================================================

#[test]
fn test_conflicts_are_retried() {
    let store = Arc::new(ContendedStore::new());
    onboard(&store, Vec::new());
    let (_emitter, queue) = EventEmitter::new(Default::default());
    let engine = TransferEngine::with_config(store.clone(), queue, fast_config(5));

    store.inject_conflicts(2);
    let receipt = engine
        .transfer(&TransferRequest::ship("BAT_0001", "MAN_0001", "SH_0001"))
        .unwrap();

    assert_eq!(receipt.attempts(), 3);
    assert_eq!(store.commits_seen(), 3);
    assert_eq!(wallet(store.as_ref(), "MAN_0001"), 2500);
}

#[test]
fn test_exhausted_retries_report_busy() {
    let store = Arc::new(ContendedStore::new());
    onboard(&store, Vec::new());
    let (_emitter, queue) = EventEmitter::new(Default::default());
    let engine = TransferEngine::with_config(store.clone(), queue, fast_config(1));

    store.inject_conflicts(10);
    let err = engine
        .transfer(&TransferRequest::ship("BAT_0001", "MAN_0001", "SH_0001"))
        .unwrap_err();

    assert_eq!(
        err,
        TransferError::Busy {
            package: PackageId::from("BAT_0001"),
            attempts: 2,
        }
    );
    assert_eq!(owner(store.as_ref(), "BAT_0001"), "MAN_0001");
    assert_eq!(wallet(store.as_ref(), "SH_0001"), 2000);
}

#[test]
fn test_zero_retries_gives_up_on_first_conflict() {
    let store = Arc::new(ContendedStore::new());
    onboard(&store, Vec::new());
    let (_emitter, queue) = EventEmitter::new(Default::default());
    let engine = TransferEngine::with_config(store.clone(), queue, fast_config(0));

    store.inject_conflicts(1);
    let err = engine
        .transfer(&TransferRequest::ship("BAT_0001", "MAN_0001", "SH_0001"))
        .unwrap_err();

    assert!(matches!(err, TransferError::Busy { attempts: 1, .. }));
    assert_eq!(store.commits_seen(), 1);
}

// ============================================================================
// STORE-LEVEL RACE
// ============================================================================

#[test]
fn test_same_expected_version_one_winner() {
    let store = SledLedger::temporary().unwrap();
    let sh = ParticipantBuilder::new()
        .id("SH_0001")
        .role(Role::Shipper)
        .build()
        .unwrap();
    store.put(sh.clone().into(), 0).unwrap();

    let barrier = Barrier::new(2);
    let results: Vec<Result<u64, StoreError>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = &store;
                let barrier = &barrier;
                let record: Record = sh.clone().into();
                s.spawn(move || {
                    barrier.wait();
                    store.put(record, 1)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(StoreError::Conflict { expected: 1, actual: 2, .. }))));
}
