// Store Tests
// Tests for the versioned sled ledger store

use supplychain::model::{Package, PackageId, Participant, ParticipantId, Role};
use supplychain::registry::{PackageBuilder, ParticipantBuilder};
use supplychain::storage::{
    LedgerStore, Put, Record, RecordKey, RecordKind, SledLedger, StoreError, Versioned,
};
use tempfile::TempDir;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn participant(id: &str, role: Role, wallet: u64) -> Participant {
    ParticipantBuilder::new()
        .id(id)
        .role(role)
        .wallet(wallet)
        .build()
        .unwrap()
}

fn package(id: &str, owner: &str) -> Package {
    PackageBuilder::new().id(id).owner(owner).build().unwrap()
}

fn participant_key(id: &str) -> RecordKey {
    RecordKey::participant(&ParticipantId::from(id))
}

// ============================================================================
// STORE CREATION AND BASIC OPERATIONS
// ============================================================================

#[test]
fn test_store_open_new() {
    let temp_dir = TempDir::new().unwrap();
    let store = SledLedger::open(temp_dir.path()).unwrap();

    assert!(store.is_empty());
}

#[test]
fn test_store_open_existing() {
    let temp_dir = TempDir::new().unwrap();

    {
        let store = SledLedger::open(temp_dir.path()).unwrap();
        store
            .put(participant("MAN_0001", Role::Manufacturer, 2000).into(), 0)
            .unwrap();
        store.flush().unwrap();
    }

    {
        let store = SledLedger::open(temp_dir.path()).unwrap();
        let found: Versioned<Participant> = store.fetch(&participant_key("MAN_0001")).unwrap();
        assert_eq!(found.version, 1);
        assert_eq!(found.record.wallet(), 2000);
    }
}

#[test]
fn test_get_nonexistent_is_not_found() {
    let store = SledLedger::temporary().unwrap();

    let err = store.get(&participant_key("NOBODY")).unwrap_err();
    assert_eq!(
        err,
        StoreError::NotFound {
            key: participant_key("NOBODY")
        }
    );
}

#[test]
fn test_fetch_optional_absent() {
    let store = SledLedger::temporary().unwrap();

    let found = store
        .fetch_optional::<Participant>(&participant_key("NOBODY"))
        .unwrap();
    assert!(found.is_none());
}

// ============================================================================
// VERSION CHECKS
// ============================================================================

#[test]
fn test_versions_increase_by_one() {
    let store = SledLedger::temporary().unwrap();

    let v1 = store
        .put(participant("SH_0001", Role::Shipper, 2000).into(), 0)
        .unwrap();
    let v2 = store
        .put(participant("SH_0001", Role::Shipper, 1500).into(), v1)
        .unwrap();
    let v3 = store
        .put(participant("SH_0001", Role::Shipper, 1000).into(), v2)
        .unwrap();

    assert_eq!((v1, v2, v3), (1, 2, 3));
    let found: Versioned<Participant> = store.fetch(&participant_key("SH_0001")).unwrap();
    assert_eq!(found.version, 3);
    assert_eq!(found.record.wallet(), 1000);
}

#[test]
fn test_stale_version_conflicts() {
    let store = SledLedger::temporary().unwrap();

    store
        .put(participant("SH_0001", Role::Shipper, 2000).into(), 0)
        .unwrap();
    store
        .put(participant("SH_0001", Role::Shipper, 1500).into(), 1)
        .unwrap();

    // A writer that read version 1 loses
    let err = store
        .put(participant("SH_0001", Role::Shipper, 9999).into(), 1)
        .unwrap_err();

    assert_eq!(
        err,
        StoreError::Conflict {
            key: participant_key("SH_0001"),
            expected: 1,
            actual: 2,
        }
    );
    assert!(err.is_conflict());

    let found: Versioned<Participant> = store.fetch(&participant_key("SH_0001")).unwrap();
    assert_eq!(found.record.wallet(), 1500);
}

#[test]
fn test_create_on_existing_conflicts() {
    let store = SledLedger::temporary().unwrap();

    store
        .put(participant("SH_0001", Role::Shipper, 2000).into(), 0)
        .unwrap();
    let err = store
        .put(participant("SH_0001", Role::Shipper, 0).into(), 0)
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Conflict {
            expected: 0,
            actual: 1,
            ..
        }
    ));
}

#[test]
fn test_update_of_absent_record_conflicts() {
    let store = SledLedger::temporary().unwrap();

    let err = store
        .put(participant("SH_0001", Role::Shipper, 2000).into(), 4)
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Conflict {
            expected: 4,
            actual: 0,
            ..
        }
    ));
}

// ============================================================================
// BATCH ATOMICITY
// ============================================================================

#[test]
fn test_batch_applies_all() {
    let store = SledLedger::temporary().unwrap();

    let versions = store
        .commit_batch(vec![
            Put::create(participant("MAN_0001", Role::Manufacturer, 2000)),
            Put::create(package("BAT_0001", "MAN_0001")),
        ])
        .unwrap();

    assert_eq!(versions, vec![1, 1]);
    assert!(store.get(&participant_key("MAN_0001")).is_ok());
    assert!(store
        .get(&RecordKey::package(&PackageId::from("BAT_0001")))
        .is_ok());
}

#[test]
fn test_batch_with_one_stale_op_applies_nothing() {
    let store = SledLedger::temporary().unwrap();

    store
        .put(participant("MAN_0001", Role::Manufacturer, 2000).into(), 0)
        .unwrap();
    store
        .put(participant("SH_0001", Role::Shipper, 2000).into(), 0)
        .unwrap();

    let err = store
        .commit_batch(vec![
            Put::new(participant("MAN_0001", Role::Manufacturer, 2500), 1),
            // stale: SH_0001 is at version 1
            Put::new(participant("SH_0001", Role::Shipper, 1500), 7),
            Put::create(package("BAT_0001", "SH_0001")),
        ])
        .unwrap_err();

    assert!(err.is_conflict());

    let man: Versioned<Participant> = store.fetch(&participant_key("MAN_0001")).unwrap();
    assert_eq!(man.version, 1);
    assert_eq!(man.record.wallet(), 2000);
    assert!(store
        .get(&RecordKey::package(&PackageId::from("BAT_0001")))
        .is_err());
}

#[test]
fn test_batch_rejects_duplicate_keys() {
    let store = SledLedger::temporary().unwrap();

    let err = store
        .commit_batch(vec![
            Put::create(participant("SH_0001", Role::Shipper, 2000)),
            Put::create(participant("SH_0001", Role::Shipper, 1000)),
        ])
        .unwrap_err();

    assert_eq!(err, StoreError::DuplicateKey(participant_key("SH_0001")));
    assert!(store.is_empty());
}

#[test]
fn test_empty_batch_is_a_noop() {
    let store = SledLedger::temporary().unwrap();

    assert_eq!(store.commit_batch(Vec::new()).unwrap(), Vec::<u64>::new());
    assert!(store.is_empty());
}

// ============================================================================
// SCANS AND TYPED ACCESS
// ============================================================================

#[test]
fn test_scan_by_kind() {
    let store = SledLedger::temporary().unwrap();

    store
        .commit_batch(vec![
            Put::create(participant("MAN_0001", Role::Manufacturer, 2000)),
            Put::create(participant("SH_0001", Role::Shipper, 2000)),
            Put::create(package("BAT_0001", "MAN_0001")),
        ])
        .unwrap();

    assert_eq!(store.scan(RecordKind::Participant).unwrap().len(), 2);
    assert_eq!(store.scan(RecordKind::Package).unwrap().len(), 1);
    assert!(store.scan(RecordKind::Contract).unwrap().is_empty());
}

#[test]
fn test_into_typed_kind_mismatch() {
    let stored = Versioned::new(1, Record::Package(package("BAT_0001", "MAN_0001")));
    let key = participant_key("BAT_0001");

    let err = stored.into_typed::<Participant>(&key).unwrap_err();
    assert_eq!(
        err,
        StoreError::KindMismatch {
            key,
            expected: RecordKind::Participant
        }
    );
}

#[test]
fn test_record_bytes_roundtrip() {
    let stored = Versioned::new(3, Record::Participant(participant("RE_0001", Role::Retailer, 7)));

    let decoded = Versioned::<Record>::from_bytes(&stored.to_bytes().unwrap()).unwrap();
    assert_eq!(decoded, stored);
}

#[test]
fn test_corrupt_bytes_fail_to_decode() {
    let err = Versioned::<Record>::from_bytes(&[0xFF, 0xFF, 0xFF]).unwrap_err();
    assert!(matches!(err, StoreError::DeserializationFailed(_)));
}

#[test]
fn test_stats_count_records() {
    let store = SledLedger::temporary().unwrap();

    store
        .put(participant("SH_0001", Role::Shipper, 2000).into(), 0)
        .unwrap();

    assert_eq!(store.stats().unwrap().key_count, 1);
}
