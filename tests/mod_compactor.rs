mod common;

use common::{index_lines, log_records, open_store};
use hashflog::compactor::{self, Recovery};
use hashflog::index;
use hashflog::{CryptoEngine, StorePaths};
use std::fs;

fn seed(dir: &std::path::Path) -> Vec<(&'static str, &'static str)> {
    let store = open_store(dir);
    let ops = [
        ("a@x.com", "a1"),
        ("b@x.com", "b1"),
        ("a@x.com", "a2"),
        ("c@x.com", "c1"),
        ("b@x.com", "b2"),
        ("a@x.com", "a3"),
    ];
    for (e, p) in ops {
        store.register(e, p).unwrap();
    }
    ops.to_vec()
}

fn live_view(dir: &std::path::Path, ops: &[(&str, &str)]) -> Vec<bool> {
    let store = open_store(dir);
    ops.iter().map(|(e, p)| store.verify(e, p).unwrap()).collect()
}

#[test]
fn test_compaction_preserves_live_view() {
    let dir = tempfile::tempdir().unwrap();
    let ops = seed(dir.path());
    let before = live_view(dir.path(), &ops);
    assert_eq!(before, vec![false, false, false, true, true, true]);

    compactor::compact(&StorePaths::in_dir(dir.path())).unwrap();
    assert_eq!(live_view(dir.path(), &ops), before);
}

#[test]
fn test_compaction_deduplicates() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let paths = StorePaths::in_dir(dir.path());
    assert_eq!((log_records(&paths), index_lines(&paths)), (6, 6));

    let report = compactor::compact(&paths).unwrap();
    assert_eq!(report.records_before, 6);
    assert_eq!(report.records_after, 3);
    assert!(report.bytes_after < report.bytes_before);
    assert_eq!((log_records(&paths), index_lines(&paths)), (3, 3));
    assert_eq!(fs::metadata(&paths.log).unwrap().len(), report.bytes_after);

    // a second pass has nothing left to drop
    let again = compactor::compact(&paths).unwrap();
    assert_eq!((again.records_before, again.records_after), (3, 3));
    assert_eq!(again.bytes_before, again.bytes_after);
}

#[test]
fn test_compaction_keeps_exact_ciphertext() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let paths = StorePaths::in_dir(dir.path());
    let log = hashflog::record_log::RecordLog::open(&paths.log).unwrap();
    let live_before = index::load(&paths.index).unwrap().map;
    let blobs_before: Vec<_> = live_before.iter().map(|(u, off)| (u.clone(), log.read_at(off).unwrap())).collect();

    compactor::compact(&paths).unwrap();
    let live_after = index::load(&paths.index).unwrap().map;
    let blobs_after: Vec<_> = live_after.iter().map(|(u, off)| (u.clone(), log.read_at(off).unwrap())).collect();
    assert_eq!(blobs_before, blobs_after);
}

#[test]
fn test_store_compact_reloads_index() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    for p in ["p1", "p2", "p3"] {
        store.register("a@x.com", p).unwrap();
    }
    store.register("b@x.com", "q").unwrap();
    let report = store.compact().unwrap();
    assert_eq!(report.records_after, 2);
    assert!(store.verify("a@x.com", "p3").unwrap());
    assert!(store.verify("b@x.com", "q").unwrap());

    // appends after compaction land after the rewritten records
    store.register("a@x.com", "p4").unwrap();
    assert!(store.verify("a@x.com", "p4").unwrap());
    assert_eq!(index_lines(store.paths()), 3);
    drop(store);
    assert!(open_store(dir.path()).verify("a@x.com", "p4").unwrap());
}

#[test]
fn test_open_finishes_interrupted_swap() {
    let dir = tempfile::tempdir().unwrap();
    let ops = seed(dir.path());
    let paths = StorePaths::in_dir(dir.path());
    compactor::compact(&paths).unwrap();
    // Recreate the state between the two renames: new log in place,
    // new index still staged, stale index under the canonical name.
    let new_index = fs::read(&paths.index).unwrap();
    fs::write(paths.staging_index(), &new_index).unwrap();
    let stale = ops
        .iter()
        .enumerate()
        .map(|(i, (e, _))| index::format_line(&CryptoEngine::derive_uid(e), (i * 1000) as u64))
        .collect::<String>();
    fs::write(&paths.index, stale).unwrap();

    let store = open_store(dir.path());
    assert!(!paths.staging_index().exists());
    assert_eq!(fs::read(&paths.index).unwrap(), new_index);
    assert!(store.verify("a@x.com", "a3").unwrap());
}

#[test]
fn test_open_discards_unfinished_output() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let paths = StorePaths::in_dir(dir.path());
    fs::write(paths.staging_log(), b"\x00\x00").unwrap();
    fs::write(paths.staging_index(), b"half a li").unwrap();
    let log_before = fs::read(&paths.log).unwrap();

    assert_eq!(compactor::recover(&paths).unwrap(), Recovery::DiscardedStaging);
    assert_eq!(fs::read(&paths.log).unwrap(), log_before);
    assert!(open_store(dir.path()).verify("a@x.com", "a3").unwrap());
}

#[test]
fn test_torn_index_line_after_crash() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let paths = StorePaths::in_dir(dir.path());
    // a register that died mid index append
    let mut idx = fs::read(&paths.index).unwrap();
    idx.extend_from_slice(CryptoEngine::derive_uid("d@x.com").as_str()[..20].as_bytes());
    fs::write(&paths.index, idx).unwrap();

    let store = open_store(dir.path());
    assert!(!store.verify("d@x.com", "anything").unwrap());
    store.register("d@x.com", "d1").unwrap();
    assert!(store.verify("d@x.com", "d1").unwrap());
    assert_eq!(index_lines(&paths), 7);
    let report = store.compact().unwrap();
    assert_eq!(report.records_after, 4);
}

#[test]
fn test_standalone_compaction_under_a_live_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    for p in ["a1", "a2", "a3"] {
        store.register("a@x.com", p).unwrap();
    }
    store.register("b@x.com", "b1").unwrap();

    // e.g. `hashflog compact` from another process
    let report = compactor::compact(store.paths()).unwrap();
    assert_eq!((report.records_before, report.records_after), (4, 2));

    assert!(store.verify("a@x.com", "a3").unwrap());
    assert!(!store.verify("a@x.com", "a2").unwrap());
    store.register("c@x.com", "c1").unwrap();
    drop(store);

    let reopened = open_store(dir.path());
    for (e, p) in [("a@x.com", "a3"), ("b@x.com", "b1"), ("c@x.com", "c1")] {
        assert!(reopened.verify(e, p).unwrap());
    }
    assert_eq!(index_lines(&StorePaths::in_dir(dir.path())), 3);
}
