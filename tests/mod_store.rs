mod common;

use common::{OTHER_KEY, engine, open_store};
use fake::{Fake, faker::internet::en::SafeEmail};
use hashflog::{CredentialStore, CryptoEngine, StoreError, StorePaths};
use std::sync::Arc;

#[test]
fn test_register_then_verify_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    for _ in 0..5 {
        let email: String = SafeEmail().fake();
        store.register(&email, "s3cret!").unwrap();
        assert!(store.verify(&email, "s3cret!").unwrap());
    }
}

#[test]
fn test_wrong_password_is_false() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    store.register("a@x.com", "p1").unwrap();
    assert!(!store.verify("a@x.com", "p2").unwrap());
    assert!(!store.verify("a@x.com", "").unwrap());
}

#[test]
fn test_unknown_identity_is_false_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    assert!(!store.verify("never@x.com", "anything").unwrap());
    store.register("someone@x.com", "pw").unwrap();
    assert!(!store.verify("never@x.com", "pw").unwrap());
}

#[test]
fn test_reregister_supersedes_old_password() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    store.register("a@x.com", "p1").unwrap();
    store.register("a@x.com", "p2").unwrap();
    assert!(!store.verify("a@x.com", "p1").unwrap());
    assert!(store.verify("a@x.com", "p2").unwrap());
    assert_eq!(store.len(), 1);
    // both records stay on disk until compaction
    assert_eq!(common::log_records(store.paths()), 2);
    assert_eq!(common::index_lines(store.paths()), 2);
}

#[test]
fn test_emails_are_case_sensitive() {
    assert_ne!(CryptoEngine::derive_uid("A@x.com"), CryptoEngine::derive_uid("a@x.com"));
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    store.register("a@x.com", "pw").unwrap();
    assert!(!store.verify("A@x.com", "pw").unwrap());
}

#[test]
fn test_tampered_ciphertext_never_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    store.register("a@x.com", "pw").unwrap();
    let path = store.paths().log.clone();
    let original = std::fs::read(&path).unwrap();
    let body_len = u32::from_be_bytes(original[..4].try_into().unwrap()) as usize;
    assert_eq!(original.len(), 4 + body_len);
    for i in 4..original.len() {
        let mut bad = original.clone();
        bad[i] ^= 0x80;
        std::fs::write(&path, &bad).unwrap();
        assert!(!store.verify("a@x.com", "pw").unwrap(), "flipped byte {i}");
    }
    std::fs::write(&path, &original).unwrap();
    assert!(store.verify("a@x.com", "pw").unwrap());
}

#[test]
fn test_wrong_key_reads_as_invalid_credential() {
    let dir = tempfile::tempdir().unwrap();
    open_store(dir.path()).register("a@x.com", "pw").unwrap();
    let other = CredentialStore::open(StorePaths::in_dir(dir.path()), engine(OTHER_KEY)).unwrap();
    assert!(!other.verify("a@x.com", "pw").unwrap());
}

#[test]
fn test_truncated_log_is_an_error_not_false() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    store.register("a@x.com", "pw").unwrap();
    let path = store.paths().log.clone();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();
    assert!(matches!(store.verify("a@x.com", "pw"), Err(StoreError::CorruptRecord { offset: 0, .. })));
}

#[test]
fn test_missing_key_fails_at_construction() {
    assert!(matches!(CryptoEngine::new(""), Err(StoreError::Configuration(_))));
    assert!(matches!(CryptoEngine::new("not hex at all"), Err(StoreError::Configuration(_))));
}

#[test]
fn test_creates_missing_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    let store = open_store(&nested);
    store.register("a@x.com", "pw").unwrap();
    assert!(nested.join("users.log").exists());
    assert!(nested.join("users.idx").exists());
}

#[test]
fn test_concurrent_register_and_verify() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_store(dir.path()));
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..5 {
                    let email = format!("user{t}-{i}@x.com");
                    store.register(&email, &format!("pw{i}")).unwrap();
                    assert!(store.verify(&email, &format!("pw{i}")).unwrap());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(store.len(), 20);
    drop(store);

    // every index line must point at a real record after interleaved appends
    let reopened = open_store(dir.path());
    assert_eq!(reopened.len(), 20);
    for t in 0..4 {
        for i in 0..5 {
            assert!(reopened.verify(&format!("user{t}-{i}@x.com"), &format!("pw{i}")).unwrap());
        }
    }
}

#[test]
fn test_separate_instances_share_one_writer() {
    let dir = tempfile::tempdir().unwrap();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let path = dir.path().to_path_buf();
            std::thread::spawn(move || {
                // one store per thread, as separate CLI processes would have
                let store = open_store(&path);
                for i in 0..25 {
                    store.register(&format!("inst{t}-{i}@x.com"), &format!("pw{t}-{i}")).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let reopened = open_store(dir.path());
    assert_eq!(reopened.len(), 100);
    let misattributed = (0..4)
        .flat_map(|t| (0..25).map(move |i| (t, i)))
        .filter(|(t, i)| !reopened.verify(&format!("inst{t}-{i}@x.com"), &format!("pw{t}-{i}")).unwrap())
        .count();
    assert_eq!(misattributed, 0);
}

#[test]
fn test_open_instance_sees_other_writers() {
    let dir = tempfile::tempdir().unwrap();
    let first = open_store(dir.path());
    let second = open_store(dir.path());
    first.register("a@x.com", "p1").unwrap();
    assert!(second.verify("a@x.com", "p1").unwrap());
    second.register("a@x.com", "p2").unwrap();
    assert!(!first.verify("a@x.com", "p1").unwrap());
    assert!(first.verify("a@x.com", "p2").unwrap());
    assert_eq!(first.len(), 1);
}

#[test]
fn test_fragments_from_a_crashed_writer_are_cut_before_appending() {
    use std::io::Write;
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    store.register("a@x.com", "p1").unwrap();

    // another process died halfway through both appends
    let paths = store.paths().clone();
    let torn_uid = CryptoEngine::derive_uid("z@x.com");
    let mut log = std::fs::OpenOptions::new().append(true).open(&paths.log).unwrap();
    log.write_all(&[0, 0, 0, 60, 1, 2, 3]).unwrap();
    let mut idx = std::fs::OpenOptions::new().append(true).open(&paths.index).unwrap();
    write!(idx, "{torn_uid} 1").unwrap();

    store.register("b@x.com", "p2").unwrap();
    assert!(store.verify("b@x.com", "p2").unwrap());
    drop(store);

    let reopened = open_store(dir.path());
    assert!(reopened.verify("a@x.com", "p1").unwrap());
    assert!(reopened.verify("b@x.com", "p2").unwrap());
    assert!(!reopened.verify("z@x.com", "anything").unwrap());
    assert_eq!(common::index_lines(&paths), 2);
    assert_eq!(common::log_records(&paths), 2);
}

#[test]
fn test_oversized_length_prefix_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    store.register("a@x.com", "pw").unwrap();
    let path = store.paths().log.clone();
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[..4].copy_from_slice(&[0xff; 4]);
    std::fs::write(&path, &bytes).unwrap();
    assert!(matches!(store.verify("a@x.com", "pw"), Err(StoreError::CorruptRecord { offset: 0, .. })));
}
