//! Rough throughput numbers for register / verify / compact.
//! Usage: cargo run --release --bin benchmark_store -- [identities] [rounds]

use hashflog::crypto::SecretKey;
use hashflog::{CredentialStore, CryptoEngine, HashCost, StorePaths};
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let identities: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(200);
    let rounds: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(3).max(1);
    let cost = match std::env::var("HASHFLOG_BENCH_COST").as_deref() {
        Ok("default") => HashCost::default(),
        _ => HashCost::minimal(),
    };

    let dir = tempfile::tempdir()?;
    let key = SecretKey::generate()?;
    let crypto = CryptoEngine::from_key(&key)?.with_hash_cost(cost.clone());
    let store = CredentialStore::open(StorePaths::in_dir(dir.path()), crypto)?;
    println!("identities={identities} rounds={rounds} cost={cost:?}");

    let t = Instant::now();
    for round in 0..rounds {
        for i in 0..identities {
            store.register(&format!("user{i}@bench.local"), &format!("pw-{round}-{i}"))?;
        }
    }
    let n = identities * rounds;
    println!("register: {n} ops in {:?} ({:.1} ops/s)", t.elapsed(), n as f64 / t.elapsed().as_secs_f64());

    let t = Instant::now();
    for i in 0..identities {
        let ok = store.verify(&format!("user{i}@bench.local"), &format!("pw-{}-{i}", rounds - 1))?;
        assert!(ok, "user{i} failed to verify");
    }
    println!("verify: {identities} ops in {:?}", t.elapsed());

    let t = Instant::now();
    let report = store.compact()?;
    println!("compact: {report:?} in {:?}", t.elapsed());
    Ok(())
}
