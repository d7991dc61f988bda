#![allow(dead_code)]

use modelkit::{load_dir, migrate_all, AppState, MemoryStore, Record};
use std::path::Path;

/// Lowest bcrypt cost, keeps password columns fast in tests.
pub const TEST_HASH_COST: u32 = 4;

/// Route engine logs to the test harness; filter with `RUST_LOG=modelkit=debug`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// State over an in-memory store with every fixture model loaded and migrated.
pub async fn setup() -> AppState {
    init_tracing();
    let state = AppState::new(MemoryStore::new()).with_hash_cost(TEST_HASH_COST);
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/models");
    for model in load_dir(&dir).await.unwrap() {
        state.registry.register(model);
    }
    migrate_all(&state, false).await.unwrap();
    state
}

pub fn rec(v: serde_json::Value) -> Record {
    Record::from_json(v).expect("fixture row must be an object")
}

pub fn rows(v: serde_json::Value) -> Vec<Record> {
    match v {
        serde_json::Value::Array(items) => items.into_iter().map(rec).collect(),
        other => panic!("expected an array, got {}", other),
    }
}
