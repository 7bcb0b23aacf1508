use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::engine::{ActionEngine, EngineOptions};
use crate::memory::InMemoryStore;
use crate::providers::mock::MockClient;
use crate::testing::{epoch, ManualClock, ScriptedRandom};


struct Harness {
    client: Arc<MockClient>,
    store: InMemoryStore,
    clock: Arc<ManualClock>,
    shutdown: CancellationToken,
    engine: ActionEngine,
}

fn options() -> EngineOptions {
    EngineOptions {
        followers_key: "followers.json".to_string(),
        friends_key: "friends.json".to_string(),
        ledger_key: "tweets.json".to_string(),
        pacing: false,
        ..EngineOptions::default()
    }
}

fn harness() -> Harness {
    harness_with(options())
}

fn harness_with(options: EngineOptions) -> Harness {
    let client = Arc::new(MockClient::new());
    let store = InMemoryStore::new();
    let clock = ManualClock::new(epoch());
    let shutdown = CancellationToken::new();
    let engine = ActionEngine::open(
        client.clone(),
        Arc::new(store.clone()),
        clock.clone(),
        ScriptedRandom::new([]),
        options,
        shutdown.clone(),
    )
    .unwrap();
    Harness {
        client,
        store,
        clock,
        shutdown,
        engine,
    }
}
