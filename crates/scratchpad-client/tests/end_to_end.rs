//! Controllers talking to a real server over HTTP.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scratchpad_client::{
    ControllerState, HttpTransport, LockController, PollGroup, SaveOutcome, Transport,
};
use scratchpad_core::{
    LockManager, ManualClock, MemoryContentStore, MemoryLockStore, ResourceKey, SaveService,
};
use scratchpad_server::auth::{hash_token, UserDirectory, UserEntry};
use scratchpad_server::build_router;
use scratchpad_server::nonce::NonceIssuer;
use scratchpad_server::state::AppState;
use tokio::net::TcpListener;

const ALICE: &str = "alice-token";
const BOB: &str = "bob-token";

struct TestServer {
    base_url: String,
    clock: Arc<ManualClock>,
}

impl TestServer {
    async fn start() -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let locks = Arc::new(MemoryLockStore::new());
        let content = Arc::new(MemoryContentStore::new());
        let directory = Arc::new(UserDirectory::from_entries([
            UserEntry {
                id: "alice".to_string(),
                display_name: "Alice".to_string(),
                token_sha256: hash_token(ALICE),
            },
            UserEntry {
                id: "bob".to_string(),
                display_name: "Bob".to_string(),
                token_sha256: hash_token(BOB),
            },
        ]));
        let ttl = Duration::from_secs(30);

        let state = AppState {
            directory: directory.clone(),
            nonces: Arc::new(NonceIssuer::new(
                "test-secret",
                Duration::from_secs(3600),
                clock.clone(),
            )),
            manager: Arc::new(LockManager::new(
                locks.clone(),
                content.clone(),
                clock.clone(),
                directory,
                ttl,
            )),
            saver: Arc::new(SaveService::new(locks, content, clock.clone(), ttl)),
            resources: Arc::new(vec![
                ResourceKey::new("scratchpad").unwrap(),
                ResourceKey::new("agenda").unwrap(),
            ]),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            clock,
        }
    }

    fn transport(&self, token: &str) -> Arc<dyn Transport> {
        Arc::new(HttpTransport::new(self.base_url.clone(), token))
    }
}

fn scratchpad() -> ResourceKey {
    ResourceKey::new("scratchpad").unwrap()
}

#[tokio::test]
async fn test_editing_locks_out_the_other_user() {
    let server = TestServer::start().await;
    let alice = LockController::new(scratchpad(), server.transport(ALICE));
    let bob = LockController::new(scratchpad(), server.transport(BOB));

    assert!(alice.on_input("<p>Plan</p><script>x()</script>"));
    alice.poll_once().await.unwrap();
    assert_eq!(alice.state(), ControllerState::Unlocked);
    assert_eq!(alice.save().await, SaveOutcome::Saved);

    bob.poll_once().await.unwrap();
    assert_eq!(
        bob.state(),
        ControllerState::LockedOut {
            owner: "Alice".to_string()
        }
    );
    // Mirrors the sanitized server copy
    assert_eq!(bob.buffer(), "<p>Plan</p>");
}

#[tokio::test]
async fn test_save_by_non_holder_is_rejected() {
    let server = TestServer::start().await;
    let alice = LockController::new(scratchpad(), server.transport(ALICE));
    let bob = LockController::new(scratchpad(), server.transport(BOB));

    alice.on_input("alice");
    alice.poll_once().await.unwrap();

    bob.on_input("bob");
    assert_eq!(
        bob.save().await,
        SaveOutcome::Rejected("locked by other".to_string())
    );
    assert_eq!(bob.buffer(), "bob");

    let document = server.transport(BOB).load(&scratchpad()).await.unwrap();
    assert_eq!(document.content, "");
}

#[tokio::test]
async fn test_lock_moves_after_expiry() {
    let server = TestServer::start().await;
    let alice = LockController::with_idle_timeout(
        scratchpad(),
        server.transport(ALICE),
        Duration::from_millis(50),
    );
    let bob = LockController::new(scratchpad(), server.transport(BOB));

    alice.on_input("a");
    alice.poll_once().await.unwrap();
    bob.poll_once().await.unwrap();
    assert!(matches!(bob.state(), ControllerState::LockedOut { .. }));

    // Alice goes idle and the server lock lapses
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!alice.is_editing());
    server.clock.advance(chrono::Duration::seconds(31));

    bob.poll_once().await.unwrap();
    assert_eq!(bob.state(), ControllerState::Unlocked);
    bob.on_input("b");
    bob.poll_once().await.unwrap();

    alice.poll_once().await.unwrap();
    assert_eq!(
        alice.state(),
        ControllerState::LockedOut {
            owner: "Bob".to_string()
        }
    );
}

#[tokio::test]
async fn test_poll_group_shares_one_heartbeat() {
    let server = TestServer::start().await;
    let keys = || {
        vec![
            ResourceKey::new("scratchpad").unwrap(),
            ResourceKey::new("agenda").unwrap(),
        ]
    };
    let alice = PollGroup::new(server.transport(ALICE), keys());
    let bob = PollGroup::new(server.transport(BOB), keys());

    alice.controller("scratchpad").unwrap().on_input("x");
    alice.tick().await.unwrap();
    bob.tick().await.unwrap();

    assert!(matches!(
        bob.controller("scratchpad").unwrap().state(),
        ControllerState::LockedOut { .. }
    ));
    assert_eq!(
        bob.controller("agenda").unwrap().state(),
        ControllerState::Unlocked
    );
}

#[tokio::test]
async fn test_bad_token_fails_poll() {
    let server = TestServer::start().await;
    let mallory = LockController::new(scratchpad(), server.transport("nope"));

    let err = mallory.poll_once().await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(mallory.state(), ControllerState::Unlocked);
}
