use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use scratchpad_core::{
    ContentStore, LockManager, LockRecord, LockStore, ManualClock, MemoryContentStore,
    MemoryLockStore, ResourceKey, SaveService, SharedResource, StorageError,
};
use serde_json::Value;
use tower::ServiceExt;

use scratchpad_server::auth::{hash_token, UserDirectory, UserEntry};
use scratchpad_server::build_router;
use scratchpad_server::nonce::NonceIssuer;
use scratchpad_server::state::AppState;

pub const ALICE: &str = "alice-token";
pub const BOB: &str = "bob-token";

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub outage: Arc<Outage>,
}

/// Switches that make the test stores fail as if their backend were down.
#[derive(Default)]
pub struct Outage {
    locks_down: AtomicBool,
    content_down: AtomicBool,
}

impl Outage {
    pub fn locks(&self, down: bool) {
        self.locks_down.store(down, Ordering::SeqCst);
    }

    pub fn content(&self, down: bool) {
        self.content_down.store(down, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("backend offline".to_string()));
        }
        Ok(())
    }
}

/// In-memory lock store that fails while its outage switch is on.
struct OutageLockStore {
    inner: MemoryLockStore,
    outage: Arc<Outage>,
}

#[async_trait]
impl LockStore for OutageLockStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<LockRecord>, StorageError> {
        Outage::check(&self.outage.locks_down)?;
        self.inner.get(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &ResourceKey,
        expected: Option<&LockRecord>,
        new: LockRecord,
    ) -> Result<bool, StorageError> {
        Outage::check(&self.outage.locks_down)?;
        self.inner.compare_and_swap(key, expected, new).await
    }
}

/// In-memory content store that fails while its outage switch is on.
struct OutageContentStore {
    inner: MemoryContentStore,
    outage: Arc<Outage>,
}

#[async_trait]
impl ContentStore for OutageContentStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &ResourceKey) -> Result<Option<SharedResource>, StorageError> {
        Outage::check(&self.outage.content_down)?;
        self.inner.load(key).await
    }

    async fn store(&self, resource: &SharedResource) -> Result<(), StorageError> {
        Outage::check(&self.outage.content_down)?;
        self.inner.store(resource).await
    }
}

/// Build the full router over in-memory stores and a manual clock.
pub fn build_test_app() -> TestApp {
    build_test_app_with_limit(1024)
}

pub fn build_test_app_with_limit(max_content_bytes: usize) -> TestApp {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let outage = Arc::new(Outage::default());
    let locks = Arc::new(OutageLockStore {
        inner: MemoryLockStore::new(),
        outage: outage.clone(),
    });
    let content = Arc::new(OutageContentStore {
        inner: MemoryContentStore::new(),
        outage: outage.clone(),
    });
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

    let manager = LockManager::new(
        locks.clone(),
        content.clone(),
        clock.clone(),
        directory.clone(),
        ttl,
    );
    let saver =
        SaveService::new(locks, content, clock.clone(), ttl).with_max_content_bytes(max_content_bytes);

    let state = AppState {
        directory,
        nonces: Arc::new(NonceIssuer::new(
            "test-secret",
            Duration::from_secs(3600),
            clock.clone(),
        )),
        manager: Arc::new(manager),
        saver: Arc::new(saver),
        resources: Arc::new(vec![
            ResourceKey::new("scratchpad").unwrap(),
            ResourceKey::new("agenda").unwrap(),
        ]),
    };

    TestApp {
        router: build_router(state),
        clock,
        outage,
    }
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn heartbeat(app: &Router, token: &str, body: Value) -> Value {
    let response = send(app, Method::POST, "/heartbeat", Some(token), Some(body)).await;
    assert_eq!(response.status(), 200);
    body_json(response).await
}

pub async fn nonce(app: &Router, token: &str, key: &str) -> String {
    let uri = format!("/api/resources/{}/nonce", key);
    let response = send(app, Method::GET, &uri, Some(token), None).await;
    assert_eq!(response.status(), 200);
    body_json(response).await["nonce"]
        .as_str()
        .unwrap()
        .to_string()
}
