//! Worker pool behaviour behind the bus: parallel creates, fault isolation,
//! same-id races.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docgate_common::{Document, OperationMessage, ResourceFamily, ResourceId, ResultStatus};
use docgate_dispatch::{DispatchBus, WorkerPool};
use docgate_store::{DocumentStore, MemoryDocumentStore, StoreError};
use serde_json::json;

const TIMEOUT: Duration = Duration::from_secs(5);

fn id(raw: &str) -> ResourceId {
    ResourceId::parse(raw).unwrap()
}

fn blog(title: &str) -> Document {
    json!({ "title": title }).as_object().cloned().unwrap()
}

// ---------------------------------------------------------------------------
// Stores that misbehave
// ---------------------------------------------------------------------------

/// Panics on ids starting with "boom", delegates everything else.
struct PanickingStore {
    inner: MemoryDocumentStore,
}

#[async_trait]
impl DocumentStore for PanickingStore {
    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        if document["_id"].as_str().unwrap_or_default().starts_with("boom") {
            panic!("simulated driver panic");
        }
        self.inner.insert(collection, document).await
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.find_by_id(collection, id).await
    }
}

/// Slow store that records the peak number of concurrent inserts.
struct SlowStore {
    inner: MemoryDocumentStore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl DocumentStore for SlowStore {
    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.insert(collection, document).await
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.find_by_id(collection, id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_distinct_creates_all_land() {
    let store = Arc::new(MemoryDocumentStore::new());
    let mut bus = DispatchBus::new();
    let _pool = WorkerPool::spawn(
        &mut bus,
        "blog-ops",
        ResourceFamily::Blog.schema(),
        store.clone(),
        4,
        8,
    );
    let bus = Arc::new(bus);

    let n = 50;
    let tasks: Vec<_> = (0..n)
        .map(|i| {
            let bus = bus.clone();
            tokio::spawn(async move {
                let msg = OperationMessage::create(id(&format!("b{i}")), blog(&format!("t{i}")), "u42");
                bus.send("blog-ops", msg, TIMEOUT).await
            })
        })
        .collect();

    for task in tasks {
        let result = task.await.unwrap().unwrap();
        assert_eq!(result.status, ResultStatus::Ok);
    }

    assert_eq!(store.len("blogs"), n);
    for i in 0..n {
        let doc = store.get("blogs", &format!("b{i}")).unwrap();
        assert_eq!(doc["title"], json!(format!("t{i}")));
        assert_eq!(doc["userId"], json!("u42"));
    }
}

#[tokio::test]
async fn workers_run_in_parallel_up_to_pool_size() {
    let store = Arc::new(SlowStore {
        inner: MemoryDocumentStore::new(),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let mut bus = DispatchBus::new();
    let _pool = WorkerPool::spawn(
        &mut bus,
        "blog-ops",
        ResourceFamily::Blog.schema(),
        store.clone(),
        3,
        8,
    );
    let bus = Arc::new(bus);

    let tasks: Vec<_> = (0..12)
        .map(|i| {
            let bus = bus.clone();
            tokio::spawn(async move {
                let msg = OperationMessage::create(id(&format!("s{i}")), blog("t"), "u1");
                bus.send("blog-ops", msg, TIMEOUT).await
            })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_ok());
    }

    // Never more inserts at once than workers.
    assert!(store.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(store.inner.len("blogs"), 12);
}

#[tokio::test]
async fn panic_in_one_operation_does_not_kill_the_worker() {
    let store = Arc::new(PanickingStore {
        inner: MemoryDocumentStore::new(),
    });
    let mut bus = DispatchBus::new();
    let _pool = WorkerPool::spawn(
        &mut bus,
        "blog-ops",
        ResourceFamily::Blog.schema(),
        store.clone(),
        1,
        4,
    );

    let failed = bus
        .send(
            "blog-ops",
            OperationMessage::create(id("boom-1"), blog("x"), "u1"),
            TIMEOUT,
        )
        .await
        .unwrap();
    assert_eq!(failed.status, ResultStatus::Error);

    // Same single worker keeps serving.
    let ok = bus
        .send(
            "blog-ops",
            OperationMessage::create(id("fine"), blog("y"), "u1"),
            TIMEOUT,
        )
        .await
        .unwrap();
    assert!(ok.is_ok());
    assert_eq!(store.inner.len("blogs"), 1);
}

#[tokio::test]
async fn same_id_race_has_exactly_one_winner() {
    let store = Arc::new(MemoryDocumentStore::new());
    let mut bus = DispatchBus::new();
    let _pool = WorkerPool::spawn(
        &mut bus,
        "blog-ops",
        ResourceFamily::Blog.schema(),
        store.clone(),
        4,
        8,
    );
    let bus = Arc::new(bus);

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let bus = bus.clone();
            tokio::spawn(async move {
                let msg = OperationMessage::create(id("same"), blog(&format!("t{i}")), "u1");
                bus.send("blog-ops", msg, TIMEOUT).await.unwrap()
            })
        })
        .collect();

    let mut ok = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(store.len("blogs"), 1);
}

#[tokio::test]
async fn pool_stops_when_bus_is_dropped() {
    let store = Arc::new(MemoryDocumentStore::new());
    let mut bus = DispatchBus::new();
    let pool = WorkerPool::spawn(
        &mut bus,
        "user-ops",
        ResourceFamily::User.schema(),
        store,
        2,
        2,
    );
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.address(), "user-ops");
    assert_eq!(bus.handler_count("user-ops"), 2);

    drop(bus);
    tokio::time::timeout(Duration::from_secs(1), pool.join())
        .await
        .expect("workers should exit once the bus is gone");
}
