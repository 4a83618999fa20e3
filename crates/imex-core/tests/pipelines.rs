//! End-to-end behaviour of the upload/download/status pipelines.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use imex_core::domain::{HookError, StoreError};
use imex_core::impls::{InMemoryStatusStore, LocalStation, StaticContext};
use imex_core::ports::{FixedClock, MemoryUpload, StatusStore, SystemClock, TaskHooks};
use imex_core::{
    BatchResult, CallContext, ImexHandler, TaskExecutor, TaskKey, TaskParam, TaskResult,
    TaskStatus, UserInfo,
};
use serde_json::json;
use tempfile::TempDir;

/// Hooks whose parse/write block until the test lets them through.
struct GatedHooks {
    gate: Mutex<Receiver<()>>,
    rows: u64,
    limit: Option<u64>,
    fail_write: bool,
    writes: AtomicUsize,
}

impl GatedHooks {
    fn new() -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let hooks = Self {
            gate: Mutex::new(rx),
            rows: 0,
            limit: None,
            fail_write: false,
            writes: AtomicUsize::new(0),
        };
        (hooks, tx)
    }

    fn wait_for_gate(&self) {
        let _ = self.gate.lock().unwrap().recv_timeout(Duration::from_secs(10));
    }
}

impl TaskHooks for GatedHooks {
    fn name(&self) -> &str {
        "gated"
    }

    fn parse(&self, input: &mut dyn Read, _param: &TaskParam) -> Result<TaskResult, HookError> {
        self.wait_for_gate();
        let mut body = String::new();
        input.read_to_string(&mut body)?;
        Ok(TaskResult::done(
            BatchResult::with_urls(vec![format!("https://files.test/{}", body.trim())])
                .with_detail(json!({ "bytes": body.len() })),
        ))
    }

    fn write(&self, output: &mut dyn Write, _param: &TaskParam) -> Result<(), HookError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate();
        if self.fail_write {
            return Err(HookError::invalid("boom"));
        }
        writeln!(output, "id,total")?;
        writeln!(output, "1,9.99")?;
        Ok(())
    }

    fn count_limit(&self) -> Option<u64> {
        self.limit
    }

    fn count(&self, _param: &TaskParam) -> Result<u64, HookError> {
        Ok(self.rows)
    }
}

struct Harness {
    handler: ImexHandler,
    hooks: Arc<GatedHooks>,
    scratch: TempDir,
    _station: TempDir,
}

fn context() -> Arc<StaticContext> {
    Arc::new(StaticContext::new(CallContext {
        mart: "m01".into(),
        language: "en".into(),
        user: UserInfo::new("alice"),
    }))
}

fn harness(hooks: GatedHooks, executor: TaskExecutor, store: Arc<dyn StatusStore>) -> Harness {
    let hooks = Arc::new(hooks);
    let scratch = tempfile::tempdir().unwrap();
    let station = tempfile::tempdir().unwrap();

    let handler = ImexHandler::builder(hooks.clone())
        .executor(Arc::new(executor))
        .status_store(store)
        .station(Arc::new(
            LocalStation::new(station.path()).with_base_url("https://files.test"),
        ))
        .context(context())
        .temp_dir(scratch.path())
        .build()
        .unwrap();

    Harness {
        handler,
        hooks,
        scratch,
        _station: station,
    }
}

fn small_pool() -> TaskExecutor {
    TaskExecutor::builder()
        .core_workers(1)
        .max_workers(1)
        .queue_capacity(2)
        .build()
}

fn wait_terminal(handler: &ImexHandler, key: &TaskKey) -> TaskResult {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let result = handler.status(key);
        if result.is_terminal() || Instant::now() > deadline {
            return result;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn upload_is_running_then_done_with_payload() {
    let (hooks, gate) = GatedHooks::new();
    let h = harness(hooks, small_pool(), Arc::new(InMemoryStatusStore::new(SystemClock)));

    let k1 = h.handler.upload(MemoryUpload::new("in.csv", "report.csv")).unwrap();

    let first = h.handler.status(&k1);
    assert_eq!(first.status, TaskStatus::Running);
    assert_eq!(first.msg, "running");

    gate.send(()).unwrap();
    let done = wait_terminal(&h.handler, &k1);

    assert_eq!(done.status, TaskStatus::Done);
    assert_eq!(done.msg, "success");
    assert_eq!(done.result.urls, vec!["https://files.test/report.csv"]);
    assert_eq!(done.result.detail, Some(json!({"bytes": 10})));
}

#[test]
fn observed_status_never_goes_backwards() {
    let (hooks, gate) = GatedHooks::new();
    let h = harness(hooks, small_pool(), Arc::new(InMemoryStatusStore::new(SystemClock)));
    let key = h.handler.upload(MemoryUpload::new("in.csv", "x")).unwrap();

    let mut seen = vec![h.handler.status(&key).status];
    let release = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        gate.send(()).unwrap();
    });
    let deadline = Instant::now() + Duration::from_secs(10);
    while !seen.last().unwrap().is_terminal() && Instant::now() < deadline {
        seen.push(h.handler.status(&key).status);
    }
    release.join().unwrap();
    for _ in 0..10 {
        seen.push(h.handler.status(&key).status);
    }

    assert_eq!(seen[0], TaskStatus::Running);
    let first_done = seen.iter().position(|s| *s == TaskStatus::Done).unwrap();
    assert!(seen[..first_done].iter().all(|s| *s == TaskStatus::Running));
    assert!(seen[first_done..].iter().all(|s| *s == TaskStatus::Done));
}

#[test]
fn saturated_pool_drops_oldest_queued_without_error() {
    let (hooks, gate) = GatedHooks::new();
    let h = harness(hooks, small_pool(), Arc::new(InMemoryStatusStore::new(SystemClock)));

    // 1 running + 2 queued fills the pool; two more evict the two queued ones
    let keys: Vec<TaskKey> = (0..5)
        .map(|i| {
            h.handler
                .upload(MemoryUpload::new("in.csv", format!("f{i}")))
                .unwrap()
        })
        .collect();

    assert_eq!(h.handler.executor().stats().evicted, 2);
    for _ in 0..3 {
        gate.send(()).unwrap();
    }

    for i in [0, 3, 4] {
        assert_eq!(wait_terminal(&h.handler, &keys[i]).status, TaskStatus::Done);
    }
    // evicted jobs never write a terminal entry; they stay RUNNING until the TTL lapses
    for i in [1, 2] {
        assert_eq!(h.handler.status(&keys[i]).status, TaskStatus::Running);
    }
}

#[test]
fn unknown_key_is_expired() {
    let (hooks, _gate) = GatedHooks::new();
    let h = harness(hooks, small_pool(), Arc::new(InMemoryStatusStore::new(SystemClock)));

    let result = h.handler.status(&TaskKey::from_raw("IMEX:TASK:01ARZ3NDEKTSV4RRFFQ69G5FAV"));
    assert_eq!(result.status, TaskStatus::Expired);
    assert_eq!(result.msg, "expired");
}

#[test]
fn lapsed_running_entry_reads_expired_until_the_worker_finishes() {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()));
    let (hooks, gate) = GatedHooks::new();
    let h = harness(hooks, small_pool(), Arc::new(InMemoryStatusStore::new(clock.clone())));

    let key = h.handler.upload(MemoryUpload::new("in.csv", "late")).unwrap();
    clock.advance(chrono::Duration::seconds(601));
    assert_eq!(h.handler.status(&key).status, TaskStatus::Expired);

    gate.send(()).unwrap();
    assert_eq!(wait_terminal(&h.handler, &key).status, TaskStatus::Done);
}

struct BrokenReads {
    inner: InMemoryStatusStore<SystemClock>,
}

impl StatusStore for BrokenReads {
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.inner.set(key, value, ttl)
    }

    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("read timed out".into()))
    }
}

#[test]
fn failing_store_read_is_failed_not_an_error() {
    let (hooks, gate) = GatedHooks::new();
    let store = Arc::new(BrokenReads {
        inner: InMemoryStatusStore::new(SystemClock),
    });
    let h = harness(hooks, small_pool(), store);

    let key = h.handler.upload(MemoryUpload::new("in.csv", "x")).unwrap();
    let result = h.handler.status(&key);

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.msg, "failed");
    gate.send(()).unwrap();
}

#[test]
fn export_over_the_limit_fails_without_writing() {
    let (mut hooks, _gate) = GatedHooks::new();
    hooks.rows = 500_000;
    hooks.limit = Some(50_000);
    let h = harness(hooks, small_pool(), Arc::new(InMemoryStatusStore::new(SystemClock)));

    let key = h
        .handler
        .download(Some(json!({"since": "2024-01-01"})), "orders.csv")
        .unwrap();
    let result = wait_terminal(&h.handler, &key);

    assert_eq!(result.status, TaskStatus::Failed);
    assert!(result.msg.contains("50000"), "msg was {:?}", result.msg);
    assert_eq!(h.hooks.writes.load(Ordering::SeqCst), 0);
    assert_eq!(file_count(h.scratch.path()), 0);
}

#[test]
fn export_temp_file_is_deleted_after_success() {
    let (hooks, gate) = GatedHooks::new();
    let h = harness(hooks, small_pool(), Arc::new(InMemoryStatusStore::new(SystemClock)));

    let key = h.handler.download(None, "orders.csv").unwrap();

    // the file exists while the write hook is running
    let deadline = Instant::now() + Duration::from_secs(10);
    while file_count(h.scratch.path()) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    let names: Vec<String> = std::fs::read_dir(h.scratch.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("orders-"));
    assert!(names[0].ends_with(".csv"));

    gate.send(()).unwrap();
    let result = wait_terminal(&h.handler, &key);

    assert_eq!(result.status, TaskStatus::Done);
    assert_eq!(result.result.urls.len(), 1);
    assert_eq!(file_count(h.scratch.path()), 0);
}

#[test]
fn export_temp_file_is_deleted_after_failure() {
    let (mut hooks, gate) = GatedHooks::new();
    hooks.fail_write = true;
    let h = harness(hooks, small_pool(), Arc::new(InMemoryStatusStore::new(SystemClock)));

    let key = h.handler.download(None, "orders.csv").unwrap();
    gate.send(()).unwrap();
    let result = wait_terminal(&h.handler, &key);

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(file_count(h.scratch.path()), 0);
}

#[tokio::test]
async fn shutdown_drains_queued_tasks() {
    let (hooks, gate) = GatedHooks::new();
    let h = harness(hooks, small_pool(), Arc::new(InMemoryStatusStore::new(SystemClock)));

    let k1 = h.handler.upload(MemoryUpload::new("a.csv", "a")).unwrap();
    let k2 = h.handler.upload(MemoryUpload::new("b.csv", "b")).unwrap();
    gate.send(()).unwrap();
    gate.send(()).unwrap();

    let handler = Arc::new(h.handler);
    let drained = tokio::task::spawn_blocking({
        let handler = handler.clone();
        move || handler.shutdown(Duration::from_secs(10))
    })
    .await
    .unwrap();

    assert!(drained);
    assert_eq!(handler.status(&k1).status, TaskStatus::Done);
    assert_eq!(handler.status(&k2).status, TaskStatus::Done);
}
