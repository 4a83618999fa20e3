//! TaskExecutor - 有界ワーカープール
//!
//! Import/export jobs run on plain OS threads: domain hooks do blocking I/O
//! on readers and writers, so they must not sit on an async runtime.
//!
//! # 受け付け順序（submit）
//! 1. 生存ワーカーが core 未満 → 新しいワーカーを起動してそのまま実行
//! 2. キューに空きがある → キューに積む
//! 3. ワーカーが max 未満 → 新しいワーカーを起動してそのまま実行
//! 4. それ以外 → 一番古い未着手ジョブを捨てて新しいジョブを積む（discard-oldest）
//!
//! Step 4 never fails the submitter: a caller that already holds a task key
//! is not rejected, stale backlog is dropped instead. There is no signal to
//! the owner of the dropped job; its RUNNING entry simply expires.
//!
//! # 実装詳細
//! - `Mutex<PoolState>` + `Condvar` でキューを管理（ロック中にジョブは実行しない）
//! - core を超えたワーカーは `keep_alive` の間アイドルなら終了する
//! - ジョブ内の panic は捕捉してログに出す（ワーカーは死なない）

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::config::ExecutorConfig;
use crate::domain::errors::{ExecutorError, JobCancelled};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Snapshot of the pool for observability and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub workers: usize,
    pub idle: usize,
    pub queued: usize,
    pub completed: u64,
    /// Jobs discarded by the discard-oldest policy.
    pub evicted: u64,
}

#[derive(Debug, Clone)]
struct PoolLimits {
    core_workers: usize,
    max_workers: usize,
    keep_alive: Duration,
    queue_capacity: usize,
    thread_name: String,
}

struct PoolState {
    queue: VecDeque<Job>,
    workers: usize,
    idle: usize,
    next_worker_id: usize,
    shutdown: bool,
    completed: u64,
    evicted: u64,
}

struct Shared {
    limits: PoolLimits,
    state: Mutex<PoolState>,
    /// Signalled when a job is queued or shutdown begins.
    work_available: Condvar,
    /// Signalled when the last worker exits.
    terminated: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until there is a job for this worker, or return `None` when the
    /// worker should exit. Exiting workers are unregistered here, under the
    /// same lock that decided they exit.
    fn next_job(&self, finished_one: bool) -> Option<Job> {
        let mut state = self.lock();
        if finished_one {
            state.completed += 1;
        }
        state.idle += 1;

        let job = loop {
            if let Some(job) = state.queue.pop_front() {
                break Some(job);
            }
            if state.shutdown {
                break None;
            }
            if state.workers > self.limits.core_workers {
                let (guard, waited) = self
                    .work_available
                    .wait_timeout(state, self.limits.keep_alive)
                    .unwrap_or_else(|e| e.into_inner());
                state = guard;
                if waited.timed_out()
                    && state.queue.is_empty()
                    && state.workers > self.limits.core_workers
                {
                    break None;
                }
            } else {
                state = self
                    .work_available
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
        };

        state.idle -= 1;
        if job.is_none() {
            state.workers -= 1;
            if state.workers == 0 {
                self.terminated.notify_all();
            }
        }
        job
    }
}

/// Bounded multi-threaded pool with a discard-oldest backpressure policy.
///
/// Constructed once at startup and shared (`Arc<TaskExecutor>`) with every
/// orchestrator; shut down explicitly at teardown.
pub struct TaskExecutor {
    shared: Arc<Shared>,
}

impl TaskExecutor {
    pub fn builder() -> TaskExecutorBuilder {
        TaskExecutorBuilder::new()
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        TaskExecutorBuilder::new()
            .core_workers(config.core_workers)
            .max_workers(config.max_workers())
            .keep_alive(config.keep_alive())
            .queue_capacity(config.queue_capacity)
            .thread_name(config.thread_name.clone())
            .build()
    }

    /// Fire-and-forget submission.
    ///
    /// Errors only when the job cannot be handed to the pool at all.
    pub fn submit<F>(&self, job: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.admit(Box::new(job))
    }

    /// Submit a job and get a handle to its return value.
    pub fn submit_for_result<F, T>(&self, job: F) -> Result<TaskHandle<T>, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(move || {
            // the handle may have been dropped; nobody is waiting then
            let _ = tx.send(job());
        })?;
        Ok(TaskHandle { rx })
    }

    fn admit(&self, job: Job) -> Result<(), ExecutorError> {
        let limits = &self.shared.limits;
        let mut state = self.shared.lock();

        if state.shutdown {
            return Err(ExecutorError::ShutDown);
        }
        if state.workers < limits.core_workers {
            return self.spawn_worker(&mut state, job);
        }
        if state.queue.len() < limits.queue_capacity {
            state.queue.push_back(job);
            drop(state);
            self.shared.work_available.notify_one();
            return Ok(());
        }
        if state.workers < limits.max_workers {
            return self.spawn_worker(&mut state, job);
        }

        let discarded = state.queue.pop_front();
        state.queue.push_back(job);
        state.evicted += 1;
        let queued = state.queue.len();
        drop(state);

        self.shared.work_available.notify_one();
        warn!(queued, "executor saturated, discarded oldest queued job");
        // dropped outside the lock: its captures may do work on drop
        drop(discarded);
        Ok(())
    }

    fn spawn_worker(&self, state: &mut PoolState, first: Job) -> Result<(), ExecutorError> {
        let worker_id = state.next_worker_id;
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(format!("{}-{}", self.shared.limits.thread_name, worker_id))
            .spawn(move || worker_loop(worker_id, shared, first))
            .map_err(|e| {
                error!(worker_id, error = %e, "failed to spawn worker");
                ExecutorError::Spawn(e)
            })?;

        state.next_worker_id += 1;
        state.workers += 1;
        debug!(worker_id, workers = state.workers, "spawned worker");
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock();
        PoolStats {
            workers: state.workers,
            idle: state.idle,
            queued: state.queue.len(),
            completed: state.completed,
            evicted: state.evicted,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().shutdown
    }

    /// Stop accepting jobs, let the workers drain the queue and wait up to
    /// `timeout` for them to exit.
    ///
    /// Falls back to [`shutdown_now`](Self::shutdown_now) when the drain does
    /// not finish in time. Returns whether the graceful path succeeded.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.begin_shutdown();
        info!("executor shutting down");

        if self.await_termination(timeout) {
            info!("executor shutdown complete");
            return true;
        }

        warn!("executor did not drain in time, dropping queued jobs");
        let dropped = self.shutdown_now();
        warn!(dropped, "executor forced shutdown");
        false
    }

    /// Drop every queued job and stop accepting new ones.
    ///
    /// Jobs already running cannot be interrupted; their threads are left to
    /// finish on their own. Returns the number of dropped jobs.
    pub fn shutdown_now(&self) -> usize {
        let dropped: Vec<Job> = {
            let mut state = self.shared.lock();
            state.shutdown = true;
            state.queue.drain(..).collect()
        };
        self.shared.work_available.notify_all();
        dropped.len()
    }

    /// Wait until every worker has exited, or `timeout` elapses.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();
        while state.workers > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .terminated
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
        true
    }

    fn begin_shutdown(&self) {
        self.shared.lock().shutdown = true;
        self.shared.work_available.notify_all();
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        // idle core workers would otherwise wait forever
        self.begin_shutdown();
    }
}

fn worker_loop(worker_id: usize, shared: Arc<Shared>, first: Job) {
    let mut next = Some(first);
    while let Some(job) = next.take() {
        run_job(worker_id, job);
        next = shared.next_job(true);
    }
    debug!(worker_id, "worker exited");
}

fn run_job(worker_id: usize, job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        error!(
            worker_id,
            panic = %panic_message(&*payload),
            "job panicked"
        );
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Builder for [`TaskExecutor`].
#[derive(Debug, Clone)]
pub struct TaskExecutorBuilder {
    limits: PoolLimits,
    max_explicit: bool,
}

impl TaskExecutorBuilder {
    pub fn new() -> Self {
        let defaults = ExecutorConfig::default();
        Self {
            limits: PoolLimits {
                core_workers: defaults.core_workers,
                max_workers: defaults.max_workers(),
                keep_alive: defaults.keep_alive(),
                queue_capacity: defaults.queue_capacity,
                thread_name: defaults.thread_name,
            },
            max_explicit: false,
        }
    }

    pub fn core_workers(mut self, n: usize) -> Self {
        self.limits.core_workers = n.max(1);
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.limits.max_workers = n;
        self.max_explicit = true;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.limits.keep_alive = keep_alive;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.limits.queue_capacity = n.max(1);
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.limits.thread_name = name.into();
        self
    }

    /// Workers are started lazily, on submission.
    pub fn build(self) -> TaskExecutor {
        let mut limits = self.limits;
        if !self.max_explicit {
            limits.max_workers = limits.core_workers * 4;
        }
        limits.max_workers = limits.max_workers.max(limits.core_workers);

        TaskExecutor {
            shared: Arc::new(Shared {
                limits,
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    workers: 0,
                    idle: 0,
                    next_worker_id: 0,
                    shutdown: false,
                    completed: 0,
                    evicted: 0,
                }),
                work_available: Condvar::new(),
                terminated: Condvar::new(),
            }),
        }
    }
}

impl Default for TaskExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the value of a job submitted with `submit_for_result`.
///
/// Await it from async code, or call [`wait`](Self::wait) from a plain
/// thread (not from inside an async runtime).
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    pub fn wait(self) -> Result<T, JobCancelled> {
        self.rx.blocking_recv().map_err(|_| JobCancelled)
    }

    /// Non-blocking check. `None` while the job has not finished.
    pub fn try_result(&mut self) -> Option<Result<T, JobCancelled>> {
        match self.rx.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(JobCancelled)),
        }
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, JobCancelled>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|r| r.map_err(|_| JobCancelled))
    }
}
