//! ImexHandler - 非同期インポート/エクスポートのオーケストレーター
//!
//! # フロー（呼び出し元スレッド）
//! 1. コンテキストを `TaskParam` にキャプチャ
//! 2. TaskKey を発行し、RUNNING を書き込む（失敗したらここでエラー）
//! 3. ジョブを TaskExecutor に渡して、すぐに TaskKey を返す
//!
//! # フロー（ワーカースレッド）
//! 4. TaskHooks に委譲（parse / write）
//! 5. 成功でも失敗でも、終端の TaskResult を短い TTL で書き込む
//!
//! Once a key has been handed out, every outcome of the job (hook error,
//! station error, panic) ends as a DONE or FAILED entry. Nothing propagates
//! out of the worker.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::executor::{TaskExecutor, panic_message};
use super::status::StatusBoard;
use super::temp::{TempArtifact, TempStore};
use crate::domain::errors::{ImexError, JobError};
use crate::domain::ids::TaskKey;
use crate::domain::param::TaskParam;
use crate::domain::resource::StationResource;
use crate::domain::result::{BatchResult, TaskResult};
use crate::ports::{
    ContextProvider, EXPORT_COUNT_LIMIT, KeyGenerator, TaskHooks, TransactionStation, Translator,
    UploadSource,
};

/// Everything a job needs once it is on a worker.
pub(crate) struct Pipeline {
    pub(crate) hooks: Arc<dyn TaskHooks>,
    pub(crate) board: StatusBoard,
    pub(crate) station: Arc<dyn TransactionStation>,
    pub(crate) temp: Arc<TempStore>,
    pub(crate) translator: Arc<dyn Translator>,
}

/// Upload/download orchestrator for one task type.
///
/// # 使用例
/// ```ignore
/// let handler = ImexHandler::builder(Arc::new(OrderHooks))
///     .executor(executor.clone())
///     .status_store(store)
///     .station(station)
///     .context(context)
///     .build()?;
///
/// let key = handler.download(Some(json!({"status": "open"})), "orders.csv")?;
/// // later, from any thread
/// let result = handler.status(&key);
/// ```
pub struct ImexHandler {
    pub(crate) pipeline: Arc<Pipeline>,
    pub(crate) executor: Arc<TaskExecutor>,
    pub(crate) context: Arc<dyn ContextProvider>,
    pub(crate) keys: Arc<dyn KeyGenerator>,
}

impl ImexHandler {
    /// Import a file using the caller's current context.
    pub fn upload<S: UploadSource>(&self, source: S) -> Result<TaskKey, ImexError> {
        let param = self.capture();
        self.upload_with(source, param)
    }

    /// Import a file with an explicitly built context.
    pub fn upload_with<S: UploadSource>(
        &self,
        source: S,
        param: TaskParam,
    ) -> Result<TaskKey, ImexError> {
        let pipeline = Arc::clone(&self.pipeline);
        self.launch("upload", move |key| pipeline.run_upload(key, source, param))
    }

    /// Import a file by way of the station: the payload is pushed on the
    /// caller's thread and pulled back by the worker.
    pub fn upload_staged<S: UploadSource>(&self, source: S) -> Result<TaskKey, ImexError> {
        let param = self.capture();
        self.upload_staged_with(source, param)
    }

    pub fn upload_staged_with<S: UploadSource>(
        &self,
        source: S,
        param: TaskParam,
    ) -> Result<TaskKey, ImexError> {
        let resource = StationResource::new(source.open()?, source.name(), &param.language);
        let station_key = self.pipeline.station.push(resource)?;

        let pipeline = Arc::clone(&self.pipeline);
        let staged = station_key.clone();
        let launched = self.launch("staged upload", move |key| {
            pipeline.run_staged_upload(key, staged, param)
        });

        if launched.is_err()
            && let Err(e) = self.pipeline.station.delete(&station_key)
        {
            warn!(station_key = %station_key, error = %e, "failed to release staged upload");
        }
        launched
    }

    /// Export the rows selected by `query` into a file named after
    /// `file_name`.
    pub fn download(
        &self,
        query: Option<serde_json::Value>,
        file_name: &str,
    ) -> Result<TaskKey, ImexError> {
        let mut param = self.capture();
        param.query = query;
        self.download_with(param, file_name)
    }

    pub fn download_with(&self, param: TaskParam, file_name: &str) -> Result<TaskKey, ImexError> {
        let pipeline = Arc::clone(&self.pipeline);
        let file_name = file_name.to_string();
        self.launch("download", move |key| {
            pipeline.run_download(key, &file_name, param)
        })
    }

    /// Current status of a task. Never fails and never waits for the job.
    pub fn status(&self, key: &TaskKey) -> TaskResult {
        self.pipeline.board.lookup(key)
    }

    pub fn hooks_name(&self) -> &str {
        self.pipeline.hooks.name()
    }

    pub fn executor(&self) -> &Arc<TaskExecutor> {
        &self.executor
    }

    /// Shut the (shared) executor down and retry pending temp deletions.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let drained = self.executor.shutdown(timeout);
        let left = self.pipeline.temp.retry_deferred();
        if left > 0 {
            warn!(left, "temp files still pending deletion");
        }
        drained
    }

    fn capture(&self) -> TaskParam {
        TaskParam::from_context(self.context.current())
    }

    fn launch<F>(&self, kind: &'static str, job: F) -> Result<TaskKey, ImexError>
    where
        F: FnOnce(TaskKey) + Send + 'static,
    {
        let key = self.keys.generate_task_key();
        self.pipeline.board.open(&key)?;

        let job_key = key.clone();
        if let Err(e) = self.executor.submit(move || job(job_key)) {
            error!(task_key = %key, error = %e, "failed to enqueue task");
            // the caller never sees this key; don't leave it RUNNING
            self.pipeline.board.close(&key, &TaskResult::failed());
            return Err(e.into());
        }

        info!(task_key = %key, hooks = self.pipeline.hooks.name(), kind, "task submitted");
        Ok(key)
    }
}

impl Pipeline {
    fn run_upload<S: UploadSource>(&self, key: TaskKey, source: S, param: TaskParam) {
        let result = self.contain(&key, "upload", || {
            let mut input = source.open()?;
            Ok(self.hooks.parse(&mut *input, &param)?)
        });
        self.finish(&key, result);
    }

    fn run_staged_upload(&self, key: TaskKey, station_key: String, param: TaskParam) {
        let result = self.contain(&key, "staged upload", || {
            let mut input = self.station.pull(&station_key)?;
            Ok(self.hooks.parse(&mut *input, &param)?)
        });

        if self.hooks.clear_station_resource()
            && let Err(e) = self.station.delete(&station_key)
        {
            warn!(task_key = %key, station_key = %station_key, error = %e, "failed to release staged upload");
        }
        self.finish(&key, result);
    }

    fn run_download(&self, key: TaskKey, file_name: &str, param: TaskParam) {
        let result = self.contain(&key, "download", || self.export(file_name, &param));
        info!(task_key = %key, file = file_name, status = %result.status, "download finished");
        self.finish(&key, result);
    }

    fn export(&self, file_name: &str, param: &TaskParam) -> Result<TaskResult, JobError> {
        if let Some(threshold) = self.hooks.count_limit() {
            let count = self.hooks.count(param)?;
            if count > threshold {
                warn!(count, threshold, file = file_name, "export refused: too many rows");
                let msg = self.translator.translate(
                    &param.language,
                    EXPORT_COUNT_LIMIT,
                    &[threshold.to_string()],
                );
                return Ok(TaskResult::failed_with(msg));
            }
        }

        let artifact = self.temp.create(file_name)?;
        let result = self.export_into(&artifact, param);
        artifact.remove();
        result
    }

    fn export_into(
        &self,
        artifact: &TempArtifact,
        param: &TaskParam,
    ) -> Result<TaskResult, JobError> {
        {
            let mut out = artifact.writer()?;
            self.hooks.write(&mut out, param)?;
            out.flush()?;
        }

        let resource = StationResource::new(
            Box::new(artifact.reader()?),
            artifact.file_name(),
            &param.language,
        );
        let station_path = self.station.push(resource)?;
        let url = self.station.wrap_access_url(&station_path);
        info!(station_path = %station_path, url = %url, "export pushed to station");

        Ok(TaskResult::done(BatchResult::with_urls(vec![url])))
    }

    /// Run one job body, turning errors and panics into a FAILED result.
    fn contain<F>(&self, key: &TaskKey, kind: &str, body: F) -> TaskResult
    where
        F: FnOnce() -> Result<TaskResult, JobError>,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(body))
            .unwrap_or_else(|payload| Err(JobError::Panicked(panic_message(&*payload))));

        match outcome {
            Ok(result) if result.is_terminal() => result,
            Ok(result) => {
                warn!(task_key = %key, kind, status = %result.status, "hook returned a non-terminal status");
                TaskResult::failed()
            }
            Err(e) => {
                error!(task_key = %key, kind, hooks = self.hooks.name(), error = %e, "task failed");
                TaskResult::failed()
            }
        }
    }

    fn finish(&self, key: &TaskKey, result: TaskResult) {
        if self.board.close(key, &result) {
            info!(task_key = %key, status = %result.status, msg = %result.msg, "task finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ImexHandlerBuilder;
    use crate::domain::errors::{HookError, StationError, StoreError};
    use crate::domain::param::{CallContext, UserInfo};
    use crate::domain::status::TaskStatus;
    use crate::impls::{InMemoryStatusStore, LocalStation, StaticContext};
    use crate::ports::{StatusStore, SystemClock};
    use serde_json::json;
    use std::io::Read;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Hooks double: records what it saw and fails on demand.
    #[derive(Default)]
    struct RecordingHooks {
        limit: Option<u64>,
        rows: u64,
        fail_write: bool,
        panic_parse: bool,
        keep_staged: bool,
        seen_params: Mutex<Vec<TaskParam>>,
        writes: AtomicUsize,
    }

    impl TaskHooks for RecordingHooks {
        fn name(&self) -> &str {
            "recording"
        }

        fn parse(
            &self,
            input: &mut dyn Read,
            param: &TaskParam,
        ) -> Result<TaskResult, HookError> {
            if self.panic_parse {
                panic!("parser blew up");
            }
            self.seen_params.lock().unwrap().push(param.clone());
            let mut body = String::new();
            input.read_to_string(&mut body)?;
            let lines = body.lines().count();
            Ok(TaskResult::done(
                BatchResult::empty().with_detail(json!({ "lines": lines })),
            ))
        }

        fn write(&self, output: &mut dyn Write, param: &TaskParam) -> Result<(), HookError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.seen_params.lock().unwrap().push(param.clone());
            if self.fail_write {
                return Err(HookError::invalid("query rejected"));
            }
            writeln!(output, "id,name")?;
            writeln!(output, "1,widget")?;
            Ok(())
        }

        fn count_limit(&self) -> Option<u64> {
            self.limit
        }

        fn count(&self, _param: &TaskParam) -> Result<u64, HookError> {
            Ok(self.rows)
        }

        fn clear_station_resource(&self) -> bool {
            !self.keep_staged
        }
    }

    struct Fixture {
        handler: ImexHandler,
        hooks: Arc<RecordingHooks>,
        station_dir: TempDir,
        scratch: TempDir,
    }

    fn fixture(hooks: RecordingHooks) -> Fixture {
        fixture_with_store(hooks, Arc::new(InMemoryStatusStore::new(SystemClock)))
    }

    fn fixture_with_store(hooks: RecordingHooks, store: Arc<dyn StatusStore>) -> Fixture {
        let hooks = Arc::new(hooks);
        let station_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let executor = Arc::new(
            TaskExecutor::builder()
                .core_workers(1)
                .max_workers(2)
                .queue_capacity(8)
                .build(),
        );
        let context = StaticContext::new(CallContext {
            mart: "m01".into(),
            language: "en".into(),
            user: UserInfo::new("alice"),
        });

        let handler = ImexHandlerBuilder::new(hooks.clone())
            .executor(executor)
            .status_store(store)
            .station(Arc::new(
                LocalStation::new(station_dir.path()).with_base_url("https://files.test"),
            ))
            .context(Arc::new(context))
            .temp_dir(scratch.path())
            .build()
            .unwrap();

        Fixture {
            handler,
            hooks,
            station_dir,
            scratch,
        }
    }

    fn wait_terminal(handler: &ImexHandler, key: &TaskKey) -> TaskResult {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let result = handler.status(key);
            if result.is_terminal() || std::time::Instant::now() > deadline {
                return result;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn upload_parses_with_captured_context() {
        let fx = fixture(RecordingHooks::default());

        let key = fx
            .handler
            .upload(crate::ports::MemoryUpload::new("a.csv", "x\ny\nz\n"))
            .unwrap();
        let result = wait_terminal(&fx.handler, &key);

        assert_eq!(result.status, TaskStatus::Done);
        assert_eq!(result.result.detail, Some(json!({"lines": 3})));
        let seen = fx.hooks.seen_params.lock().unwrap();
        assert_eq!(seen[0].mart, "m01");
        assert_eq!(seen[0].user.user_name, "alice");
    }

    #[test]
    fn upload_with_explicit_param_ignores_provider() {
        let fx = fixture(RecordingHooks::default());
        let param = TaskParam {
            mart: "m99".into(),
            language: "de".into(),
            entrance: Some(2),
            ..Default::default()
        };

        let key = fx
            .handler
            .upload_with(crate::ports::MemoryUpload::new("a.csv", "x\n"), param)
            .unwrap();
        wait_terminal(&fx.handler, &key);

        let seen = fx.hooks.seen_params.lock().unwrap();
        assert_eq!(seen[0].mart, "m99");
        assert_eq!(seen[0].entrance, Some(2));
    }

    #[test]
    fn panicking_parse_is_recorded_as_failed() {
        let fx = fixture(RecordingHooks {
            panic_parse: true,
            ..Default::default()
        });

        let key = fx
            .handler
            .upload(crate::ports::MemoryUpload::new("a.csv", "x\n"))
            .unwrap();
        let result = wait_terminal(&fx.handler, &key);

        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.msg, "failed");
    }

    #[test]
    fn staged_upload_is_released_after_parse() {
        let fx = fixture(RecordingHooks::default());

        let key = fx
            .handler
            .upload_staged(crate::ports::MemoryUpload::new("in.csv", "a\nb\n"))
            .unwrap();
        let result = wait_terminal(&fx.handler, &key);

        assert_eq!(result.status, TaskStatus::Done);
        assert_eq!(result.result.detail, Some(json!({"lines": 2})));
        assert_eq!(count_files(fx.station_dir.path()), 0);
    }

    #[test]
    fn staged_upload_can_be_kept() {
        let fx = fixture(RecordingHooks {
            keep_staged: true,
            ..Default::default()
        });

        let key = fx
            .handler
            .upload_staged(crate::ports::MemoryUpload::new("in.csv", "a\n"))
            .unwrap();
        wait_terminal(&fx.handler, &key);

        assert_eq!(count_files(fx.station_dir.path()), 1);
    }

    #[test]
    fn download_pushes_file_and_returns_url() {
        let fx = fixture(RecordingHooks::default());

        let key = fx
            .handler
            .download(Some(json!({"status": "open"})), "orders.csv")
            .unwrap();
        let result = wait_terminal(&fx.handler, &key);

        assert_eq!(result.status, TaskStatus::Done);
        assert_eq!(result.result.urls.len(), 1);
        let url = &result.result.urls[0];
        assert!(url.starts_with("https://files.test/"));
        assert!(url.ends_with(".csv"));

        let relative = url.trim_start_matches("https://files.test/");
        let pushed = std::fs::read_to_string(fx.station_dir.path().join(relative)).unwrap();
        assert_eq!(pushed, "id,name\n1,widget\n");

        let seen = fx.hooks.seen_params.lock().unwrap();
        assert_eq!(seen[0].query, Some(json!({"status": "open"})));
        assert_eq!(count_files(fx.scratch.path()), 0);
    }

    #[test]
    fn failed_write_still_deletes_temp_file() {
        let fx = fixture(RecordingHooks {
            fail_write: true,
            ..Default::default()
        });

        let key = fx.handler.download(None, "orders.csv").unwrap();
        let result = wait_terminal(&fx.handler, &key);

        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(count_files(fx.scratch.path()), 0);
        assert_eq!(count_files(fx.station_dir.path()), 0);
    }

    #[test]
    fn over_limit_export_never_writes() {
        let fx = fixture(RecordingHooks {
            limit: Some(50_000),
            rows: 500_000,
            ..Default::default()
        });

        let key = fx.handler.download(None, "orders.csv").unwrap();
        let result = wait_terminal(&fx.handler, &key);

        assert_eq!(result.status, TaskStatus::Failed);
        assert!(result.msg.contains("50000"), "msg was {:?}", result.msg);
        assert_eq!(fx.hooks.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn at_limit_export_proceeds() {
        let fx = fixture(RecordingHooks {
            limit: Some(10),
            rows: 10,
            ..Default::default()
        });

        let key = fx.handler.download(None, "orders.csv").unwrap();
        assert_eq!(wait_terminal(&fx.handler, &key).status, TaskStatus::Done);
        assert_eq!(fx.hooks.writes.load(Ordering::SeqCst), 1);
    }

    struct RefusingStore;

    impl StatusStore for RefusingStore {
        fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[test]
    fn store_failure_at_submission_creates_no_task() {
        let fx = fixture_with_store(RecordingHooks::default(), Arc::new(RefusingStore));

        let err = fx
            .handler
            .upload(crate::ports::MemoryUpload::new("a.csv", "x\n"))
            .unwrap_err();

        assert!(matches!(err, ImexError::TaskNotCreated { .. }));
        assert_eq!(fx.handler.executor().stats().completed, 0);
        assert!(fx.hooks.seen_params.lock().unwrap().is_empty());
    }

    #[test]
    fn shut_down_executor_rejects_submission() {
        let fx = fixture(RecordingHooks::default());
        assert!(fx.handler.shutdown(Duration::from_secs(1)));

        let err = fx.handler.download(None, "orders.csv").unwrap_err();
        assert!(matches!(err, ImexError::Executor(_)));
    }

    #[test]
    fn missing_staged_resource_fails_the_task() {
        let fx = fixture(RecordingHooks::default());
        let key = TaskKey::from_raw("IMEX:TASK:manual");
        fx.handler.pipeline.board.open(&key).unwrap();

        fx.handler
            .pipeline
            .run_staged_upload(key.clone(), "no/such.csv".into(), TaskParam::default());

        assert_eq!(fx.handler.status(&key).status, TaskStatus::Failed);
    }

    #[test]
    fn station_error_converts_into_job_error() {
        let err: JobError = StationError::NotFound("x".into()).into();
        assert!(err.to_string().contains("not found"));
    }

    fn count_files(dir: &std::path::Path) -> usize {
        let mut n = 0;
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                n += count_files(&path);
            } else {
                n += 1;
            }
        }
        n
    }
}
