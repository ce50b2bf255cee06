//! In-crate fakes of the engine boundary, and the runtime tests built on them.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::container_management::runtime::{ContainerApi, LogOptions, LogStream};
use crate::container_management::types::{ContainerHandle, ContainerSpec};
use crate::error_handling::types::ContainerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Start(String),
    Wait(String),
    Logs(String, LogOptions),
    Remove(String),
}

type StartHook = Box<dyn Fn(&ContainerSpec) + Send + Sync>;

/// Scripted [`ContainerApi`] that records every call it receives.
#[derive(Default)]
pub struct MockApi {
    calls: Arc<Mutex<Vec<Call>>>,
    specs: Mutex<HashMap<String, ContainerSpec>>,
    next_id: AtomicUsize,
    exit_code: i64,
    fail_create: bool,
    fail_start: bool,
    fail_wait: bool,
    hang_wait: bool,
    panic_wait: bool,
    fail_remove: bool,
    log_chunks: Vec<Vec<u8>>,
    log_error: Option<String>,
    on_start: Option<StartHook>,
}

impl MockApi {
    pub fn exiting(exit_code: i64) -> Self {
        Self {
            exit_code,
            ..Default::default()
        }
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_wait(mut self) -> Self {
        self.fail_wait = true;
        self
    }

    pub fn hanging_wait(mut self) -> Self {
        self.hang_wait = true;
        self
    }

    pub fn panicking_wait(mut self) -> Self {
        self.panic_wait = true;
        self
    }

    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    pub fn with_logs(mut self, chunks: &[&[u8]]) -> Self {
        self.log_chunks = chunks.iter().map(|c| c.to_vec()).collect();
        self
    }

    /// The log stream yields its chunks, then fails with `reason`.
    pub fn failing_logs(mut self, reason: &str) -> Self {
        self.log_error = Some(reason.to_string());
        self
    }

    /// Runs `hook` with the container's spec when it is started, standing in
    /// for whatever the image would do to its bind mounts.
    pub fn on_start(mut self, hook: impl Fn(&ContainerSpec) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Shared view of the call log that stays valid after the mock is moved.
    pub fn call_log(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn count(calls: &Arc<Mutex<Vec<Call>>>, pred: impl Fn(&Call) -> bool) -> usize {
    calls.lock().unwrap().iter().filter(|c| pred(c)).count()
}

pub fn snapshot(calls: &Arc<Mutex<Vec<Call>>>) -> Vec<Call> {
    calls.lock().unwrap().clone()
}

#[async_trait]
impl ContainerApi for MockApi {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, ContainerError> {
        if self.fail_create {
            self.record(Call::Create(String::new()));
            return Err(ContainerError::Launch(format!(
                "No such image: {}",
                spec.image
            )));
        }
        let id = format!(
            "mock{:08}{}",
            self.next_id.fetch_add(1, Ordering::SeqCst),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        self.record(Call::Create(id.clone()));
        self.specs.lock().unwrap().insert(id.clone(), spec.clone());
        Ok(ContainerHandle::new(id))
    }

    async fn start(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        self.record(Call::Start(handle.id().to_string()));
        if self.fail_start {
            return Err(ContainerError::Runtime("cannot start container".into()));
        }
        if let Some(hook) = &self.on_start {
            let spec = self.specs.lock().unwrap().get(handle.id()).cloned();
            if let Some(spec) = spec {
                hook(&spec);
            }
        }
        Ok(())
    }

    async fn wait(&self, handle: &ContainerHandle) -> Result<i64, ContainerError> {
        self.record(Call::Wait(handle.id().to_string()));
        if self.hang_wait {
            futures::future::pending::<()>().await;
        }
        if self.panic_wait {
            panic!("engine client panicked while waiting");
        }
        if self.fail_wait {
            return Err(ContainerError::Runtime("connection reset while waiting".into()));
        }
        Ok(self.exit_code)
    }

    fn logs<'a>(&'a self, handle: &'a ContainerHandle, options: LogOptions) -> LogStream<'a> {
        self.record(Call::Logs(handle.id().to_string(), options));
        let mut frames: Vec<Result<Vec<u8>, ContainerError>> =
            self.log_chunks.iter().cloned().map(Ok).collect();
        if let Some(reason) = &self.log_error {
            frames.push(Err(ContainerError::Runtime(reason.clone())));
        }
        futures::stream::iter(frames).boxed()
    }

    async fn remove(&self, handle: ContainerHandle) -> Result<(), ContainerError> {
        self.record(Call::Remove(handle.id().to_string()));
        if self.fail_remove {
            return Err(ContainerError::Runtime("removal in progress".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod api_runtime_tests {
    use super::*;
    use crate::container_management::types::{CompletionResult, Diagnostics};
    use crate::container_management::{ApiRuntime, ContainerRuntime, RuntimeKind};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn spec() -> ContainerSpec {
        ContainerSpec::new("projectunik/boot-creator")
            .args(["-d", "/opt/vol/"])
            .bind("/tmp/stage", "/opt/vol/")
            .privileged(true)
    }

    fn creates(c: &Call) -> bool {
        matches!(c, Call::Create(id) if !id.is_empty())
    }

    fn removes(c: &Call) -> bool {
        matches!(c, Call::Remove(_))
    }

    fn logs(c: &Call) -> bool {
        matches!(c, Call::Logs(..))
    }

    #[tokio::test]
    async fn success_runs_full_lifecycle_in_order() {
        let api = MockApi::exiting(0);
        let calls = api.call_log();
        let runtime = ApiRuntime::new(api);

        let completion = assert_ok!(runtime.run(spec()).await);
        assert_eq!(completion, CompletionResult::success());
        assert_eq!(runtime.kind(), RuntimeKind::Api);

        let recorded = snapshot(&calls);
        let id = match &recorded[0] {
            Call::Create(id) => id.clone(),
            other => panic!("expected create first, got {:?}", other),
        };
        assert_eq!(
            recorded,
            vec![
                Call::Create(id.clone()),
                Call::Start(id.clone()),
                Call::Wait(id.clone()),
                Call::Remove(id),
            ]
        );
    }

    #[tokio::test]
    async fn non_zero_exit_collects_logs_before_removal() {
        let api = MockApi::exiting(137).with_logs(&[b"formatting volume\n", b"killed\n"]);
        let calls = api.call_log();
        let runtime = ApiRuntime::new(api);

        let completion = assert_ok!(runtime.run(spec()).await);
        assert_eq!(completion.exit_code, 137);
        assert_eq!(
            completion.diagnostics,
            Some(Diagnostics::Collected(b"formatting volume\nkilled\n".to_vec()))
        );

        let recorded = snapshot(&calls);
        assert_eq!(count(&calls, logs), 1);
        let logs_at = recorded.iter().position(logs).unwrap();
        let remove_at = recorded.iter().position(removes).unwrap();
        assert!(logs_at < remove_at);

        match &recorded[logs_at] {
            Call::Logs(_, options) => assert_eq!(options, &LogOptions::full_history()),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn log_failure_is_downgraded_to_unavailable() {
        let api = MockApi::exiting(1).failing_logs("log driver does not support reading");
        let calls = api.call_log();
        let runtime = ApiRuntime::new(api);

        let completion = assert_ok!(runtime.run(spec()).await);
        assert_eq!(completion.exit_code, 1);
        assert!(matches!(
            completion.diagnostics,
            Some(Diagnostics::Unavailable(ref reason)) if reason.contains("log driver")
        ));
        assert_eq!(count(&calls, removes), 1);
    }

    #[tokio::test]
    async fn log_failure_midway_keeps_partial_output() {
        let api = MockApi::exiting(1)
            .with_logs(&[b"mkfs.ext2: ", b"writing superblock\n"])
            .failing_logs("unexpected EOF");
        let runtime = ApiRuntime::new(api);

        let completion = assert_ok!(runtime.run(spec()).await);
        assert_eq!(
            completion.diagnostics,
            Some(Diagnostics::Collected(
                b"mkfs.ext2: writing superblock\n".to_vec()
            ))
        );
    }

    #[tokio::test]
    async fn create_failure_is_launch_error_without_removal() {
        let api = MockApi::failing_create();
        let calls = api.call_log();
        let runtime = ApiRuntime::new(api);

        let err = assert_err!(runtime.run(spec()).await);
        assert!(err.is_launch());
        assert_eq!(count(&calls, removes), 0);
    }

    #[tokio::test]
    async fn start_failure_skips_wait_and_still_removes() {
        let api = MockApi::exiting(0).failing_start();
        let calls = api.call_log();
        let runtime = ApiRuntime::new(api);

        let err = assert_err!(runtime.run(spec()).await);
        assert!(matches!(err, ContainerError::Runtime(_)));
        assert_eq!(count(&calls, |c| matches!(c, Call::Wait(_))), 0);
        assert_eq!(count(&calls, creates), 1);
        assert_eq!(count(&calls, removes), 1);
    }

    #[tokio::test]
    async fn wait_failure_still_removes() {
        let api = MockApi::exiting(0).failing_wait();
        let calls = api.call_log();
        let runtime = ApiRuntime::new(api);

        let err = assert_err!(runtime.run(spec()).await);
        assert!(matches!(err, ContainerError::Runtime(_)));
        assert_eq!(count(&calls, logs), 0);
        assert_eq!(count(&calls, removes), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_fails_and_removes() {
        let api = MockApi::exiting(0).hanging_wait();
        let calls = api.call_log();
        let runtime = ApiRuntime::new(api).with_wait_timeout(Some(Duration::from_secs(30)));

        let err = assert_err!(runtime.run(spec()).await);
        assert!(err.to_string().contains("did not finish within 30s"));
        assert_eq!(count(&calls, removes), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_run_still_removes_instance() {
        let api = MockApi::exiting(0).hanging_wait();
        let calls = api.call_log();
        let runtime = ApiRuntime::new(api);

        let cancelled = tokio::time::timeout(Duration::from_secs(5), runtime.run(spec())).await;
        assert!(cancelled.is_err());
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(count(&calls, creates), 1);
        assert_eq!(
            count(&calls, removes),
            1,
            "created instance never removed: {:?}",
            snapshot(&calls)
        );
    }

    #[tokio::test]
    async fn panicking_run_still_removes_instance() {
        let api = MockApi::exiting(0).panicking_wait();
        let calls = api.call_log();
        let runtime = Arc::new(ApiRuntime::new(api));

        let task = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move { runtime.run(spec()).await })
        };
        let joined = task.await;
        assert!(joined.unwrap_err().is_panic());
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(count(&calls, removes), 1);
    }

    #[tokio::test]
    async fn released_instance_is_not_removed_again() {
        let api = MockApi::exiting(0);
        let calls = api.call_log();
        let runtime = ApiRuntime::new(api);

        assert_ok!(runtime.run(spec()).await);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(count(&calls, removes), 1);
    }

    #[tokio::test]
    async fn removal_failure_does_not_fail_successful_run() {
        let api = MockApi::exiting(0).failing_remove();
        let calls = api.call_log();
        let runtime = ApiRuntime::new(api);

        assert_ok!(runtime.run(spec()).await);
        assert_eq!(count(&calls, removes), 1);
    }

    #[tokio::test]
    async fn every_create_is_paired_with_one_remove() {
        let scenarios = vec![
            MockApi::exiting(0),
            MockApi::exiting(2),
            MockApi::exiting(0).failing_start(),
            MockApi::exiting(0).failing_wait(),
            MockApi::exiting(9).failing_logs("gone"),
            MockApi::exiting(0).failing_remove(),
        ];

        for api in scenarios {
            let calls = api.call_log();
            let runtime = ApiRuntime::new(api);
            let _ = runtime.run(spec()).await;

            let recorded = snapshot(&calls);
            let created: Vec<_> = recorded
                .iter()
                .filter_map(|c| match c {
                    Call::Create(id) => Some(id.clone()),
                    _ => None,
                })
                .collect();
            let removed: Vec<_> = recorded
                .iter()
                .filter_map(|c| match c {
                    Call::Remove(id) => Some(id.clone()),
                    _ => None,
                })
                .collect();
            assert_eq!(created, removed, "calls: {:?}", recorded);
            assert_eq!(created.len(), 1);
        }
    }
}

#[cfg(all(test, unix))]
mod cli_runtime_tests {
    use crate::container_management::types::{ContainerSpec, Diagnostics};
    use crate::container_management::{CliRuntime, ContainerRuntime, RuntimeKind};
    use crate::error_handling::types::ContainerError;
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    // Serialized: writing a script while another test forks can make exec fail with ETXTBSY.

    /// Writes an executable shell script standing in for the docker binary.
    fn fake_docker(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("docker");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn spec() -> ContainerSpec {
        ContainerSpec::new("projectunik/boot-creator")
            .args(["-a", "console=ttyS0"])
            .bind("/tmp/stage", "/opt/vol/")
            .privileged(true)
    }

    #[tokio::test]
    #[serial]
    async fn zero_exit_is_success() {
        let dir = TempDir::new().unwrap();
        let runtime = CliRuntime::new(fake_docker(dir.path(), "exit 0").to_string_lossy());

        let completion = assert_ok!(runtime.run(spec()).await);
        assert!(completion.succeeded());
        assert!(completion.diagnostics.is_none());
        assert_eq!(runtime.kind(), RuntimeKind::Cli);
    }

    #[tokio::test]
    #[serial]
    async fn receives_synthesized_arguments() {
        let dir = TempDir::new().unwrap();
        let record = dir.path().join("argv");
        let script = format!("printf '%s\\n' \"$@\" > {}", record.display());
        let runtime = CliRuntime::new(fake_docker(dir.path(), &script).to_string_lossy());

        assert_ok!(runtime.run(spec()).await);
        let argv = std::fs::read_to_string(&record).unwrap();
        assert_eq!(
            argv.lines().collect::<Vec<_>>(),
            CliRuntime::command_args(&spec())
        );
    }

    #[tokio::test]
    #[serial]
    async fn non_zero_exit_carries_combined_output() {
        let dir = TempDir::new().unwrap();
        let runtime = CliRuntime::new(
            fake_docker(dir.path(), "echo building; echo 'no space left' >&2; exit 3")
                .to_string_lossy(),
        );

        let completion = assert_ok!(runtime.run(spec()).await);
        assert_eq!(completion.exit_code, 3);
        assert_eq!(
            completion.diagnostics,
            Some(Diagnostics::Collected(b"building\nno space left\n".to_vec()))
        );
    }

    #[tokio::test]
    #[serial]
    async fn killed_child_reports_shell_style_status() {
        let dir = TempDir::new().unwrap();
        let runtime = CliRuntime::new(fake_docker(dir.path(), "kill -9 $$").to_string_lossy());

        let completion = assert_ok!(runtime.run(spec()).await);
        assert_eq!(completion.exit_code, 137);
    }

    #[tokio::test]
    #[serial]
    async fn daemon_error_status_is_launch_error() {
        let dir = TempDir::new().unwrap();
        let runtime = CliRuntime::new(
            fake_docker(
                dir.path(),
                "echo 'pulling image'; echo 'Unable to find image locally' >&2; exit 125",
            )
            .to_string_lossy(),
        );

        let err = assert_err!(runtime.run(spec()).await);
        assert!(err.is_launch());
        let text = err.to_string();
        assert!(text.contains("pulling image"));
        assert!(text.contains("Unable to find image"));
    }

    #[tokio::test]
    #[serial]
    async fn reserved_command_statuses_are_launch_errors() {
        for status in [126, 127] {
            let dir = TempDir::new().unwrap();
            let body = format!("echo 'exec: /boot-creator: not runnable' >&2; exit {}", status);
            let runtime = CliRuntime::new(fake_docker(dir.path(), &body).to_string_lossy());

            let err = assert_err!(runtime.run(spec()).await);
            assert!(err.is_launch(), "status {} gave {:?}", status, err);
            assert!(err.to_string().contains("not runnable"));
        }
    }

    #[tokio::test]
    #[serial]
    async fn missing_binary_is_runtime_unavailable() {
        let dir = TempDir::new().unwrap();
        let runtime = CliRuntime::new(dir.path().join("no-docker").to_string_lossy());

        let err = assert_err!(runtime.run(spec()).await);
        assert!(matches!(err, ContainerError::RuntimeUnavailable(_)));
    }
}
