//! Process supervisor, C5, spec.md §4.5.
//!
//! One [`Supervisor`] per mode, holding the "mode slot" behind a
//! `tokio::sync::Mutex` so start/stop/status transitions are serialized per
//! spec.md §4.5's invariant. Grounded on `original_source/utils/process.py`
//! (`register_process`/`safe_terminate`/two-phase terminate-then-kill) and
//! `original_source/routes/wifi.py`'s spawn/poll/terminate sequence,
//! generalized across modes instead of per-route globals (spec.md §9).

use std::io::Read;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use intercept_core::models::SupervisorFailure;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch, Mutex};

use crate::bus::EventBus;
use crate::registry::ProcessRegistry;

#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub pty: bool,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            pty: false,
        }
    }

    pub fn with_pty(mut self) -> Self {
        self.pty = true;
        self
    }

    fn display(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub enum CmdSpec {
    Single(ProcessSpec),
    Piped(ProcessSpec, ProcessSpec),
}

impl CmdSpec {
    fn launch_command(&self) -> String {
        match self {
            CmdSpec::Single(spec) => spec.display(),
            CmdSpec::Piped(up, down) => format!("{} | {}", up.display(), down.display()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("already running")]
    AlreadyRunning,
    #[error("not running")]
    NotRunning,
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("process exited early ({code:?}): {failure}")]
    EarlyExit {
        failure: SupervisorFailure,
        stderr_tail: String,
        code: Option<i32>,
    },
}

impl SupervisorError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SupervisorError::AlreadyRunning => StatusCode::CONFLICT,
            SupervisorError::NotRunning => StatusCode::OK,
            SupervisorError::SpawnFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SupervisorError::EarlyExit { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for SupervisorFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorFailure::Permission => write!(f, "permission denied"),
            SupervisorFailure::NoSuchDevice => write!(f, "no such device"),
            SupervisorFailure::Busy => write!(f, "device or resource busy"),
            SupervisorFailure::MonitorModeNotActive => write!(f, "monitor mode not active"),
            SupervisorFailure::Generic { detail } => write!(f, "{detail}"),
        }
    }
}

fn classify_stderr(tail: &str) -> SupervisorFailure {
    let lower = tail.to_lowercase();
    if lower.contains("permission denied") {
        SupervisorFailure::Permission
    } else if lower.contains("no such device") || lower.contains("no such file or directory") {
        SupervisorFailure::NoSuchDevice
    } else if lower.contains("resource busy") || lower.contains("usb_claim_interface") || lower.contains("already in use") {
        SupervisorFailure::Busy
    } else if lower.contains("monitor mode") {
        SupervisorFailure::MonitorModeNotActive
    } else {
        SupervisorFailure::Generic {
            detail: tail.trim().to_string(),
        }
    }
}

/// Reusable reader the mode-specific parser task consumes, hiding whether
/// the underlying stage is a plain pipe or a pseudo-terminal.
pub enum LineSource {
    Piped(tokio::io::Lines<BufReader<tokio::process::ChildStdout>>),
    Pty(mpsc::UnboundedReceiver<String>),
    /// WiFi/ADS-B JSON pollers don't consume the child's stdout at all; the
    /// parser task drives its own file/HTTP poll loop instead.
    None,
}

impl LineSource {
    pub async fn next_line(&mut self) -> Option<String> {
        match self {
            LineSource::Piped(lines) => lines.next_line().await.ok().flatten(),
            LineSource::Pty(rx) => rx.recv().await,
            LineSource::None => std::future::pending().await,
        }
    }
}

/// Cooperative stop notification: the parser task should exit promptly
/// (spec.md §5, "≤1s from stop-request to termination begin") once this
/// resolves.
#[derive(Clone)]
pub struct StopSignal(watch::Receiver<bool>);

impl StopSignal {
    pub async fn wait(&mut self) {
        while !*self.0.borrow() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }
}

enum Stage {
    Tokio {
        child: tokio::process::Child,
        pid: u32,
    },
    Pty {
        child: Box<dyn portable_pty::Child + Send + Sync>,
        pid: u32,
        master: Box<dyn portable_pty::MasterPty + Send>,
    },
}

impl Stage {
    fn pid(&self) -> u32 {
        match self {
            Stage::Tokio { pid, .. } => *pid,
            Stage::Pty { pid, .. } => *pid,
        }
    }
}

fn spawn_tokio_stage(spec: &ProcessSpec, stdin: Stdio) -> Result<(tokio::process::Child, u32), SupervisorError> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let child = cmd.spawn().map_err(|source| SupervisorError::SpawnFailed {
        program: spec.program.clone(),
        source,
    })?;
    let pid = child.id().unwrap_or(0);
    Ok((child, pid))
}

fn spawn_pty_stage(
    spec: &ProcessSpec,
) -> Result<(Box<dyn portable_pty::Child + Send + Sync>, u32, Box<dyn portable_pty::MasterPty + Send>), SupervisorError> {
    let pty_system = portable_pty::native_pty_system();
    let pair = pty_system
        .openpty(portable_pty::PtySize {
            rows: 24,
            cols: 200,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| SupervisorError::SpawnFailed {
            program: spec.program.clone(),
            source: std::io::Error::other(e),
        })?;

    let mut cmd = portable_pty::CommandBuilder::new(&spec.program);
    cmd.args(&spec.args);
    let child = pair.slave.spawn_command(cmd).map_err(|e| SupervisorError::SpawnFailed {
        program: spec.program.clone(),
        source: std::io::Error::other(e),
    })?;
    // Drop our handle to the slave so the master sees EOF once the child exits.
    drop(pair.slave);
    let pid = child.process_id().unwrap_or(0);
    Ok((child, pid, pair.master))
}

/// Bounded tail of a spawned process's stderr, kept so an early exit
/// (spec.md §4.5 step 6) can classify the failure cause. Capped at a
/// handful of lines — only the last lines before exit matter.
const STDERR_TAIL_LINES: usize = 20;
type StderrTail = Arc<std::sync::Mutex<std::collections::VecDeque<String>>>;

fn stderr_tail_text(tail: &StderrTail) -> String {
    tail.lock().unwrap().iter().cloned().collect::<Vec<_>>().join("\n")
}

/// Spawns a dedicated reader that forwards stderr lines to the bus and
/// retains the last [`STDERR_TAIL_LINES`] in `tail` for early-exit
/// classification, filtering the handful of progress-chatter prefixes
/// `airodump-ng` writes to stderr every second (spec.md §4.6's WiFi parser
/// note).
fn spawn_stderr_drain(
    stderr: tokio::process::ChildStderr,
    bus: EventBus,
    label: String,
    tail: StderrTail,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("CH ") || trimmed.starts_with("Elapsed") {
                continue;
            }
            {
                let mut guard = tail.lock().unwrap();
                if guard.len() == STDERR_TAIL_LINES {
                    guard.pop_front();
                }
                guard.push_back(trimmed.to_string());
            }
            bus.publish_typed("error", serde_json::json!({"text": format!("{label}: {trimmed}")}));
        }
    })
}

/// Bridges a PTY's blocking reader into an async line channel via a
/// dedicated blocking thread.
fn spawn_pty_line_pump(mut reader: Box<dyn Read + Send>) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        let text = String::from_utf8_lossy(&line).trim_end().to_string();
                        if tx.send(text).is_err() {
                            return;
                        }
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

/// Forwards upstream's stdout bytes into the downstream PTY's stdin, for
/// the piped `rtl_fm | multimon-ng` case. Runs on a blocking thread since
/// `portable_pty`'s writer is synchronous.
fn spawn_pty_feeder(upstream_stdout: tokio::process::ChildStdout, mut writer: Box<dyn std::io::Write + Send>) {
    std::thread::spawn(move || {
        let std_stdout = match upstream_stdout.try_into_std() {
            Ok(s) => s,
            Err(_) => return,
        };
        let mut reader = std_stdout;
        let _ = std::io::copy(&mut reader, &mut writer);
    });
}

struct PipelineHandle {
    started_at: DateTime<Utc>,
    launch_command: String,
    upstream: Stage,
    downstream: Option<Stage>,
    stop_tx: watch::Sender<bool>,
    parser_task: tokio::task::JoinHandle<()>,
    stderr_tasks: Vec<tokio::task::JoinHandle<()>>,
}

pub struct Supervisor {
    mode: &'static str,
    slot: Mutex<Option<PipelineHandle>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ModeStatusReport {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub launch_command: Option<String>,
}

impl Supervisor {
    pub fn new(mode: &'static str) -> Self {
        Self {
            mode,
            slot: Mutex::new(None),
        }
    }

    pub async fn status(&self) -> ModeStatusReport {
        let guard = self.slot.lock().await;
        match guard.as_ref() {
            Some(handle) => ModeStatusReport {
                running: true,
                started_at: Some(handle.started_at),
                launch_command: Some(handle.launch_command.clone()),
            },
            None => ModeStatusReport {
                running: false,
                started_at: None,
                launch_command: None,
            },
        }
    }

    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Implements the start protocol from spec.md §4.5 steps 1-6. `parser`
    /// is spawned as the dedicated parser task and receives the
    /// (possibly-`None`) line source plus a cooperative stop signal; it is
    /// responsible for publishing events to `bus` and updating whatever
    /// live-state store the caller's mode owns.
    pub async fn start<F, Fut>(
        &self,
        cmd: CmdSpec,
        bus: EventBus,
        registry: Arc<ProcessRegistry>,
        parser: F,
    ) -> Result<(), SupervisorError>
    where
        F: FnOnce(LineSource, StopSignal) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.slot.lock().await;
        if let Some(existing) = guard.as_mut() {
            if !process_has_exited(&mut existing.upstream) {
                return Err(SupervisorError::AlreadyRunning);
            }
            // Stale handle from a process that died without us noticing; drop it.
            *guard = None;
        }

        let launch_command = cmd.launch_command();
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut stderr_tasks = Vec::new();
        let stderr_tail: StderrTail = Arc::new(std::sync::Mutex::new(std::collections::VecDeque::new()));

        let (upstream, downstream, line_source) = match cmd {
            CmdSpec::Single(spec) => {
                if spec.pty {
                    let (child, pid, master) = spawn_pty_stage(&spec)?;
                    let reader = master.try_clone_reader().map_err(|e| SupervisorError::SpawnFailed {
                        program: spec.program.clone(),
                        source: std::io::Error::other(e),
                    })?;
                    let rx = spawn_pty_line_pump(reader);
                    (Stage::Pty { child, pid, master }, None, LineSource::Pty(rx))
                } else {
                    let (mut child, pid) = spawn_tokio_stage(&spec, Stdio::null())?;
                    let stdout = child.stdout.take().expect("piped stdout");
                    let stderr = child.stderr.take().expect("piped stderr");
                    stderr_tasks.push(spawn_stderr_drain(stderr, bus.clone(), spec.program.clone(), stderr_tail.clone()));
                    let lines = BufReader::new(stdout).lines();
                    (Stage::Tokio { child, pid }, None, LineSource::Piped(lines))
                }
            }
            CmdSpec::Piped(up_spec, down_spec) => {
                let (mut up_child, up_pid) = spawn_tokio_stage(&up_spec, Stdio::null())?;
                let up_stdout = up_child.stdout.take().expect("piped stdout");
                let up_stderr = up_child.stderr.take().expect("piped stderr");
                stderr_tasks.push(spawn_stderr_drain(up_stderr, bus.clone(), up_spec.program.clone(), stderr_tail.clone()));

                if down_spec.pty {
                    let (down_child, down_pid, master) = spawn_pty_stage(&down_spec)?;
                    let writer = master.take_writer().map_err(|e| SupervisorError::SpawnFailed {
                        program: down_spec.program.clone(),
                        source: std::io::Error::other(e),
                    })?;
                    spawn_pty_feeder(up_stdout, writer);
                    let reader = master.try_clone_reader().map_err(|e| SupervisorError::SpawnFailed {
                        program: down_spec.program.clone(),
                        source: std::io::Error::other(e),
                    })?;
                    let rx = spawn_pty_line_pump(reader);
                    (
                        Stage::Tokio { child: up_child, pid: up_pid },
                        Some(Stage::Pty {
                            child: down_child,
                            pid: down_pid,
                            master,
                        }),
                        LineSource::Pty(rx),
                    )
                } else {
                    let (mut down_child, down_pid) = spawn_tokio_stage(&down_spec, Stdio::piped())?;
                    let mut down_stdin = down_child.stdin.take().expect("piped stdin");
                    tokio::spawn(async move {
                        let mut reader = up_stdout;
                        let _ = tokio::io::copy(&mut reader, &mut down_stdin).await;
                    });
                    let down_stdout = down_child.stdout.take().expect("piped stdout");
                    let down_stderr = down_child.stderr.take().expect("piped stderr");
                    stderr_tasks.push(spawn_stderr_drain(down_stderr, bus.clone(), down_spec.program.clone(), stderr_tail.clone()));
                    let lines = BufReader::new(down_stdout).lines();
                    (
                        Stage::Tokio { child: up_child, pid: up_pid },
                        Some(Stage::Tokio {
                            child: down_child,
                            pid: down_pid,
                        }),
                        LineSource::Piped(lines),
                    )
                }
            }
        };

        registry.register(upstream.pid(), self.mode, launch_command.clone());
        if let Some(d) = &downstream {
            registry.register(d.pid(), self.mode, launch_command.clone());
        }

        let mut upstream = upstream;
        let mut downstream = downstream;

        // Step 6: wait <= 500ms and poll exit codes.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let early_exit = process_has_exited(&mut upstream) || downstream.as_mut().is_some_and(process_has_exited);
        if early_exit {
            // Give the stderr drain tasks a brief moment to flush whatever
            // the process wrote before exiting, so classification below has
            // something to work with.
            tokio::time::sleep(Duration::from_millis(50)).await;
            let code = match &mut upstream {
                Stage::Tokio { child, .. } => child.try_wait().ok().flatten().and_then(|s| s.code()),
                Stage::Pty { child, .. } => child.try_wait().ok().flatten().map(|s| s.exit_code() as i32),
            };
            let tail = stderr_tail_text(&stderr_tail);
            registry.unregister(upstream.pid());
            if let Some(d) = &downstream {
                registry.unregister(d.pid());
            }
            for task in stderr_tasks {
                task.abort();
            }
            let failure = classify_stderr(&tail);
            return Err(SupervisorError::EarlyExit {
                failure,
                stderr_tail: tail,
                code,
            });
        }

        let stop_signal = StopSignal(stop_rx);
        let parser_task = tokio::spawn(parser(line_source, stop_signal));

        *guard = Some(PipelineHandle {
            started_at: Utc::now(),
            launch_command,
            upstream,
            downstream,
            stop_tx,
            parser_task,
            stderr_tasks,
        });

        info!("{} pipeline started", self.mode);
        Ok(())
    }

    /// Implements the stop protocol from spec.md §4.5: upstream terminated
    /// first so EOF propagates, then downstream; 2s grace before escalating
    /// to kill; posts the terminal status event once torn down.
    pub async fn stop(&self, bus: &EventBus, registry: &ProcessRegistry) -> Result<(), SupervisorError> {
        let mut guard = self.slot.lock().await;
        let Some(mut handle) = guard.take() else {
            return Err(SupervisorError::NotRunning);
        };

        let _ = handle.stop_tx.send(true);

        terminate_stage(&mut handle.upstream).await;
        registry.unregister(handle.upstream.pid());
        if let Some(mut downstream) = handle.downstream.take() {
            terminate_stage(&mut downstream).await;
            registry.unregister(downstream.pid());
        }

        for task in handle.stderr_tasks {
            task.abort();
        }
        let _ = handle.parser_task.await;

        bus.publish_typed("status", serde_json::json!({"text": "stopped"}));
        info!("{} pipeline stopped", self.mode);
        Ok(())
    }
}

fn process_has_exited(stage: &mut Stage) -> bool {
    match stage {
        Stage::Tokio { child, .. } => matches!(child.try_wait(), Ok(Some(_))),
        Stage::Pty { child, .. } => matches!(child.try_wait(), Ok(Some(_))),
    }
}

async fn terminate_stage(stage: &mut Stage) {
    match stage {
        Stage::Tokio { child, pid } => {
            let _ = child.start_kill();
            match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    warn!("pid {pid} did not exit within grace period, escalating to kill");
                    let _ = child.kill().await;
                }
            }
        }
        Stage::Pty { child, pid, .. } => {
            let _ = child.kill();
            let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
            loop {
                if matches!(child.try_wait(), Ok(Some(_))) {
                    break;
                }
                if tokio::time::Instant::now() >= deadline {
                    warn!("pty pid {pid} did not exit within grace period");
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_twice_is_already_running() {
        let supervisor = Supervisor::new("test");
        let bus = EventBus::new();
        let registry = Arc::new(ProcessRegistry::new());
        let cmd = CmdSpec::Single(ProcessSpec::new("sleep", vec!["5".to_string()]));

        let first = supervisor
            .start(cmd.clone(), bus.clone(), registry.clone(), |mut source, mut stop| async move {
                loop {
                    tokio::select! {
                        _ = stop.wait() => break,
                        line = source.next_line() => if line.is_none() { break; },
                    }
                }
            })
            .await;
        assert!(first.is_ok());

        let second = supervisor
            .start(cmd, bus, registry, |_source, _stop| async move {})
            .await;
        assert!(matches!(second, Err(SupervisorError::AlreadyRunning)));
    }

    #[test]
    fn classify_permission_denied() {
        assert!(matches!(classify_stderr("Permission denied opening device"), SupervisorFailure::Permission));
    }

    #[test]
    fn classify_busy() {
        assert!(matches!(classify_stderr("usb_claim_interface error -6"), SupervisorFailure::Busy));
    }

    #[test]
    fn classify_generic_fallback() {
        assert!(matches!(classify_stderr("some unexpected failure"), SupervisorFailure::Generic { .. }));
    }

    #[tokio::test]
    async fn early_exit_captures_and_classifies_real_stderr() {
        let supervisor = Supervisor::new("test");
        let bus = EventBus::new();
        let registry = Arc::new(ProcessRegistry::new());
        let cmd = CmdSpec::Single(ProcessSpec::new(
            "sh",
            vec!["-c".to_string(), "echo 'Permission denied' >&2; exit 1".to_string()],
        ));

        let result = supervisor.start(cmd, bus, registry, |_source, _stop| async move {}).await;
        match result {
            Err(SupervisorError::EarlyExit { failure, stderr_tail, .. }) => {
                assert!(matches!(failure, SupervisorFailure::Permission));
                assert!(stderr_tail.contains("Permission denied"));
            }
            other => panic!("expected EarlyExit, got {other:?}"),
        }
    }
}
