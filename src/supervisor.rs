//! Lifecycle of the external visualizer worker
//!
//! At most one worker exists at a time. State lives behind one mutex; the
//! blocking wait during shutdown runs with the lock released so the owner can
//! keep polling.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::constants::worker::{EXIT_POLL_INTERVAL_MS, STDERR_BUFFER_LIMIT};
use crate::status::{ShutdownMode, Status, StatusSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Starting,
    Running,
    Stopping,
    Crashed(Option<i32>),
}

impl WorkerState {
    pub fn label(&self) -> String {
        match self {
            WorkerState::Idle => "\u{25CF}  Stopped".to_string(),
            WorkerState::Starting => "\u{25CF}  Starting...".to_string(),
            WorkerState::Running => "\u{25CF}  Running".to_string(),
            WorkerState::Stopping => "\u{25CF}  Stopping...".to_string(),
            WorkerState::Crashed(code) => match code {
                Some(code) => format!("\u{25CF}  Crashed (exit {code})"),
                None => "\u{25CF}  Crashed".to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to signal worker {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("failed to wait for worker {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::Spawn { .. } => "process_spawn",
            ProcessError::Signal { .. } => "process_signal",
            ProcessError::Wait { .. } => "process_wait",
        }
    }
}

/// Result of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32 },
    AlreadyRunning { pid: u32 },
    /// A shutdown is still in progress
    Busy,
}

struct WorkerHandle {
    child: Child,
    pid: u32,
}

struct Inner {
    handle: Option<WorkerHandle>,
    state: WorkerState,
}

pub struct ProcessSupervisor {
    inner: Mutex<Inner>,
    /// Thread running a stop requested through [`ProcessSupervisor::stop_in_background`]
    stopper: Mutex<Option<JoinHandle<()>>>,
    stderr: Arc<Mutex<String>>,
    shutdown_timeout: Duration,
    status: StatusSender,
}

impl ProcessSupervisor {
    #[cfg(test)]
    pub fn new(status: StatusSender) -> Self {
        Self::with_timeout(status, Duration::from_secs(crate::constants::worker::SHUTDOWN_TIMEOUT_SECS))
    }

    pub fn with_timeout(status: StatusSender, shutdown_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                handle: None,
                state: WorkerState::Idle,
            }),
            stopper: Mutex::new(None),
            stderr: Arc::new(Mutex::new(String::new())),
            shutdown_timeout,
            status,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> WorkerState {
        self.lock().state
    }

    pub fn pid(&self) -> Option<u32> {
        self.lock().handle.as_ref().map(|h| h.pid)
    }

    pub fn is_running(&self) -> bool {
        self.lock().handle.is_some()
    }

    /// Captured stderr of the current or last worker
    pub fn stderr_tail(&self) -> String {
        self.stderr
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Spawn `<executable> <config_path>` unless a live worker already exists
    pub fn start(&self, executable: &Path, config_path: &Path) -> Result<StartOutcome, ProcessError> {
        let mut inner = self.lock();

        if inner.state == WorkerState::Stopping {
            self.status.send(Status::WorkerBusy);
            return Ok(StartOutcome::Busy);
        }

        if let Some(pid) = self.live_pid(&mut inner) {
            info!(pid, "Worker already running");
            self.status.send(Status::WorkerAlreadyRunning);
            return Ok(StartOutcome::AlreadyRunning { pid });
        }

        inner.state = WorkerState::Starting;
        self.status.send(Status::WorkerLaunching);
        info!(executable = %executable.display(), config = %config_path.display(), "Launching worker");

        let spawned = Command::new(executable)
            .arg(config_path)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                let err = ProcessError::Spawn {
                    path: executable.to_path_buf(),
                    source,
                };
                error!(error = %err, kind = err.as_label(), "Failed to launch worker");
                inner.state = WorkerState::Idle;
                self.status.send(Status::WorkerError(err.to_string()));
                return Err(err);
            }
        };

        let pid = child.id();
        if let Ok(mut buf) = self.stderr.lock() {
            buf.clear();
        }
        if let Some(pipe) = child.stderr.take() {
            self.spawn_stderr_reader(pid, pipe);
        }

        inner.handle = Some(WorkerHandle { child, pid });
        inner.state = WorkerState::Running;
        info!(pid, "Started worker");
        self.status.send(Status::WorkerStarted { pid });
        Ok(StartOutcome::Started { pid })
    }

    /// Pid of the current worker if it is still alive; reaps it otherwise
    fn live_pid(&self, inner: &mut Inner) -> Option<u32> {
        let handle = inner.handle.as_mut()?;
        let pid = handle.pid;
        match handle.child.try_wait() {
            Ok(None) if is_alive(pid) => return Some(pid),
            Ok(None) => warn!(pid, "Worker handle present but pid is gone"),
            Ok(Some(status)) => debug!(pid, exit = ?status.code(), "Reaped exited worker"),
            Err(e) => warn!(pid, error = %e, "Failed to query worker status"),
        }
        inner.handle = None;
        None
    }

    fn spawn_stderr_reader(&self, pid: u32, pipe: ChildStderr) {
        let buffer = Arc::clone(&self.stderr);
        let status = self.status.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("worker-stderr-{pid}"))
            .spawn(move || {
                for line in BufReader::new(pipe).lines() {
                    let Ok(line) = line else { break };
                    let line = line.trim_end().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    warn!(pid, line = %line, "Worker stderr");
                    if let Ok(mut buf) = buffer.lock() {
                        push_bounded(&mut buf, &line, STDERR_BUFFER_LIMIT);
                    }
                    status.send(Status::WorkerStderr(line));
                }
                debug!(pid, "Worker stderr closed");
            });
        if let Err(e) = spawned {
            error!(pid, error = %e, "Failed to spawn stderr reader");
        }
    }

    /// Check the worker for an unexpected exit
    pub fn poll(&self) -> WorkerState {
        let mut inner = self.lock();
        let Some(handle) = inner.handle.as_mut() else {
            return inner.state;
        };
        let pid = handle.pid;

        match handle.child.try_wait() {
            Ok(Some(status)) => {
                inner.handle = None;
                if status.success() {
                    info!(pid, "Worker exited");
                    inner.state = WorkerState::Idle;
                    self.status.send(Status::WorkerExited { code: status.code() });
                } else {
                    warn!(pid, exit = ?status.code(), "Worker crashed");
                    inner.state = WorkerState::Crashed(status.code());
                    self.status.send(Status::WorkerCrashed { code: status.code() });
                }
            }
            Ok(None) => {
                if inner.state == WorkerState::Starting {
                    inner.state = WorkerState::Running;
                }
            }
            Err(e) => error!(pid, error = %e, "Failed to query worker status"),
        }
        inner.state
    }

    /// Terminate the worker, escalating to a kill after the shutdown timeout.
    ///
    /// A stop already running in the background is waited for first, so the
    /// worker is gone when this returns. Returns `None` when there was no
    /// worker left to stop.
    pub fn stop(&self) -> Result<Option<ShutdownMode>, ProcessError> {
        let pending = self
            .stopper
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(thread) = pending {
            debug!("Waiting for background stop");
            if thread.join().is_err() {
                error!("Background stop thread panicked");
            }
        }
        self.stop_now()
    }

    fn stop_now(&self) -> Result<Option<ShutdownMode>, ProcessError> {
        let mut handle = {
            let mut inner = self.lock();
            let Some(handle) = inner.handle.take() else {
                return Ok(None);
            };
            inner.state = WorkerState::Stopping;
            handle
        };

        let pid = handle.pid;
        info!(pid, timeout_ms = self.shutdown_timeout.as_millis() as u64, "Stopping worker");
        self.status.send(Status::WorkerStopping);

        let result = self.terminate(&mut handle);
        if let Err(err) = &result {
            error!(pid, error = %err, kind = err.as_label(), "Failed to stop worker, killing");
            force_reap(&mut handle);
        }

        self.lock().state = WorkerState::Idle;
        match result {
            Ok(mode) => {
                info!(pid, mode = ?mode, "Worker stopped");
                self.status.send(Status::WorkerStopped(mode));
                Ok(Some(mode))
            }
            Err(err) => {
                self.status.send(Status::WorkerStopFailed(err.to_string()));
                Err(err)
            }
        }
    }

    fn terminate(&self, handle: &mut WorkerHandle) -> Result<ShutdownMode, ProcessError> {
        let pid = handle.pid;
        request_termination(handle)?;

        let deadline = Instant::now() + self.shutdown_timeout;
        let poll = Duration::from_millis(EXIT_POLL_INTERVAL_MS);
        loop {
            match handle.child.try_wait() {
                Ok(Some(_)) => return Ok(ShutdownMode::Graceful),
                Ok(None) if Instant::now() >= deadline => break,
                Ok(None) => std::thread::sleep(poll),
                Err(source) => return Err(ProcessError::Wait { pid, source }),
            }
        }

        warn!(pid, "Worker ignored termination request, killing");
        if let Err(e) = handle.child.kill() {
            // Exited between the last poll and the kill
            debug!(pid, error = %e, "Kill failed");
        }
        handle
            .child
            .wait()
            .map_err(|source| ProcessError::Wait { pid, source })?;
        Ok(ShutdownMode::Forced)
    }

    /// Stop the worker on a separate thread; [`Self::stop`] waits for it.
    ///
    /// Returns false if the thread could not be spawned.
    pub fn stop_in_background(self: &Arc<Self>) -> bool {
        let mut pending = self.stopper.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if pending.as_ref().is_some_and(|thread| !thread.is_finished()) {
            debug!("Stop already in progress");
            return true;
        }

        let supervisor = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("worker-stop".to_string())
            .spawn(move || {
                let _ = supervisor.stop_now();
            });
        match spawned {
            Ok(thread) => {
                *pending = Some(thread);
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to spawn stop thread");
                false
            }
        }
    }
}

/// Kill and reap a worker whose orderly stop failed
fn force_reap(handle: &mut WorkerHandle) {
    let pid = handle.pid;
    if let Err(e) = handle.child.kill() {
        debug!(pid, error = %e, "Kill failed");
    }
    match handle.child.wait() {
        Ok(status) => debug!(pid, exit = ?status.code(), "Reaped worker"),
        Err(e) => error!(pid, error = %e, "Failed to reap worker"),
    }
}

#[cfg(unix)]
fn request_termination(handle: &mut WorkerHandle) -> Result<(), ProcessError> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match kill(Pid::from_raw(handle.pid as i32), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(ProcessError::Signal {
            pid: handle.pid,
            reason: e.desc().to_string(),
        }),
    }
}

#[cfg(not(unix))]
fn request_termination(handle: &mut WorkerHandle) -> Result<(), ProcessError> {
    handle.child.kill().map_err(|e| ProcessError::Signal {
        pid: handle.pid,
        reason: e.to_string(),
    })
}

#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn is_alive(_pid: u32) -> bool {
    true
}

/// Append a line, dropping the oldest text once `limit` bytes are exceeded
fn push_bounded(buf: &mut String, line: &str, limit: usize) {
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(line);
    if buf.len() > limit {
        let mut cut = buf.len() - limit;
        while !buf.is_char_boundary(cut) {
            cut += 1;
        }
        buf.drain(..cut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_bounded() {
        let mut buf = String::new();
        push_bounded(&mut buf, "abc", 8);
        push_bounded(&mut buf, "defgh", 8);
        assert_eq!(buf, "bc\ndefgh");
        assert!(buf.len() <= 8);
    }

    #[test]
    fn test_spawn_failure_returns_to_idle() {
        let (tx, rx) = crate::status::channel();
        let supervisor = ProcessSupervisor::new(tx);
        let err = supervisor
            .start(Path::new("/nonexistent/wiz_visualizer"), Path::new("config.json"))
            .unwrap_err();
        assert_eq!(err.as_label(), "process_spawn");
        assert_eq!(supervisor.state(), WorkerState::Idle);
        assert!(!supervisor.is_running());

        let statuses: Vec<Status> = rx.try_iter().collect();
        assert_eq!(statuses[0], Status::WorkerLaunching);
        assert!(matches!(statuses[1], Status::WorkerError(_)));
    }

    #[test]
    fn test_stop_without_worker_is_noop() {
        let (tx, rx) = crate::status::channel();
        let supervisor = ProcessSupervisor::new(tx);
        assert_eq!(supervisor.stop().unwrap(), None);
        assert!(rx.try_iter().next().is_none());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::fs;
        use tempfile::TempDir;

        const SHELL: &str = "/bin/sh";

        /// Fake worker run as `sh <script>`; the script stands in for the config path
        fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            path
        }

        fn wait_for(mut cond: impl FnMut() -> bool) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !cond() {
                assert!(Instant::now() < deadline, "condition not reached in time");
                std::thread::sleep(Duration::from_millis(20));
            }
        }

        #[test]
        fn test_start_twice_keeps_one_worker() {
            let dir = TempDir::new().unwrap();
            let worker = script(&dir, "worker.sh", "exec sleep 30\n");
            let (tx, _rx) = crate::status::channel();
            let supervisor = ProcessSupervisor::with_timeout(tx, Duration::from_secs(2));

            let StartOutcome::Started { pid } = supervisor.start(Path::new(SHELL), &worker).unwrap() else {
                panic!("first start did not spawn");
            };
            assert_eq!(
                supervisor.start(Path::new(SHELL), &worker).unwrap(),
                StartOutcome::AlreadyRunning { pid }
            );
            assert_eq!(supervisor.pid(), Some(pid));

            assert_eq!(supervisor.stop().unwrap(), Some(ShutdownMode::Graceful));
            assert!(!is_alive(pid));
            assert_eq!(supervisor.state(), WorkerState::Idle);
        }

        #[test]
        fn test_worker_ignoring_sigterm_is_killed() {
            let dir = TempDir::new().unwrap();
            let worker = script(&dir, "stubborn.sh", "trap '' TERM\ntouch \"$0.ready\"\nexec sleep 30\n");
            let ready = dir.path().join("stubborn.sh.ready");
            let (tx, rx) = crate::status::channel();
            let supervisor = ProcessSupervisor::with_timeout(tx, Duration::from_millis(300));

            let StartOutcome::Started { pid } = supervisor.start(Path::new(SHELL), &worker).unwrap() else {
                panic!("start did not spawn");
            };
            wait_for(|| ready.exists());

            assert_eq!(supervisor.stop().unwrap(), Some(ShutdownMode::Forced));
            assert!(!is_alive(pid));
            assert!(!supervisor.is_running());

            let statuses: Vec<Status> = rx.try_iter().collect();
            assert_eq!(statuses.last(), Some(&Status::WorkerStopped(ShutdownMode::Forced)));
        }

        #[test]
        fn test_crash_is_detected_with_stderr() {
            let dir = TempDir::new().unwrap();
            let worker = script(&dir, "crash.sh", "echo 'no audio device' >&2\nexit 3\n");
            let (tx, rx) = crate::status::channel();
            let supervisor = ProcessSupervisor::new(tx);

            supervisor.start(Path::new(SHELL), &worker).unwrap();
            wait_for(|| supervisor.poll() == WorkerState::Crashed(Some(3)));
            wait_for(|| supervisor.stderr_tail().contains("no audio device"));

            assert!(!supervisor.is_running());
            let statuses: Vec<Status> = rx.try_iter().collect();
            assert!(statuses.contains(&Status::WorkerCrashed { code: Some(3) }));
        }

        #[test]
        fn test_restart_after_exit() {
            let dir = TempDir::new().unwrap();
            let quick = script(&dir, "quick.sh", "exit 0\n");
            let (tx, _rx) = crate::status::channel();
            let supervisor = ProcessSupervisor::new(tx);

            supervisor.start(Path::new(SHELL), &quick).unwrap();
            wait_for(|| supervisor.poll() == WorkerState::Idle);
            assert!(matches!(
                supervisor.start(Path::new(SHELL), &quick).unwrap(),
                StartOutcome::Started { .. }
            ));
            let _ = supervisor.stop();
        }

        #[test]
        fn test_background_stop() {
            let dir = TempDir::new().unwrap();
            let worker = script(&dir, "worker.sh", "exec sleep 30\n");
            let (tx, _rx) = crate::status::channel();
            let supervisor = Arc::new(ProcessSupervisor::with_timeout(tx, Duration::from_secs(2)));

            let StartOutcome::Started { pid } = supervisor.start(Path::new(SHELL), &worker).unwrap() else {
                panic!("start did not spawn");
            };
            assert!(supervisor.stop_in_background());
            wait_for(|| supervisor.state() == WorkerState::Idle);
            assert!(!is_alive(pid));
        }

        #[test]
        fn test_stop_waits_for_background_stop() {
            let dir = TempDir::new().unwrap();
            let worker = script(&dir, "stubborn.sh", "trap '' TERM\ntouch \"$0.ready\"\nexec sleep 30\n");
            let ready = dir.path().join("stubborn.sh.ready");
            let (tx, rx) = crate::status::channel();
            let supervisor = Arc::new(ProcessSupervisor::with_timeout(tx, Duration::from_millis(300)));

            let StartOutcome::Started { pid } = supervisor.start(Path::new(SHELL), &worker).unwrap() else {
                panic!("start did not spawn");
            };
            wait_for(|| ready.exists());

            assert!(supervisor.stop_in_background());
            // Whichever call ends up owning the worker, it is dead once stop returns
            let _ = supervisor.stop().unwrap();
            assert!(!is_alive(pid));
            assert_eq!(supervisor.state(), WorkerState::Idle);

            let statuses: Vec<Status> = rx.try_iter().collect();
            assert!(statuses.contains(&Status::WorkerStopped(ShutdownMode::Forced)));
        }

        #[test]
        fn test_force_reap_kills_worker() {
            let child = Command::new("sleep").arg("30").spawn().unwrap();
            let pid = child.id();
            let mut handle = WorkerHandle { child, pid };
            assert!(is_alive(pid));

            force_reap(&mut handle);
            assert!(!is_alive(pid));
        }
    }
}
