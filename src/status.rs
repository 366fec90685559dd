//! Single status channel shared by the session, discovery and supervisor
//!
//! Every meaningful state change is sent as a [`Status`]; its `Display` text is
//! what the status line shows.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info};

use crate::constants::IDLE_STATUS;

/// How a worker shutdown completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// The worker honoured the termination request before the deadline
    Graceful,
    /// The deadline passed and the worker was killed
    Forced,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Idle,
    Saving,
    Saved,
    SaveFailed(String),
    ValidationFailed(String),
    ResetToDefault,
    ResetFailed(String),
    DiscoveryStarted,
    DiscoveryBusy,
    DiscoveryFinished { found: usize, added: usize },
    DiscoveryFailed(String),
    WorkerLaunching,
    WorkerStarted { pid: u32 },
    WorkerAlreadyRunning,
    WorkerBusy,
    WorkerStopping,
    WorkerStopped(ShutdownMode),
    WorkerExited { code: Option<i32> },
    WorkerCrashed { code: Option<i32> },
    WorkerError(String),
    WorkerStopFailed(String),
    WorkerStderr(String),
}

impl Status {
    /// True for statuses describing a failure
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Status::SaveFailed(_)
                | Status::ValidationFailed(_)
                | Status::ResetFailed(_)
                | Status::DiscoveryFailed(_)
                | Status::WorkerCrashed { .. }
                | Status::WorkerError(_)
                | Status::WorkerStopFailed(_)
                | Status::WorkerStderr(_)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => f.write_str(IDLE_STATUS),
            Status::Saving => f.write_str("Saving..."),
            Status::Saved => f.write_str("Configuration saved."),
            Status::SaveFailed(err) => write!(f, "Failed to save configuration: {err}"),
            Status::ValidationFailed(err) => write!(f, "Invalid input: {err}"),
            Status::ResetToDefault => f.write_str("Configuration reset to default."),
            Status::ResetFailed(err) => write!(f, "Failed to reset configuration: {err}"),
            Status::DiscoveryStarted => f.write_str("Searching for connected devices..."),
            Status::DiscoveryBusy => f.write_str("A device search is already running."),
            Status::DiscoveryFinished { found, added } => {
                write!(f, "Found {found} device(s), {added} new.")
            }
            Status::DiscoveryFailed(err) => write!(f, "Device search failed: {err}"),
            Status::WorkerLaunching => f.write_str("Launching Visualizer..."),
            Status::WorkerStarted { pid } => write!(f, "Visualizer running (PID: {pid})"),
            Status::WorkerAlreadyRunning => f.write_str("Visualizer is already running."),
            Status::WorkerBusy => f.write_str("Visualizer is shutting down, try again shortly."),
            Status::WorkerStopping => f.write_str("Stopping Visualizer..."),
            Status::WorkerStopped(ShutdownMode::Graceful) => {
                f.write_str("Visualizer stopped successfully.")
            }
            Status::WorkerStopped(ShutdownMode::Forced) => f.write_str("Visualizer stopped forcefully."),
            Status::WorkerExited { code } => match code {
                Some(code) => write!(f, "Visualizer exited (code {code})"),
                None => f.write_str("Visualizer exited"),
            },
            Status::WorkerCrashed { code } => match code {
                Some(code) => write!(f, "Visualizer crashed (exit {code})"),
                None => f.write_str("Visualizer crashed"),
            },
            Status::WorkerError(err) => write!(f, "Error starting visualizer: {err}"),
            Status::WorkerStopFailed(err) => write!(f, "Error stopping visualizer: {err}"),
            Status::WorkerStderr(text) => write!(f, "Visualizer error: {text}"),
        }
    }
}

/// Cloneable sending half of the status channel
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: Sender<Status>,
}

impl StatusSender {
    pub fn send(&self, status: Status) {
        info!(status = %status, "Status");
        if self.tx.send(status).is_err() {
            debug!("Status receiver dropped");
        }
    }
}

pub fn channel() -> (StatusSender, Receiver<Status>) {
    let (tx, rx) = mpsc::channel();
    (StatusSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(Status::Idle.to_string(), IDLE_STATUS);
        assert_eq!(
            Status::WorkerStopped(ShutdownMode::Forced).to_string(),
            "Visualizer stopped forcefully."
        );
        assert_eq!(
            Status::DiscoveryFinished { found: 2, added: 1 }.to_string(),
            "Found 2 device(s), 1 new."
        );
        let stop_failed = Status::WorkerStopFailed("failed to wait for worker 42".to_string());
        assert!(stop_failed.is_error());
        assert_eq!(
            stop_failed.to_string(),
            "Error stopping visualizer: failed to wait for worker 42"
        );
    }

    #[test]
    fn test_send_after_receiver_dropped_is_harmless() {
        let (tx, rx) = channel();
        drop(rx);
        tx.send(Status::Saving);
    }
}
