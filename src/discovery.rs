//! WiZ light discovery over UDP broadcast
//!
//! A scan broadcasts the registration probe, re-sends it periodically and
//! collects every reply carrying `result.mac` until the timeout. Scans run on
//! their own thread with a current-thread tokio runtime; the outcome is handed
//! back over a channel and merged by the owner.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::constants::discovery::{
    BROADCAST_ADDR, PORT, RECV_BUFFER_SIZE, REGISTRATION_PROBE, RESEND_INTERVAL_MS, TIMEOUT_SECS,
};
use crate::status::{Status, StatusSender};

/// A light that answered the probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: IpAddr,
    pub mac: Option<String>,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to open discovery socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("failed to send discovery probe: {0}")]
    Send(#[source] std::io::Error),

    #[error("failed to start discovery runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl DiscoveryError {
    pub fn as_label(&self) -> &'static str {
        match self {
            DiscoveryError::Socket(_) => "discovery_socket",
            DiscoveryError::Send(_) => "discovery_send",
            DiscoveryError::Runtime(_) => "discovery_runtime",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Where the probe is sent
    pub target: SocketAddr,
    /// Total listening time
    pub timeout: Duration,
    /// Probe re-send interval
    pub resend_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let broadcast: IpAddr = BROADCAST_ADDR
            .parse()
            .unwrap_or(IpAddr::from([255, 255, 255, 255]));
        Self {
            target: SocketAddr::new(broadcast, PORT),
            timeout: Duration::from_secs(TIMEOUT_SECS),
            resend_interval: Duration::from_millis(RESEND_INTERVAL_MS),
        }
    }
}

impl DiscoveryConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Run one scan to completion
pub async fn scan(config: &DiscoveryConfig) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
    let bind: SocketAddr = if config.target.is_ipv6() {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    } else {
        (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind).await.map_err(DiscoveryError::Socket)?;
    socket.set_broadcast(true).map_err(DiscoveryError::Socket)?;

    debug!(addr = %config.target, timeout_ms = config.timeout.as_millis() as u64, "Starting discovery scan");

    let deadline = Instant::now() + config.timeout;
    let mut resend = tokio::time::interval(config.resend_interval);
    resend.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut devices: Vec<DiscoveredDevice> = Vec::new();
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            _ = resend.tick() => {
                socket
                    .send_to(REGISTRATION_PROBE.as_bytes(), config.target)
                    .await
                    .map_err(DiscoveryError::Send)?;
            }
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) => record_reply(&mut devices, from, &buf[..len]),
                // A bad datagram or an ICMP error does not end the scan
                Err(e) => warn!(error = %e, "Failed to receive discovery reply"),
            }
        }
    }

    info!(count = devices.len(), "Discovery scan finished");
    Ok(devices)
}

/// Add the sender of a registration reply unless it is already known
fn record_reply(devices: &mut Vec<DiscoveredDevice>, from: SocketAddr, datagram: &[u8]) {
    let Some(mac) = parse_reply(datagram) else {
        debug!(from = %from, "Ignoring non-device reply");
        return;
    };
    let address = from.ip();
    if devices.iter().any(|d| d.address == address) {
        return;
    }
    debug!(address = %address, mac = %mac, "Discovered light");
    devices.push(DiscoveredDevice { address, mac: Some(mac) });
}

/// MAC address from a registration reply, if the datagram is one
fn parse_reply(datagram: &[u8]) -> Option<String> {
    let reply: Value = serde_json::from_slice(datagram).ok()?;
    reply
        .get("result")?
        .get("mac")?
        .as_str()
        .map(str::to_string)
}

/// Outcome delivered to the owner when a background scan ends
pub type ScanOutcome = Result<Vec<DiscoveredDevice>, DiscoveryError>;

/// Runs at most one background scan at a time
pub struct DeviceDiscovery {
    config: DiscoveryConfig,
    in_flight: Arc<AtomicBool>,
    results: Option<Receiver<ScanOutcome>>,
    status: StatusSender,
}

impl DeviceDiscovery {
    pub fn new(config: DiscoveryConfig, status: StatusSender) -> Self {
        Self {
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
            results: None,
            status,
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Start a background scan. Returns false when one is already running.
    pub fn start(&mut self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.status.send(Status::DiscoveryBusy);
            return false;
        }

        let (tx, rx) = mpsc::channel();
        self.results = Some(rx);
        self.status.send(Status::DiscoveryStarted);

        let config = self.config.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let spawned = std::thread::Builder::new()
            .name("discovery".to_string())
            .spawn(move || {
                let outcome = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(DiscoveryError::Runtime)
                    .and_then(|runtime| runtime.block_on(scan(&config)));
                in_flight.store(false, Ordering::Release);
                if tx.send(outcome).is_err() {
                    debug!("Discovery owner dropped before scan finished");
                }
            });

        if let Err(e) = spawned {
            error!(error = %e, "Failed to spawn discovery thread");
            self.in_flight.store(false, Ordering::Release);
            self.results = None;
            self.status
                .send(Status::DiscoveryFailed(DiscoveryError::Runtime(e).to_string()));
            return false;
        }
        true
    }

    /// Take a finished scan's outcome without blocking
    pub fn try_take(&mut self) -> Option<ScanOutcome> {
        let rx = self.results.as_ref()?;
        match rx.try_recv() {
            Ok(outcome) => {
                self.results = None;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("Discovery thread ended without a result");
                self.results = None;
                None
            }
        }
    }

    /// Block until the running scan (if any) finishes
    #[cfg(test)]
    pub fn wait(&mut self) -> Option<ScanOutcome> {
        let rx = self.results.take()?;
        rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket as StdUdpSocket;

    fn responder(replies: &'static [&'static str]) -> SocketAddr {
        let socket = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();
        std::thread::spawn(move || {
            let mut buf = [0u8; RECV_BUFFER_SIZE];
            // Answer every probe so re-sends are covered too
            while let Ok((_, from)) = socket.recv_from(&mut buf) {
                for reply in replies {
                    let _ = socket.send_to(reply.as_bytes(), from);
                }
            }
        });
        addr
    }

    fn config(target: SocketAddr) -> DiscoveryConfig {
        DiscoveryConfig {
            target,
            timeout: Duration::from_millis(400),
            resend_interval: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_parse_reply() {
        assert_eq!(
            parse_reply(br#"{"method":"registration","result":{"mac":"a8bb50aabbcc","success":true}}"#),
            Some("a8bb50aabbcc".to_string())
        );
        assert_eq!(parse_reply(br#"{"method":"registration","result":{}}"#), None);
        assert_eq!(parse_reply(b"not json"), None);
    }

    #[test]
    fn test_record_reply_skips_duplicates_and_noise() {
        let mut devices = Vec::new();
        let light: SocketAddr = "192.168.1.10:38899".parse().unwrap();
        record_reply(&mut devices, light, br#"{"result":{"mac":"a8bb50000001"}}"#);
        record_reply(&mut devices, light, br#"{"result":{"mac":"a8bb50000001"}}"#);
        record_reply(&mut devices, "192.168.1.11:38899".parse().unwrap(), b"garbage");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].address, light.ip());
    }

    #[tokio::test]
    async fn test_scan_survives_receive_errors() {
        // A closed port answers the first probe with ICMP unreachable, which
        // some platforms report as a receive error
        let closed = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let target = closed.local_addr().unwrap();
        drop(closed);
        assert!(scan(&config(target)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_deduplicates_replies() {
        let target = responder(&[
            r#"{"result":{"mac":"a8bb50000001"}}"#,
            r#"{"error":"nope"}"#,
        ]);
        let devices = scan(&config(target)).await.unwrap();
        assert_eq!(
            devices,
            vec![DiscoveredDevice {
                address: IpAddr::from([127, 0, 0, 1]),
                mac: Some("a8bb50000001".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_scan_without_replies_is_empty() {
        let silent = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let devices = scan(&config(silent.local_addr().unwrap())).await.unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn test_single_scan_in_flight() {
        let (tx, rx) = crate::status::channel();
        let target = responder(&[r#"{"result":{"mac":"a8bb50000001"}}"#]);
        let mut discovery = DeviceDiscovery::new(config(target), tx);

        assert!(discovery.start());
        assert!(!discovery.start());
        let outcome = discovery.wait().unwrap().unwrap();
        assert_eq!(outcome.len(), 1);
        assert!(!discovery.is_running());

        let statuses: Vec<Status> = rx.try_iter().collect();
        assert_eq!(statuses, vec![Status::DiscoveryStarted, Status::DiscoveryBusy]);
    }
}
