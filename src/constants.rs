//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Configuration file locations
pub mod config {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "wiz-visualizer";

    /// Live configuration file read by the worker
    pub const FILENAME: &str = "volume_config.json";

    /// Read-only template used for first run and reset
    pub const DEFAULT_FILENAME: &str = "default_volume_config.json";

    /// Suffix of the scratch file written before the atomic rename
    pub const TEMP_SUFFIX: &str = "tmp";

    /// JSON indentation used when persisting
    pub const INDENT: &[u8] = b"    ";
}

/// Worker process constants
pub mod worker {
    /// Executable name looked up next to the manager binary
    #[cfg(windows)]
    pub const EXECUTABLE: &str = "wiz_visualizer.exe";
    #[cfg(not(windows))]
    pub const EXECUTABLE: &str = "wiz_visualizer";

    /// Grace period between the termination request and the forced kill
    pub const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

    /// Interval between exit checks while waiting for shutdown
    pub const EXIT_POLL_INTERVAL_MS: u64 = 50;

    /// Liveness poll interval of the headless `run` command
    pub const SUPERVISE_POLL_INTERVAL_MS: u64 = 200;

    /// Maximum number of bytes of stderr kept in memory
    pub const STDERR_BUFFER_LIMIT: usize = 16 * 1024;
}

/// WiZ discovery protocol constants
pub mod discovery {
    /// UDP port WiZ lights listen on
    pub const PORT: u16 = 38899;

    /// Limited broadcast address for the registration probe
    pub const BROADCAST_ADDR: &str = "255.255.255.255";

    /// How long a scan listens for replies
    pub const TIMEOUT_SECS: u64 = 5;

    /// Probe is re-sent at this interval until the scan ends
    pub const RESEND_INTERVAL_MS: u64 = 1000;

    /// Registration probe; lights answer with their MAC address
    pub const REGISTRATION_PROBE: &str = r#"{"method":"registration","params":{"phoneMac":"AAAAAAAAAAAA","register":false,"phoneIp":"1.2.3.4","id":"1"}}"#;

    /// Receive buffer size for replies
    pub const RECV_BUFFER_SIZE: usize = 1024;
}

/// Validation limits
pub mod validation {
    /// Smallest usable UDP port
    pub const MIN_PORT: i64 = 1;

    /// Largest usable UDP port
    pub const MAX_PORT: i64 = 65535;

    /// Largest value of a single color channel
    pub const MAX_CHANNEL: i64 = 255;
}

/// Audio device enumeration
pub mod audio {
    /// Value stored in `audio.device_index` when the worker should pick the default
    pub const DEFAULT_DEVICE_INDEX: i64 = -1;
}

/// Title shown in the status line while nothing is happening
pub const IDLE_STATUS: &str = "WiZ Volume Visualizer Control";
