//! speedtest-ssh
//!
//! An ad-hoc throughput tester for hosts reachable over ssh. Uploads and
//! downloads a disposable payload through rsync or sftp, adapting the
//! payload size so each direction takes roughly the requested duration,
//! and reports the measured throughput.

pub mod calibrate;
pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod payload;
pub mod progress;
pub mod transfer;

// Re-export commonly used types
pub use calibrate::{calibrate, Trial, TrialDriver};
pub use config::HostConfig;
pub use error::{AppError, Result};
pub use transfer::{DataTransfer, Direction, Mode};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration values
pub mod defaults {
    /// Default target duration per direction, in seconds
    pub const DEFAULT_NUM_SECONDS: u64 = 20;

    /// Default ssh port when neither the CLI nor ssh config supplies one
    pub const DEFAULT_SSH_PORT: u16 = 22;

    /// First payload size tried by the calibrator (2 MiB). Large enough
    /// that the first trial is not pure connection overhead.
    pub const INITIAL_PAYLOAD_SIZE: u64 = 2 * 1024 * 1024;

    /// Practical payload floor (1 MiB). Sizes below this measure mostly
    /// per-transfer overhead, not throughput.
    pub const MIN_PAYLOAD_SIZE: u64 = 1024 * 1024;

    /// Payload ceiling (64 GiB), so a mock-fast link cannot ask for an
    /// unbounded amount of disk.
    pub const MAX_PAYLOAD_SIZE: u64 = 64 * 1024 * 1024 * 1024;

    /// Maximum calibration trials per direction
    pub const MAX_TRIALS: u32 = 8;

    /// Acceptance band: a trial is accepted when its elapsed time is
    /// within this factor of the target on either side.
    pub const ACCEPT_RATIO: f64 = 2.0;

    /// Block size used when generating payload content and when copying
    /// over sftp (1 MiB).
    pub const COPY_BLOCK_SIZE: usize = 1024 * 1024;
}
