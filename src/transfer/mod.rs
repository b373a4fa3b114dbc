//! Transfer drivers
//!
//! The transfer mechanism is abstracted behind the small [`DataTransfer`]
//! capability trait so the calibrator can be exercised without any real
//! network. Two implementations exist: sftp (in-process via ssh2) and
//! rsync (the system binary).

pub mod rsync;
pub mod sftp;

pub use rsync::RsyncTransfer;
pub use sftp::SftpTransfer;

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use clap::ValueEnum;
use tracing::debug;
use uuid::Uuid;

use crate::calibrate::{Trial, TrialDriver};
use crate::config::HostConfig;
use crate::error::Result;
use crate::payload::LocalPayload;

/// The transfer mechanism used to move the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// The system rsync binary over ssh
    Rsync,
    /// In-process sftp
    Sftp,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Rsync => write!(f, "rsync"),
            Mode::Sftp => write!(f, "sftp"),
        }
    }
}

/// Transfer direction, measured independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// local → remote
    Upload,
    /// remote → local
    Download,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upload => write!(f, "Upload"),
            Direction::Download => write!(f, "Download"),
        }
    }
}

/// A remote temp path unique to this run.
///
/// Components stay within `[A-Za-z0-9_.-]` because old rsync versions
/// mangle anything fancier on the command line.
pub fn remote_temp_path() -> String {
    let stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
    let id = Uuid::new_v4().simple().to_string();
    format!("/tmp/speedtest-ssh_{}_{}.tmp", stamp, &id[..8])
}

/// Capability interface over a transfer mechanism.
///
/// One instance owns one remote temp path for its whole lifetime.
/// Implementations remove that file on drop, best-effort, so an
/// interrupted run does not leave remote litter behind.
pub trait DataTransfer {
    /// Send the local file to the remote temp path
    fn put(&mut self, local: &Path) -> Result<()>;

    /// Fetch the remote temp path into the local file
    fn get(&mut self, local: &Path) -> Result<()>;

    /// Remove the remote temp file; a missing file is not an error
    fn clean_remote(&mut self) -> Result<()>;

    /// The remote temp path this client transfers to and from
    fn remote_path(&self) -> &str;
}

/// Connect the selected transfer mechanism to the resolved host
pub fn connect(
    mode: Mode,
    config: &HostConfig,
    show_progress: bool,
) -> Result<Box<dyn DataTransfer>> {
    let remote_path = remote_temp_path();
    debug!(%remote_path, %mode, "chosen remote temp path");
    match mode {
        Mode::Sftp => Ok(Box::new(SftpTransfer::connect(
            config,
            remote_path,
            show_progress,
        )?)),
        Mode::Rsync => Ok(Box::new(RsyncTransfer::connect(
            config,
            remote_path,
            show_progress,
        )?)),
    }
}

/// The real trial driver: one timed transfer per call.
///
/// The wall clock strictly bounds the transfer itself; payload
/// generation, remote seeding for download trials and cleanup all run
/// outside the timed section. At most one trial's files exist at any
/// time: the remote side is wiped before and after every trial.
pub struct TransferDriver<'a> {
    client: &'a mut dyn DataTransfer,
    payload: &'a LocalPayload,
}

impl<'a> TransferDriver<'a> {
    pub fn new(client: &'a mut dyn DataTransfer, payload: &'a LocalPayload) -> Self {
        Self { client, payload }
    }
}

impl TrialDriver for TransferDriver<'_> {
    fn run_trial(&mut self, direction: Direction, size: u64) -> Result<Trial> {
        self.payload.ensure_size(size)?;
        self.client.clean_remote()?;

        let elapsed = match direction {
            Direction::Upload => {
                let start = Instant::now();
                self.client.put(self.payload.path())?;
                start.elapsed()
            }
            Direction::Download => {
                // Seed the remote file untimed, then time only the fetch
                self.client.put(self.payload.path())?;
                self.payload.remove()?;
                let start = Instant::now();
                self.client.get(self.payload.path())?;
                start.elapsed()
            }
        };

        self.client.clean_remote()?;
        let trial = Trial::new(size, elapsed);
        debug!(
            %direction,
            size,
            elapsed_secs = elapsed.as_secs_f64(),
            throughput = trial.throughput(),
            "trial finished"
        );
        Ok(trial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_remote_temp_paths_are_unique() {
        let a = remote_temp_path();
        let b = remote_temp_path();
        assert_ne!(a, b);
    }

    #[test]
    fn test_remote_temp_path_charset() {
        let path = remote_temp_path();
        assert!(path.starts_with("/tmp/speedtest-ssh_"));
        assert!(path.ends_with(".tmp"));
        assert!(path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_./-".contains(c)));
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Rsync.to_string(), "rsync");
        assert_eq!(Mode::Sftp.to_string(), "sftp");
    }

    /// A transfer client backed by a local "remote" directory
    struct FakeTransfer {
        remote: PathBuf,
        fail_put: bool,
        puts: usize,
        gets: usize,
    }

    impl FakeTransfer {
        fn new(remote_dir: &Path) -> Self {
            Self {
                remote: remote_dir.join("payload.remote"),
                fail_put: false,
                puts: 0,
                gets: 0,
            }
        }
    }

    impl DataTransfer for FakeTransfer {
        fn put(&mut self, local: &Path) -> Result<()> {
            self.puts += 1;
            if self.fail_put {
                return Err(crate::error::AppError::connection("fake auth failure"));
            }
            std::fs::copy(local, &self.remote)?;
            Ok(())
        }

        fn get(&mut self, local: &Path) -> Result<()> {
            self.gets += 1;
            std::fs::copy(&self.remote, local)?;
            Ok(())
        }

        fn clean_remote(&mut self) -> Result<()> {
            match std::fs::remove_file(&self.remote) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        }

        fn remote_path(&self) -> &str {
            self.remote.to_str().unwrap()
        }
    }

    #[test]
    fn test_upload_trial_leaves_no_remote_file() {
        let remote_dir = tempfile::tempdir().unwrap();
        let payload = LocalPayload::new().unwrap();
        let mut client = FakeTransfer::new(remote_dir.path());

        let trial = TransferDriver::new(&mut client, &payload)
            .run_trial(Direction::Upload, 4096)
            .unwrap();

        assert_eq!(trial.size, 4096);
        assert_eq!(client.puts, 1);
        assert!(!client.remote.exists(), "remote temp file must be cleaned");
    }

    #[test]
    fn test_download_trial_seeds_then_fetches() {
        let remote_dir = tempfile::tempdir().unwrap();
        let payload = LocalPayload::new().unwrap();
        let mut client = FakeTransfer::new(remote_dir.path());

        let trial = TransferDriver::new(&mut client, &payload)
            .run_trial(Direction::Download, 8192)
            .unwrap();

        assert_eq!(trial.size, 8192);
        assert_eq!(client.puts, 1, "one untimed seed upload");
        assert_eq!(client.gets, 1);
        assert!(!client.remote.exists());
        // The fetched copy is back in place with the right size
        assert_eq!(std::fs::metadata(payload.path()).unwrap().len(), 8192);
    }

    #[test]
    fn test_failed_trial_does_not_leave_remote_file() {
        let remote_dir = tempfile::tempdir().unwrap();
        let payload = LocalPayload::new().unwrap();
        let mut client = FakeTransfer::new(remote_dir.path());
        client.fail_put = true;

        let result = TransferDriver::new(&mut client, &payload).run_trial(Direction::Upload, 4096);
        assert!(result.is_err());
        assert!(!client.remote.exists());
    }
}
