//! rsync transfer driver
//!
//! Shells out to the system rsync binary over ssh. Remote temp-file
//! cleanup still goes through an sftp session so both transfer modes
//! share one cleanup path.

use std::path::Path;
use std::process::{Command, Stdio};

use ssh2::{Session, Sftp};
use tracing::debug;

use crate::config::HostConfig;
use crate::error::{AppError, Result};

/// Versions at or below this mangle fancy arguments and only know the
/// older `--progress` output. macOS ships one of these by default.
const OLD_RSYNC: [u32; 3] = [3, 1, 0];

/// A transfer client that drives the system rsync binary
pub struct RsyncTransfer {
    sftp: Sftp,
    _session: Session,
    remote_path: String,
    target: String,
    flags: Vec<String>,
    password: Option<String>,
}

impl RsyncTransfer {
    /// Probe the local rsync installation and open the cleanup session
    pub fn connect(config: &HostConfig, remote_path: String, show_progress: bool) -> Result<Self> {
        let version = probe_rsync_version()?;
        let old = is_old_rsync(&version);
        if old {
            debug!(?version, "old rsync detected, using --progress");
        }

        let (session, sftp) = super::sftp::open_sftp(config)?;
        let target = format!("{}:{}", config.ssh_target(), remote_path);
        let flags = rsync_flags(old, show_progress, config.port);

        Ok(Self {
            sftp,
            _session: session,
            remote_path,
            target,
            flags,
            password: config.password.clone(),
        })
    }

    /// Run one rsync invocation moving `src` to `dst`
    fn transfer(&self, src: &str, dst: &str) -> Result<()> {
        // With a password, sshpass feeds it to ssh through the SSHPASS
        // environment variable; it never appears on the command line.
        let mut command = match &self.password {
            Some(password) => {
                let mut c = Command::new("sshpass");
                c.arg("-e").arg("rsync").env("SSHPASS", password);
                c
            }
            None => Command::new("rsync"),
        };
        command.args(&self.flags).arg(src).arg(dst);
        debug!(?command, "running rsync");

        let status = command
            .stdin(Stdio::null())
            .status()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    AppError::config("cannot find required executable (rsync or sshpass)")
                }
                _ => AppError::transfer(format!("failed to spawn rsync: {e}")),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(AppError::transfer(format!(
                "rsync exited with {status} while transferring to {dst}"
            )))
        }
    }
}

impl super::DataTransfer for RsyncTransfer {
    fn put(&mut self, local: &Path) -> Result<()> {
        self.transfer(&local.to_string_lossy(), &self.target)
    }

    fn get(&mut self, local: &Path) -> Result<()> {
        self.transfer(&self.target, &local.to_string_lossy())
    }

    fn clean_remote(&mut self) -> Result<()> {
        super::sftp::unlink_ignore_missing(&self.sftp, &self.remote_path)
    }

    fn remote_path(&self) -> &str {
        &self.remote_path
    }
}

impl Drop for RsyncTransfer {
    fn drop(&mut self) {
        use super::DataTransfer;
        let _ = self.clean_remote();
    }
}

/// Build the rsync flag set for the probed version and resolved port
fn rsync_flags(old_rsync: bool, show_progress: bool, port: Option<u16>) -> Vec<String> {
    let mut flags = vec!["-hh".to_string()];
    if show_progress {
        flags.push(if old_rsync {
            "--progress".to_string()
        } else {
            "--info=progress2".to_string()
        });
    } else {
        flags.push("--quiet".to_string());
    }
    if let Some(port) = port {
        flags.push("-e".to_string());
        flags.push(format!("ssh -p {port}"));
    }
    flags
}

/// Run `rsync --version` and extract the version triple
fn probe_rsync_version() -> Result<Vec<u32>> {
    let output = Command::new("rsync")
        .arg("--version")
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::config("cannot find rsync executable"),
            _ => AppError::config(format!("cannot run rsync --version: {e}")),
        })?;
    if !output.status.success() {
        return Err(AppError::config(format!(
            "rsync --version exited with {}",
            output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_rsync_version(&stdout).ok_or_else(|| {
        AppError::config(format!(
            "could not determine rsync version from: {}",
            stdout.lines().next().unwrap_or_default()
        ))
    })
}

/// Pull the numeric version out of `rsync --version` output, e.g.
/// `rsync  version 3.2.7  protocol version 31` → `[3, 2, 7]`
fn parse_rsync_version(output: &str) -> Option<Vec<u32>> {
    let after = output.split("version").nth(1)?;
    let number = after.split("protocol").next()?.trim();
    let parts: Vec<u32> = number
        .split('.')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

fn is_old_rsync(version: &[u32]) -> bool {
    version <= &OLD_RSYNC[..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_modern() {
        let output = "rsync  version 3.2.7  protocol version 31\nCopyright (C) 1996-2022\n";
        assert_eq!(parse_rsync_version(output), Some(vec![3, 2, 7]));
    }

    #[test]
    fn test_parse_version_macos() {
        let output = "rsync  version 2.6.9  protocol version 29\n";
        assert_eq!(parse_rsync_version(output), Some(vec![2, 6, 9]));
    }

    #[test]
    fn test_parse_version_garbage() {
        assert_eq!(parse_rsync_version("no such thing"), None);
        assert_eq!(parse_rsync_version("rsync version x.y.z protocol"), None);
    }

    #[test]
    fn test_old_rsync_cutoff() {
        assert!(is_old_rsync(&[3, 1, 0]));
        assert!(is_old_rsync(&[2, 6, 9]));
        assert!(!is_old_rsync(&[3, 1, 1]));
        assert!(!is_old_rsync(&[3, 2, 7]));
    }

    #[test]
    fn test_flags_modern_with_progress() {
        let flags = rsync_flags(false, true, None);
        assert_eq!(flags, vec!["-hh", "--info=progress2"]);
    }

    #[test]
    fn test_flags_old_quiet_with_port() {
        let flags = rsync_flags(true, false, Some(2222));
        assert_eq!(flags, vec!["-hh", "--quiet", "-e", "ssh -p 2222"]);
    }
}
