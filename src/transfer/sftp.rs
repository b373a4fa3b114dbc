//! sftp transfer driver backed by the ssh2 crate
//!
//! Also supplies the shared session setup used by the rsync driver for
//! remote temp-file cleanup.

use std::net::TcpStream;
use std::path::Path;

use ssh2::{ErrorCode, Session, Sftp};
use tracing::debug;

use crate::config::HostConfig;
use crate::error::{AppError, Result};
use crate::progress;

// LIBSSH2_FX_NO_SUCH_FILE
const SFTP_NO_SUCH_FILE: i32 = 2;

/// An authenticated sftp client bound to one remote temp path
pub struct SftpTransfer {
    sftp: Sftp,
    // Keeps the underlying ssh session alive for as long as the sftp
    // handle is in use.
    _session: Session,
    remote_path: String,
    show_progress: bool,
}

impl SftpTransfer {
    /// Connect and authenticate against the resolved host
    pub fn connect(config: &HostConfig, remote_path: String, show_progress: bool) -> Result<Self> {
        let (session, sftp) = open_sftp(config)?;
        Ok(Self {
            sftp,
            _session: session,
            remote_path,
            show_progress,
        })
    }
}

impl super::DataTransfer for SftpTransfer {
    fn put(&mut self, local: &Path) -> Result<()> {
        let mut source = std::fs::File::open(local)?;
        let total = source.metadata()?.len();
        let mut dest = self.sftp.create(Path::new(&self.remote_path))?;
        let bar = progress::transfer_bar("Upload", total, self.show_progress);
        progress::copy_with_progress(&mut source, &mut dest, &bar)?;
        Ok(())
    }

    fn get(&mut self, local: &Path) -> Result<()> {
        let remote = Path::new(&self.remote_path);
        let total = self.sftp.stat(remote)?.size.unwrap_or(0);
        let mut source = self.sftp.open(remote)?;
        let mut dest = std::fs::File::create(local)?;
        let bar = progress::transfer_bar("Download", total, self.show_progress);
        progress::copy_with_progress(&mut source, &mut dest, &bar)?;
        Ok(())
    }

    fn clean_remote(&mut self) -> Result<()> {
        unlink_ignore_missing(&self.sftp, &self.remote_path)
    }

    fn remote_path(&self) -> &str {
        &self.remote_path
    }
}

impl Drop for SftpTransfer {
    fn drop(&mut self) {
        use super::DataTransfer;
        let _ = self.clean_remote();
    }
}

/// Remove a remote file over sftp, treating a missing file as success
pub(crate) fn unlink_ignore_missing(sftp: &Sftp, remote_path: &str) -> Result<()> {
    debug!(remote = %remote_path, "removing remote file (if it exists)");
    match sftp.unlink(Path::new(remote_path)) {
        Ok(()) => Ok(()),
        Err(e) if e.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => Ok(()),
        Err(e) => Err(AppError::transfer(format!(
            "failed to remove remote file: {e}"
        ))),
    }
}

/// Open a TCP connection, handshake and authenticate an ssh session,
/// then start sftp over it.
pub(crate) fn open_sftp(config: &HostConfig) -> Result<(Session, Sftp)> {
    let addr = (config.host.as_str(), config.port_or_default());
    debug!(host = %config.host, port = config.port_or_default(), "connecting");
    let stream = TcpStream::connect(addr).map_err(|e| {
        AppError::connection(format!(
            "cannot reach {}:{}: {}",
            config.host,
            config.port_or_default(),
            e
        ))
    })?;

    let mut session =
        Session::new().map_err(|e| AppError::connection(format!("ssh session init: {e}")))?;
    session.set_tcp_stream(stream);
    session
        .handshake()
        .map_err(|e| AppError::connection(format!("ssh handshake failed: {e}")))?;

    authenticate(&session, config)?;

    let sftp = session
        .sftp()
        .map_err(|e| AppError::connection(format!("sftp subsystem failed: {e}")))?;
    Ok((session, sftp))
}

/// Authenticate in order of preference: explicit password, ssh agent,
/// identity files from ssh config, default key files.
fn authenticate(session: &Session, config: &HostConfig) -> Result<()> {
    let username = config.username_or_current();

    if let Some(password) = &config.password {
        session
            .userauth_password(&username, password)
            .map_err(|e| AppError::connection(format!("password auth rejected: {e}")))?;
        return Ok(());
    }

    if session.userauth_agent(&username).is_ok() {
        debug!("authenticated via ssh agent");
        return Ok(());
    }

    for key in config.identity_files.iter().chain(default_keys().iter()) {
        if !key.exists() {
            continue;
        }
        debug!(key = %key.display(), "trying identity file");
        if session
            .userauth_pubkey_file(&username, None, key, None)
            .is_ok()
        {
            return Ok(());
        }
    }

    if session.authenticated() {
        Ok(())
    } else {
        Err(AppError::connection(format!(
            "all authentication methods failed for {username}@{}",
            config.host
        )))
    }
}

/// Key files ssh itself would try by default
fn default_keys() -> Vec<std::path::PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    ["id_ed25519", "id_rsa"]
        .iter()
        .map(|name| home.join(".ssh").join(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_refused_maps_to_connection_error() {
        // Port 1 on localhost is essentially never an ssh server
        let config = HostConfig {
            host: "127.0.0.1".to_string(),
            username: Some("nobody".to_string()),
            password: None,
            port: Some(1),
            identity_files: Vec::new(),
        };
        let Err(err) = open_sftp(&config) else {
            panic!("connecting to a closed port must fail");
        };
        assert_eq!(err.category(), "CONNECTION");
    }

    #[test]
    fn test_default_keys_live_under_dot_ssh() {
        for key in default_keys() {
            assert!(key.to_string_lossy().contains(".ssh"));
        }
    }
}
