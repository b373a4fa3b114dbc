//! Host descriptor resolution
//!
//! Merges CLI-supplied connection parameters with the user's
//! `~/.ssh/config`. Resolution is an explicit function of the config file
//! path and the CLI overrides, so tests can point it at a fake file; no
//! ambient global state is consulted beyond `$USER` as a last resort.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, Result};

/// Fully-resolved connection parameters for the target host
#[derive(Debug, Clone, Serialize)]
pub struct HostConfig {
    /// Target hostname
    pub host: String,
    /// ssh username, if one was supplied or found in ssh config
    pub username: Option<String>,
    /// ssh password; absence means key/agent auth
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// ssh port, if one was supplied or found in ssh config
    pub port: Option<u16>,
    /// Identity files listed in ssh config for this host
    pub identity_files: Vec<PathBuf>,
}

impl HostConfig {
    /// The port to connect to, falling back to the ssh default
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(crate::defaults::DEFAULT_SSH_PORT)
    }

    /// The username to authenticate as, falling back to the current user
    pub fn username_or_current(&self) -> String {
        self.username
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "root".to_string())
    }

    /// The `user@host` form used by rsync-over-ssh targets
    pub fn ssh_target(&self) -> String {
        match &self.username {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

/// The default ssh client configuration file, if the home directory is known
pub fn default_ssh_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join("config"))
}

/// Resolve connection parameters from CLI input and an ssh config file.
///
/// CLI values always win; the config file only fills fields the CLI left
/// absent. A missing config file is not an error.
pub fn resolve_host_config(
    host: &str,
    username: Option<String>,
    password: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<HostConfig> {
    let mut resolved = HostConfig {
        host: host.to_lowercase(),
        username,
        password,
        port,
        identity_files: Vec::new(),
    };

    if let Some(path) = config_path {
        if path.exists() {
            debug!(path = %path.display(), "loading ssh config");
            let content = std::fs::read_to_string(path).map_err(|e| {
                AppError::config(format!("Cannot read ssh config {}: {}", path.display(), e))
            })?;
            let ssh_config = SshConfigFile::parse(&content)?;
            let options = ssh_config.lookup(&resolved.host);

            if resolved.username.is_none() {
                if let Some(user) = options.user {
                    debug!(user = %user, "username from ssh config");
                    resolved.username = Some(user);
                }
            }
            if resolved.port.is_none() {
                if let Some(port) = options.port {
                    debug!(port, "port from ssh config");
                    resolved.port = Some(port);
                }
            }
            resolved.identity_files = options
                .identity_files
                .iter()
                .map(|f| expand_tilde(f))
                .collect();
        } else {
            debug!(path = %path.display(), "no ssh config file");
        }
    }

    Ok(resolved)
}

/// Options looked up for one host from an ssh config file
#[derive(Debug, Default, PartialEq)]
struct HostOptions {
    user: Option<String>,
    port: Option<u16>,
    identity_files: Vec<String>,
}

/// A minimal `ssh_config(5)` reader covering the fields this tool uses:
/// `User`, `Port` and `IdentityFile`, with `*`/`?`/`!` host patterns.
/// First obtained value wins, matching ssh's own semantics, so specific
/// `Host` blocks written above `Host *` take precedence.
struct SshConfigFile {
    blocks: Vec<ConfigBlock>,
}

struct ConfigBlock {
    patterns: Vec<String>,
    options: Vec<(String, String)>,
}

impl SshConfigFile {
    fn parse(content: &str) -> Result<Self> {
        let mut blocks = Vec::new();
        // Options before any Host line apply to every host
        let mut current = ConfigBlock {
            patterns: vec!["*".to_string()],
            options: Vec::new(),
        };

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = split_option(line)
                .ok_or_else(|| AppError::config(format!("Malformed ssh config line: {line}")))?;

            if key.eq_ignore_ascii_case("host") {
                blocks.push(current);
                current = ConfigBlock {
                    patterns: value.split_whitespace().map(str::to_string).collect(),
                    options: Vec::new(),
                };
            } else if key.eq_ignore_ascii_case("match") {
                // Match criteria are out of scope; treat the block as
                // applying to no host.
                blocks.push(current);
                current = ConfigBlock {
                    patterns: Vec::new(),
                    options: Vec::new(),
                };
            } else {
                current.options.push((key.to_lowercase(), value.to_string()));
            }
        }
        blocks.push(current);

        Ok(Self { blocks })
    }

    fn lookup(&self, host: &str) -> HostOptions {
        let mut options = HostOptions::default();
        for block in self.blocks.iter().filter(|b| b.applies_to(host)) {
            for (key, value) in &block.options {
                match key.as_str() {
                    "user" if options.user.is_none() => options.user = Some(value.clone()),
                    "port" if options.port.is_none() => {
                        options.port = value.parse().ok();
                    }
                    "identityfile" => options.identity_files.push(value.clone()),
                    _ => {}
                }
            }
        }
        options
    }
}

impl ConfigBlock {
    fn applies_to(&self, host: &str) -> bool {
        let mut matched = false;
        for pattern in &self.patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                if pattern_matches(negated, host) {
                    return false;
                }
            } else if pattern_matches(pattern, host) {
                matched = true;
            }
        }
        matched
    }
}

/// Split an ssh config option line into key and value.
///
/// `ssh_config(5)` separates them with optional whitespace and at most
/// one `=`, so `Key value`, `Key=value` and `Key = value` all parse.
fn split_option(line: &str) -> Option<(&str, &str)> {
    let split_at = line.find(|c: char| c == '=' || c.is_whitespace())?;
    let key = &line[..split_at];
    let rest = line[split_at..].trim_start();
    let value = rest
        .strip_prefix('=')
        .unwrap_or(rest)
        .trim()
        .trim_matches('"');
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Case-insensitive glob matching with `*` and `?`, per `ssh_config(5)`
fn pattern_matches(pattern: &str, host: &str) -> bool {
    fn matches(p: &[char], h: &[char]) -> bool {
        match p.first() {
            None => h.is_empty(),
            Some('*') => matches(&p[1..], h) || (!h.is_empty() && matches(p, &h[1..])),
            Some('?') => !h.is_empty() && matches(&p[1..], &h[1..]),
            Some(c) => {
                h.first().is_some_and(|hc| hc.eq_ignore_ascii_case(c)) && matches(&p[1..], &h[1..])
            }
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let host: Vec<char> = host.chars().collect();
    matches(&pattern, &host)
}

/// Expand a leading `~` to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
