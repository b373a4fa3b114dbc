//! Error handling for the ssh speed tester

use thiserror::Error;

/// Custom error types for the ssh speed tester
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (bad CLI input, unreadable ssh config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection errors (host unreachable, authentication rejected)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transfer-mechanism errors (sftp/rsync failure mid-transfer)
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// I/O errors (local file operations)
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new transfer error
    pub fn transfer<S: Into<String>>(message: S) -> Self {
        Self::Transfer(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Connection(_) => "CONNECTION",
            Self::Transfer(_) => "TRANSFER",
            Self::Io(_) => "IO",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Get exit code for this error type
    ///
    /// Exact values are not part of the public contract; only "non-zero on
    /// failure" is.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::Connection(_) => 2,
            Self::Transfer(_) => 3,
            Self::Io(_) => 5,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) => format!("[{}] {}", category.red().bold(), message.red()),
                Self::Connection(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Transfer(_) => format!("[{}] {}", category.cyan().bold(), message.cyan()),
                Self::Io(_) => format!("[{}] {}", category.magenta().bold(), message.magenta()),
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

// ssh2 errors outside of the connect/auth path are transfer failures;
// connection setup maps its errors explicitly.
impl From<ssh2::Error> for AppError {
    fn from(error: ssh2::Error) -> Self {
        Self::transfer(error.to_string())
    }
}

// Anyhow integration
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;
