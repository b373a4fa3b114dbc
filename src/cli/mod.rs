//! Command-line interface definition

use clap::Parser;

use crate::transfer::Mode;

/// Measure upload/download throughput to a host reachable over ssh
#[derive(Parser, Debug, Clone)]
#[command(name = "speedtest-ssh")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The host to speedtest the connection to
    pub host: String,

    /// The user to use with ssh (fallback: ssh config, then current user)
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// The password to use with ssh (fallback: ssh config / key-based auth)
    #[arg(long)]
    pub password: Option<String>,

    /// The port to use to ssh (fallback: ssh config, then 22)
    #[arg(long)]
    pub port: Option<u16>,

    /// An approximate amount of time each direction of the test should take
    #[arg(
        long,
        aliases = ["num_seconds", "max-seconds", "max_seconds"],
        default_value_t = crate::defaults::DEFAULT_NUM_SECONDS
    )]
    pub num_seconds: u64,

    /// The speedtest method
    #[arg(short = 'm', long, value_enum, default_value_t = Mode::Rsync)]
    pub mode: Mode,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable debug output (repeat for more detail)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        !self.no_color && supports_color()
    }
}

/// Detect whether the terminal supports colored output
fn supports_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::IsTerminal::is_terminal(&std::io::stdout())
}
