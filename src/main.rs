//! speedtest-ssh - Main CLI application
//!
//! Measures approximate upload/download throughput to a remote host over
//! ssh by timing disposable payload transfers through rsync or sftp.

use std::io::IsTerminal;
use std::process;
use std::time::Duration;

use clap::Parser;
use speedtest_ssh::{
    calibrate::calibrate,
    cli::Cli,
    config::{default_ssh_config_path, resolve_host_config},
    error::Result,
    output::{DirectionSummary, ThroughputReport},
    payload::LocalPayload,
    transfer::{self, Direction, TransferDriver},
};
use tracing::debug;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let use_color = cli.use_colors();
    if let Err(e) = run_application(cli) {
        eprintln!("{}", e.format_for_console(use_color));
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
fn run_application(cli: Cli) -> Result<()> {
    let target = Duration::from_secs(cli.num_seconds);
    let use_color = cli.use_colors();
    let show_progress = std::io::stdout().is_terminal();

    println!("Initializing...");
    let host = resolve_host_config(
        &cli.host,
        cli.username.clone(),
        cli.password.clone(),
        cli.port,
        default_ssh_config_path().as_deref(),
    )?;
    debug!(
        config = %serde_json::to_string(&host).unwrap_or_default(),
        mode = %cli.mode,
        "resolved connection parameters"
    );

    let mut client = transfer::connect(cli.mode, &host, show_progress)?;
    let payload = LocalPayload::new()?;

    println!("Testing...");
    let report = {
        let mut driver = TransferDriver::new(client.as_mut(), &payload);
        let upload = calibrate(target, Direction::Upload, &mut driver)?;
        let download = calibrate(target, Direction::Download, &mut driver)?;
        ThroughputReport { upload, download }
    };

    debug!(
        upload = %serde_json::to_string(&DirectionSummary::from(&report.upload)).unwrap_or_default(),
        download = %serde_json::to_string(&DirectionSummary::from(&report.download)).unwrap_or_default(),
        "raw measurements"
    );

    println!();
    println!("{}", report.format(use_color));
    Ok(())
}

/// Initialize tracing from the -v count; RUST_LOG still wins when set
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &speedtest_ssh::AppError) {
    use speedtest_ssh::AppError;
    match error {
        AppError::Connection(_) => {
            eprintln!();
            eprintln!("Connection troubleshooting:");
            eprintln!("  - Verify the hostname and port (ssh <host> works?)");
            eprintln!("  - Check credentials: -u/--username, --password, or loaded ssh keys");
            eprintln!("  - An ssh agent or ~/.ssh/config entry can supply missing settings");
        }
        AppError::Transfer(_) => {
            eprintln!();
            eprintln!("Transfer troubleshooting:");
            eprintln!("  - Check free space in the remote /tmp directory");
            eprintln!("  - Try the other mode: -m sftp or -m rsync");
        }
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - See --help for flag formats");
            eprintln!("  - rsync mode needs the rsync binary (and sshpass with --password)");
        }
        _ => {}
    }
}
