//! Cosmetic progress reporting for transfers
//!
//! Purely presentational; the transfer timer runs around the whole copy,
//! so the bar never influences the measurement.

use std::io::{Read, Write};

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::Result;

/// Build a byte-oriented progress bar, or a hidden one when progress
/// output is disabled (tests, piped output).
pub fn transfer_bar(description: &str, total_bytes: u64, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total_bytes);
    let style = ProgressStyle::with_template(
        "{msg:9} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    bar.set_style(style);
    bar.set_message(description.to_string());
    bar
}

/// Copy `reader` to `writer` in blocks, feeding the progress bar.
///
/// Returns the number of bytes copied.
pub fn copy_with_progress<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    bar: &ProgressBar,
) -> Result<u64> {
    let mut block = vec![0u8; crate::defaults::COPY_BLOCK_SIZE];
    let mut copied = 0u64;
    loop {
        let n = reader.read(&mut block)?;
        if n == 0 {
            break;
        }
        writer.write_all(&block[..n])?;
        copied += n as u64;
        bar.set_position(copied);
    }
    writer.flush()?;
    bar.finish_and_clear();
    Ok(copied)
}
