//! CLI command implementations
//!
//! Every command works on a `LinkHandle`, whatever backend opened it.
//! [`open_and_reset`] is the common prologue: load the board file, open
//! the backend and run the reset sequence.

pub mod console;
pub mod demo;
mod list;
pub mod verbs;

pub use list::list_backends;

use std::time::Duration;

use fpgalink_host::{open_link, BoardConfig, LinkDevice, LinkError, LinkHandle, LinkStatus};

use crate::cli::LinkArgs;

/// Open the link described by `args` and reset the peripheral
///
/// With `--wait-ready`, a peripheral that is still loading gets that long
/// to come up. Running out of time is not fatal: the link is returned
/// unconfigured and every verb on it will report that.
pub fn open_and_reset(args: &LinkArgs) -> Result<LinkHandle, Box<dyn std::error::Error>> {
    let board = args
        .board
        .as_deref()
        .map(|path| BoardConfig::from_toml_file(path))
        .transpose()
        .map_err(|e| format!("Failed to load board file: {}", e))?;

    let mut handle = open_link(&args.backend, board.as_ref())?;

    let status = match args.wait_ready {
        Some(ms) => match handle.reset_and_await(Duration::from_millis(ms)) {
            Err(LinkError::Timeout) => {
                log::warn!(
                    "Peripheral not ready after {} ms, continuing without it",
                    ms
                );
                handle.status()
            }
            other => other?,
        },
        None => handle.reset_peripheral()?,
    };

    if status != LinkStatus::Configured {
        log::warn!("Link is {}; commands will be refused until a reset succeeds", status);
    }
    Ok(handle)
}
