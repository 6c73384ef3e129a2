//! fpgalink - Command link to an FPGA peripheral
//!
//! Talks to an FPGA sharing a synchronous serial bus with the host, plus a
//! reset line and an optional configuration-status line.
//!
//! # Architecture
//!
//! Every command goes through a type-erased `LinkHandle` from
//! `fpgalink-host`, so the same command implementations work with:
//! - **dummy** - an in-memory emulated peripheral
//! - **linux_gpio** - bit-banged serial lines on a GPIO chip
//! - **linux_spi** - a spidev controller with GPIO reset/status lines
//!
//! Each one-shot command opens the link, resets the peripheral, runs one
//! verb and prints the result.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

/// Default log filter for a `-v` count, used when `RUST_LOG` is unset
fn default_log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_filter(cli.verbose)),
    )
    .init();

    let result = match cli.command {
        Commands::Reset { link } => {
            let handle = commands::open_and_reset(&link)?;
            commands::verbs::run_reset(&handle)
        }
        Commands::Id { link } => {
            let mut handle = commands::open_and_reset(&link)?;
            commands::verbs::run_id(&mut handle)
        }
        Commands::Status { link } => {
            let mut handle = commands::open_and_reset(&link)?;
            commands::verbs::run_status(&mut handle)
        }
        Commands::ReadReg { link, address } => {
            let mut handle = commands::open_and_reset(&link)?;
            commands::verbs::run_read_reg(&mut handle, address)
        }
        Commands::WriteReg {
            link,
            address,
            value,
        } => {
            let mut handle = commands::open_and_reset(&link)?;
            commands::verbs::run_write_reg(&mut handle, address, value)
        }
        Commands::Pattern { link, value } => {
            let mut handle = commands::open_and_reset(&link)?;
            commands::verbs::run_pattern(&mut handle, value)
        }
        Commands::Nop { link } => {
            let mut handle = commands::open_and_reset(&link)?;
            commands::verbs::run_nop(&mut handle)
        }
        Commands::Console { link } => {
            let mut handle = commands::open_and_reset(&link)?;
            commands::console::run(&mut handle)
        }
        Commands::Demo {
            link,
            interval,
            count,
        } => {
            let handle = commands::open_and_reset(&link)?;
            commands::demo::run(handle, interval, count)
        }
        Commands::ListBackends => {
            commands::list_backends();
            Ok(())
        }
    };

    result
}
