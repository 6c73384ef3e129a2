//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal byte
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let v = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))?
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))?
    };
    u8::try_from(v).map_err(|_| format!("{} does not fit in a byte", s))
}

/// Generate dynamic help text for the backend argument
fn backend_help() -> String {
    format!(
        "Backend to use, as name:key=value,... [available: {}]",
        fpgalink_host::backend_names_short()
    )
}

#[derive(Parser)]
#[command(name = "fpgalink")]
#[command(author, version, about = "Command link to an FPGA peripheral", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Link options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct LinkArgs {
    #[arg(short = 'p', long, help = backend_help())]
    pub backend: String,

    /// Board file (TOML format); backend options override it
    #[arg(long)]
    pub board: Option<PathBuf>,

    /// Keep polling the status line for up to this many milliseconds after reset
    #[arg(long, value_name = "MS")]
    pub wait_ready: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reset the peripheral and report its status
    Reset {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Read the peripheral's identification byte
    Id {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Show the configuration status
    Status {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Read one register
    ReadReg {
        #[command(flatten)]
        link: LinkArgs,

        /// Register address (hex, e.g., 0x05)
        #[arg(value_parser = parse_hex_u8)]
        address: u8,
    },

    /// Write one register
    WriteReg {
        #[command(flatten)]
        link: LinkArgs,

        /// Register address (hex, e.g., 0x05)
        #[arg(value_parser = parse_hex_u8)]
        address: u8,

        /// Value to write
        #[arg(value_parser = parse_hex_u8)]
        value: u8,
    },

    /// Set the output pattern
    Pattern {
        #[command(flatten)]
        link: LinkArgs,

        /// Pattern byte
        #[arg(value_parser = parse_hex_u8)]
        value: u8,
    },

    /// Send a no-op frame
    Nop {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Interactive command session
    Console {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Cycle the output pattern while watching the status line
    Demo {
        #[command(flatten)]
        link: LinkArgs,

        /// Time between pattern steps in milliseconds
        #[arg(long, default_value = "500")]
        interval: u64,

        /// Number of steps (0 runs until the link fails)
        #[arg(long, default_value = "16")]
        count: u64,
    },

    /// List available backends
    ListBackends,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u8() {
        assert_eq!(parse_hex_u8("0x0F"), Ok(0x0F));
        assert_eq!(parse_hex_u8("255"), Ok(255));
        assert!(parse_hex_u8("0x100").is_err());
        assert!(parse_hex_u8("ab").is_err());
    }

    #[test]
    fn test_cli_shape() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_write_reg_args() {
        let cli = Cli::parse_from([
            "fpgalink", "write-reg", "-p", "dummy", "--wait-ready", "300", "0x05", "0xAA",
        ]);
        match cli.command {
            Commands::WriteReg {
                link,
                address,
                value,
            } => {
                assert_eq!(link.backend, "dummy");
                assert_eq!(link.wait_ready, Some(300));
                assert_eq!((address, value), (0x05, 0xAA));
            }
            _ => panic!("wrong subcommand"),
        }
    }
}
