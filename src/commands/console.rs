//! Interactive console
//!
//! One command per line. The single-key forms (`r`, `i`, `0`-`9`, `h`)
//! work as on the board's serial menu; the long forms add register
//! access.

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use fpgalink_core::config::toml::parse_number;
use fpgalink_host::{LinkDevice, LinkHandle};
use thiserror::Error;

/// A parsed console line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Reset,
    ReadId,
    Status,
    Pattern(u8),
    Read(u8),
    Write(u8, u8),
    Nop,
    Help,
    Quit,
}

/// Why a console line was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}' (h for help)")]
    Unknown(String),

    #[error("{command} needs {expected}")]
    Arguments {
        command: &'static str,
        expected: &'static str,
    },

    #[error("invalid byte '{0}'")]
    Byte(String),
}

fn byte(s: &str) -> Result<u8, ParseError> {
    parse_number(s)
        .ok()
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| ParseError::Byte(s.to_string()))
}

impl FromStr for ConsoleCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ParseError::Unknown(String::new()));
        };
        let args: Vec<&str> = words.collect();

        let arity = |n: usize, command: &'static str, expected: &'static str| {
            if args.len() == n {
                Ok(())
            } else {
                Err(ParseError::Arguments { command, expected })
            }
        };

        let cmd = match verb.to_ascii_lowercase().as_str() {
            "r" | "reset" => ConsoleCommand::Reset,
            "i" | "id" => ConsoleCommand::ReadId,
            "s" | "status" => ConsoleCommand::Status,
            "n" | "nop" => ConsoleCommand::Nop,
            "h" | "help" | "?" => ConsoleCommand::Help,
            "q" | "quit" | "exit" => ConsoleCommand::Quit,
            d if d.len() == 1 && d.as_bytes()[0].is_ascii_digit() => {
                ConsoleCommand::Pattern(d.as_bytes()[0] - b'0')
            }
            "p" | "pattern" => {
                arity(1, "pattern", "a value")?;
                return Ok(ConsoleCommand::Pattern(byte(args[0])?));
            }
            "read" => {
                arity(1, "read", "an address")?;
                return Ok(ConsoleCommand::Read(byte(args[0])?));
            }
            "write" => {
                arity(2, "write", "an address and a value")?;
                return Ok(ConsoleCommand::Write(byte(args[0])?, byte(args[1])?));
            }
            _ => return Err(ParseError::Unknown(verb.to_string())),
        };

        arity(0, "this command", "no arguments")?;
        Ok(cmd)
    }
}

fn print_help() {
    println!();
    println!("Commands:");
    println!("  r, reset            - Reset FPGA");
    println!("  i, id               - Read FPGA ID");
    println!("  s, status           - Sample the status line");
    println!("  0-9                 - Set output pattern");
    println!("  pattern <v>         - Set output pattern to any byte");
    println!("  read <addr>         - Read a register");
    println!("  write <addr> <v>    - Write a register");
    println!("  nop                 - Send a no-op frame");
    println!("  h, help             - Show this help");
    println!("  q, quit             - Leave the console");
    println!();
}

fn execute(handle: &mut LinkHandle, cmd: ConsoleCommand) -> fpgalink_core::Result<()> {
    match cmd {
        ConsoleCommand::Reset => {
            let status = handle.reset_peripheral()?;
            println!("Link: {}", status);
        }
        ConsoleCommand::ReadId => println!("FPGA ID: 0x{:02X}", handle.read_id()?),
        ConsoleCommand::Status => println!("Link: {}", handle.poll_status()?),
        ConsoleCommand::Pattern(v) => {
            handle.set_output_pattern(v)?;
            println!("Set output pattern: 0x{:02X}", v);
        }
        ConsoleCommand::Read(addr) => {
            println!("reg[0x{:02X}] = 0x{:02X}", addr, handle.read_register(addr)?)
        }
        ConsoleCommand::Write(addr, v) => {
            handle.write_register(addr, v)?;
            println!("reg[0x{:02X}] <- 0x{:02X}", addr, v);
        }
        ConsoleCommand::Nop => {
            handle.nop()?;
            println!("NOP sent");
        }
        ConsoleCommand::Help => print_help(),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

/// Run the console on stdin until `quit` or end of input
pub fn run(handle: &mut LinkHandle) -> Result<(), Box<dyn std::error::Error>> {
    println!("fpgalink console on {} (h for help)", handle.backend());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        stdout.flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Quit) => break,
            // Verb failures are already logged by the link's sink
            Ok(cmd) => {
                if let Err(e) = execute(handle, cmd) {
                    println!("Error: {}", e);
                }
            }
            Err(e) => println!("{}", e),
        }
    }

    Ok(())
}
