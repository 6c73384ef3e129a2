//! One-shot verbs

use fpgalink_host::{LinkDevice, LinkHandle, LinkStatus};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn status_line_note(handle: &LinkHandle) -> &'static str {
    if handle.has_status_line() {
        ""
    } else {
        " (no status line, assumed)"
    }
}

/// Report the status left by the reset
pub fn run_reset(handle: &LinkHandle) -> CmdResult {
    let status = handle.status();
    println!("Link: {}{}", status, status_line_note(handle));
    if status != LinkStatus::Configured {
        return Err(format!("Peripheral did not configure after reset ({})", status).into());
    }
    Ok(())
}

/// Sample the status line and print it
pub fn run_status(handle: &mut LinkHandle) -> CmdResult {
    let status = handle.poll_status()?;
    println!("Backend:     {}", handle.backend());
    println!("Status line: {}", if handle.has_status_line() { "wired" } else { "absent" });
    println!("Link:        {}", status);
    Ok(())
}

/// Print the identification byte
pub fn run_id(handle: &mut LinkHandle) -> CmdResult {
    let id = handle.read_id()?;
    println!("FPGA ID: 0x{:02X}", id);
    Ok(())
}

/// Print one register
pub fn run_read_reg(handle: &mut LinkHandle, address: u8) -> CmdResult {
    let value = handle.read_register(address)?;
    println!("reg[0x{:02X}] = 0x{:02X}", address, value);
    Ok(())
}

/// Write one register
pub fn run_write_reg(handle: &mut LinkHandle, address: u8, value: u8) -> CmdResult {
    handle.write_register(address, value)?;
    println!("reg[0x{:02X}] <- 0x{:02X}", address, value);
    Ok(())
}

/// Set the output pattern
pub fn run_pattern(handle: &mut LinkHandle, value: u8) -> CmdResult {
    handle.set_output_pattern(value)?;
    println!("Output pattern: 0x{:02X}", value);
    Ok(())
}

/// Send a no-op frame
pub fn run_nop(handle: &mut LinkHandle) -> CmdResult {
    handle.nop()?;
    println!("NOP sent");
    Ok(())
}
