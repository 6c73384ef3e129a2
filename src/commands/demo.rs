//! Output pattern demo
//!
//! Steps a counter onto the output pattern at a fixed interval, the same
//! blinky loop the board ships with, while a watcher thread polls the
//! status line and reports configuration loss as it happens.

use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use fpgalink_host::{LinkHandle, LinkStatus, SharedLink};

/// How often the watcher samples the status line
const WATCH_INTERVAL: Duration = Duration::from_millis(100);

fn create_progress_bar(count: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = if count == 0 {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
        pb
    } else {
        let pb = ProgressBar::new(count);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb
    };
    Ok(pb)
}

/// Run the demo for `count` steps (0 for no limit) of `interval_ms` each
pub fn run(handle: LinkHandle, interval_ms: u64, count: u64) -> Result<(), Box<dyn std::error::Error>> {
    let link = SharedLink::new(handle);
    let interval = Duration::from_millis(interval_ms);
    let pb = create_progress_bar(count)?;

    let watch_pb = pb.clone();
    let watcher = link.spawn_watcher(WATCH_INTERVAL, move |status| match status {
        LinkStatus::Lost => watch_pb.println("Status line dropped: peripheral lost its configuration"),
        other => watch_pb.println(format!("Link is now {}", other)),
    });

    let mut pattern: u8 = 0;
    let mut step: u64 = 0;
    let result = loop {
        if count != 0 && step >= count {
            break Ok(());
        }
        pattern = pattern.wrapping_add(1);
        if let Err(e) = link.set_output_pattern(pattern) {
            pb.abandon_with_message(format!("stopped at pattern 0x{:02X}", pattern));
            break Err(e);
        }
        pb.set_message(format!("pattern 0x{:02X}", pattern));
        pb.inc(1);
        step += 1;
        thread::sleep(interval);
    };

    watcher.stop();
    if result.is_ok() {
        pb.finish_with_message(format!("done, last pattern 0x{:02X}", pattern));
    }
    result.map_err(Into::into)
}
