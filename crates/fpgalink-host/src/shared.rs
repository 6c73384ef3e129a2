//! Shared access to one link from several threads
//!
//! Each verb runs with the link locked for its whole duration, so a
//! background watcher and foreground commands never interleave inside a
//! transaction or a reset sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use fpgalink_core::error::Result;
use fpgalink_core::link::{LinkDevice, LinkStatus};

use crate::handle::LinkHandle;

/// Granularity of the watcher's stop check
const STOP_CHECK: Duration = Duration::from_millis(10);

/// A link behind a mutex, cheap to clone
#[derive(Debug, Clone)]
pub struct SharedLink {
    inner: Arc<Mutex<LinkHandle>>,
}

impl SharedLink {
    /// Share an open link
    pub fn new(handle: LinkHandle) -> Self {
        Self {
            inner: Arc::new(Mutex::new(handle)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LinkHandle> {
        // A verb that panicked left the link in a state its own status reflects
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` with exclusive access to the link
    pub fn with<R>(&self, f: impl FnOnce(&mut LinkHandle) -> R) -> R {
        f(&mut self.lock())
    }

    /// Cached status
    pub fn status(&self) -> LinkStatus {
        self.lock().status()
    }

    /// Reset the peripheral and sample its status once
    pub fn reset_peripheral(&self) -> Result<LinkStatus> {
        self.lock().reset_peripheral()
    }

    /// Sample the status line
    pub fn poll_status(&self) -> Result<LinkStatus> {
        self.lock().poll_status()
    }

    /// Read the identification byte
    pub fn read_id(&self) -> Result<u8> {
        self.lock().read_id()
    }

    /// Read one register
    pub fn read_register(&self, address: u8) -> Result<u8> {
        self.lock().read_register(address)
    }

    /// Write one register
    pub fn write_register(&self, address: u8, value: u8) -> Result<()> {
        self.lock().write_register(address, value)
    }

    /// Set the output pattern
    pub fn set_output_pattern(&self, value: u8) -> Result<()> {
        self.lock().set_output_pattern(value)
    }

    /// Start a thread that polls the status line every `interval`
    ///
    /// `on_change` is called from the watcher thread with each status that
    /// differs from the previous sample. Poll errors are logged and the
    /// watcher keeps going.
    pub fn spawn_watcher<F>(&self, interval: Duration, mut on_change: F) -> StatusWatcher
    where
        F: FnMut(LinkStatus) + Send + 'static,
    {
        let link = self.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let thread = thread::spawn(move || {
            let mut last = link.status();
            log::debug!("status watcher started ({:?} interval)", interval);
            while !flag.load(Ordering::Relaxed) {
                match link.poll_status() {
                    Ok(status) if status != last => {
                        last = status;
                        on_change(status);
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("status watcher: {}", e),
                }
                sleep_unless_stopped(&flag, interval);
            }
            log::debug!("status watcher stopped");
        });

        StatusWatcher {
            stop,
            thread: Some(thread),
        }
    }
}

fn sleep_unless_stopped(flag: &AtomicBool, total: Duration) {
    let mut left = total;
    while !left.is_zero() && !flag.load(Ordering::Relaxed) {
        let step = left.min(STOP_CHECK);
        thread::sleep(step);
        left -= step;
    }
}

/// Running status watcher; stops and joins when dropped
#[derive(Debug)]
pub struct StatusWatcher {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StatusWatcher {
    /// Stop the watcher and wait for its thread
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("status watcher panicked");
            }
        }
    }
}

impl Drop for StatusWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
