//! LinkHandle - an open link of any backend

use std::fmt;
use std::time::Duration;

use fpgalink_core::error::Result;
use fpgalink_core::link::{LinkDevice, LinkStatus};
use fpgalink_core::protocol::{Request, Response};

/// An open link, independent of the backend behind it
///
/// The handle owns the link (which includes the transport and control
/// lines). It implements [`LinkDevice`] itself, so callers use the verbs
/// directly.
pub struct LinkHandle {
    device: Box<dyn LinkDevice + Send>,
    backend: String,
}

impl LinkHandle {
    /// Wrap an opened device
    pub fn new(device: Box<dyn LinkDevice + Send>, backend: impl Into<String>) -> Self {
        Self {
            device,
            backend: backend.into(),
        }
    }

    /// Canonical name of the backend this link was opened with
    pub fn backend(&self) -> &str {
        &self.backend
    }
}

impl fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkHandle")
            .field("backend", &self.backend)
            .field("status", &self.device.status())
            .finish()
    }
}

impl LinkDevice for LinkHandle {
    fn status(&self) -> LinkStatus {
        self.device.status()
    }

    fn has_status_line(&self) -> bool {
        self.device.has_status_line()
    }

    fn reset_peripheral(&mut self) -> Result<LinkStatus> {
        self.device.reset_peripheral()
    }

    fn reset_and_await(&mut self, timeout: Duration) -> Result<LinkStatus> {
        self.device.reset_and_await(timeout)
    }

    fn poll_status(&mut self) -> Result<LinkStatus> {
        self.device.poll_status()
    }

    fn transact(&mut self, request: &Request) -> Result<Response> {
        self.device.transact(request)
    }

    fn read_id(&mut self) -> Result<u8> {
        self.device.read_id()
    }

    fn read_register(&mut self, address: u8) -> Result<u8> {
        self.device.read_register(address)
    }

    fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        self.device.write_register(address, value)
    }

    fn set_output_pattern(&mut self, value: u8) -> Result<()> {
        self.device.set_output_pattern(value)
    }

    fn nop(&mut self) -> Result<()> {
        self.device.nop()
    }
}
