//! The owning link: transport, lifecycle and framer behind a small verb set

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use super::events::{EventSink, LinkEvent, NullSink};
use super::state::{LinkState, LinkStatus};
use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::protocol::{CommandFramer, Request, Response, MAX_FRAME_LEN};
use crate::transport::Transport;

/// One controller's link to one peripheral
///
/// Owns its transport exclusively; `&mut self` on every verb is the only
/// bus arbitration the single-threaded model needs. Every verb that talks
/// to the peripheral re-polls the status line first and refuses to run
/// unless the link is configured, so a peripheral that drops its
/// configuration is noticed at the next verb.
pub struct FpgaLink<T, RST, STS, D, S = NullSink> {
    transport: T,
    state: LinkState<RST, STS, D>,
    framer: CommandFramer,
    sink: S,
}

impl<T, RST, STS, D> FpgaLink<T, RST, STS, D, NullSink>
where
    T: Transport,
    RST: OutputPin,
    STS: InputPin,
    D: DelayNs,
{
    /// Compose a link from already-bound parts
    ///
    /// Touches no hardware; the parts did their pin setup when they were
    /// constructed. The link starts `Unconfigured` until the first reset.
    pub fn open(config: &LinkConfig, transport: T, state: LinkState<RST, STS, D>) -> Self {
        Self {
            transport,
            state,
            framer: CommandFramer::new(config.opcodes),
            sink: NullSink,
        }
    }
}

impl<T, RST, STS, D, S> FpgaLink<T, RST, STS, D, S>
where
    T: Transport,
    RST: OutputPin,
    STS: InputPin,
    D: DelayNs,
    S: EventSink,
{
    /// Replace the event sink
    pub fn with_sink<S2: EventSink>(self, sink: S2) -> FpgaLink<T, RST, STS, D, S2> {
        FpgaLink {
            transport: self.transport,
            state: self.state,
            framer: self.framer,
            sink,
        }
    }

    /// Cached status
    pub fn status(&self) -> LinkStatus {
        self.state.status()
    }

    /// Whether the board has a status line
    pub fn has_status_line(&self) -> bool {
        self.state.has_status_line()
    }

    /// Reset the peripheral and sample its status once
    pub fn reset_peripheral(&mut self) -> Result<LinkStatus> {
        self.sink.emit(LinkEvent::ResetStarted);
        let result = self.state.reset();
        self.report_reset(result)
    }

    /// Reset the peripheral and wait up to `timeout` for it to configure
    ///
    /// On [`Error::Timeout`] the link is left `Unconfigured`; callers that
    /// want to carry on degraded can do so and retry later.
    pub fn reset_and_await(&mut self, timeout: Duration) -> Result<LinkStatus> {
        self.sink.emit(LinkEvent::ResetStarted);
        let result = self.state.reset_with_timeout(timeout);
        self.report_reset(result)
    }

    fn report_reset(&mut self, result: Result<LinkStatus>) -> Result<LinkStatus> {
        match result {
            Ok(status) => self.sink.emit(LinkEvent::ResetResult(status)),
            Err(Error::Timeout) => self
                .sink
                .emit(LinkEvent::ResetResult(LinkStatus::Unconfigured)),
            Err(reason) => self.sink.emit(LinkEvent::CommandFailed {
                opcode: None,
                reason,
            }),
        }
        result
    }

    /// Sample the status line, reporting a configured link going `Lost`
    pub fn poll_status(&mut self) -> Result<LinkStatus> {
        let before = self.state.status();
        let after = self.state.poll()?;
        if before == LinkStatus::Configured && after == LinkStatus::Lost {
            self.sink.emit(LinkEvent::StatusLost);
        }
        Ok(after)
    }

    /// Run one gated transaction for any request
    ///
    /// Encodes first, so a malformed request is rejected even on a link
    /// that is down. Then the link must be configured, both in the cache and
    /// on a fresh poll; otherwise this fails with [`Error::LinkNotReady`]
    /// without touching the bus. Exactly one exchange follows.
    pub fn transact(&mut self, request: &Request) -> Result<Response> {
        let result = self.transact_inner(request);
        if let Err(reason) = result {
            self.sink.emit(LinkEvent::CommandFailed {
                opcode: Some(request.opcode),
                reason,
            });
        }
        result
    }

    fn transact_inner(&mut self, request: &Request) -> Result<Response> {
        let frame = self.framer.encode(request)?;

        if self.state.status() != LinkStatus::Configured {
            log::debug!("{} refused: link {}", request.opcode, self.state.status());
            return Err(Error::LinkNotReady);
        }
        if self.poll_status()? != LinkStatus::Configured {
            return Err(Error::LinkNotReady);
        }

        let mut buf = [0u8; MAX_FRAME_LEN];
        let rx = &mut buf[..frame.len()];
        self.transport.exchange(&frame, rx)?;
        log::trace!("{}: tx {:02X?} rx {:02X?}", request.opcode, frame.as_slice(), rx);

        self.framer.decode(request.opcode, rx)
    }

    /// Read the peripheral's identification byte
    pub fn read_id(&mut self) -> Result<u8> {
        value_of(self.transact(&Request::read_id())?)
    }

    /// Read one register
    pub fn read_register(&mut self, address: u8) -> Result<u8> {
        value_of(self.transact(&Request::read_reg(address))?)
    }

    /// Write one register
    pub fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        self.transact(&Request::write_reg(address, value)).map(drop)
    }

    /// Set the output pattern
    pub fn set_output_pattern(&mut self, value: u8) -> Result<()> {
        let response = self.transact(&Request::set_output(value))?;
        if let Some(previous) = response.value {
            log::debug!("output 0x{:02X} (was 0x{:02X})", value, previous);
        }
        Ok(())
    }

    /// Send a no-op frame
    pub fn nop(&mut self) -> Result<()> {
        self.transact(&Request::nop()).map(drop)
    }

    /// The event sink
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

fn value_of(response: Response) -> Result<u8> {
    response.value.ok_or(Error::MalformedRequest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::StatusInput;
    use crate::mock::{MockDelay, MockInput, MockOutput, Trace};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Transport that logs frames and answers from a queue (else loopback)
    #[derive(Default)]
    struct ScriptedTransport {
        frames: Rc<RefCell<Vec<Vec<u8>>>>,
        replies: VecDeque<Vec<u8>>,
        fail: Option<Error>,
    }

    impl Transport for ScriptedTransport {
        fn exchange(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
            if let Some(e) = self.fail {
                return Err(e);
            }
            self.frames.borrow_mut().push(write.to_vec());
            match self.replies.pop_front() {
                Some(reply) => read.copy_from_slice(&reply),
                None => read.copy_from_slice(write),
            }
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    struct Recorder(Rc<RefCell<Vec<LinkEvent>>>);

    impl EventSink for Recorder {
        fn emit(&mut self, event: LinkEvent) {
            self.0.borrow_mut().push(event);
        }
    }

    type Link = FpgaLink<ScriptedTransport, MockOutput, MockInput, MockDelay, Recorder>;

    struct Fixture {
        link: Link,
        frames: Rc<RefCell<Vec<Vec<u8>>>>,
        status: MockInput,
        events: Recorder,
    }

    fn fixture(replies: &[&[u8]]) -> Fixture {
        let trace = Trace::default();
        let config = LinkConfig::default();
        let status = MockInput::with_level(true);
        let state = LinkState::new(
            MockOutput::new("reset", &trace, false),
            StatusInput::Wired(status.clone()),
            MockDelay::new(&trace),
            &config,
        )
        .unwrap();
        let transport = ScriptedTransport {
            replies: replies.iter().map(|r| r.to_vec()).collect(),
            ..Default::default()
        };
        let frames = transport.frames.clone();
        let events = Recorder::default();
        let link = FpgaLink::open(&config, transport, state).with_sink(events.clone());
        Fixture {
            link,
            frames,
            status,
            events,
        }
    }

    #[test]
    fn test_verbs_refused_before_reset() {
        let mut f = fixture(&[]);
        assert_eq!(f.link.read_id(), Err(Error::LinkNotReady));
        assert_eq!(f.link.write_register(1, 2), Err(Error::LinkNotReady));
        assert!(f.frames.borrow().is_empty());
        assert_eq!(f.status.samples.get(), 0);
    }

    #[test]
    fn test_read_id_after_reset() {
        let mut f = fixture(&[&[0x5A]]);
        assert_eq!(f.link.reset_peripheral(), Ok(LinkStatus::Configured));
        assert_eq!(f.link.read_id(), Ok(0x5A));
        assert_eq!(*f.frames.borrow(), [vec_of(&[0x01])]);
        assert_eq!(
            *f.events.0.borrow(),
            [
                LinkEvent::ResetStarted,
                LinkEvent::ResetResult(LinkStatus::Configured)
            ]
        );
    }

    #[test]
    fn test_read_register_discards_dont_care() {
        let mut f = fixture(&[&[0xEE, 0xEE, 0x42]]);
        f.link.reset_peripheral().unwrap();
        assert_eq!(f.link.read_register(0x07), Ok(0x42));
        assert_eq!(*f.frames.borrow(), [vec_of(&[0x03, 0x07, 0x00])]);
    }

    #[test]
    fn test_write_and_pattern_frames() {
        let mut f = fixture(&[]);
        f.link.reset_peripheral().unwrap();
        f.link.write_register(0x05, 0xAA).unwrap();
        f.link.set_output_pattern(0x81).unwrap();
        f.link.nop().unwrap();
        assert_eq!(
            *f.frames.borrow(),
            [
                vec_of(&[0x02, 0x05, 0xAA]),
                vec_of(&[0x10, 0x81]),
                vec_of(&[0x00])
            ]
        );
    }

    #[test]
    fn test_loss_fails_fast_until_reset() {
        let mut f = fixture(&[]);
        f.link.reset_peripheral().unwrap();
        f.link.write_register(0, 1).unwrap();

        f.status.level.set(false);
        assert_eq!(f.link.read_register(0x00), Err(Error::LinkNotReady));
        assert_eq!(f.link.status(), LinkStatus::Lost);

        // Line recovers but the link stays down without a reset
        f.status.level.set(true);
        let samples = f.status.samples.get();
        assert_eq!(f.link.read_id(), Err(Error::LinkNotReady));
        assert_eq!(f.status.samples.get(), samples);
        assert_eq!(f.frames.borrow().len(), 1);

        let events = f.events.0.borrow();
        assert!(events.contains(&LinkEvent::StatusLost));
        assert!(events.contains(&LinkEvent::CommandFailed {
            opcode: Some(crate::Opcode::ReadReg),
            reason: Error::LinkNotReady,
        }));
    }

    #[test]
    fn test_malformed_request_rejected_first() {
        let mut f = fixture(&[]);
        let bad = Request {
            payload: Some(1),
            ..Request::read_id()
        };
        assert_eq!(f.link.transact(&bad), Err(Error::MalformedRequest));
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut f = fixture(&[]);
        f.link.reset_peripheral().unwrap();
        f.link.transport.fail = Some(Error::BusBusy);
        assert_eq!(f.link.set_output_pattern(1), Err(Error::BusBusy));
        assert_eq!(f.link.status(), LinkStatus::Configured);
    }

    #[test]
    fn test_reset_and_await_timeout() {
        let mut f = fixture(&[]);
        f.status.level.set(false);
        assert_eq!(
            f.link.reset_and_await(Duration::from_millis(20)),
            Err(Error::Timeout)
        );
        assert_eq!(
            *f.events.0.borrow(),
            [
                LinkEvent::ResetStarted,
                LinkEvent::ResetResult(LinkStatus::Unconfigured)
            ]
        );
    }

    fn vec_of(bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }
}
