//! Hand-written embedded-hal doubles shared by the unit tests

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};

/// Something that happened on a mock line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Set(&'static str, bool),
    Delay(u32),
}

/// Ordered record of line activity shared by every mock in a test
#[derive(Debug, Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<Event>>>);

impl Trace {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn sets(&self, name: &str) -> Vec<bool> {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Set(n, level) if *n == name => Some(*level),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[derive(Debug)]
pub struct MockError;

impl digital::Error for MockError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Output line that records every level it is driven to
#[derive(Debug, Clone)]
pub struct MockOutput {
    name: &'static str,
    trace: Trace,
    pub level: Rc<Cell<bool>>,
    pub fail: Rc<Cell<bool>>,
}

impl MockOutput {
    pub fn new(name: &'static str, trace: &Trace, level: bool) -> Self {
        Self {
            name,
            trace: trace.clone(),
            level: Rc::new(Cell::new(level)),
            fail: Rc::new(Cell::new(false)),
        }
    }

    fn drive(&mut self, level: bool) -> Result<(), MockError> {
        if self.fail.get() {
            return Err(MockError);
        }
        self.level.set(level);
        self.trace.push(Event::Set(self.name, level));
        Ok(())
    }
}

impl ErrorType for MockOutput {
    type Error = MockError;
}

impl OutputPin for MockOutput {
    fn set_low(&mut self) -> Result<(), MockError> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), MockError> {
        self.drive(true)
    }
}

/// Input line returning queued bits first, then a settable level
#[derive(Debug, Clone, Default)]
pub struct MockInput {
    pub level: Rc<Cell<bool>>,
    pub bits: Rc<RefCell<VecDeque<bool>>>,
    pub fail: Rc<Cell<bool>>,
    pub samples: Rc<Cell<usize>>,
}

impl MockInput {
    pub fn with_level(level: bool) -> Self {
        let pin = Self::default();
        pin.level.set(level);
        pin
    }

    /// Queue a byte, MSB first
    pub fn queue_byte(&self, byte: u8) {
        let mut bits = self.bits.borrow_mut();
        for bit in (0..8).rev() {
            bits.push_back(byte & (1 << bit) != 0);
        }
    }
}

impl ErrorType for MockInput {
    type Error = MockError;
}

impl InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, MockError> {
        if self.fail.get() {
            return Err(MockError);
        }
        self.samples.set(self.samples.get() + 1);
        Ok(self
            .bits
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.level.get()))
    }

    fn is_low(&mut self) -> Result<bool, MockError> {
        self.is_high().map(|h| !h)
    }
}

/// Delay that records instead of sleeping
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    trace: Trace,
    pub elapsed_ns: Rc<Cell<u64>>,
}

impl MockDelay {
    pub fn new(trace: &Trace) -> Self {
        Self {
            trace: trace.clone(),
            elapsed_ns: Rc::default(),
        }
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + u64::from(ns));
        self.trace.push(Event::Delay(ns));
    }
}
