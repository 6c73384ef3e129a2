//! Link lifecycle and the composed link

mod device;
mod events;
mod fpga;
mod state;

pub use device::LinkDevice;
pub use events::{EventSink, LinkEvent, NullSink};
pub use fpga::FpgaLink;
pub use state::{LinkState, LinkStatus, StatusInput};
