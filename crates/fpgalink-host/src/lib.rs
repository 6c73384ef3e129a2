//! Host-side link access
//!
//! This crate sits between the CLI and the backend crates. The CLI asks
//! for a link by backend string and gets back a [`LinkHandle`]; it never
//! sees transports, pins or the generic `FpgaLink` type.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                CLI (bin/fpgalink)            │
//! │  - Only imports fpgalink-host and core types │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │            fpgalink-host (this crate)        │
//! │  - LinkHandle: type-erased open link         │
//! │  - open_link: opens backends by name         │
//! │  - SharedLink: whole-verb locking + watcher  │
//! └──────────────────────────────────────────────┘
//!                        │
//!          ┌─────────────┴─────────────┐
//!          ▼                           ▼
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │    fpgalink-core     │   │    Backend crates    │
//! │  - FpgaLink          │   │  - dummy, linux_gpio │
//! │  - LinkDevice trait  │   │  - linux_spi         │
//! └──────────────────────┘   └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use fpgalink_host::open_link;
//!
//! let mut handle = open_link("dummy:id=0x42", None)?;
//! handle.reset_peripheral()?;
//! assert_eq!(handle.read_id()?, 0x42);
//! ```

mod events;
mod handle;
mod registry;
mod shared;

pub use events::LogSink;
pub use handle::LinkHandle;
pub use registry::{
    available_backends, backend_names_short, open_link, parse_backend_params, BackendInfo,
    BackendParams,
};
pub use shared::{SharedLink, StatusWatcher};

// Re-export core types the CLI needs
pub use fpgalink_core::config::toml::BoardConfig;
pub use fpgalink_core::link::{LinkDevice, LinkEvent, LinkStatus};
pub use fpgalink_core::Error as LinkError;
