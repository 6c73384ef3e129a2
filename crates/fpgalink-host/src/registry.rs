//! Backend registry and link opening
//!
//! This module opens links by backend string and wraps them in
//! [`LinkHandle`]s. Every backend gets a [`LogSink`] so lifecycle events end
//! up in the log without the CLI wiring anything.

use std::collections::HashMap;

use fpgalink_core::config::toml::BoardConfig;

use crate::handle::LinkHandle;
#[allow(unused_imports)] // Used in feature-gated code
use crate::events::LogSink;

/// Parsed backend parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendParams {
    /// Backend name as given
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl BackendParams {
    /// Parameters as the borrowed pairs backend crates take
    pub fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a backend string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
///
/// # Example
/// ```ignore
/// let params = parse_backend_params("linux_spi:dev=/dev/spidev0.0")?;
/// assert_eq!(params.name, "linux_spi");
/// assert_eq!(params.params.get("dev"), Some(&"/dev/spidev0.0".to_string()));
/// ```
pub fn parse_backend_params(s: &str) -> Result<BackendParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));
    if name.is_empty() {
        return Err("Empty backend name".into());
    }

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.trim().to_string(), value.trim().to_string());
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(BackendParams {
        name: name.to_string(),
        params,
    })
}

/// Open a link and wrap it in a LinkHandle
///
/// The returned link has not been reset yet; its status is
/// `Unconfigured` until the caller runs a reset.
///
/// # Arguments
/// * `backend` - Backend specification (e.g., "dummy" or "linux_spi:dev=/dev/spidev0.0,...")
/// * `board` - Optional board file whose settings the backend options override
///
/// # Example
/// ```ignore
/// let mut handle = open_link("dummy", None)?;
/// handle.reset_peripheral()?;
/// println!("ID: {:#04x}", handle.read_id()?);
/// ```
#[allow(unused_variables)]
pub fn open_link(
    backend: &str,
    board: Option<&BoardConfig>,
) -> Result<LinkHandle, Box<dyn std::error::Error>> {
    let params = parse_backend_params(backend)?;

    if let Some(name) = board.and_then(|b| b.name.as_deref()) {
        log::info!("Using board: {}", name);
    }

    match params.name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params, board),

        #[cfg(feature = "linux-gpio")]
        "linux_gpio" | "linux-gpio" | "gpio" => open_linux_gpio(&params, board),

        #[cfg(feature = "linux-spi")]
        "linux_spi" | "linux-spi" | "spidev" => open_linux_spi(&params, board),

        _ => Err(format!(
            "Unknown backend: {} (available: {})",
            params.name,
            backend_names_short()
        )
        .into()),
    }
}

#[cfg(feature = "dummy")]
fn open_dummy(
    params: &BackendParams,
    board: Option<&BoardConfig>,
) -> Result<LinkHandle, Box<dyn std::error::Error>> {
    use fpgalink_core::config::StatusPin;
    use fpgalink_dummy::{parse_options, DummyFpga};

    log::info!("Opening dummy peripheral...");

    let mut config =
        parse_options(&params.options()).map_err(|e| format!("Invalid dummy parameters: {}", e))?;
    // An explicit status= option wins over the board file
    if let Some(board) = board {
        if !params.params.contains_key("status") && board.pins.status == StatusPin::Absent {
            config.status_line = false;
        }
    }
    let link_config = board.map(|b| b.link).unwrap_or_default();
    let link = DummyFpga::new(config).link(&link_config)?.with_sink(LogSink);

    Ok(LinkHandle::new(Box::new(link), "dummy"))
}

#[cfg(feature = "linux-gpio")]
fn open_linux_gpio(
    params: &BackendParams,
    board: Option<&BoardConfig>,
) -> Result<LinkHandle, Box<dyn std::error::Error>> {
    log::info!("Opening Linux GPIO link...");

    let device =
        fpgalink_linux_gpio::open_linux_gpio(&params.options(), board, LogSink).map_err(|e| {
            format!(
                "Failed to open linux_gpio link: {}\n\
                 Make sure the gpiochip exists and you have read/write permissions.",
                e
            )
        })?;

    Ok(LinkHandle::new(device, "linux_gpio"))
}

#[cfg(feature = "linux-spi")]
fn open_linux_spi(
    params: &BackendParams,
    board: Option<&BoardConfig>,
) -> Result<LinkHandle, Box<dyn std::error::Error>> {
    log::info!("Opening Linux SPI link...");

    let device =
        fpgalink_linux_spi::open_linux_spi(&params.options(), board, LogSink).map_err(|e| {
            format!(
                "Failed to open linux_spi link: {}\n\
                 Make sure the device exists and you have read/write permissions.\n\
                 You may need to: sudo usermod -aG spi $USER",
                e
            )
        })?;

    Ok(LinkHandle::new(device, "linux_spi"))
}

// Backend information and listing
/// Information about a backend
#[derive(Debug, Clone, Copy)]
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory FPGA emulator (id=<byte>,bitstream=<yes|no>,load_ms=<n>,status=<wired|absent>)",
    });

    #[cfg(feature = "linux-gpio")]
    backends.push(BackendInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpio"],
        description: "Bit-banged link over GPIO lines (gpiochip=N,cs,sck,mosi,miso,reset,status)",
    });

    #[cfg(feature = "linux-spi")]
    backends.push(BackendInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        description: "Linux spidev with GPIO reset/status (dev=/dev/spidevX.Y,gpiochip=N,reset,status)",
    });

    backends
}

/// Generate a short list of backend names for CLI help
pub fn backend_names_short() -> String {
    let backends = available_backends();
    if backends.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = backends.iter().map(|b| b.name).collect();
    names.join(", ")
}
