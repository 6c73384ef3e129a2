//! Linux spidev transport
//!
//! This module provides the `LinuxSpi` struct that implements the core
//! `Transport` trait using Linux's spidev interface. The kernel drives chip
//! select for the whole of each `SPI_IOC_MESSAGE`, so every frame is a
//! single full-duplex transfer.

use crate::error::{LinuxSpiError, Result};

use fpgalink_core::config::toml::BoardConfig;
use fpgalink_core::config::{mode_number, LinkConfig, StatusPin};
use fpgalink_core::delay::StdDelay;
use fpgalink_core::link::FpgaLink;
use fpgalink_core::transport::{check_frame, Transport};
use fpgalink_core::Error as CoreError;
use fpgalink_linux_gpio::{
    apply_link_option, open_control_lines, parse_status_option, resolve_device, GpioLine,
};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    // SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(struct spi_ioc_transfer)])

    /// Size of struct spi_ioc_transfer
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        // _IOC(dir, type, nr, size) = ((dir)<<30)|((size)<<16)|((type)<<8)|(nr), _IOC_WRITE = 1
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // __u8 pad
}

/// Round a settle time up to whole microseconds for `delay_usecs`
fn settle_usecs(settle_ns: u32) -> u16 {
    settle_ns.div_ceil(1000).min(u16::MAX as u32) as u16
}

/// Configuration for a spidev link
#[derive(Debug, Clone)]
pub struct LinuxSpiConfig {
    /// spidev path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// GPIO chip carrying the reset and status lines
    pub gpiochip: String,
    /// Reset line offset
    pub reset: u32,
    /// Status line offset, or absent
    pub status: StatusPin,
    /// Link settings
    pub link: LinkConfig,
}

/// Linux spidev transport
pub struct LinuxSpi {
    file: File,
    speed_hz: u32,
    delay_usecs: u16,
}

impl LinuxSpi {
    /// Open a spidev device and apply mode, word size and clock
    pub fn open(device: &str, link: &LinkConfig) -> Result<Self> {
        if device.is_empty() {
            return Err(LinuxSpiError::NoDevice);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|e| LinuxSpiError::OpenFailed {
                path: device.to_string(),
                source: e,
            })?;
        let fd = file.as_raw_fd();

        let mode = mode_number(link.mode);
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode).map_err(|e| LinuxSpiError::SetModeFailed {
                mode,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                LinuxSpiError::SetBitsPerWordFailed {
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        let speed_hz = link.clock_hz;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed_hz).map_err(|e| {
                LinuxSpiError::SetSpeedFailed {
                    speed: speed_hz,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        log::info!(
            "linux_spi: Opened {} at {} Hz, mode {}",
            device,
            speed_hz,
            mode
        );

        Ok(Self {
            file,
            speed_hz,
            delay_usecs: settle_usecs(link.select_settle_ns),
        })
    }

    /// Get current speed setting
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }
}

impl Transport for LinuxSpi {
    fn exchange(&mut self, write: &[u8], read: &mut [u8]) -> fpgalink_core::Result<()> {
        check_frame(write, read)?;

        let transfer = SpiIocTransfer {
            tx_buf: write.as_ptr() as u64,
            rx_buf: read.as_mut_ptr() as u64,
            len: write.len() as u32,
            speed_hz: self.speed_hz,
            delay_usecs: self.delay_usecs,
            bits_per_word: 8,
            ..Default::default()
        };

        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                ioctl::spi_ioc_message(1),
                &transfer as *const SpiIocTransfer,
            )
        };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EBUSY) {
                log::debug!("linux_spi: bus busy");
                return Err(CoreError::BusBusy);
            }
            log::error!("linux_spi: transfer failed: {}", err);
            return Err(CoreError::TransferFailed);
        }
        Ok(())
    }
}

/// Link over spidev with GPIO control lines
pub type LinuxSpiLink = FpgaLink<LinuxSpi, GpioLine, GpioLine, StdDelay>;

/// Open a spidev link
pub fn open(config: &LinuxSpiConfig) -> Result<LinuxSpiLink> {
    let transport = LinuxSpi::open(&config.device, &config.link)?;
    let state = open_control_lines(&config.gpiochip, config.reset, config.status, &config.link)?;
    Ok(FpgaLink::open(&config.link, transport, state))
}

/// Parse `linux_spi` options, starting from an optional board file
///
/// Options override the board. Recognised keys:
///
/// - `dev=/dev/spidevX.Y`
/// - `gpiochip=N` or `gpiodev=/dev/gpiochipN` - where reset and status live
/// - `reset` - line offset
/// - `status=N` or `status=absent`
/// - `spispeed` - clock in kHz
/// - `mode` - SPI mode 0-3
pub fn parse_options(
    options: &[(&str, &str)],
    board: Option<&BoardConfig>,
) -> std::result::Result<LinuxSpiConfig, String> {
    let mut dev = board.and_then(|b| b.spidev.clone());
    let mut gpiodev = None;
    let mut gpiochip = None;
    let mut reset = board.and_then(|b| b.pins.reset);
    let mut status = board.map(|b| b.pins.status);
    let mut link = board.map(|b| b.link).unwrap_or_default();

    for (key, value) in options {
        if apply_link_option(&mut link, key, value)? {
            continue;
        }
        match *key {
            "dev" => dev = Some(value.to_string()),
            "gpiodev" => gpiodev = Some(value.to_string()),
            "gpiochip" => {
                gpiochip = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid gpiochip value: {}", value))?,
                )
            }
            "reset" => {
                reset = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid reset value: {}", value))?,
                )
            }
            "status" => status = Some(parse_status_option(value)?),
            _ => log::warn!("linux_spi: Unknown option: {}={}", key, value),
        }
    }

    let device = dev.ok_or_else(|| {
        "No device specified. Use dev=/dev/spidevX.Y\n\
         e.g. linux_spi:dev=/dev/spidev0.0,gpiochip=0,reset=24,status=25"
            .to_string()
    })?;
    let gpiochip = resolve_device(gpiodev, gpiochip)
        .map_err(|_| "Only one of 'gpiodev' or 'gpiochip' can be specified".to_string())?
        .or_else(|| board.and_then(|b| b.gpiochip.clone()))
        .ok_or_else(|| "Missing required parameter: gpiochip (or gpiodev)".to_string())?;
    let reset = reset.ok_or_else(|| "Missing required parameter: reset".to_string())?;
    let status = status.ok_or_else(|| {
        "Missing required parameter: status (a line offset, or 'absent')".to_string()
    })?;

    Ok(LinuxSpiConfig {
        device,
        gpiochip,
        reset,
        status,
        link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &[(&str, &str)] = &[
        ("dev", "/dev/spidev0.0"),
        ("gpiochip", "0"),
        ("reset", "24"),
        ("status", "25"),
    ];

    #[test]
    fn test_transfer_struct_matches_kernel() {
        assert_eq!(
            std::mem::size_of::<SpiIocTransfer>(),
            ioctl::SPI_IOC_TRANSFER_SIZE
        );
    }

    #[test]
    fn test_spi_ioc_message_number() {
        // SPI_IOC_MESSAGE(1) on Linux is 0x40206b00
        assert_eq!(ioctl::spi_ioc_message(1), 0x4020_6b00);
    }

    #[test]
    fn test_settle_rounds_up() {
        assert_eq!(settle_usecs(0), 0);
        assert_eq!(settle_usecs(1), 1);
        assert_eq!(settle_usecs(1000), 1);
        assert_eq!(settle_usecs(1001), 2);
        assert_eq!(settle_usecs(u32::MAX), u16::MAX);
    }

    #[test]
    fn test_parse_full() {
        let config = parse_options(FULL, None).unwrap();
        assert_eq!(config.device, "/dev/spidev0.0");
        assert_eq!(config.gpiochip, "/dev/gpiochip0");
        assert_eq!(config.reset, 24);
        assert_eq!(config.status, StatusPin::Wired(25));
        assert_eq!(config.link, LinkConfig::default());
    }

    #[test]
    fn test_missing_parameters() {
        for missing in ["dev", "gpiochip", "reset", "status"] {
            let opts: Vec<_> = FULL.iter().copied().filter(|(k, _)| *k != missing).collect();
            assert!(parse_options(&opts, None).is_err(), "{} not required", missing);
        }
    }

    #[test]
    fn test_gpiodev_conflict() {
        let mut opts = FULL.to_vec();
        opts.push(("gpiodev", "/dev/gpiochip1"));
        assert!(parse_options(&opts, None).is_err());
    }

    #[test]
    fn test_board_supplies_devices() {
        let board = BoardConfig::from_toml_str(
            "[board]\nspidev = \"/dev/spidev1.0\"\ngpiochip = \"/dev/gpiochip3\"\n\
             [pins]\nreset = 5\nstatus = 6\n\
             [link]\nclock_hz = 1_000_000\n",
        )
        .unwrap();

        let config = parse_options(&[], Some(&board)).unwrap();
        assert_eq!(config.device, "/dev/spidev1.0");
        assert_eq!(config.gpiochip, "/dev/gpiochip3");
        assert_eq!(config.link.clock_hz, 1_000_000);

        let config = parse_options(&[("spispeed", "250"), ("status", "absent")], Some(&board)).unwrap();
        assert_eq!(config.link.clock_hz, 250_000);
        assert_eq!(config.status, StatusPin::Absent);
    }
}
