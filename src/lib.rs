//! # Rust Yokogawa 7651
//!
//! Driver for the Yokogawa 7651 programmable DC source.
//!
//! A [`Session`] owns one channel to one instrument, opened through a
//! [`ResourceManager`] from a VISA-style resource string. [`Yokogawa7651`]
//! sits on a session and turns typed operations into the instrument's ASCII
//! commands. Every command is fire-and-forget: nothing is read back, and the
//! driver keeps no copy of the output state.
//!
//! Supported resources:
//! - `USB0::<vid>::<pid>[::<serial>]::INSTR` over USBTMC
//! - `ASRL<port>::INSTR` over a serial port
//! - `GPIB0::<address>::INSTR` through a Prologix GPIB-USB controller
//!
//! ## Example
//!
//! Voltage mode on the 10 V range with a 20 mA current limit, 3 V out for ten seconds.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use rs_yokogawa7651::{
//!     Config, DefaultResourceManager, DeviceProfile, Polarity, Yokogawa7651,
//! };
//!
//! fn main() -> rs_yokogawa7651::Result<()> {
//!     let config = Config::load()?;
//!     let manager = DefaultResourceManager::new(config.transport);
//!
//!     let mut source = Yokogawa7651::open(&manager, "GPIB0::14::INSTR")?;
//!     source.set_voltage_function(10000, Some(20.0))?;
//!     source.set_output_value(3.0, Polarity::Plus)?;
//!     source.set_output_state(true)?;
//!     std::thread::sleep(Duration::from_secs(10));
//!     source.set_output_state(false)?;
//!     source.close()
//! }
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` records (session open/close, every command sent)
//! and never prints; install a subscriber to see them.
//!

mod address;
mod config;
mod constants;
mod device;
mod error;
mod session;
pub mod transport;

pub use address::ResourceAddress;
pub use config::{Config, PrologixConfig, SerialConfig, TransportConfig, UsbtmcConfig};
pub use device::yokogawa7651::{
    Command, CurrentRange, SweepReport, VoltageRange, VoltageSweep, Yokogawa7651,
    CURRENT_LIMIT_MAX, CURRENT_LIMIT_MIN, VOLTAGE_LIMIT_MAX,
};
pub use device::{format_value, DeviceProfile, Polarity};
pub use error::{Error, Result};
pub use session::Session;
pub use transport::{
    Channel, DefaultResourceManager, LoopbackResourceManager, ResourceManager,
};
