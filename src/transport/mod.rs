//! ## Transport
//!
//! The seam between a [`Session`](crate::Session) and the bus. A
//! [`ResourceManager`] turns an address into an open [`Channel`]; the channel
//! accepts command strings until it is closed.
//!
//! [`DefaultResourceManager`] serves USBTMC, serial and Prologix GPIB addresses.
//! [`LoopbackResourceManager`] records commands in memory instead.
//!

pub mod loopback;
pub mod prologix;
pub mod serial;
pub mod usbtmc;

pub use loopback::{LoopbackChannel, LoopbackResourceManager};
pub use prologix::PrologixChannel;
pub use serial::SerialChannel;
pub use usbtmc::{UsbSelector, UsbtmcChannel, UsbtmcError};

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::address::ResourceAddress;
use crate::config::TransportConfig;

/// An open, write-only link to one instrument.
pub trait Channel: Send {
    /// Send one command. The channel appends its own termination, if any.
    fn write(&mut self, command: &str) -> Result<()>;

    /// Release the link and any transport resources.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens channels by address.
pub trait ResourceManager {
    fn open(&self, address: &str) -> Result<Box<dyn Channel>>;
}

/// ### Default Resource Manager
///
/// Resolves VISA-style resource strings to the USBTMC, serial and Prologix
/// transports.
///
#[derive(Debug, Clone, Default)]
pub struct DefaultResourceManager {
    config: TransportConfig,
}

impl DefaultResourceManager {
    pub fn new(config: TransportConfig) -> Self {
        DefaultResourceManager { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// ### List Resources
    ///
    /// Resource strings of the attached USBTMC devices followed by the serial ports.
    ///
    pub fn list_resources(&self) -> Result<Vec<String>> {
        let mut resources = usbtmc::list_devices()?;
        resources.extend(serial::list_ports()?);
        Ok(resources)
    }
}

impl ResourceManager for DefaultResourceManager {
    fn open(&self, address: &str) -> Result<Box<dyn Channel>> {
        let resolved: ResourceAddress = address.parse()?;
        debug!(%resolved, "resolved resource address");

        let timeout = self.config.timeout();
        let channel: Box<dyn Channel> = match resolved {
            ResourceAddress::Usb {
                vendor_id,
                product_id,
                serial_number,
                ..
            } => {
                let selector = UsbSelector {
                    vendor_id,
                    product_id,
                    serial_number,
                };
                Box::new(UsbtmcChannel::connect(
                    &selector,
                    timeout,
                    &self.config.usbtmc.terminator,
                )?)
            }
            ResourceAddress::Serial { port } => {
                Box::new(SerialChannel::open(&port, &self.config.serial, timeout)?)
            }
            ResourceAddress::Gpib {
                board,
                primary,
                secondary,
            } => {
                let controller = self
                    .config
                    .prologix
                    .as_ref()
                    .filter(|controller| controller.board == board)
                    .ok_or_else(|| anyhow!("no GPIB controller configured for board {board}"))?;
                Box::new(PrologixChannel::open(
                    controller, primary, secondary, timeout,
                )?)
            }
        };

        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpib_without_controller_fails_to_open() {
        let manager = DefaultResourceManager::default();
        let err = manager.open("GPIB0::14::INSTR").err().unwrap();
        assert!(err.to_string().contains("no GPIB controller configured"));
    }

    #[test]
    fn gpib_on_other_board_fails_to_open() {
        let mut config = TransportConfig::default();
        config.prologix = Some(crate::config::PrologixConfig::new("/dev/null-prologix"));
        let manager = DefaultResourceManager::new(config);
        let err = manager.open("GPIB2::14::INSTR").err().unwrap();
        assert!(err.to_string().contains("board 2"));
    }

    #[test]
    fn unresolvable_address_fails_to_open() {
        let manager = DefaultResourceManager::default();
        assert!(manager.open("not an address").is_err());
    }
}
