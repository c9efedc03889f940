//! ## USBTMC
//!
//! Write-only USBTMC channel over libusb.
//!
//! Connecting claims the USBTMC interface (detaching the kernel driver if one
//! is bound), checks that the device accepts commands, and clears its buffers.
//! Closing hands the interface back to the OS.
//!

mod bulk;
mod control;
mod init;
mod types;

use std::time::Duration;

use anyhow::Result;
use rusb::{Context, DeviceHandle};
use tracing::{debug, warn};

use super::Channel;
use types::{BTag, TmcInterface, UsbtmcEndpoints};

/// USBTMC protocol failures
#[derive(Debug, thiserror::Error)]
pub enum UsbtmcError {
    #[error("device not found")]
    DeviceNotFound,
    #[error("device is not compatible with USBTMC")]
    DeviceIncompatible,
    #[error("device is talk-only and cannot accept commands")]
    TalkOnly,
    #[error("specified interface not found")]
    InterfaceNotFound,
    #[error("specified interface setting not found")]
    InterfaceSettingNotFound,
    #[error("bulk out endpoint not found")]
    BulkOutEndpointNotFound,
    #[error("bulk in endpoint not found")]
    BulkInEndpointNotFound,
    #[error("used incorrect endpoint")]
    IncorrectEndpoint,
    #[error("buffers cannot be cleared because the bulk in FIFO is not empty")]
    BulkInFifoNotEmpty,
    #[error("control request failed with status {0:#04x}")]
    StatusUnexpectedFailure(u8),
    #[error("bulk transfer wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}

/// Selects a USBTMC device by its USB identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbSelector {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Required only when several identical instruments are attached
    pub serial_number: Option<String>,
}

/// ### List Devices
///
/// Resource strings of all attached USBTMC devices.
///
pub fn list_devices() -> Result<Vec<String>> {
    let context = Context::new()?;
    init::list_devices(&context)
}

/// ### UsbtmcChannel
///
/// Channel to a connected USBTMC device.
///
#[derive(Debug)]
pub struct UsbtmcChannel {
    handle: DeviceHandle<Context>,
    tmc: TmcInterface,
    endpoints: UsbtmcEndpoints,
    btag: BTag,
    timeout: Duration,
    terminator: String,
    released: bool,
}

impl UsbtmcChannel {
    /// ### Connect
    ///
    /// Open the first device matching `selector`, claim its USBTMC interface
    /// and clear its buffers. `terminator` is appended to every command.
    ///
    /// Talk-only devices are refused since they cannot take commands.
    ///
    pub fn connect(
        selector: &UsbSelector,
        timeout: Duration,
        terminator: &str,
    ) -> Result<UsbtmcChannel> {
        let context = Context::new()?;
        let (device, mut handle) = init::open_device(&context, selector)?;

        let mut tmc = init::find_tmc_interface(&device)?;
        let endpoints = init::get_endpoints(&tmc, &device)?;
        init::detach_kernel_driver(&mut tmc, &mut handle)?;

        handle.set_active_configuration(tmc.configuration)?;
        handle.claim_interface(tmc.interface)?;
        handle.set_alternate_setting(tmc.interface, tmc.alt_setting)?;

        // claimed: any early return below releases through `Drop`
        let channel = UsbtmcChannel {
            handle,
            tmc,
            endpoints,
            btag: BTag::new(),
            timeout,
            terminator: terminator.to_string(),
            released: false,
        };

        let capabilities =
            control::get_capabilities(&channel.handle, channel.tmc.interface, timeout)?;
        debug!(
            bcd_version = capabilities.bcd_version,
            listen_only = capabilities.listen_only,
            "USBTMC capabilities"
        );
        if capabilities.talk_only {
            return Err(UsbtmcError::TalkOnly.into());
        }

        control::clear_buffers(&channel.handle, channel.tmc.interface, timeout)?;
        control::clear_halt(&channel.handle, &channel.endpoints.bulk_out)?;
        control::clear_halt(&channel.handle, &channel.endpoints.bulk_in)?;

        Ok(channel)
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        self.handle.release_interface(self.tmc.interface)?;
        if self.tmc.kernel_driver_detached {
            self.handle.attach_kernel_driver(self.tmc.interface)?;
        }
        Ok(())
    }
}

impl Channel for UsbtmcChannel {
    fn write(&mut self, command: &str) -> Result<()> {
        let mut data = Vec::with_capacity(command.len() + self.terminator.len());
        data.extend_from_slice(command.as_bytes());
        data.extend_from_slice(self.terminator.as_bytes());

        bulk::write(
            &self.handle,
            &mut self.btag,
            &data,
            &self.endpoints.bulk_out,
            self.timeout,
        )
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.release()
    }
}

impl Drop for UsbtmcChannel {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.release() {
                warn!(%err, "failed to hand the USBTMC interface back to the OS");
            }
        }
    }
}
