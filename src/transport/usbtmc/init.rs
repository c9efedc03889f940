//! ## Initialization
//!
//! Descriptor walks and kernel-driver handling done before a USBTMC channel
//! accepts commands.
//!

use anyhow::Result;
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, Direction, UsbContext};
use tracing::{debug, warn};

use super::types::{Endpoint, TmcInterface, UsbtmcEndpoints};
use super::{UsbSelector, UsbtmcError};
use crate::constants::usb::*;

fn is_usbtmc_interface(class: u8, sub_class: u8) -> bool {
    class == USBTMC_CLASS_CODE && sub_class == USBTMC_SUBCLASS_CODE
}

fn tmc_interface<T: UsbContext>(
    device: &Device<T>,
    device_desc: &DeviceDescriptor,
) -> Option<TmcInterface> {
    (0..device_desc.num_configurations())
        .filter_map(|index| device.config_descriptor(index).ok())
        .find_map(|config_desc| {
            config_desc
                .interfaces()
                .flat_map(|interface| interface.descriptors())
                .find(|interface_desc| {
                    is_usbtmc_interface(
                        interface_desc.class_code(),
                        interface_desc.sub_class_code(),
                    )
                })
                .map(|interface_desc| TmcInterface {
                    configuration: config_desc.number(),
                    interface: interface_desc.interface_number(),
                    alt_setting: interface_desc.setting_number(),
                    kernel_driver_detached: false,
                })
        })
}

fn is_tmc_device<T: UsbContext>(device: &Device<T>, device_desc: &DeviceDescriptor) -> bool {
    tmc_interface(device, device_desc).is_some()
}

fn serial_number<T: UsbContext>(
    handle: &DeviceHandle<T>,
    device_desc: &DeviceDescriptor,
) -> Option<String> {
    handle.read_serial_number_string_ascii(device_desc).ok()
}

/// ### List Devices
///
/// Resource strings for all TMC devices visible to a libusb context.
///
pub fn list_devices<T: UsbContext>(context: &T) -> Result<Vec<String>> {
    Ok(context
        .devices()?
        .iter()
        .filter_map(|device| {
            let device_desc = device.device_descriptor().ok()?;
            if !is_tmc_device(&device, &device_desc) {
                return None;
            }
            let serial = device
                .open()
                .ok()
                .and_then(|handle| serial_number(&handle, &device_desc));
            let mut resource = format!(
                "USB0::0x{:04X}::0x{:04X}",
                device_desc.vendor_id(),
                device_desc.product_id()
            );
            if let Some(serial) = serial {
                resource.push_str("::");
                resource.push_str(&serial);
            }
            resource.push_str("::INSTR");
            Some(resource)
        })
        .collect())
}

/// ### Open Device
///
/// Open the first TMC device matching the selector.
///
pub fn open_device<T: UsbContext>(
    context: &T,
    selector: &UsbSelector,
) -> Result<(Device<T>, DeviceHandle<T>)> {
    for device in context.devices()?.iter() {
        let Ok(device_desc) = device.device_descriptor() else {
            continue;
        };
        if device_desc.vendor_id() != selector.vendor_id
            || device_desc.product_id() != selector.product_id
            || !is_tmc_device(&device, &device_desc)
        {
            continue;
        }

        let handle = match device.open() {
            Ok(handle) => handle,
            Err(err) => {
                warn!(bus = device.bus_number(), address = device.address(), %err, "cannot open matching USB device");
                continue;
            }
        };

        if let Some(wanted) = &selector.serial_number {
            if serial_number(&handle, &device_desc).as_deref() != Some(wanted.as_str()) {
                continue;
            }
        }

        debug!(
            bus = device.bus_number(),
            address = device.address(),
            "opened USBTMC device"
        );
        return Ok((device, handle));
    }

    Err(UsbtmcError::DeviceNotFound.into())
}

/// ### Find TMC Interface
///
/// First configuration, interface and alternate setting that carries the
/// USBTMC class.
///
pub fn find_tmc_interface<T: UsbContext>(device: &Device<T>) -> Result<TmcInterface> {
    let device_desc = device.device_descriptor()?;
    tmc_interface(device, &device_desc).ok_or_else(|| UsbtmcError::DeviceIncompatible.into())
}

/// Detach a bound kernel driver and remember to reattach it on release.
pub fn detach_kernel_driver(
    tmc: &mut TmcInterface,
    handle: &mut DeviceHandle<Context>,
) -> Result<()> {
    tmc.kernel_driver_detached = match handle.kernel_driver_active(tmc.interface) {
        Ok(true) => {
            handle.detach_kernel_driver(tmc.interface)?;
            true
        }
        _ => false,
    };

    Ok(())
}

/// ### Get Endpoints
///
/// Find the bulk endpoints of the USBTMC interface setting.
///
pub fn get_endpoints(tmc: &TmcInterface, device: &Device<Context>) -> Result<UsbtmcEndpoints> {
    // configuration values are 1-based, descriptor indices are not
    let config_desc = device.config_descriptor(tmc.configuration.saturating_sub(1))?;
    let interface = config_desc
        .interfaces()
        .find(|inter| inter.number() == tmc.interface)
        .ok_or(UsbtmcError::InterfaceNotFound)?;
    let interface_desc = interface
        .descriptors()
        .find(|d| d.setting_number() == tmc.alt_setting)
        .ok_or(UsbtmcError::InterfaceSettingNotFound)?;

    let endpoints: Vec<Endpoint> = interface_desc
        .endpoint_descriptors()
        .map(|endpoint| Endpoint {
            address: endpoint.address(),
            transfer_type: endpoint.transfer_type(),
            direction: endpoint.direction(),
        })
        .collect();

    let bulk_out = endpoints
        .iter()
        .find(|ep| ep.is_bulk(Direction::Out))
        .cloned()
        .ok_or(UsbtmcError::BulkOutEndpointNotFound)?;
    let bulk_in = endpoints
        .iter()
        .find(|ep| ep.is_bulk(Direction::In))
        .cloned()
        .ok_or(UsbtmcError::BulkInEndpointNotFound)?;

    Ok(UsbtmcEndpoints {
        bulk_out,
        bulk_in,
    })
}
