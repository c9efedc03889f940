//! ## Control
//!
//! Class-specific requests on the control endpoint, used while a channel is
//! being set up.
//!

use std::time::Duration;

use anyhow::Result;
use rusb::{Context, DeviceHandle, Direction, Recipient, RequestType};

use super::types::{Capabilities, Endpoint};
use super::UsbtmcError;
use crate::constants::{control_requests, usbtmc_status};

/// Issue a device-to-host class request addressed to `interface` and return
/// the reply's status byte.
fn interface_request(
    handle: &DeviceHandle<Context>,
    request: u8,
    interface: u8,
    reply: &mut [u8],
    timeout: Duration,
) -> Result<u8> {
    let request_type = rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface);
    handle.read_control(request_type, request, 0, u16::from(interface), reply, timeout)?;
    Ok(reply[0])
}

fn expect_success(status: u8) -> Result<()> {
    if status == usbtmc_status::STATUS_SUCCESS {
        Ok(())
    } else {
        Err(UsbtmcError::StatusUnexpectedFailure(status).into())
    }
}

/// ### Get Capabilities
///
/// GET_CAPABILITIES reply: bcdUSBTMC in bytes 2..4, interface flags in byte 4.
///
pub fn get_capabilities(
    handle: &DeviceHandle<Context>,
    interface: u8,
    timeout: Duration,
) -> Result<Capabilities> {
    let mut reply = [0u8; 24];
    let status = interface_request(
        handle,
        control_requests::GET_CAPABILITIES,
        interface,
        &mut reply,
        timeout,
    )?;
    expect_success(status)?;

    let flags = reply[4];
    Ok(Capabilities {
        bcd_version: u16::from_le_bytes([reply[2], reply[3]]),
        talk_only: flags & 0b0000_0010 != 0,
        listen_only: flags & 0b0000_0001 != 0,
    })
}

/// ### Clear Buffers
///
/// INITIATE_CLEAR, then poll CHECK_CLEAR_STATUS until the device reports it
/// is done.
///
/// **Must only be used while no BULK transfer is in flight.**
///
pub fn clear_buffers(
    handle: &DeviceHandle<Context>,
    interface: u8,
    timeout: Duration,
) -> Result<()> {
    let mut reply = [0u8; 1];
    let status = interface_request(
        handle,
        control_requests::INITIATE_CLEAR,
        interface,
        &mut reply,
        timeout,
    )?;
    expect_success(status)?;

    let mut reply = [0u8; 2];
    loop {
        let status = interface_request(
            handle,
            control_requests::CHECK_CLEAR_STATUS,
            interface,
            &mut reply,
            timeout,
        )?;
        if status != usbtmc_status::STATUS_PENDING {
            return expect_success(status);
        }
        // bmClear bit 0: data still waiting in the Bulk IN FIFO
        if reply[1] & 0b0000_0001 != 0 {
            return Err(UsbtmcError::BulkInFifoNotEmpty.into());
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Clear a halt condition on `endpoint`.
pub fn clear_halt(handle: &DeviceHandle<Context>, endpoint: &Endpoint) -> Result<()> {
    handle.clear_halt(endpoint.address)?;
    Ok(())
}
