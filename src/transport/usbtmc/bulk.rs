//! Bulk
//!
//! Low level functions to write command messages to the BULK OUT endpoint.
//!

use std::time::Duration;

use anyhow::Result;
use rusb::{Context, DeviceHandle, Direction};

use super::types::{BTag, Endpoint};
use super::UsbtmcError;
use crate::constants::{bulk_msg_id, misc};

/// ### Write
///
/// Write data to the BULK OUT endpoint as one or more DEV_DEP_MSG_OUT
/// transactions. Only the last transaction carries the EOM flag.
///
pub fn write(
    handle: &DeviceHandle<Context>,
    btag: &mut BTag,
    data: &[u8],
    bulk_out_endpoint: &Endpoint,
    timeout: Duration,
) -> Result<()> {
    if !bulk_out_endpoint.is_bulk(Direction::Out) {
        return Err(UsbtmcError::IncorrectEndpoint.into());
    }

    let num_transactions = data.len().div_ceil(misc::APPLICATION_BUFFER_SIZE).max(1);

    for transaction_number in 0..num_transactions {
        let start = transaction_number * misc::APPLICATION_BUFFER_SIZE;
        let end = (start + misc::APPLICATION_BUFFER_SIZE).min(data.len());
        let transaction = device_dependent_msg_out(
            btag.next(),
            &data[start..end],
            transaction_number + 1 == num_transactions,
        );

        let written = handle.write_bulk(bulk_out_endpoint.address, &transaction, timeout)?;
        if written != transaction.len() {
            return Err(UsbtmcError::ShortWrite {
                written,
                expected: transaction.len(),
            }
            .into());
        }
    }

    Ok(())
}

/// ### DEV_DEP_MSG_OUT
///
/// Header, payload and alignment padding of one transaction. The transfer size
/// in the header counts the payload only.
///
pub fn device_dependent_msg_out(btag: u8, payload: &[u8], end_of_message: bool) -> Vec<u8> {
    let mut message = Vec::with_capacity(misc::USBTMC_HEADER_SIZE + payload.len() + 3);

    message.push(bulk_msg_id::DEVICE_DEPENDENT_MSG_OUT);
    message.push(btag);
    message.push(!btag);
    message.push(0x00);
    message.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    message.push(if end_of_message { 0b0000_0001 } else { 0x00 });
    message.extend_from_slice(&[0x00; 3]);

    message.extend_from_slice(payload);

    // pad to a multiple of 4 bytes
    let padding = (4 - message.len() % 4) % 4;
    message.resize(message.len() + padding, 0x00);

    message
}
