//! ## Serial
//!
//! Channel over a plain serial port (`ASRL` resources).
//!

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use serialport::SerialPort;
use tracing::trace;

use super::Channel;
use crate::config::SerialConfig;

/// Serial ports as resource strings.
pub fn list_ports() -> Result<Vec<String>> {
    Ok(serialport::available_ports()
        .context("failed to enumerate serial ports")?
        .into_iter()
        .map(|port| format!("ASRL{}::INSTR", port.port_name))
        .collect())
}

/// Open `port_name` with eight data bits, no parity, one stop bit and no flow control.
pub(crate) fn open_port(
    port_name: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>> {
    serialport::new(port_name, baud_rate)
        .timeout(timeout)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .open()
        .with_context(|| format!("failed to open serial port '{port_name}'"))
}

/// Write-only channel on a serial port.
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    port_name: String,
    terminator: String,
}

impl SerialChannel {
    pub fn open(port_name: &str, config: &SerialConfig, timeout: Duration) -> Result<Self> {
        let port = open_port(port_name, config.baud_rate, timeout)?;
        Ok(SerialChannel {
            port,
            port_name: port_name.to_string(),
            terminator: config.terminator.clone(),
        })
    }
}

impl Channel for SerialChannel {
    fn write(&mut self, command: &str) -> Result<()> {
        let message = format!("{command}{}", self.terminator);
        trace!(port = %self.port_name, message = %message.escape_default(), "serial write");
        self.port
            .write_all(message.as_bytes())
            .with_context(|| format!("failed to write to '{}'", self.port_name))?;
        self.port.flush()?;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.port
            .flush()
            .with_context(|| format!("failed to flush '{}'", self.port_name))
    }
}
