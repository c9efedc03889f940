//! ## Prologix GPIB
//!
//! GPIB access through a Prologix GPIB-USB controller. The controller shows up
//! as a serial port; lines starting with `++` configure it, everything else is
//! forwarded to the addressed instrument.
//!

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use serialport::SerialPort;
use tracing::{debug, trace};

use super::serial::open_port;
use super::Channel;
use crate::config::PrologixConfig;

const ESC: u8 = 0x1B;

/// Secondary GPIB addresses are sent to the controller offset by 96.
const SECONDARY_OFFSET: u8 = 96;

/// ### Escape
///
/// Prefix CR, LF, ESC and `+` with ESC so the controller forwards them
/// instead of treating them as terminators or controller commands, then
/// append the LF that ends the line.
///
pub fn escape(command: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(command.len() + 4);
    for byte in command.bytes() {
        if matches!(byte, b'\r' | b'\n' | ESC | b'+') {
            line.push(ESC);
        }
        line.push(byte);
    }
    line.push(b'\n');
    line
}

/// Controller commands that select `primary`/`secondary` as the listener.
pub fn setup_commands(primary: u8, secondary: Option<u8>, eos: u8) -> Vec<String> {
    let addr = match secondary {
        Some(secondary) => format!("++addr {primary} {}", secondary + SECONDARY_OFFSET),
        None => format!("++addr {primary}"),
    };
    vec![
        "++mode 1".to_string(),
        addr,
        "++auto 0".to_string(),
        "++eoi 1".to_string(),
        format!("++eos {eos}"),
    ]
}

/// Write-only channel to one GPIB instrument behind a Prologix controller.
pub struct PrologixChannel {
    port: Box<dyn SerialPort>,
    port_name: String,
}

impl PrologixChannel {
    pub fn open(
        controller: &PrologixConfig,
        primary: u8,
        secondary: Option<u8>,
        timeout: Duration,
    ) -> Result<Self> {
        let port = open_port(&controller.port, controller.baud_rate, timeout)?;
        let mut channel = PrologixChannel {
            port,
            port_name: controller.port.clone(),
        };

        for command in setup_commands(primary, secondary, controller.eos) {
            channel.controller_command(&command)?;
        }
        debug!(port = %channel.port_name, primary, ?secondary, "GPIB device addressed");

        Ok(channel)
    }

    fn send_line(&mut self, line: &[u8]) -> Result<()> {
        self.port
            .write_all(line)
            .with_context(|| format!("failed to write to Prologix controller '{}'", self.port_name))?;
        self.port.flush()?;
        Ok(())
    }

    fn controller_command(&mut self, command: &str) -> Result<()> {
        trace!(port = %self.port_name, command, "Prologix controller command");
        self.send_line(format!("{command}\n").as_bytes())
    }
}

impl Channel for PrologixChannel {
    fn write(&mut self, command: &str) -> Result<()> {
        let line = escape(command);
        self.send_line(&line)
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        // return the instrument to front-panel control
        self.controller_command("++loc")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_plus_sign_in_output_command() {
        assert_eq!(escape("S+3E"), b"S\x1B+3E\n".to_vec());
    }

    #[test]
    fn plain_command_only_gets_line_feed() {
        assert_eq!(escape("F1R5E"), b"F1R5E\n".to_vec());
    }

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape("A\r\n\x1B"), b"A\x1B\r\x1B\n\x1B\x1B\n".to_vec());
    }

    #[test]
    fn setup_addresses_primary_and_secondary() {
        let commands = setup_commands(14, None, 0);
        assert_eq!(
            commands,
            vec!["++mode 1", "++addr 14", "++auto 0", "++eoi 1", "++eos 0"]
        );

        let commands = setup_commands(5, Some(2), 3);
        assert_eq!(commands[1], "++addr 5 98");
        assert_eq!(commands[4], "++eos 3");
    }
}
