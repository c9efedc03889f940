//! ## Resource Addresses
//!
//! Parsing of VISA-style resource strings into the transport that serves them.
//!
//! Supported forms (interface prefix is case-insensitive, `::INSTR` is optional):
//! - `USB[board]::<vid>::<pid>[::<serial>]::INSTR`
//! - `ASRL<n>::INSTR` or `ASRL<path>::INSTR`
//! - `GPIB[board]::<primary>[::<secondary>]::INSTR`
//!

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

/// Highest primary or secondary GPIB address.
const GPIB_MAX_ADDRESS: u8 = 30;

/// A resolved instrument address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAddress {
    /// USBTMC device selected by its USB identifiers.
    Usb {
        board: u16,
        vendor_id: u16,
        product_id: u16,
        serial_number: Option<String>,
    },
    /// Plain serial port, by OS path.
    Serial { port: String },
    /// GPIB device behind a controller on the given board.
    Gpib {
        board: u16,
        primary: u8,
        secondary: Option<u8>,
    },
}

impl FromStr for ResourceAddress {
    type Err = anyhow::Error;

    fn from_str(resource: &str) -> Result<Self> {
        let mut parts: Vec<&str> = resource.trim().split("::").collect();
        if parts
            .last()
            .is_some_and(|last| last.eq_ignore_ascii_case("INSTR"))
        {
            parts.pop();
        }

        let head = parts
            .first()
            .copied()
            .filter(|head| !head.is_empty())
            .ok_or_else(|| anyhow!("empty resource string"))?;
        let fields = &parts[1..];
        let upper = head.to_ascii_uppercase();

        if let Some(board) = upper.strip_prefix("USB") {
            parse_usb(board, fields).with_context(|| format!("invalid USB resource '{resource}'"))
        } else if upper.starts_with("ASRL") {
            // keep the original case of the path
            parse_serial(&head[4..], fields)
                .with_context(|| format!("invalid serial resource '{resource}'"))
        } else if let Some(board) = upper.strip_prefix("GPIB") {
            parse_gpib(board, fields).with_context(|| format!("invalid GPIB resource '{resource}'"))
        } else {
            bail!("unsupported interface in resource '{resource}'")
        }
    }
}

fn parse_board(board: &str) -> Result<u16> {
    if board.is_empty() {
        return Ok(0);
    }
    board
        .parse()
        .with_context(|| format!("bad board number '{board}'"))
}

fn parse_usb_id(field: &str) -> Result<u16> {
    let parsed = match field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => field.parse(),
    };
    parsed.with_context(|| format!("bad USB identifier '{field}'"))
}

fn parse_usb(board: &str, fields: &[&str]) -> Result<ResourceAddress> {
    let (vendor, product, serial_number) = match fields {
        [vendor, product] => (vendor, product, None),
        [vendor, product, serial] => (vendor, product, Some(serial.to_string())),
        _ => bail!("expected vendor id, product id and an optional serial number"),
    };

    Ok(ResourceAddress::Usb {
        board: parse_board(board)?,
        vendor_id: parse_usb_id(vendor)?,
        product_id: parse_usb_id(product)?,
        serial_number,
    })
}

fn parse_serial(port: &str, fields: &[&str]) -> Result<ResourceAddress> {
    if !fields.is_empty() {
        bail!("unexpected fields after the port");
    }
    if port.is_empty() {
        bail!("missing port");
    }

    let port = match port.parse::<u16>() {
        Ok(0) => bail!("serial port numbers start at 1"),
        Ok(n) if cfg!(windows) => format!("COM{n}"),
        Ok(n) => format!("/dev/ttyS{}", n - 1),
        Err(_) => port.to_string(),
    };

    Ok(ResourceAddress::Serial { port })
}

fn parse_gpib_address(field: &str) -> Result<u8> {
    let address: u8 = field
        .parse()
        .with_context(|| format!("bad GPIB address '{field}'"))?;
    if address > GPIB_MAX_ADDRESS {
        bail!("GPIB address {address} is above {GPIB_MAX_ADDRESS}");
    }
    Ok(address)
}

fn parse_gpib(board: &str, fields: &[&str]) -> Result<ResourceAddress> {
    let (primary, secondary) = match fields {
        [primary] => (parse_gpib_address(primary)?, None),
        [primary, secondary] => (
            parse_gpib_address(primary)?,
            Some(parse_gpib_address(secondary)?),
        ),
        _ => bail!("expected a primary and an optional secondary address"),
    };

    Ok(ResourceAddress::Gpib {
        board: parse_board(board)?,
        primary,
        secondary,
    })
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceAddress::Usb {
                board,
                vendor_id,
                product_id,
                serial_number,
            } => {
                write!(f, "USB{board}::0x{vendor_id:04X}::0x{product_id:04X}")?;
                if let Some(serial) = serial_number {
                    write!(f, "::{serial}")?;
                }
                write!(f, "::INSTR")
            }
            ResourceAddress::Serial { port } => write!(f, "ASRL{port}::INSTR"),
            ResourceAddress::Gpib {
                board,
                primary,
                secondary,
            } => {
                write!(f, "GPIB{board}::{primary}")?;
                if let Some(secondary) = secondary {
                    write!(f, "::{secondary}")?;
                }
                write!(f, "::INSTR")
            }
        }
    }
}
