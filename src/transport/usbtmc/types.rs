//! ## Types
//!
//! Descriptors and counters kept by an open USBTMC channel.
//!

use rusb::{Direction, TransferType};

/// ### bTag
///
/// Transfer identifier of a DEV_DEP_MSG_OUT header. Starts at 1, counts up
/// with every transaction and skips 0 when it wraps.
///
#[derive(Debug, Clone)]
pub struct BTag(u8);

impl BTag {
    pub fn new() -> BTag {
        BTag(1)
    }

    /// Hand out the current value and advance.
    pub fn next(&mut self) -> u8 {
        let btag = self.0;
        self.0 = self.0.checked_add(1).unwrap_or(1);
        btag
    }
}

/// ### TMC Interface
///
/// Where the USBTMC function lives on the device, and whether its kernel
/// driver was detached to claim it.
///
#[derive(Debug, Clone, Default)]
pub struct TmcInterface {
    /// `bConfigurationValue`, 1-based
    pub configuration: u8,
    pub interface: u8,
    pub alt_setting: u8,
    /// Reattach the kernel driver on release
    pub kernel_driver_detached: bool,
}

#[derive(Clone, Debug)]
pub struct Endpoint {
    pub address: u8,
    pub transfer_type: TransferType,
    pub direction: Direction,
}

impl Endpoint {
    pub fn is_bulk(&self, direction: Direction) -> bool {
        self.transfer_type == TransferType::Bulk && self.direction == direction
    }
}

/// The two bulk endpoints every USBTMC interface has. Commands go out on
/// `bulk_out`; `bulk_in` is only halted-cleared during setup.
#[derive(Clone, Debug)]
pub struct UsbtmcEndpoints {
    pub bulk_out: Endpoint,
    pub bulk_in: Endpoint,
}

/// Reply to GET_CAPABILITIES, reduced to what decides whether commands can be sent.
#[derive(Clone, Debug)]
pub struct Capabilities {
    pub bcd_version: u16,
    pub talk_only: bool,
    pub listen_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn btag_skips_zero_on_wrap() {
        let mut btag = BTag::new();
        assert_eq!(btag.next(), 1);
        for _ in 2..=255 {
            btag.next();
        }
        assert_eq!(btag.next(), 1);
    }

    #[test]
    fn only_bulk_endpoints_in_the_asked_direction_match() {
        let bulk_out = Endpoint {
            address: 0x02,
            transfer_type: TransferType::Bulk,
            direction: Direction::Out,
        };
        assert!(bulk_out.is_bulk(Direction::Out));
        assert!(!bulk_out.is_bulk(Direction::In));

        let interrupt_in = Endpoint {
            address: 0x83,
            transfer_type: TransferType::Interrupt,
            direction: Direction::In,
        };
        assert!(!interrupt_in.is_bulk(Direction::In));
    }
}
