//! ## Constants
//!
//! Protocol codes and configuration defaults.
//!

pub mod usb {
    /// Application-specific interface class
    pub const USBTMC_CLASS_CODE: u8 = 0xFE;
    pub const USBTMC_SUBCLASS_CODE: u8 = 0x03;
}

pub mod usbtmc_status {
    pub const STATUS_SUCCESS: u8 = 0x01;
    /// Split transaction still in progress, poll again
    pub const STATUS_PENDING: u8 = 0x02;
}

pub mod control_requests {
    pub const INITIATE_CLEAR: u8 = 5;
    pub const CHECK_CLEAR_STATUS: u8 = 6;
    pub const GET_CAPABILITIES: u8 = 7;
}

pub mod bulk_msg_id {
    pub const DEVICE_DEPENDENT_MSG_OUT: u8 = 1;
}

pub mod misc {
    /// Per-transfer timeout unless configured otherwise
    pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
    /// Bulk header preceding every DEV_DEP_MSG_OUT payload
    pub const USBTMC_HEADER_SIZE: usize = 12;
    /// Largest payload sent in a single DEV_DEP_MSG_OUT transaction
    pub const APPLICATION_BUFFER_SIZE: usize = 1024 * 8;
}

pub mod serial {
    /// Default baud rate for a plain serial link
    pub const DEFAULT_BAUD_RATE: u32 = 9600;
    /// Default terminator appended to commands on a plain serial link
    pub const DEFAULT_TERMINATOR: &str = "\r\n";
    /// Baud rate of the Prologix GPIB-USB virtual serial port
    pub const PROLOGIX_BAUD_RATE: u32 = 115_200;
    /// Prologix `++eos` setting: append CR+LF to every command
    pub const PROLOGIX_DEFAULT_EOS: u8 = 0;
}

pub mod config {
    /// Configuration file looked up by [`crate::Config::load`]
    pub const DEFAULT_CONFIG_FILE: &str = "yoko7651.toml";
    /// Prefix of environment variables overriding the configuration
    pub const ENV_PREFIX: &str = "YOKO7651_";
}
