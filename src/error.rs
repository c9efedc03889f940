//! ## Errors
//!
//! The errors used throughout the crate.
//!
//! Transports report failures as [`anyhow::Error`]; the session wraps them in
//! [`Error::Connection`] without translating the cause, so the full chain is
//! still available to the caller.
//!

/// Result alias for the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport failed to open, write or close a channel.
    #[error("connection error on {address}")]
    Connection {
        address: String,
        #[source]
        source: anyhow::Error,
    },
    /// A range, ordering or sweep parameter is outside its enumerated domain.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A limit is outside the instrument-safe bounds.
    #[error("{name} = {value} is out of range, expected {bounds}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        bounds: &'static str,
    },
    /// The session was used after it was closed.
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl Error {
    pub(crate) fn connection(address: &str, source: anyhow::Error) -> Error {
        Error::Connection {
            address: address.to_string(),
            source,
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
