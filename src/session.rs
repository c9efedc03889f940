//! ## Session
//!
//! Owns the one channel to one addressed instrument, from open to close.
//!

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transport::{Channel, ResourceManager};

/// ### Session
///
/// A named, open channel to one instrument.
///
/// The channel is acquired by [`Session::open`] and released by
/// [`Session::close`]. Once closed, every further write or close fails with
/// [`Error::InvalidState`] without touching the transport. A session dropped
/// while still open releases its channel on a best-effort basis.
///
pub struct Session {
    name: String,
    address: String,
    channel: Option<Box<dyn Channel>>,
}

impl Session {
    /// ### Open
    ///
    /// Acquire a channel to `address` through `resource_manager`.
    ///
    /// #### Arguments
    /// - `resource_manager` -> the transport that resolves the address
    /// - `name` -> human-readable name, used in logs and [`Display`](fmt::Display)
    /// - `address` -> resource string, e.g. `GPIB0::14::INSTR`
    ///
    pub fn open(
        resource_manager: &dyn ResourceManager,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<Session> {
        let name = name.into();
        let address = address.into();

        debug!(session = %name, %address, "opening session");
        let channel = resource_manager
            .open(&address)
            .map_err(|source| Error::connection(&address, source))?;
        info!(session = %name, %address, "session opened");

        Ok(Session {
            name,
            address,
            channel: Some(channel),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// ### Write
    ///
    /// Send one command verbatim. Nothing is read back.
    ///
    pub fn write(&mut self, command: &str) -> Result<()> {
        let channel = self.channel.as_mut().ok_or_else(|| {
            Error::InvalidState(format!(
                "cannot write '{command}': session '{}' is closed",
                self.name
            ))
        })?;

        debug!(session = %self.name, command, "sending command");
        channel
            .write(command)
            .map_err(|source| Error::connection(&self.address, source))
    }

    /// ### Close
    ///
    /// Release the channel. Closing twice is an error.
    ///
    pub fn close(&mut self) -> Result<()> {
        let channel = self.channel.take().ok_or_else(|| {
            Error::InvalidState(format!("session '{}' is already closed", self.name))
        })?;

        channel
            .close()
            .map_err(|source| Error::connection(&self.address, source))?;
        info!(session = %self.name, address = %self.address, "session closed");
        Ok(())
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Instrument {}\navailable at address: {}",
            self.name, self.address
        )
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            match channel.close() {
                Ok(()) => info!(session = %self.name, address = %self.address, "session closed on drop"),
                Err(err) => warn!(session = %self.name, address = %self.address, err = %format!("{err:#}"), "failed to close session on drop"),
            }
        }
    }
}
