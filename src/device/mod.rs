//! ## Devices
//!
//! Instrument profiles built on a [`Session`]. A profile owns its session and
//! adds the device's command grammar on top of it.
//!

pub mod yokogawa7651;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::session::Session;

/// Output polarity sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    #[default]
    Plus,
    Minus,
}

impl Polarity {
    pub fn sign(self) -> char {
        match self {
            Polarity::Plus => '+',
            Polarity::Minus => '-',
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sign())
    }
}

impl FromStr for Polarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "+" => Ok(Polarity::Plus),
            "-" => Ok(Polarity::Minus),
            other => Err(Error::InvalidParameter(format!(
                "polarity must be '+' or '-', got '{other}'"
            ))),
        }
    }
}

/// A device-specific command set on top of a session.
pub trait DeviceProfile: Sized {
    /// Model name, used as the default session name.
    const MODEL: &'static str;

    fn session(&self) -> &Session;

    fn session_mut(&mut self) -> &mut Session;

    /// Give the session back, e.g. to close it explicitly.
    fn into_session(self) -> Session;

    /// Release the underlying session.
    fn close(self) -> Result<()> {
        self.into_session().close()
    }
}

/// Format a numeric parameter for the wire.
///
/// Shortest round-trip text of `value`, never in exponent form. Whole numbers
/// carry no decimal point and negative zero is `0`. Callers reject non-finite
/// values before formatting.
pub fn format_value(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_integers_without_decimal_point() {
        assert_eq!(format_value(3.0), "3");
        assert_eq!(format_value(20.0), "20");
        assert_eq!(format_value(-2.5), "-2.5");
    }

    #[test]
    fn keeps_full_resolution() {
        assert_eq!(format_value(1e-7), "0.0000001");
        assert_eq!(format_value(1.234567e-4), "0.0001234567");
        assert_eq!(format_value(-1e-9), "-0.000000001");
        assert_eq!(format_value(-0.0), "0");
    }

    #[test]
    fn parses_polarity() {
        assert_eq!("+".parse::<Polarity>().unwrap(), Polarity::Plus);
        assert_eq!(" - ".parse::<Polarity>().unwrap(), Polarity::Minus);
        assert!(matches!(
            "plus".parse::<Polarity>(),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(Polarity::default().to_string(), "+");
    }
}
