//! ## Yokogawa 7651
//!
//! Command set of the Yokogawa 7651 programmable DC source.
//!
//! Every operation formats one command of the instrument's ASCII grammar and
//! writes it through the session; nothing is read back and no output state is
//! cached. Limits are validated before anything is sent. Output values are
//! not: the instrument enforces its own range and limit on them.
//!
//! **Read the instrument's manual before driving real hardware; wrong ranges
//! or limits can damage the device under test.**
//!

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::info;

use super::{format_value, DeviceProfile, Polarity};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::transport::ResourceManager;

/// Largest settable voltage limit, in volts. The lower bound is exclusive zero.
pub const VOLTAGE_LIMIT_MAX: f64 = 30.0;
/// Smallest settable current limit, in milliamps.
pub const CURRENT_LIMIT_MIN: f64 = 5.0;
/// Largest settable current limit, in milliamps.
pub const CURRENT_LIMIT_MAX: f64 = 120.0;

/// Voltage source ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VoltageRange {
    Mv10,
    Mv100,
    V1,
    V10,
    V30,
}

impl VoltageRange {
    /// All ranges, smallest first.
    pub const ALL: [VoltageRange; 5] = [
        VoltageRange::Mv10,
        VoltageRange::Mv100,
        VoltageRange::V1,
        VoltageRange::V10,
        VoltageRange::V30,
    ];

    pub fn millivolts(self) -> u32 {
        match self {
            VoltageRange::Mv10 => 10,
            VoltageRange::Mv100 => 100,
            VoltageRange::V1 => 1000,
            VoltageRange::V10 => 10000,
            VoltageRange::V30 => 30000,
        }
    }

    /// Vendor range token.
    pub fn code(self) -> &'static str {
        match self {
            VoltageRange::Mv10 => "R2",
            VoltageRange::Mv100 => "R3",
            VoltageRange::V1 => "R4",
            VoltageRange::V10 => "R5",
            VoltageRange::V30 => "R6",
        }
    }
}

impl TryFrom<u32> for VoltageRange {
    type Error = Error;

    fn try_from(millivolts: u32) -> Result<Self> {
        VoltageRange::ALL
            .into_iter()
            .find(|range| range.millivolts() == millivolts)
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "voltage range {millivolts} mV is not one of 10, 100, 1000, 10000, 30000 mV"
                ))
            })
    }
}

impl fmt::Display for VoltageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mV", self.millivolts())
    }
}

/// Current source ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CurrentRange {
    Ma1,
    Ma10,
    Ma100,
}

impl CurrentRange {
    /// All ranges, smallest first.
    pub const ALL: [CurrentRange; 3] = [CurrentRange::Ma1, CurrentRange::Ma10, CurrentRange::Ma100];

    pub fn milliamps(self) -> u32 {
        match self {
            CurrentRange::Ma1 => 1,
            CurrentRange::Ma10 => 10,
            CurrentRange::Ma100 => 100,
        }
    }

    /// Vendor range token.
    pub fn code(self) -> &'static str {
        match self {
            CurrentRange::Ma1 => "R4",
            CurrentRange::Ma10 => "R5",
            CurrentRange::Ma100 => "R6",
        }
    }
}

impl TryFrom<u32> for CurrentRange {
    type Error = Error;

    fn try_from(milliamps: u32) -> Result<Self> {
        CurrentRange::ALL
            .into_iter()
            .find(|range| range.milliamps() == milliamps)
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "current range {milliamps} mA is not one of 1, 10, 100 mA"
                ))
            })
    }
}

impl fmt::Display for CurrentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mA", self.milliamps())
    }
}

/// One instrument command. `Display` gives the exact wire string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Reset all settings to their defaults
    Initialize,
    VoltageFunction(VoltageRange),
    CurrentFunction(CurrentRange),
    /// Volts
    VoltageLimit(f64),
    /// Milliamps
    CurrentLimit(f64),
    OutputValue { polarity: Polarity, value: f64 },
    OutputState(bool),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Initialize => write!(f, "RC"),
            Command::VoltageFunction(range) => write!(f, "F1{}E", range.code()),
            Command::CurrentFunction(range) => write!(f, "F5{}E", range.code()),
            Command::VoltageLimit(volts) => write!(f, "LV{}", format_value(*volts)),
            Command::CurrentLimit(milliamps) => write!(f, "LA{}", format_value(*milliamps)),
            Command::OutputValue { polarity, value } => {
                write!(f, "S{}{}E", polarity, format_value(*value))
            }
            Command::OutputState(on) => write!(f, "O{}E", u8::from(*on)),
        }
    }
}

fn check_voltage_limit(volts: f64) -> Result<()> {
    if volts > 0.0 && volts <= VOLTAGE_LIMIT_MAX {
        Ok(())
    } else {
        Err(Error::OutOfRange {
            name: "voltage limit",
            value: volts,
            bounds: "0 < V <= 30 V",
        })
    }
}

fn check_current_limit(milliamps: f64) -> Result<()> {
    if (CURRENT_LIMIT_MIN..=CURRENT_LIMIT_MAX).contains(&milliamps) {
        Ok(())
    } else {
        Err(Error::OutOfRange {
            name: "current limit",
            value: milliamps,
            bounds: "5 mA <= I <= 120 mA",
        })
    }
}

/// Digits after the decimal point in the shortest text of `value`.
fn decimals(value: f64) -> usize {
    value
        .to_string()
        .split_once('.')
        .map_or(0, |(_, fraction)| fraction.len())
}

/// Round `value` to `decimals` places.
fn snap(value: f64, decimals: usize) -> f64 {
    format!("{value:.decimals$}").parse().unwrap_or(value)
}

/// ### Voltage Sweep
///
/// Parameters of [`Yokogawa7651::sweep_voltage`].
///
/// The output goes through `v_min`, `v_min + step`, ... up to and including
/// `v_max`, waiting `delay` after each point.
///
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageSweep {
    /// Volts
    pub v_min: f64,
    /// Volts
    pub v_max: f64,
    /// Volts, must be positive
    pub step: f64,
    pub delay: Duration,
    pub range_mv: u32,
    pub current_limit_ma: f64,
    pub polarity: Polarity,
}

impl VoltageSweep {
    /// Sweep with positive polarity.
    pub fn new(
        v_min: f64,
        v_max: f64,
        step: f64,
        delay: Duration,
        range_mv: u32,
        current_limit_ma: f64,
    ) -> Self {
        VoltageSweep {
            v_min,
            v_max,
            step,
            delay,
            range_mv,
            current_limit_ma,
            polarity: Polarity::default(),
        }
    }

    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Reject anything that would send a partial setup or never terminate.
    fn validate(&self) -> Result<VoltageRange> {
        for (name, value) in [("v_min", self.v_min), ("v_max", self.v_max), ("step", self.step)] {
            if !value.is_finite() {
                return Err(Error::InvalidParameter(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        if self.v_min > self.v_max {
            return Err(Error::InvalidParameter(format!(
                "v_min ({}) must not be greater than v_max ({})",
                self.v_min, self.v_max
            )));
        }
        if self.step <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        let range = VoltageRange::try_from(self.range_mv)?;
        check_current_limit(self.current_limit_ma)?;
        Ok(range)
    }
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Output values written
    pub points: usize,
    /// The sweep stopped early on request
    pub cancelled: bool,
}

/// ### Yokogawa7651
///
/// Yokogawa 7651 DC source on an open session.
///
#[derive(Debug)]
pub struct Yokogawa7651 {
    session: Session,
}

impl Yokogawa7651 {
    pub fn new(session: Session) -> Self {
        Yokogawa7651 { session }
    }

    /// Open a session named after the model and wrap it.
    pub fn open(resource_manager: &dyn ResourceManager, address: &str) -> Result<Self> {
        Session::open(resource_manager, Self::MODEL, address).map(Self::new)
    }

    /// Available voltage ranges, smallest first.
    pub fn voltage_ranges() -> &'static [VoltageRange] {
        &VoltageRange::ALL
    }

    /// Available current ranges, smallest first.
    pub fn current_ranges() -> &'static [CurrentRange] {
        &CurrentRange::ALL
    }

    fn send(&mut self, command: Command) -> Result<()> {
        self.session.write(&command.to_string())
    }

    /// Reset every setting of the instrument to its default.
    pub fn initialize(&mut self) -> Result<()> {
        self.send(Command::Initialize)
    }

    /// ### Set Voltage Function
    ///
    /// Source voltage on the range given in millivolts, optionally followed by
    /// a current limit in milliamps. Both are validated before the first write.
    ///
    pub fn set_voltage_function(
        &mut self,
        range_mv: u32,
        current_limit_ma: Option<f64>,
    ) -> Result<()> {
        let range = VoltageRange::try_from(range_mv)?;
        if let Some(limit) = current_limit_ma {
            check_current_limit(limit)?;
        }

        self.send(Command::VoltageFunction(range))?;
        if let Some(limit) = current_limit_ma {
            self.set_current_limit(limit)?;
        }
        Ok(())
    }

    /// ### Set Current Function
    ///
    /// Source current on the range given in milliamps, optionally followed by
    /// a voltage limit in volts. Both are validated before the first write.
    ///
    pub fn set_current_function(
        &mut self,
        range_ma: u32,
        voltage_limit_v: Option<f64>,
    ) -> Result<()> {
        let range = CurrentRange::try_from(range_ma)?;
        if let Some(limit) = voltage_limit_v {
            check_voltage_limit(limit)?;
        }

        self.send(Command::CurrentFunction(range))?;
        if let Some(limit) = voltage_limit_v {
            self.set_voltage_limit(limit)?;
        }
        Ok(())
    }

    /// Voltage limit in volts, `0 < v_max <= 30`.
    pub fn set_voltage_limit(&mut self, v_max: f64) -> Result<()> {
        check_voltage_limit(v_max)?;
        self.send(Command::VoltageLimit(v_max))
    }

    /// Current limit in milliamps, `5 <= i_max <= 120`.
    pub fn set_current_limit(&mut self, i_max: f64) -> Result<()> {
        check_current_limit(i_max)?;
        self.send(Command::CurrentLimit(i_max))
    }

    /// Output value in volts or amps depending on the function. Not bounds
    /// checked, but it has to be a finite number.
    pub fn set_output_value(&mut self, value: f64, polarity: Polarity) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "output value must be finite, got {value}"
            )));
        }
        self.send(Command::OutputValue { polarity, value })
    }

    pub fn set_output_state(&mut self, on: bool) -> Result<()> {
        self.send(Command::OutputState(on))
    }

    /// ### Sweep Voltage
    ///
    /// Blocking voltage sweep; see [`VoltageSweep`]. Returns once the last
    /// point and its delay are done.
    ///
    pub fn sweep_voltage(&mut self, sweep: &VoltageSweep) -> Result<SweepReport> {
        self.sweep_voltage_with_cancel(sweep, &AtomicBool::new(false))
    }

    /// ### Sweep Voltage With Cancel
    ///
    /// Same as [`sweep_voltage`](Self::sweep_voltage), but `cancel` is checked
    /// before each point. Once it is set, no further point is written and the
    /// output is left at the last written value.
    ///
    pub fn sweep_voltage_with_cancel(
        &mut self,
        sweep: &VoltageSweep,
        cancel: &AtomicBool,
    ) -> Result<SweepReport> {
        let range = sweep.validate()?;

        info!(
            session = %self.session.name(),
            v_min = sweep.v_min,
            v_max = sweep.v_max,
            step = sweep.step,
            %range,
            "starting voltage sweep"
        );
        self.set_voltage_function(range.millivolts(), Some(sweep.current_limit_ma))?;

        // points are computed from the index, not accumulated, and the end
        // point is included despite rounding in `v_min + n * step`
        let tolerance = sweep.step * 1e-9;
        let precision = decimals(sweep.v_min).max(decimals(sweep.step));
        let mut points = 0usize;
        loop {
            let raw = sweep.v_min + sweep.step * points as f64;
            if raw > sweep.v_max + tolerance {
                break;
            }
            let value = snap(raw, precision).min(sweep.v_max);
            if cancel.load(Ordering::Relaxed) {
                info!(session = %self.session.name(), points, "voltage sweep cancelled");
                return Ok(SweepReport {
                    points,
                    cancelled: true,
                });
            }

            self.set_output_value(value, sweep.polarity)?;
            points += 1;
            if !sweep.delay.is_zero() {
                thread::sleep(sweep.delay);
            }
        }

        info!(session = %self.session.name(), points, "voltage sweep finished");
        Ok(SweepReport {
            points,
            cancelled: false,
        })
    }
}

impl DeviceProfile for Yokogawa7651 {
    const MODEL: &'static str = "Yokogawa 7651";

    fn session(&self) -> &Session {
        &self.session
    }

    fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    fn into_session(self) -> Session {
        self.session
    }
}
