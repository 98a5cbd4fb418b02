//! Error types for the ACE-128 driver.

use core::fmt;

/// Errors returned by [`Ace128`](crate::Ace128) operations.
#[derive(Debug, PartialEq, Eq)]
pub enum Ace128Error<E> {
    /// Underlying I2C bus error.
    Bus(E),

    /// The pin order or track could not produce a one-to-one pattern table.
    InvalidConfiguration(ConfigError),

    /// The pins read a pattern no shaft position produces. Usually a loose
    /// connector, bus noise or a disconnected encoder; the read can be retried.
    Decode {
        /// The raw pin pattern that was read.
        pattern: u8,
    },

    /// The multi-turn position would fall outside the `i32` range. The turn
    /// count and zero are left as they were.
    OutOfRange,
}

// Allow ergonomic `?` propagation from raw I2C errors.
impl<E> From<E> for Ace128Error<E> {
    fn from(error: E) -> Self {
        Ace128Error::Bus(error)
    }
}

impl<E: fmt::Debug> fmt::Display for Ace128Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Ace128Error::Bus(e) => write!(f, "I2C error: {:?}", e),
            Ace128Error::InvalidConfiguration(e) => write!(f, "invalid configuration: {}", e),
            Ace128Error::Decode { pattern } => {
                write!(f, "pin pattern {:#010b} is not a valid position", pattern)
            }
            Ace128Error::OutOfRange => write!(f, "multi-turn position out of range"),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for Ace128Error<E> {}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for Ace128Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Ace128Error::Bus(e) => defmt::write!(f, "I2C error: {}", e),
            Ace128Error::InvalidConfiguration(e) => {
                defmt::write!(f, "Invalid configuration: {}", e)
            }
            Ace128Error::Decode { pattern } => {
                defmt::write!(f, "Undecodable pin pattern {=u8:#x}", pattern)
            }
            Ace128Error::OutOfRange => defmt::write!(f, "Multi-turn position out of range"),
        }
    }
}

/// Reasons a pin order / track pair is rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A pin order entry is outside `1..=8`.
    PinOutOfRange {
        /// Index of the offending entry.
        pin: u8,
        /// The value found there.
        value: u8,
    },
    /// The same track pin is wired to more than one expander line.
    DuplicatePin {
        /// The repeated pin number.
        value: u8,
    },
    /// Two shaft positions produce the same pin pattern.
    AmbiguousPattern {
        /// The pattern shared by more than one position.
        pattern: u8,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::PinOutOfRange { pin, value } => {
                write!(f, "pin order entry {} is {}, expected 1-8", pin, value)
            }
            ConfigError::DuplicatePin { value } => {
                write!(f, "pin {} appears more than once in the pin order", value)
            }
            ConfigError::AmbiguousPattern { pattern } => {
                write!(f, "pattern {:#010b} maps to more than one position", pattern)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Failures of a [`CalibrationStore`](crate::CalibrationStore).
///
/// The tracker never propagates these; it logs them and keeps tracking in
/// memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// No calibration record has been saved yet.
    Missing,
    /// A record exists but is truncated, has a bad checksum or holds
    /// out-of-range values.
    Corrupt,
    /// The storage medium could not be read or written.
    Io,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::Missing => write!(f, "no calibration record"),
            StoreError::Corrupt => write!(f, "calibration record is corrupt"),
            StoreError::Io => write!(f, "calibration storage I/O failure"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StoreError {}
