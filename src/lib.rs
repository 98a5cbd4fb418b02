//! Blocking driver for the Bourns ACE-128 absolute rotary encoder on an I2C
//! backpack.
//!
//! The ACE-128 reports one of 128 shaft positions as an 8-bit pin pattern.
//! The backpack, a PCF8574 port expander, exposes those eight pins as a
//! single byte over I2C. This crate decodes the pattern and tracks zero
//! calibration and whole turns on top of it.
//!
//! # Architecture
//!
//! - **`driver`** (crate-private) — one-byte reads and writes on the expander.
//! - **[`map`]** — builds the pattern → position lookup table from the
//!   encoder's bit track and the pin wiring.
//! - **[`Ace128`]** — the public tracker: raw, unsigned, signed and
//!   multi-turn positions, zero and turn calibration.
//! - **[`calibration`]** — the persisted zero/turn record and the
//!   [`CalibrationStore`] trait the tracker saves it through.
//!
//! # Quick start
//!
//! ```no_run
//! use ace128_driver::{Ace128, Ace128Config, MemoryStore, DEFAULT_ADDRESS};
//!
//! # fn example(i2c: impl embedded_hal::i2c::I2c) {
//! // Construct with any `embedded-hal` I2C implementation
//! let mut encoder =
//!     Ace128::with_store(i2c, DEFAULT_ADDRESS, Ace128Config::default(), MemoryStore::new())
//!         .unwrap();
//!
//! // Poll faster than half a turn per read
//! loop {
//!     match encoder.multi_turn_position() {
//!         Ok(position) => { /* use position */ }
//!         Err(_) => continue, // undecodable pattern or bus hiccup: read again
//!     }
//! }
//! # }
//! ```
//!
//! # Features
//!
//! - **`defmt`** — Log calibration and persistence events and enable
//!   [`defmt::Format`] implementations on public types.
//! - **`std`** — Enable [`FileStore`] and `std::error::Error` impls.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub use calibration::{Calibration, CalibrationStore, MemoryStore, NoStore, RECORD_LEN};
#[cfg(feature = "std")]
pub use calibration::FileStore;
pub use encoder::{Ace128, Ace128Config};
pub use error::{Ace128Error, ConfigError, StoreError};
pub use map::{build_table, EncoderMap, PinOrder};
pub use registers::{DEFAULT_ADDRESS, POSITIONS, SENTINEL, TRACK};

pub mod calibration;
mod driver;
mod encoder;
mod error;
pub mod map;
mod registers;
