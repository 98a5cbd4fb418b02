//! Hardware constants for the ACE-128 absolute encoder and its I2C backpack.
//!
//! The backpack is a PCF8574-style quasi-bidirectional port expander: it has
//! no register map, a one-byte write sets the eight port latches and a
//! one-byte read returns the eight pin levels.

// ---------------------------------------------------------------------------
// Encoder track
// ---------------------------------------------------------------------------

/// Bit track of the ACE-128, taken from the P1 column of the datasheet.
///
/// Each byte holds eight consecutive rotational steps, MSB first. Every pin
/// sees the same track, shifted by 16 steps relative to its neighbour.
pub const TRACK: [u8; 16] = [
    0b1100_0000, 0b0011_1111, 0b1111_0000, 0b0000_1111,
    0b1110_0000, 0b0001_1111, 0b1111_1111, 0b1111_1111,
    0b1111_1111, 0b0000_0000, 0b1111_1100, 0b0000_0011,
    0b1000_0000, 0b0111_1000, 0b0000_0110, 0b0000_0001,
];

/// Number of distinct shaft positions per revolution.
pub const POSITIONS: usize = 128;

/// Number of sensing pins (and expander lines).
pub const PIN_COUNT: usize = 8;

/// Pattern table value for pin patterns no shaft position produces.
pub const SENTINEL: u8 = 0xFF;

/// Pin wiring of the stock backpack (P1 on expander bit 7 ... P8 on bit 0).
pub const IDENTITY_PIN_ORDER: [u8; PIN_COUNT] = [8, 7, 6, 5, 4, 3, 2, 1];

// ---------------------------------------------------------------------------
// Backpack
// ---------------------------------------------------------------------------

/// Default I2C address of the backpack (PCF8574A with A0–A2 tied low).
pub const DEFAULT_ADDRESS: u8 = 0x38;

/// Port value that releases every expander line to its weak pull-up so all
/// eight pins can be read as inputs.
pub const ALL_INPUTS: u8 = 0xFF;

// ---------------------------------------------------------------------------
// Position arithmetic
// ---------------------------------------------------------------------------

/// Mask selecting the single-turn (low 7 bit) part of a position.
pub const POSITION_MASK: i32 = POSITIONS as i32 - 1;

/// A change of more than this many steps between two consecutive reads is
/// taken as a wrap through the zero point.
pub const HALF_TURN: i32 = POSITIONS as i32 / 2;
