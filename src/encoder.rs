//! Position tracking on top of the decoded shaft position.
//!
//! [`Ace128`] wraps the low-level backpack driver with pattern decoding, zero
//! calibration, direction reversal and multi-turn counting, and keeps the
//! calibration in a [`CalibrationStore`].

use embedded_hal::i2c::I2c;

use crate::calibration::{Calibration, CalibrationStore, NoStore};
use crate::driver::ExpanderDriver;
use crate::error::{Ace128Error, StoreError};
use crate::map::{EncoderMap, PinOrder};
use crate::registers::{
    ALL_INPUTS, HALF_TURN, IDENTITY_PIN_ORDER, PIN_COUNT, POSITIONS, POSITION_MASK, TRACK,
};

/// Construction-time settings for an [`Ace128`].
///
/// [`Ace128Config::default()`] matches the stock backpack: identity wiring,
/// position increasing clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ace128Config {
    /// Encoder pin (1–8) wired to each expander bit, bit 0 first. Validated
    /// when the tracker is built. Default: `[8, 7, 6, 5, 4, 3, 2, 1]`.
    pub pin_order: [u8; PIN_COUNT],
    /// Count in the opposite direction. Default: `false`.
    pub reverse: bool,
}

impl Default for Ace128Config {
    fn default() -> Self {
        Self {
            pin_order: IDENTITY_PIN_ORDER,
            reverse: false,
        }
    }
}

/// Start-up work waiting for the first decodable read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Startup {
    Done,
    /// No saved record: zero at the first decoded position.
    Zero,
    /// Record restored: reference `last` to the first decoded position.
    Last,
}

/// One ACE-128 absolute encoder on an I2C backpack.
///
/// Every query performs exactly one bus read; nothing is cached or retried.
/// All methods take `&mut self`, so a tracker shared between threads must sit
/// behind a mutex held for the whole read-and-update sequence.
///
/// # Example
///
/// ```no_run
/// use ace128_driver::{Ace128, Ace128Config, DEFAULT_ADDRESS};
///
/// # fn example(i2c: impl embedded_hal::i2c::I2c) {
/// let mut encoder = Ace128::new(i2c, DEFAULT_ADDRESS, Ace128Config::default()).unwrap();
///
/// let raw = encoder.raw_position().unwrap();
/// let turns = encoder.multi_turn_position().unwrap();
/// # }
/// ```
pub struct Ace128<I2C, S = NoStore> {
    driver: ExpanderDriver<I2C>,
    map: EncoderMap,
    /// Raw position reported as logical zero, 0–127.
    zero: u8,
    /// Whole turns counted so far, a multiple of 128.
    turns: i32,
    /// Signed position at the previous multi-turn read.
    last: i8,
    reverse: bool,
    store: S,
    /// Last record the store accepted; identical records are not rewritten.
    persisted: Option<Calibration>,
    store_fault: Option<StoreError>,
    startup: Startup,
}

impl<I2C> Ace128<I2C, NoStore>
where
    I2C: I2c,
{
    /// Create a tracker whose calibration lives only in memory.
    ///
    /// The logical zero starts at the current shaft position.
    ///
    /// # Arguments
    /// * `i2c` — I2C peripheral (takes ownership for exclusive access)
    /// * `address` — 7-bit I2C address of the backpack (typically 0x38)
    /// * `config` — wiring and direction
    ///
    /// # Errors
    /// See [`with_store`](Ace128::with_store).
    pub fn new(
        i2c: I2C,
        address: u8,
        config: Ace128Config,
    ) -> Result<Self, Ace128Error<I2C::Error>> {
        Self::with_store(i2c, address, config, NoStore)
    }
}

impl<I2C, S> Ace128<I2C, S>
where
    I2C: I2c,
    S: CalibrationStore,
{
    /// Create a tracker that restores and saves its calibration through
    /// `store`.
    ///
    /// Releases all expander lines to inputs, then loads the saved record.
    /// If there is none, or it cannot be read, the logical zero starts at the
    /// current shaft position with no turns counted.
    ///
    /// An undecodable first read does not fail construction. The zero (or,
    /// with a restored record, the multi-turn reference) is then taken from
    /// the first position any later read decodes; see
    /// [`is_settled`](Self::is_settled).
    ///
    /// # Errors
    /// * [`Ace128Error::InvalidConfiguration`] for a malformed pin order
    /// * [`Ace128Error::Bus`] on communication failure
    pub fn with_store(
        i2c: I2C,
        address: u8,
        config: Ace128Config,
        store: S,
    ) -> Result<Self, Ace128Error<I2C::Error>> {
        let map = PinOrder::new(config.pin_order)
            .and_then(|order| EncoderMap::new(&TRACK, order))
            .map_err(Ace128Error::InvalidConfiguration)?;

        let mut driver = ExpanderDriver::new(i2c, address);
        driver.write_u8(ALL_INPUTS)?;

        let mut encoder = Self {
            driver,
            map,
            zero: 0,
            turns: 0,
            last: 0,
            reverse: config.reverse,
            store,
            persisted: None,
            store_fault: None,
            startup: Startup::Done,
        };
        encoder.restore()?;
        Ok(encoder)
    }

    fn restore(&mut self) -> Result<(), Ace128Error<I2C::Error>> {
        let loaded = self.store.load().and_then(|record| {
            if record.is_valid() {
                Ok(record)
            } else {
                Err(StoreError::Corrupt)
            }
        });

        match loaded {
            Ok(record) => {
                #[cfg(feature = "defmt")]
                defmt::info!("ACE-128 calibration restored: {}", record);

                self.zero = record.zero;
                self.turns = record.turns;
                self.persisted = Some(record);
                self.startup = Startup::Last;
            }
            Err(error) => {
                match error {
                    StoreError::Missing => {
                        #[cfg(feature = "defmt")]
                        defmt::debug!("ACE-128: no saved calibration, zeroing here");
                    }
                    _ => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("ACE-128: calibration load failed: {}", error);
                        self.store_fault = Some(error);
                    }
                }

                self.turns = 0;
                self.startup = Startup::Zero;
            }
        }

        match self.raw_position() {
            Ok(_) => Ok(()),
            Err(Ace128Error::Decode { .. }) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("ACE-128: first read undecodable, settling on next read");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Read operations
    // -----------------------------------------------------------------------

    /// Read the raw 8-bit pin pattern from the backpack.
    pub fn read_pins(&mut self) -> Result<u8, Ace128Error<I2C::Error>> {
        Ok(self.driver.read_u8()?)
    }

    /// Read the shaft position as printed on the encoder, 0–127, ignoring
    /// zero and direction.
    ///
    /// # Errors
    /// * [`Ace128Error::Decode`] if the pattern matches no position; the
    ///   caller may simply read again
    /// * [`Ace128Error::Bus`] on communication failure
    pub fn raw_position(&mut self) -> Result<u8, Ace128Error<I2C::Error>> {
        let pattern = self.read_pins()?;
        let raw = self
            .map
            .decode(pattern)
            .ok_or(Ace128Error::Decode { pattern })?;
        self.settle(raw);
        Ok(raw)
    }

    /// Read the position relative to zero, 0–127, in the configured
    /// direction.
    pub fn unsigned_position(&mut self) -> Result<u8, Ace128Error<I2C::Error>> {
        let raw = self.raw_position()?;
        Ok(self.to_unsigned(raw))
    }

    /// Read the shortest signed distance from zero, -64 to 63.
    pub fn signed_position(&mut self) -> Result<i8, Ace128Error<I2C::Error>> {
        let raw = self.raw_position()?;
        Ok(self.to_signed(raw))
    }

    /// Read the position including whole turns made since calibration.
    ///
    /// A turn is counted when the signed position jumps by more than half a
    /// turn between two calls, so the shaft **must not move more than 64
    /// steps between consecutive calls**. Faster rotation is miscounted.
    /// Decode and bus errors leave the turn state untouched.
    ///
    /// # Errors
    /// * [`Ace128Error::OutOfRange`] if the position would leave the `i32`
    ///   range; the turn state is untouched and the reading is not consumed
    /// * [`Ace128Error::Decode`], [`Ace128Error::Bus`] as for
    ///   [`raw_position`](Self::raw_position)
    pub fn multi_turn_position(&mut self) -> Result<i32, Ace128Error<I2C::Error>> {
        let current = i32::from(self.signed_position()?);
        let last = i32::from(self.last);

        let step = if last - current > HALF_TURN {
            POSITIONS as i32
        } else if current - last > HALF_TURN {
            -(POSITIONS as i32)
        } else {
            0
        };
        let turns = self
            .turns
            .checked_add(step)
            .ok_or(Ace128Error::OutOfRange)?;
        let position = turns
            .checked_add(current)
            .ok_or(Ace128Error::OutOfRange)?;

        if turns != self.turns {
            self.turns = turns;
            #[cfg(feature = "defmt")]
            defmt::debug!("ACE-128 rolled to turn offset {}", self.turns);
            self.persist();
        }

        self.last = current as i8;
        Ok(position)
    }

    // -----------------------------------------------------------------------
    // Calibration
    // -----------------------------------------------------------------------

    /// Treat raw position `raw` (taken mod 128) as logical zero.
    ///
    /// The turn count is kept.
    pub fn set_zero(&mut self, raw: u8) {
        if self.startup == Startup::Zero {
            self.startup = Startup::Last;
        }
        let last_raw = self.last_raw();
        self.zero = raw & POSITION_MASK as u8;
        // Keep the next multi-turn read from mistaking the shift for a wrap.
        self.last = self.to_signed(last_raw);

        #[cfg(feature = "defmt")]
        defmt::info!("ACE-128 zero set to {}", self.zero);
        self.persist();
    }

    /// Treat the current shaft position as logical zero.
    pub fn set_zero_here(&mut self) -> Result<(), Ace128Error<I2C::Error>> {
        let raw = self.raw_position()?;
        self.set_zero(raw);
        Ok(())
    }

    /// Raw position currently treated as logical zero.
    pub fn zero(&self) -> u8 {
        self.zero
    }

    /// Recalibrate so the current shaft position reads as `target` from
    /// [`multi_turn_position`](Self::multi_turn_position).
    ///
    /// Both the zero offset and the turn count are rewritten.
    ///
    /// # Errors
    /// * [`Ace128Error::OutOfRange`] if `target` needs a turn count beyond
    ///   the `i32` range (targets in the top half turn below `i32::MAX`);
    ///   the calibration is left unchanged
    /// * [`Ace128Error::Decode`], [`Ace128Error::Bus`] as for
    ///   [`raw_position`](Self::raw_position)
    pub fn set_multi_turn_position(&mut self, target: i32) -> Result<(), Ace128Error<I2C::Error>> {
        let raw = self.raw_position()?;
        let low = target & POSITION_MASK;
        // Signed position of `raw` once zero is moved so it reads `low`.
        let current = if low >= HALF_TURN {
            low - POSITIONS as i32
        } else {
            low
        };
        let turns = target
            .checked_sub(current)
            .ok_or(Ace128Error::OutOfRange)?;

        let shift = if self.reverse { low } else { -low };
        self.zero = ((i32::from(raw) + shift) & POSITION_MASK) as u8;
        self.last = current as i8;
        self.turns = turns;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "ACE-128 position set to {} (zero {}, turns {})",
            target,
            self.zero,
            self.turns
        );
        self.persist();
        Ok(())
    }

    /// Whole-turn offset, in steps.
    pub fn turns(&self) -> i32 {
        self.turns
    }

    /// Current zero offset and turn count.
    pub fn calibration(&self) -> Calibration {
        Calibration {
            zero: self.zero,
            turns: self.turns,
        }
    }

    /// Whether start-up has seen a decodable position. Until then
    /// [`zero`](Self::zero) may still move to the first position read.
    pub fn is_settled(&self) -> bool {
        self.startup == Startup::Done
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    /// Change the counting direction.
    ///
    /// The direction is not persisted; pass it in [`Ace128Config`] on every
    /// start-up.
    pub fn set_reversed(&mut self, reverse: bool) {
        let last_raw = self.last_raw();
        self.reverse = reverse;
        self.last = self.to_signed(last_raw);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn map(&self) -> &EncoderMap {
        &self.map
    }

    pub fn address(&self) -> u8 {
        self.driver.address()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The most recent persistence failure, cleared by the next successful
    /// save. Tracking carries on in memory regardless.
    pub fn store_fault(&self) -> Option<StoreError> {
        self.store_fault
    }

    /// Tear down the tracker, returning the I2C peripheral and the store.
    pub fn release(self) -> (I2C, S) {
        (self.driver.release(), self.store)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Steps from zero to `raw` in the counting direction, -127 to 127.
    fn offset(&self, raw: u8) -> i32 {
        let diff = i32::from(raw) - i32::from(self.zero);
        if self.reverse {
            -diff
        } else {
            diff
        }
    }

    fn to_unsigned(&self, raw: u8) -> u8 {
        (self.offset(raw) & POSITION_MASK) as u8
    }

    fn to_signed(&self, raw: u8) -> i8 {
        let pos = self.offset(raw);
        let pos = if pos >= HALF_TURN {
            pos - POSITIONS as i32
        } else if pos < -HALF_TURN {
            pos + POSITIONS as i32
        } else {
            pos
        };
        pos as i8
    }

    /// Raw position that produced `last` under the current zero and
    /// direction.
    fn last_raw(&self) -> u8 {
        let last = i32::from(self.last);
        let step = if self.reverse { -last } else { last };
        ((i32::from(self.zero) + step) & POSITION_MASK) as u8
    }

    /// Finish start-up work deferred by an undecodable first read.
    fn settle(&mut self, raw: u8) {
        match self.startup {
            Startup::Done => return,
            Startup::Zero => {
                self.zero = raw;
                self.last = 0;
            }
            Startup::Last => self.last = self.to_signed(raw),
        }
        self.startup = Startup::Done;
    }

    fn persist(&mut self) {
        let record = self.calibration();
        if self.persisted == Some(record) {
            return;
        }

        match self.store.save(&record) {
            Ok(()) => {
                self.persisted = Some(record);
                self.store_fault = None;
            }
            Err(error) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("ACE-128: calibration save failed: {}", error);
                self.store_fault = Some(error);
            }
        }
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────
