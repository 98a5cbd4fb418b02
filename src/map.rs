//! Pin pattern ⇄ shaft position lookup tables.
//!
//! The ACE-128 is not Gray coded in the usual sense: all eight pins read the
//! same 128-step track at different angular offsets, so consecutive positions
//! produce non-sequential 8-bit patterns. [`build_table`] inverts that
//! encoding once, in closed form, from the track bytes and the wiring.

use crate::error::ConfigError;
use crate::registers::{IDENTITY_PIN_ORDER, PIN_COUNT, POSITIONS, SENTINEL, TRACK};

/// Wiring of the eight track pins to the eight expander lines.
///
/// `order[line]` is the encoder pin (1–8) connected to expander bit `line`.
/// Every value must appear exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinOrder([u8; PIN_COUNT]);

impl PinOrder {
    /// The wiring of the stock backpack.
    pub const IDENTITY: PinOrder = PinOrder(IDENTITY_PIN_ORDER);

    /// Validate a wiring description.
    ///
    /// # Errors
    /// * [`ConfigError::PinOutOfRange`] if an entry is not in `1..=8`
    /// * [`ConfigError::DuplicatePin`] if an encoder pin is listed twice
    pub fn new(order: [u8; PIN_COUNT]) -> Result<Self, ConfigError> {
        let mut seen = 0u8;
        for (line, &value) in order.iter().enumerate() {
            if !(1..=PIN_COUNT as u8).contains(&value) {
                return Err(ConfigError::PinOutOfRange {
                    pin: line as u8,
                    value,
                });
            }
            let bit = 1 << (value - 1);
            if seen & bit != 0 {
                return Err(ConfigError::DuplicatePin { value });
            }
            seen |= bit;
        }
        Ok(Self(order))
    }

    pub fn as_array(&self) -> &[u8; PIN_COUNT] {
        &self.0
    }
}

impl Default for PinOrder {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Build the 256-entry pattern → position table.
///
/// Imagine turning the shaft through all 128 steps: at each step, work out
/// which bit of the track every pin is looking at and assemble the 8-bit
/// pattern the expander would report. The entry for that pattern is the
/// step. Patterns never produced keep [`SENTINEL`].
///
/// Pin `p` trails pin 1 by `(p - 1) * 16` steps. No validation is done here;
/// a bad `pin_order` just yields a table with collisions.
pub const fn build_table(track: &[u8; 16], pin_order: &[u8; PIN_COUNT]) -> [u8; 256] {
    let mut table = [SENTINEL; 256];
    let mut pos = 0;
    while pos < POSITIONS {
        let mask = 0x80u8 >> (pos % 8);
        let mut index = 0u8;
        let mut line = 0;
        while line < PIN_COUNT {
            let lag = (pin_order[line] as usize).wrapping_sub(1) % PIN_COUNT * 16;
            let offset = (pos + lag) % POSITIONS / 8;
            if track[offset] & mask != 0 {
                index |= 1 << line;
            }
            line += 1;
        }
        table[index as usize] = pos as u8;
        pos += 1;
    }
    table
}

/// Validated lookup tables for one encoder wiring.
///
/// Immutable once built; the tracker owns one and it can be freely copied or
/// shared between threads.
#[derive(Clone, Copy)]
pub struct EncoderMap {
    table: [u8; 256],
    patterns: [u8; POSITIONS],
}

impl EncoderMap {
    /// Build and validate the tables for `track` read through `pin_order`.
    ///
    /// # Errors
    /// [`ConfigError::AmbiguousPattern`] if two shaft positions produce the
    /// same pin pattern, which would make decoding ambiguous.
    pub fn new(track: &[u8; 16], pin_order: PinOrder) -> Result<Self, ConfigError> {
        let table = build_table(track, pin_order.as_array());
        let (patterns, missing) = invert(&table);

        // A collision overwrote an earlier position; report its pattern.
        if let Some(lost) = missing {
            let pattern = pattern_at(track, pin_order.as_array(), lost);
            return Err(ConfigError::AmbiguousPattern { pattern });
        }

        Ok(Self { table, patterns })
    }

    /// Decode a pin pattern, or `None` if no position produces it.
    pub fn decode(&self, pattern: u8) -> Option<u8> {
        match self.table[pattern as usize] {
            SENTINEL => None,
            pos => Some(pos),
        }
    }

    /// The pin pattern the encoder reports at `position` (taken mod 128).
    pub fn pattern(&self, position: u8) -> u8 {
        self.patterns[position as usize % POSITIONS]
    }

    /// The raw table, [`SENTINEL`] marking invalid patterns.
    pub fn table(&self) -> &[u8; 256] {
        &self.table
    }
}

impl Default for EncoderMap {
    /// The map for the stock track and wiring, which is known to be complete.
    fn default() -> Self {
        let table = build_table(&TRACK, &IDENTITY_PIN_ORDER);
        let (patterns, _) = invert(&table);
        Self { table, patterns }
    }
}

impl core::fmt::Debug for EncoderMap {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("EncoderMap")
            .field("patterns", &self.patterns)
            .finish()
    }
}

/// Build the position → pattern table, returning the first position that no
/// pattern decodes to, if any.
fn invert(table: &[u8; 256]) -> ([u8; POSITIONS], Option<usize>) {
    let mut patterns = [0u8; POSITIONS];
    let mut written = [false; POSITIONS];
    for (pattern, &pos) in table.iter().enumerate() {
        if pos != SENTINEL {
            patterns[pos as usize] = pattern as u8;
            written[pos as usize] = true;
        }
    }
    (patterns, written.iter().position(|&w| !w))
}

/// Pattern reported at a single position; used for error reporting.
fn pattern_at(track: &[u8; 16], pin_order: &[u8; PIN_COUNT], pos: usize) -> u8 {
    let mask = 0x80u8 >> (pos % 8);
    pin_order
        .iter()
        .enumerate()
        .filter(|&(_, &pin)| {
            let lag = (pin as usize).wrapping_sub(1) % PIN_COUNT * 16;
            track[(pos + lag) % POSITIONS / 8] & mask != 0
        })
        .fold(0u8, |index, (line, _)| index | 1 << line)
}

// ── Unit Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_entries(table: &[u8; 256]) -> usize {
        table.iter().filter(|&&p| p != SENTINEL).count()
    }

    // ── Table construction ───────────────────────────────────────────

    #[test]
    fn identity_table_holds_every_position_once() {
        let table = build_table(&TRACK, &IDENTITY_PIN_ORDER);
        let mut seen = [0u8; POSITIONS];
        for &pos in table.iter().filter(|&&p| p != SENTINEL) {
            seen[pos as usize] += 1;
        }
        assert!(seen.iter().all(|&n| n == 1));
        assert_eq!(valid_entries(&table), POSITIONS);
    }

    #[test]
    fn identity_table_known_patterns() {
        let table = build_table(&TRACK, &IDENTITY_PIN_ORDER);
        assert_eq!(table[254], 0);
        assert_eq!(table[252], 1);
        assert_eq!(table[124], 2);
        assert_eq!(table[7], 100);
        assert_eq!(table[250], 127);
        // All-high (disconnected, pulled up) and all-low never occur.
        assert_eq!(table[0xFF], SENTINEL);
        assert_eq!(table[0x00], SENTINEL);
    }

    #[test]
    fn position_zero_round_trips() {
        let map = EncoderMap::new(&TRACK, PinOrder::IDENTITY).unwrap();
        let pattern = map.pattern(0);
        assert_eq!(map.decode(pattern), Some(0));
    }

    #[test]
    fn build_is_deterministic() {
        assert_eq!(
            build_table(&TRACK, &IDENTITY_PIN_ORDER),
            build_table(&TRACK, &IDENTITY_PIN_ORDER)
        );
    }

    // Helper: call `visit` with every ordering of `order` (Heap's algorithm).
    fn for_each_permutation(mut order: [u8; PIN_COUNT], mut visit: impl FnMut(&[u8; PIN_COUNT])) {
        let mut c = [0usize; PIN_COUNT];
        visit(&order);
        let mut i = 1;
        while i < PIN_COUNT {
            if c[i] < i {
                if i % 2 == 0 {
                    order.swap(0, i);
                } else {
                    order.swap(c[i], i);
                }
                visit(&order);
                c[i] += 1;
                i = 1;
            } else {
                c[i] = 0;
                i += 1;
            }
        }
    }

    #[test]
    fn every_pin_order_decodes_every_position() {
        let mut seen = 0;
        for_each_permutation([1, 2, 3, 4, 5, 6, 7, 8], |order| {
            let map = EncoderMap::new(&TRACK, PinOrder::new(*order).unwrap()).unwrap();
            assert_eq!(valid_entries(map.table()), POSITIONS, "order {:?}", order);
            for pos in 0..POSITIONS as u8 {
                assert_eq!(map.decode(map.pattern(pos)), Some(pos), "order {:?}", order);
            }
            seen += 1;
        });
        // 8!
        assert_eq!(seen, 40_320);
    }

    #[test]
    fn default_map_matches_identity() {
        let built = EncoderMap::new(&TRACK, PinOrder::default()).unwrap();
        let default = EncoderMap::default();
        assert_eq!(built.table(), default.table());
        for pos in 0..POSITIONS as u8 {
            assert_eq!(built.pattern(pos), default.pattern(pos));
        }
    }

    // ── Lookups ──────────────────────────────────────────────────────

    #[test]
    fn decode_sentinel_is_none() {
        let map = EncoderMap::default();
        assert_eq!(map.decode(0xFF), None);
        assert_eq!(map.decode(0x00), None);
        assert_eq!(map.decode(254), Some(0));
    }

    #[test]
    fn pattern_wraps_position() {
        let map = EncoderMap::default();
        assert_eq!(map.pattern(128), map.pattern(0));
        assert_eq!(map.pattern(200), map.pattern(72));
    }

    // ── Validation ───────────────────────────────────────────────────

    #[test]
    fn pin_order_rejects_out_of_range() {
        assert_eq!(
            PinOrder::new([8, 7, 6, 5, 4, 3, 2, 0]),
            Err(ConfigError::PinOutOfRange { pin: 7, value: 0 })
        );
        assert_eq!(
            PinOrder::new([9, 7, 6, 5, 4, 3, 2, 1]),
            Err(ConfigError::PinOutOfRange { pin: 0, value: 9 })
        );
    }

    #[test]
    fn pin_order_rejects_duplicates() {
        assert_eq!(
            PinOrder::new([8, 7, 6, 5, 4, 3, 2, 2]),
            Err(ConfigError::DuplicatePin { value: 2 })
        );
    }

    #[test]
    fn duplicate_wiring_produces_collisions() {
        // Bypass PinOrder validation to check the map's own collision check.
        let order = PinOrder([1; PIN_COUNT]);
        assert!(matches!(
            EncoderMap::new(&TRACK, order),
            Err(ConfigError::AmbiguousPattern { .. })
        ));
    }

    #[test]
    fn degenerate_track_is_rejected() {
        let track = [0u8; 16];
        assert_eq!(
            EncoderMap::new(&track, PinOrder::IDENTITY).unwrap_err(),
            ConfigError::AmbiguousPattern { pattern: 0 }
        );
    }
}
