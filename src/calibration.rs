//! Persistent calibration state.
//!
//! The tracker's zero offset and turn count are the only state worth keeping
//! across power cycles. They travel together as a [`Calibration`] record and
//! are written through a [`CalibrationStore`] supplied by the application:
//! EEPROM, flash, battery-backed RAM or, with the `std` feature, a file.
//!
//! # Record format
//!
//! Stores that deal in bytes use the fixed [`RECORD_LEN`]-byte encoding from
//! [`Calibration::to_bytes`]:
//!
//! ```text
//! [0]    magic 0xAC
//! [1]    format version (1)
//! [2]    zero offset, 0–127
//! [3..7] turn count, i32 big-endian, multiple of 128
//! [7]    XOR of bytes 0..7
//! ```

use crate::error::StoreError;
use crate::registers::POSITION_MASK;

/// Length in bytes of an encoded [`Calibration`].
pub const RECORD_LEN: usize = 8;

const MAGIC: u8 = 0xAC;
const VERSION: u8 = 1;

/// Zero offset and turn count of one encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// Raw position treated as logical zero, 0–127.
    pub zero: u8,
    /// Accumulated whole turns, in steps (always a multiple of 128).
    pub turns: i32,
}

impl Calibration {
    /// Encode into the fixed on-medium layout.
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[0] = MAGIC;
        buf[1] = VERSION;
        buf[2] = self.zero;
        buf[3..7].copy_from_slice(&self.turns.to_be_bytes());
        buf[7] = checksum(&buf[..7]);
        buf
    }

    /// Decode a record written by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    /// [`StoreError::Corrupt`] if the length, magic, version or checksum is
    /// wrong, or the decoded values break the calibration invariants.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let buf: &[u8; RECORD_LEN] = bytes.try_into().map_err(|_| StoreError::Corrupt)?;

        if buf[0] != MAGIC || buf[1] != VERSION || buf[7] != checksum(&buf[..7]) {
            return Err(StoreError::Corrupt);
        }

        let record = Self {
            zero: buf[2],
            turns: i32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]),
        };
        if !record.is_valid() {
            return Err(StoreError::Corrupt);
        }

        Ok(record)
    }

    /// Whether `zero` is a single-turn position and `turns` a whole number
    /// of turns.
    pub fn is_valid(&self) -> bool {
        i32::from(self.zero) <= POSITION_MASK && self.turns & POSITION_MASK == 0
    }
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Backing medium for a [`Calibration`] record.
///
/// The record is always read and written as a whole. Implementations should
/// classify failures so the tracker can tell a fresh device
/// ([`StoreError::Missing`]) from damage ([`StoreError::Corrupt`],
/// [`StoreError::Io`]).
pub trait CalibrationStore {
    /// Read the saved record.
    fn load(&mut self) -> Result<Calibration, StoreError>;

    /// Replace the saved record.
    fn save(&mut self, record: &Calibration) -> Result<(), StoreError>;
}

/// Store used when calibration should not outlive the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStore;

impl CalibrationStore for NoStore {
    fn load(&mut self) -> Result<Calibration, StoreError> {
        Err(StoreError::Missing)
    }

    fn save(&mut self, _record: &Calibration) -> Result<(), StoreError> {
        Ok(())
    }
}

/// RAM-backed store holding one encoded record.
///
/// Suitable for battery-backed or retained RAM, and as a test double: it
/// counts the writes it receives.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    record: Option<[u8; RECORD_LEN]>,
    writes: usize,
}

impl MemoryStore {
    /// An empty store; the first load reports [`StoreError::Missing`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `record`.
    pub fn with_record(record: Calibration) -> Self {
        Self {
            record: Some(record.to_bytes()),
            writes: 0,
        }
    }

    /// Number of successful [`save`](CalibrationStore::save) calls.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// The stored bytes, if any.
    pub fn raw(&self) -> Option<&[u8; RECORD_LEN]> {
        self.record.as_ref()
    }

    /// Overwrite the stored bytes directly, bypassing encoding.
    pub fn set_raw(&mut self, bytes: [u8; RECORD_LEN]) {
        self.record = Some(bytes);
    }
}

impl CalibrationStore for MemoryStore {
    fn load(&mut self) -> Result<Calibration, StoreError> {
        match &self.record {
            Some(bytes) => Calibration::from_bytes(bytes),
            None => Err(StoreError::Missing),
        }
    }

    fn save(&mut self, record: &Calibration) -> Result<(), StoreError> {
        self.record = Some(record.to_bytes());
        self.writes += 1;
        Ok(())
    }
}

impl<T: CalibrationStore + ?Sized> CalibrationStore for &mut T {
    fn load(&mut self) -> Result<Calibration, StoreError> {
        (**self).load()
    }

    fn save(&mut self, record: &Calibration) -> Result<(), StoreError> {
        (**self).save(record)
    }
}

#[cfg(feature = "std")]
pub use file::FileStore;

#[cfg(feature = "std")]
mod file {
    use std::fs;
    use std::io::ErrorKind;
    use std::path::{Path, PathBuf};

    use super::{Calibration, CalibrationStore};
    use crate::error::StoreError;

    /// Store keeping the encoded record in a single file.
    #[derive(Debug, Clone)]
    pub struct FileStore {
        path: PathBuf,
    }

    impl FileStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl CalibrationStore for FileStore {
        fn load(&mut self) -> Result<Calibration, StoreError> {
            let bytes = fs::read(&self.path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => StoreError::Missing,
                _ => StoreError::Io,
            })?;
            Calibration::from_bytes(&bytes)
        }

        fn save(&mut self, record: &Calibration) -> Result<(), StoreError> {
            fs::write(&self.path, record.to_bytes()).map_err(|_| StoreError::Io)
        }
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Record codec ─────────────────────────────────────────────────

    #[test]
    fn encoded_layout() {
        let bytes = Calibration { zero: 10, turns: 256 }.to_bytes();
        assert_eq!(bytes, [0xAC, 1, 10, 0, 0, 1, 0, 0xAC ^ 10]);
    }

    #[test]
    fn negative_turns_survive_encoding() {
        let record = Calibration { zero: 127, turns: -384 };
        assert_eq!(Calibration::from_bytes(&record.to_bytes()), Ok(record));
    }

    #[test]
    fn bad_checksum_is_corrupt() {
        let mut bytes = Calibration { zero: 3, turns: 128 }.to_bytes();
        bytes[2] = 4;
        assert_eq!(Calibration::from_bytes(&bytes), Err(StoreError::Corrupt));
    }

    #[test]
    fn wrong_length_is_corrupt() {
        let bytes = Calibration::default().to_bytes();
        assert_eq!(Calibration::from_bytes(&bytes[..5]), Err(StoreError::Corrupt));
        assert_eq!(Calibration::from_bytes(&[]), Err(StoreError::Corrupt));
    }

    #[test]
    fn wrong_magic_or_version_is_corrupt() {
        let mut bytes = Calibration::default().to_bytes();
        bytes[0] = 0x00;
        bytes[7] = checksum(&bytes[..7]);
        assert_eq!(Calibration::from_bytes(&bytes), Err(StoreError::Corrupt));

        let mut bytes = Calibration::default().to_bytes();
        bytes[1] = 2;
        bytes[7] = checksum(&bytes[..7]);
        assert_eq!(Calibration::from_bytes(&bytes), Err(StoreError::Corrupt));
    }

    #[test]
    fn out_of_range_values_are_corrupt() {
        // Checksums are valid; only the invariants are broken.
        let zero_too_big = Calibration { zero: 128, turns: 0 }.to_bytes();
        assert_eq!(Calibration::from_bytes(&zero_too_big), Err(StoreError::Corrupt));

        let partial_turn = Calibration { zero: 0, turns: 100 }.to_bytes();
        assert_eq!(Calibration::from_bytes(&partial_turn), Err(StoreError::Corrupt));
    }

    // ── Stores ───────────────────────────────────────────────────────

    #[test]
    fn memory_store_starts_missing() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load(), Err(StoreError::Missing));
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        let record = Calibration { zero: 10, turns: 256 };
        store.save(&record).unwrap();
        assert_eq!(store.load(), Ok(record));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn memory_store_reports_corruption() {
        let mut store = MemoryStore::with_record(Calibration { zero: 1, turns: 0 });
        let mut bytes = *store.raw().unwrap();
        bytes[4] ^= 0x40;
        store.set_raw(bytes);
        assert_eq!(store.load(), Err(StoreError::Corrupt));
    }

    #[test]
    fn no_store_never_has_a_record() {
        let mut store = NoStore;
        store.save(&Calibration { zero: 5, turns: 0 }).unwrap();
        assert_eq!(store.load(), Err(StoreError::Missing));
    }

    #[test]
    fn mutable_reference_is_a_store() {
        fn save_through<S: CalibrationStore>(mut store: S) {
            store.save(&Calibration { zero: 7, turns: -128 }).unwrap();
        }

        let mut store = MemoryStore::new();
        save_through(&mut store);
        assert_eq!(store.writes(), 1);
    }

    #[cfg(feature = "std")]
    mod file_store {
        use super::*;

        fn temp_path(name: &str) -> std::path::PathBuf {
            let mut path = std::env::temp_dir();
            path.push(format!("ace128-{}-{}", std::process::id(), name));
            let _ = std::fs::remove_file(&path);
            path
        }

        #[test]
        fn missing_file_is_missing() {
            let mut store = FileStore::new(temp_path("missing"));
            assert_eq!(store.load(), Err(StoreError::Missing));
        }

        #[test]
        fn round_trip() {
            let path = temp_path("round-trip");
            let mut store = FileStore::new(&path);
            let record = Calibration { zero: 10, turns: 256 };
            store.save(&record).unwrap();
            assert_eq!(store.load(), Ok(record));
            std::fs::remove_file(path).unwrap();
        }

        #[test]
        fn garbage_file_is_corrupt() {
            let path = temp_path("garbage");
            std::fs::write(&path, b"not a record").unwrap();
            let mut store = FileStore::new(&path);
            assert_eq!(store.load(), Err(StoreError::Corrupt));
            std::fs::remove_file(path).unwrap();
        }

        #[test]
        fn unreadable_path_is_io() {
            // A directory cannot be read as a file.
            let mut store = FileStore::new(std::env::temp_dir());
            assert_eq!(store.load(), Err(StoreError::Io));
        }
    }
}
