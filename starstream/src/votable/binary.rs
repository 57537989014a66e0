//! Fixed-width record decoding for the STREAM payload.
//!
//! Each record is three little-endian IEEE-754 `f32` values laid out as
//! `ra, dec, parallax` in 12 contiguous bytes. A trailing window shorter than
//! a full record is ignored, and records failing the [`NonFinitePolicy`] are
//! skipped without being reported.

use std::slice::ChunksExact;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Size in bytes of one `(ra, dec, parallax)` record.
pub const RECORD_SIZE: usize = 12;

/// One record exactly as read from the binary stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord {
    /// Right ascension in degrees
    pub ra: f32,
    /// Declination in degrees
    pub dec: f32,
    /// Parallax as delivered by the archive
    pub parallax: f32,
}

impl RawRecord {
    pub fn new(ra: f32, dec: f32, parallax: f32) -> Self {
        Self { ra, dec, parallax }
    }

    /// Read a record from a 12-byte little-endian window.
    pub fn from_le_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        Self {
            ra: LittleEndian::read_f32(&bytes[0..4]),
            dec: LittleEndian::read_f32(&bytes[4..8]),
            parallax: LittleEndian::read_f32(&bytes[8..12]),
        }
    }

    /// Encode into the 12-byte wire layout.
    pub fn to_le_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        LittleEndian::write_f32(&mut out[0..4], self.ra);
        LittleEndian::write_f32(&mut out[4..8], self.dec);
        LittleEndian::write_f32(&mut out[8..12], self.parallax);
        out
    }

    pub fn has_nan(&self) -> bool {
        self.ra.is_nan() || self.dec.is_nan() || self.parallax.is_nan()
    }

    pub fn is_finite(&self) -> bool {
        self.ra.is_finite() && self.dec.is_finite() && self.parallax.is_finite()
    }
}

/// Which decoded records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonFinitePolicy {
    /// Drop records with NaN or an infinity in any field
    #[default]
    RejectNonFinite,
    /// Drop only records containing NaN; infinities pass through
    NanOnly,
}

impl NonFinitePolicy {
    pub fn accepts(&self, record: &RawRecord) -> bool {
        match self {
            NonFinitePolicy::RejectNonFinite => record.is_finite(),
            NonFinitePolicy::NanOnly => !record.has_nan(),
        }
    }
}

/// Lazy iterator over the valid records of a byte buffer.
///
/// Borrows the buffer and holds no other state, so cloning it or decoding the
/// same buffer again yields the same sequence.
#[derive(Debug, Clone)]
pub struct RecordDecoder<'a> {
    chunks: ChunksExact<'a, u8>,
    policy: NonFinitePolicy,
}

impl<'a> RecordDecoder<'a> {
    pub fn new(buffer: &'a [u8], policy: NonFinitePolicy) -> Self {
        Self {
            chunks: buffer.chunks_exact(RECORD_SIZE),
            policy,
        }
    }

    /// Number of trailing bytes that do not form a complete record.
    pub fn trailing_bytes(&self) -> usize {
        self.chunks.remainder().len()
    }
}

impl Iterator for RecordDecoder<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        loop {
            let window: &[u8; RECORD_SIZE] = self.chunks.next()?.try_into().ok()?;
            let record = RawRecord::from_le_bytes(window);
            if self.policy.accepts(&record) {
                return Some(record);
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.chunks.len()))
    }
}

/// Decode `buffer` with the default policy.
///
/// The default rejects infinities as well as NaN, which is stricter than a
/// NaN-only filter. Use [`RecordDecoder::new`] with
/// [`NonFinitePolicy::NanOnly`] to let infinities through.
pub fn decode(buffer: &[u8]) -> RecordDecoder<'_> {
    RecordDecoder::new(buffer, NonFinitePolicy::default())
}
