//! Aquifer ratings and the cached per-cell record.

use std::io::{self, Cursor, Read, Write};

use wellspring_utils::serial::{ReadFrom, WriteTo};

use crate::error::CodecError;

/// Current layout version of [`AquiferRecord`].
///
/// Bump whenever scoring or smoothing changes meaning: every stored record
/// with a lower version is thrown away and recomputed from scratch.
pub const SCHEMA_VERSION: u32 = 3;

/// Highest possible rating value.
pub const MAX_RATING: u8 = 100;

/// A normalized aquifer strength plus a salinity flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rating {
    /// Strength in `[0, 100]`.
    pub value: u8,
    /// Whether the aquifer yields salt water.
    pub is_salty: bool,
}

impl Rating {
    /// No aquifer at all.
    pub const ZERO: Self = Self {
        value: 0,
        is_salty: false,
    };

    /// Creates a rating, clamping `value` to `[0, 100]`.
    #[must_use]
    pub const fn new(value: u8, is_salty: bool) -> Self {
        Self {
            value: if value > MAX_RATING { MAX_RATING } else { value },
            is_salty,
        }
    }

    /// Converts a floating point score to a rating.
    ///
    /// The score is rounded and clamped; NaN becomes zero.
    #[must_use]
    pub fn from_score(score: f64, is_salty: bool) -> Self {
        let value = if score.is_nan() {
            0
        } else {
            score.round().clamp(0.0, f64::from(MAX_RATING)) as u8
        };
        Self { value, is_salty }
    }
}

impl WriteTo for Rating {
    fn write(&self, writer: &mut impl Write) -> io::Result<()> {
        i32::from(self.value).write(writer)?;
        self.is_salty.write(writer)
    }
}

fn read_rating(reader: &mut impl Read) -> Result<Rating, CodecError> {
    let value = i32::read(reader)?;
    let is_salty = bool::read(reader)?;
    let value = u8::try_from(value)
        .ok()
        .filter(|v| *v <= MAX_RATING)
        .ok_or(CodecError::RatingOutOfRange(value))?;
    Ok(Rating { value, is_salty })
}

/// The cached aquifer state of one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AquiferRecord {
    /// Rating from local sampling alone.
    pub raw: Rating,
    /// Rating after neighbour smoothing, once it has run.
    pub smoothed: Option<Rating>,
    /// Schema the record was computed under.
    pub schema_version: u32,
}

/// Result of decoding a stored record through the version gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordState {
    /// The record was written by the current schema.
    Current(AquiferRecord),
    /// The record predates the current schema and must be recomputed.
    Stale {
        /// Version found in storage.
        version: u32,
    },
}

impl AquiferRecord {
    /// A freshly sampled record without smoothing.
    #[must_use]
    pub const fn new(raw: Rating) -> Self {
        Self {
            raw,
            smoothed: None,
            schema_version: SCHEMA_VERSION,
        }
    }

    /// Returns a copy with the smoothed rating set.
    #[must_use]
    pub const fn with_smoothed(self, smoothed: Rating) -> Self {
        Self {
            smoothed: Some(smoothed),
            ..self
        }
    }

    /// The rating consumers should see: smoothed if present, else raw.
    #[must_use]
    pub fn effective(&self) -> Rating {
        self.smoothed.unwrap_or(self.raw)
    }

    /// Whether the record was computed under the current schema.
    #[must_use]
    pub const fn is_current(&self) -> bool {
        self.schema_version >= SCHEMA_VERSION
    }

    /// Serializes the record. The schema version comes first so the gate
    /// can reject old layouts without understanding them.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(16);
        self.schema_version.write(&mut buf)?;
        self.raw.write(&mut buf)?;
        self.smoothed.write(&mut buf)?;
        Ok(buf)
    }

    /// Decodes a stored record, gating on its schema version.
    ///
    /// Older versions are reported as [`RecordState::Stale`] without reading
    /// the rest of the blob. There is no migration path.
    pub fn decode(bytes: &[u8]) -> Result<RecordState, CodecError> {
        let mut reader = Cursor::new(bytes);
        let version = u32::read(&mut reader)?;
        if version < SCHEMA_VERSION {
            return Ok(RecordState::Stale { version });
        }
        if version > SCHEMA_VERSION {
            return Err(CodecError::UnknownSchema(version));
        }

        let raw = read_rating(&mut reader)?;
        let smoothed = if bool::read(&mut reader)? {
            Some(read_rating(&mut reader)?)
        } else {
            None
        };

        Ok(RecordState::Current(Self {
            raw,
            smoothed,
            schema_version: version,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_score_clamps_and_rejects_nan() {
        assert_eq!(Rating::from_score(f64::NAN, true), Rating::new(0, true));
        assert_eq!(Rating::from_score(-5.0, false).value, 0);
        assert_eq!(Rating::from_score(250.0, false).value, 100);
        assert_eq!(Rating::from_score(41.6, false).value, 42);
        assert_eq!(Rating::from_score(f64::INFINITY, false).value, 100);
        assert_eq!(Rating::new(200, false).value, 100);
    }

    #[test]
    fn effective_prefers_smoothed() {
        let record = AquiferRecord::new(Rating::new(10, false));
        assert_eq!(record.effective().value, 10);
        let record = record.with_smoothed(Rating::new(30, true));
        assert_eq!(record.effective(), Rating::new(30, true));
    }

    #[test]
    fn encoded_layout() {
        let record = AquiferRecord::new(Rating::new(7, true)).with_smoothed(Rating::new(9, false));
        let bytes = record.encode().unwrap();
        assert_eq!(
            bytes,
            [0, 0, 0, 3, 0, 0, 0, 7, 1, 1, 0, 0, 0, 9, 0],
            "version, raw value, raw salty, smoothed flag, smoothed value, smoothed salty"
        );
        assert_eq!(
            AquiferRecord::decode(&bytes).unwrap(),
            RecordState::Current(record)
        );
    }

    #[test]
    fn old_schema_is_stale_without_reading_payload() {
        let bytes = [0, 0, 0, 1, 0xFF];
        assert_eq!(
            AquiferRecord::decode(&bytes).unwrap(),
            RecordState::Stale { version: 1 }
        );
    }

    #[test]
    fn future_schema_and_garbage_are_errors() {
        assert!(matches!(
            AquiferRecord::decode(&[0, 0, 0, 99]),
            Err(CodecError::UnknownSchema(99))
        ));
        assert!(matches!(
            AquiferRecord::decode(&[0, 0, 0, 3, 0, 0]),
            Err(CodecError::Io(_))
        ));
        assert!(matches!(
            AquiferRecord::decode(&[0, 0, 0, 3, 0, 0, 0, 101, 0, 0]),
            Err(CodecError::RatingOutOfRange(101))
        ));
    }
}
