//! Byte-range codec.

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// A window into a payload. `length == 0` means "to the end".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    /// The whole payload.
    pub const FULL: ByteRange = ByteRange { offset: 0, length: 0 };

    pub fn new(offset: u64, length: u64) -> Self { Self { offset, length } }

    pub fn is_ranged(&self) -> bool { self.offset != 0 || self.length != 0 }

    /// True when this range is exactly `(0, size)`.
    pub fn covers(&self, size: u64) -> bool { self.offset == 0 && self.length == size }

    /// Value for a `Range` request header, half-open when the length is unknown.
    ///
    /// Fails when the last byte position does not fit in a `u64`.
    pub fn to_request_header(&self) -> Result<String, TransportError> {
        if self.length == 0 {
            return Ok(format!("bytes={}-", self.offset));
        }
        let last = self
            .offset
            .checked_add(self.length - 1)
            .ok_or_else(|| TransportError::protocol("requested range exceeds the addressable size"))?;
        Ok(format!("bytes={}-{last}", self.offset))
    }

    /// Parse the `Content-Range` a server granted for a partial response.
    ///
    /// Accepts `bytes <start>-<end>/<total>`; the total is not used.
    pub fn parse_content_range(value: &str) -> Result<Self, TransportError> {
        let invalid = || TransportError::protocol("invalid HTTP response range");

        let (unit, bounds) = value.trim().split_once(' ').ok_or_else(invalid)?;
        if unit != "bytes" {
            return Err(invalid());
        }
        let (start, rest) = bounds.split_once('-').ok_or_else(invalid)?;
        if rest.contains('-') {
            return Err(invalid());
        }
        let end = rest.split('/').next().unwrap_or_default();

        let start: u64 = start.parse().map_err(|_| invalid())?;
        let end: u64 = end.parse().map_err(|_| invalid())?;
        let length = end.checked_add(1).and_then(|past| past.checked_sub(start)).ok_or_else(invalid)?;

        Ok(Self { offset: start, length })
    }
}
