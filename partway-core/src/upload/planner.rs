//! Part planning
//!
//! Splits `[0, file_size)` into contiguous, 1-numbered byte ranges.

use crate::error::{Result, UploadError};

/// One planned chunk of the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartRange {
    /// 1-based part number
    pub part_number: u32,
    /// Byte offset into the source
    pub offset: u64,
    /// Byte length, always > 0
    pub length: u64,
}

impl PartRange {
    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Offsets as a `usize` range for slicing an in-memory buffer
    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.offset as usize..self.end() as usize
    }
}

/// Plan the parts of a `file_size`-byte source cut into `part_size` chunks
///
/// The last part carries the remainder. Fails on an empty source or a zero
/// part size.
pub fn plan(file_size: u64, part_size: u64) -> Result<Vec<PartRange>> {
    if part_size == 0 {
        return Err(UploadError::InvalidInput {
            reason: "part size must be positive".into(),
        });
    }
    if file_size == 0 {
        return Err(UploadError::InvalidInput {
            reason: "file is empty".into(),
        });
    }

    let count = file_size.div_ceil(part_size);
    if count > u32::MAX as u64 {
        return Err(UploadError::InvalidInput {
            reason: format!("{} parts exceed the part number range", count),
        });
    }

    let ranges = (0..count)
        .map(|idx| {
            let offset = idx * part_size;
            PartRange {
                part_number: idx as u32 + 1,
                offset,
                length: part_size.min(file_size - offset),
            }
        })
        .collect();

    Ok(ranges)
}
