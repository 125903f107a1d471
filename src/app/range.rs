//! Byte ranges and batches of ranges

use std::fmt;

use serde::{Deserialize, Serialize};

/// One contiguous, non-empty sub-range `[offset, offset + length)` of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RangeDescriptor {
    offset: u64,
    length: u64,
}

impl RangeDescriptor {
    /// Create a descriptor, returning `None` for an empty or overflowing range
    pub fn new(offset: u64, length: u64) -> Option<Self> {
        if length == 0 || offset.checked_add(length).is_none() {
            return None;
        }
        Some(Self { offset, length })
    }

    /// Create a descriptor from half-open bounds `[start, end)`
    pub fn from_bounds(start: u64, end: u64) -> Option<Self> {
        Self::new(start, end.checked_sub(start)?)
    }

    /// First byte covered by this range
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of bytes covered by this range
    pub fn length(&self) -> u64 {
        self.length
    }

    /// One past the last byte covered by this range
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Last byte covered by this range, as used by HTTP `Range` headers
    pub fn last_byte(&self) -> u64 {
        self.end() - 1
    }

    /// Whether two ranges share at least one byte
    pub fn overlaps(&self, other: &RangeDescriptor) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

impl fmt::Display for RangeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end())
    }
}

/// One wave of ranges dispatched together and joined before the next wave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based position of the batch within the job
    pub index: usize,
    /// Chunk size the planner used for this batch
    pub chunk_size: u64,
    /// Disjoint ranges in increasing offset order
    pub ranges: Vec<RangeDescriptor>,
}

impl Batch {
    /// Number of ranges in the batch
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether the batch has no ranges
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total bytes requested by the batch
    pub fn bytes(&self) -> u64 {
        self.ranges.iter().map(RangeDescriptor::length).sum()
    }

    /// Smallest range covering every range of the batch
    pub fn span(&self) -> Option<RangeDescriptor> {
        let first = self.ranges.first()?;
        let last = self.ranges.last()?;
        RangeDescriptor::from_bounds(first.offset(), last.end())
    }
}
