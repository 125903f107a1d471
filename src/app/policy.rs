//! Chunking policies and the planner that turns them into batches
//!
//! A [`ChunkPolicy`] decides how an uncovered byte interval is cut into
//! ranges. The [`ChunkPlanner`] applies a policy to a job: it carries the
//! current chunk size (which only changes under the incremental policy),
//! caps every round at `chunk size × parallelism` bytes and hands out one
//! [`Batch`] per round.
//!
//! ```rust
//! use parallel_download::app::{ChunkPlanner, ChunkPolicy};
//!
//! let mut planner = ChunkPlanner::new(ChunkPolicy::fixed(30), 2)?;
//! let batch = planner.next_batch(0, 100).unwrap();
//! assert_eq!(batch.len(), 2);
//! assert_eq!(batch.bytes(), 60);
//! # Ok::<(), parallel_download::errors::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};

use super::range::{Batch, RangeDescriptor};
use crate::constants::download;
use crate::errors::{ConfigError, ConfigResult};

/// How an interval is subdivided into range requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkPolicy {
    /// Every chunk is `request_size` bytes except the last one of an interval
    Fixed { request_size: u64 },
    /// Chunks start small and grow by `growth_factor` after every successful
    /// batch, up to `max_chunk_size`
    Incremental {
        initial_chunk_size: u64,
        growth_factor: u64,
        max_chunk_size: u64,
    },
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self::fixed(download::DEFAULT_REQUEST_SIZE)
    }
}

impl ChunkPolicy {
    /// Fixed-size policy with the given request size
    pub fn fixed(request_size: u64) -> Self {
        Self::Fixed { request_size }
    }

    /// Incremental policy with the default growth factor and chunk ceiling
    pub fn incremental(initial_chunk_size: u64) -> Self {
        Self::Incremental {
            initial_chunk_size,
            growth_factor: download::DEFAULT_GROWTH_FACTOR,
            max_chunk_size: download::DEFAULT_REQUEST_SIZE.max(initial_chunk_size),
        }
    }

    /// Short policy name used in logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            ChunkPolicy::Fixed { .. } => "fixed",
            ChunkPolicy::Incremental { .. } => "incremental",
        }
    }

    /// Chunk size of the first batch
    pub fn initial_chunk_size(&self) -> u64 {
        match *self {
            ChunkPolicy::Fixed { request_size } => request_size,
            ChunkPolicy::Incremental {
                initial_chunk_size, ..
            } => initial_chunk_size,
        }
    }

    /// Reject sizes that could not make progress
    pub fn validate(&self) -> ConfigResult<()> {
        match *self {
            ChunkPolicy::Fixed { request_size } => {
                if request_size == 0 {
                    return Err(ConfigError::invalid(
                        "request_size",
                        request_size,
                        "Request size must be greater than zero",
                    ));
                }
            }
            ChunkPolicy::Incremental {
                initial_chunk_size,
                growth_factor,
                max_chunk_size,
            } => {
                if initial_chunk_size == 0 {
                    return Err(ConfigError::invalid(
                        "initial_chunk_size",
                        initial_chunk_size,
                        "Initial chunk size must be greater than zero",
                    ));
                }
                if growth_factor == 0 {
                    return Err(ConfigError::invalid(
                        "growth_factor",
                        growth_factor,
                        "Growth factor must be at least 1",
                    ));
                }
                if max_chunk_size < initial_chunk_size {
                    return Err(ConfigError::invalid(
                        "max_chunk_size",
                        max_chunk_size,
                        format!(
                            "Maximum chunk size must not be below the initial chunk size ({})",
                            initial_chunk_size
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Iterator cutting `[start, end)` into chunks of a fixed nominal size
#[derive(Debug, Clone)]
pub struct Partition {
    cursor: u64,
    end: u64,
    chunk_size: u64,
}

impl Partition {
    /// Partition `[start, end)`; a zero `chunk_size` yields nothing
    pub fn new(start: u64, end: u64, chunk_size: u64) -> Self {
        let cursor = if chunk_size == 0 { end } else { start };
        Self {
            cursor,
            end,
            chunk_size,
        }
    }
}

impl Iterator for Partition {
    type Item = RangeDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }
        let chunk_end = self.cursor.saturating_add(self.chunk_size).min(self.end);
        let range = RangeDescriptor::from_bounds(self.cursor, chunk_end)?;
        self.cursor = chunk_end;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.cursor >= self.end {
            return (0, Some(0));
        }
        let remaining = self.end - self.cursor;
        let chunks = remaining / self.chunk_size + u64::from(remaining % self.chunk_size != 0);
        let chunks = usize::try_from(chunks).unwrap_or(usize::MAX);
        (chunks, Some(chunks))
    }
}

impl ExactSizeIterator for Partition {}

/// Applies a [`ChunkPolicy`] over the lifetime of one job
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    policy: ChunkPolicy,
    parallelism: usize,
    chunk_size: u64,
    batches_planned: usize,
}

impl ChunkPlanner {
    /// Create a planner, validating the policy and parallelism
    pub fn new(policy: ChunkPolicy, parallelism: usize) -> ConfigResult<Self> {
        policy.validate()?;
        if parallelism == 0 {
            return Err(ConfigError::invalid(
                "parallelism",
                parallelism,
                "Parallelism must be at least 1",
            ));
        }

        Ok(Self {
            policy,
            parallelism,
            chunk_size: policy.initial_chunk_size(),
            batches_planned: 0,
        })
    }

    /// Policy this planner applies
    pub fn policy(&self) -> &ChunkPolicy {
        &self.policy
    }

    /// Maximum number of ranges per batch
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Nominal chunk size of the next batch
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Most bytes the next batch may request beyond the covered offset
    pub fn round_cap(&self) -> u64 {
        self.chunk_size.saturating_mul(self.parallelism as u64)
    }

    /// Cut `[start, end)` into ranges of the current chunk size
    pub fn partition(&self, start: u64, end: u64) -> Partition {
        Partition::new(start, end, self.chunk_size)
    }

    /// Number of ranges to dispatch together when `remaining` are left
    pub fn batch_size(&self, remaining: usize) -> usize {
        self.parallelism.min(remaining)
    }

    /// Plan the batch starting at `cursor`, or `None` once `[cursor, end)` is
    /// exhausted
    pub fn next_batch(&mut self, cursor: u64, end: u64) -> Option<Batch> {
        if cursor >= end {
            return None;
        }

        let round_end = cursor.saturating_add(self.round_cap()).min(end);
        let ranges: Vec<RangeDescriptor> = self.partition(cursor, round_end).collect();
        debug_assert_eq!(
            ranges.len(),
            self.batch_size(self.partition(cursor, end).len())
        );

        self.batches_planned += 1;
        Some(Batch {
            index: self.batches_planned,
            chunk_size: self.chunk_size,
            ranges,
        })
    }

    /// Record a successfully completed batch, growing the chunk size under the
    /// incremental policy
    pub fn advance(&mut self) {
        if let ChunkPolicy::Incremental {
            growth_factor,
            max_chunk_size,
            ..
        } = self.policy
        {
            self.chunk_size = self
                .chunk_size
                .saturating_mul(growth_factor)
                .min(max_chunk_size);
        }
    }

    /// Number of batches handed out so far
    pub fn batches_planned(&self) -> usize {
        self.batches_planned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(ranges: &[RangeDescriptor]) -> Vec<(u64, u64)> {
        ranges.iter().map(|r| (r.offset(), r.end())).collect()
    }

    /// Drive a planner over a whole object, returning every batch
    fn plan_all(policy: ChunkPolicy, parallelism: usize, size: u64) -> Vec<Batch> {
        let mut planner = ChunkPlanner::new(policy, parallelism).unwrap();
        let mut cursor = 0;
        let mut batches = Vec::new();
        while let Some(batch) = planner.next_batch(cursor, size) {
            cursor += batch.bytes();
            batches.push(batch);
            planner.advance();
        }
        batches
    }

    #[test]
    fn test_fixed_scenario_100_bytes() {
        let batches = plan_all(ChunkPolicy::fixed(30), 2, 100);
        assert_eq!(batches.len(), 2);
        assert_eq!(bounds(&batches[0].ranges), vec![(0, 30), (30, 60)]);
        assert_eq!(bounds(&batches[1].ranges), vec![(60, 90), (90, 100)]);
        assert_eq!(batches[0].index, 1);
        assert_eq!(batches[1].index, 2);
    }

    #[test]
    fn test_partition_is_exact_for_all_shapes() {
        let policies = [
            ChunkPolicy::fixed(1),
            ChunkPolicy::fixed(7),
            ChunkPolicy::fixed(30),
            ChunkPolicy::Incremental {
                initial_chunk_size: 1,
                growth_factor: 2,
                max_chunk_size: 64,
            },
            ChunkPolicy::Incremental {
                initial_chunk_size: 3,
                growth_factor: 8,
                max_chunk_size: 1000,
            },
        ];

        for policy in policies {
            for parallelism in [1, 2, 4, 50] {
                for size in [0u64, 1, 2, 29, 30, 31, 60, 61, 100, 997, 4096] {
                    let batches = plan_all(policy, parallelism, size);
                    let mut expected_offset = 0;
                    for batch in &batches {
                        assert!(!batch.is_empty());
                        assert!(batch.len() <= parallelism);
                        for range in &batch.ranges {
                            assert_eq!(range.offset(), expected_offset, "gap or overlap");
                            expected_offset = range.end();
                        }
                    }
                    assert_eq!(
                        expected_offset, size,
                        "policy {:?}, parallelism {}, size {}",
                        policy, parallelism, size
                    );
                }
            }
        }
    }

    #[test]
    fn test_short_and_empty_intervals() {
        let planner = ChunkPlanner::new(ChunkPolicy::fixed(30), 4).unwrap();

        let ranges: Vec<_> = planner.partition(10, 15).collect();
        assert_eq!(bounds(&ranges), vec![(10, 15)]);

        assert_eq!(planner.partition(15, 15).count(), 0);

        let mut planner = planner;
        assert!(planner.next_batch(100, 100).is_none());
        assert!(planner.next_batch(101, 100).is_none());
    }

    #[test]
    fn test_batch_size_is_bounded_by_parallelism() {
        let planner = ChunkPlanner::new(ChunkPolicy::fixed(10), 4).unwrap();
        assert_eq!(planner.batch_size(10), 4);
        assert_eq!(planner.batch_size(3), 3);
        assert_eq!(planner.batch_size(0), 0);
    }

    #[test]
    fn test_partition_size_hint() {
        let partition = Partition::new(0, 100, 30);
        assert_eq!(partition.size_hint(), (4, Some(4)));
        assert_eq!(partition.count(), 4);
    }

    #[test]
    fn test_incremental_growth_is_deterministic_and_monotonic() {
        let policy = ChunkPolicy::Incremental {
            initial_chunk_size: 8,
            growth_factor: 2,
            max_chunk_size: 128,
        };

        let first: Vec<u64> = plan_all(policy, 4, 10_000)
            .iter()
            .map(|b| b.chunk_size)
            .collect();
        let second: Vec<u64> = plan_all(policy, 4, 10_000)
            .iter()
            .map(|b| b.chunk_size)
            .collect();

        assert_eq!(first, second);
        assert_eq!(&first[..5], &[8, 16, 32, 64, 128]);
        assert!(first.windows(2).all(|w| w[0] <= w[1]));
        assert!(first.iter().all(|&c| c <= 128));
    }

    #[test]
    fn test_incremental_round_cap_tracks_chunk_size() {
        let mut planner = ChunkPlanner::new(
            ChunkPolicy::Incremental {
                initial_chunk_size: 8,
                growth_factor: 2,
                max_chunk_size: 1024,
            },
            3,
        )
        .unwrap();

        let batch = planner.next_batch(0, 1_000).unwrap();
        assert_eq!(batch.bytes(), 24);
        planner.advance();
        assert_eq!(planner.round_cap(), 48);

        let batch = planner.next_batch(24, 1_000).unwrap();
        assert_eq!(bounds(&batch.ranges), vec![(24, 40), (40, 56), (56, 72)]);
    }

    #[test]
    fn test_fixed_policy_does_not_grow() {
        let mut planner = ChunkPlanner::new(ChunkPolicy::fixed(30), 2).unwrap();
        planner.advance();
        planner.advance();
        assert_eq!(planner.chunk_size(), 30);
        assert_eq!(planner.round_cap(), 60);
    }

    #[test]
    fn test_invalid_configurations() {
        assert!(ChunkPlanner::new(ChunkPolicy::fixed(0), 1).is_err());
        assert!(ChunkPlanner::new(ChunkPolicy::fixed(10), 0).is_err());
        assert!(ChunkPolicy::Incremental {
            initial_chunk_size: 0,
            growth_factor: 2,
            max_chunk_size: 10,
        }
        .validate()
        .is_err());
        assert!(ChunkPolicy::Incremental {
            initial_chunk_size: 8,
            growth_factor: 0,
            max_chunk_size: 10,
        }
        .validate()
        .is_err());
        assert!(ChunkPolicy::Incremental {
            initial_chunk_size: 16,
            growth_factor: 2,
            max_chunk_size: 8,
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_policy_serialization() {
        let policy = ChunkPolicy::fixed(30);
        let json = serde_json::to_string(&policy).unwrap();
        assert_eq!(json, r#"{"kind":"fixed","request_size":30}"#);

        let parsed: ChunkPolicy =
            serde_json::from_str(r#"{"kind":"incremental","initial_chunk_size":8,"growth_factor":2,"max_chunk_size":64}"#)
                .unwrap();
        assert_eq!(parsed.name(), "incremental");
        assert_eq!(parsed.initial_chunk_size(), 8);
    }
}
