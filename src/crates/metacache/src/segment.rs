//! Segment metadata records.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Partition id meaning "any partition".
pub const INVALID_PARTITION_ID: i64 = -1;

/// Lifecycle state of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SegmentState {
    #[default]
    None,
    NotExist,
    Growing,
    Sealed,
    Flushing,
    Flushed,
    Dropped,
    Importing,
}

/// Compaction level of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SegmentLevel {
    #[default]
    Legacy,
    L0,
    L1,
    L2,
}

/// Position in a message stream
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MsgPosition {
    pub channel_name: String,
    pub msg_id: Vec<u8>,
    pub msg_group: String,
    pub timestamp: u64,
}

impl MsgPosition {
    pub fn new(channel_name: impl Into<String>, timestamp: u64) -> Self {
        Self {
            channel_name: channel_name.into(),
            timestamp,
            ..Default::default()
        }
    }
}

/// Primary-key statistics for one batch of inserts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PkStatistics {
    pub min_pk: i64,
    pub max_pk: i64,
    pks: HashSet<i64>,
}

impl PkStatistics {
    pub fn update(&mut self, pks: &[i64]) {
        for &pk in pks {
            if self.pks.is_empty() {
                self.min_pk = pk;
                self.max_pk = pk;
            } else {
                self.min_pk = self.min_pk.min(pk);
                self.max_pk = self.max_pk.max(pk);
            }
            self.pks.insert(pk);
        }
    }

    pub fn pk_exists(&self, pk: i64) -> bool {
        pk >= self.min_pk && pk <= self.max_pk && self.pks.contains(&pk)
    }

    pub fn row_count(&self) -> usize {
        self.pks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pks.is_empty()
    }
}

/// Current and historical primary-key statistics of a segment.
///
/// New keys go into the current statistics; [`roll`](Self::roll) seals them
/// into history once the rows they describe have been synced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BloomFilterSet {
    current: Option<PkStatistics>,
    history: Vec<PkStatistics>,
}

impl BloomFilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record primary keys of newly buffered rows
    pub fn update_pks(&mut self, pks: &[i64]) {
        if pks.is_empty() {
            return;
        }
        self.current.get_or_insert_with(PkStatistics::default).update(pks);
    }

    /// Move the current statistics into history. No-op if there are none.
    pub fn roll(&mut self) {
        if let Some(stats) = self.current.take() {
            self.history.push(stats);
        }
    }

    pub fn pk_exists(&self, pk: i64) -> bool {
        self.current.iter().chain(&self.history).any(|s| s.pk_exists(pk))
    }

    pub fn current(&self) -> Option<&PkStatistics> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[PkStatistics] {
        &self.history
    }
}

/// Metadata of one segment held by a [`MetaCache`](crate::MetaCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub(crate) segment_id: i64,
    pub(crate) partition_id: i64,
    pub(crate) state: SegmentState,
    pub(crate) level: SegmentLevel,
    pub(crate) start_pos_recorded: bool,
    pub(crate) importing: bool,
    pub(crate) checkpoint: Option<MsgPosition>,
    pub(crate) flushed_rows: i64,
    pub(crate) buffer_rows: i64,
    pub(crate) syncing_rows: i64,
    pub(crate) compact_to: i64,
    pub(crate) bfs: BloomFilterSet,
}

impl SegmentInfo {
    /// A growing, L1 segment with no rows
    pub fn new(segment_id: i64, partition_id: i64) -> Self {
        Self {
            segment_id,
            partition_id,
            state: SegmentState::Growing,
            level: SegmentLevel::L1,
            start_pos_recorded: false,
            importing: false,
            checkpoint: None,
            flushed_rows: 0,
            buffer_rows: 0,
            syncing_rows: 0,
            compact_to: 0,
            bfs: BloomFilterSet::new(),
        }
    }

    pub fn with_state(mut self, state: SegmentState) -> Self {
        self.state = state;
        self
    }

    pub fn with_level(mut self, level: SegmentLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_bloom_filter_set(mut self, bfs: BloomFilterSet) -> Self {
        self.bfs = bfs;
        self
    }

    pub fn segment_id(&self) -> i64 {
        self.segment_id
    }

    pub fn partition_id(&self) -> i64 {
        self.partition_id
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn level(&self) -> SegmentLevel {
        self.level
    }

    pub fn start_pos_recorded(&self) -> bool {
        self.start_pos_recorded
    }

    pub fn importing(&self) -> bool {
        self.importing
    }

    pub fn checkpoint(&self) -> Option<&MsgPosition> {
        self.checkpoint.as_ref()
    }

    pub fn flushed_rows(&self) -> i64 {
        self.flushed_rows
    }

    pub fn buffer_rows(&self) -> i64 {
        self.buffer_rows
    }

    pub fn syncing_rows(&self) -> i64 {
        self.syncing_rows
    }

    /// Rows in any stage of the buffer → sync → flush path
    pub fn num_of_rows(&self) -> i64 {
        self.flushed_rows + self.syncing_rows + self.buffer_rows
    }

    /// Target segment of a compaction; 0 when not compacted
    pub fn compact_to(&self) -> i64 {
        self.compact_to
    }

    pub fn bloom_filter_set(&self) -> &BloomFilterSet {
        &self.bfs
    }
}
