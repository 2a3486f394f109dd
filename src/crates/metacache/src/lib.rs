//! # metacache - Segment metadata for ingestion stages
//!
//! Stages that buffer and sync rows keep per-segment bookkeeping in a
//! [`MetaCache`]. Queries and updates are expressed with small composable
//! closures:
//!
//! - [`SegmentFilter`]s select segments (`with_partition_id`,
//!   `with_segment_state`, ...); several filters on one call must all match.
//! - [`SegmentAction`]s mutate one segment (`update_state`, `start_syncing`,
//!   ...); [`merge_segment_actions`] chains them.
//!
//! The flowgraph engine never touches this crate; stages own a cache and
//! block themselves while other components update it.

pub mod actions;
pub mod cache;
pub mod segment;

pub use actions::{
    all_of, compact_to, finish_syncing, merge_segment_actions, roll_stats, set_start_pos_recorded,
    start_syncing, update_buffered_rows, update_checkpoint, update_importing, update_num_of_rows,
    update_state, with_importing, with_level, with_partition_id, with_segment_ids,
    with_segment_state, with_start_pos_not_recorded, SegmentAction, SegmentFilter,
};
pub use cache::MetaCache;
pub use segment::{
    BloomFilterSet, MsgPosition, PkStatistics, SegmentInfo, SegmentLevel, SegmentState,
    INVALID_PARTITION_ID,
};
