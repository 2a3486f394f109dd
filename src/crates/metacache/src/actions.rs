//! Segment filters and actions.
//!
//! A [`SegmentFilter`] selects segments and a [`SegmentAction`] mutates one.
//! Both are plain shared closures, built by the constructors below and
//! passed to [`MetaCache`](crate::MetaCache) queries and updates.
//!
//! ```rust,ignore
//! cache.update_segments(
//!     merge_segment_actions([update_state(SegmentState::Flushed), roll_stats()]),
//!     &[with_partition_id(10), with_segment_state([SegmentState::Sealed])],
//! );
//! ```

use crate::segment::{MsgPosition, SegmentInfo, SegmentLevel, SegmentState, INVALID_PARTITION_ID};
use std::collections::HashSet;
use std::sync::Arc;

pub type SegmentFilter = Arc<dyn Fn(&SegmentInfo) -> bool + Send + Sync>;

pub type SegmentAction = Arc<dyn Fn(&mut SegmentInfo) + Send + Sync>;

/// Segments of `partition_id`; [`INVALID_PARTITION_ID`] matches every segment.
pub fn with_partition_id(partition_id: i64) -> SegmentFilter {
    Arc::new(move |info: &SegmentInfo| {
        partition_id == INVALID_PARTITION_ID || info.partition_id == partition_id
    })
}

pub fn with_segment_ids(ids: impl IntoIterator<Item = i64>) -> SegmentFilter {
    let set: HashSet<i64> = ids.into_iter().collect();
    Arc::new(move |info: &SegmentInfo| set.contains(&info.segment_id))
}

/// Segments in any of `states`. An empty set matches nothing.
pub fn with_segment_state(states: impl IntoIterator<Item = SegmentState>) -> SegmentFilter {
    let set: HashSet<SegmentState> = states.into_iter().collect();
    Arc::new(move |info: &SegmentInfo| !set.is_empty() && set.contains(&info.state))
}

pub fn with_start_pos_not_recorded() -> SegmentFilter {
    Arc::new(|info: &SegmentInfo| !info.start_pos_recorded)
}

pub fn with_importing() -> SegmentFilter {
    Arc::new(|info: &SegmentInfo| info.importing)
}

pub fn with_level(level: SegmentLevel) -> SegmentFilter {
    Arc::new(move |info: &SegmentInfo| info.level == level)
}

/// Conjunction of `filters`; no filters matches everything.
pub fn all_of(filters: &[SegmentFilter]) -> SegmentFilter {
    let filters = filters.to_vec();
    Arc::new(move |info: &SegmentInfo| filters.iter().all(|filter| filter(info)))
}

pub fn update_state(state: SegmentState) -> SegmentAction {
    Arc::new(move |info: &mut SegmentInfo| info.state = state)
}

pub fn update_checkpoint(checkpoint: MsgPosition) -> SegmentAction {
    Arc::new(move |info: &mut SegmentInfo| info.checkpoint = Some(checkpoint.clone()))
}

/// Set the flushed row count
pub fn update_num_of_rows(rows: i64) -> SegmentAction {
    Arc::new(move |info: &mut SegmentInfo| info.flushed_rows = rows)
}

pub fn update_buffered_rows(rows: i64) -> SegmentAction {
    Arc::new(move |info: &mut SegmentInfo| info.buffer_rows = rows)
}

pub fn roll_stats() -> SegmentAction {
    Arc::new(|info: &mut SegmentInfo| info.bfs.roll())
}

pub fn compact_to(target: i64) -> SegmentAction {
    Arc::new(move |info: &mut SegmentInfo| info.compact_to = target)
}

pub fn update_importing(importing: bool) -> SegmentAction {
    Arc::new(move |info: &mut SegmentInfo| info.importing = importing)
}

/// Move `batch_size` rows from buffered to syncing
pub fn start_syncing(batch_size: i64) -> SegmentAction {
    Arc::new(move |info: &mut SegmentInfo| {
        info.syncing_rows += batch_size;
        info.buffer_rows -= batch_size;
    })
}

/// Move `batch_size` rows from syncing to flushed
pub fn finish_syncing(batch_size: i64) -> SegmentAction {
    Arc::new(move |info: &mut SegmentInfo| {
        info.flushed_rows += batch_size;
        info.syncing_rows -= batch_size;
    })
}

pub fn set_start_pos_recorded(recorded: bool) -> SegmentAction {
    Arc::new(move |info: &mut SegmentInfo| info.start_pos_recorded = recorded)
}

/// One action applying `actions` in order.
pub fn merge_segment_actions(actions: impl IntoIterator<Item = SegmentAction>) -> SegmentAction {
    let actions: Vec<SegmentAction> = actions.into_iter().collect();
    Arc::new(move |info: &mut SegmentInfo| {
        for action in &actions {
            action(info);
        }
    })
}
