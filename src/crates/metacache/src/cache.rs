//! In-memory segment metadata cache for one channel.

use crate::actions::{SegmentAction, SegmentFilter};
use crate::segment::SegmentInfo;
use parking_lot::RwLock;
use std::collections::HashMap;

fn matches(info: &SegmentInfo, filters: &[SegmentFilter]) -> bool {
    filters.iter().all(|filter| filter(info))
}

/// Segment metadata of a single channel, keyed by segment id.
///
/// Every query and update takes a slice of filters that must all match;
/// an empty slice selects every segment. Reads return clones so callers
/// never hold the lock.
#[derive(Debug)]
pub struct MetaCache {
    collection_id: i64,
    channel: String,
    segments: RwLock<HashMap<i64, SegmentInfo>>,
}

impl MetaCache {
    pub fn new(collection_id: i64, channel: impl Into<String>) -> Self {
        Self {
            collection_id,
            channel: channel.into(),
            segments: RwLock::new(HashMap::new()),
        }
    }

    pub fn collection_id(&self) -> i64 {
        self.collection_id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn len(&self) -> usize {
        self.segments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.read().is_empty()
    }

    /// Insert `info` after applying `actions` to it. Replaces any segment
    /// with the same id.
    pub fn add_segment(&self, mut info: SegmentInfo, actions: &[SegmentAction]) {
        for action in actions {
            action(&mut info);
        }
        let segment_id = info.segment_id();
        let replaced = self.segments.write().insert(segment_id, info).is_some();
        tracing::debug!(
            channel = %self.channel,
            segment_id,
            replaced,
            "segment added to meta cache"
        );
    }

    /// Segments matching every filter, ordered by id
    pub fn get_segments_by(&self, filters: &[SegmentFilter]) -> Vec<SegmentInfo> {
        let mut segments: Vec<SegmentInfo> = self
            .segments
            .read()
            .values()
            .filter(|info| matches(info, filters))
            .cloned()
            .collect();
        segments.sort_by_key(|info| info.segment_id());
        segments
    }

    /// The segment with `segment_id`, if it exists and matches every filter
    pub fn get_segment_by_id(&self, segment_id: i64, filters: &[SegmentFilter]) -> Option<SegmentInfo> {
        self.segments
            .read()
            .get(&segment_id)
            .filter(|info| matches(info, filters))
            .cloned()
    }

    /// Ids of the segments matching every filter, ascending
    pub fn get_segment_ids_by(&self, filters: &[SegmentFilter]) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .segments
            .read()
            .values()
            .filter(|info| matches(info, filters))
            .map(SegmentInfo::segment_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Apply `action` to every matching segment; returns how many changed.
    pub fn update_segments(&self, action: SegmentAction, filters: &[SegmentFilter]) -> usize {
        let mut segments = self.segments.write();
        let mut updated = 0;
        for info in segments.values_mut().filter(|info| matches(info, filters)) {
            action(info);
            updated += 1;
        }
        tracing::debug!(channel = %self.channel, updated, "meta cache segments updated");
        updated
    }

    /// Drop every matching segment; returns the removed ids, ascending.
    pub fn remove_segments(&self, filters: &[SegmentFilter]) -> Vec<i64> {
        let mut segments = self.segments.write();
        let mut removed: Vec<i64> = segments
            .values()
            .filter(|info| matches(info, filters))
            .map(SegmentInfo::segment_id)
            .collect();
        for id in &removed {
            segments.remove(id);
        }
        removed.sort_unstable();

        if !removed.is_empty() {
            tracing::debug!(channel = %self.channel, segments = ?removed, "segments removed from meta cache");
        }
        removed
    }

    /// Segments whose key statistics may contain `pk`, ascending
    pub fn predict_segments(&self, pk: i64, filters: &[SegmentFilter]) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .segments
            .read()
            .values()
            .filter(|info| matches(info, filters) && info.bloom_filter_set().pk_exists(pk))
            .map(SegmentInfo::segment_id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
