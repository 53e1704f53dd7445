//! Merges offsets and high-water marks into per-partition lag records.

use std::collections::BTreeSet;

use crate::collect::reader::{OffsetSnapshot, WatermarkSnapshot};
use crate::topic::TopicPartition;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionOffsetRecord {
    pub topic: String,

    pub partition: i32,

    /// The offset the group committed for this partition.
    pub consumer_offset: Option<i64>,

    /// The offset of the next record produced to this partition.
    pub high_water_mark: Option<i64>,

    /// `high_water_mark - consumer_offset`, only known when both are.
    pub consumer_lag: Option<i64>,
}

impl PartitionOffsetRecord {
    pub fn new(tp: TopicPartition, consumer_offset: Option<i64>, high_water_mark: Option<i64>) -> Self {
        let consumer_lag = match (high_water_mark, consumer_offset) {
            (Some(hwm), Some(offset)) => hwm.checked_sub(offset),
            _ => None,
        };

        Self {
            topic: tp.topic,
            partition: tp.partition,
            consumer_offset,
            high_water_mark,
            consumer_lag,
        }
    }
}

/// One record for every partition found in either snapshot, ordered by topic and partition.
///
/// Negative lag is reported unmodified. It means the group moved between the reads in a way the read order
/// can not compensate for, e.g. its offsets were reset.
pub fn assemble(offsets: &OffsetSnapshot, watermarks: &WatermarkSnapshot) -> Vec<PartitionOffsetRecord> {
    let keys = offsets
        .keys()
        .chain(watermarks.keys())
        .collect::<BTreeSet<_>>();

    keys.into_iter()
        .map(|tp| {
            PartitionOffsetRecord::new(
                tp.clone(),
                offsets.get(tp).flatten(),
                watermarks.get(tp).flatten(),
            )
        })
        .collect()
}
