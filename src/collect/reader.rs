//! Point-in-time reads of committed offsets and high-water marks.

use std::collections::BTreeMap;

use tracing::debug;

use crate::client::{Client, PartitionOffset, PartitionScope};
use crate::collect::GroupError;
use crate::topic::{TopicPartition, TopicPartitions};

/// Optional offset per topic-partition, as captured by one read.
///
/// `None` means there is no usable value for the partition. It is never stored as `0` or `-1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    values: BTreeMap<TopicPartition, Option<i64>>,
}

/// Committed offsets of one consumer group.
pub type OffsetSnapshot = Snapshot;

/// High-water marks of the partitions a consumer group reads.
pub type WatermarkSnapshot = Snapshot;

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tp: TopicPartition, value: Option<i64>) {
        self.values.insert(tp, value);
    }

    /// `None` if the partition is not part of the snapshot, `Some(None)` if it is but has no value.
    pub fn get(&self, tp: &TopicPartition) -> Option<Option<i64>> {
        self.values.get(tp).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TopicPartition> {
        self.values.keys()
    }

    /// All partitions of the snapshot, with or without a value.
    pub fn partitions(&self) -> TopicPartitions {
        self.values.keys().cloned().collect()
    }

    /// Builds a snapshot from raw broker rows.
    ///
    /// Rows carrying an error, and negative offsets, become `None`. Every partition in `requested` the broker
    /// did not answer for is recorded as `None` as well.
    pub fn from_response(
        group: Option<&str>,
        rows: Vec<PartitionOffset>,
        requested: Option<&TopicPartitions>,
    ) -> Self {
        let mut snapshot = Self::new();

        for row in rows {
            let tp = row.topic_partition();
            let value = match row.error {
                Some(err) => {
                    debug!(
                        message = "partition lookup failed",
                        group,
                        partition = %tp,
                        %err,
                    );
                    None
                }
                None if row.offset < 0 => None,
                None => Some(row.offset),
            };

            snapshot.insert(tp, value);
        }

        if let Some(requested) = requested {
            for tp in requested.iter() {
                snapshot.values.entry(tp).or_insert(None);
            }
        }

        snapshot
    }
}

impl FromIterator<(TopicPartition, Option<i64>)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (TopicPartition, Option<i64>)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Reads the committed offsets of `group`.
///
/// A failure of the whole lookup is returned as is, there are no partially populated snapshots.
pub async fn read_consumer_offsets<C>(
    client: &C,
    group: &str,
    scope: &PartitionScope,
) -> Result<OffsetSnapshot, GroupError>
where
    C: Client + ?Sized,
{
    let rows = client
        .committed_offsets(group, scope)
        .await
        .map_err(|source| GroupError::ConsumerOffsets {
            group: group.to_string(),
            source,
        })?;

    let requested = match scope {
        PartitionScope::Partitions(partitions) => Some(partitions),
        PartitionScope::Committed => None,
    };

    Ok(Snapshot::from_response(Some(group), rows, requested))
}

/// Reads the high-water marks of `partitions` on behalf of `group`.
pub async fn read_high_water_marks<C>(
    client: &C,
    group: &str,
    partitions: &TopicPartitions,
) -> Result<WatermarkSnapshot, GroupError>
where
    C: Client + ?Sized,
{
    if partitions.is_empty() {
        return Ok(Snapshot::new());
    }

    let rows = client
        .high_water_marks(partitions)
        .await
        .map_err(|source| GroupError::HighWaterMarks {
            group: group.to_string(),
            source,
        })?;

    Ok(Snapshot::from_response(Some(group), rows, Some(partitions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::error::ProtocolError;
    use crate::client::NO_OFFSET;

    fn tp(topic: &str, partition: i32) -> TopicPartition {
        TopicPartition::new(topic, partition)
    }

    #[test]
    fn from_response() {
        for (name, rows, requested, want) in [
            (
                "plain offsets",
                vec![
                    PartitionOffset::new(tp("t", 0), 100),
                    PartitionOffset::new(tp("t", 1), 0),
                ],
                None,
                vec![(tp("t", 0), Some(100)), (tp("t", 1), Some(0))],
            ),
            (
                "no committed offset",
                vec![PartitionOffset::new(tp("t", 0), NO_OFFSET)],
                None,
                vec![(tp("t", 0), None)],
            ),
            (
                "partition error",
                vec![
                    PartitionOffset::error(tp("t", 0), ProtocolError::UnknownTopicOrPartition),
                    PartitionOffset::new(tp("t", 1), 7),
                ],
                None,
                vec![(tp("t", 0), None), (tp("t", 1), Some(7))],
            ),
            (
                "missing requested partition",
                vec![PartitionOffset::new(tp("t", 0), 5)],
                Some([tp("t", 0), tp("t", 1), tp("u", 3)].into_iter().collect::<TopicPartitions>()),
                vec![(tp("t", 0), Some(5)), (tp("t", 1), None), (tp("u", 3), None)],
            ),
            (
                "unrequested partition is kept",
                vec![PartitionOffset::new(tp("x", 9), 1)],
                Some([tp("t", 0)].into_iter().collect::<TopicPartitions>()),
                vec![(tp("t", 0), None), (tp("x", 9), Some(1))],
            ),
        ] {
            let got = Snapshot::from_response(None, rows, requested.as_ref());
            let want = want.into_iter().collect::<Snapshot>();

            assert_eq!(want, got, "{name}");
        }
    }

    #[test]
    fn lookup() {
        let snapshot = [(tp("t", 0), Some(3)), (tp("t", 1), None)]
            .into_iter()
            .collect::<Snapshot>();

        assert_eq!(snapshot.get(&tp("t", 0)), Some(Some(3)));
        assert_eq!(snapshot.get(&tp("t", 1)), Some(None));
        assert_eq!(snapshot.get(&tp("t", 2)), None);
        assert_eq!(snapshot.partitions().len(), 2);
    }
}
