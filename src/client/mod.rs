//! Contracts of the cluster clients the collector reads from.
//!
//! Connection setup, authentication and request retries belong to the implementations. The collector only
//! relies on the calls below, and shares one [`Client`] across all concurrently collected consumer groups.

use std::collections::BTreeMap;

use async_trait::async_trait;

pub mod consumer_group;
pub mod error;
#[cfg(feature = "backend-rdkafka")]
pub mod rdkafka;

use crate::topic::{TopicPartition, TopicPartitions};
use consumer_group::ConsumerGroupDescriptor;
use error::{ProtocolError, Result};

/// Committed offset returned by the broker when a group never committed for a partition.
pub const NO_OFFSET: i64 = -1;

/// One partition row of an offset or watermark response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionOffset {
    pub topic: String,

    pub partition: i32,

    /// The offset as reported by the broker, [`NO_OFFSET`] if there is none.
    pub offset: i64,

    /// The partition-level error, if any. `offset` is meaningless when set.
    pub error: Option<ProtocolError>,
}

impl PartitionOffset {
    pub fn new(tp: TopicPartition, offset: i64) -> Self {
        Self {
            topic: tp.topic,
            partition: tp.partition,
            offset,
            error: None,
        }
    }

    pub fn error(tp: TopicPartition, error: ProtocolError) -> Self {
        Self {
            topic: tp.topic,
            partition: tp.partition,
            offset: NO_OFFSET,
            error: Some(error),
        }
    }

    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.as_str(), self.partition)
    }
}

/// Which partitions a committed offset lookup covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionScope {
    /// Exactly these partitions.
    Partitions(TopicPartitions),

    /// Every partition the group holds a committed offset for.
    Committed,
}

/// Creates the handles a collection run needs. Both are acquired before any consumer group is collected and
/// closed after every group finished.
#[async_trait]
pub trait Connector: Send + Sync {
    type Client: Client;
    type Admin: ClusterAdmin;

    async fn create_client(&self) -> Result<Self::Client>;

    async fn create_cluster_admin(&self) -> Result<Self::Admin>;
}

/// Point-in-time reads of topic metadata and offsets.
#[async_trait]
pub trait Client: Send + Sync + 'static {
    /// Partition indexes of `topic`.
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>>;

    /// Committed offsets of `group`.
    async fn committed_offsets(
        &self,
        group: &str,
        scope: &PartitionScope,
    ) -> Result<Vec<PartitionOffset>>;

    /// High-water marks, i.e. the offset the next produced record will get.
    async fn high_water_marks(&self, partitions: &TopicPartitions) -> Result<Vec<PartitionOffset>>;

    async fn close(&self) -> Result<()>;
}

/// Cluster-wide consumer group administration.
#[async_trait]
pub trait ClusterAdmin: Send + Sync {
    /// All consumer groups, mapped to their protocol type.
    async fn list_consumer_groups(&self) -> Result<BTreeMap<String, String>>;

    async fn describe_consumer_groups(
        &self,
        groups: &[String],
    ) -> Result<Vec<ConsumerGroupDescriptor>>;

    async fn close(&self) -> Result<()>;
}
