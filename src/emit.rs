//! Hands assembled records to the telemetry sink.
//!
//! Every consumer group becomes one [`MetricBatch`]: an entity named after the group, identified by the cluster
//! name, carrying one `KafkaOffsetSample` per partition.

use std::io::Write;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::collect::lag::PartitionOffsetRecord;

pub const CONSUMER_GROUP_ENTITY_TYPE: &str = "ka-consumerGroup";
pub const OFFSET_SAMPLE_EVENT_TYPE: &str = "KafkaOffsetSample";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot serialize batch: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Batch rejected: {0}")]
    Rejected(String),
}

/// The entity a batch reports on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub name: String,

    #[serde(rename = "type")]
    pub entity_type: String,

    #[serde(rename = "clusterName")]
    pub cluster_name: String,
}

/// Offsets of one partition, in the shape of a `KafkaOffsetSample`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffsetSample {
    pub event_type: &'static str,

    #[serde(rename = "displayName")]
    pub display_name: String,

    #[serde(rename = "entityName")]
    pub entity_name: String,

    pub topic: String,

    /// Reported as an attribute, not a gauge.
    pub partition: String,

    #[serde(rename = "kafka.consumerOffset", skip_serializing_if = "Option::is_none")]
    pub consumer_offset: Option<i64>,

    #[serde(rename = "kafka.highWaterMark", skip_serializing_if = "Option::is_none")]
    pub high_water_mark: Option<i64>,

    #[serde(rename = "kafka.consumerLag", skip_serializing_if = "Option::is_none")]
    pub consumer_lag: Option<i64>,
}

impl OffsetSample {
    fn new(group: &str, record: &PartitionOffsetRecord) -> Self {
        Self {
            event_type: OFFSET_SAMPLE_EVENT_TYPE,
            display_name: group.to_string(),
            entity_name: format!("consumerGroup:{group}"),
            topic: record.topic.clone(),
            partition: record.partition.to_string(),
            consumer_offset: record.consumer_offset,
            high_water_mark: record.high_water_mark,
            consumer_lag: record.consumer_lag,
        }
    }
}

/// All samples of one consumer group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricBatch {
    pub entity: Entity,

    pub timestamp: DateTime<Utc>,

    pub samples: Vec<OffsetSample>,
}

impl MetricBatch {
    pub fn new(group: &str, cluster_name: &str, records: &[PartitionOffsetRecord]) -> Self {
        Self {
            entity: Entity {
                name: group.to_string(),
                entity_type: CONSUMER_GROUP_ENTITY_TYPE.to_string(),
                cluster_name: cluster_name.to_string(),
            },
            timestamp: Utc::now(),
            samples: records
                .iter()
                .map(|record| OffsetSample::new(group, record))
                .collect(),
        }
    }
}

/// Receives one batch per collected consumer group. Called concurrently from the per-group tasks.
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    async fn submit(&self, batch: MetricBatch) -> Result<(), Error>;
}

/// Writes each batch as one line of JSON.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesSink<W>
where
    W: Write + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Sink for JsonLinesSink<W>
where
    W: Write + Send + 'static,
{
    async fn submit(&self, batch: MetricBatch) -> Result<(), Error> {
        let mut line = serde_json::to_vec(&batch)?;
        line.push(b'\n');

        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.flush()?;

        Ok(())
    }
}
