//! [`Connector`] backed by librdkafka.
//!
//! librdkafka calls block, they are moved off the async runtime with [`tokio::task::spawn_blocking`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::{Offset, TopicPartitionList};
use tracing::debug;

use crate::client::consumer_group::{ConsumerGroupDescriptor, GroupMember};
use crate::client::error::{Error, ProtocolError, RequestContext, Result};
use crate::client::{
    Client, ClusterAdmin, Connector, PartitionOffset, PartitionScope, NO_OFFSET,
};
use crate::topic::{TopicPartition, TopicPartitions};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds librdkafka clients for one cluster.
#[derive(Clone)]
pub struct RdKafkaConnector {
    config: ClientConfig,
    timeout: Duration,
}

impl RdKafkaConnector {
    pub fn new(bootstrap_servers: &[String]) -> Self {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", bootstrap_servers.join(","))
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false");

        Self {
            config,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Timeout of every single librdkafka request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides any librdkafka configuration property.
    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.config.set(key, value);
        self
    }

    fn consumer(&self) -> Result<BaseConsumer> {
        Ok(self.config.create()?)
    }
}

impl std::fmt::Debug for RdKafkaConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RdKafkaConnector")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for RdKafkaConnector {
    type Client = RdKafkaClient;
    type Admin = RdKafkaAdmin;

    async fn create_client(&self) -> Result<Self::Client> {
        Ok(RdKafkaClient {
            consumer: Arc::new(self.consumer()?),
            connector: self.clone(),
        })
    }

    async fn create_cluster_admin(&self) -> Result<Self::Admin> {
        Ok(RdKafkaAdmin {
            consumer: Arc::new(self.consumer()?),
            timeout: self.timeout,
        })
    }
}

/// Reads metadata and offsets. Committed offsets are read through a short-lived consumer configured with the
/// group's ID, the group is never joined.
pub struct RdKafkaClient {
    consumer: Arc<BaseConsumer>,
    connector: RdKafkaConnector,
}

impl std::fmt::Debug for RdKafkaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RdKafkaClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl Client for RdKafkaClient {
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>> {
        let consumer = Arc::clone(&self.consumer);
        let timeout = self.connector.timeout;
        let topic = topic.to_string();

        blocking(move || {
            let metadata = consumer.fetch_metadata(Some(topic.as_str()), timeout)?;
            let found = metadata
                .topics()
                .iter()
                .find(|t| t.name() == topic)
                .ok_or_else(|| {
                    Error::server(
                        ProtocolError::UnknownTopicOrPartition,
                        RequestContext::Topic(topic.clone()),
                    )
                })?;

            if let Some(err) = found.error() {
                if let Some(protocol_error) = ProtocolError::new(err as i16) {
                    return Err(Error::server(protocol_error, RequestContext::Topic(topic)));
                }
            }

            Ok(found.partitions().iter().map(|p| p.id()).collect())
        })
        .await
    }

    async fn committed_offsets(
        &self,
        group: &str,
        scope: &PartitionScope,
    ) -> Result<Vec<PartitionOffset>> {
        let consumer: BaseConsumer = self
            .connector
            .clone()
            .set("group.id", group)
            .consumer()?;
        let timeout = self.connector.timeout;
        let scope = scope.clone();

        blocking(move || {
            let committed_only = scope == PartitionScope::Committed;
            let requested = match scope {
                PartitionScope::Partitions(partitions) => partitions,
                PartitionScope::Committed => all_partitions(&consumer, timeout)?,
            };

            let mut tpl = TopicPartitionList::new();
            for tp in requested.iter() {
                tpl.add_partition(&tp.topic, tp.partition);
            }

            let committed = consumer.committed_offsets(tpl, timeout)?;

            let mut rows = vec![];
            for elem in committed.elements() {
                let tp = TopicPartition::new(elem.topic(), elem.partition());

                match (elem.error(), elem.offset()) {
                    (Err(err), _) => rows.push(PartitionOffset::error(tp, kafka_error(&err))),
                    (Ok(()), Offset::Offset(offset)) => rows.push(PartitionOffset::new(tp, offset)),
                    // partitions the group never committed are not part of it
                    (Ok(()), _) if committed_only => {}
                    (Ok(()), _) => rows.push(PartitionOffset::new(tp, NO_OFFSET)),
                }
            }

            Ok(rows)
        })
        .await
    }

    async fn high_water_marks(&self, partitions: &TopicPartitions) -> Result<Vec<PartitionOffset>> {
        let consumer = Arc::clone(&self.consumer);
        let timeout = self.connector.timeout;
        let partitions = partitions.clone();

        blocking(move || {
            Ok(partitions
                .iter()
                .map(|tp| match consumer.fetch_watermarks(&tp.topic, tp.partition, timeout) {
                    Ok((_low, high)) => PartitionOffset::new(tp, high),
                    Err(err) => PartitionOffset::error(tp, kafka_error(&err)),
                })
                .collect())
        })
        .await
    }

    /// The librdkafka handle is released when the client is dropped.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Lists consumer groups through the group coordinators of all brokers.
pub struct RdKafkaAdmin {
    consumer: Arc<BaseConsumer>,
    timeout: Duration,
}

impl std::fmt::Debug for RdKafkaAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RdKafkaAdmin").finish_non_exhaustive()
    }
}

#[async_trait]
impl ClusterAdmin for RdKafkaAdmin {
    async fn list_consumer_groups(&self) -> Result<BTreeMap<String, String>> {
        let consumer = Arc::clone(&self.consumer);
        let timeout = self.timeout;

        blocking(move || {
            let groups = consumer.fetch_group_list(None, timeout)?;

            Ok(groups
                .groups()
                .iter()
                .map(|g| (g.name().to_string(), g.protocol_type().to_string()))
                .collect())
        })
        .await
    }

    /// Describes all requested groups from a single group list request.
    async fn describe_consumer_groups(
        &self,
        groups: &[String],
    ) -> Result<Vec<ConsumerGroupDescriptor>> {
        let consumer = Arc::clone(&self.consumer);
        let timeout = self.timeout;
        let mut requested = groups.iter().cloned().collect::<BTreeSet<_>>();

        blocking(move || {
            let list = consumer.fetch_group_list(None, timeout)?;

            let descriptors = list
                .groups()
                .iter()
                .filter(|info| requested.remove(info.name()))
                .map(|info| ConsumerGroupDescriptor {
                    group_id: info.name().to_string(),
                    state: info.state().to_string(),
                    protocol_type: info.protocol_type().to_string(),
                    members: info
                        .members()
                        .iter()
                        .map(|m| GroupMember {
                            member_id: m.id().to_string(),
                            client_id: m.client_id().to_string(),
                            client_host: m.client_host().to_string(),
                        })
                        .collect(),
                })
                .collect();

            if !requested.is_empty() {
                debug!(groups = ?requested, "consumer groups vanished before they were described");
            }

            Ok(descriptors)
        })
        .await
    }

    /// The librdkafka handle is released when the admin is dropped.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| Error::Connection(format!("blocking librdkafka call failed: {err}")))?
}

/// Every partition of every non-internal topic.
fn all_partitions(consumer: &BaseConsumer, timeout: Duration) -> Result<TopicPartitions> {
    let metadata = consumer.fetch_metadata(None, timeout)?;

    let mut partitions = TopicPartitions::new();
    for topic in metadata.topics() {
        if topic.name().starts_with("__") || topic.error().is_some() {
            continue;
        }

        partitions.extend_topic(topic.name(), topic.partitions().iter().map(|p| p.id()));
    }

    Ok(partitions)
}

/// librdkafka does not keep the broker's error code for per-partition failures.
fn kafka_error(err: &KafkaError) -> ProtocolError {
    debug!(%err, "partition request failed");
    ProtocolError::UnknownServerError
}
