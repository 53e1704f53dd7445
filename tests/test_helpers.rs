#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use consumer_lag::client::consumer_group::{ConsumerGroupDescriptor, GroupMember};
use consumer_lag::client::error::{Error, ProtocolError, RequestContext, Result};
use consumer_lag::client::{
    Client, ClusterAdmin, Connector, PartitionOffset, PartitionScope, NO_OFFSET,
};
use consumer_lag::emit::{self, MetricBatch, Sink};
use consumer_lag::topic::{TopicPartition, TopicPartitions};
use parking_lot::Mutex;

static LOG_SETUP: Once = Once::new();

/// Enables logging if `RUST_LOG` is set.
pub fn maybe_start_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        start_logging()
    }
}

pub fn start_logging() {
    use tracing_log::LogTracer;
    use tracing_subscriber::{filter::EnvFilter, FmtSubscriber};

    LOG_SETUP.call_once(|| {
        LogTracer::init().unwrap();

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();

        tracing::subscriber::set_global_default(subscriber).unwrap();
    })
}

/// Environment variable to configure if integration tests should be run.
pub const ENV_KAFKA_CONNECT: &str = "KAFKA_CONNECT";

/// Returns the bootstrap brokers of the test cluster, or skips the test if `KAFKA_CONNECT` is not set.
#[macro_export]
macro_rules! maybe_skip_kafka_integration {
    () => {{
        match std::env::var($crate::test_helpers::ENV_KAFKA_CONNECT) {
            Ok(brokers) => brokers
                .split(',')
                .map(|s| s.trim().to_string())
                .collect::<Vec<String>>(),
            Err(_) => {
                eprintln!(
                    "skipping Kafka integration tests - set {} to run",
                    $crate::test_helpers::ENV_KAFKA_CONNECT
                );
                return;
            }
        }
    }};
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Offsets,
    Watermarks,
}

/// A backend call, numbered in the order calls were made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub seq: u64,
    pub op: Op,
    pub group: Option<String>,
    pub partitions: Vec<TopicPartition>,
}

#[derive(Debug, Default)]
struct State {
    topics: Mutex<BTreeMap<String, Vec<i32>>>,
    committed: Mutex<BTreeMap<String, BTreeMap<TopicPartition, i64>>>,
    watermarks: Mutex<BTreeMap<TopicPartition, i64>>,
    groups: Mutex<Vec<ConsumerGroupDescriptor>>,

    failing_offsets: Mutex<BTreeSet<String>>,
    failing_watermarks: Mutex<BTreeSet<String>>,
    panicking: Mutex<BTreeSet<String>>,
    fail_list: AtomicBool,
    fail_describe: AtomicBool,
    fail_client: AtomicBool,
    fail_admin: AtomicBool,
    fail_close: AtomicBool,

    /// Commits and produces this many records right after each committed offset read.
    advance_after_offset_read: Mutex<Option<i64>>,

    seq: AtomicU64,
    events: Mutex<Vec<Event>>,

    clients_created: AtomicUsize,
    admins_created: AtomicUsize,
    client_closed: AtomicBool,
    admin_closed: AtomicBool,
}

/// In-memory cluster implementing all client contracts.
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    state: Arc<State>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(self, name: &str, partitions: &[i32]) -> Self {
        self.state
            .topics
            .lock()
            .insert(name.to_string(), partitions.to_vec());
        self
    }

    pub fn watermark(self, topic: &str, partition: i32, offset: i64) -> Self {
        self.state
            .watermarks
            .lock()
            .insert(TopicPartition::new(topic, partition), offset);
        self
    }

    pub fn commit(self, group: &str, topic: &str, partition: i32, offset: i64) -> Self {
        self.state
            .committed
            .lock()
            .entry(group.to_string())
            .or_default()
            .insert(TopicPartition::new(topic, partition), offset);
        self
    }

    /// Registers a group for discovery, with one member.
    pub fn group(self, group: &str) -> Self {
        self.state.groups.lock().push(ConsumerGroupDescriptor {
            group_id: group.to_string(),
            state: "Stable".to_string(),
            protocol_type: "consumer".to_string(),
            members: vec![GroupMember {
                member_id: format!("{group}-member"),
                client_id: format!("{group}-client"),
                client_host: "/127.0.0.1".to_string(),
            }],
        });
        self
    }

    pub fn fail_offsets(self, group: &str) -> Self {
        self.state.failing_offsets.lock().insert(group.to_string());
        self
    }

    /// Fails every high-water mark read touching `topic`.
    pub fn fail_watermarks(self, topic: &str) -> Self {
        self.state.failing_watermarks.lock().insert(topic.to_string());
        self
    }

    pub fn panic_on(self, group: &str) -> Self {
        self.state.panicking.lock().insert(group.to_string());
        self
    }

    pub fn fail_list(self) -> Self {
        self.state.fail_list.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_describe(self) -> Self {
        self.state.fail_describe.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_client(self) -> Self {
        self.state.fail_client.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_admin(self) -> Self {
        self.state.fail_admin.store(true, Ordering::SeqCst);
        self
    }

    /// Fails closing the client and the admin. Both still count as closed.
    pub fn fail_close(self) -> Self {
        self.state.fail_close.store(true, Ordering::SeqCst);
        self
    }

    pub fn advance_after_offset_read(self, records: i64) -> Self {
        *self.state.advance_after_offset_read.lock() = Some(records);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().clone()
    }

    pub fn clients_created(&self) -> usize {
        self.state.clients_created.load(Ordering::SeqCst)
    }

    pub fn admins_created(&self) -> usize {
        self.state.admins_created.load(Ordering::SeqCst)
    }

    pub fn client_closed(&self) -> bool {
        self.state.client_closed.load(Ordering::SeqCst)
    }

    pub fn admin_closed(&self) -> bool {
        self.state.admin_closed.load(Ordering::SeqCst)
    }

    fn close_result(&self, handle: &str) -> Result<()> {
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(Error::Connection(format!("{handle} close failed")));
        }

        Ok(())
    }

    fn record(&self, op: Op, group: Option<&str>, partitions: Vec<TopicPartition>) {
        let seq = self.state.seq.fetch_add(1, Ordering::SeqCst);
        self.state.events.lock().push(Event {
            seq,
            op,
            group: group.map(ToString::to_string),
            partitions,
        });
    }
}

#[async_trait]
impl Connector for FakeCluster {
    type Client = Self;
    type Admin = Self;

    async fn create_client(&self) -> Result<Self::Client> {
        if self.state.fail_client.load(Ordering::SeqCst) {
            return Err(Error::Connection("client refused".to_string()));
        }

        self.state.clients_created.fetch_add(1, Ordering::SeqCst);
        Ok(self.clone())
    }

    async fn create_cluster_admin(&self) -> Result<Self::Admin> {
        if self.state.fail_admin.load(Ordering::SeqCst) {
            return Err(Error::Connection("admin refused".to_string()));
        }

        self.state.admins_created.fetch_add(1, Ordering::SeqCst);
        Ok(self.clone())
    }
}

#[async_trait]
impl Client for FakeCluster {
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>> {
        self.state.topics.lock().get(topic).cloned().ok_or_else(|| {
            Error::server(
                ProtocolError::UnknownTopicOrPartition,
                RequestContext::Topic(topic.to_string()),
            )
        })
    }

    async fn committed_offsets(
        &self,
        group: &str,
        scope: &PartitionScope,
    ) -> Result<Vec<PartitionOffset>> {
        if self.state.panicking.lock().contains(group) {
            panic!("backend blew up for {group}");
        }

        if self.state.failing_offsets.lock().contains(group) {
            return Err(Error::server(
                ProtocolError::CoordinatorNotAvailable,
                RequestContext::Group(group.to_string()),
            ));
        }

        let rows = {
            let committed = self.state.committed.lock();
            let group_offsets = committed.get(group).cloned().unwrap_or_default();

            match scope {
                PartitionScope::Partitions(partitions) => partitions
                    .iter()
                    .map(|tp| {
                        let offset = group_offsets.get(&tp).copied().unwrap_or(NO_OFFSET);
                        PartitionOffset::new(tp, offset)
                    })
                    .collect::<Vec<_>>(),
                PartitionScope::Committed => group_offsets
                    .into_iter()
                    .map(|(tp, offset)| PartitionOffset::new(tp, offset))
                    .collect(),
            }
        };

        self.record(
            Op::Offsets,
            Some(group),
            rows.iter().map(PartitionOffset::topic_partition).collect(),
        );

        if let Some(records) = *self.state.advance_after_offset_read.lock() {
            let mut committed = self.state.committed.lock();
            let mut watermarks = self.state.watermarks.lock();
            for row in &rows {
                let tp = row.topic_partition();
                *watermarks.entry(tp.clone()).or_default() += records;
                if let Some(offset) = committed.get_mut(group).and_then(|o| o.get_mut(&tp)) {
                    *offset += records;
                }
            }
        }

        Ok(rows)
    }

    async fn high_water_marks(&self, partitions: &TopicPartitions) -> Result<Vec<PartitionOffset>> {
        {
            let failing = self.state.failing_watermarks.lock();
            if let Some((topic, _)) = partitions.topics().find(|(topic, _)| failing.contains(*topic)) {
                return Err(Error::server(
                    ProtocolError::NotLeaderOrFollower,
                    RequestContext::Topic(topic.to_string()),
                ));
            }
        }

        let rows = {
            let watermarks = self.state.watermarks.lock();
            partitions
                .iter()
                .map(|tp| match watermarks.get(&tp) {
                    Some(offset) => PartitionOffset::new(tp, *offset),
                    None => PartitionOffset::error(tp, ProtocolError::UnknownTopicOrPartition),
                })
                .collect::<Vec<_>>()
        };

        self.record(Op::Watermarks, None, partitions.iter().collect());

        Ok(rows)
    }

    async fn close(&self) -> Result<()> {
        self.state.client_closed.store(true, Ordering::SeqCst);
        self.close_result("client")
    }
}

#[async_trait]
impl ClusterAdmin for FakeCluster {
    async fn list_consumer_groups(&self) -> Result<BTreeMap<String, String>> {
        if self.state.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Connection("list groups failed".to_string()));
        }

        Ok(self
            .state
            .groups
            .lock()
            .iter()
            .map(|g| (g.group_id.clone(), g.protocol_type.clone()))
            .collect())
    }

    async fn describe_consumer_groups(
        &self,
        groups: &[String],
    ) -> Result<Vec<ConsumerGroupDescriptor>> {
        if self.state.fail_describe.load(Ordering::SeqCst) {
            return Err(Error::Connection("describe groups failed".to_string()));
        }

        Ok(self
            .state
            .groups
            .lock()
            .iter()
            .filter(|g| groups.contains(&g.group_id))
            .cloned()
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.state.admin_closed.store(true, Ordering::SeqCst);
        self.close_result("admin")
    }
}

/// Keeps every submitted batch in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    batches: Arc<Mutex<Vec<MetricBatch>>>,
    rejected: Arc<Mutex<BTreeSet<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(self, group: &str) -> Self {
        self.rejected.lock().insert(group.to_string());
        self
    }

    /// Submitted batches, ordered by entity name.
    pub fn batches(&self) -> Vec<MetricBatch> {
        let mut batches = self.batches.lock().clone();
        batches.sort_by(|a, b| a.entity.name.cmp(&b.entity.name));
        batches
    }

    pub fn batch(&self, group: &str) -> Option<MetricBatch> {
        self.batches
            .lock()
            .iter()
            .find(|b| b.entity.name == group)
            .cloned()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn submit(&self, batch: MetricBatch) -> Result<(), emit::Error> {
        if self.rejected.lock().contains(&batch.entity.name) {
            return Err(emit::Error::Rejected(format!(
                "entity {} rejected",
                batch.entity.name
            )));
        }

        self.batches.lock().push(batch);
        Ok(())
    }
}
