//! Collects offsets, high-water marks and lag of consumer groups.
//!
//! A run selects the consumer groups (see [`selector`]), then collects every group in its own task:
//!
//! 1. read the committed offsets of the group,
//! 2. read the high-water marks of the same partitions,
//! 3. assemble both into lag records,
//! 4. submit the records as one batch.
//!
//! Step 1 always completes before step 2 starts. A consumer committing between the two reads can then only make
//! the computed lag too large, never negative.

use std::sync::Arc;

use tracing::{debug, error, warn};

pub mod error;
pub mod lag;
pub mod reader;
pub mod selector;

pub use error::{Error, GroupError};

use crate::client::{Client, ClusterAdmin, Connector, PartitionScope};
use crate::config::Config;
use crate::emit::{MetricBatch, Sink};
use lag::assemble;
use reader::{read_consumer_offsets, read_high_water_marks, Snapshot};
use selector::{select_by_regex, select_static, GroupTarget, Plan, Selection};

/// Result of one consumer group's collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub group: String,

    /// Number of partition records assembled.
    pub records: usize,

    /// Whether the records reached the sink.
    pub emitted: bool,
}

/// Result of a collection run. Partial success is normal.
#[derive(Debug, Default)]
pub struct CollectReport {
    /// Every group a task ran for, in selection order.
    pub groups: Vec<GroupReport>,

    /// Matching groups beyond the group limit.
    pub skipped: Vec<String>,

    /// Discovered groups not matching the regex.
    pub unmatched: Vec<String>,

    /// Configured groups without any resolvable partition.
    pub without_partitions: Vec<String>,

    /// Errors confined to single groups.
    pub failures: Vec<GroupError>,
}

impl CollectReport {
    /// Total number of records emitted.
    pub fn emitted_records(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| g.emitted)
            .map(|g| g.records)
            .sum()
    }
}

/// Collects consumer group offsets of one cluster.
#[derive(Debug)]
pub struct Collector<C, S> {
    connector: C,
    sink: Arc<S>,
    cluster_name: Arc<str>,
    selection: Selection,
}

impl<C, S> Collector<C, S>
where
    C: Connector,
    S: Sink,
{
    pub fn new(
        connector: C,
        sink: S,
        cluster_name: impl Into<Arc<str>>,
        selection: Selection,
    ) -> Self {
        Self {
            connector,
            sink: Arc::new(sink),
            cluster_name: cluster_name.into(),
            selection,
        }
    }

    /// Fails with [`Error::Configuration`] if `config` selects no consumer groups.
    pub fn from_config(connector: C, sink: S, config: &Config) -> Result<Self, Error> {
        let selection = config.selection()?;

        Ok(Self::new(
            connector,
            sink,
            config.cluster_name.as_str(),
            selection,
        ))
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Runs one collection.
    ///
    /// Only client creation and consumer group discovery errors are returned, everything else is recorded in
    /// the report. The client and admin are closed before returning, whatever the outcome.
    pub async fn collect(&self) -> Result<CollectReport, Error> {
        let client = self
            .connector
            .create_client()
            .await
            .map(Arc::new)
            .map_err(Error::Client)?;

        let admin = match self.connector.create_cluster_admin().await {
            Ok(admin) => admin,
            Err(err) => {
                close_client(client.as_ref()).await;
                return Err(Error::Client(err));
            }
        };

        let result = self.run(&client, &admin).await;

        if let Err(err) = admin.close().await {
            debug!(%err, "Error closing cluster admin connection");
        }
        close_client(client.as_ref()).await;

        result
    }

    async fn run(&self, client: &Arc<C::Client>, admin: &C::Admin) -> Result<CollectReport, Error> {
        let Plan {
            groups,
            skipped,
            unmatched,
            without_partitions,
            failures,
        } = match &self.selection {
            Selection::Regex(regex) => select_by_regex(admin, regex).await?,
            Selection::Static(groups) => select_static(client.as_ref(), groups).await,
        };

        let mut report = CollectReport {
            groups: Vec::with_capacity(groups.len()),
            skipped,
            unmatched,
            without_partitions,
            failures,
        };

        let tasks = groups
            .into_iter()
            .map(|target| {
                let group = target.group_id().to_string();
                let client = Arc::clone(client);
                let sink = Arc::clone(&self.sink);
                let cluster_name = Arc::clone(&self.cluster_name);

                let handle = tokio::spawn(async move {
                    collect_group(client.as_ref(), sink.as_ref(), &cluster_name, target).await
                });

                (group, handle)
            })
            .collect::<Vec<_>>();

        for (group, handle) in tasks {
            match handle.await {
                Ok((group_report, failures)) => {
                    report.groups.push(group_report);
                    report.failures.extend(failures);
                }
                Err(err) => {
                    error!(group = %group, %err, "Consumer group collection task failed");
                    report.failures.push(GroupError::Task {
                        group,
                        message: err.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}

async fn close_client<T>(client: &T)
where
    T: Client + ?Sized,
{
    if let Err(err) = client.close().await {
        debug!(%err, "Error closing client connection");
    }
}

/// Collects and emits one consumer group.
async fn collect_group<C, S>(
    client: &C,
    sink: &S,
    cluster_name: &str,
    target: GroupTarget,
) -> (GroupReport, Vec<GroupError>)
where
    C: Client + ?Sized,
    S: Sink + ?Sized,
{
    let group = target.group_id();
    let mut failures = vec![];

    debug!(
        group,
        members = ?target.descriptor.client_ids(),
        "Collecting consumer group offsets",
    );

    let offsets = match read_consumer_offsets(client, group, &target.scope).await {
        Ok(offsets) => offsets,
        Err(err) => {
            warn!(group, %err, "Failed to collect consumer offsets");
            failures.push(err);
            Snapshot::new()
        }
    };

    // only the offsets decide which partitions a discovered group reads
    let committed;
    let partitions = match &target.scope {
        PartitionScope::Partitions(partitions) => partitions,
        PartitionScope::Committed => {
            committed = offsets.partitions();
            &committed
        }
    };

    let watermarks = match read_high_water_marks(client, group, partitions).await {
        Ok(watermarks) => watermarks,
        Err(err) => {
            warn!(group, %err, "Failed to collect high-water marks");
            failures.push(err);
            Snapshot::new()
        }
    };

    let records = assemble(&offsets, &watermarks);
    let mut report = GroupReport {
        group: group.to_string(),
        records: records.len(),
        emitted: false,
    };

    if records.is_empty() {
        debug!(group, "No offsets to report for consumer group");
        return (report, failures);
    }

    match sink
        .submit(MetricBatch::new(group, cluster_name, &records))
        .await
    {
        Ok(()) => report.emitted = true,
        Err(source) => {
            error!(group, err = %source, "Error setting metrics for consumer group");
            failures.push(GroupError::Emission {
                group: group.to_string(),
                source,
            });
        }
    }

    (report, failures)
}
