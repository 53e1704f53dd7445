//! Resolves which consumer groups a collection run covers.

use std::collections::BTreeMap;

use futures::future::join_all;
use regex::Regex;
use tracing::{debug, warn};

use crate::client::consumer_group::ConsumerGroupDescriptor;
use crate::client::{Client, ClusterAdmin, PartitionScope};
use crate::collect::{Error, GroupError};
use crate::topic::TopicPartitions;

/// Maximum number of consumer groups collected by one run in regex mode.
pub const MAX_CONSUMER_GROUPS: usize = 200;

/// How consumer groups are chosen.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Explicit group to topics mapping.
    Static(BTreeMap<String, Vec<String>>),

    /// Every discovered group whose ID matches.
    Regex(Regex),
}

/// A consumer group selected for collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTarget {
    pub descriptor: ConsumerGroupDescriptor,

    pub scope: PartitionScope,
}

impl GroupTarget {
    pub fn group_id(&self) -> &str {
        &self.descriptor.group_id
    }
}

/// Outcome of group selection.
#[derive(Debug, Default)]
pub struct Plan {
    /// Groups to collect.
    pub groups: Vec<GroupTarget>,

    /// Matching groups beyond [`MAX_CONSUMER_GROUPS`].
    pub skipped: Vec<String>,

    /// Discovered groups not matching the regex.
    pub unmatched: Vec<String>,

    /// Configured groups none of whose topics resolved to a partition.
    pub without_partitions: Vec<String>,

    /// Topics that could not be resolved.
    pub failures: Vec<GroupError>,
}

/// Resolves the topics of every configured group to partitions.
///
/// Groups are resolved concurrently. A topic that fails to resolve is skipped, a group left without partitions
/// is not collected.
pub async fn select_static<C>(client: &C, groups: &BTreeMap<String, Vec<String>>) -> Plan
where
    C: Client + ?Sized,
{
    warn!(
        "Argument 'consumer_groups' is deprecated and will be removed in a future version. \
         Use 'consumer_group_regex' instead."
    );

    let resolved = join_all(groups.iter().map(|(group, topics)| async move {
        let (partitions, failures) = resolve_topics(client, group, topics).await;
        (group, partitions, failures)
    }))
    .await;

    let mut plan = Plan::default();
    for (group, partitions, failures) in resolved {
        plan.failures.extend(failures);

        if partitions.is_empty() {
            plan.without_partitions.push(group.clone());
            continue;
        }

        plan.groups.push(GroupTarget {
            descriptor: ConsumerGroupDescriptor::new(group.as_str()),
            scope: PartitionScope::Partitions(partitions),
        });
    }

    if !plan.failures.is_empty() {
        let failures = plan.failures.iter().map(ToString::to_string).collect::<Vec<_>>();
        warn!(?failures, "Failed to resolve topics of consumer groups");
    }

    if !plan.without_partitions.is_empty() {
        warn!(
            groups = ?plan.without_partitions,
            "No topic partitions found for consumer groups, skipping them",
        );
    }

    plan
}

async fn resolve_topics<C>(
    client: &C,
    group: &str,
    topics: &[String],
) -> (TopicPartitions, Vec<GroupError>)
where
    C: Client + ?Sized,
{
    let mut partitions = TopicPartitions::new();
    let mut failures = vec![];

    for topic in topics {
        match client.partitions(topic).await {
            Ok(ids) => partitions.extend_topic(topic.as_str(), ids),
            Err(source) => failures.push(GroupError::TopicResolution {
                group: group.to_string(),
                topic: topic.clone(),
                source,
            }),
        }
    }

    (partitions, failures)
}

/// Discovers all consumer groups and selects the ones matching `regex`.
pub async fn select_by_regex<A>(admin: &A, regex: &Regex) -> Result<Plan, Error>
where
    A: ClusterAdmin + ?Sized,
{
    let groups = admin
        .list_consumer_groups()
        .await
        .map_err(|source| Error::Discovery {
            action: "list",
            source,
        })?
        .into_keys()
        .collect::<Vec<_>>();

    let descriptors = if groups.is_empty() {
        vec![]
    } else {
        admin
            .describe_consumer_groups(&groups)
            .await
            .map_err(|source| Error::Discovery {
                action: "describe",
                source,
            })?
    };

    let plan = match_groups(descriptors, regex, MAX_CONSUMER_GROUPS);

    if !plan.unmatched.is_empty() {
        debug!(
            groups = ?plan.unmatched,
            "Skipped collecting consumer offsets for unmatched consumer groups",
        );
    }

    if !plan.skipped.is_empty() {
        debug!(
            limit = MAX_CONSUMER_GROUPS,
            groups = ?plan.skipped,
            "Reached consumer group limit, skipping consumer groups",
        );
    }

    Ok(plan)
}

/// Splits `descriptors` into at most `limit` matching groups, the matching rest, and the non-matching ones.
///
/// Groups are taken in group ID order so the cut-off is stable between runs.
pub(crate) fn match_groups(
    mut descriptors: Vec<ConsumerGroupDescriptor>,
    regex: &Regex,
    limit: usize,
) -> Plan {
    descriptors.sort_by(|a, b| a.group_id.cmp(&b.group_id));
    descriptors.dedup_by(|a, b| a.group_id == b.group_id);

    let mut plan = Plan::default();
    for descriptor in descriptors {
        if !regex.is_match(&descriptor.group_id) {
            plan.unmatched.push(descriptor.group_id);
            continue;
        }

        if plan.groups.len() >= limit {
            plan.skipped.push(descriptor.group_id);
            continue;
        }

        plan.groups.push(GroupTarget {
            descriptor,
            scope: PartitionScope::Committed,
        });
    }

    plan
}
