use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// A single partition of a topic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopicPartition {
    /// The name of the topic.
    pub topic: String,

    /// The partition index.
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl Display for TopicPartition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

/// Partitions to collect for one consumer group, keyed by topic name.
///
/// Partition indexes have set semantics per topic, duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicPartitions {
    topics: BTreeMap<String, BTreeSet<i32>>,
}

impl TopicPartitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, topic: impl Into<String>, partition: i32) {
        self.topics.entry(topic.into()).or_default().insert(partition);
    }

    /// Adds every partition of `topic`. A topic without partitions is not recorded.
    pub fn extend_topic(&mut self, topic: impl Into<String>, partitions: impl IntoIterator<Item = i32>) {
        let mut partitions = partitions.into_iter().peekable();
        if partitions.peek().is_none() {
            return;
        }

        self.topics.entry(topic.into()).or_default().extend(partitions);
    }

    /// Number of topic-partitions, not topics.
    pub fn len(&self) -> usize {
        self.topics.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn topics(&self) -> impl Iterator<Item = (&str, &BTreeSet<i32>)> {
        self.topics.iter().map(|(name, partitions)| (name.as_str(), partitions))
    }

    /// Iterates in (topic, partition) order.
    pub fn iter(&self) -> impl Iterator<Item = TopicPartition> + '_ {
        self.topics.iter().flat_map(|(topic, partitions)| {
            partitions
                .iter()
                .map(move |partition| TopicPartition::new(topic.as_str(), *partition))
        })
    }
}

impl FromIterator<TopicPartition> for TopicPartitions {
    fn from_iter<T: IntoIterator<Item = TopicPartition>>(iter: T) -> Self {
        let mut tps = Self::new();
        for TopicPartition { topic, partition } in iter {
            tps.insert(topic, partition);
        }
        tps
    }
}
