use thiserror::Error;

use crate::client::error::Error as ClientError;
use crate::emit;

/// Errors that abort a whole collection run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Client error: {0}")]
    Client(#[source] ClientError),

    #[error("Failed to {action} consumer groups: {source}")]
    Discovery {
        action: &'static str,
        source: ClientError,
    },
}

/// Errors confined to one consumer group. Other groups are still collected.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("Failed to resolve topic \"{topic}\" of consumer group \"{group}\": {source}")]
    TopicResolution {
        group: String,
        topic: String,
        source: ClientError,
    },

    #[error("Failed to collect consumer offsets for group \"{group}\": {source}")]
    ConsumerOffsets { group: String, source: ClientError },

    #[error("Failed to collect high-water marks for group \"{group}\": {source}")]
    HighWaterMarks { group: String, source: ClientError },

    #[error("Failed to emit metrics for consumer group \"{group}\": {source}")]
    Emission { group: String, source: emit::Error },

    #[error("Collection task of consumer group \"{group}\" failed: {message}")]
    Task { group: String, message: String },
}

impl GroupError {
    /// The consumer group the error is attributed to.
    pub fn group(&self) -> &str {
        match self {
            Self::TopicResolution { group, .. }
            | Self::ConsumerOffsets { group, .. }
            | Self::HighWaterMarks { group, .. }
            | Self::Emission { group, .. }
            | Self::Task { group, .. } => group,
        }
    }
}
