use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Kafka error codes a broker may attach to offset, metadata and group responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolError {
    UnknownServerError,
    OffsetOutOfRange,
    UnknownTopicOrPartition,
    LeaderNotAvailable,
    NotLeaderOrFollower,
    RequestTimedOut,
    CoordinatorLoadInProgress,
    CoordinatorNotAvailable,
    NotCoordinator,
    TopicAuthorizationFailed,
    GroupAuthorizationFailed,
    GroupIdNotFound,
    UnstableOffsetCommit,
    Unknown(i16),
}

impl ProtocolError {
    /// Maps a wire error code, `0` means no error.
    pub fn new(code: i16) -> Option<Self> {
        let err = match code {
            0 => return None,
            -1 => Self::UnknownServerError,
            1 => Self::OffsetOutOfRange,
            3 => Self::UnknownTopicOrPartition,
            5 => Self::LeaderNotAvailable,
            6 => Self::NotLeaderOrFollower,
            7 => Self::RequestTimedOut,
            14 => Self::CoordinatorLoadInProgress,
            15 => Self::CoordinatorNotAvailable,
            16 => Self::NotCoordinator,
            29 => Self::TopicAuthorizationFailed,
            30 => Self::GroupAuthorizationFailed,
            69 => Self::GroupIdNotFound,
            88 => Self::UnstableOffsetCommit,
            other => Self::Unknown(other),
        };

        Some(err)
    }

    pub fn code(&self) -> i16 {
        match self {
            Self::UnknownServerError => -1,
            Self::OffsetOutOfRange => 1,
            Self::UnknownTopicOrPartition => 3,
            Self::LeaderNotAvailable => 5,
            Self::NotLeaderOrFollower => 6,
            Self::RequestTimedOut => 7,
            Self::CoordinatorLoadInProgress => 14,
            Self::CoordinatorNotAvailable => 15,
            Self::NotCoordinator => 16,
            Self::TopicAuthorizationFailed => 29,
            Self::GroupAuthorizationFailed => 30,
            Self::GroupIdNotFound => 69,
            Self::UnstableOffsetCommit => 88,
            Self::Unknown(code) => *code,
        }
    }
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown({code})"),
            other => write!(f, "{other:?} ({})", other.code()),
        }
    }
}

/// Which entity a failed request was about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestContext {
    Topic(String),
    Group(String),
}

impl Display for RequestContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Topic(topic) => write!(f, "topic \"{topic}\""),
            Self::Group(group) => write!(f, "group \"{group}\""),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Server error {protocol_error} for {request}: {error_message:?}")]
    ServerError {
        protocol_error: ProtocolError,
        error_message: Option<String>,
        request: RequestContext,
    },

    #[cfg(feature = "backend-rdkafka")]
    #[error("librdkafka error: {0}")]
    RdKafka(#[from] rdkafka::error::KafkaError),
}

impl Error {
    pub fn server(protocol_error: ProtocolError, request: RequestContext) -> Self {
        Self::ServerError {
            protocol_error,
            error_message: None,
            request,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_codes() {
        assert_eq!(ProtocolError::new(0), None);

        for code in [-1, 1, 3, 5, 6, 7, 14, 15, 16, 29, 30, 69, 88, 42] {
            let err = ProtocolError::new(code).unwrap();
            assert_eq!(err.code(), code, "{err}");
        }

        assert_eq!(ProtocolError::new(42), Some(ProtocolError::Unknown(42)));
        assert_eq!(ProtocolError::Unknown(42).to_string(), "Unknown(42)");
    }

    #[test]
    fn server_error_display() {
        let err = Error::server(
            ProtocolError::GroupIdNotFound,
            RequestContext::Group("billing".to_string()),
        );

        assert_eq!(
            err.to_string(),
            "Server error GroupIdNotFound (69) for group \"billing\": None"
        );
    }
}
