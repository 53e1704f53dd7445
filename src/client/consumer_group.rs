//! Descriptions of consumer groups as reported by the group coordinators.

/// A member of a consumer group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMember {
    /// The member ID assigned by the group coordinator.
    pub member_id: String,

    /// The client ID used in the member's latest join group request.
    pub client_id: String,

    /// The client host.
    pub client_host: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerGroupDescriptor {
    /// The group ID string.
    pub group_id: String,

    /// The group state string, or the empty string.
    pub state: String,

    /// The group protocol type, or the empty string.
    pub protocol_type: String,

    /// The group members.
    pub members: Vec<GroupMember>,
}

impl ConsumerGroupDescriptor {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            ..Default::default()
        }
    }

    /// Client IDs of all members, used for inclusion logging.
    pub fn client_ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.client_id.as_str()).collect()
    }
}
