use serde::{Deserialize, Serialize};

/// A group inside the managed group set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub internal_id: String,
    /// Matches the external id of the course the group mirrors.
    pub external_id: String,
    pub name: String,
}

impl Group {
    pub fn new(
        internal_id: impl Into<String>,
        external_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            internal_id: internal_id.into(),
            external_id: external_id.into(),
            name: name.into(),
        }
    }
}

/// The group set that holds one group per course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSetRef {
    pub id: String,
    /// True when the set did not exist and was created by this run.
    pub created: bool,
}

/// A member of one group in the set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembershipEntry {
    pub user_id: String,
    pub external_group_id: String,
    pub group_id: String,
}

impl GroupMembershipEntry {
    pub fn new(user_id: impl Into<String>, group: &Group) -> Self {
        Self {
            user_id: user_id.into(),
            external_group_id: group.external_id.clone(),
            group_id: group.internal_id.clone(),
        }
    }
}
