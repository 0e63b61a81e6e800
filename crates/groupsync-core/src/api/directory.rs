use async_trait::async_trait;
use tracing::debug;

use crate::models::{Course, Enrollment, Group, GroupMembershipEntry, GroupSetRef};

use super::ApiError;

/// Operations the reconciliation engine needs from the course directory.
///
/// Implementations own transport, authentication and paging. Every call
/// either succeeds or returns an `ApiError` whose category (not found,
/// already exists, failure) is all the engine looks at.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Fetch a course by its course id. Reports `has_children`.
    async fn get_parent_course(&self, course_id: &str) -> Result<Course, ApiError>;

    /// Fetch the child courses merged into the parent.
    async fn get_child_courses(&self, parent: &Course) -> Result<Vec<Course>, ApiError>;

    /// Look up the group set with `external_id`, creating it when missing.
    async fn get_or_create_group_set(
        &self,
        parent: &Course,
        external_id: &str,
    ) -> Result<GroupSetRef, ApiError>;

    /// Look up the group set without creating it.
    async fn find_group_set(
        &self,
        parent: &Course,
        external_id: &str,
    ) -> Result<Option<String>, ApiError>;

    async fn list_groups(&self, parent: &Course, group_set_id: &str)
        -> Result<Vec<Group>, ApiError>;

    /// Create the group that mirrors `course`.
    async fn create_group(
        &self,
        parent: &Course,
        group_set_id: &str,
        course: &Course,
    ) -> Result<Group, ApiError>;

    async fn delete_group(&self, parent: &Course, group: &Group) -> Result<(), ApiError>;

    /// Enrollments of the parent course, including merged child enrollments.
    async fn get_course_roster(&self, parent: &Course) -> Result<Vec<Enrollment>, ApiError>;

    /// User ids of the members of one group.
    async fn list_group_members(
        &self,
        parent: &Course,
        group: &Group,
    ) -> Result<Vec<String>, ApiError>;

    async fn add_user_to_group(
        &self,
        parent: &Course,
        external_group_id: &str,
        user_name: &str,
    ) -> Result<(), ApiError>;

    async fn remove_user_from_group(
        &self,
        parent: &Course,
        external_group_id: &str,
        user_name: &str,
    ) -> Result<(), ApiError>;

    /// Memberships of every group in the set, one entry per (group, member).
    /// The group list is fetched again so groups created or deleted earlier
    /// in the run are reflected.
    async fn get_group_roster(
        &self,
        parent: &Course,
        group_set_id: &str,
    ) -> Result<Vec<GroupMembershipEntry>, ApiError> {
        let groups = self.list_groups(parent, group_set_id).await?;
        let mut roster = Vec::new();
        for group in &groups {
            let members = self.list_group_members(parent, group).await?;
            debug!(group = %group.external_id, count = members.len(), "Group members fetched");
            roster.extend(
                members
                    .into_iter()
                    .map(|user_id| GroupMembershipEntry::new(user_id, group)),
            );
        }
        Ok(roster)
    }
}
