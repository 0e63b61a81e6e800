use crate::models::{Enrollment, RosterEntry};

use super::{CourseSet, SyncError};

/// Resolve each enrollment to the external id of the course it came from.
///
/// Enrollments without a child link belong to the parent. A link to a
/// course outside the set means the merge changed under us and is an error.
pub fn resolve_roster(
    course_set: &CourseSet,
    enrollments: Vec<Enrollment>,
) -> Result<Vec<RosterEntry>, SyncError> {
    enrollments
        .into_iter()
        .map(|e| {
            let external_course_id = match e.child_course_id.as_deref() {
                None => course_set.parent().external_id.clone(),
                Some(child_id) => course_set
                    .by_internal_id(child_id)
                    .map(|c| c.external_id.clone())
                    .ok_or_else(|| SyncError::UnresolvedEnrollment {
                        user_name: e.user_name.clone(),
                        child_course_id: child_id.to_string(),
                    })?,
            };
            Ok(RosterEntry {
                user_id: e.user_id,
                user_name: e.user_name,
                course_role_id: e.course_role_id,
                external_course_id,
                available: e.available,
            })
        })
        .collect()
}
