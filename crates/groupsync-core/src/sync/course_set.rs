use std::collections::HashSet;

use serde::Serialize;

use crate::models::Course;

use super::SyncError;

/// Appended to the parent external id to key the managed group set.
pub const GROUP_SET_SUFFIX: &str = "_auto_group_set";

/// The courses that should each have a group: the parent first, then its
/// children in the order the directory returned them.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSet {
    courses: Vec<Course>,
}

impl CourseSet {
    /// Assemble the set. External ids must be unique since they are the
    /// correlation key for groups.
    pub fn build(parent: Course, children: Vec<Course>) -> Result<Self, SyncError> {
        let mut courses = Vec::with_capacity(children.len() + 1);
        courses.push(parent);
        courses.extend(children);

        let mut seen = HashSet::new();
        for course in &courses {
            if !seen.insert(course.external_id.as_str()) {
                return Err(SyncError::DuplicateExternalId(course.external_id.clone()));
            }
        }
        Ok(Self { courses })
    }

    pub fn parent(&self) -> &Course {
        &self.courses[0]
    }

    pub fn children(&self) -> &[Course] {
        &self.courses[1..]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Course> {
        self.courses.iter()
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    /// Find a course by its primary key.
    pub fn by_internal_id(&self, internal_id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.internal_id == internal_id)
    }

    pub fn group_set_external_id(&self) -> String {
        format!("{}{}", self.parent().external_id, GROUP_SET_SUFFIX)
    }
}

impl<'a> IntoIterator for &'a CourseSet {
    type Item = &'a Course;
    type IntoIter = std::slice::Iter<'a, Course>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
