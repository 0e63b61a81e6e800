use serde::{Deserialize, Serialize};

/// A course taking part in the merge: the parent or one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Primary key assigned by the platform.
    pub internal_id: String,
    /// Human readable course key, used to address the course in URLs.
    pub course_id: String,
    /// Stable key shared with the group that mirrors this course.
    pub external_id: String,
    pub name: String,
    #[serde(default)]
    pub has_children: bool,
}

impl Course {
    pub fn new(
        internal_id: impl Into<String>,
        course_id: impl Into<String>,
        external_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            internal_id: internal_id.into(),
            course_id: course_id.into(),
            external_id: external_id.into(),
            name: name.into(),
            has_children: false,
        }
    }

    pub fn with_children(mut self) -> Self {
        self.has_children = true;
        self
    }

    /// Path key for the course in directory URLs.
    pub fn key(&self) -> String {
        format!("courseId:{}", self.course_id)
    }

    /// Description placed on the group created for this course.
    pub fn group_description(&self) -> String {
        format!(
            "<p>This is the group for users enrolled in the child course : {}</p>",
            self.name
        )
    }
}
