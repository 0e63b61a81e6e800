use serde::{Deserialize, Serialize};

/// Course role of the users that are placed in groups.
pub const STUDENT_ROLE: &str = "Student";

/// A raw enrollment from the parent course roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: String,
    pub user_name: String,
    pub course_role_id: String,
    /// Internal id of the child course the enrollment came from, if any.
    pub child_course_id: Option<String>,
    pub available: bool,
}

/// An enrollment resolved to the external id of the course the user is
/// actually enrolled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub user_id: String,
    pub user_name: String,
    pub course_role_id: String,
    pub external_course_id: String,
    pub available: bool,
}

impl RosterEntry {
    pub fn is_student(&self) -> bool {
        self.course_role_id == STUDENT_ROLE
    }
}
