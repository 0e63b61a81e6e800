//! Data models for course, group and roster entities.
//!
//! - `Course`: a parent course or a merged child course
//! - `Group`, `GroupSetRef`: the groups managed inside the parent course
//! - `Enrollment`, `RosterEntry`: course enrollments, raw and resolved
//! - `GroupMembershipEntry`: one (group, member) pair of the group set

pub mod course;
pub mod group;
pub mod roster;

pub use course::Course;
pub use group::{Group, GroupMembershipEntry, GroupSetRef};
pub use roster::{Enrollment, RosterEntry, STUDENT_ROLE};
