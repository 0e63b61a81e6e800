//! Reconciliation engine.
//!
//! A run works through three steps, each planned in full before it is
//! applied:
//!
//! 1. `CourseSet`: the parent course and its merged children
//! 2. `GroupPlan`: create or delete groups until every course in the set
//!    has exactly one group with the same external id
//! 3. `ActionPlan`: add or move students so each one is in the group of
//!    the course they are enrolled in
//!
//! `Reconciler` drives the steps against a `Directory`. Any failure ends the
//! run with a `SyncError`.

pub mod course_set;
pub mod error;
pub mod groups;
pub mod membership;
pub mod roster;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use course_set::{CourseSet, GROUP_SET_SUFFIX};
pub use error::{FailureKind, SyncError};
pub use groups::{apply_group_plan, plan_groups, Correlation, CorrelationIndex, GroupPlan};
pub use membership::{
    execute_plan, plan_membership, ActionPlan, ExecutionSummary, MatchPolicy, MembershipAction,
    Mutation, PlannedAction,
};
pub use roster::resolve_roster;
pub use runner::{Reconciler, SyncOptions, SyncReport};
