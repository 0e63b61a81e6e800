//! Membership reconciliation.
//!
//! Every student of the merged roster belongs in the group whose external id
//! equals the external id of the course they are enrolled in. The full
//! `ActionPlan` is computed before anything is changed so it can be
//! inspected (or printed on a dry run) before execution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::Directory;
use crate::models::{Course, GroupMembershipEntry, RosterEntry};

use super::SyncError;

const COMMENT_NOT_STUDENT: &str = "Only students can be in groups.";
const COMMENT_CORRECT: &str = "User is in the correct group.";
const COMMENT_WRONG: &str = "User is in the wrong group.";
const COMMENT_NO_GROUP: &str = "User in no group.";

/// Which existing membership a student is judged by when they belong to
/// more than one group of the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// The first membership listed for the user decides. A student who is
    /// also in the right group can still be moved out of the first one.
    #[default]
    FirstMatch,
    /// A membership in the target group wins over any other. Extra
    /// memberships are left alone.
    PreferCorrect,
}

impl MatchPolicy {
    fn select<'a>(
        self,
        entry: &RosterEntry,
        memberships: &'a [GroupMembershipEntry],
    ) -> Option<&'a GroupMembershipEntry> {
        let mut own = memberships.iter().filter(|m| m.user_id == entry.user_id);
        match self {
            MatchPolicy::FirstMatch => own.next(),
            MatchPolicy::PreferCorrect => {
                let first = own.next()?;
                let correct = std::iter::once(first)
                    .chain(own)
                    .find(|m| m.external_group_id == entry.external_course_id);
                correct.or(Some(first))
            }
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolicy::FirstMatch => write!(f, "first-match"),
            MatchPolicy::PreferCorrect => write!(f, "prefer-correct"),
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-match" => Ok(MatchPolicy::FirstMatch),
            "prefer-correct" => Ok(MatchPolicy::PreferCorrect),
            other => Err(format!(
                "unknown match policy '{}' (expected first-match or prefer-correct)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum MembershipAction {
    #[serde(rename = "none")]
    NoChange,
    Add,
    Move { from: String },
}

/// One directory call issued while executing a plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation<'a> {
    Remove { group: &'a str, user_name: &'a str },
    Add { group: &'a str, user_name: &'a str },
}

/// The decision for one roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    pub user_id: String,
    pub user_name: String,
    pub course_role_id: String,
    pub available: bool,
    /// External id of the group the user belongs in.
    pub target_group: String,
    #[serde(flatten)]
    pub action: MembershipAction,
    pub comment: &'static str,
}

impl PlannedAction {
    fn new(entry: &RosterEntry, action: MembershipAction, comment: &'static str) -> Self {
        Self {
            user_id: entry.user_id.clone(),
            user_name: entry.user_name.clone(),
            course_role_id: entry.course_role_id.clone(),
            available: entry.available,
            target_group: entry.external_course_id.clone(),
            action,
            comment,
        }
    }

    /// Calls needed for this entry, in execution order. A move removes
    /// before it adds.
    pub fn mutations(&self) -> Vec<Mutation<'_>> {
        let add = Mutation::Add {
            group: &self.target_group,
            user_name: &self.user_name,
        };
        match &self.action {
            MembershipAction::NoChange => vec![],
            MembershipAction::Add => vec![add],
            MembershipAction::Move { from } => vec![
                Mutation::Remove {
                    group: from,
                    user_name: &self.user_name,
                },
                add,
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionPlan {
    pub entries: Vec<PlannedAction>,
}

impl ActionPlan {
    pub fn iter(&self) -> std::slice::Iter<'_, PlannedAction> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when executing the plan would change nothing.
    pub fn is_noop(&self) -> bool {
        self.entries
            .iter()
            .all(|a| a.action == MembershipAction::NoChange)
    }

    pub fn for_user(&self, user_name: &str) -> Option<&PlannedAction> {
        self.entries.iter().find(|a| a.user_name == user_name)
    }

    /// Every call the plan would issue, in order.
    pub fn mutations(&self) -> Vec<Mutation<'_>> {
        self.entries.iter().flat_map(PlannedAction::mutations).collect()
    }
}

/// Decide what to do for each roster entry.
///
/// Non-students are never touched. Decisions for users already in a group
/// keep roster order, and adds for users in no group come after them.
pub fn plan_membership(
    roster: &[RosterEntry],
    memberships: &[GroupMembershipEntry],
    policy: MatchPolicy,
) -> ActionPlan {
    let mut entries = Vec::with_capacity(roster.len());
    let mut adds = Vec::new();

    for entry in roster {
        if !entry.is_student() {
            entries.push(PlannedAction::new(entry, MembershipAction::NoChange, COMMENT_NOT_STUDENT));
            continue;
        }

        let count = memberships
            .iter()
            .filter(|m| m.user_id == entry.user_id)
            .count();
        if count > 1 {
            warn!(user = %entry.user_name, count, %policy, "Student is in several groups of the set");
        }

        match policy.select(entry, memberships) {
            None => adds.push(PlannedAction::new(entry, MembershipAction::Add, COMMENT_NO_GROUP)),
            Some(m) if m.external_group_id == entry.external_course_id => {
                entries.push(PlannedAction::new(entry, MembershipAction::NoChange, COMMENT_CORRECT));
            }
            Some(m) => entries.push(PlannedAction::new(
                entry,
                MembershipAction::Move {
                    from: m.external_group_id.clone(),
                },
                COMMENT_WRONG,
            )),
        }
    }

    entries.extend(adds);
    let plan = ActionPlan { entries };
    debug!(plan = ?plan, "Action plan built");
    plan
}

/// Counts of what an executed plan did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub added: usize,
    pub moved: usize,
    pub unchanged: usize,
}

/// Execute the plan one entry at a time. An add rejected because the user is
/// already a member counts as done. Any other failing call aborts the rest;
/// calls already made are not undone.
pub async fn execute_plan<D: Directory + ?Sized>(
    directory: &D,
    parent: &Course,
    plan: &ActionPlan,
) -> Result<ExecutionSummary, SyncError> {
    let mut summary = ExecutionSummary::default();

    for action in plan.iter() {
        match &action.action {
            MembershipAction::NoChange => {
                info!(user = %action.user_name, reason = action.comment, "Doing nothing");
                summary.unchanged += 1;
                continue;
            }
            MembershipAction::Add => {
                info!(user = %action.user_name, group = %action.target_group, "Adding user");
                summary.added += 1;
            }
            MembershipAction::Move { from } => {
                info!(user = %action.user_name, from = %from, to = %action.target_group, "Moving user");
                summary.moved += 1;
            }
        }

        for mutation in action.mutations() {
            match mutation {
                Mutation::Remove { group, user_name } => directory
                    .remove_user_from_group(parent, group, user_name)
                    .await
                    .map_err(SyncError::directory("remove user from group"))?,
                Mutation::Add { group, user_name } => {
                    match directory.add_user_to_group(parent, group, user_name).await {
                        Ok(()) => {}
                        // A student holding a second membership is already in the target
                        Err(e) if e.is_already_satisfied() => {
                            warn!(user = %user_name, group = %group, "User already in target group");
                        }
                        Err(e) => return Err(SyncError::directory("add user to group")(e)),
                    }
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Enrollment, Group};
    use crate::sync::testing::{Call, FakeDirectory};

    fn entry(user: &str, role: &str, course: &str) -> RosterEntry {
        RosterEntry {
            user_id: format!("id-{user}"),
            user_name: user.to_string(),
            course_role_id: role.to_string(),
            external_course_id: course.to_string(),
            available: true,
        }
    }

    fn member(user: &str, group: &str) -> GroupMembershipEntry {
        GroupMembershipEntry {
            user_id: format!("id-{user}"),
            external_group_id: group.to_string(),
            group_id: format!("grp-{group}"),
        }
    }

    #[test]
    fn test_student_without_group_is_added() {
        let plan = plan_membership(&[entry("alice", "Student", "C1")], &[], MatchPolicy::FirstMatch);
        let action = plan.for_user("alice").expect("alice planned");
        assert_eq!(action.action, MembershipAction::Add);
        assert_eq!(action.target_group, "C1");
        assert_eq!(action.comment, "User in no group.");
    }

    #[test]
    fn test_student_in_wrong_group_is_moved() {
        let plan = plan_membership(
            &[entry("bob", "Student", "C1")],
            &[member("bob", "P1")],
            MatchPolicy::FirstMatch,
        );
        let action = plan.for_user("bob").expect("bob planned");
        assert_eq!(action.action, MembershipAction::Move { from: "P1".into() });
        assert_eq!(
            action.mutations(),
            vec![
                Mutation::Remove { group: "P1", user_name: "bob" },
                Mutation::Add { group: "C1", user_name: "bob" },
            ]
        );
    }

    #[test]
    fn test_student_in_correct_group_is_left_alone() {
        let plan = plan_membership(
            &[entry("dana", "Student", "C1")],
            &[member("dana", "C1")],
            MatchPolicy::FirstMatch,
        );
        assert!(plan.is_noop());
        assert_eq!(plan.entries[0].comment, "User is in the correct group.");
    }

    #[test]
    fn test_non_students_are_never_touched() {
        let roster = [
            entry("carol", "TA", "C1"),
            entry("ivan", "Instructor", "P1"),
            entry("greg", "Guest", "C2"),
        ];
        // carol already matches, ivan sits in a stale group, greg is in none
        let memberships = [member("carol", "C1"), member("ivan", "C9")];

        for policy in [MatchPolicy::FirstMatch, MatchPolicy::PreferCorrect] {
            let plan = plan_membership(&roster, &memberships, policy);
            assert_eq!(plan.len(), 3);
            assert!(plan.is_noop());
            assert!(plan.mutations().is_empty());
            assert!(plan.iter().all(|a| a.comment == "Only students can be in groups."));
        }
    }

    #[test]
    fn test_role_match_is_exact() {
        let plan = plan_membership(&[entry("sam", "student", "C1")], &[], MatchPolicy::FirstMatch);
        assert_eq!(plan.entries[0].action, MembershipAction::NoChange);
    }

    #[test]
    fn test_adds_come_after_other_decisions() {
        let roster = [
            entry("alice", "Student", "C1"),
            entry("bob", "Student", "C1"),
            entry("carol", "TA", "C1"),
            entry("dana", "Student", "C2"),
        ];
        let memberships = [member("bob", "P1"), member("dana", "C2")];

        let plan = plan_membership(&roster, &memberships, MatchPolicy::FirstMatch);
        let order: Vec<&str> = plan.iter().map(|a| a.user_name.as_str()).collect();
        assert_eq!(order, vec!["bob", "carol", "dana", "alice"]);
    }

    #[test]
    fn test_first_match_judges_by_first_membership() {
        // erin is in both the stale group and the right one
        let memberships = [member("erin", "P1"), member("erin", "C1")];
        let roster = [entry("erin", "Student", "C1")];

        let plan = plan_membership(&roster, &memberships, MatchPolicy::FirstMatch);
        assert_eq!(plan.entries[0].action, MembershipAction::Move { from: "P1".into() });

        let plan = plan_membership(&roster, &memberships, MatchPolicy::PreferCorrect);
        assert_eq!(plan.entries[0].action, MembershipAction::NoChange);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("first-match".parse::<MatchPolicy>(), Ok(MatchPolicy::FirstMatch));
        assert_eq!("Prefer-Correct".parse::<MatchPolicy>(), Ok(MatchPolicy::PreferCorrect));
        assert!("last-match".parse::<MatchPolicy>().is_err());
        assert_eq!(MatchPolicy::default().to_string(), "first-match");
    }

    #[test]
    fn test_plan_serializes_for_audit() {
        let plan = plan_membership(
            &[entry("bob", "Student", "C1")],
            &[member("bob", "P1")],
            MatchPolicy::FirstMatch,
        );
        let json = serde_json::to_value(&plan).expect("plan serializes");
        let first = &json["entries"][0];
        assert_eq!(first["action"], "move");
        assert_eq!(first["from"], "P1");
        assert_eq!(first["target_group"], "C1");
        assert_eq!(first["comment"], "User is in the wrong group.");
    }

    fn fake() -> FakeDirectory {
        let parent = Course::new("_1_1", "PARENT-1", "P1", "Parent").with_children();
        let child = Course::new("_2_1", "CHILD-A", "C1", "A");
        let enroll = |user: &str| Enrollment {
            user_id: format!("id-{user}"),
            user_name: user.to_string(),
            course_role_id: "Student".to_string(),
            child_course_id: Some("_2_1".to_string()),
            available: true,
        };
        FakeDirectory::new(parent, vec![child])
            .with_groups(vec![
                Group::new("_50_1", "P1", "PARENT-1"),
                Group::new("_51_1", "C1", "CHILD-A"),
            ])
            .with_enrollments(vec![enroll("alice"), enroll("bob")])
            .with_member("P1", "id-bob")
    }

    #[tokio::test]
    async fn test_execute_moves_remove_before_add() {
        let directory = fake();
        let roster = [entry("bob", "Student", "C1"), entry("alice", "Student", "C1")];
        let memberships = directory.memberships();

        let plan = plan_membership(&roster, &memberships, MatchPolicy::FirstMatch);
        let summary = execute_plan(&directory, directory.parent(), &plan)
            .await
            .expect("execute");

        assert_eq!(summary, ExecutionSummary { added: 1, moved: 1, unchanged: 0 });
        assert_eq!(
            directory.calls(),
            vec![
                Call::RemoveUser { group: "P1".into(), user: "bob".into() },
                Call::AddUser { group: "C1".into(), user: "bob".into() },
                Call::AddUser { group: "C1".into(), user: "alice".into() },
            ]
        );

        // Second run against the new state is all no-ops
        let again = plan_membership(&roster, &directory.memberships(), MatchPolicy::FirstMatch);
        assert!(again.is_noop());
    }

    #[tokio::test]
    async fn test_execute_move_into_group_already_held() {
        // bob sits in the stale group and the right one
        let directory = fake().with_member("C1", "id-bob");
        let roster = [entry("bob", "Student", "C1")];

        let plan = plan_membership(&roster, &directory.memberships(), MatchPolicy::FirstMatch);
        assert_eq!(plan.entries[0].action, MembershipAction::Move { from: "P1".into() });

        let summary = execute_plan(&directory, directory.parent(), &plan)
            .await
            .expect("add of an existing member is not fatal");

        assert_eq!(summary, ExecutionSummary { added: 0, moved: 1, unchanged: 0 });
        assert_eq!(
            directory.calls(),
            vec![Call::RemoveUser { group: "P1".into(), user: "bob".into() }]
        );
        assert_eq!(
            directory.memberships(),
            vec![GroupMembershipEntry::new("id-bob", &Group::new("_51_1", "C1", "CHILD-A"))]
        );

        let again = plan_membership(&roster, &directory.memberships(), MatchPolicy::FirstMatch);
        assert!(again.is_noop());
    }

    #[tokio::test]
    async fn test_execute_aborts_on_first_failure() {
        let directory = fake().failing_on("add_user_to_group");
        let roster = [entry("bob", "Student", "C1"), entry("alice", "Student", "C1")];

        let plan = plan_membership(&roster, &directory.memberships(), MatchPolicy::FirstMatch);
        let err = execute_plan(&directory, directory.parent(), &plan)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Directory { operation: "add user to group", .. }));
        // The remove went through and is not rolled back
        assert_eq!(
            directory.calls(),
            vec![Call::RemoveUser { group: "P1".into(), user: "bob".into() }]
        );
        assert!(directory.memberships().is_empty());
    }
}
