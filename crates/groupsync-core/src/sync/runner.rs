use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::Directory;

use super::{
    apply_group_plan, execute_plan, plan_groups, plan_membership, resolve_roster, ActionPlan,
    CourseSet, ExecutionSummary, GroupPlan, MatchPolicy, SyncError,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Compute and report the plans without changing anything.
    pub dry_run: bool,
    pub policy: MatchPolicy,
}

/// Outcome of one run for one parent course.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub course_id: String,
    /// `None` on a dry run when the group set does not exist yet.
    pub group_set_id: Option<String>,
    pub group_set_created: bool,
    pub group_plan: GroupPlan,
    pub action_plan: ActionPlan,
    /// `None` on a dry run.
    pub summary: Option<ExecutionSummary>,
}

/// Drives a reconciliation of one merged parent course.
pub struct Reconciler<'a, D: Directory + ?Sized> {
    directory: &'a D,
    options: SyncOptions,
}

impl<'a, D: Directory + ?Sized> Reconciler<'a, D> {
    pub fn new(directory: &'a D, options: SyncOptions) -> Self {
        Self { directory, options }
    }

    /// Bring the groups of `course_id` in line with its merged enrollments.
    ///
    /// Stops at the first failure. Groups and memberships changed before
    /// the failure stay changed.
    pub async fn run(&self, course_id: &str) -> Result<SyncReport, SyncError> {
        validate_course_id(course_id)?;
        let directory = self.directory;

        let parent = match directory.get_parent_course(course_id).await {
            Ok(course) => course,
            Err(e) if e.is_not_found() => return Err(SyncError::ParentNotFound(course_id.to_string())),
            Err(e) => return Err(SyncError::directory("get parent course")(e)),
        };
        if !parent.has_children {
            warn!(course = course_id, "Course has no children");
            return Err(SyncError::NoChildren(course_id.to_string()));
        }
        info!(course = course_id, "Course is a parent course");

        let children = directory
            .get_child_courses(&parent)
            .await
            .map_err(SyncError::directory("get child courses"))?;
        info!(course = course_id, children = children.len(), "Merged children found");

        let course_set = CourseSet::build(parent, children)?;
        debug!(courses = ?course_set, "Course set built");
        let parent = course_set.parent();
        let set_external_id = course_set.group_set_external_id();

        let (group_set_id, group_set_created) = if self.options.dry_run {
            let id = directory
                .find_group_set(parent, &set_external_id)
                .await
                .map_err(SyncError::directory("get group set"))?;
            (id, false)
        } else {
            let set = directory
                .get_or_create_group_set(parent, &set_external_id)
                .await
                .map_err(SyncError::directory("get or create group set"))?;
            if set.created {
                info!(course = course_id, group_set = %set.id, "Created the group set");
            } else {
                info!(course = course_id, group_set = %set.id, "The group set exists");
            }
            (Some(set.id), set.created)
        };

        let groups = match &group_set_id {
            Some(id) => directory
                .list_groups(parent, id)
                .await
                .map_err(SyncError::directory("list groups"))?,
            None => Vec::new(),
        };
        let group_plan = plan_groups(&course_set, &groups);
        info!(
            creates = group_plan.creates.len(),
            deletes = group_plan.deletes.len(),
            "Group plan built"
        );

        let enrollments = directory
            .get_course_roster(parent)
            .await
            .map_err(SyncError::directory("get course roster"))?;
        info!(enrollments = enrollments.len(), "Course roster fetched");
        let roster = resolve_roster(&course_set, enrollments)?;

        let Some(set_id) = group_set_id.as_deref().filter(|_| !self.options.dry_run) else {
            let memberships = match group_set_id.as_deref() {
                Some(id) => directory
                    .get_group_roster(parent, id)
                    .await
                    .map_err(SyncError::directory("get group roster"))?,
                None => Vec::new(),
            };
            let action_plan = plan_membership(&roster, &memberships, self.options.policy);
            info!(entries = action_plan.len(), "Dry run, nothing changed");
            return Ok(SyncReport {
                course_id: course_id.to_string(),
                group_set_id,
                group_set_created,
                group_plan,
                action_plan,
                summary: None,
            });
        };

        apply_group_plan(directory, parent, set_id, &group_plan).await?;

        let memberships = directory
            .get_group_roster(parent, set_id)
            .await
            .map_err(SyncError::directory("get group roster"))?;
        let action_plan = plan_membership(&roster, &memberships, self.options.policy);
        let summary = execute_plan(directory, parent, &action_plan).await?;
        info!(
            course = course_id,
            added = summary.added,
            moved = summary.moved,
            unchanged = summary.unchanged,
            "Finished with course"
        );

        Ok(SyncReport {
            course_id: course_id.to_string(),
            group_set_id,
            group_set_created,
            group_plan,
            action_plan,
            summary: Some(summary),
        })
    }
}

/// Course ids end up in URL paths; whitespace in one is always a typo.
fn validate_course_id(course_id: &str) -> Result<(), SyncError> {
    if course_id.is_empty() || course_id.chars().any(char::is_whitespace) {
        return Err(SyncError::InvalidCourseId(course_id.to_string()));
    }
    Ok(())
}
