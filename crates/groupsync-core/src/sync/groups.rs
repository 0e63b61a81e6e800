//! Group reconciliation: one group per course in the set, keyed by external id.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::api::Directory;
use crate::models::{Course, Group};

use super::{CourseSet, SyncError};

/// Both sides of one external id.
#[derive(Debug, Default)]
pub struct Correlation<'a> {
    pub course: Option<&'a Course>,
    pub groups: Vec<&'a Group>,
}

/// Index from external id to the course and groups that carry it.
#[derive(Debug)]
pub struct CorrelationIndex<'a> {
    entries: HashMap<&'a str, Correlation<'a>>,
}

impl<'a> CorrelationIndex<'a> {
    pub fn build(course_set: &'a CourseSet, groups: &'a [Group]) -> Self {
        let mut entries: HashMap<&'a str, Correlation<'a>> = HashMap::new();
        for course in course_set {
            entries.entry(course.external_id.as_str()).or_default().course = Some(course);
        }
        for group in groups {
            entries
                .entry(group.external_id.as_str())
                .or_default()
                .groups
                .push(group);
        }
        Self { entries }
    }

    pub fn get(&self, external_id: &str) -> Option<&Correlation<'a>> {
        self.entries.get(external_id)
    }

    pub fn has_group(&self, external_id: &str) -> bool {
        self.get(external_id).map_or(false, |c| !c.groups.is_empty())
    }

    pub fn has_course(&self, external_id: &str) -> bool {
        self.get(external_id).map_or(false, |c| c.course.is_some())
    }
}

/// Groups to create and delete so each course has exactly one group.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupPlan {
    pub creates: Vec<Course>,
    pub deletes: Vec<Group>,
}

impl GroupPlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.deletes.is_empty()
    }
}

/// Diff the course set against the groups currently in the set. Creates
/// follow course set order and deletes follow group listing order.
pub fn plan_groups(course_set: &CourseSet, groups: &[Group]) -> GroupPlan {
    let index = CorrelationIndex::build(course_set, groups);

    for course in course_set {
        if let Some(c) = index.get(&course.external_id) {
            if c.groups.len() > 1 {
                warn!(
                    external_id = %course.external_id,
                    count = c.groups.len(),
                    "Several groups share a course external id"
                );
            }
        }
    }

    GroupPlan {
        creates: course_set
            .iter()
            .filter(|c| !index.has_group(&c.external_id))
            .cloned()
            .collect(),
        deletes: groups
            .iter()
            .filter(|g| !index.has_course(&g.external_id))
            .cloned()
            .collect(),
    }
}

/// Apply the plan: all creates, then all deletes. Stops at the first failure.
pub async fn apply_group_plan<D: Directory + ?Sized>(
    directory: &D,
    parent: &Course,
    group_set_id: &str,
    plan: &GroupPlan,
) -> Result<Vec<Group>, SyncError> {
    let mut created = Vec::with_capacity(plan.creates.len());
    for course in &plan.creates {
        let group = directory
            .create_group(parent, group_set_id, course)
            .await
            .map_err(SyncError::directory("create group"))?;
        info!(group = %group.name, group_id = %group.internal_id, "Created group");
        created.push(group);
    }

    for group in &plan.deletes {
        directory
            .delete_group(parent, group)
            .await
            .map_err(SyncError::directory("delete group"))?;
        info!(external_id = %group.external_id, "Deleted group");
    }

    Ok(created)
}
