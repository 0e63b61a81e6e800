//! In-memory `Directory` used by the engine tests. It keeps groups and
//! memberships so a reconciliation can be run twice against the same state,
//! and records every successful mutating call in order.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{ApiError, Directory};
use crate::models::{Course, Enrollment, Group, GroupMembershipEntry, GroupSetRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateGroupSet(String),
    CreateGroup(String),
    DeleteGroup(String),
    AddUser { group: String, user: String },
    RemoveUser { group: String, user: String },
}

#[derive(Debug, Default)]
struct State {
    group_set: Option<(String, String)>,
    groups: Vec<Group>,
    /// (group internal id, user id)
    members: Vec<(String, String)>,
    calls: Vec<Call>,
    next_id: u32,
}

impl State {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("_{}_9", self.next_id)
    }
}

pub struct FakeDirectory {
    parent: Course,
    children: Vec<Course>,
    enrollments: Vec<Enrollment>,
    fail_on: Option<&'static str>,
    state: Mutex<State>,
}

impl FakeDirectory {
    pub fn new(parent: Course, children: Vec<Course>) -> Self {
        Self {
            parent,
            children,
            enrollments: Vec::new(),
            fail_on: None,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_groups(self, groups: Vec<Group>) -> Self {
        self.lock().groups = groups;
        self
    }

    pub fn with_group_set(self, external_id: &str, id: &str) -> Self {
        self.lock().group_set = Some((external_id.to_string(), id.to_string()));
        self
    }

    pub fn with_enrollments(mut self, enrollments: Vec<Enrollment>) -> Self {
        self.enrollments = enrollments;
        self
    }

    /// Put a user in the group with the given external id.
    pub fn with_member(self, external_group_id: &str, user_id: &str) -> Self {
        {
            let mut state = self.lock();
            let group_id = state
                .groups
                .iter()
                .find(|g| g.external_id == external_group_id)
                .map(|g| g.internal_id.clone())
                .expect("member added to unknown group");
            state.members.push((group_id, user_id.to_string()));
        }
        self
    }

    /// Make every call of the named operation fail with a server error.
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn parent(&self) -> &Course {
        &self.parent
    }

    pub fn groups(&self) -> Vec<Group> {
        self.lock().groups.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn memberships(&self) -> Vec<GroupMembershipEntry> {
        let state = self.lock();
        state
            .groups
            .iter()
            .flat_map(|g| {
                state
                    .members
                    .iter()
                    .filter(move |(group_id, _)| *group_id == g.internal_id)
                    .map(move |(_, user_id)| GroupMembershipEntry::new(user_id.clone(), g))
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake directory state poisoned")
    }

    fn check(&self, operation: &str) -> Result<(), ApiError> {
        if self.fail_on == Some(operation) {
            return Err(ApiError::ServerError(format!("injected failure in {operation}")));
        }
        Ok(())
    }

    fn user_id(&self, user_name: &str) -> Result<String, ApiError> {
        self.enrollments
            .iter()
            .find(|e| e.user_name == user_name)
            .map(|e| e.user_id.clone())
            .ok_or_else(|| ApiError::NotFound(format!("user {user_name}")))
    }

    fn group_id(state: &State, external_group_id: &str) -> Result<String, ApiError> {
        state
            .groups
            .iter()
            .find(|g| g.external_id == external_group_id)
            .map(|g| g.internal_id.clone())
            .ok_or_else(|| ApiError::NotFound(format!("group {external_group_id}")))
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn get_parent_course(&self, course_id: &str) -> Result<Course, ApiError> {
        self.check("get_parent_course")?;
        if course_id == self.parent.course_id {
            Ok(self.parent.clone())
        } else {
            Err(ApiError::NotFound(format!("course {course_id}")))
        }
    }

    async fn get_child_courses(&self, _parent: &Course) -> Result<Vec<Course>, ApiError> {
        self.check("get_child_courses")?;
        Ok(self.children.clone())
    }

    async fn get_or_create_group_set(
        &self,
        parent: &Course,
        external_id: &str,
    ) -> Result<GroupSetRef, ApiError> {
        if let Some(id) = self.find_group_set(parent, external_id).await? {
            return Ok(GroupSetRef { id, created: false });
        }
        self.check("create_group_set")?;
        let mut state = self.lock();
        let id = state.next_id();
        state.group_set = Some((external_id.to_string(), id.clone()));
        state.calls.push(Call::CreateGroupSet(external_id.to_string()));
        Ok(GroupSetRef { id, created: true })
    }

    async fn find_group_set(
        &self,
        _parent: &Course,
        external_id: &str,
    ) -> Result<Option<String>, ApiError> {
        self.check("find_group_set")?;
        Ok(self
            .lock()
            .group_set
            .as_ref()
            .filter(|(ext, _)| ext == external_id)
            .map(|(_, id)| id.clone()))
    }

    async fn list_groups(&self, _parent: &Course, _group_set_id: &str) -> Result<Vec<Group>, ApiError> {
        self.check("list_groups")?;
        Ok(self.groups())
    }

    async fn create_group(
        &self,
        _parent: &Course,
        _group_set_id: &str,
        course: &Course,
    ) -> Result<Group, ApiError> {
        self.check("create_group")?;
        let mut state = self.lock();
        let group = Group::new(state.next_id(), course.external_id.clone(), course.course_id.clone());
        state.groups.push(group.clone());
        state.calls.push(Call::CreateGroup(course.external_id.clone()));
        Ok(group)
    }

    async fn delete_group(&self, _parent: &Course, group: &Group) -> Result<(), ApiError> {
        self.check("delete_group")?;
        let mut state = self.lock();
        state.groups.retain(|g| g.internal_id != group.internal_id);
        state.members.retain(|(group_id, _)| *group_id != group.internal_id);
        state.calls.push(Call::DeleteGroup(group.external_id.clone()));
        Ok(())
    }

    async fn get_course_roster(&self, _parent: &Course) -> Result<Vec<Enrollment>, ApiError> {
        self.check("get_course_roster")?;
        Ok(self.enrollments.clone())
    }

    async fn list_group_members(&self, _parent: &Course, group: &Group) -> Result<Vec<String>, ApiError> {
        self.check("list_group_members")?;
        Ok(self
            .lock()
            .members
            .iter()
            .filter(|(group_id, _)| *group_id == group.internal_id)
            .map(|(_, user_id)| user_id.clone())
            .collect())
    }

    async fn add_user_to_group(
        &self,
        _parent: &Course,
        external_group_id: &str,
        user_name: &str,
    ) -> Result<(), ApiError> {
        self.check("add_user_to_group")?;
        let user_id = self.user_id(user_name)?;
        let mut state = self.lock();
        let group_id = Self::group_id(&state, external_group_id)?;
        let member = (group_id, user_id);
        if state.members.contains(&member) {
            return Err(ApiError::AlreadyExists(format!("{user_name} in {external_group_id}")));
        }
        state.members.push(member);
        state.calls.push(Call::AddUser {
            group: external_group_id.to_string(),
            user: user_name.to_string(),
        });
        Ok(())
    }

    async fn remove_user_from_group(
        &self,
        _parent: &Course,
        external_group_id: &str,
        user_name: &str,
    ) -> Result<(), ApiError> {
        self.check("remove_user_from_group")?;
        let user_id = self.user_id(user_name)?;
        let mut state = self.lock();
        let member = (Self::group_id(&state, external_group_id)?, user_id);
        let before = state.members.len();
        state.members.retain(|m| *m != member);
        if state.members.len() == before {
            return Err(ApiError::NotFound(format!("{user_name} in {external_group_id}")));
        }
        state.calls.push(Call::RemoveUser {
            group: external_group_id.to_string(),
            user: user_name.to_string(),
        });
        Ok(())
    }
}
