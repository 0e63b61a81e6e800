//! API client for the Learn REST API.
//!
//! This module provides the `ApiClient` struct, the HTTP implementation of
//! `Directory`. Every call renews the bearer token first when it is close
//! to expiry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::auth::AccessToken;
use crate::config::Config;
use crate::models::{Course, Enrollment, Group, GroupSetRef};

use super::{ApiError, Directory};

// ============================================================================
// Constants
// ============================================================================

const API_ROOT: [&str; 3] = ["learn", "api", "public"];
const TOKEN_SEGMENTS: [&str; 3] = ["v1", "oauth2", "token"];

const PARENT_FIELDS: &str = "id,courseId,externalId,name,hasChildren";
const CHILD_FIELDS: &str = "id,childCourse.externalId,childCourse.name,childCourse.courseId";
const GROUP_FIELDS: &str = "id,name,externalId,description,availability.available,enrollment.type,groupSetId";
const ROSTER_FIELDS: &str = "id,userId,courseRoleId,childCourseId,user.userName,availability.available";

/// Name given to the group set created in the parent course.
const GROUP_SET_NAME: &str = "Automated Child Merged Groups";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Envelope of every listing endpoint. `paging` is only present when more
/// records exist than were returned.
#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
    paging: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CourseResponse {
    id: String,
    #[serde(rename = "courseId")]
    course_id: String,
    #[serde(rename = "externalId", default)]
    external_id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "hasChildren", default)]
    has_children: bool,
}

#[derive(Debug, Deserialize)]
struct ChildCourseLink {
    id: String,
    #[serde(rename = "childCourse")]
    child_course: ChildCourse,
}

#[derive(Debug, Deserialize)]
struct ChildCourse {
    #[serde(rename = "externalId", default)]
    external_id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "courseId")]
    course_id: String,
}

#[derive(Debug, Deserialize)]
struct GroupSetResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GroupResponse {
    id: String,
    #[serde(rename = "externalId", default)]
    external_id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct EnrollmentResponse {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "courseRoleId")]
    course_role_id: String,
    #[serde(rename = "childCourseId")]
    child_course_id: Option<String>,
    user: EnrollmentUser,
    availability: Option<Availability>,
}

#[derive(Debug, Deserialize)]
struct EnrollmentUser {
    #[serde(rename = "userName")]
    user_name: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct Availability {
    available: String,
}

#[derive(Debug, Deserialize)]
struct GroupMemberResponse {
    #[serde(rename = "userId")]
    user_id: String,
}

#[derive(Debug, Serialize)]
struct EnrollmentPolicy {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Body shared by group set and group creation. New sets and groups are
/// hidden from students and closed to self enrollment.
#[derive(Debug, Serialize)]
struct CreateGroupBody {
    #[serde(rename = "externalId")]
    external_id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    availability: Availability,
    enrollment: EnrollmentPolicy,
}

impl CreateGroupBody {
    fn hidden(external_id: String, name: String, description: Option<String>) -> Self {
        Self {
            external_id,
            name,
            description,
            availability: Availability {
                available: "No".to_string(),
            },
            enrollment: EnrollmentPolicy {
                kind: "InstructorOnly",
            },
        }
    }
}

impl From<CourseResponse> for Course {
    fn from(c: CourseResponse) -> Self {
        Course {
            internal_id: c.id,
            course_id: c.course_id,
            external_id: c.external_id,
            name: c.name,
            has_children: c.has_children,
        }
    }
}

impl From<GroupResponse> for Group {
    fn from(g: GroupResponse) -> Self {
        Group::new(g.id, g.external_id, g.name)
    }
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the course directory.
pub struct ApiClient {
    client: Client,
    base_url: Url,
    key: String,
    secret: String,
    result_limit: u32,
    token: Mutex<Option<AccessToken>>,
}

impl ApiClient {
    /// Create a new API client from the configuration
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let base_url = Url::parse(&config.base_url())
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.base_url(), e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            client,
            base_url,
            key: config.key.clone(),
            secret: config.secret.clone(),
            result_limit: config.result_limit,
            token: Mutex::new(None),
        })
    }

    /// Request a new token with the client-credentials grant
    pub async fn authenticate(&self) -> Result<AccessToken, ApiError> {
        let url = self.url(&TOKEN_SEGMENTS, &[])?;
        let response = self
            .client
            .post(url)
            .basic_auth(&self.key, Some(&self.secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        // Parsed directly so the token never reaches the debug log
        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse token: {}", e)))?;
        let token = AccessToken::new(parsed.access_token, parsed.expires_in);
        debug!(expires_at = %token.expires_at, "Access token issued");
        Ok(token)
    }

    /// Bearer header value, renewing the token when it is about to expire.
    async fn bearer(&self) -> Result<String, ApiError> {
        let mut guard = self.token.lock().await;
        let renew = match guard.as_ref() {
            Some(token) if !token.needs_refresh() => {
                debug!(expires_at = %token.expires_at, "Token still valid");
                false
            }
            Some(token) => {
                debug!(expired = token.is_expired(), "Renewing access token");
                true
            }
            None => true,
        };
        if renew {
            *guard = Some(self.authenticate().await?);
        }
        guard
            .as_ref()
            .map(AccessToken::bearer)
            .ok_or_else(|| ApiError::InvalidResponse("no access token".to_string()))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        debug!(what, body = %text, "Response received");
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    /// Join path segments below the API root, percent-encoding each one.
    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(API_ROOT)
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// URL of a resource under `/{version}/courses/{course_key}`.
    fn course_url(
        &self,
        version: &str,
        course_key: &str,
        rest: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Url, ApiError> {
        let mut segments = vec![version, "courses", course_key];
        segments.extend_from_slice(rest);
        self.url(&segments, query)
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        debug!(%method, %url, "Directory request");
        let mut request = self
            .client
            .request(method, url)
            .header(header::AUTHORIZATION, self.bearer().await?);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        Self::check_response(response).await
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, ApiError> {
        let response = self.send::<()>(Method::GET, url, None).await?;
        Self::parse(response, what).await
    }

    /// Fetch a listing endpoint. More records than the configured limit is
    /// reported as an error rather than truncated.
    async fn get_list<T: DeserializeOwned>(&self, mut url: Url, what: &str) -> Result<Vec<T>, ApiError> {
        url.query_pairs_mut()
            .append_pair("limit", &self.result_limit.to_string());
        let page: Page<T> = self.get(url, what).await?;
        if page.paging.is_some() {
            return Err(ApiError::ResultLimitExceeded {
                limit: self.result_limit,
            });
        }
        Ok(page.results)
    }

    fn group_sets_url(
        &self,
        parent: &Course,
        rest: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Url, ApiError> {
        let mut segments = vec!["groups", "sets"];
        segments.extend_from_slice(rest);
        self.course_url("v2", &parent.key(), &segments, query)
    }

    fn member_url(&self, parent: &Course, external_group_id: &str, user_name: &str) -> Result<Url, ApiError> {
        let group = format!("externalId:{}", external_group_id);
        let user = format!("userName:{}", user_name);
        self.course_url("v2", &parent.key(), &["groups", group.as_str(), "users", user.as_str()], &[])
    }

    async fn create_group_set(&self, parent: &Course, external_id: &str) -> Result<String, ApiError> {
        let body = CreateGroupBody::hidden(external_id.to_string(), GROUP_SET_NAME.to_string(), None);
        debug!(payload = ?body, "Creating group set");
        let response = self
            .send(Method::POST, self.group_sets_url(parent, &[], &[])?, Some(&body))
            .await?;
        let set: GroupSetResponse = Self::parse(response, "group set").await?;
        Ok(set.id)
    }
}

#[async_trait]
impl Directory for ApiClient {
    async fn get_parent_course(&self, course_id: &str) -> Result<Course, ApiError> {
        let key = format!("courseId:{}", course_id);
        let url = self.course_url("v3", &key, &[], &[("fields", PARENT_FIELDS)])?;
        let course: CourseResponse = self.get(url, "course").await?;
        Ok(course.into())
    }

    async fn get_child_courses(&self, parent: &Course) -> Result<Vec<Course>, ApiError> {
        let url = self.course_url(
            "v1",
            &parent.key(),
            &["children"],
            &[("expand", "childCourse"), ("fields", CHILD_FIELDS)],
        )?;
        let links: Vec<ChildCourseLink> = self.get_list(url, "child courses").await?;
        Ok(links
            .into_iter()
            .map(|link| Course {
                internal_id: link.id,
                course_id: link.child_course.course_id,
                external_id: link.child_course.external_id,
                name: link.child_course.name,
                has_children: false,
            })
            .collect())
    }

    async fn get_or_create_group_set(
        &self,
        parent: &Course,
        external_id: &str,
    ) -> Result<GroupSetRef, ApiError> {
        match self.find_group_set(parent, external_id).await? {
            Some(id) => Ok(GroupSetRef { id, created: false }),
            None => {
                let id = self.create_group_set(parent, external_id).await?;
                Ok(GroupSetRef { id, created: true })
            }
        }
    }

    async fn find_group_set(
        &self,
        parent: &Course,
        external_id: &str,
    ) -> Result<Option<String>, ApiError> {
        let key = format!("externalId:{}", external_id);
        let url = self.group_sets_url(parent, &[key.as_str()], &[])?;
        match self.get::<GroupSetResponse>(url, "group set").await {
            Ok(set) => Ok(Some(set.id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_groups(&self, parent: &Course, group_set_id: &str) -> Result<Vec<Group>, ApiError> {
        let url = self.group_sets_url(parent, &[group_set_id, "groups"], &[("fields", GROUP_FIELDS)])?;
        let groups: Vec<GroupResponse> = self.get_list(url, "groups").await?;
        Ok(groups.into_iter().map(Group::from).collect())
    }

    async fn create_group(
        &self,
        parent: &Course,
        group_set_id: &str,
        course: &Course,
    ) -> Result<Group, ApiError> {
        let body = CreateGroupBody::hidden(
            course.external_id.clone(),
            course.course_id.clone(),
            Some(course.group_description()),
        );
        debug!(payload = ?body, "Creating group");
        let url = self.group_sets_url(parent, &[group_set_id, "groups"], &[])?;
        let response = self.send(Method::POST, url, Some(&body)).await?;
        let group: GroupResponse = Self::parse(response, "group").await?;
        Ok(group.into())
    }

    async fn delete_group(&self, parent: &Course, group: &Group) -> Result<(), ApiError> {
        let url = self.course_url("v2", &parent.key(), &["groups", group.internal_id.as_str()], &[])?;
        self.send::<()>(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn get_course_roster(&self, parent: &Course) -> Result<Vec<Enrollment>, ApiError> {
        let url = self.course_url(
            "v1",
            &parent.key(),
            &["users"],
            &[("expand", "user"), ("fields", ROSTER_FIELDS)],
        )?;
        let enrollments: Vec<EnrollmentResponse> = self.get_list(url, "enrollments").await?;
        Ok(enrollments
            .into_iter()
            .map(|e| Enrollment {
                user_id: e.user_id,
                user_name: e.user.user_name,
                course_role_id: e.course_role_id,
                child_course_id: e.child_course_id,
                available: e.availability.map(|a| a.available == "Yes").unwrap_or(false),
            })
            .collect())
    }

    async fn list_group_members(&self, parent: &Course, group: &Group) -> Result<Vec<String>, ApiError> {
        let url = self.course_url("v2", &parent.key(), &["groups", group.internal_id.as_str(), "users"], &[])?;
        let members: Vec<GroupMemberResponse> = self.get_list(url, "group members").await?;
        Ok(members.into_iter().map(|m| m.user_id).collect())
    }

    async fn add_user_to_group(
        &self,
        parent: &Course,
        external_group_id: &str,
        user_name: &str,
    ) -> Result<(), ApiError> {
        let url = self.member_url(parent, external_group_id, user_name)?;
        self.send(Method::PUT, url, Some(&serde_json::json!({}))).await?;
        debug!(user = user_name, group = external_group_id, "User added");
        Ok(())
    }

    async fn remove_user_from_group(
        &self,
        parent: &Course,
        external_group_id: &str,
        user_name: &str,
    ) -> Result<(), ApiError> {
        let url = self.member_url(parent, external_group_id, user_name)?;
        self.send::<()>(Method::DELETE, url, None).await?;
        debug!(user = user_name, group = external_group_id, "User removed");
        Ok(())
    }
}
