//! Typed HTTP client for the portal API.
//!
//! Credentials are passed to every call instead of being stored on the
//! client, so one client can serve many signed-in accounts at once.

use std::fmt;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::{
    Assessment, AssessmentId, AttendanceRecord, FeedbackEntry, Role, Skill, SkillId,
    StudentAssessmentView, StudentType, User, UserId,
};
use crate::workflows::{
    AssessmentDraft, AssessmentResults, AssessmentSubmission, AssessmentUpdate, AttendanceSheet,
    BudgetReview, BudgetSubmission, FeedbackAnalysis, FeedbackSubmission, ProfileUpdate,
    SkillAttendance, SkillStatistics, SkillUpdate, StudentAttendance, StudentResult,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Bearer token for one signed-in account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{status} {code}: {message}")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(err) => err.status(),
            ClientError::Decode(_) => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FailureBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleChange {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    student_type: Option<StudentType>,
}

#[derive(Debug, Clone)]
pub struct SkillPortalClient {
    http: reqwest::Client,
    base_url: String,
}

impl SkillPortalClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self::with_http(http, base_url))
    }

    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // auth

    pub async fn me(&self, credentials: &Credentials) -> Result<User, ClientError> {
        let response = self
            .request(Method::GET, "/auth/me", credentials)
            .send()
            .await?;
        read_data(response, "user").await
    }

    pub async fn update_profile(
        &self,
        credentials: &Credentials,
        update: &ProfileUpdate,
    ) -> Result<User, ClientError> {
        let response = self
            .request(Method::PATCH, "/auth/me", credentials)
            .json(update)
            .send()
            .await?;
        read_data(response, "user").await
    }

    pub async fn list_users(&self, credentials: &Credentials) -> Result<Vec<User>, ClientError> {
        let response = self
            .request(Method::GET, "/auth/users", credentials)
            .send()
            .await?;
        read_data(response, "users").await
    }

    pub async fn update_role(
        &self,
        credentials: &Credentials,
        user_id: &UserId,
        role: Role,
        student_type: Option<StudentType>,
    ) -> Result<User, ClientError> {
        let path = format!("/auth/users/{user_id}/role");
        let response = self
            .request(Method::PATCH, &path, credentials)
            .json(&RoleChange { role, student_type })
            .send()
            .await?;
        read_data(response, "user").await
    }

    pub async fn skill(
        &self,
        credentials: &Credentials,
        skill_id: &SkillId,
    ) -> Result<Skill, ClientError> {
        let path = format!("/skills/{skill_id}");
        let response = self.request(Method::GET, &path, credentials).send().await?;
        read_data(response, "skill").await
    }

    // faculty

    pub async fn submit_budget(
        &self,
        credentials: &Credentials,
        submission: &BudgetSubmission,
    ) -> Result<Skill, ClientError> {
        let response = self
            .request(Method::POST, "/faculty/submit-budget", credentials)
            .json(submission)
            .send()
            .await?;
        read_data(response, "skill").await
    }

    pub async fn faculty_skills(&self, credentials: &Credentials) -> Result<Vec<Skill>, ClientError> {
        let response = self
            .request(Method::GET, "/faculty/my-skills", credentials)
            .send()
            .await?;
        read_data(response, "skills").await
    }

    pub async fn update_skill(
        &self,
        credentials: &Credentials,
        skill_id: &SkillId,
        update: &SkillUpdate,
    ) -> Result<Skill, ClientError> {
        let path = format!("/faculty/update-skill/{skill_id}");
        let response = self
            .request(Method::PATCH, &path, credentials)
            .json(update)
            .send()
            .await?;
        read_data(response, "skill").await
    }

    pub async fn mark_attendance(
        &self,
        credentials: &Credentials,
        skill_id: &SkillId,
        sheet: &AttendanceSheet,
    ) -> Result<AttendanceRecord, ClientError> {
        let path = format!("/faculty/mark-attendance/{skill_id}");
        let response = self
            .request(Method::POST, &path, credentials)
            .json(sheet)
            .send()
            .await?;
        read_data(response, "attendance").await
    }

    pub async fn attendance_stats(
        &self,
        credentials: &Credentials,
        skill_id: &SkillId,
    ) -> Result<Vec<StudentAttendance>, ClientError> {
        let path = format!("/faculty/attendance-stats/{skill_id}");
        let response = self.request(Method::GET, &path, credentials).send().await?;
        read_data(response, "attendanceStats").await
    }

    pub async fn skill_feedback(
        &self,
        credentials: &Credentials,
        skill_id: &SkillId,
    ) -> Result<Vec<FeedbackEntry>, ClientError> {
        let path = format!("/faculty/feedback/{skill_id}");
        let response = self.request(Method::GET, &path, credentials).send().await?;
        read_data(response, "feedback").await
    }

    pub async fn create_assessment(
        &self,
        credentials: &Credentials,
        skill_id: &SkillId,
        draft: &AssessmentDraft,
    ) -> Result<Assessment, ClientError> {
        let path = format!("/faculty/create-assessment/{skill_id}");
        let response = self
            .request(Method::POST, &path, credentials)
            .json(draft)
            .send()
            .await?;
        read_data(response, "assessment").await
    }

    pub async fn update_assessment(
        &self,
        credentials: &Credentials,
        assessment_id: &AssessmentId,
        update: &AssessmentUpdate,
    ) -> Result<Assessment, ClientError> {
        let path = format!("/faculty/update-assessment/{assessment_id}");
        let response = self
            .request(Method::PATCH, &path, credentials)
            .json(update)
            .send()
            .await?;
        read_data(response, "assessment").await
    }

    pub async fn publish_assessment(
        &self,
        credentials: &Credentials,
        assessment_id: &AssessmentId,
    ) -> Result<Assessment, ClientError> {
        let path = format!("/faculty/publish-assessment/{assessment_id}");
        let response = self
            .request(Method::PATCH, &path, credentials)
            .send()
            .await?;
        read_data(response, "assessment").await
    }

    pub async fn assessment_results(
        &self,
        credentials: &Credentials,
        assessment_id: &AssessmentId,
    ) -> Result<AssessmentResults, ClientError> {
        let path = format!("/faculty/assessment-results/{assessment_id}");
        let response = self.request(Method::GET, &path, credentials).send().await?;
        read_data(response, "results").await
    }

    // student

    pub async fn available_skills(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<Skill>, ClientError> {
        let response = self
            .request(Method::GET, "/student/available-skills", credentials)
            .send()
            .await?;
        read_data(response, "skills").await
    }

    pub async fn enrolled_skills(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<Skill>, ClientError> {
        let response = self
            .request(Method::GET, "/student/my-skills", credentials)
            .send()
            .await?;
        read_data(response, "skills").await
    }

    pub async fn register(
        &self,
        credentials: &Credentials,
        skill_id: &SkillId,
    ) -> Result<Skill, ClientError> {
        let path = format!("/student/register/{skill_id}");
        let response = self
            .request(Method::POST, &path, credentials)
            .send()
            .await?;
        read_data(response, "skill").await
    }

    pub async fn my_attendance(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<SkillAttendance>, ClientError> {
        let response = self
            .request(Method::GET, "/student/my-attendance", credentials)
            .send()
            .await?;
        read_data(response, "attendance").await
    }

    pub async fn submit_feedback(
        &self,
        credentials: &Credentials,
        skill_id: &SkillId,
        submission: &FeedbackSubmission,
    ) -> Result<FeedbackEntry, ClientError> {
        let path = format!("/student/submit-feedback/{skill_id}");
        let response = self
            .request(Method::POST, &path, credentials)
            .json(submission)
            .send()
            .await?;
        read_data(response, "feedback").await
    }

    pub async fn available_assessments(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<StudentAssessmentView>, ClientError> {
        let response = self
            .request(Method::GET, "/student/available-assessments", credentials)
            .send()
            .await?;
        read_data(response, "assessments").await
    }

    pub async fn submit_assessment(
        &self,
        credentials: &Credentials,
        assessment_id: &AssessmentId,
        submission: &AssessmentSubmission,
    ) -> Result<StudentResult, ClientError> {
        let path = format!("/student/submit-assessment/{assessment_id}");
        let response = self
            .request(Method::POST, &path, credentials)
            .json(submission)
            .send()
            .await?;
        read_data(response, "result").await
    }

    pub async fn student_result(
        &self,
        credentials: &Credentials,
        assessment_id: &AssessmentId,
    ) -> Result<StudentResult, ClientError> {
        let path = format!("/student/assessment-results/{assessment_id}");
        let response = self.request(Method::GET, &path, credentials).send().await?;
        read_data(response, "result").await
    }

    // skill team

    pub async fn pending_budgets(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<Skill>, ClientError> {
        let response = self
            .request(Method::GET, "/team/pending-budgets", credentials)
            .send()
            .await?;
        read_data(response, "skills").await
    }

    pub async fn review_budget(
        &self,
        credentials: &Credentials,
        skill_id: &SkillId,
        review: &BudgetReview,
    ) -> Result<Skill, ClientError> {
        let path = format!("/team/review-budget/{skill_id}");
        let response = self
            .request(Method::PATCH, &path, credentials)
            .json(review)
            .send()
            .await?;
        read_data(response, "skill").await
    }

    pub async fn feedback_analysis(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<FeedbackAnalysis>, ClientError> {
        let response = self
            .request(Method::GET, "/team/feedback-analysis", credentials)
            .send()
            .await?;
        read_data(response, "feedbackAnalysis").await
    }

    pub async fn skill_statistics(
        &self,
        credentials: &Credentials,
    ) -> Result<SkillStatistics, ClientError> {
        let response = self
            .request(Method::GET, "/team/skill-statistics", credentials)
            .send()
            .await?;
        read_data(response, "").await
    }

    /// Number of summary emails queued.
    pub async fn send_feedback_summary(
        &self,
        credentials: &Credentials,
        skill_id: &SkillId,
    ) -> Result<usize, ClientError> {
        let path = format!("/team/send-feedback-summary/{skill_id}");
        let response = self
            .request(Method::POST, &path, credentials)
            .json(&json!({}))
            .send()
            .await?;
        read_data(response, "queued").await
    }

    fn request(&self, method: Method, path: &str, credentials: &Credentials) -> RequestBuilder {
        self.http
            .request(method, format!("{}/api{}", self.base_url, path))
            .bearer_auth(credentials.token())
    }
}

/// Unwraps `data.<key>` from a success envelope; an empty key returns `data`.
async fn read_data<T>(response: Response, key: &str) -> Result<T, ClientError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let failure: FailureBody = serde_json::from_slice(&body).unwrap_or(FailureBody {
            code: None,
            message: None,
        });
        return Err(ClientError::Api {
            status,
            code: failure.code.unwrap_or_else(|| "UNKNOWN".to_string()),
            message: failure
                .message
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned()),
        });
    }

    let mut envelope: Value =
        serde_json::from_slice(&body).map_err(|err| ClientError::Decode(err.to_string()))?;
    let data = envelope
        .get_mut("data")
        .map(Value::take)
        .ok_or_else(|| ClientError::Decode("missing `data` field".to_string()))?;
    let value = if key.is_empty() {
        data
    } else {
        data.get(key)
            .cloned()
            .ok_or_else(|| ClientError::Decode(format!("missing `data.{key}` field")))?
    };

    serde_json::from_value(value).map_err(|err| ClientError::Decode(err.to_string()))
}
