use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use super::{created, listing, success, ApiJson, AuthUser, PortalState};
use crate::domain::{AssessmentId, Role, SkillId};
use crate::error::AppError;
use crate::store::PortalStore;
use crate::workflows::{AssessmentSubmission, FeedbackSubmission};

pub(super) fn router<S>() -> Router<PortalState<S>>
where
    S: PortalStore + 'static,
{
    Router::new()
        .route("/available-skills", get(available_skills::<S>))
        .route("/my-skills", get(my_skills::<S>))
        .route("/register/:skill_id", post(register::<S>))
        .route("/my-attendance", get(my_attendance::<S>))
        .route("/submit-feedback/:skill_id", post(submit_feedback::<S>))
        .route("/available-assessments", get(available_assessments::<S>))
        .route(
            "/submit-assessment/:assessment_id",
            post(submit_assessment::<S>),
        )
        .route(
            "/assessment-results/:assessment_id",
            get(assessment_result::<S>),
        )
}

async fn available_skills<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Student)?;
    let skills = state.portal.enrollment().available_skills(actor)?;
    Ok(listing("skills", skills))
}

async fn my_skills<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Student)?;
    let skills = state.portal.enrollment().enrolled_skills(actor)?;
    Ok(listing("skills", skills))
}

async fn register<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(skill_id): Path<SkillId>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Student)?;
    let skill = state
        .portal
        .enrollment()
        .register_student(actor, &skill_id, Utc::now())?;
    Ok(success(json!({
        "message": "Successfully registered for the skill",
        "skill": skill,
    })))
}

async fn my_attendance<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Student)?;
    let attendance = state.portal.attendance().my_attendance(actor)?;
    Ok(listing("attendance", attendance))
}

async fn submit_feedback<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(skill_id): Path<SkillId>,
    ApiJson(submission): ApiJson<FeedbackSubmission>,
) -> Result<Response, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Student)?;
    let skill = state
        .portal
        .feedback()
        .submit_feedback(actor, &skill_id, submission, Utc::now())?;
    let feedback = skill.feedback_from(&actor.id);
    Ok(created(json!({ "feedback": feedback })))
}

async fn available_assessments<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Student)?;
    let assessments = state
        .portal
        .assessments()
        .available_assessments(actor, Utc::now())?;
    Ok(listing("assessments", assessments))
}

async fn submit_assessment<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(assessment_id): Path<AssessmentId>,
    ApiJson(submission): ApiJson<AssessmentSubmission>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Student)?;
    let result = state.portal.assessments().submit_assessment(
        actor,
        &assessment_id,
        submission,
        Utc::now(),
    )?;
    Ok(success(json!({ "result": result })))
}

async fn assessment_result<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(assessment_id): Path<AssessmentId>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Student)?;
    let result = state
        .portal
        .assessments()
        .student_result(actor, &assessment_id)?;
    Ok(success(json!({ "result": result })))
}
