use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use super::{created, listing, success, ApiJson, AuthUser, PortalState};
use crate::domain::{AssessmentId, Role, SkillId};
use crate::error::AppError;
use crate::store::PortalStore;
use crate::workflows::{
    AssessmentDraft, AssessmentUpdate, AttendanceSheet, BudgetSubmission, SkillUpdate,
};

pub(super) fn router<S>() -> Router<PortalState<S>>
where
    S: PortalStore + 'static,
{
    Router::new()
        .route("/submit-budget", post(submit_budget::<S>))
        .route("/my-skills", get(my_skills::<S>))
        .route("/update-skill/:skill_id", patch(update_skill::<S>))
        .route("/mark-attendance/:skill_id", post(mark_attendance::<S>))
        .route("/attendance-stats/:skill_id", get(attendance_stats::<S>))
        .route("/feedback/:skill_id", get(skill_feedback::<S>))
        .route("/create-assessment/:skill_id", post(create_assessment::<S>))
        .route(
            "/update-assessment/:assessment_id",
            patch(update_assessment::<S>),
        )
        .route(
            "/publish-assessment/:assessment_id",
            patch(publish_assessment::<S>),
        )
        .route(
            "/assessment-results/:assessment_id",
            get(assessment_results::<S>),
        )
}

async fn submit_budget<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    ApiJson(submission): ApiJson<BudgetSubmission>,
) -> Result<Response, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Faculty)?;
    let skill = state
        .portal
        .budgets()
        .submit_budget(actor, submission, Utc::now())?;
    Ok(created(json!({ "skill": skill })))
}

async fn my_skills<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Faculty)?;
    let skills = state.portal.budgets().my_skills(actor)?;
    Ok(listing("skills", skills))
}

async fn update_skill<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(skill_id): Path<SkillId>,
    ApiJson(update): ApiJson<SkillUpdate>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Faculty)?;
    let skill = state
        .portal
        .budgets()
        .update_skill(actor, &skill_id, update, Utc::now())?;
    Ok(success(json!({ "skill": skill })))
}

async fn mark_attendance<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(skill_id): Path<SkillId>,
    ApiJson(sheet): ApiJson<AttendanceSheet>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Faculty)?;
    let date = sheet.date;
    let skill = state
        .portal
        .attendance()
        .mark_attendance(actor, &skill_id, sheet, Utc::now())?;
    let record = skill.attendance_on(date);
    Ok(success(json!({ "attendance": record })))
}

async fn attendance_stats<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(skill_id): Path<SkillId>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Faculty)?;
    let stats = state.portal.attendance().attendance_stats(actor, &skill_id)?;
    Ok(success(json!({ "attendanceStats": stats })))
}

async fn skill_feedback<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(skill_id): Path<SkillId>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Faculty)?;
    let feedback = state.portal.feedback().skill_feedback(actor, &skill_id)?;
    Ok(listing("feedback", feedback))
}

async fn create_assessment<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(skill_id): Path<SkillId>,
    ApiJson(draft): ApiJson<AssessmentDraft>,
) -> Result<Response, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Faculty)?;
    let assessment =
        state
            .portal
            .assessments()
            .create_assessment(actor, &skill_id, draft, Utc::now())?;
    Ok(created(json!({ "assessment": assessment })))
}

async fn update_assessment<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(assessment_id): Path<AssessmentId>,
    ApiJson(update): ApiJson<AssessmentUpdate>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Faculty)?;
    let assessment = state.portal.assessments().update_assessment(
        actor,
        &assessment_id,
        update,
        Utc::now(),
    )?;
    Ok(success(json!({ "assessment": assessment })))
}

async fn publish_assessment<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(assessment_id): Path<AssessmentId>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Faculty)?;
    let assessment =
        state
            .portal
            .assessments()
            .publish_assessment(actor, &assessment_id, Utc::now())?;
    Ok(success(json!({ "assessment": assessment })))
}

async fn assessment_results<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(assessment_id): Path<AssessmentId>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::Faculty)?;
    let results = state
        .portal
        .assessments()
        .results(actor, &assessment_id, Utc::now())?;
    Ok(success(json!({ "results": results })))
}
