use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use super::{listing, success, ApiJson, AuthUser, PortalState};
use crate::domain::{Role, SkillId};
use crate::error::AppError;
use crate::store::PortalStore;
use crate::workflows::BudgetReview;

pub(super) fn router<S>() -> Router<PortalState<S>>
where
    S: PortalStore + 'static,
{
    Router::new()
        .route("/pending-budgets", get(pending_budgets::<S>))
        .route("/review-budget/:skill_id", patch(review_budget::<S>))
        .route("/feedback-analysis", get(feedback_analysis::<S>))
        .route("/skill-statistics", get(skill_statistics::<S>))
        .route(
            "/send-feedback-summary/:skill_id",
            post(send_feedback_summary::<S>),
        )
}

async fn pending_budgets<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::SkillTeam)?;
    let skills = state.portal.budgets().pending_budgets(actor)?;
    Ok(listing("skills", skills))
}

async fn review_budget<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(skill_id): Path<SkillId>,
    ApiJson(review): ApiJson<BudgetReview>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::SkillTeam)?;
    let skill = state
        .portal
        .budgets()
        .review_budget(actor, &skill_id, review, Utc::now())?;
    Ok(success(json!({ "skill": skill })))
}

async fn feedback_analysis<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::SkillTeam)?;
    let analysis = state.portal.feedback().feedback_analysis(actor)?;
    Ok(listing("feedbackAnalysis", analysis))
}

async fn skill_statistics<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::SkillTeam)?;
    let statistics = state.portal.analytics().skill_statistics(actor)?;
    Ok(success(json!(statistics)))
}

async fn send_feedback_summary<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(skill_id): Path<SkillId>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::SkillTeam)?;
    let queued = state
        .portal
        .feedback()
        .send_feedback_summary(actor, &skill_id, Utc::now())?;
    Ok(success(json!({
        "message": "Feedback summary sent successfully",
        "queued": queued,
    })))
}
