use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{listing, success, ApiJson, AuthUser, PortalState};
use crate::domain::{Role, StudentType, UserId};
use crate::error::AppError;
use crate::store::PortalStore;
use crate::workflows::ProfileUpdate;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoleChange {
    role: Role,
    #[serde(default)]
    student_type: Option<StudentType>,
}

pub(super) fn router<S>() -> Router<PortalState<S>>
where
    S: PortalStore + 'static,
{
    Router::new()
        .route("/me", get(me::<S>).patch(update_me::<S>))
        .route("/users", get(list_users::<S>))
        .route("/users/:user_id/role", patch(update_role::<S>))
}

async fn me<S>(AuthUser(user): AuthUser) -> Json<Value>
where
    S: PortalStore + 'static,
{
    success(json!({ "user": user }))
}

async fn update_me<S>(
    State(state): State<PortalState<S>>,
    AuthUser(user): AuthUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let user = state
        .portal
        .identity()
        .update_profile(&user, update, Utc::now())?;
    Ok(success(json!({ "user": user })))
}

async fn list_users<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::SkillTeam)?;
    let users = state.portal.identity().list_users(actor)?;
    Ok(listing("users", users))
}

async fn update_role<S>(
    State(state): State<PortalState<S>>,
    auth: AuthUser,
    Path(user_id): Path<UserId>,
    ApiJson(change): ApiJson<RoleChange>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let actor = auth.require_role(Role::SkillTeam)?;
    let user = state.portal.identity().update_role(
        actor,
        &user_id,
        change.role,
        change.student_type,
        Utc::now(),
    )?;
    Ok(success(json!({ "user": user })))
}
