use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use super::{success, AuthUser, PortalState};
use crate::domain::SkillId;
use crate::error::AppError;
use crate::store::PortalStore;

pub(super) fn router<S>() -> Router<PortalState<S>>
where
    S: PortalStore + 'static,
{
    Router::new().route("/:skill_id", get(skill_details::<S>))
}

async fn skill_details<S>(
    State(state): State<PortalState<S>>,
    AuthUser(viewer): AuthUser,
    Path(skill_id): Path<SkillId>,
) -> Result<Json<Value>, AppError>
where
    S: PortalStore + 'static,
{
    let skill = state.portal.budgets().skill_details(&viewer, &skill_id)?;
    Ok(success(json!({ "skill": skill })))
}
