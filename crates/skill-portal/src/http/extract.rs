use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use super::PortalState;
use crate::auth::AuthError;
use crate::domain::{Role, User};
use crate::error::AppError;
use crate::store::PortalStore;

/// Account behind the `Authorization: Bearer <token>` header.
///
/// The token is verified and the account reloaded on every request, so role
/// changes take effect without reissuing tokens.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn require_role(&self, role: Role) -> Result<&User, AppError> {
        if self.0.role == role {
            Ok(&self.0)
        } else {
            Err(AuthError::RoleDenied(self.0.role).into())
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<PortalState<S>> for AuthUser
where
    S: PortalStore + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &PortalState<S>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::TokenMissing)?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::TokenInvalid)?;

        let user_id = state.tokens.user_id(token)?;
        let user = state
            .portal
            .store()
            .user(&user_id)?
            .ok_or(AuthError::UnknownUser)?;

        Ok(AuthUser(user))
    }
}

/// `Json` whose rejection renders through the API error envelope.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, St> FromRequest<St> for ApiJson<T>
where
    T: DeserializeOwned,
    St: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &St) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppError::BadRequest(describe(rejection))),
        }
    }
}

fn describe(rejection: JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Expected request with `Content-Type: application/json`".to_string()
        }
        other => other.body_text(),
    }
}
