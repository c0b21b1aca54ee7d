//! Bearer tokens for portal accounts.
//!
//! The sign-in handshake happens elsewhere; this module only issues and
//! verifies the HS256 tokens that carry an account id between requests.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::{Role, User, UserId};

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Not authorized to access this route")]
    TokenMissing,
    #[error("Invalid token or no token provided")]
    TokenInvalid,
    #[error("User not found")]
    UnknownUser,
    #[error("User role {0} is not authorized to access this route")]
    RoleDenied(Role),
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::TokenMissing => "TOKEN_MISSING",
            AuthError::TokenInvalid => "TOKEN_INVALID",
            AuthError::UnknownUser => "UNKNOWN_USER",
            AuthError::RoleDenied(_) => "FORBIDDEN",
            AuthError::Signing(_) => "INTERNAL_ERROR",
        }
    }
}

/// Issues and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    /// Validates signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::TokenInvalid)
    }

    pub fn user_id(&self, token: &str) -> Result<UserId, AuthError> {
        self.verify(token).map(|claims| UserId(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StudentType;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId::from("usr-42"),
            google_id: "g-42".to_string(),
            email: "kavin@bitsathy.ac.in".to_string(),
            name: "Kavin".to_string(),
            role: Role::Student,
            student_type: Some(StudentType::Hosteller),
            enrolled_skills: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 1,
        }
    }

    #[test]
    fn issued_token_round_trips_subject_and_role() {
        let authority = TokenAuthority::new(b"test-secret", Duration::hours(1));
        let token = authority.issue(&user(), Utc::now()).expect("signed");

        let claims = authority.verify(&token).expect("valid token");
        assert_eq!(claims.sub, "usr-42");
        assert_eq!(claims.role, Role::Student);
    }

    #[test]
    fn expired_or_foreign_tokens_are_rejected() {
        let authority = TokenAuthority::new(b"test-secret", Duration::hours(1));
        let stale = authority
            .issue(&user(), Utc::now() - Duration::hours(3))
            .expect("signed");
        assert!(matches!(
            authority.verify(&stale),
            Err(AuthError::TokenInvalid)
        ));

        let other = TokenAuthority::new(b"other-secret", Duration::hours(1));
        let foreign = other.issue(&user(), Utc::now()).expect("signed");
        assert!(matches!(
            authority.verify(&foreign),
            Err(AuthError::TokenInvalid)
        ));
    }
}
