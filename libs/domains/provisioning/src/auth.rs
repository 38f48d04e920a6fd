//! Administrator capability.
//!
//! Every provisioning operation takes an [`AdminCapability`]. The only way to obtain one is
//! from verified JWT claims carrying the [`ADMIN_ROLE`], so the service never checks
//! authorization itself.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_helpers::{AppError, AuditEvent, AuditOutcome, JwtClaims};
use thiserror::Error;

pub const ADMIN_ROLE: &str = "admin";

/// Proof that the caller passed the administrator check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCapability {
    subject: String,
}

impl AdminCapability {
    pub fn from_claims(claims: &JwtClaims) -> Result<Self, AccessDenied> {
        if !claims.has_role(ADMIN_ROLE) {
            return Err(AccessDenied::NotAdmin {
                subject: claims.sub.clone(),
            });
        }
        Ok(Self {
            subject: claims.sub.clone(),
        })
    }

    /// Login of the administrator
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("User '{subject}' is not an administrator")]
    NotAdmin { subject: String },
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => AppError::Unauthorized(self.to_string()).into_response(),
            Self::NotAdmin { .. } => AppError::Forbidden(self.to_string()).into_response(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AdminCapability {
    type Rejection = AccessDenied;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<JwtClaims>()
            .ok_or(AccessDenied::Unauthenticated)?;

        AdminCapability::from_claims(claims).inspect_err(|_| {
            AuditEvent::new(
                Some(claims.sub.clone()),
                "provisioning.access",
                Some(parts.uri.path().to_string()),
                AuditOutcome::Denied,
            )
            .with_request(&parts.headers)
            .log();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn claims(roles: &[&str]) -> JwtClaims {
        JwtClaims {
            sub: "alice".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            exp: 0,
            iat: 0,
            jti: "test".to_string(),
        }
    }

    #[test]
    fn test_admin_role_grants_capability() {
        let capability = AdminCapability::from_claims(&claims(&["user", "admin"])).unwrap();
        assert_eq!(capability.subject(), "alice");
    }

    #[test]
    fn test_other_roles_are_denied() {
        assert_eq!(
            AdminCapability::from_claims(&claims(&["user"])),
            Err(AccessDenied::NotAdmin {
                subject: "alice".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_extractor_without_claims_is_unauthenticated() {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let rejection = AdminCapability::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        assert_eq!(rejection, AccessDenied::Unauthenticated);
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_extractor_with_non_admin_claims_is_forbidden() {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        parts.extensions.insert(claims(&["user"]));

        let rejection = AdminCapability::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(rejection.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_extractor_with_admin_claims() {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        parts.extensions.insert(claims(&["admin"]));

        let capability = AdminCapability::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(capability.subject(), "alice");
    }
}
