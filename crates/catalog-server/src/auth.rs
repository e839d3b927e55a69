//! Bearer-token auth gate.
//!
//! Handlers that need a caller take [`Principal`] (any valid token) or
//! [`AdminPrincipal`] (role ADMIN) as an extractor argument. The token is
//! verified once here and the decoded principal is passed down explicitly.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use catalog_shared::token::TokenSigner;
use catalog_shared::Role;

use crate::api::AppState;
use crate::error::ApiError;

/// The authenticated caller, decoded from the access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub mobile: String,
    pub is_active: bool,
    pub role: Role,
}

/// A principal whose role is ADMIN.
#[derive(Debug, Clone)]
pub struct AdminPrincipal(pub Principal);

pub fn authenticate(headers: &HeaderMap, tokens: &TokenSigner) -> Result<Principal, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err(ApiError::Unauthorized("Invalid authorization header".into()));
    };

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::Unauthorized("Token is missing".into()));
    }

    let claims = tokens.verify_access_token(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        ApiError::Unauthorized("Invalid or expired token".into())
    })?;

    Ok(Principal {
        id: claims.id,
        mobile: claims.mobile,
        is_active: claims.is_active,
        role: claims.role,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, &state.tokens)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = authenticate(&parts.headers, &state.tokens)?;
        if principal.role != Role::Admin {
            tracing::debug!(user_id = principal.id, "Non-admin caller on admin route");
            return Err(ApiError::Forbidden("Access denied, admin only".into()));
        }
        Ok(AdminPrincipal(principal))
    }
}
