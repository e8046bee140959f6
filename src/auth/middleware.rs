use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};

use super::token_digest;
use crate::error::{Error, Result};
use crate::server::AppState;
use crate::store::Store;
use crate::types::Tenant;

pub const CUSTOMER_TOKEN_HEADER: &str = "X-Customer-Token";

/// Extractor that requires a valid customer token.
pub struct RequireTenant(pub Tenant);

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingToken => (
                StatusCode::FORBIDDEN,
                format!("{CUSTOMER_TOKEN_HEADER} header is not set"),
            )
                .into_response(),
            AuthError::InvalidToken => (
                StatusCode::FORBIDDEN,
                format!("Unauthorized {CUSTOMER_TOKEN_HEADER}"),
            )
                .into_response(),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Resolves a raw token to its tenant.
pub fn resolve_tenant(store: &dyn Store, raw_token: Option<&str>) -> Result<Tenant> {
    let raw_token = raw_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(Error::Unauthenticated)?;

    store
        .get_tenant_by_token_digest(&token_digest(raw_token))?
        .ok_or(Error::Unauthorized)
}

impl FromRequestParts<Arc<AppState>> for RequireTenant {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = match parts.headers.get(CUSTOMER_TOKEN_HEADER) {
            Some(value) => Some(value.to_str().map_err(|_| AuthError::InvalidToken)?),
            None => None,
        };

        match resolve_tenant(state.store.as_ref(), header) {
            Ok(tenant) => Ok(RequireTenant(tenant)),
            Err(Error::Unauthenticated) => Err(AuthError::MissingToken),
            Err(Error::Unauthorized) => Err(AuthError::InvalidToken),
            Err(e) => {
                tracing::error!("Failed to resolve customer token: {e}");
                Err(AuthError::InternalError)
            }
        }
    }
}
