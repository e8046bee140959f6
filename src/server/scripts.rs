use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireTenant;
use crate::claim::check_claim;
use crate::error::Error;
use crate::publish::PublishRequest;
use crate::server::AppState;
use crate::server::dto::{EXPECTED_SCRIPT_BODY, PutScriptRequest};
use crate::server::response::{ApiError, ResultExt};
use crate::server::validation::validate_script_name;
use crate::types::TagFilter;

/// Scripts tagged with the caller's tenant id.
pub async fn list_scripts(
    RequireTenant(tenant): RequireTenant,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let scripts = state
        .registry
        .list_scripts_by_tags(&[TagFilter::allow(tenant.id.as_str())])
        .await
        .api_err("Could not list scripts")?;

    Ok::<_, ApiError>(Json(scripts))
}

pub async fn put_script(
    RequireTenant(tenant): RequireTenant,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    validate_script_name(&name)?;

    let req: PutScriptRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(_) => {
            // A reserved name answers 409 whatever the body.
            let decision = check_claim(state.registry.as_ref(), &name, &tenant)
                .await
                .api_err("Could not complete request")?;
            if !decision.is_allowed() {
                return Err(ApiError::conflict("Script name already reserved"));
            }
            return Err(ApiError::bad_request(EXPECTED_SCRIPT_BODY));
        }
    };
    let config = req.dispatch_config.unwrap_or_default();

    let request = PublishRequest {
        script_name: name,
        content: Bytes::from(req.script),
        limits: config.limits.unwrap_or_default(),
        outbound: config.outbound,
    };

    match state.publisher.publish(&tenant, request).await {
        Ok(receipt) => {
            if !receipt.deferred.is_empty() {
                tracing::warn!(
                    script = %receipt.script_name,
                    "Published with deferred steps: {:?}",
                    receipt.deferred
                );
            }
            Ok::<_, ApiError>((StatusCode::CREATED, "Success"))
        }
        Err(Error::NameReserved) => Err(ApiError::conflict("Script name already reserved")),
        Err(Error::UpstreamValidation { status, body }) => {
            tracing::info!("Registry rejected upload with status {status}");
            Err(ApiError::upstream(body))
        }
        Err(e) => {
            tracing::error!(tenant = %tenant.id, "Publish failed: {e}");
            Err(ApiError::internal("Could not complete request"))
        }
    }
}
