use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    response::{IntoResponse, Response},
};

use crate::dispatch::dispatch;
use crate::error::Error;
use crate::server::AppState;
use crate::server::response::ApiError;

/// Public ingress: no authentication, the request is forwarded as received.
pub async fn dispatch_script(
    State(state): State<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
) -> Response {
    let Some(name) = params.get("name") else {
        return ApiError::not_found("Script does not exist").into_response();
    };

    match dispatch(state.store.as_ref(), state.fabric.as_ref(), name, request).await {
        Ok(response) => response,
        Err(Error::ScriptNotFound) => ApiError::not_found("Script does not exist").into_response(),
        Err(e) => {
            tracing::error!(script = %name, "Could not connect to script: {e}");
            ApiError::internal("Could not connect to script").into_response()
        }
    }
}
