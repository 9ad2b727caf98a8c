//! Development login.
//!
//! Issues a session token for any user id, with no credentials. The token
//! stands in for whatever the real sign-in flow would hand the client.

use axum::{Json, extract::State};
use cartsync_core::UserId;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{ApiError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Issue a session token for `userId`.
#[instrument(skip(state, body), fields(user_id = %body.user_id))]
pub async fn issue_token(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> Result<Json<TokenResponse>> {
    if body.user_id.as_str().trim().is_empty() {
        return Err(ApiError::BadRequest("userId is required".to_string()));
    }

    let token = state.issue_token(body.user_id).await;
    tracing::info!("Issued session token");
    Ok(Json(TokenResponse { token }))
}
