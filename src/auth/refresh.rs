use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::{appresult::reply, db::ParticipantKind, AppError, AppResult, AppState};

use super::{gate::rejection, token::TokenType};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest {
    refresh_token: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn refresh(
    State(state): State<AppState>,
    Json(RefreshRequest { refresh_token }): Json<RefreshRequest>,
) -> AppResult<Json<Value>> {
    let Some(refresh_token) = refresh_token.filter(|t| !t.trim().is_empty()) else {
        return Err(AppError::unauthorized("Refresh token missing"));
    };

    let claims = state
        .keys
        .verify(&refresh_token, TokenType::Refresh)
        .map_err(rejection)?;
    let id = claims.id.unwrap_or_default();

    let identity = match claims.role.as_deref() {
        Some("student") => state.directory.find_by_id(ParticipantKind::Student, &id).await?,
        Some("tutor") => state.directory.find_by_id(ParticipantKind::Tutor, &id).await?,
        Some(_) => None,
        None => state.directory.resolve(&id).await?,
    };
    let Some(identity) = identity else {
        return Err(AppError::unauthorized("Account not found"));
    };
    let kind = identity.kind.ok_or_else(|| AppError::internal("identity without kind"))?;
    if state.directory.is_blocked(kind, &identity.id).await? {
        return Err(AppError::forbidden("Account is blocked"));
    }

    let access_token = state.keys.issue_access(&identity.id, Some(kind.as_str()))?;
    tracing::debug!(id = %identity.id, kind = kind.as_str(), "issued access token");

    reply("Access token refreshed", "accessToken", access_token)
}
