use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{db::ParticipantKind, AppError, AppResult, AppState};

use super::token::{TokenError, TokenType};

/// The only trusted identity downstream handlers ever see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub kind: ParticipantKind,
}

impl Caller {
    /// Path ids naming the caller must be the caller.
    pub fn ensure_is(&self, claimed_id: &str) -> AppResult<()> {
        if self.id != claimed_id.trim() {
            return Err(AppError::forbidden("id does not match the authenticated account"));
        }
        Ok(())
    }

    /// Name of the path parameter that carries this caller's own id.
    pub fn id_field(&self) -> &'static str {
        match self.kind {
            ParticipantKind::Student => "userId",
            ParticipantKind::Tutor => "tutorId",
        }
    }
}

/// Rejection for a credential that failed verification.
pub fn rejection(err: TokenError) -> AppError {
    match err {
        TokenError::MissingSubject => AppError::bad_request("Invalid token payload"),
        TokenError::Expired => AppError::unauthorized("Token expired"),
        TokenError::BadSignature => AppError::unauthorized("Invalid token signature"),
        TokenError::Malformed | TokenError::WrongType { .. } => AppError::unauthorized("Invalid token"),
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// token present -> verified -> identity found -> not blocked.
pub async fn authorize(state: &AppState, kind: ParticipantKind, headers: &HeaderMap) -> AppResult<Caller> {
    let Some(token) = bearer(headers) else {
        tracing::debug!(kind = kind.as_str(), "rejected request without bearer token");
        return Err(AppError::unauthorized("Access token missing"));
    };

    let claims = state.keys.verify(token, TokenType::Access).map_err(|err| {
        tracing::warn!(kind = kind.as_str(), %err, "rejected bearer token");
        rejection(err)
    })?;
    let id = claims.id.unwrap_or_default();

    if claims.role.as_deref().is_some_and(|role| role != kind.as_str()) {
        tracing::warn!(%id, role = ?claims.role, kind = kind.as_str(), "token role not allowed here");
        return Err(AppError::forbidden("Token role not permitted for this route"));
    }

    let Some(identity) = state.directory.find_by_id(kind, &id).await? else {
        tracing::warn!(%id, kind = kind.as_str(), "token for unknown account");
        return Err(AppError::unauthorized("Account not found"));
    };
    if identity.is_blocked {
        tracing::warn!(%id, kind = kind.as_str(), "blocked account rejected");
        return Err(AppError::forbidden("Account is blocked"));
    }

    Ok(Caller { id, kind })
}

pub async fn student_gate(State(state): State<AppState>, mut req: Request, next: Next) -> AppResult<Response> {
    let caller = authorize(&state, ParticipantKind::Student, req.headers()).await?;
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

pub async fn tutor_gate(State(state): State<AppState>, mut req: Request, next: Next) -> AppResult<Response> {
    let caller = authorize(&state, ParticipantKind::Tutor, req.headers()).await?;
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
