mod gate;
mod refresh;
mod token;

use axum::{routing::post, Router};

use crate::AppState;

pub use gate::{authorize, rejection, student_gate, tutor_gate, Caller};
pub use token::{Claims, TokenError, TokenKeys, TokenType};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(refresh::refresh))
}
