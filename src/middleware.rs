//! Bearer-token authentication for account-scoped endpoints.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::crypto::hash_secret;
use crate::db::{queries, AppState};
use crate::models::User;

/// The authenticated account, inserted into request extensions.
#[derive(Clone)]
pub struct AuthedUser(pub User);

pub async fn user_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user = {
        let conn = state.db.get().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        queries::get_user_by_api_token_hash(&conn, &hash_secret(token))
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?
    };

    request.extensions_mut().insert(AuthedUser(user));

    Ok(next.run(request).await)
}
