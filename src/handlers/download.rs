//! Token-gated template downloads.
//!
//! `GET /api/download/{purchase_id}?token=...` serves the purchased
//! template as a ZIP archive. `POST /api/download/generate-link/{purchase_id}`
//! mints a fresh link for the purchase owner. There is no revocation list:
//! every minted token stays valid until its own expiry.

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::archive::build_template_archive;
use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Path, Query};
use crate::id::EntityType;
use crate::middleware::{user_auth, AuthedUser};
use crate::models::{AnalyticsEventType, Purchase, Template};
use crate::token::DOWNLOAD_LINK_EXPIRY_HINT;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/download/{purchase_id}", get(download_template))
        .route(
            "/api/download/generate-link/{purchase_id}",
            post(generate_download_link).layer(from_fn_with_state(state, user_auth)),
        )
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    token: Option<String>,
}

/// Load the purchase and its template, mapping absence to 404.
///
/// A download racing a webhook that hasn't recorded the purchase yet is a
/// normal 404, not an error.
fn load_purchase_and_template(
    state: &AppState,
    purchase_id: &str,
) -> Result<(Purchase, Template)> {
    let conn = state.db.get()?;

    let purchase = queries::get_purchase_by_id(&conn, purchase_id)?
        .ok_or_else(|| AppError::NotFound("Purchase not found".into()))?;

    let template = queries::get_template_by_id(&conn, &purchase.template_id)?
        .ok_or_else(|| AppError::NotFound("Template not found".into()))?;

    Ok((purchase, template))
}

pub async fn download_template(
    State(state): State<AppState>,
    Path(purchase_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    if !EntityType::Purchase.is_valid_id(&purchase_id) {
        return Err(AppError::BadRequest("Invalid purchase id".into()));
    }

    let token = query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Download token required".into()))?;

    if let Err(e) = state.tokens.verify_download_token(&purchase_id, &token) {
        tracing::warn!("Download token rejected for purchase {}: {}", purchase_id, e);
        return Err(AppError::Unauthorized(e.to_string()));
    }

    let (purchase, template) = load_purchase_and_template(&state, &purchase_id)?;

    // Side effects are best-effort and ordered: analytics first, then the
    // counter. Neither may block the download.
    {
        let conn = state.db.get()?;

        let event_data = json!({
            "purchase_id": purchase.id,
            "template_id": template.id,
            "user_id": purchase.user_id,
        });
        if let Err(e) =
            queries::insert_analytics_event(&conn, AnalyticsEventType::Download, &event_data)
        {
            tracing::warn!("Failed to record download analytics event: {}", e);
        }

        if let Err(e) = queries::increment_template_downloads(&conn, &template.id) {
            tracing::warn!(
                "Failed to increment downloads for template {}: {}",
                template.id,
                e
            );
        }
    }

    let archive = match build_template_archive(&template, &purchase, &state.support_email) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Archive assembly failed for purchase {}: {}", purchase.id, e);
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to generate download" })),
            )
                .into_response());
        }
    };

    let filename = format!("{}-template.zip", template.slug());

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        archive,
    )
        .into_response())
}

#[derive(Serialize)]
pub struct GenerateLinkResponse {
    pub success: bool,
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: &'static str,
}

pub async fn generate_download_link(
    State(state): State<AppState>,
    Path(purchase_id): Path<String>,
    Extension(AuthedUser(user)): Extension<AuthedUser>,
) -> Result<Json<GenerateLinkResponse>> {
    if !EntityType::Purchase.is_valid_id(&purchase_id) {
        return Err(AppError::BadRequest("Invalid purchase id".into()));
    }

    let conn = state.db.get()?;
    let purchase = queries::get_purchase_by_id(&conn, &purchase_id)?
        .ok_or_else(|| AppError::NotFound("Purchase not found".into()))?;

    if purchase.user_id != user.id {
        tracing::warn!(
            "User {} requested a download link for purchase {} owned by {}",
            user.id,
            purchase.id,
            purchase.user_id
        );
        return Err(AppError::Forbidden(
            "This purchase belongs to a different account".into(),
        ));
    }

    let token = state.tokens.issue_download_token(&purchase.id);
    let download_url = format!(
        "{}/api/download/{}?token={}",
        state.base_url, purchase.id, token
    );

    Ok(Json(GenerateLinkResponse {
        success: true,
        download_url,
        expires_in: DOWNLOAD_LINK_EXPIRY_HINT,
    }))
}
