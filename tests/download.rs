//! Token-gated download and archive assembly tests

mod common;

use std::io::{Cursor, Read};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use tower::ServiceExt;
use tripvault::token::DOWNLOAD_TOKEN_TTL_MS;

async fn get_download(state: &AppState, purchase_id: &str, token: Option<&str>) -> axum::response::Response {
    let uri = match token {
        Some(t) => format!("/api/download/{}?token={}", purchase_id, t),
        None => format!("/api/download/{}", purchase_id),
    };
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app(state.clone()).oneshot(request).await.unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

fn read_zip(bytes: &[u8]) -> Vec<(String, String)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("Response is not a ZIP");
    let mut files = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        files.push((file.name().to_string(), content));
    }
    files
}

fn setup_purchase(state: &AppState) -> (Purchase, Template) {
    let conn = state.db.get().unwrap();
    let seller = create_test_user(&conn, "seller@example.com");
    let buyer = create_test_user(&conn, "buyer@example.com");
    let template = create_test_template(&conn, &seller.id, "Bali Sunset Villa");
    let purchase = create_test_purchase(&conn, &buyer.id, &template);
    (purchase, template)
}

// ============ GET /api/download/{purchase_id} ============

#[tokio::test]
async fn test_download_happy_path() {
    let state = create_test_app_state();
    let (purchase, template) = setup_purchase(&state);

    let token = state.tokens.issue_download_token(&purchase.id);
    let response = get_download(&state, &purchase.id, Some(&token)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/zip"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"bali-sunset-villa-template.zip\""
    );

    let files = read_zip(&body_bytes(response).await);
    let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["README.md", "index.html", "styles.css", "script.js", "LICENSE"]);

    // Counter bumped exactly once
    let conn = state.db.get().unwrap();
    let template = queries::get_template_by_id(&conn, &template.id).unwrap().unwrap();
    assert_eq!(template.downloads, 1);

    // Download analytics event recorded
    let events = queries::list_analytics_events(&conn, AnalyticsEventType::Download).unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_archive_content_fidelity() {
    let state = create_test_app_state();
    let (purchase, _) = setup_purchase(&state);

    let token = state.tokens.issue_download_token(&purchase.id);
    let response = get_download(&state, &purchase.id, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let files = read_zip(&body_bytes(response).await);

    let find = |name: &str| {
        files
            .iter()
            .find(|(n, _)| n == name)
            .unwrap_or_else(|| panic!("{} missing from archive", name))
            .1
            .clone()
    };

    assert_eq!(find("index.html"), "<h1>A</h1>");
    assert_eq!(find("styles.css"), "body{}");
    assert_eq!(find("script.js"), "console.log(1)");
    // LICENSE is bound to the buyer
    assert!(find("LICENSE").contains(&purchase.user_id));
    assert!(find("LICENSE").contains("non-transferable"));
    assert!(find("README.md").contains("support@runyourtrip.com"));
}

#[tokio::test]
async fn test_saas_category_ships_package_json() {
    let state = create_test_app_state();
    let (purchase, _) = {
        let conn = state.db.get().unwrap();
        let seller = create_test_user(&conn, "seller@example.com");
        let buyer = create_test_user(&conn, "buyer@example.com");
        let template = create_test_template_with(
            &conn,
            &seller.id,
            "Hotel Hub",
            "Hotel SaaS",
            r#"{"html":"<h1>H</h1>"}"#,
        );
        (create_test_purchase(&conn, &buyer.id, &template), template)
    };

    let token = state.tokens.issue_download_token(&purchase.id);
    let response = get_download(&state, &purchase.id, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let files = read_zip(&body_bytes(response).await);
    let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
    assert!(names.contains(&"package.json"));
}

#[tokio::test]
async fn test_raw_html_code_becomes_index_html() {
    let state = create_test_app_state();
    let raw = "<!doctype html><html><body>plain</body></html>";
    let (purchase, _) = {
        let conn = state.db.get().unwrap();
        let seller = create_test_user(&conn, "seller@example.com");
        let buyer = create_test_user(&conn, "buyer@example.com");
        let template =
            create_test_template_with(&conn, &seller.id, "Plain", "Travel Blog", raw);
        (create_test_purchase(&conn, &buyer.id, &template), template)
    };

    let token = state.tokens.issue_download_token(&purchase.id);
    let response = get_download(&state, &purchase.id, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let files = read_zip(&body_bytes(response).await);
    let index = files.iter().find(|(n, _)| n == "index.html").unwrap();
    assert_eq!(index.1, raw);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let state = create_test_app_state();
    let (purchase, _) = setup_purchase(&state);

    let response = get_download(&state, &purchase.id, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_link_is_unauthorized() {
    let state = create_test_app_state();
    let (purchase, _) = setup_purchase(&state);

    // Minted 8 days ago - past the 7-day window
    let eight_days_ago = now_ms() - DOWNLOAD_TOKEN_TTL_MS - 24 * 60 * 60 * 1000;
    let token = make_download_token(TEST_TOKEN_SECRET, &purchase.id, eight_days_ago);

    let response = get_download(&state, &purchase.id, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["error"], "Token expired");
}

#[tokio::test]
async fn test_token_for_other_purchase_is_unauthorized() {
    let state = create_test_app_state();
    let (purchase, template) = setup_purchase(&state);
    let other_purchase = {
        let conn = state.db.get().unwrap();
        let other_buyer = create_test_user(&conn, "other@example.com");
        create_test_purchase(&conn, &other_buyer.id, &template)
    };

    let token = state.tokens.issue_download_token(&other_purchase.id);
    let response = get_download(&state, &purchase.id, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_purchase_id_is_bad_request() {
    let state = create_test_app_state();
    let response = get_download(&state, "42", Some("whatever")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_purchase_is_not_found() {
    // A download racing a webhook that hasn't recorded the purchase yet
    // must be a plain 404, not an error
    let state = create_test_app_state();
    let phantom_id = "ryt_pur_00000000000000000000000000000000";
    let token = state.tokens.issue_download_token(phantom_id);

    let response = get_download(&state, phantom_id, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============ POST /api/download/generate-link/{purchase_id} ============

async fn post_generate_link(
    state: &AppState,
    purchase_id: &str,
    bearer: Option<&str>,
) -> axum::response::Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/download/generate-link/{}", purchase_id));
    if let Some(token) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = builder.body(Body::empty()).unwrap();
    app(state.clone()).oneshot(request).await.unwrap()
}

#[tokio::test]
async fn test_generate_link_for_owner() {
    let state = create_test_app_state();
    let (purchase, _) = setup_purchase(&state);
    let bearer = {
        let conn = state.db.get().unwrap();
        issue_bearer_token(&conn, &purchase.user_id)
    };

    let response = post_generate_link(&state, &purchase.id, Some(&bearer)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["expiresIn"], "7 days");

    // The minted link actually downloads
    let url = body["downloadUrl"].as_str().unwrap();
    let token = url.split("token=").nth(1).unwrap();
    let response = get_download(&state, &purchase.id, Some(token)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_generate_link_repeated_tokens_all_stay_valid() {
    // No revocation list: every minted token lives out its own expiry
    let state = create_test_app_state();
    let (purchase, _) = setup_purchase(&state);
    let bearer = {
        let conn = state.db.get().unwrap();
        issue_bearer_token(&conn, &purchase.user_id)
    };

    let mut tokens = Vec::new();
    for _ in 0..3 {
        let response = post_generate_link(&state, &purchase.id, Some(&bearer)).await;
        let body: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        let url = body["downloadUrl"].as_str().unwrap().to_string();
        tokens.push(url.split("token=").nth(1).unwrap().to_string());
    }

    for token in &tokens {
        let response = get_download(&state, &purchase.id, Some(token)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_generate_link_for_someone_elses_purchase_is_forbidden() {
    let state = create_test_app_state();
    let (purchase, _) = setup_purchase(&state);
    let stranger_bearer = {
        let conn = state.db.get().unwrap();
        let stranger = create_test_user(&conn, "stranger@example.com");
        issue_bearer_token(&conn, &stranger.id)
    };

    let response = post_generate_link(&state, &purchase.id, Some(&stranger_bearer)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_generate_link_without_auth_is_unauthorized() {
    let state = create_test_app_state();
    let (purchase, _) = setup_purchase(&state);

    let response = post_generate_link(&state, &purchase.id, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_generate_link_unknown_purchase_is_not_found() {
    let state = create_test_app_state();
    let bearer = {
        let conn = state.db.get().unwrap();
        let user = create_test_user(&conn, "user@example.com");
        issue_bearer_token(&conn, &user.id)
    };

    let response = post_generate_link(
        &state,
        "ryt_pur_00000000000000000000000000000000",
        Some(&bearer),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
