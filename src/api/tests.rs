//! Router-level tests: real router, in-memory database, temporary media root.

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use super::{build_router, AppState};
use crate::config::{AdminConfig, Config};
use crate::db::{create_test_pool, migrations};
use crate::services::user::RegisterInput;

const BOUNDARY: &str = "cityguideboundary";

struct TestApp {
    router: Router,
    state: AppState,
    _media: TempDir,
}

async fn app() -> TestApp {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let media = TempDir::new().unwrap();
    let mut config = Config::default();
    config.server.debug = true;
    config.server.secret_key = Some("test-secret".to_string());
    config.upload.media_root = media.path().to_path_buf();

    let state = AppState::from_config(pool, &config).expect("Failed to build state");
    TestApp {
        router: build_router(state.clone()),
        state,
        _media: media,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
        };
        (status, headers, body)
    }

    /// Register a member and return their session token
    async fn member(&self, username: &str) -> String {
        let email = format!("{}@example.com", username);
        let user = self
            .state
            .user_service
            .register(RegisterInput::new(username, email, "pa55-word-long"))
            .await
            .unwrap();
        self.state.user_service.start_session(user.id).await.unwrap()
    }

    async fn staff(&self) -> String {
        let admin = AdminConfig {
            username: "curator".to_string(),
            email: "curator@example.com".to_string(),
            password: "curator-pass-1".to_string(),
        };
        let user = self.state.user_service.ensure_staff_account(&admin).await.unwrap();
        self.state.user_service.start_session(user.id).await.unwrap()
    }

    /// Submit an attraction and return its id
    async fn submit(&self, token: &str, name: &str) -> i64 {
        let fields = attraction_fields(name);
        let request = multipart(Method::POST, "/api/v1/attractions", Some(token), &fields, None);
        let (status, _, body) = self.send(request).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_i64().unwrap()
    }

    async fn approve(&self, staff: &str, ids: &[i64]) -> Value {
        let uri = "/api/v1/admin/attractions/approve";
        let request = json_request(Method::POST, uri, Some(staff), json!({ "ids": ids }));
        let (status, _, body) = self.send(request).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body
    }
}

fn builder(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "localhost:8000");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    builder(Method::GET, uri, token).body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    builder(method, uri, token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart(
    method: Method,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    builder(method, uri, token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn attraction_fields(name: &str) -> Vec<(&str, &str)> {
    vec![
        ("name", name),
        ("description", "Mountain resort with a view of the city"),
        ("category", "NATURE"),
        ("location", "Toril, Davao City"),
        ("latitude", "7.0245"),
        ("longitude", "125.4728"),
    ]
}

#[tokio::test]
async fn test_root_redirects_to_list() {
    let app = app().await;
    let (status, headers, _) = app.send(get("/", None)).await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/api/v1/attractions");
}

#[tokio::test]
async fn test_disallowed_host_rejected() {
    let app = app().await;
    let request = Request::builder()
        .uri("/api/v1/attractions")
        .header(header::HOST, "evil.example.net")
        .body(Body::empty())
        .unwrap();

    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, _, body) = app.send(get("/api/v1/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_register_sets_session_cookie() {
    let app = app().await;
    let request = json_request(
        Method::POST,
        "/api/v1/auth/register",
        None,
        json!({
            "username": "traveller",
            "email": "traveller@example.com",
            "password1": "durian-season",
            "password2": "durian-season"
        }),
    );

    let (status, headers, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["user"]["username"], "traveller");
    assert_eq!(body["user"]["role"], "member");
    assert!(body["user"].get("password_hash").is_none());

    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    let session = cookie.split(';').next().unwrap().to_string();
    assert_eq!(session, format!("session={}", body["token"].as_str().unwrap()));

    // The cookie alone authenticates
    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::HOST, "localhost")
        .header(header::COOKIE, session)
        .body(Body::empty())
        .unwrap();
    let (status, _, me) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "traveller");
}

#[tokio::test]
async fn test_register_reports_field_errors() {
    let app = app().await;
    let request = json_request(
        Method::POST,
        "/api/v1/auth/register",
        None,
        json!({
            "username": "bad name!",
            "email": "not-an-email",
            "password1": "12345678",
            "password2": "12345678"
        }),
    );

    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let details = &body["error"]["details"];
    assert!(details["username"].is_array());
    assert!(details["email"].is_array());
    assert!(details["password2"].is_array());
}

#[tokio::test]
async fn test_login_logout() {
    let app = app().await;
    app.member("explorer").await;

    let bad = json_request(
        Method::POST,
        "/api/v1/auth/login",
        None,
        json!({ "username": "explorer", "password": "wrong-password" }),
    );
    let (status, _, _) = app.send(bad).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let good = json_request(
        Method::POST,
        "/api/v1/auth/login",
        None,
        json!({ "username": "explorer", "password": "pa55-word-long" }),
    );
    let (status, _, body) = app.send(good).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let request = builder(Method::POST, "/api/v1/auth/logout", Some(&token))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = app.send(get("/api/v1/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tampered_token_is_anonymous() {
    let app = app().await;
    let token = app.member("sneaky").await;
    let (id, _) = token.split_once('.').unwrap();
    let forged = format!("{}.{}", id, "0".repeat(64));

    let (status, _, _) = app.send(get("/api/v1/auth/me", Some(&forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Public pages still work
    let (status, _, _) = app.send(get("/api/v1/attractions", Some(&forged))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_submission_requires_login() {
    let app = app().await;
    let fields = attraction_fields("Anon");
    let request = multipart(Method::POST, "/api/v1/attractions", None, &fields, None);

    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_moderation_flow() {
    let app = app().await;
    let member = app.member("contributor").await;
    let staff = app.staff().await;

    let fields = attraction_fields("Eden Nature Park");
    let request = multipart(Method::POST, "/api/v1/attractions", Some(&member), &fields, None);
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(
        body["messages"][0]["text"],
        "Attraction submitted! It will be visible after admin approval."
    );
    let id = body["id"].as_i64().unwrap();
    let detail_uri = format!("/api/v1/attractions/{}", id);

    // Hidden from the public, visible to its contributor
    let (_, _, list) = app.send(get("/api/v1/attractions", None)).await;
    assert_eq!(list["total"], 0);
    let (status, _, _) = app.send(get(&detail_uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, detail) = app.send(get(&detail_uri, Some(&member))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["can_edit"], true);

    // Members cannot moderate
    let uri = "/api/v1/admin/attractions/approve";
    let request = json_request(Method::POST, uri, Some(&member), json!({ "ids": [id] }));
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let outcome = app.approve(&staff, &[id, 9999]).await;
    assert_eq!(outcome, json!({ "status": "APPROVED", "updated": [id], "skipped": [9999] }));

    let (_, _, list) = app.send(get("/api/v1/attractions", None)).await;
    assert_eq!(list["total"], 1);
    assert_eq!(list["items"][0]["name"], "Eden Nature Park");
    assert_eq!(list["items"][0]["average_rating"], 0.0);

    // Already approved: rejecting is skipped
    let uri = "/api/v1/admin/attractions/reject";
    let request = json_request(Method::POST, uri, Some(&staff), json!({ "ids": [id] }));
    let (_, _, outcome) = app.send(request).await;
    assert_eq!(outcome["skipped"], json!([id]));
}

#[tokio::test]
async fn test_staff_submission_auto_approved() {
    let app = app().await;
    let staff = app.staff().await;

    let fields = attraction_fields("People's Park");
    let request = multipart(Method::POST, "/api/v1/attractions", Some(&staff), &fields, None);
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "APPROVED");
    assert_eq!(body["messages"][0]["text"], "Attraction created and approved!");
}

#[tokio::test]
async fn test_create_validation_errors() {
    let app = app().await;
    let member = app.member("sloppy").await;
    let fields = vec![
        ("name", "Somewhere"),
        ("description", "Nice"),
        ("category", "NATURE"),
        ("location", "Davao"),
        ("latitude", "91"),
        ("longitude", "181"),
    ];

    let file = Some(("map.exe", &b"MZ"[..]));
    let request = multipart(Method::POST, "/api/v1/attractions", Some(&member), &fields, file);
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details = &body["error"]["details"];
    assert!(details["latitude"].is_array());
    assert!(details["longitude"].is_array());
    assert!(details["image"].is_array());
    assert!(details.get("name").is_none());
}

#[tokio::test]
async fn test_edit_by_owner_resets_status() {
    let app = app().await;
    let member = app.member("owner").await;
    let other = app.member("stranger").await;
    let staff = app.staff().await;
    let id = app.submit(&member, "Philippine Eagle Center").await;
    app.approve(&staff, &[id]).await;
    let uri = format!("/api/v1/attractions/{}", id);

    let edit = [("description", "Home of the national bird")];
    let (status, _, _) = app.send(multipart(Method::PUT, &uri, Some(&other), &edit, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = multipart(Method::PUT, &uri, Some(&member), &edit, None);
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["description"], "Home of the national bird");
    assert_eq!(body["name"], "Philippine Eagle Center");
    assert_eq!(body["messages"][0]["level"], "info");

    // Now pending again, so the stranger can no longer see it at all
    let (status, _, _) = app.send(multipart(Method::PUT, &uri, Some(&other), &edit, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reviews() {
    let app = app().await;
    let staff = app.staff().await;
    let reviewer = app.member("foodie").await;
    let id = app.submit(&staff, "Roxas Night Market").await;
    let uri = format!("/api/v1/attractions/{}/reviews", id);

    let review = json!({ "rating": 4, "comment": "  Great grilled tuna and cheap eats.  " });
    let request = json_request(Method::POST, &uri, Some(&reviewer), review.clone());
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["review_count"], 1);
    assert_eq!(body["average_rating"], 4.0);
    assert_eq!(body["has_reviewed"], true);
    assert_eq!(body["reviews"][0]["comment"], "Great grilled tuna and cheap eats.");
    assert_eq!(body["reviews"][0]["username"], "foodie");
    assert_eq!(body["messages"][0]["text"], "Thank you! Your review has been submitted.");

    let request = json_request(Method::POST, &uri, Some(&reviewer), review);
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review_count"], 1);
    assert_eq!(body["messages"][0]["level"], "warning");

    let staff_review = json!({ "rating": "5", "comment": "Best night market in town." });
    app.send(json_request(Method::POST, &uri, Some(&staff), staff_review)).await;
    let (_, _, detail) = app.send(get(&format!("/api/v1/attractions/{}", id), None)).await;
    assert_eq!(detail["average_rating"], 4.5);
    assert_eq!(detail["has_reviewed"], Value::Null);

    let invalid = json!({ "rating": 9, "comment": "short" });
    let newcomer = app.member("newcomer").await;
    let request = json_request(Method::POST, &uri, Some(&newcomer), invalid);
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["rating"].is_array());
    assert!(body["error"]["details"]["comment"].is_array());
}

#[tokio::test]
async fn test_photo_upload_served_and_deleted() {
    let app = app().await;
    let member = app.member("photographer").await;

    let (status, _, body) = app
        .send(multipart(
            Method::POST,
            "/api/v1/attractions",
            Some(&member),
            &attraction_fields("Samal Island"),
            Some(("beach.JPG", &b"not really a jpeg"[..])),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let image_url = body["image_url"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/media/attraction_photos/"));
    assert!(image_url.ends_with(".jpg"));

    let response = app.router.clone().oneshot(get(&image_url, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"not really a jpeg");

    let id = body["id"].as_i64().unwrap();
    let uri = format!("/api/v1/attractions/{}", id);
    let request = builder(Method::DELETE, &uri, Some(&member))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = app.send(get(&uri, Some(&member))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let response = app.router.clone().oneshot(get(&image_url, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_search_category_and_pages() {
    let app = app().await;
    let staff = app.staff().await;
    app.submit(&staff, "Crocodile Park").await;
    let market = [
        ("name", "Bankerohan Market"),
        ("description", "Fresh fruit"),
        ("category", "FOOD"),
        ("location", "Bankerohan"),
    ];
    app.send(multipart(Method::POST, "/api/v1/attractions", Some(&staff), &market, None)).await;

    let (_, _, body) = app.send(get("/api/v1/attractions?q=CROCO", None)).await;
    assert_eq!(body["total"], 1);

    let (_, _, body) = app.send(get("/api/v1/attractions?category=FOOD", None)).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["category"], "FOOD");

    let (_, _, body) = app.send(get("/api/v1/attractions?category=ALL", None)).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"][0]["name"], "Bankerohan Market");

    let (status, _, _) = app.send(get("/api/v1/attractions?category=BEACH", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = app.send(get("/api/v1/attractions?page=2", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_categories_map_and_contributions() {
    let app = app().await;
    let member = app.member("mapper").await;
    let staff = app.staff().await;
    app.submit(&member, "Pending Falls").await;
    let approved = app.submit(&staff, "Approved Peak").await;

    let (_, _, categories) = app.send(get("/api/v1/attractions/categories", None)).await;
    assert_eq!(categories.as_array().unwrap().len(), 4);
    assert_eq!(categories[0], json!({ "code": "NATURE", "label": "Nature & Outdoors" }));

    let (_, _, markers) = app.send(get("/api/v1/attractions/map", None)).await;
    assert_eq!(markers.as_array().unwrap().len(), 1);
    assert_eq!(markers[0]["id"], approved);

    let (_, _, markers) = app.send(get("/api/v1/attractions/map", Some(&member))).await;
    assert_eq!(markers.as_array().unwrap().len(), 2);

    let (status, _, _) = app.send(get("/api/v1/attractions/my-contributions", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (_, _, mine) = app.send(get("/api/v1/attractions/my-contributions", Some(&member))).await;
    assert_eq!(mine["total"], 1);
    assert_eq!(mine["items"][0]["status"], "PENDING");
}

#[tokio::test]
async fn test_admin_list_filters() {
    let app = app().await;
    let member = app.member("submitter").await;
    let staff = app.staff().await;
    app.submit(&member, "Waiting Room").await;
    app.submit(&staff, "Open Plaza").await;

    let (status, _, _) = app.send(get("/api/v1/admin/attractions", Some(&member))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = app.send(get("/api/v1/admin/attractions", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, _, all) = app.send(get("/api/v1/admin/attractions", Some(&staff))).await;
    assert_eq!(all["total"], 2);

    let request = get("/api/v1/admin/attractions?status=PENDING", Some(&staff));
    let (_, _, pending) = app.send(request).await;
    assert_eq!(pending["total"], 1);
    assert_eq!(pending["items"][0]["name"], "Waiting Room");
}
