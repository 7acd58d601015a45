#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, RgbImage};
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use inkstone_api::auth::jwt::{generate_access_token, JwtConfig};
use inkstone_api::config::{ServerConfig, StorageConfig};
use inkstone_api::routes;
use inkstone_api::state::AppState;
use inkstone_pipeline::extract::{CharacterExtractor, CreatedWork};
use inkstone_core::extraction::{BoxEntry, ScaleFactor};
use inkstone_core::types::DbId;
use inkstone_db::models::user::CreateUser;
use inkstone_db::models::work::CreateWork;
use inkstone_db::repositories::UserRepo;
use inkstone_recognition::ocr::OcrConfig;
use inkstone_recognition::vision::VisionConfig;

/// Base URL that refuses connections, for tests that never reach a remote.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

const BOUNDARY: &str = "inkstone-test-boundary";

/// Build a test `ServerConfig` rooted at `root`.
///
/// Uses `http://localhost:5173` as CORS origin, a 30-second request timeout
/// and short remote-call timeouts.
pub fn test_config(root: &Path, ocr_base: &str, vision_base: &str) -> ServerConfig {
    let upload_dir = root.join("uploads");
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry_mins: 60,
        },
        storage: StorageConfig {
            artifact_dir: upload_dir.join("ocr_artifacts"),
            annotation_dir: root.join("annotations"),
            max_upload_bytes: 1024 * 1024,
            max_analysis_bytes: 512 * 1024,
            artifact_ttl: Duration::from_secs(3600),
            artifact_reap_interval: Duration::from_secs(3600),
            upload_dir,
        },
        ocr: OcrConfig {
            endpoint: format!("{ocr_base}/ocr"),
            token: "token".to_string(),
            email: "ops@example.com".to_string(),
            timeout: Duration::from_secs(5),
        },
        vision: VisionConfig {
            api_key: "key".to_string(),
            base_url: vision_base.to_string(),
            model: "vision-test".to_string(),
            timeout: Duration::from_secs(5),
            temperature: 0.7,
        },
        external_call_concurrency: 2,
    }
}

/// Build the full application router with all middleware layers.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (body limit, CORS, request ID,
/// timeout, tracing, panic recovery) that production uses.
pub fn build_test_app(pool: PgPool, config: ServerConfig) -> Router {
    let body_limit = config.storage.body_limit();
    let state = AppState::new(pool, config);

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert a user and return its id with a valid bearer token.
pub async fn create_user(pool: &PgPool, config: &ServerConfig, username: &str) -> (DbId, String) {
    let user = UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
        },
    )
    .await
    .expect("user creation should succeed");
    let token = generate_access_token(user.id, &config.jwt).expect("token should sign");
    (user.id, token)
}

/// Write a 200x100 work image under `dir` and store a work holding 永 and
/// 和 (60x60 boxes at x=10 and x=100) for `author_id`.
pub async fn seed_work(pool: &PgPool, author_id: DbId, dir: &Path) -> CreatedWork {
    std::fs::create_dir_all(dir).unwrap();
    let image_path = dir.join("seed.png");
    std::fs::write(&image_path, png(200, 100)).unwrap();

    let entry = |text: &str, x: f64, word: i32| BoxEntry {
        text: Some(text.to_string()),
        position: Some(vec![x, 10.0, x + 60.0, 70.0]),
        line_index: Some(0),
        word_index: Some(word),
        ..Default::default()
    };
    let input = CreateWork {
        author_id,
        title: "九成宫".to_string(),
        description: String::new(),
        image_path: image_path.to_string_lossy().into_owned(),
        style: "楷书".to_string(),
        dynasty: "唐".to_string(),
        author_name: "欧阳询".to_string(),
        source_type: "碑帖".to_string(),
        tags: Vec::new(),
        width: 200,
        height: 100,
        ocr_artifact_path: None,
    };
    CharacterExtractor::new(pool.clone())
        .create_work(
            &input,
            &[entry("永", 10.0, 0), entry("和", 100.0, 1)],
            ScaleFactor::IDENTITY,
        )
        .await
        .expect("seed work should be created")
}

/// Encode a blank RGB image as PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn with_auth(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    get_auth(app, uri, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: Option<&str>) -> Response {
    let request = with_auth(Request::builder().method(Method::GET).uri(uri), token)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response {
    json_request(app, Method::POST, uri, body, token).await
}

pub async fn put_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response {
    json_request(app, Method::PUT, uri, body, token).await
}

async fn json_request(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response {
    let request = with_auth(
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json"),
        token,
    )
    .body(Body::from(serde_json::to_vec(&body).unwrap()))
    .unwrap();
    send(app, request).await
}

pub async fn delete(app: Router, uri: &str, token: Option<&str>) -> Response {
    let request = with_auth(Request::builder().method(Method::DELETE).uri(uri), token)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// One multipart form field.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    /// Field name, file name, contents.
    File(&'a str, &'a str, &'a [u8]),
}

pub async fn post_multipart(
    app: Router,
    uri: &str,
    parts: &[Part<'_>],
    token: Option<&str>,
) -> Response {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = with_auth(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ),
        token,
    )
    .body(Body::from(body))
    .unwrap();
    send(app, request).await
}
