//! HTTP-level integration tests for keypoint analysis and annotations.
//!
//! The vision model is replaced by an in-process stub that always returns
//! the same fenced JSON reply.

mod common;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use common::{
    body_json, build_test_app, create_user, delete, get, get_auth, post_json, post_multipart,
    put_json, seed_work, spawn_stub, test_config, Part, UNREACHABLE,
};
use inkstone_api::config::ServerConfig;
use serde_json::json;
use sqlx::PgPool;
use tempfile::TempDir;

const VISION_REPLY: &str = "```json\n{\"character\": \"永\", \"complexity\": \"中等\", \
\"keypoints\": [{\"x\": 0.5, \"y\": 0.2, \"description\": \"点\", \"tips\": \"侧锋入笔\"}, \
{\"x\": 0.3, \"y\": 0.6, \"description\": \"横折\", \"tips\": \"折处顿笔\"}], \
\"overall_tips\": \"中宫收紧\"}\n```";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Env {
    pool: PgPool,
    config: ServerConfig,
    root: TempDir,
}

impl Env {
    async fn new(pool: PgPool) -> Self {
        let vision = spawn_stub(Router::new().route(
            "/chat/completions",
            post(|| async {
                Json(json!({"choices": [{"message": {"content": VISION_REPLY}}]}))
            }),
        ))
        .await;
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path(), UNREACHABLE, &vision);
        Self { pool, config, root }
    }

    fn app(&self) -> Router {
        build_test_app(self.pool.clone(), self.config.clone())
    }
}

fn payload(character: &str) -> serde_json::Value {
    json!({
        "character": character,
        "keypoints": [{"x": 0.4, "y": 0.4, "description": "起笔", "tips": "藏锋"}],
        "overall_tips": "笔画舒展",
        "user_id": 999
    })
}

// ---------------------------------------------------------------------------
// Test: ad-hoc analysis
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_uploaded_crop_is_analyzed(pool: PgPool) {
    let env = Env::new(pool).await;
    let crop = common::png(50, 50);

    let response = post_multipart(
        env.app(),
        "/api/v1/calligraphy/analyze",
        &[Part::File("image", "yong.png", &crop)],
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["character"], "永");
    assert_eq!(json["data"]["keypoints"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"]["keypoints"][1]["id"], 2);
    assert_eq!(json["data"]["metadata"]["image_size"], "300x300");
    assert_eq!(json["data"]["metadata"]["model"], "vision-test");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_analysis_rejects_non_image_extension(pool: PgPool) {
    let env = Env::new(pool).await;

    let response = post_multipart(
        env.app(),
        "/api/v1/calligraphy/analyze",
        &[Part::File("image", "yong.gif", b"GIF89a")],
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_EXTENSION");
}

// ---------------------------------------------------------------------------
// Test: standalone annotations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_standalone_annotation_lifecycle(pool: PgPool) {
    let env = Env::new(pool).await;
    let (user_id, token) = create_user(&env.pool, &env.config, "zhao").await;
    let (_, stranger) = create_user(&env.pool, &env.config, "qian").await;

    let response = post_json(
        env.app(),
        "/api/v1/calligraphy/annotations",
        payload("永"),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await["data"].clone();
    assert_eq!(created["user_id"], user_id);
    assert_eq!(created["username"], "zhao");
    assert_eq!(created["overall_tips"], "笔画舒展");
    assert_eq!(created["keypoints"][0]["id"], 1);
    let uri = format!(
        "/api/v1/calligraphy/annotations/{}",
        created["id"].as_str().unwrap()
    );

    let response = get_auth(env.app(), &uri, Some(&stranger)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = put_json(
        env.app(),
        &uri,
        json!({"keypoints": [], "complexity": "简单", "username": "mallory"}),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await["data"].clone();
    assert_eq!(updated["keypoints"], json!([]));
    assert_eq!(updated["complexity"], "简单");
    assert_eq!(updated["overall_tips"], "笔画舒展");
    assert_eq!(updated["username"], "zhao");

    let response = delete(env.app(), &uri, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = get_auth(env.app(), &uri, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_invalid_annotations_are_rejected(pool: PgPool) {
    let env = Env::new(pool).await;
    let (_, token) = create_user(&env.pool, &env.config, "zhao").await;
    let uri = "/api/v1/calligraphy/annotations";

    let response = post_json(env.app(), uri, json!({"keypoints": []}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        env.app(),
        uri,
        json!({"character": "永", "keypoints": [{"x": 1.2, "y": 0.1}]}),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(env.app(), uri, payload("永"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get_auth(env.app(), &format!("{uri}/not-an-id"), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: keypoints embedded on characters
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_character_analysis_stores_keypoints(pool: PgPool) {
    let env = Env::new(pool).await;
    let (user_id, token) = create_user(&env.pool, &env.config, "ouyang").await;
    let (_, stranger) = create_user(&env.pool, &env.config, "yan").await;
    let work = seed_work(&env.pool, user_id, &env.root.path().join("works")).await;
    let he = &work.characters[1];
    let analyze_uri = format!("/api/v1/characters/{}/analyze", he.id);

    let response = post_json(env.app(), &analyze_uri, json!({}), Some(&stranger)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_json(env.app(), &analyze_uri, json!({}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let annotation = body_json(response).await["data"].clone();
    assert_eq!(annotation["id"], format!("character-{}", he.id));
    // The recognized text stays authoritative over the model's guess.
    assert_eq!(annotation["character"], "和");
    assert_eq!(annotation["keypoints"].as_array().unwrap().len(), 2);
    assert_eq!(annotation["overall_tips"], "中宫收紧");
    assert_eq!(annotation["metadata"]["image_size"], "300x300");

    let json = body_json(get(env.app(), &format!("/api/v1/characters/{}", he.id)).await).await;
    assert_eq!(json["data"]["keypoints"].as_array().unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_character_annotation_is_replaced_and_cleared(pool: PgPool) {
    let env = Env::new(pool).await;
    let (user_id, token) = create_user(&env.pool, &env.config, "ouyang").await;
    let work = seed_work(&env.pool, user_id, &env.root.path().join("works")).await;
    let yong = &work.characters[0];
    let uri = format!("/api/v1/characters/{}/annotation", yong.id);

    let response = put_json(
        env.app(),
        &uri,
        json!({"keypoints": [{"x": 0.5, "y": 0.5, "tips": "中锋"}], "overall_tips": "平正"}),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(get_auth(env.app(), &uri, Some(&token)).await).await;
    assert_eq!(json["data"]["character"], "永");
    assert_eq!(json["data"]["username"], "ouyang");
    assert_eq!(json["data"]["keypoints"][0]["tips"], "中锋");
    assert_eq!(json["data"]["overall_tips"], "平正");

    let response = put_json(env.app(), &uri, json!({"character": "和"}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(get_auth(env.app(), &uri, Some(&token)).await).await;
    assert_eq!(json["data"]["character"], "永");

    // The same record is reachable through the annotation listing and id.
    let json = body_json(get(env.app(), "/api/v1/calligraphy/annotations?character=%E6%B0%B8").await).await;
    assert_eq!(json["data"]["pagination"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["id"], format!("character-{}", yong.id));
    let by_id = format!("/api/v1/calligraphy/annotations/character-{}", yong.id);
    assert_eq!(get_auth(env.app(), &by_id, Some(&token)).await.status(), StatusCode::OK);

    let response = delete(env.app(), &uri, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let json = body_json(get_auth(env.app(), &uri, Some(&token)).await).await;
    assert_eq!(json["data"]["keypoints"], json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_annotation_listing_spans_both_backings(pool: PgPool) {
    let env = Env::new(pool).await;
    let (user_id, token) = create_user(&env.pool, &env.config, "ouyang").await;
    let work = seed_work(&env.pool, user_id, &env.root.path().join("works")).await;

    post_json(env.app(), "/api/v1/calligraphy/annotations", payload("永"), Some(&token)).await;
    post_json(env.app(), "/api/v1/calligraphy/annotations", payload("之"), Some(&token)).await;
    put_json(
        env.app(),
        &format!("/api/v1/characters/{}/annotation", work.characters[1].id),
        json!({"keypoints": [{"x": 0.5, "y": 0.5}]}),
        Some(&token),
    )
    .await;

    let json = body_json(get(env.app(), "/api/v1/calligraphy/annotations").await).await;
    assert_eq!(json["data"]["pagination"]["total"], 3);

    let json = body_json(
        get(env.app(), &format!("/api/v1/calligraphy/annotations?user_id={user_id}&per_page=2")).await,
    )
    .await;
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"]["pagination"]["pages"], 2);
}
