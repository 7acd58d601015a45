//! HTTP-level integration tests for character sets and membership.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{
    body_json, build_test_app, create_user, delete, get_auth, post_json, put_json, seed_work,
    test_config, UNREACHABLE,
};
use inkstone_api::config::ServerConfig;
use serde_json::{json, Value};
use sqlx::PgPool;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Env {
    pool: PgPool,
    config: ServerConfig,
    root: TempDir,
}

impl Env {
    fn new(pool: PgPool) -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path(), UNREACHABLE, UNREACHABLE);
        Self { pool, config, root }
    }

    fn app(&self) -> Router {
        build_test_app(self.pool.clone(), self.config.clone())
    }
}

async fn create_set(env: &Env, token: &str, name: &str) -> Value {
    let response = post_json(
        env.app(),
        "/api/v1/character-sets",
        json!({"name": name, "description": "常用字"}),
        Some(token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// Test: set CRUD
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_set_name_is_conflict(pool: PgPool) {
    let env = Env::new(pool);
    let (user_id, token) = create_user(&env.pool, &env.config, "ouyang").await;

    let set = create_set(&env, &token, "楷书精选").await;
    assert_eq!(set["user_id"], user_id);
    assert_eq!(set["name"], "楷书精选");

    let response = post_json(
        env.app(),
        "/api/v1/character-sets",
        json!({"name": " 楷书精选 "}),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");

    // Another user may reuse the name.
    let (_, other) = create_user(&env.pool, &env.config, "yan").await;
    create_set(&env, &other, "楷书精选").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_sets_are_private_to_their_owner(pool: PgPool) {
    let env = Env::new(pool);
    let (_, token) = create_user(&env.pool, &env.config, "ouyang").await;
    let (_, stranger) = create_user(&env.pool, &env.config, "yan").await;
    let set = create_set(&env, &token, "楷书精选").await;
    let uri = format!("/api/v1/character-sets/{}", set["id"]);

    let response = get_auth(env.app(), &uri, Some(&stranger)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(get_auth(env.app(), "/api/v1/character-sets", Some(&stranger)).await).await;
    assert_eq!(json["data"]["pagination"]["total"], 0);

    let response = get_auth(env.app(), "/api/v1/character-sets", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_owner_renames_and_deletes_set(pool: PgPool) {
    let env = Env::new(pool);
    let (_, token) = create_user(&env.pool, &env.config, "ouyang").await;
    let first = create_set(&env, &token, "楷书精选").await;
    create_set(&env, &token, "行书精选").await;
    let uri = format!("/api/v1/character-sets/{}", first["id"]);

    let response = put_json(env.app(), &uri, json!({"name": "行书精选"}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = put_json(env.app(), &uri, json!({"name": "欧体"}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["name"], "欧体");

    let response = delete(env.app(), &uri, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = get_auth(env.app(), &uri, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: membership
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_members_are_added_listed_and_removed(pool: PgPool) {
    let env = Env::new(pool);
    let (user_id, token) = create_user(&env.pool, &env.config, "ouyang").await;
    let work = seed_work(&env.pool, user_id, &env.root.path().join("works")).await;
    let (yong, he) = (work.characters[0].id, work.characters[1].id);
    let set = create_set(&env, &token, "楷书精选").await;
    let members_uri = format!("/api/v1/character-sets/{}/characters", set["id"]);

    for id in [yong, he] {
        let response =
            post_json(env.app(), &members_uri, json!({"character_id": id}), Some(&token)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    let response =
        post_json(env.app(), &members_uri, json!({"character_id": yong}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response =
        post_json(env.app(), &members_uri, json!({"character_id": 999999}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(get_auth(env.app(), &members_uri, Some(&token)).await).await;
    assert_eq!(json["data"]["pagination"]["total"], 2);
    assert_eq!(json["data"]["items"][0]["character"]["recognition"], "和");

    let set_json = body_json(
        get_auth(env.app(), &format!("/api/v1/character-sets/{}", set["id"]), Some(&token)).await,
    )
    .await;
    assert_eq!(set_json["data"]["character_count"], 2);

    let response = delete(env.app(), &format!("{members_uri}/{yong}"), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = delete(env.app(), &format!("{members_uri}/{yong}"), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_move_transfers_membership_between_own_sets(pool: PgPool) {
    let env = Env::new(pool);
    let (user_id, token) = create_user(&env.pool, &env.config, "ouyang").await;
    let (_, stranger) = create_user(&env.pool, &env.config, "yan").await;
    let work = seed_work(&env.pool, user_id, &env.root.path().join("works")).await;
    let yong = work.characters[0].id;
    let source = create_set(&env, &token, "楷书精选").await;
    let target = create_set(&env, &token, "待临").await;
    let foreign = create_set(&env, &stranger, "他人").await;
    let source_members = format!("/api/v1/character-sets/{}/characters", source["id"]);
    let move_uri = format!("{source_members}/move");

    post_json(env.app(), &source_members, json!({"character_id": yong}), Some(&token)).await;

    let response = post_json(
        env.app(),
        &move_uri,
        json!({"character_id": yong, "target_set_id": foreign["id"]}),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_json(
        env.app(),
        &move_uri,
        json!({"character_id": yong, "target_set_id": source["id"]}),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        env.app(),
        &move_uri,
        json!({"character_id": yong, "target_set_id": target["id"]}),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["character_set_id"], target["id"]);

    let json = body_json(get_auth(env.app(), &source_members, Some(&token)).await).await;
    assert_eq!(json["data"]["pagination"]["total"], 0);

    // Moving again finds nothing in the source set.
    let response = post_json(
        env.app(),
        &move_uri,
        json!({"character_id": yong, "target_set_id": target["id"]}),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
