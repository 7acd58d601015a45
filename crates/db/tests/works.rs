//! Integration tests for works and their characters.
//!
//! Exercises the repository layer against a real database:
//! - Work + characters commit together, or not at all
//! - Character boxes are held inside the work bounds
//! - Listing filters and view counting

use assert_matches::assert_matches;
use inkstone_core::pagination::PageRequest;
use inkstone_db::models::character::{CreateCharacter, UpdateCharacter};
use inkstone_db::models::user::CreateUser;
use inkstone_db::models::work::{CreateWork, UpdateWork, WorkListFilter};
use inkstone_db::repositories::{CharacterRepo, UserRepo, WorkRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_user(pool: &PgPool, name: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            username: name.to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

fn new_work(author_id: i64, title: &str) -> CreateWork {
    CreateWork {
        author_id,
        title: title.to_string(),
        description: String::new(),
        image_path: format!("uploads/{title}.png"),
        style: "楷书".to_string(),
        dynasty: "唐".to_string(),
        author_name: "颜真卿".to_string(),
        source_type: "碑帖".to_string(),
        tags: vec!["楷书".to_string(), "唐".to_string()],
        width: 800,
        height: 600,
        ocr_artifact_path: None,
    }
}

fn new_character(text: &str, x: i32, y: i32, width: i32, height: i32, order: i32) -> CreateCharacter {
    CreateCharacter {
        style: "楷书".to_string(),
        strokes: None,
        stroke_order: None,
        recognition: text.to_string(),
        source: None,
        x,
        y,
        width,
        height,
        sort_order: order,
        keypoints: None,
    }
}

async fn work_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM works")
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_check(pool: PgPool) {
    inkstone_db::health_check(&pool).await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_work_with_characters(pool: PgPool) {
    let author = new_user(&pool, "yan").await;
    let chars = vec![
        new_character("永", 10, 10, 40, 50, 0),
        new_character("和", 60, 10, 40, 50, 1),
    ];

    let (work, created) = WorkRepo::create_with_characters(&pool, &new_work(author, "多宝塔碑"), &chars)
        .await
        .unwrap();

    assert_eq!(work.status, "pending");
    assert_eq!(work.tags, vec!["楷书", "唐"]);
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|c| c.work_id == work.id && c.source == "ocr"));
    assert_eq!(created[0].keypoints, serde_json::json!([]));

    let listed = CharacterRepo::list_by_work(&pool, work.id).await.unwrap();
    let texts: Vec<&str> = listed.iter().map(|c| c.recognition.as_str()).collect();
    assert_eq!(texts, vec!["永", "和"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_out_of_bounds_character_rolls_back_work(pool: PgPool) {
    let author = new_user(&pool, "yan").await;
    let chars = vec![
        new_character("永", 10, 10, 40, 50, 0),
        // Right edge at 810 on an 800px wide work.
        new_character("和", 770, 10, 40, 50, 1),
    ];

    let result = WorkRepo::create_with_characters(&pool, &new_work(author, "多宝塔碑"), &chars).await;

    assert_matches!(result, Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23514"));
    assert_eq!(work_count(&pool).await, 0);
    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM characters")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orphans, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_character_update_cannot_leave_bounds(pool: PgPool) {
    let author = new_user(&pool, "yan").await;
    let (work, created) = WorkRepo::create_with_characters(
        &pool,
        &new_work(author, "祭侄文稿"),
        &[new_character("永", 0, 0, 100, 100, 0)],
    )
    .await
    .unwrap();

    let grow = UpdateCharacter {
        height: Some(601),
        ..Default::default()
    };
    assert!(CharacterRepo::update(&pool, created[0].id, &grow).await.is_err());

    let fine = UpdateCharacter {
        height: Some(600),
        recognition: Some("和".to_string()),
        ..Default::default()
    };
    let updated = CharacterRepo::update(&pool, created[0].id, &fine)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.height, 600);
    assert_eq!(updated.recognition, "和");
    assert_eq!(updated.work_id, work.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_find_with_work_joins_author(pool: PgPool) {
    let author = new_user(&pool, "yan").await;
    let (work, created) = WorkRepo::create_with_characters(
        &pool,
        &new_work(author, "勤礼碑"),
        &[new_character("永", 5, 5, 20, 20, 0)],
    )
    .await
    .unwrap();

    let found = CharacterRepo::find_with_work(&pool, created[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.work_author_id, author);
    assert_eq!(found.work_author_username, "yan");
    assert_eq!(found.work_image_path, work.image_path);
    assert_eq!((found.work_width, found.work_height), (800, 600));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_annotation_set_and_clear(pool: PgPool) {
    let author = new_user(&pool, "yan").await;
    let (_, created) = WorkRepo::create_with_characters(
        &pool,
        &new_work(author, "勤礼碑"),
        &[new_character("永", 5, 5, 20, 20, 0)],
    )
    .await
    .unwrap();
    let id = created[0].id;

    let keypoints = serde_json::json!([{"id": 1, "x": 0.5, "y": 0.5, "description": "点", "tips": "轻"}]);
    let extra = serde_json::json!({"overall_tips": "稳"});
    let updated = CharacterRepo::set_annotation(&pool, id, &keypoints, &extra)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.keypoints, keypoints);

    let annotated = CharacterRepo::list_annotated(&pool).await.unwrap();
    assert_eq!(annotated.len(), 1);
    assert_eq!(annotated[0].username, "yan");

    assert!(CharacterRepo::clear_annotation(&pool, id).await.unwrap());
    assert!(CharacterRepo::list_annotated(&pool).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_filters_and_views(pool: PgPool) {
    let author = new_user(&pool, "yan").await;
    let (first, _) = WorkRepo::create_with_characters(&pool, &new_work(author, "多宝塔碑"), &[])
        .await
        .unwrap();
    WorkRepo::create_with_characters(&pool, &new_work(author, "颜勤礼碑"), &[])
        .await
        .unwrap();

    let approve = UpdateWork {
        status: Some("approved".to_string()),
        ..Default::default()
    };
    let approved_row = WorkRepo::update(&pool, first.id, &approve).await.unwrap().unwrap();

    let page = PageRequest::normalize(None, None, 12, 100);
    let approved = WorkListFilter {
        status: Some("approved".to_string()),
        ..Default::default()
    };
    let (works, total) = WorkRepo::list(&pool, &approved, page).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(works[0].id, first.id);

    let search = WorkListFilter {
        search: Some("勤礼".to_string()),
        ..Default::default()
    };
    let (works, total) = WorkRepo::list(&pool, &search, page).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(works[0].title, "颜勤礼碑");

    let viewed = WorkRepo::record_view(&pool, first.id).await.unwrap().unwrap();
    assert_eq!(viewed.views, 1);
    assert_eq!(viewed.updated_at, approved_row.updated_at);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_referenced_artifact_paths(pool: PgPool) {
    let author = new_user(&pool, "yan").await;
    let mut input = new_work(author, "多宝塔碑");
    input.ocr_artifact_path = Some("uploads/ocr_artifacts/ocr_20240301_080000_abcd1234.json".into());
    WorkRepo::create_with_characters(&pool, &input, &[]).await.unwrap();
    WorkRepo::create_with_characters(&pool, &new_work(author, "勤礼碑"), &[])
        .await
        .unwrap();

    let paths = WorkRepo::referenced_artifact_paths(&pool).await.unwrap();
    assert_eq!(paths, vec!["uploads/ocr_artifacts/ocr_20240301_080000_abcd1234.json"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_work_cascades_characters(pool: PgPool) {
    let author = new_user(&pool, "yan").await;
    let (work, created) = WorkRepo::create_with_characters(
        &pool,
        &new_work(author, "多宝塔碑"),
        &[new_character("永", 0, 0, 10, 10, 0)],
    )
    .await
    .unwrap();

    assert!(WorkRepo::delete(&pool, work.id).await.unwrap());
    assert!(CharacterRepo::find_by_id(&pool, created[0].id).await.unwrap().is_none());
    assert!(!WorkRepo::delete(&pool, work.id).await.unwrap());
}
