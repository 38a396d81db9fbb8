//! Integration tests for POST /detect.
//!
//! These tests require a running PostgreSQL instance; set TEST_DATABASE_URL
//! and remove the ignore attribute filter with `cargo test -- --ignored`.

mod common;

use common::{post_detection, spawn_app};
use uuid::Uuid;

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn detect_persists_top_three_ranked_scores() {
    let app = spawn_app().await;
    let user_id = Uuid::new_v4();
    let token = app.token(user_id);

    let response = post_detection(&app, &token).await;
    assert_eq!(response.status(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Success");

    let data = &body["data"];
    assert_eq!(data["user_id"], user_id.to_string());
    assert!(data["id"].is_i64());
    assert!(data["image_url"]
        .as_str()
        .unwrap()
        .starts_with(&app.public_base_url));

    // Stub predicts {Acne: 0.92, Eczema: 0.91999, Psoriasis: 0.5, Rosacea: 0.1};
    // the lowest is dropped and percentages floor before re-expressing as fractions.
    let diseases = data["diseases"].as_array().unwrap();
    assert_eq!(diseases.len(), 3);
    assert_eq!(diseases[0]["disease"], "Acne");
    assert_eq!(diseases[0]["percentage"], 0.92);
    assert_eq!(diseases[1]["disease"], "Eczema");
    assert_eq!(diseases[1]["percentage"], 0.91);
    assert_eq!(diseases[2]["disease"], "Psoriasis");
    assert_eq!(diseases[2]["percentage"], 0.5);

    // List entries never carry symptoms; the detect response doesn't either.
    assert!(diseases[0].get("symptoms").is_none());
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn detect_stores_image_under_local_storage() {
    let app = spawn_app().await;
    let token = app.token(Uuid::new_v4());

    let response = post_detection(&app, &token).await;
    assert_eq!(response.status(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    let image_url = body["data"]["image_url"].as_str().unwrap();
    let key = image_url
        .strip_prefix(&format!("{}/", app.public_base_url))
        .unwrap();

    assert!(app.storage_dir.path().join(key).exists());
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn detect_without_token_is_unauthorized() {
    let app = spawn_app().await;

    let form = reqwest::multipart::Form::new().text("detectImage", "not-a-file");
    let response = app
        .client
        .post(app.url("/detect"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn detect_without_image_field_is_bad_request() {
    let app = spawn_app().await;
    let token = app.token(Uuid::new_v4());

    let part = reqwest::multipart::Part::bytes(vec![1, 2, 3])
        .file_name("lesion.jpg")
        .mime_str("image/jpeg")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("wrongField", part);

    let response = app
        .client
        .post(app.url("/detect"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn detect_with_empty_image_is_bad_request() {
    let app = spawn_app().await;
    let token = app.token(Uuid::new_v4());

    let part = reqwest::multipart::Part::bytes(Vec::new())
        .file_name("empty.jpg")
        .mime_str("image/jpeg")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("detectImage", part);

    let response = app
        .client
        .post(app.url("/detect"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}
