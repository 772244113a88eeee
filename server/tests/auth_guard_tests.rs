#[macro_use]
mod common;

use actix_web::{http::StatusCode, test};
use serde_json::json;
use tracker_server::db::InMemoryStorage;

#[actix_web::test]
async fn test_project_routes_are_open_by_default() {
    let app = init_app!(InMemoryStorage::new());

    let req = test::TestRequest::get().uri("/get").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_guard_requires_a_valid_bearer_token() {
    let app = init_app!(InMemoryStorage::new(), true);

    let req = test::TestRequest::get().uri("/get").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/get")
        .insert_header(("Authorization", "Bearer not.a.token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let token = common::credentials().issue_token("65f0c0ffee0000000000beef").unwrap();
    let req = test::TestRequest::get()
        .uri("/get")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_guard_rejects_expired_tokens() {
    let app = init_app!(InMemoryStorage::new(), true);

    let token = common::credentials()
        .issue_token_at("65f0c0ffee0000000000beef", 1_000)
        .unwrap();
    let req = test::TestRequest::post()
        .uri("/add")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "projectname": "Atlas" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_login_flow_unlocks_guarded_routes() {
    let storage = InMemoryStorage::new();
    let app = init_app!(storage.clone(), true);

    let credentials = json!({ "email": "ada@example.com", "pwd": "analytical" });
    let req = test::TestRequest::post()
        .uri("/signup")
        .set_json(&credentials)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/login")
        .set_json(&credentials)
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let token = body["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/add")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "projectname": "Atlas" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(storage.project_count(), 1);
}

#[actix_web::test]
async fn test_guard_leaves_unknown_routes_not_found() {
    let app = init_app!(InMemoryStorage::new(), true);

    for req in [
        test::TestRequest::get().uri("/nope"),
        test::TestRequest::get().uri("/signup"),
        test::TestRequest::post().uri("/get"),
    ] {
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    let req = test::TestRequest::post()
        .uri("/signup")
        .set_json(json!({ "email": "ada@example.com", "pwd": "analytical" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}
