//! Exercise progress and water intake endpoints.

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use serde_json::{json, Value};

#[macro_use]
mod common;
use common::{bearer, seed_user, test_context};

#[actix_web::test]
async fn progress_is_upserted_per_exercise() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let (_, tokens) = seed_user(&ctx, "alice").await;

    for sets in [1, 3] {
        let req = bearer(TestRequest::post().uri("/progress/"), &tokens.access_token)
            .set_json(json!({ "day_index": 0, "exercise_id": "squat", "sets_completed": sets }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }
    let req = bearer(TestRequest::post().uri("/progress/"), &tokens.access_token)
        .set_json(json!({ "day_index": 1, "exercise_id": "bench", "sets_completed": 2 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = bearer(TestRequest::get().uri("/progress/0"), &tokens.access_token).to_request();
    let day: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(day.len(), 1);
    assert_eq!(day[0]["sets_completed"], 3);

    let req = bearer(TestRequest::get().uri("/progress/"), &tokens.access_token).to_request();
    let all: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(all.len(), 2);

    let req = bearer(TestRequest::delete().uri("/progress/"), &tokens.access_token).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = bearer(TestRequest::get().uri("/progress/"), &tokens.access_token).to_request();
    let all: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert!(all.is_empty());
}

#[actix_web::test]
async fn negative_progress_is_rejected() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let (_, tokens) = seed_user(&ctx, "alice").await;

    let req = bearer(TestRequest::post().uri("/progress/"), &tokens.access_token)
        .set_json(json!({ "day_index": -1, "exercise_id": "squat", "sets_completed": 1 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn progress_is_private_to_each_user() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let (_, alice) = seed_user(&ctx, "alice").await;
    let (_, bob) = seed_user(&ctx, "bob").await;

    let req = bearer(TestRequest::post().uri("/progress/"), &alice.access_token)
        .set_json(json!({ "day_index": 0, "exercise_id": "squat", "sets_completed": 1 }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = bearer(TestRequest::get().uri("/progress/"), &bob.access_token).to_request();
    let entries: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert!(entries.is_empty());
}

#[actix_web::test]
async fn water_total_never_goes_negative() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let (_, tokens) = seed_user(&ctx, "alice").await;

    let req = bearer(TestRequest::post().uri("/water/records"), &tokens.access_token)
        .set_json(json!({ "amount": 300.0, "timestamp": "2025-03-01T08:00:00Z" }))
        .to_request();
    let big: Value = test::call_and_read_body_json(&app, req).await;

    // Overwrites the total to 100 and logs a 100 record alongside.
    let req = bearer(TestRequest::post().uri("/water/add"), &tokens.access_token)
        .set_json(json!({ "amount": 100.0 }))
        .to_request();
    let total: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(total["amount"], 100.0);
    let date = total["date"].as_str().unwrap().to_string();

    let uri = format!("/water/records/{}", big["id"]);
    let req = bearer(TestRequest::delete().uri(&uri), &tokens.access_token).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = bearer(TestRequest::get().uri(&format!("/water/daily/{}", date)), &tokens.access_token)
        .to_request();
    let daily: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(daily["total_amount"], 0.0);
    assert_eq!(daily["records"].as_array().unwrap().len(), 1);

    let req = bearer(TestRequest::delete().uri(&uri), &tokens.access_token).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn water_history_and_clearing() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let (_, tokens) = seed_user(&ctx, "alice").await;

    let req = bearer(TestRequest::post().uri("/water/add"), &tokens.access_token)
        .set_json(json!({
            "amount": 750.0,
            "records": [
                { "amount": 250.0, "timestamp": "2025-03-01T08:00:00Z" },
                { "amount": 500.0, "timestamp": "2025-03-01T12:00:00Z" }
            ]
        }))
        .to_request();
    let total: Value = test::call_and_read_body_json(&app, req).await;
    let date = total["date"].as_str().unwrap().to_string();

    let req = bearer(TestRequest::get().uri("/water/history"), &tokens.access_token).to_request();
    let history: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["amount"], 750.0);

    for uri in ["/water/history?limit=0", "/water/history?limit=5000"] {
        let req = bearer(TestRequest::get().uri(uri), &tokens.access_token).to_request();
        let history: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(history.len(), 1, "{} is clamped", uri);
    }

    let uri = format!("/water/daily/{}", date);
    let req = bearer(TestRequest::delete().uri(&uri), &tokens.access_token).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = bearer(TestRequest::get().uri(&uri), &tokens.access_token).to_request();
    let daily: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(daily["total_amount"], 0.0);
    assert!(daily["records"].as_array().unwrap().is_empty());

    let req = bearer(TestRequest::delete().uri("/water/all"), &tokens.access_token).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = bearer(TestRequest::get().uri("/water/history"), &tokens.access_token).to_request();
    let history: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert!(history.is_empty());
}

#[actix_web::test]
async fn bad_water_date_is_rejected() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let (_, tokens) = seed_user(&ctx, "alice").await;

    let req = bearer(TestRequest::get().uri("/water/daily/yesterday"), &tokens.access_token)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn water_timestamps_without_timezone_are_utc() {
    let ctx = test_context();
    let app = init_app!(ctx);
    let (_, tokens) = seed_user(&ctx, "alice").await;

    let req = bearer(TestRequest::post().uri("/water/records"), &tokens.access_token)
        .set_json(json!({ "amount": 250.0, "timestamp": "2025-03-01T10:15:00.123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let record: Value = test::read_body_json(resp).await;
    let stored = record["timestamp"].as_str().unwrap();
    assert!(stored.starts_with("2025-03-01T10:15:00.123"), "{}", stored);

    let req = bearer(TestRequest::post().uri("/water/add"), &tokens.access_token)
        .set_json(json!({
            "amount": 500.0,
            "records": [{ "amount": 500.0, "timestamp": "2025-03-01T12:00:00" }]
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}
