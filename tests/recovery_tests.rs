//! Password recovery and email verification codes.

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use serde_json::{json, Value};

#[macro_use]
mod common;
use common::{seed_user, test_context, test_context_with_mailer, RecordingMailer};

const EMAIL: &str = "alice@example.com";

#[actix_web::test]
async fn password_reset_flow() {
    let ctx = test_context();
    let app = init_app!(ctx);
    seed_user(&ctx, "alice").await;

    let req = TestRequest::post()
        .uri("/password/forgot")
        .set_form([("email", EMAIL)])
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["message"], "The code has been sent");
    let code = ctx.mailer.last_code(EMAIL).expect("a code was mailed");

    let req = TestRequest::post()
        .uri("/password/verify")
        .set_form([("email", EMAIL), ("code", "000000")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid code");

    let req = TestRequest::post()
        .uri("/password/verify")
        .set_form([("email", EMAIL), ("code", code.as_str())])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = TestRequest::post()
        .uri("/password/reset")
        .set_form([("email", EMAIL), ("code", code.as_str()), ("new_password", "fresh-pass")])
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["message"], "The password has been changed");

    let req = TestRequest::post()
        .uri("/auth/token")
        .set_form([("username", "alice"), ("password", "fresh-pass")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    // Codes are single use.
    let req = TestRequest::post()
        .uri("/password/reset")
        .set_form([("email", EMAIL), ("code", code.as_str()), ("new_password", "another-pass")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn forgot_password_for_unknown_email() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let req = TestRequest::post()
        .uri("/password/forgot")
        .set_form([("email", "ghost@example.com")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(ctx.mailer.sent.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn email_verification_codes() {
    let ctx = test_context();
    let app = init_app!(ctx);

    let req = TestRequest::post()
        .uri("/verify-email/send")
        .set_json(json!({ "email": EMAIL }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let code = ctx.mailer.last_code(EMAIL).expect("a code was mailed");

    let req = TestRequest::post()
        .uri("/verify-email/verify")
        .set_json(json!({ "email": EMAIL, "code": "999999x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid or expired code");

    let req = TestRequest::post()
        .uri("/verify-email/verify")
        .set_json(json!({ "email": EMAIL, "code": code }))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["message"], "Email verified successfully");

    let req = TestRequest::post()
        .uri("/verify-email/verify")
        .set_json(json!({ "email": EMAIL, "code": code }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn mail_failure_is_reported() {
    let ctx = test_context_with_mailer(RecordingMailer {
        fail: true,
        ..Default::default()
    });
    let app = init_app!(ctx);

    let req = TestRequest::post()
        .uri("/verify-email/send")
        .set_json(json!({ "email": EMAIL }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Failed to send verification email");
}
