//! Impersonation tests: a privileged caller acting as another account for
//! a single request, without disturbing the caller's own session.


use actix_web::http::StatusCode;
use actix_web::test;

use common::{basic_auth, TestEnv};
use gatehouse_core::http::auth::AuthEventType;

#[actix_web::test]
async fn test_admin_can_run_as_other_account() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth()
            .verifier(env.basic_verifier())
            .verifier(env.run_as_verifier(true)),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", basic_auth("admin", "admin")))
        .insert_header(("X-Run-As", "dev"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"2");

    assert_eq!(env.sink.count(AuthEventType::ImpersonationUsed), 1);
}

#[actix_web::test]
async fn test_run_as_does_not_touch_the_session_record() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth().verifier(env.run_as_verifier(true)),
        env.accounts.clone(),
    )
    .await;

    let resp = test::call_service(&app, common::login_request("admin", "admin", false)).await;
    let cookie = common::session_cookie(&resp).expect("session cookie set");

    let req = test::TestRequest::get()
        .uri("/whoami")
        .cookie(cookie.clone())
        .insert_header(("X-Run-As", "dev"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"2");

    // Next request with the same cookie is admin again.
    let req = test::TestRequest::get()
        .uri("/whoami")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"1");
}

#[actix_web::test]
async fn test_disabled_feature_is_403() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth()
            .verifier(env.basic_verifier())
            .verifier(env.run_as_verifier(false)),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", basic_auth("admin", "admin")))
        .insert_header(("X-Run-As", "dev"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_anonymous_caller_is_403() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth().verifier(env.run_as_verifier(true)),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("X-Run-As", "dev"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_caller_without_capability_is_403() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth()
            .verifier(env.basic_verifier())
            .verifier(env.run_as_verifier(true)),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", basic_auth("dev", "dev")))
        .insert_header(("X-Run-As", "admin"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(env.sink.count(AuthEventType::ImpersonationDenied), 1);
}

#[actix_web::test]
async fn test_ambiguous_target_is_403() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth()
            .verifier(env.basic_verifier())
            .verifier(env.run_as_verifier(true)),
        env.accounts.clone(),
    )
    .await;

    // Two accounts share this email.
    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", basic_auth("admin", "admin")))
        .insert_header(("X-Run-As", "shared@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_unknown_target_is_403() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth()
            .verifier(env.basic_verifier())
            .verifier(env.run_as_verifier(true)),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", basic_auth("admin", "admin")))
        .insert_header(("X-Run-As", "ghost"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_target_by_numeric_id() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth()
            .verifier(env.basic_verifier())
            .verifier(env.run_as_verifier(true)),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("Authorization", basic_auth("admin", "admin")))
        .insert_header(("X-Run-As", "3"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"3");
}
