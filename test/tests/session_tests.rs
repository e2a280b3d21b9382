//! Cookie session lifecycle tests: login, logout, re-login, expiry of
//! trust in the account, and cookie attributes.


use actix_web::http::StatusCode;
use actix_web::test;

use common::{login_request, response_cookie, session_cookie, TestEnv};
use gatehouse_core::http::auth::AccountId;
use gatehouse_core::http::session::SessionKey;

#[actix_web::test]
async fn test_login_sets_cookie_and_binds_identity() {
    let env = TestEnv::new();
    let app = common::init(env.auth(), env.accounts.clone()).await;

    let resp = test::call_service(&app, login_request("admin", "admin", false)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = session_cookie(&resp).expect("session cookie set");
    assert!(!cookie.value().is_empty());
    // Non-persistent login: browser-session cookie without Max-Age.
    assert_eq!(cookie.max_age(), None);
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(env.store.cached_sessions(), 1);

    let req = test::TestRequest::get()
        .uri("/whoami")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"1");
}

#[actix_web::test]
async fn test_remember_me_sets_persistent_cookie() {
    let env = TestEnv::new();
    let app = common::init(env.auth(), env.accounts.clone()).await;

    let resp = test::call_service(&app, login_request("admin", "admin", true)).await;
    let cookie = session_cookie(&resp).expect("session cookie set");
    // Max-Age mirrors the configured 12 hour session age.
    assert_eq!(
        cookie.max_age(),
        Some(actix_web::cookie::time::Duration::seconds(12 * 60 * 60))
    );
}

#[actix_web::test]
async fn test_wrong_password_refuses_login() {
    let env = TestEnv::new();
    let app = common::init(env.auth(), env.accounts.clone()).await;

    let resp = test::call_service(&app, login_request("admin", "wrong", false)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&resp).is_none());
    assert_eq!(env.store.cached_sessions(), 0);
}

#[actix_web::test]
async fn test_anonymous_request_gets_no_identity() {
    let env = TestEnv::new();
    let app = common::init(env.auth(), env.accounts.clone()).await;

    let req = test::TestRequest::get().uri("/whoami").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_unknown_cookie_is_ignored() {
    let env = TestEnv::new();
    let app = common::init(env.auth(), env.accounts.clone()).await;

    let req = test::TestRequest::get()
        .uri("/a/changes/")
        .cookie(actix_web::cookie::Cookie::new("GatehouseAccount", "forged"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    // Not an error, just anonymous.
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"anonymous");
}

#[actix_web::test]
async fn test_logout_destroys_record_and_clears_cookie() {
    let env = TestEnv::new();
    let app = common::init(env.auth(), env.accounts.clone()).await;

    let resp = test::call_service(&app, login_request("admin", "admin", false)).await;
    let cookie = session_cookie(&resp).expect("session cookie set");
    assert_eq!(env.store.cached_sessions(), 1);

    let req = test::TestRequest::post()
        .uri("/logout")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared = session_cookie(&resp).expect("clearing cookie set");
    assert_eq!(cleared.value(), "");
    assert_eq!(env.store.cached_sessions(), 0);

    // The old cookie no longer resolves.
    let req = test::TestRequest::get()
        .uri("/whoami")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_relogin_invalidates_previous_session() {
    let env = TestEnv::new();
    let app = common::init(env.auth(), env.accounts.clone()).await;

    let resp = test::call_service(&app, login_request("admin", "admin", false)).await;
    let first = session_cookie(&resp).expect("first session cookie");

    // Second login carries the first cookie, as a browser would.
    let req = test::TestRequest::post()
        .uri("/login")
        .cookie(first.clone())
        .set_form(common::LoginForm {
            username: "admin".to_string(),
            password: "admin".to_string(),
            remember: false,
        })
        .to_request();
    let resp = test::call_service(&app, req).await;
    let second = session_cookie(&resp).expect("second session cookie");
    assert_ne!(first.value(), second.value());
    assert_eq!(env.store.cached_sessions(), 1);
    assert!(env
        .store
        .get(&SessionKey::from_encoded(first.value()))
        .is_none());
}

#[actix_web::test]
async fn test_deactivated_account_loses_session() {
    let env = TestEnv::new();
    let app = common::init(env.auth(), env.accounts.clone()).await;

    let resp = test::call_service(&app, login_request("admin", "admin", false)).await;
    let cookie = session_cookie(&resp).expect("session cookie set");

    env.accounts.set_active(AccountId::new(1), false);

    let req = test::TestRequest::get()
        .uri("/whoami")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    // The record still exists but no longer grants an identity.
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_access_token_query_parameter() {
    let env = TestEnv::new();
    let app = common::init(env.auth(), env.accounts.clone()).await;

    let resp = test::call_service(&app, login_request("dev", "dev", false)).await;
    let cookie = session_cookie(&resp).expect("session cookie set");

    let req = test::TestRequest::get()
        .uri(&format!("/a/changes/?access_token={}", cookie.value()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"2");
}

#[actix_web::test]
async fn test_csrf_cookie_issued_with_session() {
    let env = TestEnv::new();
    let app = common::init(env.auth(), env.accounts.clone()).await;

    let resp = test::call_service(&app, login_request("admin", "admin", false)).await;
    let xsrf = response_cookie(&resp, "XSRF_TOKEN").expect("csrf cookie set");
    assert!(!xsrf.value().is_empty());
    // Script-readable by design.
    assert_ne!(xsrf.http_only(), Some(true));

    // Anonymous responses clear it.
    let req = test::TestRequest::get().uri("/a/changes/").to_request();
    let resp = test::call_service(&app, req).await;
    let cleared = response_cookie(&resp, "XSRF_TOKEN").expect("csrf cookie cleared");
    assert_eq!(cleared.value(), "");
}
