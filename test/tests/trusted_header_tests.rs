//! Trusted reverse-proxy header tests. With this strategy configured the
//! middleware fails closed: a request without the proxy header is refused.


use actix_web::http::StatusCode;
use actix_web::test;

use common::TestEnv;
use gatehouse_core::http::auth::{TrustedHeaderConfig, TrustedHeaderVerifier};
use gatehouse_core::http::session::AccessPath;

fn verifier(env: &TestEnv) -> TrustedHeaderVerifier {
    TrustedHeaderVerifier::new(
        TrustedHeaderConfig::new().header("X-Forwarded-User"),
        env.accounts.clone(),
    )
}

#[actix_web::test]
async fn test_asserted_user_is_authenticated() {
    let env = TestEnv::new();
    let app = common::init(env.auth().verifier(verifier(&env)), env.accounts.clone()).await;

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("X-Forwarded-User", "dev"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"2");
}

#[actix_web::test]
async fn test_missing_header_is_403() {
    let env = TestEnv::new();
    let app = common::init(env.auth().verifier(verifier(&env)), env.accounts.clone()).await;

    let req = test::TestRequest::get().uri("/a/changes/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_unknown_asserted_user_is_401() {
    let env = TestEnv::new();
    let app = common::init(env.auth().verifier(verifier(&env)), env.accounts.clone()).await;

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("X-Forwarded-User", "ghost"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_inactive_asserted_user_is_401() {
    let env = TestEnv::new();
    let app = common::init(env.auth().verifier(verifier(&env)), env.accounts.clone()).await;

    let req = test::TestRequest::get()
        .uri("/whoami")
        .insert_header(("X-Forwarded-User", "bot"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_scoped_strategy_coexists_with_cookie_login() {
    let env = TestEnv::new();
    // The proxy only fronts the REST surface; login and everything else
    // stay open to cookie sessions.
    let scoped = TrustedHeaderVerifier::new(
        TrustedHeaderConfig::new().header("X-Forwarded-User"),
        env.accounts.clone(),
    )
    .paths(&[AccessPath::RestApi]);
    let app = common::init(env.auth().verifier(scoped), env.accounts.clone()).await;

    // Interactive login without the proxy header succeeds.
    let resp = test::call_service(&app, common::login_request("admin", "admin", false)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = common::session_cookie(&resp).expect("session cookie set");

    // The fronted surface still fails closed for header-less anonymous
    // requests, and accepts the established session.
    let req = test::TestRequest::get().uri("/a/changes/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/a/changes/")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"1");
}

#[actix_web::test]
async fn test_existing_session_satisfies_the_strategy() {
    let env = TestEnv::new();
    let app = common::init(env.auth().verifier(verifier(&env)), env.accounts.clone()).await;

    // Login requires the proxy header too (the strategy runs on every
    // request), then the established cookie is enough by itself.
    let req = test::TestRequest::post()
        .uri("/login")
        .insert_header(("X-Forwarded-User", "admin"))
        .set_form(common::LoginForm {
            username: "admin".to_string(),
            password: "admin".to_string(),
            remember: false,
        })
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = common::session_cookie(&resp).expect("session cookie set");

    let req = test::TestRequest::get()
        .uri("/whoami")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
