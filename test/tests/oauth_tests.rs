//! OAuth bearer-token tests for the git transport.


use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test;

use common::{basic_auth, TestEnv};
use gatehouse_core::http::auth::{
    AccountId, BackendError, OAuthConfig, OAuthProviderRegistry, OAuthTokenVerifier,
    OAuthVerifier,
};

struct FixedToken {
    token: &'static str,
    id: AccountId,
}

impl OAuthTokenVerifier for FixedToken {
    fn verify(&self, _username: &str, token: &str) -> Result<AccountId, BackendError> {
        if token == self.token {
            Ok(self.id)
        } else {
            Err(BackendError::BadCredentials)
        }
    }
}

fn single_provider() -> OAuthProviderRegistry {
    OAuthProviderRegistry::new().register(
        "oauth-plugin",
        "github",
        Arc::new(FixedToken {
            token: "gh-tok",
            id: AccountId::new(2),
        }),
    )
}

fn two_providers() -> OAuthProviderRegistry {
    single_provider().register(
        "oauth-plugin",
        "gitlab",
        Arc::new(FixedToken {
            token: "gl-tok",
            id: AccountId::new(2),
        }),
    )
}

fn oauth(env: &TestEnv, registry: OAuthProviderRegistry) -> OAuthVerifier {
    OAuthVerifier::new(OAuthConfig::new(), registry, env.accounts.clone())
}

#[actix_web::test]
async fn test_token_in_basic_password_slot() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth().verifier(oauth(&env, single_provider())),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/repo.git/info/refs")
        .insert_header(("Authorization", basic_auth("dev", "gh-tok")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"2");
}

#[actix_web::test]
async fn test_token_in_prefixed_cookie() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth().verifier(oauth(&env, single_provider())),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/repo.git/info/refs")
        .cookie(actix_web::cookie::Cookie::new("git-oauth-dev", "gh-tok"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"2");
}

#[actix_web::test]
async fn test_provider_suffix_selects_provider() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth().verifier(oauth(&env, two_providers())),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/repo.git/info/refs")
        .insert_header((
            "Authorization",
            basic_auth("dev", "gl-tok@oauth-plugin:gitlab"),
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_multiple_providers_require_suffix() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth().verifier(oauth(&env, two_providers())),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/repo.git/info/refs")
        .insert_header(("Authorization", basic_auth("dev", "gh-tok")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_malformed_suffix_is_401() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth().verifier(oauth(&env, single_provider())),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/repo.git/info/refs")
        .insert_header(("Authorization", basic_auth("dev", "gh-tok@nocolon")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_bad_token_is_401() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth().verifier(oauth(&env, single_provider())),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/repo.git/info/refs")
        .insert_header(("Authorization", basic_auth("dev", "stolen")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_no_credentials_stay_anonymous() {
    let env = TestEnv::new();
    let app = common::init(
        env.auth().verifier(oauth(&env, single_provider())),
        env.accounts.clone(),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/repo.git/info/refs")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"anonymous");
}
