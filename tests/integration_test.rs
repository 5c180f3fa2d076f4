mod common;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use casting_guard::permission::{DELETE_MOVIES, GET_ACTORS};
use casting_guard::prelude::*;
use common::{bearer, claims, jwks, now, TestKey, AUDIENCE, ISSUER};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JWKS_PATH: &str = "/.well-known/jwks.json";

fn config_for(server: &MockServer) -> ConfigBuilder {
    ConfigBuilder::new()
        .issuer(ISSUER)
        .audience(AUDIENCE)
        .jwks_uri(&format!("{}{JWKS_PATH}", server.uri()))
        .expect("mock server uri must be a valid url")
}

fn validator(config: Config) -> Validator {
    Validator::with_jwks(config).expect("Failed to build validator")
}

fn jwks_response(keys: &[serde_json::Value]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(jwks(keys))
}

#[tokio::test]
async fn test_authorize_end_to_end_with_remote_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]))
        .expect(1)
        .mount(&server)
        .await;

    let guard = AuthorizationGuard::new(validator(config_for(&server).build().unwrap()));
    let token = TestKey::Primary.sign("key-1", &claims(&[GET_ACTORS]));

    let permissions = guard
        .authorize(GET_ACTORS, &bearer(&token), |claims| async move {
            claims.permissions().clone()
        })
        .await
        .expect("Request should be authorized");
    assert_eq!(permissions.into_iter().collect::<Vec<_>>(), vec![GET_ACTORS.to_string()]);

    // A second request is served from the cached key set.
    let err = guard.check(DELETE_MOVIES, &bearer(&token)).await.unwrap_err();
    assert_eq!(err, AuthError::InsufficientScope(DELETE_MOVIES.to_string()));
    assert_eq!(err.status(), http::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_concurrent_cold_lookups_share_one_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let validator = validator(config_for(&server).build().unwrap());
    let token = TestKey::Primary.sign("key-1", &claims(&[]));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let validator = validator.clone();
            let token = token.clone();
            tokio::spawn(async move { validator.verify(&token).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
}

#[tokio::test]
async fn test_warm_lookups_do_not_wait_for_a_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]).set_delay(Duration::from_secs(2)))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server)
        .min_refetch_interval(Duration::ZERO)
        .build()
        .unwrap();
    let validator = validator(config);
    let known = TestKey::Primary.sign("key-1", &claims(&[]));
    assert!(validator.verify(&known).await.is_ok());

    // An unknown kid forces a slow refetch.
    let unknown = TestKey::Rotated.sign("key-2", &claims(&[]));
    let refetch = {
        let validator = validator.clone();
        tokio::spawn(async move { validator.verify(&unknown).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    assert!(validator.verify(&known).await.is_ok());
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "warm lookup took {:?}",
        started.elapsed()
    );
    assert!(!refetch.is_finished());

    assert_eq!(
        refetch.await.unwrap().unwrap_err(),
        AuthError::UnknownKey("key-2".to_string())
    );
}

#[tokio::test]
async fn test_cold_lookup_reuses_background_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let client = JwksClient::new(&config_for(&server).build().unwrap().key_set).unwrap();
    let task = client.spawn_background_refresh();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(client.key_set().await.unwrap().len(), 1);
    task.abort();
}

#[tokio::test]
async fn test_slow_endpoint_times_out_then_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]).set_delay(Duration::from_secs(3)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server)
        .fetch_timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let validator = validator(config);
    let token = TestKey::Primary.sign("key-1", &claims(&[]));

    let err = validator.verify(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::KeySetUnavailable(_)), "got {err:?}");
    assert!(err.is_infrastructure());
    assert_eq!(err.status(), http::StatusCode::UNAUTHORIZED);

    // The failure is not cached; the next request fetches again and succeeds.
    assert!(validator.verify(&token).await.is_ok());
    assert!(validator.verify(&token).await.is_ok());
}

#[tokio::test]
async fn test_unusable_key_set_documents_are_unavailable() {
    for response in [
        ResponseTemplate::new(500),
        ResponseTemplate::new(200).set_body_string("{ not json"),
        ResponseTemplate::new(200).set_body_json(json!({"issuer": ISSUER})),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&server)
            .await;

        let validator = validator(config_for(&server).build().unwrap());
        let token = TestKey::Primary.sign("key-1", &claims(&[]));
        assert!(matches!(
            validator.verify(&token).await,
            Err(AuthError::KeySetUnavailable(_))
        ));
    }
}

#[tokio::test]
async fn test_unknown_kid_on_fresh_key_set_does_not_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]))
        .expect(1)
        .mount(&server)
        .await;

    let validator = validator(config_for(&server).build().unwrap());
    let known = TestKey::Primary.sign("key-1", &claims(&[]));
    let unknown = TestKey::Rotated.sign("key-2", &claims(&[]));

    assert!(validator.verify(&known).await.is_ok());
    for _ in 0..3 {
        assert_eq!(
            validator.verify(&unknown).await.unwrap_err(),
            AuthError::UnknownKey("key-2".to_string())
        );
    }
}

#[tokio::test]
async fn test_rotated_key_is_picked_up_by_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[
            TestKey::Primary.jwk("key-1"),
            TestKey::Rotated.jwk("key-2"),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server)
        .min_refetch_interval(Duration::ZERO)
        .build()
        .unwrap();
    let validator = validator(config);

    let old = TestKey::Primary.sign("key-1", &claims(&[]));
    let rotated = TestKey::Rotated.sign("key-2", &claims(&[]));

    assert!(validator.verify(&old).await.is_ok());
    assert!(validator.verify(&rotated).await.is_ok());
    assert!(validator.verify(&old).await.is_ok());
}

#[tokio::test]
async fn test_cache_control_max_age_expires_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]).insert_header("cache-control", "max-age=1"))
        .expect(2)
        .mount(&server)
        .await;

    let validator = validator(config_for(&server).build().unwrap());
    let token = TestKey::Primary.sign("key-1", &claims(&[]));

    assert!(validator.verify(&token).await.is_ok());
    assert!(validator.verify(&token).await.is_ok());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(validator.verify(&token).await.is_ok());
}

#[tokio::test]
async fn test_background_refresh_keeps_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]).insert_header("cache-control", "max-age=1"))
        .expect(2..)
        .mount(&server)
        .await;

    let client = JwksClient::new(&config_for(&server).build().unwrap().key_set).unwrap();
    let task = client.spawn_background_refresh();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    task.abort();

    assert_eq!(client.key_set().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_padded_modulus_and_exponent_are_accepted() {
    let server = MockServer::start().await;
    let key = rsa::RsaPrivateKey::from_pkcs8_pem(include_str!("fixtures/test_rsa_key.pem"))
        .unwrap()
        .to_public_key();
    let jwk = json!({
        "kty": "RSA",
        "kid": "padded",
        "n": URL_SAFE.encode(key.n().to_bytes_be()),
        "e": URL_SAFE.encode(key.e().to_bytes_be()),
    });
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[jwk]))
        .mount(&server)
        .await;

    let validator = validator(config_for(&server).build().unwrap());
    let token = TestKey::Primary.sign("padded", &claims(&[]));
    assert!(validator.verify(&token).await.is_ok());
}

#[tokio::test]
async fn test_expired_token_is_rejected_with_remote_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(&[TestKey::Primary.jwk("key-1")]))
        .mount(&server)
        .await;

    let validator = validator(config_for(&server).build().unwrap());
    let mut expired = claims(&[]);
    expired["exp"] = json!(now() - 10);
    let token = TestKey::Primary.sign("key-1", &expired);

    assert_eq!(validator.verify(&token).await.unwrap_err(), AuthError::TokenExpired);
}

#[tokio::test]
async fn test_static_key_set_needs_no_network() {
    let keys = StaticKeySet::from_jwks_json(&jwks(&[TestKey::Primary.jwk("key-1")]).to_string()).unwrap();
    let config = ConfigBuilder::new()
        .issuer(ISSUER)
        .audience(AUDIENCE)
        .build()
        .unwrap();
    let validator = Validator::new(config, Arc::new(keys));

    let token = TestKey::Primary.sign("key-1", &claims(&[GET_ACTORS]));
    let verified = validator.verify(&token).await.unwrap();
    assert_eq!(verified.subject(), "auth0|casting-assistant");
    assert!(verified.has_permission(GET_ACTORS));
}
