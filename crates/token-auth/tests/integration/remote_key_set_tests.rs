//! Integration tests for the remote key set strategy
//!
//! Runs the full service against a wiremock JWKS endpoint: initial fetch,
//! caching, kid rotation, forced refresh and endpoint failures.

use auth_test_utils::{
    ec_public_jwk, jwks_document, rsa_public_jwk, Ed25519TestKey, TestTokenBuilder, EC_PKCS8_PEM,
    EC_SEC1_PEM, OTHER_RSA_PKCS8_PEM, RSA_PKCS8_PEM,
};
use token_auth::{AuthConfig, AuthError, AuthService};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JWKS_PATH: &str = "/.well-known/jwks.json";

fn jwks_config(server: &MockServer) -> AuthConfig {
    AuthConfig {
        jwks_url: Some(format!("{}{}", server.uri(), JWKS_PATH)),
        ..AuthConfig::default()
    }
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_rsa_token_validated_against_jwks() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(&[rsa_public_jwk(RSA_PKCS8_PEM, "key-01")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = AuthService::from_config(&jwks_config(&server))?;
    assert_eq!(service.configured_providers(), vec!["JWKs"]);

    let token = TestTokenBuilder::new()
        .for_subject("user-1")
        .with_kid("key-01")
        .sign_rs256(RSA_PKCS8_PEM);

    // Second validation is served from the cached snapshot
    for _ in 0..2 {
        let result = service.validate_token(&token).await;
        assert!(result.is_valid(), "got {result:?}");
        assert_eq!(result.subject(), "user-1");
        assert_eq!(result.strategy_name(), Some("JWKs"));
    }

    Ok(())
}

#[tokio::test]
async fn test_mixed_key_types_in_one_document() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    let ed = Ed25519TestKey::new(11, "ed-01")?;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[
            rsa_public_jwk(RSA_PKCS8_PEM, "rsa-01"),
            ec_public_jwk(EC_SEC1_PEM, "ec-01"),
            ed.jwk(),
        ])))
        .mount(&server)
        .await;

    let service = AuthService::from_config(&jwks_config(&server))?;

    let tokens = [
        TestTokenBuilder::new().with_kid("rsa-01").sign_rs256(RSA_PKCS8_PEM),
        TestTokenBuilder::new().with_kid("ec-01").sign_es256(EC_PKCS8_PEM),
        TestTokenBuilder::new().sign_eddsa(&ed),
    ];
    for token in &tokens {
        let result = service.validate_token(token).await;
        assert!(result.is_valid(), "got {result:?}");
    }

    Ok(())
}

#[tokio::test]
async fn test_token_without_kid_tries_matching_keys() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[
            rsa_public_jwk(OTHER_RSA_PKCS8_PEM, "other"),
            rsa_public_jwk(RSA_PKCS8_PEM, "key-01"),
        ])))
        .mount(&server)
        .await;

    let service = AuthService::from_config(&jwks_config(&server))?;
    let token = TestTokenBuilder::new().for_subject("no-kid").sign_rs256(RSA_PKCS8_PEM);

    let result = service.validate_token(&token).await;
    assert!(result.is_valid(), "got {result:?}");
    assert_eq!(result.subject(), "no-kid");

    Ok(())
}

// ============================================================================
// Rotation and refresh
// ============================================================================

#[tokio::test]
async fn test_unknown_kid_triggers_refresh() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;

    // First fetch only knows the old key; later fetches publish both
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(&[rsa_public_jwk(RSA_PKCS8_PEM, "key-01")])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[
            rsa_public_jwk(RSA_PKCS8_PEM, "key-01"),
            rsa_public_jwk(OTHER_RSA_PKCS8_PEM, "key-02"),
        ])))
        .mount(&server)
        .await;

    let config = AuthConfig {
        jwks_refresh_padding_seconds: 0,
        ..jwks_config(&server)
    };
    let service = AuthService::from_config(&config)?;

    let old = TestTokenBuilder::new().with_kid("key-01").sign_rs256(RSA_PKCS8_PEM);
    assert!(service.validate_token(&old).await.is_valid());

    let rotated = TestTokenBuilder::new()
        .for_subject("rotated")
        .with_kid("key-02")
        .sign_rs256(OTHER_RSA_PKCS8_PEM);
    let result = service.validate_token(&rotated).await;
    assert!(result.is_valid(), "got {result:?}");
    assert_eq!(result.subject(), "rotated");

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_kid_missing_after_refresh_is_key_not_found() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(&[rsa_public_jwk(RSA_PKCS8_PEM, "key-01")])),
        )
        .mount(&server)
        .await;

    let config = AuthConfig {
        jwks_refresh_padding_seconds: 0,
        ..jwks_config(&server)
    };
    let service = AuthService::from_config(&config)?;
    let token = TestTokenBuilder::new().with_kid("nope").sign_rs256(RSA_PKCS8_PEM);

    let result = service.validate_token(&token).await;
    assert_eq!(result.failure(), Some(&AuthError::KeyNotFound));

    Ok(())
}

#[tokio::test]
async fn test_forced_refresh_fetches_again() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(&[rsa_public_jwk(RSA_PKCS8_PEM, "key-01")])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let service = AuthService::from_config(&jwks_config(&server))?;
    service.refresh_key_set().await?;
    service.refresh_key_set().await?;

    let cache = service.key_set_cache().ok_or_else(|| anyhow::anyhow!("no cache"))?;
    let snapshot = cache.current().await.ok_or_else(|| anyhow::anyhow!("no snapshot"))?;
    assert_eq!(snapshot.generation(), 2);
    assert_eq!(snapshot.kids(), vec!["key-01"]);

    Ok(())
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_endpoint_error_is_jwks_client_error() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = AuthService::from_config(&jwks_config(&server))?;
    let token = TestTokenBuilder::new().with_kid("key-01").sign_rs256(RSA_PKCS8_PEM);

    let result = service.validate_token(&token).await;
    assert!(!result.is_valid());
    let failure = result.failure().ok_or_else(|| anyhow::anyhow!("no failure"))?;
    assert!(matches!(failure, AuthError::JwksClientError(_)), "got {failure:?}");
    assert_eq!(failure.status_code(), 503);

    assert!(service.refresh_key_set().await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_invalid_document_is_jwks_client_error() -> Result<(), anyhow::Error> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let service = AuthService::from_config(&jwks_config(&server))?;
    let token = TestTokenBuilder::new().with_kid("key-01").sign_rs256(RSA_PKCS8_PEM);

    let result = service.validate_token(&token).await;
    assert!(matches!(result.failure(), Some(AuthError::JwksClientError(_))));

    Ok(())
}

#[test]
fn test_invalid_endpoint_fails_construction() {
    let config = AuthConfig {
        jwks_url: Some("ftp://idp.example.com/jwks".to_string()),
        ..AuthConfig::default()
    };

    let err = AuthService::from_config(&config).unwrap_err();
    assert!(matches!(err, AuthError::InvalidJwksEndpoint(_)), "got {err:?}");
}
