//! Integration tests for strategy arbitration
//!
//! All three strategies are configured at once; each test checks which one
//! ends up accepting (or why none did).

use auth_test_utils::{
    jwks_document, rsa_public_jwk, write_key_file, TestTokenBuilder, OTHER_RSA_PKCS8_PEM,
    RSA_PKCS8_PEM,
};
use common::secret::SecretString;
use tempfile::NamedTempFile;
use token_auth::{AuthConfig, AuthError, AuthService};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "s3cret";

/// Private key = fixture RSA key; JWKS publishes the other RSA key as `key-02`.
async fn full_service(jwks_fetches: u64) -> Result<(AuthService, MockServer, NamedTempFile), anyhow::Error> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(&[rsa_public_jwk(OTHER_RSA_PKCS8_PEM, "key-02")])),
        )
        .expect(jwks_fetches)
        .mount(&server)
        .await;

    let key_file = write_key_file(RSA_PKCS8_PEM)?;
    let config = AuthConfig {
        shared_secret: Some(SecretString::from(SECRET)),
        jwks_url: Some(format!("{}/jwks", server.uri())),
        private_key_file: Some(key_file.path().to_string_lossy().into_owned()),
        ..AuthConfig::default()
    };

    let service = AuthService::from_config(&config)?;
    Ok((service, server, key_file))
}

#[tokio::test]
async fn test_providers_ordered_by_priority() -> Result<(), anyhow::Error> {
    let (service, _server, _key_file) = full_service(0).await?;

    assert_eq!(service.configured_providers(), vec!["PrivateKey", "JWKs", "Secret"]);
    assert_eq!(service.provider_count(), 3);

    Ok(())
}

#[tokio::test]
async fn test_private_key_wins_without_touching_jwks() -> Result<(), anyhow::Error> {
    let (service, _server, _key_file) = full_service(0).await?;

    let token = TestTokenBuilder::new().for_subject("user-1").sign_rs256(RSA_PKCS8_PEM);
    let result = service.validate_token(&token).await;

    assert!(result.is_valid());
    assert_eq!(result.strategy_name(), Some("PrivateKey"));
    assert_eq!(result.subject(), "user-1");

    Ok(())
}

#[tokio::test]
async fn test_jwks_accepts_after_private_key_rejects() -> Result<(), anyhow::Error> {
    let (service, _server, _key_file) = full_service(1).await?;

    let token = TestTokenBuilder::new()
        .for_subject("user-2")
        .with_kid("key-02")
        .sign_rs256(OTHER_RSA_PKCS8_PEM);
    let result = service.validate_token(&token).await;

    assert!(result.is_valid(), "got {result:?}");
    assert_eq!(result.strategy_name(), Some("JWKs"));
    assert_eq!(result.subject(), "user-2");

    Ok(())
}

#[tokio::test]
async fn test_secret_accepts_hmac_token() -> Result<(), anyhow::Error> {
    let (service, _server, _key_file) = full_service(1).await?;

    let token = TestTokenBuilder::new().for_subject("user-1").sign_hs256(SECRET);
    let result = service.validate_token(&token).await;

    assert!(result.is_valid(), "got {result:?}");
    assert_eq!(result.strategy_name(), Some("Secret"));
    assert_eq!(result.subject(), "user-1");

    Ok(())
}

#[tokio::test]
async fn test_token_without_subject_is_valid() -> Result<(), anyhow::Error> {
    let (service, _server, _key_file) = full_service(0).await?;

    let token = TestTokenBuilder::new().without_subject().sign_rs256(RSA_PKCS8_PEM);
    let result = service.validate_token(&token).await;

    assert!(result.is_valid());
    assert_eq!(result.subject(), "");

    Ok(())
}

#[tokio::test]
async fn test_wrong_secret_rejected_by_every_strategy() -> Result<(), anyhow::Error> {
    let (service, _server, _key_file) = full_service(1).await?;

    let token = TestTokenBuilder::new().sign_hs256("not-the-secret");
    let result = service.validate_token(&token).await;

    assert!(!result.is_valid());
    assert!(result.strategy().is_none());
    let failure = result.failure().ok_or_else(|| anyhow::anyhow!("no failure"))?;
    assert_ne!(failure, &AuthError::ProviderNotConfigured);
    assert_eq!(failure.status_code(), 401);

    Ok(())
}

#[tokio::test]
async fn test_expired_token_rejected() -> Result<(), anyhow::Error> {
    // No kid: the remote key set is fetched and tried after the private key
    let (service, _server, _key_file) = full_service(1).await?;

    let token = TestTokenBuilder::new().expires_in(-3600).sign_rs256(RSA_PKCS8_PEM);
    let result = service.validate_token(&token).await;

    assert!(!result.is_valid());

    Ok(())
}

#[tokio::test]
async fn test_authenticate_header_end_to_end() -> Result<(), anyhow::Error> {
    let (service, _server, _key_file) = full_service(0).await?;

    let token = TestTokenBuilder::new().for_subject("user-1").sign_rs256(RSA_PKCS8_PEM);
    let result = service
        .authenticate_header(&format!("Bearer   {token}   "))
        .await;
    assert!(result.is_valid());
    assert_eq!(result.subject(), "user-1");

    let cases = [
        ("", AuthError::MissingAuthorizationHeader),
        ("Bearer", AuthError::InvalidAuthorizationFormat),
        ("Bearer   ", AuthError::InvalidAuthorizationFormat),
        ("bearer x", AuthError::InvalidAuthorizationFormat),
    ];
    for (header, expected) in cases {
        let result = service.authenticate_header(header).await;
        assert_eq!(result.failure(), Some(&expected), "{header:?}");
    }

    Ok(())
}
