//! Integration tests for the private key strategy
//!
//! Key files are written to temp files in every supported format and loaded
//! through `AuthService::from_config`.

use auth_test_utils::{
    write_key_file, TestTokenBuilder, OTHER_RSA_PKCS8_PEM, RSA_PKCS1_DER, RSA_PKCS1_PEM,
    RSA_PKCS8_DER, RSA_PKCS8_PEM,
};
use jsonwebtoken::Algorithm;
use token_auth::{AuthConfig, AuthError, AuthService};

fn key_file_config(path: &std::path::Path) -> AuthConfig {
    AuthConfig {
        private_key_file: Some(path.to_string_lossy().into_owned()),
        ..AuthConfig::default()
    }
}

#[tokio::test]
async fn test_every_key_format_validates_tokens() -> Result<(), anyhow::Error> {
    let token = TestTokenBuilder::new()
        .for_subject("user-1")
        .sign_rs256(RSA_PKCS8_PEM);

    for bytes in [RSA_PKCS1_PEM, RSA_PKCS8_PEM, RSA_PKCS1_DER, RSA_PKCS8_DER] {
        let key_file = write_key_file(bytes)?;
        let service = AuthService::from_config(&key_file_config(key_file.path()))?;

        let result = service.validate_token(&token).await;
        assert!(result.is_valid(), "got {result:?}");
        assert_eq!(result.subject(), "user-1");
        assert_eq!(result.strategy_name(), Some("PrivateKey"));
    }

    Ok(())
}

#[tokio::test]
async fn test_pss_token_accepted() -> Result<(), anyhow::Error> {
    let key_file = write_key_file(RSA_PKCS1_PEM)?;
    let service = AuthService::from_config(&key_file_config(key_file.path()))?;

    let token = TestTokenBuilder::new().sign_rsa(Algorithm::PS512, RSA_PKCS1_PEM);
    assert!(service.validate_token(&token).await.is_valid());

    Ok(())
}

#[tokio::test]
async fn test_token_from_other_key_rejected() -> Result<(), anyhow::Error> {
    let key_file = write_key_file(RSA_PKCS8_PEM)?;
    let service = AuthService::from_config(&key_file_config(key_file.path()))?;

    let token = TestTokenBuilder::new().sign_rs256(OTHER_RSA_PKCS8_PEM);
    let result = service.validate_token(&token).await;

    assert!(!result.is_valid());
    assert!(result.strategy().is_none());
    assert_ne!(result.failure(), Some(&AuthError::ProviderNotConfigured));

    Ok(())
}

#[test]
fn test_missing_key_file_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.pem");

    let err = AuthService::from_config(&key_file_config(&missing)).unwrap_err();
    assert!(matches!(err, AuthError::PrivateKeyFileNotFound(_)), "got {err:?}");
    assert_eq!(err.status_code(), 500);
}

#[test]
fn test_unparseable_key_file_fails_construction() {
    let key_file = write_key_file(b"-----BEGIN NONSENSE-----\nAAAA\n-----END NONSENSE-----\n").unwrap();

    let err = AuthService::from_config(&key_file_config(key_file.path())).unwrap_err();
    assert!(matches!(err, AuthError::PrivateKeyParseError(_)), "got {err:?}");
}
