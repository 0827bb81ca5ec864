//! Operator check tool.
//!
//! Reads `Authorization` header values from stdin, one per line, and reports
//! whether each would be accepted with the current environment configuration.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use token_auth::{AuthConfig, AuthError, AuthService};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries one verdict per input line
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "token_auth=info,auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AuthConfig::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let service = Arc::new(AuthService::from_config(&config).map_err(|e| {
        error!("Failed to build authentication service: {}", e);
        e
    })?);

    info!(
        providers = ?service.configured_providers(),
        "Authentication service ready"
    );

    let cancel = CancellationToken::new();
    let refresher = service.spawn_key_set_refresher(cancel.clone());

    // Split on raw bytes so a non-UTF-8 line is reported, not fatal
    let mut lines = BufReader::new(tokio::io::stdin()).split(b'\n');
    while let Some(line) = lines.next_segment().await? {
        println!("{}", check_line(&service, &line).await);
    }

    cancel.cancel();
    if let Some(handle) = refresher {
        if let Err(e) = handle.await {
            error!("Key set refresher ended abnormally: {}", e);
        }
    }

    info!("Input exhausted, shutting down");
    Ok(())
}

/// Verdict for one raw input line: `valid <strategy> <subject>` or
/// `invalid <error>`.
async fn check_line(service: &AuthService, raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let Ok(header) = std::str::from_utf8(raw) else {
        return "invalid input is not valid UTF-8".to_string();
    };

    let result = service.authenticate_header(header).await;
    match (result.strategy_name(), result.failure()) {
        (Some(strategy), _) if result.is_valid() => {
            format!("valid {} {}", strategy, result.subject())
        }
        (_, Some(failure)) => format!("invalid {failure}"),
        _ => format!("invalid {}", AuthError::AllProvidersFailed),
    }
}
