//! Concurrency tests
//!
//! Many validations share one service while key-set refreshes run
//! alongside them. Uses a scripted fetcher instead of HTTP.

use async_trait::async_trait;
use auth_test_utils::{
    jwks_document, rsa_public_jwk, TestTokenBuilder, OTHER_RSA_PKCS8_PEM, RSA_PKCS8_PEM,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use token_auth::jwks::{JwkSet, KeySetCacheConfig, KeySetFetcher};
use token_auth::strategies::RemoteKeySetStrategy;
use token_auth::{AuthError, AuthService};

const ENDPOINT: &str = "https://idp.example.com/.well-known/jwks.json";

struct CountingFetcher {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingFetcher {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
        })
    }
}

#[async_trait]
impl KeySetFetcher for CountingFetcher {
    async fn fetch(&self, _url: &str) -> Result<JwkSet, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        serde_json::from_value(jwks_document(&[rsa_public_jwk(RSA_PKCS8_PEM, "key-01")]))
            .map_err(|e| AuthError::JwksClientError(e.to_string()))
    }
}

fn service_with(fetcher: Arc<CountingFetcher>) -> Arc<AuthService> {
    let strategy =
        RemoteKeySetStrategy::with_fetcher(ENDPOINT, fetcher, KeySetCacheConfig::default()).unwrap();
    let cache = Arc::clone(strategy.cache().unwrap());
    let service = AuthService::new(vec![Arc::new(strategy)])
        .unwrap()
        .with_key_set_cache(cache);
    Arc::new(service)
}

/// Serves two disjoint key sets in turn: odd fetches publish `key-a`, even
/// fetches publish `key-b`, each backed by a different RSA key.
struct RotatingFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl KeySetFetcher for RotatingFetcher {
    async fn fetch(&self, _url: &str) -> Result<JwkSet, AuthError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(2)).await;
        let key = if call % 2 == 1 {
            rsa_public_jwk(RSA_PKCS8_PEM, "key-a")
        } else {
            rsa_public_jwk(OTHER_RSA_PKCS8_PEM, "key-b")
        };
        serde_json::from_value(jwks_document(&[key]))
            .map_err(|e| AuthError::JwksClientError(e.to_string()))
    }
}

/// Each published set holds exactly the kid its generation implies.
fn assert_consistent(generation: u64, kids: &[&str]) {
    let expected = if generation % 2 == 1 { "key-a" } else { "key-b" };
    assert_eq!(kids, [expected], "generation {generation} published {kids:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_validations_interleaved_with_refreshes() {
    let fetcher = Arc::new(RotatingFetcher {
        calls: AtomicUsize::new(0),
    });
    let strategy = RemoteKeySetStrategy::with_fetcher(
        ENDPOINT,
        Arc::clone(&fetcher) as Arc<dyn KeySetFetcher>,
        KeySetCacheConfig::default(),
    )
    .unwrap();
    let cache = Arc::clone(strategy.cache().unwrap());
    let service = Arc::new(
        AuthService::new(vec![Arc::new(strategy)])
            .unwrap()
            .with_key_set_cache(Arc::clone(&cache)),
    );

    let token_a = Arc::new(
        TestTokenBuilder::new()
            .for_subject("user-a")
            .with_kid("key-a")
            .sign_rs256(RSA_PKCS8_PEM),
    );
    let token_b = Arc::new(
        TestTokenBuilder::new()
            .for_subject("user-b")
            .with_kid("key-b")
            .sign_rs256(OTHER_RSA_PKCS8_PEM),
    );

    let done = CancellationToken::new();
    let observer = {
        let cache = Arc::clone(&cache);
        let done = done.clone();
        tokio::spawn(async move {
            let mut seen = 0usize;
            loop {
                let finished = done.is_cancelled();
                if let Some(snapshot) = cache.current().await {
                    assert_consistent(snapshot.generation(), &snapshot.kids());
                    seen += 1;
                }
                if finished {
                    break seen;
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let mut validations = Vec::new();
    for i in 0..64 {
        let service = Arc::clone(&service);
        let (token, subject) = if i % 2 == 0 {
            (Arc::clone(&token_a), "user-a")
        } else {
            (Arc::clone(&token_b), "user-b")
        };
        validations.push(tokio::spawn(async move {
            (service.validate_token(&token).await, subject)
        }));
    }

    let mut refreshes = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        refreshes.push(tokio::spawn(async move { service.refresh_key_set().await }));
    }

    for handle in validations {
        let (result, subject) = handle.await.unwrap();
        // A kid from the other set is a miss, never a signature check
        // against the wrong key
        if result.is_valid() {
            assert_eq!(result.subject(), subject);
        } else {
            assert_eq!(result.failure(), Some(&AuthError::KeyNotFound), "got {result:?}");
        }
    }
    for handle in refreshes {
        handle.await.unwrap().unwrap();
    }

    done.cancel();
    let seen = observer.await.unwrap();
    assert!(seen > 0);

    let last = cache.current().await.unwrap();
    assert_consistent(last.generation(), &last.kids());
    let calls = u64::try_from(fetcher.calls.load(Ordering::SeqCst)).unwrap();
    assert_eq!(last.generation(), calls);
}

#[tokio::test]
async fn test_cancelled_validation_leaves_cache_untouched() {
    let fetcher = CountingFetcher::new(Duration::from_secs(3600));
    let service = service_with(Arc::clone(&fetcher));
    let token = TestTokenBuilder::new().with_kid("key-01").sign_rs256(RSA_PKCS8_PEM);
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        })
    };

    let result = service.validate_token_cancellable(&token, &cancel).await;
    canceller.await.unwrap();

    assert_eq!(result.failure(), Some(&AuthError::Cancelled));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    let cache = service.key_set_cache().unwrap();
    assert!(cache.current().await.is_none());
}

#[tokio::test]
async fn test_background_refresher_stops_on_cancel() {
    let fetcher = CountingFetcher::new(Duration::ZERO);
    let service = service_with(Arc::clone(&fetcher));
    let cancel = CancellationToken::new();

    let handle = service.spawn_key_set_refresher(cancel.clone()).unwrap();
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("refresher should stop promptly")
        .unwrap();
}
