//! OAuth2 token lifecycle.
//!
//! The platform's identity endpoint implements the JWT-bearer flavour of
//! the client-credentials grant: the service account signs a short-lived
//! HS256 assertion with its secret, posts it to the token endpoint, and
//! receives a bearer access token with an `expires_in`.
//!
//! Token lifecycle:
//! - Exactly one token is cached per process ([`TokenCache`]).
//! - A token is served from cache while more than `safety_margin_secs`
//!   remain before expiry; after that the next caller refreshes it.
//! - Concurrent refreshes are serialized — the cache lock is held across
//!   the fetch, so N waiters produce one identity-endpoint call and all
//!   observe the same token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use sl_domain::config::AuthConfig;
use sl_domain::error::{Error, Result};

const GRANT_TYPE_JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Default `expires_in` when the token response omits it.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A bearer credential for the platform API.
///
/// `token` carries the `Bearer ` prefix so it can be written straight into
/// an `Authorization` header. `Debug` is manually implemented to redact it.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    /// Unix timestamp (seconds) when the token expires.
    pub expires_at: i64,
}

impl AccessToken {
    /// Whether the token is still usable at `now`, keeping `margin` seconds
    /// of safety before the actual expiry.
    pub fn is_fresh(&self, now: i64, margin: i64) -> bool {
        now < self.expires_at - margin
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Service-account credentials, read from the environment once at startup.
///
/// `Debug` is manually implemented to redact the secret.
#[derive(Clone)]
pub struct ServiceAccount {
    pub email: String,
    pub key_id: String,
    pub secret: String,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("email", &self.email)
            .field("key_id", &self.key_id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Performs the client-credentials exchange against the identity endpoint.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch(&self) -> Result<AccessToken>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identity client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Claims of the signed grant assertion.
#[derive(Serialize)]
struct AssertionClaims {
    iat: i64,
    exp: i64,
    aud: String,
    iss: String,
}

/// Response from the token endpoint. `Debug` is manually implemented to
/// redact the token.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Production [`TokenProvider`] talking to the configured identity endpoint.
pub struct IdentityClient {
    http: reqwest::Client,
    endpoint: String,
    account: ServiceAccount,
    assertion_ttl_secs: i64,
}

impl IdentityClient {
    pub fn new(cfg: &AuthConfig, account: ServiceAccount) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: cfg.endpoint.trim_end_matches('/').to_owned(),
            account,
            assertion_ttl_secs: cfg.assertion_ttl_secs,
        })
    }

    /// Build the signed JWT assertion for the grant exchange. The key id
    /// travels in the JOSE header; issuer is the service-account email and
    /// audience is the token endpoint itself.
    fn assertion(&self, now: i64) -> Result<String> {
        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
        header.kid = Some(self.account.key_id.clone());

        let claims = AssertionClaims {
            iat: now,
            exp: now + self.assertion_ttl_secs,
            aud: self.endpoint.clone(),
            iss: self.account.email.clone(),
        };

        jsonwebtoken::encode(
            &header,
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(self.account.secret.as_bytes()),
        )
        .map_err(|e| Error::Auth(format!("signing grant assertion: {e}")))
    }
}

#[async_trait]
impl TokenProvider for IdentityClient {
    async fn fetch(&self) -> Result<AccessToken> {
        let now = Utc::now().timestamp();
        let assertion = self.assertion(now)?;

        let resp = self
            .http
            .post(&self.endpoint)
            .form(&[
                ("assertion", assertion.as_str()),
                ("grant_type", GRANT_TYPE_JWT_BEARER),
            ])
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Auth(format!("reading token response: {e}")))?;

        if !status.is_success() {
            return Err(Error::Auth(format!(
                "token endpoint returned HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Auth(format!("parsing token response: {e}")))?;

        let expires_in = parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        tracing::debug!(expires_in, "access token obtained");

        Ok(AccessToken {
            token: format!("Bearer {}", parsed.access_token),
            expires_at: now + expires_in,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Token cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-wide cache of the single access token.
///
/// The cache is the only writer. [`TokenCache::get`] holds the lock across
/// a refresh, which serializes the EMPTY/EXPIRED→VALID transition; callers
/// that arrive during a refresh wait for it and reuse its result.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    token: Mutex<Option<AccessToken>>,
    safety_margin_secs: i64,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>, safety_margin_secs: i64) -> Self {
        Self {
            provider,
            token: Mutex::new(None),
            safety_margin_secs,
        }
    }

    /// Return the cached token, refreshing it first when the cache is empty
    /// or the token is within the safety margin of expiry.
    ///
    /// A failed refresh propagates as [`Error::Auth`]; an expired token is
    /// never served in its place.
    pub async fn get(&self) -> Result<AccessToken> {
        let mut slot = self.token.lock().await;

        let now = Utc::now().timestamp();
        if let Some(token) = slot.as_ref() {
            if token.is_fresh(now, self.safety_margin_secs) {
                return Ok(token.clone());
            }
        }

        tracing::info!("access token missing or near expiry, refreshing");
        let fresh = self.provider.fetch().await?;
        *slot = Some(fresh.clone());
        Ok(fresh)
    }

    /// Force a refresh after the platform rejected `stale` — unless another
    /// caller already replaced it, in which case the newer cached token is
    /// returned without a fetch.
    pub async fn refresh_if_same(&self, stale: &AccessToken) -> Result<AccessToken> {
        let mut slot = self.token.lock().await;

        if let Some(token) = slot.as_ref() {
            if token.token != stale.token {
                return Ok(token.clone());
            }
        }

        tracing::info!("platform rejected cached token, fetching a new one");
        let fresh = self.provider.fetch().await?;
        *slot = Some(fresh.clone());
        Ok(fresh)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Hands out distinct tokens and counts how often it is asked.
    struct CountingProvider {
        fetches: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn fetch(&self) -> Result<AccessToken> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            // Widen the race window so unserialized refreshes would show up.
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(AccessToken {
                token: format!("Bearer t{n}"),
                expires_at: Utc::now().timestamp() + 3600,
            })
        }
    }

    #[test]
    fn freshness_respects_safety_margin() {
        let token = AccessToken {
            token: "Bearer abc".into(),
            expires_at: 3600,
        };
        // 3600s token with a 300s margin: still fresh at +3000 ...
        assert!(token.is_fresh(3000, 300));
        // ... no longer fresh once inside the margin or past expiry.
        assert!(!token.is_fresh(3300, 300));
        assert!(!token.is_fresh(3605, 300));
    }

    #[test]
    fn debug_redacts_token() {
        let token = AccessToken {
            token: "Bearer very-secret".into(),
            expires_at: 1,
        };
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn token_response_parses_minimal_body() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert!(parsed.expires_in.is_none());
        assert!(parsed.token_type.is_none());
    }

    #[test]
    fn token_response_parses_full_body() {
        let parsed: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","expires_in":3600,"token_type":"bearer"}"#,
        )
        .unwrap();
        assert_eq!(parsed.expires_in, Some(3600));
        assert_eq!(parsed.token_type.as_deref(), Some("bearer"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_gets_trigger_one_fetch() {
        let provider = CountingProvider::new();
        let cache = Arc::new(TokenCache::new(provider.clone(), 300));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.get().await.unwrap() }));
        }

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().token);
        }

        assert_eq!(provider.count(), 1);
        assert!(tokens.iter().all(|t| t == &tokens[0]));
    }

    #[tokio::test]
    async fn cached_token_is_reused() {
        let provider = CountingProvider::new();
        let cache = TokenCache::new(provider.clone(), 300);

        let first = cache.get().await.unwrap();
        let second = cache.get().await.unwrap();

        assert_eq!(provider.count(), 1);
        assert_eq!(first.token, second.token);
    }

    #[tokio::test]
    async fn forced_refresh_replaces_stale_token_once() {
        let provider = CountingProvider::new();
        let cache = TokenCache::new(provider.clone(), 300);

        let stale = cache.get().await.unwrap();
        let fresh = cache.refresh_if_same(&stale).await.unwrap();
        assert_ne!(stale.token, fresh.token);
        assert_eq!(provider.count(), 2);

        // A second caller still holding the old token does not trigger
        // another fetch — it inherits the replacement.
        let inherited = cache.refresh_if_same(&stale).await.unwrap();
        assert_eq!(inherited.token, fresh.token);
        assert_eq!(provider.count(), 2);
    }
}
