//! Device API client — applies label mutations to the platform.
//!
//! Wraps a `reqwest::Client` created once for the process lifetime, with
//! automatic retry + exponential back-off on transient (429 / 5xx /
//! timeout) failures. Auth rejections and other 4xx responses return
//! immediately; the single forced-refresh retry for a stale token is the
//! caller's decision, not this client's.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use uuid::Uuid;

use sl_domain::config::PlatformConfig;
use sl_domain::error::{Error, Result};
use sl_domain::transform::OutboundMutation;

use crate::token::AccessToken;

/// Acknowledgement of a successfully applied mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub status: u16,
}

/// Seam for the outbound platform call, so the gateway pipeline can be
/// exercised without a live platform.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Apply a label mutation using the given bearer token.
    async fn set_label(&self, mutation: &OutboundMutation, token: &AccessToken) -> Result<Ack>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How the retry engine treats a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    /// 401/403 — the token was rejected despite the cache.
    Auth,
    /// 429 or 5xx — eligible for bounded retry.
    Transient,
    /// Any other 4xx — not retried.
    Permanent,
}

pub fn disposition(status: StatusCode) -> Disposition {
    if status.is_success() {
        Disposition::Success
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Disposition::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Disposition::Transient
    } else {
        Disposition::Permanent
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Production [`DeviceApi`] for the platform's REST API.
///
/// Targets the emulator base URL when the platform config enables emulated
/// mode; otherwise the production API base.
#[derive(Debug, Clone)]
pub struct DeviceApiClient {
    http: Client,
    base_url: String,
    max_retries: u32,
}

impl DeviceApiClient {
    pub fn new(cfg: &PlatformConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let base = if cfg.use_emulator {
            &cfg.emulator_base_url
        } else {
            &cfg.api_base_url
        };

        Ok(Self {
            http,
            base_url: base.trim_end_matches('/').to_owned(),
            max_retries: cfg.max_retries,
        })
    }

    /// Label endpoint for a mutation. `updateMask` limits the patch to the
    /// label's value.
    fn label_url(&self, m: &OutboundMutation) -> String {
        format!(
            "{}/projects/{}/devices/{}/labels/{}?updateMask=value",
            self.base_url, m.project_id, m.device_id, m.label_key
        )
    }

    /// Execute a request with retry + exponential back-off on transient
    /// failures.
    ///
    /// * Retries on 429/5xx and on timeouts or connection errors.
    /// * 401/403 and other 4xx return immediately (auth and permanent).
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let result = build_request().send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    tracing::debug!(
                        endpoint,
                        status = status.as_u16(),
                        duration_ms,
                        attempt,
                        "platform call"
                    );

                    match disposition(status) {
                        Disposition::Success => return Ok(resp),
                        Disposition::Auth => {
                            let body = resp.text().await.unwrap_or_default();
                            return Err(Error::Auth(format!(
                                "{endpoint} rejected token ({status}): {body}"
                            )));
                        }
                        Disposition::Transient => {
                            let body = resp.text().await.unwrap_or_default();
                            tracing::warn!(
                                endpoint,
                                status = status.as_u16(),
                                attempt,
                                "transient platform failure"
                            );
                            last_err = Some(Error::Transient(format!(
                                "{endpoint} returned {status}: {body}"
                            )));
                            continue;
                        }
                        Disposition::Permanent => {
                            let body = resp.text().await.unwrap_or_default();
                            return Err(Error::Permanent(format!(
                                "{endpoint} returned {status}: {body}"
                            )));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(endpoint, error = %e, attempt, "platform call failed");
                    // Timeouts and connection errors are transient — retry.
                    last_err = Some(if e.is_timeout() {
                        Error::Timeout(format!("{endpoint}: {e}"))
                    } else {
                        Error::Transient(format!("{endpoint}: {e}"))
                    });
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Transient(format!("{endpoint}: all retries exhausted"))))
    }
}

#[async_trait]
impl DeviceApi for DeviceApiClient {
    async fn set_label(&self, mutation: &OutboundMutation, token: &AccessToken) -> Result<Ack> {
        let url = self.label_url(mutation);
        let endpoint = format!(
            "PATCH devices/{}/labels/{}",
            mutation.device_id, mutation.label_key
        );
        let payload = serde_json::json!({ "value": mutation.label_value });

        let resp = self
            .execute_with_retry(&endpoint, || {
                self.http
                    .patch(&url)
                    .header("Authorization", &token.token)
                    .header("X-Trace-Id", Uuid::new_v4().to_string())
                    .json(&payload)
            })
            .await?;

        Ok(Ack {
            status: resp.status().as_u16(),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
