use crate::gateways::GatewayError;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Tokens are refreshed this long before the provider says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TTL: Duration = Duration::from_secs(3599);

#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl CachedToken {
    pub fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) + EXPIRY_MARGIN >= self.ttl
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
}

#[derive(Clone)]
pub struct TokenClient {
    pub base_url: String,
    consumer_key: String,
    consumer_secret: String,
    timeout: Duration,
    client: reqwest::Client,
    cache: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenClient {
    pub fn new(
        base_url: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            timeout,
            client,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn access_token(&self) -> Result<String, GatewayError> {
        {
            let read = self.cache.read().await;
            if let Some(cached) = &*read {
                if !cached.is_stale(Instant::now()) {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let fresh = self.fetch().await?;
        let token = fresh.access_token.clone();
        *self.cache.write().await = Some(fresh);
        Ok(token)
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn fetch(&self) -> Result<CachedToken, GatewayError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.base_url
        );

        let resp = self
            .client
            .get(url)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("token request failed: {}", e);
                GatewayError::TokenAcquisition(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "token endpoint rejected credentials: {}", body);
            return Err(GatewayError::TokenAcquisition(format!("HTTP {}", status.as_u16())));
        }

        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::TokenAcquisition(e.to_string()))?;

        let ttl = parsed
            .expires_in
            .as_ref()
            .and_then(|v| match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TTL);

        Ok(CachedToken {
            access_token: parsed.access_token,
            fetched_at: Instant::now(),
            ttl,
        })
    }
}
