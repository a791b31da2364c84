use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
pub const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

const CREDENTIAL_VARS: [&str; 4] = ["CONSUMER_KEY", "CONSUMER_SECRET", "TILL_NUMBER", "MPESA_PASSKEY"];

#[derive(Clone)]
pub struct MpesaCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub short_code: String,
    pub passkey: String,
}

impl fmt::Debug for MpesaCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpesaCredentials")
            .field("short_code", &self.short_code)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub production: bool,
    pub mpesa_base_url: String,
    pub credentials: Option<MpesaCredentials>,
    pub missing_credentials: Vec<&'static str>,
    pub callback_url: String,
    pub data_dir: PathBuf,
    pub payments_file: PathBuf,
    pub gateway_timeout: Duration,
    pub stk_max_attempts: u32,
    pub stk_retry_delay: Duration,
    pub verify_max_retries: u32,
    pub verify_retry_delay: Duration,
    pub catalogue_cache_ttl: Duration,
    pub reconcile_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = var("PORT").unwrap_or_else(|| "3000".to_string());
        let production = var("NODE_ENV").as_deref() == Some("production");
        let default_base = if production {
            PRODUCTION_BASE_URL
        } else {
            SANDBOX_BASE_URL
        };

        let missing_credentials: Vec<&'static str> = CREDENTIAL_VARS
            .iter()
            .copied()
            .filter(|key| var(*key).is_none())
            .collect();

        let credentials = match (
            var("CONSUMER_KEY"),
            var("CONSUMER_SECRET"),
            var("TILL_NUMBER"),
            var("MPESA_PASSKEY"),
        ) {
            (Some(consumer_key), Some(consumer_secret), Some(short_code), Some(passkey)) => {
                Some(MpesaCredentials {
                    consumer_key,
                    consumer_secret,
                    short_code,
                    passkey,
                })
            }
            _ => None,
        };

        let data_dir = PathBuf::from(var("DATA_DIR").unwrap_or_else(|| "server/data".to_string()));

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| format!("0.0.0.0:{port}")),
            production,
            mpesa_base_url: var("MPESA_BASE_URL").unwrap_or_else(|| default_base.to_string()),
            credentials,
            missing_credentials,
            callback_url: var("CALLBACK_URL")
                .unwrap_or_else(|| "http://localhost:3000/callback".to_string()),
            payments_file: PathBuf::from(
                var("PAYMENTS_FILE").unwrap_or_else(|| "assets/data/payments.json".to_string()),
            ),
            data_dir,
            gateway_timeout: Duration::from_millis(parse_or(var("GATEWAY_TIMEOUT_MS"), 30_000)),
            stk_max_attempts: parse_or(var("STK_MAX_ATTEMPTS"), 3),
            stk_retry_delay: Duration::from_millis(parse_or(var("STK_RETRY_DELAY_MS"), 2_000)),
            verify_max_retries: parse_or(var("VERIFY_MAX_RETRIES"), 10),
            verify_retry_delay: Duration::from_millis(parse_or(var("VERIFY_RETRY_DELAY_MS"), 5_000)),
            catalogue_cache_ttl: Duration::from_secs(parse_or(var("CATALOGUE_CACHE_TTL_SECS"), 300)),
            reconcile_interval: Duration::from_secs(parse_or(var("RECONCILE_INTERVAL_SECS"), 60)),
        }
    }

    pub fn tickets_file(&self) -> PathBuf {
        self.data_dir.join("tickets.json")
    }

    pub fn simulation_mode(&self) -> bool {
        self.credentials.is_none()
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring unparsable config value {:?}", raw);
            default
        }),
        None => default,
    }
}
