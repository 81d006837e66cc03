use std::env;
use std::time::Duration;

use crate::models::TransactionKind;

pub const DEV_WEBHOOK_SECRET: &str = "default_webhook_secret_for_development_only";

/// Per-kind probability that the simulated processor approves an attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuccessRates {
    pub authorize: f64,
    pub capture: f64,
    pub void: f64,
    pub refund: f64,
}

impl Default for SuccessRates {
    fn default() -> Self {
        Self {
            authorize: 0.90,
            capture: 0.95,
            void: 0.98,
            refund: 0.99,
        }
    }
}

impl SuccessRates {
    pub fn for_kind(&self, kind: TransactionKind) -> f64 {
        match kind {
            TransactionKind::Authorize => self.authorize,
            TransactionKind::Capture => self.capture,
            TransactionKind::Void => self.void,
            TransactionKind::Refund => self.refund,
        }
    }
}

/// Retry and timeout policy for outbound webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Shared secret used for both outbound signing and inbound verification.
    pub secret: String,
    /// Merchant endpoint. When unset, events are stored and marked delivered.
    pub endpoint_url: Option<String>,
    pub max_attempts: i64,
    pub backoff_multiplier: u64,
    pub workers: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: DEV_WEBHOOK_SECRET.to_string(),
            endpoint_url: None,
            max_attempts: 3,
            backoff_multiplier: 2,
            workers: 4,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
        }
    }
}

impl WebhookConfig {
    /// Delay before the next delivery attempt, given how many attempts were made.
    pub fn backoff_delay(&self, attempts: i64) -> Duration {
        let exp = u32::try_from(attempts.max(0)).unwrap_or(u32::MAX);
        Duration::from_secs(self.backoff_multiplier.saturating_pow(exp))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub processor_timeout: Duration,
    pub success_rates: SuccessRates,
    pub webhook: WebhookConfig,
    pub dev_mode: bool,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("PAYGATE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_parse("PORT", 3000);

        let secret = match env::var("WEBHOOK_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ => {
                tracing::warn!(
                    "WEBHOOK_SECRET not set, using the development fallback secret"
                );
                DEV_WEBHOOK_SECRET.to_string()
            }
        };

        let defaults = SuccessRates::default();
        let success_rates = SuccessRates {
            authorize: env_parse("PROCESSOR_AUTHORIZE_SUCCESS_RATE", defaults.authorize),
            capture: env_parse("PROCESSOR_CAPTURE_SUCCESS_RATE", defaults.capture),
            void: env_parse("PROCESSOR_VOID_SUCCESS_RATE", defaults.void),
            refund: env_parse("PROCESSOR_REFUND_SUCCESS_RATE", defaults.refund),
        };

        let webhook = WebhookConfig {
            secret,
            endpoint_url: env::var("MERCHANT_WEBHOOK_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            max_attempts: env_parse("WEBHOOK_MAX_ATTEMPTS", 3_i64).max(1),
            backoff_multiplier: env_parse("WEBHOOK_BACKOFF_MULTIPLIER", 2_u64),
            workers: env_parse("WEBHOOK_WORKERS", 4_usize).max(1),
            connect_timeout: Duration::from_secs(env_parse("WEBHOOK_CONNECT_TIMEOUT_SECONDS", 5)),
            read_timeout: Duration::from_secs(env_parse("WEBHOOK_READ_TIMEOUT_SECONDS", 10)),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "paygate.db".to_string()),
            processor_timeout: Duration::from_secs(env_parse("PROCESSOR_TIMEOUT_SECONDS", 3)),
            success_rates,
            webhook,
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
