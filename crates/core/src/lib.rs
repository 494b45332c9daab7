pub mod allocation;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod optimizer;
pub mod questionnaire;
pub mod scoring;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://query1.finance.yahoo.com";
    const DEFAULT_MARKET_DATA_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_PORT: u16 = 3000;
    const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;
    const DEFAULT_MAX_SESSIONS: usize = 10_000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub sentry_dsn: Option<String>,
        pub market_data_base_url: String,
        pub market_data_timeout_secs: u64,
        pub port: u16,
        /// Idle sessions older than this are dropped from the in-memory store.
        pub session_ttl_secs: u64,
        pub max_sessions: usize,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let market_data_base_url = std::env::var("MARKET_DATA_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MARKET_DATA_BASE_URL.to_string());

            let market_data_timeout_secs = match std::env::var("MARKET_DATA_TIMEOUT_SECS") {
                Ok(s) => s
                    .parse::<u64>()
                    .with_context(|| format!("MARKET_DATA_TIMEOUT_SECS is not a number: {s}"))?,
                Err(_) => DEFAULT_MARKET_DATA_TIMEOUT_SECS,
            };

            let port = match std::env::var("PORT") {
                Ok(s) => s
                    .parse::<u16>()
                    .with_context(|| format!("PORT is not a valid port: {s}"))?,
                Err(_) => DEFAULT_PORT,
            };

            let session_ttl_secs = match std::env::var("SESSION_TTL_SECS") {
                Ok(s) => s
                    .parse::<u64>()
                    .with_context(|| format!("SESSION_TTL_SECS is not a number: {s}"))?,
                Err(_) => DEFAULT_SESSION_TTL_SECS,
            };

            let max_sessions = match std::env::var("MAX_SESSIONS") {
                Ok(s) => s
                    .parse::<usize>()
                    .with_context(|| format!("MAX_SESSIONS is not a number: {s}"))?,
                Err(_) => DEFAULT_MAX_SESSIONS,
            };
            anyhow::ensure!(max_sessions > 0, "MAX_SESSIONS must be positive");

            Ok(Self {
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                market_data_base_url,
                market_data_timeout_secs,
                port,
                session_ttl_secs,
                max_sessions,
            })
        }
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                sentry_dsn: None,
                market_data_base_url: DEFAULT_MARKET_DATA_BASE_URL.to_string(),
                market_data_timeout_secs: DEFAULT_MARKET_DATA_TIMEOUT_SECS,
                port: DEFAULT_PORT,
                session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
                max_sessions: DEFAULT_MAX_SESSIONS,
            }
        }
    }
}
