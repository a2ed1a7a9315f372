pub mod analysis;
pub mod domain;
pub mod inference;
pub mod ingest;
pub mod mail;
pub mod market;
pub mod pipeline;
pub mod storage;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_USER_ID: &str = "user-default";
    pub const DEFAULT_MODEL_ID: &str = "amazon.nova-micro-v1:0";
    pub const DEFAULT_MAX_TOKENS: u32 = 1000;
    pub const DEFAULT_TEMPERATURE: f64 = 0.0;
    pub const DEFAULT_TOP_P: f64 = 0.9;
    pub const DEFAULT_HISTORY_RANGE: &str = "6mo";
    pub const DEFAULT_MARKET_DATA_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 60;
    pub const DEFAULT_MAIL_RELAY_TIMEOUT_SECS: u64 = 30;

    /// Every environment knob the pipeline reads, in one place. Components
    /// take what they need at construction; nothing reads the environment
    /// after this.
    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub market_data_base_url: Option<String>,
        pub market_data_api_key: Option<String>,
        pub market_data_timeout_secs: u64,
        pub market_data_history_range: String,
        pub inference_base_url: Option<String>,
        pub inference_api_key: Option<String>,
        pub inference_timeout_secs: u64,
        pub inference_model_id: String,
        pub inference_max_tokens: u32,
        pub inference_temperature: f64,
        pub inference_top_p: f64,
        pub mail_relay_base_url: Option<String>,
        pub mail_relay_api_key: Option<String>,
        pub mail_relay_timeout_secs: u64,
        pub sender_email: Option<String>,
        pub recipient_email: Option<String>,
        pub default_user_id: String,
    }

    fn env_string(name: &str, default: &str) -> String {
        std::env::var(name)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
        std::env::var(name)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(default)
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL").ok(),
                market_data_api_key: std::env::var("MARKET_DATA_API_KEY").ok(),
                market_data_timeout_secs: env_parse(
                    "MARKET_DATA_TIMEOUT_SECS",
                    DEFAULT_MARKET_DATA_TIMEOUT_SECS,
                ),
                market_data_history_range: env_string(
                    "MARKET_DATA_HISTORY_RANGE",
                    DEFAULT_HISTORY_RANGE,
                ),
                inference_base_url: std::env::var("INFERENCE_BASE_URL").ok(),
                inference_api_key: std::env::var("INFERENCE_API_KEY").ok(),
                inference_timeout_secs: env_parse(
                    "INFERENCE_TIMEOUT_SECS",
                    DEFAULT_INFERENCE_TIMEOUT_SECS,
                ),
                inference_model_id: env_string("INFERENCE_MODEL_ID", DEFAULT_MODEL_ID),
                inference_max_tokens: env_parse("INFERENCE_MAX_TOKENS", DEFAULT_MAX_TOKENS),
                inference_temperature: env_parse("INFERENCE_TEMPERATURE", DEFAULT_TEMPERATURE),
                inference_top_p: env_parse("INFERENCE_TOP_P", DEFAULT_TOP_P),
                mail_relay_base_url: std::env::var("MAIL_RELAY_BASE_URL").ok(),
                mail_relay_api_key: std::env::var("MAIL_RELAY_API_KEY").ok(),
                mail_relay_timeout_secs: env_parse(
                    "MAIL_RELAY_TIMEOUT_SECS",
                    DEFAULT_MAIL_RELAY_TIMEOUT_SECS,
                ),
                sender_email: std::env::var("SENDER_EMAIL").ok(),
                recipient_email: std::env::var("RECIPIENT_EMAIL").ok(),
                // Questionnaire uploads carry no user key; a single configured
                // tenant owns every profile.
                default_user_id: env_string("DEFAULT_USER_ID", DEFAULT_USER_ID),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_market_data_base_url(&self) -> anyhow::Result<&str> {
            self.market_data_base_url
                .as_deref()
                .context("MARKET_DATA_BASE_URL is required")
        }

        pub fn require_inference_base_url(&self) -> anyhow::Result<&str> {
            self.inference_base_url
                .as_deref()
                .context("INFERENCE_BASE_URL is required")
        }

        pub fn require_mail_relay_base_url(&self) -> anyhow::Result<&str> {
            self.mail_relay_base_url
                .as_deref()
                .context("MAIL_RELAY_BASE_URL is required")
        }

        pub fn require_sender_email(&self) -> anyhow::Result<&str> {
            self.sender_email
                .as_deref()
                .context("SENDER_EMAIL is required")
        }

        pub fn require_recipient_email(&self) -> anyhow::Result<&str> {
            self.recipient_email
                .as_deref()
                .context("RECIPIENT_EMAIL is required")
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn tuning_knobs_fall_back_to_defaults() {
            let settings = Settings::from_env().unwrap();
            assert_eq!(settings.market_data_timeout_secs, 30);
            assert_eq!(settings.market_data_history_range, "6mo");
            assert_eq!(settings.inference_timeout_secs, 60);
            assert_eq!(settings.inference_model_id, DEFAULT_MODEL_ID);
            assert_eq!(settings.inference_max_tokens, 1000);
            assert_eq!(settings.inference_temperature, 0.0);
            assert_eq!(settings.inference_top_p, 0.9);
            assert_eq!(settings.mail_relay_timeout_secs, 30);
            assert_eq!(settings.default_user_id, DEFAULT_USER_ID);
        }
    }
}
