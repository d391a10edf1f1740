use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_WS_URL: &str = "wss://socket.polygon.io/crypto";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stream: StreamConfig,
    pub scanner: ScannerConfig,
    pub sink: SinkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub ws_url: String,
    /// Wildcard or comma-joined channel list sent as the `subscribe` params.
    pub subscription: String,
    /// When non-empty, overrides `subscription` with `<trade_event>.<symbol>` channels.
    pub symbols: Vec<String>,
    pub trade_event: String,
    pub wait_for_auth_ack: bool,
    pub subscribe_delay_ms: u64,
    pub auth_timeout_ms: u64,
    pub keepalive_secs: u64,
    pub tick_channel_capacity: usize,
    pub reconnect: ReconnectConfig,
    #[serde(skip)]
    pub api_key: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            subscription: "XT.*".to_string(),
            symbols: Vec::new(),
            trade_event: "XT".to_string(),
            wait_for_auth_ack: true,
            subscribe_delay_ms: 200,
            auth_timeout_ms: 5_000,
            keepalive_secs: 30,
            tick_channel_capacity: 1024,
            reconnect: ReconnectConfig::default(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub volume_threshold: f64,
    pub history_len: usize,
    pub warmup_len: usize,
    /// Clear all instrument state when the UTC date of arriving ticks changes.
    pub daily_reset: bool,
    pub alert_channel_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            volume_threshold: crate::classifier::DEFAULT_VOLUME_THRESHOLD,
            history_len: crate::tracker::volume::DEFAULT_HISTORY_LEN,
            warmup_len: crate::tracker::volume::DEFAULT_WARMUP_LEN,
            daily_reset: true,
            alert_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub sqlite_path: Option<String>,
    pub supabase_table: String,
    pub http_timeout_secs: u64,
    #[serde(skip)]
    pub supabase: Option<SupabaseCredentials>,
    #[serde(skip)]
    pub telegram: Option<TelegramCredentials>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            sqlite_path: Some("data/alerts.sqlite".to_string()),
            supabase_table: "crypto_alerts".to_string(),
            http_timeout_secs: 10,
            supabase: None,
            telegram: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupabaseCredentials {
    pub url: String,
    pub service_role_key: String,
}

#[derive(Debug, Clone)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl StreamConfig {
    pub fn subscription_params(&self) -> String {
        if self.symbols.is_empty() {
            return self.subscription.trim().to_string();
        }
        self.symbols
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s.contains('.') {
                    s.to_string()
                } else {
                    format!("{}.{}", self.trade_event, s.to_ascii_uppercase())
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_secs > 0).then(|| Duration::from_secs(self.keepalive_secs))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let explicit = std::env::var("SCANNER_CONFIG").ok();
        let config_path = explicit
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else if explicit.is_some() {
            bail!("config file {} does not exist", config_path.display());
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&config_str).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Fill secrets and endpoint overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        self.stream.api_key =
            non_empty("POLYGON_API_KEY").context("POLYGON_API_KEY not set in .env or environment")?;
        if let Some(url) = non_empty("POLYGON_WS_URL") {
            self.stream.ws_url = url;
        }

        self.sink.supabase = match (non_empty("SUPABASE_URL"), non_empty("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => Some(SupabaseCredentials {
                url: url.trim_end_matches('/').to_string(),
                service_role_key,
            }),
            (None, None) => None,
            _ => bail!("SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set together"),
        };

        self.sink.telegram = match (non_empty("TELEGRAM_BOT_TOKEN"), non_empty("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramCredentials { bot_token, chat_id }),
            (None, None) => None,
            _ => bail!("TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID must be set together"),
        };

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.stream.ws_url)
            .with_context(|| format!("invalid stream.ws_url '{}'", self.stream.ws_url))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            bail!("stream.ws_url must use ws:// or wss://, got '{}'", url.scheme());
        }
        if self.stream.subscription_params().is_empty() {
            bail!("stream.subscription and stream.symbols are both empty");
        }
        if self.stream.trade_event.trim().is_empty() {
            bail!("stream.trade_event must not be empty");
        }
        if self.stream.tick_channel_capacity == 0 || self.scanner.alert_channel_capacity == 0 {
            bail!("channel capacities must be > 0");
        }

        let reconnect = &self.stream.reconnect;
        if reconnect.initial_delay_ms == 0 || reconnect.max_delay_ms < reconnect.initial_delay_ms {
            bail!("stream.reconnect delays must satisfy 0 < initial_delay_ms <= max_delay_ms");
        }
        if !(reconnect.factor >= 1.0 && reconnect.factor.is_finite()) {
            bail!("stream.reconnect.factor must be >= 1.0");
        }

        let scanner = &self.scanner;
        if !(scanner.volume_threshold > 0.0 && scanner.volume_threshold.is_finite()) {
            bail!("scanner.volume_threshold must be a positive number");
        }
        if scanner.history_len == 0 {
            bail!("scanner.history_len must be > 0");
        }
        if scanner.warmup_len == 0 || scanner.warmup_len > scanner.history_len {
            bail!(
                "scanner.warmup_len must be within 1..={}",
                scanner.history_len
            );
        }
        Ok(())
    }
}
