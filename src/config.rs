use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub vector_store: VectorStoreConfig,
    pub collaborators: CollaboratorsConfig,
    pub audit: AuditThresholdsConfig,
    pub timeouts: TimeoutsConfig,
    pub gpu: GpuConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Shared secret for the bearer-auth middleware. There is no login endpoint;
/// tokens are minted with the `token` CLI subcommand by whoever holds this
/// secret.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expires_in: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Single-backend LLM client config. One backend rather than a multi-provider
/// registry, matching the LLM client's single-reqwest-client shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend_url: String,
    pub model: String,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub timeout_secs: u64,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub url: String,
    pub api_key: Option<String>,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub timeout_secs: u64,
}

/// Base URLs for the collaborator services: editorial analysis, competitor
/// search, article scraping and image generation. One timeout applies to all
/// of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollaboratorsConfig {
    pub editorial_analysis_url: String,
    pub competitor_search_url: String,
    pub scraper_url: String,
    pub image_generator_url: String,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub timeout_secs: u64,
}

/// `AuditOrchestrator` sufficiency thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditThresholdsConfig {
    pub min_client_articles_for_audit: i64,
    pub min_competitor_articles_for_audit: i64,
    pub max_competitors: u32,
    pub max_pages_per_domain: u32,
    pub trend_time_window_days: i32,
}

/// Per-workflow timeouts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub db_secs: u64,
}

/// GPU model-owner settling delay.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub settling_delay_secs: u64,
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "editorial-engine")]
#[command(version, about = "Editorial competitive-intelligence engine")]
pub struct CommandLineArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// JWT secret key (overrides config file)
    #[arg(long, value_name = "SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT expiration time (overrides config file, e.g., "24h")
    #[arg(long, value_name = "DURATION")]
    pub jwt_expires_in: Option<String>,

    /// Logging level (overrides config file, e.g., "info,editorial_engine=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// LLM backend URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub llm_backend_url: Option<String>,

    /// Vector store URL (overrides config file)
    #[arg(long, value_name = "URL")]
    pub vector_store_url: Option<String>,

    /// Vector store API key (overrides config file)
    #[arg(long, value_name = "KEY")]
    pub vector_store_api_key: Option<String>,

    /// Minimum client articles required before an audit is considered
    /// sufficiently scraped (overrides config file)
    #[arg(long, value_name = "N")]
    pub min_client_articles_for_audit: Option<i64>,

    /// Minimum competitor articles required before an audit is considered
    /// sufficiently scraped (overrides config file)
    #[arg(long, value_name = "N")]
    pub min_competitor_articles_for_audit: Option<i64>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default when no subcommand is given)
    Serve,
    /// Run an audit synchronously from the CLI and print the response
    Audit { domain: String },
    /// Apply pending SQL migrations and exit
    Migrate,
    /// Mint a bearer token signed with `auth.jwt_secret`
    Token {
        #[arg(default_value = "ops")]
        subject: String,
    },
}

impl Config {
    /// Load configuration with command line, environment variable, and file support
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_, plus a few service-specific names)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load(cli_args: &CommandLineArgs) -> Result<Self, anyhow::Error> {
        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - APP_SERVER_HOST / APP_SERVER_PORT / APP_DATABASE_URL
    /// - APP_JWT_SECRET / APP_JWT_EXPIRES_IN
    /// - APP_LOG_LEVEL
    /// - LLM_BACKEND_URL
    /// - VECTOR_STORE_URL / VECTOR_STORE_API_KEY
    /// - MIN_CLIENT_ARTICLES_FOR_AUDIT / MIN_COMPETITOR_ARTICLES_FOR_AUDIT
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("APP_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
            tracing::info!("Override server.port from env: {}", self.server.port);
        }

        if let Ok(db_url) = std::env::var("APP_DATABASE_URL") {
            self.database.url = db_url;
            tracing::info!("Override database.url from env");
        }

        if let Ok(secret) = std::env::var("APP_JWT_SECRET") {
            self.auth.jwt_secret = secret;
            tracing::info!("Override auth.jwt_secret from env");
        }

        if let Ok(expires) = std::env::var("APP_JWT_EXPIRES_IN") {
            self.auth.jwt_expires_in = expires;
            tracing::info!("Override auth.jwt_expires_in from env: {}", self.auth.jwt_expires_in);
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(url) = std::env::var("LLM_BACKEND_URL") {
            self.llm.backend_url = url;
            tracing::info!("Override llm.backend_url from env");
        }

        if let Ok(url) = std::env::var("VECTOR_STORE_URL") {
            self.vector_store.url = url;
            tracing::info!("Override vector_store.url from env");
        }

        if let Ok(key) = std::env::var("VECTOR_STORE_API_KEY") {
            self.vector_store.api_key = Some(key);
            tracing::info!("Override vector_store.api_key from env");
        }

        if let Ok(n) = std::env::var("MIN_CLIENT_ARTICLES_FOR_AUDIT")
            && let Ok(n) = n.parse()
        {
            self.audit.min_client_articles_for_audit = n;
            tracing::info!("Override audit.min_client_articles_for_audit from env: {}", n);
        }

        if let Ok(n) = std::env::var("MIN_COMPETITOR_ARTICLES_FOR_AUDIT")
            && let Ok(n) = n.parse()
        {
            self.audit.min_competitor_articles_for_audit = n;
            tracing::info!("Override audit.min_competitor_articles_for_audit from env: {}", n);
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }

        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }

        if let Some(db_url) = &args.database_url {
            self.database.url = db_url.clone();
            tracing::info!("Override database.url from CLI");
        }

        if let Some(secret) = &args.jwt_secret {
            self.auth.jwt_secret = secret.clone();
            tracing::info!("Override auth.jwt_secret from CLI");
        }

        if let Some(expires) = &args.jwt_expires_in {
            self.auth.jwt_expires_in = expires.clone();
            tracing::info!("Override auth.jwt_expires_in from CLI: {}", self.auth.jwt_expires_in);
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(url) = &args.llm_backend_url {
            self.llm.backend_url = url.clone();
            tracing::info!("Override llm.backend_url from CLI");
        }

        if let Some(url) = &args.vector_store_url {
            self.vector_store.url = url.clone();
            tracing::info!("Override vector_store.url from CLI");
        }

        if let Some(key) = &args.vector_store_api_key {
            self.vector_store.api_key = Some(key.clone());
            tracing::info!("Override vector_store.api_key from CLI");
        }

        if let Some(n) = args.min_client_articles_for_audit {
            self.audit.min_client_articles_for_audit = n;
            tracing::info!("Override audit.min_client_articles_for_audit from CLI: {}", n);
        }

        if let Some(n) = args.min_competitor_articles_for_audit {
            self.audit.min_competitor_articles_for_audit = n;
            tracing::info!("Override audit.min_competitor_articles_for_audit from CLI: {}", n);
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.auth.jwt_secret == "dev-secret-key-change-in-production" {
            tracing::warn!("⚠️  WARNING: Using default JWT secret!");
            tracing::warn!("⚠️  Please set APP_JWT_SECRET environment variable or update config.toml");
            tracing::warn!("⚠️  This is INSECURE for production use!");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.llm.backend_url.is_empty() {
            anyhow::bail!("llm.backend_url cannot be empty");
        }

        if self.vector_store.url.is_empty() {
            anyhow::bail!("vector_store.url cannot be empty");
        }

        if self.audit.min_client_articles_for_audit < 0 || self.audit.min_competitor_articles_for_audit < 0 {
            anyhow::bail!("audit thresholds must be >= 0");
        }

        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://data/editorial-engine.db".to_string() }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-key-change-in-production".to_string(),
            jwt_expires_in: "24h".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,editorial_engine=debug".to_string(),
            file: Some("logs/editorial-engine.log".to_string()),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_secs: 60,
            concurrency: 1,
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self { url: "http://localhost:6334".to_string(), api_key: None, timeout_secs: 10 }
    }
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            editorial_analysis_url: "http://localhost:9001".to_string(),
            competitor_search_url: "http://localhost:9002".to_string(),
            scraper_url: "http://localhost:9003".to_string(),
            image_generator_url: "http://localhost:9004".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for AuditThresholdsConfig {
    fn default() -> Self {
        Self {
            min_client_articles_for_audit: 5,
            min_competitor_articles_for_audit: 10,
            max_competitors: 25,
            max_pages_per_domain: 50,
            trend_time_window_days: 90,
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self { db_secs: 30 }
    }
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self { settling_delay_secs: 5 }
    }
}

// =========================
// Helpers for parsing values
// =========================

fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    if let Ok(val) = input.parse::<u64>() {
        return Ok(val);
    }

    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: u64 = num_str.parse().map_err(|_| "invalid number".to_string())?;
    match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(n * 60),
        "h" | "hr" | "hour" | "hours" => Ok(n * 60 * 60),
        "d" | "day" | "days" => Ok(n * 60 * 60 * 24),
        _ => Err(format!("unsupported unit: {}", unit)),
    }
}

/// Parses a human-friendly duration string ("24h", "30m", "90") into a
/// `Duration`. Used by the `token` CLI subcommand to size a token's TTL from
/// `auth.jwt_expires_in`.
pub fn parse_duration(input: &str) -> Result<std::time::Duration, String> {
    parse_duration_to_secs(input).map(std::time::Duration::from_secs)
}

// Custom serde deserializer to support numeric or human-friendly string values
fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = u64;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of seconds or a string like '30s', '5m', '1h'")
        }
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v)
        }
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v >= 0 { Ok(v as u64) } else { Err(E::custom("negative not allowed")) }
        }
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(v).map_err(E::custom)
        }
        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(&v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = Config::default();
        config.validate().unwrap();
    }

    #[test]
    fn parses_human_friendly_durations() {
        assert_eq!(parse_duration_to_secs("30s").unwrap(), 30);
        assert_eq!(parse_duration_to_secs("5m").unwrap(), 300);
        assert_eq!(parse_duration_to_secs("1h").unwrap(), 3600);
        assert_eq!(parse_duration_to_secs("90").unwrap(), 90);
    }

    #[test]
    fn rejects_empty_database_url() {
        let mut config = Config::default();
        config.database.url = String::new();
        assert!(config.validate().is_err());
    }
}
