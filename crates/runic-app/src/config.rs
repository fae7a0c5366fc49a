//! Monitor configuration
//!
//! Loaded from TOML with every field defaulted, then adjusted from the
//! environment. Client settings are carried through to whoever builds the
//! load balancer; the core only validates them.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::activity::{ACTIVITY_VIEW_CAPACITY, DASHBOARD_ACTIVITY_CAPACITY};
use crate::balances::{demo_wallets, TrackedWallet};
use crate::diagnostics::DEFAULT_DIAGNOSTIC_CAPACITY;
use crate::errors::ConfigError;
use crate::notifications::DEFAULT_NOTIFICATION_TTL_MS;

/// Env var overriding the routing strategy.
pub const ENV_STRATEGY: &str = "RUNIC_STRATEGY";
/// Env var overriding the log level.
pub const ENV_LOG_LEVEL: &str = "RUNIC_LOG_LEVEL";
/// Env var carrying the Helius API key.
pub const ENV_HELIUS_API_KEY: &str = "HELIUS_API_KEY";
/// Env var carrying the Alchemy API key.
pub const ENV_ALCHEMY_API_KEY: &str = "ALCHEMY_API_KEY";

const CACHE_TTL_RANGE_MS: std::ops::RangeInclusive<u64> = 500..=10_000;
const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Delays and intervals
    pub timing: TimingConfig,
    /// Ledger and channel sizes
    pub capacity: CapacityConfig,
    /// Settings handed to the load balancer
    pub client: ClientSettings,
    /// Wallets to track, in display order
    pub wallets: Vec<TrackedWallet>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            capacity: CapacityConfig::default(),
            client: ClientSettings::default(),
            wallets: demo_wallets(),
        }
    }
}

/// Delays and intervals, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause between the end of the bulk load and entering the dashboard
    pub settle_delay_ms: u64,
    /// Pause after each item of a bulk load
    pub pacing_ms: u64,
    /// Statistics poll period
    pub stats_interval_ms: u64,
    /// Toast lifetime
    pub notification_ttl_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            pacing_ms: 300,
            stats_interval_ms: 2_000,
            notification_ttl_ms: DEFAULT_NOTIFICATION_TTL_MS,
        }
    }
}

impl TimingConfig {
    /// Settle delay as a `Duration`.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Pacing as a `Duration`.
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Poll period as a `Duration`.
    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    /// Toast lifetime as a `Duration`.
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}

/// Ledger and channel sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Dashboard activity ledger
    pub dashboard: usize,
    /// Activity view ledger
    pub activity_view: usize,
    /// Retained diagnostics
    pub diagnostics: usize,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            dashboard: DASHBOARD_ACTIVITY_CAPACITY,
            activity_view: ACTIVITY_VIEW_CAPACITY,
            diagnostics: DEFAULT_DIAGNOSTIC_CAPACITY,
        }
    }
}

/// How the balancer picks an endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingStrategy {
    /// Rotate through endpoints
    RoundRobin,
    /// Prefer the fastest endpoint
    #[default]
    LatencyBased,
    /// Weighted random choice
    Weighted,
    /// Uniform random choice
    Random,
}

impl RoutingStrategy {
    /// Configuration label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoundRobin => "round-robin",
            Self::LatencyBased => "latency-based",
            Self::Weighted => "weighted",
            Self::Random => "random",
        }
    }
}

impl FromStr for RoutingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round-robin" => Ok(Self::RoundRobin),
            "latency-based" => Ok(Self::LatencyBased),
            "weighted" => Ok(Self::Weighted),
            "random" => Ok(Self::Random),
            other => Err(ConfigError::invalid(
                "client.strategy",
                format!("unknown routing strategy '{other}'"),
            )),
        }
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything
    Debug,
    /// Normal operation
    #[default]
    Info,
    /// Problems only
    Warn,
    /// Failures only
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::invalid(
                "client.log_level",
                format!("unknown log level '{other}'"),
            )),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether responses are cached
    pub enabled: bool,
    /// Entry lifetime
    pub ttl_ms: u64,
    /// Maximum cached responses
    pub max_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 2_000,
            max_size: 500,
        }
    }
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts after the first failure
    pub max_attempts: u32,
    /// First backoff
    pub initial_delay_ms: u64,
    /// Backoff ceiling
    pub max_delay_ms: u64,
    /// Growth factor between attempts
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Per-endpoint circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Failures that open the circuit
    pub failure_threshold: u32,
    /// Successes in half-open that close it
    pub success_threshold: u32,
    /// Time spent open before probing
    pub timeout_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_ms: 30_000,
        }
    }
}

/// Background endpoint health checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckSettings {
    /// Whether checks run
    pub enabled: bool,
    /// Check period
    pub interval_ms: u64,
    /// Per-check timeout
    pub timeout_ms: u64,
    /// Consecutive failures before an endpoint is unhealthy
    pub unhealthy_threshold: u32,
    /// Consecutive successes before it is healthy again
    pub healthy_threshold: u32,
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
            timeout_ms: 5_000,
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Provider API keys. Absent keys mean public endpoints only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    /// Helius key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helius: Option<String>,
    /// Alchemy key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alchemy: Option<String>,
}

impl ApiKeys {
    /// Whether any provider key is configured.
    pub fn any(&self) -> bool {
        self.helius.is_some() || self.alchemy.is_some()
    }
}

/// Settings for the external load balancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Endpoint selection
    pub strategy: RoutingStrategy,
    /// Requests per second across endpoints
    pub rate_limit: u32,
    /// Client log verbosity
    pub log_level: LogLevel,
    /// Fall back to public endpoints when keyed ones fail
    pub use_fallback: bool,
    /// Response cache
    pub cache: CacheSettings,
    /// Retries
    pub retry: RetrySettings,
    /// Circuit breaker
    pub circuit_breaker: CircuitBreakerSettings,
    /// Health checks
    pub health_check: HealthCheckSettings,
    /// Provider keys
    pub api_keys: ApiKeys,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::default(),
            rate_limit: 100,
            log_level: LogLevel::default(),
            use_fallback: true,
            cache: CacheSettings::default(),
            retry: RetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            health_check: HealthCheckSettings::default(),
            api_keys: ApiKeys::default(),
        }
    }
}

impl ClientSettings {
    /// Check ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !CACHE_TTL_RANGE_MS.contains(&self.cache.ttl_ms) {
            return Err(ConfigError::invalid(
                "client.cache.ttl_ms",
                format!(
                    "{} outside {}..={}",
                    self.cache.ttl_ms,
                    CACHE_TTL_RANGE_MS.start(),
                    CACHE_TTL_RANGE_MS.end()
                ),
            ));
        }
        if self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::invalid(
                "client.retry.max_attempts",
                format!("{} exceeds {MAX_RETRY_ATTEMPTS}", self.retry.max_attempts),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "client.retry.backoff_multiplier",
                "must be at least 1",
            ));
        }
        let thresholds = [
            ("client.circuit_breaker.failure_threshold", self.circuit_breaker.failure_threshold),
            ("client.circuit_breaker.success_threshold", self.circuit_breaker.success_threshold),
            ("client.health_check.unhealthy_threshold", self.health_check.unhealthy_threshold),
            ("client.health_check.healthy_threshold", self.health_check.healthy_threshold),
            ("client.rate_limit", self.rate_limit),
        ];
        for (field, value) in thresholds {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be non-zero"));
            }
        }
        Ok(())
    }
}

impl MonitorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every range the controller and client depend on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timing.stats_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "timing.stats_interval_ms",
                "must be non-zero",
            ));
        }
        if self.timing.notification_ttl_ms == 0 {
            return Err(ConfigError::invalid(
                "timing.notification_ttl_ms",
                "must be non-zero",
            ));
        }
        if self.capacity.dashboard == 0 || self.capacity.activity_view == 0 {
            return Err(ConfigError::invalid(
                "capacity",
                "activity ledgers need room for at least one entry",
            ));
        }
        if self.wallets.iter().any(|w| w.address.trim().is_empty()) {
            return Err(ConfigError::invalid("wallets", "empty address"));
        }
        self.client.validate()
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn apply_env_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(strategy) = get(ENV_STRATEGY) {
            self.client.strategy = strategy.parse()?;
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.client.log_level = level.parse()?;
        }
        if let Some(key) = get(ENV_HELIUS_API_KEY) {
            self.client.api_keys.helius = Some(key);
        }
        if let Some(key) = get(ENV_ALCHEMY_API_KEY) {
            self.client.api_keys.alchemy = Some(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.timing.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.timing.pacing(), Duration::from_millis(300));
        assert_eq!(config.timing.stats_interval(), Duration::from_millis(2_000));
        assert_eq!(config.timing.notification_ttl(), Duration::from_millis(5_000));
        assert_eq!(config.capacity.dashboard, 50);
        assert_eq!(config.capacity.activity_view, 100);
        assert_eq!(config.wallets.len(), 4);
        assert_eq!(config.client.strategy, RoutingStrategy::LatencyBased);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MonitorConfig::from_toml_str(
            r#"
            [timing]
            pacing_ms = 100

            [client]
            strategy = "round-robin"

            [client.cache]
            ttl_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.timing.pacing_ms, 100);
        assert_eq!(config.timing.settle_delay_ms, 500);
        assert_eq!(config.client.strategy, RoutingStrategy::RoundRobin);
        assert_eq!(config.client.cache.ttl_ms, 1_000);
        assert!(config.client.cache.enabled);
        assert_eq!(config.wallets, demo_wallets());
    }

    #[test]
    fn test_cache_ttl_range() {
        let err = MonitorConfig::from_toml_str("[client.cache]\nttl_ms = 100\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "client.cache.ttl_ms",
                ..
            }
        ));
        assert!(MonitorConfig::from_toml_str("[client.cache]\nttl_ms = 10000\n").is_ok());
    }

    #[test]
    fn test_retry_range() {
        assert!(MonitorConfig::from_toml_str("[client.retry]\nmax_attempts = 0\n").is_ok());
        assert!(MonitorConfig::from_toml_str("[client.retry]\nmax_attempts = 6\n").is_err());
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let err =
            MonitorConfig::from_toml_str("[client.circuit_breaker]\nfailure_threshold = 0\n")
                .unwrap_err();
        assert!(err.to_string().contains("failure_threshold"));
    }

    #[test]
    fn test_unknown_strategy_is_parse_error() {
        assert!(matches!(
            MonitorConfig::from_toml_str("[client]\nstrategy = \"fastest\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_STRATEGY, "weighted"),
            (ENV_LOG_LEVEL, "DEBUG"),
            (ENV_HELIUS_API_KEY, "h-key"),
            (ENV_ALCHEMY_API_KEY, ""),
        ]);
        let mut config = MonitorConfig::default();
        config
            .apply_env_overrides_from(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.client.strategy, RoutingStrategy::Weighted);
        assert_eq!(config.client.log_level, LogLevel::Debug);
        assert_eq!(config.client.api_keys.helius.as_deref(), Some("h-key"));
        assert_eq!(config.client.api_keys.alchemy, None);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = MonitorConfig::default();
        let err = config
            .apply_env_overrides_from(|name| (name == ENV_LOG_LEVEL).then(|| "loud".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "client.log_level",
                ..
            }
        ));
    }

    #[test]
    fn test_toml_render_reparses() {
        let mut config = MonitorConfig::default();
        config.client.api_keys.helius = Some("abc".into());
        let rendered = config.to_toml_string().unwrap();
        let reparsed = MonitorConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(reparsed, config);
    }
}
