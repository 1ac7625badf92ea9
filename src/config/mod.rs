//! Ambient configuration for the resolution engine: log level, queue
//! aging/alert thresholds, and default resilience parameters. Loaded
//! from environment variables via [`figment`]; domain configuration
//! (schema, blocking, matching, merge strategies) is built
//! programmatically by the host application, since it is data the host
//! owns rather than deployment-time settings.

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};

use crate::error::ResolverError;
use crate::queue::AlertThresholds;
use crate::resilience::{CircuitBreakerConfig, ResilienceConfig, RetryConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    Pretty,
    Json,
}

/// Top-level settings for a running engine instance.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Log level for the `resolvix` target specifically.
    ///
    /// Valid values: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_tracing_format")]
    pub tracing_format: TracingFormat,

    /// How long a pending queue item may sit before it auto-expires.
    #[serde(
        default = "default_queue_auto_expire",
        deserialize_with = "deserialize_duration"
    )]
    pub queue_auto_expire_after: Duration,

    #[serde(default)]
    pub queue_alerts: QueueAlertConfig,

    /// Priority assigned to a queue item when the caller doesn't specify one.
    #[serde(default)]
    pub queue_default_priority: i64,

    /// Whether the host should publish queue throughput/age metrics.
    #[serde(default = "default_true")]
    pub queue_enable_metrics: bool,

    #[serde(default)]
    pub resilience: ResilienceSettings,
}

fn default_true() -> bool {
    true
}

impl EngineConfig {
    /// Loads configuration from (in increasing precedence) an optional
    /// `resolvix.toml`, then `RESOLVIX_`-prefixed environment variables.
    pub fn load() -> Result<Self, ResolverError> {
        Figment::new()
            .merge(Toml::file("resolvix.toml"))
            .merge(Env::prefixed("RESOLVIX_").split("_"))
            .extract()
            .map_err(|e| ResolverError::configuration(format!("failed to load configuration: {e}")))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueAlertConfig {
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(
        default = "default_max_item_age",
        deserialize_with = "deserialize_duration"
    )]
    pub max_item_age: Duration,
    #[serde(default = "default_min_throughput")]
    pub min_throughput_per_day: f64,
}

impl Default for QueueAlertConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            max_item_age: default_max_item_age(),
            min_throughput_per_day: default_min_throughput(),
        }
    }
}

impl From<&QueueAlertConfig> for AlertThresholds {
    fn from(config: &QueueAlertConfig) -> Self {
        AlertThresholds {
            max_queue_size: config.max_queue_size,
            max_age: ChronoDuration::from_std(config.max_item_age).unwrap_or(ChronoDuration::days(7)),
            min_throughput_per_day: config.min_throughput_per_day,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceSettings {
    #[serde(
        default = "default_service_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(
        default = "default_initial_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub initial_delay: Duration,
    #[serde(
        default = "default_max_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub max_delay: Duration,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(
        default = "default_reset_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub reset_timeout: Duration,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            timeout: default_service_timeout(),
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            failure_threshold: default_failure_threshold(),
            reset_timeout: default_reset_timeout(),
        }
    }
}

impl From<&ResilienceSettings> for ResilienceConfig {
    fn from(settings: &ResilienceSettings) -> Self {
        ResilienceConfig {
            timeout: settings.timeout,
            retry: RetryConfig {
                max_attempts: settings.max_attempts,
                initial_delay: settings.initial_delay,
                max_delay: settings.max_delay,
                backoff_multiplier: 2.0,
                jitter: true,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: settings.failure_threshold,
                failure_window: Duration::from_secs(60),
                reset_timeout: settings.reset_timeout,
                success_threshold: 2,
            },
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tracing_format() -> TracingFormat {
    TracingFormat::Pretty
}

fn default_queue_auto_expire() -> Duration {
    Duration::from_secs(30 * 24 * 60 * 60)
}

fn default_max_queue_size() -> usize {
    1000
}

fn default_max_item_age() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_min_throughput() -> f64 {
    10.0
}

fn default_service_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Duration parser shared by every flexible duration field below:
/// accepts bare numbers (seconds) or unit-suffixed strings ("30s",
/// "2m", "1500ms"), optionally summed ("10s 2m").
const DURATION_PARSER: DurationParser<'static> = DurationParser::builder()
    .time_units(&[TimeUnit::Second, TimeUnit::MilliSecond, TimeUnit::Minute, TimeUnit::Hour, TimeUnit::Day])
    .parse_multiple(None)
    .allow_time_unit_delimiter()
    .disable_infinity()
    .disable_fraction()
    .disable_exponent()
    .default_unit(TimeUnit::Second)
    .build();

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a duration string or number of seconds")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            DURATION_PARSER
                .parse(value)
                .map_err(|e| serde::de::Error::custom(format!("invalid duration '{value}': {e}")))?
                .try_into()
                .map_err(|e| serde::de::Error::custom(format!("duration conversion error: {e}")))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if value < 0 {
                return Err(serde::de::Error::custom("duration cannot be negative"));
            }
            Ok(Duration::from_secs(value as u64))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
