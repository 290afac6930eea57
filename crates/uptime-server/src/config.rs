use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};

use uptime_api::DEFAULT_MAX_CHECKS;
use uptime_worker::{DEFAULT_PROBE_CONCURRENCY, SchedulerConfig, SmsConfig};

const DEFAULT_SMS_BASE_URL: &str = "https://api.twilio.com";

/// Named deployment profile. Selects the default port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Staging,
    Testing,
    Production,
}

impl Environment {
    pub fn default_port(self) -> u16 {
        match self {
            Self::Staging => 3000,
            Self::Testing => 4000,
            Self::Production => 5000,
        }
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staging" => Ok(Self::Staging),
            "testing" => Ok(Self::Testing),
            "production" => Ok(Self::Production),
            other => bail!("unknown environment {other:?} (expected staging, testing or production)"),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Staging => "staging",
            Self::Testing => "testing",
            Self::Production => "production",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub max_checks: usize,
    pub probe_concurrency: usize,
    pub schedule: SchedulerConfig,
    pub sms: Option<SmsConfig>,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let environment = match var("UPTIME_ENV") {
            Some(v) => v.parse()?,
            None => Environment::default(),
        };
        let check_secs: u64 = parse_or(&var, "UPTIME_CHECK_INTERVAL_SECS", 60)?;
        let rotate_secs: u64 = parse_or(&var, "UPTIME_ROTATE_INTERVAL_SECS", 24 * 60 * 60)?;
        if check_secs == 0 || rotate_secs == 0 {
            bail!("timer intervals must be at least one second");
        }

        let sms = match (
            var("UPTIME_SMS_FROM"),
            var("UPTIME_SMS_ACCOUNT_SID"),
            var("UPTIME_SMS_AUTH_TOKEN"),
        ) {
            (Some(from), Some(account_sid), Some(auth_token)) => Some(SmsConfig {
                from,
                account_sid,
                auth_token,
                base_url: var("UPTIME_SMS_BASE_URL").unwrap_or_else(|| DEFAULT_SMS_BASE_URL.into()),
            }),
            _ => None,
        };

        Ok(Self {
            environment,
            host: var("UPTIME_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&var, "UPTIME_PORT", environment.default_port())?,
            data_dir: var("UPTIME_DATA_DIR").unwrap_or_else(|| "./.data".into()).into(),
            log_dir: var("UPTIME_LOG_DIR").unwrap_or_else(|| "./.logs".into()).into(),
            max_checks: parse_or(&var, "UPTIME_MAX_CHECKS", DEFAULT_MAX_CHECKS)?,
            probe_concurrency: parse_or(&var, "UPTIME_PROBE_CONCURRENCY", DEFAULT_PROBE_CONCURRENCY)?,
            schedule: SchedulerConfig {
                check_interval: Duration::from_secs(check_secs),
                rotate_interval: Duration::from_secs(rotate_secs),
            },
            sms,
            log_json: var("UPTIME_LOG_JSON").is_some_and(|v| matches!(v.trim(), "1" | "true")),
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has invalid value {raw:?}")),
        None => Ok(default),
    }
}
