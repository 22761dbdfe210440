use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub admin: AdminConfig,
    pub lockout: LockoutPolicy,
    pub sweep_interval: Duration,
}

#[derive(Clone)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
}

/// Thresholds for the failed-login tracker.
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    /// Failures inside `block_time` that block an identifier or origin.
    pub max_attempts: usize,
    /// How long a failure keeps counting.
    pub block_time: Duration,
    /// Upper bound on distinct keys held per mapping.
    pub max_tracked_keys: usize,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        LockoutPolicy {
            max_attempts: 5,
            block_time: Duration::from_secs(300),
            max_tracked_keys: 100_000,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let admin_email = lookup("LOGINGUARD_ADMIN_EMAIL")
            .ok_or_else(|| anyhow::anyhow!("LOGINGUARD_ADMIN_EMAIL environment variable is required"))?;
        let admin_password = lookup("LOGINGUARD_ADMIN_PASSWORD").ok_or_else(|| {
            anyhow::anyhow!("LOGINGUARD_ADMIN_PASSWORD environment variable is required")
        })?;

        let defaults = LockoutPolicy::default();
        let lockout = LockoutPolicy {
            max_attempts: parse_positive(&lookup, "LOGINGUARD_MAX_ATTEMPTS", defaults.max_attempts)?,
            block_time: Duration::from_secs(parse_positive(
                &lookup,
                "LOGINGUARD_BLOCK_SECS",
                defaults.block_time.as_secs(),
            )?),
            max_tracked_keys: parse_positive(
                &lookup,
                "LOGINGUARD_MAX_TRACKED_KEYS",
                defaults.max_tracked_keys,
            )?,
        };

        Ok(Config {
            bind_addr: {
                let port = lookup("LOGINGUARD_PORT").unwrap_or_else(|| "8080".to_string());
                lookup("LOGINGUARD_BIND_ADDR").unwrap_or_else(|| format!("0.0.0.0:{}", port))
            },
            admin: AdminConfig {
                email: admin_email,
                password: admin_password,
            },
            lockout,
            sweep_interval: Duration::from_secs(parse_positive(
                &lookup,
                "LOGINGUARD_SWEEP_INTERVAL_SECS",
                60u64,
            )?),
        })
    }
}

fn parse_positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T: FromStr + PartialEq + Default,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value: T = raw
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;
    if value == T::default() {
        anyhow::bail!("{} must be greater than zero", key);
    }
    Ok(value)
}
