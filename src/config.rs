//! Runtime configuration
//!
//! Read from `CHAT_HUB_*` environment variables, with defaults for
//! everything.

use std::time::Duration;

use crate::error::AppError;
use crate::hub::DEFAULT_CALL_TIMEOUT;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Default capacity of the hub event channel
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Default capacity of each client's outbound queue
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 20;

/// Hub and listener settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Listen address
    pub addr: String,
    /// Hub event channel capacity
    pub event_buffer: usize,
    /// Per-client outbound queue capacity
    pub outbound_capacity: usize,
    /// Deadline for friendship / message store calls
    pub call_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            addr: lookup("CHAT_HUB_ADDR").unwrap_or(defaults.addr),
            event_buffer: positive(&lookup, "CHAT_HUB_EVENT_BUFFER")?
                .unwrap_or(defaults.event_buffer as u64) as usize,
            outbound_capacity: positive(&lookup, "CHAT_HUB_OUTBOUND_CAPACITY")?
                .unwrap_or(defaults.outbound_capacity as u64)
                as usize,
            call_timeout: positive(&lookup, "CHAT_HUB_CALL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.call_timeout),
        })
    }
}

/// Parse an optional strictly positive integer variable
fn positive<F>(lookup: &F, key: &str) -> Result<Option<u64>, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };

    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(AppError::Config(format!(
            "{} must be a positive integer, got '{}'",
            key, raw
        ))),
    }
}
