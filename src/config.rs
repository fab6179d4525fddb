//! Runtime configuration
//!
//! Both configs have sensible defaults and can be tuned from the
//! environment without recompiling:
//! ```bash
//! AMPERE_NUM_THREADS=4 cargo bench --bench matmul
//! AMPERE_GPU_SYNC_TIMEOUT=10 AMPERE_GPU_FALLBACK=1 cargo test --features gpu
//! ```

use crate::error::{AmpereError, Result};
use log::warn;
use std::time::Duration;

/// Default wait for a device readback before giving up
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 5;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring invalid {key}={raw:?}");
            None
        }
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Host engine settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Matmul worker count; `None` uses every available core
    pub worker_threads: Option<usize>,
}

impl EngineConfig {
    /// Read `AMPERE_NUM_THREADS`; unset, zero or unparsable values keep the default
    #[must_use]
    pub fn from_env() -> Self {
        let worker_threads = env_parse::<usize>("AMPERE_NUM_THREADS").filter(|&n| {
            if n == 0 {
                warn!("ignoring AMPERE_NUM_THREADS=0");
            }
            n > 0
        });
        EngineConfig { worker_threads }
    }

    #[must_use]
    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = Some(n);
        self
    }

    /// Effective worker count
    ///
    /// # Errors
    /// `InvalidConfig` for an explicit zero
    pub fn resolved_threads(&self) -> Result<usize> {
        match self.worker_threads {
            Some(0) => Err(AmpereError::InvalidConfig(
                "worker_threads must be at least 1".to_string(),
            )),
            Some(n) => Ok(n),
            None => Ok(std::thread::available_parallelism().map_or(1, |n| n.get())),
        }
    }
}

/// Adapter preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PowerPreference {
    LowPower,
    #[default]
    HighPerformance,
}

/// GPU backend settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub power_preference: PowerPreference,
    /// Accept a software adapter when no hardware adapter exists
    pub force_fallback_adapter: bool,
    /// Upper bound on a blocking device poll
    pub sync_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            power_preference: PowerPreference::default(),
            force_fallback_adapter: false,
            sync_timeout: Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS),
        }
    }
}

impl DeviceConfig {
    /// Read `AMPERE_GPU_SYNC_TIMEOUT` (seconds) and `AMPERE_GPU_FALLBACK`
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        DeviceConfig {
            power_preference: defaults.power_preference,
            force_fallback_adapter: env_flag("AMPERE_GPU_FALLBACK"),
            sync_timeout: env_parse::<u64>("AMPERE_GPU_SYNC_TIMEOUT")
                .map_or(defaults.sync_timeout, Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch the process environment
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Run `f` with `vars` set (`None` unsets), restoring the old values after
    fn with_env<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let saved: Vec<_> = vars.iter().map(|&(k, _)| (k, std::env::var(k).ok())).collect();
        let apply = |key: &str, value: Option<&str>| {
            // SAFETY: every env mutation in this crate's tests holds ENV_LOCK
            unsafe {
                match value {
                    Some(v) => std::env::set_var(key, v),
                    None => std::env::remove_var(key),
                }
            }
        };
        for &(key, value) in vars {
            apply(key, value);
        }
        let out = f();
        for (key, value) in &saved {
            apply(key, value.as_deref());
        }
        out
    }

    #[test]
    fn test_engine_defaults() {
        let cfg = EngineConfig::default();
        assert!(cfg.resolved_threads().unwrap() >= 1);
        assert_eq!(cfg.with_worker_threads(3).resolved_threads(), Ok(3));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let cfg = EngineConfig {
            worker_threads: Some(0),
        };
        assert!(matches!(
            cfg.resolved_threads(),
            Err(AmpereError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_device_defaults() {
        let cfg = DeviceConfig::default();
        assert_eq!(cfg.sync_timeout, Duration::from_secs(5));
        assert!(!cfg.force_fallback_adapter);
        assert_eq!(cfg.power_preference, PowerPreference::HighPerformance);
    }

    #[test]
    fn test_engine_from_env() {
        let read = |value: Option<&str>| {
            with_env(&[("AMPERE_NUM_THREADS", value)], || EngineConfig::from_env().worker_threads)
        };
        assert_eq!(read(Some("3")), Some(3));
        assert_eq!(read(Some(" 2 ")), Some(2));
        assert_eq!(read(Some("0")), None);
        assert_eq!(read(Some("many")), None);
        assert_eq!(read(Some("-4")), None);
        assert_eq!(read(None), None);

        let host = with_env(&[("AMPERE_NUM_THREADS", Some("2"))], crate::HostBackend::from_env);
        assert_eq!(host.unwrap().threads(), 2);
    }

    #[test]
    fn test_device_from_env() {
        let read = |timeout: Option<&str>, fallback: Option<&str>| {
            with_env(
                &[
                    ("AMPERE_GPU_SYNC_TIMEOUT", timeout),
                    ("AMPERE_GPU_FALLBACK", fallback),
                ],
                DeviceConfig::from_env,
            )
        };

        let cfg = read(Some("12"), Some("1"));
        assert_eq!(cfg.sync_timeout, Duration::from_secs(12));
        assert!(cfg.force_fallback_adapter);
        assert_eq!(cfg.power_preference, PowerPreference::HighPerformance);

        let cfg = read(Some("soon"), Some("no"));
        assert_eq!(cfg, DeviceConfig::default());

        assert!(read(None, Some("true")).force_fallback_adapter);
        assert_eq!(read(None, None), DeviceConfig::default());
    }
}
