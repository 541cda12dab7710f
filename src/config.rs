//! Runtime configuration for the helper, resolved once at process start from the environment.

use std::{path::PathBuf, time::Duration};

/// Enables retrust mode when set to exactly `1`.
pub const RETRUST_ENV: &str = "GIT_REMOTE_GEMINI_RETRUST";
/// Overrides the directory holding the trust store.
pub const CONFIG_DIR_ENV: &str = "GIT_REMOTE_GEMINI_CONFIG_DIR";
/// `tracing` filter directive for the helper's stderr log.
pub const LOG_ENV: &str = "GIT_REMOTE_GEMINI_LOG";

pub const TRUST_STORE_FILE: &str = "tofu.db";
pub const GEMINI_DEFAULT_PORT: u16 = 1965;

#[derive(Debug, Clone, PartialEq)]
pub struct HelperConfig {
    pub trust_store_path: PathBuf,
    /// Accept and record unseen certificates even when a host already has trust records.
    pub retrust: bool,
    /// Pin the subject public key instead of the whole certificate.
    pub prefer_public_key: bool,
    pub connect_timeout: Duration,
    /// Upper bound in seconds for the slow-down backoff.
    pub max_backoff: u64,
    /// Maximum number of URLs visited while resolving one request.
    pub max_redirects: usize,
    pub default_port: u16,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            trust_store_path: default_config_dir().join(TRUST_STORE_FILE),
            retrust: false,
            prefer_public_key: cfg!(feature = "x509"),
            connect_timeout: Duration::from_secs(5),
            max_backoff: 1024,
            max_redirects: 5,
            default_port: GEMINI_DEFAULT_PORT,
        }
    }
}

impl HelperConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            retrust: lookup(RETRUST_ENV).as_deref() == Some("1"),
            ..Self::default()
        };
        if let Some(dir) = lookup(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            config.trust_store_path = PathBuf::from(dir).join(TRUST_STORE_FILE);
        }
        config
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("git-remote-gemini"))
        .unwrap_or_else(|| PathBuf::from("."))
}
