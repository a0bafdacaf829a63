use std::path::PathBuf;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeProfile {
    #[default]
    Development,
    Production,
}

impl RuntimeProfile {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Some(Self::Development),
            "prod" | "production" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub runtime_profile: RuntimeProfile,
    /// Native builds forward EIP-1193 requests here as JSON-RPC 2.0 POSTs.
    pub eip1193_proxy_url: Option<String>,
    /// Bounds only establishing the proxy connection. Requests themselves
    /// wait as long as the wallet prompt stays open.
    pub proxy_connect_timeout_ms: u64,
    pub networks_file: Option<PathBuf>,
    pub default_network: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            eip1193_proxy_url: None,
            proxy_connect_timeout_ms: 10_000,
            networks_file: None,
            default_network: None,
        }
    }
}

impl WalletConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(raw) = env_var("SAFESEND_RUNTIME_PROFILE") {
            match RuntimeProfile::parse(&raw) {
                Some(profile) => config.runtime_profile = profile,
                None => warn!(value = %raw, "ignoring unknown SAFESEND_RUNTIME_PROFILE"),
            }
        }
        config.eip1193_proxy_url = env_var("SAFESEND_EIP1193_PROXY_URL");
        if let Some(raw) = env_var("SAFESEND_PROXY_CONNECT_TIMEOUT_MS") {
            match raw.parse() {
                Ok(ms) => config.proxy_connect_timeout_ms = ms,
                Err(e) => warn!(
                    value = %raw,
                    error = %e,
                    "ignoring invalid SAFESEND_PROXY_CONNECT_TIMEOUT_MS"
                ),
            }
        }
        config.networks_file = env_var("SAFESEND_NETWORKS_FILE").map(PathBuf::from);
        config.default_network = env_var("SAFESEND_DEFAULT_NETWORK");
        config
    }

    /// Production never falls back to the in-memory wallet.
    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }
}

fn env_var(key: &str) -> Option<String> {
    #[cfg(target_arch = "wasm32")]
    {
        let _ = key;
        None
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}
