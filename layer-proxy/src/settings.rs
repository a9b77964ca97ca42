//! Persisted proxy settings.

use serde::{Deserialize, Serialize};

use crate::config::{ProxyConfig, ProxyMode};

/// Everything the controller persists: the candidate list, the selected
/// proxy and the toggles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Non-deleted candidates in list order.
    pub proxies:             Vec<ProxyConfig>,
    /// `None` means "no proxy".
    pub selected:            Option<ProxyConfig>,
    pub mode:                ProxyMode,
    pub use_proxy_for_calls: bool,
    pub try_ipv6:            bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            proxies:             Vec::new(),
            selected:            None,
            mode:                ProxyMode::System,
            use_proxy_for_calls: false,
            try_ipv6:            !cfg!(windows),
        }
    }
}

impl AppSettings {
    /// The selected proxy, when traffic is routed through it.
    pub fn proxy_in_use(&self) -> Option<&ProxyConfig> {
        match self.mode {
            ProxyMode::Enabled => self.selected.as_ref(),
            _ => None,
        }
    }
}
