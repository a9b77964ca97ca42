//! # layer-proxy
//!
//! Proxy list management for MTProto clients.
//!
//! ## Features
//! - SOCKS5, HTTP and MTProxy candidates with soft delete / restore
//! - Concurrent IPv4 / IPv6 reachability probes with last-probe-wins results
//! - Real probes: `req_pq_multi` ping over obfuscated2 or MTProto-over-HTTP
//! - Debounced, atomic settings persistence (JSON, in-memory, SQLite)
//! - Typed multicast view and mode streams
//! - `tg://` / `t.me` proxy link parsing and sharing
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use layer_proxy::{ControllerConfig, JsonFileBackend, MtprotoChecker, ProxiesService, ProxyMode};
//!
//! let config = ControllerConfig::default();
//! let checker = Arc::new(MtprotoChecker::new(config.probe.timeout));
//! let (proxies, _task) = ProxiesService::spawn(config, checker, Arc::new(JsonFileBackend::default()));
//!
//! let mut views = proxies.views();
//! let form = proxies.add_new_item_box().await?;
//! let socks = layer_proxy::ProxyConfig::socks5("203.0.113.5", 1080);
//! proxies.accept_form(form, socks).await?;
//! if let Some(view) = views.next().await {
//!     println!("{} {}:{} {:?} {} ms", view.type_label, view.host, view.port, view.state, view.ping);
//! }
//! proxies.set_proxy_settings(ProxyMode::Enabled).await?;
//! # Ok(()) }
//! ```

#![deny(unsafe_code)]

mod errors;
pub mod checker;
pub mod config;
pub mod controller;
pub mod events;
pub mod links;
pub mod probe;
pub mod service;
pub mod settings;
pub mod settings_backend;
pub mod socks5;
pub mod transport_http;
pub mod transport_obfuscated;

pub use checker::{
    AddressFamily, Checker, ItemId, ProbeEvent, ProbeHandle, ProbeKey, ProbeOutcome, ProbeReport,
    ProbeSink, ProbeTarget,
};
pub use config::{
    ControllerConfig, MtprotoSecret, ProbeConfig, ProxyConfig, ProxyKind, ProxyMode, ProxyStatus,
};
pub use controller::{ConnectionState, FormTarget, ItemState, ItemView, ProxiesController, ProxyForm};
pub use errors::ProbeError;
pub use events::{EventSource, EventStream, EventSubscriber};
pub use links::{ApplyConfirmation, parse_link, share_link};
pub use probe::MtprotoChecker;
pub use service::{ProxiesHandle, ProxiesService, ServiceClosed};
pub use settings::AppSettings;
pub use settings_backend::{InMemoryBackend, JsonFileBackend, SettingsBackend};

#[cfg(feature = "sqlite-settings")]
pub use settings_backend::SqliteBackend;
