//! The proxy list controller.
//!
//! [`ProxiesController`] owns the candidate list, the selection and the
//! toggles. It is a plain `&mut self` state machine: commands mutate it
//! directly, probe reports are fed back through [`ProxiesController::handle_report`],
//! and the debounced settings write is driven by whoever owns it through
//! [`ProxiesController::save_deadline`] / [`ProxiesController::flush_due`].
//! [`crate::ProxiesService`] wires all three onto one tokio task.

use std::mem;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::checker::{
    AddressFamily, Checker, ItemId, ProbeEvent, ProbeHandle, ProbeKey, ProbeOutcome, ProbeReport,
    ProbeSink, ProbeTarget,
};
use crate::config::{ControllerConfig, ProxyConfig, ProxyKind, ProxyMode};
use crate::events::{EventSource, EventStream, EventSubscriber};
use crate::links;
use crate::settings::AppSettings;
use crate::settings_backend::SettingsBackend;

// ─── Public types ─────────────────────────────────────────────────────────────

/// Probe state of one candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemState {
    /// A probe cycle started; no transport is up yet.
    Connecting,
    /// The in-use candidate while the application connection is healthy.
    Online,
    /// Transport to the proxy is up, the ping is in flight.
    Checking,
    Available,
    Unavailable,
}

/// Health of the application's own connection, reported by the network layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
}

/// Read-only row for the proxy list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemView {
    pub id:             ItemId,
    pub kind:           ProxyKind,
    /// "HTTP", "SOCKS5" or "MTPROTO".
    pub type_label:     &'static str,
    pub host:           String,
    pub port:           u16,
    /// Last successful ping in milliseconds; stale until overwritten.
    pub ping:           u32,
    pub selected:       bool,
    pub deleted:        bool,
    pub supports_share: bool,
    pub supports_calls: bool,
    pub state:          ItemState,
    /// Set only on the event announcing that a merged-away entry left the list.
    pub removed:        bool,
}

/// What an edit / add form is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormTarget {
    Edit(ItemId),
    Add,
}

/// Description of a proxy form for the UI to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyForm {
    pub target:  FormTarget,
    pub initial: ProxyConfig,
}

// ─── Item ─────────────────────────────────────────────────────────────────────

struct Item {
    id:         ItemId,
    config:     ProxyConfig,
    deleted:    bool,
    checker:    Option<ProbeHandle>,
    checker_v6: Option<ProbeHandle>,
    state:      ItemState,
    ping:       u32,
    /// Bumped on every probe cycle; reports from older cycles are ignored.
    generation: u64,
    checked_at: Option<Instant>,
}

impl Item {
    fn new(id: ItemId, config: ProxyConfig) -> Self {
        Self {
            id,
            config,
            deleted:    false,
            checker:    None,
            checker_v6: None,
            state:      ItemState::Connecting,
            ping:       0,
            generation: 0,
            checked_at: None,
        }
    }

    fn slot(&mut self, family: AddressFamily) -> &mut Option<ProbeHandle> {
        match family {
            AddressFamily::Ipv4 => &mut self.checker,
            AddressFamily::Ipv6 => &mut self.checker_v6,
        }
    }

    fn stop_checkers(&mut self) {
        self.checker    = None;
        self.checker_v6 = None;
    }

    fn is_checking(&self) -> bool {
        matches!(self.state, ItemState::Connecting | ItemState::Checking)
    }
}

// ─── ProxiesController ────────────────────────────────────────────────────────

/// Single authority for the proxy list and the selected proxy.
pub struct ProxiesController {
    config:             ControllerConfig,
    checker:            Arc<dyn Checker>,
    reports:            mpsc::UnboundedSender<ProbeReport>,
    backend:            Arc<dyn SettingsBackend>,
    /// Selection and toggles; `proxies` is kept empty, the list is authoritative.
    settings:           AppSettings,
    list:               Vec<Item>,
    last_id:            ItemId,
    /// Selection removed by the last delete, for restore.
    last_selected:      Option<ProxyConfig>,
    last_selected_used: bool,
    connection:         ConnectionState,
    views:              EventSource<ItemView>,
    modes:              EventSource<ProxyMode>,
    save_deadline:      Option<Instant>,
}

impl ProxiesController {
    /// Load settings from `backend` and start probing every candidate.
    ///
    /// Probe reports arrive on the returned receiver and must be passed to
    /// [`handle_report`](Self::handle_report).
    pub fn new(
        config:  ControllerConfig,
        checker: Arc<dyn Checker>,
        backend: Arc<dyn SettingsBackend>,
    ) -> (Self, mpsc::UnboundedReceiver<ProbeReport>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut settings = match backend.load() {
            Ok(Some(s)) => {
                tracing::info!("[proxy] Loaded {} proxies from {}", s.proxies.len(), backend.name());
                s
            }
            Ok(None) => {
                tracing::info!("[proxy] No saved proxies in {}", backend.name());
                AppSettings::default()
            }
            Err(e) => {
                tracing::warn!("[proxy] Could not load settings from {}: {e}", backend.name());
                AppSettings::default()
            }
        };

        let mut proxies = mem::take(&mut settings.proxies);
        if settings.selected.as_ref().is_some_and(|s| !s.is_some()) {
            settings.selected = None;
        }
        if settings.mode == ProxyMode::Enabled && settings.selected.is_none() {
            tracing::warn!("[proxy] Saved mode is enabled without a selected proxy, using system");
            settings.mode = ProxyMode::System;
        }
        if let Some(selected) = &settings.selected {
            if !proxies.contains(selected) {
                proxies.push(selected.clone());
            }
        }

        let mut this = Self {
            config,
            checker,
            reports:            tx,
            backend,
            settings,
            list:               Vec::new(),
            last_id:            0,
            last_selected:      None,
            last_selected_used: false,
            connection:         ConnectionState::default(),
            views:              EventSource::new(),
            modes:              EventSource::new(),
            save_deadline:      None,
        };

        for proxy in proxies {
            if !proxy.is_some() || this.index_of_config(&proxy).is_some() {
                continue;
            }
            this.last_id += 1;
            this.list.push(Item::new(this.last_id, proxy));
            let index = this.list.len() - 1;
            this.refresh_checker(index);
        }
        (this, rx)
    }

    // ── Streams & snapshots ──────────────────────────────────────────────────

    /// Every view update fired from now on.
    pub fn views(&self) -> EventStream<ItemView> {
        self.views.events()
    }

    /// Current rows, in list order.
    pub fn current_views(&self) -> Vec<ItemView> {
        self.list.iter().map(|item| self.view_of(item, false)).collect()
    }

    pub fn view(&self, id: ItemId) -> Option<ItemView> {
        self.index_of(id).map(|i| self.view_of(&self.list[i], false))
    }

    /// The current mode, then every mode update.
    pub fn proxy_settings_value(&self) -> EventStream<ProxyMode> {
        self.modes.events_starting_with(self.settings.mode)
    }

    pub fn view_subscriber(&self) -> EventSubscriber<ItemView> {
        self.views.subscriber()
    }

    pub fn mode_subscriber(&self) -> EventSubscriber<ProxyMode> {
        self.modes.subscriber()
    }

    pub fn mode(&self) -> ProxyMode {
        self.settings.mode
    }

    /// What a write right now would persist.
    pub fn settings(&self) -> AppSettings {
        AppSettings {
            proxies: self.list.iter().filter(|i| !i.deleted).map(|i| i.config.clone()).collect(),
            ..self.settings.clone()
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    pub fn delete_item(&mut self, id: ItemId) {
        let Some(index) = self.index_of(id) else { return };
        let item = &mut self.list[index];
        if item.deleted {
            return;
        }
        item.deleted = true;
        item.stop_checkers();
        tracing::debug!("[proxy] Deleted {} ({})", id, item.config);

        if self.settings.selected.as_ref() == Some(&self.list[index].config) {
            self.last_selected = self.settings.selected.take();
            if self.settings.mode == ProxyMode::Enabled {
                self.last_selected_used = true;
                self.settings.mode = ProxyMode::System;
            } else {
                self.last_selected_used = false;
            }
            self.modes.fire(self.settings.mode);
        }
        self.save_delayed();
        self.emit(index);
    }

    pub fn restore_item(&mut self, id: ItemId) {
        let Some(index) = self.index_of(id) else { return };
        if !self.list[index].deleted {
            return;
        }
        self.list[index].deleted = false;
        self.refresh_checker(index);
        tracing::debug!("[proxy] Restored {id}");

        let config = &self.list[index].config;
        if self.settings.selected.is_none() && self.last_selected.as_ref() == Some(config) {
            self.settings.selected = self.last_selected.take();
            if mem::take(&mut self.last_selected_used) {
                self.settings.mode = ProxyMode::Enabled;
                self.modes.fire(ProxyMode::Enabled);
            }
        }
        self.save_delayed();
        self.emit(index);
    }

    /// A share link for the candidate, if its type can be shared.
    pub fn share_item(&self, id: ItemId) -> Option<String> {
        let item = &self.list[self.index_of(id)?];
        links::share_link(&item.config)
    }

    /// Route traffic through candidate `id`.
    pub fn apply_item(&mut self, id: ItemId) {
        let Some(index) = self.index_of(id) else { return };
        if self.list[index].deleted {
            return;
        }
        let config = self.list[index].config.clone();
        if self.settings.mode == ProxyMode::Enabled && self.settings.selected.as_ref() == Some(&config) {
            return;
        }
        let previous = self
            .settings
            .selected
            .as_ref()
            .and_then(|s| self.index_of_config(s))
            .filter(|&p| p != index);

        tracing::info!("[proxy] Using {config}");
        self.settings.selected = Some(config);
        self.settings.mode = ProxyMode::Enabled;
        self.modes.fire(ProxyMode::Enabled);
        self.save_delayed();
        if let Some(previous) = previous {
            self.emit(previous);
        }
        self.emit(index);
    }

    pub fn edit_item_box(&self, id: ItemId) -> Option<ProxyForm> {
        let item = &self.list[self.index_of(id)?];
        Some(ProxyForm { target: FormTarget::Edit(id), initial: item.config.clone() })
    }

    pub fn add_new_item_box(&self) -> ProxyForm {
        ProxyForm {
            target:  FormTarget::Add,
            initial: ProxyConfig { kind: ProxyKind::Socks5, ..Default::default() },
        }
    }

    /// Accept a submitted form. Returns `false` when `config` is rejected.
    pub fn accept_form(&mut self, form: ProxyForm, config: ProxyConfig) -> bool {
        if !config.is_valid() {
            tracing::debug!("[proxy] Rejected {config}: {:?}", config.status());
            return false;
        }
        match form.target {
            FormTarget::Edit(id) => self.accept_edit(id, config),
            FormTarget::Add      => self.accept_add(config),
        }
    }

    /// Set the mode. Returns `false` when `Enabled` is requested with
    /// nothing to enable.
    pub fn set_proxy_settings(&mut self, mode: ProxyMode) -> bool {
        if self.settings.mode == mode {
            return true;
        }
        if mode == ProxyMode::Enabled {
            let Some(last) = self.list.iter().rposition(|i| !i.deleted) else {
                return false;
            };
            let selected_alive = self
                .settings
                .selected
                .as_ref()
                .and_then(|s| self.index_of_config(s))
                .is_some_and(|i| !self.list[i].deleted);
            if !selected_alive {
                self.settings.selected = Some(self.list[last].config.clone());
            }
        }
        tracing::info!("[proxy] Mode {} → {mode}", self.settings.mode);
        self.settings.mode = mode;
        self.modes.fire(mode);
        self.save_delayed();
        if let Some(index) = self.selected_index() {
            self.emit(index);
        }
        true
    }

    pub fn set_proxy_for_calls(&mut self, enabled: bool) {
        if self.settings.use_proxy_for_calls == enabled {
            return;
        }
        self.settings.use_proxy_for_calls = enabled;
        self.save_delayed();
        if self.settings.selected.as_ref().is_some_and(ProxyConfig::supports_calls) {
            self.modes.fire(self.settings.mode);
        }
    }

    pub fn set_try_ipv6(&mut self, enabled: bool) {
        if self.settings.try_ipv6 == enabled {
            return;
        }
        self.settings.try_ipv6 = enabled;
        self.save_delayed();
        self.modes.fire(self.settings.mode);

        if enabled {
            let now = Instant::now();
            let fresh_for = self.config.ipv6_refresh_after;
            for index in 0..self.list.len() {
                let item = &self.list[index];
                if item.deleted || item.config.kind == ProxyKind::Mtproto {
                    continue;
                }
                let fresh = item.state == ItemState::Available
                    && item.checked_at.is_some_and(|at| now.duration_since(at) < fresh_for);
                if !fresh {
                    self.refresh_checker(index);
                    self.emit(index);
                }
            }
        } else {
            for index in 0..self.list.len() {
                let item = &mut self.list[index];
                if item.checker_v6.take().is_none() {
                    continue;
                }
                if item.checker.is_none() && item.is_checking() {
                    item.state = ItemState::Unavailable;
                    self.emit(index);
                }
            }
        }
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        if self.connection == state {
            return;
        }
        self.connection = state;
        if let Some(index) = self.in_use_index() {
            self.emit(index);
        }
    }

    // ── Probe reports ────────────────────────────────────────────────────────

    /// Apply one probe report. Reports from released checkers or
    /// superseded cycles are ignored.
    pub fn handle_report(&mut self, report: ProbeReport) {
        let ProbeReport { key, event } = report;
        let Some(index) = self.index_of(key.item) else { return };
        let item = &mut self.list[index];
        if item.deleted || item.generation != key.generation || item.slot(key.family).is_none() {
            tracing::trace!("[proxy] Stale report for {} ({:?})", key.item, key.family);
            return;
        }

        match event {
            ProbeEvent::Connected => {
                if item.state != ItemState::Connecting {
                    return;
                }
                item.state = ItemState::Checking;
            }
            ProbeEvent::Finished(ProbeOutcome::Success { ping }) => {
                item.stop_checkers();
                if !item.is_checking() {
                    return;
                }
                item.state      = ItemState::Available;
                item.ping       = u32::try_from(ping.as_millis()).unwrap_or(u32::MAX);
                item.checked_at = Some(Instant::now());
            }
            ProbeEvent::Finished(ProbeOutcome::Failure(e)) => {
                tracing::debug!("[proxy] {} {} failed: {e}", item.config, key.family);
                *item.slot(key.family) = None;
                if item.checker.is_some() || item.checker_v6.is_some() || !item.is_checking() {
                    return;
                }
                item.state = ItemState::Unavailable;
            }
        }
        self.emit(index);
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    /// When the pending settings write is due, if one is pending.
    pub fn save_deadline(&self) -> Option<Instant> {
        self.save_deadline
    }

    /// Write the settings if the pending write is due at `now`.
    pub fn flush_due(&mut self, now: Instant) -> bool {
        match self.save_deadline {
            Some(deadline) if deadline <= now => {
                self.flush();
                true
            }
            _ => false,
        }
    }

    /// Write the settings now if a write is pending.
    pub fn flush(&mut self) {
        if self.save_deadline.take().is_none() {
            return;
        }
        let settings = self.settings();
        match self.backend.save(&settings) {
            Ok(()) => tracing::debug!(
                "[proxy] Saved {} proxies to {}", settings.proxies.len(), self.backend.name()
            ),
            Err(e) => tracing::warn!("[proxy] Could not save settings to {}: {e}", self.backend.name()),
        }
    }

    fn save_delayed(&mut self) {
        self.save_deadline = Some(Instant::now() + self.config.save_delay);
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn accept_edit(&mut self, id: ItemId, config: ProxyConfig) -> bool {
        let Some(index) = self.index_of(id) else { return false };

        if let Some(existing) = self.list.iter().find(|i| i.config == config && i.id != id).map(|i| i.id) {
            tracing::debug!("[proxy] Edit of {id} duplicates {existing}, merging");
            let gone = self.view_of(&self.list[index], true);
            self.list.remove(index);
            self.views.fire(gone);
            self.restore_item(existing);
            self.apply_item(existing);
            self.save_delayed();
            return true;
        }

        let item = &mut self.list[index];
        item.deleted = false;
        let old = mem::replace(&mut item.config, config.clone());
        if self.settings.selected.as_ref() == Some(&old) {
            self.settings.selected = Some(config.clone());
            if self.settings.mode == ProxyMode::Enabled {
                self.modes.fire(ProxyMode::Enabled);
            }
        }
        if self.last_selected.as_ref() == Some(&old) {
            self.last_selected = Some(config);
        }
        self.refresh_checker(index);
        self.save_delayed();
        self.emit(index);
        true
    }

    fn accept_add(&mut self, config: ProxyConfig) -> bool {
        if let Some(existing) = self.index_of_config(&config).map(|i| self.list[i].id) {
            self.restore_item(existing);
            self.apply_item(existing);
            return true;
        }
        self.last_id += 1;
        tracing::debug!("[proxy] Added {} ({config})", self.last_id);
        self.list.push(Item::new(self.last_id, config));
        let index = self.list.len() - 1;
        self.refresh_checker(index);
        self.save_delayed();
        self.emit(index);
        true
    }

    /// Cancel the running probe cycle of `list[index]` and start a new one.
    fn refresh_checker(&mut self, index: usize) {
        let item = &mut self.list[index];
        item.stop_checkers();
        item.generation += 1;
        item.state = ItemState::Connecting;
        let (id, generation, proxy) = (item.id, item.generation, item.config.clone());

        let probe = &self.config.probe;
        let target = |family, endpoint| ProbeTarget {
            proxy: proxy.clone(),
            family,
            dc_id: probe.dc_id,
            endpoint,
        };
        let (v4, v6) = if proxy.kind == ProxyKind::Mtproto {
            (Some(target(AddressFamily::Ipv4, None)), None)
        } else {
            let v4 = probe
                .endpoint(AddressFamily::Ipv4, proxy.kind)
                .map(|e| target(AddressFamily::Ipv4, Some(e)));
            let v6 = probe
                .endpoint(AddressFamily::Ipv6, proxy.kind)
                .filter(|_| self.settings.try_ipv6)
                .map(|e| target(AddressFamily::Ipv6, Some(e)));
            (v4, v6)
        };

        let start = |target: ProbeTarget| {
            let key = ProbeKey { item: id, generation, family: target.family };
            self.checker.start(target, ProbeSink::new(key, self.reports.clone()))
        };
        let checker    = v4.map(&start);
        let checker_v6 = v6.map(&start);

        let item = &mut self.list[index];
        if checker.is_none() && checker_v6.is_none() {
            item.state = ItemState::Unavailable;
        }
        item.checker    = checker;
        item.checker_v6 = checker_v6;
    }

    fn index_of(&self, id: ItemId) -> Option<usize> {
        self.list.iter().position(|i| i.id == id)
    }

    fn index_of_config(&self, config: &ProxyConfig) -> Option<usize> {
        self.list.iter().position(|i| &i.config == config)
    }

    fn selected_index(&self) -> Option<usize> {
        self.settings.selected.as_ref().and_then(|s| self.index_of_config(s))
    }

    fn in_use_index(&self) -> Option<usize> {
        match self.settings.mode {
            ProxyMode::Enabled => self.selected_index(),
            _ => None,
        }
    }

    fn view_of(&self, item: &Item, removed: bool) -> ItemView {
        let selected = !item.deleted && self.settings.selected.as_ref() == Some(&item.config);
        let in_use = selected && self.settings.mode == ProxyMode::Enabled;
        let state = match (in_use, self.connection) {
            (true, ConnectionState::Connected)  => ItemState::Online,
            (true, ConnectionState::Connecting) => ItemState::Connecting,
            (false, _)                          => item.state,
        };
        ItemView {
            id:             item.id,
            kind:           item.config.kind,
            type_label:     item.config.kind.label(),
            host:           item.config.host.clone(),
            port:           item.config.port,
            ping:           item.ping,
            selected,
            deleted:        item.deleted,
            supports_share: item.config.supports_share(),
            supports_calls: !item.deleted && item.config.supports_calls(),
            state,
            removed,
        }
    }

    fn emit(&self, index: usize) {
        self.views.fire(self.view_of(&self.list[index], false));
    }
}

impl Drop for ProxiesController {
    fn drop(&mut self) {
        self.flush();
    }
}
