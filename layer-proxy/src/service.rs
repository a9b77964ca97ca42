//! Runs a [`ProxiesController`] on its own tokio task.
//!
//! The task is the controller's single owner. Commands from any number of
//! [`ProxiesHandle`]s, probe reports and the debounce timer are all
//! serialised through one `select!` loop, so the controller never needs a
//! lock.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::checker::{Checker, ItemId, ProbeReport};
use crate::config::{ControllerConfig, ProxyConfig, ProxyMode};
use crate::controller::{ConnectionState, ItemView, ProxiesController, ProxyForm};
use crate::events::{EventStream, EventSubscriber};
use crate::settings::AppSettings;
use crate::settings_backend::SettingsBackend;

/// The service task has stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceClosed;

impl fmt::Display for ServiceClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proxy service has stopped")
    }
}

impl std::error::Error for ServiceClosed {}

enum Command {
    Delete(ItemId),
    Restore(ItemId),
    Apply(ItemId),
    Share(ItemId, oneshot::Sender<Option<String>>),
    EditBox(ItemId, oneshot::Sender<Option<ProxyForm>>),
    AddBox(oneshot::Sender<ProxyForm>),
    Accept(ProxyForm, ProxyConfig, oneshot::Sender<bool>),
    SetMode(ProxyMode, oneshot::Sender<bool>),
    SetForCalls(bool),
    SetTryIpv6(bool),
    SetConnection(ConnectionState),
    CurrentViews(oneshot::Sender<Vec<ItemView>>),
    ModeStream(oneshot::Sender<EventStream<ProxyMode>>),
    Settings(oneshot::Sender<AppSettings>),
    Shutdown(oneshot::Sender<()>),
}

// ─── ProxiesService ───────────────────────────────────────────────────────────

pub struct ProxiesService;

impl ProxiesService {
    /// Build the controller and spawn its task. Must be called inside a
    /// tokio runtime.
    pub fn spawn(
        config:  ControllerConfig,
        checker: Arc<dyn Checker>,
        backend: Arc<dyn SettingsBackend>,
    ) -> (ProxiesHandle, JoinHandle<()>) {
        let (controller, reports) = ProxiesController::new(config, checker, backend);
        let views = controller.view_subscriber();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(controller, rx, reports));
        (ProxiesHandle { tx, views }, task)
    }
}

async fn run(
    mut controller: ProxiesController,
    mut commands:   mpsc::UnboundedReceiver<Command>,
    mut reports:    mpsc::UnboundedReceiver<ProbeReport>,
) {
    tracing::debug!("[proxy] Service started");
    loop {
        let deadline = controller.save_deadline();
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Shutdown(done)) => {
                    controller.flush();
                    let _ = done.send(());
                    break;
                }
                Some(cmd) => execute(&mut controller, cmd),
                None => break,
            },
            Some(report) = reports.recv() => controller.handle_report(report),
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                controller.flush_due(Instant::now());
            }
        }
    }
    controller.flush();
    tracing::debug!("[proxy] Service stopped");
}

fn execute(controller: &mut ProxiesController, cmd: Command) {
    // A dropped reply receiver only means the caller stopped waiting.
    match cmd {
        Command::Delete(id)              => controller.delete_item(id),
        Command::Restore(id)             => controller.restore_item(id),
        Command::Apply(id)               => controller.apply_item(id),
        Command::Share(id, reply)        => { let _ = reply.send(controller.share_item(id)); }
        Command::EditBox(id, reply)      => { let _ = reply.send(controller.edit_item_box(id)); }
        Command::AddBox(reply)           => { let _ = reply.send(controller.add_new_item_box()); }
        Command::Accept(form, cfg, reply) => { let _ = reply.send(controller.accept_form(form, cfg)); }
        Command::SetMode(mode, reply)    => { let _ = reply.send(controller.set_proxy_settings(mode)); }
        Command::SetForCalls(on)         => controller.set_proxy_for_calls(on),
        Command::SetTryIpv6(on)          => controller.set_try_ipv6(on),
        Command::SetConnection(state)    => controller.set_connection_state(state),
        Command::CurrentViews(reply)     => { let _ = reply.send(controller.current_views()); }
        Command::ModeStream(reply)       => { let _ = reply.send(controller.proxy_settings_value()); }
        Command::Settings(reply)         => { let _ = reply.send(controller.settings()); }
        Command::Shutdown(reply)         => { let _ = reply.send(()); }
    }
}

// ─── ProxiesHandle ────────────────────────────────────────────────────────────

/// Cheap, cloneable access to a running [`ProxiesService`].
///
/// Mutating calls are fire-and-forget and apply in call order; calls that
/// return a value wait for the service task.
#[derive(Clone)]
pub struct ProxiesHandle {
    tx:    mpsc::UnboundedSender<Command>,
    views: EventSubscriber<ItemView>,
}

impl ProxiesHandle {
    fn send(&self, cmd: Command) {
        if self.tx.send(cmd).is_err() {
            tracing::debug!("[proxy] Command dropped, service has stopped");
        }
    }

    async fn ask<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, ServiceClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| ServiceClosed)?;
        rx.await.map_err(|_| ServiceClosed)
    }

    /// Every view update fired from now on.
    pub fn views(&self) -> EventStream<ItemView> {
        self.views.events()
    }

    /// The current mode, then every mode update.
    pub async fn proxy_settings_value(&self) -> Result<EventStream<ProxyMode>, ServiceClosed> {
        self.ask(Command::ModeStream).await
    }

    pub async fn current_views(&self) -> Result<Vec<ItemView>, ServiceClosed> {
        self.ask(Command::CurrentViews).await
    }

    pub async fn settings(&self) -> Result<AppSettings, ServiceClosed> {
        self.ask(Command::Settings).await
    }

    pub fn delete_item(&self, id: ItemId) {
        self.send(Command::Delete(id));
    }

    pub fn restore_item(&self, id: ItemId) {
        self.send(Command::Restore(id));
    }

    pub fn apply_item(&self, id: ItemId) {
        self.send(Command::Apply(id));
    }

    pub async fn share_item(&self, id: ItemId) -> Result<Option<String>, ServiceClosed> {
        self.ask(|reply| Command::Share(id, reply)).await
    }

    pub async fn edit_item_box(&self, id: ItemId) -> Result<Option<ProxyForm>, ServiceClosed> {
        self.ask(|reply| Command::EditBox(id, reply)).await
    }

    pub async fn add_new_item_box(&self) -> Result<ProxyForm, ServiceClosed> {
        self.ask(Command::AddBox).await
    }

    pub async fn accept_form(&self, form: ProxyForm, config: ProxyConfig) -> Result<bool, ServiceClosed> {
        self.ask(|reply| Command::Accept(form, config, reply)).await
    }

    pub async fn set_proxy_settings(&self, mode: ProxyMode) -> Result<bool, ServiceClosed> {
        self.ask(|reply| Command::SetMode(mode, reply)).await
    }

    pub fn set_proxy_for_calls(&self, enabled: bool) {
        self.send(Command::SetForCalls(enabled));
    }

    pub fn set_try_ipv6(&self, enabled: bool) {
        self.send(Command::SetTryIpv6(enabled));
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        self.send(Command::SetConnection(state));
    }

    /// Flush any pending settings write and stop the service task.
    pub async fn shutdown(&self) -> Result<(), ServiceClosed> {
        self.ask(Command::Shutdown).await
    }
}
