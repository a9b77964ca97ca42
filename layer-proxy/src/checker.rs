//! The probe seam between the controller and the network.
//!
//! The controller never waits on a probe. It hands a [`Checker`] a
//! [`ProbeTarget`] plus a [`ProbeSink`]; the checker reports progress
//! through the sink from whatever task it runs on, and the reports are
//! applied later on the controller's own task.
//!
//! Every report carries the [`ProbeKey`] it was started with, so a report
//! from a superseded probe cycle can be recognised and ignored.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

use crate::ProbeError;
use crate::config::ProxyConfig;

/// Session-local candidate id.
pub type ItemId = u32;

/// IP family a probe exercises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "IPv4"),
            Self::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// What to probe.
#[derive(Clone, Debug)]
pub struct ProbeTarget {
    pub proxy:    ProxyConfig,
    pub family:   AddressFamily,
    /// DC id written into the obfuscated header.
    pub dc_id:    i16,
    /// DC address reached through the proxy; `None` when the proxy itself
    /// speaks MTProto (MTProxy).
    pub endpoint: Option<SocketAddr>,
}

/// Identifies one probe: candidate, cycle and family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProbeKey {
    pub item:       ItemId,
    pub generation: u64,
    pub family:     AddressFamily,
}

#[derive(Debug)]
pub enum ProbeOutcome {
    Success { ping: Duration },
    Failure(ProbeError),
}

#[derive(Debug)]
pub enum ProbeEvent {
    /// The transport to the proxy is up; the ping is in flight.
    Connected,
    Finished(ProbeOutcome),
}

#[derive(Debug)]
pub struct ProbeReport {
    pub key:   ProbeKey,
    pub event: ProbeEvent,
}

// ─── ProbeSink ────────────────────────────────────────────────────────────────

/// Where a running probe reports to. Finishing consumes the sink, so a
/// probe reports at most one outcome.
#[derive(Debug)]
pub struct ProbeSink {
    key: ProbeKey,
    tx:  mpsc::UnboundedSender<ProbeReport>,
}

impl ProbeSink {
    pub fn new(key: ProbeKey, tx: mpsc::UnboundedSender<ProbeReport>) -> Self {
        Self { key, tx }
    }

    pub fn key(&self) -> ProbeKey {
        self.key
    }

    pub fn connected(&self) {
        self.send(ProbeEvent::Connected);
    }

    pub fn finish(self, outcome: ProbeOutcome) {
        self.send(ProbeEvent::Finished(outcome));
    }

    pub fn succeed(self, ping: Duration) {
        self.finish(ProbeOutcome::Success { ping });
    }

    pub fn fail(self, error: ProbeError) {
        self.finish(ProbeOutcome::Failure(error));
    }

    fn send(&self, event: ProbeEvent) {
        // The controller is gone; nobody cares about this probe any more.
        let _ = self.tx.send(ProbeReport { key: self.key, event });
    }
}

// ─── ProbeHandle ──────────────────────────────────────────────────────────────

/// Keeps a probe alive. Dropping the handle cancels the probe.
#[derive(Debug, Default)]
pub struct ProbeHandle {
    abort: Option<AbortHandle>,
}

impl ProbeHandle {
    /// A handle for a probe running on a tokio task.
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { abort: Some(task.abort_handle()) }
    }

    /// A handle with nothing to cancel.
    pub fn detached() -> Self {
        Self { abort: None }
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }
}

// ─── Checker ──────────────────────────────────────────────────────────────────

/// Starts reachability probes.
///
/// `start` must return immediately; the probe runs in the background and
/// reports through `sink`.
pub trait Checker: Send + Sync {
    fn start(&self, target: ProbeTarget, sink: ProbeSink) -> ProbeHandle;
}
