#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use layer_proxy::{
    AddressFamily, Checker, ControllerConfig, InMemoryBackend, ProbeError, ProbeHandle,
    ProbeReport, ProbeSink, ProbeTarget, ProxiesController,
};
use tokio::sync::mpsc;

/// Records every probe instead of running it; tests finish probes by hand.
#[derive(Default)]
pub struct FakeChecker {
    started: Mutex<Vec<(ProbeTarget, ProbeSink)>>,
}

impl FakeChecker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Probes started and not yet taken, oldest first.
    pub fn take(&self) -> Vec<(ProbeTarget, ProbeSink)> {
        std::mem::take(&mut *self.started.lock().unwrap())
    }

    /// Take the most recent probe for `family`, dropping the others.
    pub fn take_family(&self, family: AddressFamily) -> ProbeSink {
        self.take()
            .into_iter()
            .rev()
            .find(|(t, _)| t.family == family)
            .map(|(_, s)| s)
            .expect("no probe for family")
    }

    pub fn pending(&self) -> usize {
        self.started.lock().unwrap().len()
    }
}

impl Checker for FakeChecker {
    fn start(&self, target: ProbeTarget, sink: ProbeSink) -> ProbeHandle {
        self.started.lock().unwrap().push((target, sink));
        ProbeHandle::detached()
    }
}

pub struct Harness {
    pub controller: ProxiesController,
    pub reports:    mpsc::UnboundedReceiver<ProbeReport>,
    pub checker:    Arc<FakeChecker>,
    pub backend:    Arc<InMemoryBackend>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_backend(InMemoryBackend::new())
    }

    pub fn with_backend(backend: InMemoryBackend) -> Self {
        let checker = FakeChecker::new();
        let backend = Arc::new(backend);
        let (controller, reports) =
            ProxiesController::new(ControllerConfig::default(), checker.clone(), backend.clone());
        Self { controller, reports, checker, backend }
    }

    /// Feed every queued probe report to the controller.
    pub fn pump(&mut self) {
        while let Ok(report) = self.reports.try_recv() {
            self.controller.handle_report(report);
        }
    }
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

pub fn refused() -> ProbeError {
    ProbeError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
}
