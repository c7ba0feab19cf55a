//! # Daemon: wires processes, migration and scheduling together.
//!
//! ```text
//! Daemon::run()
//!   ├─► settings (defaults when absent)
//!   ├─► active version is 0.0.0? → one migration without processes
//!   ├─► overlay for the active version (yields server-port)
//!   ├─► start server; start proxy if enabled
//!   ├─► UpdateScheduler::run() ◄── cancelled by SIGINT / SIGTERM / SIGQUIT
//!   └─► stop proxy, stop server, drain subscribers
//! ```
//!
//! Every component publishes to one [`Bus`]; a listener task forwards events to
//! the [`SubscriberSet`].

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Layout};
use crate::core::builder::DaemonBuilder;
use crate::core::shutdown::wait_for_shutdown_signal;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::migration::{
    MigrationOrchestrator, MigrationOutcome, OverlayApplier, Upgrader, WebhookNotifier,
};
use crate::process::{Launch, ProcessPolicy, ProxyLaunch, ServerLaunch, SupervisedProcess};
use crate::scheduler::UpdateScheduler;
use crate::settings::Settings;
use crate::subscribers::SubscriberSet;

/// Port the proxy forwards to when the overlay does not set `server-port`.
pub const DEFAULT_SERVER_PORT: u16 = 25565;

/// The server keeper runtime.
pub struct Daemon {
    cfg: Config,
    layout: Layout,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    listener: JoinHandle<()>,
    listener_stop: CancellationToken,
}

impl Daemon {
    pub fn builder(layout: Layout) -> DaemonBuilder {
        DaemonBuilder::new(layout)
    }

    pub(crate) fn new_internal(cfg: Config, layout: Layout, bus: Bus, subs: SubscriberSet) -> Self {
        let subs = Arc::new(subs);
        let listener_stop = CancellationToken::new();
        let listener = Self::subscriber_listener(&bus, Arc::clone(&subs), listener_stop.clone());
        Self {
            cfg,
            layout,
            bus,
            subs,
            listener,
            listener_stop,
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Forwards bus events to the subscriber set.
    ///
    /// Once `stop` fires, whatever is already queued on the bus is forwarded before exit.
    fn subscriber_listener(
        bus: &Bus,
        set: Arc<SubscriberSet>,
        stop: CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "event listener lagged");
                        }
                        Err(RecvError::Closed) => return,
                    },
                    _ = stop.cancelled() => break,
                }
            }
            drain(&mut rx, &set);
        })
    }

    /// Runs a single migration with no supervised processes, then shuts down.
    pub async fn upgrade_once(self) -> Result<MigrationOutcome, RuntimeError> {
        let settings = Settings::load_or_default(&self.layout.settings_file())?;
        let orchestrator = self.orchestrator(&settings);
        let res = orchestrator
            .migrate(None, None, &CancellationToken::new())
            .await;
        self.finish().await;
        Ok(res?)
    }

    /// Runs until an OS termination signal arrives.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            let bus = self.bus.clone();
            tokio::spawn(async move {
                let res = wait_for_shutdown_signal().await;
                if let Ok(signal) = &res {
                    bus.publish(Event::new(EventKind::ShutdownRequested).with_reason(*signal));
                }
                cancel.cancel();
                res.map(|_| ())
            })
        };

        let res = self.run_until(cancel).await;
        let signal = if watcher.is_finished() {
            watcher.await.ok()
        } else {
            watcher.abort();
            None
        };
        res?;
        match signal {
            Some(Err(e)) => Err(RuntimeError::Signal(e)),
            _ => Ok(()),
        }
    }

    /// Bootstraps the processes and runs the scheduler until `cancel` fires.
    pub async fn run_until(self, cancel: CancellationToken) -> Result<(), RuntimeError> {
        let settings = Settings::load_or_default(&self.layout.settings_file())?;
        let orchestrator = self.orchestrator(&settings);

        if orchestrator.store().current_version()?.is_sentinel() {
            // failures are published as MigrationAborted; startup continues
            if let Err(e) = orchestrator.migrate(None, None, &cancel).await {
                tracing::warn!(error = %e, label = e.as_label(), "initial migration failed");
            }
        }

        let version = orchestrator.store().current_version()?;
        let report = OverlayApplier::from_layout(&self.layout).apply(version)?;
        let server_port = report
            .get("server-port")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_SERVER_PORT);

        let policy = ProcessPolicy::from(&self.cfg);
        let server_launch: Arc<dyn Launch> =
            Arc::new(ServerLaunch::from_settings(&settings, &self.layout));
        let mut server = SupervisedProcess::new(server_launch, policy, self.bus.clone());
        server.start();

        let proxy = settings.proxy_enabled.then(|| {
            let launch: Arc<dyn Launch> = Arc::new(ProxyLaunch::from_settings(
                &settings,
                &self.layout,
                server_port,
                version.proxy_target(),
            ));
            let mut proxy = SupervisedProcess::new(launch, policy, self.bus.clone());
            proxy.start();
            proxy
        });

        let store = orchestrator.store().clone();
        let upgrader = Upgrader::new(orchestrator, Some(server), proxy);
        let mut scheduler = UpdateScheduler::new(
            self.layout.settings_file(),
            store,
            upgrader,
            self.bus.clone(),
            &self.cfg,
        );
        scheduler.run(&cancel).await;

        let mut upgrader = scheduler.into_upgrader();
        upgrader.shutdown(self.cfg.stop_timeout).await;
        self.finish().await;
        Ok(())
    }

    fn orchestrator(&self, settings: &Settings) -> MigrationOrchestrator {
        let generator: Arc<dyn Launch> =
            Arc::new(ServerLaunch::from_settings(settings, &self.layout));
        let notifier = WebhookNotifier::new(
            settings.webhook_url().map(str::to_owned),
            self.bus.clone(),
        );
        MigrationOrchestrator::new(
            self.layout.clone(),
            generator,
            Arc::new(notifier),
            self.bus.clone(),
            &self.cfg,
        )
    }

    /// Forwards the events still on the bus, then lets subscribers drain their queues.
    async fn finish(self) {
        self.listener_stop.cancel();
        if let Err(e) = self.listener.await {
            tracing::warn!(error = %e, "event listener ended abnormally");
        }
        match Arc::try_unwrap(self.subs) {
            Ok(set) => set.shutdown().await,
            Err(_) => tracing::debug!("subscriber set still shared; skipping drain"),
        }
    }
}

/// Forwards every event already queued on `rx` without waiting for more.
fn drain(rx: &mut broadcast::Receiver<Event>, set: &SubscriberSet) {
    loop {
        match rx.try_recv() {
            Ok(ev) => set.emit(&ev),
            Err(TryRecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "event listener lagged while draining");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
