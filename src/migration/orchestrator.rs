//! # MigrationOrchestrator: one version transition.
//!
//! ```text
//!  next version? ──none──► NoUpgradeAvailable (no side effects)
//!      │
//!  stop proxy, stop server
//!  old/ ──► old.prev/, current/ ──rename──► old/
//!                                       (permission denied / other OS error → restore old/, abort)
//!  mkdir current/, copy old/world       (best effort)
//!  servers/<v>/server.jar → current/, eula.txt
//!  bounded generation run               (timeout = success)
//!  overlay properties.json → server.properties
//!  commit record
//!  start server, retarget + start proxy
//!  notify
//! ```
//!
//! ## Rules
//! - The first mandatory failure stops forward progress. Only a failed backup rename
//!   is undone (the previous `old/` is put back); later steps are not rolled back.
//! - Cancellation is honored between coarse steps and yields [`MigrationError::Cancelled`].
//! - Only one migration runs at a time: `migrate` takes the processes by `&mut`.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Layout};
use crate::error::MigrationError;
use crate::events::{Bus, Event, EventKind};
use crate::migration::notify::Notify;
use crate::migration::overlay::OverlayApplier;
use crate::process::{Launch, SupervisedProcess};
use crate::version::{ActiveVersionRecord, Version, VersionStore};

/// What a migration did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Nothing newer is cataloged; disk state untouched.
    NoUpgradeAvailable { current: Version },
    /// The active version moved from `from` to `to`.
    Upgraded { from: Version, to: Version },
}

/// Performs version transitions over one [`Layout`].
pub struct MigrationOrchestrator {
    store: VersionStore,
    layout: Layout,
    generator: Arc<dyn Launch>,
    notifier: Arc<dyn Notify>,
    bus: Bus,
    stop_timeout: Duration,
    generation_timeout: Duration,
}

impl MigrationOrchestrator {
    /// `generator` is launched once in the new data root to materialize its default files.
    pub fn new(
        layout: Layout,
        generator: Arc<dyn Launch>,
        notifier: Arc<dyn Notify>,
        bus: Bus,
        cfg: &Config,
    ) -> Self {
        Self {
            store: VersionStore::new(layout.record_file(), layout.catalog_dir()),
            layout,
            generator,
            notifier,
            bus,
            stop_timeout: cfg.stop_timeout,
            generation_timeout: cfg.generation_timeout,
        }
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Moves the active version one step forward.
    ///
    /// `server` and `proxy` are stopped before the data root is touched and started
    /// again after the new version is committed.
    pub async fn migrate(
        &self,
        server: Option<&mut SupervisedProcess>,
        proxy: Option<&mut SupervisedProcess>,
        cancel: &CancellationToken,
    ) -> Result<MigrationOutcome, MigrationError> {
        let res = self.run(server, proxy, cancel).await;
        if let Err(e) = &res {
            self.bus
                .publish(Event::new(EventKind::MigrationAborted).with_reason(e.to_string()));
        }
        res
    }

    async fn run(
        &self,
        mut server: Option<&mut SupervisedProcess>,
        mut proxy: Option<&mut SupervisedProcess>,
        cancel: &CancellationToken,
    ) -> Result<MigrationOutcome, MigrationError> {
        let current = self.store.current_version()?;
        let Some(next) = self.store.next(current)? else {
            self.bus
                .publish(Event::new(EventKind::NoUpgradeAvailable).with_version(current));
            return Ok(MigrationOutcome::NoUpgradeAvailable { current });
        };
        self.bus.publish(
            Event::new(EventKind::MigrationStarted)
                .with_version(next)
                .with_reason(format!("from {current}")),
        );

        checkpoint(cancel, "stop processes")?;
        if let Some(p) = proxy.as_deref_mut() {
            p.stop(self.stop_timeout).await;
        }
        if let Some(p) = server.as_deref_mut() {
            p.stop(self.stop_timeout).await;
        }

        checkpoint(cancel, "backup")?;
        self.move_aside().await?;

        let root = self.layout.current_dir();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| MigrationError::Io {
                step: "create data root",
                source,
            })?;
        self.carry_world().await;
        self.place_binary(next).await?;

        checkpoint(cancel, "generation")?;
        self.generate(next).await;

        let report = OverlayApplier::from_layout(&self.layout).apply(next)?;
        self.bus.publish(
            Event::new(EventKind::OverlayApplied)
                .with_version(next)
                .with_reason(format!(
                    "applied {}, dropped {}",
                    report.applied.len(),
                    report.dropped.len()
                )),
        );

        checkpoint(cancel, "commit")?;
        self.store
            .commit(&ActiveVersionRecord::new(next, Utc::now()))?;
        self.bus
            .publish(Event::new(EventKind::VersionCommitted).with_version(next));

        if let Some(p) = server.as_deref_mut() {
            p.start();
        }
        if let Some(p) = proxy.as_deref_mut() {
            p.set_target(&next.proxy_target());
            p.start();
        }

        self.notifier
            .notify(&format!("Updated server to version {next}!"))
            .await;
        self.bus
            .publish(Event::new(EventKind::MigrationCompleted).with_version(next));

        Ok(MigrationOutcome::Upgraded {
            from: current,
            to: next,
        })
    }

    /// Renames the active root to the backup root; a missing active root is a first run.
    ///
    /// The previous backup is parked under a staging name and only deleted once the
    /// rename succeeded. On failure it is moved back, so `old/` survives an abort.
    async fn move_aside(&self) -> Result<(), MigrationError> {
        let from = self.layout.current_dir();
        let to = self.layout.backup_dir();
        let staged = self.layout.backup_staging_dir();

        match tokio::fs::metadata(&from).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %from.display(), "no active data root; first run");
                return Ok(());
            }
            Err(source) => return Err(backup_err(&from, &to, source)),
        }

        // leftover from an interrupted run; `old/` is still authoritative
        remove_if_present(&staged)
            .await
            .map_err(|source| backup_err(&from, &to, source))?;

        let parked = match tokio::fs::rename(&to, &staged).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(source) => return Err(backup_err(&from, &to, source)),
        };

        if let Err(source) = tokio::fs::rename(&from, &to).await {
            if parked {
                if let Err(e) = tokio::fs::rename(&staged, &to).await {
                    tracing::warn!(
                        error = %e,
                        path = %staged.display(),
                        "could not restore previous backup"
                    );
                }
            }
            return Err(backup_err(&from, &to, source));
        }

        if parked {
            if let Err(e) = tokio::fs::remove_dir_all(&staged).await {
                tracing::warn!(error = %e, path = %staged.display(), "stale backup left behind");
            } else {
                tracing::debug!(path = %staged.display(), "removed previous backup");
            }
        }
        Ok(())
    }

    /// Copies the persistent subtree forward; failures are reported, not fatal.
    async fn carry_world(&self) {
        let src = self.layout.backup_dir().join(Layout::WORLD);
        let dst = self.layout.current_dir().join(Layout::WORLD);
        if !src.is_dir() {
            tracing::debug!(path = %src.display(), "no world to carry forward");
            return;
        }

        let copied = tokio::task::spawn_blocking(move || copy_tree(&src, &dst))
            .await
            .map_err(|e| io::Error::other(e.to_string()))
            .and_then(|r| r);
        if let Err(e) = copied {
            self.bus.publish(
                Event::new(EventKind::MigrationStepFailed)
                    .with_reason(format!("copy world forward: {e}")),
            );
        }
    }

    /// Places the version's server binary and the consent file in the active root.
    async fn place_binary(&self, version: Version) -> Result<(), MigrationError> {
        let root = self.layout.current_dir();
        let jar = self
            .layout
            .catalog_dir()
            .join(version.to_string())
            .join(Layout::SERVER_JAR);
        let jar = if jar.exists() {
            jar
        } else {
            // catalog entries may be named without a patch (`1.16`)
            self.layout
                .catalog_dir()
                .join(version.proxy_target())
                .join(Layout::SERVER_JAR)
        };
        tokio::fs::copy(&jar, root.join(Layout::SERVER_JAR))
            .await
            .map_err(|source| MigrationError::Io {
                step: "place server binary",
                source,
            })?;

        let eula = root.join(Layout::EULA);
        if !eula.exists() {
            tokio::fs::write(&eula, "eula=true")
                .await
                .map_err(|source| MigrationError::Io {
                    step: "write eula",
                    source,
                })?;
        }
        Ok(())
    }

    /// Runs the generator once, bounded by the generation timeout.
    ///
    /// Every outcome counts as success; the server normally runs until the timeout.
    async fn generate(&self, version: Version) {
        let mut cmd = self.generator.command();
        let how = match cmd.spawn() {
            Ok(mut child) => match time::timeout(self.generation_timeout, child.wait()).await {
                Ok(Ok(status)) => format!("exited ({status})"),
                Ok(Err(e)) => format!("wait failed: {e}"),
                Err(_elapsed) => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!(error = %e, "kill after generation timeout failed");
                    }
                    "timed out".to_string()
                }
            },
            Err(e) => format!("spawn failed: {e}"),
        };
        self.bus.publish(
            Event::new(EventKind::ConfigGenerated)
                .with_version(version)
                .with_reason(how),
        );
    }
}

fn checkpoint(cancel: &CancellationToken, step: &'static str) -> Result<(), MigrationError> {
    if cancel.is_cancelled() {
        Err(MigrationError::Cancelled { step })
    } else {
        Ok(())
    }
}

fn backup_err(from: &Path, to: &Path, source: io::Error) -> MigrationError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        MigrationError::PermissionDenied {
            path: from.to_path_buf(),
        }
    } else {
        MigrationError::Backup {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }
    }
}

async fn remove_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Recursively copies `src` into `dst` (created if missing).
fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta};
    use tempfile::TempDir;

    use super::*;
    use crate::policies::{BackoffPolicy, RestartPolicy};
    use crate::process::{CommandLaunch, ProcessPolicy};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl Notify for Recorder {
        async fn notify(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn cfg() -> Config {
        Config {
            stop_timeout: Duration::from_secs(2),
            generation_timeout: Duration::from_secs(1),
            ..Config::default()
        }
    }

    /// Stands in for the server: writes a properties file, then keeps running.
    fn generator(layout: &Layout) -> Arc<dyn Launch> {
        Arc::new(
            CommandLaunch::new("generator", "sh")
                .arg("-c")
                .arg("printf 'difficulty=easy\\nserver-port=25565\\n' > server.properties; exec sleep 30")
                .current_dir(layout.current_dir()),
        )
    }

    fn catalog(layout: &Layout, version: &str) {
        let dir = layout.catalog_dir().join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(Layout::SERVER_JAR), format!("jar {version}")).unwrap();
    }

    fn orchestrator(layout: &Layout, notifier: Arc<Recorder>) -> MigrationOrchestrator {
        MigrationOrchestrator::new(
            layout.clone(),
            generator(layout),
            notifier,
            Bus::new(256),
            &cfg(),
        )
    }

    #[tokio::test]
    async fn test_first_migration_from_sentinel() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        catalog(&layout, "1.16.0");
        catalog(&layout, "1.17.0");
        std::fs::write(layout.overlay_file(), r#"{"difficulty": "hard"}"#).unwrap();
        let notifier = Arc::new(Recorder::default());
        let orch = orchestrator(&layout, notifier.clone());

        let started: DateTime<Utc> = Utc::now() - TimeDelta::seconds(1);
        let outcome = orch
            .migrate(None, None, &CancellationToken::new())
            .await
            .unwrap();
        let finished = Utc::now() + TimeDelta::seconds(1);

        assert_eq!(
            outcome,
            MigrationOutcome::Upgraded {
                from: Version::SENTINEL,
                to: Version::new(1, 16, 0)
            }
        );
        let record = orch.store().current().unwrap();
        assert_eq!(record.version, Version::new(1, 16, 0));
        assert!(record.activated_at >= started && record.activated_at <= finished);

        let root = layout.current_dir();
        assert_eq!(
            std::fs::read_to_string(root.join(Layout::SERVER_JAR)).unwrap(),
            "jar 1.16.0"
        );
        assert_eq!(std::fs::read_to_string(root.join(Layout::EULA)).unwrap(), "eula=true");
        assert!(
            std::fs::read_to_string(layout.properties_file())
                .unwrap()
                .contains("difficulty=hard\n")
        );
        assert_eq!(
            notifier.0.lock().unwrap().as_slice(),
            ["Updated server to version 1.16.0!"]
        );
    }

    #[tokio::test]
    async fn test_prior_root_moves_to_backup_and_world_is_carried() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        catalog(&layout, "1.16.0");
        catalog(&layout, "1.17.0");
        let world = layout.current_dir().join(Layout::WORLD).join("region");
        std::fs::create_dir_all(&world).unwrap();
        std::fs::write(world.join("r.0.0.mca"), "chunks").unwrap();
        std::fs::write(layout.current_dir().join("marker"), "old root").unwrap();
        std::fs::create_dir_all(layout.backup_dir().join("stale")).unwrap();
        std::fs::write(layout.record_file(), "1.16.0\n2024-01-01T00:00:00+00:00").unwrap();
        let orch = orchestrator(&layout, Arc::new(Recorder::default()));

        let outcome = orch
            .migrate(None, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            MigrationOutcome::Upgraded {
                from: Version::new(1, 16, 0),
                to: Version::new(1, 17, 0)
            }
        );
        assert!(layout.backup_dir().join("marker").exists());
        assert!(!layout.backup_dir().join("stale").exists());
        assert!(!layout.backup_staging_dir().exists());
        assert!(!layout.current_dir().join("marker").exists());
        assert_eq!(
            std::fs::read_to_string(
                layout
                    .current_dir()
                    .join(Layout::WORLD)
                    .join("region")
                    .join("r.0.0.mca")
            )
            .unwrap(),
            "chunks"
        );
    }

    #[tokio::test]
    async fn test_sentinel_only_catalog_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::create_dir_all(layout.current_dir()).unwrap();
        std::fs::write(layout.current_dir().join("marker"), "keep").unwrap();
        let notifier = Arc::new(Recorder::default());
        let orch = orchestrator(&layout, notifier.clone());

        let outcome = orch
            .migrate(None, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            MigrationOutcome::NoUpgradeAvailable {
                current: Version::SENTINEL
            }
        );
        assert!(layout.current_dir().join("marker").exists());
        assert!(!layout.backup_dir().exists());
        assert!(notifier.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_migration_stops_before_backup() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        catalog(&layout, "1.16.0");
        std::fs::create_dir_all(layout.current_dir()).unwrap();
        let orch = orchestrator(&layout, Arc::new(Recorder::default()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orch.migrate(None, None, &cancel).await.unwrap_err();

        assert!(matches!(err, MigrationError::Cancelled { step: "stop processes" }));
        assert!(layout.current_dir().exists());
        assert_eq!(orch.store().current_version().unwrap(), Version::SENTINEL);
    }

    #[tokio::test]
    async fn test_missing_binary_aborts_before_commit() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::create_dir_all(layout.catalog_dir().join("1.16.0")).unwrap();
        let orch = orchestrator(&layout, Arc::new(Recorder::default()));

        let err = orch
            .migrate(None, None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::Io { step: "place server binary", .. }));
        assert_eq!(orch.store().current_version().unwrap(), Version::SENTINEL);
    }

    /// Marks a path immutable for the lifetime of the guard (ext4 and friends).
    struct Immutable(PathBuf);

    impl Immutable {
        fn set(path: &Path) -> Option<Self> {
            let ok = std::process::Command::new("chattr")
                .arg("+i")
                .arg(path)
                .status()
                .is_ok_and(|s| s.success());
            ok.then(|| Self(path.to_path_buf()))
        }
    }

    impl Drop for Immutable {
        fn drop(&mut self) {
            let _ = std::process::Command::new("chattr")
                .arg("-i")
                .arg(&self.0)
                .status();
        }
    }

    /// Active root at 1.16.0 with a previous backup, 1.17.0 cataloged.
    fn upgraded_once(layout: &Layout) {
        catalog(layout, "1.17.0");
        std::fs::create_dir_all(layout.current_dir()).unwrap();
        std::fs::write(layout.current_dir().join("marker"), "live").unwrap();
        std::fs::create_dir_all(layout.backup_dir()).unwrap();
        std::fs::write(layout.backup_dir().join("previous-world"), "kept").unwrap();
        std::fs::write(layout.record_file(), "1.16.0\n2024-01-01T00:00:00+00:00").unwrap();
    }

    fn assert_untouched(layout: &Layout, orch: &MigrationOrchestrator) {
        assert_eq!(orch.store().current_version().unwrap(), Version::new(1, 16, 0));
        assert_eq!(
            std::fs::read_to_string(layout.current_dir().join("marker")).unwrap(),
            "live"
        );
        assert_eq!(
            std::fs::read_to_string(layout.backup_dir().join("previous-world")).unwrap(),
            "kept"
        );
        assert!(!layout.current_dir().join(Layout::SERVER_JAR).exists());
    }

    #[tokio::test]
    async fn test_locked_data_root_aborts_and_keeps_previous_backup() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        upgraded_once(&layout);
        let Some(_lock) = Immutable::set(&layout.current_dir()) else {
            eprintln!("chattr unavailable on this filesystem; skipping");
            return;
        };
        let notifier = Arc::new(Recorder::default());
        let orch = orchestrator(&layout, notifier.clone());

        let err = orch
            .migrate(None, None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.as_label(), "migration_permission_denied");
        assert_untouched(&layout, &orch);
        assert!(!layout.backup_staging_dir().exists());
        assert!(notifier.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backup_os_error_aborts_without_changes() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        upgraded_once(&layout);
        // a plain file where the staging directory goes cannot be cleared
        std::fs::write(layout.backup_staging_dir(), "not a directory").unwrap();
        let orch = orchestrator(&layout, Arc::new(Recorder::default()));
        let mut rx = orch.bus.subscribe();

        let err = orch
            .migrate(None, None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.as_label(), "migration_backup_failed");
        assert_untouched(&layout, &orch);
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::MigrationAborted));
        assert!(!kinds.contains(&EventKind::VersionCommitted));
    }

    /// Sleeper that records the targets it is given.
    struct RecordingLaunch {
        name: &'static str,
        targets: Mutex<Vec<String>>,
    }

    impl RecordingLaunch {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                targets: Mutex::new(Vec::new()),
            })
        }
    }

    impl Launch for RecordingLaunch {
        fn name(&self) -> &str {
            self.name
        }

        fn command(&self) -> tokio::process::Command {
            let mut cmd = tokio::process::Command::new("sleep");
            cmd.arg("30").kill_on_drop(true);
            cmd
        }

        fn set_target(&self, target: &str) {
            self.targets.lock().unwrap().push(target.to_string());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_processes_bracketed_and_proxy_retargeted() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        catalog(&layout, "1.16.0");
        let bus = Bus::new(1024);
        let policy = ProcessPolicy {
            restart: RestartPolicy::Always,
            backoff: BackoffPolicy::constant(Duration::from_millis(50)),
        };
        let server_launch = RecordingLaunch::new("server");
        let proxy_launch = RecordingLaunch::new("proxy");
        let mut server = SupervisedProcess::new(server_launch.clone(), policy, bus.clone());
        let mut proxy = SupervisedProcess::new(proxy_launch.clone(), policy, bus.clone());
        server.start();
        proxy.start();
        let mut rx = bus.subscribe();
        let orch = MigrationOrchestrator::new(
            layout.clone(),
            generator(&layout),
            Arc::new(Recorder::default()),
            bus,
            &cfg(),
        );

        orch.migrate(Some(&mut server), Some(&mut proxy), &CancellationToken::new())
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev.kind, EventKind::StopRequested | EventKind::WorkerStarted) {
                seen.push((ev.kind, ev.process.as_deref().unwrap_or_default().to_string()));
            }
        }
        let pos = |kind: EventKind, name: &str| {
            seen.iter()
                .position(|(k, n)| *k == kind && n == name)
                .unwrap_or_else(|| panic!("no {kind:?} for {name} in {seen:?}"))
        };
        assert!(pos(EventKind::StopRequested, "proxy") < pos(EventKind::StopRequested, "server"));
        assert!(pos(EventKind::WorkerStarted, "server") < pos(EventKind::WorkerStarted, "proxy"));
        assert!(pos(EventKind::StopRequested, "server") < pos(EventKind::WorkerStarted, "server"));

        assert_eq!(proxy_launch.targets.lock().unwrap().as_slice(), ["1.16"]);
        assert!(server_launch.targets.lock().unwrap().is_empty());
        assert!(server.state().desired_running);
        assert!(proxy.is_worker_active());

        server.stop(Duration::from_secs(2)).await;
        proxy.stop(Duration::from_secs(2)).await;
    }
}
