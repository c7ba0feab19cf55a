//! # Launch commands.
//!
//! A [`Launch`] builds a fresh [`Command`] for every attempt, so parameters changed
//! through [`Launch::set_target`] are picked up by the *next* launch and never affect
//! a running child.
//!
//! - [`ServerLaunch`] the game server (`java -Xmx.. -Xms.. -jar server.jar nogui`)
//! - [`ProxyLaunch`] the protocol proxy (embeds server port and target version)
//! - [`CommandLaunch`] any program + args
//!
//! All commands set `kill_on_drop(true)`: a child whose worker is aborted dies with it.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::RwLock;

use tokio::process::Command;

use crate::config::Layout;
use crate::settings::Settings;

/// Builds the command line of a supervised process.
///
/// # Example
/// ```
/// use serverkeeper::{CommandLaunch, Launch};
///
/// let l = CommandLaunch::new("ticker", "sh").arg("-c").arg("sleep 1");
/// assert_eq!(l.name(), "ticker");
/// assert_eq!(l.command().as_std().get_program(), "sh");
/// ```
pub trait Launch: Send + Sync + 'static {
    /// Stable, human-readable process name.
    fn name(&self) -> &str;

    /// A new command for the next attempt.
    fn command(&self) -> Command;

    /// Updates parameters consulted by the next launch. No-op by default.
    fn set_target(&self, _target: &str) {}
}

/// The game server.
#[derive(Clone, Debug)]
pub struct ServerLaunch {
    java: String,
    xmx: String,
    xms: String,
    dir: PathBuf,
}

impl ServerLaunch {
    pub fn new(xmx: impl Into<String>, xms: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            java: "java".into(),
            xmx: xmx.into(),
            xms: xms.into(),
            dir: dir.into(),
        }
    }

    /// Server in the active data root with the heap sizes from `settings`.
    pub fn from_settings(settings: &Settings, layout: &Layout) -> Self {
        Self::new(&settings.java_xmx, &settings.java_xms, layout.current_dir())
    }

    /// Overrides the java executable (default: `java` on `PATH`).
    pub fn with_java(mut self, java: impl Into<String>) -> Self {
        self.java = java.into();
        self
    }
}

impl Launch for ServerLaunch {
    fn name(&self) -> &str {
        "server"
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.java);
        cmd.arg(format!("-Xmx{}", self.xmx))
            .arg(format!("-Xms{}", self.xms))
            .args(["-jar", Layout::SERVER_JAR, "nogui"])
            .current_dir(&self.dir)
            .kill_on_drop(true);
        cmd
    }
}

/// The protocol proxy in front of the server.
#[derive(Debug)]
pub struct ProxyLaunch {
    java: String,
    xmx: String,
    xms: String,
    bind_port: u16,
    server_port: u16,
    dir: PathBuf,
    target_version: RwLock<String>,
}

impl ProxyLaunch {
    pub fn new(
        xmx: impl Into<String>,
        xms: impl Into<String>,
        bind_port: u16,
        server_port: u16,
        dir: impl Into<PathBuf>,
        target_version: impl Into<String>,
    ) -> Self {
        Self {
            java: "java".into(),
            xmx: xmx.into(),
            xms: xms.into(),
            bind_port,
            server_port,
            dir: dir.into(),
            target_version: RwLock::new(target_version.into()),
        }
    }

    /// Proxy in `viaproxy/` forwarding to the local server on `server_port`.
    pub fn from_settings(
        settings: &Settings,
        layout: &Layout,
        server_port: u16,
        target_version: impl Into<String>,
    ) -> Self {
        Self::new(
            &settings.proxy_java_xmx,
            &settings.proxy_java_xms,
            settings.proxy_port,
            server_port,
            layout.proxy_dir(),
            target_version,
        )
    }

    pub fn with_java(mut self, java: impl Into<String>) -> Self {
        self.java = java.into();
        self
    }

    /// Version string the next launch will pass as `--target-version`.
    pub fn target_version(&self) -> String {
        self.target_version
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Launch for ProxyLaunch {
    fn name(&self) -> &str {
        "proxy"
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.java);
        cmd.arg(format!("-Xmx{}", self.xmx))
            .arg(format!("-Xms{}", self.xms))
            .args(["-jar", Layout::PROXY_JAR, "cli"])
            .args(["--allow-legacy-client-passthrough", "true"])
            .args(["--proxy-online-mode", "true"])
            .arg("--bind-address")
            .arg(format!("0.0.0.0:{}", self.bind_port))
            .arg("--target-address")
            .arg(format!("127.0.0.1:{}", self.server_port))
            .arg("--target-version")
            .arg(self.target_version())
            .current_dir(&self.dir)
            .kill_on_drop(true);
        cmd
    }

    fn set_target(&self, target: &str) {
        *self
            .target_version
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = target.to_string();
    }
}

/// Arbitrary program + arguments.
#[derive(Clone, Debug)]
pub struct CommandLaunch {
    name: String,
    program: OsString,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
}

impl CommandLaunch {
    pub fn new(name: impl Into<String>, program: impl Into<OsString>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }
}

impl Launch for CommandLaunch {
    fn name(&self) -> &str {
        &self.name
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_server_command_line() {
        let layout = Layout::new("/srv");
        let settings = Settings {
            java_xmx: "4G".into(),
            java_xms: "1G".into(),
            ..Settings::default()
        };
        let cmd = ServerLaunch::from_settings(&settings, &layout).command();

        assert_eq!(cmd.as_std().get_program(), "java");
        assert_eq!(args(&cmd), ["-Xmx4G", "-Xms1G", "-jar", "server.jar", "nogui"]);
        assert_eq!(cmd.as_std().get_current_dir(), Some(layout.current_dir().as_path()));
    }

    #[test]
    fn test_proxy_target_applies_to_next_command_only() {
        let proxy = ProxyLaunch::new("512M", "256M", 25568, 25565, "/srv/viaproxy", "1.12");
        let before = args(&proxy.command());

        proxy.set_target("1.16");
        let after = args(&proxy.command());

        assert!(before.ends_with(&["--target-version".to_string(), "1.12".to_string()]));
        assert!(after.ends_with(&["--target-version".to_string(), "1.16".to_string()]));
        assert!(after.contains(&"0.0.0.0:25568".to_string()));
        assert!(after.contains(&"127.0.0.1:25565".to_string()));
    }
}
