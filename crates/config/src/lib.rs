//! Engine configuration.
//!
//! Configuration is read from a TOML file, by default
//! `<config dir>/pydbg-engine/config.toml`. Every key is optional; a missing
//! file yields [`Config::default`].
//!
//! ```toml
//! [engine]
//! port = 42000
//! auto_continue = false
//!
//! [launch]
//! target = "remote-shell"
//! remote_host = "buildbox"
//!
//! [translation]
//! kind = "prefix"
//! remote_prefix = "/srv/app"
//! local_prefix = "/home/me/app"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "pydbg-engine";
const FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineSettings,
    pub launch: LaunchSettings,
    pub translation: TranslationSettings,
}

/// Listener and session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub host: String,
    /// 0 picks an ephemeral port.
    pub port: u16,
    /// How long a connection waits for the rest of a partial frame before
    /// reporting that no complete frame is available yet.
    pub frame_deadline_ms: u64,
    pub registration_timeout_secs: u64,
    pub max_frame_size: usize,
    pub auto_continue: bool,
}

impl EngineSettings {
    pub fn frame_deadline(&self) -> Duration {
        Duration::from_millis(self.frame_deadline_ms)
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_secs(self.registration_timeout_secs)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            frame_deadline_ms: 2_000,
            registration_timeout_secs: 30,
            max_frame_size: 16 * 1024 * 1024,
            auto_continue: true,
        }
    }
}

/// Where debug clients are started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    #[default]
    Local,
    Console,
    RemoteShell,
    RemoteServer,
}

/// How debug clients are started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    pub target: TargetKind,
    /// Interpreter executable. Resolved from `PATH` when relative.
    pub interpreter: PathBuf,
    /// Virtual environment whose interpreter takes precedence.
    pub venv: Option<PathBuf>,
    pub debug_client: Option<PathBuf>,
    /// Terminal wrapper for the console target, e.g. `konsole -e`.
    pub console_command: Option<String>,
    pub remote_host: Option<String>,
    pub remote_exec_command: Option<String>,
    pub remote_debug_client: Option<PathBuf>,
    pub remote_interpreter: Option<String>,
    pub multiprocess: bool,
    pub redirect: bool,
    pub no_encoding: bool,
    pub call_trace_optimization: bool,
    pub report_exceptions: bool,
    pub trace_interpreter: bool,
    pub env: BTreeMap<String, String>,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            target: TargetKind::Local,
            interpreter: PathBuf::from("python3"),
            venv: None,
            debug_client: None,
            console_command: None,
            remote_host: None,
            remote_exec_command: Some("ssh".to_string()),
            remote_debug_client: None,
            remote_interpreter: None,
            multiprocess: false,
            redirect: true,
            no_encoding: false,
            call_trace_optimization: false,
            report_exceptions: true,
            trace_interpreter: false,
            env: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranslationKind {
    #[default]
    None,
    Prefix,
    RemoteServer,
}

/// Path translation between this host and the debugged process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    pub kind: TranslationKind,
    pub remote_prefix: String,
    pub local_prefix: String,
    pub remote_windows: bool,
}

impl FromStr for Config {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).wrap_err("parsing configuration")
    }
}

/// The default configuration file location, if the platform has one.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(FILE_NAME))
}

/// Load the configuration from the default location.
pub fn load() -> eyre::Result<Config> {
    match default_path() {
        Some(path) => load_or_default(path),
        None => {
            tracing::debug!("no configuration directory on this platform");
            Ok(Config::default())
        }
    }
}

/// Load the configuration at `path`, falling back to defaults when the file
/// does not exist.
pub fn load_or_default(path: impl AsRef<Path>) -> eyre::Result<Config> {
    let path = path.as_ref();
    let span = tracing::debug_span!("load_config", path = %path.display());
    let _guard = span.enter();

    if !path.exists() {
        tracing::debug!("configuration file missing, using defaults");
        return Ok(Config::default());
    }
    load_from(path)
}

/// Load the configuration at `path`.
pub fn load_from(path: impl AsRef<Path>) -> eyre::Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading configuration {}", path.display()))?;
    let config = contents
        .parse()
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    tracing::debug!("configuration loaded");
    Ok(config)
}

/// Write `config` to `path`, creating parent directories.
pub fn save_to(config: &Config, path: impl AsRef<Path>) -> eyre::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).wrap_err("creating configuration directory")?;
    }
    let contents = toml::to_string_pretty(config).wrap_err("serializing configuration")?;
    std::fs::write(path, contents)
        .wrap_err_with(|| format!("writing configuration {}", path.display()))?;
    Ok(())
}
