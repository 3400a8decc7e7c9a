//! Starting debug client processes.
//!
//! A debug client is started with the address of the engine's listener and
//! connects back to it. Clients can run as a local interpreter, inside a
//! terminal wrapper, on another host through a login command such as `ssh`,
//! or be requested from a remote [`ExecutionServer`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

pub mod command;
mod process;

pub use command::{CommandLine, client_arguments, resolve_interpreter, venv_interpreter};
pub use process::ClientProcess;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("executable not found: {name}")]
    ExecutableNotFound { name: String },

    #[error("no remote login command or host configured")]
    RemoteLoginCommandMissing,

    #[error("no console command configured")]
    ConsoleCommandMissing,

    #[error("remote command line cannot be quoted")]
    RemoteQuote(#[source] shlex::QuoteError),

    #[error("remote execution server is not connected")]
    ServerNotConnected,

    #[error("spawning debug client")]
    Spawn(#[source] std::io::Error),
}

/// Options forwarded to the debug client on its command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub no_encoding: bool,
    pub multiprocess: bool,
    pub call_trace_optimization: bool,
    /// Redirect the debuggee's stdout and stderr to the engine.
    pub redirect: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            no_encoding: false,
            multiprocess: false,
            call_trace_optimization: false,
            redirect: true,
        }
    }
}

/// Where the debug client runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LaunchTarget {
    #[default]
    Local,
    /// Local interpreter inside a terminal, e.g. `xterm -e`.
    Console { command: Option<String> },
    /// Interpreter on another host, reached through a login command.
    RemoteShell {
        host: String,
        exec_command: Option<String>,
        /// Interpreter name on the remote host, defaults to the local one.
        interpreter: Option<String>,
        /// Debug client path on the remote host, defaults to the local one.
        debug_client: Option<PathBuf>,
    },
    /// Client started by a connected [`ExecutionServer`].
    RemoteServer,
}

/// Everything needed to start one debug client.
#[derive(Debug, Clone)]
pub struct ClientLaunch {
    pub interpreter: PathBuf,
    pub venv: Option<PathBuf>,
    pub debug_client: PathBuf,
    /// Host the client connects back to.
    pub controller_host: String,
    pub controller_port: u16,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub options: ClientOptions,
}

impl Default for ClientLaunch {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            venv: None,
            debug_client: PathBuf::from("DebugClient.py"),
            controller_host: "127.0.0.1".to_string(),
            controller_port: 0,
            working_dir: None,
            env: BTreeMap::new(),
            options: ClientOptions::default(),
        }
    }
}

/// A remote service that can start debug clients on request.
pub trait ExecutionServer: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Start a client with `arguments` following the debug client path.
    fn start_client(&self, launch: &ClientLaunch, arguments: &[String]) -> std::io::Result<()>;
}

/// Starts debug clients on a configured target.
#[derive(Clone, Default)]
pub struct Launcher {
    target: LaunchTarget,
    execution_server: Option<Arc<dyn ExecutionServer>>,
}

impl std::fmt::Debug for Launcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launcher")
            .field("target", &self.target)
            .field("execution_server", &self.execution_server.is_some())
            .finish()
    }
}

impl Launcher {
    pub fn new(target: LaunchTarget) -> Self {
        Self {
            target,
            execution_server: None,
        }
    }

    pub fn with_execution_server(mut self, server: Arc<dyn ExecutionServer>) -> Self {
        self.execution_server = Some(server);
        self
    }

    pub fn target(&self) -> &LaunchTarget {
        &self.target
    }

    /// Start a debug client.
    #[tracing::instrument(skip(self, launch), fields(target = ?self.target, port = launch.controller_port))]
    pub fn launch(&self, launch: &ClientLaunch) -> Result<ClientProcess, LaunchError> {
        if self.target == LaunchTarget::RemoteServer {
            let server = self
                .execution_server
                .as_ref()
                .filter(|s| s.is_connected())
                .ok_or(LaunchError::ServerNotConnected)?;
            let arguments = client_arguments(
                &launch.options,
                &launch.controller_host,
                launch.controller_port,
            );
            server
                .start_client(launch, &arguments)
                .map_err(LaunchError::Spawn)?;
            tracing::debug!("debug client requested from execution server");
            return Ok(ClientProcess::remote("execution server".to_string()));
        }

        let command_line = command::build(launch, &self.target)?;
        tracing::debug!(program = %command_line.program.display(), args = ?command_line.args, "starting debug client");
        let child = command_line
            .to_command(launch)
            .spawn()
            .map_err(LaunchError::Spawn)?;
        tracing::debug!(pid = child.id(), "debug client started");
        Ok(ClientProcess::local(
            child,
            command_line.program.display().to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingServer {
        connected: bool,
        started: Mutex<Vec<Vec<String>>>,
    }

    impl ExecutionServer for RecordingServer {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn start_client(&self, _launch: &ClientLaunch, arguments: &[String]) -> std::io::Result<()> {
            self.started.lock().unwrap().push(arguments.to_vec());
            Ok(())
        }
    }

    #[test]
    fn remote_server_requires_server() {
        let launcher = Launcher::new(LaunchTarget::RemoteServer);
        assert!(matches!(
            launcher.launch(&ClientLaunch::default()),
            Err(LaunchError::ServerNotConnected)
        ));
    }

    #[test]
    fn remote_server_must_be_connected() {
        let server = Arc::new(RecordingServer::default());
        let launcher = Launcher::new(LaunchTarget::RemoteServer).with_execution_server(server.clone());

        assert!(matches!(
            launcher.launch(&ClientLaunch::default()),
            Err(LaunchError::ServerNotConnected)
        ));
        assert!(server.started.lock().unwrap().is_empty());
    }

    #[test]
    fn remote_server_receives_client_arguments() {
        let server = Arc::new(RecordingServer {
            connected: true,
            ..Default::default()
        });
        let launcher = Launcher::new(LaunchTarget::RemoteServer).with_execution_server(server.clone());

        let launch = ClientLaunch {
            controller_port: 5000,
            ..ClientLaunch::default()
        };
        let process = launcher.launch(&launch).unwrap();

        assert!(!process.is_local());
        assert_eq!(process.id(), None);
        assert_eq!(
            *server.started.lock().unwrap(),
            vec![vec!["5000".to_string(), "True".to_string(), "127.0.0.1".to_string()]]
        );
    }

    #[test]
    fn error_messages() {
        let err = LaunchError::ExecutableNotFound {
            name: "python9".to_string(),
        };
        assert_eq!(err.to_string(), "executable not found: python9");
        assert_eq!(
            LaunchError::ConsoleCommandMissing.to_string(),
            "no console command configured"
        );
    }
}
