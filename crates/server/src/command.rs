//! Command line construction for each launch target.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::{ClientLaunch, ClientOptions, LaunchError, LaunchTarget};

/// A fully resolved program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// The client runs on another host. Its working directory and
    /// environment are carried in `args` instead of applied locally.
    pub remote: bool,
}

impl CommandLine {
    pub(crate) fn to_command(&self, launch: &ClientLaunch) -> std::process::Command {
        let mut command = std::process::Command::new(&self.program);
        command.args(&self.args).stdin(std::process::Stdio::null());
        if !self.remote {
            command.envs(&launch.env);
            if let Some(dir) = &launch.working_dir {
                command.current_dir(dir);
            }
        }
        command
    }
}

/// Arguments understood by the debug client, after its own path.
///
/// Order: flags, controller port, output redirect, controller host.
pub fn client_arguments(options: &ClientOptions, host: &str, port: u16) -> Vec<String> {
    let mut args = Vec::new();
    if options.no_encoding {
        args.push("--no-encoding".to_string());
    }
    if options.multiprocess {
        args.push("--multiprocess".to_string());
    }
    if options.call_trace_optimization {
        args.push("--call-trace-optimization".to_string());
    }
    args.push(port.to_string());
    args.push(if options.redirect { "True" } else { "False" }.to_string());
    args.push(host.to_string());
    args
}

/// The interpreter inside a virtual environment.
pub fn venv_interpreter(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

/// Resolve the interpreter to an executable path.
///
/// A virtual environment takes precedence over the configured interpreter.
pub fn resolve_interpreter(launch: &ClientLaunch) -> Result<PathBuf, LaunchError> {
    if let Some(venv) = &launch.venv {
        let interpreter = venv_interpreter(venv);
        if interpreter.is_file() {
            return Ok(interpreter);
        }
        return Err(LaunchError::ExecutableNotFound {
            name: interpreter.display().to_string(),
        });
    }
    find_executable(&launch.interpreter)
}

fn find_executable(name: &Path) -> Result<PathBuf, LaunchError> {
    which::which(name).map_err(|_| LaunchError::ExecutableNotFound {
        name: name.display().to_string(),
    })
}

fn quote(word: &str) -> Result<OsString, LaunchError> {
    shlex::try_quote(word)
        .map(|quoted| OsString::from(quoted.into_owned()))
        .map_err(LaunchError::RemoteQuote)
}

/// Words run on the remote host before the interpreter: `cd <dir> &&`
/// followed by `env K=V ...`, each quoted for the remote shell.
fn remote_prelude(launch: &ClientLaunch) -> Result<Vec<OsString>, LaunchError> {
    let mut words = Vec::new();
    if let Some(dir) = &launch.working_dir {
        words.push(OsString::from("cd"));
        words.push(quote(&dir.to_string_lossy())?);
        words.push(OsString::from("&&"));
    }
    if !launch.env.is_empty() {
        words.push(OsString::from("env"));
        for (key, value) in &launch.env {
            let mut assignment = quote(key)?;
            assignment.push("=");
            assignment.push(quote(value)?);
            words.push(assignment);
        }
    }
    Ok(words)
}

fn split_command(command: &str) -> Option<(PathBuf, Vec<OsString>)> {
    let mut parts = shlex::split(command)?.into_iter();
    let program = parts.next()?;
    Some((PathBuf::from(program), parts.map(OsString::from).collect()))
}

/// Build the command line that starts a debug client on `target`.
///
/// The remote server target has no local command line and is rejected here.
pub fn build(launch: &ClientLaunch, target: &LaunchTarget) -> Result<CommandLine, LaunchError> {
    let client_args = client_arguments(
        &launch.options,
        &launch.controller_host,
        launch.controller_port,
    );

    match target {
        LaunchTarget::Local => {
            let program = resolve_interpreter(launch)?;
            let mut args: Vec<OsString> = vec![launch.debug_client.clone().into_os_string()];
            args.extend(client_args.into_iter().map(OsString::from));
            Ok(CommandLine {
                program,
                args,
                remote: false,
            })
        }
        LaunchTarget::Console { command } => {
            let (wrapper, mut args) = command
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .and_then(split_command)
                .ok_or(LaunchError::ConsoleCommandMissing)?;
            let program = find_executable(&wrapper)?;
            let interpreter = resolve_interpreter(launch)?;
            args.push(interpreter.into_os_string());
            args.push(launch.debug_client.clone().into_os_string());
            args.extend(client_args.into_iter().map(OsString::from));
            Ok(CommandLine {
                program,
                args,
                remote: false,
            })
        }
        LaunchTarget::RemoteShell {
            host,
            exec_command,
            interpreter,
            debug_client,
        } => {
            if host.trim().is_empty() {
                return Err(LaunchError::RemoteLoginCommandMissing);
            }
            let (login, mut args) = exec_command
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .and_then(split_command)
                .ok_or(LaunchError::RemoteLoginCommandMissing)?;
            let program = find_executable(&login)?;
            args.push(OsString::from(host));
            args.extend(remote_prelude(launch)?);
            // resolved on the remote side
            let remote_interpreter = match interpreter {
                Some(name) => quote(name)?,
                None => quote(&launch.interpreter.to_string_lossy())?,
            };
            args.push(remote_interpreter);
            let remote_client = debug_client.as_ref().unwrap_or(&launch.debug_client);
            args.push(quote(&remote_client.to_string_lossy())?);
            for arg in &client_args {
                args.push(quote(arg)?);
            }
            Ok(CommandLine {
                program,
                args,
                remote: true,
            })
        }
        LaunchTarget::RemoteServer => Err(LaunchError::ServerNotConnected),
    }
}
