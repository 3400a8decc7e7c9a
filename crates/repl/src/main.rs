use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use clap::Parser;
use color_eyre::eyre::{self, Context};
use config::{Config, LaunchSettings, TargetKind, TranslationKind, TranslationSettings};
use debugger::{
    ClientEvent, DebuggerId, Engine, EngineConfig, EngineEvent, LoadOptions, PathTranslator,
    ProgramArguments, StackFrame, Target,
};
use server::{ClientLaunch, ClientOptions, ClientProcess, LaunchTarget, Launcher};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::filter::EnvFilter;

struct App {
    engine: Engine,
    process: ClientProcess,
    input: Lines<BufReader<Stdin>>,
    /// Debugger that reported the most recent stop.
    current: Option<DebuggerId>,
    location: Option<StackFrame>,
}

impl App {
    fn new(engine: Engine, process: ClientProcess) -> Self {
        Self {
            engine,
            process,
            input: BufReader::new(tokio::io::stdin()).lines(),
            current: None,
            location: None,
        }
    }

    fn target(&self) -> Target {
        match &self.current {
            Some(id) => Target::Debugger(id.clone()),
            None => Target::Main,
        }
    }

    async fn loop_step(&mut self) -> eyre::Result<ShouldQuit> {
        print!("> ");
        std::io::stdout().flush()?;

        tokio::select! {
            line = self.input.next_line() => match line.context("reading stdin")? {
                Some(line) => self.handle_input(line.trim()).context("handling command"),
                None => Ok(ShouldQuit::True),
            },
            event = self.engine.events().recv() => match event {
                Some(event) => self.handle_engine_event(event).context("handling engine event"),
                None => Ok(ShouldQuit::True),
            },
        }
    }

    #[tracing::instrument(skip(self))]
    fn handle_engine_event(&mut self, event: EngineEvent) -> eyre::Result<ShouldQuit> {
        match event {
            EngineEvent::ClientConnected {
                debugger_id,
                is_main,
            } => {
                let role = if is_main { "main" } else { "secondary" };
                println!("debugger {debugger_id} connected ({role})");
            }
            EngineEvent::Client { debugger_id, event } => {
                return self.handle_client_event(debugger_id, event);
            }
            EngineEvent::ClientDisconnected { debugger_id, .. } => {
                println!("debugger {debugger_id} disconnected");
                if self.current.as_ref() == Some(&debugger_id) {
                    self.current = None;
                    self.location = None;
                }
            }
            EngineEvent::AllClientsExited => {
                println!("all debug clients exited");
                return Ok(ShouldQuit::True);
            }
            EngineEvent::RegistrationTimedOut => {
                eyre::bail!("debug client did not connect");
            }
            EngineEvent::ProtocolError {
                debugger_id,
                method,
                message,
            } => {
                tracing::warn!(?debugger_id, ?method, %message, "protocol error");
                println!(
                    "{}",
                    protocol_error_line(debugger_id.as_ref(), method.as_deref(), &message)
                );
            }
        }
        Ok(ShouldQuit::False)
    }

    fn handle_client_event(
        &mut self,
        debugger_id: DebuggerId,
        event: ClientEvent,
    ) -> eyre::Result<ShouldQuit> {
        match event {
            ClientEvent::Output { text } => print!("{text}"),
            ClientEvent::LineReached { mut stack, .. } => {
                if !stack.is_empty() {
                    let frame = stack.swap_remove(0);
                    println!("[{debugger_id}] {}:{} in {}", frame.filename, frame.line, frame.function);
                    self.location = Some(frame);
                }
                self.current = Some(debugger_id);
            }
            ClientEvent::Exception {
                exception_type,
                message,
                stack,
                ..
            } => {
                println!("[{debugger_id}] {exception_type}: {message}");
                for frame in &stack {
                    println!("    {}:{} in {}", frame.filename, frame.line, frame.function);
                }
                self.current = Some(debugger_id);
            }
            ClientEvent::SyntaxError {
                message,
                filename,
                line,
                column,
                ..
            } => println!("[{debugger_id}] syntax error at {filename}:{line}:{column}: {message}"),
            ClientEvent::Variables { scope, variables } => {
                let scope = if scope == 0 { "locals" } else { "globals" };
                println!("[{debugger_id}] {scope}:");
                for variable in variables {
                    println!("    {variable}");
                }
            }
            ClientEvent::ThreadList { current_id, threads } => {
                for thread in threads {
                    let marker = if thread.id == current_id { "*" } else { " " };
                    println!("{marker} {} {}", thread.id, thread.name);
                }
            }
            ClientEvent::BreakpointConditionError { filename, line } => {
                println!("invalid breakpoint condition at {filename}:{line}");
            }
            ClientEvent::Exited {
                program,
                status,
                message,
            } => {
                println!("[{debugger_id}] {program} exited with status {status} {message}");
            }
            other => tracing::debug!(%debugger_id, event = ?other, "unhandled client event"),
        }
        Ok(ShouldQuit::False)
    }

    fn handle_input(&mut self, input: &str) -> eyre::Result<ShouldQuit> {
        let (command, rest) = input.split_once(' ').unwrap_or((input, ""));
        match command {
            "q" => return Ok(ShouldQuit::True),
            "w" => match &self.location {
                Some(frame) => println!("{}:{}", frame.filename, frame.line),
                None => println!("???"),
            },
            "s" => self.engine.step(self.target()).context("stepping")?,
            "n" => self.engine.step_over(self.target()).context("stepping over")?,
            "o" => self.engine.step_out(self.target()).context("stepping out")?,
            "c" => {
                tracing::debug!("executing continue command");
                self.engine
                    .continue_(self.target(), false)
                    .context("resuming execution")?;
            }
            "b" => match rest.parse::<Breakpoint>() {
                Ok(breakpoint) => self
                    .engine
                    .set_breakpoint(breakpoint.file, breakpoint.line, None, false)
                    .context("adding breakpoint")?,
                Err(e) => println!("{e}"),
            },
            "v" => match &self.current {
                Some(id) => self
                    .engine
                    .fetch_frame_variables(id.clone(), 0, Vec::new(), 0)
                    .context("fetching variables")?,
                None => println!("no debugger is stopped"),
            },
            "t" => self.engine.thread_list(self.target()).context("listing threads")?,
            "" => return Ok(ShouldQuit::False),
            other => println!("Unhandled command: '{}'", other),
        }
        Ok(ShouldQuit::False)
    }
}

#[derive(Debug, Clone)]
struct Breakpoint {
    file: String,
    line: u32,
}

impl FromStr for Breakpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (file, line) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected file:line, got '{s}'"))?;
        let line = line
            .parse()
            .map_err(|_| format!("invalid line number '{line}'"))?;
        Ok(Self {
            file: file.to_string(),
            line,
        })
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum TargetArg {
    Local,
    Console,
    RemoteShell,
    RemoteServer,
}

impl From<TargetArg> for TargetKind {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Local => TargetKind::Local,
            TargetArg::Console => TargetKind::Console,
            TargetArg::RemoteShell => TargetKind::RemoteShell,
            TargetArg::RemoteServer => TargetKind::RemoteServer,
        }
    }
}

#[derive(Debug, Parser)]
struct Args {
    script: PathBuf,

    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,

    /// Configuration file, defaults to the per-user location.
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(short, long, value_enum)]
    target: Option<TargetArg>,

    #[clap(short, long)]
    breakpoints: Vec<Breakpoint>,

    #[clap(long)]
    no_auto_continue: bool,

    #[clap(long, default_value = "log.log")]
    log_file: PathBuf,
}

fn protocol_error_line(
    debugger_id: Option<&DebuggerId>,
    method: Option<&str>,
    message: &str,
) -> String {
    let source = match debugger_id {
        Some(id) => format!("debugger {id}"),
        None => "unregistered connection".to_string(),
    };
    match method {
        Some(method) => format!("protocol error from {source} in {method}: {message}"),
        None => format!("protocol error from {source}: {message}"),
    }
}

fn translator(settings: &TranslationSettings) -> PathTranslator {
    match settings.kind {
        TranslationKind::None => PathTranslator::Identity,
        TranslationKind::Prefix => PathTranslator::prefix(
            settings.remote_prefix.as_str(),
            settings.local_prefix.as_str(),
            settings.remote_windows,
        ),
        TranslationKind::RemoteServer => PathTranslator::RemoteServer,
    }
}

fn engine_config(config: &Config) -> EngineConfig {
    EngineConfig {
        host: config.engine.host.clone(),
        port: config.engine.port,
        frame_deadline: config.engine.frame_deadline(),
        registration_timeout: config.engine.registration_timeout(),
        max_frame_size: config.engine.max_frame_size,
        auto_continue: config.engine.auto_continue,
        translator: translator(&config.translation),
    }
}

fn launcher(settings: &LaunchSettings) -> eyre::Result<Launcher> {
    let target = match settings.target {
        TargetKind::Local => LaunchTarget::Local,
        TargetKind::Console => LaunchTarget::Console {
            command: settings.console_command.clone(),
        },
        TargetKind::RemoteShell => LaunchTarget::RemoteShell {
            host: settings
                .remote_host
                .clone()
                .ok_or_else(|| eyre::eyre!("remote-shell target needs remote_host"))?,
            exec_command: settings.remote_exec_command.clone(),
            interpreter: settings.remote_interpreter.clone(),
            debug_client: settings.remote_debug_client.clone(),
        },
        TargetKind::RemoteServer => LaunchTarget::RemoteServer,
    };
    Ok(Launcher::new(target))
}

fn client_launch(
    settings: &LaunchSettings,
    config: &EngineConfig,
    working_dir: PathBuf,
) -> eyre::Result<ClientLaunch> {
    let debug_client = settings
        .debug_client
        .clone()
        .ok_or_else(|| eyre::eyre!("no debug_client configured"))?;
    Ok(ClientLaunch {
        interpreter: settings.interpreter.clone(),
        venv: settings.venv.clone(),
        debug_client,
        controller_host: config.host.clone(),
        controller_port: 0,
        working_dir: Some(working_dir),
        env: settings.env.clone(),
        options: ClientOptions {
            no_encoding: settings.no_encoding,
            multiprocess: settings.multiprocess,
            call_trace_optimization: settings.call_trace_optimization,
            redirect: settings.redirect,
        },
    })
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install().context("installing color_eyre")?;
    let args = Args::parse();

    let log_file = std::fs::File::create(&args.log_file)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(Mutex::new(log_file))
        .init();

    let mut config = match &args.config {
        Some(path) => config::load_from(path).context("loading configuration")?,
        None => config::load().context("loading configuration")?,
    };
    if let Some(target) = args.target {
        config.launch.target = target.into();
    }
    if args.no_auto_continue {
        config.engine.auto_continue = false;
    }

    let script = std::path::absolute(&args.script).context("resolving script path")?;
    let workdir = script
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let engine_config = engine_config(&config);
    let engine = Engine::start(engine_config.clone())
        .await
        .context("starting engine")?;

    for breakpoint in args.breakpoints {
        tracing::debug!(?breakpoint, "adding breakpoint");
        engine
            .set_breakpoint(breakpoint.file, breakpoint.line, None, false)
            .context("adding breakpoint")?;
    }
    engine
        .load(
            ProgramArguments {
                workdir: workdir.display().to_string(),
                filename: script.display().to_string(),
                argv: args.script_args,
            },
            LoadOptions {
                trace_interpreter: config.launch.trace_interpreter,
                multiprocess: config.launch.multiprocess,
                report_exceptions: config.launch.report_exceptions,
            },
        )
        .context("loading script")?;

    let launch = client_launch(&config.launch, &engine_config, workdir)?;
    let process = engine
        .launch(&launcher(&config.launch)?, launch)
        .context("launching debug client")?;
    tracing::debug!(process = process.description(), "debug client launched");

    let mut app = App::new(engine, process);
    let result = loop {
        match app.loop_step().await {
            Ok(ShouldQuit::True) => break Ok(()),
            Ok(ShouldQuit::False) => {}
            Err(e) => break Err(e),
        }
    };

    app.engine.shutdown().await.context("shutting down engine")?;
    if let Err(e) = app.process.terminate() {
        tracing::debug!(error = %e, "terminating debug client");
    }
    app.engine.close().await?;
    result
}

enum ShouldQuit {
    True,
    False,
}
