use std::net::SocketAddr;
use std::time::Duration;

use eyre::WrapErr;
use server::{ClientLaunch, ClientProcess, LaunchError, Launcher};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use transport::requests::{ForkTarget, ProgramArguments, Request, Scope};
use transport::{CodecError, DEFAULT_MAX_FRAME_SIZE, Message};

use crate::connection::{self, ConnectionSettings};
use crate::coordinator::{Session, SessionSnapshot};
use crate::event::EventReceiver;
use crate::path_translator::PathTranslator;
use crate::registry::ConnectionHandle;
use crate::types::{ConnectionId, DebuggerId, Target};

/// Settings for [`Engine::start`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub host: String,
    /// 0 picks an ephemeral port.
    pub port: u16,
    pub frame_deadline: Duration,
    pub registration_timeout: Duration,
    pub max_frame_size: usize,
    pub auto_continue: bool,
    pub translator: PathTranslator,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            frame_deadline: Duration::from_secs(2),
            registration_timeout: Duration::from_secs(30),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            auto_continue: true,
            translator: PathTranslator::Identity,
        }
    }
}

/// Options for [`Engine::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub trace_interpreter: bool,
    pub multiprocess: bool,
    pub report_exceptions: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            trace_interpreter: false,
            multiprocess: false,
            report_exceptions: true,
        }
    }
}

/// Everything the engine task reacts to, in arrival order.
#[derive(Debug)]
pub(crate) enum Input {
    Accepted(ConnectionHandle),
    Frame(ConnectionId, Message),
    Malformed(ConnectionId, CodecError),
    Closed(ConnectionId),
    Send(Target, Request),
    FetchVariables {
        debugger_id: DebuggerId,
        frame_number: u32,
        filters: Vec<String>,
        max_size: u32,
    },
    SetAutoContinue(bool),
    SetTranslator(PathTranslator),
    Launched,
    RegistrationDeadline(u64),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running engine.
///
/// The engine listens for debug clients, tracks their registrations and
/// routes commands and events between them and the owner of this handle.
/// Commands are fire-and-forget: they return once handed to the engine.
pub struct Engine {
    inputs: mpsc::UnboundedSender<Input>,
    event_rx: EventReceiver,
    local_addr: SocketAddr,
    cancel_token: CancellationToken,

    // Task handles for cleanup
    listener_handle: Option<JoinHandle<()>>,
    engine_handle: Option<JoinHandle<()>>,
}

impl Engine {
    /// Bind the listener and start the engine tasks.
    #[tracing::instrument(skip(config), fields(host = %config.host, port = config.port))]
    pub async fn start(config: EngineConfig) -> eyre::Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .wrap_err_with(|| format!("binding {}:{}", config.host, config.port))?;
        let local_addr = listener.local_addr().wrap_err("reading listener address")?;
        tracing::info!(%local_addr, "listening for debug clients");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (inputs, input_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let session = Session::new(config.auto_continue, config.translator.clone(), event_tx);
        let settings = ConnectionSettings {
            frame_deadline: config.frame_deadline,
            max_frame_size: config.max_frame_size,
        };

        let listener_handle =
            Self::spawn_listener_task(listener, settings, inputs.clone(), cancel_token.clone());
        let engine_handle = Self::spawn_engine_task(
            session,
            input_rx,
            inputs.clone(),
            config.registration_timeout,
            cancel_token.clone(),
        );

        Ok(Self {
            inputs,
            event_rx: EventReceiver::new(event_rx),
            local_addr,
            cancel_token,
            listener_handle: Some(listener_handle),
            engine_handle: Some(engine_handle),
        })
    }

    fn spawn_listener_task(
        listener: TcpListener,
        settings: ConnectionSettings,
        inputs: mpsc::UnboundedSender<Input>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut next_id = 0;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("listener task cancelled");
                        break;
                    }
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                next_id += 1;
                                let id = ConnectionId(next_id);
                                tracing::debug!(connection = %id, %peer, "accepted connection");
                                connection::spawn(
                                    stream,
                                    id,
                                    Some(peer),
                                    settings,
                                    inputs.clone(),
                                    cancel.child_token(),
                                );
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "accepting connection");
                            }
                        }
                    }
                }
            }
        })
    }

    fn spawn_engine_task(
        mut session: Session,
        mut input_rx: mpsc::UnboundedReceiver<Input>,
        inputs: mpsc::UnboundedSender<Input>,
        registration_timeout: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let input = tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("engine task cancelled");
                        break;
                    }
                    input = input_rx.recv() => input,
                };
                let Some(input) = input else {
                    break;
                };
                match input {
                    Input::Accepted(handle) => session.accept(handle),
                    Input::Frame(connection, message) => session.on_frame(connection, message),
                    Input::Malformed(connection, error) => session.on_malformed(connection, error),
                    Input::Closed(connection) => session.on_closed(connection),
                    Input::Send(target, request) => {
                        let delivery = session.send(target, request);
                        tracing::trace!(?delivery, "command dispatched");
                    }
                    Input::FetchVariables {
                        debugger_id,
                        frame_number,
                        filters,
                        max_size,
                    } => {
                        session.fetch_frame_variables(debugger_id, frame_number, filters, max_size);
                    }
                    Input::SetAutoContinue(enabled) => session.set_auto_continue(enabled),
                    Input::SetTranslator(translator) => session.set_translator(translator),
                    Input::Launched => {
                        let token = session.arm_registration_deadline();
                        let inputs = inputs.clone();
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                _ = cancel.cancelled() => {}
                                _ = tokio::time::sleep(registration_timeout) => {
                                    let _ = inputs.send(Input::RegistrationDeadline(token));
                                }
                            }
                        });
                    }
                    Input::RegistrationDeadline(token) => session.registration_deadline(token),
                    Input::Snapshot(reply) => {
                        let _ = reply.send(session.snapshot());
                    }
                    Input::Shutdown(reply) => {
                        session.shutdown();
                        let _ = reply.send(());
                    }
                }
            }
        })
    }

    /// Address debug clients connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get event receiver for subscribing to engine events
    pub fn events(&mut self) -> &mut EventReceiver {
        &mut self.event_rx
    }

    fn input(&self, input: Input) -> eyre::Result<()> {
        self.inputs
            .send(input)
            .map_err(|_| eyre::eyre!("engine has stopped"))
    }

    /// Send a command to `target`.
    pub fn send(&self, target: impl Into<Target>, request: Request) -> eyre::Result<()> {
        self.input(Input::Send(target.into(), request))
    }

    /// Start a debug client that connects back to this engine.
    ///
    /// The controller port is filled in when left at 0. If the client does
    /// not register within the registration timeout a
    /// [`EngineEvent::RegistrationTimedOut`](crate::EngineEvent::RegistrationTimedOut)
    /// event is emitted.
    pub fn launch(
        &self,
        launcher: &Launcher,
        mut launch: ClientLaunch,
    ) -> Result<ClientProcess, LaunchError> {
        if launch.controller_port == 0 {
            launch.controller_port = self.local_addr.port();
        }
        let process = launcher.launch(&launch)?;
        if self.input(Input::Launched).is_err() {
            tracing::warn!("engine stopped before the launch was recorded");
        }
        Ok(process)
    }

    /// Load a program in the main debugger.
    pub fn load(&self, program: ProgramArguments, options: LoadOptions) -> eyre::Result<()> {
        self.send(
            Target::Main,
            Request::RequestLoad {
                program,
                trace_interpreter: options.trace_interpreter,
                multiprocess: options.multiprocess,
                report_exceptions: options.report_exceptions,
            },
        )
    }

    /// Run a program without tracing.
    pub fn run(&self, program: ProgramArguments, auto_fork: bool, fork_child: bool) -> eyre::Result<()> {
        self.send(
            Target::Main,
            Request::RequestRun {
                program,
                auto_fork,
                fork_child,
            },
        )
    }

    pub fn coverage(&self, program: ProgramArguments, erase: bool) -> eyre::Result<()> {
        self.send(Target::Main, Request::RequestCoverage { program, erase })
    }

    pub fn profile(&self, program: ProgramArguments, erase: bool) -> eyre::Result<()> {
        self.send(Target::Main, Request::RequestProfile { program, erase })
    }

    pub fn step(&self, target: impl Into<Target>) -> eyre::Result<()> {
        self.send(target, Request::RequestStep {})
    }

    pub fn step_over(&self, target: impl Into<Target>) -> eyre::Result<()> {
        self.send(target, Request::RequestStepOver {})
    }

    pub fn step_out(&self, target: impl Into<Target>) -> eyre::Result<()> {
        self.send(target, Request::RequestStepOut {})
    }

    pub fn step_quit(&self, target: impl Into<Target>) -> eyre::Result<()> {
        self.send(target, Request::RequestStepQuit {})
    }

    /// Resume execution. `special` continues until the current frame returns.
    pub fn continue_(&self, target: impl Into<Target>, special: bool) -> eyre::Result<()> {
        self.send(target, Request::RequestContinue { special })
    }

    pub fn continue_until(&self, target: impl Into<Target>, line: u32) -> eyre::Result<()> {
        self.send(target, Request::RequestContinueUntil { new_line: line })
    }

    pub fn move_instruction_pointer(&self, target: impl Into<Target>, line: u32) -> eyre::Result<()> {
        self.send(target, Request::RequestMoveIp { new_line: line })
    }

    /// Set a breakpoint in every debugger.
    pub fn set_breakpoint(
        &self,
        filename: impl Into<String>,
        line: u32,
        condition: Option<String>,
        temporary: bool,
    ) -> eyre::Result<()> {
        self.send(
            Target::All,
            Request::RequestBreakpoint {
                filename: filename.into(),
                line,
                temporary,
                set_breakpoint: true,
                condition,
            },
        )
    }

    pub fn remove_breakpoint(&self, filename: impl Into<String>, line: u32) -> eyre::Result<()> {
        self.send(
            Target::All,
            Request::RequestBreakpoint {
                filename: filename.into(),
                line,
                temporary: false,
                set_breakpoint: false,
                condition: None,
            },
        )
    }

    pub fn enable_breakpoint(
        &self,
        filename: impl Into<String>,
        line: u32,
        enable: bool,
    ) -> eyre::Result<()> {
        self.send(
            Target::All,
            Request::RequestBreakpointEnable {
                filename: filename.into(),
                line,
                enable,
            },
        )
    }

    pub fn ignore_breakpoint(
        &self,
        filename: impl Into<String>,
        line: u32,
        count: u32,
    ) -> eyre::Result<()> {
        self.send(
            Target::All,
            Request::RequestBreakpointIgnore {
                filename: filename.into(),
                line,
                count,
            },
        )
    }

    pub fn set_watch(&self, condition: impl Into<String>, temporary: bool) -> eyre::Result<()> {
        self.send(
            Target::All,
            Request::RequestWatch {
                condition: condition.into(),
                temporary,
                set_watch: true,
            },
        )
    }

    pub fn remove_watch(&self, condition: impl Into<String>) -> eyre::Result<()> {
        self.send(
            Target::All,
            Request::RequestWatch {
                condition: condition.into(),
                temporary: false,
                set_watch: false,
            },
        )
    }

    pub fn enable_watch(&self, condition: impl Into<String>, enable: bool) -> eyre::Result<()> {
        self.send(
            Target::All,
            Request::RequestWatchEnable {
                condition: condition.into(),
                enable,
            },
        )
    }

    pub fn ignore_watch(&self, condition: impl Into<String>, count: u32) -> eyre::Result<()> {
        self.send(
            Target::All,
            Request::RequestWatchIgnore {
                condition: condition.into(),
                count,
            },
        )
    }

    pub fn variables(
        &self,
        target: impl Into<Target>,
        frame_number: u32,
        scope: Scope,
        filters: Vec<String>,
        max_size: u32,
    ) -> eyre::Result<()> {
        self.send(
            target,
            Request::RequestVariables {
                frame_number,
                scope,
                filters,
                max_size,
            },
        )
    }

    /// Expand one variable, addressed by its path of names.
    pub fn variable(
        &self,
        target: impl Into<Target>,
        variable: Vec<String>,
        frame_number: u32,
        scope: Scope,
        filters: Vec<String>,
        max_size: u32,
    ) -> eyre::Result<()> {
        self.send(
            target,
            Request::RequestVariable {
                variable,
                frame_number,
                scope,
                filters,
                max_size,
            },
        )
    }

    /// Fetch globals and then locals for a frame of one debugger.
    pub fn fetch_frame_variables(
        &self,
        debugger_id: DebuggerId,
        frame_number: u32,
        filters: Vec<String>,
        max_size: u32,
    ) -> eyre::Result<()> {
        self.input(Input::FetchVariables {
            debugger_id,
            frame_number,
            filters,
            max_size,
        })
    }

    pub fn thread_list(&self, target: impl Into<Target>) -> eyre::Result<()> {
        self.send(target, Request::RequestThreadList {})
    }

    pub fn set_thread(&self, target: impl Into<Target>, thread_id: i64) -> eyre::Result<()> {
        self.send(target, Request::RequestThreadSet { thread_id })
    }

    pub fn capabilities(&self, target: impl Into<Target>) -> eyre::Result<()> {
        self.send(target, Request::RequestCapabilities {})
    }

    pub fn banner(&self, target: impl Into<Target>) -> eyre::Result<()> {
        self.send(target, Request::RequestBanner {})
    }

    pub fn set_no_debug_list(&self, no_debug: Vec<String>) -> eyre::Result<()> {
        self.send(Target::All, Request::RequestSetNoDebugList { no_debug })
    }

    pub fn set_filter(&self, scope: Scope, filter: Vec<String>) -> eyre::Result<()> {
        self.send(Target::All, Request::RequestSetFilter { scope, filter })
    }

    pub fn set_call_trace(&self, enable: bool) -> eyre::Result<()> {
        self.send(Target::All, Request::RequestCallTrace { enable })
    }

    pub fn completion(&self, target: impl Into<Target>, text: impl Into<String>) -> eyre::Result<()> {
        self.send(target, Request::RequestCompletion { text: text.into() })
    }

    pub fn execute_statement(
        &self,
        target: impl Into<Target>,
        statement: impl Into<String>,
    ) -> eyre::Result<()> {
        self.send(
            target,
            Request::ExecuteStatement {
                statement: statement.into(),
            },
        )
    }

    /// Answer a raw input request.
    pub fn raw_input(&self, target: impl Into<Target>, input: impl Into<String>) -> eyre::Result<()> {
        self.send(target, Request::RawInput { input: input.into() })
    }

    /// Answer a fork request.
    pub fn answer_fork(&self, target: impl Into<Target>, follow: ForkTarget) -> eyre::Result<()> {
        self.send(target, Request::ResponseForkTo { target: follow })
    }

    pub fn set_auto_continue(&self, enabled: bool) -> eyre::Result<()> {
        self.input(Input::SetAutoContinue(enabled))
    }

    pub fn set_translator(&self, translator: PathTranslator) -> eyre::Result<()> {
        self.input(Input::SetTranslator(translator))
    }

    /// Current session state, after every input sent so far is processed.
    pub async fn snapshot(&self) -> eyre::Result<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.input(Input::Snapshot(tx))?;
        rx.await.wrap_err("engine stopped before replying")
    }

    /// Ask every debug client to exit, close every connection and discard
    /// queued commands. The listener keeps running.
    ///
    /// The session reports [`SessionState::Draining`](crate::SessionState::Draining)
    /// and refuses registrations until every closed socket is gone.
    pub async fn shutdown(&self) -> eyre::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.input(Input::Shutdown(tx))?;
        rx.await.wrap_err("engine stopped before replying")
    }

    /// Stop every engine task.
    pub async fn close(mut self) -> eyre::Result<()> {
        self.cancel_token.cancel();

        // Wait for tasks to complete
        if let Some(handle) = self.listener_handle.take() {
            handle.await.wrap_err("listener task panicked")?;
        }
        if let Some(handle) = self.engine_handle.take() {
            handle.await.wrap_err("engine task panicked")?;
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
