//! Session coordination.
//!
//! [`Session`] owns the registry, the pending command queue and the
//! auto-continue bookkeeping. It is driven by a single task, one input at a
//! time, so none of its state needs locking.

use std::collections::HashSet;

use tokio::sync::mpsc;
use transport::events::ClientMessage;
use transport::requests::Request;
use transport::{CodecError, Message};

use crate::dispatcher::{self, Delivery};
use crate::event::{ClientEvent, EngineEvent};
use crate::path_translator::PathTranslator;
use crate::queue::CommandQueue;
use crate::registry::{ConnectionHandle, Registration, Registry, Removal};
use crate::router::{self, Routed};
use crate::types::{Capabilities, ConnectionId, DebuggerId, Target};
use crate::variables::VariableFetches;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connections, nothing queued, no launch outstanding.
    Idle,
    /// Waiting for a main debugger to register.
    AwaitingMain,
    /// A main debugger is registered.
    Active,
    /// Shutdown in progress.
    Draining,
}

/// Decides which secondary debuggers are resumed automatically.
#[derive(Debug)]
pub struct AutoContinue {
    enabled: bool,
    stepping: bool,
    continued: HashSet<DebuggerId>,
}

impl AutoContinue {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            stepping: false,
            continued: HashSet::new(),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Track whether the most recent user action was a step.
    pub fn note_request(&mut self, request: &Request) {
        if request.is_step() {
            self.stepping = true;
        } else if request.is_resume() {
            self.stepping = false;
        }
    }

    /// Returns true at most once per identity, and only while enabled and
    /// not stepping.
    pub fn should_continue(&mut self, debugger_id: &DebuggerId) -> bool {
        self.enabled && !self.stepping && self.continued.insert(debugger_id.clone())
    }

    pub fn continued(&self) -> Vec<DebuggerId> {
        let mut ids: Vec<_> = self.continued.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn clear(&mut self) {
        self.continued.clear();
        self.stepping = false;
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub main: Option<DebuggerId>,
    pub live: Vec<DebuggerId>,
    pub pending_connections: usize,
    pub queued: Vec<&'static str>,
    pub auto_continued: Vec<DebuggerId>,
    pub auto_continue: bool,
    pub capabilities: Option<Capabilities>,
}

#[derive(Debug)]
pub struct Session {
    registry: Registry,
    queue: CommandQueue,
    auto_continue: AutoContinue,
    variables: VariableFetches,
    translator: PathTranslator,
    capabilities: Option<Capabilities>,
    /// Connections closed by shutdown whose sockets have not reported closed.
    draining: HashSet<ConnectionId>,
    registrations: u64,
    awaiting_registration: Option<u64>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl Session {
    pub fn new(
        auto_continue: bool,
        translator: PathTranslator,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            registry: Registry::default(),
            queue: CommandQueue::default(),
            auto_continue: AutoContinue::new(auto_continue),
            variables: VariableFetches::default(),
            translator,
            capabilities: None,
            draining: HashSet::new(),
            registrations: 0,
            awaiting_registration: None,
            events,
        }
    }

    pub fn state(&self) -> SessionState {
        if !self.draining.is_empty() {
            SessionState::Draining
        } else if self.registry.main().is_some() {
            SessionState::Active
        } else if !self.registry.is_empty()
            || !self.queue.is_empty()
            || self.awaiting_registration.is_some()
        {
            SessionState::AwaitingMain
        } else {
            SessionState::Idle
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            main: self.registry.main().cloned(),
            live: self.registry.live_ids(),
            pending_connections: self.registry.pending_count(),
            queued: self.queue.methods().collect(),
            auto_continued: self.auto_continue.continued(),
            auto_continue: self.auto_continue.is_enabled(),
            capabilities: self.capabilities,
        }
    }

    pub fn set_auto_continue(&mut self, enabled: bool) {
        self.auto_continue.set_enabled(enabled);
    }

    pub fn set_translator(&mut self, translator: PathTranslator) {
        self.translator = translator;
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }

    pub fn accept(&mut self, handle: ConnectionHandle) {
        self.registry.accept(handle);
    }

    /// Send a command on behalf of the user.
    #[tracing::instrument(skip(self, request), fields(method = request.method()))]
    pub fn send(&mut self, target: Target, request: Request) -> Delivery {
        self.auto_continue.note_request(&request);
        let method = request.method();
        let payload = match dispatcher::encode(request, &self.translator) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "could not encode command");
                return Delivery::Dropped;
            }
        };
        dispatcher::dispatch(&self.registry, &mut self.queue, &target, method, payload)
    }

    /// Send an engine-originated command straight to one connection,
    /// bypassing the queue and the step tracking.
    fn send_direct(&self, handle: &ConnectionHandle, request: Request) {
        let method = request.method();
        match dispatcher::encode(request, &self.translator) {
            Ok(payload) => {
                if !handle.send(payload) {
                    tracing::debug!(method, connection = %handle.id(), "connection already closed");
                }
            }
            Err(e) => tracing::warn!(error = %e, method, "could not encode command"),
        }
    }

    fn send_to(&self, debugger_id: &DebuggerId, request: Request) {
        if let Some(handle) = self.registry.resolve(debugger_id) {
            self.send_direct(handle, request);
        }
    }

    /// Start a two-phase variable fetch for one debugger.
    pub fn fetch_frame_variables(
        &mut self,
        debugger_id: DebuggerId,
        frame_number: u32,
        filters: Vec<String>,
        max_size: u32,
    ) -> Delivery {
        let request = self
            .variables
            .start(debugger_id.clone(), frame_number, filters, max_size);
        self.send(Target::Debugger(debugger_id), request)
    }

    /// Handle a decoded frame from a connection.
    pub fn on_frame(&mut self, connection: ConnectionId, message: Message) {
        let method = message.method.clone();
        let decoded = match ClientMessage::try_from(message) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(%connection, error = %e, "invalid message");
                self.emit(EngineEvent::ProtocolError {
                    debugger_id: self.registry.identity_of(connection).cloned(),
                    method: Some(method),
                    message: e.to_string(),
                });
                return;
            }
        };

        match router::route(decoded, &self.translator) {
            Routed::Identify(debugger_id) => self.register(connection, debugger_id),
            routed => {
                let Some(debugger_id) = self.registry.identity_of(connection).cloned() else {
                    tracing::warn!(%connection, %method, "frame from unregistered connection, ignoring");
                    return;
                };
                match routed {
                    Routed::RequestThreadList => {
                        tracing::debug!(%debugger_id, "empty stack, requesting thread list");
                        self.send_to(&debugger_id, Request::RequestThreadList {});
                    }
                    Routed::Event(event) => self.on_client_event(debugger_id, event),
                    Routed::Identify(_) => {}
                }
            }
        }
    }

    fn on_client_event(&mut self, debugger_id: DebuggerId, event: ClientEvent) {
        match &event {
            ClientEvent::Capabilities { capabilities, .. }
                if self.registry.main() == Some(&debugger_id) =>
            {
                self.capabilities = Some(*capabilities);
            }
            ClientEvent::Variables { scope, .. } => {
                if let Some(locals) = self.variables.on_response(&debugger_id, *scope) {
                    self.send_to(&debugger_id, locals);
                }
            }
            _ => {}
        }
        self.emit(EngineEvent::Client { debugger_id, event });
    }

    /// Handle a frame whose payload could not be parsed.
    pub fn on_malformed(&mut self, connection: ConnectionId, error: CodecError) {
        tracing::warn!(%connection, error = %error, "malformed frame");
        self.emit(EngineEvent::ProtocolError {
            debugger_id: self.registry.identity_of(connection).cloned(),
            method: None,
            message: error.to_string(),
        });
    }

    #[tracing::instrument(skip(self), fields(%connection, %debugger_id))]
    fn register(&mut self, connection: ConnectionId, debugger_id: DebuggerId) {
        match self.registry.register(connection, debugger_id.clone()) {
            Registration::New {
                became_main,
                replaced,
            } => {
                self.registrations += 1;
                self.awaiting_registration = None;

                if let Some(old) = replaced {
                    tracing::warn!(superseded = %old.id(), "identity registered again, closing previous connection");
                    self.variables.forget(&debugger_id);
                    old.close();
                }

                let is_main = self.registry.main() == Some(&debugger_id);
                tracing::info!(main = is_main, "debugger registered");
                self.emit(EngineEvent::ClientConnected {
                    debugger_id: debugger_id.clone(),
                    is_main,
                });

                let Some(handle) = self.registry.resolve(&debugger_id).cloned() else {
                    return;
                };
                if became_main {
                    self.send_direct(&handle, Request::RequestCapabilities {});
                    let queued = self.queue.take_all();
                    tracing::debug!(count = queued.len(), "flushing queued commands");
                    for command in queued {
                        if !handle.send(command.payload) {
                            tracing::warn!(method = command.method, "main debugger closed during flush");
                        }
                    }
                } else if !is_main && self.auto_continue.should_continue(&debugger_id) {
                    tracing::debug!("auto-continuing secondary debugger");
                    self.send_direct(&handle, Request::RequestContinue { special: false });
                }
            }
            Registration::Replay => {
                tracing::debug!("identity repeated on the same connection");
            }
            Registration::Conflict { existing } => {
                tracing::warn!(%existing, "connection already registered under another identity");
            }
            Registration::Refused { handle } => {
                tracing::debug!("registration refused while draining");
                self.send_direct(&handle, Request::RequestShutdown {});
                handle.close();
                self.draining.insert(handle.id());
            }
            Registration::UnknownConnection => {
                tracing::warn!("registration from unknown connection");
            }
        }
    }

    /// Handle a connection whose socket has closed.
    pub fn on_closed(&mut self, connection: ConnectionId) {
        if self.draining.remove(&connection) {
            self.finish_draining();
            return;
        }
        match self.registry.remove_connection(connection) {
            Removal::Pending => {
                tracing::debug!(%connection, "pending connection closed");
            }
            Removal::Unknown => {}
            Removal::Live {
                debugger_id,
                was_main,
                remaining,
            } => {
                tracing::info!(%debugger_id, was_main, remaining, "debugger disconnected");
                self.variables.forget(&debugger_id);
                if was_main {
                    self.capabilities = None;
                }
                self.emit(EngineEvent::ClientDisconnected {
                    debugger_id,
                    was_main,
                });

                if remaining == 0 {
                    let discarded = self.queue.clear();
                    self.auto_continue.clear();
                    self.variables.clear();
                    tracing::info!(discarded, "all debuggers exited");
                    self.emit(EngineEvent::AllClientsExited);
                }
            }
        }
    }

    /// Note that a client was launched. Returns the token to pass to
    /// [`Session::registration_deadline`] once the deadline passes.
    pub fn arm_registration_deadline(&mut self) -> u64 {
        self.awaiting_registration = Some(self.registrations);
        self.registrations
    }

    pub fn registration_deadline(&mut self, token: u64) {
        if self.awaiting_registration == Some(token) && self.registrations == token {
            tracing::warn!("launched debug client did not register in time");
            self.awaiting_registration = None;
            self.emit(EngineEvent::RegistrationTimedOut);
        }
    }

    /// Ask every client to exit and close every connection.
    ///
    /// Registrations are refused until every closed socket has reported
    /// back through [`Session::on_closed`].
    #[tracing::instrument(skip(self))]
    pub fn shutdown(&mut self) {
        self.registry.set_accepting(false);

        for handle in self.registry.drain() {
            self.send_direct(&handle, Request::RequestShutdown {});
            handle.close();
            self.draining.insert(handle.id());
        }

        let discarded = self.queue.clear();
        self.auto_continue.clear();
        self.variables.clear();
        self.capabilities = None;
        self.awaiting_registration = None;
        tracing::debug!(discarded, closing = self.draining.len(), "session draining");

        self.finish_draining();
    }

    fn finish_draining(&mut self) {
        if self.draining.is_empty() && !self.registry.is_accepting() {
            tracing::info!("shutdown complete");
            self.registry.set_accepting(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Outbound;
    use crate::registry::tests::handle;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        session: Session,
        events: UnboundedReceiver<EngineEvent>,
        next_connection: u64,
    }

    impl Harness {
        fn new() -> Self {
            let (tx, events) = mpsc::unbounded_channel();
            Self {
                session: Session::new(true, PathTranslator::Identity, tx),
                events,
                next_connection: 0,
            }
        }

        fn connect(&mut self) -> (ConnectionId, UnboundedReceiver<Outbound>) {
            self.next_connection += 1;
            let (h, rx) = handle(self.next_connection);
            let id = h.id();
            self.session.accept(h);
            (id, rx)
        }

        fn register(&mut self, name: &str) -> (ConnectionId, UnboundedReceiver<Outbound>) {
            let (id, rx) = self.connect();
            self.session
                .on_frame(id, Message::new("DebuggerId", json!({"debuggerId": name})));
            (id, rx)
        }

        fn events(&mut self) -> Vec<EngineEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }
    }

    fn methods(rx: &mut UnboundedReceiver<Outbound>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(outbound) = rx.try_recv() {
            match outbound {
                Outbound::Frame(bytes) => {
                    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                    out.push(value["method"].as_str().unwrap().to_string());
                }
                Outbound::Close => out.push("<close>".to_string()),
            }
        }
        out
    }

    fn breakpoint(line: u32) -> Request {
        Request::RequestBreakpoint {
            filename: "/a.py".to_string(),
            line,
            temporary: false,
            set_breakpoint: true,
            condition: None,
        }
    }

    #[test]
    fn idle_until_something_happens() {
        let h = Harness::new();
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[test]
    fn queued_commands_flush_once_to_main() {
        let mut h = Harness::new();
        for line in 1..=3 {
            assert_eq!(h.session.send(Target::All, breakpoint(line)), Delivery::Queued);
        }
        assert_eq!(h.session.state(), SessionState::AwaitingMain);

        let (main, mut rx) = h.register("id-1");
        assert_eq!(h.session.state(), SessionState::Active);
        assert_eq!(
            methods(&mut rx),
            [
                "RequestCapabilities",
                "RequestBreakpoint",
                "RequestBreakpoint",
                "RequestBreakpoint"
            ]
        );

        // a replayed identity neither promotes nor flushes again
        h.session
            .on_frame(main, Message::new("DebuggerId", json!({"debuggerId": "id-1"})));
        assert!(methods(&mut rx).is_empty());
        assert_eq!(
            h.events(),
            [EngineEvent::ClientConnected {
                debugger_id: DebuggerId::from("id-1"),
                is_main: true
            }]
        );
    }

    #[test]
    fn secondary_is_auto_continued_once() {
        let mut h = Harness::new();
        let (_main, mut main_rx) = h.register("main");
        let (second, mut second_rx) = h.register("child");

        assert_eq!(methods(&mut main_rx), ["RequestCapabilities"]);
        assert_eq!(methods(&mut second_rx), ["RequestContinue"]);

        h.session.on_frame(
            second,
            Message::new("DebuggerId", json!({"debuggerId": "child"})),
        );
        assert!(methods(&mut second_rx).is_empty());
        assert_eq!(h.session.snapshot().auto_continued, [DebuggerId::from("child")]);
    }

    #[test]
    fn no_auto_continue_while_stepping() {
        let mut h = Harness::new();
        let (_main, _main_rx) = h.register("main");
        h.session.send(Target::Main, Request::RequestStep {});

        let (_second, mut second_rx) = h.register("child");
        assert!(methods(&mut second_rx).is_empty());

        h.session.send(Target::Main, Request::RequestContinue { special: false });
        let (_third, mut third_rx) = h.register("grandchild");
        assert_eq!(methods(&mut third_rx), ["RequestContinue"]);
    }

    #[test]
    fn no_auto_continue_when_disabled() {
        let mut h = Harness::new();
        h.session.set_auto_continue(false);
        let (_main, _main_rx) = h.register("main");
        let (_second, mut second_rx) = h.register("child");
        assert!(methods(&mut second_rx).is_empty());
    }

    #[test]
    fn losing_main_keeps_secondary() {
        let mut h = Harness::new();
        let (main, _main_rx) = h.register("main");
        let (_second, _second_rx) = h.register("child");
        h.events();

        h.session.on_closed(main);

        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.main, None);
        assert_eq!(snapshot.live, [DebuggerId::from("child")]);
        assert_eq!(snapshot.state, SessionState::AwaitingMain);
        assert_eq!(
            h.events(),
            [EngineEvent::ClientDisconnected {
                debugger_id: DebuggerId::from("main"),
                was_main: true
            }]
        );
    }

    #[test]
    fn last_client_exit_resets() {
        let mut h = Harness::new();
        let (main, _main_rx) = h.register("main");
        let (second, _second_rx) = h.register("child");
        h.session.on_closed(main);
        // with no main, commands queue again
        h.session.send(Target::Main, Request::RequestStepOver {});
        h.events();

        h.session.on_closed(second);

        let events = h.events();
        assert_eq!(events.last(), Some(&EngineEvent::AllClientsExited));
        let snapshot = h.session.snapshot();
        assert!(snapshot.queued.is_empty());
        assert!(snapshot.auto_continued.is_empty());
        assert_eq!(snapshot.state, SessionState::Idle);
    }

    #[test]
    fn unregistered_frames_are_ignored() {
        let mut h = Harness::new();
        let (conn, _rx) = h.connect();

        h.session
            .on_frame(conn, Message::new("ClientOutput", json!({"text": "early"})));
        assert!(h.events().is_empty());
    }

    #[test]
    fn invalid_message_is_a_protocol_error() {
        let mut h = Harness::new();
        let (conn, _rx) = h.register("main");
        h.events();

        h.session
            .on_frame(conn, Message::new("NoSuchMethod", json!({})));
        h.session
            .on_frame(conn, Message::new("ResponseLine", json!({"stack": "nope"})));

        let events = h.events();
        assert_eq!(events.len(), 2);
        for event in events {
            assert!(matches!(
                event,
                EngineEvent::ProtocolError { debugger_id: Some(ref id), method: Some(_), .. }
                    if id.as_str() == "main"
            ));
        }
        assert_eq!(h.session.state(), SessionState::Active);
    }

    #[test]
    fn empty_stack_asks_for_threads() {
        let mut h = Harness::new();
        let (conn, mut rx) = h.register("main");
        methods(&mut rx);
        h.events();

        h.session
            .on_frame(conn, Message::new("ResponseStack", json!({"stack": []})));

        assert_eq!(methods(&mut rx), ["RequestThreadList"]);
        assert!(h.events().is_empty());
    }

    #[test]
    fn capabilities_cached_for_main_only() {
        let mut h = Harness::new();
        let (main, _main_rx) = h.register("main");
        let (second, _second_rx) = h.register("child");

        h.session.on_frame(
            second,
            Message::new("ResponseCapabilities", json!({"capabilities": 1, "clientType": "Python3"})),
        );
        assert_eq!(h.session.snapshot().capabilities, None);

        h.session.on_frame(
            main,
            Message::new("ResponseCapabilities", json!({"capabilities": 0x5f, "clientType": "Python3"})),
        );
        assert_eq!(
            h.session.snapshot().capabilities,
            Some(Capabilities::from_bits(0x5f))
        );
    }

    #[test]
    fn frame_variables_fetch_locals_after_globals() {
        let mut h = Harness::new();
        let (conn, mut rx) = h.register("main");
        methods(&mut rx);

        h.session
            .fetch_frame_variables(DebuggerId::from("main"), 0, Vec::new(), 0);
        assert_eq!(methods(&mut rx), ["RequestVariables"]);

        h.session.on_frame(
            conn,
            Message::new("ResponseVariables", json!({"scope": 1, "variables": []})),
        );
        assert_eq!(methods(&mut rx), ["RequestVariables"]);

        h.session.on_frame(
            conn,
            Message::new("ResponseVariables", json!({"scope": 0, "variables": []})),
        );
        assert!(methods(&mut rx).is_empty());
    }

    #[test]
    fn duplicate_identity_closes_previous_connection() {
        let mut h = Harness::new();
        let (_first, mut first_rx) = h.register("main");
        let (_second, mut second_rx) = h.register("main");

        assert_eq!(methods(&mut first_rx), ["RequestCapabilities", "<close>"]);
        assert!(methods(&mut second_rx).is_empty());
        assert_eq!(h.session.snapshot().live, [DebuggerId::from("main")]);
    }

    #[test]
    fn shutdown_drains_everything() {
        let mut h = Harness::new();
        let (main, mut main_rx) = h.register("main");
        let (pending, mut pending_rx) = h.connect();
        methods(&mut main_rx);

        h.session.shutdown();

        assert_eq!(methods(&mut main_rx), ["RequestShutdown", "<close>"]);
        assert_eq!(methods(&mut pending_rx), ["RequestShutdown", "<close>"]);
        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.state, SessionState::Draining);
        assert!(snapshot.live.is_empty());
        assert!(snapshot.queued.is_empty());

        h.session.on_closed(main);
        assert_eq!(h.session.state(), SessionState::Draining);
        h.session.on_closed(pending);
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.events().iter().all(|e| !matches!(e, EngineEvent::ClientDisconnected { .. })));

        let (_next, mut next_rx) = h.register("next");
        assert_eq!(methods(&mut next_rx), ["RequestCapabilities"]);
    }

    #[test]
    fn registration_refused_while_draining() {
        let mut h = Harness::new();
        let (main, _main_rx) = h.register("main");
        h.session.shutdown();
        h.events();

        let (late, mut late_rx) = h.register("late");
        assert_eq!(methods(&mut late_rx), ["RequestShutdown", "<close>"]);
        assert!(h.events().is_empty());
        assert_eq!(h.session.snapshot().main, None);

        h.session.on_closed(main);
        assert_eq!(h.session.state(), SessionState::Draining);
        h.session.on_closed(late);
        assert_eq!(h.session.state(), SessionState::Idle);
    }

    #[test]
    fn secondary_still_commanded_after_main_loss() {
        let mut h = Harness::new();
        let (main, _main_rx) = h.register("main");
        let (_child, mut child_rx) = h.register("child");
        methods(&mut child_rx);
        h.session.on_closed(main);

        let child = Target::Debugger(DebuggerId::from("child"));
        assert_eq!(h.session.send(child, Request::RequestStepOver {}), Delivery::Sent(1));
        assert_eq!(
            h.session.send(Target::All, Request::RequestSetNoDebugList { no_debug: Vec::new() }),
            Delivery::Sent(1)
        );
        assert_eq!(
            methods(&mut child_rx),
            ["RequestStepOver", "RequestSetNoDebugList"]
        );
        assert!(h.session.snapshot().queued.is_empty());

        // a new registrant becomes main and gets nothing meant for the child
        let (_other, mut other_rx) = h.register("other");
        assert_eq!(methods(&mut other_rx), ["RequestCapabilities"]);
    }

    #[test]
    fn registration_deadline() {
        let mut h = Harness::new();
        let token = h.session.arm_registration_deadline();
        assert_eq!(h.session.state(), SessionState::AwaitingMain);

        h.session.registration_deadline(token);
        assert_eq!(h.events(), [EngineEvent::RegistrationTimedOut]);
        assert_eq!(h.session.state(), SessionState::Idle);

        let token = h.session.arm_registration_deadline();
        let (_main, _rx) = h.register("main");
        h.events();
        h.session.registration_deadline(token);
        assert!(h.events().is_empty());
    }
}
