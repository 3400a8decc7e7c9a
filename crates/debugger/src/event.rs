use serde_json::Value;
use tokio::sync::mpsc;
use transport::events::ThreadInfo;

use crate::types::{Capabilities, DebuggerId};

/// One frame of a reported stack, with a local file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub filename: String,
    pub line: u32,
    pub function: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTracePoint {
    pub filename: String,
    pub line: u32,
    pub function: String,
}

/// Something a debug client reported.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Output {
        text: String,
    },
    LineReached {
        stack: Vec<StackFrame>,
        thread_name: String,
    },
    StackSnapshot {
        stack: Vec<StackFrame>,
        thread_name: String,
    },
    CallTrace {
        is_call: bool,
        from: CallTracePoint,
        to: CallTracePoint,
    },
    Variables {
        scope: i64,
        variables: Vec<Value>,
    },
    Variable {
        scope: i64,
        variable: Vec<Value>,
    },
    ThreadList {
        current_id: i64,
        threads: Vec<ThreadInfo>,
    },
    ThreadSet,
    Exception {
        exception_type: String,
        message: String,
        stack: Vec<StackFrame>,
        thread_name: String,
    },
    SyntaxError {
        message: String,
        filename: String,
        line: u32,
        column: u32,
        thread_name: String,
    },
    Signal {
        message: String,
        filename: String,
        line: u32,
        function: String,
        arguments: String,
    },
    BreakpointCleared {
        filename: String,
        line: u32,
    },
    BreakpointConditionError {
        filename: String,
        line: u32,
    },
    WatchCleared {
        condition: String,
    },
    WatchConditionError {
        condition: String,
    },
    Exited {
        program: String,
        status: i32,
        message: String,
    },
    Capabilities {
        capabilities: Capabilities,
        client_type: String,
    },
    Banner {
        version: String,
        platform: String,
        client: String,
    },
    StatementOk,
    StatementContinue,
    RawInputRequested {
        prompt: String,
        echo: bool,
    },
    ForkRequested,
    Completions {
        completions: Vec<String>,
        text: String,
    },
    PassiveStartup {
        filename: String,
        report_all_exceptions: bool,
    },
}

/// Everything the engine reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ClientConnected {
        debugger_id: DebuggerId,
        is_main: bool,
    },
    Client {
        debugger_id: DebuggerId,
        event: ClientEvent,
    },
    ClientDisconnected {
        debugger_id: DebuggerId,
        was_main: bool,
    },
    /// The last live debugger went away.
    AllClientsExited,
    /// A launched client did not register in time.
    RegistrationTimedOut,
    /// A frame could not be understood. The connection stays open.
    ProtocolError {
        debugger_id: Option<DebuggerId>,
        method: Option<String>,
        message: String,
    },
}

impl EngineEvent {
    pub fn debugger_id(&self) -> Option<&DebuggerId> {
        match self {
            EngineEvent::ClientConnected { debugger_id, .. }
            | EngineEvent::Client { debugger_id, .. }
            | EngineEvent::ClientDisconnected { debugger_id, .. } => Some(debugger_id),
            EngineEvent::ProtocolError { debugger_id, .. } => debugger_id.as_ref(),
            EngineEvent::AllClientsExited | EngineEvent::RegistrationTimedOut => None,
        }
    }
}

/// Receiving end of the engine's event channel.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl EventReceiver {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<EngineEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next event, or `None` once the engine has stopped.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        self.rx.recv().await
    }

    /// Receive an event if one is already waiting.
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }

    /// Convert to a Stream for use with StreamExt
    pub fn into_stream(self) -> impl futures::Stream<Item = EngineEvent> {
        tokio_stream::wrappers::UnboundedReceiverStream::new(self.rx)
    }
}
