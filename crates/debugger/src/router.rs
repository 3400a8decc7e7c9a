//! Inbound message routing.

use transport::events::{CallTraceLocation, ClientMessage, StackEntry};

use crate::event::{CallTracePoint, ClientEvent, StackFrame};
use crate::path_translator::PathTranslator;
use crate::types::{Capabilities, DebuggerId};

/// What the engine should do with an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// The connection announced its identity.
    Identify(DebuggerId),
    Event(ClientEvent),
    /// The client reported an empty stack; ask it for its threads instead.
    RequestThreadList,
}

fn frames(stack: Vec<StackEntry>, translator: &PathTranslator) -> Vec<StackFrame> {
    stack
        .into_iter()
        .map(|StackEntry(filename, line, function, arguments)| StackFrame {
            filename: translator.to_local(&filename),
            line,
            function,
            arguments,
        })
        .collect()
}

fn trace_point(location: CallTraceLocation, translator: &PathTranslator) -> CallTracePoint {
    CallTracePoint {
        filename: translator.to_local(&location.filename),
        line: location.linenumber,
        function: location.codename,
    }
}

/// Turn a decoded message into an engine action, translating file names.
pub fn route(message: ClientMessage, translator: &PathTranslator) -> Routed {
    let local = |path: &str| translator.to_local(path);

    let event = match message {
        ClientMessage::DebuggerId { debugger_id } => {
            return Routed::Identify(DebuggerId::from(debugger_id));
        }
        ClientMessage::ResponseLine { stack, .. } | ClientMessage::ResponseStack { stack, .. }
            if stack.is_empty() =>
        {
            return Routed::RequestThreadList;
        }
        ClientMessage::ClientOutput { text } => ClientEvent::Output { text },
        ClientMessage::ResponseLine { stack, thread_name } => ClientEvent::LineReached {
            stack: frames(stack, translator),
            thread_name,
        },
        ClientMessage::ResponseStack { stack, thread_name } => ClientEvent::StackSnapshot {
            stack: frames(stack, translator),
            thread_name,
        },
        ClientMessage::CallTrace { event, from, to } => ClientEvent::CallTrace {
            is_call: event == "c",
            from: trace_point(from, translator),
            to: trace_point(to, translator),
        },
        ClientMessage::ResponseVariables { scope, variables } => {
            ClientEvent::Variables { scope, variables }
        }
        ClientMessage::ResponseVariable { scope, variable } => {
            ClientEvent::Variable { scope, variable }
        }
        ClientMessage::ResponseThreadList {
            current_id,
            thread_list,
        } => ClientEvent::ThreadList {
            current_id,
            threads: thread_list,
        },
        ClientMessage::ResponseThreadSet {} => ClientEvent::ThreadSet,
        ClientMessage::ResponseCapabilities {
            capabilities,
            client_type,
        } => ClientEvent::Capabilities {
            capabilities: Capabilities::from_bits(capabilities),
            client_type,
        },
        ClientMessage::ResponseBanner {
            version,
            platform,
            dbgclient,
        } => ClientEvent::Banner {
            version,
            platform,
            client: dbgclient,
        },
        ClientMessage::ResponseOk {} => ClientEvent::StatementOk,
        ClientMessage::ResponseContinue {} => ClientEvent::StatementContinue,
        ClientMessage::RequestRaw { prompt, echo } => ClientEvent::RawInputRequested { prompt, echo },
        ClientMessage::ResponseException {
            exception_type,
            message,
            stack,
            thread_name,
        } => ClientEvent::Exception {
            exception_type,
            message,
            stack: frames(stack, translator),
            thread_name,
        },
        ClientMessage::ResponseSyntax {
            message,
            filename,
            linenumber,
            characternumber,
            thread_name,
        } => ClientEvent::SyntaxError {
            message,
            filename: local(&filename),
            line: linenumber,
            column: characternumber,
            thread_name,
        },
        ClientMessage::ResponseSignal {
            message,
            filename,
            linenumber,
            function,
            arguments,
        } => ClientEvent::Signal {
            message,
            filename: local(&filename),
            line: linenumber,
            function,
            arguments,
        },
        ClientMessage::ResponseExit {
            program,
            status,
            message,
        } => ClientEvent::Exited {
            program: local(&program),
            status,
            message,
        },
        ClientMessage::PassiveStartup {
            filename,
            report_all_exceptions,
        } => ClientEvent::PassiveStartup {
            filename: local(&filename),
            report_all_exceptions,
        },
        ClientMessage::ResponseClearBreakpoint { filename, line } => {
            ClientEvent::BreakpointCleared {
                filename: local(&filename),
                line,
            }
        }
        ClientMessage::ResponseBpConditionError { filename, line } => {
            ClientEvent::BreakpointConditionError {
                filename: local(&filename),
                line,
            }
        }
        ClientMessage::ResponseClearWatch { condition } => ClientEvent::WatchCleared { condition },
        ClientMessage::ResponseWatchConditionError { condition } => {
            ClientEvent::WatchConditionError { condition }
        }
        ClientMessage::ResponseCompletion { completions, text } => {
            ClientEvent::Completions { completions, text }
        }
        ClientMessage::RequestForkTo {} => ClientEvent::ForkRequested,
    };
    Routed::Event(event)
}
