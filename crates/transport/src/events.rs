//! Messages sent from a debug client to the controller.
//!
//! [`ClientMessage`] is the closed set of inbound methods. A [`Message`] read
//! off the wire is converted once, and everything downstream matches on the
//! enum.

use serde::Deserialize;
use serde_json::Value;

use crate::message::Message;

/// One entry of a reported stack: `[filename, line, function, arguments]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StackEntry(pub String, pub u32, pub String, pub String);

impl StackEntry {
    pub fn filename(&self) -> &str {
        &self.0
    }

    pub fn line(&self) -> u32 {
        self.1
    }

    pub fn function(&self) -> &str {
        &self.2
    }

    pub fn arguments(&self) -> &str {
        &self.3
    }
}

/// One end of a call trace record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallTraceLocation {
    pub filename: String,
    pub linenumber: u32,
    pub codename: String,
}

/// Thread description from a thread list response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadInfo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub broken: bool,
    #[serde(default)]
    pub except: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "method",
    content = "params",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    DebuggerId {
        debugger_id: String,
    },
    ClientOutput {
        text: String,
    },
    ResponseLine {
        stack: Vec<StackEntry>,
        #[serde(default)]
        thread_name: String,
    },
    ResponseStack {
        stack: Vec<StackEntry>,
        #[serde(default)]
        thread_name: String,
    },
    CallTrace {
        event: String,
        from: CallTraceLocation,
        to: CallTraceLocation,
    },
    ResponseVariables {
        scope: i64,
        variables: Vec<Value>,
    },
    ResponseVariable {
        scope: i64,
        variable: Vec<Value>,
    },
    ResponseThreadList {
        #[serde(rename = "currentID")]
        current_id: i64,
        thread_list: Vec<ThreadInfo>,
    },
    ResponseThreadSet {},
    ResponseCapabilities {
        capabilities: u32,
        client_type: String,
    },
    ResponseBanner {
        version: String,
        platform: String,
        #[serde(default)]
        dbgclient: String,
    },
    #[serde(rename = "ResponseOK")]
    ResponseOk {},
    ResponseContinue {},
    RequestRaw {
        prompt: String,
        #[serde(default = "default_echo")]
        echo: bool,
    },
    ResponseException {
        #[serde(rename = "type", default)]
        exception_type: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        stack: Vec<StackEntry>,
        #[serde(default)]
        thread_name: String,
    },
    ResponseSyntax {
        message: String,
        filename: String,
        linenumber: u32,
        characternumber: u32,
        #[serde(default)]
        thread_name: String,
    },
    ResponseSignal {
        message: String,
        filename: String,
        linenumber: u32,
        function: String,
        arguments: String,
    },
    ResponseExit {
        #[serde(default)]
        program: String,
        status: i32,
        #[serde(default)]
        message: String,
    },
    PassiveStartup {
        filename: String,
        #[serde(default)]
        report_all_exceptions: bool,
    },
    ResponseClearBreakpoint {
        filename: String,
        line: u32,
    },
    #[serde(rename = "ResponseBPConditionError")]
    ResponseBpConditionError {
        filename: String,
        line: u32,
    },
    ResponseClearWatch {
        condition: String,
    },
    ResponseWatchConditionError {
        condition: String,
    },
    ResponseCompletion {
        completions: Vec<String>,
        text: String,
    },
    RequestForkTo {},
}

fn default_echo() -> bool {
    true
}

/// Failure to turn a well-formed [`Message`] into a [`ClientMessage`].
#[derive(Debug, thiserror::Error)]
#[error("invalid {method} message: {source}")]
pub struct InvalidMessage {
    pub method: String,
    #[source]
    pub source: serde_json::Error,
}

impl TryFrom<Message> for ClientMessage {
    type Error = InvalidMessage;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        let Message { method, params, .. } = message;
        let mut envelope = serde_json::Map::with_capacity(2);
        envelope.insert("method".to_string(), Value::String(method.clone()));
        envelope.insert("params".to_string(), Value::Object(params));

        serde_json::from_value(Value::Object(envelope))
            .map_err(|source| InvalidMessage { method, source })
    }
}
