//! Requests sent from the controller to a debug client.

use serde::Serialize;

/// Which half of a forking process the client should keep following.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkTarget {
    Parent,
    Child,
}

/// Variable scope selector used by the variable requests.
///
/// The client reports globals for scope `1` and locals for scope `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i32")]
pub enum Scope {
    Locals,
    Globals,
}

impl From<Scope> for i32 {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Locals => 0,
            Scope::Globals => 1,
        }
    }
}

impl Scope {
    pub fn from_wire(scope: i64) -> Option<Self> {
        match scope {
            0 => Some(Scope::Locals),
            1 => Some(Scope::Globals),
            _ => None,
        }
    }
}

/// Arguments shared by the load/run/coverage/profile requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramArguments {
    pub workdir: String,
    pub filename: String,
    pub argv: Vec<String>,
}

/// Every request the controller can send.
///
/// Serialized as `{"method": <variant>, "params": {...}}`; variants without
/// fields still carry an empty `params` object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", content = "params", rename_all_fields = "camelCase")]
pub enum Request {
    RequestLoad {
        #[serde(flatten)]
        program: ProgramArguments,
        trace_interpreter: bool,
        multiprocess: bool,
        report_exceptions: bool,
    },
    RequestRun {
        #[serde(flatten)]
        program: ProgramArguments,
        auto_fork: bool,
        fork_child: bool,
    },
    RequestCoverage {
        #[serde(flatten)]
        program: ProgramArguments,
        erase: bool,
    },
    RequestProfile {
        #[serde(flatten)]
        program: ProgramArguments,
        erase: bool,
    },
    RequestStep {},
    RequestStepOver {},
    RequestStepOut {},
    RequestStepQuit {},
    RequestContinue {
        special: bool,
    },
    RequestContinueUntil {
        new_line: u32,
    },
    #[serde(rename = "RequestMoveIP")]
    RequestMoveIp {
        new_line: u32,
    },
    RequestBreakpoint {
        filename: String,
        line: u32,
        temporary: bool,
        set_breakpoint: bool,
        condition: Option<String>,
    },
    RequestBreakpointEnable {
        filename: String,
        line: u32,
        enable: bool,
    },
    RequestBreakpointIgnore {
        filename: String,
        line: u32,
        count: u32,
    },
    RequestWatch {
        condition: String,
        temporary: bool,
        set_watch: bool,
    },
    RequestWatchEnable {
        condition: String,
        enable: bool,
    },
    RequestWatchIgnore {
        condition: String,
        count: u32,
    },
    RequestVariables {
        frame_number: u32,
        scope: Scope,
        filters: Vec<String>,
        max_size: u32,
    },
    RequestVariable {
        variable: Vec<String>,
        frame_number: u32,
        scope: Scope,
        filters: Vec<String>,
        max_size: u32,
    },
    RequestThreadList {},
    RequestThreadSet {
        #[serde(rename = "threadID")]
        thread_id: i64,
    },
    RequestCapabilities {},
    RequestBanner {},
    RequestSetNoDebugList {
        no_debug: Vec<String>,
    },
    RequestSetFilter {
        scope: Scope,
        filter: Vec<String>,
    },
    RequestCallTrace {
        enable: bool,
    },
    RequestCompletion {
        text: String,
    },
    ExecuteStatement {
        statement: String,
    },
    RawInput {
        input: String,
    },
    ResponseForkTo {
        target: ForkTarget,
    },
    RequestShutdown {},
}

impl Request {
    /// The wire method name.
    pub fn method(&self) -> &'static str {
        match self {
            Request::RequestLoad { .. } => "RequestLoad",
            Request::RequestRun { .. } => "RequestRun",
            Request::RequestCoverage { .. } => "RequestCoverage",
            Request::RequestProfile { .. } => "RequestProfile",
            Request::RequestStep {} => "RequestStep",
            Request::RequestStepOver {} => "RequestStepOver",
            Request::RequestStepOut {} => "RequestStepOut",
            Request::RequestStepQuit {} => "RequestStepQuit",
            Request::RequestContinue { .. } => "RequestContinue",
            Request::RequestContinueUntil { .. } => "RequestContinueUntil",
            Request::RequestMoveIp { .. } => "RequestMoveIP",
            Request::RequestBreakpoint { .. } => "RequestBreakpoint",
            Request::RequestBreakpointEnable { .. } => "RequestBreakpointEnable",
            Request::RequestBreakpointIgnore { .. } => "RequestBreakpointIgnore",
            Request::RequestWatch { .. } => "RequestWatch",
            Request::RequestWatchEnable { .. } => "RequestWatchEnable",
            Request::RequestWatchIgnore { .. } => "RequestWatchIgnore",
            Request::RequestVariables { .. } => "RequestVariables",
            Request::RequestVariable { .. } => "RequestVariable",
            Request::RequestThreadList {} => "RequestThreadList",
            Request::RequestThreadSet { .. } => "RequestThreadSet",
            Request::RequestCapabilities {} => "RequestCapabilities",
            Request::RequestBanner {} => "RequestBanner",
            Request::RequestSetNoDebugList { .. } => "RequestSetNoDebugList",
            Request::RequestSetFilter { .. } => "RequestSetFilter",
            Request::RequestCallTrace { .. } => "RequestCallTrace",
            Request::RequestCompletion { .. } => "RequestCompletion",
            Request::ExecuteStatement { .. } => "ExecuteStatement",
            Request::RawInput { .. } => "RawInput",
            Request::ResponseForkTo { .. } => "ResponseForkTo",
            Request::RequestShutdown {} => "RequestShutdown",
        }
    }

    /// Single-step requests; while one is outstanding new child processes
    /// are left stopped.
    pub fn is_step(&self) -> bool {
        matches!(
            self,
            Request::RequestStep {} | Request::RequestStepOver {} | Request::RequestStepOut {}
        )
    }

    /// Requests that let the program run freely.
    pub fn is_resume(&self) -> bool {
        matches!(
            self,
            Request::RequestLoad { .. }
                | Request::RequestRun { .. }
                | Request::RequestCoverage { .. }
                | Request::RequestProfile { .. }
                | Request::RequestContinue { .. }
                | Request::RequestContinueUntil { .. }
        )
    }

    /// Rewrite every file system path carried by this request.
    pub fn map_paths(mut self, f: impl Fn(&str) -> String) -> Self {
        match &mut self {
            Request::RequestLoad { program, .. }
            | Request::RequestRun { program, .. }
            | Request::RequestCoverage { program, .. }
            | Request::RequestProfile { program, .. } => {
                program.workdir = f(&program.workdir);
                program.filename = f(&program.filename);
            }
            Request::RequestBreakpoint { filename, .. }
            | Request::RequestBreakpointEnable { filename, .. }
            | Request::RequestBreakpointIgnore { filename, .. } => {
                *filename = f(filename);
            }
            _ => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_value(request: &Request) -> serde_json::Value {
        serde_json::to_value(request).unwrap()
    }

    #[test]
    fn breakpoint_field_names() {
        let request = Request::RequestBreakpoint {
            filename: "/src/app.py".to_string(),
            line: 12,
            temporary: false,
            set_breakpoint: true,
            condition: Some("x > 1".to_string()),
        };

        assert_eq!(
            to_value(&request),
            json!({
                "method": "RequestBreakpoint",
                "params": {
                    "filename": "/src/app.py",
                    "line": 12,
                    "temporary": false,
                    "setBreakpoint": true,
                    "condition": "x > 1",
                }
            })
        );
    }

    #[test]
    fn load_flattens_program_arguments() {
        let request = Request::RequestLoad {
            program: ProgramArguments {
                workdir: "/src".to_string(),
                filename: "/src/app.py".to_string(),
                argv: vec!["--verbose".to_string()],
            },
            trace_interpreter: false,
            multiprocess: true,
            report_exceptions: true,
        };

        let value = to_value(&request);
        assert_eq!(value["params"]["workdir"], "/src");
        assert_eq!(value["params"]["argv"], json!(["--verbose"]));
        assert_eq!(value["params"]["traceInterpreter"], false);
        assert_eq!(value["params"]["multiprocess"], true);
    }

    #[test]
    fn renamed_methods_and_fields() {
        assert_eq!(
            to_value(&Request::RequestMoveIp { new_line: 4 }),
            json!({"method": "RequestMoveIP", "params": {"newLine": 4}})
        );
        assert_eq!(
            to_value(&Request::RequestThreadSet { thread_id: 7 }),
            json!({"method": "RequestThreadSet", "params": {"threadID": 7}})
        );
        assert_eq!(
            to_value(&Request::ResponseForkTo {
                target: ForkTarget::Child
            }),
            json!({"method": "ResponseForkTo", "params": {"target": "child"}})
        );
    }

    #[test]
    fn variables_scope_is_numeric() {
        let request = Request::RequestVariables {
            frame_number: 0,
            scope: Scope::Globals,
            filters: vec![],
            max_size: 0,
        };
        assert_eq!(to_value(&request)["params"]["scope"], 1);
        assert_eq!(to_value(&request)["params"]["frameNumber"], 0);
    }

    #[test]
    fn method_matches_serialized_tag() {
        let requests = [
            Request::RequestStep {},
            Request::RequestMoveIp { new_line: 1 },
            Request::RequestShutdown {},
            Request::RequestContinue { special: true },
        ];
        for request in requests {
            assert_eq!(to_value(&request)["method"], request.method());
        }
    }

    #[test]
    fn map_paths_rewrites_file_names() {
        let request = Request::RequestBreakpointEnable {
            filename: "/local/app.py".to_string(),
            line: 3,
            enable: true,
        }
        .map_paths(|p| p.replace("/local", "/remote"));

        assert!(matches!(
            request,
            Request::RequestBreakpointEnable { ref filename, .. } if filename == "/remote/app.py"
        ));
    }

    #[test]
    fn step_classification() {
        assert!(Request::RequestStepOver {}.is_step());
        assert!(!Request::RequestStepOver {}.is_resume());
        assert!(Request::RequestContinue { special: false }.is_resume());
        assert!(!Request::RequestThreadList {}.is_step());
    }
}
