use std::fmt;

/// Identity a debug client announces in its first frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DebuggerId(String);

impl DebuggerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DebuggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DebuggerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DebuggerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Engine-assigned id for an accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a command is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The main debugger, queued until one registers.
    Main,
    /// One specific debugger.
    Debugger(DebuggerId),
    /// Every live debugger.
    All,
}

impl From<DebuggerId> for Target {
    fn from(id: DebuggerId) -> Self {
        Target::Debugger(id)
    }
}

/// Feature bits reported by a debug client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const DEBUGGER: u32 = 0x01;
    pub const INTERPRETER: u32 = 0x02;
    pub const PROFILER: u32 = 0x04;
    pub const COVERAGE: u32 = 0x08;
    pub const COMPLETER: u32 = 0x10;
    pub const SHELL: u32 = 0x40;

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    pub fn has_debugger(&self) -> bool {
        self.contains(Self::DEBUGGER)
    }

    pub fn has_interpreter(&self) -> bool {
        self.contains(Self::INTERPRETER)
    }

    pub fn has_profiler(&self) -> bool {
        self.contains(Self::PROFILER)
    }

    pub fn has_coverage(&self) -> bool {
        self.contains(Self::COVERAGE)
    }

    pub fn has_completer(&self) -> bool {
        self.contains(Self::COMPLETER)
    }

    pub fn has_shell(&self) -> bool {
        self.contains(Self::SHELL)
    }
}
