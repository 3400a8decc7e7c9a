//! Debugger communication engine.
//!
//! The [`Engine`] accepts connections from debug clients, registers them by
//! the identity they announce, queues commands until a main debugger is
//! available and reports everything the clients send as [`EngineEvent`]s.
//!
//! ```no_run
//! use debugger::{Engine, EngineConfig, EngineEvent};
//!
//! # async fn example() -> eyre::Result<()> {
//! let mut engine = Engine::start(EngineConfig::default()).await?;
//! engine.set_breakpoint("/src/app.py", 12, None, false)?;
//!
//! while let Some(event) = engine.events().recv().await {
//!     if let EngineEvent::AllClientsExited = event {
//!         break;
//!     }
//! }
//! engine.close().await
//! # }
//! ```
mod connection;
pub mod coordinator;
pub mod dispatcher;
mod engine;
mod event;
pub mod path_translator;
pub mod queue;
pub mod registry;
pub mod router;
mod types;
pub mod variables;

pub use coordinator::{SessionSnapshot, SessionState};
pub use dispatcher::Delivery;
pub use engine::{Engine, EngineConfig, LoadOptions};
pub use event::{CallTracePoint, ClientEvent, EngineEvent, EventReceiver, StackFrame};
pub use path_translator::{PathTranslator, PrefixRewrite};
pub use types::{Capabilities, ConnectionId, DebuggerId, Target};

pub use transport::requests::{ForkTarget, ProgramArguments, Scope};
