//! Two-phase variable fetch.
//!
//! Fetching the variables of a frame asks for globals first and, once the
//! globals arrive from the same debugger, for the locals of that frame.

use std::collections::HashMap;

use transport::requests::{Request, Scope};

use crate::types::DebuggerId;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingLocals {
    frame_number: u32,
    filters: Vec<String>,
    max_size: u32,
}

/// Per-debugger state of outstanding frame fetches.
#[derive(Debug, Default)]
pub struct VariableFetches {
    awaiting_globals: HashMap<DebuggerId, PendingLocals>,
}

impl VariableFetches {
    /// Begin a fetch and return the globals request.
    pub fn start(
        &mut self,
        debugger_id: DebuggerId,
        frame_number: u32,
        filters: Vec<String>,
        max_size: u32,
    ) -> Request {
        let request = Request::RequestVariables {
            frame_number,
            scope: Scope::Globals,
            filters: filters.clone(),
            max_size,
        };
        self.awaiting_globals.insert(
            debugger_id,
            PendingLocals {
                frame_number,
                filters,
                max_size,
            },
        );
        request
    }

    /// Record a variables response. Returns the locals request when this
    /// completes the globals phase of a fetch.
    pub fn on_response(&mut self, debugger_id: &DebuggerId, scope: i64) -> Option<Request> {
        if Scope::from_wire(scope) != Some(Scope::Globals) {
            return None;
        }
        let pending = self.awaiting_globals.remove(debugger_id)?;
        Some(Request::RequestVariables {
            frame_number: pending.frame_number,
            scope: Scope::Locals,
            filters: pending.filters,
            max_size: pending.max_size,
        })
    }

    pub fn is_pending(&self, debugger_id: &DebuggerId) -> bool {
        self.awaiting_globals.contains_key(debugger_id)
    }

    pub fn forget(&mut self, debugger_id: &DebuggerId) {
        self.awaiting_globals.remove(debugger_id);
    }

    pub fn clear(&mut self) {
        self.awaiting_globals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_then_locals() {
        let mut fetches = VariableFetches::default();
        let id = DebuggerId::from("a");

        let first = fetches.start(id.clone(), 2, vec!["__.*".to_string()], 256);
        assert!(matches!(
            first,
            Request::RequestVariables { scope: Scope::Globals, frame_number: 2, .. }
        ));
        assert!(fetches.is_pending(&id));

        let second = fetches.on_response(&id, 1).unwrap();
        assert_eq!(
            second,
            Request::RequestVariables {
                frame_number: 2,
                scope: Scope::Locals,
                filters: vec!["__.*".to_string()],
                max_size: 256,
            }
        );
        assert!(!fetches.is_pending(&id));

        // the locals response ends the fetch
        assert_eq!(fetches.on_response(&id, 0), None);
    }

    #[test]
    fn unsolicited_globals_are_ignored() {
        let mut fetches = VariableFetches::default();
        assert_eq!(fetches.on_response(&DebuggerId::from("a"), 1), None);
    }

    #[test]
    fn phases_are_per_debugger() {
        let mut fetches = VariableFetches::default();
        let a = DebuggerId::from("a");
        let b = DebuggerId::from("b");
        fetches.start(a.clone(), 0, Vec::new(), 0);

        assert_eq!(fetches.on_response(&b, 1), None);
        assert!(fetches.on_response(&a, 1).is_some());
    }
}
