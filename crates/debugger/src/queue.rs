use std::collections::VecDeque;

use bytes::Bytes;

/// A serialized command waiting for the main debugger.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    pub method: &'static str,
    pub payload: Bytes,
}

/// Commands issued before any main debugger registered, in call order.
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: VecDeque<QueuedCommand>,
}

impl CommandQueue {
    pub fn push(&mut self, method: &'static str, payload: Bytes) {
        self.entries.push_back(QueuedCommand { method, payload });
    }

    /// Remove every queued command, oldest first.
    pub fn take_all(&mut self) -> Vec<QueuedCommand> {
        self.entries.drain(..).collect()
    }

    /// Drop every queued command and return how many there were.
    pub fn clear(&mut self) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        discarded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn methods(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|c| c.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_all_preserves_order_and_empties() {
        let mut queue = CommandQueue::default();
        queue.push("RequestBreakpoint", Bytes::from_static(b"1"));
        queue.push("RequestLoad", Bytes::from_static(b"2"));
        queue.push("RequestBreakpoint", Bytes::from_static(b"3"));

        let drained: Vec<_> = queue.take_all().into_iter().map(|c| c.payload).collect();
        assert_eq!(drained, ["1", "2", "3"].map(|s| Bytes::from(s.as_bytes().to_vec())));
        assert!(queue.is_empty());
        assert!(queue.take_all().is_empty());
    }

    #[test]
    fn clear_reports_discarded() {
        let mut queue = CommandQueue::default();
        queue.push("RequestStep", Bytes::new());
        queue.push("RequestStep", Bytes::new());

        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.len(), 0);
    }
}
