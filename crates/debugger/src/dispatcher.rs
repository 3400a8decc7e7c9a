//! Outbound command delivery.

use bytes::Bytes;
use transport::requests::Request;
use transport::{CodecError, OutgoingMessage};

use crate::path_translator::PathTranslator;
use crate::queue::CommandQueue;
use crate::registry::Registry;
use crate::types::Target;

/// What happened to a dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to this many connection writers.
    Sent(usize),
    /// Held until a main debugger registers.
    Queued,
    /// The target identity is not connected.
    Dropped,
}

/// Translate outbound file names and serialize a request.
pub fn encode(request: Request, translator: &PathTranslator) -> Result<Bytes, CodecError> {
    let request = request.map_paths(|path| translator.to_remote(path));
    OutgoingMessage::new(request).to_payload()
}

/// Deliver an encoded command to `target`.
///
/// A connected identity is written to immediately, and a broadcast reaches
/// every live debugger. Commands for the main debugger wait in the queue
/// while there is none, as does anything sent while no debugger is live.
pub fn dispatch(
    registry: &Registry,
    queue: &mut CommandQueue,
    target: &Target,
    method: &'static str,
    payload: Bytes,
) -> Delivery {
    match target {
        Target::Main => match registry.main_handle() {
            Some(handle) => Delivery::Sent(usize::from(handle.send(payload))),
            None => {
                tracing::debug!(method, "no main debugger, queueing command");
                queue.push(method, payload);
                Delivery::Queued
            }
        },
        Target::Debugger(id) => match registry.resolve(id) {
            Some(handle) => Delivery::Sent(usize::from(handle.send(payload))),
            None if registry.main().is_none() => {
                tracing::debug!(debugger_id = %id, method, "debugger not connected yet, queueing command");
                queue.push(method, payload);
                Delivery::Queued
            }
            None => {
                tracing::warn!(debugger_id = %id, method, "unknown debugger, dropping command");
                Delivery::Dropped
            }
        },
        Target::All if registry.live_count() == 0 => {
            tracing::debug!(method, "no live debuggers, queueing broadcast");
            queue.push(method, payload);
            Delivery::Queued
        }
        Target::All => {
            let sent = registry
                .live()
                .filter(|(_, handle)| handle.send(payload.clone()))
                .count();
            Delivery::Sent(sent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::handle;
    use crate::registry::Outbound;
    use crate::types::{ConnectionId, DebuggerId};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn frames(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Ok(Outbound::Frame(bytes)) = rx.try_recv() {
            out.push(bytes);
        }
        out
    }

    #[test]
    fn queues_without_main() {
        let registry = Registry::default();
        let mut queue = CommandQueue::default();

        for target in [Target::Main, Target::All, Target::Debugger(DebuggerId::from("x"))] {
            let delivery = dispatch(&registry, &mut queue, &target, "RequestStep", Bytes::new());
            assert_eq!(delivery, Delivery::Queued);
        }
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn sends_to_main_and_specific_targets() {
        let mut registry = Registry::default();
        let mut queue = CommandQueue::default();
        let (a, mut ra) = handle(1);
        let (b, mut rb) = handle(2);
        registry.accept(a);
        registry.accept(b);
        registry.register(ConnectionId(1), DebuggerId::from("a"));
        registry.register(ConnectionId(2), DebuggerId::from("b"));

        dispatch(&registry, &mut queue, &Target::Main, "m", Bytes::from_static(b"main"));
        dispatch(
            &registry,
            &mut queue,
            &Target::Debugger(DebuggerId::from("b")),
            "m",
            Bytes::from_static(b"only-b"),
        );

        assert_eq!(frames(&mut ra), [Bytes::from_static(b"main")]);
        assert_eq!(frames(&mut rb), [Bytes::from_static(b"only-b")]);
        assert!(queue.is_empty());
    }

    #[test]
    fn broadcast_reaches_every_live_debugger() {
        let mut registry = Registry::default();
        let mut queue = CommandQueue::default();
        let (a, mut ra) = handle(1);
        let (b, mut rb) = handle(2);
        registry.accept(a);
        registry.accept(b);
        registry.register(ConnectionId(1), DebuggerId::from("a"));
        registry.register(ConnectionId(2), DebuggerId::from("b"));

        let delivery = dispatch(&registry, &mut queue, &Target::All, "m", Bytes::from_static(b"bp"));

        assert_eq!(delivery, Delivery::Sent(2));
        assert_eq!(frames(&mut ra).len(), 1);
        assert_eq!(frames(&mut rb).len(), 1);
    }

    #[test]
    fn secondaries_are_reachable_without_main() {
        let mut registry = Registry::default();
        let mut queue = CommandQueue::default();
        let (a, _ra) = handle(1);
        let (b, mut rb) = handle(2);
        registry.accept(a);
        registry.accept(b);
        registry.register(ConnectionId(1), DebuggerId::from("main"));
        registry.register(ConnectionId(2), DebuggerId::from("child"));
        registry.remove_connection(ConnectionId(1));
        assert_eq!(registry.main(), None);

        let child = Target::Debugger(DebuggerId::from("child"));
        let stepped = dispatch(&registry, &mut queue, &child, "RequestStepOver", Bytes::from_static(b"step"));
        let broadcast = dispatch(&registry, &mut queue, &Target::All, "RequestSetNoDebugList", Bytes::from_static(b"bc"));
        let to_main = dispatch(&registry, &mut queue, &Target::Main, "RequestStep", Bytes::from_static(b"main"));

        assert_eq!(stepped, Delivery::Sent(1));
        assert_eq!(broadcast, Delivery::Sent(1));
        assert_eq!(to_main, Delivery::Queued);
        assert_eq!(frames(&mut rb), [Bytes::from_static(b"step"), Bytes::from_static(b"bc")]);
        assert_eq!(queue.methods().collect::<Vec<_>>(), ["RequestStep"]);
    }

    #[test]
    fn unknown_debugger_is_dropped() {
        let mut registry = Registry::default();
        let mut queue = CommandQueue::default();
        let (a, _ra) = handle(1);
        registry.accept(a);
        registry.register(ConnectionId(1), DebuggerId::from("a"));

        let delivery = dispatch(
            &registry,
            &mut queue,
            &Target::Debugger(DebuggerId::from("ghost")),
            "m",
            Bytes::new(),
        );
        assert_eq!(delivery, Delivery::Dropped);
        assert!(queue.is_empty());
    }

    #[test]
    fn encode_translates_file_names() {
        let translator = PathTranslator::prefix("/srv", "/home/me", false);
        let payload = encode(
            Request::RequestBreakpointEnable {
                filename: "/home/me/a.py".to_string(),
                line: 1,
                enable: false,
            },
            &translator,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["params"]["filename"], "/srv/a.py");
    }
}
