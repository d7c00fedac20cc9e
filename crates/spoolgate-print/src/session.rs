// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session registry for the streaming transport.
//
// Maps live connection identifiers to their outbound message handle so
// inbound messages can be routed to the correct caller. This is the only
// mutable state shared across invocations; everything else in the pipeline
// is read-only configuration.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, info};

use spoolgate_core::types::SessionId;

/// Outbound handle for one session: serialized reply lines, delivered in
/// the order they were sent.
pub type SessionHandle = mpsc::UnboundedSender<String>;

/// Concurrency-safe identifier → handle table.
///
/// Safe under arbitrarily interleaved opens, closes, and messages; an entry
/// removed by `unregister` is simply absent on the next lookup — messages
/// for it are rejected by the caller, never retried.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh identifier and register the handle under it.
    pub fn register(&self, handle: SessionHandle) -> SessionId {
        let id = SessionId::new();
        self.lock().insert(id, handle);
        info!(session = %id, "session registered");
        id
    }

    /// Handle for an identifier, if the session is still live.
    pub fn lookup(&self, id: &SessionId) -> Option<SessionHandle> {
        self.lock().get(id).cloned()
    }

    /// Remove a session. Returns whether it was present.
    pub fn unregister(&self, id: &SessionId) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            info!(session = %id, "session unregistered");
        } else {
            debug!(session = %id, "unregister for unknown session");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        // Registry operations never panic while holding the lock, but a
        // poisoned map is still fully usable if one ever did.
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn register_lookup_unregister() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = registry.register(tx);
        assert_eq!(registry.len(), 1);

        let handle = registry.lookup(&id).expect("live session");
        handle.send("ping".into()).expect("send");
        assert_eq!(rx.try_recv().expect("recv"), "ping");

        assert!(registry.unregister(&id));
        assert!(registry.lookup(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_unknown_session_is_a_noop() {
        let registry = SessionRegistry::new();
        assert!(!registry.unregister(&SessionId::new()));
    }

    #[test]
    fn messages_are_routed_to_the_tagged_session_only() {
        let registry = SessionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        let _id_a = registry.register(tx_a);
        let id_b = registry.register(tx_b);

        registry
            .lookup(&id_b)
            .expect("session B")
            .send("for B".into())
            .expect("send");

        assert_eq!(rx_b.try_recv().expect("B receives"), "for B");
        assert!(rx_a.try_recv().is_err(), "A must receive nothing");
    }

    #[test]
    fn per_session_message_order_is_preserved() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);

        let handle = registry.lookup(&id).expect("session");
        for n in 0..10 {
            handle.send(format!("msg-{n}")).expect("send");
        }
        for n in 0..10 {
            assert_eq!(rx.try_recv().expect("recv"), format!("msg-{n}"));
        }
    }

    #[tokio::test]
    async fn concurrent_opens_and_closes_do_not_interfere() {
        let registry = Arc::new(SessionRegistry::new());

        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::unbounded_channel();
                let id = registry.register(tx);
                assert!(registry.lookup(&id).is_some());
                assert!(registry.unregister(&id));
            }));
        }
        for handle in handles {
            handle.await.expect("task");
        }

        assert!(registry.is_empty());
    }
}
