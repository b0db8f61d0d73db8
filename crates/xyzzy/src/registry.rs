//! Pending calls, keyed by call id.
//!
//! Ids increase monotonically, so iterating the `BTreeMap` visits calls in
//! the order they were submitted. That order is what a replay after
//! reconnecting must preserve.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;

use tokio::sync::oneshot;
use xyzzy_protocol::{ApiAction, CallId, Params};
use xyzzy_session::Session;
use xyzzy_transport::ConnectionId;

use crate::CallError;

/// Result delivered to a caller of [`Client::call`](crate::Client::call).
pub(crate) type CallResult = Result<Params, CallError>;

/// Who is waiting on a call and what happens when it settles.
#[derive(Debug)]
pub(crate) enum Continuation {
    /// An application call: hand the result back as is.
    Reply(oneshot::Sender<CallResult>),
    /// An explicit login: establish the session, then reply.
    Login(oneshot::Sender<Result<Session, CallError>>),
    /// An automatic relogin after a handshake. Nobody waits on it.
    Relogin,
    /// A logout: drop the in-memory session, then reply.
    Logout(oneshot::Sender<Result<(), CallError>>),
}

impl Continuation {
    /// Settles the waiter with `error` and nothing else.
    pub(crate) fn reject(self, error: CallError) {
        // A dropped receiver means the caller stopped waiting; nothing to do.
        match self {
            Self::Reply(reply) => {
                let _ = reply.send(Err(error));
            }
            Self::Login(reply) => {
                let _ = reply.send(Err(error));
            }
            Self::Logout(reply) => {
                let _ = reply.send(Err(error));
            }
            Self::Relogin => {}
        }
    }
}

/// One call that has not been answered yet.
#[derive(Debug)]
pub(crate) struct PendingCall {
    pub(crate) call_id: CallId,
    pub(crate) action: ApiAction,
    /// Survives disconnection and is replayed once eligible.
    pub(crate) persistent: bool,
    /// The encoded request frame.
    pub(crate) request: String,
    /// The connection the frame was written to, if any. A call is written
    /// at most once.
    pub(crate) sent_on: Option<ConnectionId>,
    pub(crate) continuation: Continuation,
}

/// All unanswered calls.
#[derive(Debug)]
pub(crate) struct CallRegistry {
    next_id: u64,
    pending: BTreeMap<CallId, PendingCall>,
    /// Calls rejected while their frame was on the live connection. The
    /// server still answers them; those answers are dropped.
    abandoned: BTreeSet<CallId>,
}

impl CallRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            pending: BTreeMap::new(),
            abandoned: BTreeSet::new(),
        }
    }

    /// Allocates a call id. Ids are never reused.
    pub(crate) fn next_id(&mut self) -> CallId {
        let id = CallId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn insert(&mut self, call: PendingCall) {
        self.pending.insert(call.call_id, call);
    }

    /// Removes and returns the call answered by `call_id`.
    pub(crate) fn take(&mut self, call_id: CallId) -> Option<PendingCall> {
        self.pending.remove(&call_id)
    }

    /// Removes every non-persistent call, oldest first.
    pub(crate) fn take_ephemeral(&mut self) -> Vec<PendingCall> {
        self.take_where(|call| !call.persistent)
    }


    /// Removes everything.
    pub(crate) fn take_all(&mut self) -> Vec<PendingCall> {
        mem::take(&mut self.pending).into_values().collect()
    }

    /// Calls still waiting to be written, in submission order.
    pub(crate) fn unsent_mut(&mut self) -> impl Iterator<Item = &mut PendingCall> {
        self.pending.values_mut().filter(|call| call.sent_on.is_none())
    }

    /// Expects an answer for `call_id` that nobody will receive.
    pub(crate) fn abandon(&mut self, call_id: CallId) {
        self.abandoned.insert(call_id);
    }

    /// Whether `call_id` was abandoned; an answer for it is consumed here.
    pub(crate) fn take_abandoned(&mut self, call_id: CallId) -> bool {
        self.abandoned.remove(&call_id)
    }

    /// Forgets abandoned calls once their connection is gone.
    pub(crate) fn clear_abandoned(&mut self) {
        self.abandoned.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    fn take_where(&mut self, pred: impl Fn(&PendingCall) -> bool) -> Vec<PendingCall> {
        let (taken, kept): (BTreeMap<_, _>, BTreeMap<_, _>) = mem::take(&mut self.pending)
            .into_iter()
            .partition(|(_, call)| pred(call));
        self.pending = kept;
        taken.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(
        registry: &mut CallRegistry,
        persistent: bool,
        sent: bool,
    ) -> (CallId, oneshot::Receiver<CallResult>) {
        let sent_on = sent.then(|| ConnectionId::new(1));
        let (tx, rx) = oneshot::channel();
        let call_id = registry.next_id();
        registry.insert(PendingCall {
            call_id,
            action: ApiAction::Chat,
            persistent,
            request: format!(r#"{{"call_id":{}}}"#, call_id.0),
            sent_on,
            continuation: Continuation::Reply(tx),
        });
        (call_id, rx)
    }

    #[test]
    fn test_next_id_is_monotonic() {
        let mut registry = CallRegistry::new();
        let a = registry.next_id();
        let b = registry.next_id();
        assert_eq!(a, CallId(1));
        assert!(b > a);
    }

    #[test]
    fn test_take_removes_entry_once() {
        let mut registry = CallRegistry::new();
        let (id, _rx) = call(&mut registry, false, true);
        assert!(registry.take(id).is_some());
        assert!(registry.take(id).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_take_ephemeral_keeps_persistent() {
        let mut registry = CallRegistry::new();
        let (a, _) = call(&mut registry, false, true);
        let (b, _) = call(&mut registry, true, true);
        let (c, _) = call(&mut registry, false, true);

        let taken: Vec<_> = registry.take_ephemeral().iter().map(|p| p.call_id).collect();
        assert_eq!(taken, vec![a, c]);
        assert_eq!(registry.len(), 1);
        assert!(registry.take(b).is_some());
    }

    #[test]
    fn test_unsent_in_submission_order() {
        let mut registry = CallRegistry::new();
        let (a, _) = call(&mut registry, true, false);
        let (_b, _) = call(&mut registry, true, true);
        let (c, _) = call(&mut registry, true, false);

        let order: Vec<_> = registry.unsent_mut().map(|p| p.call_id).collect();
        assert_eq!(order, vec![a, c]);
    }

    #[test]
    fn test_marking_sent_excludes_from_next_flush() {
        let mut registry = CallRegistry::new();
        call(&mut registry, true, false);
        for pending in registry.unsent_mut() {
            pending.sent_on = Some(ConnectionId::new(2));
        }
        assert_eq!(registry.unsent_mut().count(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_take_abandoned_consumes_answer_once() {
        let mut registry = CallRegistry::new();
        let (id, _) = call(&mut registry, false, true);
        registry.take(id);
        registry.abandon(id);
        assert!(registry.take_abandoned(id));
        assert!(!registry.take_abandoned(id));
    }

    #[test]
    fn test_clear_abandoned_forgets_everything() {
        let mut registry = CallRegistry::new();
        registry.abandon(CallId(4));
        registry.clear_abandoned();
        assert!(!registry.take_abandoned(CallId(4)));
    }

    #[test]
    fn test_reject_delivers_error_to_waiter() {
        let mut registry = CallRegistry::new();
        let (id, mut rx) = call(&mut registry, false, true);
        registry.take(id).unwrap().continuation.reject(CallError::Disconnected);
        assert_eq!(rx.try_recv().unwrap(), Err(CallError::Disconnected));
    }

    #[test]
    fn test_take_all_empties_registry() {
        let mut registry = CallRegistry::new();
        call(&mut registry, false, true);
        call(&mut registry, true, false);
        assert_eq!(registry.take_all().len(), 2);
        assert_eq!(registry.len(), 0);
    }
}
