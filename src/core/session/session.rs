use crate::core::protocol::ClientHandle;
use crate::core::session::state::DispatchState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Process-wide cancellation request, honoured at most once.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    requested: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `false` if it had already been requested.
    pub fn request(&self) -> bool {
        if self.requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Token handed to cancellable backend calls.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Resources and progress of one dispatch.
///
/// The session exclusively owns the client handle; it is moved out when the
/// client is released or retained.
#[derive(Debug)]
pub struct Session {
    device_path: String,
    state: DispatchState,
    history: Vec<DispatchState>,
    client: Option<ClientHandle>,
    cancel: CancelHandle,
}

impl Session {
    pub fn new(device_path: impl Into<String>, cancel: CancelHandle) -> Self {
        Self {
            device_path: device_path.into(),
            state: DispatchState::Idle,
            history: vec![DispatchState::Idle],
            client: None,
            cancel,
        }
    }

    pub fn transition(&mut self, next: DispatchState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid dispatch transition {} -> {}",
            self.state,
            next
        );
        debug!("{}: {} -> {}", self.device_path, self.state, next);
        self.state = next;
        self.history.push(next);
    }

    pub fn token(&self) -> &CancellationToken {
        self.cancel.token()
    }

    pub fn attach_client(&mut self, client: ClientHandle) {
        self.client = Some(client);
    }

    pub fn client(&self) -> Option<&ClientHandle> {
        self.client.as_ref()
    }

    pub fn take_client(&mut self) -> Option<ClientHandle> {
        self.client.take()
    }

    /// Consume the session, returning the visited states.
    pub fn finish(mut self) -> Vec<DispatchState> {
        if !self.state.is_terminal() {
            self.transition(DispatchState::Done);
        }
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::{Cid, Service};

    #[test]
    fn test_cancel_request_is_idempotent() {
        let cancel = CancelHandle::new();
        assert!(!cancel.is_requested());
        assert!(cancel.request());
        assert!(!cancel.request());
        assert!(cancel.is_requested());
        assert!(cancel.token().is_cancelled());
    }

    #[test]
    fn test_cancel_clones_share_state() {
        let cancel = CancelHandle::new();
        let listener = cancel.clone();
        assert!(listener.request());
        assert!(!cancel.request());
        assert!(cancel.token().is_cancelled());
    }

    #[test]
    fn test_session_records_history() {
        let mut session = Session::new("/dev/cdc-wdm0", CancelHandle::new());
        session.transition(DispatchState::DeviceOpening);
        session.transition(DispatchState::ClientAllocating);
        session.attach_client(ClientHandle::new(Service::Nas, Cid::new(4).unwrap()));
        assert_eq!(session.client().map(|c| c.cid().value()), Some(4));

        let client = session.take_client();
        assert!(client.is_some());
        assert!(session.client().is_none());

        session.transition(DispatchState::Done);
        let history = session.finish();
        assert_eq!(
            history,
            vec![
                DispatchState::Idle,
                DispatchState::DeviceOpening,
                DispatchState::ClientAllocating,
                DispatchState::Done
            ]
        );
    }
}
