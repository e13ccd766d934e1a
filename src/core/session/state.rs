use serde::Serialize;
use std::fmt;

/// Dispatch progress through a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Nothing started yet
    Idle,
    /// Waiting for the device to open
    DeviceOpening,
    /// Waiting for a service client
    ClientAllocating,
    /// The selected action is running
    ActionInFlight,
    /// Giving the client back to the device
    ReleasingClient,
    /// Finished, successfully or not
    Done,
}

impl DispatchState {
    /// Whether `next` may directly follow this state.
    pub fn can_transition_to(&self, next: DispatchState) -> bool {
        use DispatchState::*;

        matches!(
            (self, next),
            (Idle, DeviceOpening)
                | (DeviceOpening, ClientAllocating)
                | (DeviceOpening, ActionInFlight)
                | (DeviceOpening, Done)
                | (ClientAllocating, ActionInFlight)
                | (ClientAllocating, Done)
                | (ActionInFlight, ReleasingClient)
                | (ActionInFlight, Done)
                | (ReleasingClient, Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == DispatchState::Done
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Idle => "idle",
            DispatchState::DeviceOpening => "device-opening",
            DispatchState::ClientAllocating => "client-allocating",
            DispatchState::ActionInFlight => "action-in-flight",
            DispatchState::ReleasingClient => "releasing-client",
            DispatchState::Done => "done",
        };
        f.write_str(name)
    }
}
