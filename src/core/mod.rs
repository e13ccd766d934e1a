// Core module - Action model, dispatch and the protocol boundary
pub mod action;
pub mod dispatcher;
pub mod protocol;
pub mod session;

pub use action::{Action, Operation};
pub use dispatcher::{
    ClientDisposition, ClientReport, DispatchSettings, Dispatcher, Outcome, Progress,
};
pub use session::{CancelHandle, DispatchState};
