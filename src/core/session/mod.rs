// Session module - Per-invocation dispatch state
pub mod session;
pub mod state;

pub use session::{CancelHandle, Session};
pub use state::DispatchState;
