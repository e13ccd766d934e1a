//! qmictl Library
//!
//! Runs single QMI actions against a modem: argument validation, the
//! open / allocate / act / release dispatcher, result rendering and a
//! profile driven modem emulator.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::domain::error::{QmiCtlError, QmiCtlResult};
pub use crate::domain::config::QmiCtlConfig;
pub use crate::core::{Action, CancelHandle, Dispatcher, Outcome};
