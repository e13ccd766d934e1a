// Infrastructure module - External dependencies and adapters
pub mod config;
pub mod emulator;
pub mod logging;
pub mod signals;
