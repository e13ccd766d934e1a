// Domain module - Configuration, argument values and errors
pub mod config;
pub mod error;
pub mod values;
