pub mod config;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod notification;
pub mod samples;
pub mod state;
