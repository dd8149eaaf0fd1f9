//! Control-plane utilities shared by queue pair managers.

mod event;
mod shutdown;

pub use event::EventHandler;
pub use shutdown::ShutdownSignal;
