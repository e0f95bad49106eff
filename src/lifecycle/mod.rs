//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal returns
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscribed server stops accepting and drains
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
