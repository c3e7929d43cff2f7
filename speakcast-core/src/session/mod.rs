//! Stream session supervision.
//!
//! [`StreamSessionManager`] is the entry point for everything the user
//! interface does with a device: start and stop streams, probe the device,
//! upload raw audio.

pub mod manager;
pub mod state;

pub use manager::{PendingTransmit, StopOutcome, StreamSessionManager};
pub use state::{SessionState, StreamSession};
