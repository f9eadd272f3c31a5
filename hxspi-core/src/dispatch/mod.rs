//! Data-ready dispatch
//!
//! - [`state`]: which path is live
//! - [`gate`]: idempotent interrupt masking
//! - [`dispatcher`]: registration, fallback and teardown

pub mod dispatcher;
pub mod gate;
pub mod state;

pub use dispatcher::Dispatcher;
pub use gate::IrqGate;
pub use state::{DispatchEvent, DispatchMode, DispatchState};
