//! Bus transaction engine
//!
//! - [`frame`]: byte-exact header and address encoding
//! - [`buffer`]: the single shared staging buffer
//! - [`engine`]: locking, bound checks and retry around the raw bus

pub mod buffer;
pub mod engine;
pub mod frame;

pub use buffer::TransferBuffer;
pub use engine::BusEngine;
pub use frame::{Addressing, Selectors};
