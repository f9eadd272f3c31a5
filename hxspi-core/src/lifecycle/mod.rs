//! Device lifecycle: attach, dispatcher registration, power management,
//! teardown

mod device;

pub use device::Device;
