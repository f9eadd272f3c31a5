//! Simulated device assembly
//!
//! Wires a [`SimulatedTouchIc`] to a threaded interrupt line, a work-queue
//! poller and a GPIO power sequencer, and keeps the test-side handles.

use std::sync::{Arc, Weak};

use hxspi_core::{Device, DeviceConfig, Error};
use hxspi_hal::spi::SpiDeviceAdapter;

use crate::irq::{IrqPin, ThreadedIrq};
use crate::poll::{PollStats, WorkQueuePoller};
use crate::power::GpioPowerSequencer;
use crate::sim::{SimPin, SimulatedTouchIc};
use crate::sync::StdRawMutex;

/// Lock flavour for host devices, one lock per mutex
pub type HostMutex = StdRawMutex;

/// Device built from simulated parts
pub type SimDevice = Device<
    HostMutex,
    SpiDeviceAdapter<SimulatedTouchIc>,
    ThreadedIrq,
    WorkQueuePoller,
    GpioPowerSequencer<SimPin, SimPin>,
>;

/// An attached simulated device plus the handles that drive it
///
/// The data-ready handler runs on threads the device owns. A handler that
/// keeps a strong `Arc` to the device forms a cycle that only
/// [`Device::unregister_dispatcher`] breaks; handlers built with
/// [`SimRig::weak_device`] let the device drop with the rig.
pub struct SimRig {
    pub device: Arc<SimDevice>,
    pub ic: SimulatedTouchIc,
    pub irq: IrqPin,
    pub reset: SimPin,
    pub rail: SimPin,
    pub poll_stats: Arc<PollStats>,
}

impl SimRig {
    /// Attach a simulated controller
    ///
    /// With `irq_available` false the interrupt line does not resolve and
    /// registration falls back to polling.
    pub fn attach(config: DeviceConfig, irq_available: bool) -> Result<Self, Error> {
        Self::attach_ic(config, SimulatedTouchIc::new(), irq_available)
    }

    /// Attach a caller-built controller model
    pub fn attach_ic(
        config: DeviceConfig,
        ic: SimulatedTouchIc,
        irq_available: bool,
    ) -> Result<Self, Error> {
        let line = if irq_available {
            ThreadedIrq::new()
        } else {
            ThreadedIrq::unavailable()
        };
        let irq = line.pin();
        ic.connect_irq(irq.clone());

        let poller = WorkQueuePoller::new();
        let poll_stats = poller.stats();

        let (reset, rail) = (SimPin::new(), SimPin::new());
        let power = GpioPowerSequencer::new(reset.clone(), rail.clone());

        let bus = if ic.is_full_duplex() {
            SpiDeviceAdapter::new(ic.clone())
        } else {
            SpiDeviceAdapter::half_duplex(ic.clone())
        };
        let device = Device::attach(config, bus, line, poller, power)?;
        Ok(Self {
            device: Arc::new(device),
            ic,
            irq,
            reset,
            rail,
            poll_stats,
        })
    }

    /// Handle for data-ready handlers that must not keep the device alive
    pub fn weak_device(&self) -> Weak<SimDevice> {
        Arc::downgrade(&self.device)
    }
}
