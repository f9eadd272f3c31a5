//! SPI bus abstractions
//!
//! The touch controller speaks a full-duplex protocol: the host clocks
//! out a header and dummy bytes while the controller clocks back the
//! response in the same transfer. One call to [`SpiBus::transfer_in_place`]
//! is one bus transaction.

/// SPI bus master
///
/// Implementations perform exactly one chip-select framed transaction per
/// call and must not retry internally; retrying is the engine's job.
pub trait SpiBus {
    /// Error type for SPI operations
    type Error: core::fmt::Debug;

    /// Transfer data in place
    ///
    /// Clocks out every byte of `data` while overwriting it with the bytes
    /// clocked in.
    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error>;

    /// Write data without reading
    ///
    /// Returns the number of bytes the controller actually transacted.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Whether the controller can clock both directions at once
    ///
    /// Half-duplex hosts cannot carry the combined read transaction.
    fn is_full_duplex(&self) -> bool {
        true
    }
}

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    /// Clock mode
    pub mode: Mode,
    /// Word size
    pub bits_per_word: u8,
    /// Chip select index
    pub chip_select: u8,
}

impl Default for SpiConfig {
    fn default() -> Self {
        // The controller latches on the rising edge with an idle-high clock.
        Self {
            mode: Mode::Mode3,
            bits_per_word: 8,
            chip_select: 0,
        }
    }
}

/// SPI clock mode (polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl From<Mode> for embedded_hal::spi::Mode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => embedded_hal::spi::MODE_0,
            Mode::Mode1 => embedded_hal::spi::MODE_1,
            Mode::Mode2 => embedded_hal::spi::MODE_2,
            Mode::Mode3 => embedded_hal::spi::MODE_3,
        }
    }
}

/// Adapter exposing any `embedded-hal` SPI device as an [`SpiBus`]
///
/// Lets board crates (and `linux-embedded-hal` spidev handles) drive the
/// core without a bespoke implementation. Each call is one
/// `SpiDevice` transaction, so chip select frames it.
pub struct SpiDeviceAdapter<D> {
    device: D,
    full_duplex: bool,
}

impl<D> SpiDeviceAdapter<D> {
    /// Wrap an `embedded-hal` SPI device
    pub fn new(device: D) -> Self {
        Self {
            device,
            full_duplex: true,
        }
    }

    /// Wrap a device whose controller cannot clock both directions at once
    pub fn half_duplex(device: D) -> Self {
        Self {
            device,
            full_duplex: false,
        }
    }

    /// Release the wrapped device
    pub fn into_inner(self) -> D {
        self.device
    }
}

impl<D: embedded_hal::spi::SpiDevice> SpiBus for SpiDeviceAdapter<D> {
    type Error = D::Error;

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        self.device.transfer_in_place(data)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.device.write(data)?;
        Ok(data.len())
    }

    fn is_full_duplex(&self) -> bool {
        self.full_duplex
    }
}
