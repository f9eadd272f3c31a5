//! Error taxonomy shared by every core operation

/// Lifecycle step that failed during bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LifecycleStage {
    /// Configuration limits do not fit the transfer buffer
    Config,
    /// Bus controller cannot carry full-duplex transactions
    Bus,
    /// Power rails or reset sequencing failed
    PowerUp,
}

/// Core errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Requested length exceeds the protocol bound; the bus was not touched
    #[error("length {len} exceeds protocol limit {limit}")]
    ContractViolation { len: usize, limit: usize },
    /// Bus transaction failed on every attempt
    #[error("bus transaction failed after {attempts} attempts")]
    Transport { attempts: u8 },
    /// Buffer or context allocation failed
    #[error("failed to allocate {requested} bytes")]
    ResourceExhaustion { requested: usize },
    /// Neither the interrupt nor the polling path could be established
    #[error("no dispatch path could be established")]
    RegistrationFailure,
    /// A bring-up step failed; everything acquired before it was released
    #[error("lifecycle step failed: {0:?}")]
    Lifecycle(LifecycleStage),
    /// Device has not finished initializing
    #[error("device not initialized")]
    NotReady,
}

impl Error {
    /// Whether the failure happened before any bus access
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::ContractViolation { .. })
    }
}
