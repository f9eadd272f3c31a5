//! Power and reset sequencing contract

/// Brings the controller's rails and reset line up and down
///
/// Implementations include the settle delays their platform needs; the
/// core issues its first bus transaction as soon as `power_up` returns.
pub trait PowerSequencer {
    /// Error type for bring-up
    type Error: core::fmt::Debug;

    /// Enable rails and release reset
    ///
    /// On failure the implementation releases whatever it acquired before
    /// returning.
    fn power_up(&mut self) -> Result<(), Self::Error>;

    /// Release everything `power_up` acquired, in reverse order
    ///
    /// Safe to call after a partial or failed bring-up.
    fn power_down(&mut self);

    /// Drive the reset line (`true` holds the controller in reset)
    fn reset_assert(&mut self, asserted: bool);
}
