//! Controller interfaces
//!
//! Each controller in `ctrl_exec` shall implement all the items in this
//! module. Drivers (a simulation loop, a hardware bridge or the log replay
//! executable) only talk to controllers through this trait.
//!
//! There is no "not yet initialised" state: a controller is only obtainable
//! through its constructor, so `step` can never run on a half-built instance.

// ---------------------------------------------------------------------------
// CONTROLLER LIFECYCLE
// ---------------------------------------------------------------------------

/// The reset/initialise/step protocol of a discrete-time controller.
///
/// The controller does not schedule itself and has no knowledge of wall-clock
/// time, the driver must call `step` once per control period. Controllers
/// hold mutable state without internal synchronisation, so a driver sharing
/// one between threads must serialise access to it.
pub trait Controller {
    /// Data required by the initialisation hook.
    type InitData;
    /// An error which can occur during initialisation.
    type InitError;

    /// The state record read (and written to) each cycle.
    type State;
    /// The command produced by each cycle.
    type Output;
    /// An error which can occur during cyclic processing.
    type StepError;

    /// Setup hook called once before the first `step`.
    ///
    /// # Inputs
    /// - `init_data`: Any data the controller needs before it is used.
    ///
    /// # Outputs
    /// - On success `Ok(())`.
    /// - On error an `InitError` instance.
    fn initialize(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError>;

    /// Discard all internal state, leaving the controller exactly as it was
    /// when first constructed.
    fn reset(&mut self);

    /// Main cyclic processing function.
    ///
    /// # Inputs
    /// - `state`: The latest state snapshot. Controllers may write their
    ///   command into the snapshot's actuation fields.
    ///
    /// # Outputs
    /// - On success the command for this cycle.
    /// - On error a `StepError` instance.
    fn step(&mut self, state: &mut Self::State) -> Result<Self::Output, Self::StepError>;
}
