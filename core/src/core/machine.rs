use crate::core::snapshot::{ScanAction, SnapshotSink};

/// Machine-agnostic interface for emulated systems.
///
/// Each machine (PC Engine, SuperGrafx, ...) implements this trait to
/// provide a uniform surface to the platform driver: advance time in
/// frame-sized slices, reset to power-on state, and walk persistent state
/// for save/load.
pub trait Machine {
    /// Run one frame of emulation (advance the clock by one frame's worth
    /// of cycles).
    fn run_frame(&mut self);

    /// Reset the machine to its initial power-on state.
    fn reset(&mut self);

    /// Walk the machine's persistent state, handing each block to `sink`.
    /// `action` selects which categories of state the pass visits.
    fn scan(&mut self, action: ScanAction, sink: &mut dyn SnapshotSink);
}
