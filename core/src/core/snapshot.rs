//! Save-state scan protocol.
//!
//! The layer never touches disk itself: a scan pass walks every persistent
//! state block and hands each one to an external [`SnapshotSink`], which
//! owns the container format and all I/O.

use bitflags::bitflags;

bitflags! {
    /// What a scan pass should visit, and in which direction.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ScanAction: u32 {
        /// State that is rebuilt on reset and may be skipped by minimal
        /// save states.
        const VOLATILE = 1 << 0;
        /// Plain RAM regions.
        const MEMORY_RAM = 1 << 1;
        /// Chip and driver state; CPU register blocks live here.
        const DRIVER_DATA = 1 << 2;
        /// The pass is a restore: the sink rewrites record buffers in
        /// place and the owner reloads them afterwards.
        const WRITE = 1 << 3;
    }
}

/// Receives one named state block per call during a scan pass.
///
/// On a save pass the sink copies `data` out. On a restore pass
/// ([`ScanAction::WRITE`]) it overwrites `data` in place; the block's owner
/// reloads the buffer after the call, so a single scan protocol serves both
/// directions.
pub trait SnapshotSink {
    fn record(&mut self, name: &str, data: &mut [u8]);
}
