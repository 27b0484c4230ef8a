use crate::cpu::system::CpuBus;

/// Requested state for an interrupt line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqState {
    /// Drop the line.
    Clear,
    /// Hold the line asserted until explicitly cleared.
    Assert,
    /// Single pulse: assert, run a short quantum, deassert. Models
    /// interrupt sources that cannot hold line state.
    Auto,
}

/// Interrupt acknowledge callback, invoked with the line number when the
/// interpreter takes an interrupt. The return value is an
/// implementation-defined acknowledge/vector-adjust value; 0 means none.
pub type IrqCallback = fn(line: u8) -> u8;

/// The cycle-stepped CPU interpreter this layer routes for.
///
/// The interpreter holds exactly one *working* register context. The
/// instance manager swaps stored register blocks in and out of it on
/// open/close; everything else (page tables, responders, cycle accounting)
/// stays with the instance. All bus traffic during `reset`/`run` goes
/// through the [`CpuBus`] view of whichever instance is open.
pub trait Interpreter {
    /// Core name, reported to the registration hook and snapshot labels.
    const NAME: &'static str;

    /// Serialized size of one register block's persistent state.
    const SNAPSHOT_LEN: usize;

    /// Stored register/context block for one CPU instance. `Default` is
    /// the zeroed power-on block.
    type Regs: Default;

    /// Load a stored block into the working context.
    fn load_context(&mut self, regs: &Self::Regs);

    /// Flush the working context back into a stored block.
    fn save_context(&mut self, regs: &mut Self::Regs);

    /// Reset the working context, fetching the reset vector through `bus`.
    fn reset(&mut self, bus: &mut CpuBus<'_>);

    /// Execute for at least `cycles` cycles (finishing the last
    /// instruction) unless `run_end` cuts the slice short. Returns the
    /// cycles actually consumed.
    fn run(&mut self, bus: &mut CpuBus<'_>, cycles: u32) -> u32;

    /// Ask a `run` in progress to return at the next instruction boundary.
    fn run_end(&mut self);

    /// Raise or drop an interrupt line in the working context.
    fn set_irq_line(&mut self, line: u8, asserted: bool);

    /// Install the interrupt acknowledge callback.
    fn set_irq_callback(&mut self, callback: Option<IrqCallback>);

    /// Enable the bus timing penalty modeled for video-chip access.
    fn set_timing_penalty(&mut self, enabled: bool);

    /// Serialize the persistent state of a stored block. Appends exactly
    /// [`Self::SNAPSHOT_LEN`] bytes; transient scratch state is excluded.
    fn snapshot_save(regs: &Self::Regs, out: &mut Vec<u8>);

    /// Restore a stored block from bytes produced by `snapshot_save`.
    fn snapshot_load(regs: &mut Self::Regs, data: &[u8]);
}

pub mod h6280;
pub mod pages;
pub mod system;

pub use h6280::H6280;
pub use pages::{BankId, MapKind, ADDRESS_MASK, MEMORY_SPACE, PAGE_COUNT, PAGE_MASK, PAGE_SHIFT, PAGE_SIZE};
pub use system::{CoreInfo, CoreRegistrar, CpuSystem, AUTO_PULSE_CYCLES, MAX_CPUS};
