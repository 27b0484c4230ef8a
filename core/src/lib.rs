pub mod core;
pub mod cpu;

pub mod prelude {
    pub use crate::core::machine::Machine;
    pub use crate::core::snapshot::{ScanAction, SnapshotSink};
    pub use crate::core::{BusResponder, Shared};
    pub use crate::cpu::{CpuSystem, Interpreter, IrqState, MapKind};
}
