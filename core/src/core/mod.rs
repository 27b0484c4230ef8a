pub mod bus;
pub mod machine;
pub mod snapshot;

pub use bus::{BusResponder, Shared};
pub use machine::Machine;
pub use snapshot::{ScanAction, SnapshotSink};
