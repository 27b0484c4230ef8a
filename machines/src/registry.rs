//! Machine registry for automatic driver discovery.
//!
//! Each machine self-registers via [`inventory::submit!`] with a
//! [`MachineEntry`] containing its name and a factory function. The
//! platform driver discovers available machines at runtime without any
//! central list.

use tgx_core::core::machine::Machine;

use crate::RomError;

/// Describes one runnable machine.
pub struct MachineEntry {
    /// Name used to select this machine (e.g., "pce").
    pub name: &'static str,
    /// Factory: construct a Machine from a ROM image.
    pub create: fn(&[u8]) -> Result<Box<dyn Machine>, RomError>,
}

impl MachineEntry {
    pub const fn new(
        name: &'static str,
        create: fn(&[u8]) -> Result<Box<dyn Machine>, RomError>,
    ) -> Self {
        Self { name, create }
    }
}

inventory::collect!(MachineEntry);

/// Return all registered machines, sorted by name.
pub fn all() -> Vec<&'static MachineEntry> {
    let mut entries: Vec<_> = inventory::iter::<MachineEntry>.into_iter().collect();
    entries.sort_by_key(|e| e.name);
    entries
}

/// Look up a machine by name.
pub fn find(name: &str) -> Option<&'static MachineEntry> {
    inventory::iter::<MachineEntry>
        .into_iter()
        .find(|e| e.name == name)
}
