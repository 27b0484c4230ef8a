//! Paged address-space tables.
//!
//! The emulated bus is 21 bits wide, split into 2KB pages. Every CPU
//! instance carries three page-indexed tables (read/write/fetch); each slot
//! names a page-sized window into an arena-owned backing buffer, or is
//! empty, meaning "unmapped for this access kind, defer to the responder".

use bitflags::bitflags;

/// Physical address space of the emulated bus.
pub const MEMORY_SPACE: usize = 0x20_0000;

/// Every access is masked to this before resolution; out-of-range
/// addresses wrap like the bounded physical bus they model.
pub const ADDRESS_MASK: u32 = 0x1f_ffff;

pub const PAGE_SIZE: usize = 0x800;
pub const PAGE_SHIFT: u32 = 11;
pub const PAGE_MASK: u32 = 0x7ff;
pub const PAGE_COUNT: usize = MEMORY_SPACE / PAGE_SIZE;

bitflags! {
    /// Which access kinds a mapping covers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MapKind: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const FETCH = 1 << 2;
        /// ROM: readable and fetchable; writes fall through to the
        /// responder.
        const ROM = Self::READ.bits() | Self::FETCH.bits();
        /// RAM: mapped for every access kind.
        const RAM = Self::READ.bits() | Self::WRITE.bits() | Self::FETCH.bits();
    }
}

/// Access kinds, used to index the per-instance tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    Read = 0,
    Write = 1,
    Fetch = 2,
}

impl Access {
    fn kind(self) -> MapKind {
        match self {
            Access::Read => MapKind::READ,
            Access::Write => MapKind::WRITE,
            Access::Fetch => MapKind::FETCH,
        }
    }
}

/// Handle to a backing buffer registered with a [`PageArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BankId(pub(crate) u32);

/// Owns every backing buffer mapped into any instance's page tables.
///
/// Table slots hold `(bank, offset)` pairs into this arena instead of raw
/// pointers, so two instances can map the same bank and a slot can never
/// dangle.
#[derive(Default)]
pub struct PageArena {
    banks: Vec<Box<[u8]>>,
}

impl PageArena {
    pub fn add(&mut self, bytes: Vec<u8>) -> BankId {
        let id = BankId(self.banks.len() as u32);
        self.banks.push(bytes.into_boxed_slice());
        id
    }

    pub fn bytes(&self, id: BankId) -> &[u8] {
        &self.banks[id.0 as usize]
    }

    pub fn bytes_mut(&mut self, id: BankId) -> &mut [u8] {
        &mut self.banks[id.0 as usize]
    }

    pub fn clear(&mut self) {
        self.banks.clear();
    }
}

/// One page-table slot: which bank backs the page, and where in the bank
/// the page starts.
#[derive(Clone, Copy)]
struct PageSlot {
    bank: BankId,
    base: usize,
}

/// The three page-indexed tables (read/write/fetch) for one CPU instance.
pub(crate) struct PageSet {
    tables: [Box<[Option<PageSlot>]>; 3],
}

impl PageSet {
    pub(crate) fn new() -> Self {
        Self {
            tables: std::array::from_fn(|_| vec![None; PAGE_COUNT].into_boxed_slice()),
        }
    }

    /// Install `bank` over the inclusive range `[start, finish]` for every
    /// access kind in `kind`, page `i` of the range backed by byte
    /// `i * PAGE_SIZE` of the bank. Overlapping installs are fine; the most
    /// recent wins. No removal exists — unmap by remapping.
    ///
    /// The bank is not bounds-checked against the range; the caller
    /// guarantees it is large enough.
    pub(crate) fn map(&mut self, kind: MapKind, start: u32, finish: u32, bank: BankId) {
        debug_assert!(start <= finish, "map range ends before it starts");
        let first = (start >> PAGE_SHIFT) as usize;
        let pages = ((finish - start) >> PAGE_SHIFT) as usize + 1;
        for i in 0..pages {
            let slot = PageSlot {
                bank,
                base: i << PAGE_SHIFT,
            };
            for access in [Access::Read, Access::Write, Access::Fetch] {
                if kind.contains(access.kind()) {
                    self.tables[access as usize][first + i] = Some(slot);
                }
            }
        }
    }

    /// Resolve a pre-masked address to a byte position in the arena, or
    /// `None` when the page is unmapped for this access kind.
    pub(crate) fn lookup(&self, access: Access, addr: u32) -> Option<(BankId, usize)> {
        self.tables[access as usize][(addr >> PAGE_SHIFT) as usize]
            .map(|slot| (slot.bank, slot.base + (addr & PAGE_MASK) as usize))
    }
}
