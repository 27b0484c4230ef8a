//! Cut-down PC Engine board: one HuC6280, a HuCard ROM, 8K of work RAM and
//! a VDC port latch on the otherwise-unmapped I/O page.
//!
//! The point of this machine is to exercise the CPU interface layer end to
//! end (mapping, responder fallback, per-frame interrupt pulse, scan), not
//! to render games: the VDC model stops at its register file.

use tgx_core::core::bus::{BusResponder, Shared};
use tgx_core::core::machine::Machine;
use tgx_core::core::snapshot::{ScanAction, SnapshotSink};
use tgx_core::cpu::h6280::{H6280, LINE_IRQ1};
use tgx_core::cpu::{BankId, CpuSystem, IrqState, MapKind, PAGE_SIZE};

use crate::registry::MachineEntry;
use crate::RomError;

/// CPU cycles per 60 Hz frame at the 7.16 MHz high-speed clock.
pub const CYCLES_PER_FRAME: u32 = 7_159_090 / 60;

/// Largest HuCard image the board maps (1MB).
pub const MAX_ROM: usize = 0x10_0000;

/// Work RAM: 8K at physical page $F8.
const WRAM_BASE: u32 = 0x1F_0000;
const WRAM_SIZE: usize = 0x2000;

/// VDC register range on the physical bus (through MPR $FF).
const VDC_BASE: u32 = 0x1F_E000;

/// VDC register latch.
///
/// Reached two ways, like the real chip: memory-mapped at [`VDC_BASE`]
/// (which the page tables leave unmapped, so accesses fall through to this
/// responder) and via the CPU's ST0/ST1/ST2 port side channel.
#[derive(Default)]
pub struct VdcPorts {
    select: u8,
    regs: [u16; 20],
}

impl VdcPorts {
    pub fn reg(&self, index: usize) -> u16 {
        self.regs.get(index).copied().unwrap_or(0)
    }

    fn port(&mut self, port: u8, data: u8) {
        match port {
            0 => self.select = data & 0x1f,
            2 => {
                if let Some(reg) = self.regs.get_mut(usize::from(self.select)) {
                    *reg = (*reg & 0xff00) | u16::from(data);
                }
            }
            3 => {
                if let Some(reg) = self.regs.get_mut(usize::from(self.select)) {
                    *reg = (*reg & 0x00ff) | (u16::from(data) << 8);
                }
            }
            _ => {}
        }
    }
}

impl BusResponder for VdcPorts {
    fn write(&mut self, addr: u32, data: u8) {
        if addr & 0x1f_fc00 == VDC_BASE {
            self.port((addr & 3) as u8, data);
        }
    }

    fn write_port(&mut self, port: u8, data: u8) {
        self.port(port, data);
    }
}

pub struct PceSystem {
    sys: CpuSystem<H6280>,
    wram: BankId,
    vdc: Shared<VdcPorts>,
    frames: u64,
}

impl PceSystem {
    pub fn new(rom_image: &[u8]) -> Result<Self, RomError> {
        if rom_image.is_empty() {
            return Err(RomError::Empty);
        }
        if rom_image.len() > MAX_ROM {
            return Err(RomError::TooLarge {
                size: rom_image.len(),
                max: MAX_ROM,
            });
        }

        log::debug!("pce: {} byte HuCard image", rom_image.len());
        let mut sys = CpuSystem::new(H6280::new());

        let mut rom_bytes = rom_image.to_vec();
        rom_bytes.resize(rom_image.len().next_multiple_of(PAGE_SIZE), 0);
        let rom_end = rom_bytes.len() as u32 - 1;
        let rom = sys.add_bank(rom_bytes);
        let wram = sys.add_bank(vec![0; WRAM_SIZE]);
        let vdc = Shared::new(VdcPorts::default());

        sys.init(0);
        sys.open(0);
        sys.map_memory(rom, 0, rom_end, MapKind::ROM);
        sys.map_memory(wram, WRAM_BASE, WRAM_BASE + WRAM_SIZE as u32 - 1, MapKind::RAM);
        sys.set_responder(Some(Box::new(vdc.clone())));
        sys.reset();
        sys.close();

        Ok(Self {
            sys,
            wram,
            vdc,
            frames: 0,
        })
    }

    pub fn wram(&self) -> &[u8] {
        self.sys.bank(self.wram)
    }

    pub fn vdc_reg(&self, index: usize) -> u16 {
        self.vdc.handle().borrow().reg(index)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Machine for PceSystem {
    fn run_frame(&mut self) {
        self.sys.new_frame();
        self.sys.open(0);
        self.sys.run(CYCLES_PER_FRAME);
        self.sys.close();
        // VBlank: the VDC cannot hold the line, so it pulses IRQ1.
        self.sys.set_irq(0, LINE_IRQ1, IrqState::Auto);
        self.frames += 1;
    }

    fn reset(&mut self) {
        self.sys.open(0);
        self.sys.reset();
        self.sys.close();
    }

    fn scan(&mut self, action: ScanAction, sink: &mut dyn SnapshotSink) {
        if action.contains(ScanAction::MEMORY_RAM) {
            let wram = self.wram;
            sink.record("pce work ram", self.sys.bank_mut(wram));
        }
        self.sys.scan(action, sink);
    }
}

fn create(rom: &[u8]) -> Result<Box<dyn Machine>, RomError> {
    Ok(Box::new(PceSystem::new(rom)?))
}

inventory::submit! {
    MachineEntry::new("pce", create)
}
