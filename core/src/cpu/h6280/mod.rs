//! Minimal HuC6280 execution core.
//!
//! Implements the chip's MMU (eight MPR registers translating the 64K
//! logical space onto the 21-bit physical bus), its interrupt vectoring,
//! and a small slice of the opcode matrix — enough to boot a test program,
//! bank with TAM, talk to the VDC ports and service interrupts. The full
//! instruction set is out of scope here.

use crate::cpu::system::CpuBus;
use crate::cpu::{Interpreter, IrqCallback};

#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub enum StatusFlag {
    C = 0x01, // Carry
    Z = 0x02, // Zero
    I = 0x04, // Interrupt Disable
    D = 0x08, // Decimal
    B = 0x10, // Break
    T = 0x20, // Memory operation
    V = 0x40, // Overflow
    N = 0x80, // Negative
}

/// Interrupt line numbering, matching the platform drivers.
pub const LINE_IRQ1: u8 = 0;
pub const LINE_IRQ2: u8 = 1;
pub const LINE_TIMER: u8 = 2;

// Logical vector addresses (reached through MPR7).
const VEC_IRQ2: u16 = 0xFFF6;
const VEC_IRQ1: u16 = 0xFFF8;
const VEC_TIMER: u16 = 0xFFFA;
const VEC_RESET: u16 = 0xFFFE;

/// Cycles consumed by taking an interrupt.
const IRQ_CYCLES: u32 = 8;

/// Stored register/context block for one HuC6280 instance.
///
/// `Default` is the zeroed power-on block; `reset` establishes the real
/// power-on register values and fetches the reset vector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct H6280Regs {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub p: u8,
    pub pc: u16,
    /// Mapping registers: physical page per 8K logical bank.
    pub mpr: [u8; 8],
    /// Level state of the interrupt lines, one bit per line.
    pub irq_pending: u8,
    /// Last (port, data) pair written on the ST side channel. Transient
    /// debug aid, excluded from snapshots.
    pub io_buffer: [u8; 2],
}

/// The working execution context. One of these is shared by all instances;
/// the instance manager swaps [`H6280Regs`] blocks through it.
pub struct H6280 {
    regs: H6280Regs,
    irq_callback: Option<IrqCallback>,
    vdc_penalty: bool,
    end_run: bool,
}

impl H6280 {
    pub fn new() -> Self {
        Self {
            regs: H6280Regs::default(),
            irq_callback: None,
            vdc_penalty: false,
            end_run: false,
        }
    }

    /// Working-context registers, for tests and tracing.
    pub fn regs(&self) -> &H6280Regs {
        &self.regs
    }

    #[inline]
    fn flag(&self, flag: StatusFlag) -> bool {
        self.regs.p & flag as u8 != 0
    }

    #[inline]
    fn set_flag(&mut self, flag: StatusFlag, set: bool) {
        if set {
            self.regs.p |= flag as u8;
        } else {
            self.regs.p &= !(flag as u8);
        }
    }

    fn set_nz(&mut self, value: u8) {
        self.set_flag(StatusFlag::Z, value == 0);
        self.set_flag(StatusFlag::N, value & 0x80 != 0);
    }

    /// Logical-to-physical translation through the MPRs.
    #[inline]
    fn translate(&self, logical: u16) -> u32 {
        let mpr = self.regs.mpr[(logical >> 13) as usize];
        (u32::from(mpr) << 13) | u32::from(logical & 0x1fff)
    }

    fn read(&mut self, bus: &mut CpuBus<'_>, logical: u16) -> u8 {
        bus.read(self.translate(logical))
    }

    fn write(&mut self, bus: &mut CpuBus<'_>, logical: u16, data: u8) {
        bus.write(self.translate(logical), data)
    }

    fn read_word(&mut self, bus: &mut CpuBus<'_>, logical: u16) -> u16 {
        let lo = self.read(bus, logical);
        let hi = self.read(bus, logical.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Fetch the next instruction-stream byte (through the fetch table).
    fn fetch_op(&mut self, bus: &mut CpuBus<'_>) -> u8 {
        let value = bus.fetch(self.translate(self.regs.pc));
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch_word(&mut self, bus: &mut CpuBus<'_>) -> u16 {
        let lo = self.fetch_op(bus);
        let hi = self.fetch_op(bus);
        u16::from_le_bytes([lo, hi])
    }

    // Stack lives in logical $2100-$21FF (through MPR1).
    fn push(&mut self, bus: &mut CpuBus<'_>, value: u8) {
        self.write(bus, 0x2100 | u16::from(self.regs.sp), value);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut CpuBus<'_>) -> u8 {
        self.regs.sp = self.regs.sp.wrapping_add(1);
        self.read(bus, 0x2100 | u16::from(self.regs.sp))
    }

    /// Zero page lives in logical $2000-$20FF (through MPR1).
    fn zp(&self, offset: u8) -> u16 {
        0x2000 | u16::from(offset)
    }

    fn service_interrupt(&mut self, bus: &mut CpuBus<'_>, line: u8, vector: u16) -> u32 {
        if let Some(callback) = self.irq_callback {
            let _ = callback(line);
        }
        let pc = self.regs.pc;
        self.push(bus, (pc >> 8) as u8);
        self.push(bus, pc as u8);
        self.push(bus, self.regs.p & !(StatusFlag::B as u8));
        self.set_flag(StatusFlag::I, true);
        self.set_flag(StatusFlag::D, false);
        self.set_flag(StatusFlag::T, false);
        self.regs.pc = self.read_word(bus, vector);
        IRQ_CYCLES
    }

    /// Take the highest-priority pending interrupt, if any is deliverable.
    fn check_interrupts(&mut self, bus: &mut CpuBus<'_>) -> Option<u32> {
        if self.flag(StatusFlag::I) || self.regs.irq_pending == 0 {
            return None;
        }
        let pending = self.regs.irq_pending;
        if pending & (1 << LINE_TIMER) != 0 {
            Some(self.service_interrupt(bus, LINE_TIMER, VEC_TIMER))
        } else if pending & (1 << LINE_IRQ1) != 0 {
            Some(self.service_interrupt(bus, LINE_IRQ1, VEC_IRQ1))
        } else {
            Some(self.service_interrupt(bus, LINE_IRQ2, VEC_IRQ2))
        }
    }

    fn st_port(&mut self, bus: &mut CpuBus<'_>, port: u8) -> u32 {
        let data = self.fetch_op(bus);
        bus.write_port(port, data);
        self.regs.io_buffer = [port, data];
        // ST0/ST1/ST2 talk straight to the VDC and eat the bus penalty.
        4 + u32::from(self.vdc_penalty)
    }

    /// Execute one instruction, returning its cycle cost.
    fn step(&mut self, bus: &mut CpuBus<'_>) -> u32 {
        let opcode = self.fetch_op(bus);
        match opcode {
            // NOP
            0xEA => 2,

            // Loads
            0xA9 => {
                let value = self.fetch_op(bus);
                self.regs.a = value;
                self.set_nz(value);
                2
            }
            0xA2 => {
                let value = self.fetch_op(bus);
                self.regs.x = value;
                self.set_nz(value);
                2
            }
            0xA0 => {
                let value = self.fetch_op(bus);
                self.regs.y = value;
                self.set_nz(value);
                2
            }
            0xA5 => {
                let offset = self.fetch_op(bus);
                let addr = self.zp(offset);
                let value = self.read(bus, addr);
                self.regs.a = value;
                self.set_nz(value);
                4
            }
            0xAD => {
                let addr = self.fetch_word(bus);
                let value = self.read(bus, addr);
                self.regs.a = value;
                self.set_nz(value);
                5
            }

            // Stores
            0x85 => {
                let offset = self.fetch_op(bus);
                let addr = self.zp(offset);
                let a = self.regs.a;
                self.write(bus, addr, a);
                4
            }
            0x8D => {
                let addr = self.fetch_word(bus);
                let a = self.regs.a;
                self.write(bus, addr, a);
                5
            }
            0x64 => {
                let offset = self.fetch_op(bus);
                let addr = self.zp(offset);
                self.write(bus, addr, 0);
                4
            }
            0x9C => {
                let addr = self.fetch_word(bus);
                self.write(bus, addr, 0);
                5
            }

            // Flags
            0x78 => {
                self.set_flag(StatusFlag::I, true);
                2
            }
            0x58 => {
                self.set_flag(StatusFlag::I, false);
                2
            }

            // Control flow
            0x4C => {
                self.regs.pc = self.fetch_word(bus);
                4
            }
            0x80 => {
                let rel = self.fetch_op(bus) as i8;
                self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(rel));
                4
            }
            0xD0 => {
                let rel = self.fetch_op(bus) as i8;
                if !self.flag(StatusFlag::Z) {
                    self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(rel));
                    4
                } else {
                    2
                }
            }
            0xCA => {
                let value = self.regs.x.wrapping_sub(1);
                self.regs.x = value;
                self.set_nz(value);
                2
            }
            0x40 => {
                self.regs.p = self.pull(bus);
                let lo = self.pull(bus);
                let hi = self.pull(bus);
                self.regs.pc = u16::from_le_bytes([lo, hi]);
                7
            }

            // MPR transfers
            0x53 => {
                let mask = self.fetch_op(bus);
                for bank in 0..8 {
                    if mask & (1 << bank) != 0 {
                        self.regs.mpr[bank] = self.regs.a;
                    }
                }
                5
            }
            0x43 => {
                let mask = self.fetch_op(bus);
                for bank in 0..8 {
                    if mask & (1 << bank) != 0 {
                        self.regs.a = self.regs.mpr[bank];
                        break;
                    }
                }
                4
            }

            // VDC port side channel
            0x03 => self.st_port(bus, 0),
            0x13 => self.st_port(bus, 2),
            0x23 => self.st_port(bus, 3),

            _ => {
                log::trace!("huc6280: unimplemented opcode {opcode:02x}");
                2
            }
        }
    }
}

impl Interpreter for H6280 {
    const NAME: &'static str = "huc6280";
    const SNAPSHOT_LEN: usize = 16;

    type Regs = H6280Regs;

    fn load_context(&mut self, regs: &H6280Regs) {
        self.regs = regs.clone();
    }

    fn save_context(&mut self, regs: &mut H6280Regs) {
        *regs = self.regs.clone();
    }

    fn reset(&mut self, bus: &mut CpuBus<'_>) {
        self.regs = H6280Regs::default();
        self.regs.sp = 0xFD;
        self.regs.p = StatusFlag::I as u8;
        self.regs.pc = self.read_word(bus, VEC_RESET);
    }

    fn run(&mut self, bus: &mut CpuBus<'_>, cycles: u32) -> u32 {
        self.end_run = false;
        let mut done = 0;
        while done < cycles && !self.end_run {
            if let Some(taken) = self.check_interrupts(bus) {
                done += taken;
                continue;
            }
            done += self.step(bus);
        }
        done
    }

    fn run_end(&mut self) {
        self.end_run = true;
    }

    fn set_irq_line(&mut self, line: u8, asserted: bool) {
        debug_assert!(line <= LINE_TIMER, "unknown irq line {line}");
        if asserted {
            self.regs.irq_pending |= 1 << line;
        } else {
            self.regs.irq_pending &= !(1 << line);
        }
    }

    fn set_irq_callback(&mut self, callback: Option<IrqCallback>) {
        self.irq_callback = callback;
    }

    fn set_timing_penalty(&mut self, enabled: bool) {
        self.vdc_penalty = enabled;
    }

    fn snapshot_save(regs: &H6280Regs, out: &mut Vec<u8>) {
        out.extend_from_slice(&[regs.a, regs.x, regs.y, regs.sp, regs.p]);
        out.extend_from_slice(&regs.pc.to_le_bytes());
        out.extend_from_slice(&regs.mpr);
        out.push(regs.irq_pending);
    }

    fn snapshot_load(regs: &mut H6280Regs, data: &[u8]) {
        debug_assert_eq!(data.len(), Self::SNAPSHOT_LEN);
        if data.len() < Self::SNAPSHOT_LEN {
            return;
        }
        regs.a = data[0];
        regs.x = data[1];
        regs.y = data[2];
        regs.sp = data[3];
        regs.p = data[4];
        regs.pc = u16::from_le_bytes([data[5], data[6]]);
        regs.mpr.copy_from_slice(&data[7..15]);
        regs.irq_pending = data[15];
    }
}

impl Default for H6280 {
    fn default() -> Self {
        Self::new()
    }
}
