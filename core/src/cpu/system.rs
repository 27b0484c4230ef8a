//! Multi-instance CPU context management and address routing.
//!
//! One [`CpuSystem`] owns up to [`MAX_CPUS`] instance records and the one
//! interpreter working context they share. Exactly one instance is "open"
//! at a time; opening loads its stored register block into the interpreter,
//! closing flushes it back. Page tables, responders and cycle counters
//! belong to the instance and are untouched by open/close.
//!
//! Misuse of the protocol (bus access with no instance open, unbalanced
//! open/close, out-of-range indices) is a programmer error surfaced by
//! `debug_assert!` in instrumented builds; release builds fall back to a
//! defined no-op. Unmapped-address access is *not* misuse — it resolves to
//! the documented defaults (reads 0, writes dropped).

use crate::core::bus::BusResponder;
use crate::core::snapshot::{ScanAction, SnapshotSink};
use crate::cpu::pages::{Access, BankId, MapKind, PageArena, PageSet, ADDRESS_MASK, MEMORY_SPACE};
use crate::cpu::{Interpreter, IrqCallback, IrqState};

/// Fixed number of CPU instance slots.
pub const MAX_CPUS: usize = 2;

/// Cycles executed between the assert and deassert edges of an
/// [`IrqState::Auto`] pulse — long enough for the interpreter to observe
/// and service the interrupt.
pub const AUTO_PULSE_CYCLES: u32 = 10;

/// Identification record handed to a [`CoreRegistrar`] when an instance is
/// initialized. `address_space` and `cycle_granularity` are fixed
/// properties of the core and part of the stable platform contract.
#[derive(Clone, Copy, Debug)]
pub struct CoreInfo {
    pub name: &'static str,
    pub index: usize,
    pub address_space: u32,
    pub cycle_granularity: u32,
}

/// External cheat/trace subsystem interested in CPU instances.
/// Registration is fire and forget: the layer calls this once per `init`
/// and observes no result.
pub trait CoreRegistrar {
    fn register_cpu(&mut self, info: &CoreInfo);
}

struct Instance<R> {
    regs: Box<R>,
    pages: PageSet,
    responder: Option<Box<dyn BusResponder>>,
    total_cycles: u64,
    vdc_penalty: bool,
}

/// Router view over the open instance's tables and responder, handed to
/// the interpreter for the duration of a `reset`/`run` and used by the
/// system's own bus entry points. Resolution is O(1): mask, shift, index.
pub struct CpuBus<'a> {
    arena: &'a mut PageArena,
    pages: &'a PageSet,
    responder: &'a mut Option<Box<dyn BusResponder>>,
}

impl CpuBus<'_> {
    /// Data read. Read table first, then the responder, then 0.
    pub fn read(&mut self, addr: u32) -> u8 {
        let addr = addr & ADDRESS_MASK;
        if let Some((bank, pos)) = self.pages.lookup(Access::Read, addr) {
            return self.arena.bytes(bank)[pos];
        }
        match self.responder.as_deref_mut() {
            Some(r) => r.read(addr),
            None => 0,
        }
    }

    /// Instruction fetch. Fetch table first, then the *read* responder —
    /// fetch and data reads share one external handler, since a
    /// ROM-call-only CPU has no separate instruction bus in this model.
    pub fn fetch(&mut self, addr: u32) -> u8 {
        let addr = addr & ADDRESS_MASK;
        if let Some((bank, pos)) = self.pages.lookup(Access::Fetch, addr) {
            return self.arena.bytes(bank)[pos];
        }
        match self.responder.as_deref_mut() {
            Some(r) => r.read(addr),
            None => 0,
        }
    }

    /// Data write. Write table first, then the responder, else dropped.
    pub fn write(&mut self, addr: u32, data: u8) {
        let addr = addr & ADDRESS_MASK;
        if let Some((bank, pos)) = self.pages.lookup(Access::Write, addr) {
            self.arena.bytes_mut(bank)[pos] = data;
            return;
        }
        if let Some(r) = self.responder.as_deref_mut() {
            r.write(addr, data);
        }
    }

    /// Write mirrored into every table the address is mapped in (read,
    /// fetch and write), for self-modifying-code and bank-latch cases. The
    /// responder write runs unconditionally afterwards.
    pub fn write_rom(&mut self, addr: u32, data: u8) {
        let addr = addr & ADDRESS_MASK;
        for access in [Access::Read, Access::Fetch, Access::Write] {
            if let Some((bank, pos)) = self.pages.lookup(access, addr) {
                self.arena.bytes_mut(bank)[pos] = data;
            }
        }
        if let Some(r) = self.responder.as_deref_mut() {
            r.write(addr, data);
        }
    }

    /// 8-bit port side channel. No table; responder only, else a no-op.
    pub fn write_port(&mut self, port: u8, data: u8) {
        if let Some(r) = self.responder.as_deref_mut() {
            r.write_port(port, data);
        }
    }
}

/// The paged address-space router, instance context manager and interrupt
/// line controller for one CPU core.
///
/// The method surface from `open` through `exit` is the dispatch contract
/// the platform driver depends on; its semantics are stable.
pub struct CpuSystem<I: Interpreter> {
    interp: I,
    arena: PageArena,
    instances: [Option<Instance<I::Regs>>; MAX_CPUS],
    active: Option<usize>,
    switching: bool,
    registrar: Option<Box<dyn CoreRegistrar>>,
}

impl<I: Interpreter> CpuSystem<I> {
    pub fn new(interp: I) -> Self {
        Self {
            interp,
            arena: PageArena::default(),
            instances: std::array::from_fn(|_| None),
            active: None,
            switching: false,
            registrar: None,
        }
    }

    /// Install the external registrar notified on each `init`.
    pub fn set_registrar(&mut self, registrar: Box<dyn CoreRegistrar>) {
        self.registrar = Some(registrar);
    }

    pub fn interpreter(&self) -> &I {
        &self.interp
    }

    pub fn interpreter_mut(&mut self) -> &mut I {
        &mut self.interp
    }

    // -----------------------------------------------------------------
    // Banks
    // -----------------------------------------------------------------

    /// Register a backing buffer. The returned id can be mapped into any
    /// instance, including several at once.
    pub fn add_bank(&mut self, bytes: Vec<u8>) -> BankId {
        let len = bytes.len();
        let id = self.arena.add(bytes);
        log::debug!("{}: registered bank {:?} ({len} bytes)", I::NAME, id);
        id
    }

    pub fn bank(&self, id: BankId) -> &[u8] {
        self.arena.bytes(id)
    }

    pub fn bank_mut(&mut self, id: BankId) -> &mut [u8] {
        self.arena.bytes_mut(id)
    }

    // -----------------------------------------------------------------
    // Instance lifecycle
    // -----------------------------------------------------------------

    /// Create instance `index`: a zeroed register block, empty page
    /// tables, no responder, VDC penalty enabled. Registers the instance
    /// with the registrar, if one is installed.
    pub fn init(&mut self, index: usize) {
        debug_assert!(index < MAX_CPUS, "init with index {index} out of range");
        let Some(slot) = self.instances.get_mut(index) else {
            return;
        };
        log::debug!("{} cpu {index} init", I::NAME);
        *slot = Some(Instance {
            regs: Box::new(I::Regs::default()),
            pages: PageSet::new(),
            responder: None,
            total_cycles: 0,
            vdc_penalty: true, // default on
        });
        if let Some(registrar) = self.registrar.as_deref_mut() {
            registrar.register_cpu(&CoreInfo {
                name: I::NAME,
                index,
                address_space: MEMORY_SPACE as u32,
                cycle_granularity: 0,
            });
        }
    }

    /// Tear down every instance and the bank arena. Safe to call with
    /// instances that were never initialized.
    pub fn exit(&mut self) {
        for slot in &mut self.instances {
            *slot = None;
        }
        self.arena.clear();
        self.active = None;
        log::debug!("{} exit", I::NAME);
    }

    /// Make `index` the active instance, loading its register block into
    /// the interpreter. Invalid while another instance is open.
    pub fn open(&mut self, index: usize) {
        debug_assert!(
            self.active.is_none(),
            "open({index}) with cpu {:?} already open",
            self.active
        );
        debug_assert!(index < MAX_CPUS, "open with index {index} out of range");
        debug_assert!(
            self.instances.get(index).is_some_and(|s| s.is_some()),
            "open of uninitialized cpu {index}"
        );
        let Some(inst) = self.instances.get(index).and_then(|s| s.as_ref()) else {
            return;
        };
        self.interp.load_context(&inst.regs);
        self.interp.set_timing_penalty(inst.vdc_penalty);
        self.active = Some(index);
    }

    /// Flush the interpreter's working context back into the active
    /// instance and mark no instance open. Invalid without an open one.
    pub fn close(&mut self) {
        debug_assert!(self.active.is_some(), "close with no cpu open");
        let Some(index) = self.active.take() else {
            return;
        };
        if let Some(inst) = self.instances[index].as_mut() {
            self.interp.save_context(&mut inst.regs);
        }
    }

    /// Index of the currently open instance, or `None`.
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Run `f` with `index` temporarily the open instance. The previously
    /// open instance (if any) is restored on every return path. Switches
    /// do not nest; a nested switch is a usage error.
    pub fn with_instance<T>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> T) -> T {
        let prev = self.active;
        if prev == Some(index) {
            return f(self);
        }
        debug_assert!(!self.switching, "nested instance switch");
        self.switching = true;
        if prev.is_some() {
            self.close();
        }
        self.open(index);
        let out = f(self);
        self.close();
        if let Some(prev) = prev {
            self.open(prev);
        }
        self.switching = false;
        out
    }

    // -----------------------------------------------------------------
    // Bus access (open instance)
    // -----------------------------------------------------------------

    fn open_bus(&mut self) -> Option<CpuBus<'_>> {
        debug_assert!(self.active.is_some(), "bus access with no cpu open");
        let index = self.active?;
        let inst = self.instances[index].as_mut()?;
        Some(CpuBus {
            arena: &mut self.arena,
            pages: &inst.pages,
            responder: &mut inst.responder,
        })
    }

    pub fn read(&mut self, addr: u32) -> u8 {
        self.open_bus().map_or(0, |mut bus| bus.read(addr))
    }

    pub fn fetch(&mut self, addr: u32) -> u8 {
        self.open_bus().map_or(0, |mut bus| bus.fetch(addr))
    }

    pub fn write(&mut self, addr: u32, data: u8) {
        if let Some(mut bus) = self.open_bus() {
            bus.write(addr, data);
        }
    }

    pub fn write_rom(&mut self, addr: u32, data: u8) {
        if let Some(mut bus) = self.open_bus() {
            bus.write_rom(addr, data);
        }
    }

    pub fn write_port(&mut self, port: u8, data: u8) {
        if let Some(mut bus) = self.open_bus() {
            bus.write_port(port, data);
        }
    }

    /// Install direct page mappings for the open instance over the
    /// inclusive range `[start, finish]`. The bank must be large enough
    /// for the range; that is not checked here.
    pub fn map_memory(&mut self, bank: BankId, start: u32, finish: u32, kind: MapKind) {
        debug_assert!(self.active.is_some(), "map_memory with no cpu open");
        let Some(index) = self.active else {
            return;
        };
        if let Some(inst) = self.instances[index].as_mut() {
            inst.pages
                .map(kind, start & ADDRESS_MASK, finish & ADDRESS_MASK, bank);
        }
    }

    /// Replace the open instance's fallback responder. `None` restores the
    /// defaults (reads 0, writes dropped, port writes ignored).
    pub fn set_responder(&mut self, responder: Option<Box<dyn BusResponder>>) {
        debug_assert!(self.active.is_some(), "set_responder with no cpu open");
        let Some(index) = self.active else {
            return;
        };
        if let Some(inst) = self.instances[index].as_mut() {
            inst.responder = responder;
        }
    }

    /// Forward the interrupt acknowledge callback to the interpreter.
    pub fn set_irq_callback(&mut self, callback: Option<IrqCallback>) {
        debug_assert!(self.active.is_some(), "set_irq_callback with no cpu open");
        self.interp.set_irq_callback(callback);
    }

    /// Toggle the open instance's VDC access timing penalty.
    pub fn set_vdc_penalty(&mut self, enabled: bool) {
        debug_assert!(self.active.is_some(), "set_vdc_penalty with no cpu open");
        let Some(index) = self.active else {
            return;
        };
        if let Some(inst) = self.instances[index].as_mut() {
            inst.vdc_penalty = enabled;
        }
        self.interp.set_timing_penalty(enabled);
    }

    // -----------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------

    /// Execute the open instance for `cycles` cycles. Returns the cycles
    /// actually consumed, which also land in the instance's counter.
    pub fn run(&mut self, cycles: u32) -> u32 {
        debug_assert!(self.active.is_some(), "run with no cpu open");
        let Some(index) = self.active else {
            return 0;
        };
        let Some(inst) = self.instances[index].as_mut() else {
            return 0;
        };
        let mut bus = CpuBus {
            arena: &mut self.arena,
            pages: &inst.pages,
            responder: &mut inst.responder,
        };
        let done = self.interp.run(&mut bus, cycles);
        inst.total_cycles += u64::from(done);
        done
    }

    /// Ask the run in progress to return at the next instruction boundary.
    pub fn run_end(&mut self) {
        self.interp.run_end();
    }

    /// Account `cycles` to the open instance without executing anything.
    pub fn idle(&mut self, cycles: u32) -> u32 {
        debug_assert!(self.active.is_some(), "idle with no cpu open");
        let Some(index) = self.active else {
            return 0;
        };
        if let Some(inst) = self.instances[index].as_mut() {
            inst.total_cycles += u64::from(cycles);
        }
        cycles
    }

    /// Cycles the open instance has executed this frame.
    pub fn total_cycles(&self) -> u64 {
        debug_assert!(self.active.is_some(), "total_cycles with no cpu open");
        self.active
            .and_then(|index| self.instances[index].as_ref())
            .map_or(0, |inst| inst.total_cycles)
    }

    /// Start-of-frame bookkeeping: every initialized instance's cycle
    /// counter resets, not just the open one.
    pub fn new_frame(&mut self) {
        for inst in self.instances.iter_mut().flatten() {
            inst.total_cycles = 0;
        }
    }

    /// Reset the open instance's working context through its own bus view
    /// (the reset vector is fetched like any other access).
    pub fn reset(&mut self) {
        debug_assert!(self.active.is_some(), "reset with no cpu open");
        let Some(index) = self.active else {
            return;
        };
        let Some(inst) = self.instances[index].as_mut() else {
            return;
        };
        let mut bus = CpuBus {
            arena: &mut self.arena,
            pages: &inst.pages,
            responder: &mut inst.responder,
        };
        self.interp.reset(&mut bus);
    }

    // -----------------------------------------------------------------
    // Interrupt lines
    // -----------------------------------------------------------------

    /// Change an interrupt line on the open instance. `Auto` asserts the
    /// line, runs [`AUTO_PULSE_CYCLES`] so the interpreter can service it,
    /// then deasserts.
    pub fn set_irq_line(&mut self, line: u8, state: IrqState) {
        debug_assert!(self.active.is_some(), "set_irq_line with no cpu open");
        match state {
            IrqState::Auto => {
                self.interp.set_irq_line(line, true);
                self.run(AUTO_PULSE_CYCLES);
                self.interp.set_irq_line(line, false);
            }
            IrqState::Assert => self.interp.set_irq_line(line, true),
            IrqState::Clear => self.interp.set_irq_line(line, false),
        }
    }

    /// Change an interrupt line on instance `cpu`, whether or not it is
    /// open: the target is switched in for the duration of the change
    /// (including the auto-pulse's execution) and the previously open
    /// instance is restored before returning.
    pub fn set_irq(&mut self, cpu: usize, line: u8, state: IrqState) {
        self.with_instance(cpu, |sys| sys.set_irq_line(line, state));
    }

    // -----------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------

    /// Walk every initialized instance and hand its register block to the
    /// sink, one record each, labeled with the core name and instance
    /// index. The buffer is reloaded after the sink call, so a rewriting
    /// sink restores state in the same pass.
    pub fn scan(&mut self, action: ScanAction, sink: &mut dyn SnapshotSink) {
        if !action.contains(ScanAction::DRIVER_DATA) {
            return;
        }
        for (index, slot) in self.instances.iter_mut().enumerate() {
            let Some(inst) = slot else {
                continue;
            };
            let mut data = Vec::with_capacity(I::SNAPSHOT_LEN);
            I::snapshot_save(&inst.regs, &mut data);
            debug_assert_eq!(data.len(), I::SNAPSHOT_LEN);
            let name = format!("{} registers for chip #{index}", I::NAME);
            sink.record(&name, &mut data);
            I::snapshot_load(&mut inst.regs, &data);
        }
    }
}
