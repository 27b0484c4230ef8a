#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use tgx_core::core::snapshot::SnapshotSink;
use tgx_core::cpu::system::CpuBus;
use tgx_core::cpu::{CoreInfo, CoreRegistrar, CpuSystem, Interpreter, IrqCallback};

static LOGGER: Once = Once::new();

/// Initialize test logging once per binary.
pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// What the scripted interpreter was asked to do, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Load(u32),
    Save(u32),
    Irq { line: u8, asserted: bool },
    Run(u32),
    Reset,
}

/// Stored register block for the scripted interpreter. `tag` identifies
/// the block in the event log; `scratch` is the transient tail that must
/// stay out of snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TestRegs {
    pub tag: u32,
    pub counter: u32,
    pub irq_level: u8,
    pub scratch: u8,
}

/// Scripted interpreter: consumes exactly the cycles asked of it, logs
/// every context switch and interrupt edge, and touches the bus once per
/// run so routing stays on the hot path.
#[derive(Default)]
pub struct TestInterpreter {
    pub regs: TestRegs,
    pub events: Vec<Event>,
    pub penalty: bool,
    pub ended: bool,
    pub callback: Option<IrqCallback>,
}

impl Interpreter for TestInterpreter {
    const NAME: &'static str = "testcpu";
    const SNAPSHOT_LEN: usize = 9;

    type Regs = TestRegs;

    fn load_context(&mut self, regs: &TestRegs) {
        self.regs = *regs;
        self.events.push(Event::Load(regs.tag));
    }

    fn save_context(&mut self, regs: &mut TestRegs) {
        self.events.push(Event::Save(self.regs.tag));
        *regs = self.regs;
    }

    fn reset(&mut self, bus: &mut CpuBus<'_>) {
        self.regs.counter = 0;
        self.regs.scratch = bus.read(0);
        self.events.push(Event::Reset);
    }

    fn run(&mut self, bus: &mut CpuBus<'_>, cycles: u32) -> u32 {
        self.events.push(Event::Run(cycles));
        self.regs.counter += cycles;
        self.regs.scratch = bus.read(0);
        cycles
    }

    fn run_end(&mut self) {
        self.ended = true;
    }

    fn set_irq_line(&mut self, line: u8, asserted: bool) {
        self.events.push(Event::Irq { line, asserted });
        if asserted {
            self.regs.irq_level |= 1 << line;
        } else {
            self.regs.irq_level &= !(1 << line);
        }
    }

    fn set_irq_callback(&mut self, callback: Option<IrqCallback>) {
        self.callback = callback;
    }

    fn set_timing_penalty(&mut self, enabled: bool) {
        self.penalty = enabled;
    }

    fn snapshot_save(regs: &TestRegs, out: &mut Vec<u8>) {
        out.extend_from_slice(&regs.tag.to_le_bytes());
        out.extend_from_slice(&regs.counter.to_le_bytes());
        out.push(regs.irq_level);
    }

    fn snapshot_load(regs: &mut TestRegs, data: &[u8]) {
        regs.tag = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        regs.counter = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        regs.irq_level = data[8];
    }
}

/// Sink that copies every record out for inspection.
#[derive(Default)]
pub struct RecordingSink {
    pub records: Vec<(String, Vec<u8>)>,
}

impl SnapshotSink for RecordingSink {
    fn record(&mut self, name: &str, data: &mut [u8]) {
        self.records.push((name.to_string(), data.to_vec()));
    }
}

/// Sink that rewrites each record from a stored block, in order.
#[derive(Default)]
pub struct RestoreSink {
    pub blocks: Vec<Vec<u8>>,
    pub cursor: usize,
}

impl SnapshotSink for RestoreSink {
    fn record(&mut self, _name: &str, data: &mut [u8]) {
        data.copy_from_slice(&self.blocks[self.cursor]);
        self.cursor += 1;
    }
}

/// Registrar that records every `CoreInfo` it is handed.
pub struct SharedRegistrar(pub Rc<RefCell<Vec<CoreInfo>>>);

impl CoreRegistrar for SharedRegistrar {
    fn register_cpu(&mut self, info: &CoreInfo) {
        self.0.borrow_mut().push(*info);
    }
}

/// A system with `n` initialized instances, tagged 1..=n, event log
/// cleared.
pub fn system_with(n: usize) -> CpuSystem<TestInterpreter> {
    init_logging();
    let mut sys = CpuSystem::new(TestInterpreter::default());
    for i in 0..n {
        sys.init(i);
        sys.open(i);
        sys.interpreter_mut().regs.tag = i as u32 + 1;
        sys.close();
    }
    sys.interpreter_mut().events.clear();
    sys
}
