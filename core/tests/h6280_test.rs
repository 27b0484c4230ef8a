use tgx_core::core::bus::{BusResponder, Shared};
use tgx_core::cpu::h6280::{H6280, H6280Regs, LINE_IRQ1, LINE_TIMER};
use tgx_core::cpu::{BankId, CpuSystem, Interpreter, IrqState, MapKind};

mod common;

const ROM_LEN: usize = 0x2000;

/// 8K image: program at logical $E000 (offset 0), NOP filler, vectors in
/// the last page (IRQ1 -> $E040, TIMER -> $E060, RESET -> $E000).
fn rom_with(program: &[u8], handler: &[u8]) -> Vec<u8> {
    let mut rom = vec![0xEA; ROM_LEN];
    rom[..program.len()].copy_from_slice(program);
    rom[0x40..0x40 + handler.len()].copy_from_slice(handler);
    rom[0x1FF8] = 0x40;
    rom[0x1FF9] = 0xE0;
    rom[0x1FFA] = 0x60;
    rom[0x1FFB] = 0xE0;
    rom[0x1FFE] = 0x00;
    rom[0x1FFF] = 0xE0;
    rom
}

/// ROM at physical 0, 2K of RAM at physical $2000 (one TAM away from the
/// zero page and stack), CPU reset and left open.
fn board(rom: Vec<u8>) -> (CpuSystem<H6280>, BankId) {
    common::init_logging();
    let mut sys = CpuSystem::new(H6280::new());
    sys.init(0);
    sys.open(0);
    let rom = sys.add_bank(rom);
    sys.map_memory(rom, 0x0000, 0x1FFF, MapKind::ROM);
    let ram = sys.add_bank(vec![0; 0x800]);
    sys.map_memory(ram, 0x2000, 0x27FF, MapKind::RAM);
    sys.reset();
    (sys, ram)
}

#[derive(Default)]
struct PortLog {
    ports: Vec<(u8, u8)>,
}

impl BusResponder for PortLog {
    fn write_port(&mut self, port: u8, data: u8) {
        self.ports.push((port, data));
    }
}

#[test]
fn test_reset_establishes_power_on_state() {
    let (sys, _) = board(rom_with(&[], &[]));
    let regs = sys.interpreter().regs();
    assert_eq!(regs.pc, 0xE000);
    assert_eq!(regs.sp, 0xFD);
    assert_eq!(regs.p & 0x04, 0x04); // interrupts masked
    assert_eq!(regs.mpr, [0; 8]);
}

#[test]
fn test_lda_sta_zero_page() {
    // LDA #$01 / TAM #$02 (zero page -> phys $2000), LDA #$5A / STA $10.
    let (mut sys, ram) = board(rom_with(
        &[0xA9, 0x01, 0x53, 0x02, 0xA9, 0x5A, 0x85, 0x10],
        &[],
    ));
    assert_eq!(sys.run(13), 13);
    assert_eq!(sys.interpreter().regs().a, 0x5A);
    assert_eq!(sys.bank(ram)[0x10], 0x5A);
}

#[test]
fn test_lda_absolute_sets_negative() {
    let mut rom = rom_with(&[0xAD, 0x00, 0xE1], &[]);
    rom[0x100] = 0x84;
    let (mut sys, _) = board(rom);
    assert_eq!(sys.run(5), 5);
    let regs = sys.interpreter().regs();
    assert_eq!(regs.a, 0x84);
    assert_eq!(regs.p & 0x80, 0x80);
    assert_eq!(regs.p & 0x02, 0);
}

#[test]
fn test_tam_rebanks_the_logical_space() {
    // LDA #$01 / TAM #$04: logical $4000-$5FFF now maps to phys $2000.
    // LDA $4000 then reads the RAM marker; TMA #$04 reads the MPR back.
    let (mut sys, ram) = board(rom_with(
        &[0xA9, 0x01, 0x53, 0x04, 0xAD, 0x00, 0x40, 0xA9, 0x00, 0x43, 0x04],
        &[],
    ));
    sys.bank_mut(ram)[0] = 0x77;
    assert_eq!(sys.run(12), 12);
    assert_eq!(sys.interpreter().regs().a, 0x77);
    assert_eq!(sys.interpreter().regs().mpr[2], 0x01);
    assert_eq!(sys.run(6), 6);
    assert_eq!(sys.interpreter().regs().a, 0x01);
}

#[test]
fn test_st_opcodes_reach_the_port_channel() {
    let (mut sys, _) = board(rom_with(&[0x03, 0x05, 0x13, 0x34, 0x23, 0x12], &[]));
    let log = Shared::new(PortLog::default());
    sys.set_responder(Some(Box::new(log.clone())));
    // Penalty defaults on: 5 cycles each.
    assert_eq!(sys.run(15), 15);
    assert_eq!(
        log.handle().borrow().ports,
        vec![(0, 0x05), (2, 0x34), (3, 0x12)]
    );
    assert_eq!(sys.interpreter().regs().io_buffer, [3, 0x12]);
}

#[test]
fn test_vdc_penalty_shortens_st_timing() {
    let (mut sys, _) = board(rom_with(&[0x03, 0x05], &[]));
    sys.set_vdc_penalty(false);
    assert_eq!(sys.run(4), 4);
    assert_eq!(sys.interpreter().regs().pc, 0xE002);
}

#[test]
fn test_irq1_is_serviced_through_its_vector() {
    // Main: bank in RAM, CLI, then spin. Handler: LDA #$77 / STA $10 / RTI.
    let (mut sys, ram) = board(rom_with(
        &[0xA9, 0x01, 0x53, 0x02, 0x58, 0x80, 0xFE],
        &[0xA9, 0x77, 0x85, 0x10, 0x40],
    ));
    assert_eq!(sys.run(9), 9);
    sys.set_irq_line(LINE_IRQ1, IrqState::Assert);
    // Service (8) + LDA (2) + STA (4).
    assert_eq!(sys.run(14), 14);
    assert_eq!(sys.bank(ram)[0x10], 0x77);
    // Drop the line before RTI or it retriggers.
    sys.set_irq_line(LINE_IRQ1, IrqState::Clear);
    assert_eq!(sys.run(7), 7);
    let regs = sys.interpreter().regs();
    assert_eq!(regs.pc, 0xE005); // back at the spin loop
    assert_eq!(regs.p & 0x04, 0);
}

#[test]
fn test_timer_outranks_irq1() {
    let (mut sys, _) = board(rom_with(&[0x58, 0x80, 0xFE], &[]));
    assert_eq!(sys.run(2), 2);
    sys.set_irq_line(LINE_IRQ1, IrqState::Assert);
    sys.set_irq_line(LINE_TIMER, IrqState::Assert);
    assert_eq!(sys.run(8), 8);
    assert_eq!(sys.interpreter().regs().pc, 0xE060);
}

#[test]
fn test_auto_pulse_partial_service_resumes() {
    // The 10-cycle pulse covers the service sequence (8) plus LDA (2);
    // the rest of the handler runs once execution continues.
    let (mut sys, ram) = board(rom_with(
        &[0xA9, 0x01, 0x53, 0x02, 0x58, 0x80, 0xFE],
        &[0xA9, 0x77, 0x85, 0x10, 0x40],
    ));
    assert_eq!(sys.run(9), 9);
    sys.set_irq_line(LINE_IRQ1, IrqState::Auto);
    assert_eq!(sys.bank(ram)[0x10], 0x00);
    assert_eq!(sys.run(11), 11); // STA + RTI
    assert_eq!(sys.bank(ram)[0x10], 0x77);
    assert_eq!(sys.interpreter().regs().pc, 0xE005);
}

#[test]
fn test_snapshot_excludes_the_io_latch() {
    let mut regs = H6280Regs {
        a: 1,
        x: 2,
        y: 3,
        sp: 0xF0,
        p: 0x84,
        pc: 0xBEEF,
        mpr: [0xF8, 1, 2, 3, 4, 5, 6, 7],
        irq_pending: 0x05,
        io_buffer: [3, 0x12],
    };
    let mut data = Vec::new();
    H6280::snapshot_save(&regs, &mut data);
    assert_eq!(data.len(), H6280::SNAPSHOT_LEN);

    let saved = regs.clone();
    regs = H6280Regs::default();
    H6280::snapshot_load(&mut regs, &data);
    assert_eq!(regs.io_buffer, [0, 0]);
    regs.io_buffer = saved.io_buffer;
    assert_eq!(regs, saved);
}
