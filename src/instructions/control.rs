use crate::bus::Bus;
use crate::f80::Reg;
use crate::fpu::{Fpu, FpuFlags};

// FNINIT: Initialize FPU
pub fn fninit(fpu: &mut Fpu) {
    fpu.reset();
}

// FNCLEX: Clear FPU Exceptions
// Clears IE, DE, ZE, OE, UE, PE, SF, ES and B. TOP and C0-C3 are untouched.
pub fn fnclex(fpu: &mut Fpu) {
    fpu.set_fpu_flag(FpuFlags::EXCEPTIONS, false);
}

// FNENI / FNDISI: 8087 interrupt enable/disable. Ignored by the 287 and later.
pub fn fneni(fpu: &mut Fpu, bus: &dyn Bus) {
    if bus.arch().is_8086() {
        fpu.cw.set_interrupt_mask(false);
    }
}

pub fn fndisi(fpu: &mut Fpu, bus: &dyn Bus) {
    if bus.arch().is_8086() {
        fpu.cw.set_interrupt_mask(true);
    }
}

// FLDCW: Load Control Word from Memory
// Bits the paired CPU's coprocessor lacks read back as zero.
pub fn fldcw(fpu: &mut Fpu, bus: &dyn Bus, addr: usize) {
    let cw = bus.read_16(addr);
    fpu.cw.load(cw, bus.arch());
    fpu.update_error_summary();
}

// FNSTCW: Store Control Word
pub fn fnstcw(fpu: &Fpu, bus: &mut dyn Bus, addr: usize) {
    bus.write_16(addr, fpu.cw.raw());
}

// FNSTSW m16
pub fn fnstsw(fpu: &Fpu, bus: &mut dyn Bus, addr: usize) {
    bus.write_16(addr, fpu.status());
}

// FNSTSW AX
pub fn fnstsw_ax(fpu: &Fpu, bus: &mut dyn Bus) {
    bus.store_ax(fpu.status());
}

// FFREE / FFREEP: tag ST(i) empty, optionally pop
pub fn ffree(fpu: &mut Fpu, i: u8, pop: bool) {
    fpu.free(i as usize);
    if pop {
        fpu.pop();
    }
}

// FINCSTP: Increment Stack Top Pointer
// Rotates TOP only; tags and contents stay where they are.
pub fn fincstp(fpu: &mut Fpu) {
    let top = fpu.top();
    fpu.set_top(top.wrapping_add(1));
    fpu.set_c1(false);
}

// FDECSTP: Decrement Stack Top Pointer
pub fn fdecstp(fpu: &mut Fpu) {
    let top = fpu.top();
    fpu.set_top(top.wrapping_sub(1));
    fpu.set_c1(false);
}

// ============== Environment image =================
//
// Real-mode layout, 16-bit operand size (14 bytes):
// 00: Control Word
// 02: Status Word
// 04: Tag Word
// 06: Instruction Pointer (Low)
// 08: Instruction Pointer (High) & Opcode
// 0A: Operand Pointer (Low)
// 0C: Operand Pointer (High)
//
// The 32-bit layout (28 bytes) widens every field to a dword. Instruction
// and operand pointers are not tracked and are stored as zero.

fn env_stride(bus: &dyn Bus) -> usize {
    if bus.big_operands() { 4 } else { 2 }
}

pub fn env_size(bus: &dyn Bus) -> usize {
    env_stride(bus) * 7
}

fn store_env(fpu: &Fpu, bus: &mut dyn Bus, addr: usize) {
    let stride = env_stride(bus);
    let words = [fpu.cw.raw(), fpu.status(), fpu.get_tag(), 0, 0, 0, 0];
    for (i, w) in words.iter().enumerate() {
        let at = addr.wrapping_add(i * stride);
        if stride == 4 {
            bus.write_32(at, *w as u32);
        } else {
            bus.write_16(at, *w);
        }
    }
    log::debug!(
        "[FPU] Environment stored at {:05X}: CW={:04X} SW={:04X} TW={:04X}",
        addr,
        words[0],
        words[1],
        words[2]
    );
}

fn load_env(fpu: &mut Fpu, bus: &dyn Bus, addr: usize) {
    let stride = env_stride(bus);
    let cw = bus.read_16(addr);
    let sw = bus.read_16(addr.wrapping_add(stride));
    let tw = bus.read_16(addr.wrapping_add(2 * stride));
    fpu.cw.load(cw, bus.arch());
    fpu.set_status(sw);
    fpu.set_tag(tw);
    fpu.update_error_summary();
    log::debug!(
        "[FPU] Environment loaded from {:05X}: CW={:04X} SW={:04X} TW={:04X}",
        addr,
        fpu.cw.raw(),
        fpu.status(),
        fpu.get_tag()
    );
}

// FNSTENV: Store Environment, then mask all exceptions
pub fn fnstenv(fpu: &mut Fpu, bus: &mut dyn Bus, addr: usize) {
    store_env(fpu, bus, addr);
    fpu.cw = fpu.cw.all_masked();
}

// FLDENV: Load Environment
pub fn fldenv(fpu: &mut Fpu, bus: &dyn Bus, addr: usize) {
    load_env(fpu, bus, addr);
}

// FNSAVE: Save FPU State
// Environment followed by ST(0)..ST(7), 10 bytes each, then FNINIT.
pub fn fnsave(fpu: &mut Fpu, bus: &mut dyn Bus, addr: usize) {
    store_env(fpu, bus, addr);
    let mut reg_addr = addr.wrapping_add(env_size(bus));
    for i in 0..8 {
        bus.write_f80(reg_addr, fpu.st_f80(i));
        reg_addr = reg_addr.wrapping_add(10);
    }
    fpu.reset();
}

// FRSTOR: Restore FPU State
// Registers come back raw; the tags are taken from the saved tag word.
pub fn frstor(fpu: &mut Fpu, bus: &dyn Bus, addr: usize) {
    load_env(fpu, bus, addr);
    let mut reg_addr = addr.wrapping_add(env_size(bus));
    for i in 0..8 {
        let phys = fpu.phys(i);
        fpu.regs[phys] = Reg::Extended(bus.read_f80(reg_addr));
        reg_addr = reg_addr.wrapping_add(10);
    }
}
