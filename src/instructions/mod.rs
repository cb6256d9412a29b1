//! Coprocessor entry points.
//!
//! The host CPU calls one of sixteen functions when it meets an escape opcode
//! (`D8`..`DF`): `escN_normal` for a register-form ModRM byte (mod == 3) and
//! `escN_ea` for a memory operand, passing the physical address it resolved.
//! All of them go through [`decode::decode`] and one executor.

use crate::bus::Bus;
use crate::fpu::Fpu;

pub mod arithmetic;
pub mod comparison;
pub mod control;
pub mod data;
pub mod decode;
pub mod transcendental;
pub mod utils;

use decode::{Form, Op};

/// Register form of escape group `esc` (0 for `D8` through 7 for `DF`).
pub fn esc_normal(fpu: &mut Fpu, bus: &mut dyn Bus, esc: u8, rm: u8) {
    match decode::decode(esc, Form::Register, rm) {
        Some(op) => execute(fpu, bus, op, 0),
        None => bus.log_unhandled(esc, false, decode::group(rm), decode::sub(rm)),
    }
}

/// Memory form of escape group `esc`; `addr` is the operand's physical address.
pub fn esc_ea(fpu: &mut Fpu, bus: &mut dyn Bus, esc: u8, rm: u8, addr: usize) {
    match decode::decode(esc, Form::Memory, rm) {
        Some(op) => execute(fpu, bus, op, addr),
        None => bus.log_unhandled(esc, true, decode::group(rm), decode::sub(rm)),
    }
}

pub fn esc0_normal(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8) {
    esc_normal(fpu, bus, 0, rm);
}

pub fn esc0_ea(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8, addr: usize) {
    esc_ea(fpu, bus, 0, rm, addr);
}

pub fn esc1_normal(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8) {
    esc_normal(fpu, bus, 1, rm);
}

pub fn esc1_ea(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8, addr: usize) {
    esc_ea(fpu, bus, 1, rm, addr);
}

pub fn esc2_normal(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8) {
    esc_normal(fpu, bus, 2, rm);
}

pub fn esc2_ea(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8, addr: usize) {
    esc_ea(fpu, bus, 2, rm, addr);
}

pub fn esc3_normal(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8) {
    esc_normal(fpu, bus, 3, rm);
}

pub fn esc3_ea(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8, addr: usize) {
    esc_ea(fpu, bus, 3, rm, addr);
}

pub fn esc4_normal(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8) {
    esc_normal(fpu, bus, 4, rm);
}

pub fn esc4_ea(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8, addr: usize) {
    esc_ea(fpu, bus, 4, rm, addr);
}

pub fn esc5_normal(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8) {
    esc_normal(fpu, bus, 5, rm);
}

pub fn esc5_ea(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8, addr: usize) {
    esc_ea(fpu, bus, 5, rm, addr);
}

pub fn esc6_normal(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8) {
    esc_normal(fpu, bus, 6, rm);
}

pub fn esc6_ea(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8, addr: usize) {
    esc_ea(fpu, bus, 6, rm, addr);
}

pub fn esc7_normal(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8) {
    esc_normal(fpu, bus, 7, rm);
}

pub fn esc7_ea(fpu: &mut Fpu, bus: &mut dyn Bus, rm: u8, addr: usize) {
    esc_ea(fpu, bus, 7, rm, addr);
}

/// FLDCW for hosts that handle it outside the escape dispatch.
pub fn fldcw(fpu: &mut Fpu, bus: &mut dyn Bus, addr: usize) {
    control::fldcw(fpu, bus, addr);
}

fn execute(fpu: &mut Fpu, bus: &mut dyn Bus, op: Op, addr: usize) {
    log::trace!("[FPU] {:?} addr={:05X} TOP={}", op, addr, fpu.top());

    match op {
        // ARITHMETIC
        // ----------
        Op::Arith { kind, dest, src, pop } => arithmetic::arith(fpu, bus, kind, dest, src, pop, addr),
        Op::Chs => arithmetic::fchs(fpu),
        Op::Abs => arithmetic::fabs(fpu),
        Op::Sqrt => arithmetic::fsqrt(fpu),
        Op::Rndint => arithmetic::frndint(fpu),
        Op::Scale => arithmetic::fscale(fpu),
        Op::Xtract => arithmetic::fxtract(fpu),
        Op::Prem => arithmetic::fprem(fpu, false),
        Op::Prem1 => arithmetic::fprem(fpu, true),

        // COMPARISON
        // ----------
        Op::Compare { src, pops, unordered } => comparison::fcom(fpu, bus, src, pops, unordered, addr),
        Op::Tst => comparison::ftst(fpu),
        Op::Xam => comparison::fxam(fpu),

        // DATA TRANSFER
        // -------------
        Op::Load(src) => data::fld(fpu, bus, src, addr),
        Op::LoadConst(c) => data::fld_const(fpu, c),
        Op::Store { dest, pop } => data::fst(fpu, bus, dest, pop, addr),
        Op::Xch(i) => data::fxch(fpu, i),

        // TRANSCENDENTAL
        // --------------
        Op::Sin => transcendental::fsin(fpu),
        Op::Cos => transcendental::fcos(fpu),
        Op::SinCos => transcendental::fsincos(fpu),
        Op::Ptan => transcendental::fptan(fpu),
        Op::Patan => transcendental::fpatan(fpu),
        Op::F2xm1 => transcendental::f2xm1(fpu),
        Op::Yl2x => transcendental::fyl2x(fpu),
        Op::Yl2xp1 => transcendental::fyl2xp1(fpu),

        // CONTROL & STATE
        // ---------------
        Op::Nop => {}
        Op::Free { reg, pop } => control::ffree(fpu, reg, pop),
        Op::Decstp => control::fdecstp(fpu),
        Op::Incstp => control::fincstp(fpu),
        Op::Init => control::fninit(fpu),
        Op::Clex => control::fnclex(fpu),
        Op::Eni => control::fneni(fpu, bus),
        Op::Disi => control::fndisi(fpu, bus),
        // Protected mode does not change coprocessor behavior here
        Op::Setpm => {}
        Op::Ldcw => control::fldcw(fpu, bus, addr),
        Op::Stcw => control::fnstcw(fpu, bus, addr),
        Op::Stsw => control::fnstsw(fpu, bus, addr),
        Op::StswAx => control::fnstsw_ax(fpu, bus),
        Op::Ldenv => control::fldenv(fpu, bus, addr),
        Op::Stenv => control::fnstenv(fpu, bus, addr),
        Op::Rstor => control::frstor(fpu, bus, addr),
        Op::Save => control::fnsave(fpu, bus, addr),
    }
}
