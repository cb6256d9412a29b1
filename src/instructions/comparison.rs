use std::cmp::Ordering;

use crate::bus::Bus;
use crate::f80::{F80, Reg};
use crate::fpu::{Fpu, FpuFlags, Tag};

use super::decode::Source;
use super::utils::{check_denormal, is_unsupported, operand};

/// Sets C3, C2 and C0 from a comparison outcome; `None` is unordered.
/// C1 is always cleared.
fn set_compare_flags(fpu: &mut Fpu, order: Option<Ordering>) {
    let (c3, c2, c0) = match order {
        Some(Ordering::Greater) => (false, false, false),
        Some(Ordering::Less) => (false, false, true),
        Some(Ordering::Equal) => (true, false, false),
        None => (true, true, true),
    };
    fpu.set_c3(c3);
    fpu.set_c2(c2);
    fpu.set_c1(false);
    fpu.set_c0(c0);
}

/// Orders `a` against `b`. Ordered compares (FCOM) fault on any NaN,
/// unordered ones (FUCOM) only on signaling NaNs.
fn compare(fpu: &mut Fpu, a: &Reg, b: &Reg, unordered: bool) -> Option<Ordering> {
    if a.is_nan() || b.is_nan() {
        let signaling = |r: &Reg| r.is_snan() || is_unsupported(r);
        if !unordered || signaling(a) || signaling(b) {
            fpu.raise(FpuFlags::IE);
        }
        return None;
    }
    check_denormal(fpu, &[a, b]);
    a.to_f80().compare(&b.to_f80())
}

// FCOM/FCOMP/FCOMPP, FICOM/FICOMP, FUCOM/FUCOMP/FUCOMPP
// Compare ST(0) with the source, then pop `pops` times.
pub fn fcom(fpu: &mut Fpu, bus: &mut dyn Bus, src: Source, pops: u8, unordered: bool, addr: usize) {
    let a = fpu.fetch(0);
    let b = operand(fpu, bus, src, addr);
    let order = compare(fpu, &a, &b, unordered);
    set_compare_flags(fpu, order);
    for _ in 0..pops {
        fpu.pop();
    }
}

// FTST: Compare ST(0) with +0.0
pub fn ftst(fpu: &mut Fpu) {
    let a = fpu.fetch(0);
    let zero = Reg::Extended(F80::new());
    let order = compare(fpu, &a, &zero, false);
    set_compare_flags(fpu, order);
}

// FXAM: Examine ST(0)
// Never faults; an empty register is reported as such.
pub fn fxam(fpu: &mut Fpu) {
    let v = fpu.peek(0);
    fpu.set_c1(v.sign());

    // (C3, C2, C0)
    let class = if fpu.tag(0) == Tag::Empty {
        (true, false, true)
    } else {
        let f = v.to_f80();
        if f.is_unsupported() {
            (false, false, false)
        } else if f.is_nan() {
            (false, false, true)
        } else if f.is_infinite() {
            (false, true, true)
        } else if f.is_zero() {
            (true, false, false)
        } else if v.is_denormal() {
            (true, true, false)
        } else {
            (false, true, false)
        }
    };
    fpu.set_c3(class.0);
    fpu.set_c2(class.1);
    fpu.set_c0(class.2);
}
