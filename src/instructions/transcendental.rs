use std::f64::consts::LN_2;

use crate::f80::Reg;
use crate::fpu::{Fpu, FpuFlags};

use super::utils::{check_denormal, invalid, propagate_nan};

/// Largest magnitude FSIN, FCOS, FSINCOS and FPTAN accept.
const TRIG_LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63

/// Shared entry for the trigonometric instructions. Returns the argument
/// when it is in range, otherwise writes the NaN or invalid result into
/// ST(0) (or sets C2 and leaves it alone) and returns `None`.
fn trig_operand(fpu: &mut Fpu) -> Option<f64> {
    let v = fpu.fetch(0);
    if let Some(nan) = propagate_nan(fpu, &v, None) {
        fpu.set_c2(false);
        fpu.set(0, nan);
        return None;
    }
    check_denormal(fpu, &[&v]);
    let x = v.value();
    if x.is_infinite() {
        fpu.set_c2(false);
        let r = invalid(fpu);
        fpu.set(0, r);
        return None;
    }
    if x.abs() >= TRIG_LIMIT {
        fpu.set_c2(true);
        return None;
    }
    fpu.set_c2(false);
    Some(x)
}

fn inexact_unless(fpu: &mut Fpu, exact: bool) {
    if !exact {
        fpu.raise(FpuFlags::PE);
    }
}

// FSIN: Sine
pub fn fsin(fpu: &mut Fpu) {
    let Some(x) = trig_operand(fpu) else {
        return;
    };
    inexact_unless(fpu, x == 0.0);
    fpu.set(0, Reg::Native(x.sin()));
}

// FCOS: Cosine
pub fn fcos(fpu: &mut Fpu) {
    let Some(x) = trig_operand(fpu) else {
        return;
    };
    inexact_unless(fpu, x == 0.0);
    fpu.set(0, Reg::Native(x.cos()));
}

// FSINCOS: ST(0) = sin, then push cos
pub fn fsincos(fpu: &mut Fpu) {
    let Some(x) = trig_operand(fpu) else {
        if fpu.peek(0).is_nan() && !fpu.get_fpu_flag(FpuFlags::C2) {
            let nan = fpu.peek(0);
            fpu.push(nan);
        }
        return;
    };
    inexact_unless(fpu, x == 0.0);
    let (s, c) = x.sin_cos();
    fpu.set(0, Reg::Native(s));
    fpu.push(Reg::Native(c));
}

// FPTAN: Partial Tangent
// ST(0) = tan(ST(0)), then push 1.0
pub fn fptan(fpu: &mut Fpu) {
    let Some(x) = trig_operand(fpu) else {
        if fpu.peek(0).is_nan() && !fpu.get_fpu_flag(FpuFlags::C2) {
            let nan = fpu.peek(0);
            fpu.push(nan);
        }
        return;
    };
    inexact_unless(fpu, x == 0.0);
    fpu.set(0, Reg::Native(x.tan()));
    fpu.push(Reg::Native(1.0));
}

// FPATAN: Partial Arctangent
// ST(1) = atan(ST(1) / ST(0)), pop
pub fn fpatan(fpu: &mut Fpu) {
    let x = fpu.fetch(0);
    let y = fpu.fetch(1);
    let result = match propagate_nan(fpu, &y, Some(&x)) {
        Some(nan) => nan,
        None => {
            check_denormal(fpu, &[&x, &y]);
            let r = y.value().atan2(x.value());
            inexact_unless(fpu, r == 0.0);
            Reg::Native(r)
        }
    };
    fpu.set(1, result);
    fpu.pop();
}

// F2XM1: ST(0) = 2^ST(0) - 1
// Defined for -1 <= ST(0) <= 1.
pub fn f2xm1(fpu: &mut Fpu) {
    let v = fpu.fetch(0);
    if let Some(nan) = propagate_nan(fpu, &v, None) {
        fpu.set(0, nan);
        return;
    }
    check_denormal(fpu, &[&v]);
    let x = v.value();
    let r = if x == f64::NEG_INFINITY {
        -1.0
    } else if x.abs() < 0.5 {
        (x * LN_2).exp_m1()
    } else {
        x.exp2() - 1.0
    };
    inexact_unless(fpu, x.fract() == 0.0 || x.is_infinite());
    fpu.set(0, Reg::Native(r));
}

// FYL2X: ST(1) = ST(1) * log2(ST(0)), pop
pub fn fyl2x(fpu: &mut Fpu) {
    let x = fpu.fetch(0);
    let y = fpu.fetch(1);
    let result = match propagate_nan(fpu, &y, Some(&x)) {
        Some(nan) => nan,
        None => {
            check_denormal(fpu, &[&x, &y]);
            let (xv, yv) = (x.value(), y.value());
            if xv < 0.0 {
                invalid(fpu)
            } else {
                let l = xv.log2();
                let r = yv * l;
                if r.is_nan() {
                    invalid(fpu)
                } else {
                    if xv == 0.0 && yv.is_finite() {
                        fpu.raise(FpuFlags::ZE);
                    }
                    inexact_unless(fpu, !l.is_finite() || l.fract() == 0.0);
                    Reg::Native(r)
                }
            }
        }
    };
    fpu.set(1, result);
    fpu.pop();
}

// FYL2XP1: ST(1) = ST(1) * log2(ST(0) + 1), pop
// Accurate for ST(0) close to zero.
pub fn fyl2xp1(fpu: &mut Fpu) {
    let x = fpu.fetch(0);
    let y = fpu.fetch(1);
    let result = match propagate_nan(fpu, &y, Some(&x)) {
        Some(nan) => nan,
        None => {
            check_denormal(fpu, &[&x, &y]);
            let (xv, yv) = (x.value(), y.value());
            if xv < -1.0 {
                invalid(fpu)
            } else {
                let r = yv * (xv.ln_1p() / LN_2);
                if r.is_nan() {
                    invalid(fpu)
                } else {
                    if xv == -1.0 && yv != 0.0 && yv.is_finite() {
                        fpu.raise(FpuFlags::ZE);
                    }
                    inexact_unless(fpu, xv == 0.0);
                    Reg::Native(r)
                }
            }
        }
    };
    fpu.set(1, result);
    fpu.pop();
}
