use std::cmp::Ordering;

use crate::bus::Bus;
use crate::control::RoundMode;
use crate::f80::{F80, F80_EXPONENT_BIAS, Reg};
use crate::fpu::{Fpu, FpuFlags};

use super::decode::{ArithKind, Source};
use super::utils::{check_denormal, invalid, operand, propagate_nan, round_result};

// FADD/FSUB/FSUBR/FMUL/FDIV/FDIVR and their P, I and reversed forms.
// ST(dest) = ST(dest) op src, then pop if requested.
pub fn arith(
    fpu: &mut Fpu,
    bus: &mut dyn Bus,
    kind: ArithKind,
    dest: u8,
    src: Source,
    pop: bool,
    addr: usize,
) {
    let a = fpu.fetch(dest as usize);
    let b = operand(fpu, bus, src, addr);
    let result = binary(fpu, kind, &a, &b);
    fpu.set(dest as usize, result);
    if pop {
        fpu.pop();
    }
}

/// One binary operation under the current control word.
pub fn binary(fpu: &mut Fpu, kind: ArithKind, a: &Reg, b: &Reg) -> Reg {
    if let Some(nan) = propagate_nan(fpu, a, Some(b)) {
        return nan;
    }
    check_denormal(fpu, &[a, b]);
    let (x, y) = (a.value(), b.value());
    let r = match kind {
        ArithKind::Add => add(fpu, x, y),
        ArithKind::Sub => add(fpu, x, -y),
        ArithKind::SubR => add(fpu, y, -x),
        ArithKind::Mul => mul(fpu, x, y),
        ArithKind::Div => div(fpu, x, y),
        ArithKind::DivR => div(fpu, y, x),
    };
    match r {
        Some(v) => Reg::Native(v),
        None => invalid(fpu),
    }
}

fn add(fpu: &mut Fpu, x: f64, y: f64) -> Option<f64> {
    if x.is_infinite() && y.is_infinite() && x.is_sign_negative() != y.is_sign_negative() {
        return None;
    }
    let s = x + y;
    if s.is_infinite() && x.is_finite() && y.is_finite() {
        return Some(round_result(fpu, s, 0.0, true));
    }
    if !s.is_finite() {
        fpu.set_c1(false);
        return Some(s);
    }
    // Knuth two-sum: s + err is exactly x + y
    let bb = s - x;
    let err = (x - (s - bb)) + (y - bb);
    let mut out = round_result(fpu, s, err, false);
    if out == 0.0 && err == 0.0 && fpu.rounding() == RoundMode::Down {
        // An exact zero from operands of opposite sign is -0 when rounding down
        if !(x == 0.0 && y == 0.0 && x.is_sign_positive() && y.is_sign_positive()) {
            out = -0.0;
        }
    }
    Some(out)
}

fn mul(fpu: &mut Fpu, x: f64, y: f64) -> Option<f64> {
    if (x.is_infinite() && y == 0.0) || (x == 0.0 && y.is_infinite()) {
        return None;
    }
    let p = x * y;
    if p.is_infinite() && x.is_finite() && y.is_finite() {
        return Some(round_result(fpu, p, 0.0, true));
    }
    if !p.is_finite() {
        fpu.set_c1(false);
        return Some(p);
    }
    let err = x.mul_add(y, -p);
    Some(round_result(fpu, p, err, false))
}

fn div(fpu: &mut Fpu, x: f64, y: f64) -> Option<f64> {
    if (x == 0.0 && y == 0.0) || (x.is_infinite() && y.is_infinite()) {
        return None;
    }
    if y == 0.0 {
        // Only a finite dividend signals; inf / 0 is an exact infinity
        if x.is_finite() {
            fpu.raise(FpuFlags::ZE);
        }
        let neg = x.is_sign_negative() != y.is_sign_negative();
        fpu.set_c1(false);
        return Some(if neg { f64::NEG_INFINITY } else { f64::INFINITY });
    }
    let q = x / y;
    if q.is_infinite() && x.is_finite() {
        return Some(round_result(fpu, q, 0.0, true));
    }
    if !q.is_finite() || y.is_infinite() {
        fpu.set_c1(false);
        return Some(q);
    }
    // x - q*y is exact; its sign relative to y gives the error direction
    let rem = (-q).mul_add(y, x);
    let err = if rem == 0.0 {
        0.0
    } else if rem.is_sign_negative() == y.is_sign_negative() {
        f64::MIN_POSITIVE
    } else {
        -f64::MIN_POSITIVE
    };
    Some(round_result(fpu, q, err, false))
}

// FCHS: Change Sign
pub fn fchs(fpu: &mut Fpu) {
    let v = fpu.fetch(0);
    let flipped = match v {
        Reg::Native(x) => Reg::Native(-x),
        Reg::Extended(mut f) => {
            f.set_sign(!f.get_sign());
            Reg::Extended(f)
        }
    };
    fpu.set_c1(false);
    fpu.set(0, flipped);
}

// FABS: Absolute Value
pub fn fabs(fpu: &mut Fpu) {
    let v = fpu.fetch(0);
    let cleared = match v {
        Reg::Native(x) => Reg::Native(x.abs()),
        Reg::Extended(mut f) => {
            f.set_sign(false);
            Reg::Extended(f)
        }
    };
    fpu.set_c1(false);
    fpu.set(0, cleared);
}

// FSQRT: Square Root
pub fn fsqrt(fpu: &mut Fpu) {
    let v = fpu.fetch(0);
    if let Some(nan) = propagate_nan(fpu, &v, None) {
        fpu.set(0, nan);
        return;
    }
    check_denormal(fpu, &[&v]);
    let x = v.value();
    let result = if x == 0.0 {
        // sqrt(-0) is -0
        v
    } else if x < 0.0 {
        invalid(fpu)
    } else if x.is_infinite() {
        v
    } else {
        let s = x.sqrt();
        let rem = (-s).mul_add(s, x);
        let err = if rem == 0.0 { 0.0 } else { rem };
        Reg::Native(round_result(fpu, s, err, false))
    };
    fpu.set(0, result);
}

// FRNDINT: Round to Integer
// Uses the RC field. The result keeps the register's representation.
pub fn frndint(fpu: &mut Fpu) {
    let v = fpu.fetch(0);
    if let Some(nan) = propagate_nan(fpu, &v, None) {
        fpu.set(0, nan);
        return;
    }
    check_denormal(fpu, &[&v]);
    let f = v.to_f80();
    if f.is_zero() || f.is_infinite() {
        return;
    }
    let Some((i, inexact)) = f.round_to_int(fpu.rounding()) else {
        // 2^64 and up has no fraction bits left
        return;
    };
    let neg = f.get_sign();
    let magnitude = i.unsigned_abs() as u64;
    let result = match v {
        Reg::Native(_) => {
            let m = magnitude as f64;
            Reg::Native(if neg { -m } else { m })
        }
        Reg::Extended(_) => Reg::Extended(F80::from_int(neg, magnitude)),
    };
    if inexact {
        fpu.raise(FpuFlags::PE);
        let rounded = F80::from_int(neg, magnitude);
        fpu.set_c1(rounded.compare(&f).is_some_and(|o| (o == Ordering::Greater) != neg));
    } else {
        fpu.set_c1(false);
    }
    fpu.set(0, result);
}

// FSCALE: ST(0) = ST(0) * 2^trunc(ST(1))
pub fn fscale(fpu: &mut Fpu) {
    let v = fpu.fetch(0);
    let s = fpu.fetch(1);
    if let Some(nan) = propagate_nan(fpu, &v, Some(&s)) {
        fpu.set(0, nan);
        return;
    }
    check_denormal(fpu, &[&v, &s]);
    let x = v.value();
    let scale = s.value().trunc();

    if scale.is_infinite() {
        let result = if (x == 0.0 && scale > 0.0) || (x.is_infinite() && scale < 0.0) {
            invalid(fpu)
        } else if scale > 0.0 {
            if x == 0.0 { v } else { Reg::Native(f64::INFINITY.copysign(x)) }
        } else if x.is_infinite() {
            v
        } else {
            Reg::Native(0.0f64.copysign(x))
        };
        fpu.set(0, result);
        return;
    }
    if x == 0.0 || x.is_infinite() {
        return;
    }

    let n = scale.clamp(-65536.0, 65536.0) as i32;
    if let Reg::Extended(f) = v {
        if f.get_exponent() != 0 {
            let e = f.get_exponent() as i32 + n;
            if (1..0x7FFF).contains(&e) {
                let mut out = f;
                out.set_exponent(e as u16);
                fpu.set_c1(false);
                fpu.set(0, Reg::Extended(out));
                return;
            }
        }
    }

    let r = scale_f64(x, n);
    let result = if r.is_infinite() {
        round_result(fpu, r, 0.0, true)
    } else {
        let back = scale_f64(r, -n);
        if r.abs() < f64::MIN_POSITIVE {
            fpu.raise(FpuFlags::UE);
            if back != x {
                fpu.raise(FpuFlags::PE);
            }
        }
        fpu.set_c1(false);
        r
    };
    fpu.set(0, Reg::Native(result));
}

pub fn scale_f64(mut v: f64, mut n: i32) -> f64 {
    while n > 1000 {
        v *= 2f64.powi(1000);
        n -= 1000;
    }
    while n < -1000 {
        v *= 2f64.powi(-1000);
        n += 1000;
    }
    v * 2f64.powi(n)
}

// FXTRACT: Extract Exponent and Significand
// ST(0) = exponent, then push significand
pub fn fxtract(fpu: &mut Fpu) {
    let v = fpu.fetch(0);
    if let Some(nan) = propagate_nan(fpu, &v, None) {
        fpu.set(0, nan);
        fpu.push(nan);
        return;
    }
    check_denormal(fpu, &[&v]);
    let f = v.to_f80();
    let neg = f.get_sign();
    if f.is_zero() {
        fpu.raise(FpuFlags::ZE);
        fpu.set(0, Reg::Native(f64::NEG_INFINITY));
        fpu.push(v);
        return;
    }
    if f.is_infinite() {
        fpu.set(0, Reg::Native(f64::INFINITY));
        fpu.push(v);
        return;
    }
    let exponent = f.unbiased_exponent();
    let mantissa = f.mantissa << f.mantissa.leading_zeros();
    let mut significand = F80::from_raw(F80_EXPONENT_BIAS as u16, mantissa);
    significand.set_sign(neg);
    fpu.set(0, Reg::Native(exponent as f64));
    fpu.push(Reg::Extended(significand));
}

// FPREM: Partial Remainder (truncating quotient)
// FPREM1: IEEE Partial Remainder (quotient rounded to nearest)
pub fn fprem(fpu: &mut Fpu, ieee: bool) {
    let a = fpu.fetch(0);
    let b = fpu.fetch(1);
    if let Some(nan) = propagate_nan(fpu, &a, Some(&b)) {
        fpu.set_c2(false);
        fpu.set(0, nan);
        return;
    }
    check_denormal(fpu, &[&a, &b]);
    let (x, y) = (a.value(), b.value());

    if x.is_infinite() || y == 0.0 {
        fpu.set_c2(false);
        let r = invalid(fpu);
        fpu.set(0, r);
        return;
    }
    if x == 0.0 || y.is_infinite() {
        set_quotient_bits(fpu, 0);
        return;
    }

    let d = F80::from_f64(x).unbiased_exponent() - F80::from_f64(y).unbiased_exponent();
    if d >= 64 {
        // Partial: reduce against y * 2^(d - 63) so the exponent drops by 63
        let ys = scale_f64(y, d - 63);
        let r = x % ys;
        set_quotient_bits(fpu, 0);
        fpu.set_c2(true);
        fpu.set(0, Reg::Native(r));
        return;
    }

    let ay = y.abs();
    let mut t = x.abs() % (8.0 * ay);
    let mut q = 0u8;
    // Each step subtracts within a factor of two, so all are exact
    for (bit, k) in [(4u8, 4.0), (2, 2.0), (1, 1.0)] {
        if t >= k * ay {
            t -= k * ay;
            q |= bit;
        }
    }
    let mut r = t;
    if ieee {
        let twice = 2.0 * t;
        if twice > ay || (twice == ay && q & 1 == 1) {
            r = t - ay;
            q = q.wrapping_add(1);
        }
    }
    // Remainder carries the dividend's sign; quotient sign is the xor
    let r = if x.is_sign_negative() { -r } else { r };
    set_quotient_bits(fpu, q & 7);
    fpu.set(0, Reg::Native(r));
}

/// Low three quotient bits: C0 = Q2, C3 = Q1, C1 = Q0. Clears C2.
fn set_quotient_bits(fpu: &mut Fpu, q: u8) {
    fpu.set_c0(q & 4 != 0);
    fpu.set_c3(q & 2 != 0);
    fpu.set_c1(q & 1 != 0);
    fpu.set_c2(false);
}
