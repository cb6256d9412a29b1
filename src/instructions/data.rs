use std::cmp::Ordering;

use crate::bus::Bus;
use crate::f80::{self, F32Bits, F64Bits, F80, Reg, f64_to_f32};
use crate::fpu::{Fpu, FpuFlags};

use super::decode::{Constant, MemFormat, Source};
use super::utils::{
    BCD_INDEFINITE, BCD_MAX, INT16_INDEFINITE, INT32_INDEFINITE, INT64_INDEFINITE, is_unsupported,
    quiet_reg, read_mem, to_integer, write_bcd,
};

// FLD: Load Real / FILD: Load Integer / FBLD: Load BCD
pub fn fld(fpu: &mut Fpu, bus: &mut dyn Bus, src: Source, addr: usize) {
    let value = match src {
        // Fetch before the push so FLD ST(0) duplicates the old top
        Source::St(i) => fpu.fetch(i as usize),
        Source::Mem(MemFormat::Real32) => {
            let bits = F32Bits(bus.read_32(addr));
            load_checks(fpu, bits.is_snan(), bits.is_denormal());
            Reg::Native(f80::quiet(bits.to_f64()))
        }
        Source::Mem(MemFormat::Real64) => {
            let bits = F64Bits(bus.read_64(addr));
            load_checks(fpu, bits.is_snan(), bits.is_denormal());
            Reg::Native(f80::quiet(bits.to_f64()))
        }
        // 80-bit, integer and BCD loads are exact and keep the raw encoding
        Source::Mem(fmt) => read_mem(bus, fmt, addr),
    };
    fpu.push(value);
}

fn load_checks(fpu: &mut Fpu, snan: bool, denormal: bool) {
    if snan {
        fpu.raise(FpuFlags::IE);
    }
    if denormal {
        fpu.raise(FpuFlags::DE);
    }
}

// FLD1, FLDL2T, FLDL2E, FLDPI, FLDLG2, FLDLN2, FLDZ
// The constants are kept as full 64-bit significands.
pub fn fld_const(fpu: &mut Fpu, c: Constant) {
    let (sign_exp, mantissa) = match c {
        Constant::One => (0x3FFF, 0x8000_0000_0000_0000),
        Constant::L2T => (0x4000, 0xD49A_784B_CD1B_8AFE),
        Constant::L2E => (0x3FFF, 0xB8AA_3B29_5C17_F0BC),
        Constant::Pi => (0x4000, 0xC90F_DAA2_2168_C235),
        Constant::Lg2 => (0x3FFD, 0x9A20_9A84_FBCF_F799),
        Constant::Ln2 => (0x3FFE, 0xB172_17F7_D1CF_79AC),
        Constant::Zero => (0, 0),
    };
    fpu.push(Reg::Extended(F80::from_raw(sign_exp, mantissa)));
}

// FST/FSTP, FIST/FISTP, FBSTP
pub fn fst(fpu: &mut Fpu, bus: &mut dyn Bus, dest: Source, pop: bool, addr: usize) {
    let v = fpu.fetch(0);
    match dest {
        Source::St(i) => fpu.set(i as usize, v),
        Source::Mem(MemFormat::Real32) => store_real32(fpu, bus, &v, addr),
        Source::Mem(MemFormat::Real64) => store_real64(fpu, bus, &v, addr),
        Source::Mem(MemFormat::Real80) => bus.write_f80(addr, v.to_f80()),
        Source::Mem(MemFormat::Int16) => {
            let i = store_int(fpu, &v, i16::MIN as i128, i16::MAX as i128);
            bus.write_16(addr, i.map_or(INT16_INDEFINITE, |i| i as i16 as u16));
        }
        Source::Mem(MemFormat::Int32) => {
            let i = store_int(fpu, &v, i32::MIN as i128, i32::MAX as i128);
            bus.write_32(addr, i.map_or(INT32_INDEFINITE, |i| i as i32 as u32));
        }
        Source::Mem(MemFormat::Int64) => {
            let i = store_int(fpu, &v, i64::MIN as i128, i64::MAX as i128);
            bus.write_64(addr, i.map_or(INT64_INDEFINITE, |i| i as i64 as u64));
        }
        Source::Mem(MemFormat::Bcd80) => {
            match store_int(fpu, &v, -(BCD_MAX as i128), BCD_MAX as i128) {
                Some(i) => write_bcd(bus, addr, v.sign(), i.unsigned_abs() as u64),
                None => {
                    for (k, b) in BCD_INDEFINITE.iter().enumerate() {
                        bus.write_8(addr.wrapping_add(k), *b);
                    }
                }
            }
        }
    }
    if pop {
        fpu.pop();
    }
}

fn store_real32(fpu: &mut Fpu, bus: &mut dyn Bus, v: &Reg, addr: usize) {
    if v.is_nan() {
        if v.is_snan() || is_unsupported(v) {
            fpu.raise(FpuFlags::IE);
        }
        let q = if is_unsupported(v) { Reg::indefinite() } else { quiet_reg(*v) };
        let (f, _) = f64_to_f32(q.value(), fpu.rounding());
        bus.write_32(addr, f.to_bits());
        return;
    }
    let mode = fpu.rounding();
    let (f, lost, finite, nonzero) = match v {
        Reg::Native(x) => {
            let (f, lost) = f64_to_f32(*x, mode);
            (f, lost, x.is_finite(), *x != 0.0)
        }
        // One rounding from the full significand; going through a double
        // first can manufacture a tie
        Reg::Extended(x) => {
            let (f, lost) = x.to_f32_rounded(mode);
            (f, lost, !x.is_infinite(), !x.is_zero())
        }
    };
    let tiny = nonzero && f.abs() < f32::MIN_POSITIVE;
    narrowing_flags(fpu, finite, f.is_infinite(), tiny, lost);
    bus.write_32(addr, f.to_bits());
}

fn store_real64(fpu: &mut Fpu, bus: &mut dyn Bus, v: &Reg, addr: usize) {
    let out = match v {
        Reg::Native(x) => {
            if f80::is_snan(*x) {
                fpu.raise(FpuFlags::IE);
            }
            f80::quiet(*x)
        }
        Reg::Extended(f) => {
            if f.is_snan() || f.is_unsupported() {
                fpu.raise(FpuFlags::IE);
            }
            let finite = f.get_exponent() != 0x7FFF;
            let (d, lost) = f.to_f64_rounded(fpu.rounding());
            if !f.is_nan() && !f.is_unsupported() {
                let tiny = d.abs() < f64::MIN_POSITIVE && !f.is_zero();
                narrowing_flags(fpu, finite, d.is_infinite(), tiny, lost);
            }
            f80::quiet(d)
        }
    };
    bus.write_64(addr, out.to_bits());
}

/// Flags for a store into a narrower real format.
fn narrowing_flags(fpu: &mut Fpu, was_finite: bool, overflowed: bool, tiny: bool, inexact: bool) {
    if was_finite && overflowed {
        fpu.raise(FpuFlags::OE | FpuFlags::PE);
        return;
    }
    if tiny && inexact {
        fpu.raise(FpuFlags::UE);
    }
    if inexact {
        fpu.raise(FpuFlags::PE);
    }
}

/// Rounds ST(0) for an integer store. `None` means the value does not fit
/// and the caller writes the format's indefinite (IE has been raised).
fn store_int(fpu: &mut Fpu, v: &Reg, min: i128, max: i128) -> Option<i128> {
    match to_integer(v, fpu.rounding()) {
        Some((i, inexact)) if (min..=max).contains(&i) => {
            if inexact {
                fpu.raise(FpuFlags::PE);
                let rounded = F80::from_int(i < 0, i.unsigned_abs() as u64);
                let up = rounded.compare(&v.to_f80()) == Some(Ordering::Greater);
                fpu.set_c1(up != v.sign());
            } else {
                fpu.set_c1(false);
            }
            Some(i)
        }
        _ => {
            fpu.raise(FpuFlags::IE);
            None
        }
    }
}

// FXCH: Exchange ST(0) and ST(i)
pub fn fxch(fpu: &mut Fpu, i: u8) {
    let i = i as usize;
    if fpu.is_empty(0) || fpu.is_empty(i) {
        fpu.stack_underflow();
        for k in [0, i] {
            if fpu.is_empty(k) {
                fpu.set(k, Reg::indefinite());
            }
        }
    } else {
        fpu.set_c1(false);
    }
    let a = fpu.peek(0);
    let b = fpu.peek(i);
    fpu.set(0, b);
    fpu.set(i, a);
}
