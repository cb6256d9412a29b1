use crate::bus::Bus;
use crate::control::{PrecisionControl, RoundMode};
use crate::f80::{self, F32Bits, F64Bits, F80, F80_QUIET_BIT, Reg, next_down, next_up};
use crate::fpu::{Fpu, FpuFlags};

use super::decode::{MemFormat, Source};

pub const INT16_INDEFINITE: u16 = 0x8000;
pub const INT32_INDEFINITE: u32 = 0x8000_0000;
pub const INT64_INDEFINITE: u64 = 0x8000_0000_0000_0000;

/// Packed BCD indefinite, low byte first.
pub const BCD_INDEFINITE: [u8; 10] = [0, 0, 0, 0, 0, 0, 0, 0xC0, 0xFF, 0xFF];

pub const BCD_MAX: u64 = 999_999_999_999_999_999;

// ============== Operand access =================

/// Reads a memory operand into a register cell without raising anything.
/// Integer and BCD operands are converted exactly to extended.
pub fn read_mem(bus: &dyn Bus, fmt: MemFormat, addr: usize) -> Reg {
    match fmt {
        MemFormat::Real32 => Reg::Native(F32Bits(bus.read_32(addr)).to_f64()),
        MemFormat::Real64 => Reg::Native(f64::from_bits(bus.read_64(addr))),
        MemFormat::Real80 => Reg::Extended(bus.read_f80(addr)),
        MemFormat::Int16 => Reg::Extended(F80::from_i64(bus.read_16(addr) as i16 as i64)),
        MemFormat::Int32 => Reg::Extended(F80::from_i64(bus.read_32(addr) as i32 as i64)),
        MemFormat::Int64 => Reg::Extended(F80::from_i64(bus.read_64(addr) as i64)),
        MemFormat::Bcd80 => Reg::Extended(read_bcd(bus, addr)),
    }
}

/// Source operand of an arithmetic or compare instruction.
pub fn operand(fpu: &mut Fpu, bus: &dyn Bus, src: Source, addr: usize) -> Reg {
    match src {
        Source::St(i) => fpu.fetch(i as usize),
        Source::Mem(fmt) => {
            // Short denormals are normal once widened, so check the raw bits
            let denormal = match fmt {
                MemFormat::Real32 => F32Bits(bus.read_32(addr)).is_denormal(),
                MemFormat::Real64 => F64Bits(bus.read_64(addr)).is_denormal(),
                _ => false,
            };
            if denormal {
                fpu.raise(FpuFlags::DE);
            }
            read_mem(bus, fmt, addr)
        }
    }
}

pub fn read_bcd(bus: &dyn Bus, addr: usize) -> F80 {
    let mut magnitude = 0u64;
    for i in (0..9).rev() {
        let byte = bus.read_8(addr.wrapping_add(i));
        magnitude = magnitude * 100 + ((byte >> 4) as u64) * 10 + (byte & 0x0F) as u64;
    }
    let neg = bus.read_8(addr.wrapping_add(9)) & 0x80 != 0;
    F80::from_int(neg, magnitude)
}

pub fn write_bcd(bus: &mut dyn Bus, addr: usize, neg: bool, mut magnitude: u64) {
    for i in 0..9 {
        let low = (magnitude % 10) as u8;
        magnitude /= 10;
        let high = (magnitude % 10) as u8;
        magnitude /= 10;
        bus.write_8(addr.wrapping_add(i), (high << 4) | low);
    }
    bus.write_8(addr.wrapping_add(9), if neg { 0x80 } else { 0 });
}

// ============== NaN handling =================

pub fn is_unsupported(reg: &Reg) -> bool {
    matches!(reg, Reg::Extended(f) if f.is_unsupported())
}

pub fn quiet_reg(reg: Reg) -> Reg {
    match reg {
        Reg::Native(v) => Reg::Native(f80::quiet(v)),
        Reg::Extended(mut f) => {
            f.mantissa |= F80_QUIET_BIT;
            Reg::Extended(f)
        }
    }
}

/// NaN propagation for one or two operands. Returns the quiet NaN result if
/// any operand is a NaN or an unsupported encoding; signaling and unsupported
/// operands raise IE. With two NaNs the larger significand wins.
pub fn propagate_nan(fpu: &mut Fpu, a: &Reg, b: Option<&Reg>) -> Option<Reg> {
    let a_nan = a.is_nan();
    let b_nan = b.is_some_and(|r| r.is_nan());
    if !a_nan && !b_nan {
        return None;
    }
    let bad = |r: &Reg| r.is_snan() || is_unsupported(r);
    if bad(a) || b.is_some_and(bad) {
        fpu.raise(FpuFlags::IE);
    }
    if is_unsupported(a) || b.is_some_and(is_unsupported) {
        return Some(Reg::indefinite());
    }
    let pick = match b {
        Some(b) if b_nan && a_nan => {
            let mag = |r: &Reg| r.to_f80().mantissa | F80_QUIET_BIT;
            if mag(b) > mag(a) { *b } else { *a }
        }
        Some(b) if b_nan => *b,
        _ => *a,
    };
    Some(quiet_reg(pick))
}

/// Masked response to an invalid operation.
pub fn invalid(fpu: &mut Fpu) -> Reg {
    fpu.raise(FpuFlags::IE);
    Reg::indefinite()
}

pub fn check_denormal(fpu: &mut Fpu, regs: &[&Reg]) {
    if regs.iter().any(|r| r.is_denormal()) {
        fpu.raise(FpuFlags::DE);
    }
}

// ============== Rounding =================

/// Moves the nearest result `r` one step when the exact value `r + err`
/// calls for it under a directed mode.
pub fn directed(r: f64, err: f64, mode: RoundMode) -> f64 {
    if err == 0.0 || err.is_nan() {
        return r;
    }
    match mode {
        RoundMode::Nearest => r,
        RoundMode::Down if err < 0.0 => next_down(r),
        RoundMode::Up if err > 0.0 => next_up(r),
        RoundMode::Chop if r > 0.0 && err < 0.0 => next_down(r),
        RoundMode::Chop if r < 0.0 && err > 0.0 => next_up(r),
        _ => r,
    }
}

/// Rounds a double to `bits` significant bits. Returns the value and whether
/// any bits were dropped.
pub fn round_significand(v: f64, bits: u32, mode: RoundMode) -> (f64, bool) {
    if !v.is_finite() || v == 0.0 || bits >= 53 {
        return (v, false);
    }
    let drop = 53 - bits;
    let raw = v.to_bits();
    let mask = (1u64 << drop) - 1;
    let low = raw & mask;
    if low == 0 {
        return (v, false);
    }
    let neg = v < 0.0;
    let truncated = raw & !mask;
    let half = 1u64 << (drop - 1);
    let up = match mode {
        RoundMode::Nearest => low > half || (low == half && (truncated >> drop) & 1 == 1),
        RoundMode::Up => !neg,
        RoundMode::Down => neg,
        RoundMode::Chop => false,
    };
    // Sign-magnitude layout: a carry out of the mantissa bumps the exponent
    let out = if up { truncated + (1 << drop) } else { truncated };
    (f64::from_bits(out), true)
}

/// Finishes an arithmetic result. `r` is the round-to-nearest host result
/// and `err` the exact error term (`exact = r + err`); `overflow` says the
/// host result overflowed from finite operands. Applies RC and PC and raises
/// OE, UE and PE. C1 reports whether the result was rounded up in magnitude.
pub fn round_result(fpu: &mut Fpu, r: f64, err: f64, overflow: bool) -> f64 {
    let mode = fpu.rounding();
    if overflow {
        fpu.raise(FpuFlags::OE | FpuFlags::PE);
        let out = f80::overflow_result(r.is_sign_negative(), mode);
        fpu.set_c1(out.is_infinite());
        return out;
    }

    let mut out = directed(r, err, mode);
    let mut inexact = err != 0.0 && !err.is_nan();
    if fpu.cw.precision() == PrecisionControl::Single24 {
        let (v, lost) = round_significand(out, 24, mode);
        out = v;
        inexact |= lost;
    }
    if out.is_infinite() && r.is_finite() {
        fpu.raise(FpuFlags::OE);
    }

    if inexact {
        if out.abs() < f64::MIN_POSITIVE {
            fpu.raise(FpuFlags::UE);
        }
        fpu.raise(FpuFlags::PE);
        let away = if out != r {
            out.abs() > r.abs()
        } else {
            err.is_sign_negative() != r.is_sign_negative()
        };
        fpu.set_c1(away);
    } else {
        fpu.set_c1(false);
    }
    out
}

/// Integer rounding of an already fetched register under RC.
pub fn to_integer(reg: &Reg, mode: RoundMode) -> Option<(i128, bool)> {
    reg.to_f80().round_to_int(mode)
}
