//! Floating point encodings handled by the coprocessor.
//!
//! Memory operands come in three IEEE-style layouts: single (32 bit), double
//! (64 bit) and extended (80 bit). Single and double carry an implied leading
//! mantissa bit, extended stores the integer bit explicitly.
//!
//! Register cells are [`Reg`] values: either a host `f64` or a raw extended
//! encoding. The raw form is only produced by loads that must round-trip
//! bit-exactly (FLD m80, FILD, FBLD, FRSTOR, the constant loads) and is the
//! ground truth for its slot.

use std::cmp::Ordering;

use crate::control::RoundMode;

pub const F32_EXPONENT_BIAS: i32 = 127;
pub const F32_IMPLIED_BIT: u32 = 1 << 23;

pub const F64_EXPONENT_BIAS: i32 = 1023;
pub const F64_IMPLIED_BIT: u64 = 1 << 52;

pub const F80_EXPONENT_BIAS: i32 = 16383;
pub const F80_INTEGER_BIT: u64 = 1 << 63;
pub const F80_QUIET_BIT: u64 = 1 << 62;

const F80_MAX_EXPONENT: u16 = 0x7FFF;

// ---------------------------------------------------------------------------
// 32-bit single
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F32Bits(pub u32);

impl F32Bits {
    pub fn from_f32(v: f32) -> Self {
        Self(v.to_bits())
    }

    pub fn sign(self) -> bool {
        self.0 >> 31 != 0
    }

    pub fn exponent(self) -> u32 {
        (self.0 >> 23) & 0xFF
    }

    pub fn mantissa(self) -> u32 {
        self.0 & (F32_IMPLIED_BIT - 1)
    }

    pub fn is_nan(self) -> bool {
        self.exponent() == 0xFF && self.mantissa() != 0
    }

    pub fn is_snan(self) -> bool {
        self.is_nan() && self.mantissa() & (1 << 22) == 0
    }

    pub fn is_denormal(self) -> bool {
        self.exponent() == 0 && self.mantissa() != 0
    }

    /// Widens to a host double. NaN payloads are moved bit-for-bit so a
    /// signaling NaN stays signaling.
    pub fn to_f64(self) -> f64 {
        if self.is_nan() {
            let bits = ((self.sign() as u64) << 63)
                | (0x7FFu64 << 52)
                | ((self.mantissa() as u64) << 29);
            return f64::from_bits(bits);
        }
        f32::from_bits(self.0) as f64
    }
}

// ---------------------------------------------------------------------------
// 64-bit double
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F64Bits(pub u64);

impl F64Bits {
    pub fn from_f64(v: f64) -> Self {
        Self(v.to_bits())
    }

    pub fn sign(self) -> bool {
        self.0 >> 63 != 0
    }

    pub fn exponent(self) -> u32 {
        ((self.0 >> 52) & 0x7FF) as u32
    }

    pub fn mantissa(self) -> u64 {
        self.0 & (F64_IMPLIED_BIT - 1)
    }

    pub fn is_nan(self) -> bool {
        self.exponent() == 0x7FF && self.mantissa() != 0
    }

    pub fn is_snan(self) -> bool {
        self.is_nan() && self.mantissa() & (1 << 51) == 0
    }

    pub fn is_denormal(self) -> bool {
        self.exponent() == 0 && self.mantissa() != 0
    }

    pub fn to_f64(self) -> f64 {
        f64::from_bits(self.0)
    }
}

pub fn is_snan(v: f64) -> bool {
    F64Bits::from_f64(v).is_snan()
}

/// Sets the quiet bit of a NaN, leaves everything else alone.
pub fn quiet(v: f64) -> f64 {
    if v.is_nan() {
        f64::from_bits(v.to_bits() | (1 << 51))
    } else {
        v
    }
}

pub fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

pub fn next_down(x: f64) -> f64 {
    -next_up(-x)
}

fn next_up_f32(x: f32) -> f32 {
    if x.is_nan() || x == f32::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f32::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f32::from_bits(bits + 1)
    } else {
        f32::from_bits(bits - 1)
    }
}

fn next_down_f32(x: f32) -> f32 {
    -next_up_f32(-x)
}

/// Narrows a double to single precision under the given rounding mode.
/// Returns the result and whether it differs from the input.
pub fn f64_to_f32(x: f64, mode: RoundMode) -> (f32, bool) {
    if x.is_nan() {
        let b = F64Bits::from_f64(x);
        let mut frac = (b.mantissa() >> 29) as u32;
        if frac == 0 {
            frac = 1 << 22;
        }
        let bits = ((b.sign() as u32) << 31) | (0xFF << 23) | frac;
        return (f32::from_bits(bits), false);
    }
    let mut r = x as f32;
    let back = r as f64;
    if back == x {
        return (r, false);
    }
    r = match mode {
        RoundMode::Nearest => r,
        RoundMode::Down if back > x => next_down_f32(r),
        RoundMode::Up if back < x => next_up_f32(r),
        RoundMode::Chop if back.abs() > x.abs() => {
            if r > 0.0 { next_down_f32(r) } else { next_up_f32(r) }
        }
        _ => r,
    };
    (r, true)
}

/// Shifts `m` right by `s` bits rounding the discarded part per `mode`.
/// Returns the rounded value and whether any set bits were discarded.
fn round_shift_right(m: u64, s: u32, neg: bool, mode: RoundMode) -> (u64, bool) {
    if s == 0 {
        return (m, false);
    }
    let (int, rem, half) = if s >= 128 {
        (0u128, (m != 0) as u128, u128::MAX)
    } else {
        let wide = m as u128;
        (wide >> s, wide & ((1u128 << s) - 1), 1u128 << (s - 1))
    };
    let inexact = rem != 0;
    let up = match mode {
        RoundMode::Nearest => rem > half || (rem == half && int & 1 == 1),
        RoundMode::Up => inexact && !neg,
        RoundMode::Down => inexact && neg,
        RoundMode::Chop => false,
    };
    ((int + up as u128) as u64, inexact)
}

// ---------------------------------------------------------------------------
// 80-bit extended
// ---------------------------------------------------------------------------

/// Raw 80-bit extended real.
///
/// Memory layout: 8 little-endian mantissa bytes followed by 2 little-endian
/// bytes of sign (bit 15) and biased exponent (bits 0-14).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct F80 {
    pub mantissa: u64,
    pub sign_exp: u16,
}

impl F80 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_raw(sign_exp: u16, mantissa: u64) -> Self {
        Self { mantissa, sign_exp }
    }

    pub fn real_indefinite() -> Self {
        Self::from_raw(0xFFFF, 0xC000_0000_0000_0000)
    }

    pub fn get_sign(&self) -> bool {
        self.sign_exp & 0x8000 != 0
    }

    pub fn set_sign(&mut self, neg: bool) {
        self.sign_exp = (self.sign_exp & 0x7FFF) | ((neg as u16) << 15);
    }

    pub fn get_exponent(&self) -> u16 {
        self.sign_exp & 0x7FFF
    }

    pub fn set_exponent(&mut self, exp: u16) {
        self.sign_exp = (self.sign_exp & 0x8000) | (exp & 0x7FFF);
    }

    pub fn get_mantissa(&self) -> u64 {
        self.mantissa
    }

    pub fn set_mantissa(&mut self, mantissa: u64) {
        self.mantissa = mantissa;
    }

    pub fn get_bytes(&self) -> [u8; 10] {
        let mut out = [0u8; 10];
        out[..8].copy_from_slice(&self.mantissa.to_le_bytes());
        out[8..].copy_from_slice(&self.sign_exp.to_le_bytes());
        out
    }

    pub fn set_bytes(&mut self, bytes: &[u8; 10]) {
        let mut m = [0u8; 8];
        m.copy_from_slice(&bytes[..8]);
        self.mantissa = u64::from_le_bytes(m);
        self.sign_exp = u16::from_le_bytes([bytes[8], bytes[9]]);
    }

    pub fn from_bytes(bytes: &[u8; 10]) -> Self {
        let mut f = Self::new();
        f.set_bytes(bytes);
        f
    }

    pub fn is_zero(&self) -> bool {
        self.get_exponent() == 0 && self.mantissa == 0
    }

    pub fn is_infinite(&self) -> bool {
        self.get_exponent() == F80_MAX_EXPONENT && self.mantissa == F80_INTEGER_BIT
    }

    pub fn is_nan(&self) -> bool {
        self.get_exponent() == F80_MAX_EXPONENT
            && self.mantissa & F80_INTEGER_BIT != 0
            && self.mantissa & !F80_INTEGER_BIT != 0
    }

    pub fn is_snan(&self) -> bool {
        self.is_nan() && self.mantissa & F80_QUIET_BIT == 0
    }

    /// Exponent zero with a non-zero mantissa (true and pseudo denormals).
    pub fn is_denormal(&self) -> bool {
        self.get_exponent() == 0 && self.mantissa != 0
    }

    /// Encodings the 387 refuses to operate on: unnormals, pseudo-NaNs and
    /// pseudo-infinities (non-zero exponent with a clear integer bit).
    pub fn is_unsupported(&self) -> bool {
        self.get_exponent() != 0 && self.mantissa & F80_INTEGER_BIT == 0
    }

    /// Unbiased exponent of the normalized value. Meaningless for zero,
    /// infinities and NaNs.
    pub fn unbiased_exponent(&self) -> i32 {
        let exp = self.get_exponent() as i32;
        if exp == 0 {
            1 - F80_EXPONENT_BIAS - self.mantissa.leading_zeros() as i32
        } else {
            exp - F80_EXPONENT_BIAS
        }
    }

    pub fn set_f64(&mut self, v: f64) {
        *self = Self::from_f64(v);
    }

    /// Exact widening; the integer bit is always materialized, host
    /// subnormals are normalized.
    pub fn from_f64(v: f64) -> Self {
        let b = F64Bits::from_f64(v);
        let sign = (b.sign() as u16) << 15;
        let exp = b.exponent();
        let frac = b.mantissa();

        if exp == 0x7FF {
            // Infinity has a bare integer bit, NaNs carry the payload along.
            return Self::from_raw(sign | F80_MAX_EXPONENT, F80_INTEGER_BIT | (frac << 11));
        }
        if exp == 0 {
            if frac == 0 {
                return Self::from_raw(sign, 0);
            }
            let lz = frac.leading_zeros();
            let e = (F80_EXPONENT_BIAS + 63 - 1074) as u32 - lz;
            return Self::from_raw(sign | e as u16, frac << lz);
        }
        let e = exp as i32 - F64_EXPONENT_BIAS + F80_EXPONENT_BIAS;
        Self::from_raw(sign | e as u16, F80_INTEGER_BIT | (frac << 11))
    }

    pub fn get_f64(&self) -> f64 {
        self.to_f64_rounded(RoundMode::Nearest).0
    }

    /// Narrows to a host double under `mode`. Returns the value and whether
    /// precision was lost. Out-of-range values follow the IEEE overflow rules
    /// for the mode; unsupported encodings become the real indefinite.
    pub fn to_f64_rounded(&self, mode: RoundMode) -> (f64, bool) {
        let neg = self.get_sign();
        let sign = (neg as u64) << 63;
        let exp = self.get_exponent();
        let mant = self.mantissa;

        if self.is_unsupported() {
            return (f64::from_bits(0xFFF8_0000_0000_0000), false);
        }
        if exp == F80_MAX_EXPONENT {
            let frac = mant & !F80_INTEGER_BIT;
            if frac == 0 {
                return (f64::from_bits(sign | (0x7FF << 52)), false);
            }
            let mut f = frac >> 11;
            if f == 0 {
                f = 1;
            }
            return (f64::from_bits(sign | (0x7FF << 52) | f), false);
        }
        if mant == 0 {
            return (f64::from_bits(sign), false);
        }

        // value = m * 2^(e - bias - 63) with bit 63 of m set
        let lz = mant.leading_zeros();
        let m = mant << lz;
        let e = if exp == 0 { 1 } else { exp as i32 } - lz as i32;
        let e64 = e - F80_EXPONENT_BIAS + F64_EXPONENT_BIAS;

        if e64 >= 0x7FF {
            return (overflow_result(neg, mode), true);
        }
        if e64 >= 1 {
            let (q, inexact) = round_shift_right(m, 11, neg, mode);
            // q carries the implied bit, so a rounding carry bumps the exponent
            let bits = (((e64 - 1) as u64) << 52) + q;
            if bits >= 0x7FF << 52 {
                return (overflow_result(neg, mode), true);
            }
            return (f64::from_bits(sign | bits), inexact);
        }
        let shift = (12 - e64) as u32;
        let (q, inexact) = round_shift_right(m, shift, neg, mode);
        (f64::from_bits(sign | q), inexact)
    }

    /// Narrows straight to single precision under `mode`, rounding the
    /// 64-bit significand once. Same conventions as [`F80::to_f64_rounded`].
    pub fn to_f32_rounded(&self, mode: RoundMode) -> (f32, bool) {
        let neg = self.get_sign();
        let sign = (neg as u32) << 31;
        let exp = self.get_exponent();
        let mant = self.mantissa;

        if self.is_unsupported() {
            return (f32::from_bits(0xFFC0_0000), false);
        }
        if exp == F80_MAX_EXPONENT {
            let frac = mant & !F80_INTEGER_BIT;
            if frac == 0 {
                return (f32::from_bits(sign | (0xFF << 23)), false);
            }
            let mut f = (frac >> 40) as u32;
            if f == 0 {
                f = 1;
            }
            return (f32::from_bits(sign | (0xFF << 23) | f), false);
        }
        if mant == 0 {
            return (f32::from_bits(sign), false);
        }

        let lz = mant.leading_zeros();
        let m = mant << lz;
        let e = if exp == 0 { 1 } else { exp as i32 } - lz as i32;
        let e32 = e - F80_EXPONENT_BIAS + F32_EXPONENT_BIAS;

        if e32 >= 0xFF {
            return (overflow_result_f32(neg, mode), true);
        }
        if e32 >= 1 {
            let (q, inexact) = round_shift_right(m, 40, neg, mode);
            let bits = (((e32 - 1) as u64) << 23) + q;
            if bits >= 0xFF << 23 {
                return (overflow_result_f32(neg, mode), true);
            }
            return (f32::from_bits(sign | bits as u32), inexact);
        }
        let shift = (41 - e32) as u32;
        let (q, inexact) = round_shift_right(m, shift, neg, mode);
        (f32::from_bits(sign | q as u32), inexact)
    }

    pub fn from_i64(v: i64) -> Self {
        Self::from_int(v < 0, v.unsigned_abs())
    }

    pub fn from_int(neg: bool, magnitude: u64) -> Self {
        let sign = (neg as u16) << 15;
        if magnitude == 0 {
            return Self::from_raw(sign, 0);
        }
        let lz = magnitude.leading_zeros();
        let e = (F80_EXPONENT_BIAS + 63) as u16 - lz as u16;
        Self::from_raw(sign | e, magnitude << lz)
    }

    /// Rounds to an integer under `mode`. `None` for NaNs, infinities,
    /// unsupported encodings and magnitudes of 2^64 or more. The flag reports
    /// an inexact conversion.
    pub fn round_to_int(&self, mode: RoundMode) -> Option<(i128, bool)> {
        if self.get_exponent() == F80_MAX_EXPONENT || self.is_unsupported() {
            return None;
        }
        if self.mantissa == 0 {
            return Some((0, false));
        }
        let neg = self.get_sign();
        let e = self.unbiased_exponent();
        if e >= 64 {
            return None;
        }
        let m = self.mantissa << self.mantissa.leading_zeros();
        let (mag, inexact) = if e >= 63 {
            (m, false)
        } else {
            round_shift_right(m, (63 - e) as u32, neg, mode)
        };
        let v = mag as i128;
        Some((if neg { -v } else { v }, inexact))
    }

    /// Orders two finite-or-infinite values exactly. `None` when either is a
    /// NaN or an unsupported encoding.
    pub fn compare(&self, other: &F80) -> Option<Ordering> {
        if self.is_nan()
            || other.is_nan()
            || self.is_unsupported()
            || other.is_unsupported()
        {
            return None;
        }
        if self.is_zero() && other.is_zero() {
            return Some(Ordering::Equal);
        }
        let key = |f: &F80| (f.get_exponent(), f.mantissa);
        match (self.get_sign(), other.get_sign()) {
            (false, true) => Some(Ordering::Greater),
            (true, false) => Some(Ordering::Less),
            (false, false) => Some(key(self).cmp(&key(other))),
            (true, true) => Some(key(other).cmp(&key(self))),
        }
    }
}

/// IEEE overflow default: infinity, or the largest finite value when the
/// rounding mode points back toward zero.
pub fn overflow_result(neg: bool, mode: RoundMode) -> f64 {
    let mag = if overflows_to_infinity(neg, mode) { f64::INFINITY } else { f64::MAX };
    if neg { -mag } else { mag }
}

fn overflow_result_f32(neg: bool, mode: RoundMode) -> f32 {
    let mag = if overflows_to_infinity(neg, mode) { f32::INFINITY } else { f32::MAX };
    if neg { -mag } else { mag }
}

fn overflows_to_infinity(neg: bool, mode: RoundMode) -> bool {
    match mode {
        RoundMode::Nearest => true,
        RoundMode::Up => !neg,
        RoundMode::Down => neg,
        RoundMode::Chop => false,
    }
}

// ---------------------------------------------------------------------------
// Register cell
// ---------------------------------------------------------------------------

/// One register stack slot. The variant names the authoritative encoding;
/// the other one is never stored, only derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reg {
    Native(f64),
    Extended(F80),
}

impl Default for Reg {
    fn default() -> Self {
        Reg::Native(0.0)
    }
}

impl From<f64> for Reg {
    fn from(v: f64) -> Self {
        Reg::Native(v)
    }
}

impl From<F80> for Reg {
    fn from(v: F80) -> Self {
        Reg::Extended(v)
    }
}

impl Reg {
    pub fn indefinite() -> Self {
        Reg::Extended(F80::real_indefinite())
    }

    pub fn value(&self) -> f64 {
        match self {
            Reg::Native(v) => *v,
            Reg::Extended(f) => f.get_f64(),
        }
    }

    pub fn to_f80(&self) -> F80 {
        match self {
            Reg::Native(v) => F80::from_f64(*v),
            Reg::Extended(f) => *f,
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, Reg::Extended(_))
    }

    pub fn sign(&self) -> bool {
        match self {
            Reg::Native(v) => v.is_sign_negative(),
            Reg::Extended(f) => f.get_sign(),
        }
    }

    pub fn is_nan(&self) -> bool {
        match self {
            Reg::Native(v) => v.is_nan(),
            Reg::Extended(f) => f.is_nan() || f.is_unsupported(),
        }
    }

    pub fn is_snan(&self) -> bool {
        match self {
            Reg::Native(v) => is_snan(*v),
            Reg::Extended(f) => f.is_snan(),
        }
    }

    /// Denormal as an extended value. Every host double, subnormal or not,
    /// widens to a normal extended number, so only raw encodings qualify.
    pub fn is_denormal(&self) -> bool {
        match self {
            Reg::Native(_) => false,
            Reg::Extended(f) => f.is_denormal(),
        }
    }
}
