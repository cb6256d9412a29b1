use std::cmp::Ordering;

use rust_x87::control::RoundMode;
use rust_x87::f80::{F32Bits, F64Bits, F80, Reg, f64_to_f32, next_down, next_up};

#[test]
fn test_f80_from_f64_one() {
    let one = F80::from_f64(1.0);
    assert_eq!(one.sign_exp, 0x3FFF);
    assert_eq!(one.mantissa, 0x8000_0000_0000_0000);
    assert_eq!(one.get_f64(), 1.0);

    let neg = F80::from_f64(-2.0);
    assert!(neg.get_sign());
    assert_eq!(neg.get_exponent(), 0x4000);
    assert_eq!(neg.unbiased_exponent(), 1);
}

#[test]
fn test_f80_byte_layout() {
    let pi = F80::from_raw(0x4000, 0xC90F_DAA2_2168_C235);
    let bytes = pi.get_bytes();
    assert_eq!(bytes, [0x35, 0xC2, 0x68, 0x21, 0xA2, 0xDA, 0x0F, 0xC9, 0x00, 0x40]);
    assert_eq!(F80::from_bytes(&bytes), pi);
    assert_eq!(pi.get_f64(), std::f64::consts::PI);
}

#[test]
fn test_f80_host_subnormal_is_normalized() {
    let tiny = f64::from_bits(1);
    let f = F80::from_f64(tiny);
    // Integer bit is explicit and set
    assert_eq!(f.mantissa, 0x8000_0000_0000_0000);
    assert_eq!(f.unbiased_exponent(), -1074);
    assert!(!f.is_denormal());
    assert_eq!(f.get_f64().to_bits(), 1);
}

#[test]
fn test_f80_overflow_to_f64() {
    let huge = F80::from_raw(0x7FFE, 0x8000_0000_0000_0000);
    let (nearest, inexact) = huge.to_f64_rounded(RoundMode::Nearest);
    assert_eq!(nearest, f64::INFINITY);
    assert!(inexact);

    let (chopped, _) = huge.to_f64_rounded(RoundMode::Chop);
    assert_eq!(chopped, f64::MAX);

    let mut neg = huge;
    neg.set_sign(true);
    assert_eq!(neg.to_f64_rounded(RoundMode::Up).0, -f64::MAX);
    assert_eq!(neg.to_f64_rounded(RoundMode::Down).0, f64::NEG_INFINITY);
}

#[test]
fn test_f80_indefinite_and_unsupported() {
    let ind = F80::real_indefinite();
    assert!(ind.is_nan());
    assert!(!ind.is_snan());
    assert_eq!(ind.get_f64().to_bits(), 0xFFF8_0000_0000_0000);

    // Unnormal: exponent set, integer bit clear
    let unnormal = F80::from_raw(0x3FFF, 0x4000_0000_0000_0000);
    assert!(unnormal.is_unsupported());
    assert_eq!(unnormal.get_f64().to_bits(), 0xFFF8_0000_0000_0000);
    assert_eq!(unnormal.compare(&F80::from_f64(1.0)), None);
}

#[test]
fn test_f80_nan_payload_survives_widening() {
    let snan = f64::from_bits(0x7FF0_0000_0000_0001);
    let f = F80::from_f64(snan);
    assert!(f.is_snan());
    assert_eq!(f.get_f64().to_bits(), snan.to_bits());

    let single = F32Bits(0x7F80_0001);
    assert!(single.is_snan());
    assert!(F64Bits::from_f64(single.to_f64()).is_snan());
}

#[test]
fn test_f80_round_to_int_modes() {
    let two_and_half = F80::from_f64(2.5);
    assert_eq!(two_and_half.round_to_int(RoundMode::Nearest), Some((2, true)));
    assert_eq!(two_and_half.round_to_int(RoundMode::Up), Some((3, true)));
    assert_eq!(two_and_half.round_to_int(RoundMode::Down), Some((2, true)));

    let neg = F80::from_f64(-2.5);
    assert_eq!(neg.round_to_int(RoundMode::Down), Some((-3, true)));
    assert_eq!(neg.round_to_int(RoundMode::Chop), Some((-2, true)));

    assert_eq!(F80::from_f64(7.0).round_to_int(RoundMode::Nearest), Some((7, false)));
    assert_eq!(F80::from_f64(f64::INFINITY).round_to_int(RoundMode::Nearest), None);
    assert_eq!(F80::from_f64(1e30).round_to_int(RoundMode::Nearest), None);
}

#[test]
fn test_f80_from_int_is_exact() {
    let big = 0x0123_4567_89AB_CDEFi64;
    let f = F80::from_i64(big);
    assert_eq!(f.round_to_int(RoundMode::Nearest), Some((big as i128, false)));

    let min = F80::from_i64(i64::MIN);
    assert_eq!(min.sign_exp, 0xC03E);
    assert_eq!(min.mantissa, 0x8000_0000_0000_0000);
}

#[test]
fn test_f80_compare() {
    let a = F80::from_f64(-1.0);
    let b = F80::from_f64(2.0);
    assert_eq!(a.compare(&b), Some(Ordering::Less));
    assert_eq!(b.compare(&a), Some(Ordering::Greater));
    assert_eq!(F80::from_f64(0.0).compare(&F80::from_f64(-0.0)), Some(Ordering::Equal));
    assert_eq!(F80::from_f64(-3.0).compare(&F80::from_f64(-2.0)), Some(Ordering::Less));
    assert_eq!(F80::real_indefinite().compare(&b), None);
}

#[test]
fn test_f64_to_f32_directed() {
    let (down, down_inexact) = f64_to_f32(0.1, RoundMode::Down);
    let (up, up_inexact) = f64_to_f32(0.1, RoundMode::Up);
    assert!(down_inexact && up_inexact);
    assert!((down as f64) < 0.1);
    assert!((up as f64) > 0.1);
    assert_eq!(down.to_bits() + 1, up.to_bits());

    let (exact, inexact) = f64_to_f32(0.5, RoundMode::Chop);
    assert_eq!(exact, 0.5);
    assert!(!inexact);

    let (chopped, _) = f64_to_f32(1e300, RoundMode::Chop);
    assert_eq!(chopped, f32::MAX);
}

#[test]
fn test_next_up_down() {
    assert_eq!(next_up(1.0), 1.0 + f64::EPSILON);
    assert_eq!(next_down(0.0), -f64::from_bits(1));
    assert_eq!(next_down(f64::INFINITY), f64::MAX);
    assert_eq!(next_up(-f64::from_bits(1)), -0.0);
}

#[test]
fn test_reg_representation() {
    let native = Reg::from(1.5);
    assert!(!native.is_extended());
    assert_eq!(native.to_f80(), F80::from_f64(1.5));

    let raw = F80::from_raw(0x3FFF, 0x8000_0000_0000_0001);
    let ext = Reg::from(raw);
    assert!(ext.is_extended());
    // The raw encoding is kept even though it does not fit a double
    assert_eq!(ext.to_f80(), raw);
    assert_eq!(ext.value(), 1.0);

    assert!(Reg::indefinite().is_nan());
    assert!(Reg::indefinite().sign());
}
