use rust_x87::bus::Bus;
use rust_x87::control::RoundMode;
use rust_x87::f80::{F80, f64_to_f32};
use rust_x87::fpu::{FpuFlags, Tag};

mod testrunners;
use testrunners::{assert_f64_eq, condition, flag, load_stack, run_fpu_code, setup};

#[test]
fn test_fld_fstp_real32() {
    let (mut fpu, mut bus) = setup();
    bus.write_32(0x100, (-1.5f32).to_bits());

    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0x06, 0x00, 0x01]); // FLD dword [0x0100]
    assert_eq!(fpu.top(), 7);
    assert_eq!(fpu.st_f64(0), -1.5);
    assert_eq!(fpu.tag(0), Tag::Valid);

    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0x1E, 0x04, 0x01]); // FSTP dword [0x0104]
    assert_eq!(bus.read_32(0x104), (-1.5f32).to_bits());
    assert_eq!(fpu.top(), 0);
    assert_eq!(fpu.get_tag(), 0xFFFF);
}

#[test]
fn test_fld_fstp_real64() {
    let (mut fpu, mut bus) = setup();
    let v = std::f64::consts::E;
    bus.write_64(0x200, v.to_bits());

    run_fpu_code(&mut fpu, &mut bus, &[0xDD, 0x06, 0x00, 0x02]); // FLD qword [0x0200]
    assert_eq!(fpu.st_f64(0), v);
    run_fpu_code(&mut fpu, &mut bus, &[0xDD, 0x1E, 0x08, 0x02]); // FSTP qword [0x0208]
    assert_eq!(bus.read_64(0x208), v.to_bits());
    assert!(!flag(&fpu, FpuFlags::PE));
}

#[test]
fn test_fld_fstp_real80_keeps_encoding() {
    let (mut fpu, mut bus) = setup();
    let precise = F80::from_raw(0x3FFF, 0x8000_0000_0000_0001);
    bus.write_f80(0x100, precise);

    run_fpu_code(&mut fpu, &mut bus, &[0xDB, 0x2E, 0x00, 0x01]); // FLD tbyte [0x0100]
    assert_eq!(fpu.st_f80(0), precise);
    run_fpu_code(&mut fpu, &mut bus, &[0xDB, 0x3E, 0x10, 0x01]); // FSTP tbyte [0x0110]
    assert_eq!(bus.read_f80(0x110), precise);

    // Unnormals load without faulting and are tagged special
    let unnormal = F80::from_raw(0x4001, 0x2000_0000_0000_0000);
    bus.write_f80(0x120, unnormal);
    run_fpu_code(&mut fpu, &mut bus, &[0xDB, 0x2E, 0x20, 0x01]);
    assert_eq!(fpu.tag(0), Tag::Special);
    assert!(!flag(&fpu, FpuFlags::IE));
    run_fpu_code(&mut fpu, &mut bus, &[0xDB, 0x3E, 0x30, 0x01]);
    assert_eq!(bus.read_f80(0x130), unnormal);
}

#[test]
fn test_fld_real32_snan_and_denormal() {
    let (mut fpu, mut bus) = setup();
    bus.write_32(0x100, 0x7F80_0001);
    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0x06, 0x00, 0x01]);
    assert!(flag(&fpu, FpuFlags::IE));
    assert!(fpu.st_f64(0).is_nan());
    assert_eq!(fpu.tag(0), Tag::Special);

    fpu.reset();
    bus.write_32(0x104, 0x0000_0001);
    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0x06, 0x04, 0x01]);
    assert!(flag(&fpu, FpuFlags::DE));
    assert!(!flag(&fpu, FpuFlags::IE));
    assert_eq!(fpu.st_f64(0), f32::from_bits(1) as f64);
}

#[test]
fn test_fst_real32_directed() {
    let (mut fpu, mut bus) = setup();

    load_stack(&mut fpu, &[0.1]);
    fpu.cw.set_rounding(RoundMode::Down);
    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0x16, 0x00, 0x01]); // FST dword [0x0100]
    let down = bus.read_32(0x100);
    assert_eq!(down, f64_to_f32(0.1, RoundMode::Down).0.to_bits());
    assert!(flag(&fpu, FpuFlags::PE));
    assert_eq!(fpu.top(), 7);

    fpu.cw.set_rounding(RoundMode::Up);
    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0x16, 0x00, 0x01]);
    assert_eq!(bus.read_32(0x100), down + 1);
}

#[test]
fn test_fst_real32_from_extended_rounds_once() {
    let (mut fpu, mut bus) = setup();
    // 1 + 2^-24 + 2^-60: just above the halfway point between two singles
    bus.write_f80(0x100, F80::from_raw(0x3FFF, 0x8000_0080_0000_0008));
    run_fpu_code(&mut fpu, &mut bus, &[0xDB, 0x2E, 0x00, 0x01]);

    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0x16, 0x10, 0x01]); // FST dword [0x0110]
    assert_eq!(bus.read_32(0x110), 0x3F80_0001);
    assert!(flag(&fpu, FpuFlags::PE));

    fpu.cw.set_rounding(RoundMode::Chop);
    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0x1E, 0x10, 0x01]); // FSTP dword [0x0110]
    assert_eq!(bus.read_32(0x110), 0x3F80_0000);
    assert_eq!(fpu.top(), 0);
}

#[test]
fn test_fld_real64_denormal_is_normal_on_stack() {
    let (mut fpu, mut bus) = setup();
    bus.write_64(0x100, 1);
    run_fpu_code(&mut fpu, &mut bus, &[0xDD, 0x06, 0x00, 0x01]); // FLD qword [0x0100]
    assert!(flag(&fpu, FpuFlags::DE));
    assert_eq!(fpu.tag(0), Tag::Valid);
    assert_eq!(fpu.st_f64(0), f64::from_bits(1));

    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0xE5]); // FXAM
    let (c3, c2, _, c0) = condition(&fpu);
    assert_eq!((c3, c2, c0), (false, true, false));

    // Memory operands of arithmetic see the raw encoding too
    fpu.reset();
    load_stack(&mut fpu, &[1.0]);
    run_fpu_code(&mut fpu, &mut bus, &[0xDC, 0x06, 0x00, 0x01]); // FADD qword [0x0100]
    assert!(flag(&fpu, FpuFlags::DE));
}

#[test]
fn test_fst_real32_overflow() {
    let (mut fpu, mut bus) = setup();
    load_stack(&mut fpu, &[1e300]);
    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0x16, 0x00, 0x01]);
    assert_eq!(bus.read_32(0x100), f32::INFINITY.to_bits());
    assert!(flag(&fpu, FpuFlags::OE));
}

#[test]
fn test_fst_real64_from_extended() {
    let (mut fpu, mut bus) = setup();
    bus.write_f80(0x100, F80::from_raw(0x3FFF, 0x8000_0000_0000_0001));
    run_fpu_code(&mut fpu, &mut bus, &[0xDB, 0x2E, 0x00, 0x01]);

    run_fpu_code(&mut fpu, &mut bus, &[0xDD, 0x16, 0x10, 0x01]); // FST qword [0x0110]
    assert_eq!(f64::from_bits(bus.read_64(0x110)), 1.0);
    assert!(flag(&fpu, FpuFlags::PE));

    fpu.cw.set_rounding(RoundMode::Up);
    run_fpu_code(&mut fpu, &mut bus, &[0xDD, 0x16, 0x10, 0x01]);
    assert_eq!(f64::from_bits(bus.read_64(0x110)), 1.0 + f64::EPSILON);
}

#[test]
fn test_fild_fistp_int16() {
    let (mut fpu, mut bus) = setup();
    bus.write_16(0x100, (-1234i16) as u16);
    run_fpu_code(&mut fpu, &mut bus, &[0xDF, 0x06, 0x00, 0x01]); // FILD word [0x0100]
    assert_eq!(fpu.st_f64(0), -1234.0);
    run_fpu_code(&mut fpu, &mut bus, &[0xDF, 0x1E, 0x02, 0x01]); // FISTP word [0x0102]
    assert_eq!(bus.read_16(0x102), (-1234i16) as u16);
    assert_eq!(fpu.top(), 0);

    // Out of range stores the integer indefinite
    load_stack(&mut fpu, &[40000.0]);
    run_fpu_code(&mut fpu, &mut bus, &[0xDF, 0x1E, 0x04, 0x01]);
    assert_eq!(bus.read_16(0x104), 0x8000);
    assert!(flag(&fpu, FpuFlags::IE));
}

#[test]
fn test_fistp_int32_rounding() {
    let (mut fpu, mut bus) = setup();

    load_stack(&mut fpu, &[2.5]);
    run_fpu_code(&mut fpu, &mut bus, &[0xDB, 0x1E, 0x00, 0x01]); // FISTP dword [0x0100]
    assert_eq!(bus.read_32(0x100), 2);
    assert!(flag(&fpu, FpuFlags::PE));
    assert!(!flag(&fpu, FpuFlags::C1));

    load_stack(&mut fpu, &[2.5]);
    fpu.cw.set_rounding(RoundMode::Up);
    run_fpu_code(&mut fpu, &mut bus, &[0xDB, 0x1E, 0x00, 0x01]);
    assert_eq!(bus.read_32(0x100), 3);
    assert!(flag(&fpu, FpuFlags::C1));

    load_stack(&mut fpu, &[-7.9]);
    fpu.cw.set_rounding(RoundMode::Chop);
    run_fpu_code(&mut fpu, &mut bus, &[0xDB, 0x16, 0x00, 0x01]); // FIST keeps ST(0)
    assert_eq!(bus.read_32(0x100) as i32, -7);
    assert_eq!(fpu.top(), 7);

    load_stack(&mut fpu, &[f64::NAN]);
    run_fpu_code(&mut fpu, &mut bus, &[0xDB, 0x1E, 0x00, 0x01]);
    assert_eq!(bus.read_32(0x100), 0x8000_0000);
    assert!(flag(&fpu, FpuFlags::IE));
}

#[test]
fn test_fild_fistp_int64_exact() {
    let (mut fpu, mut bus) = setup();
    let v = 0x0123_4567_89AB_CDEFu64;
    bus.write_64(0x100, v);
    run_fpu_code(&mut fpu, &mut bus, &[0xDF, 0x2E, 0x00, 0x01]); // FILD qword [0x0100]
    assert_eq!(fpu.tag(0), Tag::Valid);
    run_fpu_code(&mut fpu, &mut bus, &[0xDF, 0x3E, 0x08, 0x01]); // FISTP qword [0x0108]
    assert_eq!(bus.read_64(0x108), v);
    assert!(!flag(&fpu, FpuFlags::PE));

    bus.write_64(0x100, i64::MIN as u64);
    run_fpu_code(&mut fpu, &mut bus, &[0xDF, 0x2E, 0x00, 0x01, 0xDF, 0x3E, 0x08, 0x01]);
    assert_eq!(bus.read_64(0x108), i64::MIN as u64);
    assert!(!flag(&fpu, FpuFlags::IE));
}

#[test]
fn test_fbld_fbstp() {
    let (mut fpu, mut bus) = setup();
    let bcd = [0x67, 0x45, 0x23, 0x01, 0, 0, 0, 0, 0, 0x80];
    bus.load(0x100, &bcd);

    run_fpu_code(&mut fpu, &mut bus, &[0xDF, 0x26, 0x00, 0x01]); // FBLD [0x0100]
    assert_eq!(fpu.st_f64(0), -1234567.0);

    run_fpu_code(&mut fpu, &mut bus, &[0xDF, 0x36, 0x10, 0x01]); // FBSTP [0x0110]
    for (k, b) in bcd.iter().enumerate() {
        assert_eq!(bus.read_8(0x110 + k), *b, "byte {}", k);
    }
    assert_eq!(fpu.top(), 0);

    load_stack(&mut fpu, &[1e19]);
    run_fpu_code(&mut fpu, &mut bus, &[0xDF, 0x36, 0x10, 0x01]);
    assert!(flag(&fpu, FpuFlags::IE));
    let expected = [0, 0, 0, 0, 0, 0, 0, 0xC0, 0xFF, 0xFF];
    for (k, b) in expected.iter().enumerate() {
        assert_eq!(bus.read_8(0x110 + k), *b);
    }
}

#[test]
fn test_load_constants() {
    let (mut fpu, mut bus) = setup();
    run_fpu_code(
        &mut fpu,
        &mut bus,
        &[
            0xD9, 0xE8, // FLD1
            0xD9, 0xE9, // FLDL2T
            0xD9, 0xEA, // FLDL2E
            0xD9, 0xEB, // FLDPI
            0xD9, 0xEC, // FLDLG2
            0xD9, 0xED, // FLDLN2
            0xD9, 0xEE, // FLDZ
        ],
    );
    assert_eq!(fpu.top(), 1);
    assert_eq!(fpu.st_f64(0), 0.0);
    assert_eq!(fpu.tag(0), Tag::Zero);
    assert_eq!(fpu.st_f64(1), std::f64::consts::LN_2);
    assert_eq!(fpu.st_f64(2), std::f64::consts::LOG10_2);
    assert_eq!(fpu.st_f80(3), F80::from_raw(0x4000, 0xC90F_DAA2_2168_C235));
    assert_eq!(fpu.st_f64(4), std::f64::consts::LOG2_E);
    assert_f64_eq(fpu.st_f64(5), std::f64::consts::LOG2_10, 1e-15);
    assert_eq!(fpu.st_f64(6), 1.0);
}

#[test]
fn test_fld_st0_duplicates() {
    let (mut fpu, mut bus) = setup();
    load_stack(&mut fpu, &[7.25]);
    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0xC0]); // FLD ST(0)
    assert_eq!(fpu.top(), 6);
    assert_eq!(fpu.st_f64(0), 7.25);
    assert_eq!(fpu.st_f64(1), 7.25);
}

#[test]
fn test_fst_fstp_register() {
    let (mut fpu, mut bus) = setup();
    load_stack(&mut fpu, &[1.0, 2.0, 3.0]);
    run_fpu_code(&mut fpu, &mut bus, &[0xDD, 0xD2]); // FST ST(2)
    assert_eq!(fpu.st_f64(2), 3.0);
    assert_eq!(fpu.top(), 5);

    load_stack(&mut fpu, &[1.0, 2.0, 3.0]);
    run_fpu_code(&mut fpu, &mut bus, &[0xDD, 0xD9]); // FSTP ST(1)
    assert_eq!(fpu.top(), 6);
    assert_eq!(fpu.st_f64(0), 3.0);
    assert_eq!(fpu.st_f64(1), 1.0);
}

#[test]
fn test_fxch() {
    let (mut fpu, mut bus) = setup();
    load_stack(&mut fpu, &[1.0, 2.0]);
    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0xC9]); // FXCH ST(1)
    assert_eq!(fpu.st_f64(0), 1.0);
    assert_eq!(fpu.st_f64(1), 2.0);
    assert!(!flag(&fpu, FpuFlags::IE));

    // An empty operand underflows and is replaced by the indefinite first
    load_stack(&mut fpu, &[5.0]);
    run_fpu_code(&mut fpu, &mut bus, &[0xD9, 0xC9]);
    assert!(flag(&fpu, FpuFlags::IE));
    assert!(flag(&fpu, FpuFlags::SF));
    assert_eq!(fpu.st_f80(0), F80::real_indefinite());
    assert_eq!(fpu.st_f64(1), 5.0);
    assert_eq!(fpu.tag(1), Tag::Valid);
}
