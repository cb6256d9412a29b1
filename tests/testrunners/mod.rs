#![allow(dead_code)]

use rust_x87::bus::FlatBus;
use rust_x87::control::CpuArch;
use rust_x87::fpu::{Fpu, FpuFlags};
use rust_x87::runner;

pub fn setup() -> (Fpu, FlatBus) {
    (Fpu::new(), FlatBus::new(CpuArch::I386))
}

pub fn setup_arch(arch: CpuArch) -> (Fpu, FlatBus) {
    (Fpu::new(), FlatBus::new(arch))
}

// Helper to decode and run a short piece of coprocessor code
pub fn run_fpu_code(fpu: &mut Fpu, bus: &mut FlatBus, code: &[u8]) {
    if let Err(e) = runner::run_code(fpu, bus, code) {
        panic!("run_code failed: {}", e);
    }
}

/// Resets the coprocessor and pushes `values` in order, so the last one
/// ends up in ST(0).
pub fn load_stack(fpu: &mut Fpu, values: &[f64]) {
    fpu.reset();
    for &v in values {
        fpu.push_f64(v);
    }
}

pub fn assert_f64_eq(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() <= epsilon,
        "Expected {}, got {} (epsilon {})",
        expected,
        actual,
        epsilon
    );
}

pub fn flag(fpu: &Fpu, f: FpuFlags) -> bool {
    fpu.get_fpu_flag(f)
}

/// C3, C2, C1, C0 as a tuple, in that order.
pub fn condition(fpu: &Fpu) -> (bool, bool, bool, bool) {
    (
        fpu.get_fpu_flag(FpuFlags::C3),
        fpu.get_fpu_flag(FpuFlags::C2),
        fpu.get_fpu_flag(FpuFlags::C1),
        fpu.get_fpu_flag(FpuFlags::C0),
    )
}
