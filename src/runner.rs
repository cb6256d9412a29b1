//! Feeds raw 16-bit machine code to the coprocessor.
//!
//! `iced-x86` finds instruction boundaries and resolves memory operands; the
//! escape byte and ModRM byte are then handed to the matching entry point
//! exactly as a host CPU would. Memory operands must be plain `[disp16]`
//! forms, the displacement is used as the physical address.

use iced_x86::{Decoder, DecoderOptions, Instruction, Mnemonic, Register};

use crate::bus::Bus;
use crate::fpu::Fpu;
use crate::instructions;

/// Runs every instruction in `code`. Returns how many were executed.
pub fn run_code(fpu: &mut Fpu, bus: &mut dyn Bus, code: &[u8]) -> Result<usize, String> {
    let mut decoder = Decoder::new(16, code, DecoderOptions::NONE);
    let mut instr = Instruction::default();
    let mut executed = 0;

    while decoder.can_decode() {
        decoder.decode_out(&mut instr);
        if instr.is_invalid() {
            return Err(format!("Invalid instruction at offset {:04X}", instr.ip()));
        }
        let start = instr.ip() as usize;
        let bytes = code
            .get(start..start + instr.len())
            .ok_or_else(|| format!("Truncated instruction at offset {:04X}", start))?;
        step(fpu, bus, &instr, bytes)?;
        executed += 1;
    }
    Ok(executed)
}

fn step(fpu: &mut Fpu, bus: &mut dyn Bus, instr: &Instruction, bytes: &[u8]) -> Result<(), String> {
    // The CPU only waits on the coprocessor; there is nothing to wait for
    if instr.mnemonic() == Mnemonic::Wait {
        return Ok(());
    }

    // Skip WAIT and other prefixes, none of which lie in D8-DF
    let pos = bytes
        .iter()
        .position(|b| (0xD8..=0xDF).contains(b))
        .ok_or_else(|| format!("Not a coprocessor instruction: {}", instr))?;
    let esc = bytes[pos] - 0xD8;
    let rm = *bytes
        .get(pos + 1)
        .ok_or_else(|| format!("Missing ModRM byte: {}", instr))?;

    if rm >> 6 == 3 {
        instructions::esc_normal(fpu, bus, esc, rm);
        return Ok(());
    }

    if instr.memory_base() != Register::None || instr.memory_index() != Register::None {
        return Err(format!("Unsupported addressing mode: {}", instr));
    }
    let addr = instr.memory_displacement64() as usize;
    instructions::esc_ea(fpu, bus, esc, rm, addr);
    Ok(())
}

/// Parses a hex byte string. Whitespace is ignored.
pub fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.is_ascii() {
        return Err(format!("Non-hex characters in '{}'", s));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("Odd number of hex digits in '{}'", s));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| format!("Bad hex byte '{}': {}", &digits[i..i + 2], e))
        })
        .collect()
}

/// Parses an `ADDR=HEXBYTES` memory preload, the address in hex.
pub fn parse_load(s: &str) -> Result<(usize, Vec<u8>), String> {
    let (addr, data) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected ADDR=HEXBYTES, got '{}'", s))?;
    let addr = usize::from_str_radix(addr.trim_start_matches("0x"), 16)
        .map_err(|e| format!("Bad address '{}': {}", addr, e))?;
    Ok((addr, parse_hex(data)?))
}
