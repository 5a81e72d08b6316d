//! Property tests for the bit-exact laws of the ISA.
//!
//! Programs are run as decoded instruction sequences on a small machine;
//! arbitrary operand patterns are seeded through the data image and loaded
//! with `lw`.

use cpu_zoi::{BufferIo, Cpu, Inst, bits_of_float, decode, encode};
use proptest::prelude::*;

fn exec(cpu: &mut Cpu, insts: &[Inst]) {
    let mut io = BufferIo::default();
    for inst in insts {
        cpu.execute(inst, &mut io);
    }
}

proptest! {
    /// `fmv.s.x` then `fsw` then `lw` round-trips any 32-bit pattern
    /// bit-identically, NaN payloads included.
    #[test]
    fn float_move_store_load_round_trips(pattern in any::<u32>()) {
        let mut cpu = Cpu::new(16, &[pattern]);
        exec(&mut cpu, &[
            Inst::Lw { rd: 1, rs1: 0, imm: 0 },
            Inst::FmvSX { rd: 1, rs1: 1 },
            Inst::Fsw { rs2: 1, rs1: 0, imm: 4 },
            Inst::Lw { rd: 2, rs1: 0, imm: 4 },
        ]);
        prop_assert_eq!(cpu.reg(2), Ok(pattern));
    }

    /// `fcvt.s.w` then `fcvt.w.s` is the identity for magnitudes that
    /// binary32 represents exactly.
    #[test]
    fn int_float_int_is_identity_below_2_24(value in -(1i32 << 24)..=(1i32 << 24)) {
        let mut cpu = Cpu::new(16, &[value as u32]);
        exec(&mut cpu, &[
            Inst::Lw { rd: 1, rs1: 0, imm: 0 },
            Inst::FcvtSW { rd: 1, rs1: 1 },
            Inst::FcvtWS { rd: 2, rs1: 1 },
        ]);
        prop_assert_eq!(cpu.reg(2), Ok(value as u32));
    }

    /// `fsgnjx rd, rs, rs` clears the sign bit.
    #[test]
    fn sign_injection_with_self_is_abs(
        pattern in any::<u32>().prop_filter("NaN faults", |p| !f32::from_bits(*p).is_nan()),
    ) {
        let mut cpu = Cpu::new(16, &[pattern]);
        exec(&mut cpu, &[
            Inst::Lw { rd: 1, rs1: 0, imm: 0 },
            Inst::FmvSX { rd: 1, rs1: 1 },
            Inst::Fsgnjx { rd: 2, rs1: 1, rs2: 1 },
            Inst::Fsw { rs2: 2, rs1: 0, imm: 4 },
            Inst::Lw { rd: 2, rs1: 0, imm: 4 },
        ]);
        prop_assert_eq!(cpu.reg(2), Ok(pattern & 0x7FFF_FFFF));
        prop_assert!(!cpu.is_exception());
        prop_assert_eq!(
            bits_of_float(cpu.freg(2).expect("f2")) & 0x8000_0000,
            0
        );
    }

    /// `lui` then `addi` materializes the expected constant from a zeroed
    /// register.
    #[test]
    fn lui_addi_materializes_constants(imm_u in any::<u32>(), k in -2048i32..=2047) {
        let mut cpu = Cpu::new(16, &[]);
        exec(&mut cpu, &[
            Inst::Lui { rd: 1, imm: imm_u & 0xFFFF_F000 },
            Inst::Addi { rd: 1, rs1: 1, imm: k },
        ]);
        let expected = (imm_u & 0xFFFF_F000).wrapping_add(k as u32);
        prop_assert_eq!(cpu.reg(1), Ok(expected));
    }

    /// Whatever a valid word does, x0 reads zero afterwards and the clock
    /// moved exactly once.
    #[test]
    fn every_instruction_preserves_x0_and_ticks_once(word in any::<u32>()) {
        let Some(inst) = decode(word) else {
            return Ok(());
        };
        let mut cpu = Cpu::new(16, &[]);
        let mut io = BufferIo::default();
        cpu.execute(&inst, &mut io);
        prop_assert_eq!(cpu.reg(0), Ok(0));
        prop_assert_eq!(cpu.clocks(), 1);
    }
}

/// Materialize the pi bit pattern from the encoder side, move it through
/// the float file, and reload it. `addi` first, then `lui`: the upper
/// write preserves the low 12 bits already in place.
#[test]
fn pi_bits_survive_the_float_file() {
    let program = [
        encode::addi(1, 0, -37), // low 12 bits 0xFDB
        encode::lui(1, 0x4049_0000),
        encode::fmv_s_x(1, 1),
        encode::fsw(1, 0, 0),
        encode::lw(2, 0, 0),
    ];
    let mut cpu = Cpu::new(16, &[]);
    let mut io = BufferIo::default();
    for word in program {
        let inst = decode(word).expect("valid word");
        cpu.execute(&inst, &mut io);
    }
    assert_eq!(cpu.reg(2), Ok(0x4049_0FDB));
}
