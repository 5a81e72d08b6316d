//! ZOI CPU core.
//!
//! A 32-bit word-addressed RISC-V-derived CPU with single-precision
//! floating point, byte I/O, and a halt instruction. Execution is
//! instruction-at-a-time: [`decode`] unpacks a word into an [`Inst`],
//! [`Cpu::execute`] applies it to the architectural state.

mod bits;
mod cpu;
mod decode;
pub mod encode;
mod io;

pub use bits::{bits_of_float, float_of_bits};
pub use cpu::{AccessError, Cpu, Fault, MEM_WORDS, WORD_SIZE};
pub use decode::{Inst, Op, decode};
pub use io::{BufferIo, ByteIo, StreamIo};
