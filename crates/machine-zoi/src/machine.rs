//! The machine and its stepper.

use cpu_zoi::{AccessError, ByteIo, Cpu, Fault, Op, decode};
use format_zoi::{DebugInfo, ZoiImage};

/// What a single step decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The instruction retired; keep going.
    Continue,
    /// The halt instruction retired.
    Halted,
    /// A NaN or bad-address fault was raised.
    Exception,
    /// The PC ran off the text image or the word did not decode.
    Abort,
}

/// Which optional collectors a machine carries.
///
/// Observers cost a little per step, so plain runs leave them off.
#[derive(Debug, Default, Clone, Copy)]
pub struct Observers {
    /// Count executions per opcode.
    pub inst_stats: bool,
    /// Track the largest value written to each integer register.
    pub reg_max: bool,
    /// Echo each executed mnemonic to the diagnostic stream.
    pub trace: bool,
}

/// Per-opcode execution counters, remembering first-execution order.
pub(crate) struct InstStats {
    pub(crate) counts: [u64; Op::COUNT],
    pub(crate) order: Vec<Op>,
}

impl InstStats {
    fn new() -> Self {
        Self {
            counts: [0; Op::COUNT],
            order: Vec::new(),
        }
    }

    fn record(&mut self, op: Op) {
        if self.counts[op.index()] == 0 {
            self.order.push(op);
        }
        self.counts[op.index()] += 1;
    }
}

/// A loaded ZOI program and the CPU executing it.
pub struct Machine {
    cpu: Cpu,
    /// Immutable instruction image; PC indexes this, not data memory.
    text: Vec<u32>,
    /// One flag per instruction word, cleared on first fetch.
    unreached: Vec<bool>,
    /// Source map from a `ZOI?` file.
    debug: Option<DebugInfo>,
    pub(crate) stats: Option<InstStats>,
    pub(crate) reg_max: Option<[u32; 32]>,
    trace: bool,
}

impl Machine {
    /// Build a machine from a parsed image. The data image seeds the low
    /// end of a `mem_words`-word memory.
    #[must_use]
    pub fn new(image: ZoiImage, mem_words: u32, observers: Observers) -> Self {
        let unreached = vec![true; image.text.len()];
        Self {
            cpu: Cpu::new(mem_words, &image.data),
            text: image.text,
            unreached,
            debug: image.debug,
            stats: observers.inst_stats.then(InstStats::new),
            reg_max: observers.reg_max.then_some([0; 32]),
            trace: observers.trace,
        }
    }

    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    #[must_use]
    pub fn debug_info(&self) -> Option<&DebugInfo> {
        self.debug.as_ref()
    }

    /// The instruction word at byte address `addr`, for inspection.
    pub fn text_word(&self, addr: u32) -> Result<u32, AccessError> {
        if addr & 0b11 != 0 {
            return Err(AccessError::Misaligned);
        }
        self.text
            .get((addr >> 2) as usize)
            .copied()
            .ok_or(AccessError::OutOfRange)
    }

    /// Print `<lnum>: <text>` for the instruction at `addr` to the
    /// diagnostic stream. Quiet when there is no source map.
    pub fn print_source_line(&self, addr: u32) {
        let Some(debug) = &self.debug else { return };
        let Some(lnum) = debug.line_of_index((addr >> 2) as usize) else {
            return;
        };
        let text = debug.line_text(lnum).unwrap_or("");
        eprintln!("{lnum}: {text}");
    }

    /// Advance the machine one instruction.
    pub fn step(&mut self, io: &mut impl ByteIo) -> StepOutcome {
        let pc = self.cpu.pc();
        let idx = (pc >> 2) as usize;
        let Some(&word) = self.text.get(idx) else {
            // The PC ran off the program; point at the last retired
            // instruction, which is where the run went wrong.
            self.print_source_line(self.cpu.prev_pc());
            return StepOutcome::Abort;
        };
        self.unreached[idx] = false;

        let Some(inst) = decode(word) else {
            self.print_source_line(pc);
            return StepOutcome::Abort;
        };
        if self.trace {
            eprintln!("{}", inst.op().name());
        }

        self.cpu.execute(&inst, io);

        if let Some(stats) = &mut self.stats {
            stats.record(inst.op());
        }
        if let Some(maxima) = &mut self.reg_max {
            for (max, &value) in maxima.iter_mut().zip(self.cpu.regs()) {
                if value > *max {
                    *max = value;
                }
            }
        }

        if self.cpu.is_exception() {
            self.report_fault();
            StepOutcome::Exception
        } else if self.cpu.is_halted() {
            StepOutcome::Halted
        } else {
            StepOutcome::Continue
        }
    }

    /// Step until the run stops. Returns the terminal outcome.
    pub fn run(&mut self, io: &mut impl ByteIo) -> StepOutcome {
        loop {
            match self.step(io) {
                StepOutcome::Continue => {}
                outcome => return outcome,
            }
        }
    }

    /// Byte addresses of instructions never fetched, ascending.
    #[must_use]
    pub fn unreached_addrs(&self) -> Vec<u32> {
        self.unreached
            .iter()
            .enumerate()
            .filter(|&(_, &unreached)| unreached)
            .map(|(i, _)| (i as u32) << 2)
            .collect()
    }

    /// Labels whose first instruction was never fetched, in declaration
    /// order.
    #[must_use]
    pub fn unreached_labels(&self) -> Vec<&str> {
        let Some(debug) = &self.debug else {
            return Vec::new();
        };
        debug
            .labels()
            .iter()
            .filter(|label| {
                debug
                    .line_of_label(label)
                    .and_then(|lnum| debug.text_addr_of_line(lnum))
                    .is_some_and(|addr| self.unreached[(addr >> 2) as usize])
            })
            .map(String::as_str)
            .collect()
    }

    /// Diagnostic for the fault that stopped the run.
    fn report_fault(&self) {
        match self.cpu.fault() {
            Some(Fault::Nan { pc, rd }) => {
                self.print_source_line(pc);
                eprintln!("NaN exception. (f{rd:02})");
            }
            Some(Fault::BadAddress { pc, addr }) => {
                self.print_source_line(pc);
                eprintln!("Invalid memory access. addr = 0x{addr:08x} ({addr})");
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpu_zoi::{BufferIo, encode};

    fn machine(text: Vec<u32>, observers: Observers) -> Machine {
        let image = ZoiImage {
            data: Vec::new(),
            text,
            debug: None,
        };
        Machine::new(image, 64, observers)
    }

    #[test]
    fn run_stops_on_halt() {
        let mut m = machine(
            vec![encode::addi(1, 0, 5), encode::halt()],
            Observers::default(),
        );
        let mut io = BufferIo::default();
        assert_eq!(m.run(&mut io), StepOutcome::Halted);
        assert_eq!(m.cpu().reg(1), Ok(5));
        assert_eq!(m.cpu().clocks(), 2);
    }

    #[test]
    fn fetch_past_the_end_aborts() {
        let mut m = machine(vec![encode::addi(1, 0, 5)], Observers::default());
        let mut io = BufferIo::default();
        assert_eq!(m.step(&mut io), StepOutcome::Continue);
        assert_eq!(m.run(&mut io), StepOutcome::Abort);
        // the abort did not tick the clock
        assert_eq!(m.cpu().clocks(), 1);
        assert_eq!(m.cpu().prev_pc(), 0);
    }

    #[test]
    fn undecodable_word_aborts() {
        let mut m = machine(vec![0xFFFF_FFFF], Observers::default());
        let mut io = BufferIo::default();
        assert_eq!(m.step(&mut io), StepOutcome::Abort);
        assert_eq!(m.cpu().clocks(), 0);
    }

    #[test]
    fn coverage_marks_fetched_words_only() {
        let mut m = machine(
            vec![
                encode::jal(0, 8),
                encode::addi(1, 0, 1), // skipped
                encode::halt(),
            ],
            Observers::default(),
        );
        let mut io = BufferIo::default();
        assert_eq!(m.run(&mut io), StepOutcome::Halted);
        assert_eq!(m.unreached_addrs(), vec![4]);
    }

    #[test]
    fn stats_count_in_first_execution_order() {
        let mut m = machine(
            vec![
                encode::addi(1, 0, 2),
                encode::addi(2, 0, 3),
                encode::add(3, 1, 2),
                encode::halt(),
            ],
            Observers {
                inst_stats: true,
                ..Observers::default()
            },
        );
        let mut io = BufferIo::default();
        m.run(&mut io);
        let stats = m.stats.as_ref().expect("stats enabled");
        assert_eq!(stats.order, vec![Op::Addi, Op::Add, Op::Halt]);
        assert_eq!(stats.counts[Op::Addi.index()], 2);
        assert_eq!(stats.counts[Op::Add.index()], 1);
        assert_eq!(stats.counts[Op::Halt.index()], 1);
        assert_eq!(stats.counts[Op::Sub.index()], 0);
    }

    #[test]
    fn register_maxima_track_peaks() {
        let mut m = machine(
            vec![
                encode::addi(1, 0, 100),
                encode::addi(1, 1, -90), // drops to 10
                encode::halt(),
            ],
            Observers {
                reg_max: true,
                ..Observers::default()
            },
        );
        let mut io = BufferIo::default();
        m.run(&mut io);
        let maxima = m.reg_max.as_ref().expect("maxima enabled");
        assert_eq!(maxima[1], 100);
        assert_eq!(m.cpu().reg(1), Ok(10));
    }

    #[test]
    fn exception_stops_the_run() {
        // store far past the end of the 64-word memory
        let mut m = machine(
            vec![
                encode::addi(1, 0, 1),
                encode::slli(1, 1, 20),
                encode::sw(1, 1, 0),
                encode::halt(),
            ],
            Observers::default(),
        );
        let mut io = BufferIo::default();
        assert_eq!(m.run(&mut io), StepOutcome::Exception);
        assert!(m.cpu().is_exception());
        assert!(!m.cpu().is_halted());
        // PC still parked on the store
        assert_eq!(m.cpu().pc(), 8);
    }
}
