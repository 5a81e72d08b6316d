//! Diagnostic-stream report formatters.
//!
//! Everything here writes to stderr, leaving stdout to the running
//! program's own `outb` output.

use cpu_zoi::Cpu;

use crate::machine::Machine;

/// Dump the clock, PC, and both register files.
pub fn print_state(cpu: &Cpu) {
    eprintln!("{} clocks.", cpu.clocks());
    eprintln!();
    eprintln!("PC = 0x{:08x}", cpu.pc());
    eprintln!();
    eprintln!("GPRs:");
    for (i, value) in cpu.regs().iter().enumerate() {
        eprint!("x{i:02} = {value:10};");
        if i % 4 == 3 {
            eprintln!();
        } else {
            eprint!(" ");
        }
    }
    eprintln!();
    eprintln!("FPRs:");
    for (i, value) in cpu.fregs().iter().enumerate() {
        eprint!("f{i:02} = {value:10};");
        if i % 4 == 3 {
            eprintln!();
        } else {
            eprint!(" ");
        }
    }
}

impl Machine {
    /// Per-opcode execution counts, in first-execution order or sorted
    /// by descending count.
    pub fn print_inst_stats(&self, sorted: bool) {
        let Some(stats) = &self.stats else { return };

        eprintln!();
        eprintln!("[Instruction Stats]");
        let mut rows: Vec<_> = stats
            .order
            .iter()
            .map(|&op| (op, stats.counts[op.index()]))
            .collect();
        if sorted {
            rows.sort_by(|a, b| b.1.cmp(&a.1));
        }
        for (op, count) in rows {
            eprintln!("{:8} : {count}", op.name());
        }
    }

    /// Largest value observed in each integer register.
    pub fn print_reg_max(&self) {
        let Some(maxima) = &self.reg_max else { return };

        eprintln!();
        eprintln!("[Max Values]");
        for (i, value) in maxima.iter().enumerate() {
            eprint!("x{i:02} = {value:10};");
            if i % 4 == 3 {
                eprintln!();
            } else {
                eprint!(" ");
            }
        }
    }

    /// Instructions never fetched, one source line each.
    pub fn print_unreached_lines(&self) {
        eprintln!();
        eprintln!("[Unreached Lines]");

        let addrs = self.unreached_addrs();
        if addrs.is_empty() {
            eprint!("No");
        } else {
            eprint!("{}", addrs.len());
        }
        eprintln!(" unreached lines.");
        eprintln!();

        for addr in addrs {
            self.print_source_line(addr);
        }
    }

    /// Labels whose code was never entered.
    pub fn print_unreached_labels(&self) {
        eprintln!();
        eprintln!("[Unreached Labels]");

        let labels = self.unreached_labels();
        if labels.is_empty() {
            eprint!("No");
        } else {
            eprint!("{}", labels.len());
        }
        eprintln!(" unreached labels.");
        eprintln!();

        for label in labels {
            eprintln!("{label}");
        }
    }
}
