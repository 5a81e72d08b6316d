//! Interactive line-oriented debugger.
//!
//! Commands are recognized by the first character of the first token, so
//! `n`, `next`, and `nudge` all step. An empty line repeats `next`. The
//! prompt, all inspection output, and all error messages go to stderr;
//! the debuggee's byte I/O keeps its own streams.

use std::collections::BTreeSet;
use std::io::{self, BufRead};

use cpu_zoi::{ByteIo, bits_of_float, float_of_bits};
use machine_zoi::{Machine, StepOutcome, print_state};

/// How a `p` argument is rendered.
#[derive(Debug, PartialEq, Eq)]
enum PrintMode {
    /// The value itself, five ways.
    Value,
    /// The memory word the value addresses.
    Deref,
    /// The instruction word the value addresses, with its source line.
    Inst,
}

/// One parsed command line.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Next(Option<i64>),
    Continue,
    Quit,
    BreakHere,
    BreakAt(String),
    BreakList,
    Delete(String),
    DeleteAll,
    DeleteNeedsArg,
    PrintState,
    Print { target: String, mode: PrintMode },
    Invalid,
    Unknown,
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = if line.trim().is_empty() { "next" } else { line };
        let mut tokens = line.split_whitespace();
        let Some(cmd) = tokens.next() else {
            return Self::Unknown;
        };
        let arg = tokens.next();

        match cmd.chars().next() {
            Some('n') => match arg {
                None => Self::Next(None),
                Some(a) => a.parse().map_or(Self::Invalid, |n| Self::Next(Some(n))),
            },
            Some('c') => Self::Continue,
            Some('q') => Self::Quit,
            Some('b') => match arg {
                None => Self::BreakHere,
                Some("-s") => Self::BreakList,
                Some(a) => Self::BreakAt(a.to_string()),
            },
            Some('d') => match arg {
                None => Self::DeleteNeedsArg,
                Some("-a") => Self::DeleteAll,
                Some(a) => Self::Delete(a.to_string()),
            },
            Some('p') => match arg {
                None => Self::PrintState,
                Some(a) => {
                    if let Some(rest) = a.strip_prefix('*') {
                        Self::Print {
                            target: rest.to_string(),
                            mode: PrintMode::Deref,
                        }
                    } else if let Some(rest) = a.strip_prefix('@') {
                        Self::Print {
                            target: rest.to_string(),
                            mode: PrintMode::Inst,
                        }
                    } else {
                        Self::Print {
                            target: a.to_string(),
                            mode: PrintMode::Value,
                        }
                    }
                }
            },
            _ => Self::Unknown,
        }
    }
}

pub struct Debugger {
    /// Instruction addresses to stop at, consulted between steps.
    breakpoints: BTreeSet<u32>,
}

impl Debugger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            breakpoints: BTreeSet::new(),
        }
    }

    /// Prompt loop. Returns when the user quits, the run reaches a
    /// terminal state, or stdin closes.
    pub fn run(&mut self, machine: &mut Machine, io: &mut impl ByteIo) {
        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            print_prompt(machine);
            let Some(Ok(line)) = lines.next() else { break };
            if !self.dispatch(machine, io, &line) {
                break;
            }
        }
    }

    /// Execute one command. Returns false when the session is over.
    fn dispatch(&mut self, machine: &mut Machine, io: &mut impl ByteIo, line: &str) -> bool {
        match Command::parse(line) {
            Command::Next(None) => step_and_report(machine, io),
            Command::Next(Some(count)) => {
                for _ in 0..count {
                    if !step_and_report(machine, io) {
                        return false;
                    }
                    if self.at_breakpoint(machine) {
                        eprintln!("Stop at breakpoint.");
                        eprintln!();
                        break;
                    }
                }
                true
            }
            Command::Continue => {
                loop {
                    if !step_and_report(machine, io) {
                        return false;
                    }
                    if self.at_breakpoint(machine) {
                        eprintln!("Stop at breakpoint.");
                        eprintln!();
                        break;
                    }
                }
                true
            }
            Command::Quit => false,
            Command::BreakHere => {
                self.breakpoints.insert(machine.cpu().pc());
                eprintln!("Add breakpoint.");
                eprintln!();
                true
            }
            Command::BreakAt(arg) => {
                if let Some(addr) = resolve_break_target(machine, &arg) {
                    self.breakpoints.insert(addr);
                    eprintln!("Add breakpoint at");
                    print_breakpoint(machine, addr);
                    eprintln!();
                } else {
                    eprintln!("Invalid argument.");
                }
                true
            }
            Command::BreakList => {
                if self.breakpoints.is_empty() {
                    eprint!("No");
                } else {
                    eprint!("{}", self.breakpoints.len());
                }
                eprintln!(" breakpoint(s).");
                for &bp in &self.breakpoints {
                    print_breakpoint(machine, bp);
                }
                eprintln!();
                true
            }
            Command::Delete(arg) => {
                if let Some(addr) = resolve_break_target(machine, &arg) {
                    self.breakpoints.remove(&addr);
                    eprintln!("Delete breakpoint at");
                    print_breakpoint(machine, addr);
                    eprintln!();
                } else {
                    eprintln!("Invalid argument.");
                }
                true
            }
            Command::DeleteAll => {
                eprintln!("Delete all breakpoints.");
                eprintln!();
                self.breakpoints.clear();
                true
            }
            Command::DeleteNeedsArg => {
                eprintln!("Please specify an argument.");
                true
            }
            Command::PrintState => {
                print_state(machine.cpu());
                true
            }
            Command::Print { target, mode } => {
                print_value(machine, &target, &mode);
                true
            }
            Command::Invalid => {
                eprintln!("Invalid argument.");
                true
            }
            Command::Unknown => {
                eprintln!("Undefined command.");
                true
            }
        }
    }

    fn at_breakpoint(&self, machine: &Machine) -> bool {
        self.breakpoints.contains(&machine.cpu().pc())
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

fn print_prompt(machine: &Machine) {
    machine.print_source_line(machine.cpu().pc());
    eprint!("[{} clks] > ", machine.cpu().clocks());
}

/// One machine step with terminal-state reporting. Returns false when
/// the run is over.
fn step_and_report(machine: &mut Machine, io: &mut impl ByteIo) -> bool {
    match machine.step(io) {
        StepOutcome::Continue => true,
        StepOutcome::Halted => {
            eprintln!("Execution finished.");
            print_state(machine.cpu());
            false
        }
        StepOutcome::Exception | StepOutcome::Abort => {
            eprintln!("Execution interrupted.");
            print_state(machine.cpu());
            false
        }
    }
}

fn print_breakpoint(machine: &Machine, addr: u32) {
    eprint!("(0x{addr:08x}) ");
    machine.print_source_line(addr);
}

/// Breakpoint argument: a source line number, or a label resolved to its
/// line; either way, the first instruction at or after that line.
fn resolve_break_target(machine: &Machine, arg: &str) -> Option<u32> {
    let debug = machine.debug_info()?;
    let lnum = if arg.starts_with(|c: char| c.is_ascii_digit()) {
        arg.parse().ok()?
    } else {
        debug.line_of_label(arg)?
    };
    debug.text_addr_of_line(lnum)
}

/// `p` variable: `pc`, `x0`..`x31`, `f0`..`f31` (as raw bits), or a
/// numeric literal.
fn resolve_value(machine: &Machine, var: &str) -> Option<u32> {
    if var == "pc" {
        return Some(machine.cpu().pc());
    }
    match var.chars().next()? {
        'x' => {
            let i = var[1..].parse().ok()?;
            machine.cpu().reg(i).ok()
        }
        'f' => {
            let i = var[1..].parse().ok()?;
            machine.cpu().freg(i).ok().map(bits_of_float)
        }
        _ => parse_u32(var),
    }
}

/// Numeric literal: decimal, `0x…` hex, or `0b…` binary.
fn parse_u32(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix("0x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = text.strip_prefix("0b") {
        u32::from_str_radix(bin, 2).ok()
    } else {
        text.parse().ok()
    }
}

fn print_value(machine: &Machine, target: &str, mode: &PrintMode) {
    let Some(value) = resolve_value(machine, target) else {
        eprintln!("Invalid argument.");
        return;
    };

    match mode {
        PrintMode::Inst => {
            let Ok(word) = machine.text_word(value) else {
                eprintln!("Invalid argument.");
                return;
            };
            machine.print_source_line(value);
            print_as_hex(word);
            print_as_bin(word);
            eprintln!();
        }
        PrintMode::Deref | PrintMode::Value => {
            let value = if *mode == PrintMode::Deref {
                match machine.cpu().mem_word(value) {
                    Ok(word) => word,
                    Err(_) => {
                        eprintln!("Invalid memory access. addr = 0x{value:08x} ({value})");
                        return;
                    }
                }
            } else {
                value
            };
            print_as_hex(value);
            eprintln!("(uint)  {value}");
            eprintln!("(int)   {}", value as i32);
            eprintln!("(float) {}", float_of_bits(value));
            print_as_bin(value);
            eprintln!();
        }
    }
}

fn print_as_hex(value: u32) {
    eprintln!("(hex)   0x{value:08x}");
}

fn print_as_bin(value: u32) {
    eprintln!("(bin)   0b{value:032b}");
}
