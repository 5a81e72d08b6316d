//! ZOI emulator binary.
//!
//! Loads a `.zoi` program, runs it to completion or drives it under the
//! interactive debugger, and prints the requested reports. All
//! user-facing output goes to stderr; stdout (or the optional output
//! file) carries only the program's own `outb` bytes.

use std::collections::HashSet;
use std::env;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::process;

use cpu_zoi::{ByteIo, MEM_WORDS, StreamIo};
use machine_zoi::{Machine, Observers, StepOutcome, print_state};

mod debugger;

/// Resolved option flags. Individual flags are read first; `-silent`
/// clears the reports, then `-verbose` turns everything on.
struct RunFlags {
    debug: bool,
    silent: bool,
    show_last: bool,
    show_stat: bool,
    sort_stat: bool,
    show_max: bool,
    show_ulines: bool,
    show_ulabels: bool,
    trace: bool,
}

impl RunFlags {
    fn from_options(options: &HashSet<String>) -> Self {
        let has = |name: &str| options.contains(name);
        let mut flags = Self {
            debug: has("-d"),
            silent: has("-silent"),
            show_last: has("-show-last"),
            show_stat: has("-show-stat"),
            sort_stat: has("-sort-stat"),
            show_max: has("-show-max"),
            show_ulines: has("-show-ulines"),
            show_ulabels: has("-show-ulabels"),
            trace: has("-trace"),
        };
        if flags.silent {
            flags.show_last = false;
            flags.show_stat = false;
            flags.show_max = false;
            flags.show_ulines = false;
            flags.show_ulabels = false;
        }
        if has("-verbose") {
            flags.silent = false;
            flags.show_last = true;
            flags.show_stat = true;
            flags.show_max = true;
            flags.show_ulines = true;
            flags.show_ulabels = true;
        }
        flags
    }
}

fn report_error(message: &str) {
    eprintln!("Error: {message}");
}

fn main() {
    // Leading-dash arguments are options with set semantics; unknown
    // options are ignored. Everything else is positional.
    let mut params = Vec::new();
    let mut options = HashSet::new();
    for arg in env::args().skip(1) {
        if arg.starts_with('-') {
            options.insert(arg);
        } else {
            params.push(arg);
        }
    }

    if params.is_empty() {
        report_error("no zoi file");
        process::exit(1);
    }
    if params.len() == 1 {
        report_error("no input file");
        process::exit(1);
    }

    let zoi_name = &params[0];
    if !zoi_name.ends_with(".zoi") {
        report_error("invalid file type");
        process::exit(1);
    }

    let Ok(zoi_bytes) = fs::read(zoi_name) else {
        report_error("no such zoi file");
        process::exit(1);
    };
    let Ok(in_file) = File::open(&params[1]) else {
        report_error("no such input file");
        process::exit(1);
    };

    let flags = RunFlags::from_options(&options);

    let image = match format_zoi::parse(&zoi_bytes, MEM_WORDS) {
        Ok(image) => image,
        Err(err) => {
            report_error(&err.to_string());
            process::exit(1);
        }
    };

    if flags.debug && image.debug.is_none() {
        report_error("you must specify binary with debug info when in debug mode");
        process::exit(1);
    }

    // Program output goes to the optional third positional, else stdout.
    let output: Box<dyn Write> = match params.get(2) {
        Some(path) => match File::create(path) {
            Ok(file) => Box::new(io::BufWriter::new(file)),
            Err(_) => {
                report_error("cannot open output file");
                process::exit(1);
            }
        },
        None => Box::new(io::stdout()),
    };
    let mut run_io = StreamIo::new(BufReader::new(in_file), output);

    let observers = Observers {
        inst_stats: flags.show_stat,
        reg_max: flags.show_max,
        trace: flags.trace,
    };
    let mut machine = Machine::new(image, MEM_WORDS, observers);

    if flags.debug {
        debugger::Debugger::new().run(&mut machine, &mut run_io);
    } else {
        run_batch(&mut machine, &mut run_io, &flags);
    }
    run_io.flush();

    if flags.show_stat {
        machine.print_inst_stats(flags.sort_stat);
    }
    if flags.show_max {
        machine.print_reg_max();
    }
    if flags.show_ulines {
        machine.print_unreached_lines();
    }
    if flags.show_ulabels {
        machine.print_unreached_labels();
    }
}

/// Batch run: step to a terminal outcome and report it.
fn run_batch(machine: &mut Machine, io: &mut impl ByteIo, flags: &RunFlags) {
    match machine.run(io) {
        StepOutcome::Halted => {
            if flags.show_last {
                eprintln!("Execution finished.");
                print_state(machine.cpu());
            } else if !flags.silent {
                eprintln!("Execution finished.");
                eprintln!("Elapsed {} clocks.", machine.cpu().clocks());
            }
        }
        StepOutcome::Exception | StepOutcome::Abort => {
            eprintln!("Execution interrupted.");
            print_state(machine.cpu());
        }
        StepOutcome::Continue => unreachable!("run() only returns terminal outcomes"),
    }
}
