//! ZOI machine: the session aggregate tying the CPU to a loaded program.
//!
//! The machine owns the CPU, the immutable instruction image, the coverage
//! bitmap, and the optional run observers. The stepper lives here: fetch,
//! decode, dispatch, and the stop decision.

mod machine;
mod report;

pub use machine::{Machine, Observers, StepOutcome};
pub use report::print_state;
