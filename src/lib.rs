// Lib file exposing the record builder and its entry-point gate.
// Tests and other crates link against this without running the binary's main.

/// The record builder: categories, records and `build`.
pub mod record;

/// The entry-point gate deciding whether the builder runs for an invocation.
pub mod gate;

/// Error types shared by the builder, the gate and the harness.
pub mod error;

/// Detection of `if __name__ == "__main__"` guards in Python scripts.
pub mod entry_point;

/// Define-only loading and structural analysis of scripts.
pub mod harness;

/// Shared expression walker for the calls Python code makes when evaluated.
pub mod walk;

/// Line mapping and pragma helpers.
pub mod utils;

pub use error::{GateError, HarnessError, RecordError};
pub use gate::{EntryPointGate, Invocation};
pub use record::{build, Category, OutputRecord};
