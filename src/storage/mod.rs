//! File-based state persistence
//!
//! Every subsystem keeps its state in a small JSON file that is rewritten
//! after each mutation. This module provides the shared store (atomic
//! write-then-rename) and the single-instance lock file.

pub mod lock;
pub mod state;

pub use lock::LockFile;
pub use state::StateStore;
