//! Path lookup and debug helpers shared by the loader and the runner.

pub mod debug;
pub mod fs;

pub use debug::Debugger;
pub use fs::{LookupOptions, lookup_file, normalize_path};
