//! Repository hygiene checks run from the CLI.

mod large_files;
mod unused_deps;

pub use large_files::{find_large_files, LargeFile, LargeFileOptions};
pub use unused_deps::{find_unused_dependencies, UnusedDependencies};
