//! Side-effecting operations: external tools, processes, filesystem scaffolding.

pub mod build;
pub mod cancel;
pub mod completion;
pub mod config;
pub mod invocation;
pub mod process;
pub mod signing;
pub mod solution;
pub mod templates;
pub mod tool;
pub mod vcs;
