//! Scaffolding for .NET project repositories.
//!
//! `dotnet-repo new <NAME>` lays out a solution with a first project, installs
//! a shared MSBuild system with strong naming and SourceLink modules, and puts
//! the result under version control. All heavy lifting is delegated to the
//! `dotnet` and `git` command-line tools. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (command-line display, launch
//!   candidates, key blob layout). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (tool lookup, the process engine,
//!   filesystem scaffolding, version control).
//!
//! [`new_repo`] coordinates core logic with I/O to implement the CLI command.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod new_repo;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
