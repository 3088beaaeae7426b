//! gtr: a golden-file regression harness for the Pika toolchain.
//!
//! The toolchain is four external programs (a code generator, a compiler, an optimizer, and an emulator which runs the
//! assembly they produce).  None of them are tested in-process.  Instead, every fixture is run through a pipeline of
//! them, whatever each program prints is captured into a result tree, and the result tree is compared file by file
//! against an expectation tree which a human has previously looked at and accepted.
//!
//! The moving parts:
//!
//! - [fixtures] lists fixture files, and [shard] splits such a list among threads.
//! - [process_coordination] launches one tool on one fixture with a deadline and captures what it printed.
//! - [executor] runs a stage (one tool over every fixture) and [comparator] checks the stage's output.
//! - [pipeline] knows which stages make up each pipeline and where they read and write.
//! - [reporter] turns outcomes into what the user sees, and [commands] is the CLI on top of all of it.
//!
//! Directory layout is in [environment]; configuration in [config].  Nothing here is global state except the logger,
//! which the binary installs.
pub mod accept;
pub mod cli_args;
pub mod commands;
pub mod comparator;
pub mod config;
pub mod environment;
pub mod error;
pub mod executor;
pub mod fixtures;
pub mod noise;
pub mod pipeline;
pub mod process_coordination;
pub mod reporter;
pub mod shard;
pub mod test_filtering;

pub use error::{Error, Result};
