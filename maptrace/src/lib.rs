//! # maptrace - In-Process Backtrace Symbolization
//!
//! maptrace resolves return addresses captured inside a process (by a crash
//! handler, a sampling profiler, a leak tracker) into lines naming the
//! shared object, the address relative to that object, and the symbol when
//! the dynamic loader knows one:
//!
//! ```text
//!           #00  pc 00000000000a3f10  /usr/lib/libc.so.6 (abort+215)
//!           #01  pc 0000000000012c48  /opt/app/bin/server (handle_request+72)
//! ```
//!
//! It only relies on what the process itself has: `/proc/self/maps` and the
//! ELF headers mapped by the loader. There is no file parsing, no debug info
//! and no persistent cache.
//!
//! ## Module Structure
//!
//! - [`symbolization`]: map registry, ELF probing, backtrace formatting
//! - [`config`]: resolver settings (ignored objects, placeholder name)
//! - [`domain`]: shared types and errors
//! - [`cli`]: argument parsing for the `maptrace` binary
//!
//! ## Threading
//!
//! Everything is synchronous and unlocked. A [`symbolization::Backtracer`]
//! is meant to be driven by the one thread reporting a crash or sample.

pub mod cli;
pub mod config;
pub mod domain;
pub mod symbolization;
