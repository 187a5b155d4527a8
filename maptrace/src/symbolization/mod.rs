//! # Address Resolution Without a Debugger
//!
//! This module turns a raw instruction pointer captured in the current
//! process into `object + relative address (+ symbol)`, using nothing but
//! the process's own mapping table and the ELF headers the loader left in
//! memory. No file is opened besides `/proc/self/maps`.
//!
//! ## Relative Addresses
//!
//! Tools that symbolize offline (`addr2line`, `ndk-stack`) want the address
//! as the linker saw it, not where ASLR put it:
//!
//! ```text
//! rel_pc = pc - mapping.start + load_bias
//! load_bias = p_vaddr - p_offset   (first executable PT_LOAD)
//! ```
//!
//! ## Split Images
//!
//! Newer linkers map the read-only part of a library (which holds the ELF
//! header) and its executable part as two adjacent mappings:
//!
//! ```text
//! 7a1c000000-7a1c004000 r--p 00000000 fd:01 123  /data/app/libapp.so
//! 7a1c004000-7a1c010000 r-xp 00004000 fd:01 123  /data/app/libapp.so
//! ```
//!
//! The executable mapping does not start with an ELF header, so its bias has
//! to come from the preceding mapping of the same file:
//!
//! ```text
//! rel_pc = pc - exec.start + exec.offset + header.load_bias
//! ```
//!
//! ## Module Structure
//!
//! - **`memory_maps`**: the registry (`MemoryMap`, `MapEntry`), snapshot
//!   parsing and rel-pc computation
//! - **`elf_probe`**: bounds-checked reads and in-memory ELF inspection
//! - **`hints`**: `dladdr` symbol hints and demangling
//! - **`backtrace`**: per-frame resolution and line formatting
//!
//! ## Example
//!
//! ```rust,no_run
//! use maptrace::config::ResolverConfig;
//! use maptrace::symbolization::Backtracer;
//!
//! let mut backtracer = Backtracer::new(ResolverConfig::default());
//! let frames = [libc::abort as usize];
//! print!("{}", backtracer.format_backtrace(&frames));
//! ```

pub mod backtrace;
mod elf_probe;
#[cfg(test)]
mod fake_elf;
pub mod hints;
pub mod memory_maps;

pub use backtrace::{Backtracer, ResolvedFrame, POINTER_HEX_WIDTH};
pub use hints::{Demangle, Dladdr, NoHints, RustDemangler, SymbolHint, SymbolHints};
pub use memory_maps::{parse_line, MapEntry, MapsSource, MemoryMap, RelPc, PROC_SELF_MAPS};
