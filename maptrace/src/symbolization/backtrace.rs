//! Backtrace formatting
//!
//! Turns captured return addresses into lines such as
//!
//! ```text
//!           #00  pc 000000000004f2a8  /system/lib64/libc.so (abort+164)
//!           #01  pc 0000000000001c40  /data/app/lib/arm64/libapp.so (offset 0x8000)
//! ```
//!
//! Module and relative address come from the [`MemoryMap`]; the symbol
//! clause comes from the loader hint, demangled when possible.

// String formatting intentionally uses format! for clarity
#![allow(clippy::format_push_string)]

use std::mem::size_of;

use log::debug;
use serde::Serialize;

use super::hints::{Demangle, Dladdr, RustDemangler, SymbolHints};
use super::memory_maps::{MapsSource, MemoryMap, RelPc};
use crate::config::ResolverConfig;

/// Hex digits needed to print any address of this platform
pub const POINTER_HEX_WIDTH: usize = size_of::<usize>() * 2;

/// One frame after resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFrame {
    pub index: usize,
    pub pc: usize,
    pub rel_pc: usize,
    pub object: String,
    /// File offset of the ELF header for split images, 0 otherwise
    pub elf_start_offset: usize,
    pub symbol: Option<String>,
    /// `pc` minus the symbol's start address
    pub displacement: Option<usize>,
}

impl ResolvedFrame {
    /// Format the frame as a single newline-terminated backtrace line
    #[must_use]
    pub fn format(&self) -> String {
        let mut line = format!(
            "          #{:02}  pc {:0width$x}  {}",
            self.index,
            self.rel_pc,
            self.object,
            width = POINTER_HEX_WIDTH
        );

        if self.elf_start_offset != 0 {
            line.push_str(&format!(" (offset 0x{:x})", self.elf_start_offset));
        }
        if let Some(ref symbol) = self.symbol {
            line.push_str(&format!(" ({symbol}+{})", self.displacement.unwrap_or(0)));
        }

        line.push('\n');
        line
    }
}

/// Resolves captured frames of the current process
pub struct Backtracer<H = Dladdr, D = RustDemangler> {
    maps: MemoryMap,
    hints: H,
    demangler: D,
    config: ResolverConfig,
}

impl Backtracer {
    /// Backtracer over `/proc/self/maps` with `dladdr` hints and Rust demangling
    ///
    /// The registry starts empty and fills on the first lookup.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_collaborators(
            MemoryMap::new(MapsSource::proc_self()),
            Dladdr,
            RustDemangler,
            config,
        )
    }
}

impl<H: SymbolHints, D: Demangle> Backtracer<H, D> {
    pub fn with_collaborators(
        maps: MemoryMap,
        hints: H,
        demangler: D,
        config: ResolverConfig,
    ) -> Self {
        Self { maps, hints, demangler, config }
    }

    #[must_use]
    pub fn maps(&self) -> &MemoryMap {
        &self.maps
    }

    pub fn maps_mut(&mut self) -> &mut MemoryMap {
        &mut self.maps
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve frames innermost first, stopping at the first ignored frame
    pub fn resolve_frames(&mut self, frames: &[usize]) -> Vec<ResolvedFrame> {
        frames.iter().enumerate().map_while(|(index, &pc)| self.resolve_frame(index, pc)).collect()
    }

    /// Format a whole backtrace, one line per frame up to the first ignored one
    pub fn format_backtrace(&mut self, frames: &[usize]) -> String {
        self.resolve_frames(frames).iter().map(ResolvedFrame::format).collect()
    }

    /// `None` when the frame belongs to an ignored object
    fn resolve_frame(&mut self, index: usize, pc: usize) -> Option<ResolvedFrame> {
        let hint = self.hints.lookup(pc);
        let symbol_addr = hint.as_ref().and_then(|h| h.symbol_addr);

        let (rel_pc, object, elf_start_offset) = match self.maps.calculate_rel_pc(pc) {
            Some(RelPc { entry, rel_pc }) => {
                if entry.needs_ignore(&self.config.ignored_objects) {
                    debug!("Frame #{index} at 0x{pc:x} is in ignored object {}", entry.name());
                    return None;
                }
                (rel_pc, entry.name().to_string(), entry.elf_start_offset())
            }
            None => {
                debug!("Frame #{index} at 0x{pc:x} has no mapping");
                let object = hint
                    .as_ref()
                    .and_then(|h| h.object_path.clone())
                    .unwrap_or_else(|| self.config.unknown_object.clone());
                (symbol_addr.unwrap_or(pc), object, 0)
            }
        };

        let symbol = hint
            .and_then(|h| h.symbol_name)
            .map(|name| self.demangler.demangle(&name).unwrap_or(name));
        let displacement =
            symbol.as_ref().map(|_| symbol_addr.map_or(0, |addr| pc.wrapping_sub(addr)));

        debug!("Frame #{index}: 0x{pc:x} -> {object} + 0x{rel_pc:x}");
        Some(ResolvedFrame { index, pc, rel_pc, object, elf_start_offset, symbol, displacement })
    }
}
