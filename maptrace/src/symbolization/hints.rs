//! Collaborators consulted while formatting a backtrace
//!
//! - [`SymbolHints`]: the dynamic loader's idea of which symbol an address
//!   falls in. Optional enrichment only; the registry decides the module.
//! - [`Demangle`]: turns a mangled symbol into a readable one.

#![allow(unsafe_code)] // dladdr() requires unsafe

use std::ffi::{c_char, CStr};
use std::mem;

use rustc_demangle::try_demangle;
use serde::Serialize;

/// What the dynamic loader knows about an address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolHint {
    /// Start address of the nearest symbol at or below the address
    pub symbol_addr: Option<usize>,
    pub symbol_name: Option<String>,
    /// Path of the object containing the address
    pub object_path: Option<String>,
}

pub trait SymbolHints {
    fn lookup(&self, pc: usize) -> Option<SymbolHint>;
}

impl<F> SymbolHints for F
where
    F: Fn(usize) -> Option<SymbolHint>,
{
    fn lookup(&self, pc: usize) -> Option<SymbolHint> {
        self(pc)
    }
}

/// Hints from `dladdr(3)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Dladdr;

impl SymbolHints for Dladdr {
    fn lookup(&self, pc: usize) -> Option<SymbolHint> {
        // SAFETY: Dl_info is plain pointers, all-zero is a valid value
        let mut info: libc::Dl_info = unsafe { mem::zeroed() };
        // SAFETY: dladdr only consults loader bookkeeping for `pc` and writes `info`
        if unsafe { libc::dladdr(pc as *const libc::c_void, &mut info) } == 0 {
            return None;
        }

        Some(SymbolHint {
            symbol_addr: (!info.dli_saddr.is_null()).then_some(info.dli_saddr as usize),
            symbol_name: owned_c_str(info.dli_sname),
            object_path: owned_c_str(info.dli_fname),
        })
    }
}

fn owned_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: dladdr hands out NUL-terminated strings owned by the loader
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Never has a hint
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHints;

impl SymbolHints for NoHints {
    fn lookup(&self, _pc: usize) -> Option<SymbolHint> {
        None
    }
}

pub trait Demangle {
    /// Readable form of `symbol`, or `None` if it is not a recognized mangling
    fn demangle(&self, symbol: &str) -> Option<String>;
}

impl<F> Demangle for F
where
    F: Fn(&str) -> Option<String>,
{
    fn demangle(&self, symbol: &str) -> Option<String> {
        self(symbol)
    }
}

/// Demangles Rust symbols (legacy and v0), without the hash suffix
#[derive(Debug, Clone, Copy, Default)]
pub struct RustDemangler;

impl Demangle for RustDemangler {
    fn demangle(&self, symbol: &str) -> Option<String> {
        try_demangle(symbol).ok().map(|demangled| format!("{demangled:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_demangler() {
        let demangler = RustDemangler;
        assert_eq!(
            demangler.demangle("_ZN4core3ptr13drop_in_place17h0123456789abcdefE").as_deref(),
            Some("core::ptr::drop_in_place")
        );
        assert_eq!(demangler.demangle("malloc"), None);
    }

    #[test]
    fn test_closure_collaborators() {
        let hints = |pc: usize| {
            (pc == 0x1000).then(|| SymbolHint {
                symbol_addr: Some(0xff0),
                symbol_name: Some("f".to_string()),
                object_path: None,
            })
        };
        assert_eq!(hints.lookup(0x1000).unwrap().symbol_addr, Some(0xff0));
        assert!(hints.lookup(0x2000).is_none());

        let upper = |s: &str| Some(s.to_uppercase());
        assert_eq!(upper.demangle("abc").as_deref(), Some("ABC"));
    }

    #[test]
    fn test_dladdr_finds_libc_symbol() {
        let pc = libc::malloc as usize;
        let hint = Dladdr.lookup(pc).expect("malloc is known to the loader");

        assert!(hint.object_path.is_some());
        assert!(hint.symbol_addr.is_some_and(|addr| addr <= pc));
    }

    #[test]
    fn test_dladdr_unknown_address() {
        assert!(Dladdr.lookup(0x10).is_none());
        assert!(NoHints.lookup(libc::malloc as usize).is_none());
    }
}
