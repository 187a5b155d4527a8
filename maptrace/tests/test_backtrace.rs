#![allow(unsafe_code)]

use std::mem;

use maptrace::config::ResolverConfig;
use maptrace::symbolization::{Backtracer, POINTER_HEX_WIDTH};

#[inline(never)]
fn marker() -> usize {
    marker as usize
}

fn exe_name() -> String {
    let exe = std::env::current_exe().unwrap();
    exe.file_name().unwrap().to_string_lossy().into_owned()
}

/// Load base of the object containing `addr`, according to the loader
fn loader_base(addr: usize) -> usize {
    let mut info: libc::Dl_info = unsafe { mem::zeroed() };
    let found = unsafe { libc::dladdr(addr as *const libc::c_void, &mut info) };
    assert_ne!(found, 0, "dladdr knows 0x{addr:x}");
    info.dli_fbase as usize
}

#[test]
fn test_own_frame_line_layout() {
    let mut backtracer = Backtracer::new(ResolverConfig::default());
    let output = backtracer.format_backtrace(&[marker()]);

    let lines: Vec<_> = output.lines().collect();
    assert_eq!(lines.len(), 1);
    let line = lines[0];
    assert!(line.starts_with("          #00  pc "), "{line}");

    let hex = &line["          #00  pc ".len()..][..POINTER_HEX_WIDTH];
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()), "{line}");
    assert!(line.contains(&exe_name()), "{line}");
    assert!(output.ends_with('\n'));
}

#[test]
fn test_shared_library_rel_pc_matches_loader() {
    // libc is a shared object linked at 0, so rel_pc is pc minus its load base
    let pc = libc::getpid as usize;
    let mut backtracer = Backtracer::new(ResolverConfig::default());
    let frames = backtracer.resolve_frames(&[pc]);

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].rel_pc, pc - loader_base(pc));
    assert!(!frames[0].object.is_empty());
    assert!(frames[0].symbol.is_some());
}

#[test]
fn test_ignore_own_binary() {
    let config = ResolverConfig::default().ignore(exe_name());
    let mut backtracer = Backtracer::new(config);
    let libc_pc = libc::getpid as usize;

    let frames = backtracer.resolve_frames(&[libc_pc, marker(), libc_pc]);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].index, 0);
}

#[test]
fn test_registry_fills_lazily() {
    let mut backtracer = Backtracer::new(ResolverConfig::default());
    assert!(backtracer.maps().is_empty());

    backtracer.resolve_frames(&[marker()]);
    assert!(!backtracer.maps().is_empty());
}
