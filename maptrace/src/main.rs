//! # maptrace - Main Entry Point
//!
//! Resolves addresses inside its own process and prints them the way a
//! crash handler would. Without arguments it resolves a handful of its own
//! functions and C library entry points, which exercises both single-mapping
//! and split-segment images on typical systems.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;

use maptrace::cli::Args;
use maptrace::symbolization::{Backtracer, MapEntry, ResolvedFrame, POINTER_HEX_WIDTH};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

#[derive(Serialize)]
struct Report<'a> {
    frames: &'a [ResolvedFrame],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    maps: Vec<&'a MapEntry>,
}

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run() -> Result<()> {
    let args = Args::parse();
    let mut backtracer = Backtracer::new(args.resolver_config());

    let added = backtracer.maps_mut().read_maps().context("Failed to build memory map registry")?;
    info!("Loaded {added} mappings from {}", backtracer.maps().source().path().display());

    let frames = if args.addresses.is_empty() { sample_frames() } else { args.addresses.clone() };
    let resolved = backtracer.resolve_frames(&frames);

    if args.json {
        let maps = if args.list { backtracer.maps().entries().collect() } else { Vec::new() };
        let report = Report { frames: &resolved, maps };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for frame in &resolved {
        print!("{}", frame.format());
    }
    if args.list {
        println!();
        print_registry(backtracer.maps().entries());
    }
    Ok(())
}

/// Addresses inside this binary and the C library
fn sample_frames() -> Vec<usize> {
    vec![
        run as usize,
        sample_frames as usize,
        main as usize,
        libc::malloc as usize,
        libc::dladdr as usize,
    ]
}

fn print_registry<'a>(entries: impl Iterator<Item = &'a MapEntry>) {
    for entry in entries {
        let flags = entry.flags();
        let state = if !entry.is_initialized() {
            "-".to_string()
        } else if entry.is_valid() {
            format!("elf bias=0x{:x}", entry.load_bias())
        } else {
            "not elf".to_string()
        };
        println!(
            "{:0w$x}-{:0w$x} {}{} {:08x} {:<20} {}",
            entry.start(),
            entry.end(),
            if flags.readable { 'r' } else { '-' },
            if flags.executable { 'x' } else { '-' },
            entry.offset(),
            state,
            entry.name(),
            w = POINTER_HEX_WIDTH
        );
    }
}
