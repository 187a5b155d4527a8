//! Memory map registry for the current process
//!
//! This module parses `/proc/self/maps` into [`MapEntry`] records, keeps them
//! ordered by address, and translates raw instruction pointers into
//! addresses relative to the owning ELF image.
//!
//! Entries are probed lazily: the ELF header of a mapping is only read the
//! first time a lookup lands in it (see `elf_probe`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;

use crate::domain::{MapFlags, MapsError};

/// Mapping table of the calling process
pub const PROC_SELF_MAPS: &str = "/proc/self/maps";

/// Where a registry reads its snapshot from
#[derive(Debug, Clone)]
pub struct MapsSource {
    path: PathBuf,
}

impl MapsSource {
    /// The kernel's view of this process, `/proc/self/maps`
    #[must_use]
    pub fn proc_self() -> Self {
        Self { path: PathBuf::from(PROC_SELF_MAPS) }
    }

    /// Read snapshots from an arbitrary file
    ///
    /// # Safety
    /// Every readable range listed in the file must be readable memory of the
    /// current process for as long as the registry built from it is used.
    /// Entries are probed by dereferencing the addresses they describe.
    #[allow(unsafe_code)]
    #[must_use]
    pub unsafe fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<String, MapsError> {
        fs::read_to_string(&self.path)
            .map_err(|source| MapsError::SnapshotUnavailable { path: self.path.clone(), source })
    }
}

impl Default for MapsSource {
    fn default() -> Self {
        Self::proc_self()
    }
}

/// One contiguous address range of the mapping table
///
/// `load_bias`, `valid` and `init` are filled in lazily by the registry;
/// `elf_start_offset` is set when this entry turns out to be the executable
/// half of an image whose header lives in the preceding entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapEntry {
    pub(super) start: usize,
    pub(super) end: usize,
    pub(super) offset: usize,
    pub(super) flags: MapFlags,
    pub(super) name: String,
    pub(super) load_bias: usize,
    pub(super) elf_start_offset: usize,
    pub(super) init: bool,
    pub(super) valid: bool,
}

impl MapEntry {
    fn new(start: usize, end: usize, offset: usize, flags: MapFlags, name: String) -> Self {
        let mut entry = Self {
            start,
            end,
            offset,
            flags,
            name,
            load_bias: 0,
            elf_start_offset: 0,
            init: false,
            valid: false,
        };
        if !flags.readable {
            // Never dereferenceable, settle it now
            entry.init = true;
        }
        entry
    }

    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Offset into the backing file at which this range begins
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn flags(&self) -> MapFlags {
        self.flags
    }

    /// Backing object path, empty for anonymous mappings
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn load_bias(&self) -> usize {
        self.load_bias
    }

    /// File offset of the header half of a split image, 0 when not split
    #[must_use]
    pub fn elf_start_offset(&self) -> usize {
        self.elf_start_offset
    }

    /// Has ELF validity been determined yet?
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.init
    }

    /// Does this range start with a readable ELF image?
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr < self.end
    }

    fn overlaps(&self, other: &MapEntry) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether this entry belongs to an object whose frames should end a backtrace
    ///
    /// `ignored` holds name suffixes, e.g. `libmaptrace.so`.
    #[must_use]
    pub fn needs_ignore(&self, ignored: &[String]) -> bool {
        !self.name.is_empty()
            && ignored.iter().any(|suffix| !suffix.is_empty() && self.name.ends_with(suffix.as_str()))
    }
}

/// Split off the next whitespace-delimited field
fn next_field<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let trimmed = rest.trim_start();
    if trimmed.is_empty() {
        *rest = trimmed;
        return None;
    }
    let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
    let (field, tail) = trimmed.split_at(end);
    *rest = tail;
    Some(field)
}

/// Parse one line of `/proc/<pid>/maps`
///
/// Format: `6f000000-6f01e000 rwxp 00000000 00:0c 16389419   /system/lib/libfoo.so`
///
/// Only the address range is mandatory; a line without it (or with
/// `start >= end`) is rejected. Missing permissions yield no flags, a missing
/// offset is 0, and everything after the inode field is the name, spaces
/// included.
#[must_use]
pub fn parse_line(line: &str) -> Option<MapEntry> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let mut rest = line;

    let (start, end) = next_field(&mut rest)?.split_once('-')?;
    let start = usize::from_str_radix(start, 16).ok()?;
    let end = usize::from_str_radix(end, 16).ok()?;
    if start >= end {
        return None;
    }

    let flags = next_field(&mut rest).map(MapFlags::from_perms).unwrap_or_default();
    let offset =
        next_field(&mut rest).and_then(|field| usize::from_str_radix(field, 16).ok()).unwrap_or(0);
    // dev and inode
    next_field(&mut rest);
    next_field(&mut rest);

    let name = rest.trim_start().to_string();
    Some(MapEntry::new(start, end, offset, flags, name))
}

/// Result of translating a pc into its owning image
#[derive(Debug, Clone, Copy)]
pub struct RelPc<'a> {
    pub entry: &'a MapEntry,
    pub rel_pc: usize,
}

/// Address-ordered set of the process's mappings
///
/// Entries are only ever added. A lookup that misses re-reads the snapshot
/// once, so libraries loaded after the first build are still found.
///
/// The registry performs no locking; share it across threads only behind
/// external synchronization.
#[derive(Debug, Default)]
pub struct MemoryMap {
    source: MapsSource,
    entries: BTreeMap<usize, MapEntry>,
}

impl MemoryMap {
    #[must_use]
    pub fn new(source: MapsSource) -> Self {
        Self { source, entries: BTreeMap::new() }
    }

    #[must_use]
    pub fn source(&self) -> &MapsSource {
        &self.source
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in address order
    pub fn entries(&self) -> impl Iterator<Item = &MapEntry> {
        self.entries.values()
    }

    /// Read the snapshot and merge any ranges not already known
    ///
    /// All-or-nothing: if any line is malformed nothing from this call is
    /// merged. Returns the number of newly added entries.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be read or a line is malformed
    pub fn read_maps(&mut self) -> Result<usize, MapsError> {
        let snapshot = self.source.read()?;
        self.merge_snapshot(&snapshot)
    }

    pub(crate) fn merge_snapshot(&mut self, snapshot: &str) -> Result<usize, MapsError> {
        let parsed = snapshot
            .lines()
            .enumerate()
            .map(|(idx, line)| {
                parse_line(line).ok_or_else(|| MapsError::MalformedLine {
                    line_no: idx + 1,
                    line: line.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total = parsed.len();
        let mut added = 0;
        for entry in parsed {
            if self.insert(entry) {
                added += 1;
            }
        }
        debug!("Memory map snapshot: {total} lines, {added} new entries, {} total", self.len());
        Ok(added)
    }

    /// Insert unless an existing entry already covers part of the range
    fn insert(&mut self, entry: MapEntry) -> bool {
        let before = self.entries.range(..=entry.start).next_back();
        let after = self.entries.range(entry.start..).next();
        let taken = before.into_iter().chain(after).any(|(_, known)| known.overlaps(&entry));
        if taken {
            return false;
        }
        self.entries.insert(entry.start, entry);
        true
    }

    fn find_key(&self, pc: usize) -> Option<usize> {
        self.entries
            .range(..=pc)
            .next_back()
            .filter(|(_, entry)| entry.contains(pc))
            .map(|(&start, _)| start)
    }

    fn find_or_refresh(&mut self, pc: usize) -> Option<usize> {
        if let Some(key) = self.find_key(pc) {
            return Some(key);
        }
        debug!("No mapping for 0x{pc:x}, re-reading {}", self.source.path.display());
        if let Err(e) = self.read_maps() {
            warn!("Failed to refresh memory maps: {e}");
        }
        self.find_key(pc)
    }

    /// Find the entry containing `pc` and make sure it has been probed
    ///
    /// Returns `None` if no mapping contains `pc` even after a re-read.
    pub fn lookup(&mut self, pc: usize) -> Option<&MapEntry> {
        let key = self.find_or_refresh(pc)?;
        let entry = self.entries.get_mut(&key)?;
        entry.init();
        Some(entry)
    }

    /// Translate `pc` into an address relative to its ELF image
    ///
    /// Normally `pc - start + load_bias`. When the entry is not itself an ELF
    /// image but directly follows a read-only mapping of the same file at a
    /// lower offset that is, the pair is treated as one image split by the
    /// linker and the result is `pc - start + offset + header.load_bias`.
    ///
    /// Returns `None` if no mapping contains `pc` even after a re-read.
    pub fn calculate_rel_pc(&mut self, pc: usize) -> Option<RelPc<'_>> {
        let key = self.find_or_refresh(pc)?;
        self.entries.get_mut(&key)?.init();

        let rel_pc = match self.split_segment_rel_pc(key, pc) {
            Some(rel_pc) => rel_pc,
            None => {
                let entry = self.entries.get(&key)?;
                pc.wrapping_sub(entry.start).wrapping_add(entry.load_bias)
            }
        };
        let entry = self.entries.get(&key)?;
        Some(RelPc { entry, rel_pc })
    }

    fn split_segment_rel_pc(&mut self, key: usize, pc: usize) -> Option<usize> {
        let entry = self.entries.get(&key)?;
        if entry.valid {
            return None;
        }
        let (&prev_key, prev) = self.entries.range(..key).next_back()?;
        if !(prev.flags.is_read_only() && prev.offset < entry.offset && prev.name == entry.name) {
            return None;
        }

        let prev = self.entries.get_mut(&prev_key)?;
        prev.init();
        if !prev.valid {
            return None;
        }
        let (header_offset, header_bias) = (prev.offset, prev.load_bias);

        let entry = self.entries.get_mut(&key)?;
        entry.elf_start_offset = header_offset;
        Some(pc.wrapping_sub(entry.start).wrapping_add(entry.offset).wrapping_add(header_bias))
    }
}
