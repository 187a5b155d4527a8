//! In-place ELF inspection of mapped images
//!
//! Everything here reads live memory of the current process through
//! [`MapEntry::read_value`], which refuses any access that is not fully inside
//! a readable entry or not naturally aligned. No file is opened: the ELF
//! header and program headers are interpreted where the loader mapped them.
//!
//! Only two facts are extracted per entry, once:
//! - whether the range starts with an ELF image (magic check)
//! - the load bias, `p_vaddr - p_offset` of the first executable `PT_LOAD`

#![allow(unsafe_code)] // bounded reads of live process memory

use std::mem::{offset_of, size_of};
use std::ptr;

use log::trace;
use object::elf;
use object::NativeEndian;

use super::memory_maps::MapEntry;

#[cfg(target_pointer_width = "64")]
pub(crate) type Ehdr = elf::FileHeader64<NativeEndian>;
#[cfg(target_pointer_width = "64")]
pub(crate) type Phdr = elf::ProgramHeader64<NativeEndian>;

#[cfg(target_pointer_width = "32")]
pub(crate) type Ehdr = elf::FileHeader32<NativeEndian>;
#[cfg(target_pointer_width = "32")]
pub(crate) type Phdr = elf::ProgramHeader32<NativeEndian>;

/// Plain integer types that may be read out of mapped memory
///
/// Every bit pattern is a valid value for these, so reading whatever the
/// mapping holds is sound once the address itself is known to be readable.
pub(crate) trait Primitive: Copy {}

impl Primitive for u16 {}
impl Primitive for u32 {}
impl Primitive for u64 {}
impl Primitive for usize {}

impl MapEntry {
    /// Read a `T` at `addr` if it lies entirely inside this readable entry
    ///
    /// Fails without touching memory when the entry is unreadable, when
    /// `[addr, addr + size_of::<T>())` is not within `[start, end)`, when the
    /// end computation overflows, or when `addr` is not aligned to the size
    /// of `T`.
    pub(crate) fn read_value<T: Primitive>(&self, addr: usize) -> Option<T> {
        let size = size_of::<T>();
        if !self.flags.readable || addr < self.start {
            return None;
        }
        let value_end = addr.checked_add(size)?;
        if value_end > self.end || addr % size != 0 {
            return None;
        }
        // SAFETY: the registry only holds entries parsed from this process's
        // own mapping table, and the range check above keeps the read inside
        // a mapping the kernel reported as readable. `addr` is aligned for T.
        Some(unsafe { ptr::read(addr as *const T) })
    }

    /// Does this range begin with the ELF magic?
    fn has_elf_magic(&self) -> bool {
        let magic_len = elf::ELFMAG.len();
        match self.start.checked_add(magic_len) {
            Some(magic_end) if magic_end < self.end => {}
            _ => return false,
        }
        self.read_value::<u32>(self.start) == Some(u32::from_ne_bytes(elf::ELFMAG))
    }

    /// Bias of the first executable `PT_LOAD` segment, 0 if none is reachable
    fn read_load_bias(&self) -> usize {
        self.exec_segment_bias().unwrap_or(0)
    }

    fn exec_segment_bias(&self) -> Option<usize> {
        let phnum: u16 = self.read_value(self.start.checked_add(offset_of!(Ehdr, e_phnum))?)?;
        let phoff: usize = self.read_value(self.start.checked_add(offset_of!(Ehdr, e_phoff))?)?;

        // Headers are walked one field at a time; the table does not need to
        // be mapped in full, the first unreadable field ends the walk.
        let mut addr = self.start.checked_add(phoff)?;
        for _ in 0..phnum {
            let p_type: u32 = self.read_value(addr.checked_add(offset_of!(Phdr, p_type))?)?;
            let p_flags: u32 = self.read_value(addr.checked_add(offset_of!(Phdr, p_flags))?)?;
            let p_offset: usize = self.read_value(addr.checked_add(offset_of!(Phdr, p_offset))?)?;

            if p_type == elf::PT_LOAD && p_flags & elf::PF_X != 0 {
                let p_vaddr: usize =
                    self.read_value(addr.checked_add(offset_of!(Phdr, p_vaddr))?)?;
                return Some(p_vaddr.wrapping_sub(p_offset));
            }
            addr = addr.checked_add(size_of::<Phdr>())?;
        }
        None
    }

    /// Determine validity and load bias, at most once per entry
    pub(crate) fn init(&mut self) {
        if self.init {
            return;
        }
        self.init = true;
        if self.has_elf_magic() {
            self.valid = true;
            self.load_bias = self.read_load_bias();
        }
        trace!(
            "Probed {:x}-{:x} {}: valid={} load_bias=0x{:x}",
            self.start,
            self.end,
            self.name,
            self.valid,
            self.load_bias
        );
    }
}
