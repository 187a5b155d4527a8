//! Synthetic ELF images living in real heap memory, for tests
//!
//! The registry dereferences entry addresses, so test mappings must point at
//! memory this process owns. Images are stored as `u64` words to get 8-byte
//! alignment for the header fields.

use std::mem::{offset_of, size_of};
use std::ops::Range;

use object::elf;

use super::elf_probe::{Ehdr, Phdr};

#[derive(Debug, Clone, Copy)]
pub(crate) struct FakePhdr {
    p_type: u32,
    p_flags: u32,
    p_offset: usize,
    p_vaddr: usize,
}

impl FakePhdr {
    pub(crate) fn new(p_type: u32, p_flags: u32, p_offset: usize, p_vaddr: usize) -> Self {
        Self { p_type, p_flags, p_offset, p_vaddr }
    }
}

pub(crate) struct FakeImage {
    words: Vec<u64>,
}

impl FakeImage {
    pub(crate) fn blank(len: usize) -> Self {
        Self::from_bytes(vec![0; len])
    }

    pub(crate) fn elf(len: usize, phdrs: &[FakePhdr]) -> Self {
        Self::from_bytes(Self::elf_bytes(len, phdrs))
    }

    /// Header plus program-header table at `size_of::<Ehdr>()`, rest zeroed
    pub(crate) fn elf_bytes(len: usize, phdrs: &[FakePhdr]) -> Vec<u8> {
        let mut bytes = vec![0; len];
        Self::put(&mut bytes, 0, &elf::ELFMAG);

        let phoff = size_of::<Ehdr>();
        let phnum = u16::try_from(phdrs.len()).expect("too many program headers");
        Self::put(&mut bytes, offset_of!(Ehdr, e_phoff), &phoff.to_ne_bytes());
        Self::put(&mut bytes, offset_of!(Ehdr, e_phnum), &phnum.to_ne_bytes());

        for (i, phdr) in phdrs.iter().enumerate() {
            let base = phoff + i * size_of::<Phdr>();
            Self::put(&mut bytes, base + offset_of!(Phdr, p_type), &phdr.p_type.to_ne_bytes());
            Self::put(&mut bytes, base + offset_of!(Phdr, p_flags), &phdr.p_flags.to_ne_bytes());
            Self::put(&mut bytes, base + offset_of!(Phdr, p_offset), &phdr.p_offset.to_ne_bytes());
            Self::put(&mut bytes, base + offset_of!(Phdr, p_vaddr), &phdr.p_vaddr.to_ne_bytes());
        }
        bytes
    }

    pub(crate) fn put(bytes: &mut [u8], at: usize, value: &[u8]) {
        bytes[at..at + value.len()].copy_from_slice(value);
    }

    pub(crate) fn from_bytes(mut bytes: Vec<u8>) -> Self {
        bytes.resize(bytes.len().next_multiple_of(8), 0);
        let words = bytes
            .chunks_exact(8)
            .map(|chunk| u64::from_ne_bytes(chunk.try_into().expect("8-byte chunk")))
            .collect();
        Self { words }
    }

    pub(crate) fn start(&self) -> usize {
        self.words.as_ptr() as usize
    }

    pub(crate) fn len(&self) -> usize {
        self.words.len() * 8
    }

    pub(crate) fn end(&self) -> usize {
        self.start() + self.len()
    }

    /// A `/proc/<pid>/maps` line covering `range` (byte offsets into the image)
    pub(crate) fn map_line(
        &self,
        range: Range<usize>,
        perms: &str,
        offset: usize,
        name: &str,
    ) -> String {
        format!(
            "{:x}-{:x} {perms} {offset:08x} 00:00 0          {name}",
            self.start() + range.start,
            self.start() + range.end
        )
    }
}
