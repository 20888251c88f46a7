/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Constants and small bit-layout types from the Mach-O 64 / IOKit ABI.
//!
//! These are pinned to Apple's published `mach-o/loader.h` and
//! `mach-o/nlist.h` headers. Nothing here is architecture-generic: this
//! crate only speaks x86_64 little-endian Mach-O 64, so only the constants
//! that ABI needs are present.

use bitflags::bitflags;

/// 64-bit Mach-O magic, little-endian in the file.
pub const MH_MAGIC_64: u32 = 0xfeed_facf;

/// Set in `cputype` for any 64-bit architecture.
pub const CPU_ARCH_ABI64: u32 = 0x0100_0000;

/// x86_64 `cputype`/`cpusubtype` (the only architecture this crate targets).
pub const CPU_TYPE_X86_64: u32 = 7 | CPU_ARCH_ABI64;
pub const CPU_SUBTYPE_X86_64_ALL: u32 = 3;

/// The CPU type/subtype pair recorded in a Mach-O 64 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuType {
    pub cputype: u32,
    pub cpusubtype: u32,
}

impl CpuType {
    /// True iff `CPU_ARCH_ABI64` is set, i.e. this is *some* 64-bit
    /// architecture (not necessarily x86_64).
    pub fn is_64_bit(&self) -> bool {
        self.cputype & CPU_ARCH_ABI64 != 0
    }

    pub fn is_x86_64(&self) -> bool {
        self.cputype == CPU_TYPE_X86_64
    }
}

/// Load command opcodes this crate recognises. Unknown opcodes are skipped
/// during traversal, not rejected (see [`crate::load_command`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LoadCommandKind {
    Segment64,
    Symtab,
    Dysymtab,
    Uuid,
    Other(u32),
}

pub const LC_SEGMENT_64: u32 = 0x19;
pub const LC_SYMTAB: u32 = 0x2;
pub const LC_DYSYMTAB: u32 = 0xb;
pub const LC_UUID: u32 = 0x1b;
/// High bit set on load commands the dynamic linker must understand to
/// load the file; irrelevant to parsing but worth naming for readers of
/// `cmd` values.
pub const LC_REQ_DYLD: u32 = 0x8000_0000;

impl From<u32> for LoadCommandKind {
    fn from(cmd: u32) -> Self {
        match cmd {
            LC_SEGMENT_64 => LoadCommandKind::Segment64,
            LC_SYMTAB => LoadCommandKind::Symtab,
            LC_DYSYMTAB => LoadCommandKind::Dysymtab,
            LC_UUID => LoadCommandKind::Uuid,
            other => LoadCommandKind::Other(other),
        }
    }
}

bitflags! {
    /// `maxprot`/`initprot` VM protection bits on a segment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VmProt: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
        const EXECUTE = 0x4;
    }
}

bitflags! {
    /// Section `flags`: type bits (low byte) and attribute bits (remaining
    /// 24 bits). Only the attribute bits relevant to zerofill detection are
    /// named; the rest pass through as opaque bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u32 {
        const TYPE_MASK = 0x0000_00ff;
        const ATTRIBUTES_MASK = 0xffff_ff00;
    }
}

/// `S_ZEROFILL` section type: occupies no file space.
pub const S_ZEROFILL: u32 = 0x1;

/// `n_type` sub-fields ([`Nlist64::n_type`](crate::symtab::Nlist64)).
pub mod n_type {
    pub const N_STAB: u8 = 0xe0;
    pub const N_PEXT: u8 = 0x10;
    pub const N_TYPE: u8 = 0x0e;
    pub const N_EXT: u8 = 0x01;

    pub const N_UNDF: u8 = 0x0;
    pub const N_ABS: u8 = 0x2;
    pub const N_SECT: u8 = 0xe;
    pub const N_PBUD: u8 = 0xc;
    pub const N_INDR: u8 = 0xa;
}

/// A decoded view of `n_type`, exposed for callers that want the bit groups
/// without re-deriving the masks themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NType(pub u8);

impl NType {
    pub fn type_bits(&self) -> u8 {
        self.0 & n_type::N_TYPE
    }

    pub fn is_stab(&self) -> bool {
        self.0 & n_type::N_STAB != 0
    }

    pub fn is_external(&self) -> bool {
        self.0 & n_type::N_EXT != 0
    }

    pub fn is_private_external(&self) -> bool {
        self.0 & n_type::N_PEXT != 0
    }
}

/// Intel-64 (`x86_64`) relocation types, from `mach-o/x86_64/reloc.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RelocType {
    Unsigned,
    Signed,
    Branch,
    GotLoad,
    Got,
    Subtractor,
    Signed1,
    Signed2,
    Signed4,
    Tlv,
    Other(u8),
}

pub const X86_64_RELOC_UNSIGNED: u8 = 0;
pub const X86_64_RELOC_SIGNED: u8 = 1;
pub const X86_64_RELOC_BRANCH: u8 = 2;
pub const X86_64_RELOC_GOT_LOAD: u8 = 3;
pub const X86_64_RELOC_GOT: u8 = 4;
pub const X86_64_RELOC_SUBTRACTOR: u8 = 5;
pub const X86_64_RELOC_SIGNED_1: u8 = 6;
pub const X86_64_RELOC_SIGNED_2: u8 = 7;
pub const X86_64_RELOC_SIGNED_4: u8 = 8;
pub const X86_64_RELOC_TLV: u8 = 9;

impl From<u8> for RelocType {
    fn from(r_type: u8) -> Self {
        match r_type {
            X86_64_RELOC_UNSIGNED => RelocType::Unsigned,
            X86_64_RELOC_SIGNED => RelocType::Signed,
            X86_64_RELOC_BRANCH => RelocType::Branch,
            X86_64_RELOC_GOT_LOAD => RelocType::GotLoad,
            X86_64_RELOC_GOT => RelocType::Got,
            X86_64_RELOC_SUBTRACTOR => RelocType::Subtractor,
            X86_64_RELOC_SIGNED_1 => RelocType::Signed1,
            X86_64_RELOC_SIGNED_2 => RelocType::Signed2,
            X86_64_RELOC_SIGNED_4 => RelocType::Signed4,
            X86_64_RELOC_TLV => RelocType::Tlv,
            other => RelocType::Other(other),
        }
    }
}
