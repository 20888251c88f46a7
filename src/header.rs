/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! The Mach-O 64 file header and the top-level sanity checks that gate
//! every other operation in this crate.
//!
//! `MachHeader64::parse` is the only place a malformed magic, CPU type, or
//! load-command region can be rejected. Once a header has parsed
//! successfully, every later component may assume `sizeofcmds +
//! size_of::<MachHeader64>() <= file_size` and that the load-command
//! region itself is within bounds; they still have to validate the
//! individual commands they walk, but not the region as a whole.

use scroll::{Pread, LE};

use crate::bounds::BoundsGuard;
use crate::consts::{CpuType, CPU_ARCH_ABI64, MH_MAGIC_64};

/// Size of the on-disk `mach_header_64` record.
pub const SIZE: usize = 32;

/// A validated Mach-O 64 header.
///
/// Field layout matches Apple's `mach_header_64` byte for byte (magic,
/// cputype, cpusubtype, filetype, ncmds, sizeofcmds, flags, reserved), all
/// little-endian `u32`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachHeader64 {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
    pub reserved: u32,
}

const _: () = assert!(SIZE == 8 * 4);

impl MachHeader64 {
    /// Parses and validates the header at the start of `buf`.
    ///
    /// Returns `None` unless: `buf` is at least [`SIZE`] bytes, `magic` is
    /// [`MH_MAGIC_64`], `cputype` has the 64-bit architecture bit set, and
    /// `sizeofcmds` is a multiple of 8 and fits within `buf` immediately
    /// after the header. Nothing beyond the header is read here; load
    /// commands are discovered lazily by [`crate::load_command`].
    pub fn parse(buf: &[u8]) -> Option<MachHeader64> {
        let guard = BoundsGuard::new(buf.len());
        if !guard.in_range(0, SIZE) {
            return None;
        }

        let off = &mut 0usize;
        let header = MachHeader64 {
            magic: buf.gread_with(off, LE).ok()?,
            cputype: buf.gread_with(off, LE).ok()?,
            cpusubtype: buf.gread_with(off, LE).ok()?,
            filetype: buf.gread_with(off, LE).ok()?,
            ncmds: buf.gread_with(off, LE).ok()?,
            sizeofcmds: buf.gread_with(off, LE).ok()?,
            flags: buf.gread_with(off, LE).ok()?,
            reserved: buf.gread_with(off, LE).ok()?,
        };
        debug_assert_eq!(*off, SIZE);

        if header.magic != MH_MAGIC_64 {
            return None;
        }
        if header.cputype & CPU_ARCH_ABI64 == 0 {
            return None;
        }
        if header.sizeofcmds % 8 != 0 {
            return None;
        }
        if !guard.array_in_range(SIZE, header.sizeofcmds as usize, 1) {
            return None;
        }

        Some(header)
    }

    pub fn cpu_type(&self) -> CpuType {
        CpuType {
            cputype: self.cputype,
            cpusubtype: self.cpusubtype,
        }
    }

    /// Byte range of the load-command region, relative to the start of the
    /// file (always `[SIZE, SIZE + sizeofcmds)`, already validated to fit).
    pub fn load_commands_range(&self) -> (usize, usize) {
        (SIZE, self.sizeofcmds as usize)
    }
}
