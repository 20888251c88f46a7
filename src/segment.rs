/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! `LC_SEGMENT_64` segments and the sections that follow them.
//!
//! A segment command is followed immediately in the load-command stream by
//! `nsects` fixed-size section records — they are not a separately
//! addressed table, so locating section *k* means walking past the
//! segment's own body and `k` section records. [`parse_segment`] validates
//! the segment body and its `fileoff`/`filesize`/`vmaddr`/`vmsize`
//! invariants; [`section_at`] validates that the section array itself (and
//! each section's file range) stays inside both the load-command region
//! and the segment's own file range.

use scroll::{Pread, LE};

use crate::bounds::BoundsGuard;
use crate::consts::{SectionFlags, VmProt, S_ZEROFILL};
use crate::load_command::{LoadCommand, HEAD_SIZE};

/// Size of the segment body alone (after the 8-byte load-command head).
pub const BODY_SIZE: usize = 64;
/// Size of one `section_64` record.
pub const SECTION_SIZE: usize = 80;

const _: () = assert!(BODY_SIZE == 16 + 8 + 8 + 8 + 8 + 4 + 4 + 4 + 4);
const _: () = assert!(SECTION_SIZE == 16 + 16 + 8 + 8 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 4);

/// A validated `LC_SEGMENT_64` load command.
#[derive(Debug, Clone, Copy)]
pub struct SegmentCommand64 {
    /// File offset of this command's 8-byte head; used to locate its
    /// trailing section array.
    pub lc_offset: usize,
    pub cmdsize: u32,
    pub segname: [u8; 16],
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub maxprot: VmProt,
    pub initprot: VmProt,
    pub nsects: u32,
    pub flags: u32,
}

impl SegmentCommand64 {
    pub fn name_matches(&self, name: &[u8]) -> bool {
        padded_name_eq(&self.segname, name)
    }

    /// `[vmaddr, vmaddr + vmsize)`, or `None` if that range would overflow.
    pub fn vm_range(&self) -> Option<(u64, u64)> {
        self.vmaddr.checked_add(self.vmsize).map(|end| (self.vmaddr, end))
    }

    pub fn contains_address(&self, addr: u64) -> bool {
        matches!(self.vm_range(), Some((start, end)) if addr >= start && addr < end)
    }
}

/// Compares a 16-byte, NUL-padded segment/section name field against an
/// ASCII name, the way Mach-O names are conventionally compared.
pub(crate) fn padded_name_eq(field: &[u8; 16], name: &[u8]) -> bool {
    if name.len() > 16 {
        return false;
    }
    let mut padded = [0u8; 16];
    padded[..name.len()].copy_from_slice(name);
    *field == padded
}

/// Parses and validates the `LC_SEGMENT_64` body at `lc`.
///
/// Validates: the body fits within `lc.cmdsize`; `fileoff + filesize <=
/// file_size` whenever `filesize > 0`; `vmaddr + vmsize` does not
/// overflow; and the trailing section array (`nsects` records) fits
/// within `lc.cmdsize`.
pub fn parse_segment(buf: &[u8], lc: &LoadCommand) -> Option<SegmentCommand64> {
    if lc.body_size() < BODY_SIZE {
        return None;
    }
    let guard = BoundsGuard::new(buf.len());

    let mut o = lc.body_offset();
    let mut segname = [0u8; 16];
    segname.copy_from_slice(buf.get(o..o + 16)?);
    o += 16;
    let vmaddr: u64 = buf.gread_with(&mut o, LE).ok()?;
    let vmsize: u64 = buf.gread_with(&mut o, LE).ok()?;
    let fileoff: u64 = buf.gread_with(&mut o, LE).ok()?;
    let filesize: u64 = buf.gread_with(&mut o, LE).ok()?;
    let maxprot: u32 = buf.gread_with(&mut o, LE).ok()?;
    let initprot: u32 = buf.gread_with(&mut o, LE).ok()?;
    let nsects: u32 = buf.gread_with(&mut o, LE).ok()?;
    let flags: u32 = buf.gread_with(&mut o, LE).ok()?;
    debug_assert_eq!(o - lc.body_offset(), BODY_SIZE);

    if filesize > 0 {
        let fileoff = usize::try_from(fileoff).ok()?;
        let filesize = usize::try_from(filesize).ok()?;
        if !guard.in_range(fileoff, filesize) {
            return None;
        }
    }
    if vmaddr.checked_add(vmsize).is_none() {
        return None;
    }

    // The section array immediately follows the segment body, within the
    // same load command.
    let section_array_bytes = (nsects as usize).checked_mul(SECTION_SIZE)?;
    if BODY_SIZE.checked_add(section_array_bytes)? > lc.body_size() {
        return None;
    }

    Some(SegmentCommand64 {
        lc_offset: lc.offset,
        cmdsize: lc.cmdsize,
        segname,
        vmaddr,
        vmsize,
        fileoff,
        filesize,
        maxprot: VmProt::from_bits_truncate(maxprot),
        initprot: VmProt::from_bits_truncate(initprot),
        nsects,
        flags,
    })
}

/// A validated `section_64` record belonging to some segment.
#[derive(Debug, Clone, Copy)]
pub struct Section64 {
    pub sectname: [u8; 16],
    pub segname: [u8; 16],
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
    pub align: u32,
    pub reloff: u32,
    pub nreloc: u32,
    pub flags: u32,
    pub reserved1: u32,
    pub reserved2: u32,
    pub reserved3: u32,
}

impl Section64 {
    pub fn name_matches(&self, name: &[u8]) -> bool {
        padded_name_eq(&self.sectname, name)
    }

    pub fn is_zerofill(&self) -> bool {
        (SectionFlags::from_bits_truncate(self.flags) & SectionFlags::TYPE_MASK).bits() == S_ZEROFILL
    }

    pub fn contains_address(&self, addr: u64) -> bool {
        match self.addr.checked_add(self.size) {
            Some(end) => addr >= self.addr && addr < end,
            None => false,
        }
    }
}

/// Reads and validates section record index `index` (0-based) trailing
/// `segment`. Validates the section's own file range lies within the
/// segment's file range, unless the section is zerofill.
pub fn section_at(buf: &[u8], segment: &SegmentCommand64, index: u32) -> Option<Section64> {
    if index >= segment.nsects {
        return None;
    }
    let guard = BoundsGuard::new(buf.len());
    let base = segment
        .lc_offset
        .checked_add(HEAD_SIZE)?
        .checked_add(BODY_SIZE)?
        .checked_add((index as usize).checked_mul(SECTION_SIZE)?)?;
    if !guard.in_range(base, SECTION_SIZE) {
        return None;
    }

    let mut o = base;
    let mut sectname = [0u8; 16];
    sectname.copy_from_slice(buf.get(o..o + 16)?);
    o += 16;
    let mut segname = [0u8; 16];
    segname.copy_from_slice(buf.get(o..o + 16)?);
    o += 16;
    let addr: u64 = buf.gread_with(&mut o, LE).ok()?;
    let size: u64 = buf.gread_with(&mut o, LE).ok()?;
    let offset: u32 = buf.gread_with(&mut o, LE).ok()?;
    let align: u32 = buf.gread_with(&mut o, LE).ok()?;
    let reloff: u32 = buf.gread_with(&mut o, LE).ok()?;
    let nreloc: u32 = buf.gread_with(&mut o, LE).ok()?;
    let flags: u32 = buf.gread_with(&mut o, LE).ok()?;
    let reserved1: u32 = buf.gread_with(&mut o, LE).ok()?;
    let reserved2: u32 = buf.gread_with(&mut o, LE).ok()?;
    let reserved3: u32 = buf.gread_with(&mut o, LE).ok()?;
    debug_assert_eq!(o - base, SECTION_SIZE);

    let section = Section64 {
        sectname,
        segname,
        addr,
        size,
        offset,
        align,
        reloff,
        nreloc,
        flags,
        reserved1,
        reserved2,
        reserved3,
    };

    if !section.is_zerofill() {
        let sec_off = usize::try_from(section.offset).ok()?;
        let sec_size = usize::try_from(section.size).ok()?;
        let sec_end = sec_off.checked_add(sec_size)?;
        let seg_fileoff = usize::try_from(segment.fileoff).ok()?;
        let seg_filesize = usize::try_from(segment.filesize).ok()?;
        let seg_end = seg_fileoff.checked_add(seg_filesize)?;
        if sec_off < seg_fileoff || sec_end > seg_end {
            return None;
        }
    }

    Some(section)
}
