/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! `LC_SYMTAB` / `LC_DYSYMTAB` commands, symbol records, and string-table
//! resolution.
//!
//! This module only knows how to decode and bounds-check individual
//! records (a `symtab_command`, a `dysymtab_command`, one `nlist_64`, one
//! C string out of the string table). The caching of "the" symbol table
//! for a file and the higher-level lookups (`get_local_defined_symbol_by_name`,
//! `is_symbol_value_sane`, ...) live on [`crate::Context`], since they need
//! the rest of the file (segments, dysymtab ranges) to answer.

use scroll::{Pread, LE};

use crate::bounds::BoundsGuard;
use crate::consts::n_type;
use crate::load_command::LoadCommand;

/// Size of the `symtab_command` body (after the 8-byte load-command head).
pub const SYMTAB_BODY_SIZE: usize = 16;
/// Size of the `dysymtab_command` body.
pub const DYSYMTAB_BODY_SIZE: usize = 72;
/// Size of one `nlist_64` record.
pub const NLIST64_SIZE: usize = 16;

const _: () = assert!(SYMTAB_BODY_SIZE == 4 * 4);
const _: () = assert!(DYSYMTAB_BODY_SIZE == 18 * 4);
const _: () = assert!(NLIST64_SIZE == 4 + 1 + 1 + 2 + 8);

/// A validated `LC_SYMTAB` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymtabCommand {
    pub symoff: u32,
    pub nsyms: u32,
    pub stroff: u32,
    pub strsize: u32,
}

/// Parses the `symtab_command` body and validates that both the symbol
/// array (`nsyms * sizeof(Nlist64)`) and the string table (`strsize`
/// bytes) fit within the file.
pub fn parse_symtab(buf: &[u8], lc: &LoadCommand) -> Option<SymtabCommand> {
    if lc.body_size() < SYMTAB_BODY_SIZE {
        return None;
    }
    let guard = BoundsGuard::new(buf.len());
    let mut o = lc.body_offset();
    let symoff: u32 = buf.gread_with(&mut o, LE).ok()?;
    let nsyms: u32 = buf.gread_with(&mut o, LE).ok()?;
    let stroff: u32 = buf.gread_with(&mut o, LE).ok()?;
    let strsize: u32 = buf.gread_with(&mut o, LE).ok()?;

    if !guard.array_in_range(symoff as usize, nsyms as usize, NLIST64_SIZE) {
        return None;
    }
    if !guard.in_range(stroff as usize, strsize as usize) {
        return None;
    }

    Some(SymtabCommand {
        symoff,
        nsyms,
        stroff,
        strsize,
    })
}

/// A validated `LC_DYSYMTAB` command. Only the ranges this crate actually
/// consumes are validated against the file up front; the unused counters
/// (`ntoc`, `nmodtab`, ...) are retained verbatim but not range-checked,
/// since nothing here ever dereferences them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DysymtabCommand {
    pub ilocalsym: u32,
    pub nlocalsym: u32,
    pub iextdefsym: u32,
    pub nextdefsym: u32,
    pub iundefsym: u32,
    pub nundefsym: u32,
    pub tocoff: u32,
    pub ntoc: u32,
    pub modtaboff: u32,
    pub nmodtab: u32,
    pub extrefsymoff: u32,
    pub nextrefsyms: u32,
    pub indirectsymoff: u32,
    pub nindirectsyms: u32,
    pub extreloff: u32,
    pub nextrel: u32,
    pub locreloff: u32,
    pub nlocrel: u32,
}

/// Parses the `dysymtab_command` body and validates that the indirect
/// symbol table and both relocation arrays fit within the file. `nsyms`
/// is the `symtab`'s symbol count, used to validate the local/extdef/undef
/// sub-ranges don't run past the end of the symbol table.
pub fn parse_dysymtab(buf: &[u8], lc: &LoadCommand, nsyms: u32) -> Option<DysymtabCommand> {
    if lc.body_size() < DYSYMTAB_BODY_SIZE {
        return None;
    }
    let guard = BoundsGuard::new(buf.len());
    let mut o = lc.body_offset();
    macro_rules! field {
        () => {{
            let v: u32 = buf.gread_with(&mut o, LE).ok()?;
            v
        }};
    }
    let ilocalsym = field!();
    let nlocalsym = field!();
    let iextdefsym = field!();
    let nextdefsym = field!();
    let iundefsym = field!();
    let nundefsym = field!();
    let tocoff = field!();
    let ntoc = field!();
    let modtaboff = field!();
    let nmodtab = field!();
    let extrefsymoff = field!();
    let nextrefsyms = field!();
    let indirectsymoff = field!();
    let nindirectsyms = field!();
    let extreloff = field!();
    let nextrel = field!();
    let locreloff = field!();
    let nlocrel = field!();

    if !guard.array_in_range(indirectsymoff as usize, nindirectsyms as usize, 4) {
        return None;
    }
    if !guard.array_in_range(extreloff as usize, nextrel as usize, crate::relocation::SIZE) {
        return None;
    }
    if !guard.array_in_range(locreloff as usize, nlocrel as usize, crate::relocation::SIZE) {
        return None;
    }
    for (start, count) in [(ilocalsym, nlocalsym), (iextdefsym, nextdefsym), (iundefsym, nundefsym)] {
        if start.checked_add(count).map_or(true, |end| end > nsyms) {
            return None;
        }
    }

    Some(DysymtabCommand {
        ilocalsym,
        nlocalsym,
        iextdefsym,
        nextdefsym,
        iundefsym,
        nundefsym,
        tocoff,
        ntoc,
        modtaboff,
        nmodtab,
        extrefsymoff,
        nextrefsyms,
        indirectsymoff,
        nindirectsyms,
        extreloff,
        nextrel,
        locreloff,
        nlocrel,
    })
}

/// A single `nlist_64` symbol-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nlist64 {
    pub n_strx: u32,
    pub n_type: u8,
    pub n_sect: u8,
    pub n_desc: u16,
    pub n_value: u64,
}

impl Nlist64 {
    pub fn type_bits(&self) -> u8 {
        self.n_type & n_type::N_TYPE
    }

    pub fn is_section(&self) -> bool {
        self.type_bits() == n_type::N_SECT
    }

    /// Defined: not undefined and not a common symbol. Common symbols are
    /// encoded as `N_UNDF` with a nonzero `n_value` (the alignment/size),
    /// so excluding `N_UNDF` entirely already excludes them.
    pub fn is_defined(&self) -> bool {
        self.type_bits() != n_type::N_UNDF
    }

    /// True for the common-symbol encoding: `N_UNDF`, external, nonzero
    /// `n_value`.
    pub fn is_common(&self) -> bool {
        self.type_bits() == n_type::N_UNDF && self.n_value != 0 && self.is_external()
    }

    pub fn is_external(&self) -> bool {
        self.n_type & n_type::N_EXT != 0
    }

    pub fn is_absolute(&self) -> bool {
        self.type_bits() == n_type::N_ABS
    }
}

/// Reads symbol `index` out of a validated symbol-table array.
pub fn symbol_at(buf: &[u8], symtab: &SymtabCommand, index: u32) -> Option<Nlist64> {
    if index >= symtab.nsyms {
        return None;
    }
    let base = (symtab.symoff as usize).checked_add((index as usize).checked_mul(NLIST64_SIZE)?)?;
    read_nlist(buf, base)
}

fn read_nlist(buf: &[u8], base: usize) -> Option<Nlist64> {
    let guard = BoundsGuard::new(buf.len());
    if !guard.in_range(base, NLIST64_SIZE) {
        return None;
    }
    let mut o = base;
    let n_strx: u32 = buf.gread_with(&mut o, LE).ok()?;
    let n_type: u8 = buf.gread_with(&mut o, LE).ok()?;
    let n_sect: u8 = buf.gread_with(&mut o, LE).ok()?;
    let n_desc: u16 = buf.gread_with(&mut o, LE).ok()?;
    let n_value: u64 = buf.gread_with(&mut o, LE).ok()?;
    debug_assert_eq!(o - base, NLIST64_SIZE);
    Some(Nlist64 {
        n_strx,
        n_type,
        n_sect,
        n_desc,
        n_value,
    })
}

/// Resolves `n_strx` against the string table, requiring a NUL terminator
/// within `[stroff, stroff + strsize)`.
pub fn resolve_name<'a>(buf: &'a [u8], symtab: &SymtabCommand, n_strx: u32) -> Option<&'a str> {
    if n_strx >= symtab.strsize {
        return None;
    }
    let start = (symtab.stroff as usize).checked_add(n_strx as usize)?;
    let table_end = (symtab.stroff as usize).checked_add(symtab.strsize as usize)?;
    if start > table_end || table_end > buf.len() {
        return None;
    }
    let slice = &buf[start..table_end];
    let nul = slice.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&slice[..nul]).ok()
}
