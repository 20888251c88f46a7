/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! `Context`: the single entry point that binds every other module to one
//! file buffer and caches the tables that cost a load-command walk to find.
//!
//! The source this crate is modelled on caches raw pointers into the file
//! for its SYMTAB/DYSYMTAB commands, its symbol array, its string table, and
//! so on. Here the load-command walk to find SYMTAB/DYSYMTAB is genuinely
//! the expensive, worth-memoizing part; the "symbol array" and "string
//! table" themselves are never materialised as separate references because
//! [`crate::symtab`] already validates their ranges as part of parsing the
//! command and computes individual elements on demand (`symbol_at`,
//! `resolve_name`) — caching the command is equivalent to caching the
//! tables it describes.
//!
//! Every field is a write-once `Option<Option<T>>`: the outer `Option`
//! tracks "have we looked this up yet", the inner one "did we find it".

use crate::consts::LoadCommandKind;
use crate::cxx_name;
use crate::header::MachHeader64;
use crate::load_command::LoadCommandIter;
use crate::relocation::{self, RelocationInfo};
use crate::segment::{self, Section64, SegmentCommand64};
use crate::symtab::{self, DysymtabCommand, Nlist64, SymtabCommand};

/// A validated Mach-O 64 image plus its lazily-resolved table caches.
///
/// Borrows `buf` for its entire lifetime `'a`; every reference this type
/// hands back (segments, sections, symbol names, relocations) also borrows
/// `'a`, never copying out of the file.
pub struct Context<'a> {
    buf: &'a [u8],
    header: MachHeader64,
    symtab_cmd: Option<Option<SymtabCommand>>,
    dysymtab_cmd: Option<Option<DysymtabCommand>>,
    uuid: Option<Option<[u8; 16]>>,
}

impl<'a> Context<'a> {
    /// Opaque size of a `Context`, for callers that want to size their own
    /// storage the way the source's `context_size()` does. Since Rust has
    /// no FFI boundary here this is informational only — ordinary owned
    /// values need no pre-sized buffer.
    pub const SIZE: usize = core::mem::size_of::<Context<'static>>();

    /// Validates `buf`'s Mach-O 64 header and returns a fresh `Context`
    /// with every lazy cache empty. Equivalent to the source's
    /// `initialize`.
    pub fn initialize(buf: &'a [u8]) -> Option<Context<'a>> {
        let header = MachHeader64::parse(buf)?;
        Some(Context {
            buf,
            header,
            symtab_cmd: None,
            dysymtab_cmd: None,
            uuid: None,
        })
    }

    // ---- 4.9 accessors -------------------------------------------------

    pub fn get_mach_header(&self) -> &MachHeader64 {
        &self.header
    }

    pub fn get_file_size(&self) -> usize {
        self.buf.len()
    }

    /// First `LC_UUID` command's payload, if any.
    pub fn get_uuid(&mut self) -> Option<[u8; 16]> {
        if let Some(cached) = self.uuid {
            return cached;
        }
        let found = self.load_commands().find_map(|lc| {
            if lc.kind() != LoadCommandKind::Uuid || lc.body_size() < 16 {
                return None;
            }
            let mut out = [0u8; 16];
            out.copy_from_slice(self.buf.get(lc.body_offset()..lc.body_offset() + 16)?);
            Some(out)
        });
        self.uuid = Some(found);
        found
    }

    /// Maximum of `vmaddr + vmsize` across every segment, saturating at
    /// `u64::MAX`; 0 if there are no segments.
    pub fn get_last_address(&self) -> u64 {
        self.segments()
            .filter_map(|seg| seg.vmaddr.checked_add(seg.vmsize))
            .max()
            .unwrap_or(0)
    }

    fn load_commands(&self) -> LoadCommandIter<'a, '_> {
        LoadCommandIter::new(self.buf, &self.header)
    }

    // ---- 4.4 SegmentIndex -----------------------------------------------

    /// Every `LC_SEGMENT_64` in the file, in load-command order.
    pub fn segments(&self) -> impl Iterator<Item = SegmentCommand64> + '_ {
        self.load_commands()
            .filter(|lc| lc.kind() == LoadCommandKind::Segment64)
            .filter_map(|lc| segment::parse_segment(self.buf, &lc))
    }

    pub fn get_segment_by_name(&self, name: &[u8]) -> Option<SegmentCommand64> {
        self.segments().find(|seg| seg.name_matches(name))
    }

    /// Every section trailing `segment`, in on-disk order.
    pub fn sections<'s>(&'s self, segment: &'s SegmentCommand64) -> impl Iterator<Item = Section64> + 's {
        (0..segment.nsects).filter_map(move |i| segment::section_at(self.buf, segment, i))
    }

    pub fn get_section_by_name(&self, segment: &SegmentCommand64, name: &[u8]) -> Option<Section64> {
        self.sections(segment).find(|sec| sec.name_matches(name))
    }

    pub fn get_segment_section_by_name(&self, seg_name: &[u8], sec_name: &[u8]) -> Option<Section64> {
        let seg = self.get_segment_by_name(seg_name)?;
        self.get_section_by_name(&seg, sec_name)
    }

    /// 1-based global section index across every segment, in load-command
    /// order (segment order, then section order within a segment).
    /// `index == 0` and an index beyond the total section count both
    /// return `None`.
    pub fn get_section_by_index(&self, index: u32) -> Option<Section64> {
        if index == 0 {
            return None;
        }
        let mut remaining = index;
        for seg in self.segments() {
            for sec in self.sections(&seg) {
                remaining -= 1;
                if remaining == 0 {
                    return Some(sec);
                }
            }
        }
        None
    }

    /// First section (in load-command order) whose `[addr, addr+size)`
    /// contains `addr`.
    pub fn get_section_by_address(&self, addr: u64) -> Option<Section64> {
        self.segments()
            .find_map(|seg| self.sections(&seg).find(|sec| sec.contains_address(addr)))
    }

    // ---- 4.2/4.5 SymbolTable --------------------------------------------

    fn resolve_symtab(&mut self) -> Option<SymtabCommand> {
        if let Some(cached) = self.symtab_cmd {
            return cached;
        }
        let found = self
            .load_commands()
            .find(|lc| lc.kind() == LoadCommandKind::Symtab)
            .and_then(|lc| symtab::parse_symtab(self.buf, &lc));
        self.symtab_cmd = Some(found);
        found
    }

    fn resolve_dysymtab(&mut self) -> Option<DysymtabCommand> {
        if let Some(cached) = self.dysymtab_cmd {
            return cached;
        }
        let nsyms = self.resolve_symtab().map(|s| s.nsyms).unwrap_or(0);
        let found = self
            .load_commands()
            .find(|lc| lc.kind() == LoadCommandKind::Dysymtab)
            .and_then(|lc| symtab::parse_dysymtab(self.buf, &lc, nsyms));
        self.dysymtab_cmd = Some(found);
        found
    }

    pub fn get_symbol_by_index(&mut self, index: u32) -> Option<Nlist64> {
        let symtab = self.resolve_symtab()?;
        symtab::symbol_at(self.buf, &symtab, index)
    }

    pub fn get_symbol_name(&mut self, sym_strx: u32) -> Option<&'a str> {
        let symtab = self.resolve_symtab()?;
        symtab::resolve_name(self.buf, &symtab, sym_strx)
    }

    /// Resolves the name of an indirect-symbol-table entry: looks up
    /// `indirect_symbol_table[index]` (a symbol-table index), then that
    /// symbol's name.
    pub fn get_indirect_symbol_name(&mut self, index: u32) -> Option<&'a str> {
        let dysymtab = self.resolve_dysymtab()?;
        if index >= dysymtab.nindirectsyms {
            return None;
        }
        let entry_off = (dysymtab.indirectsymoff as usize).checked_add((index as usize).checked_mul(4)?)?;
        let bytes = self.buf.get(entry_off..entry_off.checked_add(4)?)?;
        let sym_index = u32::from_le_bytes(bytes.try_into().ok()?);
        let sym = self.get_symbol_by_index(sym_index)?;
        self.get_symbol_name(sym.n_strx)
    }

    pub fn symbol_is_section(&self, sym: &Nlist64) -> bool {
        sym.is_section()
    }

    pub fn symbol_is_defined(&self, sym: &Nlist64) -> bool {
        sym.is_defined()
    }

    /// Defined, and not in the dysymtab's undefined-symbol range. Falls
    /// back to "defined and has an in-range section index" when there is
    /// no DYSYMTAB, per this crate's resolution of Open Question 2.
    pub fn symbol_is_local_defined(&mut self, index: u32, sym: &Nlist64) -> bool {
        if !sym.is_defined() {
            return false;
        }
        match self.resolve_dysymtab() {
            Some(dysymtab) => index < dysymtab.iundefsym || index >= dysymtab.iundefsym + dysymtab.nundefsym,
            None => sym.n_sect != 0,
        }
    }

    /// Linear scan for the first locally-defined symbol named `name`, in
    /// symbol-table order.
    pub fn get_local_defined_symbol_by_name(&mut self, name: &str) -> Option<Nlist64> {
        let symtab = self.resolve_symtab()?;
        for index in 0..symtab.nsyms {
            let sym = symtab::symbol_at(self.buf, &symtab, index)?;
            if !self.symbol_is_local_defined(index, &sym) {
                continue;
            }
            if symtab::resolve_name(self.buf, &symtab, sym.n_strx) == Some(name) {
                return Some(sym);
            }
        }
        None
    }

    /// True iff `sym` is absolute, or its value lies within some segment's
    /// `[vmaddr, vmaddr+vmsize)`.
    pub fn is_symbol_value_sane(&self, sym: &Nlist64) -> bool {
        if sym.is_absolute() {
            return true;
        }
        self.segments().any(|seg| seg.contains_address(sym.n_value))
    }

    // ---- 4.6 RelocationIndex --------------------------------------------

    /// Scans the extern relocation array for an entry with `r_extern` set
    /// and `r_address == address`.
    ///
    /// Returns `(true, Some(symbol))` when a matching entry points at a
    /// valid symbol index, `(true, None)` when a matching entry's
    /// `r_symbolnum` is out of range (entry found, symbol invalid — see
    /// this crate's resolution of Open Question 1), and `(false, None)`
    /// when no entry matches at all.
    pub fn get_symbol_by_extern_relocation_offset(&mut self, address: i32) -> (bool, Option<Nlist64>) {
        let dysymtab = match self.resolve_dysymtab() {
            Some(d) => d,
            None => return (false, None),
        };
        for i in 0..dysymtab.nextrel {
            let reloc = match relocation::relocation_at(self.buf, dysymtab.extreloff as usize, i) {
                Some(r) => r,
                None => return (false, None),
            };
            if reloc.r_extern && reloc.r_address == address {
                return (true, self.get_symbol_by_index(reloc.r_symbolnum));
            }
        }
        (false, None)
    }

    /// Reads local relocation array entry `index`.
    pub fn get_local_relocation(&mut self, index: u32) -> Option<RelocationInfo> {
        let dysymtab = self.resolve_dysymtab()?;
        if index >= dysymtab.nlocrel {
            return None;
        }
        relocation::relocation_at(self.buf, dysymtab.locreloff as usize, index)
    }

    /// Reads extern relocation array entry `index`.
    pub fn get_extern_relocation(&mut self, index: u32) -> Option<RelocationInfo> {
        let dysymtab = self.resolve_dysymtab()?;
        if index >= dysymtab.nextrel {
            return None;
        }
        relocation::relocation_at(self.buf, dysymtab.extreloff as usize, index)
    }

    // ---- 4.7 CxxNameDecoder, Context-aware wrappers ---------------------

    /// True iff `sym` is defined and its name matches the SMCP pattern.
    pub fn symbol_is_smcp(&mut self, sym: &Nlist64) -> bool {
        sym.is_defined() && self.get_symbol_name(sym.n_strx).is_some_and(|n| cxx_name::decode_smcp(n).is_some())
    }

    /// True iff `sym` is defined and its name matches the MCP pattern.
    pub fn symbol_is_mcp(&mut self, sym: &Nlist64) -> bool {
        sym.is_defined() && self.get_symbol_name(sym.n_strx).is_some_and(|n| cxx_name::decode_mcp(n).is_some())
    }

    /// True iff `sym` is defined and its name starts with `"__ZTV"`.
    pub fn symbol_is_vtable(&mut self, sym: &Nlist64) -> bool {
        sym.is_defined()
            && self
                .get_symbol_name(sym.n_strx)
                .is_some_and(|n| n.starts_with("__ZTV"))
    }

    /// Derives `smcp`'s class name and looks up the corresponding MCP
    /// symbol by name. Synthesises the MCP name on the stack; nothing here
    /// allocates.
    pub fn get_metaclass_symbol_from_smcp(&mut self, smcp: &Nlist64) -> Option<Nlist64> {
        let name = self.get_symbol_name(smcp.n_strx)?;
        let class_name = cxx_name::decode_smcp(name)?;
        let mut buf = [0u8; 256];
        let len = cxx_name::get_mcp_name_from_class_name(class_name, &mut buf).ok()?;
        let mcp_name = core::str::from_utf8(&buf[..len]).ok()?;
        self.get_local_defined_symbol_by_name(mcp_name)
    }

    /// Derives `smcp`'s class name `C`, then looks up both
    /// `vtable_name_from(C)` and `meta_vtable_name_from(C)`. Both must
    /// resolve for this to succeed.
    pub fn get_vtable_symbols_from_smcp(&mut self, smcp: &Nlist64) -> Option<(Nlist64, Nlist64)> {
        let name = self.get_symbol_name(smcp.n_strx)?;
        let class_name = cxx_name::decode_smcp(name)?;

        let mut vtable_buf = [0u8; 256];
        let vtable_len = cxx_name::get_vtable_name_from_class_name(class_name, &mut vtable_buf).ok()?;
        let vtable_name = core::str::from_utf8(&vtable_buf[..vtable_len]).ok()?;
        let vtable_sym = self.get_local_defined_symbol_by_name(vtable_name)?;

        let mut meta_buf = [0u8; 256];
        let meta_len = cxx_name::get_meta_vtable_name_from_class_name(class_name, &mut meta_buf).ok()?;
        let meta_name = core::str::from_utf8(&meta_buf[..meta_len]).ok()?;
        let meta_sym = self.get_local_defined_symbol_by_name(meta_name)?;

        Some((vtable_sym, meta_sym))
    }
}
