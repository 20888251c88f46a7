/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Bounds-checked Mach-O 64 parsing and IOKit C++ symbol analysis.
//!
//! This crate is meant to live inside a larger firmware/bootloader host that
//! prelinks Apple kernel extensions (kexts). It owns none of the surrounding
//! policy: no file I/O, no memory allocation, no logging, and no application
//! of relocations into a kernel image. What it owns is the hard, exacting
//! part of the problem:
//!
//! - Treating the input buffer as hostile: every offset, count, and string
//!   reference is validated against the buffer's length before anything is
//!   dereferenced. See [`bounds`] and [`header`].
//! - Traversing load commands, segments, sections, the symbol table, the
//!   dynamic symbol table, and the relocation tables without copying any of
//!   it: every value handed back to the caller borrows from the input
//!   buffer. See [`load_command`], [`segment`], [`symtab`], [`relocation`].
//! - Recognising and synthesising the IOKit C++ ABI name conventions
//!   (super-metaclass pointers, metaclass pointers, VTables) used to
//!   reconstruct class hierarchy information from symbol names alone. See
//!   [`cxx_name`].
//! - Rebasing a single symbol's value to a chosen link address. See
//!   [`relocator`].
//!
//! All of this is x86_64, little-endian, 64-bit Mach-O only. 32-bit Mach-O,
//! fat binaries, dyld info blobs, code signatures, and encryption directives
//! are out of scope; see the crate's design notes for the reasoning.
//!
//! Every fallible operation here is *total*: it returns `None`/`false`, never
//! panics on attacker-controlled input, and never leaves a caller-visible
//! partial effect. There is deliberately no error enum distinguishing
//! "malformed file" from "not found" — by design, a caller cannot use either
//! result, so the crate doesn't pretend the distinction matters.

mod bounds;
mod consts;
mod cxx_name;
mod header;
mod load_command;
mod relocation;
mod relocator;
mod segment;
mod symtab;

mod context;

pub use bounds::BoundsGuard;
pub use consts::{
    n_type, CpuType, LoadCommandKind, NType, RelocType, SectionFlags, VmProt, MH_MAGIC_64,
};
pub use context::Context;
pub use cxx_name::{
    decode_final_symbol, decode_mcp, decode_meta_vtable, decode_smcp, decode_vtable,
    get_class_name_from_mcp, get_class_name_from_smcp, get_final_symbol_name_from_class_name,
    get_function_prefix_from_class_name, get_meta_vtable_name_from_class_name,
    get_vtable_name_from_class_name, is_symbol_name_cxx, is_symbol_name_padslot,
    is_symbol_name_pure_virtual, vtable_number_of_entries, CxxNameError,
};
pub use header::MachHeader64;
pub use load_command::{first_lc, next_lc, LoadCommand, LoadCommandIter};
pub use relocation::{
    is_relocation_pair_type, preserve_relocation, relocation_at, relocation_is_pair,
    RelocationInfo, SIZE as RELOCATION_INFO_SIZE,
};
pub use relocator::relocate_symbol;
pub use segment::{parse_segment, section_at, Section64, SegmentCommand64};
pub use symtab::{parse_dysymtab, parse_symtab, resolve_name, symbol_at, DysymtabCommand, Nlist64, SymtabCommand};
