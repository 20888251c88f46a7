/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! End-to-end scenarios over hand-built Mach-O 64 byte buffers. No external
//! toolchain is involved — every input here is assembled byte-by-byte in
//! Rust, the way a parser's own test suite constructs its fixtures.

use machcore::{
    get_class_name_from_smcp, get_meta_vtable_name_from_class_name, is_relocation_pair_type,
    preserve_relocation, relocation_is_pair, vtable_number_of_entries, Context,
};

fn name16(name: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

/// One `__TEXT` segment (vmaddr=0x1000, vmsize=0x1000) with one zerofill
/// `__text` section (addr=0x1100, size=0x10), plus an `LC_SYMTAB` listing a
/// single defined symbol `"_hello"` at n_value=0x1100.
fn build_happy_path_file() -> Vec<u8> {
    let mut buf = Vec::new();
    let strtab: &[u8] = b"\0_hello\0";
    let seg_cmdsize = 72u32 + 80u32;
    let symtab_cmdsize = 8u32 + 16u32;
    let sizeofcmds = seg_cmdsize + symtab_cmdsize;

    buf.extend_from_slice(&0xfeed_facfu32.to_le_bytes());
    buf.extend_from_slice(&(7u32 | 0x0100_0000u32).to_le_bytes());
    buf.extend_from_slice(&3u32.to_le_bytes());
    buf.extend_from_slice(&2u32.to_le_bytes());
    buf.extend_from_slice(&2u32.to_le_bytes());
    buf.extend_from_slice(&sizeofcmds.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());

    buf.extend_from_slice(&0x19u32.to_le_bytes());
    buf.extend_from_slice(&seg_cmdsize.to_le_bytes());
    buf.extend_from_slice(&name16("__TEXT"));
    buf.extend_from_slice(&0x1000u64.to_le_bytes());
    buf.extend_from_slice(&0x1000u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&7u32.to_le_bytes());
    buf.extend_from_slice(&5u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&name16("__text"));
    buf.extend_from_slice(&name16("__TEXT"));
    buf.extend_from_slice(&0x1100u64.to_le_bytes());
    buf.extend_from_slice(&0x10u64.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0x1u32.to_le_bytes()); // S_ZEROFILL
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());

    let symoff = buf.len() + 8 + 16;
    let stroff = symoff + 16;

    buf.extend_from_slice(&0x2u32.to_le_bytes());
    buf.extend_from_slice(&symtab_cmdsize.to_le_bytes());
    buf.extend_from_slice(&(symoff as u32).to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&(stroff as u32).to_le_bytes());
    buf.extend_from_slice(&(strtab.len() as u32).to_le_bytes());

    assert_eq!(buf.len(), symoff);
    buf.extend_from_slice(&1u32.to_le_bytes()); // n_strx
    buf.push(0xe | 0x01); // N_SECT | N_EXT
    buf.push(1); // n_sect
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&0x1100u64.to_le_bytes());

    assert_eq!(buf.len(), stroff);
    buf.extend_from_slice(strtab);

    buf
}

#[test]
fn s1_happy_path() {
    let buf = build_happy_path_file();
    let mut ctx = Context::initialize(&buf).expect("valid Mach-O");

    let segment = ctx.get_segment_by_name(b"__TEXT").expect("__TEXT present");
    assert_eq!(segment.vmaddr, 0x1000);

    let section = ctx.get_section_by_address(0x1100).expect("__text present");
    assert!(section.name_matches(b"__text"));

    let symbol = ctx
        .get_local_defined_symbol_by_name("_hello")
        .expect("_hello present");
    assert_eq!(symbol.n_value, 0x1100);
    assert!(ctx.is_symbol_value_sane(&symbol));
    assert_eq!(ctx.get_last_address(), 0x2000);
}

#[test]
fn s2_smcp_decode() {
    let mut out = [0u8; 32];
    let n = get_class_name_from_smcp("__ZN9IOService10superClassE", &mut out).expect("matches SMCP pattern");
    assert_eq!(&out[..n], b"IOService");

    let mut tiny = [0u8; 5];
    assert!(get_class_name_from_smcp("__ZN9IOService10superClassE", &mut tiny).is_err());
}

#[test]
fn s3_meta_vtable_encode() {
    let mut out = [0u8; 32];
    let n = get_meta_vtable_name_from_class_name("OSObject", &mut out).expect("encodes");
    assert_eq!(n, 26);
    assert_eq!(&out[..n], b"__ZTVN8OSObject9MetaClassE");
}

#[test]
fn s4_vtable_entry_count() {
    let mut buf = Vec::new();
    for word in [0u64, 0, 0xA, 0xB, 0xC, 0, 0] {
        buf.extend_from_slice(&word.to_le_bytes());
    }
    assert_eq!(vtable_number_of_entries(&buf), 3);
}

#[test]
fn s5_bounds_rejection_leaves_header_accessors_working() {
    let mut buf = Vec::new();
    let symtab_cmdsize = 8u32 + 16u32;
    buf.extend_from_slice(&0xfeed_facfu32.to_le_bytes());
    buf.extend_from_slice(&(7u32 | 0x0100_0000u32).to_le_bytes());
    buf.extend_from_slice(&3u32.to_le_bytes());
    buf.extend_from_slice(&2u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&symtab_cmdsize.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());

    buf.extend_from_slice(&0x2u32.to_le_bytes());
    buf.extend_from_slice(&symtab_cmdsize.to_le_bytes());
    buf.extend_from_slice(&0xffff_ff00u32.to_le_bytes()); // symoff hugely out of range
    buf.extend_from_slice(&1000u32.to_le_bytes()); // nsyms
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());

    let mut ctx = Context::initialize(&buf).expect("header alone is valid");
    assert_eq!(ctx.get_file_size(), buf.len());
    assert!(ctx.get_mach_header().magic == 0xfeed_facf);
    assert!(ctx.get_symbol_by_index(0).is_none());
    assert!(ctx.get_local_defined_symbol_by_name("_anything").is_none());
}

#[test]
fn s6_relocation_pair_predicates() {
    const X86_64_RELOC_SUBTRACTOR: u8 = 5;
    const X86_64_RELOC_UNSIGNED: u8 = 0;
    const X86_64_RELOC_BRANCH: u8 = 2;
    const X86_64_RELOC_GOT: u8 = 4;

    assert!(relocation_is_pair(X86_64_RELOC_SUBTRACTOR));
    assert!(is_relocation_pair_type(X86_64_RELOC_UNSIGNED));
    assert!(preserve_relocation(X86_64_RELOC_BRANCH));

    assert!(!relocation_is_pair(X86_64_RELOC_GOT));
    assert!(!is_relocation_pair_type(X86_64_RELOC_GOT));
    assert!(!preserve_relocation(X86_64_RELOC_GOT));
}

#[test]
fn initialize_rejects_short_buffer() {
    assert!(Context::initialize(&[0u8; 4]).is_none());
}

#[test]
fn initialize_rejects_wrong_magic() {
    let buf = vec![0u8; 32];
    assert!(Context::initialize(&buf).is_none());
}
