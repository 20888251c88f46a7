/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Recognition and synthesis of IOKit's C++ mangled-name conventions.
//!
//! IOKit identifies a class's runtime identity by three symbols derived
//! mechanically from the class name: a super-metaclass pointer (SMCP), a
//! metaclass pointer (MCP), and a VTable. All three follow the Itanium `_Z`
//! mangling scheme with a length-prefixed class name, so recognising one is
//! the same string-matching problem with different prefixes/suffixes.
//!
//! Decoders here borrow the class name straight out of the input string;
//! encoders write into a caller-supplied fixed buffer (no allocation),
//! mirroring the capacity-checked C API this module descends from.

/// Why a [`mod@self`] encoder failed. Decoders don't get an error type of
/// their own: a pattern mismatch and "I don't have an answer for you" are
/// the same thing to a caller, so they just return `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CxxNameError {
    /// `out` was too small to hold the encoded name plus its NUL terminator.
    BufferTooSmall,
    /// The input symbol name did not match the expected pattern.
    PatternMismatch,
}

const CXX_PREFIX: &str = "__Z";
const PURE_VIRTUAL: &str = "___cxx_pure_virtual";
const PADSLOT_PREFIX: &str = "__ZTv0_n";
const SMCP_PREFIX: &str = "__ZN";
const SMCP_SUFFIX: &str = "10superClassE";
const MCP_PREFIX: &str = "__ZN";
const MCP_SUFFIX: &str = "9MetaClassE";
const VTABLE_PREFIX: &str = "__ZTV";
const META_VTABLE_PREFIX: &str = "__ZTVN";
const META_VTABLE_SUFFIX: &str = "9MetaClassE";
const FINAL_SYMBOL_PREFIX: &str = "__ZN";
const FINAL_SYMBOL_SUFFIX: &str = "10gMetaClassE";

/// True iff `name` is any `_Z`-mangled C++ symbol.
pub fn is_symbol_name_cxx(name: &str) -> bool {
    name.starts_with(CXX_PREFIX)
}

/// True iff `name` is the synthetic pure-virtual-called-through landing pad.
pub fn is_symbol_name_pure_virtual(name: &str) -> bool {
    name == PURE_VIRTUAL
}

/// True iff `name` is an IOKit VTable padding slot (a virtual-thunk symbol
/// reserved for binary-compatible class evolution).
pub fn is_symbol_name_padslot(name: &str) -> bool {
    name.starts_with(PADSLOT_PREFIX)
}

/// Parses a leading decimal length with no leading zeros (so `"0..."` only
/// matches the literal length `0`), returning it plus the unconsumed tail.
fn parse_decimal_len(s: &str) -> Option<(usize, &str)> {
    let digit_count = s.bytes().take_while(u8::is_ascii_digit).count();
    if digit_count == 0 {
        return None;
    }
    let digits = &s[..digit_count];
    if digits.len() > 1 && digits.as_bytes()[0] == b'0' {
        return None;
    }
    let len: usize = digits.parse().ok()?;
    Some((len, &s[digit_count..]))
}

/// Matches `prefix <decimal-len> <len bytes of class name> suffix` exactly,
/// returning the borrowed class name.
fn decode_pattern<'a>(name: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?;
    let (len, rest) = parse_decimal_len(rest)?;
    if len == 0 || rest.len() < len {
        return None;
    }
    let (class_name, rest) = rest.split_at(len);
    if rest != suffix {
        return None;
    }
    Some(class_name)
}

/// Decodes a super-metaclass-pointer symbol name into its class name.
pub fn decode_smcp(name: &str) -> Option<&str> {
    decode_pattern(name, SMCP_PREFIX, SMCP_SUFFIX)
}

/// Decodes a metaclass-pointer symbol name into its class name.
pub fn decode_mcp(name: &str) -> Option<&str> {
    decode_pattern(name, MCP_PREFIX, MCP_SUFFIX)
}

/// Decodes a (non-meta) VTable symbol name into its class name. A name that
/// also matches the meta-VTable pattern is rejected here; use
/// [`decode_meta_vtable`] for that.
pub fn decode_vtable(name: &str) -> Option<&str> {
    if name.starts_with(META_VTABLE_PREFIX) {
        return None;
    }
    decode_pattern(name, VTABLE_PREFIX, "")
}

/// Decodes a meta-VTable symbol name into its class name.
pub fn decode_meta_vtable(name: &str) -> Option<&str> {
    decode_pattern(name, META_VTABLE_PREFIX, META_VTABLE_SUFFIX)
}

/// Decodes the `gMetaClass` final-symbol name into its class name.
pub fn decode_final_symbol(name: &str) -> Option<&str> {
    decode_pattern(name, FINAL_SYMBOL_PREFIX, FINAL_SYMBOL_SUFFIX)
}

/// Copies `decode_smcp(symbol)`'s class name into `out`, NUL-terminated.
/// Fails if the name doesn't match the SMCP pattern or `out` is too small.
pub fn get_class_name_from_smcp(symbol: &str, out: &mut [u8]) -> Result<usize, CxxNameError> {
    write_nul_terminated(decode_smcp(symbol).ok_or(CxxNameError::PatternMismatch)?, out)
}

/// Copies `decode_mcp(symbol)`'s class name into `out`, NUL-terminated.
pub fn get_class_name_from_mcp(symbol: &str, out: &mut [u8]) -> Result<usize, CxxNameError> {
    write_nul_terminated(decode_mcp(symbol).ok_or(CxxNameError::PatternMismatch)?, out)
}

fn write_nul_terminated(s: &str, out: &mut [u8]) -> Result<usize, CxxNameError> {
    if out.len() < s.len() + 1 {
        return Err(CxxNameError::BufferTooSmall);
    }
    out[..s.len()].copy_from_slice(s.as_bytes());
    out[s.len()] = 0;
    Ok(s.len())
}

fn write_str(out: &mut [u8], pos: &mut usize, s: &[u8]) -> Result<(), CxxNameError> {
    if out.len() - *pos < s.len() {
        return Err(CxxNameError::BufferTooSmall);
    }
    out[*pos..*pos + s.len()].copy_from_slice(s);
    *pos += s.len();
    Ok(())
}

/// Writes `n` as decimal ASCII digits, no leading zeros.
fn write_decimal(out: &mut [u8], pos: &mut usize, mut n: usize) -> Result<(), CxxNameError> {
    let mut digits = [0u8; 20];
    let mut i = digits.len();
    loop {
        i -= 1;
        digits[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    write_str(out, pos, &digits[i..])
}

/// Emits `"__ZN<len><class>"` (no trailing member), NUL-terminated. Returns
/// the length written, excluding the NUL.
pub fn get_function_prefix_from_class_name(class: &str, out: &mut [u8]) -> Result<usize, CxxNameError> {
    let mut pos = 0;
    write_str(out, &mut pos, SMCP_PREFIX.as_bytes())?;
    write_decimal(out, &mut pos, class.len())?;
    write_str(out, &mut pos, class.as_bytes())?;
    write_str(out, &mut pos, &[0])?;
    Ok(pos - 1)
}

/// Emits `"__ZN<len><class>9MetaClassE"`, NUL-terminated — the MCP name
/// derived from a class name. Not part of the source's public encoder set
/// (it only names the plain function prefix), but [`crate::Context`] needs
/// it to resolve an SMCP's metaclass symbol without allocating.
pub(crate) fn get_mcp_name_from_class_name(class: &str, out: &mut [u8]) -> Result<usize, CxxNameError> {
    let mut pos = 0;
    write_str(out, &mut pos, MCP_PREFIX.as_bytes())?;
    write_decimal(out, &mut pos, class.len())?;
    write_str(out, &mut pos, class.as_bytes())?;
    write_str(out, &mut pos, MCP_SUFFIX.as_bytes())?;
    write_str(out, &mut pos, &[0])?;
    Ok(pos - 1)
}

/// Emits `"__ZTV<len><class>"`, NUL-terminated.
pub fn get_vtable_name_from_class_name(class: &str, out: &mut [u8]) -> Result<usize, CxxNameError> {
    let mut pos = 0;
    write_str(out, &mut pos, VTABLE_PREFIX.as_bytes())?;
    write_decimal(out, &mut pos, class.len())?;
    write_str(out, &mut pos, class.as_bytes())?;
    write_str(out, &mut pos, &[0])?;
    Ok(pos - 1)
}

/// Emits `"__ZTVN<len><class>9MetaClassE"`, NUL-terminated.
pub fn get_meta_vtable_name_from_class_name(class: &str, out: &mut [u8]) -> Result<usize, CxxNameError> {
    let mut pos = 0;
    write_str(out, &mut pos, META_VTABLE_PREFIX.as_bytes())?;
    write_decimal(out, &mut pos, class.len())?;
    write_str(out, &mut pos, class.as_bytes())?;
    write_str(out, &mut pos, META_VTABLE_SUFFIX.as_bytes())?;
    write_str(out, &mut pos, &[0])?;
    Ok(pos - 1)
}

/// Emits `"__ZN<len><class>10gMetaClassE"`, NUL-terminated — the runtime
/// global that binds a class to its metaclass at load time.
pub fn get_final_symbol_name_from_class_name(class: &str, out: &mut [u8]) -> Result<usize, CxxNameError> {
    let mut pos = 0;
    write_str(out, &mut pos, FINAL_SYMBOL_PREFIX.as_bytes())?;
    write_decimal(out, &mut pos, class.len())?;
    write_str(out, &mut pos, class.as_bytes())?;
    write_str(out, &mut pos, FINAL_SYMBOL_SUFFIX.as_bytes())?;
    write_str(out, &mut pos, &[0])?;
    Ok(pos - 1)
}

/// Reads the little-endian 64-bit word at word-index `index` in `data`.
fn word_at(data: &[u8], index: usize) -> Option<u64> {
    let start = index.checked_mul(8)?;
    let bytes = data.get(start..start.checked_add(8)?)?;
    let mut word = [0u8; 8];
    word.copy_from_slice(bytes);
    Some(u64::from_le_bytes(word))
}

/// Counts the live entries in an Itanium-ABI vtable blob: the first two
/// words (offset-to-top, RTTI) are reserved and excluded, and the scan
/// stops at the first pair of adjacent zero words.
pub fn vtable_number_of_entries(vtable_data: &[u8]) -> usize {
    let mut count = 0;
    let mut i = 2;
    loop {
        let word = match word_at(vtable_data, i) {
            Some(w) => w,
            None => break,
        };
        if word == 0 && word_at(vtable_data, i + 1) == Some(0) {
            break;
        }
        count += 1;
        i += 1;
    }
    count
}

#[cfg(test)]
mod cxx_name_tests {
    use super::*;

    #[test]
    fn cxx_and_pure_virtual_and_padslot_predicates() {
        assert!(is_symbol_name_cxx("__ZN9IOService10superClassE"));
        assert!(!is_symbol_name_cxx("_hello"));
        assert!(is_symbol_name_pure_virtual("___cxx_pure_virtual"));
        assert!(!is_symbol_name_pure_virtual("___cxx_pure_virtualX"));
        assert!(is_symbol_name_padslot("__ZTv0_n12_NV9IOServiceFvv"));
        assert!(!is_symbol_name_padslot("__ZTV9IOService"));
    }

    #[test]
    fn smcp_round_trips() {
        assert_eq!(decode_smcp("__ZN9IOService10superClassE"), Some("IOService"));
        assert_eq!(decode_smcp("__ZN9IOService9MetaClassE"), None);

        let mut out = [0u8; 32];
        let n = get_class_name_from_smcp("__ZN9IOService10superClassE", &mut out).unwrap();
        assert_eq!(&out[..n], b"IOService");

        let mut tiny = [0u8; 5];
        assert_eq!(
            get_class_name_from_smcp("__ZN9IOService10superClassE", &mut tiny),
            Err(CxxNameError::BufferTooSmall)
        );
    }

    #[test]
    fn mcp_round_trips() {
        assert_eq!(decode_mcp("__ZN9IOService9MetaClassE"), Some("IOService"));
        let mut out = [0u8; 32];
        let n = get_class_name_from_mcp("__ZN9IOService9MetaClassE", &mut out).unwrap();
        assert_eq!(&out[..n], b"IOService");
    }

    #[test]
    fn vtable_vs_meta_vtable() {
        assert_eq!(decode_vtable("__ZTV9IOService"), Some("IOService"));
        assert_eq!(decode_vtable("__ZTVN8OSObject9MetaClassE"), None);
        assert_eq!(decode_meta_vtable("__ZTVN8OSObject9MetaClassE"), Some("OSObject"));
    }

    #[test]
    fn meta_vtable_encode() {
        let mut out = [0u8; 32];
        let n = get_meta_vtable_name_from_class_name("OSObject", &mut out).unwrap();
        assert_eq!(&out[..n], b"__ZTVN8OSObject9MetaClassE");
    }

    #[test]
    fn final_symbol_round_trips() {
        let mut out = [0u8; 32];
        let n = get_final_symbol_name_from_class_name("IOService", &mut out).unwrap();
        assert_eq!(&out[..n], b"__ZN9IOService10gMetaClassE");
        assert_eq!(decode_final_symbol(core::str::from_utf8(&out[..n]).unwrap()), Some("IOService"));
    }

    #[test]
    fn no_leading_zero_in_length() {
        assert_eq!(decode_smcp("__ZN09IOService10superClassE"), None);
    }

    #[test]
    fn vtable_entry_count() {
        // 7 words: reserved(0), reserved(0), 0xA, 0xB, 0xC, 0, 0
        let mut buf = Vec::new();
        for w in [0u64, 0, 0xA, 0xB, 0xC, 0, 0] {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        assert_eq!(vtable_number_of_entries(&buf), 3);
    }

    #[test]
    fn vtable_entry_count_empty() {
        let buf = vec![0u8; 16];
        assert_eq!(vtable_number_of_entries(&buf), 0);
    }
}

#[cfg(test)]
mod cxx_name_proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Round-trip through the SMCP/MCP/VTable/Meta-VTable/Final-symbol
        /// encoders and decoders for any ASCII class name.
        #[test]
        fn smcp_round_trip(class in "[A-Za-z_][A-Za-z0-9_]{0,40}") {
            let mut buf = [0u8; 256];
            let n = get_function_prefix_from_class_name(&class, &mut buf).unwrap();
            let mut full = [0u8; 256];
            let mut pos = n;
            full[..n].copy_from_slice(&buf[..n]);
            write_str(&mut full, &mut pos, SMCP_SUFFIX.as_bytes()).unwrap();
            write_str(&mut full, &mut pos, &[0]).unwrap();
            let name = core::str::from_utf8(&full[..pos - 1]).unwrap();
            prop_assert_eq!(decode_smcp(name), Some(class.as_str()));
        }

        #[test]
        fn mcp_round_trip(class in "[A-Za-z_][A-Za-z0-9_]{0,40}") {
            let mut buf = [0u8; 256];
            let n = get_mcp_name_from_class_name(&class, &mut buf).unwrap();
            let name = core::str::from_utf8(&buf[..n]).unwrap();
            prop_assert_eq!(decode_mcp(name), Some(class.as_str()));
        }

        #[test]
        fn vtable_round_trip(class in "[A-Za-z_][A-Za-z0-9_]{0,40}") {
            let mut buf = [0u8; 256];
            let n = get_vtable_name_from_class_name(&class, &mut buf).unwrap();
            let name = core::str::from_utf8(&buf[..n]).unwrap();
            prop_assert_eq!(decode_vtable(name), Some(class.as_str()));
            // A plain vtable name must never be mistaken for a meta vtable.
            prop_assert_eq!(decode_meta_vtable(name), None);
        }

        #[test]
        fn meta_vtable_round_trip(class in "[A-Za-z_][A-Za-z0-9_]{0,40}") {
            let mut buf = [0u8; 256];
            let n = get_meta_vtable_name_from_class_name(&class, &mut buf).unwrap();
            let name = core::str::from_utf8(&buf[..n]).unwrap();
            prop_assert_eq!(decode_meta_vtable(name), Some(class.as_str()));
            // A meta vtable name must never be mistaken for a plain vtable.
            prop_assert_eq!(decode_vtable(name), None);
        }

        #[test]
        fn final_symbol_round_trip(class in "[A-Za-z_][A-Za-z0-9_]{0,40}") {
            let mut buf = [0u8; 256];
            let n = get_final_symbol_name_from_class_name(&class, &mut buf).unwrap();
            let name = core::str::from_utf8(&buf[..n]).unwrap();
            prop_assert_eq!(decode_final_symbol(name), Some(class.as_str()));
        }

        #[test]
        fn is_symbol_name_cxx_matches_prefix(name in ".*") {
            prop_assert_eq!(is_symbol_name_cxx(&name), name.starts_with("__Z"));
        }
    }
}
