/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Rebasing a single symbol to a chosen link address.

use crate::symtab::Nlist64;

/// Rebases `symbol` in place to `link_address`.
///
/// Absolute symbols (`N_ABS`) are left unchanged — they don't describe an
/// address within the image, so there is nothing to rebase. Every other
/// symbol has `link_address` added to its `n_value`; on overflow `symbol`
/// is left untouched and `false` is returned.
pub fn relocate_symbol(link_address: u64, symbol: &mut Nlist64) -> bool {
    if symbol.is_absolute() {
        return true;
    }
    match symbol.n_value.checked_add(link_address) {
        Some(v) => {
            symbol.n_value = v;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod relocator_tests {
    use super::*;
    use crate::consts::n_type;

    fn symbol(n_type: u8, n_value: u64) -> Nlist64 {
        Nlist64 {
            n_strx: 0,
            n_type,
            n_sect: 1,
            n_desc: 0,
            n_value,
        }
    }

    #[test]
    fn absolute_symbol_is_unchanged() {
        let mut sym = symbol(n_type::N_ABS, 0x1234);
        assert!(relocate_symbol(0x9000_0000, &mut sym));
        assert_eq!(sym.n_value, 0x1234);
    }

    #[test]
    fn section_symbol_is_rebased() {
        let mut sym = symbol(n_type::N_SECT, 0x100);
        assert!(relocate_symbol(0x9000_0000, &mut sym));
        assert_eq!(sym.n_value, 0x9000_0100);
    }

    #[test]
    fn zero_link_address_is_a_no_op() {
        let mut sym = symbol(n_type::N_SECT, 0x100);
        assert!(relocate_symbol(0, &mut sym));
        assert_eq!(sym.n_value, 0x100);
    }

    #[test]
    fn overflow_leaves_symbol_untouched() {
        let mut sym = symbol(n_type::N_SECT, u64::MAX - 1);
        assert!(!relocate_symbol(2, &mut sym));
        assert_eq!(sym.n_value, u64::MAX - 1);
    }
}
