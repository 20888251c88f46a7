/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Overflow-safe range checks against the file buffer.
//!
//! Every other module consults [`BoundsGuard`] before it reads a single
//! byte out of the input. The input is attacker-controlled: offsets and
//! counts come from the file itself, so `offset + length` must never be
//! computed with a plain `+` (it can wrap on a 32-bit-clean file with huge
//! fields). All checks here are written in subtraction form instead.

/// Computes whether `[base_offset, base_offset + length)` lies entirely
/// within a buffer of `file_size` bytes, without ever adding two
/// attacker-controlled values together.
#[derive(Debug, Clone, Copy)]
pub struct BoundsGuard {
    file_size: usize,
}

impl BoundsGuard {
    pub fn new(file_size: usize) -> Self {
        BoundsGuard { file_size }
    }

    pub fn file_size(&self) -> usize {
        self.file_size
    }

    /// `length <= file_size && base_offset <= file_size - length`.
    ///
    /// Written this way so that `base_offset + length` is never computed:
    /// if `length > file_size` the range cannot fit regardless of
    /// `base_offset`, and otherwise `file_size - length` cannot underflow.
    pub fn in_range(&self, base_offset: usize, length: usize) -> bool {
        length <= self.file_size && base_offset <= self.file_size - length
    }

    /// Like [`Self::in_range`] but takes `count * elem_size` as two factors
    /// so the multiplication itself is overflow-checked too (a large
    /// `nsyms` times `sizeof(Nlist64)` could otherwise overflow `usize` on
    /// its own before `in_range` ever sees it).
    pub fn array_in_range(&self, base_offset: usize, count: usize, elem_size: usize) -> bool {
        match count.checked_mul(elem_size) {
            Some(length) => self.in_range(base_offset, length),
            None => false,
        }
    }
}
