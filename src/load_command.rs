/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Typed traversal of the load-command list.
//!
//! Every load command starts with an 8-byte `(cmd, cmdsize)` head. This
//! module only reads that head; the command-specific body (a segment, a
//! symtab command, ...) is decoded by whichever module owns that command
//! kind. Unknown `cmd` values are skipped, never rejected — a newer Mach-O
//! producer may emit commands this crate doesn't know about, and that
//! alone doesn't make the file malformed.

use scroll::{Pread, LE};

use crate::bounds::BoundsGuard;
use crate::consts::LoadCommandKind;
use crate::header::MachHeader64;

/// Size of the `(cmd, cmdsize)` head shared by every load command.
pub const HEAD_SIZE: usize = 8;

/// One step of load-command traversal: the command's opcode, its total
/// size (head + body), and the file offset where it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadCommand {
    pub offset: usize,
    pub cmd: u32,
    pub cmdsize: u32,
}

impl LoadCommand {
    pub fn kind(&self) -> LoadCommandKind {
        LoadCommandKind::from(self.cmd)
    }

    /// File offset of the first byte after this command's head, i.e.
    /// where its body starts.
    pub fn body_offset(&self) -> usize {
        self.offset + HEAD_SIZE
    }

    /// Size of the body alone (`cmdsize` minus the 8-byte head). Saturates
    /// at 0 rather than underflowing; callers that reach this point have
    /// already had `cmdsize >= HEAD_SIZE` validated by [`read_head`].
    pub fn body_size(&self) -> usize {
        (self.cmdsize as usize).saturating_sub(HEAD_SIZE)
    }
}

/// Reads and validates the load-command head at `offset`, which must lie
/// within `[lc_start, lc_start + lc_len)`.
///
/// `cmdsize` must be at least [`HEAD_SIZE`], a multiple of 8, and must not
/// run past the end of the load-command region.
fn read_head(buf: &[u8], lc_start: usize, lc_len: usize, offset: usize) -> Option<LoadCommand> {
    let guard = BoundsGuard::new(buf.len());
    if offset < lc_start || offset >= lc_start + lc_len {
        return None;
    }
    if !guard.in_range(offset, HEAD_SIZE) {
        return None;
    }

    let mut o = offset;
    let cmd: u32 = buf.gread_with(&mut o, LE).ok()?;
    let cmdsize: u32 = buf.gread_with(&mut o, LE).ok()?;

    if cmdsize < HEAD_SIZE as u32 {
        return None;
    }
    if cmdsize % 8 != 0 {
        return None;
    }
    // The command, as a whole, must not run past the end of the
    // load-command region. Written without `offset + cmdsize` so it can't
    // overflow on a corrupt huge cmdsize.
    let remaining = (lc_start + lc_len) - offset;
    if cmdsize as usize > remaining {
        return None;
    }

    Some(LoadCommand {
        offset,
        cmd,
        cmdsize,
    })
}

/// Returns the first load command, or `None` if `header.ncmds == 0` or the
/// load-command region is empty.
pub fn first_lc(buf: &[u8], header: &MachHeader64) -> Option<LoadCommand> {
    if header.ncmds == 0 {
        return None;
    }
    let (lc_start, lc_len) = header.load_commands_range();
    read_head(buf, lc_start, lc_len, lc_start)
}

/// Returns the load command immediately following `prev`, or `None` if
/// `prev` was the last one in the region.
pub fn next_lc(buf: &[u8], header: &MachHeader64, prev: &LoadCommand) -> Option<LoadCommand> {
    let (lc_start, lc_len) = header.load_commands_range();
    let next_offset = prev.offset + prev.cmdsize as usize;
    read_head(buf, lc_start, lc_len, next_offset)
}

/// Iterator over every load command in the file, in on-disk order.
///
/// `buf` and `header` are allowed independent lifetimes so this can borrow a
/// header owned elsewhere (e.g. inline in a [`crate::Context`]) for a
/// shorter duration than the file buffer itself.
pub struct LoadCommandIter<'b, 'h> {
    buf: &'b [u8],
    header: &'h MachHeader64,
    current: Option<LoadCommand>,
    started: bool,
}

impl<'b, 'h> LoadCommandIter<'b, 'h> {
    pub fn new(buf: &'b [u8], header: &'h MachHeader64) -> Self {
        LoadCommandIter {
            buf,
            header,
            current: None,
            started: false,
        }
    }
}

impl Iterator for LoadCommandIter<'_, '_> {
    type Item = LoadCommand;

    fn next(&mut self) -> Option<LoadCommand> {
        let next = if !self.started {
            self.started = true;
            first_lc(self.buf, self.header)
        } else {
            self.current.as_ref().and_then(|c| next_lc(self.buf, self.header, c))
        };
        self.current = next;
        next
    }
}
