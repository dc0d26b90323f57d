// Wed Oct 21 2026 - Alex

use crate::scan::{Scan, ScanKind};
use regex::bytes::Regex;

/// Finds matches of one scan inside a block of target bytes.
pub(crate) enum Matcher<'s> {
    Aligned(&'s [u8]),
    Bytes(&'s [u8]),
    Regex(&'s Regex),
}

impl<'s> Matcher<'s> {
    pub(crate) fn new(scan: &'s Scan) -> Self {
        match (scan.kind(), scan.compiled_regex()) {
            (ScanKind::Regex, Some(regex)) => Matcher::Regex(regex),
            (ScanKind::Value, _) => Matcher::Aligned(scan.value_bytes()),
            _ => Matcher::Bytes(scan.value_bytes()),
        }
    }

    /// Calls `emit` with the absolute address of each match in `data`, which
    /// was read from `start`. Only matches starting before `limit` are
    /// reported; bytes past it exist so a match may run over the end of the
    /// block. Returns `true` as soon as `emit` does.
    pub(crate) fn find<F>(&self, start: u64, data: &[u8], limit: usize, mut emit: F) -> bool
    where
        F: FnMut(u64) -> bool,
    {
        match self {
            Matcher::Aligned(value) => {
                let n = value.len();
                let mut offset = (start.next_multiple_of(n as u64) - start) as usize;
                while offset < limit && offset + n <= data.len() {
                    if &data[offset..offset + n] == *value && emit(start + offset as u64) {
                        return true;
                    }
                    offset += n;
                }
                false
            }
            Matcher::Bytes(value) => data
                .windows(value.len())
                .enumerate()
                .take(limit)
                .filter(|(_, window)| window == value)
                .any(|(i, _)| emit(start + i as u64)),
            Matcher::Regex(regex) => regex
                .find_iter(data)
                .take_while(|m| m.start() < limit)
                .any(|m| emit(start + m.start() as u64)),
        }
    }
}
