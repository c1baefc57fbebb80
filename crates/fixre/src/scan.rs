// Unanchored search on top of the anchored matcher
//
// The matcher only answers "does a match start exactly here". Searching means
// retrying at successive offsets; continuation bytes of multi-byte UTF-8
// sequences are skipped so a match never starts inside a character.

use crate::error::MatchResult;
use crate::matcher::{Capture, MatchOption, match_at_with};
use crate::program::Token;

/// Location of a match in the subject text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Match {
    pub start: usize,
    pub len: usize,
}

impl Match {
    #[inline(always)]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes<'t>(&self, text: &'t [u8]) -> &'t [u8] {
        text.get(self.start..self.end()).unwrap_or_default()
    }
}

#[inline(always)]
fn is_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}

/// Find the leftmost match starting at or after `from`.
///
/// Each offset is an independent, individually budgeted attempt. An exhausted
/// attempt aborts the search with `ResourceExhausted` instead of being taken
/// as "no match here".
pub fn find(
    program: &[Token],
    text: &[u8],
    from: usize,
    captures: &mut [Option<Capture>],
    options: &MatchOption,
) -> MatchResult<Option<Match>> {
    let mut si = from;
    while si <= text.len() {
        if si < text.len() && is_continuation(text[si]) {
            si += 1;
            continue;
        }
        if let Some(len) = match_at_with(program, text, si, captures, options)? {
            return Ok(Some(Match { start: si, len }));
        }
        si += 1;
    }
    Ok(None)
}

/// Iterator over successive non-overlapping matches.
///
/// After an empty match the search resumes one byte further; an empty match
/// right where a non-empty match ended is skipped.
pub struct Matches<'a> {
    program: &'a [Token],
    text: &'a [u8],
    options: MatchOption,
    pos: usize,
    last_end: Option<usize>,
    done: bool,
}

impl<'a> Matches<'a> {
    pub fn new(program: &'a [Token], text: &'a [u8], options: MatchOption) -> Self {
        Self {
            program,
            text,
            options,
            pos: 0,
            last_end: None,
            done: false,
        }
    }
}

impl Iterator for Matches<'_> {
    type Item = MatchResult<Match>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let found = match find(self.program, self.text, self.pos, &mut [], &self.options) {
                Ok(Some(found)) => found,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            if found.is_empty() {
                self.pos = found.start + 1;
                if self.last_end.take() == Some(found.start) {
                    continue;
                }
            } else {
                self.pos = found.end();
                self.last_end = Some(found.end());
            }
            return Some(Ok(found));
        }
        None
    }
}
