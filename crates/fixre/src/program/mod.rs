// Compiled token programs
mod charset;
mod token;

use std::fmt;

pub use charset::Charset;
pub use token::{GroupKind, Mode, Token, TokenKind};

use crate::compiler::{CompileFlags, compile};
use crate::error::{CompileError, MatchResult};
use crate::limits::DEFAULT_PROGRAM_CAPACITY;
use crate::matcher::{Capture, MatchOption, match_at_with};
use crate::scan::{self, Match, Matches};

/// Number of capture groups in a token program.
pub fn capture_count(program: &[Token]) -> usize {
    program
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::Open(GroupKind::Capture(_))))
        .count()
}

/// An owned program with room for `N` tokens and an explicit length.
///
/// Immutable once compiled; matching only borrows it, so one instance can
/// serve any number of threads.
#[derive(Clone)]
pub struct Program<const N: usize = DEFAULT_PROGRAM_CAPACITY> {
    tokens: [Token; N],
    len: usize,
}

impl<const N: usize> Program<N> {
    pub fn compile(pattern: impl AsRef<[u8]>, flags: CompileFlags) -> Result<Self, CompileError> {
        let mut tokens = [Token::HALT; N];
        let len = compile(pattern.as_ref(), &mut tokens, flags)?;
        Ok(Self { tokens, len })
    }

    #[inline(always)]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens[..self.len]
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn capture_count(&self) -> usize {
        capture_count(self.tokens())
    }

    /// Anchored match at `start` with default budgets.
    pub fn match_at(
        &self,
        text: &[u8],
        start: usize,
        captures: &mut [Option<Capture>],
    ) -> MatchResult<Option<usize>> {
        match_at_with(self.tokens(), text, start, captures, &MatchOption::default())
    }

    pub fn match_at_with(
        &self,
        text: &[u8],
        start: usize,
        captures: &mut [Option<Capture>],
        options: &MatchOption,
    ) -> MatchResult<Option<usize>> {
        match_at_with(self.tokens(), text, start, captures, options)
    }

    /// Leftmost match at or after `from` with default budgets.
    pub fn find(
        &self,
        text: &[u8],
        from: usize,
        captures: &mut [Option<Capture>],
    ) -> MatchResult<Option<Match>> {
        scan::find(self.tokens(), text, from, captures, &MatchOption::default())
    }

    pub fn find_iter<'t>(&'t self, text: &'t [u8], options: MatchOption) -> Matches<'t> {
        Matches::new(self.tokens(), text, options)
    }
}

impl<const N: usize> PartialEq for Program<N> {
    fn eq(&self, other: &Self) -> bool {
        self.tokens() == other.tokens()
    }
}

impl<const N: usize> Eq for Program<N> {}

impl<const N: usize> fmt::Debug for Program<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tokens()).finish()
    }
}
