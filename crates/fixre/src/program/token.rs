/*----------------------------------------------------------------------
  Token layout

  A Program is a flat array of tokens terminated by `Halt`.

        a(b|cd)*$         index  kind          pair_offset  counts
                          0      Class 'a'     0            1..1
                          1      Open  #0      +5           -
                          2      Class 'b'     0            1..1
                          3      Alternate     +3           -
                          4      Class 'c'     0            1..1
                          5      Class 'd'     0            1..1
                          6      Close #0      -5           0..inf
                          7      TextEnd       0            -
                          8      Halt          0            -

  - `Open` and `Close` point at each other.
  - `Alternate` points at the next `Alternate` of the same scope, or at the
    scope terminator (`Close` / `Halt`) for the last branch.
  - A quantifier on a group is stored on its `Close`.
  - `count_hi == 0` means unbounded.
----------------------------------------------------------------------*/

use super::charset::Charset;

/// Repetition modifiers carried from the quantifier syntax, plus class negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mode(u8);

impl Mode {
    pub const NONE: Mode = Mode(0);
    /// `*?`, `+?`, `??`, `{n,m}?`
    pub const LAZY: Mode = Mode(1 << 0);
    /// `*+`, `++`, `?+`, `{n,m}+`
    pub const POSSESSIVE: Mode = Mode(1 << 1);
    /// `[^...]`, `\D`, `\W`, `\S`
    pub const INVERTED: Mode = Mode(1 << 2);

    #[inline(always)]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline(always)]
    pub const fn from_bits(bits: u8) -> Self {
        Mode(bits)
    }

    #[inline(always)]
    pub const fn contains(self, other: Mode) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline(always)]
    pub const fn union(self, other: Mode) -> Self {
        Mode(self.0 | other.0)
    }

    #[inline(always)]
    pub fn insert(&mut self, other: Mode) {
        self.0 |= other.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupKind {
    /// `(...)`; the capture slot index, numbered by opening parenthesis from 0
    Capture(u16),
    /// `(?:...)`
    NonCapture,
    /// `(?>...)`: the body commits to its first match
    Atomic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenKind {
    /// Literal, `.`, escape class or bracket class
    Class(Charset),
    Open(GroupKind),
    Close(GroupKind),
    /// `|`
    Alternate,
    /// `^`
    TextStart,
    /// `$`
    TextEnd,
    /// `\b`
    WordBoundary,
    /// `\B`
    NotWordBoundary,
    /// End of program
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub kind: TokenKind,
    pub mode: Mode,
    pub count_lo: u16,
    pub count_hi: u16,
    pub pair_offset: i16,
}

impl Token {
    pub const HALT: Token = Token::new(TokenKind::Halt);

    #[inline(always)]
    pub const fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            mode: Mode::NONE,
            count_lo: 1,
            count_hi: 1,
            pair_offset: 0,
        }
    }

    #[inline(always)]
    pub const fn class(set: Charset, mode: Mode) -> Self {
        let mut token = Token::new(TokenKind::Class(set));
        token.mode = mode;
        token
    }

    /// True if `count_hi` is the unbounded sentinel
    #[inline(always)]
    pub const fn is_unbounded(&self) -> bool {
        self.count_hi == 0
    }

    /// True if the token carries a quantifier other than the implicit `{1}`
    #[inline(always)]
    pub const fn is_repeated(&self) -> bool {
        !(self.count_lo == 1 && self.count_hi == 1)
    }

    /// True if one more repetition is allowed after `count` of them
    #[inline(always)]
    pub const fn allows_more(&self, count: usize) -> bool {
        self.count_hi == 0 || count < self.count_hi as usize
    }

    /// Class membership test honoring `Mode::INVERTED`.
    /// Always false for non-class tokens.
    #[inline(always)]
    pub fn accepts(&self, b: u8) -> bool {
        match &self.kind {
            TokenKind::Class(set) => set.contains(b) != self.mode.contains(Mode::INVERTED),
            _ => false,
        }
    }
}

impl Default for Token {
    fn default() -> Self {
        Token::HALT
    }
}
