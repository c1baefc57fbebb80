// Pattern compiler
// Single left-to-right scan that writes tokens straight into the caller's buffer.
//
// - Open groups live on a fixed-size scope stack; `)` pops one and links the
//   `Open`/`Close` pair through `pair_offset`.
// - `last_unit` remembers the token a following quantifier attaches to: a class
//   token, or the `Close` of the group that just ended.
// - Each scope keeps its last `Alternate` so branches form a chain that ends at
//   the scope terminator.
// - Once the buffer is full the scan keeps going without writing, so syntax
//   errors still win over capacity errors and the required size is exact.

use log::debug;

use crate::error::{CompileError, PatternErrorKind};
use crate::limits::{MAX_GROUP_DEPTH, MAX_PATTERN_LEN, MAX_REPEAT};
use crate::program::{Charset, GroupKind, Mode, Token, TokenKind};

/// Compilation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileFlags(u32);

impl CompileFlags {
    pub const NONE: CompileFlags = CompileFlags(0);
    /// Fold ASCII letters so every class accepts both cases.
    pub const CASE_INSENSITIVE: CompileFlags = CompileFlags(1 << 0);

    #[inline(always)]
    pub const fn contains(self, other: CompileFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline(always)]
    pub const fn union(self, other: CompileFlags) -> Self {
        CompileFlags(self.0 | other.0)
    }
}

/// Compile `pattern` into `tokens`.
///
/// Returns the number of tokens used, including the trailing `Halt`. An empty
/// pattern uses zero tokens and needs no sentinel.
///
/// On `CapacityTooSmall { required }` the buffer content is unspecified;
/// compiling again into at least `required` tokens succeeds with the same
/// Program a larger buffer would have received.
pub fn compile(
    pattern: &[u8],
    tokens: &mut [Token],
    flags: CompileFlags,
) -> Result<usize, CompileError> {
    let result = Compiler::new(pattern, tokens, flags).run();
    if let Err(e) = &result {
        debug!("compile of \"{}\" failed: {}", pattern.escape_ascii(), e);
    }
    result
}

#[derive(Debug, Clone, Copy)]
struct Scope {
    /// Index of the `Open` token; `None` for the top level
    open: Option<usize>,
    kind: GroupKind,
    /// Pattern offset of the `(` for error reporting
    offset: usize,
    last_alt: Option<usize>,
}

impl Scope {
    const TOP: Scope = Scope {
        open: None,
        kind: GroupKind::NonCapture,
        offset: 0,
        last_alt: None,
    };
}

/// Result of decoding one backslash escape
enum Escape {
    Byte(u8),
    Set { set: Charset, negated: bool },
    Boundary { negated: bool },
}

struct Compiler<'a> {
    pattern: &'a [u8],
    pos: usize,
    tokens: &'a mut [Token],
    /// Tokens emitted so far; may exceed `tokens.len()` after overflow
    len: usize,
    flags: CompileFlags,
    scopes: [Scope; MAX_GROUP_DEPTH + 1],
    depth: usize,
    last_unit: Option<usize>,
    next_capture: u16,
}

impl<'a> Compiler<'a> {
    fn new(pattern: &'a [u8], tokens: &'a mut [Token], flags: CompileFlags) -> Self {
        Self {
            pattern,
            pos: 0,
            tokens,
            len: 0,
            flags,
            scopes: [Scope::TOP; MAX_GROUP_DEPTH + 1],
            depth: 0,
            last_unit: None,
            next_capture: 0,
        }
    }

    fn run(mut self) -> Result<usize, CompileError> {
        if self.pattern.len() > MAX_PATTERN_LEN {
            return Err(self.error(MAX_PATTERN_LEN, PatternErrorKind::TooComplex));
        }
        if self.pattern.is_empty() {
            return Ok(0);
        }

        while let Some(c) = self.next_byte() {
            let at = self.pos - 1;
            match c {
                b'(' => self.open_group(at)?,
                b')' => self.close_group(at)?,
                b'|' => self.alternate()?,
                b'*' => self.quantify(at, 0, 0)?,
                b'+' => self.quantify(at, 1, 0)?,
                b'?' => self.quantify(at, 0, 1)?,
                b'{' => {
                    let (lo, hi) = self.repeat_bounds(at)?;
                    self.quantify(at, lo, hi)?;
                }
                b'^' => self.marker(TokenKind::TextStart),
                b'$' => self.marker(TokenKind::TextEnd),
                b'.' => self.push_class(Charset::FULL, Mode::NONE),
                b'[' => self.bracket(at)?,
                b'\\' => match self.escape(at, false)? {
                    Escape::Byte(b) => self.push_literal(b),
                    Escape::Set { set, negated } => {
                        let mode = if negated { Mode::INVERTED } else { Mode::NONE };
                        self.push_class(set, mode);
                    }
                    Escape::Boundary { negated: false } => self.marker(TokenKind::WordBoundary),
                    Escape::Boundary { negated: true } => self.marker(TokenKind::NotWordBoundary),
                },
                _ => self.push_literal(c),
            }
        }

        if self.depth > 0 {
            let offset = self.scopes[self.depth].offset;
            return Err(self.error(offset, PatternErrorKind::UnbalancedGroup));
        }

        let halt = self.emit(Token::HALT);
        if let Some(alt) = self.scopes[0].last_alt {
            self.link(alt, halt)?;
        }

        if self.len > self.tokens.len() {
            return Err(CompileError::CapacityTooSmall { required: self.len });
        }
        Ok(self.len)
    }

    // ======================== Emission ========================

    fn emit(&mut self, token: Token) -> usize {
        let index = self.len;
        if let Some(slot) = self.tokens.get_mut(index) {
            *slot = token;
        }
        self.len += 1;
        index
    }

    /// Write `from.pair_offset` so it points at `to`.
    fn link(&mut self, from: usize, to: usize) -> Result<(), CompileError> {
        let offset = i16::try_from(to as isize - from as isize)
            .map_err(|_| self.error(self.pos, PatternErrorKind::TooComplex))?;
        if let Some(token) = self.tokens.get_mut(from) {
            token.pair_offset = offset;
        }
        Ok(())
    }

    fn push_class(&mut self, mut set: Charset, mode: Mode) {
        if self.flags.contains(CompileFlags::CASE_INSENSITIVE) {
            set.fold_ascii_case();
        }
        let index = self.emit(Token::class(set, mode));
        self.last_unit = Some(index);
    }

    fn push_literal(&mut self, b: u8) {
        let mut set = Charset::EMPTY;
        set.insert(b);
        self.push_class(set, Mode::NONE);
    }

    /// Zero-width tokens cannot be quantified.
    fn marker(&mut self, kind: TokenKind) {
        self.emit(Token::new(kind));
        self.last_unit = None;
    }

    // ======================== Structure ========================

    fn open_group(&mut self, at: usize) -> Result<(), CompileError> {
        if self.depth >= MAX_GROUP_DEPTH {
            return Err(self.error(at, PatternErrorKind::TooComplex));
        }

        let kind = if self.peek() == Some(b'?') {
            self.pos += 1;
            match self.next_byte() {
                Some(b':') => GroupKind::NonCapture,
                Some(b'>') => GroupKind::Atomic,
                _ => return Err(self.error(at, PatternErrorKind::UnsupportedGroup)),
            }
        } else {
            let index = self.next_capture;
            self.next_capture = index
                .checked_add(1)
                .ok_or_else(|| self.error(at, PatternErrorKind::TooComplex))?;
            GroupKind::Capture(index)
        };

        let open = self.emit(Token::new(TokenKind::Open(kind)));
        self.depth += 1;
        self.scopes[self.depth] = Scope {
            open: Some(open),
            kind,
            offset: at,
            last_alt: None,
        };
        self.last_unit = None;
        Ok(())
    }

    fn close_group(&mut self, at: usize) -> Result<(), CompileError> {
        let scope = self.scopes[self.depth];
        let open = match scope.open {
            Some(open) if self.depth > 0 => open,
            _ => return Err(self.error(at, PatternErrorKind::UnbalancedGroup)),
        };
        self.depth -= 1;

        let close = self.emit(Token::new(TokenKind::Close(scope.kind)));
        self.link(open, close)?;
        self.link(close, open)?;
        if let Some(alt) = scope.last_alt {
            self.link(alt, close)?;
        }
        self.last_unit = Some(close);
        Ok(())
    }

    fn alternate(&mut self) -> Result<(), CompileError> {
        let index = self.emit(Token::new(TokenKind::Alternate));
        if let Some(prev) = self.scopes[self.depth].last_alt {
            self.link(prev, index)?;
        }
        self.scopes[self.depth].last_alt = Some(index);
        self.last_unit = None;
        Ok(())
    }

    // ======================== Quantifiers ========================

    /// Attach `{lo,hi}` plus an optional `?` / `+` suffix to the last unit.
    fn quantify(&mut self, at: usize, lo: u16, hi: u16) -> Result<(), CompileError> {
        let target = self
            .last_unit
            .take()
            .ok_or_else(|| self.error(at, PatternErrorKind::NothingToRepeat))?;

        let suffix = match self.peek() {
            Some(b'?') => Mode::LAZY,
            Some(b'+') => Mode::POSSESSIVE,
            _ => Mode::NONE,
        };
        if suffix != Mode::NONE {
            self.pos += 1;
        }

        if let Some(token) = self.tokens.get_mut(target) {
            token.count_lo = lo;
            token.count_hi = hi;
            token.mode.insert(suffix);
        }
        Ok(())
    }

    /// Parse the rest of `{n}`, `{n,}` or `{n,m}`; `at` is the `{`.
    fn repeat_bounds(&mut self, at: usize) -> Result<(u16, u16), CompileError> {
        let bad = |c: &Self| c.error(at, PatternErrorKind::BadRepeat);

        let lo = self.number().ok_or_else(|| bad(self))?;
        let hi = match self.next_byte() {
            Some(b'}') => {
                if lo == 0 {
                    return Err(bad(self));
                }
                return Ok((lo, lo));
            }
            Some(b',') => {
                if self.peek() == Some(b'}') {
                    self.pos += 1;
                    return Ok((lo, 0));
                }
                self.number().ok_or_else(|| bad(self))?
            }
            _ => return Err(bad(self)),
        };

        if self.next_byte() != Some(b'}') || hi == 0 || lo > hi {
            return Err(bad(self));
        }
        Ok((lo, hi))
    }

    /// Decimal number up to `MAX_REPEAT`; `None` if absent or too large.
    fn number(&mut self) -> Option<u16> {
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(d) = self.peek().filter(u8::is_ascii_digit) {
            value = value * 10 + u32::from(d - b'0');
            if value > u32::from(MAX_REPEAT) {
                return None;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        u16::try_from(value).ok()
    }

    // ======================== Classes ========================

    /// Parse `[...]`; `at` is the `[`.
    fn bracket(&mut self, at: usize) -> Result<(), CompileError> {
        let negated = self.peek() == Some(b'^');
        if negated {
            self.pos += 1;
        }

        let mut set = Charset::EMPTY;
        let mut first = true;
        loop {
            let c = self
                .next_byte()
                .ok_or_else(|| self.error(at, PatternErrorKind::BadClass))?;
            if c == b']' && !first {
                break;
            }
            first = false;

            let lo = if c == b'\\' {
                let esc_at = self.pos - 1;
                match self.escape(esc_at, true)? {
                    Escape::Byte(b) => b,
                    Escape::Set { set: class, negated: inverse } => {
                        if inverse {
                            set.union_with_complement(&class);
                        } else {
                            set.union_with(&class);
                        }
                        continue;
                    }
                    Escape::Boundary { .. } => {
                        return Err(self.error(esc_at, PatternErrorKind::BadEscape));
                    }
                }
            } else {
                c
            };

            // `a-z`; a `-` right before `]` is literal
            let is_range = self.peek() == Some(b'-')
                && self.pattern.get(self.pos + 1).is_some_and(|&n| n != b']');
            if !is_range {
                set.insert(lo);
                continue;
            }

            let range_at = self.pos;
            self.pos += 1;
            let hi = match self.next_byte() {
                Some(b'\\') => match self.escape(self.pos - 1, true)? {
                    Escape::Byte(b) => b,
                    _ => return Err(self.error(range_at, PatternErrorKind::BadClass)),
                },
                Some(b) => b,
                None => return Err(self.error(at, PatternErrorKind::BadClass)),
            };
            if hi < lo {
                return Err(self.error(range_at, PatternErrorKind::BadClass));
            }
            set.insert_range(lo..=hi);
        }

        let mode = if negated { Mode::INVERTED } else { Mode::NONE };
        self.push_class(set, mode);
        Ok(())
    }

    /// Decode the escape after a backslash at `at`.
    fn escape(&mut self, at: usize, in_class: bool) -> Result<Escape, CompileError> {
        let bad = |c: &Self| c.error(at, PatternErrorKind::BadEscape);

        let e = self.next_byte().ok_or_else(|| bad(self))?;
        let escape = match e {
            b'd' => Escape::Set { set: Charset::DIGIT, negated: false },
            b'D' => Escape::Set { set: Charset::DIGIT, negated: true },
            b'w' => Escape::Set { set: Charset::WORD, negated: false },
            b'W' => Escape::Set { set: Charset::WORD, negated: true },
            b's' => Escape::Set { set: Charset::SPACE, negated: false },
            b'S' => Escape::Set { set: Charset::SPACE, negated: true },
            b'b' if in_class => Escape::Byte(0x08),
            b'b' => Escape::Boundary { negated: false },
            b'B' if !in_class => Escape::Boundary { negated: true },
            b'n' => Escape::Byte(b'\n'),
            b'r' => Escape::Byte(b'\r'),
            b't' => Escape::Byte(b'\t'),
            b'f' => Escape::Byte(0x0C),
            b'v' => Escape::Byte(0x0B),
            b'0' => Escape::Byte(0),
            b'x' => {
                let hi = self.next_byte().and_then(hex_value).ok_or_else(|| bad(self))?;
                let lo = self.next_byte().and_then(hex_value).ok_or_else(|| bad(self))?;
                Escape::Byte((hi << 4) | lo)
            }
            c if c.is_ascii_alphanumeric() => return Err(bad(self)),
            c => Escape::Byte(c),
        };
        Ok(escape)
    }

    // ======================== Input ========================

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.pattern.get(self.pos).copied()
    }

    #[inline]
    fn next_byte(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn error(&self, offset: usize, kind: PatternErrorKind) -> CompileError {
        CompileError::InvalidPattern { offset, kind }
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
