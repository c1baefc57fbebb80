// fixre: a compact backtracking regular expression engine
// Patterns compile into caller-owned token buffers and match without heap allocation.
//
//   let mut tokens = [Token::HALT; 64];
//   let used = compile(b"(a+)(b+)", &mut tokens, CompileFlags::NONE)?;
//   let mut caps = [None; 2];
//   let len = match_at(&tokens[..used], b"aaabb", 0, &mut caps)?;

#[cfg(test)]
mod test;

pub mod compiler;
pub mod error;
pub mod limits;
pub mod matcher;
pub mod program;
pub mod scan;

pub use compiler::{CompileFlags, compile};
pub use error::{CompileError, MatchError, MatchResult, PatternErrorKind};
pub use matcher::{Capture, MatchOption, match_at, match_at_with};
pub use program::{Charset, GroupKind, Mode, Program, Token, TokenKind, capture_count};
pub use scan::{Match, Matches, find};
