use std::fmt;

/// Why a pattern was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternErrorKind {
    /// `(` without `)` or `)` without `(`
    UnbalancedGroup,
    /// Quantifier at the start of a scope, after an anchor, or after another quantifier
    NothingToRepeat,
    /// `{...}` that is not a well-formed repeat bound, or `lo > hi`
    BadRepeat,
    /// Unterminated `[...]` or a reversed range such as `z-a`
    BadClass,
    /// Unknown or truncated escape sequence
    BadEscape,
    /// `(?` followed by anything other than `:` or `>`
    UnsupportedGroup,
    /// Pattern longer than `MAX_PATTERN_LEN` or nested deeper than `MAX_GROUP_DEPTH`
    TooComplex,
}

impl fmt::Display for PatternErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternErrorKind::UnbalancedGroup => write!(f, "unbalanced parenthesis"),
            PatternErrorKind::NothingToRepeat => write!(f, "quantifier has nothing to repeat"),
            PatternErrorKind::BadRepeat => write!(f, "malformed repeat bound"),
            PatternErrorKind::BadClass => write!(f, "malformed character class"),
            PatternErrorKind::BadEscape => write!(f, "invalid escape sequence"),
            PatternErrorKind::UnsupportedGroup => write!(f, "unsupported group syntax"),
            PatternErrorKind::TooComplex => write!(f, "pattern too long or too deeply nested"),
        }
    }
}

/// Compilation failure.
///
/// `CapacityTooSmall` is recoverable: retrying the identical pattern with
/// `required` tokens yields the Program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileError {
    /// Malformed or unsupported syntax. `offset` is the byte position in the pattern.
    InvalidPattern { offset: usize, kind: PatternErrorKind },
    /// The token buffer is too small; `required` tokens would have been enough.
    CapacityTooSmall { required: usize },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::InvalidPattern { offset, kind } => {
                write!(f, "invalid pattern at offset {}: {}", offset, kind)
            }
            CompileError::CapacityTooSmall { required } => {
                write!(f, "token buffer too small ({} tokens required)", required)
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Match failure other than "no match".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchError {
    /// Step or depth budget exceeded; the answer is undetermined.
    ResourceExhausted,
    /// The token program violates its structural invariants.
    InvalidProgram,
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::ResourceExhausted => write!(f, "match budget exhausted"),
            MatchError::InvalidProgram => write!(f, "invalid token program"),
        }
    }
}

impl std::error::Error for MatchError {}

pub type MatchResult<T> = Result<T, MatchError>;
