//! Centralized engine limits and default budgets.
//!
//! All magic numbers that bound compiled size and matching work are
//! collected here for easy tuning.

// ===== Compiler =====

/// Longest pattern accepted by the compiler, in bytes.
/// Every pattern byte produces at most one token, so this also bounds the
/// Program length well inside the range of `Token::pair_offset` (i16).
pub const MAX_PATTERN_LEN: usize = 8192;

/// Maximum nesting depth of groups in a pattern.
pub const MAX_GROUP_DEPTH: usize = 64;

/// Largest repeat bound accepted in `{n}`, `{n,}` and `{n,m}`.
/// `count_hi == 0` is reserved to mean "unbounded".
pub const MAX_REPEAT: u16 = u16::MAX;

// ===== Matcher =====

/// Default number of dispatch steps one anchored match attempt may take.
pub const DEFAULT_STEP_BUDGET: usize = 1 << 20;

/// Default nesting depth of the backtracking recursion.
/// Only group iterations grow the depth with the subject text, so this also
/// caps how many times a quantified group can repeat. Each level costs a few
/// native stack frames.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Hard upper bound on `MatchOption::max_depth`; larger settings are clamped.
/// A level is at most about six native frames, budgeted at 5 KiB together
/// for unoptimized builds, so the deepest recursion stays inside a 2 MiB
/// thread stack.
pub const MAX_DEPTH_CEILING: usize = 384;

// ===== Program =====

/// Token capacity of `Program` when no capacity is named.
pub const DEFAULT_PROGRAM_CAPACITY: usize = 256;
