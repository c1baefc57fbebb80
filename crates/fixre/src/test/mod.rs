// Test module organization
pub mod test_adversarial;
pub mod test_program;

use crate::*;

/// Compile `pattern` into a roomy buffer and match it at `start` without captures.
pub(crate) fn run(pattern: &str, text: &str, start: usize) -> MatchResult<Option<usize>> {
    run_with(pattern, CompileFlags::NONE, text, start)
}

pub(crate) fn run_with(
    pattern: &str,
    flags: CompileFlags,
    text: &str,
    start: usize,
) -> MatchResult<Option<usize>> {
    let mut tokens = [Token::HALT; 128];
    let used = compile(pattern.as_bytes(), &mut tokens, flags).unwrap();
    match_at(&tokens[..used], text.as_bytes(), start, &mut [])
}
