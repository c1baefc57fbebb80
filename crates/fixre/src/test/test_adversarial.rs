// Tests for budgets, malformed programs and random inputs
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::run;
use crate::limits::MAX_DEPTH_CEILING;
use crate::*;

fn program(pattern: &str) -> Vec<Token> {
    let mut tokens = [Token::HALT; 128];
    let used = compile(pattern.as_bytes(), &mut tokens, CompileFlags::NONE).unwrap();
    tokens[..used].to_vec()
}

fn literal(b: u8) -> Token {
    let mut set = Charset::EMPTY;
    set.insert(b);
    Token::class(set, Mode::NONE)
}

fn linked(kind: TokenKind, pair_offset: i16) -> Token {
    let mut token = Token::new(kind);
    token.pair_offset = pair_offset;
    token
}

#[test]
fn test_catastrophic_backtracking_is_bounded() {
    let text = "a".repeat(30);
    assert_eq!(run("(a+)+b", &text, 0), Err(MatchError::ResourceExhausted));

    let tight = MatchOption {
        step_budget: 1000,
        ..MatchOption::default()
    };
    let tokens = program("(a|aa)*c");
    assert_eq!(
        match_at_with(&tokens, text.as_bytes(), 0, &mut [], &tight),
        Err(MatchError::ResourceExhausted)
    );
}

#[test]
fn test_depth_budget() {
    let short = "a".repeat(100);
    assert_eq!(run("(?:a)*", &short, 0), Ok(Some(100)));

    let long = "a".repeat(1000);
    assert_eq!(run("(?:a)*", &long, 0), Err(MatchError::ResourceExhausted));

    let shallow = MatchOption {
        max_depth: 8,
        ..MatchOption::default()
    };
    let tokens = program("(?:a)*");
    assert_eq!(
        match_at_with(&tokens, short.as_bytes(), 0, &mut [], &shallow),
        Err(MatchError::ResourceExhausted)
    );
}

#[test]
fn test_scanned_bytes_are_charged() {
    let text = vec![b'a'; 2 << 20];
    let tokens = program(".*x");
    assert_eq!(
        match_at(&tokens, &text, 0, &mut []),
        Err(MatchError::ResourceExhausted)
    );

    let tiny = MatchOption {
        step_budget: 10,
        ..MatchOption::default()
    };
    let tokens = program("a*");
    assert_eq!(
        match_at_with(&tokens, &[b'a'; 20], 0, &mut [], &tiny),
        Err(MatchError::ResourceExhausted)
    );
}

#[test]
fn test_missing_halt() {
    let tokens = [literal(b'a')];
    assert_eq!(match_at(&tokens, b"a", 0, &mut []), Err(MatchError::InvalidProgram));
}

#[test]
fn test_bad_group_links() {
    let open = TokenKind::Open(GroupKind::Capture(0));
    let close = TokenKind::Close(GroupKind::Capture(0));

    let zero = [linked(open, 0), Token::HALT];
    assert_eq!(match_at(&zero, b"", 0, &mut []), Err(MatchError::InvalidProgram));

    let out_of_range = [linked(open, 10), Token::HALT];
    assert_eq!(
        match_at(&out_of_range, b"", 0, &mut []),
        Err(MatchError::InvalidProgram)
    );

    let mismatched = [
        linked(open, 1),
        linked(TokenKind::Close(GroupKind::NonCapture), -1),
        Token::HALT,
    ];
    assert_eq!(
        match_at(&mismatched, b"", 0, &mut []),
        Err(MatchError::InvalidProgram)
    );

    let one_sided = [linked(open, 1), linked(close, 0), Token::HALT];
    assert_eq!(
        match_at(&one_sided, b"", 0, &mut []),
        Err(MatchError::InvalidProgram)
    );
}

#[test]
fn test_backward_alternate() {
    let tokens = [
        literal(b'a'),
        linked(TokenKind::Alternate, -1),
        literal(b'b'),
        Token::HALT,
    ];
    assert_eq!(match_at(&tokens, b"a", 0, &mut []), Err(MatchError::InvalidProgram));
}

#[test]
fn test_inverted_bounds() {
    let mut token = literal(b'a');
    token.count_lo = 3;
    token.count_hi = 2;
    let tokens = [token, Token::HALT];
    assert_eq!(
        match_at(&tokens, b"aaa", 0, &mut []),
        Err(MatchError::InvalidProgram)
    );
}

#[test]
fn test_misplaced_terminators() {
    let stray_close = [linked(TokenKind::Close(GroupKind::NonCapture), 0), Token::HALT];
    assert_eq!(
        match_at(&stray_close, b"", 0, &mut []),
        Err(MatchError::InvalidProgram)
    );

    let halt_in_group = [
        linked(TokenKind::Open(GroupKind::NonCapture), 2),
        Token::HALT,
        linked(TokenKind::Close(GroupKind::NonCapture), -2),
        Token::HALT,
    ];
    assert_eq!(
        match_at(&halt_in_group, b"", 0, &mut []),
        Err(MatchError::InvalidProgram)
    );
}

const PATTERN_ALPHABET: &[u8] = b"ab.()|*+?{},0123^$[]-\\dwsbB:>x";

fn random_bytes(rng: &mut StdRng, alphabet: &[u8], max_len: usize) -> Vec<u8> {
    let len = rng.gen_range(0..=max_len);
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

#[test]
fn test_random_patterns() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let options = MatchOption {
        step_budget: 20_000,
        max_depth: 64,
    };

    for _ in 0..2000 {
        let pattern = random_bytes(&mut rng, PATTERN_ALPHABET, 12);
        let mut tokens = [Token::HALT; 32];
        let used = match compile(&pattern, &mut tokens, CompileFlags::NONE) {
            Ok(used) => used,
            Err(CompileError::CapacityTooSmall { required }) => {
                assert!(required > tokens.len());
                continue;
            }
            Err(CompileError::InvalidPattern { offset, .. }) => {
                assert!(offset <= pattern.len());
                continue;
            }
        };
        let program = &tokens[..used];
        let text = random_bytes(&mut rng, b"ab ,-_", 16);
        let mut caps = [None; 4];

        for start in 0..=text.len() + 1 {
            match match_at_with(program, &text, start, &mut caps, &options) {
                Ok(Some(len)) => {
                    assert!(start + len <= text.len());
                    for cap in caps.iter().flatten() {
                        assert!(cap.end() <= text.len());
                    }
                }
                Ok(None) | Err(MatchError::ResourceExhausted) => {}
                Err(MatchError::InvalidProgram) => {
                    panic!("compiled program rejected: {:?}", pattern.escape_ascii().to_string())
                }
            }
        }
    }
}

fn random_token(rng: &mut StdRng, len: usize) -> Token {
    let group = match rng.gen_range(0..3) {
        0 => GroupKind::Capture(rng.gen_range(0..3)),
        1 => GroupKind::NonCapture,
        _ => GroupKind::Atomic,
    };
    let kind = match rng.gen_range(0..9) {
        0 | 1 => TokenKind::Class(Charset::from_words(rng.r#gen())),
        2 => TokenKind::Open(group),
        3 => TokenKind::Close(group),
        4 => TokenKind::Alternate,
        5 => TokenKind::TextStart,
        6 => TokenKind::TextEnd,
        7 => TokenKind::WordBoundary,
        _ => TokenKind::Halt,
    };
    let span = len as i16;
    Token {
        kind,
        mode: Mode::from_bits(rng.gen_range(0..8)),
        count_lo: rng.gen_range(0..4),
        count_hi: rng.gen_range(0..4),
        pair_offset: rng.gen_range(-span..=span),
    }
}

#[test]
fn test_random_programs() {
    let mut rng = StdRng::seed_from_u64(42);
    let options = MatchOption {
        step_budget: 5_000,
        max_depth: 32,
    };

    for _ in 0..5000 {
        let len = rng.gen_range(1..10);
        let program: Vec<Token> = (0..len).map(|_| random_token(&mut rng, len)).collect();
        let text = random_bytes(&mut rng, b"ab\x00\xff", 8);
        let mut caps = [None; 3];

        for start in 0..=text.len() {
            if let Ok(Some(len)) = match_at_with(&program, &text, start, &mut caps, &options) {
                assert!(start + len <= text.len());
                for cap in caps.iter().flatten() {
                    assert!(cap.end() <= text.len());
                }
            }
        }
    }
}

#[test]
fn test_depth_budget_is_capped() {
    let unbounded = MatchOption {
        step_budget: usize::MAX,
        max_depth: usize::MAX,
    };
    let text = "ab".repeat(200_000);
    let tokens = program("(?:a|b)*c");
    assert_eq!(
        match_at_with(&tokens, text.as_bytes(), 0, &mut [], &unbounded),
        Err(MatchError::ResourceExhausted)
    );

    let tokens = program("(?:a|b)*");
    let text = "ab".repeat(150);
    assert_eq!(
        match_at(&tokens, text.as_bytes(), 0, &mut []),
        Err(MatchError::ResourceExhausted)
    );
    let deepest = MatchOption {
        max_depth: MAX_DEPTH_CEILING,
        ..MatchOption::default()
    };
    assert_eq!(
        match_at_with(&tokens, text.as_bytes(), 0, &mut [], &deepest),
        Ok(Some(300))
    );
}
