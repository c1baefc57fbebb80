// Tests for the owned Program wrapper
use crate::limits::DEFAULT_PROGRAM_CAPACITY;
use crate::*;

#[test]
fn test_compile_into_program() {
    let program = Program::<16>::compile("a+b", CompileFlags::NONE).unwrap();
    assert_eq!(program.len(), 3);
    assert!(!program.is_empty());
    assert_eq!(program.capacity(), 16);
    assert_eq!(program.tokens().last(), Some(&Token::HALT));
    assert_eq!(program.match_at(b"aab", 0, &mut []), Ok(Some(3)));
}

#[test]
fn test_program_too_small() {
    assert_eq!(
        Program::<2>::compile("abc", CompileFlags::NONE).err(),
        Some(CompileError::CapacityTooSmall { required: 4 })
    );
    assert!(Program::<4>::compile("abc", CompileFlags::NONE).is_ok());
}

#[test]
fn test_default_capacity() {
    let program: Program = Program::compile(b"x|y", CompileFlags::NONE).unwrap();
    assert_eq!(program.capacity(), DEFAULT_PROGRAM_CAPACITY);

    let empty: Program = Program::compile("", CompileFlags::NONE).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.match_at(b"anything", 3, &mut []), Ok(Some(0)));
}

#[test]
fn test_program_equality() {
    let a = Program::<32>::compile("(ab)+", CompileFlags::NONE).unwrap();
    let b = Program::<32>::compile("(ab)+", CompileFlags::NONE).unwrap();
    let c = Program::<32>::compile("(ab)*", CompileFlags::NONE).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_program_find() {
    let program: Program = Program::compile(r"(\w+)@(\w+)", CompileFlags::NONE).unwrap();
    assert_eq!(program.capture_count(), 2);

    let text = b"mail: joe@host";
    let mut caps = [None; 2];
    let found = program.find(text, 0, &mut caps).unwrap().unwrap();
    assert_eq!((found.start, found.len), (6, 8));
    assert_eq!(caps[1].map(|c| c.slice(text)), Some(&b"host"[..]));

    let words: Vec<_> = program
        .find_iter(b"a@b c@d", MatchOption::default())
        .map(|m| m.unwrap().start)
        .collect();
    assert_eq!(words, [0, 4]);
}

#[test]
fn test_shared_across_threads() {
    let program: Program = Program::compile("(a|b)*c", CompileFlags::NONE).unwrap();
    let texts: [&[u8]; 4] = [b"abac", b"c", b"abab", b"bbbbc"];

    std::thread::scope(|s| {
        let handles: Vec<_> = texts
            .iter()
            .map(|text| {
                let program = &program;
                s.spawn(move || program.match_at(text, 0, &mut []))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, [Ok(Some(4)), Ok(Some(1)), Ok(None), Ok(Some(5))]);
    });
}

#[test]
fn test_program_debug() {
    let program = Program::<8>::compile("[a-c]", CompileFlags::NONE).unwrap();
    let text = format!("{:?}", program);
    assert!(text.contains("'a'-'c'"), "{}", text);
    assert!(text.contains("Halt"), "{}", text);
}
