// Backtracking matcher
//
// Interprets a token program against a byte slice, anchored at a start offset.
// - MatchState holds text, program, capture slots and the two budgets
// - `seq` walks tokens with a loop and only recurses at choice points
// - what happens after a group body finishes is a continuation chain
//   (`Cont`) living on the Rust call stack, so no heap is ever touched
// - atomic and possessive iterations first run without recording captures,
//   then replayed up to the committed end so captures unwind like any other
// - every offset read from the program is bounds-checked before use

use log::debug;

use crate::error::{MatchError, MatchResult};
use crate::limits::{DEFAULT_MAX_DEPTH, DEFAULT_STEP_BUDGET, MAX_DEPTH_CEILING};
use crate::program::{Charset, GroupKind, Mode, Token, TokenKind};

/// Span of one capture group inside the subject text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capture {
    pub pos: usize,
    pub span: usize,
}

impl Capture {
    #[inline(always)]
    pub fn end(&self) -> usize {
        self.pos + self.span
    }

    /// The captured bytes; empty if the capture lies outside `text`.
    pub fn slice<'t>(&self, text: &'t [u8]) -> &'t [u8] {
        text.get(self.pos..self.end()).unwrap_or_default()
    }
}

/// Work limits for a single anchored match attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOption {
    /// Dispatch steps, including bytes scanned by repeated classes
    pub step_budget: usize,
    /// Nesting depth of the backtracking recursion, capped at `MAX_DEPTH_CEILING`
    pub max_depth: usize,
}

impl Default for MatchOption {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Match `program` against `text` starting exactly at `start`, with default budgets.
///
/// Returns `Ok(Some(len))` on a match, `Ok(None)` if there is none (also when
/// `start > text.len()`). `captures` is cleared to `None` first; its content is
/// only meaningful when the result is `Ok(Some(_))`.
pub fn match_at(
    program: &[Token],
    text: &[u8],
    start: usize,
    captures: &mut [Option<Capture>],
) -> MatchResult<Option<usize>> {
    match_at_with(program, text, start, captures, &MatchOption::default())
}

/// Like [`match_at`] with explicit budgets.
pub fn match_at_with(
    program: &[Token],
    text: &[u8],
    start: usize,
    captures: &mut [Option<Capture>],
    options: &MatchOption,
) -> MatchResult<Option<usize>> {
    captures.fill(None);
    if start > text.len() {
        return Ok(None);
    }
    // A zero-token program is the empty pattern
    if program.is_empty() {
        return Ok(Some(0));
    }

    let mut ms = MatchState::new(program, text, captures, options);
    let result = ms.alternatives(0, start, &Cont::Accept);
    if let Err(e) = &result {
        debug!(
            "match at offset {} stopped after {} steps: {}",
            start, ms.steps, e
        );
    }
    result.map(|end| end.map(|end| end - start))
}

/// What to do once the current sequence reaches a `Close` or `Halt`
#[derive(Clone, Copy)]
enum Cont<'c> {
    /// Top level: the whole program matched
    Accept,
    /// Inside iteration `count + 1` of the group opened at `open`
    Group {
        open: usize,
        count: usize,
        start: usize,
        next: &'c Cont<'c>,
    },
    /// Trying one iteration of an atomic or possessive group; reaching its
    /// `Close` hands the end position straight back
    Commit { open: usize },
    /// Replaying iteration `count + 1` of a committed group, which must reach
    /// its `Close` exactly at `end`
    Replay {
        open: usize,
        count: usize,
        start: usize,
        end: usize,
        next: &'c Cont<'c>,
    },
}

/// Per-call matching state
struct MatchState<'a, 'c> {
    program: &'a [Token],
    text: &'a [u8],
    captures: &'c mut [Option<Capture>],
    steps: usize,
    depth: usize,
    step_budget: usize,
    max_depth: usize,
    /// Cleared while probing committed iterations
    recording: bool,
    /// Set when the rest of the match failed after a replayed iteration; every
    /// choice point unwinds until the replay of this group is reached
    cut: Option<usize>,
}

impl<'a, 'c> MatchState<'a, 'c> {
    fn new(
        program: &'a [Token],
        text: &'a [u8],
        captures: &'c mut [Option<Capture>],
        options: &MatchOption,
    ) -> Self {
        Self {
            program,
            text,
            captures,
            steps: 0,
            depth: 0,
            step_budget: options.step_budget,
            max_depth: options.max_depth.min(MAX_DEPTH_CEILING),
            recording: true,
            cut: None,
        }
    }

    // ======================== Budgets ========================

    #[inline(always)]
    fn charge(&mut self, steps: usize) -> MatchResult<()> {
        self.steps = self.steps.saturating_add(steps);
        if self.steps > self.step_budget {
            return Err(MatchError::ResourceExhausted);
        }
        Ok(())
    }

    #[inline(always)]
    fn enter(&mut self) -> MatchResult<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(MatchError::ResourceExhausted);
        }
        Ok(())
    }

    #[inline(always)]
    fn leave(&mut self) {
        self.depth -= 1;
    }

    #[inline(always)]
    fn cutting(&self) -> bool {
        self.cut.is_some()
    }

    // ======================== Program access ========================

    #[inline(always)]
    fn token(&self, ti: usize) -> MatchResult<&'a Token> {
        let program: &'a [Token] = self.program;
        program.get(ti).ok_or(MatchError::InvalidProgram)
    }

    /// Resolve `ti + offset`, refusing anything that does not move forward
    /// (`forward`) or backward (`!forward`) inside the program.
    fn jump(&self, ti: usize, offset: i16, forward: bool) -> MatchResult<usize> {
        if (offset > 0) != forward || offset == 0 {
            return Err(MatchError::InvalidProgram);
        }
        ti.checked_add_signed(offset as isize)
            .filter(|&target| target < self.program.len())
            .ok_or(MatchError::InvalidProgram)
    }

    /// Index of the `Close` paired with the `Open` at `open`, after checking
    /// that both tokens agree on the pairing and the repeat bounds are sane.
    fn close_of(&self, open: usize) -> MatchResult<usize> {
        let open_token = self.token(open)?;
        let TokenKind::Open(kind) = open_token.kind else {
            return Err(MatchError::InvalidProgram);
        };
        let close = self.jump(open, open_token.pair_offset, true)?;
        let close_token = self.token(close)?;
        if close_token.kind != TokenKind::Close(kind)
            || self.jump(close, close_token.pair_offset, false)? != open
        {
            return Err(MatchError::InvalidProgram);
        }
        check_counts(close_token)?;
        Ok(close)
    }

    /// Follow the `Alternate` chain from `ti` to the scope terminator.
    fn scope_end(&mut self, mut ti: usize) -> MatchResult<usize> {
        loop {
            self.charge(1)?;
            let token = self.token(ti)?;
            match token.kind {
                TokenKind::Alternate => ti = self.jump(ti, token.pair_offset, true)?,
                TokenKind::Close(_) | TokenKind::Halt => return Ok(ti),
                _ => return Err(MatchError::InvalidProgram),
            }
        }
    }

    /// Find the `Alternate` ending the branch that starts at `ti`, if any.
    fn next_branch(&mut self, mut ti: usize) -> MatchResult<Option<usize>> {
        loop {
            self.charge(1)?;
            match self.token(ti)?.kind {
                TokenKind::Alternate => return Ok(Some(ti)),
                TokenKind::Close(_) | TokenKind::Halt => return Ok(None),
                TokenKind::Open(_) => ti = self.close_of(ti)? + 1,
                _ => ti += 1,
            }
        }
    }

    // ======================== Captures ========================

    /// Record a finished group iteration; returns what to restore on backtrack.
    fn set_capture(
        &mut self,
        kind: GroupKind,
        start: usize,
        end: usize,
    ) -> Option<(usize, Option<Capture>)> {
        let GroupKind::Capture(index) = kind else {
            return None;
        };
        if !self.recording {
            return None;
        }
        let slot = self.captures.get_mut(index as usize)?;
        let saved = *slot;
        *slot = Some(Capture {
            pos: start,
            span: end - start,
        });
        Some((index as usize, saved))
    }

    fn restore_capture(&mut self, saved: Option<(usize, Option<Capture>)>) {
        if let Some((index, old)) = saved
            && let Some(slot) = self.captures.get_mut(index)
        {
            *slot = old;
        }
    }

    // ======================== Core ========================

    /// Try each branch of the scope whose first branch starts at `first`.
    fn alternatives(&mut self, first: usize, si: usize, k: &Cont<'_>) -> MatchResult<Option<usize>> {
        let mut branch = first;
        loop {
            if let Some(end) = self.run_seq(branch, si, k)? {
                return Ok(Some(end));
            }
            if self.cutting() {
                return Ok(None);
            }
            match self.next_branch(branch)? {
                Some(alt) => branch = alt + 1,
                None => return Ok(None),
            }
        }
    }

    /// Depth-guarded entry into `seq`.
    fn run_seq(&mut self, ti: usize, si: usize, k: &Cont<'_>) -> MatchResult<Option<usize>> {
        self.enter()?;
        let result = self.seq(ti, si, k);
        self.leave();
        result
    }

    /// Match tokens from `ti` at text position `si`, then hand over to `k`.
    /// Returns the position at which the innermost accepting continuation fired.
    fn seq(&mut self, mut ti: usize, mut si: usize, k: &Cont<'_>) -> MatchResult<Option<usize>> {
        // Loop instead of recursing for tokens without a choice point
        loop {
            self.charge(1)?;
            let token = self.token(ti)?;
            match token.kind {
                TokenKind::Class(_) => {
                    if token.is_repeated() {
                        return self.repeat_class(token, ti, si, k);
                    }
                    match self.text.get(si) {
                        Some(&b) if token.accepts(b) => {
                            ti += 1;
                            si += 1;
                        }
                        _ => return Ok(None),
                    }
                }
                TokenKind::TextStart => {
                    if si != 0 {
                        return Ok(None);
                    }
                    ti += 1;
                }
                TokenKind::TextEnd => {
                    if si != self.text.len() {
                        return Ok(None);
                    }
                    ti += 1;
                }
                TokenKind::WordBoundary | TokenKind::NotWordBoundary => {
                    let wanted = token.kind == TokenKind::WordBoundary;
                    if self.at_word_boundary(si) != wanted {
                        return Ok(None);
                    }
                    ti += 1;
                }
                // End of a branch: skip the remaining siblings
                TokenKind::Alternate => ti = self.scope_end(ti)?,
                TokenKind::Open(_) => return self.enter_group(ti, si, k),
                TokenKind::Close(_) => return self.close_group(ti, si, k),
                TokenKind::Halt => {
                    return match k {
                        Cont::Accept => Ok(Some(si)),
                        _ => Err(MatchError::InvalidProgram),
                    };
                }
            }
        }
    }

    fn at_word_boundary(&self, si: usize) -> bool {
        let before = si
            .checked_sub(1)
            .and_then(|i| self.text.get(i))
            .is_some_and(|&b| Charset::WORD.contains(b));
        let after = self
            .text
            .get(si)
            .is_some_and(|&b| Charset::WORD.contains(b));
        before != after
    }

    /// Quantified class: count the longest run once, then pick run lengths
    /// in the order the mode asks for.
    fn repeat_class(
        &mut self,
        token: &Token,
        ti: usize,
        si: usize,
        k: &Cont<'_>,
    ) -> MatchResult<Option<usize>> {
        check_counts(token)?;
        let lo = token.count_lo as usize;
        let available = self.text.len().saturating_sub(si);
        let limit = if token.is_unbounded() {
            available
        } else {
            available.min(token.count_hi as usize)
        };

        let mut run = 0;
        while run < limit && token.accepts(self.text[si + run]) {
            run += 1;
        }
        self.charge(run)?;
        if run < lo {
            return Ok(None);
        }

        let next = ti + 1;
        if token.mode.contains(Mode::POSSESSIVE) {
            return self.run_seq(next, si + run, k);
        }
        if token.mode.contains(Mode::LAZY) {
            for count in lo..=run {
                self.charge(1)?;
                if let Some(end) = self.run_seq(next, si + count, k)? {
                    return Ok(Some(end));
                }
                if self.cutting() {
                    return Ok(None);
                }
            }
        } else {
            for count in (lo..=run).rev() {
                self.charge(1)?;
                if let Some(end) = self.run_seq(next, si + count, k)? {
                    return Ok(Some(end));
                }
                if self.cutting() {
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }

    /// Reached an `Open`: decide between running the body and skipping it.
    fn enter_group(&mut self, open: usize, si: usize, k: &Cont<'_>) -> MatchResult<Option<usize>> {
        let close = self.close_of(open)?;
        let close_token = self.token(close)?;

        if close_token.kind == TokenKind::Close(GroupKind::Atomic)
            || close_token.mode.contains(Mode::POSSESSIVE)
        {
            return self.committed_step(open, close, 0, si, k);
        }

        if close_token.count_lo > 0 {
            return self.iterate(open, 0, si, k);
        }
        if close_token.mode.contains(Mode::LAZY) {
            if let Some(end) = self.run_seq(close + 1, si, k)? {
                return Ok(Some(end));
            }
            if self.cutting() {
                return Ok(None);
            }
            self.iterate(open, 0, si, k)
        } else {
            if let Some(end) = self.iterate(open, 0, si, k)? {
                return Ok(Some(end));
            }
            if self.cutting() {
                return Ok(None);
            }
            self.run_seq(close + 1, si, k)
        }
    }

    /// Run one more iteration of the group at `open`; `count` are already done.
    fn iterate(
        &mut self,
        open: usize,
        count: usize,
        si: usize,
        next: &Cont<'_>,
    ) -> MatchResult<Option<usize>> {
        let cont = Cont::Group {
            open,
            count,
            start: si,
            next,
        };
        self.alternatives(open + 1, si, &cont)
    }

    /// Reached a `Close`: record the capture, then repeat or leave the group.
    fn close_group(&mut self, close: usize, si: usize, k: &Cont<'_>) -> MatchResult<Option<usize>> {
        let close_token = self.token(close)?;
        let TokenKind::Close(kind) = close_token.kind else {
            return Err(MatchError::InvalidProgram);
        };

        match *k {
            Cont::Commit { open } => {
                if self.close_of(open)? != close {
                    return Err(MatchError::InvalidProgram);
                }
                Ok(Some(si))
            }
            Cont::Replay {
                open,
                count,
                start,
                end,
                next,
            } => {
                if self.close_of(open)? != close {
                    return Err(MatchError::InvalidProgram);
                }
                if si != end {
                    return Ok(None);
                }
                let saved = self.set_capture(kind, start, si);
                let result = self.after_commit(open, close, count + 1, start, si, next);
                if let Ok(None) = result {
                    self.restore_capture(saved);
                    // no other way through a committed body may be tried
                    if self.cut.is_none() {
                        self.cut = Some(open);
                    }
                }
                result
            }
            Cont::Group {
                open,
                count,
                start,
                next,
            } => {
                if self.close_of(open)? != close {
                    return Err(MatchError::InvalidProgram);
                }
                let saved = self.set_capture(kind, start, si);
                let result = self.after_iteration(close_token, open, close, count + 1, start, si, next);
                if let Ok(None) = result {
                    self.restore_capture(saved);
                }
                result
            }
            Cont::Accept => Err(MatchError::InvalidProgram),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn after_iteration(
        &mut self,
        close_token: &Token,
        open: usize,
        close: usize,
        count: usize,
        start: usize,
        si: usize,
        next: &Cont<'_>,
    ) -> MatchResult<Option<usize>> {
        // An empty iteration would repeat forever at the same position; it
        // also satisfies any remaining minimum.
        let progressed = si != start;
        let can_repeat = progressed && close_token.allows_more(count);
        let can_leave = !progressed || count >= close_token.count_lo as usize;

        if close_token.mode.contains(Mode::LAZY) {
            if can_leave && let Some(end) = self.run_seq(close + 1, si, next)? {
                return Ok(Some(end));
            }
            if can_repeat && !self.cutting() {
                return self.iterate(open, count, si, next);
            }
        } else {
            if can_repeat && let Some(end) = self.iterate(open, count, si, next)? {
                return Ok(Some(end));
            }
            if can_leave && !self.cutting() {
                return self.run_seq(close + 1, si, next);
            }
        }
        Ok(None)
    }

    /// Try one iteration of the body at `open` without recording captures;
    /// returns where the first way through the body ends.
    fn commit_once(&mut self, open: usize, si: usize) -> MatchResult<Option<usize>> {
        let recording = std::mem::replace(&mut self.recording, false);
        let result = self.alternatives(open + 1, si, &Cont::Commit { open });
        self.recording = recording;
        result
    }

    /// Run the committed iteration `start..end` again, recording captures, and
    /// continue the match from its `Close`.
    fn replay(
        &mut self,
        open: usize,
        count: usize,
        start: usize,
        end: usize,
        k: &Cont<'_>,
    ) -> MatchResult<Option<usize>> {
        let cont = Cont::Replay {
            open,
            count,
            start,
            end,
            next: k,
        };
        let result = self.alternatives(open + 1, start, &cont);
        if let Ok(None) = result
            && self.cut == Some(open)
        {
            self.cut = None;
        }
        result
    }

    /// A committed iteration ended at `si`; `count` iterations are done.
    fn after_commit(
        &mut self,
        open: usize,
        close: usize,
        count: usize,
        start: usize,
        si: usize,
        k: &Cont<'_>,
    ) -> MatchResult<Option<usize>> {
        // An empty iteration ends the loop and satisfies any remaining minimum
        if si == start {
            return self.run_seq(close + 1, si, k);
        }
        self.committed_step(open, close, count, si, k)
    }

    /// Atomic groups and possessive group quantifiers. Each iteration commits
    /// to the first way its body matches. A possessive quantifier also keeps
    /// every iteration it can take; a greedy or lazy one can still give
    /// iterations back.
    fn committed_step(
        &mut self,
        open: usize,
        close: usize,
        count: usize,
        si: usize,
        k: &Cont<'_>,
    ) -> MatchResult<Option<usize>> {
        self.enter()?;
        let result = self.committed_step_inner(open, close, count, si, k);
        self.leave();
        result
    }

    fn committed_step_inner(
        &mut self,
        open: usize,
        close: usize,
        count: usize,
        si: usize,
        k: &Cont<'_>,
    ) -> MatchResult<Option<usize>> {
        let close_token = self.token(close)?;
        let possessive = close_token.mode.contains(Mode::POSSESSIVE);
        let lazy = !possessive && close_token.mode.contains(Mode::LAZY);
        let can_leave = count >= close_token.count_lo as usize;

        if lazy && can_leave {
            if let Some(end) = self.run_seq(close + 1, si, k)? {
                return Ok(Some(end));
            }
            if self.cutting() {
                return Ok(None);
            }
        }

        if close_token.allows_more(count)
            && let Some(end) = self.commit_once(open, si)?
        {
            // Leaving at `si` was already tried
            if end == si && lazy && can_leave {
                return Ok(None);
            }
            if let Some(found) = self.replay(open, count, si, end, k)? {
                return Ok(Some(found));
            }
            if possessive || end == si || self.cutting() {
                return Ok(None);
            }
        }

        if !lazy && can_leave {
            return self.run_seq(close + 1, si, k);
        }
        Ok(None)
    }
}

#[inline]
fn check_counts(token: &Token) -> MatchResult<()> {
    if token.count_hi != 0 && token.count_lo > token.count_hi {
        return Err(MatchError::InvalidProgram);
    }
    Ok(())
}
