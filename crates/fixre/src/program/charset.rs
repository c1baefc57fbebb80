// Byte set used by class tokens
// 256 bits packed as sixteen 16-bit words: byte `b` lives in word `b >> 4`, bit `b & 15`.

use std::fmt;
use std::ops::RangeInclusive;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Charset {
    words: [u16; 16],
}

impl Charset {
    pub const EMPTY: Charset = Charset { words: [0; 16] };
    pub const FULL: Charset = Charset { words: [u16::MAX; 16] };

    /// `\d`
    pub const DIGIT: Charset = Charset::EMPTY.with_range(b'0', b'9');

    /// `\w`
    pub const WORD: Charset = Charset::EMPTY
        .with_range(b'0', b'9')
        .with_range(b'A', b'Z')
        .with_range(b'a', b'z')
        .with(b'_');

    /// `\s`: space, `\t`, `\n`, vertical tab, form feed, `\r`
    pub const SPACE: Charset = Charset::EMPTY.with(b' ').with_range(0x09, 0x0D);

    #[inline(always)]
    pub const fn from_words(words: [u16; 16]) -> Self {
        Self { words }
    }

    #[inline(always)]
    pub const fn words(&self) -> [u16; 16] {
        self.words
    }

    #[inline(always)]
    pub const fn contains(&self, b: u8) -> bool {
        self.words[(b >> 4) as usize] & (1 << (b & 15)) != 0
    }

    #[inline(always)]
    pub fn insert(&mut self, b: u8) {
        self.words[(b >> 4) as usize] |= 1 << (b & 15);
    }

    pub fn insert_range(&mut self, r: RangeInclusive<u8>) {
        for b in r {
            self.insert(b);
        }
    }

    pub fn union_with(&mut self, other: &Charset) {
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w |= *o;
        }
    }

    /// Add every byte that is *not* in `other`, as `[\D]` needs.
    pub fn union_with_complement(&mut self, other: &Charset) {
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w |= !*o;
        }
    }

    /// Add the other-case twin of every ASCII letter already present.
    pub fn fold_ascii_case(&mut self) {
        for b in b'a'..=b'z' {
            let upper = b.to_ascii_uppercase();
            if self.contains(b) || self.contains(upper) {
                self.insert(b);
                self.insert(upper);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    const fn with(mut self, b: u8) -> Self {
        self.words[(b >> 4) as usize] |= 1 << (b & 15);
        self
    }

    const fn with_range(mut self, lo: u8, hi: u8) -> Self {
        let mut b = lo;
        loop {
            self = self.with(b);
            if b == hi {
                break;
            }
            b += 1;
        }
        self
    }
}

// Print consecutive ranges, such as "Charset['0'-'9', 'A'-'Z', '_']"
impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |f: &mut fmt::Formatter<'_>, b: usize| {
            let b = b as u8;
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "'{}'", b as char)
            } else {
                write!(f, "0x{:02X}", b)
            }
        };

        write!(f, "Charset[")?;
        let mut beg = 0;
        let mut first = true;
        while beg < 256 {
            while beg < 256 && !self.contains(beg as u8) {
                beg += 1;
            }
            if beg >= 256 {
                break;
            }
            let mut end = beg;
            while end < 256 && self.contains(end as u8) {
                end += 1;
            }
            if !first {
                write!(f, ", ")?;
            }
            show(f, beg)?;
            if end - beg > 1 {
                write!(f, "-")?;
                show(f, end - 1)?;
            }
            beg = end;
            first = false;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut cs = Charset::EMPTY;
        assert!(!cs.contains(b'a'));
        cs.insert(b'a');
        cs.insert(0xFF);
        cs.insert(0);
        assert!(cs.contains(b'a'));
        assert!(cs.contains(0xFF));
        assert!(cs.contains(0));
        assert!(!cs.contains(b'b'));
        assert_eq!(cs.len(), 3);
    }

    #[test]
    fn test_word_layout() {
        let mut cs = Charset::EMPTY;
        cs.insert(0x41); // word 4, bit 1
        assert_eq!(cs.words()[4], 0b10);
        assert_eq!(Charset::from_words(cs.words()), cs);
    }

    #[test]
    fn test_predefined_classes() {
        assert_eq!(Charset::DIGIT.len(), 10);
        assert!(Charset::WORD.contains(b'_'));
        assert!(Charset::WORD.contains(b'Z'));
        assert!(!Charset::WORD.contains(b'-'));
        assert!(Charset::SPACE.contains(b'\t'));
        assert!(Charset::SPACE.contains(0x0B));
        assert!(!Charset::SPACE.contains(b'x'));
        assert_eq!(Charset::FULL.len(), 256);
        assert!(Charset::EMPTY.is_empty());
    }

    #[test]
    fn test_union_with_complement() {
        let mut cs = Charset::EMPTY;
        cs.union_with_complement(&Charset::DIGIT);
        assert!(!cs.contains(b'5'));
        assert!(cs.contains(b'x'));
        assert_eq!(cs.len(), 246);
    }

    #[test]
    fn test_fold_ascii_case() {
        let mut cs = Charset::EMPTY;
        cs.insert_range(b'a'..=b'c');
        cs.insert(b'Q');
        cs.insert(b'1');
        cs.fold_ascii_case();
        assert!(cs.contains(b'B'));
        assert!(cs.contains(b'q'));
        assert!(!cs.contains(b'd'));
        assert_eq!(cs.len(), 9);
    }

    #[test]
    fn test_debug_ranges() {
        let mut cs = Charset::EMPTY;
        cs.insert_range(b'a'..=b'f');
        cs.insert(b'_');
        cs.insert(0x00);
        assert_eq!(format!("{:?}", cs), "Charset[0x00, '_', 'a'-'f']");
    }
}
