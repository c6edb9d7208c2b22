//! Hangul syllable ↔ conjoining-jamo codec.
//!
//! Precomposed syllables live in `U+AC00..=U+D7A3` and are laid out as
//! `((lead * 21) + vowel) * 28 + tail`.  Decomposition emits conjoining jamo
//! from the `U+1100` block:
//!
//! | Class | Range             | Count |
//! |-------|-------------------|-------|
//! | lead  | `U+1100..=U+1112` | 19    |
//! | vowel | `U+1161..=U+1175` | 21    |
//! | tail  | `U+11A8..=U+11C2` | 27 (+ "none") |
//!
//! [`compose`] is best-effort: a lead that is not followed by a vowel is
//! passed through untouched, so `compose(decompose(s)) == s` only holds for
//! text that was fully precomposed to begin with.

const SYLLABLE_BASE: u32 = 0xAC00;
const SYLLABLE_LAST: u32 = 0xD7A3;

const LEAD_BASE: u32 = 0x1100;
const VOWEL_BASE: u32 = 0x1161;
/// One below the first tail jamo; tail index 0 means "no tail".
const TAIL_BASE: u32 = 0x11A7;

const LEAD_COUNT: u32 = 19;
const VOWEL_COUNT: u32 = 21;
const TAIL_COUNT: u32 = 28;

/// Syllables sharing one lead: 21 vowels × 28 tails.
const PER_LEAD: u32 = VOWEL_COUNT * TAIL_COUNT;

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// `true` for a precomposed Hangul syllable (가..힣).
pub fn is_syllable(c: char) -> bool {
    (SYLLABLE_BASE..=SYLLABLE_LAST).contains(&(c as u32))
}

pub fn is_lead(c: char) -> bool {
    (LEAD_BASE..LEAD_BASE + LEAD_COUNT).contains(&(c as u32))
}

pub fn is_vowel(c: char) -> bool {
    (VOWEL_BASE..VOWEL_BASE + VOWEL_COUNT).contains(&(c as u32))
}

/// `true` for a real tail jamo.  `TAIL_BASE` itself is the "no tail" slot and
/// is not a character.
pub fn is_tail(c: char) -> bool {
    (TAIL_BASE + 1..TAIL_BASE + TAIL_COUNT).contains(&(c as u32))
}

// ─────────────────────────────────────────────────────────────────────────────
// Syllable
// ─────────────────────────────────────────────────────────────────────────────

/// Index triple of one precomposed syllable.
///
/// `lead ∈ 0..19`, `vowel ∈ 0..21`, `tail ∈ 0..28` with `tail == 0` meaning
/// an open syllable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Syllable {
    pub lead: u32,
    pub vowel: u32,
    pub tail: u32,
}

impl Syllable {
    /// Split a precomposed syllable, or `None` for anything else.
    pub fn from_char(c: char) -> Option<Self> {
        if !is_syllable(c) {
            return None;
        }
        let offset = c as u32 - SYLLABLE_BASE;
        Some(Self {
            lead: offset / PER_LEAD,
            vowel: (offset % PER_LEAD) / TAIL_COUNT,
            tail: offset % TAIL_COUNT,
        })
    }

    /// Rebuild the precomposed syllable, or `None` if an index is out of range.
    pub fn to_char(self) -> Option<char> {
        if self.lead >= LEAD_COUNT || self.vowel >= VOWEL_COUNT || self.tail >= TAIL_COUNT {
            return None;
        }
        char::from_u32(SYLLABLE_BASE + self.lead * PER_LEAD + self.vowel * TAIL_COUNT + self.tail)
    }

    pub fn lead_jamo(self) -> char {
        jamo(LEAD_BASE + self.lead)
    }

    pub fn vowel_jamo(self) -> char {
        jamo(VOWEL_BASE + self.vowel)
    }

    pub fn tail_jamo(self) -> Option<char> {
        (self.tail != 0).then(|| jamo(TAIL_BASE + self.tail))
    }
}

/// Every code point handed in here is inside the jamo block, so the fallback
/// is unreachable in practice.
fn jamo(code: u32) -> char {
    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
}

// ─────────────────────────────────────────────────────────────────────────────
// Codec
// ─────────────────────────────────────────────────────────────────────────────

/// Decompose every precomposed syllable in `text` into lead, vowel and
/// (optional) tail jamo.  All other characters pass through unchanged.
pub fn decompose(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 3);
    for c in text.chars() {
        match Syllable::from_char(c) {
            Some(s) => {
                out.push(s.lead_jamo());
                out.push(s.vowel_jamo());
                if let Some(t) = s.tail_jamo() {
                    out.push(t);
                }
            }
            None => out.push(c),
        }
    }
    out
}

/// Decompose `text` into one string per jamo (or per pass-through character).
pub fn decompose_to_jamo(text: &str) -> Vec<String> {
    decompose(text).chars().map(String::from).collect()
}

/// Recompose a jamo stream into syllables.
///
/// At each position a lead followed by a vowel consumes two code points, or
/// three when a tail follows.  Anything else, including a lead at the very
/// end of the input, is emitted unchanged.
pub fn compose(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match next {
            Some(v) if is_lead(c) && is_vowel(v) => {
                let mut syllable = Syllable {
                    lead: c as u32 - LEAD_BASE,
                    vowel: v as u32 - VOWEL_BASE,
                    tail: 0,
                };
                i += 2;
                if let Some(t) = chars.get(i).copied().filter(|&t| is_tail(t)) {
                    syllable.tail = t as u32 - TAIL_BASE;
                    i += 1;
                }
                match syllable.to_char() {
                    Some(s) => out.push(s),
                    None => {
                        // Indices come from classified jamo; keep the raw
                        // code points if that ever stops holding.
                        out.push(c);
                        out.push(v);
                        if syllable.tail != 0 {
                            out.push(jamo(TAIL_BASE + syllable.tail));
                        }
                    }
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syllable_indices() {
        assert_eq!(Syllable::from_char('가'), Some(Syllable { lead: 0, vowel: 0, tail: 0 }));
        assert_eq!(Syllable::from_char('힣'), Some(Syllable { lead: 18, vowel: 20, tail: 27 }));
        assert_eq!(Syllable::from_char('a'), None);
        assert_eq!(Syllable::from_char('ᄀ'), None);
    }

    #[test]
    fn test_decompose_open_and_closed() {
        assert_eq!(decompose("가"), "\u{1100}\u{1161}");
        // 밟 = ᄇ + ᅡ + ᆲ
        assert_eq!(decompose("밟"), "\u{1107}\u{1161}\u{11B2}");
    }

    #[test]
    fn test_decompose_passthrough() {
        assert_eq!(decompose("abc, 123!"), "abc, 123!");
        assert_eq!(decompose(""), "");
    }

    #[test]
    fn test_roundtrip() {
        for s in ["안녕하세요", "밟아", "Hello 세계!", "읽었다. 맑고 넓다", "힣가", "abc"] {
            assert_eq!(compose(&decompose(s)), s, "round-trip failed for {s:?}");
        }
    }

    #[test]
    fn test_compose_orphan_lead_passes_through() {
        // lead followed by a lead: first one is emitted as-is
        assert_eq!(compose("\u{1100}\u{1102}\u{1161}"), "\u{1100}나");
        // lead at end of input must not be dropped or read past
        assert_eq!(compose("\u{1100}\u{1161}\u{1102}"), "가\u{1102}");
    }

    #[test]
    fn test_compose_stray_tail_and_vowel() {
        assert_eq!(compose("\u{11A8}"), "\u{11A8}");
        assert_eq!(compose("\u{1161}\u{11A8}"), "\u{1161}\u{11A8}");
        // tail after a full syllable stays separate
        assert_eq!(compose("\u{1100}\u{1161}\u{11A8}\u{11A8}"), "각\u{11A8}");
    }

    #[test]
    fn test_classification() {
        assert!(is_lead('\u{1100}') && is_lead('\u{1112}') && !is_lead('\u{1113}'));
        assert!(is_vowel('\u{1161}') && is_vowel('\u{1175}') && !is_vowel('\u{1176}'));
        assert!(is_tail('\u{11A8}') && is_tail('\u{11C2}'));
        assert!(!is_tail('\u{11A7}') && !is_tail('\u{11C3}'));
    }

    #[test]
    fn test_decompose_to_jamo() {
        assert_eq!(decompose_to_jamo("각."), vec!["\u{1100}", "\u{1161}", "\u{11A8}", "."]);
    }
}
