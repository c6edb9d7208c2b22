//! Phoneme symbol table: maps jamo and punctuation to acoustic-model IDs.
//!
//! The ID space is fixed by the Korean acoustic model:
//!
//! | IDs       | Symbols                                  |
//! |-----------|------------------------------------------|
//! | 0         | pad / sentence sentinel `_`              |
//! | 162..=180 | 19 lead jamo `U+1100..=U+1112`           |
//! | 181..=201 | 21 vowel jamo `U+1161..=U+1175`          |
//! | 202..=208 | 7 tail jamo ᆨ ᆫ ᆮ ᆯ ᆷ ᆸ ᆼ                  |
//! | 209       | compatibility ㄸ (`U+3138`)              |
//! | 210..=217 | `! ? … , . ' -` and space                |
//! | 218       | unknown                                  |
//!
//! Only the seven tails that survive coda neutralization have IDs of their
//! own; anything else maps to [`UNK_ID`].

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::hangul;
use crate::rules::RuleEngine;

// ─────────────────────────────────────────────────────────────────────────────
// Vocabulary definition
// ─────────────────────────────────────────────────────────────────────────────

/// Pad token, also used for the start/end sentinels.
pub const PAD_ID: i64 = 0;
pub const UNK_ID: i64 = 218;

/// Phone string used for the start/end sentinels.
pub const SENTINEL: &str = "_";

const LEAD_FIRST_ID: i64 = 162;
const VOWEL_FIRST_ID: i64 = 181;

const TAILS: [(char, i64); 7] = [
    ('\u{11A8}', 202),
    ('\u{11AB}', 203),
    ('\u{11AE}', 204),
    ('\u{11AF}', 205),
    ('\u{11B7}', 206),
    ('\u{11B8}', 207),
    ('\u{11BC}', 208),
];

/// Punctuation that is passed to the model as its own phone.
pub const PUNCTUATION: [(char, i64); 8] = [
    ('!', 210),
    ('?', 211),
    ('…', 212),
    (',', 213),
    ('.', 214),
    ('\'', 215),
    ('-', 216),
    (' ', 217),
];

static SYMBOL_TO_ID: Lazy<HashMap<char, i64>> = Lazy::new(|| {
    let leads = (0..19u32).filter_map(|i| Some((char::from_u32(0x1100 + i)?, LEAD_FIRST_ID + i as i64)));
    let vowels = (0..21u32).filter_map(|i| Some((char::from_u32(0x1161 + i)?, VOWEL_FIRST_ID + i as i64)));

    leads
        .chain(vowels)
        .chain(TAILS)
        .chain(std::iter::once(('\u{3138}', 209)))
        .chain(PUNCTUATION)
        .collect()
});

// ─────────────────────────────────────────────────────────────────────────────
// Lookup
// ─────────────────────────────────────────────────────────────────────────────

/// Map one symbol to its ID, or `None` when it has no ID of its own.
pub fn symbol_to_id(c: char) -> Option<i64> {
    SYMBOL_TO_ID.get(&c).copied()
}

/// `symbol_to_id` with the unknown fallback.
pub fn id_or_unk(c: char) -> i64 {
    symbol_to_id(c).unwrap_or(UNK_ID)
}

/// ID of a punctuation phone, if `text` is exactly one listed mark other than space.
pub fn punctuation_id(text: &str) -> Option<i64> {
    let mut chars = text.chars();
    let c = chars.next()?;
    if chars.next().is_some() || c == ' ' {
        return None;
    }
    PUNCTUATION.iter().find(|(p, _)| *p == c).map(|(_, id)| *id)
}

/// Decompose `text` and map every code point to an ID, with one pad at each
/// end.  Unknown characters become [`UNK_ID`] rather than being dropped so
/// the output length always follows the jamo count.
pub fn jamo_to_ids(text: &str) -> Vec<i64> {
    let mut ids = vec![PAD_ID];
    ids.extend(hangul::decompose(text).chars().map(id_or_unk));
    ids.push(PAD_ID);
    ids
}

/// Full sentence path without any tokenizer: rules per space-separated
/// token, recomposition, then [`jamo_to_ids`].  The tokens are joined with
/// no separator, so word spaces do not reach the id stream.
pub fn text_to_phone_ids(engine: &RuleEngine, text: &str) -> Vec<i64> {
    jamo_to_ids(&engine.convert_spans(text).concat())
}

// ─────────────────────────────────────────────────────────────────────────────
// Blank interspersion
// ─────────────────────────────────────────────────────────────────────────────

/// Put a 0 before every element and one more at the end: `[a, b]` → `[0, a, 0, b, 0]`.
pub fn intersperse_blank(ids: &[i64]) -> Vec<i64> {
    let mut out = Vec::with_capacity(ids.len() * 2 + 1);
    for &id in ids {
        out.push(PAD_ID);
        out.push(id);
    }
    out.push(PAD_ID);
    out
}

/// Alignment counts matching [`intersperse_blank`]: every count doubles and
/// the first absorbs the trailing blank.
pub fn intersperse_word2ph(word2ph: &[usize]) -> Vec<usize> {
    let mut out: Vec<usize> = word2ph.iter().map(|n| n * 2).collect();
    if let Some(first) = out.first_mut() {
        *first += 1;
    }
    out
}

/// Tone track for an interspersed sequence of `len` IDs: blanks get 0 and
/// every real phone gets `tone_id`.
pub fn blank_tones(len: usize, tone_id: i64) -> Vec<i64> {
    (0..len).map(|i| if i % 2 == 0 { 0 } else { tone_id }).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_vowel_ranges() {
        assert_eq!(symbol_to_id('\u{1100}'), Some(162));
        assert_eq!(symbol_to_id('\u{1112}'), Some(180));
        assert_eq!(symbol_to_id('\u{1161}'), Some(181));
        assert_eq!(symbol_to_id('\u{1175}'), Some(201));
    }

    #[test]
    fn test_tails_and_punctuation() {
        assert_eq!(symbol_to_id('\u{11A8}'), Some(202));
        assert_eq!(symbol_to_id('\u{11BC}'), Some(208));
        assert_eq!(symbol_to_id('\u{3138}'), Some(209));
        assert_eq!(symbol_to_id('!'), Some(210));
        assert_eq!(symbol_to_id(' '), Some(217));
        // ᆲ never survives the rules and has no id
        assert_eq!(symbol_to_id('\u{11B2}'), None);
        assert_eq!(id_or_unk('x'), UNK_ID);
    }

    #[test]
    fn test_ids_unique() {
        let mut seen = std::collections::HashSet::new();
        for &id in SYMBOL_TO_ID.values() {
            assert!(seen.insert(id), "duplicate id {id}");
        }
        assert_eq!(SYMBOL_TO_ID.len(), 19 + 21 + 7 + 1 + 8);
    }

    #[test]
    fn test_punctuation_id() {
        assert_eq!(punctuation_id("."), Some(214));
        assert_eq!(punctuation_id("…"), Some(212));
        assert_eq!(punctuation_id(" "), None);
        assert_eq!(punctuation_id(".."), None);
        assert_eq!(punctuation_id("가"), None);
    }

    #[test]
    fn test_jamo_to_ids_pads_and_unk() {
        assert_eq!(jamo_to_ids("가"), vec![0, 162, 181, 0]);
        assert_eq!(jamo_to_ids("a"), vec![0, UNK_ID, 0]);
        assert_eq!(jamo_to_ids(""), vec![0, 0]);
    }

    #[test]
    fn test_text_to_phone_ids_applies_rules() {
        let engine = RuleEngine::default();
        // 국물 → 궁물: ᄀ ᅮ ᆼ ᄆ ᅮ ᆯ
        assert_eq!(text_to_phone_ids(&engine, "국물"), vec![0, 162, 194, 208, 168, 194, 205, 0]);
    }

    #[test]
    fn test_text_to_phone_ids_drops_word_spaces() {
        let engine = RuleEngine::default();
        let ids = text_to_phone_ids(&engine, "가 나");
        assert_eq!(ids, vec![0, 162, 181, 164, 181, 0]);
        assert!(!ids.contains(&217));
    }

    #[test]
    fn test_intersperse_blank() {
        assert_eq!(intersperse_blank(&[5, 6]), vec![0, 5, 0, 6, 0]);
        assert_eq!(intersperse_blank(&[]), vec![0]);
    }

    #[test]
    fn test_intersperse_word2ph_keeps_sum() {
        let ids = [0, 1, 2, 3, 0];
        let word2ph = [1, 3, 1];
        let blanked = intersperse_blank(&ids);
        let w = intersperse_word2ph(&word2ph);
        assert_eq!(w, vec![3, 6, 2]);
        assert_eq!(w.iter().sum::<usize>(), blanked.len());
    }

    #[test]
    fn test_blank_tones() {
        assert_eq!(blank_tones(5, 11), vec![0, 11, 0, 11, 0]);
    }
}
