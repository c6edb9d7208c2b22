//! Digit-run verbalizer: spells Arabic numerals out as Korean number words.
//!
//! Two reading systems are needed:
//!
//! | System      | Used for                                   | 3     | 20   |
//! |-------------|--------------------------------------------|-------|------|
//! | Sino-Korean | default, decimals, anything ≥ 100          | 삼    | 이십 |
//! | native      | 1–99 directly before a native counter noun | 세    | 스무 |
//!
//! Runs with a leading zero (`010`) or too many digits for the 경 scale are
//! read digit by digit.  Grouping commas (`1,000`) are accepted.

use std::borrow::Cow;

use fancy_regex::{Captures, Regex};
use once_cell::sync::Lazy;

// ─────────────────────────────────────────────────────────────────────────────
// Word tables
// ─────────────────────────────────────────────────────────────────────────────

const SINO_DIGITS: [&str; 10] = ["영", "일", "이", "삼", "사", "오", "육", "칠", "팔", "구"];
/// Units inside one four-digit group, lowest first.
const SINO_SMALL_UNITS: [&str; 4] = ["", "십", "백", "천"];
/// Units between four-digit groups, lowest first.
const SINO_GROUP_UNITS: [&str; 6] = ["", "만", "억", "조", "경", "해"];

const NATIVE_ONES: [&str; 10] = ["", "하나", "둘", "셋", "넷", "다섯", "여섯", "일곱", "여덟", "아홉"];
/// Attributive forms used directly before a counter (세 개, not 셋 개).
const NATIVE_ONES_BEFORE_COUNTER: [&str; 10] =
    ["", "한", "두", "세", "네", "다섯", "여섯", "일곱", "여덟", "아홉"];
const NATIVE_TENS: [&str; 10] = ["", "열", "스물", "서른", "마흔", "쉰", "예순", "일흔", "여든", "아흔"];

/// Longest run read as a whole number: four digits per group unit.
const MAX_GROUPED_DIGITS: usize = 4 * SINO_GROUP_UNITS.len();

// Multi-syllable counters come first so alternation prefers them.
const COUNTERS: &str = "군데|켤레|마리|사람|가지|송이|그루|시간|개(?!월)|명|살|시|번|잔|권|장|달|대|벌|척|채|통";

/// Particles that may follow a counter written after a space (`2 마리가`).
const PARTICLES: &str = "으로|부터|까지|이|가|을|를|은|는|의|도|만|와|과|에|로|씩|째|쯤";

/// ASCII digits only; other digit forms are left as they are.
///
/// Groups: 1 integer, 2 fraction, 3 space + 4 spaced counter, 5 attached
/// counter.  A spaced counter must end its word, so `10 대학` keeps 대학.
static RE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"([0-9]{{1,3}}(?:,[0-9]{{3}})+|[0-9]+)(?:\.([0-9]+))?(?:( )({COUNTERS})(?=$|[^가-힣]|(?:{PARTICLES})(?:$|[^가-힣]))|({COUNTERS}))?"
    ))
    .unwrap()
});

// ─────────────────────────────────────────────────────────────────────────────
// Readings
// ─────────────────────────────────────────────────────────────────────────────

/// Read every digit separately: `"010"` → `"영일영"`.
pub fn digits_one_by_one(digits: &str) -> String {
    digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| SINO_DIGITS[d as usize])
        .collect()
}

/// One four-digit group, most significant digit first.  A bare 1 in front of
/// 십/백/천 is dropped (백, not 일백).
fn sino_group(group: &[u32]) -> String {
    let mut out = String::new();
    let width = group.len();
    for (pos, &d) in group.iter().enumerate() {
        if d == 0 {
            continue;
        }
        let unit = SINO_SMALL_UNITS[width - 1 - pos];
        if d != 1 || unit.is_empty() {
            out.push_str(SINO_DIGITS[d as usize]);
        }
        out.push_str(unit);
    }
    out
}

/// Sino-Korean reading of a plain digit string (`"12345"` → `"만이천삼백사십오"`).
///
/// Strings with a leading zero or more than [`MAX_GROUPED_DIGITS`] digits fall
/// back to [`digits_one_by_one`].
pub fn sino_korean(digits: &str) -> String {
    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if values.is_empty() {
        return String::new();
    }
    if values.iter().all(|&d| d == 0) && values.len() == 1 {
        return SINO_DIGITS[0].to_string();
    }
    if values[0] == 0 || values.len() > MAX_GROUPED_DIGITS {
        return digits_one_by_one(digits);
    }

    // Split into four-digit groups from the right; the first may be shorter.
    let head = values.len() % 4;
    let mut groups: Vec<&[u32]> = Vec::new();
    if head > 0 {
        groups.push(&values[..head]);
    }
    groups.extend(values[head..].chunks(4));

    let mut out = String::new();
    let n_groups = groups.len();
    for (i, group) in groups.iter().enumerate() {
        let words = sino_group(group);
        if words.is_empty() {
            continue;
        }
        let unit = SINO_GROUP_UNITS[n_groups - 1 - i];
        // 만 is read without a leading 일; larger units keep it (일억).
        if unit == "만" && words == "일" {
            out.push_str(unit);
        } else {
            out.push_str(&words);
            out.push_str(unit);
        }
    }
    out
}

/// Native Korean reading for `1..=99`, or `None` outside that range.
///
/// With `before_counter` the attributive forms are used: 한, 두, 세, 네, 스무.
pub fn native_korean(n: u32, before_counter: bool) -> Option<String> {
    if !(1..=99).contains(&n) {
        return None;
    }
    let (tens, ones) = ((n / 10) as usize, (n % 10) as usize);
    if before_counter && tens == 2 && ones == 0 {
        return Some("스무".to_string());
    }
    let ones_word = if before_counter {
        NATIVE_ONES_BEFORE_COUNTER[ones]
    } else {
        NATIVE_ONES[ones]
    };
    Some(format!("{}{}", NATIVE_TENS[tens], ones_word))
}

/// Decimal reading: integer part in Sino-Korean, then 점, then each digit.
pub fn decimal_korean(int_part: &str, frac_part: &str) -> String {
    format!("{}점{}", sino_korean(int_part), digits_one_by_one(frac_part))
}

// ─────────────────────────────────────────────────────────────────────────────
// Text pass
// ─────────────────────────────────────────────────────────────────────────────

/// Replace every digit run in `text` with its spoken form.
///
/// Returns the input borrowed when it contains no digits.
pub fn verbalize_numbers(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| c.is_ascii_digit()) {
        return Cow::Borrowed(text);
    }
    let replaced = RE_NUMBER.replace_all(text, |caps: &Captures| {
        let int_part = caps[1].replace(',', "");
        let space = caps.get(3).map_or("", |m| m.as_str());
        let counter = caps.get(4).or_else(|| caps.get(5)).map(|m| m.as_str());

        let spoken = match (caps.get(2), counter) {
            (Some(frac), _) => decimal_korean(&int_part, frac.as_str()),
            (None, Some(_)) if !int_part.starts_with('0') => int_part
                .parse::<u32>()
                .ok()
                .and_then(|n| native_korean(n, true))
                .unwrap_or_else(|| sino_korean(&int_part)),
            _ => sino_korean(&int_part),
        };
        format!("{}{}{}", spoken, space, counter.unwrap_or(""))
    });
    Cow::Owned(replaced.into_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
