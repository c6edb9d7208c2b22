//! Coda+onset contextual rule table.
//!
//! The table is a small embedded CSV (`data/rule_table.csv`):
//!
//! ```text
//! ,( ?)ᄒ,( ?)ᄀ,…,( ?)ᄑ,(\W|$)        ← header: one onset pattern per column
//! ᆨ,\1ᄏ(12),ᆨ\1ᄁ(23),,…              ← one row per coda
//! ```
//!
//! Every non-empty cell becomes one [`RuleEntry`] whose pattern is
//! `coda + onset` and whose replacement is the cell text up to the first `(`,
//! with `\N` back-references rewritten to `${N}`.  The parenthesised part is a
//! `/`-separated list of rule identifiers, only used for diagnostics.
//!
//! A handful of cells are visibly damaged (e.g. `1),` in the ᆰ row, or
//! `ᆯ\1ᄏ(ᄑ(10)` in the ᆳ row).  They are parsed exactly as written.  A cell
//! whose pattern fails to compile is logged once and skipped.

use std::borrow::Cow;
use std::sync::Arc;

use fancy_regex::Regex;
use log::warn;
use once_cell::sync::Lazy;

/// The built-in table: 27 coda rows × 19 onset columns.
pub const RULE_TABLE_CSV: &str = include_str!("data/rule_table.csv");

static BUILTIN: Lazy<Arc<RuleTable>> = Lazy::new(|| Arc::new(RuleTable::parse(RULE_TABLE_CSV)));

// ─────────────────────────────────────────────────────────────────────────────
// Rule glossary
// ─────────────────────────────────────────────────────────────────────────────

/// Rule identifier → short description (Standard Korean Pronunciation articles).
const RULE_GLOSSARY: &[(&str, &str)] = &[
    ("5.1", "ㅕ after ㅈ/ㅉ/ㅊ is pronounced ㅓ"),
    ("5.2", "ㅖ after a consonant other than ㅇ/ㄹ may be pronounced ㅔ"),
    ("5.3", "ㅢ after a consonant is pronounced ㅣ"),
    ("5.4.1", "non-initial 의 may be pronounced 이"),
    ("5.4.2", "the particle 의 may be pronounced 에"),
    ("9", "codas ㄲ,ㅋ / ㅅ,ㅆ,ㅈ,ㅊ,ㅌ / ㅍ neutralize to ㄱ / ㄷ / ㅂ"),
    ("10", "double codas ㄳ,ㄵ,ㄼ,ㄽ,ㄾ,ㅄ keep their first consonant"),
    ("10.1", "밟- and 넓- keep ㅂ before a consonant"),
    ("11", "double codas ㄺ,ㄻ,ㄿ keep their second consonant"),
    ("11.1", "stem-final ㄺ is pronounced ㄹ before ㄱ"),
    ("12", "ㅎ aspirates an adjacent ㄱ,ㄷ,ㅈ / ㅎ before ㅅ tenses it"),
    ("12.4", "ㅎ is silent before a vowel"),
    ("13", "a single coda moves to the next vowel-initial syllable"),
    ("14", "the second consonant of a double coda moves to the next vowel-initial syllable"),
    ("15", "a coda links across a word boundary after neutralization"),
    ("16", "jamo names link with their neutralized coda"),
    ("17", "ㄷ,ㅌ before 이 palatalize to ㅈ,ㅊ"),
    ("18", "obstruent codas nasalize before ㄴ,ㅁ"),
    ("19", "ㄹ after ㅁ,ㅇ is pronounced ㄴ"),
    ("20", "ㄴ next to ㄹ is pronounced ㄹ"),
    ("23", "a plain onset tenses after an obstruent coda"),
    ("24", "an onset tenses after a verb stem ending in ㄴ,ㅁ"),
    ("25", "an onset tenses after a verb stem ending in ㄼ,ㄾ"),
    ("27", "an onset tenses after the adnominal ending -ㄹ"),
];

/// Human-readable description of a rule identifier, if known.
pub fn rule_description(id: &str) -> Option<&'static str> {
    RULE_GLOSSARY.iter().find(|(k, _)| *k == id).map(|(_, v)| *v)
}

/// Rewrite `\N` back-references to the `${N}` form understood by the regex
/// replacer.  Any other backslash is kept literally.
pub fn backrefs_to_dollar(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 4);
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                chars.next();
                out.push_str("${");
                out.push(d);
                out.push('}');
                continue;
            }
        }
        out.push(c);
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// RuleEntry
// ─────────────────────────────────────────────────────────────────────────────

/// One coda+onset substitution.
#[derive(Debug)]
pub struct RuleEntry {
    /// `coda + onset` regex source, e.g. `ᆨ( ?)ᄂ`.
    pub pattern: String,
    /// Replacement template in `${N}` form.
    pub replacement: String,
    pub rule_ids: Vec<String>,
    regex: Option<Regex>,
}

impl RuleEntry {
    /// Build an entry from raw table text.  `replacement` may still use `\N`.
    pub fn new(pattern: String, replacement: &str, rule_ids: Vec<String>) -> Self {
        let regex = match Regex::new(&pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("rule table: skipping malformed pattern {pattern:?}: {e}");
                None
            }
        };
        Self { pattern, replacement: backrefs_to_dollar(replacement), rule_ids, regex }
    }

    /// `false` when the pattern failed to compile; such entries never fire.
    pub fn is_usable(&self) -> bool {
        self.regex.is_some()
    }

    /// Apply the entry to every match in `text`.  Borrowed when nothing matched
    /// or the entry is unusable.
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match &self.regex {
            Some(re) => match re.is_match(text) {
                Ok(true) => re.replace_all(text, self.replacement.as_str()),
                Ok(false) => Cow::Borrowed(text),
                Err(e) => {
                    warn!("rule table: matching {:?} failed: {e}", self.pattern);
                    Cow::Borrowed(text)
                }
            },
            None => Cow::Borrowed(text),
        }
    }

    /// Joined descriptions of this entry's rule ids, for diagnostics.
    pub fn describe(&self) -> String {
        self.rule_ids
            .iter()
            .map(|id| match rule_description(id) {
                Some(desc) => format!("{id}: {desc}"),
                None => id.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RuleTable
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable list of [`RuleEntry`] in row-major table order.
#[derive(Debug, Default)]
pub struct RuleTable {
    entries: Vec<RuleEntry>,
}

impl RuleTable {
    /// The embedded table, parsed once and shared for the process lifetime.
    pub fn builtin() -> Arc<RuleTable> {
        Arc::clone(&BUILTIN)
    }

    /// Parse a table in the CSV layout described at module level.
    ///
    /// Never fails: bad rows or patterns are logged and skipped.
    pub fn parse(csv: &str) -> Self {
        let mut lines = csv.lines();
        let onsets: Vec<&str> = match lines.next() {
            Some(header) => header.split(',').collect(),
            None => return Self::default(),
        };

        let mut entries = Vec::new();
        for line in lines {
            let cols: Vec<&str> = line.split(',').collect();
            let Some((&coda, cells)) = cols.split_first() else {
                continue;
            };
            if coda.is_empty() {
                continue;
            }
            for (i, cell) in cells.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                let Some(onset) = onsets.get(i + 1) else {
                    warn!("rule table: row {coda:?} has more cells than onsets; ignoring {cell:?}");
                    break;
                };
                let (replacement, rule_ids) = split_cell(cell);
                entries.push(RuleEntry::new(format!("{coda}{onset}"), replacement, rule_ids));
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries whose pattern failed to compile.
    pub fn skipped(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_usable()).count()
    }
}

/// `"ᆨ\1ᄁ(9/23)"` → (`"ᆨ\1ᄁ"`, `["9", "23"]`).  Only the first `(` splits and
/// only one trailing `)` is removed.
fn split_cell(cell: &str) -> (&str, Vec<String>) {
    match cell.split_once('(') {
        Some((replacement, ids)) => {
            let ids = ids.strip_suffix(')').unwrap_or(ids);
            (replacement, ids.split('/').map(str::to_string).collect())
        }
        None => (cell, Vec::new()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
