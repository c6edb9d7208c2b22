//! Korean phonological rule engine.
//!
//! A token is rewritten by a fixed, ordered list of passes over its
//! decomposed jamo form.  Each pass only sees the output of the pass before
//! it, so order matters:
//!
//! 1. vowel passes: jyeo, ye, consonant_ui, josa_ui, vowel_ui, jamo-name liaison
//! 2. stem-final passes keyed on `/P` and `/E` morpheme tags: rieulgiyeok,
//!    rieulbieub, verb_nieun, balb, palatalize, modifying_rieul
//! 3. removal of the remaining `/P /J /E /B` tags
//! 4. one sweep over the coda+onset [`RuleTable`]
//! 5. linking passes link1..link4
//!
//! All patterns below are written in decomposed form: `바` in a pattern is
//! the two code points ᄇ + ᅡ, and `[그]` is a class of ᄀ and ᅳ.
//!
//! ```
//! use melotts_ko::rules::RuleEngine;
//!
//! let engine = RuleEngine::default();
//! assert_eq!(engine.convert("굳이"), "구지");
//! assert_eq!(engine.convert("국물"), "궁물");
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use fancy_regex::Regex;
use log::debug;
use once_cell::sync::Lazy;

use crate::hangul;
use crate::numerals::verbalize_numbers;
use crate::rule_table::{rule_description, RuleTable};

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Engine switches, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleEngineOptions {
    /// Follow everyday (descriptive) pronunciation instead of the prescriptive
    /// standard: enables ye, vowel_ui, and 의 → 에 for the particle.
    pub descriptive: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pass definitions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Always,
    DescriptiveOnly,
    PrescriptiveOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// Regex replace-all, `${N}` templates.
    Regex,
    /// Plain replace-all, pair by pair.
    Literal,
    /// Plain replacement of the first occurrence only.
    FirstLiteral,
}

struct PassSpec {
    name: &'static str,
    rule_id: &'static str,
    mode: Mode,
    kind: Kind,
    subs: &'static [(&'static str, &'static str)],
}

const JYEO: &[(&str, &str)] = &[
    ("([ᄌᄍᄎ])ᅧ", "${1}ᅥ"),
];
const YE: &[(&str, &str)] = &[
    ("([ᄀᄁᄃᄄᄅᄆᄇᄈᄌᄍᄎᄏᄐᄑᄒ])ᅨ", "${1}ᅦ"),
];
const CONSONANT_UI: &[(&str, &str)] = &[
    ("([ᄀᄁᄂᄃᄄᄅᄆᄇᄈᄉᄊᄌᄍᄎᄏᄐᄑᄒ])ᅴ", "${1}ᅵ"),
];
const JOSA_UI: &[(&str, &str)] = &[
    ("의/J", "에"),
];
const VOWEL_UI: &[(&str, &str)] = &[
    ("(.ᄋ)ᅴ", "${1}ᅵ"),
];
const JAMO: &[(&str, &str)] = &[
    ("([그])ᆮᄋ", "${1}ᄉ"),
    ("([으])[ᆽᆾᇀᇂ]ᄋ", "${1}ᄉ"),
    ("([으])[ᆿ]ᄋ", "${1}ᄀ"),
    ("([으])[ᇁ]ᄋ", "${1}ᄇ"),
];
const RIEULGIYEOK: &[(&str, &str)] = &[
    ("ᆰ/P([ᄀᄁ])", "ᆯᄁ"),
];
const RIEULBIEUB: &[(&str, &str)] = &[
    ("([ᆲᆴ])/Pᄀ", "${1}ᄁ"),
    ("([ᆲᆴ])/Pᄃ", "${1}ᄄ"),
    ("([ᆲᆴ])/Pᄉ", "${1}ᄊ"),
    ("([ᆲᆴ])/Pᄌ", "${1}ᄍ"),
];
const VERB_NIEUN: &[(&str, &str)] = &[
    ("([ᆫᆷ])/Pᄀ", "${1}ᄁ"),
    ("([ᆫᆷ])/Pᄃ", "${1}ᄄ"),
    ("([ᆫᆷ])/Pᄉ", "${1}ᄊ"),
    ("([ᆫᆷ])/Pᄌ", "${1}ᄍ"),
    ("ᆬ/Pᄀ", "ᆫᄁ"),
    ("ᆬ/Pᄃ", "ᆫᄄ"),
    ("ᆬ/Pᄉ", "ᆫᄊ"),
    ("ᆬ/Pᄌ", "ᆫᄍ"),
    ("ᆱ/Pᄀ", "ᆷᄁ"),
    ("ᆱ/Pᄃ", "ᆷᄄ"),
    ("ᆱ/Pᄉ", "ᆷᄊ"),
    ("ᆱ/Pᄌ", "ᆷᄍ"),
];
const BALB: &[(&str, &str)] = &[
    ("(바)ᆲ($|[^ᄋᄒ])", "${1}ᆸ${2}"),
    ("(너)ᆲ([ᄌᄍ]ᅮ|[ᄃᄄ]ᅮ)", "${1}ᆸ${2}"),
];
const PALATALIZE: &[(&str, &str)] = &[
    ("ᆮᄋ([ᅵᅧ])", "ᄌ${1}"),
    ("ᇀᄋ([ᅵᅧ])", "ᄎ${1}"),
    ("ᆴᄋ([ᅵᅧ])", "ᆯᄎ${1}"),
    ("ᆮᄒ([ᅵ])", "ᄎ${1}"),
];
const MODIFYING_RIEUL: &[(&str, &str)] = &[
    ("ᆯ/E ᄀ", "ᆯ ᄁ"),
    ("ᆯ/E ᄃ", "ᆯ ᄄ"),
    ("ᆯ/E ᄇ", "ᆯ ᄈ"),
    ("ᆯ/E ᄉ", "ᆯ ᄊ"),
    ("ᆯ/E ᄌ", "ᆯ ᄍ"),
    ("ᆯ걸", "ᆯ껄"),
    ("ᆯ밖에", "ᆯ빠께"),
    ("ᆯ세라", "ᆯ쎄라"),
    ("ᆯ수록", "ᆯ쑤록"),
    ("ᆯ지라도", "ᆯ찌라도"),
    ("ᆯ지언정", "ᆯ찌언정"),
    ("ᆯ진대", "ᆯ찐대"),
];
const LINK1: &[(&str, &str)] = &[
    ("ᆨᄋ", "ᄀ"),
    ("ᆩᄋ", "ᄁ"),
    ("ᆫᄋ", "ᄂ"),
    ("ᆮᄋ", "ᄃ"),
    ("ᆯᄋ", "ᄅ"),
    ("ᆷᄋ", "ᄆ"),
    ("ᆸᄋ", "ᄇ"),
    ("ᆺᄋ", "ᄉ"),
    ("ᆻᄋ", "ᄊ"),
    ("ᆽᄋ", "ᄌ"),
    ("ᆾᄋ", "ᄎ"),
    ("ᆿᄋ", "ᄏ"),
    ("ᇀᄋ", "ᄐ"),
    ("ᇁᄋ", "ᄑ"),
];
const LINK2: &[(&str, &str)] = &[
    ("ᆪᄋ", "ᆨᄊ"),
    ("ᆬᄋ", "ᆫᄌ"),
    ("ᆰᄋ", "ᆯᄀ"),
    ("ᆱᄋ", "ᆯᄆ"),
    ("ᆲᄋ", "ᆯᄇ"),
    ("ᆳᄋ", "ᆯᄊ"),
    ("ᆴᄋ", "ᆯᄐ"),
    ("ᆵᄋ", "ᆯᄑ"),
    ("ᆹᄋ", "ᆸᄊ"),
];
const LINK3: &[(&str, &str)] = &[
    ("ᆨ ᄋ", " ᄀ"),
    ("ᆩ ᄋ", " ᄁ"),
    ("ᆫ ᄋ", " ᄂ"),
    ("ᆮ ᄋ", " ᄃ"),
    ("ᆯ ᄋ", " ᄅ"),
    ("ᆷ ᄋ", " ᄆ"),
    ("ᆸ ᄋ", " ᄇ"),
    ("ᆺ ᄋ", " ᄉ"),
    ("ᆻ ᄋ", " ᄊ"),
    ("ᆽ ᄋ", " ᄌ"),
    ("ᆾ ᄋ", " ᄎ"),
    ("ᆿ ᄋ", " ᄏ"),
    ("ᇀ ᄋ", " ᄐ"),
    ("ᇁ ᄋ", " ᄑ"),
    ("ᆪ ᄋ", "ᆨ ᄊ"),
    ("ᆬ ᄋ", "ᆫ ᄌ"),
    ("ᆰ ᄋ", "ᆯ ᄀ"),
    ("ᆱ ᄋ", "ᆯ ᄆ"),
    ("ᆲ ᄋ", "ᆯ ᄇ"),
    ("ᆳ ᄋ", "ᆯ ᄊ"),
    ("ᆴ ᄋ", "ᆯ ᄐ"),
    ("ᆵ ᄋ", "ᆯ ᄑ"),
    ("ᆹ ᄋ", "ᆸ ᄊ"),
];
const LINK4: &[(&str, &str)] = &[
    ("ᇂᄋ", "ᄋ"),
    ("ᆭᄋ", "ᄂ"),
    ("ᆶᄋ", "ᄅ"),
];

const BEFORE_TABLE: &[PassSpec] = &[
    PassSpec { name: "jyeo", rule_id: "5.1", mode: Mode::Always, kind: Kind::Regex, subs: JYEO },
    PassSpec { name: "ye", rule_id: "5.2", mode: Mode::DescriptiveOnly, kind: Kind::Regex, subs: YE },
    PassSpec { name: "consonant_ui", rule_id: "5.3", mode: Mode::Always, kind: Kind::Regex, subs: CONSONANT_UI },
    PassSpec { name: "josa_ui", rule_id: "5.4.2", mode: Mode::DescriptiveOnly, kind: Kind::Regex, subs: JOSA_UI },
    PassSpec { name: "josa_ui", rule_id: "5.4.2", mode: Mode::PrescriptiveOnly, kind: Kind::FirstLiteral, subs: &[("/J", "")] },
    PassSpec { name: "vowel_ui", rule_id: "5.4.1", mode: Mode::DescriptiveOnly, kind: Kind::Regex, subs: VOWEL_UI },
    PassSpec { name: "jamo", rule_id: "16", mode: Mode::Always, kind: Kind::Regex, subs: JAMO },
    PassSpec { name: "rieulgiyeok", rule_id: "11.1", mode: Mode::Always, kind: Kind::Regex, subs: RIEULGIYEOK },
    PassSpec { name: "rieulbieub", rule_id: "25", mode: Mode::Always, kind: Kind::Regex, subs: RIEULBIEUB },
    PassSpec { name: "verb_nieun", rule_id: "24", mode: Mode::Always, kind: Kind::Regex, subs: VERB_NIEUN },
    PassSpec { name: "balb", rule_id: "10.1", mode: Mode::Always, kind: Kind::Regex, subs: BALB },
    PassSpec { name: "palatalize", rule_id: "17", mode: Mode::Always, kind: Kind::Regex, subs: PALATALIZE },
    PassSpec { name: "modifying_rieul", rule_id: "27", mode: Mode::Always, kind: Kind::Regex, subs: MODIFYING_RIEUL },
    PassSpec { name: "remove_tags", rule_id: "", mode: Mode::Always, kind: Kind::Regex, subs: &[("/[PJEB]", "")] },
];

const AFTER_TABLE: &[PassSpec] = &[
    PassSpec { name: "link1", rule_id: "13", mode: Mode::Always, kind: Kind::Literal, subs: LINK1 },
    PassSpec { name: "link2", rule_id: "14", mode: Mode::Always, kind: Kind::Literal, subs: LINK2 },
    PassSpec { name: "link3", rule_id: "15", mode: Mode::Always, kind: Kind::Literal, subs: LINK3 },
    PassSpec { name: "link4", rule_id: "12.4", mode: Mode::Always, kind: Kind::Literal, subs: LINK4 },
];

static PASSES_BEFORE_TABLE: Lazy<Vec<Pass>> = Lazy::new(|| BEFORE_TABLE.iter().map(Pass::compile).collect());
static PASSES_AFTER_TABLE: Lazy<Vec<Pass>> = Lazy::new(|| AFTER_TABLE.iter().map(Pass::compile).collect());

// ─────────────────────────────────────────────────────────────────────────────
// Pass
// ─────────────────────────────────────────────────────────────────────────────

enum Substitution {
    Regex { re: Regex, replacement: &'static str },
    Literal { from: &'static str, to: &'static str, first_only: bool },
}

impl Substitution {
    fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match self {
            Substitution::Regex { re, replacement } => match re.is_match(text) {
                Ok(true) => re.replace_all(text, *replacement),
                _ => Cow::Borrowed(text),
            },
            Substitution::Literal { from, to, first_only } => {
                if !text.contains(from) {
                    Cow::Borrowed(text)
                } else if *first_only {
                    Cow::Owned(text.replacen(from, to, 1))
                } else {
                    Cow::Owned(text.replace(from, to))
                }
            }
        }
    }
}

/// One compiled rule pass.
pub struct Pass {
    pub name: &'static str,
    pub rule_id: &'static str,
    mode: Mode,
    subs: Vec<Substitution>,
}

impl Pass {
    fn compile(spec: &PassSpec) -> Self {
        let subs = spec
            .subs
            .iter()
            .map(|&(from, to)| match spec.kind {
                Kind::Regex => Substitution::Regex {
                    re: Regex::new(from).unwrap(),
                    replacement: to,
                },
                Kind::Literal => Substitution::Literal { from, to, first_only: false },
                Kind::FirstLiteral => Substitution::Literal { from, to, first_only: true },
            })
            .collect();
        Self { name: spec.name, rule_id: spec.rule_id, mode: spec.mode, subs }
    }

    /// Whether this pass runs under `options`.
    pub fn is_enabled(&self, options: RuleEngineOptions) -> bool {
        match self.mode {
            Mode::Always => true,
            Mode::DescriptiveOnly => options.descriptive,
            Mode::PrescriptiveOnly => !options.descriptive,
        }
    }

    /// Run every substitution of the pass in order.  A pass that changes
    /// nothing hands the input back borrowed.
    pub fn apply<'t>(&self, text: &'t str, options: RuleEngineOptions) -> Cow<'t, str> {
        let mut out = Cow::Borrowed(text);
        if !self.is_enabled(options) {
            return out;
        }
        for sub in &self.subs {
            let replaced = match sub.apply(&out) {
                Cow::Owned(s) => Some(s),
                Cow::Borrowed(_) => None,
            };
            if let Some(s) = replaced {
                out = Cow::Owned(s);
            }
        }
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RuleEngine
// ─────────────────────────────────────────────────────────────────────────────

/// One rewrite that changed the token, as reported by
/// [`RuleEngine::apply_rules_traced`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRule {
    /// Pass name, or `table` for a coda+onset entry.
    pub step: String,
    pub rule_ids: Vec<String>,
    pub before: String,
    pub after: String,
}

/// Stateless rule engine; cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct RuleEngine {
    table: Arc<RuleTable>,
    options: RuleEngineOptions,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(RuleEngineOptions::default())
    }
}

impl RuleEngine {
    /// Engine over the built-in rule table.
    pub fn new(options: RuleEngineOptions) -> Self {
        Self::with_table(RuleTable::builtin(), options)
    }

    pub fn with_table(table: Arc<RuleTable>, options: RuleEngineOptions) -> Self {
        Self { table, options }
    }

    pub fn options(&self) -> RuleEngineOptions {
        self.options
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// All hand-written passes in execution order (the table sweep sits
    /// between the last `remove_tags` pass and `link1`).
    pub fn passes() -> impl Iterator<Item = &'static Pass> {
        PASSES_BEFORE_TABLE.iter().chain(PASSES_AFTER_TABLE.iter())
    }

    /// Rewrite one decomposed jamo token.
    pub fn apply_rules(&self, token: &str) -> String {
        self.run(token, None)
    }

    /// Like [`apply_rules`](Self::apply_rules), also returning every step that
    /// changed the token.
    pub fn apply_rules_traced(&self, token: &str) -> (String, Vec<AppliedRule>) {
        let mut trace = Vec::new();
        let out = self.run(token, Some(&mut trace));
        (out, trace)
    }

    /// Whole-token pipeline over composed text: digits are spelled out once,
    /// then every space-separated span is decomposed, rewritten and recomposed.
    pub fn convert(&self, text: &str) -> String {
        self.convert_spans(text).join(" ")
    }

    /// The recomposed spans of [`convert`](Self::convert), one per
    /// space-separated span of the input.
    pub fn convert_spans(&self, text: &str) -> Vec<String> {
        let spoken = verbalize_numbers(text);
        hangul::decompose(&spoken)
            .split(' ')
            .map(|span| hangul::compose(&self.apply_rules(span)))
            .collect()
    }

    fn run(&self, token: &str, mut trace: Option<&mut Vec<AppliedRule>>) -> String {
        let mut out = token.to_string();

        for pass in PASSES_BEFORE_TABLE.iter() {
            out = self.step(pass, out, trace.as_deref_mut());
        }

        // The table works on a clean jamo stream; recomposing and decomposing
        // again folds any syllables a literal substitution may have produced.
        out = hangul::decompose(&hangul::compose(&out));

        for entry in self.table.entries() {
            let after = match entry.apply(&out) {
                Cow::Borrowed(_) => continue,
                Cow::Owned(s) => s,
            };
            if after == out {
                continue;
            }
            debug!("[table] {} : {} → {} ({})", entry.pattern, out, after, entry.describe());
            if let Some(t) = trace.as_deref_mut() {
                t.push(AppliedRule {
                    step: "table".to_string(),
                    rule_ids: entry.rule_ids.clone(),
                    before: out.clone(),
                    after: after.clone(),
                });
            }
            out = after;
        }

        for pass in PASSES_AFTER_TABLE.iter() {
            out = self.step(pass, out, trace.as_deref_mut());
        }
        out
    }

    fn step(&self, pass: &Pass, input: String, trace: Option<&mut Vec<AppliedRule>>) -> String {
        let after = match pass.apply(&input, self.options) {
            Cow::Borrowed(_) => None,
            Cow::Owned(s) => Some(s),
        };
        let Some(after) = after.filter(|a| *a != input) else {
            return input;
        };
        debug!(
            "[{}] {} → {} ({})",
            pass.name,
            input,
            after,
            rule_description(pass.rule_id).unwrap_or(pass.rule_id)
        );
        if let Some(t) = trace {
            t.push(AppliedRule {
                step: pass.name.to_string(),
                rule_ids: if pass.rule_id.is_empty() { Vec::new() } else { vec![pass.rule_id.to_string()] },
                before: input,
                after: after.clone(),
            });
        }
        after
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
