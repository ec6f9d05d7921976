//! Free-text name canonicalization.
//!
//! A [`RuleSet`] is an ordered list of `(pattern, label)` rules. Input is
//! normalized, lower-cased and tested against each rule top to bottom; the
//! first rule that matches supplies the canonical label. Strings no rule
//! matches come back cleaned but otherwise untouched so they stay visible
//! in the output (and in the unmapped listing).

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use thiserror::Error;

/// Tokens treated as "no value" wherever a list entry or cell is read.
pub const EMPTY_TOKENS: [&str; 7] = ["", "nan", "none", "null", "na", "n/a", "-"];

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref TRAILING_PUNCT: Regex = Regex::new(r"[,.;:\s]+$").unwrap();
    static ref COUNTRY_QUALIFIER: Regex = RegexBuilder::new(
        r"\s*\((united states|usa|uk|canada|germany|australia|spain|europe|european|global)\)\s*$"
    )
    .case_insensitive(true)
    .build()
    .unwrap();
}

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("rule set '{set}': invalid pattern for label '{label}': {source}")]
    InvalidPattern {
        set: String,
        label: String,
        #[source]
        source: regex::Error,
    },
}

/// How a rule pattern is applied to the normalized string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStyle {
    /// Pattern may match anywhere in the string.
    Search,
    /// Pattern must match the whole string.
    Anchored,
}

/// Uncompiled rule, as written in the built-in tables or a rules file.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    /// Negative lookahead: a match is rejected when this pattern matches
    /// at the position right after it. Write `.*x` to reject any later `x`.
    #[serde(default)]
    pub unless: Option<String>,
    pub label: String,
}

impl RuleSpec {
    pub fn new(pattern: &str, label: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            unless: None,
            label: label.to_string(),
        }
    }

    pub fn unless(mut self, exclusion: &str) -> Self {
        self.unless = Some(exclusion.to_string());
        self
    }
}

#[derive(Debug)]
struct Rule {
    pattern: Regex,
    unless: Option<Regex>,
    label: String,
}

impl Rule {
    fn matches(&self, text: &str) -> bool {
        match &self.unless {
            None => self.pattern.is_match(text),
            Some(ex) => self
                .pattern
                .find_iter(text)
                .any(|m| !ex.is_match(&text[m.end()..])),
        }
    }
}

/// Outcome of resolving one raw string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Empty,
    Mapped(String),
    Unmapped(String),
}

impl Resolution {
    pub fn into_label(self) -> Option<String> {
        match self {
            Resolution::Empty => None,
            Resolution::Mapped(label) | Resolution::Unmapped(label) => Some(label),
        }
    }
}

#[derive(Debug)]
pub struct RuleSet {
    name: String,
    style: MatchStyle,
    strip_country_qualifier: bool,
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn compile(name: &str, style: MatchStyle, specs: &[RuleSpec]) -> Result<Self, RuleError> {
        let build = |pattern: &str, label: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| RuleError::InvalidPattern {
                    set: name.to_string(),
                    label: label.to_string(),
                    source,
                })
        };

        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            let pattern = match style {
                MatchStyle::Search => build(&spec.pattern, &spec.label)?,
                MatchStyle::Anchored => build(&format!("^(?:{})$", spec.pattern), &spec.label)?,
            };
            let unless = match &spec.unless {
                Some(ex) => Some(build(&format!("^(?:{})", ex), &spec.label)?),
                None => None,
            };
            rules.push(Rule {
                pattern,
                unless,
                label: spec.label.clone(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            style,
            strip_country_qualifier: false,
            rules,
        })
    }

    /// Strip trailing "(USA)"-style qualifiers before matching. Used for
    /// institution names, which often carry the country in parentheses.
    pub fn with_country_qualifier_stripping(mut self) -> Self {
        self.strip_country_qualifier = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn style(&self) -> MatchStyle {
        self.style
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.label.as_str())
    }

    pub fn clean(&self, raw: &str) -> Option<String> {
        clean(raw, self.strip_country_qualifier)
    }

    pub fn resolve(&self, raw: &str) -> Resolution {
        let cleaned = match self.clean(raw) {
            Some(c) => c,
            None => return Resolution::Empty,
        };
        let low = cleaned.to_lowercase();
        match self.rules.iter().find(|rule| rule.matches(&low)) {
            Some(rule) => Resolution::Mapped(rule.label.clone()),
            None => Resolution::Unmapped(cleaned),
        }
    }

    pub fn canonicalize(&self, raw: &str) -> Option<String> {
        self.resolve(raw).into_label()
    }
}

pub fn is_empty_token(s: &str) -> bool {
    let t = s.trim();
    EMPTY_TOKENS.iter().any(|e| t.eq_ignore_ascii_case(e))
}

/// Normalize a raw name: fold typographic punctuation, collapse whitespace
/// and drop trailing separators. Returns `None` for empty tokens.
pub fn clean(raw: &str, strip_country_qualifier: bool) -> Option<String> {
    if is_empty_token(raw) {
        return None;
    }
    let folded = raw
        .trim()
        .replace('\u{2019}', "'")
        .replace(['\u{2013}', '\u{2014}'], "-");
    let mut s = WHITESPACE_RUN.replace_all(&folded, " ").into_owned();
    loop {
        let before = s.len();
        s = TRAILING_PUNCT.replace(&s, "").into_owned();
        if strip_country_qualifier {
            s = COUNTRY_QUALIFIER.replace(&s, "").into_owned();
        }
        if s.len() == before {
            break;
        }
    }
    if is_empty_token(&s) {
        None
    } else {
        Some(s)
    }
}

/// Split a semicolon-delimited field, dropping empty tokens.
pub fn split_list(field: &str) -> Vec<String> {
    field
        .split(';')
        .map(str::trim)
        .filter(|t| !is_empty_token(t))
        .map(str::to_string)
        .collect()
}

/// Split a semicolon-delimited field keeping positions: empty tokens become
/// `""` so later entries stay aligned with their author. Trailing empty
/// positions are dropped, and a field with no real entries yields `[]`.
pub fn split_positional(field: &str) -> Vec<String> {
    let mut items: Vec<String> = field
        .split(';')
        .map(|t| {
            if is_empty_token(t) {
                String::new()
            } else {
                t.trim().to_string()
            }
        })
        .collect();
    while items.last().map_or(false, String::is_empty) {
        items.pop();
    }
    items
}

/// Raw strings that fell through every rule, with occurrence counts.
#[derive(Debug, Default)]
pub struct UnmappedLog {
    counts: BTreeMap<String, u64>,
}

impl UnmappedLog {
    pub fn record(&mut self, resolution: &Resolution) {
        if let Resolution::Unmapped(cleaned) = resolution {
            *self.counts.entry(cleaned.clone()).or_insert(0) += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Entries ordered by count descending, then name.
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> =
            self.counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> RuleSet {
        RuleSet::compile(
            "sample",
            MatchStyle::Search,
            &[
                RuleSpec::new(r"\bchina\b", "China").unless(r".*hong\s*kong"),
                RuleSpec::new(r"\bhong\s*kong\b", "Hong Kong"),
                RuleSpec::new(r"\brutgers", "Rutgers University").unless(r"\s*business"),
                RuleSpec::new(r"\bkorea\b", "Korea (broad)"),
                RuleSpec::new(r"\bsouth korea\b", "South Korea"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn empty_tokens_resolve_to_none() {
        let set = sample_set();
        for raw in ["", "  ", "nan", "NaN", "None", "null", "NA", "n/a", "-", " ;"] {
            assert_eq!(set.canonicalize(raw), None, "input {:?}", raw);
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let set = sample_set();
        // The narrower "south korea" rule is listed later and never reached.
        assert_eq!(set.canonicalize("South Korea").as_deref(), Some("Korea (broad)"));
    }

    #[test]
    fn exclusion_looks_only_past_the_match() {
        let set = sample_set();
        assert_eq!(set.canonicalize("China, Hong Kong").as_deref(), Some("Hong Kong"));
        // Nothing follows "china" here, so the exclusion does not apply.
        assert_eq!(set.canonicalize("Hong Kong, China").as_deref(), Some("China"));
        assert_eq!(set.canonicalize("Beijing, China").as_deref(), Some("China"));
    }

    #[test]
    fn exclusion_is_anchored_at_match_end() {
        let set = sample_set();
        assert_eq!(
            set.resolve("Rutgers Business School"),
            Resolution::Unmapped("Rutgers Business School".to_string())
        );
        // "business" further along does not follow the match directly.
        assert_eq!(
            set.canonicalize("Rutgers, School of Business").as_deref(),
            Some("Rutgers University")
        );
    }

    #[test]
    fn unmatched_input_is_cleaned_but_kept() {
        let set = sample_set();
        assert_eq!(
            set.resolve("  New   Zealand.; "),
            Resolution::Unmapped("New Zealand".to_string())
        );
    }

    #[test]
    fn anchored_style_needs_whole_string() {
        let set = RuleSet::compile(
            "anchored",
            MatchStyle::Anchored,
            &[RuleSpec::new(r"us|usa", "United States")],
        )
        .unwrap();
        assert_eq!(set.canonicalize("USA").as_deref(), Some("United States"));
        assert_eq!(set.canonicalize("USA East").as_deref(), Some("USA East"));
    }

    #[test]
    fn invalid_pattern_names_the_label() {
        let err = RuleSet::compile("broken", MatchStyle::Search, &[RuleSpec::new("(", "Oops")])
            .unwrap_err();
        assert!(err.to_string().contains("Oops"));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn clean_folds_typography_and_qualifiers() {
        assert_eq!(clean("Côte d\u{2019}Ivoire", false).as_deref(), Some("Côte d'Ivoire"));
        assert_eq!(
            clean("Microsoft (United States).", true).as_deref(),
            Some("Microsoft")
        );
        assert_eq!(
            clean("Microsoft (United States).", false).as_deref(),
            Some("Microsoft (United States)")
        );
        assert_eq!(clean("Acme (USA) (UK)", true).as_deref(), Some("Acme"));
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let set = sample_set();
        for raw in ["china", "HONG KONG, china", "Seoul, Korea", "Atlantis;", "x  y"] {
            let once = set.canonicalize(raw);
            let twice = once.as_deref().and_then(|s| set.canonicalize(s));
            assert_eq!(once, twice, "input {:?}", raw);
        }
    }

    #[test]
    fn split_list_drops_empty_tokens() {
        assert_eq!(split_list(" A ; ;nan; B;-"), vec!["A", "B"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn split_positional_keeps_interior_gaps() {
        assert_eq!(split_positional("USA;;UK"), vec!["USA", "", "UK"]);
        assert_eq!(split_positional("USA; na ;"), vec!["USA"]);
        assert!(split_positional("nan").is_empty());
    }

    #[test]
    fn unmapped_log_orders_by_count() {
        let mut log = UnmappedLog::default();
        log.record(&Resolution::Unmapped("B".into()));
        log.record(&Resolution::Unmapped("A".into()));
        log.record(&Resolution::Unmapped("B".into()));
        log.record(&Resolution::Mapped("USA".into()));
        assert_eq!(log.sorted(), vec![("B", 2), ("A", 1)]);
    }
}
