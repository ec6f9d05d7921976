use std::fmt;

use clap::ValueEnum;

/// How one paper's credit is spread over countries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AttributionMode {
    /// Whole paper to its Focus Region.
    Focus,
    /// One unit per distinct author country.
    Participation,
    /// One unit split evenly across distinct author countries.
    Fractional,
    /// One unit per author instance.
    Authors,
    /// Whole paper to the first author's country.
    FirstAuthor,
}

impl AttributionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionMode::Focus => "focus",
            AttributionMode::Participation => "participation",
            AttributionMode::Fractional => "fractional",
            AttributionMode::Authors => "authors",
            AttributionMode::FirstAuthor => "first_author",
        }
    }

    pub fn is_fractional(&self) -> bool {
        matches!(self, AttributionMode::Fractional)
    }
}

impl fmt::Display for AttributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighting of country pairs in the collaboration matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PairWeighting {
    /// One count per pair per paper.
    Presence,
    /// count_A × count_B author pairs per paper.
    Multiplicity,
}

/// Which rows feed the denominator of per-column percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PercentScope {
    /// Every row of the table, including rows cut by top-N.
    All,
    /// Only the rows that are displayed.
    Displayed,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub mode: AttributionMode,
    /// `None` keeps every row.
    pub top_n: Option<usize>,
    pub top_domains: Option<usize>,
    pub include_unknown: bool,
    pub include_global: bool,
    pub percent_scope: PercentScope,
    pub pair_weighting: PairWeighting,
    pub include_diagonal: bool,
    /// Country summary: count distinct author names instead of author rows.
    pub unique_authors: bool,
    /// University report: only the first affiliation of each paper.
    pub first_author_only: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            mode: AttributionMode::Authors,
            top_n: Some(20),
            top_domains: None,
            include_unknown: false,
            include_global: false,
            percent_scope: PercentScope::All,
            pair_weighting: PairWeighting::Presence,
            include_diagonal: false,
            unique_authors: false,
            first_author_only: true,
        }
    }
}

impl ReportConfig {
    /// Whether a row label survives the Unknown/Global bucket filters.
    pub fn keeps_label(&self, label: &str) -> bool {
        if !self.include_unknown && label.eq_ignore_ascii_case(crate::dataset::UNKNOWN) {
            return false;
        }
        if !self.include_global && label.eq_ignore_ascii_case(crate::dataset::GLOBAL) {
            return false;
        }
        true
    }
}

/// CLI convention: 0 means "no limit".
pub fn limit_from_arg(n: usize) -> Option<usize> {
    if n == 0 {
        None
    } else {
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_filters() {
        let mut cfg = ReportConfig::default();
        assert!(!cfg.keeps_label("Unknown"));
        assert!(!cfg.keeps_label("global"));
        assert!(cfg.keeps_label("USA"));
        cfg.include_unknown = true;
        cfg.include_global = true;
        assert!(cfg.keeps_label("Unknown"));
        assert!(cfg.keeps_label("Global"));
    }

    #[test]
    fn zero_limit_is_unbounded() {
        assert_eq!(limit_from_arg(0), None);
        assert_eq!(limit_from_arg(5), Some(5));
    }
}
