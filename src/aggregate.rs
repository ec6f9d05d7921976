//! Per-paper attribution and the tables built from it.
//!
//! Every attribution function looks at one expanded paper only; tables are
//! plain accumulators over those results.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{AttributionMode, PairWeighting, PercentScope};
use crate::dataset::ExpandedPaper;

/// Distinct values in first-seen order.
pub fn distinct<'a>(items: &[&'a str]) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    items.iter().copied().filter(|c| seen.insert(*c)).collect()
}

/// Credit per country for one paper under `mode`.
pub fn attribute(mode: AttributionMode, paper: &ExpandedPaper<'_>) -> Vec<(String, f64)> {
    match mode {
        AttributionMode::Focus => vec![(paper.focus.clone(), 1.0)],
        AttributionMode::FirstAuthor => paper
            .first_author()
            .map(|r| vec![(r.country.clone(), 1.0)])
            .unwrap_or_default(),
        AttributionMode::Participation => distinct(&paper.countries())
            .into_iter()
            .map(|c| (c.to_string(), 1.0))
            .collect(),
        AttributionMode::Fractional => {
            let countries = distinct(&paper.countries());
            let share = 1.0 / countries.len() as f64;
            countries.into_iter().map(|c| (c.to_string(), share)).collect()
        }
        AttributionMode::Authors => {
            let instances: Vec<&str> = paper.records.iter().map(|r| r.country.as_str()).collect();
            let counts = country_counts(&instances);
            distinct(&instances)
                .into_iter()
                .map(|c| (c.to_string(), counts[c] as f64))
                .collect()
        }
    }
}

pub fn country_counts<'a>(countries: &[&'a str]) -> BTreeMap<&'a str, u64> {
    let mut counts = BTreeMap::new();
    for c in countries {
        *counts.entry(*c).or_insert(0) += 1;
    }
    counts
}

fn by_weight_desc(a: &(&str, f64), b: &(&str, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(b.0))
}

/// Top `n` keys by weight, ties broken by key.
pub fn top_keys<'a>(weights: &BTreeMap<&'a str, f64>, n: Option<usize>) -> Vec<&'a str> {
    let mut ranked: Vec<(&str, f64)> = weights.iter().map(|(k, v)| (*k, *v)).collect();
    ranked.sort_by(by_weight_desc);
    if let Some(n) = n {
        ranked.truncate(n);
    }
    ranked.into_iter().map(|(k, _)| k).collect()
}

/// `numerator / denominator` as a percentage, undefined for a zero
/// denominator.
pub fn percent(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !denominator.is_finite() {
        None
    } else {
        Some(numerator / denominator * 100.0)
    }
}

/// Sparse (row, column) → weight table.
#[derive(Debug, Default, Clone)]
pub struct CrossTable {
    cells: BTreeMap<(String, String), f64>,
}

/// Displayed slice of a [`CrossTable`] with per-column percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub counts: Vec<Vec<f64>>,
    pub percents: Vec<Vec<Option<f64>>>,
}

pub struct ViewOptions<'a> {
    pub keep_row: &'a dyn Fn(&str) -> bool,
    pub top_rows: Option<usize>,
    pub top_columns: Option<usize>,
    pub percent_scope: PercentScope,
}

impl CrossTable {
    pub fn add(&mut self, row: &str, column: &str, weight: f64) {
        *self
            .cells
            .entry((row.to_string(), column.to_string()))
            .or_insert(0.0) += weight;
    }

    pub fn get(&self, row: &str, column: &str) -> f64 {
        self.cells
            .get(&(row.to_string(), column.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.cells.values().sum()
    }

    /// Cells ordered by row, then column.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.cells
            .iter()
            .map(|((r, c), v)| (r.as_str(), c.as_str(), *v))
    }

    pub fn row_totals(&self) -> BTreeMap<&str, f64> {
        let mut totals = BTreeMap::new();
        for (r, _, v) in self.entries() {
            *totals.entry(r).or_insert(0.0) += v;
        }
        totals
    }

    fn column_totals_over(&self, keep_row: &dyn Fn(&str) -> bool) -> BTreeMap<&str, f64> {
        let mut totals = BTreeMap::new();
        for (r, c, v) in self.entries() {
            if keep_row(r) {
                *totals.entry(c).or_insert(0.0) += v;
            }
        }
        totals
    }

    /// Filter rows, keep the top rows by total, optionally the top columns
    /// among them, and compute column-wise percentages. Displayed rows and
    /// columns are sorted by label.
    pub fn view(&self, opts: &ViewOptions<'_>) -> TableView {
        let row_totals: BTreeMap<&str, f64> = self
            .row_totals()
            .into_iter()
            .filter(|&(r, _)| (opts.keep_row)(r))
            .collect();
        let mut rows = top_keys(&row_totals, opts.top_rows);
        rows.sort_unstable();
        let shown: BTreeSet<&str> = rows.iter().copied().collect();

        let displayed_totals = self.column_totals_over(&|r: &str| shown.contains(r));
        let mut columns = top_keys(&displayed_totals, opts.top_columns);
        columns.sort_unstable();

        let denominators = match opts.percent_scope {
            PercentScope::All => self.column_totals_over(opts.keep_row),
            PercentScope::Displayed => displayed_totals.clone(),
        };

        let counts: Vec<Vec<f64>> = rows
            .iter()
            .map(|r| columns.iter().map(|c| self.get(r, c)).collect())
            .collect();
        let percents = counts
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&columns)
                    .map(|(v, c)| percent(*v, denominators.get(c).copied().unwrap_or(0.0)))
                    .collect()
            })
            .collect();

        TableView {
            rows: rows.into_iter().map(str::to_string).collect(),
            columns: columns.into_iter().map(str::to_string).collect(),
            counts,
            percents,
        }
    }
}

/// Country-pair collaboration tallies.
#[derive(Debug, Default)]
pub struct PairCounts {
    pairs: BTreeMap<(String, String), u64>,
    diagonal: BTreeMap<String, u64>,
}

impl PairCounts {
    /// Add one paper given its author countries (with multiplicity).
    pub fn add_paper(&mut self, countries: &[&str], weighting: PairWeighting, include_diagonal: bool) {
        let counts = country_counts(countries);
        let keys: Vec<&str> = counts.keys().copied().collect();

        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                let w = match weighting {
                    PairWeighting::Presence => 1,
                    PairWeighting::Multiplicity => counts[a] * counts[b],
                };
                *self
                    .pairs
                    .entry((a.to_string(), b.to_string()))
                    .or_insert(0) += w;
            }
        }

        if include_diagonal {
            for a in &keys {
                let n = counts[a];
                let w = match weighting {
                    PairWeighting::Presence => 1,
                    PairWeighting::Multiplicity => n * (n - 1) / 2,
                };
                *self.diagonal.entry(a.to_string()).or_insert(0) += w;
            }
        }
    }

    /// Weight for an unordered pair; `a == b` reads the diagonal.
    pub fn get(&self, a: &str, b: &str) -> u64 {
        if a == b {
            return self.diagonal.get(a).copied().unwrap_or(0);
        }
        let key = if a < b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        self.pairs.get(&key).copied().unwrap_or(0)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str, u64)> {
        self.pairs.iter().map(|((a, b), w)| (a.as_str(), b.as_str(), *w))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.diagonal.is_empty()
    }

    /// Countries ordered by weighted degree (off-diagonal), then name.
    pub fn ordered_countries(&self) -> Vec<&str> {
        let mut degree: BTreeMap<&str, f64> = BTreeMap::new();
        for (a, b, w) in self.pairs() {
            *degree.entry(a).or_insert(0.0) += w as f64;
            *degree.entry(b).or_insert(0.0) += w as f64;
        }
        for a in self.diagonal.keys() {
            degree.entry(a.as_str()).or_insert(0.0);
        }
        top_keys(&degree, None)
    }

    /// Symmetric matrix over [`Self::ordered_countries`].
    pub fn matrix(&self) -> (Vec<&str>, Vec<Vec<u64>>) {
        let countries = self.ordered_countries();
        let matrix = countries
            .iter()
            .map(|a| countries.iter().map(|b| self.get(a, b)).collect())
            .collect();
        (countries, matrix)
    }
}
