//! Loading the papers table and expanding rows into per-author records.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::align::{align, Alignment};
use crate::canon::{is_empty_token, split_list, split_positional, RuleSet, UnmappedLog};

pub const COL_SN: &str = "SN";
pub const COL_AUTHORS: &str = "Authors";
pub const COL_AUTHOR_REGIONS: &str = "Author Regions";
pub const COL_AFFILIATIONS: &str = "Affiliations";
pub const COL_FOCUS_REGION: &str = "Focus Region";
pub const COL_DOMAIN: &str = "Domain";
pub const COL_YEAR: &str = "Year";

pub const UNKNOWN: &str = "Unknown";
pub const GLOBAL: &str = "Global";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DatasetError {
    #[error("input is missing required column(s): {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },
}

#[derive(Deserialize, Debug)]
struct RawRow {
    #[serde(rename = "SN", default)]
    sn: Option<String>,
    #[serde(rename = "Authors", default)]
    authors: Option<String>,
    #[serde(rename = "Author Regions", default)]
    author_regions: Option<String>,
    #[serde(rename = "Affiliations", default)]
    affiliations: Option<String>,
    #[serde(rename = "Focus Region", default)]
    focus_region: Option<String>,
    #[serde(rename = "Domain", default)]
    domain: Option<String>,
    #[serde(rename = "Year", default)]
    year: Option<String>,
}

/// One dataset row.
#[derive(Debug, Clone)]
pub struct Paper {
    pub sn: String,
    pub authors: Vec<String>,
    /// Positional: empty entries are kept as `""`.
    pub author_regions: Vec<String>,
    pub affiliations: Vec<String>,
    pub focus_region: Option<String>,
    pub domain: Option<String>,
    pub year: Option<i32>,
}

/// One author position on a paper with its resolved country.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorRecord<'p> {
    pub sn: &'p str,
    pub author: &'p str,
    pub country: String,
}

/// A paper after alignment and canonicalization.
#[derive(Debug)]
pub struct ExpandedPaper<'p> {
    /// Canonical Focus Region, or `Unknown`.
    pub focus: String,
    pub records: Vec<AuthorRecord<'p>>,
    /// Canonical, non-empty entries of the region list itself.
    pub region_countries: Vec<String>,
}

impl<'p> ExpandedPaper<'p> {
    /// Countries of the paper with author multiplicity. Papers without
    /// authors fall back to their region list, then to the focus country.
    pub fn countries(&self) -> Vec<&str> {
        if !self.records.is_empty() {
            self.records.iter().map(|r| r.country.as_str()).collect()
        } else if !self.region_countries.is_empty() {
            self.region_countries.iter().map(String::as_str).collect()
        } else {
            vec![self.focus.as_str()]
        }
    }

    pub fn first_author(&self) -> Option<&AuthorRecord<'p>> {
        self.records.first()
    }
}

impl Paper {
    /// Resolve the focus country, align the region list to the authors and
    /// canonicalize every position. Unresolvable positions take the focus
    /// country, and `Unknown` when there is none.
    pub fn expand<'p>(&'p self, rules: &RuleSet) -> ExpandedPaper<'p> {
        let focus = self
            .focus_region
            .as_deref()
            .and_then(|raw| rules.canonicalize(raw))
            .unwrap_or_else(|| UNKNOWN.to_string());

        let resolved: Vec<String> = self
            .author_regions
            .iter()
            .map(|raw| rules.canonicalize(raw).unwrap_or_default())
            .collect();

        let countries = align(&self.authors, &resolved, &focus);
        let records = self
            .authors
            .iter()
            .zip(countries)
            .map(|(author, country)| AuthorRecord {
                sn: &self.sn,
                author,
                country: country.to_string(),
            })
            .collect();

        let region_countries = resolved.iter().filter(|c| !c.is_empty()).cloned().collect();

        ExpandedPaper {
            focus,
            records,
            region_countries,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoadStats {
    pub rows_read: u64,
    pub generated_sn: u64,
    pub duplicate_sn: u64,
    pub without_authors: u64,
    pub without_domain: u64,
    pub without_year: u64,
    pub alignment: BTreeMap<Alignment, u64>,
}

impl LoadStats {
    pub fn log_current_stats(&self, stage: &str) {
        info!("--- Load Stats ({}) ---", stage);
        info!(" Rows read: {}", self.rows_read);
        info!(" SN generated from row index: {}", self.generated_sn);
        info!(" Duplicate SN values: {}", self.duplicate_sn);
        info!(" Rows without authors: {}", self.without_authors);
        info!(" Rows without domain: {}", self.without_domain);
        info!(" Rows without a usable year: {}", self.without_year);
        for (case, count) in &self.alignment {
            info!("    ↳ Region alignment '{}': {}", case.as_str(), count);
        }
        info!("------------------------------");
    }
}

#[derive(Debug)]
pub struct Dataset {
    columns: Vec<String>,
    pub papers: Vec<Paper>,
    pub stats: LoadStats,
}

impl Dataset {
    /// Open a CSV file, transparently decompressing `.gz` input.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file: {}", path.display()))?;
        let is_gz = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("gz"));
        let reader: Box<dyn Read> = if is_gz {
            Box::new(GzDecoder::new(BufReader::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Self::from_reader(reader)
            .with_context(|| format!("Failed to read dataset from {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let columns: Vec<String> = csv_reader
            .headers()
            .context("Failed to read CSV header row")?
            .iter()
            .map(str::to_string)
            .collect();
        debug!("Input columns: {:?}", columns);
        if !columns.iter().any(|c| c == COL_SN) {
            info!("No '{}' column; paper ids are 1-based row numbers.", COL_SN);
        }

        let rows = csv_reader
            .deserialize::<RawRow>()
            .enumerate()
            .map(|(index, row)| row.with_context(|| format!("Failed to parse CSV row {}", index + 1)))
            .collect::<Result<Vec<_>>>()?;

        // Generated ids must never collide with an explicit SN, including
        // one that appears on a later row.
        let mut taken_sn: HashSet<String> = rows.iter().filter_map(explicit_sn).collect();

        let mut stats = LoadStats::default();
        let mut papers = Vec::with_capacity(rows.len());
        let mut seen_sn: HashSet<String> = HashSet::new();

        for (index, row) in rows.into_iter().enumerate() {
            stats.rows_read += 1;

            let sn = match explicit_sn(&row) {
                Some(s) => s,
                None => {
                    stats.generated_sn += 1;
                    let sn = generated_sn(index, &taken_sn);
                    taken_sn.insert(sn.clone());
                    sn
                }
            };
            if !seen_sn.insert(sn.clone()) {
                stats.duplicate_sn += 1;
                warn!("Duplicate SN '{}' at row {}; distinct-paper counts will merge them.", sn, index + 1);
            }

            let authors = row.authors.as_deref().map(split_list).unwrap_or_default();
            let author_regions = row
                .author_regions
                .as_deref()
                .map(split_positional)
                .unwrap_or_default();
            let affiliations = row.affiliations.as_deref().map(split_list).unwrap_or_default();
            let focus_region = non_empty(row.focus_region);
            let domain = non_empty(row.domain);
            let year = row.year.as_deref().and_then(parse_year);

            if authors.is_empty() {
                stats.without_authors += 1;
            }
            if domain.is_none() {
                stats.without_domain += 1;
            }
            if year.is_none() {
                stats.without_year += 1;
            }
            *stats
                .alignment
                .entry(Alignment::classify(authors.len(), author_regions.len()))
                .or_insert(0) += 1;

            papers.push(Paper {
                sn,
                authors,
                author_regions,
                affiliations,
                focus_region,
                domain,
                year,
            });
        }

        Ok(Self {
            columns,
            papers,
            stats,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Fail with every missing column named at once.
    pub fn require_columns(&self, required: &[&str]) -> Result<(), DatasetError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DatasetError::MissingColumns { columns: missing })
        }
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    /// Country strings (focus and author regions) that no rule maps, with
    /// occurrence counts across the whole dataset.
    pub fn collect_unmapped(&self, rules: &RuleSet) -> UnmappedLog {
        let mut unmapped = UnmappedLog::default();
        for paper in &self.papers {
            for raw in paper.focus_region.iter().chain(&paper.author_regions) {
                unmapped.record(&rules.resolve(raw));
            }
        }
        unmapped
    }

    /// Number of distinct paper ids.
    pub fn distinct_papers(&self) -> usize {
        self.papers.iter().map(|p| p.sn.as_str()).collect::<HashSet<_>>().len()
    }
}

fn explicit_sn(row: &RawRow) -> Option<String> {
    row.sn
        .as_deref()
        .map(str::trim)
        .filter(|s| !is_empty_token(s))
        .map(str::to_string)
}

/// The 1-based row number, or `row-N`, `row-N-2`, ... when an explicit SN
/// already uses it.
fn generated_sn(index: usize, taken: &HashSet<String>) -> String {
    let row = index + 1;
    let mut candidate = row.to_string();
    let mut attempt = 1;
    while taken.contains(&candidate) {
        candidate = if attempt == 1 {
            format!("row-{}", row)
        } else {
            format!("row-{}-{}", row, attempt)
        };
        attempt += 1;
    }
    candidate
}

fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !is_empty_token(s))
}

/// Accepts "2021" as well as spreadsheet-style "2021.0".
fn parse_year(raw: &str) -> Option<i32> {
    let s = raw.trim();
    if let Ok(y) = s.parse::<i32>() {
        return Some(y);
    }
    match s.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 => Some(f as i32),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::rules::Canonicalizers;

    pub(crate) fn load(csv_text: &str) -> Dataset {
        Dataset::from_reader(csv_text.as_bytes()).unwrap()
    }

    #[test]
    fn sn_is_generated_when_absent() {
        let ds = load("Authors,Domain\nA;B,Health\nC,Law\n");
        let sns: Vec<&str> = ds.papers.iter().map(|p| p.sn.as_str()).collect();
        assert_eq!(sns, vec!["1", "2"]);
        assert_eq!(ds.stats.generated_sn, 2);
    }

    #[test]
    fn explicit_sn_is_kept_and_duplicates_counted() {
        let ds = load("SN,Authors\n10,A\n10,B\n,C\n");
        let sns: Vec<&str> = ds.papers.iter().map(|p| p.sn.as_str()).collect();
        assert_eq!(sns, vec!["10", "10", "3"]);
        assert_eq!(ds.stats.duplicate_sn, 1);
        assert_eq!(ds.distinct_papers(), 2);
    }

    #[test]
    fn generated_sn_never_reuses_an_explicit_one() {
        let ds = load("SN,Authors\n2,A\n,B\n");
        let sns: Vec<&str> = ds.papers.iter().map(|p| p.sn.as_str()).collect();
        assert_eq!(sns, vec!["2", "row-2"]);
        assert_eq!(ds.stats.duplicate_sn, 0);
        assert_eq!(ds.distinct_papers(), 2);

        // An explicit SN on a later row is reserved too.
        let ds = load("SN,Authors\n,A\n1,B\n");
        let sns: Vec<&str> = ds.papers.iter().map(|p| p.sn.as_str()).collect();
        assert_eq!(sns, vec!["row-1", "1"]);
        assert_eq!(ds.distinct_papers(), 2);
    }

    #[test]
    fn alignment_cases_are_counted_at_load() {
        let ds = load(
            "Authors,Author Regions\n\
             A;B;C,USA;UK\n\
             D;E,\n\
             F,Japan\n",
        );
        assert_eq!(ds.stats.alignment.get(&Alignment::Padded), Some(&1));
        assert_eq!(ds.stats.alignment.get(&Alignment::Fallback), Some(&1));
        assert_eq!(ds.stats.alignment.get(&Alignment::Positional), Some(&1));
    }

    #[test]
    fn missing_columns_are_all_named() {
        let ds = load("Authors,Year\nA,2020\n");
        let err = ds
            .require_columns(&[COL_AUTHORS, COL_AUTHOR_REGIONS, COL_DOMAIN])
            .unwrap_err();
        assert_eq!(
            err,
            DatasetError::MissingColumns {
                columns: vec!["Author Regions".to_string(), "Domain".to_string()]
            }
        );
        assert_eq!(
            err.to_string(),
            "input is missing required column(s): Author Regions, Domain"
        );
    }

    #[test]
    fn fields_are_split_and_cleaned() {
        let ds = load(
            "Authors,Author Regions,Focus Region,Domain,Year\n\
             \"A; B;nan\",\"USA;;UK\",n/a, Health ,2021.0\n",
        );
        let p = &ds.papers[0];
        assert_eq!(p.authors, vec!["A", "B"]);
        assert_eq!(p.author_regions, vec!["USA", "", "UK"]);
        assert_eq!(p.focus_region, None);
        assert_eq!(p.domain.as_deref(), Some("Health"));
        assert_eq!(p.year, Some(2021));
    }

    #[test]
    fn expand_aligns_and_canonicalizes() {
        let rules = Canonicalizers::builtin().unwrap();
        let ds = load(
            "SN,Authors,Author Regions,Focus Region\n\
             1,A;B;C,United States;england,Canada\n\
             2,D;E,,Hong Kong\n\
             3,F;G,;Korea,\n",
        );
        let p1 = ds.papers[0].expand(&rules.country);
        let c1: Vec<&str> = p1.records.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(c1, vec!["USA", "UK", "UK"]);
        assert_eq!(p1.focus, "Canada");

        let p2 = ds.papers[1].expand(&rules.country);
        let c2: Vec<&str> = p2.records.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(c2, vec!["Hong Kong", "Hong Kong"]);

        let p3 = ds.papers[2].expand(&rules.country);
        let c3: Vec<&str> = p3.records.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(c3, vec!["Unknown", "South Korea"]);

        assert_eq!(ds.collect_unmapped(&rules.country).sorted(), vec![("Canada", 1)]);
    }

    #[test]
    fn countries_fall_back_without_authors() {
        let rules = Canonicalizers::builtin().unwrap();
        let ds = load("Authors,Author Regions,Focus Region\n,USA;UK,China\n,,China\n");
        let a = ds.papers[0].expand(&rules.country);
        assert_eq!(a.countries(), vec!["USA", "UK"]);
        let b = ds.papers[1].expand(&rules.country);
        assert_eq!(b.countries(), vec!["China"]);
        assert!(b.first_author().is_none());
    }

    #[test]
    fn parse_year_accepts_float_years() {
        assert_eq!(parse_year("2019"), Some(2019));
        assert_eq!(parse_year(" 2020.0 "), Some(2020));
        assert_eq!(parse_year("2020.5"), None);
        assert_eq!(parse_year("n/a"), None);
        assert_eq!(parse_year("1e12"), None);
        assert_eq!(parse_year("-1e12"), None);
        assert_eq!(parse_year("inf"), None);
        assert_eq!(parse_year("NaN"), None);
    }
}
