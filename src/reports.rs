//! The six analyses. Each report checks its required columns, builds its
//! tables from expanded papers and writes them through [`OutputDir`].

use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::Result;
use clap::ValueEnum;
use log::{debug, info, warn};

use crate::aggregate::{attribute, distinct, percent, CrossTable, PairCounts, TableView, ViewOptions};
use crate::canon::UnmappedLog;
use crate::config::{AttributionMode, ReportConfig};
use crate::dataset::{
    Dataset, COL_AFFILIATIONS, COL_AUTHORS, COL_AUTHOR_REGIONS, COL_DOMAIN, COL_FOCUS_REGION,
    COL_YEAR, GLOBAL, UNKNOWN,
};
use crate::output::{cell_label, fmt_count, fmt_percent, fmt_weight, OutputDir};
use crate::rules::Canonicalizers;

const ALL_MODES: [AttributionMode; 5] = [
    AttributionMode::Focus,
    AttributionMode::Participation,
    AttributionMode::Fractional,
    AttributionMode::Authors,
    AttributionMode::FirstAuthor,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum ReportKind {
    CountrySummary,
    CountryDomain,
    Collaboration,
    UniversityDomain,
    DomainEvolution,
    DomainDistribution,
}

impl ReportKind {
    pub fn all() -> Vec<ReportKind> {
        ReportKind::value_variants().to_vec()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::CountrySummary => "country-summary",
            ReportKind::CountryDomain => "country-domain",
            ReportKind::Collaboration => "collaboration",
            ReportKind::UniversityDomain => "university-domain",
            ReportKind::DomainEvolution => "domain-evolution",
            ReportKind::DomainDistribution => "domain-distribution",
        }
    }

    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            ReportKind::CountrySummary | ReportKind::Collaboration => {
                &[COL_AUTHORS, COL_AUTHOR_REGIONS]
            }
            ReportKind::CountryDomain => &[COL_AUTHORS, COL_AUTHOR_REGIONS, COL_DOMAIN],
            ReportKind::UniversityDomain => &[COL_AFFILIATIONS, COL_DOMAIN],
            ReportKind::DomainEvolution => &[COL_YEAR, COL_DOMAIN],
            ReportKind::DomainDistribution => &[COL_DOMAIN],
        }
    }
}

/// Shared state of one run: inputs plus the output directory and the sanity
/// lines that end up in the run summary.
pub struct ReportRun<'a> {
    pub dataset: &'a Dataset,
    pub rules: &'a Canonicalizers,
    pub config: &'a ReportConfig,
    pub out: OutputDir,
    pub checks: Vec<String>,
}

impl<'a> ReportRun<'a> {
    pub fn new(
        dataset: &'a Dataset,
        rules: &'a Canonicalizers,
        config: &'a ReportConfig,
        out: OutputDir,
    ) -> Self {
        Self {
            dataset,
            rules,
            config,
            out,
            checks: Vec::new(),
        }
    }

    fn check(&mut self, line: String) {
        info!("    ↳ {}", line);
        self.checks.push(line);
    }

    pub fn run(&mut self, kind: ReportKind) -> Result<()> {
        self.dataset.require_columns(kind.required_columns())?;
        debug!("Running report '{}'", kind.as_str());
        match kind {
            ReportKind::CountrySummary => self.country_summary(),
            ReportKind::CountryDomain => self.country_domain(),
            ReportKind::Collaboration => self.collaboration(),
            ReportKind::UniversityDomain => self.university_domain(),
            ReportKind::DomainEvolution => self.domain_evolution(),
            ReportKind::DomainDistribution => self.domain_distribution(),
        }
    }

    /// Write the dataset-wide listing of country strings no rule maps.
    pub fn write_unmapped_countries(&mut self) -> Result<usize> {
        let unmapped = self.dataset.collect_unmapped(&self.rules.country);
        if unmapped.is_empty() {
            return Ok(0);
        }
        warn!(
            "{} distinct country string(s) did not match any rule; see unmapped_countries.csv",
            unmapped.len()
        );
        write_unmapped(&mut self.out, "unmapped_countries.csv", "Raw_Country", &unmapped)?;
        Ok(unmapped.len())
    }

    fn country_summary(&mut self) -> Result<()> {
        let (dataset, rules, cfg) = (self.dataset, self.rules, self.config);
        let mut author_rows: BTreeMap<String, u64> = BTreeMap::new();
        let mut author_names: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        let mut papers: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();

        let mut first_names: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        let mut first_papers: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        let mut first_seen: HashSet<&str> = HashSet::new();

        for paper in &dataset.papers {
            let expanded = paper.expand(&rules.country);
            for record in &expanded.records {
                if !cfg.keeps_label(&record.country) {
                    continue;
                }
                *author_rows.entry(record.country.clone()).or_insert(0) += 1;
                author_names
                    .entry(record.country.clone())
                    .or_default()
                    .insert(record.author);
                papers.entry(record.country.clone()).or_default().insert(record.sn);
            }

            // A repeated SN keeps its first occurrence only.
            if let Some(first) = expanded.first_author() {
                if cfg.keeps_label(&first.country) && first_seen.insert(first.sn) {
                    first_names
                        .entry(first.country.clone())
                        .or_default()
                        .insert(first.author);
                    first_papers
                        .entry(first.country.clone())
                        .or_default()
                        .insert(first.sn);
                }
            }
        }

        let suffix = if cfg.unique_authors { "unique" } else { "rows" };
        let mut all: Vec<(String, u64, u64)> = papers
            .iter()
            .map(|(country, sns)| {
                let authors = if cfg.unique_authors {
                    author_names.get(country).map_or(0, |s| s.len() as u64)
                } else {
                    author_rows.get(country).copied().unwrap_or(0)
                };
                (country.clone(), authors, sns.len() as u64)
            })
            .collect();
        sort_summary(&mut all);
        let authors_total: u64 = all.iter().map(|r| r.1).sum();
        self.out.write_table(
            &format!("country_authors_papers_summary_all_{}.csv", suffix),
            &["Country", "Authors", "Papers"],
            all.iter()
                .map(|(c, a, p)| vec![c.clone(), a.to_string(), p.to_string()]),
        )?;

        let mut first: Vec<(String, u64, u64)> = first_papers
            .iter()
            .map(|(country, sns)| {
                let authors = first_names.get(country).map_or(0, |s| s.len() as u64);
                (country.clone(), authors, sns.len() as u64)
            })
            .collect();
        sort_summary(&mut first);
        let first_total: u64 = first.iter().map(|r| r.2).sum();
        self.out.write_table(
            "country_authors_papers_summary_first.csv",
            &["Country", "Authors", "Papers", "AuthorsPerPaper"],
            first.iter().map(|(c, a, p)| {
                let ratio = if *p == 0 {
                    String::new()
                } else {
                    format!("{:.4}", *a as f64 / *p as f64)
                };
                vec![c.clone(), a.to_string(), p.to_string(), ratio]
            }),
        )?;

        self.check(format!(
            "country-summary: {} countries, {} author {} (all authors); {} papers by first-author country",
            all.len(),
            authors_total,
            suffix,
            first_total
        ));
        Ok(())
    }

    fn country_domain(&mut self) -> Result<()> {
        let (dataset, rules, cfg) = (self.dataset, self.rules, self.config);
        let mut table = CrossTable::default();
        let mut mode_sums = [0.0f64; ALL_MODES.len()];
        let mut papers_with_domain = 0u64;

        for paper in &dataset.papers {
            let Some(domain) = paper.domain.as_deref() else {
                continue;
            };
            papers_with_domain += 1;
            let expanded = paper.expand(&rules.country);
            for (i, mode) in ALL_MODES.iter().enumerate() {
                let weights = attribute(*mode, &expanded);
                mode_sums[i] += weights.iter().map(|(_, w)| w).sum::<f64>();
                if *mode == cfg.mode {
                    for (country, weight) in weights {
                        table.add(&country, domain, weight);
                    }
                }
            }
        }

        if table.is_empty() {
            warn!("No papers with a domain; country-domain tables will be empty.");
        }
        let mode = cfg.mode.as_str();
        self.out.write_table(
            &format!("country_domain_{}.csv", mode),
            &["Country", "Domain", "Count"],
            table
                .entries()
                .map(|(c, d, v)| vec![c.to_string(), d.to_string(), fmt_weight(v)]),
        )?;

        let keep = |label: &str| cfg.keeps_label(label);
        let view = table.view(&ViewOptions {
            keep_row: &keep,
            top_rows: cfg.top_n,
            top_columns: cfg.top_domains,
            percent_scope: cfg.percent_scope,
        });
        if view.rows.is_empty() {
            warn!("No country rows left for the country-domain view after filtering.");
        }
        self.out.write_table(
            &format!("country_domain_heatmap_{}_pct_count.csv", mode),
            &["Country", "Domain", "Count", "Percent", "Label"],
            view_rows(&view, cfg.mode.is_fractional()),
        )?;

        self.check(format!(
            "country-domain: {} papers with a domain, table total {} ({} mode)",
            papers_with_domain,
            fmt_weight(table.total()),
            mode
        ));
        for (mode, sum) in ALL_MODES.iter().zip(mode_sums) {
            self.check(format!("country-domain: {} mode sums to {}", mode, fmt_weight(sum)));
        }
        Ok(())
    }

    fn collaboration(&mut self) -> Result<()> {
        let (dataset, rules, cfg) = (self.dataset, self.rules, self.config);
        let mut pairs = PairCounts::default();
        let mut multi_country = 0u64;

        for paper in &dataset.papers {
            let expanded = paper.expand(&rules.region);
            let countries: Vec<&str> = expanded
                .records
                .iter()
                .map(|r| r.country.as_str())
                .filter(|c| cfg.keeps_label(c))
                .collect();
            if distinct(&countries).len() > 1 {
                multi_country += 1;
            }
            pairs.add_paper(&countries, cfg.pair_weighting, cfg.include_diagonal);
        }

        if pairs.is_empty() {
            warn!("No valid author-country data to build a collaboration matrix.");
            self.check("collaboration: no country pairs".to_string());
            return Ok(());
        }

        let mut ranked: Vec<(&str, &str, u64)> = pairs.pairs().collect();
        ranked.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| (a.0, a.1).cmp(&(b.0, b.1))));
        let pair_count = ranked.len();
        self.out.write_table(
            "country_collaboration_pairs.csv",
            &["CountryA", "CountryB", "Weight"],
            ranked
                .into_iter()
                .map(|(a, b, w)| vec![a.to_string(), b.to_string(), w.to_string()]),
        )?;

        let (countries, matrix) = pairs.matrix();
        let mut header = vec!["Country"];
        header.extend(countries.iter().copied());
        self.out.write_table(
            "country_collaboration_matrix.csv",
            &header,
            countries.iter().zip(&matrix).map(|(country, row)| {
                let mut cells = vec![country.to_string()];
                cells.extend(row.iter().map(u64::to_string));
                cells
            }),
        )?;

        self.check(format!(
            "collaboration: {} multi-country papers, {} country pairs, {} countries",
            multi_country,
            pair_count,
            countries.len()
        ));
        Ok(())
    }

    fn university_domain(&mut self) -> Result<()> {
        let (dataset, rules, cfg) = (self.dataset, self.rules, self.config);
        let has_focus = dataset.has_column(COL_FOCUS_REGION);
        let mut unmapped = UnmappedLog::default();
        let mut by_country: BTreeMap<(String, String, String), u64> = BTreeMap::new();
        let mut table = CrossTable::default();

        for paper in &dataset.papers {
            let Some(domain) = paper.domain.as_deref() else {
                continue;
            };
            let focus = if has_focus {
                paper
                    .focus_region
                    .as_deref()
                    .and_then(|raw| rules.country.canonicalize(raw))
                    .unwrap_or_else(|| UNKNOWN.to_string())
            } else {
                GLOBAL.to_string()
            };

            let affiliations = if cfg.first_author_only {
                &paper.affiliations[..paper.affiliations.len().min(1)]
            } else {
                &paper.affiliations[..]
            };
            for raw in affiliations {
                let resolution = rules.institution.resolve(raw);
                unmapped.record(&resolution);
                let Some(university) = resolution.into_label() else {
                    continue;
                };
                *by_country
                    .entry((university.clone(), focus.clone(), domain.to_string()))
                    .or_insert(0) += 1;
                table.add(&university, domain, 1.0);
            }
        }

        self.out.write_table(
            "university_country_domain_cleaned.csv",
            &["University", "Focus Region", "Domain", "Count"],
            by_country
                .iter()
                .map(|((u, f, d), n)| vec![u.clone(), f.clone(), d.clone(), n.to_string()]),
        )?;
        self.out.write_table(
            "university_domain_canonical.csv",
            &["University", "Domain", "Count"],
            table
                .entries()
                .map(|(u, d, v)| vec![u.to_string(), d.to_string(), fmt_weight(v)]),
        )?;
        write_unmapped(&mut self.out, "unmapped_institutions.csv", "Raw_Institution", &unmapped)?;
        if !unmapped.is_empty() {
            info!(
                "{} distinct institution string(s) kept as-is; see unmapped_institutions.csv",
                unmapped.len()
            );
        }

        let keep_all = |_: &str| true;
        let view = table.view(&ViewOptions {
            keep_row: &keep_all,
            top_rows: cfg.top_n,
            top_columns: cfg.top_domains,
            percent_scope: cfg.percent_scope,
        });
        let file_name = if cfg.first_author_only {
            "top_university_domain_first.csv"
        } else {
            "top_university_domain.csv"
        };
        self.out.write_table(
            file_name,
            &["University", "Domain", "Count", "Percent", "Label"],
            view_rows(&view, false),
        )?;

        self.check(format!(
            "university-domain: {} affiliation rows across {} institutions, {} unmapped",
            fmt_weight(table.total()),
            table.row_totals().len(),
            unmapped.len()
        ));
        Ok(())
    }

    fn domain_evolution(&mut self) -> Result<()> {
        let dataset = self.dataset;
        let total_papers = dataset.len() as f64;
        let mut counts: BTreeMap<(i32, &str), u64> = BTreeMap::new();
        for paper in &dataset.papers {
            if let (Some(year), Some(domain)) = (paper.year, paper.domain.as_deref()) {
                *counts.entry((year, domain)).or_insert(0) += 1;
            }
        }

        let counted: u64 = counts.values().sum();
        self.out.write_table(
            "domain_evolution_over_time.csv",
            &["Year", "Domain", "Papers", "Percent"],
            counts.iter().map(|((year, domain), n)| {
                vec![
                    year.to_string(),
                    domain.to_string(),
                    n.to_string(),
                    fmt_percent(percent(*n as f64, total_papers)),
                ]
            }),
        )?;

        let years: BTreeSet<i32> = counts.keys().map(|(y, _)| *y).collect();
        self.check(format!(
            "domain-evolution: {} of {} papers have a year and domain, {} year(s)",
            counted,
            dataset.len(),
            years.len()
        ));
        Ok(())
    }

    fn domain_distribution(&mut self) -> Result<()> {
        let dataset = self.dataset;
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for domain in dataset.papers.iter().filter_map(|p| p.domain.as_deref()) {
            *counts.entry(domain).or_insert(0) += 1;
        }
        let total: u64 = counts.values().sum();

        let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let domains = ranked.len();
        self.out.write_table(
            "overall_domain_distribution.csv",
            &["Domain", "Papers", "Percent"],
            ranked.into_iter().map(|(domain, n)| {
                vec![
                    domain.to_string(),
                    n.to_string(),
                    fmt_percent(percent(n as f64, total as f64)),
                ]
            }),
        )?;

        self.check(format!(
            "domain-distribution: {} papers over {} domain(s)",
            total, domains
        ));
        Ok(())
    }
}

/// Papers descending, then authors descending, then country name.
fn sort_summary(rows: &mut [(String, u64, u64)]) {
    rows.sort_by(|a, b| {
        b.2.cmp(&a.2)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.0.cmp(&b.0))
    });
}

/// Long form of a view: one row per displayed cell.
fn view_rows(view: &TableView, fractional: bool) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(view.rows.len() * view.columns.len());
    for (i, row) in view.rows.iter().enumerate() {
        for (j, column) in view.columns.iter().enumerate() {
            let count = view.counts[i][j];
            let pct = view.percents[i][j];
            rows.push(vec![
                row.clone(),
                column.clone(),
                fmt_count(count, fractional),
                fmt_percent(pct),
                cell_label(pct, count, fractional),
            ]);
        }
    }
    rows
}

fn write_unmapped(out: &mut OutputDir, file_name: &str, column: &str, log: &UnmappedLog) -> Result<()> {
    out.write_table(
        file_name,
        &[column, "Count"],
        log.sorted()
            .into_iter()
            .map(|(raw, n)| vec![raw.to_string(), n.to_string()]),
    )?;
    Ok(())
}
