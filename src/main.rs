use std::{
    fs::File,
    io::Write,
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use time::macros::format_description;

mod aggregate;
mod align;
mod canon;
mod config;
mod dataset;
mod output;
mod reports;
mod rules;

use config::{limit_from_arg, AttributionMode, PairWeighting, PercentScope, ReportConfig};
use dataset::Dataset;
use output::OutputDir;
use reports::{ReportKind, ReportRun};
use rules::{Canonicalizers, RulesFile};

#[derive(Parser)]
#[command(name = "Paper Geography Statistics")]
#[command(about = "Canonicalizes author countries, institutions and domains of a papers table and writes country, collaboration, university and domain reports as CSV.")]
#[command(version = "1.0.0")]
struct Cli {
    #[arg(short, long, help = "Input CSV file (optionally .gz compressed)", required = true)]
    input: String,

    #[arg(short, long, help = "Output directory for report CSVs and the run summary", required = true)]
    output_dir: String,

    #[arg(short, long, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,

    #[arg(short, long, value_enum, value_delimiter = ',', help = "Reports to run, comma separated (default: all)")]
    reports: Vec<ReportKind>,

    #[arg(short, long, value_enum, default_value = "authors", help = "Country attribution mode for the country-domain report")]
    mode: AttributionMode,

    #[arg(short = 'n', long, default_value = "20", help = "Rows kept in heatmap views (0 for all)")]
    top_n: usize,

    #[arg(long, default_value = "0", help = "Domains kept in heatmap views (0 for all)")]
    top_domains: usize,

    #[arg(long, help = "Keep the Unknown country bucket in views and summaries")]
    include_unknown: bool,

    #[arg(long, help = "Keep the Global bucket in views and summaries")]
    include_global: bool,

    #[arg(long, value_enum, default_value = "all", help = "Rows used as the denominator of column percentages")]
    percent_scope: PercentScope,

    #[arg(long, value_enum, default_value = "presence", help = "Weighting of country pairs in the collaboration report")]
    pair_weighting: PairWeighting,

    #[arg(long, help = "Count same-country collaborations on the matrix diagonal")]
    include_diagonal: bool,

    #[arg(long, help = "Country summary counts distinct author names instead of author rows")]
    unique_authors: bool,

    #[arg(long, help = "University report uses every affiliation instead of the first one")]
    all_affiliations: bool,

    #[arg(long, help = "JSON file replacing one or more built-in rule tables")]
    rules: Option<String>,
}

impl Cli {
    fn report_config(&self) -> ReportConfig {
        ReportConfig {
            mode: self.mode,
            top_n: limit_from_arg(self.top_n),
            top_domains: limit_from_arg(self.top_domains),
            include_unknown: self.include_unknown,
            include_global: self.include_global,
            percent_scope: self.percent_scope,
            pair_weighting: self.pair_weighting,
            include_diagonal: self.include_diagonal,
            unique_authors: self.unique_authors,
            first_author_only: !self.all_affiliations,
        }
    }

    fn selected_reports(&self) -> Vec<ReportKind> {
        if self.reports.is_empty() {
            return ReportKind::all();
        }
        let mut selected = self.reports.clone();
        selected.sort();
        selected.dedup();
        selected
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s {}ms", seconds, elapsed.subsec_millis())
    }
}

fn calculate_median(numbers: &mut [f64]) -> Option<f64> {
    if numbers.is_empty() {
        return None;
    }
    numbers.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let len = numbers.len();
    let mid = len / 2;
    if len % 2 == 0 {
        Some((numbers[mid - 1] + numbers[mid]) / 2.0)
    } else {
        Some(numbers[mid])
    }
}

fn load_rules(path: Option<&str>) -> Result<Canonicalizers> {
    let rules = match path {
        Some(p) => {
            info!("Loading rule overrides from {}", p);
            Canonicalizers::with_overrides(RulesFile::load(&PathBuf::from(p))?)?
        }
        None => Canonicalizers::builtin()?,
    };
    for set in [&rules.country, &rules.region, &rules.institution] {
        info!(
            "Rule set '{}': {} rules ({:?} matching)",
            set.name(),
            set.len(),
            set.style()
        );
        debug!(
            "Rule set '{}' labels: {}",
            set.name(),
            set.labels().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(rules)
}

fn main() -> Result<()> {
    let main_start_time = Instant::now();
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", cli.log_level);
            LevelFilter::Info
        }
    };
    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .init()?;

    info!("Starting Paper Geography Statistics v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.report_config();
    let selected = cli.selected_reports();
    debug!("Report configuration: {:?}", config);
    info!(
        "Reports selected: {}",
        selected.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
    );

    let rules = load_rules(cli.rules.as_deref())?;

    let input_path = PathBuf::from(&cli.input);
    info!("Reading papers from {}", input_path.display());
    let load_start_time = Instant::now();
    let dataset = Dataset::open(&input_path)?;
    debug!("Columns: {}", dataset.columns().join(", "));
    info!(
        "Loaded {} rows ({} distinct papers) in {}",
        dataset.len(),
        dataset.distinct_papers(),
        format_elapsed(load_start_time.elapsed())
    );
    dataset.stats.log_current_stats("Loaded");

    if dataset.is_empty() {
        warn!("Input {} has no data rows. Exiting.", input_path.display());
        return Ok(());
    }

    // Fail before writing anything if a selected report cannot run.
    for kind in &selected {
        dataset
            .require_columns(kind.required_columns())
            .with_context(|| format!("Report '{}' cannot run on {}", kind.as_str(), input_path.display()))?;
    }

    let output_dir = OutputDir::create(&PathBuf::from(&cli.output_dir))?;
    info!("Output directory: {}", output_dir.path().display());
    let summary_file_path = output_dir.join("run_summary.txt");

    let mut run = ReportRun::new(&dataset, &rules, &config, output_dir);

    info!("--- Starting Reports ---");
    let reports_start_time = Instant::now();

    let progress_bar = ProgressBar::new(selected.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut failed: Vec<(ReportKind, String)> = Vec::new();
    for kind in &selected {
        progress_bar.set_message(format!("Report: {}", kind.as_str()));
        let report_start = Instant::now();
        match run.run(*kind) {
            Ok(()) => info!(
                "Report '{}' finished in {}",
                kind.as_str(),
                format_elapsed(report_start.elapsed())
            ),
            Err(e) => {
                error!("Report '{}' failed: {:#}", kind.as_str(), e);
                failed.push((*kind, format!("{:#}", e)));
            }
        }
        progress_bar.inc(1);
    }
    progress_bar.finish_with_message("Reports complete.");

    let unmapped_countries = run.write_unmapped_countries()?;

    let mut authors_per_paper: Vec<f64> = dataset
        .papers
        .iter()
        .filter(|p| !p.authors.is_empty())
        .map(|p| p.authors.len() as f64)
        .collect();
    let median_authors = calculate_median(&mut authors_per_paper);

    info!("-------------------- FINAL SUMMARY --------------------");
    info!(" Total execution time: {}", format_elapsed(main_start_time.elapsed()));
    info!(" Report time: {}", format_elapsed(reports_start_time.elapsed()));
    info!(" Rows: {} ({} distinct papers)", dataset.len(), dataset.distinct_papers());
    match median_authors {
        Some(median) => info!(" Median authors per paper (based on {} papers with authors): {:.1}", authors_per_paper.len(), median),
        None => info!(" Median authors per paper: N/A (no papers with authors)"),
    }
    info!(" Reports run: {} ({} failed)", selected.len(), failed.len());
    info!(" Files written: {}", run.out.written().len());
    info!(" Distinct unmapped country strings: {}", unmapped_countries);
    info!("-------------------------------------------------------");

    info!("Writing summary text to {}", summary_file_path.display());
    {
        let stats = &dataset.stats;
        let mut writer = File::create(&summary_file_path)
            .with_context(|| format!("Failed to create summary file: {}", summary_file_path.display()))?;
        writeln!(writer, "--- Paper Geography Statistics Summary ---")?;
        writeln!(writer, "Timestamp: {}", time::OffsetDateTime::now_utc())?;
        writeln!(writer, "Input File: {}", cli.input)?;
        writeln!(writer, "Output Directory: {}", cli.output_dir)?;
        writeln!(writer, "Total Execution Time: {}", format_elapsed(main_start_time.elapsed()))?;
        writeln!(writer, "--- Configuration ---")?;
        writeln!(writer, "  Attribution mode: {}", config.mode)?;
        writeln!(writer, "  Top rows: {}", config.top_n.map_or("all".to_string(), |n| n.to_string()))?;
        writeln!(writer, "  Top domains: {}", config.top_domains.map_or("all".to_string(), |n| n.to_string()))?;
        writeln!(writer, "  Include Unknown: {}", config.include_unknown)?;
        writeln!(writer, "  Include Global: {}", config.include_global)?;
        writeln!(writer, "  Percent scope: {:?}", config.percent_scope)?;
        writeln!(writer, "  Pair weighting: {:?}", config.pair_weighting)?;
        writeln!(writer, "  Diagonal: {}", config.include_diagonal)?;
        writeln!(writer, "  Unique authors: {}", config.unique_authors)?;
        writeln!(writer, "  First affiliation only: {}", config.first_author_only)?;
        writeln!(writer, "  Rules file: {}", cli.rules.as_deref().unwrap_or("built-in"))?;
        writeln!(writer, "--- Input ---")?;
        writeln!(writer, "Rows Read: {}", stats.rows_read)?;
        writeln!(writer, "Distinct Papers: {}", dataset.distinct_papers())?;
        writeln!(writer, "  SN generated: {}", stats.generated_sn)?;
        writeln!(writer, "  Duplicate SN: {}", stats.duplicate_sn)?;
        writeln!(writer, "  Without authors: {}", stats.without_authors)?;
        writeln!(writer, "  Without domain: {}", stats.without_domain)?;
        writeln!(writer, "  Without year: {}", stats.without_year)?;
        for (case, count) in &stats.alignment {
            writeln!(writer, "  Region alignment {}: {}", case.as_str(), count)?;
        }
        match median_authors {
            Some(median) => writeln!(writer, "Median Authors per Paper (based on {} papers with authors): {:.1}", authors_per_paper.len(), median)?,
            None => writeln!(writer, "Median Authors per Paper: N/A")?,
        }
        writeln!(writer, "Distinct Unmapped Country Strings: {}", unmapped_countries)?;
        writeln!(writer, "--- Sanity Checks ---")?;
        for line in &run.checks {
            writeln!(writer, "  {}", line)?;
        }
        writeln!(writer, "--- Reports ---")?;
        for kind in &selected {
            let status = failed
                .iter()
                .find(|(k, _)| k == kind)
                .map_or("ok".to_string(), |(_, e)| format!("FAILED: {}", e));
            writeln!(writer, "  {}: {}", kind.as_str(), status)?;
        }
        writeln!(writer, "--- Files Written ---")?;
        for (path, rows) in run.out.written() {
            writeln!(writer, "  {} ({} rows)", path.display(), rows)?;
        }
        writeln!(writer, "--- End Summary ---")?;
    }

    if !failed.is_empty() {
        Err(anyhow!("{} of {} reports failed; see the log and {}", failed.len(), selected.len(), summary_file_path.display()))
    } else {
        Ok(())
    }
}
