//! Climate alignment CLI
//!
//! The `alignment` command scores loan portfolios against decarbonisation
//! scenarios.
//!
//! ## Commands
//!
//! - `validate-config`: Load and validate a parameter file
//! - `scenarios`: List the scenarios available in a scenario library
//! - `compute`: Run an analysis and print or persist the report
//! - `regroup`: Collapse a persisted report onto fewer facets
//! - `verify-report`: Check a persisted report against its digest

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use alignment_core::reporting::{render_summary_md, write_summary_md};
use alignment_core::{
    aggregator, read_report, write_report, AlignmentCalculator, AlignmentReport, AnalysisRequest,
    CompanyDataset, ConfigStore, LoanRecord, ScenarioLibrary,
};

#[derive(Parser)]
#[command(name = "alignment")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Climate alignment scoring for loan portfolios", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Parameter file (YAML)
    #[arg(long, global = true, env = "ALIGNMENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the parameter file
    ValidateConfig,

    /// List (scenario set, pathway, start year) combinations in a library
    Scenarios {
        /// Scenario library (JSON)
        #[arg(short, long)]
        scenarios: PathBuf,
    },

    /// Run an alignment analysis
    Compute(ComputeArgs),

    /// Regroup a persisted report onto a subset of its facets
    Regroup {
        /// Report run directory (contains report.json and report.digest)
        #[arg(short, long)]
        report: PathBuf,

        /// Facets to keep; none gives the portfolio total
        #[arg(short, long = "facet")]
        facets: Vec<String>,
    },

    /// Verify a persisted report against its digest
    VerifyReport {
        /// Report run directory
        #[arg(short, long)]
        report: PathBuf,
    },
}

#[derive(Args)]
struct ComputeArgs {
    /// Loan book (JSON array of loan records)
    #[arg(long)]
    loans: PathBuf,

    /// Company production, profiles and ownership (JSON)
    #[arg(long)]
    companies: PathBuf,

    /// Scenario library (JSON)
    #[arg(long)]
    scenarios: PathBuf,

    #[arg(long)]
    scenario_set: String,

    #[arg(long)]
    pathway: String,

    #[arg(long)]
    start_year: i32,

    /// Grouping facet, repeatable (default: company_id)
    #[arg(short, long = "facet")]
    facets: Vec<String>,

    #[arg(long, default_value = "5")]
    horizon: i32,

    #[arg(long, default_value = "3.0")]
    limit: f64,

    /// Keep loans on the borrowing entity instead of its parent
    #[arg(long)]
    no_parents: bool,

    /// Score regional sectors against global targets
    #[arg(long)]
    no_region_file: bool,

    /// Write report.json and report.digest under this directory
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Also write a markdown summary to this path
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    alignment_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::ValidateConfig => cmd_validate_config(cli.config.as_deref()),
        Commands::Scenarios { scenarios } => cmd_scenarios(&scenarios),
        Commands::Compute(args) => cmd_compute(cli.config.as_deref(), &args),
        Commands::Regroup { report, facets } => cmd_regroup(&report, &facets),
        Commands::VerifyReport { report } => cmd_verify_report(&report),
    }
}

fn read_json_file<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file: {:?}", what, path))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {} file: {:?}", what, path))
}

fn load_config(path: Option<&Path>) -> Result<ConfigStore> {
    let path = path.context("No parameter file given (use --config or ALIGNMENT_CONFIG)")?;
    ConfigStore::load(path).with_context(|| format!("Invalid parameter file: {:?}", path))
}

fn cmd_validate_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    let plans = config.sector_plans()?;
    println!("Parameter file OK: {} active sector(s)", plans.len());
    for plan in &plans {
        println!(
            "  {:<12} {:<4} weight={} regional={}",
            plan.sector,
            plan.approach().to_string(),
            plan.economic_weight,
            plan.regional
        );
    }
    Ok(())
}

fn cmd_scenarios(path: &Path) -> Result<()> {
    let library: ScenarioLibrary = read_json_file(path, "scenario")?;
    let available = library.available();
    if available.is_empty() {
        println!("No scenarios found in {:?}", path);
        return Ok(());
    }
    for key in available {
        println!("{}\t{}\t{}", key.scenario_set, key.pathway, key.start_year);
    }
    Ok(())
}

fn build_request(args: &ComputeArgs) -> AnalysisRequest {
    let mut request = AnalysisRequest::new(&args.scenario_set, &args.pathway, args.start_year)
        .with_horizon(args.horizon)
        .with_limit(args.limit)
        .with_only_parents(!args.no_parents)
        .with_region_file(!args.no_region_file);
    if !args.facets.is_empty() {
        request = request.with_facets(args.facets.iter().cloned());
    }
    request
}

fn cmd_compute(config: Option<&Path>, args: &ComputeArgs) -> Result<()> {
    let config = load_config(config)?;
    let loans: Vec<LoanRecord> = read_json_file(&args.loans, "loan")?;
    let companies: CompanyDataset = read_json_file(&args.companies, "company")?;
    let scenarios: ScenarioLibrary = read_json_file(&args.scenarios, "scenario")?;

    let calculator = AlignmentCalculator::new(config, scenarios)?;
    let request = build_request(args);
    let outcome = calculator
        .compute_alignment(&loans, &companies, &request)
        .context("Analysis failed")?;
    info!(
        run_id = %outcome.run_id,
        rows = outcome.results.len(),
        gaps = outcome.audit.len(),
        "analysis complete"
    );

    let report = AlignmentReport::from_outcome(&outcome);
    if let Some(path) = &args.summary {
        write_summary_md(path, &report)?;
    }
    match &args.out {
        Some(dir) => {
            let path = write_report(&report, dir).context("Failed to write report")?;
            println!("Report written to {:?}", path);
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn cmd_regroup(run_dir: &Path, facets: &[String]) -> Result<()> {
    let report =
        read_report(run_dir).with_context(|| format!("Failed to read report: {:?}", run_dir))?;
    let regrouped = aggregator::regroup(&report.results, facets)?;
    println!("{}", serde_json::to_string_pretty(&regrouped)?);
    Ok(())
}

fn cmd_verify_report(run_dir: &Path) -> Result<()> {
    let report =
        read_report(run_dir).with_context(|| format!("Failed to verify report: {:?}", run_dir))?;
    println!("Report verified: run {}", report.run_id);
    print!("{}", render_summary_md(&report));
    Ok(())
}
