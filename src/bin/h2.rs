//! h2 - Herd heritability analysis CLI
//!
//! Command-line interface for composable heritability analysis.

use clap::{Parser, Subcommand, ValueEnum};
use composable_h2::benchmark::{generate_herd, HerdConfig};
use composable_h2::data::RecordTable;
use composable_h2::error::{H2Error, Result};
use composable_h2::mating::{recommend_matings_with_config, AmbiguousSexPolicy, MatingConfig};
use composable_h2::model::{estimate_all, LmmConfig};
use composable_h2::normalize::normalize_with_summary;
use composable_h2::pipeline::{Pipeline, PipelineConfig};
use composable_h2::profile::{identify_traits, profile_quality};
use composable_h2::report::AnalysisReport;
use serde::Serialize;
use std::path::PathBuf;

/// Output format for structured results.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

/// CLI-friendly synthetic herd preset
#[derive(Debug, Clone, Copy, ValueEnum)]
enum HerdPreset {
    Ideal,
    Typical,
    High,
    Low,
    Small,
}

impl From<HerdPreset> for HerdConfig {
    fn from(preset: HerdPreset) -> Self {
        match preset {
            HerdPreset::Ideal => HerdConfig::ideal(),
            HerdPreset::Typical => HerdConfig::typical(),
            HerdPreset::High => HerdConfig::high_heritability(),
            HerdPreset::Low => HerdConfig::low_heritability(),
            HerdPreset::Small => HerdConfig::small(),
        }
    }
}

/// Composable Heritability Analysis
#[derive(Parser)]
#[command(name = "h2")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline from a YAML configuration file
    Run {
        /// Path to pipeline configuration YAML
        #[arg(short, long)]
        config: PathBuf,

        /// Path to herd records (CSV or TSV)
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the report (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// User or run label printed in the report
        #[arg(long, default_value = "h2")]
        label: String,
    },

    /// Run the full analysis: normalize, profile, pedigree, heritability, matings
    Analyze {
        /// Path to herd records (CSV or TSV)
        #[arg(short, long)]
        input: PathBuf,

        /// Sires kept per trait
        #[arg(long, default_value = "5")]
        top_males: usize,

        /// Dams kept per trait
        #[arg(long, default_value = "10")]
        top_females: usize,

        /// Output path for the report (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// User or run label printed in the report
        #[arg(long, default_value = "h2")]
        label: String,
    },

    /// Map raw columns onto the canonical schema and write the cleaned table
    Normalize {
        /// Path to herd records (CSV or TSV)
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the cleaned CSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Profile data quality of a table
    Profile {
        /// Path to herd records (CSV or TSV)
        #[arg(short, long)]
        input: PathBuf,

        /// Profile the table after normalization
        #[arg(long)]
        normalized: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Estimate heritability per trait
    Heritability {
        /// Path to herd records (CSV or TSV)
        #[arg(short, long)]
        input: PathBuf,

        /// Traits to estimate (canonical names; default: all with data)
        #[arg(short, long, value_delimiter = ',')]
        traits: Vec<String>,

        /// Confidence level of the intervals
        #[arg(long, default_value = "0.95")]
        confidence: f64,

        /// Output path for the estimates TSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format for stdout
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Recommend sire × dam pairings from phenotypic rankings
    Recommend {
        /// Path to herd records (CSV or TSV)
        #[arg(short, long)]
        input: PathBuf,

        /// Traits to rank on (canonical names; default: all with data)
        #[arg(short, long, value_delimiter = ',')]
        traits: Vec<String>,

        /// Sires kept per trait
        #[arg(long, default_value = "5")]
        top_males: usize,

        /// Dams kept per trait
        #[arg(long, default_value = "10")]
        top_females: usize,

        /// Drop animals whose role cannot be determined from both pools
        #[arg(long)]
        exclude_ambiguous: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate a synthetic herd and an example pipeline configuration
    Example {
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Herd preset
        #[arg(long, value_enum, default_value = "typical")]
        preset: HerdPreset,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Run {
            config,
            input,
            output,
            format,
            label,
        } => cmd_run(&config, &input, output.as_ref(), format, &label),

        Commands::Analyze {
            input,
            top_males,
            top_females,
            output,
            format,
            label,
        } => cmd_analyze(&input, top_males, top_females, output.as_ref(), format, &label),

        Commands::Normalize { input, output } => cmd_normalize(&input, &output),

        Commands::Profile {
            input,
            normalized,
            format,
        } => cmd_profile(&input, normalized, format),

        Commands::Heritability {
            input,
            traits,
            confidence,
            output,
            format,
        } => cmd_heritability(&input, &traits, confidence, output.as_ref(), format),

        Commands::Recommend {
            input,
            traits,
            top_males,
            top_females,
            exclude_ambiguous,
            format,
        } => cmd_recommend(&input, &traits, top_males, top_females, exclude_ambiguous, format),

        Commands::Example {
            output,
            preset,
            seed,
        } => cmd_example(&output, preset, seed),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load(input: &PathBuf) -> Result<RecordTable> {
    eprintln!("Loading records from {:?}...", input);
    let table = RecordTable::from_path(input)?;
    eprintln!("Loaded {} rows x {} columns", table.n_rows(), table.n_columns());
    Ok(table)
}

fn load_normalized(input: &PathBuf) -> Result<RecordTable> {
    let (table, summary) = normalize_with_summary(&load(input)?)?;
    eprintln!("{}", summary);
    Ok(table)
}

/// Traits given on the command line, or every trait with data.
fn resolve_traits(table: &RecordTable, traits: &[String]) -> Result<Vec<String>> {
    if traits.is_empty() {
        Ok(identify_traits(table)?.traits)
    } else {
        Ok(traits.to_vec())
    }
}

fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<Option<String>> {
    match format {
        OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(value)?)),
        OutputFormat::Yaml => Ok(Some(serde_yaml::to_string(value)?)),
        OutputFormat::Text => Ok(None),
    }
}

fn write_report(report: &AnalysisReport, output: Option<&PathBuf>, format: OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Text => report.to_markdown(),
        OutputFormat::Json => report.to_json()?,
        OutputFormat::Yaml => report.to_yaml()?,
    };
    match output {
        Some(path) => {
            std::fs::write(path, content)?;
            eprintln!("Wrote report to {:?}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}

/// Run a pipeline from configuration
fn cmd_run(
    config_path: &PathBuf,
    input: &PathBuf,
    output: Option<&PathBuf>,
    format: OutputFormat,
    label: &str,
) -> Result<()> {
    eprintln!("Loading pipeline configuration from {:?}...", config_path);
    let config_str = std::fs::read_to_string(config_path)?;
    let config = PipelineConfig::from_yaml(&config_str)?;

    let table = load(input)?;

    eprintln!("Running pipeline '{}'...", config.name);
    let context = Pipeline::from_config(&config).run(&table)?;
    write_report(&AnalysisReport::from_context(&context, label), output, format)
}

/// Run the full default analysis
fn cmd_analyze(
    input: &PathBuf,
    top_males: usize,
    top_females: usize,
    output: Option<&PathBuf>,
    format: OutputFormat,
    label: &str,
) -> Result<()> {
    let table = load(input)?;

    eprintln!("Running herd analysis...");
    let context = Pipeline::new()
        .name("herd-analysis")
        .normalize()
        .profile_quality()
        .analyze_pedigree()
        .estimate_heritability()
        .recommend_matings(top_males, top_females)
        .run(&table)?;

    if let Some(estimates) = &context.estimates {
        eprintln!(
            "Done! {} trait(s) estimated, {} failed",
            estimates.successful().len(),
            estimates.failed().len()
        );
    }
    write_report(&AnalysisReport::from_context(&context, label), output, format)
}

fn cmd_normalize(input: &PathBuf, output: &PathBuf) -> Result<()> {
    let table = load_normalized(input)?;
    eprintln!("Writing cleaned table to {:?}...", output);
    table.to_csv(output)?;
    eprintln!("Done! {} rows x {} columns", table.n_rows(), table.n_columns());
    Ok(())
}

fn cmd_profile(input: &PathBuf, normalized: bool, format: OutputFormat) -> Result<()> {
    let table = if normalized {
        load_normalized(input)?
    } else {
        load(input)?
    };
    let profile = profile_quality(&table);
    match render(&profile, format)? {
        Some(text) => println!("{}", text),
        None => println!("{}", profile),
    }
    Ok(())
}

fn cmd_heritability(
    input: &PathBuf,
    traits: &[String],
    confidence: f64,
    output: Option<&PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let table = load_normalized(input)?;
    let traits = resolve_traits(&table, traits)?;
    let config = LmmConfig {
        confidence_level: confidence,
        ..Default::default()
    };
    config.validate()?;

    eprintln!("Estimating heritability for {}...", traits.join(", "));
    let estimates = estimate_all(&table, &traits, &config);

    if let Some(path) = output {
        estimates.to_tsv(path)?;
        eprintln!("Wrote estimates to {:?}", path);
    }

    match render(&estimates, format)? {
        Some(text) => println!("{}", text),
        None => {
            for r in estimates.successful() {
                let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |x| format!("{:.3}", x));
                println!(
                    "{:<16} h2 = {} ± {}  CI [{}, {}]  ({} records, {} animals)",
                    r.trait_name,
                    fmt(r.h2),
                    fmt(r.standard_error),
                    fmt(r.ci_lower),
                    fmt(r.ci_upper),
                    r.n_records,
                    r.n_groups
                );
            }
            for (name, reason) in estimates.failed() {
                println!("{:<16} failed: {}", name, reason);
            }
        }
    }

    if estimates.successful().is_empty() {
        return Err(H2Error::Pipeline("No trait could be estimated".to_string()));
    }
    Ok(())
}

fn cmd_recommend(
    input: &PathBuf,
    traits: &[String],
    top_males: usize,
    top_females: usize,
    exclude_ambiguous: bool,
    format: OutputFormat,
) -> Result<()> {
    let table = load_normalized(input)?;
    let traits = resolve_traits(&table, traits)?;
    let config = MatingConfig {
        top_males,
        top_females,
        ambiguous_sex: if exclude_ambiguous {
            AmbiguousSexPolicy::ExcludeFromBoth
        } else {
            AmbiguousSexPolicy::KeepInBoth
        },
    };

    let recommendations = recommend_matings_with_config(&table, &traits, &config);
    match render(&recommendations, format)? {
        Some(text) => println!("{}", text),
        None => {
            if recommendations.is_empty() {
                println!("No mating recommendations generated.");
            }
            for r in &recommendations {
                println!("{} x {}  [{}]  {}", r.sire_id, r.dam_id, r.trait_focus, r.rationale);
            }
        }
    }
    Ok(())
}

/// Generate a synthetic herd and an example pipeline configuration
fn cmd_example(output: &PathBuf, preset: HerdPreset, seed: u64) -> Result<()> {
    let config = HerdConfig::from(preset).with_seed(seed);
    let herd = generate_herd(&config)?;
    herd.write_to_dir(output)?;
    eprintln!(
        "Wrote synthetic herd '{}' ({} rows, true h2 = {:.2}) to {:?}",
        config.name,
        herd.table.n_rows(),
        herd.truth.h2,
        output
    );

    let pipeline = Pipeline::new()
        .name("example-herd")
        .normalize()
        .profile_quality()
        .analyze_pedigree()
        .estimate_heritability()
        .recommend_matings(5, 10);
    let yaml = pipeline
        .to_config(Some("Example pipeline: cleaning, pedigree, heritability and matings"))
        .to_yaml()?;

    let pipeline_path = output.join("pipeline.yaml");
    std::fs::write(&pipeline_path, &yaml)?;
    eprintln!("Wrote example pipeline to {:?}", pipeline_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    Ok(())
}
