use clap::Parser;
use colored::Colorize;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use cppdead::cache::TuCache;
use cppdead::compiledb;
use cppdead::report::{sort_records, ReportFormat, Reporter};
use cppdead::{Config, Driver};

/// CppDead - Fast dead function detection for C/C++
#[derive(Parser, Debug)]
#[command(name = "cppdead")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the project root directory
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Compilation database (default: <root>/compile_commands.json)
    #[arg(short = 'p', long, value_name = "FILE")]
    compile_commands: Option<PathBuf>,

    /// Extract compile commands from a build log instead
    /// (one command line per row, e.g. `ninja -t commands` output)
    #[arg(long, value_name = "FILE", conflicts_with = "compile_commands")]
    commands_log: Option<PathBuf>,

    /// Project-relative subpaths to exclude (can be specified multiple times)
    #[arg(short, long)]
    exclude: Vec<PathBuf>,

    /// Compiler binary used to produce AST dumps
    #[arg(long, value_name = "BIN")]
    ast_dumper: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "terminal")]
    format: OutputFormat,

    /// Output file (for json/lines formats)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Include used declarations in json output
    #[arg(long)]
    all: bool,

    /// Analyze translation units in parallel
    #[arg(long)]
    parallel: bool,

    /// Disable the per-translation-unit cache
    #[arg(long)]
    no_cache: bool,

    /// Clear the cache before running
    #[arg(long)]
    clear_cache: bool,

    /// Custom cache directory (default: <root>/.cppdead-cache)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
enum OutputFormat {
    #[default]
    Terminal,
    Json,
    Lines,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Terminal => ReportFormat::Terminal,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Lines => ReportFormat::Lines,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    info!("CppDead v{}", env!("CARGO_PKG_VERSION"));

    // Exit codes: 0 clean, 1 unused declarations found, 2 tool failure,
    // so CI can tell a finding from a broken run.
    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(report) => {
            eprintln!("{:?}", report);
            ExitCode::from(2)
        }
    }
}

/// Run the analysis, returning the number of unused declarations.
fn run(cli: &Cli) -> Result<usize> {
    let project_root = std::fs::canonicalize(&cli.path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Project root not found: {}", cli.path.display()))?;

    let config = load_config(cli, &project_root)?;

    run_analysis(&config, cli, &project_root)
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(cli: &Cli, project_root: &PathBuf) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::from_default_locations(project_root)?
    };

    // Override with CLI arguments
    if !cli.exclude.is_empty() {
        config.exclude.extend(cli.exclude.clone());
    }
    if let Some(dumper) = &cli.ast_dumper {
        config.ast_dumper = dumper.clone();
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache.dir = Some(dir.clone());
    }

    Ok(config)
}

fn run_analysis(config: &Config, cli: &Cli, project_root: &PathBuf) -> Result<usize> {
    use std::time::Instant;

    let start_time = Instant::now();

    // Step 1: Enumerate translation units
    let commands = if let Some(log_path) = &cli.commands_log {
        info!("Extracting compile commands from {}...", log_path.display());
        compiledb::from_log(log_path, project_root).into_diagnostic()?
    } else {
        let db_path = cli
            .compile_commands
            .clone()
            .or_else(|| config.compile_commands.as_ref().map(|p| project_root.join(p)))
            .unwrap_or_else(|| project_root.join("compile_commands.json"));
        info!("Loading compilation database from {}...", db_path.display());
        compiledb::load(&db_path).into_diagnostic()?
    };

    if commands.is_empty() {
        println!("{}", "No C/C++ translation units found.".yellow());
        return Ok(0);
    }

    info!("Found {} translation units", commands.len());

    // Step 2: Set up the cache
    let cache_dir = config
        .cache
        .dir
        .clone()
        .unwrap_or_else(|| TuCache::default_dir(project_root));
    let cache = TuCache::new(cache_dir);

    if cli.clear_cache {
        cache.clear().into_diagnostic()?;
        info!("Cache cleared");
    }

    // Step 3: Scan and analyze every unit
    let mut driver = Driver::new(
        project_root.clone(),
        config.exclude.clone(),
        config.ast_dumper.clone(),
    );
    if config.cache.enabled {
        driver = driver.with_cache(cache);
    }

    let mut records = driver.analyze_all(&commands, cli.parallel)?;
    sort_records(&mut records);

    let unused = records.iter().filter(|r| !r.used).count();
    info!(
        "Analyzed {} declarations, {} unused",
        records.len(),
        unused
    );

    // Step 4: Report results
    let reporter = Reporter::new(cli.format.clone().into(), cli.output.clone(), cli.all);
    reporter.report(&records)?;

    let elapsed = start_time.elapsed();
    info!("Analysis completed in {:.2}s", elapsed.as_secs_f64());

    Ok(unused)
}
