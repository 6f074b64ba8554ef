//! Pagecheck CLI: run end-to-end suites against a live web app
//!
//! ## Usage
//!
//! ```bash
//! pagecheck run                                   # Run every built-in suite
//! pagecheck run --suite st_json --format json     # One suite, JSON report
//! pagecheck list                                  # Show suites and scenarios
//! pagecheck fingerprint icon.png                  # Published asset name
//! pagecheck config --config pagecheck.yaml        # Effective configuration
//! ```

use clap::Parser;
use pagecheck::{specs, AssetFingerprint, SuiteReport};
use pagecheck_cli::{
    load_harness_config, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, ConfigArgs,
    FingerprintArgs, ReportFormat, RunArgs, SuiteRunner, Verbosity,
};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    init_logging(&config);

    match cli.command {
        Commands::Run(args) => run_suites(config, &args),
        Commands::List => {
            run_list();
            Ok(())
        }
        Commands::Fingerprint(args) => run_fingerprint(&args),
        Commands::Config(args) => run_config(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_log_json(cli.log_json)
}

fn init_logging(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // A second init (tests, embedding) is harmless
    if config.log_json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

fn run_suites(config: CliConfig, args: &RunArgs) -> CliResult<()> {
    let start = Instant::now();
    let mut runner = SuiteRunner::new(config);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::test_execution(format!("failed to start runtime: {e}")))?;
    let reports = rt.block_on(runner.run(args))?;

    match args.format {
        ReportFormat::Text => {
            for report in &reports {
                runner.reporter().suite_report(report);
            }
        }
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&reports)
                .map_err(|e| CliError::report_generation(e.to_string()))?;
            println!("{json}");
        }
    }

    let passed: usize = reports.iter().map(SuiteReport::passed_count).sum();
    let failed: usize = reports.iter().map(SuiteReport::failed_count).sum();
    if args.format == ReportFormat::Text {
        runner.reporter().summary(passed, failed, start.elapsed());
    }

    if pagecheck::all_passed(&reports) {
        Ok(())
    } else {
        Err(CliError::test_execution(format!(
            "{failed} scenario(s) failed"
        )))
    }
}

fn run_list() {
    for suite in specs::all() {
        println!("{}", suite.name());
        for scenario in suite.scenarios() {
            println!("  - {}", scenario.description());
        }
    }
}

fn run_fingerprint(args: &FingerprintArgs) -> CliResult<()> {
    let fingerprint = AssetFingerprint::from_file(&args.file)?;
    println!("{}", fingerprint.file_name());
    Ok(())
}

fn run_config(args: &ConfigArgs) -> CliResult<()> {
    let config = load_harness_config(args.config.as_deref(), args.base_url.as_deref())?;
    let yaml =
        serde_yaml_ng::to_string(&config).map_err(|e| CliError::config(e.to_string()))?;
    print!("{yaml}");
    Ok(())
}
