//! Suite runner: resolves configuration, picks suites and drives them

use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use pagecheck::specs;
use pagecheck::{
    run_suites, run_suites_parallel, DomDriver, HarnessConfig, HarnessResult, Suite, SuiteReport,
};
use std::future::Future;
use std::path::Path;
use tracing::{debug, info};

/// Build the effective harness configuration: file, then environment,
/// then the explicit base URL
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn load_harness_config(
    path: Option<&Path>,
    base_url: Option<&str>,
) -> CliResult<HarnessConfig> {
    let config = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config file");
            HarnessConfig::load(path)?
        }
        None => HarnessConfig::new(),
    };
    let config = config.with_env_overrides();
    Ok(match base_url {
        Some(url) => config.with_base_url(url),
        None => config,
    })
}

/// Resolve the configuration for a `run` invocation and validate it
///
/// # Errors
///
/// Returns error if loading fails or the result is not usable
pub fn resolve_run_config(args: &RunArgs) -> CliResult<HarnessConfig> {
    let mut config = load_harness_config(args.config.as_deref(), args.base_url.as_deref())?;
    if args.no_preflight {
        config = config.with_preflight(false);
    }
    if args.headful {
        config.browser.headless = false;
    }
    if args.no_sandbox {
        config.browser.sandbox = false;
    }
    if let Some(ref path) = args.chromium {
        config.browser.chromium_path = Some(path.clone());
    }
    if let Some(ms) = args.load_timeout {
        config.timeouts.load_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

/// Pick suites by name; `all` selects every built-in suite
///
/// # Errors
///
/// Returns [`CliError::InvalidArgument`] for an unknown name
pub fn select_suites(name: &str) -> CliResult<Vec<Suite>> {
    if name == "all" {
        return Ok(specs::all());
    }
    specs::builtin(name).map(|suite| vec![suite]).ok_or_else(|| {
        CliError::invalid_argument(format!(
            "unknown suite {name:?} (expected one of: {}, all)",
            specs::BUILTIN_SUITES.join(", ")
        ))
    })
}

/// Runs suites and reports progress
#[derive(Debug)]
pub struct SuiteRunner {
    config: CliConfig,
    reporter: ProgressReporter,
}

impl SuiteRunner {
    /// Create a new suite runner
    #[must_use]
    pub fn new(config: CliConfig) -> Self {
        let reporter =
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
        Self { config, reporter }
    }

    /// The reporter used for progress and results
    #[must_use]
    pub const fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    /// Run the suites selected by `args` against a real browser
    ///
    /// # Errors
    ///
    /// Returns error if configuration or suite selection fails
    pub async fn run(&mut self, args: &RunArgs) -> CliResult<Vec<SuiteReport>> {
        let harness = resolve_run_config(args)?;
        let suites = select_suites(&args.suite)?;
        info!(
            base_url = %harness.base_url,
            suites = suites.len(),
            parallel = args.parallel,
            "starting run"
        );
        if self.config.verbosity.is_verbose() {
            self.reporter
                .info(&format!("Running against {}", harness.base_url));
        }

        let browser = &harness.browser;
        let make_driver = move || launch(browser);
        Ok(self
            .run_with(&suites, &harness, args.parallel, make_driver)
            .await)
    }

    /// Run `suites` on drivers produced by `make_driver`
    pub async fn run_with<F, Fut>(
        &mut self,
        suites: &[Suite],
        harness: &HarnessConfig,
        parallel: bool,
        make_driver: F,
    ) -> Vec<SuiteReport>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = HarnessResult<Box<dyn DomDriver>>>,
    {
        if parallel {
            self.reporter
                .start_progress(suites.len() as u64, "running suites in parallel");
            let reports = run_suites_parallel(suites, harness, &make_driver).await;
            self.reporter.increment(suites.len() as u64);
            self.reporter.finish();
            return reports;
        }

        self.reporter
            .start_progress(suites.len() as u64, "Starting...");
        let mut reports = Vec::with_capacity(suites.len());
        for suite in suites {
            self.reporter.set_message(suite.name());
            reports.extend(run_suites(std::slice::from_ref(suite), harness, &make_driver).await);
            self.reporter.increment(1);
        }
        self.reporter.finish();
        reports
    }
}

#[cfg(feature = "browser")]
async fn launch(browser: &pagecheck::BrowserConfig) -> HarnessResult<Box<dyn DomDriver>> {
    pagecheck::launch_driver(browser).await
}

#[cfg(not(feature = "browser"))]
async fn launch(_browser: &pagecheck::BrowserConfig) -> HarnessResult<Box<dyn DomDriver>> {
    Err(pagecheck::HarnessError::BrowserLaunchError {
        message: "pagecheck was built without the `browser` feature".to_string(),
    })
}
