//! Ensemble operator CLI entrypoint.
//!
//! This is the main entrypoint for the ensemble-operator command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use ensemble_set_operator::cli::{
    Cli, Commands, DiffSummary, FailedPass, OutputFormatter, WorkloadStatus,
};
use ensemble_set_operator::config::{
    find_config_file, load_manifest, ConfigParser, ConfigValidator, LoggingConfig, OperatorConfig,
};
use ensemble_set_operator::error::{ReconcileError, Result};
use ensemble_set_operator::reconciler::{
    PassReport, ReconcileSettings, ReconciliationContext, SetReconciler, Trigger,
};
use ensemble_set_operator::rollout::{DiffEngine, GenerationStrategy, SpecializationRegistry};
use ensemble_set_operator::store::{LocalWorkloadStore, WorkloadApi, WorkloadKey};

use clap::Parser;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Operator configuration together with the parser that located it.
struct LoadedConfig {
    config: OperatorConfig,
    parser: ConfigParser,
}

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Validation needs a real file; the other commands run on defaults
    let require_file = matches!(cli.command, Commands::Validate { .. });
    let loaded = match load_config(cli.config.as_ref(), require_file) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&loaded.config.logging, cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, loaded)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Loads the configuration file, `.env` and environment overrides.
fn load_config(explicit: Option<&PathBuf>, require_file: bool) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => Some(path.clone()),
        None => match find_config_file(std::env::current_dir()?) {
            Ok(path) => Some(path),
            Err(e) if require_file => return Err(e),
            Err(_) => None,
        },
    };

    let base = path
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;

    let config = match &path {
        Some(path) => parser.load_with_env(path)?,
        None => {
            let mut config = OperatorConfig::default();
            ConfigParser::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
            config
        }
    };

    Ok(LoadedConfig { config, parser })
}

/// Main async entry point.
async fn run(cli: Cli, loaded: LoadedConfig) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(&loaded, warnings, &formatter),
        Commands::Diff {
            current,
            desired,
            kind,
            detailed,
        } => cmd_diff(&loaded.config, &current, &desired, &kind, detailed, &formatter),
        Commands::Reconcile {
            manifests,
            kind,
            trigger,
            delete,
        } => cmd_reconcile(&loaded, manifests, &kind, trigger, delete, &formatter).await,
        Commands::Status => cmd_status(&loaded, &formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(
    loaded: &LoadedConfig,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = &loaded.config;
    let validator = ConfigValidator::new();

    let findings = validator.check(config);
    for error in &findings.errors {
        eprintln!("  ✗ {error}");
    }
    let result = validator.validate(config)?;

    emit(&formatter.format_validation(&result, show_warnings))?;

    let registry = SpecializationRegistry::from_rules(&config.workloads);
    eprintln!("\nConfiguration summary:");
    eprintln!("  Namespace: {}", config.operator.namespace);
    eprintln!("  Generation annotation: {}", config.operator.generation_annotation);
    eprintln!("  Workload kinds: {}", registry.kinds().collect::<Vec<_>>().join(", "));
    eprintln!("  Store: {}", loaded.parser.store_dir(config).display());

    Ok(())
}

/// Show the rollout decision between two manifests.
fn cmd_diff(
    config: &OperatorConfig,
    current: &Path,
    desired: &Path,
    kind: &str,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    ConfigValidator::new().validate(config)?;

    let registry = SpecializationRegistry::from_rules(&config.workloads);
    let specialization = registry.get(kind)?;

    let current = load_manifest(current)?;
    let desired = load_manifest(desired)?;
    let key = WorkloadKey::for_object(&desired, &config.operator.namespace)?;

    let engine = DiffEngine::new(&config.operator.generation_annotation)?;
    let diff = engine.compute(&current, &desired)?;

    let ctx = ReconciliationContext::new(kind, key, Trigger::Manual);
    let summary = DiffSummary {
        kind: kind.to_string(),
        rules: specialization.policy().rules(),
        matched: specialization.policy().evaluate(&diff),
        increments_generation: specialization.should_increment_generation(&ctx, &diff),
        diff,
    };

    emit(&formatter.format_diff(&summary, detailed))
}

/// Reconcile the local store towards the given manifests.
async fn cmd_reconcile(
    loaded: &LoadedConfig,
    manifests: Vec<PathBuf>,
    kind: &str,
    trigger: Trigger,
    delete: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = &loaded.config;
    ConfigValidator::new().validate(config)?;

    let registry = SpecializationRegistry::from_rules(&config.workloads);
    let strategy: Arc<dyn GenerationStrategy> = registry.get(kind)?;

    let store = Arc::new(LocalWorkloadStore::with_base_dir(
        loaded.parser.store_dir(config),
    ));
    info!("Using workload store at {}", store.base_dir().display());

    let reconciler = Arc::new(SetReconciler::new(
        store,
        strategy,
        ReconcileSettings::from(config),
    )?);
    info!(
        "Reconciling {} manifest(s), up to {} attempts per pass",
        manifests.len(),
        reconciler.settings().max_attempts
    );

    let mut tasks = JoinSet::new();
    for manifest in manifests {
        let reconciler = Arc::clone(&reconciler);
        let namespace = config.operator.namespace.clone();
        let kind = kind.to_string();

        tasks.spawn(async move {
            let label = manifest.display().to_string();
            let result: Result<PassReport> = async {
                let object = load_manifest(&manifest)?;
                let key = WorkloadKey::for_object(&object, &namespace)?;
                let ctx = ReconciliationContext::new(kind, key.clone(), trigger);
                let desired = (!delete).then_some(object);
                reconciler.reconcile(&ctx, &key, desired).await
            }
            .await;
            (label, result)
        });
    }

    let mut reports: Vec<PassReport> = Vec::new();
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(report))) => reports.push(report),
            Ok((label, Err(e))) => {
                warn!("Reconciliation of {label} failed: {e}");
                failures.push(FailedPass {
                    resource: label,
                    error: e.to_string(),
                });
            }
            Err(e) => failures.push(FailedPass {
                resource: String::from("<task>"),
                error: e.to_string(),
            }),
        }
    }

    reports.sort_by(|a, b| a.resource.cmp(&b.resource));
    failures.sort_by(|a, b| a.resource.cmp(&b.resource));
    debug!("{} passes finished, {} failed", reports.len(), failures.len());

    emit(&formatter.format_reports(&reports, &failures))?;

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::Aborted {
            reason: format!(
                "{} of {} passes failed",
                failures.len(),
                failures.len() + reports.len()
            ),
        }
        .into())
    }
}

/// List stored workloads.
async fn cmd_status(loaded: &LoadedConfig, formatter: &OutputFormatter) -> Result<()> {
    let config = &loaded.config;
    let store = LocalWorkloadStore::with_base_dir(loaded.parser.store_dir(config));

    let workloads: Vec<WorkloadStatus> = store
        .list()
        .await?
        .iter()
        .map(|object| WorkloadStatus::from_object(object, &config.operator.generation_annotation))
        .collect();

    emit(&formatter.format_status(&workloads))
}

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", output.trim_end())?;
    stdout.flush()?;
    Ok(())
}
