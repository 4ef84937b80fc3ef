//! recipeflow CLI Entry Point
//!
//! Compiles a recipe directory and submits it to Argo Workflows.
//!
//! # Usage
//!
//! ```bash
//! # Submit a recipe
//! recipeflow recipes/ice-basins
//!
//! # Print the rendered manifest without submitting
//! recipeflow recipes/ice-basins --dry-run
//!
//! # Submit, wait up to an hour, and archive on success
//! recipeflow recipes/ice-basins --wait --timeout 3600 --archive
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use colored::Colorize;
use log::{error, info};

use recipeflow::config::ENGINE_SETTINGS;
use recipeflow::execution::{render_manifest, SubmissionRequest};
use recipeflow::{
    load_recipe, ArgoEngine, DagCompiler, RetentionPolicy, WorkflowManager, WorkflowStatus,
    APP_NAME, VERSION,
};

/// Default seconds between two status polls.
const DEFAULT_POLL_INTERVAL: u64 = 5;

/// Default seconds to wait for a run to finish.
const DEFAULT_TIMEOUT: u64 = 3600;

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    recipe_dir: Option<PathBuf>,
    wait: bool,
    archive: bool,
    dry_run: bool,
    timeout: Duration,
    poll_interval: Duration,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recipe_dir: None,
            wait: false,
            archive: false,
            dry_run: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL),
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Recipe compiler for Argo Workflows");
    println!();
}

fn print_usage() {
    println!("Usage: recipeflow [OPTIONS] <RECIPE_DIR>");
    println!();
    println!("Arguments:");
    println!("  <RECIPE_DIR>          Directory holding meta.yml and the recipe shell file");
    println!();
    println!("Options:");
    println!("  --wait                Wait for the workflow to finish");
    println!("  --archive             Archive the workflow once it succeeds");
    println!("  --dry-run             Print the workflow manifest without submitting");
    println!("  --timeout SECS        Maximum wait in seconds (default: {})", DEFAULT_TIMEOUT);
    println!("  --poll-interval SECS  Seconds between status checks (default: {})", DEFAULT_POLL_INTERVAL);
    println!("  --verbose             Enable debug logging");
    println!("  --help                Show this help message");
    println!("  --version             Show version information");
    println!();
    println!("Environment:");
    println!("  ARGO_NAMESPACE, ARGO_SERVICE_ACCOUNT_NAME, ARGO_WORKFLOWS_SERVICE_URL,");
    println!("  ARGO_TOKEN, RECIPEFLOW_IMAGE");
}

fn parse_seconds(flag: &str, value: Option<&String>) -> Result<Duration, String> {
    let value = value.ok_or_else(|| format!("{} requires a number of seconds", flag))?;
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| format!("Invalid {} value: {}", flag, value))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--wait" => config.wait = true,
            "--archive" => config.archive = true,
            "--dry-run" => config.dry_run = true,
            "--verbose" | "-v" => config.verbose = true,
            "--timeout" => {
                i += 1;
                config.timeout = parse_seconds("--timeout", args.get(i))?;
            }
            "--poll-interval" => {
                i += 1;
                config.poll_interval = parse_seconds("--poll-interval", args.get(i))?;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.recipe_dir.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.recipe_dir = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    if config.recipe_dir.is_none() {
        return Err("Missing recipe directory".to_string());
    }

    Ok(config)
}

fn colored_status(status: WorkflowStatus) -> String {
    match status {
        WorkflowStatus::Succeeded => status.to_string().green().bold().to_string(),
        WorkflowStatus::Failed | WorkflowStatus::Error => status.to_string().red().bold().to_string(),
        WorkflowStatus::Pending | WorkflowStatus::Running => status.to_string().yellow().to_string(),
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    let recipe_dir = config.recipe_dir.ok_or("Missing recipe directory")?;
    let recipe = load_recipe(&recipe_dir).map_err(|e| {
        error!("Failed to load recipe: {}", e);
        e
    })?;

    let dag = DagCompiler::from_settings(&ENGINE_SETTINGS).compile(&recipe)?;
    let retention = RetentionPolicy::for_recipe(&recipe).with_archive(config.archive);

    if config.dry_run {
        info!("Mode: DRY RUN (nothing is submitted)");
        let manifest = render_manifest(&SubmissionRequest::new(&dag, retention), &ENGINE_SETTINGS);
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    info!("Argo server: {}", ENGINE_SETTINGS.server_url);
    let manager = WorkflowManager::new(ArgoEngine::new((*ENGINE_SETTINGS).clone())?);
    let run = manager.submit(&dag, retention)?;

    println!(
        "  {} {} ({})",
        "SUBMITTED".green().bold(),
        run.workflow_name,
        run.submitted_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if !config.wait {
        return Ok(());
    }

    let done = manager.await_terminal(&run, config.poll_interval, config.timeout)?;
    println!("  {} {}", colored_status(done.status), done.workflow_name);

    if done.is_successful() {
        Ok(())
    } else {
        Err(format!(
            "Workflow '{}' finished with status {}",
            done.workflow_name, done.status
        )
        .into())
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{}", format!("Error: {}", e).red());
            ExitCode::FAILURE
        }
    }
}
