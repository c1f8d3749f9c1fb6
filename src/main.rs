//! Terralift CLI entrypoint.
//!
//! This is the main entrypoint for the terralift command-line tool.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use terralift::cli::{Cli, Commands, OutputFormatter};
use terralift::config::{find_config_file, ConfigParser, ConfigValidator, StackConfig};
use terralift::engine::{DeploymentEngine, HttpEngineClient};
use terralift::error::{ConfigError, Result, TerraliftError};
use terralift::stack::Stack;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Graph { edges } => cmd_graph(cli.config.as_ref(), edges, &formatter),
        Commands::Deploy { yes } => cmd_deploy(cli.config.as_ref(), yes, &formatter).await,
    }
}

/// Initialize a new stack.
fn cmd_init(path: &PathBuf, force: bool) -> Result<()> {
    info!("Initializing new Terralift stack in: {}", path.display());

    let config_path = path.join("terralift.stack.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    // Check if files exist
    if !force && config_path.exists() {
        eprintln!("Stack file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    // Create directory if needed
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    // Write stack template
    let config_template = include_str!("../templates/terralift.stack.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("Created: {}", config_path.display());

    // Write .env.example
    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    // Write/update .gitignore
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        if !existing.contains(".env") {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# Terralift")?;
            writeln!(file, ".env")?;
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, ".env\n")?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nStack initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and fill in your engine credentials");
    eprintln!("  2. Edit terralift.stack.yaml with your resource declarations");
    eprintln!("  3. Run 'terralift validate' to check the stack");
    eprintln!("  4. Run 'terralift graph' to inspect the dependency order");
    eprintln!("  5. Run 'terralift deploy' to realize the stack");

    Ok(())
}

/// Validate the stack configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;

    // Validate
    let validator = ConfigValidator::new();
    let result = validator.validate(&config)?;

    formatter.success("Stack configuration is valid!");
    if show_warnings && !result.warnings.is_empty() {
        eprintln!("\nWarnings:");
        for warning in &result.warnings {
            eprintln!("  - {warning}");
        }
    }

    // Show summary
    eprintln!("\nStack summary:");
    eprintln!("  Project: {}", config.project.name);
    eprintln!("  Environment: {}", config.project.environment);
    eprintln!("  Resources: {}", config.resources.len());
    eprintln!("  Outputs: {}", config.outputs.len());

    Ok(())
}

/// Compile and display the dependency graph.
fn cmd_graph(
    config_path: Option<&PathBuf>,
    edges: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let stack = Stack::from_config(config)?;

    let output = formatter.format_graph(stack.graph(), edges);
    eprintln!("{output}");

    Ok(())
}

/// Deploy the stack.
async fn cmd_deploy(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = create_engine_client(&config)?;
    let stack = Stack::from_config(config)?;

    // Show what will be realized
    let output = formatter.format_graph(stack.graph(), false);
    eprintln!("{output}");

    // Confirm
    if !auto_approve {
        eprint!(
            "Deploy {} declarations for stack '{}'? [y/N]: ",
            stack.graph().len(),
            stack.name()
        );
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Deploy cancelled.");
            return Ok(());
        }
    }

    let deployment = stack.deploy(engine).await?;

    let output = formatter.format_report(&deployment.report, &deployment.outputs);
    eprintln!("{output}");

    if deployment.report.success() {
        formatter.success(&format!("Stack '{}' deployed", stack.name()));
        Ok(())
    } else {
        if deployment.report.is_partial() {
            formatter.warning(
                "Some declarations realized before the failure; the stack is partially deployed",
            );
        }
        formatter.error(&format!("Deployment finished with failures: {}", deployment.report));
        Err(TerraliftError::internal("Deployment failed"))
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads the stack configuration with .env and environment overrides.
fn load_config(config_path: Option<&PathBuf>) -> Result<StackConfig> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading stack from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(
        config_file
            .parent()
            .unwrap_or_else(|| std::path::Path::new(".")),
    );
    parser.load_dotenv()?;

    parser.load_with_env(&config_file)
}

/// Creates the deployment engine client from configuration.
fn create_engine_client(config: &StackConfig) -> Result<Arc<dyn DeploymentEngine>> {
    let endpoint = config
        .engine
        .endpoint
        .clone()
        .or_else(ConfigParser::get_engine_endpoint)
        .ok_or_else(|| {
            TerraliftError::Config(ConfigError::MissingEnvVar {
                name: String::from("TERRALIFT_ENGINE_ENDPOINT"),
            })
        })?;
    let token = ConfigParser::get_engine_token()?;

    let client = HttpEngineClient::with_timeout(&endpoint, &token, config.engine.timeout_secs)?;
    Ok(Arc::new(client))
}
