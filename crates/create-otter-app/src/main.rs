//! create-otter-app - bootstrap a new Otter project.
//!
//! Creates the project directory, installs the scripts package and hands
//! the project over to the initializer the package ships.

use anyhow::Result;
use clap::Parser;
use console::style;
use otter_create::{Bootstrap, BootstrapError, BootstrapOptions, Progress, ScriptInitializer};
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

mod config;
mod info;

const SCRIPTS_VERSION_HELP: &str = "\
Only <project-directory> is required.

A custom --scripts-version can be one of:
  - a specific registry version: 0.8.2
  - a specific registry tag: @next
  - a custom fork published on the registry: my-otter-scripts
  - a local path relative to the current working directory: file:../my-otter-scripts
  - a .tgz archive: https://mysite.com/my-otter-scripts-0.8.2.tgz
  - a .tar.gz archive: https://mysite.com/my-otter-scripts-0.8.2.tar.gz
  - a git repository: git+https://github.com/org/my-otter-scripts.git#v1.0.0
It is not needed unless you specifically want to use a fork.";

#[derive(Parser)]
#[command(
    name = "create-otter-app",
    version,
    about = "Create a new Otter project",
    override_usage = "create-otter-app <project-directory> [OPTIONS]",
    after_help = SCRIPTS_VERSION_HELP
)]
struct Cli {
    /// Directory to create the project in
    #[arg(value_name = "project-directory")]
    project_directory: Option<String>,

    /// Print additional logs and pass --verbose to the package manager
    #[arg(long)]
    verbose: bool,

    /// Use a non-standard version of the scripts package
    #[arg(long, value_name = "alternative-package")]
    scripts_version: Option<String>,

    /// Install with yarn instead of npm
    #[arg(long)]
    use_yarn: bool,

    /// Package manager executable to run
    #[arg(long, value_name = "PROGRAM")]
    package_manager: Option<String>,

    /// Print environment debug info
    #[arg(long)]
    info: bool,

    /// Print --info output as JSON
    #[arg(long, requires = "info")]
    json: bool,

    /// Config file path
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn options(&self, project: String, original_cwd: PathBuf) -> BootstrapOptions {
        BootstrapOptions {
            project,
            verbose: self.verbose,
            scripts_version: self.scripts_version.clone(),
            original_cwd,
        }
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let mut filter = EnvFilter::from_default_env().add_directive("warn".parse()?);
    if verbose {
        filter = filter
            .add_directive("otter_create=debug".parse()?)
            .add_directive("create_otter_app=debug".parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn print_missing_project() {
    eprintln!("Please specify the project directory:");
    eprintln!(
        "  {} {}",
        style("create-otter-app").cyan(),
        style("<project-directory>").green()
    );
    eprintln!();
    eprintln!("For example:");
    eprintln!(
        "  {} {}",
        style("create-otter-app").cyan(),
        style("my-otter-app").green()
    );
    eprintln!();
    eprintln!(
        "Run {} to see all options.",
        style("create-otter-app --help").cyan()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let original_cwd = std::env::current_dir()?;
    let mut config = config::load_config(cli.config.as_deref(), &original_cwd)?;
    config.apply_overrides(cli.use_yarn, cli.package_manager.clone());

    if cli.info {
        return info::run(&config, cli.json).await;
    }

    let Some(project) = cli.project_directory.clone() else {
        print_missing_project();
        std::process::exit(1);
    };

    let initializer = ScriptInitializer::new(config.initializer.runtime.clone());
    let mut bootstrap = Bootstrap::new(config.to_bootstrap_config(), initializer, Progress::new());

    match bootstrap.run(&cli.options(project, original_cwd)).await {
        Ok(_) => Ok(()),
        Err(e) => {
            report_failure(&e, &Progress::new());
            std::process::exit(e.exit_code());
        }
    }
}

/// Print failures that have not already been reported along the way
fn report_failure(error: &BootstrapError, progress: &Progress) {
    match error {
        // Conflicts are listed by the guard, rollbacks print their own cause
        BootstrapError::Conflict { .. } => {}
        e if e.is_rollback_trigger() => {}
        e => progress.error(&e.to_string()),
    }
}
