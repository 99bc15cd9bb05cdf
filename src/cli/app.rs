//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{format_cmd, watch};
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "shellfmt")]
#[command(author, version, about = "Keeps a project's shell scripts formatted")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new shellfmt project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Directory holding the scripts, relative to the project root
        #[arg(long)]
        scripts_dir: Option<PathBuf>,
    },

    /// Format the scripts directory, or only the given files
    Format {
        /// Files inside the scripts directory
        paths: Vec<PathBuf>,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Exit with an error if any script is not formatted
    Check,

    /// Manage the background watch session
    #[command(subcommand)]
    Watch(watch::WatchCommands),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = match cli.format {
        Some(format) => format,
        None => Config::load_global()?.default_format.into(),
    };
    let output = Output::new(format, cli.verbose);

    output.verbose("shellfmt starting");

    match cli.command {
        Commands::Init { path, scripts_dir } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path.display()));
            let project = Project::init(&path, scripts_dir.as_deref())?;
            output.verbose_ctx(
                "init",
                &format!("Created .shellfmt directory at: {}", project.project_dir().display()),
            );
            output.success(&format!(
                "Initialized shellfmt project at {} (scripts in {})",
                project.root().display(),
                project.config().project.scripts_dir.display()
            ));
        }

        Commands::Format { paths, dry_run } => format_cmd::format(&output, &paths, dry_run)?,
        Commands::Check => format_cmd::check(&output)?,
        Commands::Watch(cmd) => watch::run(cmd, &output)?,
    }

    Ok(())
}
