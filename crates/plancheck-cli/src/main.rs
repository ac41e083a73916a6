mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use cmd::verify::VerifyArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "plancheck",
    about = "Check an implementation plan against the conventions of a codebase",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log debug output to stderr
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a plan and write a review report (exit 0 approved, 1 needs revision)
    Verify(VerifyArgs),

    /// Apply the edits of an APPROVED_WITH_CHANGES report to a copy of the plan
    Apply {
        /// Review report written by `plancheck verify`
        report: PathBuf,

        /// Plan document (default: the path recorded in the report)
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Where to write the revised plan (default: <plan-stem>.revised.md)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Index a codebase and print a summary
    Index {
        /// Codebase root (default: auto-detect from .plancheck.yaml or .git/)
        root: Option<PathBuf>,

        /// Additional directories to skip
        #[arg(long = "exclude", value_name = "DIR")]
        exclude: Vec<String>,
    },

    /// Show or validate the configuration
    Config {
        /// Codebase root holding .plancheck.yaml
        #[arg(long, env = "PLANCHECK_ROOT")]
        codebase: Option<PathBuf>,

        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Verify(args) => cmd::verify::run(args, cli.json),
        Commands::Apply { report, plan, out } => {
            cmd::apply::run(&report, plan.as_deref(), out.as_deref(), cli.json)
        }
        Commands::Index { root, exclude } => {
            let root = root::resolve_root(root.as_deref());
            cmd::index::run(&root, exclude, cli.json)
        }
        Commands::Config {
            codebase,
            subcommand,
        } => {
            let root = root::resolve_root(codebase.as_deref());
            cmd::config::run(&root, subcommand, cli.json)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    }
}
