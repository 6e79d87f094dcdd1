//! ppkg - install prebuilt packages from formula repositories.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ppkg_core::RenderFormat;

mod cmd;

#[derive(Parser)]
#[command(name = "ppkg")]
#[command(version, about = "ppkg - install prebuilt packages from formula repositories")]
struct Cli {
    /// Print progress details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install packages along with their dependencies
    Install {
        /// Package name(s)
        #[arg(required = true)]
        packages: Vec<String>,
        /// Reinstall even when already installed
        #[arg(long)]
        force: bool,
        /// Target platform used to select formula overrides
        #[arg(long)]
        platform: Option<String>,
    },
    /// Print or render a package's dependency graph
    Depends {
        /// Package name
        package: String,
        /// Output format
        #[arg(short = 't', long = "output-type", value_enum, default_value = "dot")]
        output_type: OutputType,
        /// Output file, or directory when ending with '/'
        #[arg(short, long)]
        output: Option<String>,
        /// Target platform used to select formula overrides
        #[arg(long)]
        platform: Option<String>,
    },
    /// Manage formula repositories
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Register a formula repository
    Add {
        /// Local name of the repository
        name: String,
        /// Git URL to clone
        url: String,
        /// Branch to track
        #[arg(long, default_value = "master")]
        branch: String,
        /// Exclude the repo from bulk updates
        #[arg(long)]
        pinned: bool,
        /// Register without enabling
        #[arg(long)]
        disabled: bool,
    },
    /// List registered repositories
    List,
    /// Refresh a repository from its remote
    Sync {
        /// Local name of the repository
        name: String,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputType {
    Dot,
    Box,
    Svg,
    Png,
}

impl From<OutputType> for RenderFormat {
    fn from(value: OutputType) -> Self {
        match value {
            OutputType::Dot => RenderFormat::Dot,
            OutputType::Box => RenderFormat::Box,
            OutputType::Svg => RenderFormat::Svg,
            OutputType::Png => RenderFormat::Png,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ppkg: {err}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(255))
        }
    }
}

fn run(cli: Cli) -> ppkg_core::Result<()> {
    match cli.command {
        Commands::Install {
            packages,
            force,
            platform,
        } => cmd::install::install(&packages, platform.as_deref(), force),
        Commands::Depends {
            package,
            output_type,
            output,
            platform,
        } => cmd::depends::depends(
            &package,
            output_type.into(),
            output.as_deref(),
            platform.as_deref(),
        ),
        Commands::Repo { command } => match command {
            RepoCommands::Add {
                name,
                url,
                branch,
                pinned,
                disabled,
            } => cmd::repo::add(&name, &url, &branch, pinned, !disabled),
            RepoCommands::List => cmd::repo::list(),
            RepoCommands::Sync { name } => cmd::repo::sync(&name),
        },
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
