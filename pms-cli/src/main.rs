//! pms CLI - project management server
//!
//! - `serve`: run the HTTP API
//! - `migrate`: apply the database schema
//! - `user`: create and list accounts (bootstraps the first PMO user)
//! - `config`: write, show and locate config files
//! - `completions`: shell completion scripts

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod config;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "pms",
    author,
    version,
    about = "Project management server: organizations, projects, kanban tasks, decisions and reports",
    long_about = "Serve the pms JSON API over a SQLite database, apply migrations, \
                  and manage user accounts and configuration."
)]
struct Cli {
    /// Debug logging (unless RUST_LOG is set)
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Apply database migrations
    Migrate(commands::migrate::MigrateArgs),
    /// Manage user accounts
    User(commands::user::UserArgs),
    /// Manage pms configuration (init, show, path)
    Config(config::ConfigArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })
    .ok();
    pms_server::config::load_dotenv();

    let result = match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await,
        Commands::Migrate(args) => commands::run_migrate(args).await,
        Commands::User(args) => commands::run_user(args).await,
        Commands::Config(args) => config::run_config(args),
        Commands::Completions(args) => run_completions(args),
    };

    tracing_setup::shutdown_otel();
    result
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());
    Ok(())
}
