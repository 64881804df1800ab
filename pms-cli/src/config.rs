use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use pms_server::config::{global_config_path, LOCAL_CONFIG_FILE};
use pms_server::PmsConfig;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a config file with default values to ~/.pms/config.toml
    Init(InitArgs),
    /// Print the effective config (files + environment) as TOML
    Show,
    /// Show config file paths and whether they exist
    Path,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long, short)]
    pub force: bool,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init(args) => run_init(args),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Path => run_path(),
    }
}

fn run_init(args: InitArgs) -> Result<()> {
    let config_path =
        global_config_path().ok_or_else(|| anyhow!("Could not determine home directory"))?;

    if config_path.exists() && !args.force {
        return Err(anyhow!(
            "Config already exists at {}\n\nUse --force to overwrite",
            config_path.display()
        ));
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let contents = PmsConfig::default()
        .to_toml_string()
        .context("Failed to render default config")?;
    std::fs::write(&config_path, contents)
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    println!("Created config at: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Edit the config: $EDITOR {}", config_path.display());
    println!("  2. Apply the schema: pms migrate");
    println!("  3. Create the first PMO user: pms user create --role pmo");
    Ok(())
}

fn run_show() -> Result<()> {
    let config = PmsConfig::load();
    let rendered = config
        .to_toml_string()
        .context("Failed to render config")?;
    print!("{rendered}");
    Ok(())
}

fn run_path() -> Result<()> {
    let describe = |path: &std::path::Path| {
        if path.exists() {
            format!("{} (found)", path.display())
        } else {
            format!("{} (not found)", path.display())
        }
    };

    match global_config_path() {
        Some(path) => println!("global: {}", describe(&path)),
        None => println!("global: <no home directory>"),
    }
    println!("local:  {}", describe(std::path::Path::new(LOCAL_CONFIG_FILE)));
    Ok(())
}
