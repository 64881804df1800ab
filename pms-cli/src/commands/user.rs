//! User administration from the command line
//!
//! `pms user create --role pmo` is how the first account gets made; every
//! later account can be created over the API by a PMO user.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use pms_server::auth::{validate_password, Passwords};
use pms_server::db::{self, UserRepo};
use pms_server::models::{Email, Name, Pagination, Role};
use pms_server::PmsConfig;

#[derive(Parser, Debug)]
pub struct UserArgs {
    /// Database URL (overrides config/environment)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: UserCommands,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Create a user account
    Create(CreateArgs),
    /// List user accounts
    List,
}

#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Login email address
    #[arg(long)]
    pub email: String,

    /// Name shown in the UI (default: part of the email before '@')
    #[arg(long)]
    pub name: Option<String>,

    /// Global role: pmo, pm, pl, developer, designer or consultant
    #[arg(long, default_value = "developer")]
    pub role: Role,

    /// Password (prompted for when omitted)
    #[arg(long, env = "PMS_USER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

pub async fn run_user(args: UserArgs) -> Result<()> {
    let mut config = PmsConfig::load();
    if let Some(url) = args.database_url {
        config.database.url = Some(url);
    }

    match args.command {
        UserCommands::Create(create) => run_create(&config, create).await,
        UserCommands::List => run_list(&config).await,
    }
}

async fn run_create(config: &PmsConfig, args: CreateArgs) -> Result<()> {
    let email = Email::new(&args.email)?;
    let display_name = args
        .name
        .as_deref()
        .or_else(|| args.email.split('@').next())
        .unwrap_or_default();
    let display_name = Name::for_field(display_name, "display_name")?;

    let password = match args.password {
        Some(password) => password,
        None => inquire::Password::new("Password:")
            .with_help_message("8 to 128 characters")
            .prompt()
            .context("Failed to read password")?,
    };
    validate_password(&password)?;

    let passwords = Passwords::from_config(&config.auth)?;
    let hash = passwords.hash(&password)?;

    let pool = super::open_pool(config).await?;
    db::migrations::run(&pool)
        .await
        .context("Failed to apply migrations")?;

    let repo = UserRepo::new(&pool);
    if repo.find_by_email(email.as_str()).await?.is_some() {
        return Err(anyhow!("A user with email {} already exists", email.as_str()));
    }

    let user = repo
        .create(&email, &display_name, args.role, &hash)
        .await
        .context("Failed to create user")?;
    pool.close().await;

    tracing::info!(user_id = %user.id, role = %user.role, "user created");
    println!("Created {} ({}) with role {}", user.email, user.id, user.role);
    Ok(())
}

async fn run_list(config: &PmsConfig) -> Result<()> {
    let pool = super::open_pool(config).await?;
    let users = UserRepo::new(&pool)
        .list(None, Pagination::new(1, 100))
        .await
        .context("Failed to list users")?;
    pool.close().await;

    for user in &users.items {
        let state = if user.active { "" } else { " (inactive)" };
        println!("{:<36}  {:<10}  {}{}", user.id, user.role.to_string(), user.email, state);
    }
    if users.total > users.items.len() as i64 {
        println!("... {} more", users.total - users.items.len() as i64);
    }
    Ok(())
}
