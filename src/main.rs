//! LoL Account Launcher
//!
//! Command-line front end: manage saved accounts and log one of them into the
//! Riot Client.
//!
//! ## Usage
//! 1. `lol-account-launcher add <username>` and enter the password when asked
//! 2. `lol-account-launcher list` to see ids and order
//! 3. `lol-account-launcher login <id|username>`; the Riot Client is started if
//!    needed and the login form is filled in

use clap::{Parser, Subcommand};
use rpassword::prompt_password;
use secrecy::SecretString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use lol_account_launcher::accounts::AccountRegistry;
use lol_account_launcher::config::{
    accounts_db_path, load_config, save_config, settings_path, AppConfig,
};
use lol_account_launcher::error::{LauncherError, Result};
use lol_account_launcher::launcher::Launcher;
use lol_account_launcher::notifier::ConsoleNotifier;
use lol_account_launcher::vault::{KeyringVault, SecretVault};

#[derive(Parser, Debug)]
#[command(
    name = "lol-account-launcher",
    version,
    about = "Log saved accounts into the Riot Client"
)]
struct Cli {
    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show saved accounts in display order
    List,
    /// Save a new account; the password is prompted for
    Add {
        username: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Change an account's username, display name or password
    Edit {
        id: i64,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        /// Prompt for a new password
        #[arg(long)]
        password: bool,
    },
    /// Delete an account and its stored password
    Remove { id: i64 },
    /// Move an account to a 0-based position in the list
    Move { id: i64, position: usize },
    /// Log an account into the Riot Client
    Login {
        /// Account id, username or display name
        account: String,
    },
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show,
    Set {
        /// Path to RiotClientServices.exe
        #[arg(long)]
        client_path: Option<PathBuf>,
        /// Forget the path override and use the default install locations
        #[arg(long, conflicts_with = "client_path")]
        clear_client_path: bool,
        /// Wait after launching the client before typing
        #[arg(long)]
        launch_delay_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file (optional)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` means the command ran but the login did not go through
async fn run(command: Command) -> Result<bool> {
    let vault = KeyringVault::new();

    match command {
        Command::List => {
            let registry = open_registry()?;
            let accounts = registry.list()?;
            if accounts.is_empty() {
                println!("No saved accounts. Add one with `add <username>`.");
            }
            for account in accounts {
                if account.display_name == account.username {
                    println!("{:>4}  {}", account.id, account.username);
                } else {
                    println!(
                        "{:>4}  {} ({})",
                        account.id, account.display_name, account.username
                    );
                }
            }
        }
        Command::Add {
            username,
            display_name,
        } => {
            let registry = open_registry()?;
            let password = read_password("Password: ")?;
            let account = registry.add(&vault, &username, display_name.as_deref(), &password)?;
            println!("Saved account {} as #{}", account.display_name, account.id);
        }
        Command::Edit {
            id,
            username,
            display_name,
            password,
        } => {
            let registry = open_registry()?;
            let password = if password {
                Some(read_password("New password: ")?)
            } else {
                None
            };
            let account = registry.update(
                &vault,
                id,
                username.as_deref(),
                display_name.as_deref(),
                password.as_ref(),
            )?;
            println!("Updated account #{}", account.id);
        }
        Command::Remove { id } => {
            open_registry()?.remove(&vault, id)?;
            println!("Removed account #{}", id);
        }
        Command::Move { id, position } => {
            open_registry()?.move_to(id, position)?;
        }
        Command::Login { account } => return login(vault, &account).await,
        Command::Settings(SettingsCommand::Show) => {
            let config = load_config()?;
            println!("Settings file: {}", settings_path()?.display());
            match config.riot_client_path {
                Some(ref path) => println!("Riot Client path: {}", path.display()),
                None => println!("Riot Client path: (default locations)"),
            }
            println!("Launch delay: {} ms", config.launch_delay_ms);
        }
        Command::Settings(SettingsCommand::Set {
            client_path,
            clear_client_path,
            launch_delay_ms,
        }) => {
            let mut config = load_config()?;
            apply_settings(&mut config, client_path, clear_client_path, launch_delay_ms);
            save_config(&config)?;
            info!("Settings saved");
        }
    }

    Ok(true)
}

async fn login(vault: KeyringVault, query: &str) -> Result<bool> {
    let account = open_registry()?.find(query)?;
    let config = load_config()?;
    debug!("Client candidates: {:?}", config.candidate_paths());

    let vault: Arc<dyn SecretVault> = Arc::new(vault);
    let launcher = Launcher::system(&config, vault, Arc::new(ConsoleNotifier));

    // Ctrl+C stops the attempt while it is still waiting on the client
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted");
            on_interrupt.cancel();
        }
    });

    info!("Logging in as {}", account.display_name);
    let report = launcher
        .login_with_cancel(&account.username, &account.secret_key, &cancel)
        .await;
    debug!("Attempt took {:?}: {:?}", report.elapsed, report.trail);

    Ok(report.is_success())
}

fn apply_settings(
    config: &mut AppConfig,
    client_path: Option<PathBuf>,
    clear_client_path: bool,
    launch_delay_ms: Option<u64>,
) {
    if clear_client_path {
        config.riot_client_path = None;
    } else if let Some(path) = client_path {
        config.riot_client_path = Some(path);
    }
    if let Some(delay) = launch_delay_ms {
        config.launch_delay_ms = delay;
    }
}

fn open_registry() -> Result<AccountRegistry> {
    AccountRegistry::open(&accounts_db_path()?)
}

fn read_password(prompt: &str) -> Result<SecretString> {
    let password = prompt_password(prompt)?;
    if password.is_empty() {
        return Err(LauncherError::InvalidInput(
            "password cannot be empty".to_string(),
        ));
    }
    Ok(SecretString::from(password))
}
