use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::compose::ai::GeminiClient;
use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage::{self, SharedStore};

pub mod commands;

use self::commands::{
    ContactArgs, DeleteArgs, DescribeArgs, HistoryArgs, LangArgs, ListArgs, LoginArgs, PostArgs,
    ShowArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "bozor",
    version,
    about = "Classified ads marketplace for Tajikistan"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over BOZOR_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over BOZOR_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Browse listings with optional search, filters and sorting (default)
    List(ListArgs),
    /// Show one listing in full
    Show(ShowArgs),
    /// Publish a new listing (requires login)
    Post(PostArgs),
    /// Delete one of your own listings
    Delete(DeleteArgs),
    /// Print call and WhatsApp links for a listing
    Contact(ContactArgs),
    /// Generate a listing description without publishing anything
    Describe(DescribeArgs),
    /// Log in with a phone number and confirmation code
    Login(LoginArgs),
    /// Forget the logged-in identity
    Logout,
    /// Print the logged-in identity
    Whoami,
    /// Show or clear recent searches
    History(HistoryArgs),
    /// Show or change the interface language
    Lang(LangArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);
    let store: SharedStore = Arc::new(storage::init(&paths, &config.storage)?);
    let generator = Arc::new(GeminiClient::from_config(&config.ai)?);
    let mut app = App::new(config, store, generator);

    let command = cli.command.unwrap_or(Commands::List(ListArgs::default()));
    let output = match command {
        Commands::List(args) => commands::list_ads(&mut app, &args)?,
        Commands::Show(args) => commands::show_ad(&app, &args)?,
        Commands::Post(args) => commands::post_ad(&mut app, args)?,
        Commands::Delete(args) => commands::delete_ad(&mut app, &args)?,
        Commands::Contact(args) => commands::contact(&app, &args)?,
        Commands::Describe(args) => commands::describe(&mut app, &args)?,
        Commands::Login(args) => commands::login(&mut app, args)?,
        Commands::Logout => commands::logout(&mut app),
        Commands::Whoami => commands::whoami(&app),
        Commands::History(args) => commands::history(&mut app, &args)?,
        Commands::Lang(args) => commands::language(&mut app, &args)?,
    };
    print!("{output}");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
