use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::{Env, Target};
use tokio::task::LocalSet;

use quick_toggler::app::ToggleApp;
use quick_toggler::config::{self, Settings};
use quick_toggler::model::MenuItem;

#[derive(Parser, Debug)]
#[command(author, version, about = "Launch programs and toggle services from one menu")]
struct Cli {
    /// Settings file (default: $XDG_CONFIG_HOME/quick-toggler/settings.json)
    #[arg(long, value_name = "PATH", global = true)]
    settings: Option<PathBuf>,
    /// Entries file, overriding the one named in the settings
    #[arg(long, value_name = "PATH", global = true)]
    entries: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep detecting toggler states and follow config changes (default)
    Run,
    /// Detect every toggler once and print the menu
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print the entries whose title matches the pattern
    Search { pattern: String },
    /// Launch or toggle the first entry matching the pattern
    Perform { pattern: String },
    /// Validate the entries file
    Check,
    /// Write the default settings file if there is none
    InitConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings_path = cli.settings.clone().unwrap_or_else(config::settings_path);
    let settings = Settings::load_from(&settings_path);
    init_logging(settings.log_file.as_deref());

    let command = cli.command.unwrap_or(Command::Run);
    if let Command::InitConfig = command {
        return init_config(&settings_path);
    }

    let entries_path = cli.entries.unwrap_or_else(|| settings.entries_path());
    let entries_path = match command {
        Command::Check => entries_path,
        _ => config::ensure_entries_file(&entries_path).map_err(anyhow::Error::msg)?,
    };
    log::info!("Using entries from {}", entries_path.display());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the runtime")?;
    let local = LocalSet::new();
    let mut app = ToggleApp::new(settings, settings_path, entries_path);

    local.block_on(&runtime, async move {
        match command {
            Command::Run => {
                // A broken file is reported and retried on the next change.
                let _ = app.reload_entries();
                app.run().await.context("failed to watch the config files")
            }
            Command::List { json } => {
                load(&mut app)?;
                app.refresh().await;
                print_menu(&app.menu(), json)
            }
            Command::Search { pattern } => {
                load(&mut app)?;
                for entry in app.search(&pattern) {
                    println!("{}\t{}", entry.type_name(), entry.title());
                }
                Ok(())
            }
            Command::Perform { pattern } => {
                load(&mut app)?;
                // Show current states so a toggle flips from what is really running.
                app.refresh().await;
                match app.perform_and_wait(&pattern).await {
                    Some(title) => {
                        println!("{}", title);
                        Ok(())
                    }
                    None => bail!("no entry matches '{}'", pattern),
                }
            }
            Command::Check => {
                let count = app
                    .check()
                    .with_context(|| format!("invalid entries file {}", app.entries_path().display()))?;
                println!("{}: ok, {} entries", app.entries_path().display(), count);
                Ok(())
            }
            Command::InitConfig => Ok(()),
        }
    })
}

fn load(app: &mut ToggleApp) -> Result<()> {
    let path = app.entries_path().display().to_string();
    app.reload_entries()
        .with_context(|| format!("invalid entries file {}", path))
}

fn print_menu(items: &[MenuItem], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        print!("{}", MenuItem::render(items));
    }
    Ok(())
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("{} already exists", path.display());
        return Ok(());
    }
    Settings::default()
        .save_to(path)
        .map_err(anyhow::Error::msg)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn init_logging(log_file: Option<&Path>) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));
    let mut fallback = None;

    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => fallback = Some(format!("Cannot open log file {}: {}", path.display(), e)),
        }
    }

    builder.init();
    if let Some(message) = fallback {
        log::warn!("{}, logging to stderr", message);
    }
}
