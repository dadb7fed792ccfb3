//! Binary entrypoint for the chainbbs CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml` and an empty chain catalog
//! - `list --user <name>` - show the chains that user would see
//! - `chains --user <name> [--remote] [--port <path>]` - run the chains menu
//! - `run <number> --user <name>` - run one chain from that user's menu
//! - `exec <command line...>` - launch a command line directly and report its status
//! - `status` - print the catalog and user summary
//!
//! See the library crate docs for module‑level details: `chainbbs::`.
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use chainbbs::bbs::chains::{build_chains_map, ChainsMenu, RunOutcome};
use chainbbs::bbs::instance::{FileInstanceRegistry, InstanceRegistry};
use chainbbs::bbs::roles::{self, LevelAccess};
use chainbbs::bbs::session::{Session, SessionId};
use chainbbs::bbs::terminal::{ConsoleTerminal, Terminal};
use chainbbs::config::Config;
use chainbbs::exec::{status_code, ExecutionFlags, Launcher, LocalIo, ShellSpawner};
use chainbbs::metrics;
use chainbbs::storage::catalog::ChainCatalog;
use chainbbs::storage::Storage;

#[derive(Parser)]
#[command(name = "chainbbs")]
#[command(about = "External program chains for a BBS")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new BBS configuration
    Init,
    /// List the chains a user may run
    List {
        #[arg(short, long)]
        user: String,
        /// Treat the user as a remote (modem) caller
        #[arg(long)]
        remote: bool,
        /// Terminal without ANSI support
        #[arg(long)]
        no_ansi: bool,
    },
    /// Run the interactive chains menu
    Chains {
        #[arg(short, long)]
        user: String,
        /// Remote (modem) session
        #[arg(long)]
        remote: bool,
        /// Serial device for a remote session (defaults to [serial].port)
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Run one chain by its menu number
    Run {
        number: usize,
        #[arg(short, long)]
        user: String,
    },
    /// Launch a command line through the platform shell
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command_line: Vec<String>,
        /// Request FOSSIL/COM-port handover
        #[arg(long)]
        fossil: bool,
        /// Switch the local console to code page 437 while running
        #[arg(long)]
        cp437: bool,
    },
    /// Show BBS status and statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init writes the config, so there is nothing to load yet
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            info!("Initializing new BBS configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);

            let cfg = Config::default();
            let storage = Storage::from_config(&cfg)?;
            if !storage.catalog_path().exists() {
                storage.save_catalog(&ChainCatalog::default())?;
            }
            info!("Initialized chain catalog at {}", storage.catalog_path().display());
        }
        Commands::List {
            user,
            remote,
            no_ansi,
        } => {
            let config = require_config(pre_config, &cli.config).await?;
            let storage = Storage::from_config(&config)?;
            let session = open_session(&config, &storage, &user, remote)?.with_ansi(!no_ansi);
            let catalog = storage.load_catalog()?;
            let map = build_chains_map(&catalog, &session, &LevelAccess);
            if map.is_empty() {
                println!("Sorry, no external programs available.");
            }
            for (i, entry) in map.iter().enumerate() {
                println!(
                    "{:>3}. {:<40} {:>6}{}",
                    i + 1,
                    entry.chain.description,
                    entry.chain.usage,
                    if entry.chain.multi_user { "  (multi-user)" } else { "" }
                );
            }
        }
        Commands::Chains { user, remote, port } => {
            let config = require_config(pre_config, &cli.config).await?;
            tokio::task::spawn_blocking(move || run_menu(config, user, remote, port)).await??;
            info!("{}", metrics::summary());
        }
        Commands::Run { number, user } => {
            let config = require_config(pre_config, &cli.config).await?;
            let outcome = tokio::task::spawn_blocking(move || -> Result<RunOutcome> {
                let storage = Storage::from_config(&config)?;
                let session = open_session(&config, &storage, &user, false)?;
                let launcher = Launcher::shell();
                let registry = shared_registry(&storage);
                let mut menu = ChainsMenu::new(config, storage, registry, launcher, session)?;
                menu.run_chain_number(&mut ConsoleTerminal, number)
            })
            .await??;
            info!("{}", metrics::summary());
            match outcome {
                RunOutcome::Launched(result) => {
                    let code = status_code(&result);
                    info!("chain #{} finished with status {}", number, code);
                }
                RunOutcome::Busy { occupant } => warn!("chain #{} busy on {}", number, occupant),
                RunOutcome::Declined => {}
            }
        }
        Commands::Exec {
            command_line,
            fossil,
            cp437,
        } => {
            let mut flags = ExecutionFlags::empty();
            flags.set(ExecutionFlags::FOSSIL, fossil);
            flags.set(ExecutionFlags::LOCAL_CONSOLE_CP437, cp437);
            let command_line = command_line.join(" ");
            let result = tokio::task::spawn_blocking(move || {
                Launcher::shell().launch(&command_line, flags, &mut LocalIo)
            })
            .await?;
            match &result {
                Ok(status) => {
                    println!("{}", status);
                    std::process::exit(status.exit_code().unwrap_or(1));
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(if e.is_configuration() { 2 } else { 1 });
                }
            }
        }
        Commands::Status => {
            let config = require_config(pre_config, &cli.config).await?;
            let storage = Storage::from_config(&config)?;
            let catalog = storage.load_catalog()?;
            println!("{} (sysop: {})", config.bbs.name, config.bbs.sysop);
            println!("Catalog: {}", storage.catalog_path().display());
            println!(
                "Chains: {} ({} registered)",
                catalog.len(),
                catalog.chains().iter().filter(|c| c.is_registered()).count()
            );
            let total: u64 = catalog.chains().iter().map(|c| u64::from(c.usage)).sum();
            println!("Total chain runs: {}", total);
            if let Some(top) = catalog.chains().iter().max_by_key(|c| c.usage) {
                if top.usage > 0 {
                    println!("Most used: {} ({})", top.description, top.usage);
                }
            }
            println!("Users: {}", storage.user_count()?);

            let active = FileInstanceRegistry::new(storage.instances_path()).snapshot();
            if active.is_empty() {
                println!("Active: none");
            }
            for (slot, sessions) in active {
                let who: Vec<&str> = sessions.iter().map(|s| s.as_str()).collect();
                let name = catalog
                    .at(slot.index.saturating_sub(1))
                    .map(|c| c.description.as_str())
                    .unwrap_or("?");
                println!("Active: chain #{} {} on {}", slot.index, name, who.join(", "));
            }
        }
    }

    Ok(())
}

async fn require_config(pre_config: Option<Config>, path: &str) -> Result<Config> {
    match pre_config {
        Some(config) => Ok(config),
        None => Config::load(path).await,
    }
}

/// Look up (or create) the caller's user record and open a session for them.
/// The configured sysop always gets sysop level.
fn open_session(config: &Config, storage: &Storage, username: &str, remote: bool) -> Result<Session> {
    let default_level = if username.eq_ignore_ascii_case(&config.bbs.sysop) {
        roles::LEVEL_SYSOP
    } else {
        roles::LEVEL_USER
    };
    let user = storage.ensure_user(username, default_level)?;
    let level = user.user_level.max(default_level);
    info!(
        "{} logged in as {} ({})",
        user.username,
        roles::role_name(level),
        if remote { "remote" } else { "local" }
    );
    Ok(
        Session::from_config(SessionId::generate(), user.username, level, &config.session)
            .remote(remote),
    )
}

/// Instance table shared by every session process using this data directory.
fn shared_registry(storage: &Storage) -> Arc<dyn InstanceRegistry> {
    FileInstanceRegistry::shared(storage.instances_path())
}

fn run_menu(config: Config, user: String, remote: bool, port: Option<String>) -> Result<()> {
    let storage = Storage::from_config(&config)?;
    let session = open_session(&config, &storage, &user, remote)?;
    let launcher: Launcher<ShellSpawner> =
        Launcher::shell().with_exclusive_transport(remote && config.session.exclusive_transport);

    let port = port.unwrap_or_else(|| config.serial.port.clone());
    let baud_rate = config.serial.baud_rate;
    let registry = shared_registry(&storage);
    let mut menu = ChainsMenu::new(config, storage, registry, launcher, session)?;

    if remote && !port.is_empty() {
        return run_on_serial(&mut menu, &port, baud_rate);
    }
    run_on(&mut menu, &mut ConsoleTerminal)
}

fn run_on<T: Terminal>(menu: &mut ChainsMenu<ShellSpawner>, term: &mut T) -> Result<()> {
    let result = menu.run(term);
    info!("{} left the chains menu", menu.session().username);
    result
}

#[cfg(feature = "serial")]
fn run_on_serial(menu: &mut ChainsMenu<ShellSpawner>, port: &str, baud_rate: u32) -> Result<()> {
    let mut line = chainbbs::bbs::serial::SerialLine::open(port, baud_rate)?;
    run_on(menu, &mut line)
}

#[cfg(not(feature = "serial"))]
fn run_on_serial(_menu: &mut ChainsMenu<ShellSpawner>, port: &str, _baud_rate: u32) -> Result<()> {
    Err(anyhow::anyhow!(
        "Serial session on {} requires the 'serial' feature",
        port
    ))
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let sysop_path = config.as_ref().and_then(|c| c.logging.sysop_file.clone());
    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });
    let write_mutex = log_file.map(|f| std::sync::Arc::new(std::sync::Mutex::new(f)));

    // Foreground: write to the console too
    let is_tty = atty::is(atty::Stream::Stdout);

    builder.format(move |fmt, record| {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let line = format!("{} [{}] {}", ts, record.level(), record.args());

        if let Some(ref mutex) = write_mutex {
            if let Ok(mut guard) = mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
        }

        if record.target() == "sysop" {
            if let Some(ref path) = sysop_path {
                if let Ok(mut sf) = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                {
                    let _ = writeln!(sf, "{} {}", ts, record.args());
                }
            }
        }

        if write_mutex.is_none() || is_tty {
            writeln!(fmt, "{}", line)
        } else {
            Ok(())
        }
    });
    let _ = builder.try_init();
}
