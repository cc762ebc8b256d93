use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use credpool::pool::{self, CredentialSource, PoolConfig};
use credpool::store::{Credential, CredentialStore, Status, StoreError};

#[derive(Parser)]
#[command(name = "credpool")]
#[command(about = "🔑 credpool - Reusable test-user credential pool")]
#[command(long_about = "credpool keeps a pool of test accounts created by earlier end-to-end runs,
so a new run can recycle an existing account instead of registering a fresh one.

Each credential is handed out at most once. The pool lives in a CSV file that is safe to share
between parallel test workers on the same machine.")]
#[command(version)]
#[command(help_template = "{before-help}{name} {version}
{about}

{usage-heading} {usage}

{all-args}{after-help}

EXAMPLES:
    # Record an account your test just registered
    credpool add \"Jane Doe\" jane@example.test 'Passw0rd!123'

    # Claim an unused account for a login test
    credpool take --json

    # Claim one, or generate a fresh identity if the pool is dry
    credpool acquire --record --json

    # Inspect the pool
    credpool stats

For more help on specific commands, use: credpool <command> --help")]
struct Cli {
    /// Pool file (overrides config and CREDPOOL_PATH)
    #[arg(short, long, global = true, help = "Pool CSV file (default: data/created_users.csv)")]
    path: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, global = true, help = "JSON config file (default: ~/.config/credpool/config.json)")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true, help = "Log lock and file activity to stderr")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// ➕ Add a newly registered account to the pool
    #[command(alias = "save", alias = "append")]
    #[command(long_about = "Append a credential to the pool as available for reuse.

Creates the pool file (and its directory) on first use.

EXAMPLES:
    credpool add \"Jane Doe\" jane@example.test 'Passw0rd!123'
    credpool save \"John Roe\" john@example.test secret --path pools/luma.csv")]
    Add {
        #[arg(help = "Display name of the account")]
        name: String,
        #[arg(help = "Login email")]
        email: String,
        #[arg(help = "Login password")]
        password: String,
    },

    /// 🎟️ Claim the next unused credential
    #[command(alias = "allocate", alias = "get")]
    #[command(long_about = "Mark the earliest unused credential as used and print it.

Fails when the pool file is missing, holds only headers, or every credential has been used.

EXAMPLES:
    credpool take
    credpool take --json")]
    Take {
        #[arg(long, help = "Print the credential as JSON")]
        json: bool,
    },

    /// 🧪 Claim a credential, or generate one if the pool is dry
    #[command(alias = "provision")]
    #[command(long_about = "Claim the next unused credential. When the pool is missing, empty or exhausted,
generate a fresh identity instead; the caller is then responsible for registering it.

EXAMPLES:
    credpool acquire --json
    credpool acquire --record    # also add a generated identity to the pool")]
    Acquire {
        #[arg(long, help = "Add a generated identity to the pool for later runs")]
        record: bool,
        #[arg(long, help = "Print the credential as JSON")]
        json: bool,
    },

    /// 📋 List every credential in the pool
    #[command(alias = "ls", alias = "show")]
    List {
        #[arg(short, long, help = "Only show unused or used credentials")]
        status: Option<Status>,
        #[arg(long, help = "Print records as JSON")]
        json: bool,
    },

    /// 📊 Show pool counts
    #[command(alias = "stat", alias = "info")]
    Stats {
        #[arg(long, help = "Print counts as JSON")]
        json: bool,
    },

    /// 🎲 Generate fresh identities
    #[command(alias = "gen")]
    #[command(long_about = "Generate random name/email/password triples for registering new accounts.

EXAMPLES:
    credpool generate
    credpool gen --count 5 --domain qa.example --json
    credpool generate --save     # add them to the pool right away")]
    Generate {
        #[arg(short = 'n', long, default_value_t = 1, help = "How many identities to generate")]
        count: usize,
        #[arg(short, long, help = "Email domain (default from config)")]
        domain: Option<String>,
        #[arg(long, help = "Add generated identities to the pool")]
        save: bool,
        #[arg(long, help = "Print identities as JSON")]
        json: bool,
    },

    /// ⚙️ Show or initialize configuration
    #[command(alias = "cfg")]
    Config {
        #[arg(long, help = "Write the effective configuration to the config file")]
        init: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Print a store failure with a hint and exit
fn exit_with_store_error(action: &str, error: &StoreError) -> ! {
    eprintln!("❌ Failed to {}: {}", action, error);
    match error {
        StoreError::NotFound { .. } | StoreError::PoolEmpty { .. } => {
            eprintln!("   Add accounts with 'credpool add <name> <email> <password>'");
            eprintln!("   or use 'credpool acquire' to fall back to a generated identity");
        }
        StoreError::Exhausted { .. } => {
            eprintln!("   Every pooled account has been used");
            eprintln!("   Use 'credpool acquire --record' to generate and pool a new one");
        }
        StoreError::LockTimeout { .. } => {
            eprintln!("   Another process is holding the pool; retry or raise lock_timeout_ms");
        }
        StoreError::Malformed { .. } => {
            eprintln!("   Fix the line or set malformed_policy to \"skip\"");
        }
        _ => {}
    }
    eprintln!("   kind: {}", error.kind());
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // `config --init` may name a file that does not exist yet
    let initializing = matches!(cli.command, Commands::Config { init: true });
    let explicit = cli.config.as_deref().filter(|p| !initializing || p.exists());
    let mut config = PoolConfig::load(explicit)?;
    if let Some(path) = cli.path {
        config.path = path;
    }
    let store = config.open_store();

    match cli.command {
        Commands::Add { name, email, password } => {
            let credential = Credential::new(name, email, password);
            match store.append(&credential) {
                Ok(()) => {
                    println!("✅ Added {} to the pool", credential.email);
                    println!("   File: {}", store.path().display());
                }
                Err(e) => exit_with_store_error("add credential", &e),
            }
        }

        Commands::Take { json } => match store.allocate_next() {
            Ok(credential) => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&credential)?);
                } else {
                    println!("🎟️  Claimed credential");
                    println!("   Name: {}", credential.name);
                    println!("   Email: {}", credential.email);
                    println!("   Password: {}", credential.password);
                }
            }
            Err(e) => exit_with_store_error("claim credential", &e),
        },

        Commands::Acquire { record, json } => {
            match pool::acquire(&store, &config.generator(), record) {
                Ok(provisioned) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&provisioned)?);
                    } else {
                        match provisioned.source {
                            CredentialSource::Pool => println!("🎟️  Claimed credential from the pool"),
                            CredentialSource::Generated => {
                                println!("🎲 Pool unavailable, generated a fresh identity");
                                println!("   Register this account before using it");
                                if record {
                                    println!("   Added to the pool for later runs");
                                }
                            }
                        }
                        println!("   Name: {}", provisioned.credential.name);
                        println!("   Email: {}", provisioned.credential.email);
                        println!("   Password: {}", provisioned.credential.password);
                    }
                }
                Err(e) => exit_with_store_error("acquire credential", &e),
            }
        }

        Commands::List { status, json } => {
            let records = match store.read_all() {
                Ok(records) => records,
                Err(e) => exit_with_store_error("read pool", &e),
            };
            let records: Vec<_> = records
                .into_iter()
                .filter(|r| status.is_none_or(|s| r.status == s))
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("ℹ️  No credentials in {}", store.path().display());
            } else {
                println!("📋 Credentials in {}", store.path().display());
                for (i, record) in records.iter().enumerate() {
                    let marker = if record.status.is_unused() { "🟢" } else { "⚪" };
                    println!("   {} {}. {} <{}> [{}]", marker, i + 1, record.name, record.email, record.status);
                }
            }
        }

        Commands::Stats { json } => {
            let stats = match store.stats() {
                Ok(stats) => stats,
                Err(e) => exit_with_store_error("read pool", &e),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("📊 Pool: {}", store.path().display());
                println!("   Total: {}", stats.total);
                println!("   Unused: {}", stats.unused);
                println!("   Used: {}", stats.used);
                if stats.malformed > 0 {
                    println!("   ⚠️  Malformed lines: {}", stats.malformed);
                }
            }
        }

        Commands::Generate { count, domain, save, json } => {
            let mut generator_config = config.clone();
            if let Some(domain) = domain {
                generator_config.email_domain = domain;
            }
            let generator = generator_config.generator();

            let credentials: Vec<_> = (0..count).map(|_| generator.generate()).collect();
            if save {
                for credential in &credentials {
                    if let Err(e) = store.append(credential) {
                        exit_with_store_error("add credential", &e);
                    }
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&credentials)?);
            } else {
                for credential in &credentials {
                    println!("🎲 {} <{}> {}", credential.name, credential.email, credential.password);
                }
                if save {
                    println!("✅ Added {} identities to {}", credentials.len(), store.path().display());
                }
            }
        }

        Commands::Config { init } => {
            let config_path = match &cli.config {
                Some(path) => path.clone(),
                None => PoolConfig::config_file_path()?,
            };

            if init {
                config.save(&config_path)?;
                println!("✅ Configuration written to {}", config_path.display());
            } else {
                println!("⚙️  Configuration ({})", config_path.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }

            for warning in config.validate() {
                println!("⚠️  {}", warning);
            }
        }
    }

    Ok(())
}
